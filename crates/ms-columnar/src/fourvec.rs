//! Minimal 4-vector algebra for candidate building.

/// Sentinel used for padded/missing kinematic values.
pub const SENTINEL: f64 = -999.0;

/// A 4-vector in (pt, eta, phi, mass) representation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct P4 {
    /// Transverse momentum.
    pub pt: f64,
    /// Pseudorapidity.
    pub eta: f64,
    /// Azimuthal angle.
    pub phi: f64,
    /// Invariant mass.
    pub mass: f64,
}

impl P4 {
    /// Construct from (pt, eta, phi, mass).
    pub fn new(pt: f64, eta: f64, phi: f64, mass: f64) -> Self {
        Self { pt, eta, phi, mass }
    }

    fn px(&self) -> f64 {
        self.pt * self.phi.cos()
    }

    fn py(&self) -> f64 {
        self.pt * self.phi.sin()
    }

    fn pz(&self) -> f64 {
        self.pt * self.eta.sinh()
    }

    fn energy(&self) -> f64 {
        let p2 = self.px().powi(2) + self.py().powi(2) + self.pz().powi(2);
        (self.mass.powi(2) + p2).sqrt()
    }

    /// Sum of two 4-vectors, back in (pt, eta, phi, mass) form.
    pub fn add(&self, other: &P4) -> P4 {
        let px = self.px() + other.px();
        let py = self.py() + other.py();
        let pz = self.pz() + other.pz();
        let e = self.energy() + other.energy();
        let pt = (px * px + py * py).sqrt();
        let p = (px * px + py * py + pz * pz).sqrt();
        let eta = if pt > 0.0 { (pz / pt).asinh() } else { 0.0 };
        let phi = py.atan2(px);
        let m2 = e * e - p * p;
        let mass = if m2 > 0.0 { m2.sqrt() } else { 0.0 };
        P4::new(pt, eta, phi, mass)
    }
}

/// Columnar 4-vector sum over per-event candidate legs.
///
/// Events where either leg carries the pad sentinel propagate the sentinel to
/// all four output components.
pub fn p4_sum_columns(
    pt1: &[f64],
    eta1: &[f64],
    phi1: &[f64],
    m1: &[f64],
    pt2: &[f64],
    eta2: &[f64],
    phi2: &[f64],
    m2: &[f64],
) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
    let n = pt1.len();
    let mut pt = Vec::with_capacity(n);
    let mut eta = Vec::with_capacity(n);
    let mut phi = Vec::with_capacity(n);
    let mut mass = Vec::with_capacity(n);
    for i in 0..n {
        if pt1[i] == SENTINEL || pt2[i] == SENTINEL {
            pt.push(SENTINEL);
            eta.push(SENTINEL);
            phi.push(SENTINEL);
            mass.push(SENTINEL);
            continue;
        }
        let sum = P4::new(pt1[i], eta1[i], phi1[i], m1[i])
            .add(&P4::new(pt2[i], eta2[i], phi2[i], m2[i]));
        pt.push(sum.pt);
        eta.push(sum.eta);
        phi.push(sum.phi);
        mass.push(sum.mass);
    }
    (pt, eta, phi, mass)
}

/// ΔR between two (eta, phi) points.
pub fn delta_r(eta1: f64, phi1: f64, eta2: f64, phi2: f64) -> f64 {
    ((eta1 - eta2).powi(2) + (phi1 - phi2).powi(2)).sqrt()
}
