//! Packed per-event boolean masks.
//!
//! Masks are aligned to the full event batch (never to an already-filtered
//! view) and stored as `u64` words. All combinators require equal lengths;
//! mixing masks from different batches is a programmer error and panics.

use std::ops::{BitAnd, BitOr, Not};

/// A packed boolean array over the events of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    words: Vec<u64>,
    len: usize,
}

impl Mask {
    /// An all-true mask of length `len`.
    pub fn trues(len: usize) -> Self {
        let mut m = Self { words: vec![u64::MAX; len.div_ceil(64)], len };
        m.clear_tail();
        m
    }

    /// An all-false mask of length `len`.
    pub fn falses(len: usize) -> Self {
        Self { words: vec![0; len.div_ceil(64)], len }
    }

    /// Build a mask from a boolean slice.
    pub fn from_bools(bits: &[bool]) -> Self {
        let mut m = Self::falses(bits.len());
        for (i, &b) in bits.iter().enumerate() {
            if b {
                m.words[i / 64] |= 1 << (i % 64);
            }
        }
        m
    }

    /// Build a mask by applying a predicate to a column.
    pub fn from_f64s(values: &[f64], pred: impl Fn(f64) -> bool) -> Self {
        let mut m = Self::falses(values.len());
        for (i, &v) in values.iter().enumerate() {
            if pred(v) {
                m.words[i / 64] |= 1 << (i % 64);
            }
        }
        m
    }

    /// Number of events covered by this mask.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the mask covers zero events.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Value at event `i`.
    pub fn get(&self, i: usize) -> bool {
        debug_assert!(i < self.len);
        self.words[i / 64] >> (i % 64) & 1 == 1
    }

    /// Number of surviving (true) events.
    pub fn count(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterate the mask as booleans.
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len).map(move |i| self.get(i))
    }

    /// Materialize as a `Vec<bool>`.
    pub fn to_bools(&self) -> Vec<bool> {
        self.iter().collect()
    }

    /// In-place AND with another mask of the same length.
    pub fn and_assign(&mut self, other: &Mask) {
        assert_eq!(self.len, other.len, "mask length mismatch");
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w &= o;
        }
    }

    // Bits past `len` in the last word must stay zero so `count` and
    // negation behave.
    fn clear_tail(&mut self) {
        let tail = self.len % 64;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }
}

impl BitAnd for &Mask {
    type Output = Mask;

    fn bitand(self, rhs: &Mask) -> Mask {
        let mut out = self.clone();
        out.and_assign(rhs);
        out
    }
}

impl BitOr for &Mask {
    type Output = Mask;

    fn bitor(self, rhs: &Mask) -> Mask {
        assert_eq!(self.len, rhs.len, "mask length mismatch");
        let mut out = self.clone();
        for (w, o) in out.words.iter_mut().zip(&rhs.words) {
            *w |= o;
        }
        out
    }
}

impl Not for &Mask {
    type Output = Mask;

    fn not(self) -> Mask {
        let mut out = self.clone();
        for w in out.words.iter_mut() {
            *w = !*w;
        }
        out.clear_tail();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let bits = vec![true, false, true, true, false];
        let m = Mask::from_bools(&bits);
        assert_eq!(m.len(), 5);
        assert_eq!(m.count(), 3);
        assert_eq!(m.to_bools(), bits);
    }

    #[test]
    fn combinators() {
        let a = Mask::from_bools(&[true, true, false]);
        let b = Mask::from_bools(&[true, false, false]);
        assert_eq!((&a & &b).to_bools(), vec![true, false, false]);
        assert_eq!((&a | &b).to_bools(), vec![true, true, false]);
        assert_eq!((!&a).to_bools(), vec![false, false, true]);
    }

    #[test]
    fn negation_keeps_tail_clear() {
        let m = Mask::falses(70);
        let inv = !&m;
        assert_eq!(inv.count(), 70);
        assert_eq!((!&inv).count(), 0);
    }

    #[test]
    fn long_mask_word_boundary() {
        let bits: Vec<bool> = (0..130).map(|i| i % 3 == 0).collect();
        let m = Mask::from_bools(&bits);
        assert_eq!(m.to_bools(), bits);
        assert_eq!(m.count(), bits.iter().filter(|&&b| b).count());
    }

    #[test]
    #[should_panic(expected = "mask length mismatch")]
    fn mismatched_lengths_panic() {
        let _ = &Mask::trues(3) & &Mask::trues(4);
    }
}
