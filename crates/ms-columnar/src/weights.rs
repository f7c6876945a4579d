//! Event-weight composition from configured weight fields.

use ms_core::{Result, WeightConfig};

use crate::EventBatch;

/// Compose the configured weight columns as products of named fields.
///
/// Each entry of `weights` defines one output scalar. Factors may be scalars
/// (`"pileupWeight"`) or collection columns (`"Electron.sf_id"`), the latter
/// reduced by per-event product. Banned or missing factors are skipped with a
/// log line; composition never fails a batch.
pub fn make_weight_fields(
    batch: &mut EventBatch,
    weights: &WeightConfig,
    ban_weights: &[String],
) -> Result<()> {
    let n = batch.n_events();
    for (weight_name, factors) in weights {
        tracing::debug!("composing weight field '{weight_name}' from {factors:?}");
        let mut total = vec![1.0; n];
        for factor in factors {
            if ban_weights.iter().any(|b| b == factor) {
                tracing::info!("skipping banned weight field '{factor}'");
                continue;
            }
            let values = match resolve_factor(batch, factor) {
                Some(v) => v,
                None => {
                    tracing::warn!("weight factor '{factor}' not found in events, skipping");
                    continue;
                }
            };
            for (t, v) in total.iter_mut().zip(&values) {
                *t *= v;
            }
        }
        batch.set_f64s(weight_name, total)?;
    }
    Ok(())
}

/// Resolve one factor to a per-event vector.
fn resolve_factor(batch: &EventBatch, factor: &str) -> Option<Vec<f64>> {
    if let Ok(v) = batch.f64s(factor) {
        return Some(v.to_vec());
    }
    if let Some((coll, field)) = factor.split_once('.') {
        if let Some(c) = batch.collection(coll) {
            if c.has_field(field) {
                return c.product_per_event(field).ok();
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Collection;
    use std::collections::BTreeMap;

    fn batch() -> EventBatch {
        let mut b = EventBatch::new(2);
        b.set_f64s("pileupWeight", vec![1.1, 0.9]).unwrap();
        b.set_f64s("genWeight", vec![2.0, -1.0]).unwrap();
        b.set_collection(
            "Electron",
            Collection::from_fields(vec![0, 2, 2], [("sf_id".to_string(), vec![0.9, 0.8])])
                .unwrap(),
        )
        .unwrap();
        b
    }

    #[test]
    fn composes_scalar_and_jagged_factors() {
        let mut b = batch();
        let cfg = WeightConfig::from([(
            "eventWeight".to_string(),
            vec!["genWeight".to_string(), "pileupWeight".to_string(), "Electron.sf_id".to_string()],
        )]);
        make_weight_fields(&mut b, &cfg, &[]).unwrap();
        let w = b.f64s("eventWeight").unwrap();
        // Event 0: 2.0 * 1.1 * (0.9 * 0.8); event 1: -1.0 * 0.9 * 1.0 (empty product)
        approx::assert_relative_eq!(w[0], 2.0 * 1.1 * 0.72, epsilon = 1e-12);
        approx::assert_relative_eq!(w[1], -0.9, epsilon = 1e-12);
    }

    #[test]
    fn banned_and_missing_factors_are_skipped() {
        let mut b = batch();
        let cfg = WeightConfig::from([(
            "eventWeight".to_string(),
            vec!["genWeight".to_string(), "pileupWeight".to_string(), "doesNotExist".to_string()],
        )]);
        make_weight_fields(&mut b, &cfg, &["pileupWeight".to_string()]).unwrap();
        assert_eq!(b.f64s("eventWeight").unwrap(), &[2.0, -1.0]);
    }

    #[test]
    fn empty_config_is_noop() {
        let mut b = batch();
        make_weight_fields(&mut b, &BTreeMap::new(), &[]).unwrap();
        assert!(!b.has_scalar("eventWeight"));
    }
}
