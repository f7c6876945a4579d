//! Write-once named-mask registry (packed selection store).

use std::collections::HashMap;

use ms_columnar::Mask;
use ms_core::{Error, Result};

/// Named boolean masks over one event batch, combinable by conjunction.
///
/// Keys are write-once: a second `add` under the same key is a logic error
/// (two distinct cuts must never share a label) and fails with
/// [`Error::DuplicateKey`]. The batch length is fixed by the first mask
/// added; every later mask must match it.
#[derive(Debug, Default)]
pub struct SelectionRegistry {
    n_events: Option<usize>,
    names: Vec<String>,
    masks: Vec<Mask>,
    name_to_index: HashMap<String, usize>,
}

impl SelectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch length, once fixed by the first `add`.
    pub fn n_events(&self) -> Option<usize> {
        self.n_events
    }

    /// Registered mask keys in insertion order.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Whether a key is registered.
    pub fn contains(&self, key: &str) -> bool {
        self.name_to_index.contains_key(key)
    }

    /// Register a mask under a new unique key.
    pub fn add(&mut self, key: &str, mask: Mask) -> Result<()> {
        if self.contains(key) {
            return Err(Error::DuplicateKey(key.to_string()));
        }
        match self.n_events {
            Some(n) if n != mask.len() => {
                return Err(Error::LengthMismatch {
                    name: key.to_string(),
                    expected: n,
                    got: mask.len(),
                });
            }
            None => self.n_events = Some(mask.len()),
            _ => {}
        }
        self.name_to_index.insert(key.to_string(), self.masks.len());
        self.names.push(key.to_string());
        self.masks.push(mask);
        Ok(())
    }

    /// Mask registered under `key`.
    pub fn get(&self, key: &str) -> Result<&Mask> {
        self.name_to_index
            .get(key)
            .map(|&idx| &self.masks[idx])
            .ok_or_else(|| Error::UnknownKey(key.to_string()))
    }

    /// Conjunction (logical AND) of the masks registered under `keys`.
    pub fn all<S: AsRef<str>>(&self, keys: &[S]) -> Result<Mask> {
        let first = keys
            .first()
            .ok_or_else(|| Error::Config("registry conjunction over zero keys".into()))?;
        let mut out = self.get(first.as_ref())?.clone();
        for key in &keys[1..] {
            out.and_assign(self.get(key.as_ref())?);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_conjoin() {
        let mut reg = SelectionRegistry::new();
        reg.add("a", Mask::from_bools(&[true, true, false])).unwrap();
        reg.add("b", Mask::from_bools(&[true, false, true])).unwrap();
        let both = reg.all(&["a", "b"]).unwrap();
        assert_eq!(both.to_bools(), vec![true, false, false]);
        // Order is irrelevant for AND.
        assert_eq!(reg.all(&["b", "a"]).unwrap(), both);
    }

    #[test]
    fn duplicate_key_is_fatal() {
        let mut reg = SelectionRegistry::new();
        reg.add("cut", Mask::trues(2)).unwrap();
        let err = reg.add("cut", Mask::trues(2)).unwrap_err();
        assert!(matches!(err, Error::DuplicateKey(k) if k == "cut"));
    }

    #[test]
    fn unknown_key_is_fatal() {
        let mut reg = SelectionRegistry::new();
        reg.add("cut", Mask::trues(2)).unwrap();
        let err = reg.all(&["cut", "nope"]).unwrap_err();
        assert!(matches!(err, Error::UnknownKey(k) if k == "nope"));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut reg = SelectionRegistry::new();
        reg.add("a", Mask::trues(3)).unwrap();
        let err = reg.add("b", Mask::trues(4)).unwrap_err();
        assert!(matches!(err, Error::LengthMismatch { expected: 3, got: 4, .. }));
    }

    #[test]
    fn empty_conjunction_rejected() {
        let reg = SelectionRegistry::new();
        assert!(reg.all::<&str>(&[]).is_err());
    }
}
