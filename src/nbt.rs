//! Typed value tree produced by decoding a BetterQuesting document.
//!
//! The tree mirrors the NBT tags the mod writes out. Accessors on
//! [`NbtCompound`] coerce between compatible shapes (bool and integers, int
//! and long, float and double) and return `None` for anything else, so
//! callers can apply their own defaults with `unwrap_or`.

use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NbtValue {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    List(Vec<NbtValue>),
    Compound(NbtCompound),
}

impl NbtValue {
    pub fn as_compound(&self) -> Option<&NbtCompound> {
        match self {
            NbtValue::Compound(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            NbtValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NbtValue::Long(n) => Some(*n),
            NbtValue::Int(n) => Some(i64::from(*n)),
            NbtValue::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NbtValue::Int(n) => Some(*n),
            NbtValue::Long(n) => i32::try_from(*n).ok(),
            NbtValue::Bool(b) => Some(i32::from(*b)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            NbtValue::Bool(b) => Some(*b),
            NbtValue::Int(n) => Some(*n != 0),
            NbtValue::Long(n) => Some(*n != 0),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NbtValue::Double(f) => Some(*f),
            NbtValue::Float(f) => Some(f64::from(*f)),
            _ => None,
        }
    }
}

/// A decoded object. Keys are the field names with their `:<type>` suffix
/// already stripped.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NbtCompound(BTreeMap<String, NbtValue>);

impl NbtCompound {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: NbtValue) -> Option<NbtValue> {
        self.0.insert(key.into(), value)
    }

    pub fn get(&self, key: &str) -> Option<&NbtValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &NbtValue)> {
        self.0.iter()
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(NbtValue::as_str)
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get_str(key).map(str::to_string)
    }

    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get(key).and_then(NbtValue::as_i32)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(NbtValue::as_i64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(NbtValue::as_bool)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(NbtValue::as_f64)
    }

    pub fn get_compound(&self, key: &str) -> Option<&NbtCompound> {
        self.get(key).and_then(NbtValue::as_compound)
    }

    pub fn get_list(&self, key: &str) -> Option<&[NbtValue]> {
        match self.get(key)? {
            NbtValue::List(values) => Some(values),
            _ => None,
        }
    }

    /// Walks nested compounds, e.g. `["properties", "betterquesting"]`.
    pub fn get_path(&self, path: &[&str]) -> Option<&NbtCompound> {
        path.iter()
            .try_fold(self, |compound, key| compound.get_compound(key))
    }

    /// Compounds contained in the list at `key`, skipping other shapes.
    pub fn compounds_in(&self, key: &str) -> impl Iterator<Item = &NbtCompound> {
        self.get_list(key)
            .unwrap_or_default()
            .iter()
            .filter_map(NbtValue::as_compound)
    }

    /// Compact JSON rendering of the compound, used to store item NBT blobs.
    pub fn to_json_string(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

impl FromIterator<(String, NbtValue)> for NbtCompound {
    fn from_iter<I: IntoIterator<Item = (String, NbtValue)>>(iter: I) -> Self {
        NbtCompound(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NbtCompound {
        let mut inner = NbtCompound::new();
        inner.insert("name", NbtValue::String("Stone Age".into()));
        let mut props = NbtCompound::new();
        props.insert("betterquesting", NbtValue::Compound(inner));

        let mut root = NbtCompound::new();
        root.insert("properties", NbtValue::Compound(props));
        root.insert("flag", NbtValue::Bool(true));
        root.insert("small", NbtValue::Int(7));
        root.insert("big", NbtValue::Long(i64::from(i32::MAX) + 1));
        root.insert("ratio", NbtValue::Float(0.5));
        root.insert(
            "list",
            NbtValue::List(vec![NbtValue::Int(1), NbtValue::Compound(NbtCompound::new())]),
        );
        root
    }

    #[test]
    fn widening_coercions() {
        let root = sample();
        assert_eq!(root.get_i64("small"), Some(7));
        assert_eq!(root.get_i32("flag"), Some(1));
        assert_eq!(root.get_bool("small"), Some(true));
        assert_eq!(root.get_f64("ratio"), Some(0.5));
        // does not fit in an i32
        assert_eq!(root.get_i32("big"), None);
        assert_eq!(root.get_i64("big"), Some(i64::from(i32::MAX) + 1));
    }

    #[test]
    fn incompatible_or_missing_is_none() {
        let root = sample();
        assert_eq!(root.get_str("small"), None);
        assert_eq!(root.get_i32("properties"), None);
        assert_eq!(root.get_bool("missing"), None);
        assert!(root.get_list("small").is_none());
        assert!(root.get_compound("list").is_none());
    }

    #[test]
    fn nested_path_and_list_compounds() {
        let root = sample();
        let bq = root
            .get_path(&["properties", "betterquesting"])
            .expect("nested compound");
        assert_eq!(bq.get_str("name"), Some("Stone Age"));
        assert!(root.get_path(&["properties", "nope"]).is_none());
        assert_eq!(root.compounds_in("list").count(), 1);
        assert_eq!(root.compounds_in("missing").count(), 0);
    }

    #[test]
    fn json_rendering_is_sorted_and_compact() {
        let mut c = NbtCompound::new();
        c.insert("b", NbtValue::Int(2));
        c.insert("a", NbtValue::String("x".into()));
        c.insert("n", NbtValue::Null);
        assert_eq!(c.to_json_string().unwrap(), r#"{"a":"x","b":2,"n":null}"#);
    }
}
