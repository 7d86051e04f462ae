//! Hierarchical keyed stores for persisted parameters.
//!
//! A store maps slash-separated paths (`unit/param_0/value`) to typed values. The
//! parameter registry only relies on the [`KeyedStore`] contract; backends decide where
//! the values end up.

pub mod memory;
pub mod redb;

pub use self::memory::MemoryStore;
pub use self::redb::RedbStore;

use serde::{Deserialize, Serialize};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Store error types.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Backend error.
    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e.to_string())
    }
}

/// A value stored under one path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum StoreValue {
    UInt(u64),
    Float(#[serde(with = "float")] f64),
    Bool(bool),
    Text(String),
    UInts(Vec<u64>),
    Floats(#[serde(with = "floats")] Vec<f64>),
    Texts(Vec<String>),
}

/// Floats as JSON numbers, with non-finite values spelled `"inf"`, `"-inf"` and `"nan"`.
mod float {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Named(String),
        Null(()),
    }

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else if value.is_nan() {
            serializer.serialize_str("nan")
        } else if value.is_sign_positive() {
            serializer.serialize_str("inf")
        } else {
            serializer.serialize_str("-inf")
        }
    }

    // Unknown names and `null` (written by older builds for non-finite values) read as NaN.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(match Repr::deserialize(deserializer)? {
            Repr::Number(v) => v,
            Repr::Named(name) => match name.as_str() {
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                _ => f64::NAN,
            },
            Repr::Null(()) => f64::NAN,
        })
    }
}

mod floats {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    struct Float(#[serde(with = "super::float")] f64);

    pub fn serialize<S: Serializer>(values: &[f64], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(values.iter().map(|v| Float(*v)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<f64>, D::Error> {
        let values = Vec::<Float>::deserialize(deserializer)?;
        Ok(values.into_iter().map(|Float(v)| v).collect())
    }
}

impl From<Vec<u64>> for StoreValue {
    fn from(v: Vec<u64>) -> Self {
        StoreValue::UInts(v)
    }
}

impl From<Vec<f64>> for StoreValue {
    fn from(v: Vec<f64>) -> Self {
        StoreValue::Floats(v)
    }
}

impl From<Vec<String>> for StoreValue {
    fn from(v: Vec<String>) -> Self {
        StoreValue::Texts(v)
    }
}

/// Join a store path with a child name.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() {
        return name.to_string();
    }
    let mut path = String::with_capacity(base.len() + name.len() + 1);
    path.push_str(base.trim_end_matches('/'));
    path.push('/');
    path.push_str(name);
    path
}

/// Core keyed store trait.
///
/// Typed readers return `None` both for a missing path and for a value of another type,
/// so loaders can fall back to defaults for fields an older format did not write.
pub trait KeyedStore {
    /// Write a value, replacing any previous value at `path`.
    fn write(&mut self, path: &str, value: StoreValue) -> Result<()>;

    /// Read the value at `path`.
    fn read(&self, path: &str) -> Result<Option<StoreValue>>;

    fn write_u64(&mut self, path: &str, value: u64) -> Result<()> {
        self.write(path, StoreValue::UInt(value))
    }

    fn write_f64(&mut self, path: &str, value: f64) -> Result<()> {
        self.write(path, StoreValue::Float(value))
    }

    fn write_bool(&mut self, path: &str, value: bool) -> Result<()> {
        self.write(path, StoreValue::Bool(value))
    }

    fn write_text(&mut self, path: &str, value: &str) -> Result<()> {
        self.write(path, StoreValue::Text(value.to_string()))
    }

    fn read_u64(&self, path: &str) -> Result<Option<u64>> {
        Ok(match self.read(path)? {
            Some(StoreValue::UInt(v)) => Some(v),
            _ => None,
        })
    }

    fn read_f64(&self, path: &str) -> Result<Option<f64>> {
        Ok(match self.read(path)? {
            Some(StoreValue::Float(v)) => Some(v),
            _ => None,
        })
    }

    fn read_bool(&self, path: &str) -> Result<Option<bool>> {
        Ok(match self.read(path)? {
            Some(StoreValue::Bool(v)) => Some(v),
            _ => None,
        })
    }

    fn read_text(&self, path: &str) -> Result<Option<String>> {
        Ok(match self.read(path)? {
            Some(StoreValue::Text(v)) => Some(v),
            _ => None,
        })
    }

    fn read_u64s(&self, path: &str) -> Result<Option<Vec<u64>>> {
        Ok(match self.read(path)? {
            Some(StoreValue::UInts(v)) => Some(v),
            _ => None,
        })
    }

    fn read_f64s(&self, path: &str) -> Result<Option<Vec<f64>>> {
        Ok(match self.read(path)? {
            Some(StoreValue::Floats(v)) => Some(v),
            _ => None,
        })
    }

    fn read_texts(&self, path: &str) -> Result<Option<Vec<String>>> {
        Ok(match self.read(path)? {
            Some(StoreValue::Texts(v)) => Some(v),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_paths() {
        assert_eq!(join("", "a"), "a");
        assert_eq!(join("unit", "a"), "unit/a");
        assert_eq!(join("unit/", "a"), "unit/a");
        assert_eq!(join(&join("unit", "param_0"), "value"), "unit/param_0/value");
    }

    #[test]
    fn test_typed_reads_ignore_other_types() {
        let mut store = MemoryStore::new();
        store.write_f64("x", 1.5).unwrap();
        assert_eq!(store.read_f64("x").unwrap(), Some(1.5));
        assert_eq!(store.read_u64("x").unwrap(), None);
        assert_eq!(store.read_text("missing").unwrap(), None);
    }

    #[test]
    fn test_store_value_json_shape() {
        let json = serde_json::to_string(&StoreValue::UInt(3)).unwrap();
        assert_eq!(json, r#"{"type":"u_int","value":3}"#);

        let json = serde_json::to_string(&StoreValue::Floats(vec![1.5, f64::NEG_INFINITY])).unwrap();
        assert_eq!(json, r#"{"type":"floats","value":[1.5,"-inf"]}"#);
    }

    #[test]
    fn test_floats_survive_json_exactly() {
        let values = vec![
            985.6906946328695,
            1.079907802215119e-66,
            0.1 + 0.2,
            f64::MIN_POSITIVE,
            f64::MAX,
            -0.0,
            f64::INFINITY,
            f64::NEG_INFINITY,
        ];
        for &v in &values {
            let json = serde_json::to_string(&StoreValue::Float(v)).unwrap();
            let back: StoreValue = serde_json::from_str(&json).unwrap();
            let StoreValue::Float(back) = back else {
                panic!("expected a float, got {back:?}");
            };
            assert_eq!(back.to_bits(), v.to_bits(), "{json}");
        }

        let json = serde_json::to_string(&StoreValue::Floats(values.clone())).unwrap();
        let back: StoreValue = serde_json::from_str(&json).unwrap();
        assert_eq!(back, StoreValue::Floats(values));
    }

    #[test]
    fn test_nan_and_null_floats_read_as_nan() {
        let json = serde_json::to_string(&StoreValue::Float(f64::NAN)).unwrap();
        assert_eq!(json, r#"{"type":"float","value":"nan"}"#);
        let back: StoreValue = serde_json::from_str(&json).unwrap();
        assert!(matches!(back, StoreValue::Float(v) if v.is_nan()));

        let back: StoreValue = serde_json::from_str(r#"{"type":"float","value":null}"#).unwrap();
        assert!(matches!(back, StoreValue::Float(v) if v.is_nan()));
        let back: StoreValue = serde_json::from_str(r#"{"type":"floats","value":[null,2.0]}"#).unwrap();
        assert!(matches!(back, StoreValue::Floats(v) if v[0].is_nan() && v[1] == 2.0));
    }
}
