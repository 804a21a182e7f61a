//! One typed result row, plus any derived fields.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::Value;
use crate::{Error, Result};

/// A typed result row: variable name → value.
///
/// Unbound optional variables are present as `Value::Null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub values: HashMap<String, Value>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw access. Missing keys read as `Null`.
    pub fn value(&self, key: &str) -> &Value {
        const NULL: Value = Value::Null;
        self.values.get(key).unwrap_or(&NULL)
    }

    /// Get a typed value from the record.
    pub fn get<T: FromValue>(&self, key: &str) -> Result<T> {
        let val = self.values.get(key)
            .ok_or_else(|| Error::NotFound(format!("Column '{key}'")))?;
        T::from_value(val)
    }

    /// Get a typed value, mapping `Null` (unbound optional) to `None`.
    pub fn get_opt<T: FromValue>(&self, key: &str) -> Result<Option<T>> {
        match self.values.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(v) => T::from_value(v).map(Some),
        }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self { values: iter.into_iter().collect() }
    }
}

/// Convert from Value to concrete types.
pub trait FromValue: Sized {
    fn from_value(val: &Value) -> Result<Self>;
}

fn type_error(expected: &str, val: &Value) -> Error {
    Error::TypeError {
        expected: expected.into(),
        got: val.type_name().into(),
    }
}

impl FromValue for String {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_str().map(str::to_owned).ok_or_else(|| type_error("String", val))
    }
}

impl FromValue for i64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_int().ok_or_else(|| type_error("Integer", val))
    }
}

impl FromValue for f64 {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_float().ok_or_else(|| type_error("Float", val))
    }
}

impl FromValue for bool {
    fn from_value(val: &Value) -> Result<Self> {
        val.as_bool().ok_or_else(|| type_error("Boolean", val))
    }
}

impl FromValue for NaiveDate {
    fn from_value(val: &Value) -> Result<Self> {
        match val {
            Value::Date(d) => Ok(*d),
            _ => Err(type_error("Date", val)),
        }
    }
}

impl FromValue for Value {
    fn from_value(val: &Value) -> Result<Self> {
        Ok(val.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_typed() {
        let r = Record::new().with("score", 0.8).with("name", "Marche");
        let score: f64 = r.get("score").unwrap();
        assert_eq!(score, 0.8);
        let name: String = r.get("name").unwrap();
        assert_eq!(name, "Marche");
    }

    #[test]
    fn test_null_reads_as_none() {
        let r = Record::new().with("cout", Value::Null);
        assert_eq!(r.get_opt::<f64>("cout").unwrap(), None);
        assert_eq!(r.get_opt::<f64>("missing").unwrap(), None);
        assert!(r.value("missing").is_null());
    }

    #[test]
    fn test_type_mismatch() {
        let r = Record::new().with("score", "high");
        assert!(matches!(r.get::<f64>("score"), Err(Error::TypeError { .. })));
    }
}
