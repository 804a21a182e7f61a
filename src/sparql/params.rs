//! Caller parameters and their validation.
//!
//! Every template declares the parameters it reads as [`ParamSpec`]s.
//! [`validate`] is the gate between caller input and the template builders:
//! nothing reaches a query without passing its type check.

use std::collections::HashMap;
use std::fmt::Write;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A caller-supplied parameter value, tagged by how the caller sent it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Param {
    Text(String),
    /// Raw numeric text, validated against the template's spec.
    Numeric(String),
}

impl Param {
    pub fn raw(&self) -> &str {
        match self {
            Param::Text(s) | Param::Numeric(s) => s,
        }
    }
}

impl From<&str> for Param { fn from(v: &str) -> Self { Param::Text(v.to_owned()) } }
impl From<String> for Param { fn from(v: String) -> Self { Param::Text(v) } }
impl From<f64> for Param { fn from(v: f64) -> Self { Param::Numeric(v.to_string()) } }
impl From<i64> for Param { fn from(v: i64) -> Self { Param::Numeric(v.to_string()) } }
impl From<i32> for Param { fn from(v: i32) -> Self { Param::Numeric(v.to_string()) } }

/// Parameters keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamSet {
    values: HashMap<String, Param>,
}

impl ParamSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Param>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Numeric parameter given as raw text (e.g. straight from a query string).
    pub fn numeric(mut self, name: impl Into<String>, raw: impl Into<String>) -> Self {
        self.values.insert(name.into(), Param::Numeric(raw.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Param> {
        self.values.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Log-safe rendering: sorted keys, control characters escaped,
    /// values truncated to 64 characters.
    pub fn sanitized(&self) -> String {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        let mut out = String::from("{");
        for (i, key) in keys.into_iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let raw = self.values[key].raw();
            let mut shown: String = raw.chars().take(64).collect();
            if raw.chars().count() > 64 {
                shown.push('…');
            }
            let _ = write!(out, "{}={}", key.escape_debug(), shown.escape_debug());
        }
        out.push('}');
        out
    }
}

/// How a template reads a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// Non-empty text; escaped when rendered.
    Text,
    /// Finite number.
    Numeric,
}

/// Declaration of one template parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub kind: ParamKind,
    /// Used when the caller omits the parameter. Numeric only.
    pub default: Option<f64>,
}

impl ParamSpec {
    pub const fn text(name: &'static str) -> Self {
        Self { name, kind: ParamKind::Text, default: None }
    }

    pub const fn numeric(name: &'static str, default: Option<f64>) -> Self {
        Self { name, kind: ParamKind::Numeric, default }
    }
}

/// Parameters that passed validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedParams {
    text: HashMap<&'static str, String>,
    numbers: HashMap<&'static str, f64>,
}

impl ValidatedParams {
    pub fn text(&self, name: &str) -> Result<&str> {
        self.text
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| Error::Template(format!("text parameter '{name}' was not declared")))
    }

    pub fn number(&self, name: &str) -> Result<f64> {
        self.numbers
            .get(name)
            .copied()
            .ok_or_else(|| Error::Template(format!("numeric parameter '{name}' was not declared")))
    }
}

fn rejected(parameter: &str, reason: impl Into<String>) -> Error {
    Error::ParameterValidation {
        parameter: parameter.to_owned(),
        reason: reason.into(),
    }
}

/// Parse a numeric parameter. Rejects anything that is not a finite number.
pub fn parse_number(name: &str, raw: &str) -> Result<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(rejected(name, "expected a number, got an empty value"));
    }
    match trimmed.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(n),
        Ok(_) => Err(rejected(name, format!("'{}' is not a finite number", raw.escape_debug()))),
        Err(_) => Err(rejected(name, format!("'{}' is not a number", raw.escape_debug()))),
    }
}

/// Check `params` against `specs`. Parameters not named in `specs` are ignored.
pub fn validate(specs: &[ParamSpec], params: &ParamSet) -> Result<ValidatedParams> {
    let mut out = ValidatedParams::default();
    for spec in specs {
        match (spec.kind, params.get(spec.name)) {
            (ParamKind::Text, Some(p)) => {
                let raw = p.raw();
                if raw.trim().is_empty() {
                    return Err(rejected(spec.name, "must not be empty"));
                }
                out.text.insert(spec.name, raw.to_owned());
            }
            (ParamKind::Text, None) => {
                return Err(rejected(spec.name, "is required"));
            }
            (ParamKind::Numeric, Some(p)) => {
                out.numbers.insert(spec.name, parse_number(spec.name, p.raw())?);
            }
            (ParamKind::Numeric, None) => match spec.default {
                Some(d) => { out.numbers.insert(spec.name, d); }
                None => return Err(rejected(spec.name, "is required")),
            },
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPECS: &[ParamSpec] = &[
        ParamSpec::text("disease"),
        ParamSpec::numeric("max_score", Some(10.0)),
    ];

    #[test]
    fn test_accepts_valid_and_applies_default() {
        let p = ParamSet::new().with("disease", "Diabète");
        let v = validate(SPECS, &p).unwrap();
        assert_eq!(v.text("disease").unwrap(), "Diabète");
        assert_eq!(v.number("max_score").unwrap(), 10.0);
    }

    #[test]
    fn test_numeric_text_is_parsed() {
        let p = ParamSet::new().with("disease", "x").with("max_score", " 7.5 ");
        assert_eq!(validate(SPECS, &p).unwrap().number("max_score").unwrap(), 7.5);
    }

    #[test]
    fn test_rejects_non_numeric() {
        let p = ParamSet::new().with("disease", "x").numeric("max_score", "5; DROP");
        match validate(SPECS, &p) {
            Err(Error::ParameterValidation { parameter, .. }) => assert_eq!(parameter, "max_score"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_non_finite() {
        for raw in ["NaN", "inf", "-Infinity", ""] {
            let p = ParamSet::new().with("disease", "x").numeric("max_score", raw);
            assert!(validate(SPECS, &p).unwrap_err().is_validation(), "{raw}");
        }
    }

    #[test]
    fn test_rejects_empty_identifier() {
        let p = ParamSet::new().with("disease", "   ");
        assert!(validate(SPECS, &p).unwrap_err().is_validation());
        assert!(validate(SPECS, &ParamSet::new()).unwrap_err().is_validation());
    }

    #[test]
    fn test_sanitized_escapes_and_truncates() {
        let long = "a".repeat(100);
        let p = ParamSet::new().with("b", "x\ny").with("a", long.as_str());
        let s = p.sanitized();
        assert!(s.starts_with("{a="));
        assert!(s.contains("…"));
        assert!(s.contains("b=x\\ny"));
        assert!(!s.contains('\n'));
    }
}
