//! Flat key/value parameter lists for preconditioner setup.
//!
//! Keys are free-form strings such as `"refmaxwell: max levels"`; values are booleans, integers,
//! doubles, strings or nested lists. In TOML the keys need quoting:
//!
//! ```toml
//! "preconditioner: type" = "refmaxwell"
//! "refmaxwell: max coarse size" = 25
//!
//! ["refmaxwell: 11 list"]
//! "smoother: type" = "CHEBYSHEV"
//! ```

use crate::error::KError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
    List(ParameterList),
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}
impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}
impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}
impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Double(v)
    }
}
impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Str(v.to_string())
    }
}
impl From<String> for ParamValue {
    fn from(v: String) -> Self {
        ParamValue::Str(v)
    }
}
impl From<ParameterList> for ParamValue {
    fn from(v: ParameterList) -> Self {
        ParamValue::List(v)
    }
}

impl ParamValue {
    fn kind(&self) -> &'static str {
        match self {
            ParamValue::Bool(_) => "bool",
            ParamValue::Int(_) => "int",
            ParamValue::Double(_) => "double",
            ParamValue::Str(_) => "string",
            ParamValue::List(_) => "list",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterList {
    entries: BTreeMap<String, ParamValue>,
}

impl ParameterList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, KError> {
        Self::parse(text, Path::new("<string>"))
    }

    pub fn from_file(path: &Path) -> Result<Self, KError> {
        let text = std::fs::read_to_string(path).map_err(|source| KError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    fn parse(text: &str, path: &Path) -> Result<Self, KError> {
        toml::from_str(text).map_err(|e| KError::Parse {
            path: path.to_path_buf(),
            line: e.span().map(|s| text[..s.start].matches('\n').count() + 1).unwrap_or(0),
            msg: e.message().to_string(),
        })
    }

    /// Inserts or replaces `key`; returns `self` for chaining.
    pub fn set(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    fn wrong_type(key: &str, want: &str, got: &ParamValue) -> KError {
        KError::invalid(key, format!("expected {want}, found {}", got.kind()))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, KError> {
        match self.get(key) {
            None => Ok(default),
            Some(ParamValue::Bool(b)) => Ok(*b),
            Some(v) => Err(Self::wrong_type(key, "bool", v)),
        }
    }

    pub fn get_usize(&self, key: &str, default: usize) -> Result<usize, KError> {
        match self.get(key) {
            None => Ok(default),
            Some(ParamValue::Int(i)) if *i >= 0 => Ok(*i as usize),
            Some(ParamValue::Int(i)) => Err(KError::invalid(key, format!("must be non-negative, got {i}"))),
            Some(v) => Err(Self::wrong_type(key, "int", v)),
        }
    }

    /// Doubles also accept integer values.
    pub fn get_f64(&self, key: &str, default: f64) -> Result<f64, KError> {
        match self.get(key) {
            None => Ok(default),
            Some(ParamValue::Double(d)) => Ok(*d),
            Some(ParamValue::Int(i)) => Ok(*i as f64),
            Some(v) => Err(Self::wrong_type(key, "double", v)),
        }
    }

    pub fn get_str<'a>(&'a self, key: &str, default: &'a str) -> Result<&'a str, KError> {
        match self.get(key) {
            None => Ok(default),
            Some(ParamValue::Str(s)) => Ok(s.as_str()),
            Some(v) => Err(Self::wrong_type(key, "string", v)),
        }
    }

    /// Nested list under `key`, or an empty list when absent.
    pub fn sublist(&self, key: &str) -> Result<ParameterList, KError> {
        match self.get(key) {
            None => Ok(ParameterList::new()),
            Some(ParamValue::List(l)) => Ok(l.clone()),
            Some(v) => Err(Self::wrong_type(key, "list", v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_getters_and_defaults() {
        let mut p = ParameterList::new();
        p.set("refmaxwell: max levels", 4usize)
            .set("chebyshev: ratio eigenvalue", 20i64)
            .set("refmaxwell: disable addon", true)
            .set("smoother: type", "CHEBYSHEV");
        assert_eq!(p.get_usize("refmaxwell: max levels", 10).unwrap(), 4);
        assert_eq!(p.get_f64("chebyshev: ratio eigenvalue", 30.0).unwrap(), 20.0);
        assert!(p.get_bool("refmaxwell: disable addon", false).unwrap());
        assert_eq!(p.get_str("smoother: type", "JACOBI").unwrap(), "CHEBYSHEV");
        assert_eq!(p.get_usize("missing", 7).unwrap(), 7);
        assert!(matches!(p.get_bool("smoother: type", false), Err(KError::InvalidParameter { .. })));
    }

    #[test]
    fn parses_toml_with_sublists() {
        let text = r#"
"preconditioner: type" = "refmaxwell"
"refmaxwell: max coarse size" = 25
"aggregation: drop tol" = 0.0

["refmaxwell: 11 list"]
"smoother: type" = "JACOBI"
"smoother: sweeps" = 2
"#;
        let p = ParameterList::from_toml_str(text).unwrap();
        assert_eq!(p.get_str("preconditioner: type", "none").unwrap(), "refmaxwell");
        assert_eq!(p.get_usize("refmaxwell: max coarse size", 0).unwrap(), 25);
        let sub = p.sublist("refmaxwell: 11 list").unwrap();
        assert_eq!(sub.get_usize("smoother: sweeps", 1).unwrap(), 2);
        assert!(p.sublist("refmaxwell: 22 list").unwrap().keys().next().is_none());
    }

    #[test]
    fn bad_toml_reports_line() {
        let err = ParameterList::from_toml_str("a = 1\nb = = 2\n").unwrap_err();
        match err {
            KError::Parse { line, .. } => assert_eq!(line, 2),
            other => panic!("unexpected {other:?}"),
        }
    }
}
