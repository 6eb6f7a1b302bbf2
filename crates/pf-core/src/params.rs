//! Parameter resolution
//!
//! Every model declares its parameters once as a static slice of
//! [`ParamDecl`]. [`resolve`] merges those defaults with an
//! [`OverrideSource`], coercing each override to the type of its default.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Primitive type of a parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamKind {
    Float,
    Int,
    Text,
}

impl fmt::Display for ParamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKind::Float => write!(f, "float"),
            ParamKind::Int => write!(f, "int"),
            ParamKind::Text => write!(f, "string"),
        }
    }
}

/// A resolved parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Text(String),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Text(_) => ParamKind::Text,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Float(v) => write!(f, "{}", v),
            ParamValue::Int(v) => write!(f, "{}", v),
            ParamValue::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Declared default of a parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamDefault {
    Float(f64),
    Int(i64),
    Text(&'static str),
}

impl ParamDefault {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamDefault::Float(_) => ParamKind::Float,
            ParamDefault::Int(_) => ParamKind::Int,
            ParamDefault::Text(_) => ParamKind::Text,
        }
    }

    pub fn value(&self) -> ParamValue {
        match *self {
            ParamDefault::Float(v) => ParamValue::Float(v),
            ParamDefault::Int(v) => ParamValue::Int(v),
            ParamDefault::Text(v) => ParamValue::Text(v.to_string()),
        }
    }
}

/// A named parameter with its default
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamDecl {
    pub key: &'static str,
    pub default: ParamDefault,
    pub description: &'static str,
}

impl ParamDecl {
    pub const fn float(key: &'static str, default: f64, description: &'static str) -> Self {
        Self {
            key,
            default: ParamDefault::Float(default),
            description,
        }
    }

    pub const fn int(key: &'static str, default: i64, description: &'static str) -> Self {
        Self {
            key,
            default: ParamDefault::Int(default),
            description,
        }
    }

    pub const fn text(key: &'static str, default: &'static str, description: &'static str) -> Self {
        Self {
            key,
            default: ParamDefault::Text(default),
            description,
        }
    }

    /// Parse a raw override as the type of this declaration's default
    pub fn coerce(&self, raw: &str) -> Result<ParamValue, ParamError> {
        let coercion = || ParamError::Coercion {
            key: self.key.to_string(),
            value: raw.to_string(),
            expected: self.default.kind(),
        };
        match self.default {
            ParamDefault::Float(_) => parse_float(self.key, raw).map(ParamValue::Float),
            ParamDefault::Int(_) => raw
                .trim()
                .parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| coercion()),
            ParamDefault::Text(_) => Ok(ParamValue::Text(raw.to_string())),
        }
    }
}

/// Parse a finite float override for `key`
pub fn parse_float(key: &str, raw: &str) -> Result<f64, ParamError> {
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(ParamError::Coercion {
            key: key.to_string(),
            value: raw.to_string(),
            expected: ParamKind::Float,
        }),
    }
}

/// Parameter-related errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("parameter {key}: cannot parse '{value}' as {expected}")]
    Coercion {
        key: String,
        value: String,
        expected: ParamKind,
    },
    #[error("unknown parameter {0}")]
    UnknownKey(String),
    #[error("parameter {key} is {actual}, not {expected}")]
    TypeMismatch {
        key: String,
        expected: ParamKind,
        actual: ParamKind,
    },
    #[error("parameter {key}: {reason}")]
    Invalid { key: String, reason: String },
}

/// A source of raw override strings, looked up by parameter key
pub trait OverrideSource {
    /// Short name used in log output
    fn name(&self) -> &str;

    fn lookup(&self, key: &str) -> Option<String>;
}

impl<T: OverrideSource + ?Sized> OverrideSource for &T {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn lookup(&self, key: &str) -> Option<String> {
        (**self).lookup(key)
    }
}

/// Overrides from the process environment
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvSource;

impl OverrideSource for EnvSource {
    fn name(&self) -> &str {
        "env"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Overrides from an explicit map
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapSource {
    name: String,
    values: BTreeMap<String, String>,
}

impl MapSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }
}

impl OverrideSource for MapSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }
}

/// Ordered stack of sources; the first one holding a key wins
#[derive(Default)]
pub struct Layered<'a> {
    layers: Vec<Box<dyn OverrideSource + 'a>>,
}

impl<'a> Layered<'a> {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    /// Add a source below the existing ones
    pub fn with(mut self, source: impl OverrideSource + 'a) -> Self {
        self.layers.push(Box::new(source));
        self
    }

    /// Name of the layer that provides `key`, if any
    pub fn provider(&self, key: &str) -> Option<&str> {
        self.layers
            .iter()
            .find(|layer| layer.lookup(key).is_some())
            .map(|layer| layer.name())
    }
}

impl OverrideSource for Layered<'_> {
    fn name(&self) -> &str {
        "layered"
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.layers.iter().find_map(|layer| layer.lookup(key))
    }
}

/// Resolved parameters of one model invocation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParameterSet {
    values: BTreeMap<String, ParamValue>,
}

impl ParameterSet {
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn value(&self, key: &str) -> Result<&ParamValue, ParamError> {
        self.values
            .get(key)
            .ok_or_else(|| ParamError::UnknownKey(key.to_string()))
    }

    fn mismatch(key: &str, expected: ParamKind, actual: &ParamValue) -> ParamError {
        ParamError::TypeMismatch {
            key: key.to_string(),
            expected,
            actual: actual.kind(),
        }
    }

    pub fn float(&self, key: &str) -> Result<f64, ParamError> {
        match self.value(key)? {
            ParamValue::Float(v) => Ok(*v),
            other => Err(Self::mismatch(key, ParamKind::Float, other)),
        }
    }

    pub fn int(&self, key: &str) -> Result<i64, ParamError> {
        match self.value(key)? {
            ParamValue::Int(v) => Ok(*v),
            other => Err(Self::mismatch(key, ParamKind::Int, other)),
        }
    }

    pub fn text(&self, key: &str) -> Result<&str, ParamError> {
        match self.value(key)? {
            ParamValue::Text(v) => Ok(v),
            other => Err(Self::mismatch(key, ParamKind::Text, other)),
        }
    }

    /// Integer switch, on when non-zero
    pub fn flag(&self, key: &str) -> Result<bool, ParamError> {
        self.int(key).map(|v| v != 0)
    }

    /// Integer count, negative values read as zero
    pub fn count(&self, key: &str) -> Result<usize, ParamError> {
        self.int(key).map(|v| usize::try_from(v).unwrap_or(0))
    }
}

/// Merge declared defaults with overrides
///
/// The result holds exactly the declared keys. Each source is queried once
/// per key.
pub fn resolve(
    decls: &[ParamDecl],
    overrides: &dyn OverrideSource,
) -> Result<ParameterSet, ParamError> {
    let mut values = BTreeMap::new();
    for decl in decls {
        let value = match overrides.lookup(decl.key) {
            Some(raw) => {
                let value = decl.coerce(&raw)?;
                debug!(key = decl.key, value = %value, source = overrides.name(), "override applied");
                value
            }
            None => decl.default.value(),
        };
        values.insert(decl.key.to_string(), value);
    }
    Ok(ParameterSet { values })
}

/// Resolve declared defaults only
pub fn defaults(decls: &[ParamDecl]) -> ParameterSet {
    ParameterSet {
        values: decls
            .iter()
            .map(|d| (d.key.to_string(), d.default.value()))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECLS: &[ParamDecl] = &[
        ParamDecl::float("WIDTH_MM", 100.0, "width"),
        ParamDecl::int("COUNT", 4, "count"),
        ParamDecl::text("ORIENTATION", "horizontal", "orientation"),
    ];

    #[test]
    fn test_defaults_when_no_override() {
        let params = resolve(DECLS, &MapSource::default()).unwrap();
        assert_eq!(params.len(), 3);
        assert_eq!(params.float("WIDTH_MM").unwrap(), 100.0);
        assert_eq!(params.int("COUNT").unwrap(), 4);
        assert_eq!(params.text("ORIENTATION").unwrap(), "horizontal");
        assert_eq!(params, defaults(DECLS));
    }

    #[test]
    fn test_override_coerced_to_default_type() {
        let source = MapSource::new("test")
            .with("WIDTH_MM", "4")
            .with("COUNT", " 7 ")
            .with("ORIENTATION", " Vertical");
        let params = resolve(DECLS, &source).unwrap();
        assert_eq!(params.get("WIDTH_MM"), Some(&ParamValue::Float(4.0)));
        assert_eq!(params.int("COUNT").unwrap(), 7);
        assert_eq!(params.text("ORIENTATION").unwrap(), " Vertical");
    }

    #[test]
    fn test_malformed_override_is_an_error() {
        let source = MapSource::new("test").with("COUNT", "4.5");
        assert_eq!(
            resolve(DECLS, &source),
            Err(ParamError::Coercion {
                key: "COUNT".into(),
                value: "4.5".into(),
                expected: ParamKind::Int,
            })
        );

        let source = MapSource::new("test").with("WIDTH_MM", "wide");
        assert!(matches!(
            resolve(DECLS, &source),
            Err(ParamError::Coercion { expected: ParamKind::Float, .. })
        ));
    }

    #[test]
    fn test_non_finite_float_rejected() {
        for raw in ["inf", "NaN", "-infinity"] {
            let source = MapSource::new("test").with("WIDTH_MM", raw);
            assert!(resolve(DECLS, &source).is_err(), "{} accepted", raw);
        }
    }

    #[test]
    fn test_extra_override_keys_ignored() {
        let source = MapSource::new("test").with("UNRELATED", "1");
        let params = resolve(DECLS, &source).unwrap();
        assert!(!params.contains_key("UNRELATED"));
        assert_eq!(params.len(), DECLS.len());
    }

    #[test]
    fn test_layered_first_hit_wins() {
        let top = MapSource::new("env").with("COUNT", "9");
        let bottom = MapSource::new("file").with("COUNT", "2").with("WIDTH_MM", "12.5");
        let layered = Layered::new().with(top).with(bottom);

        assert_eq!(layered.provider("COUNT"), Some("env"));
        assert_eq!(layered.provider("WIDTH_MM"), Some("file"));
        assert_eq!(layered.provider("ORIENTATION"), None);

        let params = resolve(DECLS, &layered).unwrap();
        assert_eq!(params.int("COUNT").unwrap(), 9);
        assert_eq!(params.float("WIDTH_MM").unwrap(), 12.5);
    }

    #[test]
    fn test_env_source_misses_unset_keys() {
        assert_eq!(EnvSource.lookup("PF_TEST_SURELY_UNSET_8c1f2a"), None);
    }

    #[test]
    fn test_accessor_errors() {
        let params = defaults(DECLS);
        assert_eq!(
            params.float("MISSING"),
            Err(ParamError::UnknownKey("MISSING".into()))
        );
        assert!(matches!(
            params.float("COUNT"),
            Err(ParamError::TypeMismatch { expected: ParamKind::Float, actual: ParamKind::Int, .. })
        ));
        assert!(params.flag("COUNT").unwrap());
        assert_eq!(params.count("COUNT").unwrap(), 4);
    }

    #[test]
    fn test_serializes_as_flat_map() {
        let decls = &[
            ParamDecl::float("WIDTH_MM", 120.0, ""),
            ParamDecl::int("COUNT", 3, ""),
        ];
        let params = resolve(decls, &MapSource::default()).unwrap();
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json, serde_json::json!({"COUNT": 3, "WIDTH_MM": 120.0}));
    }

    #[test]
    fn test_negative_count_reads_as_zero() {
        let params = resolve(DECLS, &MapSource::new("test").with("COUNT", "-3")).unwrap();
        assert_eq!(params.int("COUNT").unwrap(), -3);
        assert_eq!(params.count("COUNT").unwrap(), 0);
        assert!(params.flag("COUNT").unwrap());
    }
}
