//! Model files
//!
//! A model file selects a registered builder and may pin parameter values
//! and build settings:
//!
//! ```ron
//! (
//!     builder: "plate",
//!     parameters: {"PLATE_THICKNESS_MM": "4"},
//! )
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::params::MapSource;
use crate::settings::BuildSettings;

/// A pinned parameter value as written in a model file
///
/// Numbers are accepted for convenience and coerced like any other
/// override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PinnedValue {
    Text(String),
    Int(i64),
    Float(f64),
}

impl PinnedValue {
    /// Raw override text
    pub fn to_override(&self) -> String {
        match self {
            PinnedValue::Text(v) => v.clone(),
            PinnedValue::Int(v) => v.to_string(),
            // keep the fraction so `2.0` never passes as an integer
            PinnedValue::Float(v) => format!("{:?}", v),
        }
    }
}

/// Contents of a model file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFile {
    /// Registered builder name
    pub builder: String,
    #[serde(default)]
    pub parameters: BTreeMap<String, PinnedValue>,
    #[serde(default)]
    pub settings: Option<BuildSettings>,
}

impl ModelFile {
    pub fn new(builder: impl Into<String>) -> Self {
        Self {
            builder: builder.into(),
            parameters: BTreeMap::new(),
            settings: None,
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: PinnedValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Load and parse a model file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelFileError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| ModelFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&content, path)
    }

    /// Parse model file contents; `path` is only used in errors
    pub fn parse(content: &str, path: &Path) -> Result<Self, ModelFileError> {
        ron::from_str(content).map_err(|e| ModelFileError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Save as pretty-printed RON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelFileError> {
        let path = path.as_ref();
        let content = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ModelFileError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        std::fs::write(path, content).map_err(|e| ModelFileError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Pinned parameters as an override layer
    pub fn overrides(&self) -> MapSource {
        self.parameters
            .iter()
            .fold(MapSource::new("model file"), |source, (k, v)| {
                source.with(k.clone(), v.to_override())
            })
    }
}

/// Model file errors
#[derive(Debug, thiserror::Error)]
pub enum ModelFileError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid model file {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
}
