//! Catalog settings, deserialized from JSON with path-qualified errors.

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::catalog::DEFAULT_COMMENT_MARKER;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// canonical name → extra spellings, added on top of the builtin ones
    pub aliases: IndexMap<String, Vec<String>>,
    /// Text that starts a trailing comment after a type spec.
    pub comment_marker: String,
    /// Treat capitalized names as forward references to record types.
    pub custom_types: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            aliases: IndexMap::new(),
            comment_marker: DEFAULT_COMMENT_MARKER.to_string(),
            custom_types: true,
        }
    }
}

impl Config {
    pub fn from_json_str(src: &str) -> Result<Self> {
        let config: Config = from_str_with_path(src)?;
        if config.comment_marker.trim().is_empty() {
            return Err(Error::Config {
                path: "comment_marker".into(),
                message: "must not be empty".into(),
            });
        }
        Ok(config)
    }
}

/// Deserialize with JSON-path context in error messages.
pub fn from_str_with_path<T: DeserializeOwned>(src: &str) -> Result<T> {
    let de = &mut serde_json::Deserializer::from_str(src);
    serde_path_to_error::deserialize::<_, T>(de).map_err(|err| Error::Config {
        path: err.path().to_string(),
        message: err.into_inner().to_string(),
    })
}
