//! Client configuration.

use std::time::Duration;

use displaydoc::Display;
use schemars::gen::SchemaSettings;
use schemars::schema::RootSchema;
use schemars::JsonSchema;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::spec::PossibleTypes;

/// Configuration error.
#[derive(Debug, Error, Display)]
#[non_exhaustive]
pub enum ConfigurationError {
    /// {message}: {error}
    InvalidConfiguration {
        message: &'static str,
        error: String,
    },
}

/// The configuration of a [`QueryManager`](crate::QueryManager).
///
/// Can be created through `serde::Deserialize` from various formats, or
/// loaded from YAML with [`Configuration::from_yaml`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields, default)]
pub struct Configuration {
    /// Add `__typename` to every selection set below the root of queries
    /// before sending them, so that objects can be identified and fragments
    /// matched.
    pub add_typename: bool,

    /// Default for queries that don't say whether they accept partial results
    /// from the store.
    pub return_partial_data: bool,

    /// Default for queries that don't say whether they skip the store and
    /// always go to the network first.
    pub force_fetch: bool,

    /// Poll intervals shorter than this are raised to it.
    #[serde(with = "humantime_serde")]
    #[schemars(with = "String", default = "default_min_poll_interval")]
    pub min_poll_interval: Duration,

    /// The object types of each interface and union. While empty, a fragment
    /// whose type condition differs from the `__typename` of an object might
    /// still apply to it, so its fields are required when reading.
    pub possible_types: PossibleTypes,
}

fn default_min_poll_interval() -> Duration {
    Duration::from_millis(100)
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            add_typename: false,
            return_partial_data: false,
            force_fetch: false,
            min_poll_interval: default_min_poll_interval(),
            possible_types: PossibleTypes::default(),
        }
    }
}

impl Configuration {
    pub fn from_yaml(raw_yaml: &str) -> Result<Self, ConfigurationError> {
        if raw_yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw_yaml).map_err(|e| ConfigurationError::InvalidConfiguration {
            message: "failed to parse yaml",
            error: e.to_string(),
        })
    }

    /// The JSON schema of the configuration, for editors.
    pub fn json_schema() -> RootSchema {
        let settings = SchemaSettings::draft07().with(|s| {
            s.option_nullable = true;
            s.option_add_null_type = false;
            s.inline_subschemas = true;
        });
        settings.into_generator().into_root_schema_for::<Configuration>()
    }

    /// Clamps a requested poll interval to the configured minimum.
    pub(crate) fn poll_interval(&self, requested: Option<Duration>) -> Option<Duration> {
        requested.map(|interval| interval.max(self.min_poll_interval))
    }
}
