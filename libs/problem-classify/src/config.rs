//! Classifier configuration.
//!
//! Loaded leniently: a missing `problem` section yields the defaults, while a
//! present but invalid section is an error.

use std::path::Path;

use figment::Figment;
use figment::providers::{Env, Format, Yaml};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::customize::{MessageCatalogCustomizer, RequestIdCustomizer};
use crate::manager::DEFAULT_UNWRAP_LIMIT;
use crate::registry::{DuplicatePolicy, HandlerRegistry, HandlerRegistryBuilder};

/// Configuration section name.
pub const SECTION: &str = "problem";

/// Prefix of environment overrides, e.g. `PROBLEM_MESSAGES__ENABLED=false`.
pub const ENV_PREFIX: &str = "PROBLEM_";

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("invalid 'problem' config: {0}")]
    Invalid(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClassifierConfig {
    /// Maximum number of cause links followed when unwrapping a failure.
    pub unwrap_limit: usize,
    pub duplicate_policy: DuplicatePolicy,
    /// Map-channel key for the request id; `None` disables the customizer.
    pub request_id_key: Option<String>,
    /// Base URI for relative problem types.
    pub type_base_uri: Option<Url>,
    pub messages: MessagesConfig,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            unwrap_limit: DEFAULT_UNWRAP_LIMIT,
            duplicate_policy: DuplicatePolicy::default(),
            request_id_key: Some(RequestIdCustomizer::DEFAULT_KEY.to_owned()),
            type_base_uri: None,
            messages: MessagesConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MessagesConfig {
    pub enabled: bool,
    pub code_prefix: String,
    pub separator: String,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            code_prefix: MessageCatalogCustomizer::DEFAULT_CODE_PREFIX.to_owned(),
            separator: MessageCatalogCustomizer::DEFAULT_SEPARATOR.to_owned(),
        }
    }
}

impl ClassifierConfig {
    /// Extract the `problem` section, falling back to defaults when absent.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the section exists but does not
    /// deserialize.
    pub fn from_figment(figment: &Figment) -> Result<Self, ConfigError> {
        if figment.find_value(SECTION).is_err() {
            return Ok(Self::default());
        }
        figment
            .extract_inner(SECTION)
            .map_err(|e| ConfigError::Invalid(Box::new(e)))
    }

    /// A registry builder that applies the configured duplicate policy.
    #[must_use]
    pub fn registry_builder(&self) -> HandlerRegistryBuilder {
        HandlerRegistry::builder().duplicate_policy(self.duplicate_policy)
    }

    /// Load from a YAML file merged with `PROBLEM_`-prefixed environment
    /// variables (`__` separates nested keys). A missing file is not an error.
    ///
    /// # Errors
    /// Returns [`ConfigError::Invalid`] when the merged section is invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let env = Env::prefixed(ENV_PREFIX)
            .split("__")
            .map(|key| format!("{SECTION}.{key}").into());
        let figment = Figment::new().merge(Yaml::file(path.as_ref())).merge(env);
        Self::from_figment(&figment)
    }
}
