//! Engine configuration
//!
//! Loaded from TOML or built in code:
//!
//! ```toml
//! minify_text = true
//! translatable_attributes = ["label", "hx-confirm", "placeholder"]
//! expression_patterns = ['\{\{.*\}\}']
//! context_prefix = "template"
//! ```

use std::path::Path;

use regex::RegexSet;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("invalid expression pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

/// Configuration options for loading and cataloguing templates
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Trim text nodes and drop whitespace-only text while loading
    pub minify_text: bool,

    /// Attributes whose values are offered for translation
    pub translatable_attributes: Vec<String>,

    /// Regexes marking text as an expression rather than a literal
    pub expression_patterns: Vec<String>,

    /// First segment of every catalog context
    pub context_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            minify_text: true,
            translatable_attributes: vec!["label".to_string(), "hx-confirm".to_string()],
            expression_patterns: vec![r"\{\{.*\}\}".to_string(), r"\{%.*%\}".to_string()],
            context_prefix: "template".to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(content)?;
        config.expression_matcher()?;
        Ok(config)
    }

    /// Compile the expression patterns
    pub fn expression_matcher(&self) -> Result<RegexSet, ConfigError> {
        Ok(RegexSet::new(&self.expression_patterns)?)
    }

    /// Enable or disable text minification
    pub fn with_minify_text(mut self, minify: bool) -> Self {
        self.minify_text = minify;
        self
    }

    /// Replace the translatable attribute list
    pub fn with_translatable_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.translatable_attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Add an expression pattern
    pub fn with_expression_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.expression_patterns.push(pattern.into());
        self
    }

    /// Set the catalog context prefix
    pub fn with_context_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.context_prefix = prefix.into();
        self
    }

    pub fn is_translatable_attribute(&self, name: &str) -> bool {
        self.translatable_attributes.iter().any(|a| a == name)
    }
}
