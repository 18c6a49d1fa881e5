//! Engine configuration
//!
//! One explicit object handed to every component at construction. Loadable
//! from TOML; every section has defaults so a config file may be partial.

use crate::error::ConfigError;
use globset::Glob;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

static SQL_IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex must compile"));

/// Top-level engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory beneath which every file operation is sandboxed
    pub data_root: PathBuf,
    /// Absolute prefix tasks use to name the data root
    pub virtual_root: Option<PathBuf>,
    /// Completion and embedding service
    pub collaborator: CollaboratorConfig,
    /// External tools
    pub process: ProcessConfig,
    /// File selection patterns
    pub patterns: PatternConfig,
    /// Relational schema for sales aggregation
    pub sales: SalesConfig,
}

impl EngineConfig {
    /// Create default configuration rooted at `data_root`
    #[inline]
    #[must_use]
    pub fn new(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            ..Self::default()
        }
    }

    /// Parse configuration from TOML text
    ///
    /// # Errors
    /// Returns `Toml` on syntax or schema errors.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    /// Returns `Read` if the file cannot be read, `Toml` if it does not parse.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// With data root
    #[inline]
    #[must_use]
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self
    }

    /// With virtual root alias (`None` disables aliasing)
    #[inline]
    #[must_use]
    pub fn with_virtual_root(mut self, prefix: Option<PathBuf>) -> Self {
        self.virtual_root = prefix;
        self
    }

    /// With collaborator base URL
    #[inline]
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.collaborator.api_base = Some(api_base.into());
        self
    }

    /// With collaborator API key
    #[inline]
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.collaborator.api_key = Some(api_key.into());
        self
    }

    /// With completion model
    #[inline]
    #[must_use]
    pub fn with_completion_model(mut self, model: impl Into<String>) -> Self {
        self.collaborator.completion_model = model.into();
        self
    }

    /// With recent-log limit
    #[inline]
    #[must_use]
    pub fn with_recent_log_limit(mut self, limit: usize) -> Self {
        self.patterns.recent_log_limit = limit;
        self
    }

    /// Validate values that would otherwise fail late
    ///
    /// # Errors
    /// Returns `Invalid` naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_root.as_os_str().is_empty() {
            return Err(ConfigError::invalid("data_root", "must not be empty"));
        }
        if let Some(prefix) = &self.virtual_root {
            if !prefix.is_absolute() {
                return Err(ConfigError::invalid("virtual_root", "must be absolute"));
            }
        }
        if self.process.formatter.is_empty() {
            return Err(ConfigError::invalid("process.formatter", "command is empty"));
        }
        if self.process.script_runner.is_empty() {
            return Err(ConfigError::invalid("process.script_runner", "command is empty"));
        }
        if self.patterns.recent_log_limit == 0 {
            return Err(ConfigError::invalid("patterns.recent_log_limit", "must be positive"));
        }
        for (field, pattern) in [
            ("patterns.log_glob", &self.patterns.log_glob),
            ("patterns.document_glob", &self.patterns.document_glob),
        ] {
            Glob::new(pattern).map_err(|e| ConfigError::invalid(field, e.to_string()))?;
        }
        self.sales.validate()
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("."),
            virtual_root: Some(PathBuf::from("/data")),
            collaborator: CollaboratorConfig::default(),
            process: ProcessConfig::default(),
            patterns: PatternConfig::default(),
            sales: SalesConfig::default(),
        }
    }
}

/// Completion and embedding service settings
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollaboratorConfig {
    /// OpenAI-compatible base URL; no client is built when unset
    pub api_base: Option<String>,
    /// Bearer token
    pub api_key: Option<String>,
    /// Model for classification and extraction
    pub completion_model: String,
    /// Model for comment embeddings
    pub embedding_model: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl CollaboratorConfig {
    /// Request timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for CollaboratorConfig {
    fn default() -> Self {
        Self {
            api_base: None,
            api_key: None,
            completion_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            timeout_secs: 30,
        }
    }
}

impl std::fmt::Debug for CollaboratorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollaboratorConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("completion_model", &self.completion_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// External tool command prefixes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Markdown formatter; the file path is appended
    pub formatter: Vec<String>,
    /// Script runner; url, email and root flags are appended
    pub script_runner: Vec<String>,
    /// Per-process timeout in seconds
    pub timeout_secs: u64,
}

impl ProcessConfig {
    /// Process timeout
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            formatter: vec!["npx".into(), "prettier@3.4.2".into(), "--write".into()],
            script_runner: vec!["uv".into(), "run".into()],
            timeout_secs: 120,
        }
    }
}

/// File selection patterns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    /// File-name glob for log files
    pub log_glob: String,
    /// File-name glob for indexed documents
    pub document_glob: String,
    /// How many recent logs to excerpt
    pub recent_log_limit: usize,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            log_glob: "*.log".to_string(),
            document_glob: "*.md".to_string(),
            recent_log_limit: 10,
        }
    }
}

/// Table and column names for sum-by-category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SalesConfig {
    /// Table name
    pub table: String,
    /// Column compared against the category parameter
    pub category_column: String,
    /// Quantity column
    pub quantity_column: String,
    /// Unit price column
    pub price_column: String,
}

impl SalesConfig {
    /// Identifiers are spliced into SQL text, so only plain names pass
    fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("sales.table", &self.table),
            ("sales.category_column", &self.category_column),
            ("sales.quantity_column", &self.quantity_column),
            ("sales.price_column", &self.price_column),
        ] {
            if !SQL_IDENTIFIER.is_match(value) {
                return Err(ConfigError::invalid(
                    field,
                    format!("'{value}' is not a plain SQL identifier"),
                ));
            }
        }
        Ok(())
    }

    /// Aggregate query with one positional parameter for the category
    #[must_use]
    pub fn sum_query(&self) -> String {
        format!(
            "SELECT SUM({q} * {p}) FROM {t} WHERE {c} = ?1",
            q = self.quantity_column,
            p = self.price_column,
            t = self.table,
            c = self.category_column,
        )
    }
}

impl Default for SalesConfig {
    fn default() -> Self {
        Self {
            table: "tickets".to_string(),
            category_column: "type".to_string(),
            quantity_column: "units".to_string(),
            price_column: "price".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_validate() {
        let config = EngineConfig::new("/srv/data");
        assert!(config.validate().is_ok());
        assert_eq!(config.virtual_root, Some(PathBuf::from("/data")));
        assert_eq!(config.patterns.recent_log_limit, 10);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            data_root = "/srv/data"

            [collaborator]
            api_base = "http://localhost:8080/v1"

            [sales]
            table = "orders"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/srv/data"));
        assert_eq!(
            config.collaborator.api_base.as_deref(),
            Some("http://localhost:8080/v1")
        );
        assert_eq!(config.collaborator.completion_model, "gpt-4o-mini");
        assert_eq!(config.sales.table, "orders");
        assert_eq!(config.sales.category_column, "type");
    }

    #[test]
    fn bad_toml_is_reported() {
        let err = EngineConfig::from_toml_str("data_root = [").unwrap_err();
        assert!(matches!(err, ConfigError::Toml(_)));
    }

    #[test]
    fn sql_identifiers_are_checked() {
        let mut config = EngineConfig::new("/srv/data");
        config.sales.table = "tickets; DROP TABLE tickets".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "sales.table", .. }));
    }

    #[test]
    fn zero_log_limit_is_rejected() {
        let config = EngineConfig::new("/srv/data").with_recent_log_limit(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn relative_virtual_root_is_rejected() {
        let config = EngineConfig::new("/srv/data").with_virtual_root(Some(PathBuf::from("data")));
        assert!(config.validate().is_err());
    }

    #[test]
    fn sum_query_uses_configured_names() {
        assert_eq!(
            SalesConfig::default().sum_query(),
            "SELECT SUM(units * price) FROM tickets WHERE type = ?1"
        );
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = EngineConfig::new("/srv").with_api_key("sk-secret");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("sk-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
