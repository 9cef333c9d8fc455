//! # Config Loader
//!
//! Configuration loading and parsing module.
//!
//! Responsibilities:
//! - Parse TOML/JSON files into `SubscriberConfig` and `CatalogSpec`
//! - Validate configuration legality
//! - Report subscriptions that cannot be forwarded to
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let config = ConfigLoader::load_from_path(Path::new("subscriber.toml")).unwrap();
//! println!("workers per writer: {}", config.write_concurrency);
//! ```

mod parser;
mod validator;

pub use contracts::{CatalogSpec, SubscriberConfig};
pub use parser::ConfigFormat;
pub use validator::{check_subscription, subscription_issues};

use contracts::ContractError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Configuration loader
///
/// Provides static methods to load configuration from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load subscriber configuration from file path
    ///
    /// Automatically detects format from file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<SubscriberConfig, ContractError> {
        let (content, format) = Self::read(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load subscriber configuration from string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<SubscriberConfig, ContractError> {
        let config: SubscriberConfig = parser::parse(content, format)?;
        validator::validate_config(&config)?;
        Ok(config)
    }

    /// Load catalog from file path
    pub fn load_catalog_from_path(path: &Path) -> Result<CatalogSpec, ContractError> {
        let (content, format) = Self::read(path)?;
        Self::load_catalog_from_str(&content, format)
    }

    /// Load catalog from string
    pub fn load_catalog_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<CatalogSpec, ContractError> {
        let catalog: CatalogSpec = parser::parse(content, format)?;
        validator::validate_catalog(&catalog)?;
        Ok(catalog)
    }

    /// Serialize to TOML string
    pub fn to_toml<T: Serialize>(value: &T) -> Result<String, ContractError> {
        toml::to_string_pretty(value)
            .map_err(|e| ContractError::config_parse(format!("TOML serialize error: {e}")))
    }

    /// Serialize to JSON string
    pub fn to_json<T: Serialize>(value: &T) -> Result<String, ContractError> {
        serde_json::to_string_pretty(value)
            .map_err(|e| ContractError::config_parse(format!("JSON serialize error: {e}")))
    }

    /// Parse any supported document without validation
    pub fn parse<T: DeserializeOwned>(
        content: &str,
        format: ConfigFormat,
    ) -> Result<T, ContractError> {
        parser::parse(content, format)
    }
}

impl ConfigLoader {
    /// Infer configuration format from file extension
    fn detect_format(path: &Path) -> Result<ConfigFormat, ContractError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            ContractError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            ContractError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read(path: &Path) -> Result<(String, ConfigFormat), ContractError> {
        let format = Self::detect_format(path)?;
        let content = std::fs::read_to_string(path)?;
        Ok((content, format))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const CATALOG_TOML: &str = r#"
[[databases]]
name = "telemetry"
default_retention_policy = "autogen"

[[databases.retention_policies]]
name = "autogen"

[[databases.retention_policies.subscriptions]]
name = "sub1"
mode = "ALL"
destinations = ["http://127.0.0.1:8086"]

[[databases.retention_policies]]
name = "weekly"
"#;

    #[test]
    fn test_load_catalog_from_str() {
        let catalog = ConfigLoader::load_catalog_from_str(CATALOG_TOML, ConfigFormat::Toml);
        assert!(catalog.is_ok(), "Failed: {:?}", catalog.err());
        let catalog = catalog.unwrap();
        assert_eq!(catalog.databases[0].retention_policies.len(), 2);
    }

    #[test]
    fn test_round_trip_catalog_json() {
        let catalog = ConfigLoader::load_catalog_from_str(CATALOG_TOML, ConfigFormat::Toml).unwrap();
        let json = ConfigLoader::to_json(&catalog).unwrap();
        let catalog2 = ConfigLoader::load_catalog_from_str(&json, ConfigFormat::Json).unwrap();
        assert_eq!(catalog, catalog2);
    }

    #[test]
    fn test_validation_runs_after_parse() {
        let result = ConfigLoader::load_from_str("write_buffer_size = 0", ConfigFormat::Toml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("write_buffer_size"));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "write_concurrency = 2").unwrap();
        let config = ConfigLoader::load_from_path(file.path()).unwrap();
        assert_eq!(config.write_concurrency, 2);
    }

    #[test]
    fn test_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let err = ConfigLoader::load_from_path(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported config format"));
    }
}
