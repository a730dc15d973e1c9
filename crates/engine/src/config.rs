//! Simulator configuration via `repcc.toml`
//!
//! Every field has a default, so an empty file (or no file at all) yields
//! the standard cluster: 10 sites and 20 variables.

use repcc_core::{Error, Placement, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Conventional config file name.
pub const CONFIG_FILE_NAME: &str = "repcc.toml";

/// How the command-line front end renders events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One readable line per event
    Human,
    /// One JSON document per event
    Json,
}

/// Simulator configuration loaded from `repcc.toml`.
///
/// # Example
///
/// ```toml
/// # Number of sites (default: 10)
/// sites = 10
/// # Number of variables x1..xN (default: 20)
/// variables = 20
/// # Output format: "human" (default) or "json"
/// output = "human"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Number of sites in the cluster.
    #[serde(default = "default_sites")]
    pub sites: u32,
    /// Number of variables.
    #[serde(default = "default_variables")]
    pub variables: u32,
    /// Output format: `"human"` or `"json"`.
    #[serde(default = "default_output_str")]
    pub output: String,
}

fn default_sites() -> u32 {
    10
}

fn default_variables() -> u32 {
    20
}

fn default_output_str() -> String {
    "human".to_string()
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            sites: default_sites(),
            variables: default_variables(),
            output: default_output_str(),
        }
    }
}

impl SimConfig {
    /// Parse the output string into an `OutputFormat`.
    ///
    /// # Errors
    ///
    /// Returns an error if the string is not `"human"` or `"json"`.
    pub fn output_format(&self) -> Result<OutputFormat> {
        match self.output.as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            other => Err(Error::Config(format!(
                "invalid output format '{}'. Expected \"human\" or \"json\".",
                other
            ))),
        }
    }

    /// Check every field.
    pub fn validate(&self) -> Result<()> {
        if self.sites == 0 {
            return Err(Error::Config("sites must be at least 1".into()));
        }
        if self.variables == 0 {
            return Err(Error::Config("variables must be at least 1".into()));
        }
        self.output_format()?;
        Ok(())
    }

    /// Variable placement described by this config.
    pub fn placement(&self) -> Placement {
        Placement::new(self.sites, self.variables)
    }

    /// Parse and validate config text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: SimConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml(&content)
    }

    /// Serialize this config to TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_is_standard_cluster() {
        let config = SimConfig::default();
        assert_eq!(config.sites, 10);
        assert_eq!(config.variables, 20);
        assert_eq!(config.output_format().unwrap(), OutputFormat::Human);
        assert_eq!(config.placement(), Placement::default());
    }

    #[test]
    fn parse_json_output() {
        let config = SimConfig::from_toml("output = \"json\"").unwrap();
        assert_eq!(config.output_format().unwrap(), OutputFormat::Json);
    }

    #[test]
    fn parse_invalid_output_returns_error() {
        assert!(matches!(
            SimConfig::from_toml("output = \"yaml\""),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn zero_sites_rejected() {
        assert!(SimConfig::from_toml("sites = 0").is_err());
        assert!(SimConfig::from_toml("variables = 0").is_err());
    }

    #[test]
    fn malformed_toml_rejected() {
        assert!(SimConfig::from_toml("sites = [").is_err());
    }

    #[test]
    fn from_file_with_missing_fields_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "sites = 4\n").unwrap();

        let config = SimConfig::from_file(&path).unwrap();
        assert_eq!(config.sites, 4);
        assert_eq!(config.variables, 20);
    }

    #[test]
    fn from_missing_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(matches!(SimConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn round_trip() {
        let config = SimConfig {
            sites: 3,
            variables: 6,
            output: "json".to_string(),
        };
        let parsed = SimConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }
}
