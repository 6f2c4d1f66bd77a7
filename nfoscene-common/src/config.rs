//! Configuration file resolution and loading
//!
//! Configuration file priority order:
//! 1. Explicit path (command-line argument)
//! 2. Environment variable `NFOSCENE_CONFIG`
//! 3. Platform config directory (`<config dir>/nfoscene/config.toml`)
//! 4. Compiled defaults
//!
//! Tiers 1 and 2 name a file on purpose, so failing to read or parse it is an
//! error. A missing file in tier 3 falls through to the compiled defaults.

use crate::policy::ReconciliationPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable naming the configuration file
pub const CONFIG_ENV_VAR: &str = "NFOSCENE_CONFIG";

/// Default timeout for catalog (GraphQL) requests
pub const DEFAULT_CATALOG_TIMEOUT_SECS: u64 = 20;

/// Default timeout for remote image downloads
pub const DEFAULT_IMAGE_TIMEOUT_SECS: u64 = 10;

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub logging: LoggingConfig,
    pub catalog: CatalogConfig,
    pub policy: ReconciliationPolicy,
}

/// `[logging]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// `[catalog]` table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub timeout_secs: u64,
    pub image_timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            timeout_secs: DEFAULT_CATALOG_TIMEOUT_SECS,
            image_timeout_secs: DEFAULT_IMAGE_TIMEOUT_SECS,
        }
    }
}

/// Where the configuration comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Path given on the command line
    Explicit(PathBuf),
    /// Path taken from `NFOSCENE_CONFIG`
    Environment(PathBuf),
    /// Existing file in the platform config directory
    Platform(PathBuf),
    /// No file; compiled defaults
    Defaults,
}

/// Resolve the configuration source following the priority order
pub fn resolve_config_source(cli_arg: Option<&Path>) -> ConfigSource {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return ConfigSource::Explicit(path.to_path_buf());
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return ConfigSource::Environment(PathBuf::from(path));
        }
    }

    // Priority 3: Platform config directory
    if let Some(path) = platform_config_path() {
        if path.exists() {
            return ConfigSource::Platform(path);
        }
        debug!(path = %path.display(), "No platform config file");
    }

    // Priority 4: Compiled defaults
    ConfigSource::Defaults
}

/// Platform-dependent configuration file path
pub fn platform_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("nfoscene").join("config.toml"))
}

/// Load configuration from a resolved source
pub fn load_config(source: &ConfigSource) -> Result<TomlConfig> {
    match source {
        ConfigSource::Explicit(path) | ConfigSource::Environment(path) => load_toml_config(path),
        ConfigSource::Platform(path) => match load_toml_config(path) {
            Ok(config) => Ok(config),
            Err(Error::Io(e)) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Config file unreadable, using compiled defaults"
                );
                Ok(TomlConfig::default())
            }
            Err(e) => Err(e),
        },
        ConfigSource::Defaults => {
            info!("No configuration file found, using compiled defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// Read and parse a TOML configuration file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_toml_config(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}

/// Parse TOML configuration text
pub fn parse_toml_config(content: &str) -> Result<TomlConfig> {
    toml::from_str(content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{EntityKind, MetadataField};

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_toml_config("").unwrap();
        assert_eq!(config, TomlConfig::default());
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.catalog.timeout_secs, 20);
        assert_eq!(config.catalog.image_timeout_secs, 10);
    }

    #[test]
    fn test_partial_policy_table() {
        let config = parse_toml_config(
            r#"
            [policy]
            dry_run = true
            blacklist = ["url"]
            reload_tag = "reload"

            [policy.create_missing]
            tags = false
            "#,
        )
        .unwrap();

        let policy = &config.policy;
        assert!(policy.dry_run);
        assert!(policy.is_blacklisted(MetadataField::Url));
        assert_eq!(policy.reload_tag.as_deref(), Some("reload"));
        assert!(!policy.create_missing.tags);
        // untouched keys keep their defaults
        assert!(policy.create_missing.performers);
        assert!(policy.skip_organized);
        assert!(!policy.may_create(EntityKind::Tag));
    }

    #[test]
    fn test_unknown_field_name_is_rejected() {
        let result = parse_toml_config(
            r#"
            [policy]
            blacklist = ["colour"]
            "#,
        );
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
