use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use vendorswap_backup::Credentials;
use vendorswap_core::Severity;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/vendorswap.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse configuration: {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub conversion: ConversionConfig,
    pub backup: BackupConfig,
    pub packages: PackagesConfig,
    pub registration: RegistrationConfig,
    pub checks: ChecksConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConversionConfig {
    pub target_id: String,
    pub target_name: String,
    /// Empty means "same major version as the source".
    pub target_version: Option<String>,
    pub allow_overridable: bool,
    pub supported_source_ids: Vec<String>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            target_id: "rhel".to_string(),
            target_name: "Red Hat Enterprise Linux".to_string(),
            target_version: None,
            allow_overridable: false,
            supported_source_ids: ["centos", "ol", "almalinux", "rocky"]
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackupConfig {
    pub state_dir: Option<PathBuf>,
    /// Backed up before any package is touched.
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PackagesConfig {
    pub remove: Vec<String>,
    pub install: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistrationConfig {
    pub enabled: bool,
    pub org: Option<String>,
    pub activation_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl RegistrationConfig {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            org: self.org.clone(),
            activation_key: self.activation_key.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChecksConfig {
    pub min_free_space_mib: u64,
    pub parallel: bool,
    pub skip_threshold: Severity,
}

impl Default for ChecksConfig {
    fn default() -> Self {
        Self {
            min_free_space_mib: 200,
            parallel: false,
            skip_threshold: Severity::Error,
        }
    }
}

impl Config {
    pub fn parse(input: &str, origin: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `explicit`, or from [`DEFAULT_CONFIG_PATH`] when it exists.
    /// An explicitly named file must exist.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        };
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound && !required => {
                return Ok(Self::default());
            }
            Err(source) => return Err(ConfigError::Read { path, source }),
        };
        Self::parse(&raw, &path)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(relative) = self.backup.files.iter().find(|path| !path.is_absolute()) {
            return Err(ConfigError::Invalid(format!(
                "backup file path must be absolute: {}",
                relative.display()
            )));
        }
        if !matches!(
            self.checks.skip_threshold,
            Severity::Warning | Severity::Overridable | Severity::Error
        ) {
            return Err(ConfigError::Invalid(format!(
                "skip_threshold must be WARNING, OVERRIDABLE or ERROR, got {}",
                self.checks.skip_threshold
            )));
        }
        if self.conversion.target_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "conversion.target_id must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
