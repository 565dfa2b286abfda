//! Installer configuration: a small struct loadable from YAML via `serde_yaml`, analogous to
//! the teacher's `HostConfigurationSource` loader. This crate owns parsing the struct, not
//! sourcing it — reading the file from disk/stdin/a remote fetch stays a CLI concern.

use serde::{Deserialize, Serialize};

use crate::{
    builder::BuilderConfig,
    error::{EngineError, ReportError},
};

/// A step errored loading or parsing a config document.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("failed to parse installer config")]
    ParseFailed,
}

impl From<ConfigError> for crate::error::ErrorKind {
    fn from(_: ConfigError) -> Self {
        // Config errors are surfaced with their own message via `.structured`; they don't need
        // a dedicated taxonomy branch distinct from a generic builder-adjacent failure, so they
        // ride in as a validation failure with a fixed reason.
        crate::error::ErrorKind::Validation(crate::error::ValidationError::PreconditionFailed {
            step: "config".to_string(),
            reason: ConfigError::ParseFailed.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct InstallerConfig {
    /// Distro family override; when absent, the (out-of-scope) distro-detection collaborator's
    /// result is used as-is.
    pub family: Option<String>,
    pub driver_version: String,
    pub components: Vec<String>,
    pub additional_packages: Vec<String>,
    pub required_disk_mb: u64,
    pub skip_validation: bool,
    pub skip_repository: bool,
    pub skip_nouveau: bool,
    pub skip_dkms: bool,
    pub skip_module_load: bool,
    pub skip_xorg_config: bool,
    pub skip_verification: bool,
    pub dry_run: bool,
    pub auto_rollback: bool,
}

impl InstallerConfig {
    pub fn from_yaml_str(contents: &str) -> Result<Self, EngineError> {
        serde_yaml::from_str(contents).structured(ConfigError::ParseFailed)
    }

    pub fn to_builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            skip_validation: self.skip_validation,
            skip_repository: self.skip_repository,
            skip_nouveau: self.skip_nouveau,
            skip_dkms: self.skip_dkms,
            skip_module_load: self.skip_module_load,
            skip_xorg_config: self.skip_xorg_config,
            skip_verification: self.skip_verification,
            required_disk_mb: self.required_disk_mb,
            custom_validation_checks: Vec::new(),
            additional_packages: self.additional_packages.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml_with_defaults() {
        let config = InstallerConfig::from_yaml_str("driver_version: \"535\"\n").unwrap();
        assert_eq!(config.driver_version, "535");
        assert!(!config.skip_validation);
        assert!(config.components.is_empty());
    }

    #[test]
    fn parses_full_document() {
        let yaml = r#"
family: debian
driver_version: "550"
components: ["cuda", "vulkan"]
additional_packages: ["nvidia-settings"]
required_disk_mb: 8000
skip_xorg_config: true
auto_rollback: true
"#;
        let config = InstallerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.family.as_deref(), Some("debian"));
        assert_eq!(config.components, vec!["cuda", "vulkan"]);
        assert!(config.skip_xorg_config);
        assert!(config.auto_rollback);
    }

    #[test]
    fn malformed_yaml_is_a_structured_error() {
        let err = InstallerConfig::from_yaml_str("not: [valid: yaml").unwrap_err();
        assert!(matches!(err.kind(), crate::error::ErrorKind::Validation(_)));
    }

    #[test]
    fn loads_from_a_file_on_disk() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "driver_version: \"535\"\nrequired_disk_mb: 4096").unwrap();

        let contents = std::fs::read_to_string(file.path()).unwrap();
        let config = InstallerConfig::from_yaml_str(&contents).unwrap();
        assert_eq!(config.driver_version, "535");
        assert_eq!(config.required_disk_mb, 4096);
    }
}
