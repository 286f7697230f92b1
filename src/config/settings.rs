//! Decoder settings

use crate::cli::OutputFormat;
use crate::core::protocol::{DecodeOptions, SubslotHint};
use crate::core::reassembly::FragmentStoreConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// MIC length when nothing else is configured
pub const DEFAULT_MIC_LENGTH: usize = 5;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Decoder configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub security: SecurityConfig,
    pub resolver: ResolverConfig,
    pub reassembly: ReassemblyConfig,
    pub demux: DemuxConfig,
    pub output: OutputConfig,
}

impl DecoderConfig {
    /// Load from the platform config directory, or defaults when absent
    pub fn load() -> Result<Self, ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        if path.exists() {
            Self::load_from(&path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            Ok(Self::default())
        }
    }

    /// Load from a specific file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to a specific file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let content = self.to_toml()?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save to the platform config directory
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = super::config_file().ok_or(ConfigError::NoConfigDir)?;
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| ConfigError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        self.save_to(&path)
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Options handed to element decoders
    pub fn decode_options(&self) -> DecodeOptions {
        DecodeOptions {
            subslot_width: self.resolver.subslot_width,
            payload_class: self.demux.payload_class.clone(),
        }
    }

    /// Fragment store limits
    pub fn store_config(&self) -> FragmentStoreConfig {
        FragmentStoreConfig {
            max_accumulators: self.reassembly.max_accumulators,
        }
    }
}

/// MAC security settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Octets reserved for the MIC when the MAC header signals security
    pub mic_length: usize,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            mic_length: DEFAULT_MIC_LENGTH,
        }
    }
}

/// Subslot width resolution
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// `infer`, `bits8` or `bits9`
    pub subslot_width: SubslotHint,
}

/// Reassembly limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReassemblyConfig {
    /// Maximum open units (0 = unlimited)
    pub max_accumulators: usize,
    /// Units idle for longer are dropped on eviction (0 = never)
    pub idle_timeout_ms: u64,
}

impl ReassemblyConfig {
    /// Idle limit, if eviction is enabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

impl Default for ReassemblyConfig {
    fn default() -> Self {
        Self {
            max_accumulators: 1024,
            idle_timeout_ms: 0,
        }
    }
}

/// Higher-layer payload handling
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemuxConfig {
    /// Force every SDU to this decoder (e.g. `"ipv6"`)
    pub payload_class: Option<String>,
}

/// Output settings for the CLI
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    /// Print informational diagnostics too
    pub show_info: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Text,
            show_info: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DecoderConfig::default();
        assert_eq!(config.security.mic_length, 5);
        assert_eq!(config.resolver.subslot_width, SubslotHint::Infer);
        assert_eq!(config.reassembly.idle_timeout(), None);
        assert!(config.demux.payload_class.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: DecoderConfig = toml::from_str(
            r#"
            [resolver]
            subslot_width = "bits9"

            [reassembly]
            idle_timeout_ms = 2000
            "#,
        )
        .unwrap();

        assert_eq!(config.resolver.subslot_width, SubslotHint::Bits9);
        assert_eq!(config.reassembly.idle_timeout(), Some(Duration::from_secs(2)));
        assert_eq!(config.reassembly.max_accumulators, 1024);
        assert_eq!(config.security.mic_length, DEFAULT_MIC_LENGTH);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nrdissect.toml");

        let mut config = DecoderConfig::default();
        config.security.mic_length = 8;
        config.demux.payload_class = Some("ipv6".into());
        config.output.format = OutputFormat::Json;
        config.save_to(&path).unwrap();

        assert_eq!(DecoderConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_invalid_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[security]\nmic_length = \"five\"\n").unwrap();

        let err = DecoderConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_decode_options_follow_config() {
        let mut config = DecoderConfig::default();
        config.resolver.subslot_width = SubslotHint::Bits8;
        config.demux.payload_class = Some("ipv6".into());

        let options = config.decode_options();
        assert_eq!(options.subslot_width, SubslotHint::Bits8);
        assert_eq!(options.payload_class.as_deref(), Some("ipv6"));
    }
}
