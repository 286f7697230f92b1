//! Configuration module
//!
//! Handles decoder settings and where they live on disk

mod settings;

pub use settings::{
    ConfigError, DecoderConfig, DemuxConfig, OutputConfig, ReassemblyConfig, ResolverConfig, SecurityConfig,
    DEFAULT_MIC_LENGTH,
};

use directories::ProjectDirs;
use std::path::PathBuf;

const CONFIG_FILE: &str = "nrdissect.toml";

/// Get the application configuration directory
pub fn config_dir() -> Option<PathBuf> {
    ProjectDirs::from("org", "nrdissect", "nrdissect").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Path of the default configuration file
pub fn config_file() -> Option<PathBuf> {
    config_dir().map(|d| d.join(CONFIG_FILE))
}
