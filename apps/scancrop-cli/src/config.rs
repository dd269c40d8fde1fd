//! TOML configuration for the `scancrop` binary
//!
//! Every table is optional; command-line flags override whatever the file sets.
//!
//! ```toml
//! [crop]
//! dpi = 300
//! scale = "1/2"
//! work_dir = "work"
//!
//! [selection]
//! corners = "40,40,560,780"
//!
//! [split]
//! chunk_size = 2
//! output_dir = "Split Documents"
//! prefix = "split_document_"
//! ```

use anyhow::Context;
use scancrop_core::ScaleFactor;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub crop: CropConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub split: SplitConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// File config when a path is given, defaults otherwise
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// Rasterization and preview settings (default: 300 DPI, half-size preview)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CropConfig {
    #[serde(default = "default_dpi")]
    pub dpi: u32,
    #[serde(default)]
    pub scale: ScaleFactor,
    /// Parent of the `pages/` and `cropped/` intermediate directories
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Default for CropConfig {
    fn default() -> Self {
        Self {
            dpi: default_dpi(),
            scale: ScaleFactor::default(),
            work_dir: None,
        }
    }
}

fn default_dpi() -> u32 {
    300
}

/// Preview-space corners `"x0,y0,x1,y1"` replayed as the crop gesture
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SelectionConfig {
    pub corners: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SplitConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            output_dir: None,
            prefix: default_prefix(),
        }
    }
}

fn default_chunk_size() -> usize {
    1
}

fn default_prefix() -> String {
    "split_document_".to_string()
}
