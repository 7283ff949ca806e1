//! Command line configuration
//!
//! Values come from the environment first; flags given on the command line
//! override them.

use anyhow::{Context, Result};
use pdfsuite_core::render::{validate_dpi, DEFAULT_DPI};
use pdfsuite_core::{FontSource, LoadedFont, PdfSuiteError, Script};
use std::path::{Path, PathBuf};

pub const ENV_OUTPUT_DIR: &str = "PDFSUITE_OUTPUT_DIR";
pub const ENV_DPI: &str = "PDFSUITE_DPI";
pub const ENV_FONT: &str = "PDFSUITE_FONT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliConfig {
    /// Directory output files are written to
    pub output_dir: PathBuf,
    /// Resolution for image export
    pub dpi: u32,
    /// TrueType font for watermark text beyond plain ASCII
    pub font: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            dpi: DEFAULT_DPI,
            font: None,
        }
    }
}

impl CliConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or blank keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(dir) = get(ENV_OUTPUT_DIR) {
            config.output_dir = PathBuf::from(dir);
        }
        if let Some(dpi) = get(ENV_DPI) {
            config.dpi = dpi
                .trim()
                .parse()
                .with_context(|| format!("{} must be a whole number, got {:?}", ENV_DPI, dpi))?;
        }
        if let Some(font) = get(ENV_FONT) {
            config.font = Some(PathBuf::from(font));
        }

        Ok(config)
    }

    /// Apply command line overrides on top of the environment.
    pub fn with_overrides(
        mut self,
        output_dir: Option<PathBuf>,
        dpi: Option<u32>,
        font: Option<PathBuf>,
    ) -> Result<Self> {
        if let Some(dir) = output_dir {
            self.output_dir = dir;
        }
        if let Some(dpi) = dpi {
            self.dpi = dpi;
        }
        if font.is_some() {
            self.font = font;
        }
        validate_dpi(self.dpi).map_err(|e| anyhow::anyhow!(e.user_message()))?;
        Ok(self)
    }

    pub fn font_source(&self) -> Option<FileFontSource> {
        self.font.as_deref().map(FileFontSource::new)
    }
}

/// Reads a TrueType font from disk each time one is needed.
#[derive(Debug, Clone)]
pub struct FileFontSource {
    path: PathBuf,
}

impl FileFontSource {
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
        }
    }
}

impl FontSource for FileFontSource {
    fn load(&self, _script: Script) -> Result<LoadedFont, PdfSuiteError> {
        let data = std::fs::read(&self.path).map_err(|e| {
            PdfSuiteError::FontUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let name = self
            .path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("font")
            .to_string();
        tracing::debug!(font = %self.path.display(), bytes = data.len(), "loaded font");
        Ok(LoadedFont { name, data })
    }
}
