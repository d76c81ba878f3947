//! Per-instance sensor configuration.
//!
//! Every device instance gets its own [`SensorConfig`]; nothing here is
//! process-wide. Configurations can be built in code or loaded from TOML:
//!
//! ```toml
//! mode = "wn640_bt656_pal"
//! frame_rate = 25
//! module_facing = "front"
//! ```

use std::path::Path;

use crate::modes::Mode;

/// Error type for configuration loading.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was being read.
        path: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The TOML did not match the expected shape.
    #[error(transparent)]
    Parse(#[from] toml::de::Error),

    /// A value is out of range.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which way the module points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Facing {
    /// Rear-facing.
    #[default]
    Back,
    /// Front-facing.
    Front,
}

impl Facing {
    /// Single-letter tag used in subdevice names.
    pub const fn tag(self) -> char {
        match self {
            Self::Back => 'b',
            Self::Front => 'f',
        }
    }
}

/// Configuration of one sensor instance.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SensorConfig {
    /// Operating mode.
    pub mode: Mode,
    /// Frame rate written into START frames.
    pub frame_rate: u8,
    /// Pixel/routing type written into command frames.
    pub pixel_type: u8,
    /// Camera module index on the board.
    pub module_index: u32,
    /// Module orientation.
    pub module_facing: Facing,
    /// Module name reported by the module-info query.
    pub module_name: String,
    /// Lens name reported by the module-info query.
    pub lens_name: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            mode: Mode::default(),
            frame_rate: 30,
            pixel_type: 16,
            module_index: 0,
            module_facing: Facing::default(),
            module_name: String::new(),
            lens_name: String::new(),
        }
    }
}

impl SensorConfig {
    /// Default configuration for `mode`.
    #[must_use]
    pub fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Check value ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be non-zero".to_owned()));
        }
        Ok(())
    }
}
