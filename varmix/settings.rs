use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

/// Errors from reading, writing, or validating update settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read or write settings file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML settings file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize settings to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("eps must be finite and non-negative, but was {0}.")]
    InvalidEps(f64),
    #[error("consistency_tolerance must be finite and positive, but was {0}.")]
    InvalidTolerance(f64),
}

/// Tunables for the coordinate-ascent engine.
///
/// Stored as a small TOML document; any key left out takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateSettings {
    /// Added to each raw mixture weight before taking its logarithm, so a zero
    /// weight gives a very negative but finite log-weight. Read by
    /// `MixturePrior::from_settings`.
    pub eps: f64,
    /// If set, every sweep ends by recomputing `X · E[beta]` and fails when the
    /// incrementally maintained fitted response is further than this (max abs)
    /// from it. Costs one full pass over the design matrix.
    pub consistency_tolerance: Option<f64>,
}

impl Default for UpdateSettings {
    fn default() -> Self {
        Self {
            eps: f64::EPSILON,
            consistency_tolerance: None,
        }
    }
}

impl UpdateSettings {
    pub fn with_eps(eps: f64) -> Self {
        Self {
            eps,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.eps.is_finite() || self.eps < 0.0 {
            return Err(SettingsError::InvalidEps(self.eps));
        }
        if let Some(tol) = self.consistency_tolerance {
            if !tol.is_finite() || tol <= 0.0 {
                return Err(SettingsError::InvalidTolerance(tol));
            }
        }
        Ok(())
    }

    /// Saves the settings in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads and validates settings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let toml_string = fs::read_to_string(path)?;
        let settings: Self = toml::from_str(&toml_string)?;
        settings.validate()?;
        log::debug!("Loaded update settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }
}
