//! Configuration parsing and validation for fluid scenes

use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use kernel::{FluidParams, ParamsError};
use serde::{Deserialize, Serialize};

/// Main scene configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human-readable scene name
    pub name: String,
    /// Number of fluid particles seeded at start
    #[serde(default = "default_particle_count")]
    pub particle_count: usize,
    /// Solver parameters; every field may be omitted
    #[serde(default)]
    pub fluid: FluidParams,
    /// Seed for the initial lattice jitter
    #[serde(default)]
    pub seed: u64,
    /// Host frame delta fed to the solver each frame (seconds)
    #[serde(default = "default_frame_dt")]
    pub frame_dt: f32,
    /// Stop after this many frames
    pub max_timesteps: Option<u64>,
    /// Speed mapped to the top of the render color ramp (m/s)
    #[serde(default = "default_max_display_speed")]
    pub max_display_speed: f32,
}

// Default values
fn default_particle_count() -> usize {
    10_000
}

fn default_frame_dt() -> f32 {
    1.0 / 60.0
}

fn default_max_display_speed() -> f32 {
    10.0
}

impl SimulationConfig {
    /// Configuration with every optional field at its default.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            particle_count: default_particle_count(),
            fluid: FluidParams::default(),
            seed: 0,
            frame_dt: default_frame_dt(),
            max_timesteps: None,
            max_display_speed: default_max_display_speed(),
        }
    }

    /// Load configuration from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json_str(&contents)?;
        tracing::info!(
            name = %config.name,
            particles = config.particle_count,
            "loaded scene config from {}",
            path.display()
        );
        Ok(config)
    }

    /// Parse and validate configuration from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SimulationConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::Invalid("name must not be empty".to_string()));
        }

        if self.particle_count == 0 {
            return Err(ConfigError::Invalid(
                "particle_count must be at least 1".to_string(),
            ));
        }

        if !(self.frame_dt.is_finite() && self.frame_dt > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "frame_dt must be positive, got {}",
                self.frame_dt
            )));
        }

        if !(self.max_display_speed.is_finite() && self.max_display_speed > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "max_display_speed must be positive, got {}",
                self.max_display_speed
            )));
        }

        if let Some(max_timesteps) = self.max_timesteps {
            if max_timesteps == 0 {
                return Err(ConfigError::Invalid(
                    "max_timesteps must be at least 1".to_string(),
                ));
            }
        }

        self.fluid.validate()?;
        Ok(())
    }

    /// Solver parameters for this scene
    pub fn to_params(&self) -> FluidParams {
        self.fluid.clone()
    }
}

/// Failure to load or validate a scene configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read
    Io {
        /// Path that was read
        path: PathBuf,
        /// Underlying error
        source: io::Error,
    },
    /// The file is not valid JSON for a scene
    Parse(serde_json::Error),
    /// A scene-level field is out of range
    Invalid(String),
    /// The solver parameters are out of range
    Params(ParamsError),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config file {}: {source}", path.display())
            }
            Self::Parse(e) => write!(f, "failed to parse config JSON: {e}"),
            Self::Invalid(msg) => write!(f, "invalid config: {msg}"),
            Self::Params(e) => write!(f, "invalid fluid parameters: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(e) => Some(e),
            Self::Invalid(_) => None,
            Self::Params(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

impl From<ParamsError> for ConfigError {
    fn from(e: ParamsError) -> Self {
        Self::Params(e)
    }
}
