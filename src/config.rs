use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Grid configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub half_width: usize,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self { half_width: 100 }
    }
}

impl GridConfig {
    /// Nodes per side, always odd.
    pub fn l(&self) -> usize {
        2 * self.half_width + 1
    }

    fn validate(&self) -> Result<()> {
        if self.half_width < 2 {
            return Err(anyhow!(
                "half_width must be at least 2 (got {}), the grid needs an interior",
                self.half_width
            ));
        }
        Ok(())
    }
}

/// Physics constants, fixed at initialization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    pub wave_speed: f64,
    pub dt: f64,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            wave_speed: 0.1,
            dt: 1.0 / 60.0,
        }
    }
}

impl PhysicsConfig {
    fn validate(&self) -> Result<()> {
        if self.wave_speed <= 0.0 {
            return Err(anyhow!("wave_speed must be positive, got {}", self.wave_speed));
        }
        if self.dt <= 0.0 {
            return Err(anyhow!("dt must be positive, got {}", self.dt));
        }
        Ok(())
    }
}

/// Source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub x: usize,
    pub y: usize,
    pub amplitude: f64,
    pub frequency: f64,
    pub omega: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            x: 100,
            y: 100,
            amplitude: 127.0,
            frequency: 2.4,
            omega: 6.0,
        }
    }
}

impl SourceConfig {
    fn validate(&self, l: usize) -> Result<()> {
        if self.x >= l || self.y >= l {
            return Err(anyhow!(
                "Source position ({}, {}) is outside grid bounds ({}, {})",
                self.x,
                self.y,
                l,
                l
            ));
        }
        Ok(())
    }
}

/// Display configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub pixel_size: usize,
    pub target_fps: usize,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            pixel_size: 2,
            target_fps: 60,
        }
    }
}

impl DisplayConfig {
    fn validate(&self) -> Result<()> {
        if !matches!(self.pixel_size, 1 | 2 | 4 | 8 | 16 | 32) {
            return Err(anyhow!(
                "pixel_size must be a power of two up to 32, got {}",
                self.pixel_size
            ));
        }
        if self.target_fps == 0 {
            return Err(anyhow!("target_fps must be positive"));
        }
        Ok(())
    }
}

/// Material grid configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MaterialsConfig {
    /// Optional l x l image to derive the material grid from.
    pub image: Option<PathBuf>,
}

/// PNG frame recording configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub output_dir: String,
    pub every: usize,
    pub image_width: u32,
    pub image_height: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            output_dir: "frames".to_string(),
            every: 10,
            image_width: 800,
            image_height: 800,
        }
    }
}

impl RecordingConfig {
    fn validate(&self) -> Result<()> {
        if self.every == 0 {
            return Err(anyhow!("recording.every must be positive"));
        }
        if self.image_width == 0 || self.image_height == 0 {
            return Err(anyhow!(
                "Recording image dimensions must be positive (width={}, height={})",
                self.image_width,
                self.image_height
            ));
        }
        Ok(())
    }
}

/// Complete simulator configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub grid: GridConfig,
    pub physics: PhysicsConfig,
    pub source: SourceConfig,
    pub display: DisplayConfig,
    pub materials: MaterialsConfig,
    pub recording: RecordingConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| anyhow!("Failed to read config file '{}': {}", path.display(), e))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow!("Failed to parse TOML config: {}", e))?;

        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file, falling back to defaults if it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let config = Self::from_file(path)?;
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        } else {
            info!(path = %path.display(), "No config file, using defaults");
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.grid.validate()?;
        self.physics.validate()?;
        self.display.validate()?;
        self.recording.validate()?;
        self.source.validate(self.grid.l())?;

        if self.courant() > 1.0 {
            warn!(
                courant = self.courant(),
                "Courant coefficient exceeds 1, the scheme will be unstable"
            );
        }
        Ok(())
    }

    /// Grid spacing over the unit square.
    pub fn dx(&self) -> f64 {
        1.0 / self.grid.l() as f64
    }

    /// Courant coefficient (v * dt / dx)^2.
    pub fn courant(&self) -> f64 {
        (self.physics.wave_speed * self.physics.dt / self.dx()).powi(2)
    }

    pub fn log_summary(&self) {
        info!(
            l = self.grid.l(),
            dx = self.dx(),
            wave_speed = self.physics.wave_speed,
            dt = self.physics.dt,
            courant = self.courant(),
            "Grid and physics"
        );
        info!(
            x = self.source.x,
            y = self.source.y,
            amplitude = self.source.amplitude,
            frequency = self.source.frequency,
            omega = self.source.omega,
            "Source"
        );
    }
}
