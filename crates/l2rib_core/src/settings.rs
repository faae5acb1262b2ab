//! Persistent user settings.
//!
//! Settings live in a TOML file under the platform config directory
//! (`~/.config/l2rib/l2rib.toml` on Linux). Every key is optional; missing
//! keys take the defaults below. Command-line flags override loaded values.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Name of the settings file inside the config directory.
pub const SETTINGS_FILE: &str = "l2rib.toml";

/// Errors reading or writing settings.
#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("could not resolve the user config directory")]
    NoConfigDir,

    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid settings file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("could not serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid shadow mode `{0}`, expected none, map, cache or raytrace")]
    ShadowMode(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// How a light casts shadows.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShadowMode {
    #[default]
    None,
    Map,
    Cache,
    Raytrace,
}

impl FromStr for ShadowMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(ShadowMode::None),
            "map" => Ok(ShadowMode::Map),
            "cache" => Ok(ShadowMode::Cache),
            "raytrace" => Ok(ShadowMode::Raytrace),
            other => Err(SettingsError::ShadowMode(other.to_string())),
        }
    }
}

impl fmt::Display for ShadowMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShadowMode::None => "none",
            ShadowMode::Map => "map",
            ShadowMode::Cache => "cache",
            ShadowMode::Raytrace => "raytrace",
        };
        f.write_str(name)
    }
}

/// A distant light aimed at the origin.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Light {
    pub position: [f32; 3],
    pub colour: [f32; 3],
    pub intensity: f32,
    #[serde(default)]
    pub shadow: ShadowMode,
}

impl Default for Light {
    fn default() -> Self {
        Self {
            position: [-1.0, -1.0, -1.0],
            colour: [1.0, 1.0, 1.0],
            intensity: 1.0,
            shadow: ShadowMode::None,
        }
    }
}

/// All user-configurable options.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// LDraw library root
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ldraw_dir: Option<PathBuf>,

    /// Installation directory holding `prebuilt/` and `shaders/`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2rib_dir: Option<PathBuf>,

    /// Working archive cache
    pub cache_dir: PathBuf,

    /// Where multi-document sub-units are written
    pub mpd_dir: PathBuf,

    /// Colour configuration; defaults to `<ldraw_dir>/ldconfig.ldr`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub colour_config: Option<PathBuf>,

    /// Reuse archives from earlier runs
    pub use_cache: bool,

    pub delayed_read_archive: bool,

    pub background: [f32; 3],
    pub camera_from: [f32; 3],
    pub camera_to: [f32; 3],
    pub camera_up: [f32; 3],

    /// Camera distance as a multiple of the model diagonal
    pub camera_distance: f32,

    /// Floor size as a multiple of the model diagonal; 0 disables the floor
    pub floor: f32,

    pub format: [u32; 2],
    pub pixel_samples: u32,
    pub shading_rate: f32,

    /// Shadow map resolution
    pub shadow_format: u32,

    pub raytrace: bool,
    pub lines: bool,
    pub stud_logo: bool,

    /// Render to a TIFF file next to the input instead of the framebuffer
    pub tiff: bool,

    pub lights: Vec<Light>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            ldraw_dir: None,
            l2rib_dir: None,
            cache_dir: PathBuf::from("cache"),
            mpd_dir: PathBuf::from("."),
            colour_config: None,
            use_cache: true,
            delayed_read_archive: true,
            background: [1.0, 1.0, 1.0],
            camera_from: [-1.0, -1.0, -1.0],
            camera_to: [0.0, 0.0, 0.0],
            camera_up: [0.0, -1.0, 0.0],
            camera_distance: 1.5,
            floor: 0.0,
            format: [640, 480],
            pixel_samples: 2,
            shading_rate: 1.0,
            shadow_format: 1024,
            raytrace: false,
            lines: false,
            stud_logo: false,
            tiff: false,
            lights: Vec::new(),
        }
    }
}

impl Settings {
    /// Default settings file location.
    pub fn default_path() -> SettingsResult<PathBuf> {
        let dirs = ProjectDirs::from("org", "levork", "l2rib").ok_or(SettingsError::NoConfigDir)?;
        Ok(dirs.config_dir().join(SETTINGS_FILE))
    }

    /// Load settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> SettingsResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&text).map_err(|source| SettingsError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Write settings as TOML, creating the parent directory if needed.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> SettingsResult<()> {
        let path = path.as_ref();
        let io_error = |source: std::io::Error| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(io_error)
    }

    /// Colour configuration file to load.
    pub fn colour_config_path(&self) -> PathBuf {
        match (&self.colour_config, &self.ldraw_dir) {
            (Some(path), _) => path.clone(),
            (None, Some(ldraw)) => ldraw.join("ldconfig.ldr"),
            (None, None) => PathBuf::from("ldconfig.ldr"),
        }
    }

    /// Read-only store of prebuilt archives.
    pub fn prebuilt_dir(&self) -> Option<PathBuf> {
        self.l2rib_dir.as_ref().map(|dir| dir.join("prebuilt"))
    }

    pub fn shader_dir(&self) -> Option<PathBuf> {
        self.l2rib_dir.as_ref().map(|dir| dir.join("shaders"))
    }

    /// Configured lights, or the single default light.
    pub fn effective_lights(&self) -> Vec<Light> {
        if self.lights.is_empty() {
            vec![Light::default()]
        } else {
            self.lights.clone()
        }
    }
}
