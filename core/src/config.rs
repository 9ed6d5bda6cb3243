//! Filter configuration
//!
//! A filter is described by a small mapping whose `type` key selects the filter variant. Only
//! the particle filter (`type = "pf"`) exists today, but the tag is modelled as a closed enum so
//! further variants can be added without changing how configurations are loaded or how
//! [`crate::particle::create`] is called.
//!
//! Configurations can be read from and written to JSON, YAML, or TOML files. The format is chosen
//! by file extension:
//!
//! ```toml
//! type = "pf"
//! p_num = 100
//! p_resample = 50
//! resample_threshold = 50.0
//! resampling = "systematic"
//! seed = 42
//! ```
use crate::error::{FilterError, Result};
use crate::particle::ParticleResamplingStrategy;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

/// Tag value identifying the particle filter variant
pub const PARTICLE_FILTER_TYPE: &str = "pf";

/// Supported configuration file formats
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Json,
    Yaml,
    Toml,
}
impl ConfigFormat {
    /// Pick the format from a file extension (.json/.yaml/.yml/.toml)
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let ext = path
            .as_ref()
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_lowercase());
        match ext.as_deref() {
            Some("json") => Ok(ConfigFormat::Json),
            Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            _ => Err(io::Error::new(io::ErrorKind::InvalidInput, "unsupported file extension").into()),
        }
    }
    fn parse<T: DeserializeOwned>(&self, text: &str) -> Result<T> {
        match self {
            ConfigFormat::Json => {
                serde_json::from_str(text).map_err(|e| FilterError::Parse(e.to_string()))
            }
            ConfigFormat::Yaml => {
                serde_yaml::from_str(text).map_err(|e| FilterError::Parse(e.to_string()))
            }
            ConfigFormat::Toml => toml::from_str(text).map_err(|e| FilterError::Parse(e.to_string())),
        }
    }
    fn render<T: Serialize>(&self, value: &T) -> Result<String> {
        match self {
            ConfigFormat::Json => {
                serde_json::to_string_pretty(value).map_err(|e| FilterError::Parse(e.to_string()))
            }
            ConfigFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| FilterError::Parse(e.to_string()))
            }
            ConfigFormat::Toml => toml::to_string(value).map_err(|e| FilterError::Parse(e.to_string())),
        }
    }
}

/// Only the `type` key, read ahead of the full document so an unknown variant is reported as
/// such rather than as a generic parse failure.
#[derive(Deserialize)]
struct FilterTypeTag {
    #[serde(rename = "type")]
    filter_type: String,
}

/// Particle filter parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ParticleFilterConfig {
    /// Total number of particles (N)
    pub p_num: usize,
    /// Minimum particle count for resampling (N_resample). Validated against `p_num` but
    /// otherwise reserved: resampling always regenerates the full population.
    pub p_resample: usize,
    /// Effective sample size below which the particle set is resampled
    pub resample_threshold: f64,
    /// How source indices are drawn once resampling is triggered
    #[serde(default)]
    pub resampling: ParticleResamplingStrategy,
    /// Seed for the filter's random source. `None` seeds from OS entropy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}
impl Default for ParticleFilterConfig {
    fn default() -> Self {
        ParticleFilterConfig {
            p_num: 100,
            p_resample: 50,
            resample_threshold: 50.0,
            resampling: ParticleResamplingStrategy::default(),
            seed: None,
        }
    }
}
impl ParticleFilterConfig {
    pub fn new(p_num: usize, p_resample: usize, resample_threshold: f64) -> Self {
        ParticleFilterConfig {
            p_num,
            p_resample,
            resample_threshold,
            ..Default::default()
        }
    }
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn with_resampling(mut self, resampling: ParticleResamplingStrategy) -> Self {
        self.resampling = resampling;
        self
    }
    /// Check the parameters for internal consistency.
    ///
    /// # Errors
    /// [`FilterError::InvalidConfig`] if `p_num` or `p_resample` is zero, if `p_resample`
    /// exceeds `p_num`, or if the threshold is not a positive finite number.
    pub fn validate(&self) -> Result<()> {
        if self.p_num == 0 {
            return Err(FilterError::InvalidConfig(
                "p_num must be at least 1".to_string(),
            ));
        }
        if self.p_resample == 0 {
            return Err(FilterError::InvalidConfig(
                "p_resample must be at least 1".to_string(),
            ));
        }
        if self.p_resample > self.p_num {
            return Err(FilterError::InvalidConfig(format!(
                "p_resample ({}) must not exceed p_num ({})",
                self.p_resample, self.p_num
            )));
        }
        if !self.resample_threshold.is_finite() || self.resample_threshold <= 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "resample_threshold must be a positive number, got {}",
                self.resample_threshold
            )));
        }
        Ok(())
    }
}

/// Configuration of a non-parametric filter, tagged by its `type` key
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum FilterConfig {
    #[serde(rename = "pf")]
    Particle(ParticleFilterConfig),
}
impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig::Particle(ParticleFilterConfig::default())
    }
}
impl From<ParticleFilterConfig> for FilterConfig {
    fn from(config: ParticleFilterConfig) -> Self {
        FilterConfig::Particle(config)
    }
}
impl FilterConfig {
    /// The `type` tag of this configuration
    pub fn filter_type(&self) -> &'static str {
        match self {
            FilterConfig::Particle(_) => PARTICLE_FILTER_TYPE,
        }
    }
    /// Parse a configuration document in the given format.
    ///
    /// # Errors
    /// * [`FilterError::UnsupportedType`] if the `type` key names an unknown filter.
    /// * [`FilterError::Parse`] if the document is malformed or misses required keys.
    pub fn from_str_as(text: &str, format: ConfigFormat) -> Result<Self> {
        let tag: FilterTypeTag = format.parse(text)?;
        match tag.filter_type.as_str() {
            PARTICLE_FILTER_TYPE => format.parse(text),
            other => Err(FilterError::UnsupportedType(other.to_string())),
        }
    }
    /// Render the configuration as a document in the given format
    pub fn to_string_as(&self, format: ConfigFormat) -> Result<String> {
        format.render(self)
    }
    /// Write the configuration to a JSON file (pretty-printed).
    pub fn to_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_as(path, ConfigFormat::Json)
    }
    /// Read the configuration from a JSON file.
    pub fn from_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_as(path, ConfigFormat::Json)
    }
    /// Write the configuration as YAML.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_as(path, ConfigFormat::Yaml)
    }
    /// Read the configuration from YAML.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_as(path, ConfigFormat::Yaml)
    }
    /// Write the configuration as TOML.
    pub fn to_toml<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.write_as(path, ConfigFormat::Toml)
    }
    /// Read the configuration from TOML.
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_as(path, ConfigFormat::Toml)
    }
    /// Generic write: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let format = ConfigFormat::from_path(&path)?;
        self.write_as(path, format)
    }
    /// Generic read: choose format by file extension (.json/.yaml/.yml/.toml)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let format = ConfigFormat::from_path(&path)?;
        Self::read_as(path, format)
    }
    fn write_as<P: AsRef<Path>>(&self, path: P, format: ConfigFormat) -> Result<()> {
        let s = format.render(self)?;
        let mut file = File::create(path)?;
        file.write_all(s.as_bytes())?;
        Ok(())
    }
    fn read_as<P: AsRef<Path>>(path: P, format: ConfigFormat) -> Result<Self> {
        let mut s = String::new();
        let mut file = File::open(path)?;
        file.read_to_string(&mut s)?;
        Self::from_str_as(&s, format)
    }
}
