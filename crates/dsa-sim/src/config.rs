//! # Configuration
//!
//! YAML configuration for a generation run. Every section has defaults, so a
//! file only needs the values it changes.
//!
//! ## Configuration Search Path
//!
//! Configuration is loaded from the first file found:
//! 1. Path specified via `DSA_CONFIG` environment variable
//! 2. `./dsa.yaml` (current directory)
//! 3. `~/.config/dsa/config.yaml` (user config)
//! 4. `/etc/dsa/config.yaml` (system config)
//!
//! ## Example Configuration
//!
//! ```yaml
//! run:
//!   samples: 10000
//!   workers: 8
//!   tag: square100
//!
//! pus:
//!   mode: dynamic
//!   min_on: 5
//!   max_on: 10
//!
//! cs:
//!   enabled: true
//!   interpolation: ok
//! ```

use crate::logging::LogConfig;
use dsa_core::{CsParams, InterferenceMethod, Interpolation, OracleParams, PurLayout, Shape};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Error type for configuration operations.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found
    NotFound(String),
    /// Failed to read or write a configuration file
    ReadError(String),
    /// Failed to parse configuration
    ParseError(String),
    /// Invalid configuration value
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(msg) => write!(f, "config not found: {}", msg),
            ConfigError::ReadError(msg) => write!(f, "failed to read config: {}", msg),
            ConfigError::ParseError(msg) => write!(f, "failed to parse config: {}", msg),
            ConfigError::ValidationError(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

fn invalid(msg: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(msg.into())
}

/// Run-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Total samples over all workers
    pub samples: usize,
    pub workers: usize,
    /// Worker `w` seeds its RNG with `seed + w`
    pub seed: u64,
    /// Directory for sample files
    pub output_dir: PathBuf,
    /// Appended to every file name
    pub tag: String,
    /// Meters per cell
    pub cell_size: f64,
    /// dB
    pub noise_floor: f64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            samples: 1000,
            workers: 4,
            seed: 0,
            output_dir: PathBuf::from("data"),
            tag: "square100".to_string(),
            cell_size: 10.0,
            noise_floor: -90.0,
        }
    }
}

impl RunConfig {
    pub fn oracle_params(&self) -> OracleParams {
        OracleParams {
            cell_size: self.cell_size,
            noise_floor: self.noise_floor,
        }
    }
}

/// Field geometry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldConfig {
    pub shape: Shape,
    /// JSON `[[f64]]` table of PU placement weights; uniform when absent
    pub pu_weights: Option<PathBuf>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            shape: Shape::Square { length: 100 },
            pu_weights: None,
        }
    }
}

/// Propagation model selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PropagationConfig {
    /// `10·alpha·log10(d)` with optional Gaussian shadowing
    LogDistance {
        alpha: f64,
        #[serde(default)]
        std: f64,
    },
    /// Precomputed JSON path loss table
    PathLossMap { path: PathBuf },
}

impl Default for PropagationConfig {
    fn default() -> Self {
        PropagationConfig::LogDistance { alpha: 3.0, std: 0.0 }
    }
}

/// Whether PUs move between samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PuMode {
    /// Placed once, always ON
    Static,
    /// New ON subset, locations and powers every sample
    #[default]
    Dynamic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PuConfig {
    /// Size of the PU population
    pub count: usize,
    pub mode: PuMode,
    /// ON PUs per dynamic sample, inclusive bounds
    pub min_on: usize,
    pub max_on: usize,
    pub min_power: f64,
    pub max_power: f64,
    pub height: f64,
    pub purs: PurLayout,
}

impl Default for PuConfig {
    fn default() -> Self {
        Self {
            count: 20,
            mode: PuMode::Dynamic,
            min_on: 5,
            max_on: 10,
            min_power: -30.0,
            max_power: 0.0,
            height: 30.0,
            purs: PurLayout {
                count: 5,
                method: InterferenceMethod::Beta,
                value: 1.0,
                min_dist: 1.0,
                max_dist: 3.0,
                height: 15.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuConfig {
    /// SUs per sample, inclusive bounds; the last one requests
    pub min_count: usize,
    pub max_count: usize,
    pub min_power: f64,
    pub max_power: f64,
    pub height: f64,
    /// Receivers are placed within this many cells of their SU
    pub rx_radius: f64,
}

impl Default for SuConfig {
    fn default() -> Self {
        Self {
            min_count: 1,
            max_count: 1,
            min_power: -30.0,
            max_power: 0.0,
            height: 15.0,
            rx_radius: 30.0,
        }
    }
}

/// Sensor deployment. Loaded from `path` when set, otherwise scattered
/// uniformly with the run seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SensorConfig {
    pub path: Option<PathBuf>,
    pub count: usize,
    pub height: f64,
    pub std: f64,
    pub cost: f64,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            path: None,
            count: 100,
            height: 15.0,
            std: 1.0,
            cost: 1.0,
        }
    }
}

/// Crowd-sourced comparison.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CsConfig {
    pub enabled: bool,
    pub k_pu: usize,
    pub k_ss: usize,
    pub interpolation: Interpolation,
    pub alpha: f64,
    pub detrended: bool,
}

impl Default for CsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            k_pu: 3,
            k_ss: 5,
            interpolation: Interpolation::Idw,
            alpha: 3.0,
            detrended: true,
        }
    }
}

impl CsConfig {
    pub fn params(&self, cell_size: f64) -> CsParams {
        CsParams {
            k_pu: self.k_pu,
            k_ss: self.k_ss,
            interpolation: self.interpolation,
            alpha: self.alpha,
            cell_size,
            detrended: self.detrended,
        }
    }
}

/// Optional per-sample outputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtrasConfig {
    /// Joint power vector for all SUs (`suMaxTotal` files)
    pub joint: bool,
    pub joint_max_iterations: usize,
    /// Synthetic PU samples (`syntheticPu` files)
    pub synthetic: bool,
    /// Meters; PUs farther than this from the binding PU may be lowered
    pub max_trans_radius: f64,
    /// Average SU data rate in the summary
    pub data_rate: bool,
    pub bandwidth_hz: f64,
    /// Spread of the oracle answer over a short SU random walk, once per run
    pub spread: bool,
    pub spread_steps: usize,
    /// Cells per step, upper bound
    pub spread_radius: f64,
}

impl Default for ExtrasConfig {
    fn default() -> Self {
        Self {
            joint: false,
            joint_max_iterations: dsa_core::joint::DEFAULT_MAX_ITERATIONS,
            synthetic: false,
            max_trans_radius: 500.0,
            data_rate: false,
            bandwidth_hz: 1e6,
            spread: false,
            spread_steps: 500,
            spread_radius: 1.0,
        }
    }
}

/// Complete generator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    pub run: RunConfig,
    pub field: FieldConfig,
    pub propagation: PropagationConfig,
    pub pus: PuConfig,
    pub sus: SuConfig,
    pub sensors: SensorConfig,
    pub cs: CsConfig,
    pub extras: ExtrasConfig,
    pub logging: LogConfig,
}

impl SimConfig {
    /// Load configuration from the default search path.
    ///
    /// Returns the default config if no file is found.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = std::env::var("DSA_CONFIG") {
            if Path::new(&path).exists() {
                return Self::load_from(Path::new(&path));
            }
        }

        for path in &Self::config_search_paths() {
            if path.exists() {
                return Self::load_from(path);
            }
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Save configuration to a file.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            serde_yaml::to_string(self).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        std::fs::write(path, content)
            .map_err(|e| ConfigError::ReadError(format!("{}: {}", path.display(), e)))
    }

    pub fn config_search_paths() -> Vec<PathBuf> {
        let mut paths = vec![PathBuf::from("./dsa.yaml")];

        if let Some(config_dir) = directories::ProjectDirs::from("", "", "dsa") {
            paths.push(config_dir.config_dir().join("config.yaml"));
        }

        paths.push(PathBuf::from("/etc/dsa/config.yaml"));

        paths
    }

    /// Check bounds and cross-section consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let run = &self.run;
        if run.workers == 0 {
            return Err(invalid("run.workers must be > 0"));
        }
        if !(run.cell_size > 0.0) {
            return Err(invalid("run.cell_size must be positive"));
        }

        if self.field.shape.cell_count() == 0 {
            return Err(invalid("field.shape must have a non-zero area"));
        }

        match &self.propagation {
            PropagationConfig::LogDistance { alpha, std } => {
                if !(*alpha > 0.0) || *std < 0.0 {
                    return Err(invalid("propagation alpha must be > 0 and std >= 0"));
                }
            }
            PropagationConfig::PathLossMap { path } => {
                if path.as_os_str().is_empty() {
                    return Err(invalid("propagation.path is empty"));
                }
            }
        }

        let pus = &self.pus;
        if pus.min_on > pus.max_on || pus.max_on > pus.count {
            return Err(invalid(format!(
                "pus: need min_on <= max_on <= count, got {} / {} / {}",
                pus.min_on, pus.max_on, pus.count
            )));
        }
        if pus.min_power > pus.max_power {
            return Err(invalid("pus.min_power is larger than pus.max_power"));
        }
        pus.purs
            .validate()
            .map_err(|e| invalid(format!("pus.purs: {e}")))?;

        let sus = &self.sus;
        if sus.min_count == 0 || sus.min_count > sus.max_count {
            return Err(invalid("sus: need 1 <= min_count <= max_count"));
        }
        if sus.min_power > sus.max_power {
            return Err(invalid("sus.min_power is larger than sus.max_power"));
        }

        if self.cs.enabled && (self.cs.k_pu == 0 || self.cs.k_ss == 0) {
            return Err(invalid("cs.k_pu and cs.k_ss must be > 0"));
        }
        if self.extras.joint && self.extras.joint_max_iterations == 0 {
            return Err(invalid("extras.joint_max_iterations must be > 0"));
        }
        if self.extras.data_rate && !(self.extras.bandwidth_hz > 0.0) {
            return Err(invalid("extras.bandwidth_hz must be positive"));
        }
        if self.extras.spread && (self.extras.spread_steps == 0 || !(self.extras.spread_radius > 0.0)) {
            return Err(invalid("extras.spread_steps and extras.spread_radius must be positive"));
        }

        Ok(())
    }

    /// Generate example configuration YAML.
    pub fn example_yaml() -> String {
        let config = Self {
            cs: CsConfig {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };

        serde_yaml::to_string(&config).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SimConfig::default();
        assert_eq!(config.run.workers, 4);
        assert_eq!(config.field.shape, Shape::Square { length: 100 });
        assert_eq!(config.pus.mode, PuMode::Dynamic);
        assert!(!config.cs.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
run:
  samples: 500
  workers: 2
  cell_size: 5.0

field:
  shape:
    kind: rectangle
    width: 40
    length: 60

propagation:
  kind: log_distance
  alpha: 3.5
  std: 1.0

pus:
  mode: static
  count: 4
  min_on: 4
  max_on: 4
  purs:
    count: 3
    method: threshold
    value: -80.0
    min_dist: 1.0
    max_dist: 2.0
    height: 10.0

cs:
  enabled: true
  interpolation: ildw
  k_ss: 7
"#;

        let config = SimConfig::parse(yaml).unwrap();
        assert_eq!(config.run.samples, 500);
        assert_eq!(config.run.workers, 2);
        assert_eq!(config.run.cell_size, 5.0);
        assert_eq!(config.field.shape, Shape::Rectangle { width: 40, length: 60 });
        assert_eq!(config.propagation, PropagationConfig::LogDistance { alpha: 3.5, std: 1.0 });
        assert_eq!(config.pus.mode, PuMode::Static);
        assert_eq!(config.pus.purs.method, InterferenceMethod::Threshold);
        assert!(config.cs.enabled);
        assert_eq!(config.cs.interpolation, Interpolation::Ildw);
        assert_eq!(config.cs.k_ss, 7);
        assert_eq!(config.cs.k_pu, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
run:
  tag: "exp1"
propagation:
  kind: path_loss_map
  path: "maps/losses.json"
"#;

        let config = SimConfig::parse(yaml).unwrap();
        assert_eq!(config.run.tag, "exp1");
        assert_eq!(
            config.propagation,
            PropagationConfig::PathLossMap { path: PathBuf::from("maps/losses.json") }
        );
        // Defaults should be applied
        assert_eq!(config.run.noise_floor, -90.0);
        assert_eq!(config.sus.rx_radius, 30.0);
    }

    #[test]
    fn test_validation() {
        let mut config = SimConfig::default();
        config.pus.max_on = config.pus.count + 1;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.pus.purs.min_dist = 5.0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.sus.min_count = 0;
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.cs.enabled = true;
        config.cs.k_ss = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ValidationError(_))));

        let mut config = SimConfig::default();
        config.field.shape = Shape::Rectangle { width: 0, length: 60 };
        assert!(config.validate().is_err());

        let mut config = SimConfig::default();
        config.extras.spread = true;
        config.extras.spread_radius = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_example_yaml() {
        let yaml = SimConfig::example_yaml();
        assert!(yaml.contains("run:"));
        assert!(yaml.contains("propagation:"));
        let parsed = SimConfig::parse(&yaml).unwrap();
        assert!(parsed.cs.enabled);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dsa.yaml");
        let mut config = SimConfig::default();
        config.run.samples = 42;
        config.save(&path).unwrap();

        let loaded = SimConfig::load_from(&path).unwrap();
        assert_eq!(loaded.run.samples, 42);
        assert!(matches!(
            SimConfig::load_from(&dir.path().join("missing.yaml")),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_config_search_paths() {
        let paths = SimConfig::config_search_paths();
        assert!(paths[0].ends_with("dsa.yaml"));
        assert!(paths.last().unwrap().starts_with("/etc/dsa"));
    }
}
