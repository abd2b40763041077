//! Configuration loading and typed config structures for the fleet
//! simulation.
//!
//! The canonical configuration lives in `tpg-config.yaml` at the project
//! root. Run-level sections (`simulation`, `input`, `output`, `logging`,
//! `forecaster`) are defined here; the fleet sections reuse the parameter
//! structs of [`tpg_fleet::config`].
//!
//! Loading and validation are separate steps: [`SimulationConfig::parse`]
//! only checks that the YAML has the right shape, and
//! [`SimulationConfig::validate`] checks that the values make sense.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

use tpg_fleet::{
    FleetError, LogisticsParams, NavigationParams, StorageBaseParams, SupportShipParams,
    TpgShipParams,
};

/// Format of `simulation.start_time` and `simulation.end_time` (UTC).
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but its values are inconsistent.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Description of the violated constraint.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

impl From<FleetError> for ConfigError {
    fn from(source: FleetError) -> Self {
        Self::Invalid {
            reason: source.to_string(),
        }
    }
}

/// Top-level simulation configuration.
///
/// Mirrors the structure of `tpg-config.yaml`. Every section is optional;
/// only the fleet itself (`tpg_ships`) must be given for a valid run.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SimulationConfig {
    /// Time range and tick length.
    #[serde(default)]
    pub simulation: RunConfig,

    /// Input data locations.
    #[serde(default)]
    pub input: InputConfig,

    /// Output locations.
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Forecast horizon and error model.
    #[serde(default)]
    pub forecaster: ForecasterConfig,

    /// The generation fleet, one entry per ship.
    #[serde(default)]
    pub tpg_ships: Vec<TpgShipParams>,

    /// The storage base.
    #[serde(default)]
    pub storage_base: StorageBaseParams,

    /// The support fleet, one entry per ship.
    #[serde(default)]
    pub support_ships: Vec<SupportShipParams>,

    /// Rendezvous rules.
    #[serde(default)]
    pub logistics: LogisticsParams,

    /// Navigable-water mask.
    #[serde(default)]
    pub navigation: NavigationParams,
}

impl SimulationConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values (see
    /// [`SimulationConfig::apply_env_overrides`]).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if the content is not valid YAML.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        // An empty document deserializes as unit, not as an empty map.
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override paths from the environment:
    ///
    /// - `TPG_TYPHOON_DATA` overrides `input.typhoon_data_path`
    /// - `TPG_OUTPUT_PATH` overrides `output.tick_log_path`
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TPG_TYPHOON_DATA") {
            self.input.typhoon_data_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TPG_OUTPUT_PATH") {
            self.output.tick_log_path = PathBuf::from(val);
        }
    }

    /// Check every section for consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated
    /// constraint.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.simulation.tick_hours == 0 {
            return Err(invalid("simulation.tick_hours must be at least 1"));
        }
        if let (Some(start), Some(end)) = (self.simulation.start()?, self.simulation.end()?) {
            if end < start {
                return Err(invalid(format!(
                    "simulation.end_time ({end}) is before start_time ({start})"
                )));
            }
        }
        let slope = self.forecaster.forecast_error_slope;
        if !(slope.is_finite() && slope >= 0.0) {
            return Err(invalid(format!(
                "forecaster.forecast_error_slope must be non-negative, got {slope}"
            )));
        }

        if self.tpg_ships.is_empty() {
            return Err(invalid("tpg_ships must list at least one ship"));
        }
        for (index, ship) in self.tpg_ships.iter().enumerate() {
            ship.validate(&format!("tpg_ships[{index}]"))?;
        }
        self.storage_base.validate()?;
        for (index, support) in self.support_ships.iter().enumerate() {
            support.validate(&format!("support_ships[{index}]"))?;
        }
        self.logistics.validate()?;

        if let Some(band) = self
            .navigation
            .sea_bands
            .iter()
            .find(|band| band.min_lat >= band.max_lat)
        {
            return Err(invalid(format!(
                "navigation.sea_bands: empty band {} -> {}",
                band.min_lat, band.max_lat
            )));
        }
        Ok(())
    }
}

/// Run time range and tick length.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// First simulated instant (`%Y-%m-%d %H:%M:%S`, UTC). Defaults to the
    /// first typhoon observation.
    #[serde(default)]
    pub start_time: Option<String>,

    /// Last simulated instant. Defaults to the last typhoon observation.
    #[serde(default)]
    pub end_time: Option<String>,

    /// Tick length in hours.
    #[serde(default = "default_tick_hours")]
    pub tick_hours: u32,

    /// Optional cap on the number of ticks run.
    #[serde(default)]
    pub max_ticks: Option<u64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            end_time: None,
            tick_hours: default_tick_hours(),
            max_ticks: None,
        }
    }
}

impl RunConfig {
    /// The configured start time, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value does not match
    /// [`TIME_FORMAT`].
    pub fn start(&self) -> Result<Option<DateTime<Utc>>, ConfigError> {
        self.start_time
            .as_deref()
            .map(|raw| parse_time("simulation.start_time", raw))
            .transpose()
    }

    /// The configured end time, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the value does not match
    /// [`TIME_FORMAT`].
    pub fn end(&self) -> Result<Option<DateTime<Utc>>, ConfigError> {
        self.end_time
            .as_deref()
            .map(|raw| parse_time("simulation.end_time", raw))
            .transpose()
    }
}

/// Input data configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InputConfig {
    /// Path of the typhoon track CSV.
    #[serde(default = "default_typhoon_data_path")]
    pub typhoon_data_path: PathBuf,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            typhoon_data_path: default_typhoon_data_path(),
        }
    }
}

/// Output configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OutputConfig {
    /// Path of the per-tick JSON-lines log.
    #[serde(default = "default_tick_log_path")]
    pub tick_log_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            tick_log_path: default_tick_log_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error). `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// Forecaster configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ForecasterConfig {
    /// Maximum forecast horizon in hours.
    #[serde(default = "default_forecast_time")]
    pub forecast_time: u32,

    /// Growth of the forecast error radius, km per hour ahead. Zero is a
    /// perfect forecast.
    #[serde(default)]
    pub forecast_error_slope: f64,

    /// Seed for reproducible scatter of predicted positions. Without a seed
    /// predicted positions are the observed ones.
    #[serde(default)]
    pub noise_seed: Option<u64>,
}

impl Default for ForecasterConfig {
    fn default() -> Self {
        Self {
            forecast_time: default_forecast_time(),
            forecast_error_slope: 0.0,
            noise_seed: None,
        }
    }
}

/// Parse a configured timestamp in [`TIME_FORMAT`] as UTC.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] naming `field` if the value does not
/// parse.
pub fn parse_time(field: &str, raw: &str) -> Result<DateTime<Utc>, ConfigError> {
    NaiveDateTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|err| invalid(format!("{field}: cannot parse {raw:?}: {err}")))
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Default value functions for serde
// ---------------------------------------------------------------------------

const fn default_tick_hours() -> u32 {
    6
}

fn default_typhoon_data_path() -> PathBuf {
    PathBuf::from("data/typhoon_sample.csv")
}

fn default_tick_log_path() -> PathBuf {
    PathBuf::from("output/ticks.jsonl")
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_forecast_time() -> u32 {
    120
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use tpg_types::StorageMethod;

    use super::*;

    const FULL: &str = r#"
simulation:
  start_time: "2019-09-01 00:00:00"
  end_time: "2019-09-30 18:00:00"
  tick_hours: 6
  max_ticks: 40

forecaster:
  forecast_time: 72
  forecast_error_slope: 1.5
  noise_seed: 7

logging:
  level: debug
  json: true

tpg_ships:
  - initial_position: [24.0, 153.0]
    storage_method: hydrogen
    max_storage_wh: 1.0e10
    generator_output_w: 1.0e8
    ship_return_speed_kt: 8
    ship_max_speed_kt: 20
    forecast_weight: 30
    typhoon_effective_range: 150

storage_base:
  locate: [24.0, 153.0]
  max_storage_wh: 1.0e12
  transfer_rate_w: 5.0e8

support_ships:
  - max_storage_wh: 1.0e10
    ship_speed_kt: 15

logistics:
  rendezvous_min_storage_per: 90

navigation:
  sea_bands: []
"#;

    #[test]
    fn default_config_fails_without_fleet() {
        let config = SimulationConfig::default();
        assert_eq!(config.simulation.tick_hours, 6);
        assert_eq!(config.forecaster.forecast_time, 120);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn parse_full_yaml() {
        let config = SimulationConfig::parse(FULL).unwrap();
        config.validate().unwrap();

        assert_eq!(config.simulation.max_ticks, Some(40));
        assert_eq!(
            config.simulation.start().unwrap(),
            Some(Utc.with_ymd_and_hms(2019, 9, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(config.forecaster.noise_seed, Some(7));
        assert!(config.logging.json);

        let ship = config.tpg_ships.first().unwrap();
        assert_eq!(ship.storage_method, StorageMethod::Hydrogen);
        assert!((ship.forecast_weight - 30.0).abs() < f64::EPSILON);
        // Unset decision parameters keep their defaults.
        assert!((ship.judge_time_times - 1.2).abs() < f64::EPSILON);

        assert_eq!(config.storage_base.transfer_rate_w, Some(5.0e8));
        assert_eq!(config.support_ships.len(), 1);
        assert!((config.logistics.rendezvous_tolerance_km - 1.0).abs() < f64::EPSILON);
        assert!(config.navigation.sea_bands.is_empty());
    }

    #[test]
    fn parse_empty_yaml() {
        let config = SimulationConfig::parse("").unwrap();
        assert!(config.tpg_ships.is_empty());
        assert_eq!(config.navigation, NavigationParams::default());
    }

    #[test]
    fn rejects_bad_time() {
        let yaml = FULL.replace("2019-09-30 18:00:00", "30/09/2019");
        let config = SimulationConfig::parse(&yaml).unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));
    }

    #[test]
    fn rejects_end_before_start() {
        let yaml = FULL.replace("2019-09-30 18:00:00", "2019-08-30 18:00:00");
        let config = SimulationConfig::parse(&yaml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_invalid_ship() {
        let yaml = FULL.replace("forecast_weight: 30", "forecast_weight: 130");
        let config = SimulationConfig::parse(&yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("tpg_ships[0]"), "{err}");
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(matches!(
            SimulationConfig::parse("tpg_ships: {"),
            Err(ConfigError::Yaml { .. })
        ));
    }

    #[test]
    fn load_project_config_file() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("..")
            .join("..")
            .join("tpg-config.yaml");
        if path.exists() {
            let config = SimulationConfig::from_file(&path);
            assert!(config.is_ok(), "Failed to load project config: {config:?}");
            assert!(config.unwrap().validate().is_ok());
        }
    }
}
