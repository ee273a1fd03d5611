//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `gattlink.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use serde::Deserialize;

use gattlink_adapter_ble::BleConfig;
use gattlink_domain::proximity::AlertOption;
use gattlink_domain::rgb::RgbColor;

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Peripheral discovery and connection.
    pub ble: BleConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Which service sessions to run.
    pub services: ServicesConfig,
    /// One-shot writes performed once the sessions are started.
    pub actions: ActionsConfig,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
}

/// Per-service toggles.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct ServicesConfig {
    pub battery: bool,
    pub find_me: bool,
    pub thermometer: bool,
    pub health_thermometer: bool,
    pub rgb_light: bool,
}

/// Writes to perform after start.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ActionsConfig {
    /// Alert level the peripheral raises when the link drops.
    pub link_loss_alert: Option<AlertOption>,
    /// Alert to raise immediately.
    pub immediate_alert: Option<AlertOption>,
    /// Color to set on the RGB LED.
    pub rgb_color: Option<ColorConfig>,
}

/// Raw color channels as written in the file, validated on load.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ColorConfig {
    pub red: i64,
    pub green: i64,
    pub blue: i64,
    pub intensity: i64,
}

impl ColorConfig {
    /// Validate the channels into a color.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] for a channel outside `0..=255`.
    pub fn to_color(self) -> Result<RgbColor, ConfigError> {
        RgbColor::new(self.red, self.green, self.blue, self.intensity)
            .map_err(|err| ConfigError::Validation(format!("actions.rgb_color: {err}")))
    }
}

impl Config {
    /// Load configuration from `gattlink.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("gattlink.toml")?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("GATTLINK_DEVICE_NAME") {
            self.ble.name_filter = Some(val);
        }
        if let Ok(val) = std::env::var("GATTLINK_DEVICE_ADDRESS") {
            self.ble.address_filter = val
                .split(',')
                .map(str::trim)
                .filter(|address| !address.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Ok(val) = std::env::var("GATTLINK_LOG") {
            self.logging.filter = val;
        }
        if let Ok(val) = std::env::var("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.ble.scan_duration_secs == 0 {
            return Err(ConfigError::Validation(
                "ble.scan_duration_secs must be non-zero".to_string(),
            ));
        }
        if !self.services.any_enabled() {
            return Err(ConfigError::Validation(
                "at least one service must be enabled".to_string(),
            ));
        }
        if (self.actions.link_loss_alert.is_some() || self.actions.immediate_alert.is_some())
            && !self.services.find_me
        {
            return Err(ConfigError::Validation(
                "alert actions require services.find_me".to_string(),
            ));
        }
        if let Some(color) = self.actions.rgb_color {
            if !self.services.rgb_light {
                return Err(ConfigError::Validation(
                    "actions.rgb_color requires services.rgb_light".to_string(),
                ));
            }
            color.to_color()?;
        }
        Ok(())
    }
}

impl ServicesConfig {
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.battery
            || self.find_me
            || self.thermometer
            || self.health_thermometer
            || self.rgb_light
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "gattlink=info,gattlink_app=info,gattlink_adapter_ble=info".to_string(),
        }
    }
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            battery: true,
            find_me: true,
            thermometer: false,
            health_thermometer: true,
            rgb_light: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
