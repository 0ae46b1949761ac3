use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::HoverError;
use crate::types::Position;

const CONFIG_FILE: &str = "hover";
const ENV_PREFIX: &str = "HOVER";

/// Proportional Integral Derivative gains, shared by the roll and pitch axes
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct Gains {
    pub kp: f64,
    pub ki: f64,
    pub kd: f64,
    /// Bound of the integral term, both signs
    pub integrator_max: f64,
}

impl Default for Gains {
    fn default() -> Self {
        Self {
            kp: 1.67,
            ki: 0.29,
            kd: 2.73,
            integrator_max: 1.0,
        }
    }
}

/// Inclusive range of PWM values
#[derive(Serialize, Deserialize, Copy, Clone, Debug, PartialEq)]
pub struct PwmBand {
    pub min: f64,
    pub max: f64,
}

impl PwmBand {
    pub const TRANSPORT: PwmBand = PwmBand {
        min: 1000.0,
        max: 2000.0,
    };
    pub const AUTONOMOUS: PwmBand = PwmBand {
        min: 1200.0,
        max: 1800.0,
    };

    pub fn limit(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn is_within(&self, other: &PwmBand) -> bool {
        other.contains(self.min) && other.contains(self.max)
    }
}

/// Band as written in the parameters, either bound may be left out
#[derive(Deserialize)]
struct BandOverride {
    min: Option<f64>,
    max: Option<f64>,
}

impl BandOverride {
    fn over(self, base: PwmBand) -> PwmBand {
        PwmBand {
            min: self.min.unwrap_or(base.min),
            max: self.max.unwrap_or(base.max),
        }
    }
}

fn autonomous_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PwmBand, D::Error> {
    BandOverride::deserialize(deserializer).map(|band| band.over(PwmBand::AUTONOMOUS))
}

fn transport_band<'de, D: Deserializer<'de>>(deserializer: D) -> Result<PwmBand, D::Error> {
    BandOverride::deserialize(deserializer).map(|band| band.over(PwmBand::TRANSPORT))
}

/// Hover parameters as read from `hover.toml` and `HOVER_*` variables
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HoverParameters {
    /// Control loop period in seconds
    pub period: f64,
    /// Write one CSV telemetry file per run
    pub logging: bool,
    pub log_dir: PathBuf,
    /// Give up if the position feed stays silent this long (seconds)
    pub startup_timeout: f64,
    /// Readiness polling period in seconds
    pub feed_poll: f64,
    /// UDP address the position feed is received on
    pub feed_addr: String,
    /// Serial device of the flight controller
    pub serial_device: PathBuf,
    /// Position to hold in the motion capture frame
    pub target: Position,
    pub gains: Gains,
    /// Roll and pitch limits while position hold is engaged
    #[serde(deserialize_with = "autonomous_band")]
    pub autonomous_band: PwmBand,
    /// Limits accepted by the flight controller on every channel
    #[serde(deserialize_with = "transport_band")]
    pub transport_band: PwmBand,
}

impl Default for HoverParameters {
    fn default() -> Self {
        Self {
            target: Position::default(),
            gains: Gains::default(),
            period: 0.0125,
            logging: true,
            log_dir: PathBuf::from("logs"),
            autonomous_band: PwmBand::AUTONOMOUS,
            transport_band: PwmBand::TRANSPORT,
            startup_timeout: 60.0,
            feed_poll: 0.5,
            feed_addr: String::from("0.0.0.0:51001"),
            serial_device: PathBuf::from("/dev/ttyUSB0"),
        }
    }
}

impl HoverParameters {
    /// Load defaults, then `hover.toml` if present, then the environment
    pub fn load() -> Result<Self> {
        config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Cannot read configuration")?
            .try_deserialize()
            .context("Cannot parse configuration")
    }

    pub fn dump(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Cannot serialize configuration")
    }

    /// Validate the parameters into the immutable configuration of the control loop
    pub fn control_config(&self) -> Result<ControlConfig, HoverError> {
        let period = seconds("period", self.period)?;
        let startup_timeout = seconds("startup_timeout", self.startup_timeout)?;
        let feed_poll = seconds("feed_poll", self.feed_poll)?;

        if !(self.gains.integrator_max.is_finite() && self.gains.integrator_max > 0.0) {
            return Err(HoverError::Config(format!(
                "integrator_max must be positive, got {}",
                self.gains.integrator_max
            )));
        }
        for band in [&self.transport_band, &self.autonomous_band] {
            if !(band.min < band.max) {
                return Err(HoverError::Config(format!("empty PWM band {:?}", band)));
            }
        }
        if !self.autonomous_band.is_within(&self.transport_band) {
            return Err(HoverError::Config(format!(
                "autonomous band {:?} exceeds transport band {:?}",
                self.autonomous_band, self.transport_band
            )));
        }

        Ok(ControlConfig {
            target: self.target,
            gains: self.gains,
            period,
            logging: self.logging,
            log_dir: self.log_dir.clone(),
            autonomous_band: self.autonomous_band,
            transport_band: self.transport_band,
            startup_timeout,
            feed_poll,
        })
    }
}

fn seconds(name: &str, value: f64) -> Result<Duration, HoverError> {
    if value.is_finite() && value > 0.0 {
        Ok(Duration::from_secs_f64(value))
    } else {
        Err(HoverError::Config(format!("{} must be a positive duration, got {}", name, value)))
    }
}

/// Validated control loop configuration, fixed for a run
#[derive(Debug, Clone, PartialEq)]
pub struct ControlConfig {
    pub target: Position,
    pub gains: Gains,
    pub period: Duration,
    pub logging: bool,
    pub log_dir: PathBuf,
    pub autonomous_band: PwmBand,
    pub transport_band: PwmBand,
    pub startup_timeout: Duration,
    pub feed_poll: Duration,
}
