//! Acquisition settings applied to a session before capturing.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::error::AcquisitionError;

/// Structured-light reconstruction mode requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    /// Phase shifting. Fast, the usual default.
    #[default]
    Phase,
    /// Stripe patterns. Slower, more robust on shiny surfaces.
    Stripe,
}

impl Engine {
    /// Number of patterns projected per acquisition.
    pub fn pattern_count(self) -> u32 {
        match self {
            Engine::Phase => 13,
            Engine::Stripe => 33,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Engine::Phase => write!(f, "phase"),
            Engine::Stripe => write!(f, "stripe"),
        }
    }
}

impl std::str::FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "phase" => Ok(Engine::Phase),
            "stripe" => Ok(Engine::Stripe),
            other => Err(format!("unknown engine '{}' (expected phase or stripe)", other)),
        }
    }
}

/// Errors raised while loading settings from disk.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid settings file: {0}")]
    Json(#[from] serde_json::Error),
}

/// Capture parameters for one acquisition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AcquisitionSettings {
    /// Exposure per projected pattern.
    #[serde(rename = "exposure_time_us", with = "micros")]
    pub exposure_time: Duration,
    /// Lens f-number.
    pub aperture: f64,
    /// Drop points that deviate from their surface by more than `outlier_threshold` mm.
    pub outlier_removal: bool,
    pub outlier_threshold: f64,
    pub engine: Engine,
    /// Upper bound on one capture call.
    #[serde(rename = "capture_timeout_ms", with = "millis")]
    pub capture_timeout: Duration,
}

impl Default for AcquisitionSettings {
    fn default() -> Self {
        Self {
            exposure_time: Duration::from_micros(5000),
            aperture: 2.0,
            outlier_removal: true,
            outlier_threshold: 10.0,
            engine: Engine::Phase,
            capture_timeout: Duration::from_millis(5000),
        }
    }
}

impl AcquisitionSettings {
    /// Load settings from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, SettingsError> {
        let reader = BufReader::new(File::open(path)?);
        let settings: Self = serde_json::from_reader(reader)?;
        debug!("Loaded settings from {}: {:?}", path.display(), settings);
        Ok(settings)
    }

    /// Set the exposure time.
    pub fn with_exposure_time(mut self, exposure_time: Duration) -> Self {
        self.exposure_time = exposure_time;
        self
    }

    /// Set the aperture (f-number).
    pub fn with_aperture(mut self, aperture: f64) -> Self {
        self.aperture = aperture;
        self
    }

    /// Enable outlier removal with the given threshold, or disable it with `None`.
    pub fn with_outlier_removal(mut self, threshold: Option<f64>) -> Self {
        match threshold {
            Some(threshold) => {
                self.outlier_removal = true;
                self.outlier_threshold = threshold;
            }
            None => self.outlier_removal = false,
        }
        self
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_capture_timeout(mut self, timeout: Duration) -> Self {
        self.capture_timeout = timeout;
        self
    }
}

/// Ranges a device accepts for each setting.
#[derive(Debug, Clone, PartialEq)]
pub struct SettingsLimits {
    pub exposure_time: RangeInclusive<Duration>,
    pub aperture: RangeInclusive<f64>,
    pub outlier_threshold: RangeInclusive<f64>,
}

impl SettingsLimits {
    /// Check `settings` against these limits.
    pub fn check(&self, settings: &AcquisitionSettings) -> Result<(), AcquisitionError> {
        if !self.exposure_time.contains(&settings.exposure_time) {
            return Err(AcquisitionError::Config(format!(
                "exposure time {:?} outside {:?}..={:?}",
                settings.exposure_time,
                self.exposure_time.start(),
                self.exposure_time.end()
            )));
        }
        if !self.aperture.contains(&settings.aperture) {
            return Err(AcquisitionError::Config(format!(
                "aperture f/{} outside f/{}..=f/{}",
                settings.aperture,
                self.aperture.start(),
                self.aperture.end()
            )));
        }
        if settings.outlier_removal && !self.outlier_threshold.contains(&settings.outlier_threshold)
        {
            return Err(AcquisitionError::Config(format!(
                "outlier threshold {} outside {}..={} while outlier removal is enabled",
                settings.outlier_threshold,
                self.outlier_threshold.start(),
                self.outlier_threshold.end()
            )));
        }
        if settings.capture_timeout.is_zero() {
            return Err(AcquisitionError::Config("capture timeout must be positive".into()));
        }
        Ok(())
    }
}

mod micros {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_micros() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_micros)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn limits() -> SettingsLimits {
        SettingsLimits {
            exposure_time: Duration::from_micros(900)..=Duration::from_millis(100),
            aperture: 1.4..=32.0,
            outlier_threshold: 0.1..=100.0,
        }
    }

    #[test]
    fn test_defaults() {
        let s = AcquisitionSettings::default();
        assert_eq!(s.exposure_time, Duration::from_micros(5000));
        assert_eq!(s.aperture, 2.0);
        assert!(s.outlier_removal);
        assert_eq!(s.outlier_threshold, 10.0);
        assert_eq!(s.engine, Engine::Phase);
    }

    #[test]
    fn test_json_partial_uses_defaults() {
        let s: AcquisitionSettings =
            serde_json::from_str(r#"{"exposure_time_us": 8000, "engine": "stripe"}"#).unwrap();
        assert_eq!(s.exposure_time, Duration::from_micros(8000));
        assert_eq!(s.engine, Engine::Stripe);
        assert_eq!(s.aperture, 2.0);
        assert_eq!(s.capture_timeout, Duration::from_millis(5000));
    }

    #[test]
    fn test_json_rejects_unknown_fields() {
        let result = serde_json::from_str::<AcquisitionSettings>(r#"{"gain": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_json_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let settings = AcquisitionSettings::default()
            .with_aperture(4.0)
            .with_outlier_removal(None);
        std::fs::write(&path, serde_json::to_string_pretty(&settings).unwrap()).unwrap();
        assert_eq!(AcquisitionSettings::from_json_file(&path).unwrap(), settings);
    }

    #[test]
    fn test_limits_accept_defaults() {
        assert!(limits().check(&AcquisitionSettings::default()).is_ok());
    }

    #[test]
    fn test_limits_reject_out_of_range() {
        let too_short = AcquisitionSettings::default().with_exposure_time(Duration::from_micros(10));
        assert_eq!(limits().check(&too_short).unwrap_err().kind(), ErrorKind::Config);

        let wide_open = AcquisitionSettings::default().with_aperture(0.5);
        assert_eq!(limits().check(&wide_open).unwrap_err().kind(), ErrorKind::Config);
    }

    #[test]
    fn test_threshold_only_checked_when_enabled() {
        let mut settings = AcquisitionSettings::default().with_outlier_removal(Some(0.0));
        assert!(limits().check(&settings).is_err());
        settings.outlier_removal = false;
        assert!(limits().check(&settings).is_ok());
    }

    #[test]
    fn test_engine_parse() {
        assert_eq!("Stripe".parse::<Engine>(), Ok(Engine::Stripe));
        assert!("laser".parse::<Engine>().is_err());
    }
}
