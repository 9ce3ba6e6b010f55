//! Data models for water-quality readings and threshold configuration
//!
//! Defines the core data structures used throughout the application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::warn;
use validator::Validate;

use crate::feeds::FeedStatusReport;

/// Measured water-quality channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parameter {
    Temperature,
    Ph,
    Salinity,
    Turbidity,
    /// Stored under the `do` key in the remote store
    #[serde(rename = "do", alias = "dissolvedOxygen", alias = "dissolved_oxygen")]
    DissolvedOxygen,
}

impl Parameter {
    /// Table column order
    pub const ALL: [Parameter; 5] = [
        Parameter::Temperature,
        Parameter::Ph,
        Parameter::Salinity,
        Parameter::Turbidity,
        Parameter::DissolvedOxygen,
    ];

    /// Key used by the remote store for records and thresholds
    pub fn key(self) -> &'static str {
        match self {
            Parameter::Temperature => "temperature",
            Parameter::Ph => "ph",
            Parameter::Salinity => "salinity",
            Parameter::Turbidity => "turbidity",
            Parameter::DissolvedOxygen => "do",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "temperature" => Some(Parameter::Temperature),
            "ph" => Some(Parameter::Ph),
            "salinity" => Some(Parameter::Salinity),
            "turbidity" => Some(Parameter::Turbidity),
            "do" | "dissolvedOxygen" | "dissolved_oxygen" => Some(Parameter::DissolvedOxygen),
            _ => None,
        }
    }

    /// Decimal places shown in the history table
    pub fn precision(self) -> usize {
        match self {
            Parameter::Ph => 2,
            _ => 1,
        }
    }
}

/// One normalized sensor observation
///
/// The timestamp is always a valid millisecond epoch value; every
/// measurement channel is optional because sensors report independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ph: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salinity: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turbidity: Option<f64>,

    #[serde(rename = "do", default, skip_serializing_if = "Option::is_none")]
    pub dissolved_oxygen: Option<f64>,
}

impl Reading {
    /// Create a reading with no measurements at the given instant
    pub fn at(timestamp: i64) -> Self {
        Self {
            timestamp,
            temperature: None,
            ph: None,
            salinity: None,
            turbidity: None,
            dissolved_oxygen: None,
        }
    }

    pub fn with(mut self, parameter: Parameter, value: f64) -> Self {
        *self.slot(parameter) = Some(value);
        self
    }

    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Ph => self.ph,
            Parameter::Salinity => self.salinity,
            Parameter::Turbidity => self.turbidity,
            Parameter::DissolvedOxygen => self.dissolved_oxygen,
        }
    }

    fn slot(&mut self, parameter: Parameter) -> &mut Option<f64> {
        match parameter {
            Parameter::Temperature => &mut self.temperature,
            Parameter::Ph => &mut self.ph,
            Parameter::Salinity => &mut self.salinity,
            Parameter::Turbidity => &mut self.turbidity,
            Parameter::DissolvedOxygen => &mut self.dissolved_oxygen,
        }
    }
}

/// Current sensor snapshot pushed by the live feed
///
/// Same channels as [`Reading`] but the timestamp is not required. The
/// validator ranges are plausibility bounds only; a miss is logged and the
/// snapshot is still applied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LiveReading {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,

    /// Water temperature (Celsius)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = -5.0, max = 45.0, message = "Temperature must be between -5 and 45°C"))]
    pub temperature: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 14.0, message = "pH must be between 0 and 14"))]
    pub ph: Option<f64>,

    /// Salinity (ppt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 50.0, message = "Salinity must be between 0 and 50 ppt"))]
    pub salinity: Option<f64>,

    /// Turbidity (NTU)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1000.0, message = "Turbidity must be between 0 and 1000 NTU"))]
    pub turbidity: Option<f64>,

    /// Dissolved oxygen (mg/L)
    #[serde(rename = "do", alias = "dissolvedOxygen", default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 20.0, message = "Dissolved oxygen must be between 0 and 20 mg/L"))]
    pub dissolved_oxygen: Option<f64>,
}

impl LiveReading {
    pub fn value(&self, parameter: Parameter) -> Option<f64> {
        match parameter {
            Parameter::Temperature => self.temperature,
            Parameter::Ph => self.ph,
            Parameter::Salinity => self.salinity,
            Parameter::Turbidity => self.turbidity,
            Parameter::DissolvedOxygen => self.dissolved_oxygen,
        }
    }
}

/// Safe/caution/critical value ranges for one parameter
///
/// Expected ordering is `warn_min <= safe_min <= safe_max <= warn_max`;
/// it is not checked here.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThresholdBand {
    pub safe_min: f64,
    pub safe_max: f64,
    pub warn_min: f64,
    pub warn_max: f64,
}

/// Threshold configuration keyed by parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThresholdMap {
    bands: BTreeMap<Parameter, ThresholdBand>,
}

impl ThresholdMap {
    /// Build a map from a raw store snapshot.
    ///
    /// Returns `None` when the snapshot is not an object (nothing
    /// configured). Unknown parameters and bands that do not deserialize
    /// are skipped with a warning.
    pub fn from_raw(raw: &Value) -> Option<Self> {
        let object = raw.as_object()?;
        let mut bands = BTreeMap::new();

        for (key, value) in object {
            let Some(parameter) = Parameter::from_key(key) else {
                warn!(parameter = %key, "Ignoring thresholds for unknown parameter");
                continue;
            };

            match serde_json::from_value::<ThresholdBand>(value.clone()) {
                Ok(band) => {
                    bands.insert(parameter, band);
                }
                Err(e) => {
                    warn!(parameter = %key, error = %e, "Ignoring malformed threshold band");
                }
            }
        }

        Some(Self { bands })
    }

    pub fn insert(&mut self, parameter: Parameter, band: ThresholdBand) {
        self.bands.insert(parameter, band);
    }

    pub fn band(&self, parameter: Parameter) -> Option<&ThresholdBand> {
        self.bands.get(&parameter)
    }

    pub fn len(&self) -> usize {
        self.bands.len()
    }
}

/// WebSocket message types
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    /// Live snapshot replaced
    LiveUpdate(LiveReading),
    /// Threshold map replaced (`None` when nothing is configured)
    ThresholdsUpdate(Option<ThresholdMap>),
    /// History buffer replaced
    HistoryChanged { records: usize },
    /// Connection acknowledgment
    Connected { client_id: String },
    /// Error message
    Error { message: String },
    /// Heartbeat/ping
    Ping,
    /// Heartbeat/pong response
    Pong,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthCheck {
    pub status: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub history_records: usize,
    pub rejected_records: u64,
    pub connected_clients: usize,
    pub feeds: Vec<FeedStatusReport>,
}
