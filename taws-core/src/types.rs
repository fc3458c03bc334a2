//! Shared types, error enum, and alarm records for taws-core.

use serde::Serialize;
use thiserror::Error;

/// All errors produced by taws-core.
#[derive(Debug, Error)]
pub enum TawsError {
    #[error("invalid or deleted session handle")]
    InvalidHandle,
    #[error("invalid sample: {field} = {value}")]
    InvalidSample { field: &'static str, value: f64 },
    #[error("session store full ({capacity} sessions)")]
    CapacityExhausted { capacity: usize },
    #[error("unknown detector: {0}")]
    UnknownDetector(String),
    #[error("terrain grid error: {0}")]
    TerrainFormat(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, TawsError>;

// ---------------------------------------------------------------------------
// Validity ranges
// ---------------------------------------------------------------------------

pub const MIN_LAT: f64 = -90.0;
pub const MAX_LAT: f64 = 90.0;
pub const MIN_LON: f64 = -180.0;
pub const MAX_LON: f64 = 180.0;

/// Lowest plausible altitude (ft MSL). Below the Dead Sea shore with margin.
pub const MIN_ALTITUDE_FT: f64 = -2_000.0;

/// Highest plausible altitude (ft MSL).
pub const MAX_ALTITUDE_FT: f64 = 100_000.0;

// ---------------------------------------------------------------------------
// Aircraft state sample
// ---------------------------------------------------------------------------

/// One pushed aircraft state: position in degrees, altitude in feet MSL.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Sample {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
}

impl Sample {
    pub fn new(lat: f64, lon: f64, altitude_ft: f64) -> Self {
        Sample {
            lat,
            lon,
            altitude_ft,
        }
    }

    /// Reject samples outside physically plausible ranges (NaN included).
    pub fn validate(&self) -> Result<()> {
        check_range("lat", self.lat, MIN_LAT, MAX_LAT)?;
        check_range("lon", self.lon, MIN_LON, MAX_LON)?;
        check_range("altitude_ft", self.altitude_ft, MIN_ALTITUDE_FT, MAX_ALTITUDE_FT)
    }

    /// Height above the given ground elevation.
    pub fn agl_ft(&self, ground_ft: f64) -> f64 {
        self.altitude_ft - ground_ft
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    // `contains` is false for NaN
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(TawsError::InvalidSample { field, value })
    }
}

// ---------------------------------------------------------------------------
// Alarms
// ---------------------------------------------------------------------------

/// Static severity of an alarm, fixed when the detector is registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    /// Immediate awareness, less urgent response.
    Caution,
    /// Immediate awareness and immediate response.
    Warning,
}

impl Importance {
    pub fn is_important(&self) -> bool {
        matches!(self, Importance::Warning)
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Importance::Caution => write!(f, "caution"),
            Importance::Warning => write!(f, "warning"),
        }
    }
}

/// One entry of a session's alarm table.
///
/// `name`, `importance` and `priority` never change after the table is
/// built; only `active` is rewritten on every push.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Alarm {
    pub name: &'static str,
    pub importance: Importance,
    /// Lower is more urgent.
    pub priority: u8,
    pub active: bool,
}

impl Alarm {
    pub fn is_important(&self) -> bool {
        self.importance.is_important()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
