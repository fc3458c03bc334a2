//! Kinematics estimation from successive position samples.
//!
//! The pushed samples carry no velocity, so vertical speed, ground speed,
//! track and terrain closure rate are all finite differences between the
//! previous fix and the current sample.

use serde::Serialize;

use crate::types::Sample;

/// Intervals shorter than this are treated as "no time elapsed" (seconds).
pub const MIN_ELAPSED_S: f64 = 0.001;

/// Horizontal moves shorter than this carry no usable track (nautical miles).
const MIN_TRACK_DISTANCE_NM: f64 = 1e-6;

const EARTH_RADIUS_NM: f64 = 3440.065;

// ---------------------------------------------------------------------------
// Great-circle helpers
// ---------------------------------------------------------------------------

/// Great-circle distance in nautical miles.
pub fn haversine_nm(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    EARTH_RADIUS_NM * 2.0 * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Initial great-circle bearing from point 1 to point 2, degrees [0, 360).
pub fn initial_bearing_deg(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (phi1, phi2) = (lat1.to_radians(), lat2.to_radians());
    let dlon = (lon2 - lon1).to_radians();
    let y = dlon.sin() * phi2.cos();
    let x = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * dlon.cos();
    (y.atan2(x).to_degrees() + 360.0) % 360.0
}

/// Point reached after `distance_nm` along `bearing_deg` from a start point.
///
/// Returns `(lat, lon)` with longitude normalized to [-180, 180].
pub fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_nm: f64) -> (f64, f64) {
    let delta = distance_nm / EARTH_RADIUS_NM;
    let theta = bearing_deg.to_radians();
    let phi1 = lat.to_radians();
    let lambda1 = lon.to_radians();

    let phi2 = (phi1.sin() * delta.cos() + phi1.cos() * delta.sin() * theta.cos()).asin();
    let lambda2 = lambda1
        + (theta.sin() * delta.sin() * phi1.cos()).atan2(delta.cos() - phi1.sin() * phi2.sin());

    let lon2 = (lambda2.to_degrees() + 540.0) % 360.0 - 180.0;
    (phi2.to_degrees(), lon2)
}

// ---------------------------------------------------------------------------
// Fix + derived rates
// ---------------------------------------------------------------------------

/// A retained sample with the time it was taken and the ground below it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub sample: Sample,
    pub t_s: f64,
    pub ground_ft: Option<f64>,
}

impl Fix {
    pub fn agl_ft(&self) -> Option<f64> {
        self.ground_ft.map(|g| self.sample.agl_ft(g))
    }
}

/// Quantities derived from two consecutive fixes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Kinematics {
    pub elapsed_s: f64,
    /// Positive when climbing.
    pub vertical_speed_fpm: f64,
    pub ground_speed_kts: f64,
    /// `None` when the aircraft did not move horizontally.
    pub track_deg: Option<f64>,
    /// Rate the gap to the terrain below is shrinking; positive when closing.
    /// `None` when either fix has no terrain.
    pub closure_rate_fpm: Option<f64>,
}

impl Kinematics {
    fn at_rest(elapsed_s: f64) -> Self {
        Kinematics {
            elapsed_s,
            vertical_speed_fpm: 0.0,
            ground_speed_kts: 0.0,
            track_deg: None,
            closure_rate_fpm: Some(0.0),
        }
    }
}

/// Derive rates from the previous fix to the current sample.
///
/// An interval below [`MIN_ELAPSED_S`] (including a clock that went
/// backwards) yields zero rates rather than infinities.
pub fn estimate(prev: &Fix, current: &Sample, t_s: f64, ground_ft: Option<f64>) -> Kinematics {
    let elapsed_s = t_s - prev.t_s;
    if !(elapsed_s >= MIN_ELAPSED_S) {
        let mut k = Kinematics::at_rest(elapsed_s.max(0.0));
        if prev.ground_ft.is_none() || ground_ft.is_none() {
            k.closure_rate_fpm = None;
        }
        return k;
    }

    let minutes = elapsed_s / 60.0;
    let p = &prev.sample;

    let vertical_speed_fpm = (current.altitude_ft - p.altitude_ft) / minutes;

    let distance_nm = haversine_nm(p.lat, p.lon, current.lat, current.lon);
    let ground_speed_kts = distance_nm / (elapsed_s / 3600.0);
    let track_deg = (distance_nm > MIN_TRACK_DISTANCE_NM)
        .then(|| initial_bearing_deg(p.lat, p.lon, current.lat, current.lon));

    let closure_rate_fpm = match (prev.agl_ft(), ground_ft.map(|g| current.agl_ft(g))) {
        (Some(before), Some(now)) => Some((before - now) / minutes),
        _ => None,
    };

    Kinematics {
        elapsed_s,
        vertical_speed_fpm,
        ground_speed_kts,
        track_deg,
        closure_rate_fpm,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
