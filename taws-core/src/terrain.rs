//! Terrain query gateway.
//!
//! The terrain database itself lives outside the engine behind
//! [`TerrainSource`]. This module only turns a position (and, when moving,
//! a track) into elevation facts. Missing coverage is never an error here:
//! it surfaces as `None` and the detectors decide what to do with it.

use crate::kinematics::{destination, Kinematics};
use crate::types::{Sample, TawsError};

/// Elevation capability provided by the calling environment.
///
/// Implementations must be safe to query from several sessions at once;
/// the engine never mutates a source.
pub trait TerrainSource: Send + Sync {
    /// Ground (or obstacle top) elevation in feet MSL, `None` outside coverage.
    fn elevation_ft(&self, lat: f64, lon: f64) -> Option<f64>;
}

/// Forward corridor shape used for look-ahead queries.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lookahead {
    pub duration_s: f64,
    pub steps: u32,
}

/// What the terrain collaborator told us about the current position.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TerrainFacts {
    /// Elevation directly below the aircraft.
    pub ground_ft: Option<f64>,
    /// Highest elevation on the forward corridor. `None` when stationary,
    /// on the first sample, or when any corridor point is out of coverage.
    pub corridor_max_ft: Option<f64>,
}

/// Gateway over a borrowed terrain source.
pub struct TerrainGateway<'a> {
    source: &'a dyn TerrainSource,
    lookahead: Lookahead,
}

impl<'a> TerrainGateway<'a> {
    pub fn new(source: &'a dyn TerrainSource, lookahead: Lookahead) -> Self {
        TerrainGateway { source, lookahead }
    }

    /// Elevation below a sample. Non-finite answers count as unknown.
    pub fn ground(&self, sample: &Sample) -> Option<f64> {
        self.source
            .elevation_ft(sample.lat, sample.lon)
            .filter(|e| e.is_finite())
    }

    /// Highest elevation along the current track for the look-ahead time.
    pub fn corridor_max(&self, sample: &Sample, kin: &Kinematics) -> Option<f64> {
        let track = kin.track_deg?;
        if kin.ground_speed_kts <= 0.0 || self.lookahead.steps == 0 {
            return None;
        }
        let total_nm = kin.ground_speed_kts * self.lookahead.duration_s / 3600.0;
        let step_nm = total_nm / self.lookahead.steps as f64;

        let mut highest = f64::NEG_INFINITY;
        for i in 1..=self.lookahead.steps {
            let (lat, lon) = destination(sample.lat, sample.lon, track, step_nm * i as f64);
            let elevation = self
                .source
                .elevation_ft(lat, lon)
                .filter(|e| e.is_finite())?;
            highest = highest.max(elevation);
        }
        Some(highest)
    }

    /// Collect all facts for a sample. Corridor is only queried when
    /// kinematics are known.
    pub fn facts(
        &self,
        sample: &Sample,
        ground_ft: Option<f64>,
        kin: Option<&Kinematics>,
    ) -> TerrainFacts {
        TerrainFacts {
            ground_ft,
            corridor_max_ft: kin.and_then(|k| self.corridor_max(sample, k)),
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// Same elevation everywhere. Useful over open water and in tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatTerrain(pub f64);

impl TerrainSource for FlatTerrain {
    fn elevation_ft(&self, _lat: f64, _lon: f64) -> Option<f64> {
        Some(self.0)
    }
}

/// No coverage at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoTerrain;

impl TerrainSource for NoTerrain {
    fn elevation_ft(&self, _lat: f64, _lon: f64) -> Option<f64> {
        None
    }
}

/// Regular lat/lon grid of elevation posts, nearest-post lookup.
///
/// Row 0 is the southernmost row, column 0 the westernmost column.
#[derive(Debug, Clone, PartialEq)]
pub struct GridTerrain {
    origin_lat: f64,
    origin_lon: f64,
    step_deg: f64,
    rows: usize,
    cols: usize,
    posts: Vec<f64>,
}

impl GridTerrain {
    pub fn new(
        origin_lat: f64,
        origin_lon: f64,
        step_deg: f64,
        rows: usize,
        cols: usize,
        posts: Vec<f64>,
    ) -> Result<Self, TawsError> {
        if !(step_deg > 0.0) || !origin_lat.is_finite() || !origin_lon.is_finite() {
            return Err(TawsError::TerrainFormat(format!(
                "bad grid geometry: origin {origin_lat}, {origin_lon}, step {step_deg}"
            )));
        }
        if rows == 0 || cols == 0 || posts.len() != rows * cols {
            return Err(TawsError::TerrainFormat(format!(
                "expected {rows}x{cols} posts, got {}",
                posts.len()
            )));
        }
        Ok(GridTerrain {
            origin_lat,
            origin_lon,
            step_deg,
            rows,
            cols,
            posts,
        })
    }

    /// Parse the text grid format.
    ///
    /// ```text
    /// # origin_lat origin_lon step_deg rows cols
    /// 46.5 7.5 0.01 2 3
    /// 1200 1250 1300
    /// 1400 1450 1500
    /// ```
    pub fn parse(text: &str) -> Result<Self, TawsError> {
        let mut lines = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'));

        let header = lines
            .next()
            .ok_or_else(|| TawsError::TerrainFormat("missing header".into()))?;
        let fields: Vec<&str> = header.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(TawsError::TerrainFormat(format!(
                "header needs 5 fields, got {}",
                fields.len()
            )));
        }
        let origin_lat = parse_field::<f64>(fields[0], "origin_lat")?;
        let origin_lon = parse_field::<f64>(fields[1], "origin_lon")?;
        let step_deg = parse_field::<f64>(fields[2], "step_deg")?;
        let rows = parse_field::<usize>(fields[3], "rows")?;
        let cols = parse_field::<usize>(fields[4], "cols")?;

        let mut posts = Vec::with_capacity(rows.saturating_mul(cols));
        for (i, line) in lines.enumerate() {
            let row: Vec<f64> = line
                .split(|c: char| c.is_whitespace() || c == ',')
                .filter(|v| !v.is_empty())
                .map(|v| parse_field::<f64>(v, "elevation"))
                .collect::<Result<_, _>>()?;
            if row.len() != cols {
                return Err(TawsError::TerrainFormat(format!(
                    "row {i} has {} posts, expected {cols}",
                    row.len()
                )));
            }
            posts.extend(row);
        }

        Self::new(origin_lat, origin_lon, step_deg, rows, cols, posts)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }
}

fn parse_field<T: std::str::FromStr>(value: &str, name: &str) -> Result<T, TawsError> {
    value
        .parse()
        .map_err(|_| TawsError::TerrainFormat(format!("bad {name}: {value:?}")))
}

impl TerrainSource for GridTerrain {
    fn elevation_ft(&self, lat: f64, lon: f64) -> Option<f64> {
        let row = ((lat - self.origin_lat) / self.step_deg).round();
        let col = ((lon - self.origin_lon) / self.step_deg).round();
        if !(row >= 0.0 && col >= 0.0) {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.posts.get(row * self.cols + col).copied()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
