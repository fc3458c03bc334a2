//! File input for replay.
//!
//! - Track files: one sample per line, `lat,lon,alt_ft[,t_s]`
//! - Terrain grids: the `GridTerrain` text format

use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

use taws_core::terrain::GridTerrain;
use taws_core::types::Result;

// ---------------------------------------------------------------------------
// Track files
// ---------------------------------------------------------------------------

/// One recorded track point. `t_s` is present when the file carries
/// timestamps; otherwise the session's sample interval applies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackPoint {
    pub lat: f64,
    pub lon: f64,
    pub altitude_ft: f64,
    pub t_s: Option<f64>,
}

/// Parse one track line.
///
/// `Ok(None)` for blank lines and `#` comments. Values are not range
/// checked here; the engine rejects out-of-range samples itself.
pub fn parse_track_line(line: &str) -> std::result::Result<Option<TrackPoint>, String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }

    let fields: Vec<&str> = line.split(',').map(str::trim).collect();
    if !(3..=4).contains(&fields.len()) {
        return Err(format!("expected 3 or 4 fields, got {}", fields.len()));
    }

    let num = |i: usize| -> std::result::Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| format!("bad number {:?} in field {}", fields[i], i + 1))
    };

    Ok(Some(TrackPoint {
        lat: num(0)?,
        lon: num(1)?,
        altitude_ft: num(2)?,
        t_s: if fields.len() == 4 { Some(num(3)?) } else { None },
    }))
}

/// Read every track point, skipping malformed lines with a warning.
pub fn read_track<R: BufRead>(reader: R) -> io::Result<Vec<TrackPoint>> {
    let mut points = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        match parse_track_line(&line?) {
            Ok(Some(point)) => points.push(point),
            Ok(None) => {}
            Err(e) => tracing::warn!(line = i + 1, error = %e, "skipping track line"),
        }
    }
    Ok(points)
}

/// Open a track file, or stdin for `-`.
pub fn open_track(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if path.to_str() == Some("-") {
        return Ok(Box::new(io::stdin().lock()));
    }
    let f = fs::File::open(path)?;
    Ok(Box::new(io::BufReader::new(f)))
}

// ---------------------------------------------------------------------------
// Terrain grids
// ---------------------------------------------------------------------------

pub fn load_grid(path: &Path) -> Result<GridTerrain> {
    let text = fs::read_to_string(path)?;
    GridTerrain::parse(&text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
