//! Configuration file management for otaws.
//!
//! Reads/writes `~/.otaws/config.yaml` with sampling, hysteresis and
//! per-detector thresholds. Every threshold the detectors use is a named
//! key here; nothing is hard-coded in the detector bank.

use std::path::{Path, PathBuf};

use crate::terrain::Lookahead;
use crate::types::{Result, TawsError};

/// Upper bound for `closure.lookahead_steps`; each step is one terrain query.
pub const MAX_LOOKAHEAD_STEPS: u32 = 100;

/// Full configuration structure.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub timing: TimingConfig,
    pub kinematics: KinematicsConfig,
    pub descent: DescentConfig,
    pub closure: ClosureConfig,
    pub clearance: ClearanceConfig,
    pub negative_climb: NegativeClimbConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TimingConfig {
    /// Implied time between two `push` calls without a timestamp.
    pub sample_interval_s: f64,
    /// Consecutive hazard samples before an armed detector goes active.
    pub activate_after: u32,
    /// Consecutive clear samples before an active detector lets go.
    pub clear_after: u32,
}

/// Plausibility limits for derived rates. Beyond these the inputs count as
/// out of range and the detectors inhibit.
#[derive(Debug, Clone, PartialEq)]
pub struct KinematicsConfig {
    pub max_ground_speed_kts: f64,
}

/// Excessive descent rate: sink rate above `base_fpm + fpm_per_ft * AGL`.
#[derive(Debug, Clone, PartialEq)]
pub struct DescentConfig {
    pub min_agl_ft: f64,
    pub base_fpm: f64,
    pub fpm_per_ft: f64,
}

/// Terrain closure: closure rate above `base_fpm + fpm_per_ft * AGL`, or
/// rising terrain ahead within `required_clearance_ft` of the altitude
/// predicted at the end of the look-ahead.
#[derive(Debug, Clone, PartialEq)]
pub struct ClosureConfig {
    pub min_agl_ft: f64,
    pub max_agl_ft: f64,
    pub base_fpm: f64,
    pub fpm_per_ft: f64,
    pub lookahead_s: f64,
    pub lookahead_steps: u32,
    pub required_clearance_ft: f64,
}

/// Insufficient terrain clearance, armed once `arm_agl_ft` was reached and
/// disarmed again below `disarm_agl_ft` (touchdown).
#[derive(Debug, Clone, PartialEq)]
pub struct ClearanceConfig {
    pub arm_agl_ft: f64,
    pub disarm_agl_ft: f64,
    pub cruise_floor_ft: f64,
    pub descent_floor_ft: f64,
    /// Vertical speeds within +/- this band count as level flight.
    pub level_band_fpm: f64,
}

/// Negative climb after having been very low (take-off, go-around).
#[derive(Debug, Clone, PartialEq)]
pub struct NegativeClimbConfig {
    pub low_agl_ft: f64,
    pub release_agl_ft: f64,
    /// Height gained above the low point before the detector cares.
    pub min_gain_ft: f64,
    pub max_sink_fpm: f64,
    pub loss_fraction: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timing: TimingConfig {
                sample_interval_s: 1.0,
                activate_after: 2,
                clear_after: 3,
            },
            kinematics: KinematicsConfig {
                max_ground_speed_kts: 1000.0,
            },
            descent: DescentConfig {
                min_agl_ft: 50.0,
                base_fpm: 1500.0,
                fpm_per_ft: 0.6,
            },
            closure: ClosureConfig {
                min_agl_ft: 30.0,
                max_agl_ft: 2500.0,
                base_fpm: 2000.0,
                fpm_per_ft: 2.0,
                lookahead_s: 60.0,
                lookahead_steps: 6,
                required_clearance_ft: 300.0,
            },
            clearance: ClearanceConfig {
                arm_agl_ft: 1000.0,
                disarm_agl_ft: 50.0,
                cruise_floor_ft: 700.0,
                descent_floor_ft: 500.0,
                level_band_fpm: 500.0,
            },
            negative_climb: NegativeClimbConfig {
                low_agl_ft: 200.0,
                release_agl_ft: 1500.0,
                min_gain_ft: 50.0,
                max_sink_fpm: 500.0,
                loss_fraction: 0.1,
            },
        }
    }
}

impl Config {
    /// Corridor shape for the terrain gateway.
    pub fn lookahead(&self) -> Lookahead {
        Lookahead {
            duration_s: self.closure.lookahead_s,
            steps: self.closure.lookahead_steps,
        }
    }

    /// Reject settings the detectors cannot work with.
    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if !(t.sample_interval_s > 0.0 && t.sample_interval_s.is_finite()) {
            return Err(bad("timing.sample_interval_s must be positive"));
        }
        if t.activate_after == 0 || t.clear_after == 0 {
            return Err(bad("timing.activate_after and timing.clear_after must be >= 1"));
        }

        let k = &self.kinematics;
        if !(k.max_ground_speed_kts > 0.0 && k.max_ground_speed_kts.is_finite()) {
            return Err(bad("kinematics.max_ground_speed_kts must be positive"));
        }
        if self.closure.lookahead_steps > MAX_LOOKAHEAD_STEPS {
            return Err(TawsError::Config(format!(
                "closure.lookahead_steps must be <= {MAX_LOOKAHEAD_STEPS}"
            )));
        }

        let floats = [
            ("descent.min_agl_ft", self.descent.min_agl_ft),
            ("descent.base_fpm", self.descent.base_fpm),
            ("descent.fpm_per_ft", self.descent.fpm_per_ft),
            ("closure.min_agl_ft", self.closure.min_agl_ft),
            ("closure.max_agl_ft", self.closure.max_agl_ft),
            ("closure.base_fpm", self.closure.base_fpm),
            ("closure.fpm_per_ft", self.closure.fpm_per_ft),
            ("closure.lookahead_s", self.closure.lookahead_s),
            ("closure.required_clearance_ft", self.closure.required_clearance_ft),
            ("clearance.arm_agl_ft", self.clearance.arm_agl_ft),
            ("clearance.disarm_agl_ft", self.clearance.disarm_agl_ft),
            ("clearance.cruise_floor_ft", self.clearance.cruise_floor_ft),
            ("clearance.descent_floor_ft", self.clearance.descent_floor_ft),
            ("clearance.level_band_fpm", self.clearance.level_band_fpm),
            ("negative_climb.low_agl_ft", self.negative_climb.low_agl_ft),
            ("negative_climb.release_agl_ft", self.negative_climb.release_agl_ft),
            ("negative_climb.min_gain_ft", self.negative_climb.min_gain_ft),
            ("negative_climb.max_sink_fpm", self.negative_climb.max_sink_fpm),
            ("negative_climb.loss_fraction", self.negative_climb.loss_fraction),
        ];
        if let Some((name, _)) = floats.iter().find(|(_, v)| !v.is_finite() || *v < 0.0) {
            return Err(TawsError::Config(format!(
                "{name} must be a finite, non-negative number"
            )));
        }

        if self.closure.min_agl_ft >= self.closure.max_agl_ft {
            return Err(bad("closure.min_agl_ft must be below closure.max_agl_ft"));
        }
        if self.clearance.arm_agl_ft <= self.clearance.cruise_floor_ft
            || self.clearance.arm_agl_ft <= self.clearance.descent_floor_ft
        {
            return Err(bad("clearance.arm_agl_ft must be above both floors"));
        }
        if self.clearance.disarm_agl_ft >= self.clearance.descent_floor_ft {
            return Err(bad("clearance.disarm_agl_ft must be below clearance.descent_floor_ft"));
        }
        if self.negative_climb.low_agl_ft >= self.negative_climb.release_agl_ft {
            return Err(bad(
                "negative_climb.low_agl_ft must be below negative_climb.release_agl_ft",
            ));
        }
        if self.negative_climb.loss_fraction > 1.0 {
            return Err(bad("negative_climb.loss_fraction must be <= 1.0"));
        }
        Ok(())
    }
}

fn bad(msg: &str) -> TawsError {
    TawsError::Config(msg.to_string())
}

/// Get the config directory path (`~/.otaws/`).
pub fn config_dir() -> PathBuf {
    dirs_home().join(".otaws")
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    config_dir().join("config.yaml")
}

fn dirs_home() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Load config from `~/.otaws/config.yaml`.
///
/// Returns default config if the file doesn't exist, can't be read, or
/// doesn't validate.
pub fn load_config() -> Config {
    let path = config_file();
    if !path.exists() {
        return Config::default();
    }
    match load_config_from(&path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
            Config::default()
        }
    }
}

/// Load and validate config from an explicit path.
pub fn load_config_from(path: &Path) -> Result<Config> {
    let text = std::fs::read_to_string(path)?;
    let config = parse_config(&text);
    config.validate()?;
    Ok(config)
}

/// Save config to `~/.otaws/config.yaml`.
pub fn save_config(config: &Config) -> Result<PathBuf> {
    let dir = config_dir();
    std::fs::create_dir_all(&dir).map_err(|e| TawsError::Config(e.to_string()))?;

    let path = config_file();
    std::fs::write(&path, serialize_config(config)).map_err(|e| TawsError::Config(e.to_string()))?;

    Ok(path)
}

/// Parse simple YAML-like config text. Unknown sections and keys are
/// ignored, unparsable values keep their defaults.
pub fn parse_config(text: &str) -> Config {
    let mut config = Config::default();
    let mut current_section: Option<String> = None;

    for line in text.lines() {
        let stripped = line.trim();
        if stripped.is_empty() || stripped.starts_with('#') {
            continue;
        }

        let is_indented = line.starts_with("  ") || line.starts_with('\t');

        let Some((key, val)) = stripped.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let val = val.trim();

        if !is_indented {
            current_section = val.is_empty().then(|| key.to_string());
            continue;
        }
        let Some(section) = current_section.as_deref() else {
            continue;
        };

        match section {
            "timing" => match key {
                "sample_interval_s" => set_f64(&mut config.timing.sample_interval_s, val),
                "activate_after" => set_u32(&mut config.timing.activate_after, val),
                "clear_after" => set_u32(&mut config.timing.clear_after, val),
                _ => {}
            },
            "kinematics" => match key {
                "max_ground_speed_kts" => {
                    set_f64(&mut config.kinematics.max_ground_speed_kts, val)
                }
                _ => {}
            },
            "descent" => match key {
                "min_agl_ft" => set_f64(&mut config.descent.min_agl_ft, val),
                "base_fpm" => set_f64(&mut config.descent.base_fpm, val),
                "fpm_per_ft" => set_f64(&mut config.descent.fpm_per_ft, val),
                _ => {}
            },
            "closure" => match key {
                "min_agl_ft" => set_f64(&mut config.closure.min_agl_ft, val),
                "max_agl_ft" => set_f64(&mut config.closure.max_agl_ft, val),
                "base_fpm" => set_f64(&mut config.closure.base_fpm, val),
                "fpm_per_ft" => set_f64(&mut config.closure.fpm_per_ft, val),
                "lookahead_s" => set_f64(&mut config.closure.lookahead_s, val),
                "lookahead_steps" => set_u32(&mut config.closure.lookahead_steps, val),
                "required_clearance_ft" => {
                    set_f64(&mut config.closure.required_clearance_ft, val)
                }
                _ => {}
            },
            "clearance" => match key {
                "arm_agl_ft" => set_f64(&mut config.clearance.arm_agl_ft, val),
                "disarm_agl_ft" => set_f64(&mut config.clearance.disarm_agl_ft, val),
                "cruise_floor_ft" => set_f64(&mut config.clearance.cruise_floor_ft, val),
                "descent_floor_ft" => set_f64(&mut config.clearance.descent_floor_ft, val),
                "level_band_fpm" => set_f64(&mut config.clearance.level_band_fpm, val),
                _ => {}
            },
            "negative_climb" => match key {
                "low_agl_ft" => set_f64(&mut config.negative_climb.low_agl_ft, val),
                "release_agl_ft" => set_f64(&mut config.negative_climb.release_agl_ft, val),
                "min_gain_ft" => set_f64(&mut config.negative_climb.min_gain_ft, val),
                "max_sink_fpm" => set_f64(&mut config.negative_climb.max_sink_fpm, val),
                "loss_fraction" => set_f64(&mut config.negative_climb.loss_fraction, val),
                _ => {}
            },
            _ => {}
        }
    }

    config
}

fn set_f64(target: &mut f64, val: &str) {
    if let Some(v) = parse_float_value(val) {
        *target = v;
    }
}

fn set_u32(target: &mut u32, val: &str) {
    if let Ok(v) = val.parse::<u32>() {
        *target = v;
    }
}

fn parse_float_value(val: &str) -> Option<f64> {
    if val == "null" || val == "~" || val.is_empty() {
        return None;
    }
    val.parse().ok()
}

/// Serialize config to YAML-like text.
pub fn serialize_config(config: &Config) -> String {
    let mut lines = vec!["# otaws configuration".to_string(), String::new()];

    let t = &config.timing;
    lines.push("timing:".into());
    lines.push(format!("  sample_interval_s: {}", t.sample_interval_s));
    lines.push(format!("  activate_after: {}", t.activate_after));
    lines.push(format!("  clear_after: {}", t.clear_after));
    lines.push(String::new());

    lines.push("kinematics:".into());
    lines.push(format!(
        "  max_ground_speed_kts: {}",
        config.kinematics.max_ground_speed_kts
    ));
    lines.push(String::new());

    let d = &config.descent;
    lines.push("descent:".into());
    lines.push(format!("  min_agl_ft: {}", d.min_agl_ft));
    lines.push(format!("  base_fpm: {}", d.base_fpm));
    lines.push(format!("  fpm_per_ft: {}", d.fpm_per_ft));
    lines.push(String::new());

    let c = &config.closure;
    lines.push("closure:".into());
    lines.push(format!("  min_agl_ft: {}", c.min_agl_ft));
    lines.push(format!("  max_agl_ft: {}", c.max_agl_ft));
    lines.push(format!("  base_fpm: {}", c.base_fpm));
    lines.push(format!("  fpm_per_ft: {}", c.fpm_per_ft));
    lines.push(format!("  lookahead_s: {}", c.lookahead_s));
    lines.push(format!("  lookahead_steps: {}", c.lookahead_steps));
    lines.push(format!("  required_clearance_ft: {}", c.required_clearance_ft));
    lines.push(String::new());

    let cl = &config.clearance;
    lines.push("clearance:".into());
    lines.push(format!("  arm_agl_ft: {}", cl.arm_agl_ft));
    lines.push(format!("  disarm_agl_ft: {}", cl.disarm_agl_ft));
    lines.push(format!("  cruise_floor_ft: {}", cl.cruise_floor_ft));
    lines.push(format!("  descent_floor_ft: {}", cl.descent_floor_ft));
    lines.push(format!("  level_band_fpm: {}", cl.level_band_fpm));
    lines.push(String::new());

    let n = &config.negative_climb;
    lines.push("negative_climb:".into());
    lines.push(format!("  low_agl_ft: {}", n.low_agl_ft));
    lines.push(format!("  release_agl_ft: {}", n.release_agl_ft));
    lines.push(format!("  min_gain_ft: {}", n.min_gain_ft));
    lines.push(format!("  max_sink_fpm: {}", n.max_sink_fpm));
    lines.push(format!("  loss_fraction: {}", n.loss_fraction));

    lines.join("\n") + "\n"
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
