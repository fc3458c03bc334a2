//! Detector bank: the registered detector set plus the thresholds each
//! family evaluates against.
//!
//! A bank is built once per process and shared by every session through an
//! `Arc`; sessions only own their per-detector slots
//! ([`crate::detector::DetectorSlot`]).

use crate::config::Config;
use crate::detector::{Assessment, DetectorKind, DetectorMemory, DetectorSpec, DETECTOR_TABLE};
use crate::kinematics::Kinematics;
use crate::terrain::TerrainFacts;
use crate::types::{Result, Sample};

/// Everything a detector may look at for one push.
#[derive(Debug, Clone, Copy)]
pub struct Inputs<'a> {
    pub sample: &'a Sample,
    pub terrain: &'a TerrainFacts,
    /// `None` until two valid samples have been seen.
    pub kinematics: Option<&'a Kinematics>,
}

impl Inputs<'_> {
    fn agl_ft(&self) -> Option<f64> {
        self.terrain.ground_ft.map(|g| self.sample.agl_ft(g))
    }
}

/// Coarse flight phase from vertical speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Climb,
    Level,
    Descent,
}

impl Phase {
    pub fn from_vertical_speed(fpm: f64, level_band_fpm: f64) -> Self {
        if fpm > level_band_fpm {
            Phase::Climb
        } else if fpm < -level_band_fpm {
            Phase::Descent
        } else {
            Phase::Level
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetectorBank {
    config: Config,
}

impl DetectorBank {
    /// Build a bank from a validated config.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        Ok(DetectorBank { config })
    }

    /// Bank with default thresholds.
    pub fn standard() -> Self {
        DetectorBank {
            config: Config::default(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn specs(&self) -> &'static [DetectorSpec] {
        DETECTOR_TABLE
    }

    pub fn len(&self) -> usize {
        DETECTOR_TABLE.len()
    }

    pub fn is_empty(&self) -> bool {
        DETECTOR_TABLE.is_empty()
    }

    /// Whether derived rates are inside the configured limits.
    pub fn plausible(&self, kin: &Kinematics) -> bool {
        kin.ground_speed_kts.is_finite()
            && kin.vertical_speed_fpm.is_finite()
            && kin.ground_speed_kts <= self.config.kinematics.max_ground_speed_kts
    }

    /// Evaluate one detector family. May update that detector's memory.
    ///
    /// Out-of-range kinematics are `Invalid` for every family.
    pub fn assess(
        &self,
        kind: DetectorKind,
        memory: &mut DetectorMemory,
        inputs: &Inputs,
    ) -> Assessment {
        if inputs.kinematics.is_some_and(|k| !self.plausible(k)) {
            return Assessment::Invalid;
        }
        match kind {
            DetectorKind::ExcessiveDescentRate => self.excessive_descent_rate(inputs),
            DetectorKind::TerrainClosure => self.terrain_closure(inputs),
            DetectorKind::InsufficientTerrainClearance => {
                self.insufficient_clearance(memory, inputs)
            }
            DetectorKind::NegativeClimbAfterLowAltitude => {
                self.negative_climb_after_low(memory, inputs)
            }
        }
    }

    /// Sink rate above a limit that grows with height above terrain.
    fn excessive_descent_rate(&self, inputs: &Inputs) -> Assessment {
        let c = &self.config.descent;
        let (Some(agl), Some(kin)) = (inputs.agl_ft(), inputs.kinematics) else {
            return Assessment::Invalid;
        };
        if agl < c.min_agl_ft {
            return Assessment::Idle;
        }
        let sink_fpm = -kin.vertical_speed_fpm;
        let limit_fpm = c.base_fpm + c.fpm_per_ft * agl;
        Assessment::Ready {
            hazard: sink_fpm > limit_fpm,
        }
    }

    /// Gap to the terrain below shrinking too fast, or rising terrain ahead
    /// within the required clearance of the altitude predicted at the end of
    /// the look-ahead.
    fn terrain_closure(&self, inputs: &Inputs) -> Assessment {
        let c = &self.config.closure;
        let (Some(agl), Some(kin)) = (inputs.agl_ft(), inputs.kinematics) else {
            return Assessment::Invalid;
        };
        let Some(closure_fpm) = kin.closure_rate_fpm else {
            return Assessment::Invalid;
        };
        if agl < c.min_agl_ft || agl > c.max_agl_ft {
            return Assessment::Idle;
        }

        let closing = closure_fpm > c.base_fpm + c.fpm_per_ft * agl;

        let predicted_ft =
            inputs.sample.altitude_ft + kin.vertical_speed_fpm * c.lookahead_s / 60.0;
        let rising_ahead = match (inputs.terrain.corridor_max_ft, inputs.terrain.ground_ft) {
            (Some(ahead), Some(below)) => {
                ahead > below && predicted_ft - ahead < c.required_clearance_ft
            }
            _ => false,
        };

        Assessment::Ready {
            hazard: closing || rising_ahead,
        }
    }

    /// Too low for the current phase after having been well clear of terrain.
    /// Touching down releases the latch.
    fn insufficient_clearance(&self, memory: &mut DetectorMemory, inputs: &Inputs) -> Assessment {
        let c = &self.config.clearance;
        let Some(agl) = inputs.agl_ft() else {
            return Assessment::Invalid;
        };
        if agl >= c.arm_agl_ft {
            memory.latched = true;
        } else if agl < c.disarm_agl_ft {
            memory.latched = false;
        }
        if !memory.latched {
            return Assessment::Idle;
        }

        let phase = inputs
            .kinematics
            .map(|k| Phase::from_vertical_speed(k.vertical_speed_fpm, c.level_band_fpm))
            .unwrap_or(Phase::Level);
        let hazard = match phase {
            Phase::Climb => false,
            Phase::Level => agl < c.cruise_floor_ft,
            Phase::Descent => agl < c.descent_floor_ft,
        };
        Assessment::Ready { hazard }
    }

    /// Sinking or losing height after climbing away from a very low point.
    fn negative_climb_after_low(
        &self,
        memory: &mut DetectorMemory,
        inputs: &Inputs,
    ) -> Assessment {
        let c = &self.config.negative_climb;
        let Some(agl) = inputs.agl_ft() else {
            return Assessment::Invalid;
        };

        if agl < c.low_agl_ft && (!memory.latched || agl <= memory.floor_agl_ft) {
            memory.latched = true;
            memory.floor_agl_ft = agl;
            memory.peak_agl_ft = agl;
        } else if memory.latched && agl > c.release_agl_ft {
            memory.latched = false;
        }
        if !memory.latched {
            return Assessment::Idle;
        }
        memory.peak_agl_ft = memory.peak_agl_ft.max(agl);

        let Some(kin) = inputs.kinematics else {
            return Assessment::Invalid;
        };
        if memory.peak_agl_ft - memory.floor_agl_ft < c.min_gain_ft {
            return Assessment::Ready { hazard: false };
        }

        let sinking = -kin.vertical_speed_fpm > c.max_sink_fpm;
        let loss = memory.peak_agl_ft - agl;
        let losing = memory.peak_agl_ft > 0.0 && loss > c.loss_fraction * memory.peak_agl_ft;
        Assessment::Ready {
            hazard: sinking || losing,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
