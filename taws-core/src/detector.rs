//! Per-detector state machine with hysteresis.
//!
//! Every detector runs the same machine:
//!
//! ```text
//!            preconditions                 hazard x activate_after
//! DISARMED ----------------> ARMED ------------------------------> ACTIVE
//!    ^  <-------------------   ^  <------------------------------    |
//!    |   preconditions lost    |        clear x clear_after          |
//!    +-------------------------+------- (any state) ---------------> INHIBITED
//!                                    inputs unknown / crew inhibit
//! ```
//!
//! A slot moves at most one state per push and only counts hazard samples
//! when it was already ARMED at the start of the push, so nothing can
//! become ACTIVE on the push that armed it.

use std::str::FromStr;

use serde::Serialize;

use crate::config::TimingConfig;
use crate::types::{Importance, TawsError};

// ---------------------------------------------------------------------------
// Detector table
// ---------------------------------------------------------------------------

/// The hazard detector families, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorKind {
    ExcessiveDescentRate,
    TerrainClosure,
    InsufficientTerrainClearance,
    NegativeClimbAfterLowAltitude,
}

/// Static registration data for one detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectorSpec {
    pub kind: DetectorKind,
    pub name: &'static str,
    pub importance: Importance,
    /// Lower is more urgent.
    pub priority: u8,
}

/// Registered detectors. Alarm tables are built from this in this order.
pub const DETECTOR_TABLE: &[DetectorSpec] = &[
    DetectorSpec {
        kind: DetectorKind::ExcessiveDescentRate,
        name: "excessive_descent_rate",
        importance: Importance::Warning,
        priority: 2,
    },
    DetectorSpec {
        kind: DetectorKind::TerrainClosure,
        name: "terrain_closure",
        importance: Importance::Warning,
        priority: 3,
    },
    DetectorSpec {
        kind: DetectorKind::InsufficientTerrainClearance,
        name: "insufficient_terrain_clearance",
        importance: Importance::Caution,
        priority: 13,
    },
    DetectorSpec {
        kind: DetectorKind::NegativeClimbAfterLowAltitude,
        name: "negative_climb_after_low_altitude",
        importance: Importance::Caution,
        priority: 19,
    },
];

impl DetectorKind {
    /// Position of this detector in [`DETECTOR_TABLE`] and every alarm table.
    pub fn index(&self) -> usize {
        match self {
            DetectorKind::ExcessiveDescentRate => 0,
            DetectorKind::TerrainClosure => 1,
            DetectorKind::InsufficientTerrainClearance => 2,
            DetectorKind::NegativeClimbAfterLowAltitude => 3,
        }
    }

    pub fn spec(&self) -> &'static DetectorSpec {
        &DETECTOR_TABLE[self.index()]
    }

    pub fn name(&self) -> &'static str {
        self.spec().name
    }
}

impl FromStr for DetectorKind {
    type Err = TawsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DETECTOR_TABLE
            .iter()
            .find(|spec| spec.name == s)
            .map(|spec| spec.kind)
            .ok_or_else(|| TawsError::UnknownDetector(s.to_string()))
    }
}

impl std::fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectorState {
    #[default]
    Disarmed,
    Armed,
    Active,
    Inhibited,
}

impl std::fmt::Display for DetectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectorState::Disarmed => write!(f, "DISARMED"),
            DetectorState::Armed => write!(f, "ARMED"),
            DetectorState::Active => write!(f, "ACTIVE"),
            DetectorState::Inhibited => write!(f, "INHIBITED"),
        }
    }
}

/// One detector's verdict for the current push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Assessment {
    /// Inputs unknown or out of range.
    Invalid,
    /// Inputs fine, arming preconditions do not hold.
    Idle,
    /// Preconditions hold; `hazard` is the raw hazard condition.
    Ready { hazard: bool },
}

/// Detector-specific memory carried between pushes.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DetectorMemory {
    /// Arming latch for detectors that arm on a past event.
    pub latched: bool,
    /// Lowest AGL since the latch was set.
    pub floor_agl_ft: f64,
    /// Highest AGL since the lowest point.
    pub peak_agl_ft: f64,
}

/// Per-session state slot for one registered detector.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectorSlot {
    state: DetectorState,
    hazard_run: u32,
    clear_run: u32,
    crew_inhibited: bool,
    pub memory: DetectorMemory,
}

impl DetectorSlot {
    pub fn state(&self) -> DetectorState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == DetectorState::Active
    }

    pub fn crew_inhibited(&self) -> bool {
        self.crew_inhibited
    }

    pub fn set_crew_inhibit(&mut self, inhibited: bool) {
        self.crew_inhibited = inhibited;
    }

    /// Advance the machine by one push. Returns the new state.
    pub fn step(&mut self, assessment: Assessment, timing: &TimingConfig) -> DetectorState {
        if self.crew_inhibited || assessment == Assessment::Invalid {
            self.enter(DetectorState::Inhibited);
            return self.state;
        }

        match (self.state, assessment) {
            (DetectorState::Inhibited, Assessment::Ready { .. }) => {
                self.enter(DetectorState::Armed)
            }
            (DetectorState::Inhibited, _) => self.enter(DetectorState::Disarmed),

            (DetectorState::Disarmed, Assessment::Ready { .. }) => {
                self.enter(DetectorState::Armed)
            }
            (DetectorState::Disarmed, _) => {}

            (DetectorState::Armed, Assessment::Ready { hazard: true }) => {
                self.hazard_run += 1;
                if self.hazard_run >= timing.activate_after {
                    self.enter(DetectorState::Active);
                }
            }
            (DetectorState::Armed, Assessment::Ready { hazard: false }) => self.hazard_run = 0,
            (DetectorState::Armed, _) => self.enter(DetectorState::Disarmed),

            (DetectorState::Active, Assessment::Ready { hazard: true }) => self.clear_run = 0,
            (DetectorState::Active, _) => {
                self.clear_run += 1;
                if self.clear_run >= timing.clear_after {
                    let next = if matches!(assessment, Assessment::Idle) {
                        DetectorState::Disarmed
                    } else {
                        DetectorState::Armed
                    };
                    self.enter(next);
                }
            }
        }
        self.state
    }

    fn enter(&mut self, next: DetectorState) {
        self.hazard_run = 0;
        self.clear_run = 0;
        self.state = next;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const HAZARD: Assessment = Assessment::Ready { hazard: true };
    const CLEAR: Assessment = Assessment::Ready { hazard: false };

    fn timing(activate_after: u32, clear_after: u32) -> TimingConfig {
        TimingConfig {
            sample_interval_s: 1.0,
            activate_after,
            clear_after,
        }
    }

    fn active_slot(t: &TimingConfig) -> DetectorSlot {
        let mut slot = DetectorSlot::default();
        slot.step(CLEAR, t);
        for _ in 0..t.activate_after {
            slot.step(HAZARD, t);
        }
        assert_eq!(slot.state(), DetectorState::Active);
        slot
    }

    #[test]
    fn test_table_order_matches_index() {
        for (i, spec) in DETECTOR_TABLE.iter().enumerate() {
            assert_eq!(spec.kind.index(), i);
            assert_eq!(spec.kind.name(), spec.name);
        }
    }

    #[test]
    fn test_parse_kind() {
        let kind: DetectorKind = "terrain_closure".parse().unwrap();
        assert_eq!(kind, DetectorKind::TerrainClosure);
        assert!("mode_9".parse::<DetectorKind>().is_err());
        assert_eq!(kind.to_string(), "terrain_closure");
    }

    #[test]
    fn test_warnings_outrank_cautions() {
        let worst_warning = DETECTOR_TABLE
            .iter()
            .filter(|s| s.importance == Importance::Warning)
            .map(|s| s.priority)
            .max()
            .unwrap();
        let best_caution = DETECTOR_TABLE
            .iter()
            .filter(|s| s.importance == Importance::Caution)
            .map(|s| s.priority)
            .min()
            .unwrap();
        assert!(worst_warning < best_caution);
    }

    #[test]
    fn test_starts_disarmed() {
        let slot = DetectorSlot::default();
        assert_eq!(slot.state(), DetectorState::Disarmed);
    }

    #[test]
    fn test_cannot_activate_on_arming_push() {
        let t = timing(1, 1);
        let mut slot = DetectorSlot::default();
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Active);
    }

    #[test]
    fn test_activation_needs_consecutive_hazards() {
        let t = timing(3, 1);
        let mut slot = DetectorSlot::default();
        slot.step(CLEAR, &t);
        slot.step(HAZARD, &t);
        slot.step(HAZARD, &t);
        slot.step(CLEAR, &t);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Active);
    }

    #[test]
    fn test_single_clear_sample_does_not_drop_active() {
        let t = timing(2, 3);
        let mut slot = active_slot(&t);
        assert_eq!(slot.step(CLEAR, &t), DetectorState::Active);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Active);
        assert_eq!(slot.step(CLEAR, &t), DetectorState::Active);
        assert_eq!(slot.step(CLEAR, &t), DetectorState::Active);
        assert_eq!(slot.step(CLEAR, &t), DetectorState::Armed);
    }

    #[test]
    fn test_precondition_loss_while_active_is_debounced() {
        let t = timing(2, 2);
        let mut slot = active_slot(&t);
        assert_eq!(slot.step(Assessment::Idle, &t), DetectorState::Active);
        assert_eq!(slot.step(Assessment::Idle, &t), DetectorState::Disarmed);
    }

    #[test]
    fn test_armed_disarms_on_precondition_loss() {
        let t = timing(2, 2);
        let mut slot = DetectorSlot::default();
        slot.step(CLEAR, &t);
        assert_eq!(slot.step(Assessment::Idle, &t), DetectorState::Disarmed);
    }

    #[test]
    fn test_invalid_inputs_inhibit_and_reset() {
        let t = timing(2, 3);
        let mut slot = active_slot(&t);
        assert_eq!(slot.step(Assessment::Invalid, &t), DetectorState::Inhibited);
        assert!(!slot.is_active());
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Active);
    }

    #[test]
    fn test_inhibited_exits_to_disarmed_when_idle() {
        let t = timing(2, 3);
        let mut slot = DetectorSlot::default();
        slot.step(Assessment::Invalid, &t);
        assert_eq!(slot.step(Assessment::Idle, &t), DetectorState::Disarmed);
    }

    #[test]
    fn test_crew_inhibit() {
        let t = timing(1, 1);
        let mut slot = active_slot(&t);
        slot.set_crew_inhibit(true);
        assert!(slot.crew_inhibited());
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Inhibited);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Inhibited);
        slot.set_crew_inhibit(false);
        assert_eq!(slot.step(HAZARD, &t), DetectorState::Armed);
    }
}
