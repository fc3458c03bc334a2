//! Session store: per-aircraft engine state across create/push/delete.
//!
//! A [`Session`] owns everything that changes between pushes: the previous
//! fix, the implied clock, one detector slot per registered detector, and
//! the alarm table. The detector bank and the terrain source are shared.
//!
//! [`SessionStore`] hands out generation-tagged handles so a push or delete
//! on a deleted session is reported as [`TawsError::InvalidHandle`] instead
//! of reaching another session that reused the slot.

use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::alarms::AlarmTable;
use crate::bank::{DetectorBank, Inputs};
use crate::detector::{DetectorKind, DetectorSlot, DetectorState};
use crate::kinematics::{self, Fix, Kinematics};
use crate::terrain::{TerrainGateway, TerrainSource};
use crate::types::{Alarm, Result, Sample, TawsError};

/// Sessions a store holds unless told otherwise.
pub const DEFAULT_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Engine state for one aircraft. Pushes must be serialized by the caller.
pub struct Session {
    bank: Arc<DetectorBank>,
    terrain: Arc<dyn TerrainSource>,
    previous: Option<Fix>,
    clock_s: f64,
    slots: Box<[DetectorSlot]>,
    table: AlarmTable,
    kinematics: Option<Kinematics>,
    accepted: u64,
    rejected: u64,
}

impl Session {
    pub fn new(bank: Arc<DetectorBank>, terrain: Arc<dyn TerrainSource>) -> Self {
        let slots = vec![DetectorSlot::default(); bank.len()].into_boxed_slice();
        let table = AlarmTable::new(bank.specs());
        Session {
            bank,
            terrain,
            previous: None,
            clock_s: 0.0,
            slots,
            table,
            kinematics: None,
            accepted: 0,
            rejected: 0,
        }
    }

    /// Push a sample taken one configured sample interval after the last
    /// push. Returns the number of active alarms.
    pub fn push(&mut self, lat: f64, lon: f64, altitude_ft: f64) -> u8 {
        let t_s = if self.pushes() == 0 {
            0.0
        } else {
            self.clock_s + self.bank.config().timing.sample_interval_s
        };
        self.clock_s = t_s;
        self.process(Sample::new(lat, lon, altitude_ft), t_s)
    }

    /// Push a sample with an explicit timestamp in seconds.
    pub fn push_timed(&mut self, lat: f64, lon: f64, altitude_ft: f64, t_s: f64) -> u8 {
        if !t_s.is_finite() {
            self.rejected += 1;
            warn!(t_s, "rejected sample: non-finite timestamp");
            return self.table.active_count();
        }
        self.clock_s = t_s;
        self.process(Sample::new(lat, lon, altitude_ft), t_s)
    }

    fn process(&mut self, sample: Sample, t_s: f64) -> u8 {
        if let Err(e) = sample.validate() {
            self.rejected += 1;
            warn!(error = %e, "rejected sample, keeping previous fix");
            return self.table.active_count();
        }

        let bank = &self.bank;
        let config = bank.config();
        let gateway = TerrainGateway::new(self.terrain.as_ref(), config.lookahead());

        let ground_ft = gateway.ground(&sample);
        if ground_ft.is_none() {
            debug!(lat = sample.lat, lon = sample.lon, "terrain unknown");
        }
        let kinematics = self
            .previous
            .as_ref()
            .map(|prev| kinematics::estimate(prev, &sample, t_s, ground_ft));
        let plausible = kinematics.as_ref().filter(|k| bank.plausible(k));
        if kinematics.is_some() && plausible.is_none() {
            debug!(?kinematics, "kinematics out of range");
        }
        let facts = gateway.facts(&sample, ground_ft, plausible);
        trace!(?kinematics, ?facts, "push");

        let inputs = Inputs {
            sample: &sample,
            terrain: &facts,
            kinematics: kinematics.as_ref(),
        };
        for (spec, slot) in bank.specs().iter().zip(self.slots.iter_mut()) {
            let before = slot.state();
            let assessment = bank.assess(spec.kind, &mut slot.memory, &inputs);
            let after = slot.step(assessment, &config.timing);
            if before != after {
                debug!(detector = spec.name, from = %before, to = %after, "detector transition");
            }
        }

        self.previous = Some(Fix {
            sample,
            t_s,
            ground_ft,
        });
        self.kinematics = kinematics;
        self.accepted += 1;

        self.table
            .refresh(self.slots.iter().map(DetectorSlot::is_active))
    }

    /// Read-only view of the alarm table.
    pub fn alarms(&self) -> &[Alarm] {
        self.table.as_slice()
    }

    pub fn alarm_table(&self) -> &AlarmTable {
        &self.table
    }

    pub fn active_count(&self) -> u8 {
        self.table.active_count()
    }

    pub fn state(&self, kind: DetectorKind) -> DetectorState {
        self.slots[kind.index()].state()
    }

    /// Crew inhibit; takes effect on the next push.
    pub fn inhibit(&mut self, kind: DetectorKind) {
        self.slots[kind.index()].set_crew_inhibit(true);
    }

    pub fn uninhibit(&mut self, kind: DetectorKind) {
        self.slots[kind.index()].set_crew_inhibit(false);
    }

    pub fn is_inhibited(&self, kind: DetectorKind) -> bool {
        self.slots[kind.index()].crew_inhibited()
    }

    /// Last accepted sample.
    pub fn previous_sample(&self) -> Option<&Sample> {
        self.previous.as_ref().map(|f| &f.sample)
    }

    /// Rates derived on the last accepted push.
    pub fn kinematics(&self) -> Option<&Kinematics> {
        self.kinematics.as_ref()
    }

    pub fn accepted_samples(&self) -> u64 {
        self.accepted
    }

    pub fn rejected_samples(&self) -> u64 {
        self.rejected
    }

    fn pushes(&self) -> u64 {
        self.accepted + self.rejected
    }
}

// ---------------------------------------------------------------------------
// Store + handles
// ---------------------------------------------------------------------------

/// Handle to a session in a [`SessionStore`]. Stale after `delete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle {
    index: u32,
    generation: u32,
}

struct Slot {
    generation: u32,
    session: Option<Session>,
}

/// Owns sessions and validates every handle before touching one.
pub struct SessionStore {
    bank: Arc<DetectorBank>,
    terrain: Arc<dyn TerrainSource>,
    slots: Vec<Slot>,
    free: Vec<u32>,
    capacity: usize,
}

impl SessionStore {
    pub fn new(bank: Arc<DetectorBank>, terrain: Arc<dyn TerrainSource>) -> Self {
        Self::with_capacity(bank, terrain, DEFAULT_CAPACITY)
    }

    pub fn with_capacity(
        bank: Arc<DetectorBank>,
        terrain: Arc<dyn TerrainSource>,
        capacity: usize,
    ) -> Self {
        SessionStore {
            bank,
            terrain,
            slots: Vec::new(),
            free: Vec::new(),
            capacity: capacity.min(u32::MAX as usize),
        }
    }

    /// Create a session with an all-inactive alarm table and no previous fix.
    pub fn create(&mut self) -> Result<SessionHandle> {
        let session = || Session::new(Arc::clone(&self.bank), Arc::clone(&self.terrain));

        let handle = if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.session = Some(session());
            SessionHandle {
                index,
                generation: slot.generation,
            }
        } else if self.slots.len() < self.capacity {
            let index = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 0,
                session: Some(session()),
            });
            SessionHandle {
                index,
                generation: 0,
            }
        } else {
            return Err(TawsError::CapacityExhausted {
                capacity: self.capacity,
            });
        };

        debug!(?handle, "session created");
        Ok(handle)
    }

    /// Push a sample. Returns the active alarm count, or `InvalidHandle`.
    pub fn push(
        &mut self,
        handle: SessionHandle,
        lat: f64,
        lon: f64,
        altitude_ft: f64,
    ) -> Result<u8> {
        Ok(self.session_mut(handle)?.push(lat, lon, altitude_ft))
    }

    pub fn push_timed(
        &mut self,
        handle: SessionHandle,
        lat: f64,
        lon: f64,
        altitude_ft: f64,
        t_s: f64,
    ) -> Result<u8> {
        Ok(self.session_mut(handle)?.push_timed(lat, lon, altitude_ft, t_s))
    }

    /// Delete a session. A second delete of the same handle fails with
    /// `InvalidHandle` and changes nothing.
    pub fn delete(&mut self, handle: SessionHandle) -> Result<()> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation && s.session.is_some());
        let Some(slot) = slot else {
            warn!(?handle, "delete on invalid session handle");
            return Err(TawsError::InvalidHandle);
        };
        slot.session = None;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        debug!(?handle, "session deleted");
        Ok(())
    }

    pub fn session(&self, handle: SessionHandle) -> Result<&Session> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.session.as_ref())
            .ok_or(TawsError::InvalidHandle)
    }

    pub fn session_mut(&mut self, handle: SessionHandle) -> Result<&mut Session> {
        let session = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.session.as_mut());
        match session {
            Some(s) => Ok(s),
            None => {
                warn!(?handle, "invalid session handle");
                Err(TawsError::InvalidHandle)
            }
        }
    }

    pub fn alarms(&self, handle: SessionHandle) -> Result<&[Alarm]> {
        Ok(self.session(handle)?.alarms())
    }

    pub fn inhibit(&mut self, handle: SessionHandle, kind: DetectorKind) -> Result<()> {
        self.session_mut(handle)?.inhibit(kind);
        Ok(())
    }

    pub fn uninhibit(&mut self, handle: SessionHandle, kind: DetectorKind) -> Result<()> {
        self.session_mut(handle)?.uninhibit(kind);
        Ok(())
    }

    /// Live sessions.
    pub fn len(&self) -> usize {
        self.slots.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::terrain::{FlatTerrain, GridTerrain, NoTerrain};

    fn store_over(terrain: Arc<dyn TerrainSource>) -> SessionStore {
        SessionStore::new(Arc::new(DetectorBank::standard()), terrain)
    }

    fn flat_store(elevation_ft: f64) -> SessionStore {
        store_over(Arc::new(FlatTerrain(elevation_ft)))
    }

    fn active_names(alarms: &[Alarm]) -> Vec<&'static str> {
        alarms.iter().filter(|a| a.active).map(|a| a.name).collect()
    }

    /// Terrain known only south of 47.5 N.
    struct Patchy;
    impl TerrainSource for Patchy {
        fn elevation_ft(&self, lat: f64, _lon: f64) -> Option<f64> {
            (lat < 47.5).then_some(1500.0)
        }
    }

    #[test]
    fn test_create_initial_table() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        let alarms = store.alarms(h).unwrap();
        assert_eq!(alarms.len(), 4);
        assert!(alarms.iter().all(|a| !a.active));
        assert!(store.session(h).unwrap().previous_sample().is_none());
    }

    #[test]
    fn test_first_push_is_always_zero() {
        for alt in [-1000.0, 0.0, 100.0, 10_000.0, 60_000.0] {
            let mut store = flat_store(0.0);
            let h = store.create().unwrap();
            assert_eq!(store.push(h, 47.0, 8.0, alt).unwrap(), 0, "alt {alt}");
        }
    }

    #[test]
    fn test_excessive_descent_scenario() {
        let mut store = flat_store(1500.0);
        let h = store.create().unwrap();

        assert_eq!(store.push(h, 47.0, 8.0, 10_000.0).unwrap(), 0);
        assert_eq!(store.push(h, 47.0, 8.0, 9_000.0).unwrap(), 0);
        let k = store.session(h).unwrap().kinematics().copied().unwrap();
        assert!((k.vertical_speed_fpm + 60_000.0).abs() < 1e-6);

        assert_eq!(store.push(h, 47.0, 8.0, 8_000.0).unwrap(), 0);
        let n = store.push(h, 47.0, 8.0, 7_000.0).unwrap();
        assert!(n >= 1);
        assert_eq!(
            active_names(store.alarms(h).unwrap()),
            vec!["excessive_descent_rate"]
        );
    }

    #[test]
    fn test_active_alarm_survives_single_clear_sample() {
        let mut store = flat_store(1500.0);
        let h = store.create().unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0] {
            store.push(h, 47.0, 8.0, alt).unwrap();
        }
        // Level for one sample, then descending again
        assert_eq!(store.push(h, 47.0, 8.0, 7_000.0).unwrap(), 1);
        assert_eq!(store.push(h, 47.0, 8.0, 6_000.0).unwrap(), 1);
        // Level long enough to clear
        assert_eq!(store.push(h, 47.0, 8.0, 6_000.0).unwrap(), 1);
        assert_eq!(store.push(h, 47.0, 8.0, 6_000.0).unwrap(), 1);
        assert_eq!(store.push(h, 47.0, 8.0, 6_000.0).unwrap(), 0);
        let s = store.session(h).unwrap();
        assert_eq!(s.state(DetectorKind::ExcessiveDescentRate), DetectorState::Armed);
    }

    #[test]
    fn test_invalid_latitude_rejected() {
        let mut store = flat_store(1500.0);
        let h = store.create().unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0] {
            store.push(h, 47.0, 8.0, alt).unwrap();
        }
        let before = store.alarms(h).unwrap().to_vec();
        let count = store.session(h).unwrap().active_count();

        assert_eq!(store.push(h, 200.0, 8.0, 7_000.0).unwrap(), count);

        let s = store.session(h).unwrap();
        assert_eq!(s.previous_sample(), Some(&Sample::new(47.0, 8.0, 7_000.0)));
        assert_eq!(s.alarms(), before.as_slice());
        assert_eq!(s.rejected_samples(), 1);
        assert_eq!(s.accepted_samples(), 4);
    }

    #[test]
    fn test_invalid_first_sample_keeps_cold_start() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        assert_eq!(store.push(h, 47.0, 8.0, f64::NAN).unwrap(), 0);
        assert_eq!(store.push(h, 47.0, 8.0, 5_000.0).unwrap(), 0);
        assert!(store.session(h).unwrap().kinematics().is_none());
    }

    #[test]
    fn test_instances_are_independent() {
        let mut store = flat_store(1500.0);
        let a = store.create().unwrap();
        let b = store.create().unwrap();
        let c = store.create().unwrap();

        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0, 7_000.0] {
            let na = store.push(a, 47.0, 8.0, alt).unwrap();
            let nb = store.push(b, 47.0, 8.0, alt).unwrap();
            assert_eq!(na, nb);
            store.push(c, 47.0, 8.0, 12_000.0).unwrap();
        }
        assert_eq!(store.alarms(a).unwrap(), store.alarms(b).unwrap());
        assert_eq!(store.session(c).unwrap().active_count(), 0);
    }

    #[test]
    fn test_table_shape_and_reads_are_stable() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        let names: Vec<_> = store.alarms(h).unwrap().iter().map(|a| a.name).collect();
        for i in 0..20 {
            store.push(h, 47.0, 8.0 + i as f64 * 0.01, 3_000.0 - i as f64 * 140.0).unwrap();
            let first = store.alarms(h).unwrap().to_vec();
            let second = store.alarms(h).unwrap().to_vec();
            assert_eq!(first, second);
            let now: Vec<_> = first.iter().map(|a| a.name).collect();
            assert_eq!(now, names);
        }
    }

    #[test]
    fn test_double_delete_and_push_after_delete() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        store.push(h, 47.0, 8.0, 3_000.0).unwrap();
        store.delete(h).unwrap();

        assert!(matches!(store.delete(h), Err(TawsError::InvalidHandle)));
        assert!(matches!(store.push(h, 47.0, 8.0, 3_000.0), Err(TawsError::InvalidHandle)));
        assert!(matches!(store.alarms(h), Err(TawsError::InvalidHandle)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_stale_handle_does_not_reach_reused_slot() {
        let mut store = flat_store(0.0);
        let old = store.create().unwrap();
        store.delete(old).unwrap();
        let new = store.create().unwrap();
        assert_ne!(old, new);

        assert!(store.push(old, 47.0, 8.0, 3_000.0).is_err());
        assert!(store.delete(old).is_err());
        assert_eq!(store.session(new).unwrap().accepted_samples(), 0);
        assert_eq!(store.push(new, 47.0, 8.0, 3_000.0).unwrap(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_capacity_exhausted() {
        let bank = Arc::new(DetectorBank::standard());
        let mut store = SessionStore::with_capacity(bank, Arc::new(NoTerrain), 2);
        let a = store.create().unwrap();
        store.create().unwrap();
        assert!(matches!(
            store.create(),
            Err(TawsError::CapacityExhausted { capacity: 2 })
        ));
        assert_eq!(store.len(), 2);

        store.delete(a).unwrap();
        assert!(store.create().is_ok());
        assert_eq!(store.capacity(), 2);
    }

    #[test]
    fn test_no_terrain_inhibits_everything() {
        let mut store = store_over(Arc::new(NoTerrain));
        let h = store.create().unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0, 6_000.0] {
            assert_eq!(store.push(h, 47.0, 8.0, alt).unwrap(), 0);
        }
        let s = store.session(h).unwrap();
        for spec in crate::detector::DETECTOR_TABLE {
            assert_eq!(s.state(spec.kind), DetectorState::Inhibited);
        }
    }

    #[test]
    fn test_leaving_terrain_coverage_drops_alarm() {
        let mut store = store_over(Arc::new(Patchy));
        let h = store.create().unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0] {
            store.push(h, 47.0, 8.0, alt).unwrap();
        }
        assert_eq!(store.session(h).unwrap().active_count(), 1);

        assert_eq!(store.push(h, 48.0, 8.0, 6_000.0).unwrap(), 0);
        let s = store.session(h).unwrap();
        assert_eq!(
            s.state(DetectorKind::ExcessiveDescentRate),
            DetectorState::Inhibited
        );
    }

    #[test]
    fn test_crew_inhibit_through_store() {
        let mut store = flat_store(1500.0);
        let h = store.create().unwrap();
        let kind = DetectorKind::ExcessiveDescentRate;
        store.inhibit(h, kind).unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0, 6_000.0] {
            assert_eq!(store.push(h, 47.0, 8.0, alt).unwrap(), 0);
        }
        assert!(store.session(h).unwrap().is_inhibited(kind));

        store.uninhibit(h, kind).unwrap();
        store.push(h, 47.0, 8.0, 5_000.0).unwrap();
        store.push(h, 47.0, 8.0, 4_000.0).unwrap();
        assert_eq!(store.push(h, 47.0, 8.0, 3_000.0).unwrap(), 1);
    }

    #[test]
    fn test_timed_duplicate_timestamp_gives_zero_rates() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        store.push_timed(h, 47.0, 8.0, 5_000.0, 100.0).unwrap();
        store.push_timed(h, 47.0, 8.0, 1_000.0, 100.0).unwrap();
        let k = store.session(h).unwrap().kinematics().copied().unwrap();
        assert_eq!(k.vertical_speed_fpm, 0.0);
        assert!(k.vertical_speed_fpm.is_finite());

        assert_eq!(store.push_timed(h, 47.0, 8.0, 900.0, f64::NAN).unwrap(), 0);
        assert_eq!(store.session(h).unwrap().rejected_samples(), 1);
    }

    #[test]
    fn test_timed_interval_scales_rates() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        store.push_timed(h, 47.0, 8.0, 5_000.0, 0.0).unwrap();
        store.push_timed(h, 47.0, 8.0, 4_900.0, 6.0).unwrap();
        let k = store.session(h).unwrap().kinematics().copied().unwrap();
        assert!((k.vertical_speed_fpm + 1_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_configured_sample_interval() {
        let mut config = Config::default();
        config.timing.sample_interval_s = 2.0;
        let bank = Arc::new(DetectorBank::new(config).unwrap());
        let mut session = Session::new(bank, Arc::new(FlatTerrain(0.0)));
        session.push(47.0, 8.0, 5_000.0);
        session.push(47.0, 8.0, 4_000.0);
        let k = session.kinematics().unwrap();
        assert_eq!(k.elapsed_s, 2.0);
        assert!((k.vertical_speed_fpm + 30_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_negative_climb_after_takeoff() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        for alt in [0.0, 0.0, 100.0, 200.0, 300.0, 400.0, 500.0, 490.0] {
            store.push(h, 47.0, 8.0, alt).unwrap();
        }
        assert_eq!(store.push(h, 47.0, 8.0, 480.0).unwrap(), 1);
        assert_eq!(
            active_names(store.alarms(h).unwrap()),
            vec!["negative_climb_after_low_altitude"]
        );
    }

    /// One column along 8.0 E: 500 ft up to 47.14 N, a ridge beyond.
    fn ridge_store(ridge_ft: f64) -> SessionStore {
        let posts: Vec<f64> = (0..30).map(|r| if r < 15 { 500.0 } else { ridge_ft }).collect();
        let grid = GridTerrain::new(47.0, 8.0, 0.01, 30, 1, posts).unwrap();
        store_over(Arc::new(grid))
    }

    /// Fly north at ~360 kts from 47.05 N, one sample per second.
    fn fly_north(store: &mut SessionStore, h: SessionHandle, start_ft: f64, vs_fpm: f64) {
        for i in 0..6 {
            let lat = 47.05 + i as f64 * (0.1 / 60.0);
            let alt = start_ft + vs_fpm / 60.0 * i as f64;
            store.push_timed(h, lat, 8.0, alt, i as f64).unwrap();
        }
    }

    #[test]
    fn test_rising_terrain_ahead() {
        let mut store = ridge_store(2600.0);
        let h = store.create().unwrap();

        // 0.1 deg/min north ~ 360 kts, level at 2800 ft
        for i in 0..80 {
            let lat = 47.0 + i as f64 * (0.1 / 60.0);
            store.push_timed(h, lat, 8.0, 2_800.0, i as f64).unwrap();
        }
        let s = store.session(h).unwrap();
        assert_eq!(s.state(DetectorKind::TerrainClosure), DetectorState::Active);
        assert_eq!(active_names(s.alarms()), vec!["terrain_closure"]);
        assert_eq!(s.alarm_table().priority_alarm().unwrap().name, "terrain_closure");
    }

    #[test]
    fn test_descending_toward_ridge() {
        let mut store = ridge_store(2400.0);
        let level = store.create().unwrap();
        let descending = store.create().unwrap();

        // 500 ft above the ridge: clear while level
        fly_north(&mut store, level, 2900.0, 0.0);
        let s = store.session(level).unwrap();
        assert_eq!(s.active_count(), 0);
        assert_eq!(s.state(DetectorKind::TerrainClosure), DetectorState::Armed);

        // Same start, 1500 fpm down: below the ridge within the look-ahead
        fly_north(&mut store, descending, 2900.0, -1500.0);
        let s = store.session(descending).unwrap();
        assert_eq!(s.state(DetectorKind::TerrainClosure), DetectorState::Active);
        assert_eq!(active_names(s.alarms()), vec!["terrain_closure"]);
    }

    #[test]
    fn test_position_jump_inhibits() {
        let mut store = flat_store(1500.0);
        let h = store.create().unwrap();
        for alt in [10_000.0, 9_000.0, 8_000.0, 7_000.0] {
            store.push(h, 47.0, 8.0, alt).unwrap();
        }
        assert_eq!(store.session(h).unwrap().active_count(), 1);

        // 1 deg of latitude in 1 s
        assert_eq!(store.push(h, 48.0, 8.0, 6_000.0).unwrap(), 0);
        let s = store.session(h).unwrap();
        assert!(s.kinematics().unwrap().ground_speed_kts > 100_000.0);
        for spec in crate::detector::DETECTOR_TABLE {
            assert_eq!(s.state(spec.kind), DetectorState::Inhibited, "{}", spec.name);
        }

        // Back to a plausible 216 kts
        store.push(h, 48.001, 8.0, 6_000.0).unwrap();
        let s = store.session(h).unwrap();
        assert_eq!(
            s.state(DetectorKind::ExcessiveDescentRate),
            DetectorState::Armed
        );
    }

    #[test]
    fn test_takeoff_approach_and_parking() {
        let mut store = flat_store(0.0);
        let h = store.create().unwrap();
        let mut profile = vec![0.0; 5];
        profile.extend((1..=100).map(|i| i as f64 * 20.0)); // 1200 fpm up to 2000
        profile.extend([2_000.0; 10]);
        profile.extend((0..200).rev().map(|i| i as f64 * 10.0)); // 600 fpm down to 0

        let mut caution_on_final = false;
        for alt in profile {
            store.push(h, 47.0, 8.0, alt).unwrap();
            let s = store.session(h).unwrap();
            caution_on_final |= s.state(DetectorKind::InsufficientTerrainClearance)
                == DetectorState::Active;
        }
        assert!(caution_on_final);

        for _ in 0..20 {
            assert_eq!(store.push(h, 47.0, 8.0, 0.0).unwrap(), 0);
        }
        let s = store.session(h).unwrap();
        assert!(s.alarms().iter().all(|a| !a.active));
        assert_eq!(
            s.state(DetectorKind::InsufficientTerrainClearance),
            DetectorState::Disarmed
        );
    }
}
