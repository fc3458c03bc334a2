//! Alarm aggregation into a fixed-size table.

use crate::detector::DetectorSpec;
use crate::types::Alarm;

/// A session's alarm table. Length and entry order are fixed at creation
/// (detector registration order) so callers can correlate by index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlarmTable {
    alarms: Box<[Alarm]>,
}

impl AlarmTable {
    /// One inactive entry per registered detector.
    pub fn new(specs: &[DetectorSpec]) -> Self {
        let alarms = specs
            .iter()
            .map(|spec| Alarm {
                name: spec.name,
                importance: spec.importance,
                priority: spec.priority,
                active: false,
            })
            .collect();
        AlarmTable { alarms }
    }

    /// Rewrite every active flag from the detectors' ACTIVE flags and return
    /// the number of active alarms, counted from scratch.
    ///
    /// `active` must yield one flag per entry, in table order; missing
    /// flags leave the entry inactive.
    pub fn refresh<I>(&mut self, active: I) -> u8
    where
        I: IntoIterator<Item = bool>,
    {
        let mut active = active.into_iter();
        for alarm in self.alarms.iter_mut() {
            alarm.active = active.next().unwrap_or(false);
        }
        self.active_count()
    }

    pub fn active_count(&self) -> u8 {
        let n = self.alarms.iter().filter(|a| a.active).count();
        u8::try_from(n).unwrap_or(u8::MAX)
    }

    pub fn as_slice(&self) -> &[Alarm] {
        &self.alarms
    }

    pub fn len(&self) -> usize {
        self.alarms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alarms.is_empty()
    }

    pub fn active(&self) -> impl Iterator<Item = &Alarm> {
        self.alarms.iter().filter(|a| a.active)
    }

    /// Most urgent active alarm, if any.
    pub fn priority_alarm(&self) -> Option<&Alarm> {
        self.active().min_by_key(|a| a.priority)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
