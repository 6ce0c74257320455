//! Time step index of one container.
//!
//! Maps physical time keys, kept sorted ascending, to the step number in
//! the file, and tracks the container's positioned ("current") key.

use crate::frs::format::TIME_EPS;

/// Where a wanted key falls relative to the keys of a container.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum KeyStatus {
    /// Never positioned, or no time steps
    #[default]
    NotSet,
    BeforeStart,
    Inside,
    AfterEnd,
}

/// Sorted `(time, step)` pairs plus the current position.
#[derive(Clone, Debug, Default)]
pub struct TimeIndex {
    keys: Vec<(f64, usize)>,
    current: usize,
    wanted: f64,
    status: KeyStatus,
}

impl TimeIndex {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Register the time of a step. Returns false if a key within
    /// [`TIME_EPS`] already exists; the earlier step is kept.
    pub fn insert(&mut self, time: f64, step: usize) -> bool {
        let at = self.keys.partition_point(|&(k, _)| k < time);
        let clash = |i: usize| self.keys.get(i).is_some_and(|&(k, _)| (k - time).abs() < TIME_EPS);
        if clash(at) || (at > 0 && clash(at - 1)) {
            return false;
        }
        self.keys.insert(at, (time, step));
        true
    }

    pub fn first_key(&self) -> Option<f64> {
        self.keys.first().map(|&(k, _)| k)
    }

    pub fn last_key(&self) -> Option<f64> {
        self.keys.last().map(|&(k, _)| k)
    }

    pub fn keys(&self) -> impl Iterator<Item = f64> + '_ {
        self.keys.iter().map(|&(k, _)| k)
    }

    /// Largest index with key <= `time` (within tolerance).
    pub fn floor_index(&self, time: f64) -> Option<usize> {
        self.keys.partition_point(|&(k, _)| k <= time + TIME_EPS).checked_sub(1)
    }

    /// Smallest index with key >= `time` (within tolerance).
    pub fn ceil_index(&self, time: f64) -> Option<usize> {
        let i = self.keys.partition_point(|&(k, _)| k < time - TIME_EPS);
        (i < self.keys.len()).then_some(i)
    }

    /// Latch the position for `time`. With `next_higher` the first key at
    /// or after `time` is chosen, otherwise the last key at or before it.
    pub fn position(&mut self, time: f64, next_higher: bool) -> KeyStatus {
        self.wanted = time;
        let (Some(first), Some(last)) = (self.first_key(), self.last_key()) else {
            self.status = KeyStatus::NotSet;
            return self.status;
        };

        if time < first - TIME_EPS {
            self.current = 0;
            self.status = KeyStatus::BeforeStart;
        } else if time > last + TIME_EPS {
            self.current = self.keys.len() - 1;
            self.status = KeyStatus::AfterEnd;
        } else {
            let index = if next_higher { self.ceil_index(time) } else { self.floor_index(time) };
            self.current = index.unwrap_or(0).min(self.keys.len() - 1);
            self.status = KeyStatus::Inside;
        }
        self.status
    }

    #[inline]
    pub fn status(&self) -> KeyStatus {
        self.status
    }

    /// Time the container was last asked for.
    #[inline]
    pub fn wanted_key(&self) -> f64 {
        self.wanted
    }

    /// Re-target the wanted key without moving the position.
    pub fn set_wanted_key(&mut self, time: f64) {
        self.wanted = time;
    }

    /// Key at the latched position.
    pub fn current_key(&self) -> Option<f64> {
        match self.status {
            KeyStatus::NotSet => None,
            _ => self.keys.get(self.current).map(|&(k, _)| k),
        }
    }

    /// File step number at the latched position.
    pub fn current_step(&self) -> Option<usize> {
        match self.status {
            KeyStatus::NotSet => None,
            _ => self.keys.get(self.current).map(|&(_, s)| s),
        }
    }

    /// Signed distance from the wanted key to the latched key.
    pub fn distance_from_pos_key(&self) -> f64 {
        self.current_key().map_or(f64::MAX, |k| k - self.wanted)
    }

    /// True if the latched key matches the wanted key.
    pub fn is_exact(&self) -> bool {
        self.status == KeyStatus::Inside && self.distance_from_pos_key().abs() < TIME_EPS
    }

    pub fn has_next(&self) -> bool {
        self.status != KeyStatus::NotSet && self.current + 1 < self.keys.len()
    }

    /// Move to the next key. Returns false on the last key or when not positioned.
    pub fn advance(&mut self) -> bool {
        if !self.has_next() {
            return false;
        }
        self.current += 1;
        self.wanted = self.keys[self.current].0;
        self.status = KeyStatus::Inside;
        true
    }

    /// Smallest key strictly after `time`.
    pub fn next_key_after(&self, time: f64) -> Option<f64> {
        let i = self.keys.partition_point(|&(k, _)| k <= time + TIME_EPS);
        self.keys.get(i).map(|&(k, _)| k)
    }
}
