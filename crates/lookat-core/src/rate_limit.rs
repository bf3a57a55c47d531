//! Tick-based throttle with a one-shot shorter interval.

/// Decides whether an action may run at a given tick.
///
/// An action is permitted when at least `interval` ticks have passed since
/// the last permitted one. An armed override replaces the interval for every
/// decision until [`RateLimitTracker::clear_override`] is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitTracker {
    interval: u64,
    override_interval: Option<u64>,
    last_permitted: Option<u64>,
}

impl RateLimitTracker {
    /// Create a tracker that has never permitted anything.
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            override_interval: None,
            last_permitted: None,
        }
    }

    /// Steady-state interval in ticks.
    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Change the steady-state interval. Takes effect on the next decision.
    pub fn set_interval(&mut self, interval: u64) {
        self.interval = interval;
    }

    /// Arm a shorter interval.
    pub fn set_override(&mut self, interval: u64) {
        self.override_interval = Some(interval);
    }

    /// Disarm the override.
    pub fn clear_override(&mut self) {
        self.override_interval = None;
    }

    /// The armed override, if any.
    pub fn override_interval(&self) -> Option<u64> {
        self.override_interval
    }

    /// Tick of the last permitted action.
    pub fn last_permitted(&self) -> Option<u64> {
        self.last_permitted
    }

    /// Returns `true` and records `now` if the active interval has elapsed.
    pub fn update(&mut self, now: u64) -> bool {
        let active = self.override_interval.unwrap_or(self.interval);
        let permitted = match self.last_permitted {
            None => true,
            // Clock went backwards, e.g. the world was reloaded.
            Some(last) if now < last => true,
            Some(last) => now - last >= active,
        };
        if permitted {
            self.last_permitted = Some(now);
        }
        permitted
    }
}
