//! Event debouncing keyed by report identity.

use huedeck_hid_via_protocol::RawEvent;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Minimum interval between admitted events with the same identity.
pub const DEBOUNCE_INTERVAL: Duration = Duration::from_millis(30);

/// Identity of a knob event for debounce purposes.
///
/// A typed key over the identity bytes; free-form string keys invite
/// collisions between unrelated reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    family: u8,
    code: u8,
    direction: u8,
}

impl From<&RawEvent> for EventKey {
    fn from(event: &RawEvent) -> Self {
        Self {
            family: event.family,
            code: event.code,
            direction: event.direction_byte,
        }
    }
}

/// Suppresses repeats of the same event inside the debounce window.
///
/// The key space is bounded by the hardware's report vocabulary, so
/// entries are never evicted.
#[derive(Debug)]
pub struct DebounceFilter {
    interval: Duration,
    last_admitted: HashMap<EventKey, Instant>,
}

impl DebounceFilter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_admitted: HashMap::new(),
        }
    }

    /// Admit or reject an event observed at `now`.
    ///
    /// Rejected events do not refresh the stored stamp, so a fast-spinning
    /// knob still gets through once per interval instead of never.
    pub fn admit(&mut self, key: EventKey, now: Instant) -> bool {
        match self.last_admitted.get(&key) {
            Some(last) if now.duration_since(*last) < self.interval => false,
            _ => {
                self.last_admitted.insert(key, now);
                true
            }
        }
    }
}

impl Default for DebounceFilter {
    fn default() -> Self {
        Self::new(DEBOUNCE_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(family: u8, code: u8, direction: u8) -> EventKey {
        EventKey {
            family,
            code,
            direction,
        }
    }

    #[test]
    fn test_first_event_is_admitted() {
        let mut filter = DebounceFilter::default();
        assert!(filter.admit(key(0x04, 0xE9, 0), Instant::now()));
    }

    #[test]
    fn test_repeat_inside_window_is_rejected() {
        let mut filter = DebounceFilter::default();
        let start = Instant::now();
        assert!(filter.admit(key(0x04, 0xE9, 0), start));
        assert!(!filter.admit(key(0x04, 0xE9, 0), start + Duration::from_millis(10)));
    }

    #[test]
    fn test_rejection_does_not_refresh_the_window() {
        let mut filter = DebounceFilter::default();
        let start = Instant::now();
        assert!(filter.admit(key(0x06, 0x03, 0x20), start));
        // Rejected at 20ms; a third event 35ms after the FIRST still gets
        // through even though only 15ms passed since the rejection.
        assert!(!filter.admit(key(0x06, 0x03, 0x20), start + Duration::from_millis(20)));
        assert!(filter.admit(key(0x06, 0x03, 0x20), start + Duration::from_millis(35)));
    }

    #[test]
    fn test_distinct_keys_do_not_interfere() {
        let mut filter = DebounceFilter::default();
        let start = Instant::now();
        assert!(filter.admit(key(0x04, 0xE9, 0), start));
        assert!(filter.admit(key(0x04, 0xEA, 0), start));
        assert!(filter.admit(key(0x06, 0x03, 0x20), start));
        assert!(filter.admit(key(0x06, 0x03, 0x40), start));
    }

    #[test]
    fn test_exact_interval_boundary_is_admitted() {
        let mut filter = DebounceFilter::new(Duration::from_millis(30));
        let start = Instant::now();
        assert!(filter.admit(key(0x04, 0xE9, 0), start));
        assert!(filter.admit(key(0x04, 0xE9, 0), start + Duration::from_millis(30)));
    }
}
