//! Rolling aggregates over lock lifecycle events.

use crate::events::{EventKind, LockEvent};
use serde::Serialize;

/// Aggregated counters for one path, or process-wide when unscoped.
///
/// Lifecycle: created when the first event for a path arrives (or when the
/// path is tracked), updated on every event, cleared when the owning
/// monitor stops.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MonitorStats {
    /// Successful acquisitions.
    pub acquisitions: u64,

    /// Releases.
    pub releases: u64,

    /// Acquires abandoned at their deadline.
    pub timeouts: u64,

    /// Stale-record observations (from acquirers and the sweep).
    pub stale_detections: u64,

    /// Inspection or mutation errors.
    pub errors: u64,

    /// Holders currently outstanding (acquisitions minus releases,
    /// floored at zero).
    pub outstanding: u64,

    /// Wait-time distribution over acquisitions and timeouts, milliseconds.
    pub wait_min_ms: Option<u64>,
    pub wait_max_ms: Option<u64>,
    wait_sum_ms: u64,
    wait_count: u64,
}

impl MonitorStats {
    /// Fold one event into the aggregate.
    pub fn apply(&mut self, event: &LockEvent) {
        match event.kind {
            EventKind::Acquired => {
                self.acquisitions += 1;
                self.outstanding += 1;
            }
            EventKind::Released => {
                self.releases += 1;
                self.outstanding = self.outstanding.saturating_sub(1);
            }
            EventKind::TimedOut => self.timeouts += 1,
            EventKind::StaleDetected => self.stale_detections += 1,
            EventKind::Error => self.errors += 1,
        }

        if let Some(wait_ms) = event.wait_ms {
            self.wait_min_ms = Some(self.wait_min_ms.map_or(wait_ms, |m| m.min(wait_ms)));
            self.wait_max_ms = Some(self.wait_max_ms.map_or(wait_ms, |m| m.max(wait_ms)));
            self.wait_sum_ms += wait_ms;
            self.wait_count += 1;
        }
    }

    /// Mean wait in milliseconds over all waits observed so far.
    pub fn wait_mean_ms(&self) -> Option<f64> {
        if self.wait_count == 0 {
            None
        } else {
            Some(self.wait_sum_ms as f64 / self.wait_count as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::LockMode;

    fn event(kind: EventKind) -> LockEvent {
        LockEvent::new("/tmp/data.lock", kind).with_mode(LockMode::Exclusive)
    }

    #[test]
    fn counters_track_each_kind() {
        let mut stats = MonitorStats::default();
        stats.apply(&event(EventKind::Acquired));
        stats.apply(&event(EventKind::Acquired));
        stats.apply(&event(EventKind::Released));
        stats.apply(&event(EventKind::TimedOut));
        stats.apply(&event(EventKind::StaleDetected));
        stats.apply(&event(EventKind::Error));

        assert_eq!(stats.acquisitions, 2);
        assert_eq!(stats.releases, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.stale_detections, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.outstanding, 1);
    }

    #[test]
    fn outstanding_never_goes_below_zero() {
        let mut stats = MonitorStats::default();
        stats.apply(&event(EventKind::Released));
        stats.apply(&event(EventKind::Released));
        assert_eq!(stats.outstanding, 0);
    }

    #[test]
    fn wait_distribution_tracks_min_max_mean() {
        let mut stats = MonitorStats::default();
        stats.apply(&event(EventKind::Acquired).with_wait_ms(10));
        stats.apply(&event(EventKind::Acquired).with_wait_ms(30));
        stats.apply(&event(EventKind::TimedOut).with_wait_ms(200));

        assert_eq!(stats.wait_min_ms, Some(10));
        assert_eq!(stats.wait_max_ms, Some(200));
        assert_eq!(stats.wait_mean_ms(), Some(80.0));
    }

    #[test]
    fn no_waits_means_no_distribution() {
        let stats = MonitorStats::default();
        assert!(stats.wait_min_ms.is_none());
        assert!(stats.wait_mean_ms().is_none());
    }
}
