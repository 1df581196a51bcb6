//! Lock lifecycle monitoring.
//!
//! A [`LockMonitor`] observes one or more lock primitives through the
//! [`EventSink`] interface: it records acquisition/release/timeout/stale
//! events, aggregates per-path and global statistics, and can run a
//! periodic sweep that inspects tracked lock records for staleness.
//!
//! The monitor holds only an observing registration; it never owns lock
//! handles and never breaks a lock itself. Breaking stays the primitive's
//! job, gated by `break_stale`.
//!
//! # Process-wide singleton
//!
//! [`global_monitor`] lazily starts a shared instance with default options;
//! [`LockMonitor::stop`] tears it down again. Tests that need isolation
//! create independent instances via [`LockMonitor::start`] instead.

mod stats;

pub use stats::MonitorStats;

use crate::events::{append_event, EventKind, EventSink, LockEvent};
use crate::lock::read_record;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, Weak};
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Options for a monitor instance.
#[derive(Debug, Clone)]
pub struct MonitorOptions {
    /// Interval between sweep ticks. `0` disables the background sweep;
    /// `sweep_once` remains available for manual ticks.
    pub sweep_interval_ms: u64,

    /// Capacity of the recent-event ring buffer.
    pub event_buffer: usize,

    /// Log a warning when an acquisition waited at least this long.
    pub wait_alert_ms: Option<u64>,

    /// Age cap used by the sweep's staleness check, on top of liveness.
    pub max_holder_age_secs: Option<u64>,

    /// When set, every event is also appended to this NDJSON log.
    pub event_log: Option<PathBuf>,
}

impl Default for MonitorOptions {
    fn default() -> Self {
        Self {
            sweep_interval_ms: 30_000,
            event_buffer: 256,
            wait_alert_ms: None,
            max_holder_age_secs: None,
            event_log: None,
        }
    }
}

#[derive(Default)]
struct MonitorState {
    per_path: BTreeMap<PathBuf, MonitorStats>,
    global: MonitorStats,
    recent: VecDeque<LockEvent>,
    tracked: BTreeSet<PathBuf>,
    subscribers: Vec<Box<dyn Fn(&LockEvent) + Send + Sync>>,
    /// True only while the last sweep failed to inspect every tracked path.
    all_paths_failing: bool,
}

/// Observes lock lifecycle events and sweeps tracked paths for staleness.
pub struct LockMonitor {
    options: MonitorOptions,
    state: Mutex<MonitorState>,
    stopped: AtomicBool,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl LockMonitor {
    /// Create a monitor and, unless `sweep_interval_ms` is zero, spawn its
    /// background sweep thread.
    pub fn start(options: MonitorOptions) -> Arc<Self> {
        let monitor = Arc::new(Self {
            options: options.clone(),
            state: Mutex::new(MonitorState::default()),
            stopped: AtomicBool::new(false),
            sweeper: Mutex::new(None),
        });

        if options.sweep_interval_ms > 0 {
            let weak = Arc::downgrade(&monitor);
            let interval = Duration::from_millis(options.sweep_interval_ms);
            let handle = thread::spawn(move || run_sweeper(weak, interval));
            *lock_state(&monitor.sweeper) = Some(handle);
        }

        monitor
    }

    /// Register interest in a lock record path for sweeping and statistics.
    pub fn track(&self, record_path: impl Into<PathBuf>) {
        let path = record_path.into();
        let mut state = lock_state(&self.state);
        state.per_path.entry(path.clone()).or_default();
        state.tracked.insert(path);
    }

    /// Paths currently registered for the sweep.
    pub fn tracked_paths(&self) -> Vec<PathBuf> {
        lock_state(&self.state).tracked.iter().cloned().collect()
    }

    /// Register a consumer called with every subsequent event.
    ///
    /// Callbacks run synchronously on the emitting thread and must not call
    /// back into the monitor.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&LockEvent) + Send + Sync + 'static,
    {
        lock_state(&self.state).subscribers.push(Box::new(callback));
    }

    /// Aggregated counters for one path, or process-wide totals when
    /// `path` is `None`. Unknown paths yield zeroed stats.
    pub fn stats(&self, path: Option<&Path>) -> MonitorStats {
        let state = lock_state(&self.state);
        match path {
            Some(p) => state.per_path.get(p).cloned().unwrap_or_default(),
            None => state.global.clone(),
        }
    }

    /// Most recent events, oldest first, bounded by `event_buffer`.
    pub fn recent_events(&self) -> Vec<LockEvent> {
        lock_state(&self.state).recent.iter().cloned().collect()
    }

    /// Health of the sweep itself: false only while every tracked path
    /// failed inspection on the last tick. Never fatal to the host.
    pub fn is_healthy(&self) -> bool {
        !lock_state(&self.state).all_paths_failing
    }

    /// Inspect every tracked path once. Stale records emit
    /// `StaleDetected`; a failure on one path is logged and counted
    /// without stopping inspection of the others.
    pub fn sweep_once(&self) {
        let paths = self.tracked_paths();
        if paths.is_empty() {
            return;
        }

        let mut failures = 0usize;
        for path in &paths {
            match read_record(path) {
                Ok(Some(record)) => {
                    if record.is_stale(self.options.max_holder_age_secs) {
                        self.record(
                            LockEvent::new(path, EventKind::StaleDetected)
                                .with_mode(record.mode)
                                .with_detail("sweep"),
                        );
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    failures += 1;
                    log::warn!("sweep failed to inspect '{}': {}", path.display(), e);
                    self.record(
                        LockEvent::new(path, EventKind::Error).with_detail(e.to_string()),
                    );
                }
            }
        }

        lock_state(&self.state).all_paths_failing = failures == paths.len();
    }

    /// Halt the sweep, clear statistics and buffers, and release the
    /// process-wide singleton if this is the active global instance.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);

        if let Some(handle) = lock_state(&self.sweeper).take() {
            let _ = handle.join();
        }

        {
            let mut state = lock_state(&self.state);
            state.per_path.clear();
            state.global = MonitorStats::default();
            state.recent.clear();
            state.tracked.clear();
            state.subscribers.clear();
            state.all_paths_failing = false;
        }

        let mut slot = lock_state(global_slot());
        if slot.as_ref().is_some_and(|g| std::ptr::eq(Arc::as_ptr(g), self)) {
            *slot = None;
        }
    }

    fn ingest(&self, event: LockEvent) {
        if let (Some(alert_ms), Some(wait_ms)) = (self.options.wait_alert_ms, event.wait_ms) {
            if wait_ms >= alert_ms {
                log::warn!(
                    "lock '{}' waited {}ms (alert threshold {}ms)",
                    event.path.display(),
                    wait_ms,
                    alert_ms
                );
            }
        }

        if let Some(log_path) = &self.options.event_log {
            if let Err(e) = append_event(log_path, &event) {
                log::warn!("failed to append to event log: {}", e);
            }
        }

        let mut state = lock_state(&self.state);
        state.global.apply(&event);
        state
            .per_path
            .entry(event.path.clone())
            .or_default()
            .apply(&event);

        for subscriber in &state.subscribers {
            subscriber(&event);
        }

        if self.options.event_buffer > 0 {
            if state.recent.len() == self.options.event_buffer {
                state.recent.pop_front();
            }
            state.recent.push_back(event);
        }
    }
}

impl EventSink for LockMonitor {
    fn record(&self, event: LockEvent) {
        self.ingest(event);
    }
}

fn run_sweeper(monitor: Weak<LockMonitor>, interval: Duration) {
    const SLICE: Duration = Duration::from_millis(50);

    loop {
        // Sleep in slices so stop() takes effect promptly.
        let mut slept = Duration::ZERO;
        while slept < interval {
            match monitor.upgrade() {
                Some(m) if !m.stopped.load(Ordering::SeqCst) => {}
                _ => return,
            }
            let slice = SLICE.min(interval - slept);
            thread::sleep(slice);
            slept += slice;
        }

        match monitor.upgrade() {
            Some(m) if !m.stopped.load(Ordering::SeqCst) => m.sweep_once(),
            _ => return,
        }
    }
}

/// Lock a mutex, recovering the data from a poisoned lock rather than
/// propagating the panic.
fn lock_state<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

static GLOBAL: OnceLock<Mutex<Option<Arc<LockMonitor>>>> = OnceLock::new();

fn global_slot() -> &'static Mutex<Option<Arc<LockMonitor>>> {
    GLOBAL.get_or_init(|| Mutex::new(None))
}

/// The lazily-initialized process-wide monitor, started with default
/// options on first use. Torn down by calling `stop()` on it.
pub fn global_monitor() -> Arc<LockMonitor> {
    let mut slot = lock_state(global_slot());
    match slot.as_ref() {
        Some(monitor) => Arc::clone(monitor),
        None => {
            let monitor = LockMonitor::start(MonitorOptions::default());
            *slot = Some(Arc::clone(&monitor));
            monitor
        }
    }
}
