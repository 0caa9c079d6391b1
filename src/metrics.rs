//! Metrics event stream and the default aggregating collector.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use parking_lot::{Mutex, RwLock};

use crate::engine::ResolutionState;
use crate::id::ServiceId;

/// Outcome attached to a metrics event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsStatus {
    Ok,
    Error,
}

/// One timing event: a whole resolution, or one pipeline step within it.
#[derive(Debug, Clone)]
pub struct MetricsEvent {
    /// `"resolve"` for whole resolutions, `"stage"` for pipeline steps.
    pub event: &'static str,
    pub service: ServiceId,
    /// Stage name for step events.
    pub step: Option<&'static str>,
    pub duration: Duration,
    pub status: MetricsStatus,
    pub started_at: SystemTime,
    pub ended_at: SystemTime,
    pub error: Option<String>,
}

impl MetricsEvent {
    pub(crate) fn resolve(
        service: ServiceId,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        let ended_at = SystemTime::now();
        Self {
            event: "resolve",
            service,
            step: None,
            duration,
            status: if error.is_some() {
                MetricsStatus::Error
            } else {
                MetricsStatus::Ok
            },
            started_at: ended_at.checked_sub(duration).unwrap_or(ended_at),
            ended_at,
            error,
        }
    }

    pub(crate) fn stage(
        service: ServiceId,
        state: ResolutionState,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        let ended_at = SystemTime::now();
        Self {
            event: "stage",
            service,
            step: Some(state.stage_name()),
            duration,
            status: if error.is_some() {
                MetricsStatus::Error
            } else {
                MetricsStatus::Ok
            },
            started_at: ended_at.checked_sub(duration).unwrap_or(ended_at),
            ended_at,
            error,
        }
    }
}

/// Receives the metrics event stream. Implementations must be cheap; they
/// run synchronously inside resolution. Panics are contained and logged
/// without altering the resolution outcome.
pub trait MetricsSink: Send + Sync {
    fn record(&self, event: MetricsEvent);
}

/// Rolling per-service timing statistics.
#[derive(Debug, Clone)]
pub struct TimingStats {
    pub count: u64,
    pub error_count: u64,
    pub min_duration: Duration,
    pub max_duration: Duration,
    pub total_duration: Duration,
    /// Recent measurements kept for percentile estimates.
    pub recent_times: Vec<Duration>,
}

const RECENT_SAMPLES: usize = 100;

impl TimingStats {
    fn new() -> Self {
        Self {
            count: 0,
            error_count: 0,
            min_duration: Duration::MAX,
            max_duration: Duration::ZERO,
            total_duration: Duration::ZERO,
            recent_times: Vec::with_capacity(RECENT_SAMPLES),
        }
    }

    fn record(&mut self, duration: Duration, failed: bool) {
        self.count += 1;
        if failed {
            self.error_count += 1;
        }
        self.min_duration = self.min_duration.min(duration);
        self.max_duration = self.max_duration.max(duration);
        self.total_duration += duration;
        if self.recent_times.len() >= RECENT_SAMPLES {
            self.recent_times.remove(0);
        }
        self.recent_times.push(duration);
    }

    pub fn average_duration(&self) -> Duration {
        if self.count == 0 {
            Duration::ZERO
        } else {
            self.total_duration / self.count as u32
        }
    }

    pub fn p95_duration(&self) -> Duration {
        if self.recent_times.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.recent_times.clone();
        sorted.sort();
        let index = (sorted.len() as f64 * 0.95) as usize;
        sorted
            .get(index.min(sorted.len() - 1))
            .copied()
            .unwrap_or(Duration::ZERO)
    }
}

/// Default sink: aggregates resolve timings per service and counts step
/// events per stage name.
#[derive(Default)]
pub struct MetricsCollector {
    resolutions: RwLock<HashMap<ServiceId, TimingStats>>,
    counters: RwLock<HashMap<String, u64>>,
    events_seen: Mutex<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Timing stats for one service's whole resolutions.
    pub fn timing_stats(&self, service: &ServiceId) -> Option<TimingStats> {
        self.resolutions.read().get(service).cloned()
    }

    /// Event counters, keyed `resolve` / `stage.<name>`.
    pub fn counters(&self) -> HashMap<String, u64> {
        self.counters.read().clone()
    }

    /// Total events received.
    pub fn events_seen(&self) -> u64 {
        *self.events_seen.lock()
    }

    /// Services with the highest average resolution time.
    pub fn slowest(&self, limit: usize) -> Vec<(ServiceId, Duration)> {
        let resolutions = self.resolutions.read();
        let mut services: Vec<_> = resolutions
            .iter()
            .map(|(service, stats)| (service.clone(), stats.average_duration()))
            .collect();
        services.sort_by(|a, b| b.1.cmp(&a.1));
        services.truncate(limit);
        services
    }

    pub fn reset(&self) {
        self.resolutions.write().clear();
        self.counters.write().clear();
        *self.events_seen.lock() = 0;
    }
}

impl MetricsSink for MetricsCollector {
    fn record(&self, event: MetricsEvent) {
        *self.events_seen.lock() += 1;
        let counter = match event.step {
            Some(step) => format!("stage.{}", step),
            None => event.event.to_string(),
        };
        *self.counters.write().entry(counter).or_insert(0) += 1;
        if event.event == "resolve" {
            let mut resolutions = self.resolutions.write();
            let stats = resolutions
                .entry(event.service.clone())
                .or_insert_with(TimingStats::new);
            stats.record(event.duration, event.status == MetricsStatus::Error);
        }
    }
}
