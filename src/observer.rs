//! Trace sinks: the in-memory timeline and a `tracing` bridge.

use parking_lot::Mutex;
use tracing::debug;

use crate::engine::trace::{ResolutionTrace, StageOutcome, TraceObserver};

/// Collects the trace of every top-level resolution in arrival order.
///
/// Intended for diagnostics endpoints and tests; memory grows with every
/// resolution until [`clear`](ResolutionTimeline::clear) is called.
#[derive(Default)]
pub struct ResolutionTimeline {
    traces: Mutex<Vec<ResolutionTrace>>,
}

impl ResolutionTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn traces(&self) -> Vec<ResolutionTrace> {
        self.traces.lock().clone()
    }

    pub fn last(&self) -> Option<ResolutionTrace> {
        self.traces.lock().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.traces.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.traces.lock().is_empty()
    }

    pub fn clear(&self) {
        self.traces.lock().clear();
    }
}

impl TraceObserver for ResolutionTimeline {
    fn record(&self, trace: &ResolutionTrace) {
        self.traces.lock().push(trace.clone());
    }
}

/// Logs each surrendered trace through `tracing` at debug level.
#[derive(Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl TraceObserver for TracingObserver {
    fn record(&self, trace: &ResolutionTrace) {
        let failed = trace
            .terminal()
            .map(|r| r.outcome == StageOutcome::Error)
            .unwrap_or(false);
        debug!(
            target: "armature",
            service = %trace.service(),
            records = trace.records().len(),
            failed,
            "resolution trace"
        );
    }
}
