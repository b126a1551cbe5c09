//! Per-frame response draining.
//!
//! Each frame the dispatcher first checks the service for a fatal error, then
//! polls responses and hands them to the [`RequestRegistry`] until the service
//! runs dry or the soft time budget is spent. Backlog left over is picked up
//! on the next frame.
//!
//! A fatal error is handed back in the [`DrainReport`] rather than reported
//! from here, so the reporter runs after the caller has released the client.

use std::time::Duration;

use web_time::Instant;

use super::registry::RequestRegistry;
use crate::constants::{DEFAULT_DRAIN_BUDGET_MS, DEFAULT_DRAIN_WARNING_MS};
use crate::service::NativeService;

/// Time limits for one drain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrainBudget {
    /// Stop polling once this much time has passed
    pub soft: Duration,
    /// Log a diagnostic if a drain takes longer than this
    pub warning: Duration,
}

impl DrainBudget {
    /// Whether a drain that has run for `elapsed` should stop polling.
    pub fn should_stop(&self, elapsed: Duration) -> bool {
        elapsed > self.soft
    }

    /// Whether a drain that took `elapsed` deserves a diagnostic.
    pub fn exceeds_warning(&self, elapsed: Duration) -> bool {
        elapsed > self.warning
    }
}

impl Default for DrainBudget {
    fn default() -> Self {
        Self {
            soft: Duration::from_millis(DEFAULT_DRAIN_BUDGET_MS),
            warning: Duration::from_millis(DEFAULT_DRAIN_WARNING_MS),
        }
    }
}

/// What happened during one drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Responses delivered to a waiting caller
    pub dispatched: usize,
    /// Responses whose id had no pending request
    pub unmatched: usize,
    /// Wall-clock time spent polling
    pub elapsed: Duration,
    /// Polling stopped because the soft budget ran out
    pub stopped_on_budget: bool,
    /// The drain took longer than the warning threshold
    pub warned: bool,
    /// Fatal service error taken this frame, still to be reported
    pub fatal_error: Option<String>,
    /// Pending requests abandoned by the fatal error
    pub abandoned: usize,
}

impl DrainReport {
    /// Whether a fatal service error was taken this frame.
    pub fn is_fatal(&self) -> bool {
        self.fatal_error.is_some()
    }
}

/// Drains service responses into the registry once per frame.
pub struct ResponseDispatcher {
    budget: DrainBudget,
}

impl ResponseDispatcher {
    /// Create a dispatcher with the given budget.
    pub fn new(budget: DrainBudget) -> Self {
        Self { budget }
    }

    /// Current drain budget.
    pub fn budget(&self) -> DrainBudget {
        self.budget
    }

    /// Run one frame's worth of dispatching.
    ///
    /// After a fatal error the whole backlog is drained regardless of the
    /// soft budget; every response is then unmatched and dropped. The error
    /// message is returned in [`DrainReport::fatal_error`].
    pub fn drain_one_frame<S: NativeService + ?Sized>(
        &mut self,
        service: &mut S,
        registry: &mut RequestRegistry,
    ) -> DrainReport {
        let mut report = DrainReport::default();

        if let Some(message) = service.take_fatal_error() {
            log::error!("Gallery service reported a fatal error: {}", message);
            report.abandoned = registry.clear();
            if report.abandoned > 0 {
                log::info!(
                    "Abandoned {} pending requests after fatal error",
                    report.abandoned
                );
            }
            report.fatal_error = Some(message);
        }
        let fatal = report.is_fatal();

        let start = Instant::now();
        loop {
            if !fatal && self.budget.should_stop(start.elapsed()) {
                report.stopped_on_budget = true;
                break;
            }
            let Some(envelope) = service.poll() else {
                break;
            };
            let request_id = envelope.request_id;
            let shape = envelope.body.shape();
            match registry.fulfill(envelope) {
                Ok(()) => report.dispatched += 1,
                Err(_) => {
                    report.unmatched += 1;
                    if !fatal {
                        log::warn!(
                            "Dropping {} response for request {}: nothing is waiting for it",
                            shape,
                            request_id
                        );
                    }
                }
            }
        }
        report.elapsed = start.elapsed();

        if self.budget.exceeds_warning(report.elapsed) {
            report.warned = true;
            log::warn!(
                "Draining responses took {:?} (warning threshold {:?}, {} dispatched, {} unmatched)",
                report.elapsed,
                self.budget.warning,
                report.dispatched,
                report.unmatched
            );
        }
        if report.stopped_on_budget {
            log::debug!(
                "Drain budget spent after {} responses, continuing next frame",
                report.dispatched + report.unmatched
            );
        }

        report
    }
}

impl Default for ResponseDispatcher {
    fn default() -> Self {
        Self::new(DrainBudget::default())
    }
}
