//! Observability collaborator.
//!
//! The planner, applier and validator report through an injected
//! [`Observer`] instead of process-wide loggers. [`LogObserver`] forwards to
//! the `log` facade; [`MetricsObserver`] also records OpenTelemetry metrics.

use crate::engine::Engine;
use log::Level;
use serde_json::Value;

pub const LOG_TARGET: &str = "schemaguard";

pub trait Observer: Send + Sync {
    /// Structured log line; `context` is a JSON object (or `Null`).
    fn log(&self, level: Level, message: &str, context: &Value);

    /// Called once per engine after an apply pass.
    fn additions_applied(&self, _engine: Engine, _count: usize, _dry_run: bool) {}

    /// Called once at the end of every validation pass.
    fn validation_finished(&self, _passed: bool, _checks: usize, _failures: usize) {}
}

/// Forwards everything to the `log` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl Observer for LogObserver {
    fn log(&self, level: Level, message: &str, context: &Value) {
        if context.is_null() {
            log::log!(target: LOG_TARGET, level, "{message}");
        } else {
            log::log!(target: LOG_TARGET, level, "{message} {context}");
        }
    }

    fn additions_applied(&self, engine: Engine, count: usize, dry_run: bool) {
        log::info!(
            target: LOG_TARGET,
            "{engine}: {count} addition(s) {}",
            if dry_run { "planned (dry run)" } else { "applied" }
        );
    }

    fn validation_finished(&self, passed: bool, checks: usize, failures: usize) {
        if passed {
            log::info!(target: LOG_TARGET, "validation passed: {checks} element(s) checked");
        } else {
            log::error!(
                target: LOG_TARGET,
                "validation failed: {failures} of {checks} element(s) missing"
            );
        }
    }
}

/// [`LogObserver`] plus OpenTelemetry counters.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver {
    logger: LogObserver,
}

#[cfg(feature = "metrics")]
impl Observer for MetricsObserver {
    fn log(&self, level: Level, message: &str, context: &Value) {
        self.logger.log(level, message, context);
    }

    fn additions_applied(&self, engine: Engine, count: usize, dry_run: bool) {
        self.logger.additions_applied(engine, count, dry_run);
        crate::metrics::METRICS.record_additions(engine, count, dry_run);
    }

    fn validation_finished(&self, passed: bool, checks: usize, failures: usize) {
        self.logger.validation_finished(passed, checks, failures);
        crate::metrics::METRICS.record_validation(passed, checks, failures);
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use crate::engine::Engine;
    use tracing::{info_span, Span};

    pub fn plan_span(targets: &[Engine]) -> Span {
        info_span!("schemaguard.plan", targets = ?targets)
    }

    pub fn apply_span(targets: &[Engine], dry_run: bool) -> Span {
        info_span!("schemaguard.apply", targets = ?targets, dry_run)
    }

    pub fn validate_span(targets: &[Engine]) -> Span {
        info_span!("schemaguard.validate", targets = ?targets)
    }
}
