//! OpenTelemetry instruments for migration passes, exported via Prometheus.

use crate::engine::Engine;
use once_cell::sync::Lazy;
use opentelemetry::{
    metrics::{Counter, Histogram, MeterProvider as _},
    KeyValue,
};
use opentelemetry_prometheus::PrometheusExporter;
use opentelemetry_sdk::metrics::SdkMeterProvider;
use prometheus::{Registry, TextEncoder};

pub static METRICS: Lazy<SchemaguardMetrics> = Lazy::new(SchemaguardMetrics::init);

pub struct SchemaguardMetrics {
    pub registry: Registry,
    pub provider: SdkMeterProvider,
    pub additions_applied: Counter<u64>,
    pub validations: Counter<u64>,
    pub validation_failures: Counter<u64>,
    pub engine_changes: Counter<u64>,
    pub checks_per_validation: Histogram<f64>,
}

impl SchemaguardMetrics {
    pub fn init() -> Self {
        let registry = Registry::new();
        let exporter: PrometheusExporter = opentelemetry_prometheus::exporter()
            .with_registry(registry.clone())
            .build()
            .expect("failed to build prometheus exporter");
        let provider = SdkMeterProvider::builder().with_reader(exporter).build();
        let meter = provider.meter("schemaguard");

        let additions_applied = meter
            .u64_counter("schemaguard_additions_applied_total")
            .with_description("Schema additions applied (dry runs included)")
            .build();

        let validations = meter
            .u64_counter("schemaguard_validations_total")
            .with_description("Final validation passes")
            .build();

        let validation_failures = meter
            .u64_counter("schemaguard_validation_failures_total")
            .with_description("Active elements found missing during validation")
            .build();

        let engine_changes = meter
            .u64_counter("schemaguard_engine_changes_total")
            .with_description("Statements executed per engine")
            .build();

        let checks_per_validation = meter
            .f64_histogram("schemaguard_validation_checks")
            .with_description("Elements checked per validation pass")
            .build();

        Self {
            registry,
            provider,
            additions_applied,
            validations,
            validation_failures,
            engine_changes,
            checks_per_validation,
        }
    }

    pub fn record_additions(&self, engine: Engine, count: usize, dry_run: bool) {
        let attrs = [
            KeyValue::new("engine", engine.as_str()),
            KeyValue::new("dry_run", dry_run),
        ];
        self.additions_applied.add(count as u64, &attrs);
        if !dry_run {
            self.engine_changes
                .add(count as u64, &[KeyValue::new("engine", engine.as_str())]);
        }
    }

    pub fn record_validation(&self, passed: bool, checks: usize, failures: usize) {
        self.validations
            .add(1, &[KeyValue::new("passed", passed)]);
        self.validation_failures.add(failures as u64, &[]);
        self.checks_per_validation.record(checks as f64, &[]);
    }

    /// Current metrics in the Prometheus text format.
    pub fn render(&self) -> String {
        TextEncoder::new()
            .encode_to_string(&self.registry.gather())
            .unwrap_or_default()
    }
}
