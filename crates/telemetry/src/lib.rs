//! Structured logging and optional OpenTelemetry metrics for the policy decision engine.

#![deny(unsafe_code)]

mod decision_observer;

pub use decision_observer::{global as decision_observer, snapshot_counters};

use thiserror::Error;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("otel setup failed: {0}")]
    Otel(String),
}

/// Initialize structured logging (JSON) with env filter.
/// Set RUST_LOG, e.g., "info,telemetry=debug".
pub fn init_json_logging() {
    let fmt_layer = fmt::layer().json().with_current_span(true).with_span_list(true);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = Registry::default().with(filter).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber).ok();
}

/// Initialize OpenTelemetry tracer (optional; behind `otel` feature). No tracing subscriber hookup.
#[cfg(feature = "otel")]
pub fn init_otel(service_name: &str) -> Result<(), TelemetryError> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::trace as sdktrace;
    use opentelemetry_sdk::{runtime, Resource};

    let resource = Resource::new(vec![KeyValue::new("service.name", service_name.to_owned())]);
    let _tracer_provider = opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_exporter(opentelemetry_otlp::new_exporter().http())
        .with_trace_config(sdktrace::config().with_resource(resource))
        .install_batch(runtime::Tokio)
        .map_err(|e| TelemetryError::Otel(e.to_string()))?;
    Ok(())
}

#[cfg(feature = "otel")]
pub mod metrics {
    //! OTel metrics (OTLP) for decision and compiled-cache counters (§9.1).
    use super::TelemetryError;
    use once_cell::sync::OnceCell;
    use opentelemetry::global;
    use opentelemetry::metrics::{Counter, Meter};

    static METRICS_INIT: OnceCell<()> = OnceCell::new();

    fn detect_service_name() -> String {
        std::env::var("OTEL_SERVICE_NAME")
            .or_else(|_| std::env::var("POLICY_ENGINE_SERVICE_NAME"))
            .unwrap_or_else(|_| "policy-engine".to_string())
    }

    fn init_metrics_from_env() -> Result<(), TelemetryError> {
        // Configure OTLP metrics pipeline via env (OTEL_EXPORTER_*).
        let _svc = detect_service_name();
        let provider = opentelemetry_otlp::new_pipeline()
            .metrics(opentelemetry_sdk::runtime::Tokio)
            .with_exporter(opentelemetry_otlp::new_exporter().http())
            .build()
            .map_err(|e| TelemetryError::Otel(e.to_string()))?;
        global::set_meter_provider(provider);
        Ok(())
    }

    /// Initialize (idempotent) global metrics provider from env.
    fn ensure_metrics_provider() {
        let _ = METRICS_INIT.get_or_init(|| {
            let _ = init_metrics_from_env();
        });
    }

    #[derive(Clone)]
    pub struct DecisionInstruments {
        pub(crate) decisions: Counter<u64>,
    }

    pub fn init_decision_instruments() -> DecisionInstruments {
        ensure_metrics_provider();
        let meter: Meter = global::meter("policy_engine.decisions");
        DecisionInstruments {
            decisions: meter
                .u64_counter("policy.decision.count")
                .with_description("Decisions reached, labeled by effect")
                .init(),
        }
    }
}

