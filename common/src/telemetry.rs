// Telemetry module for structured logging, metrics, and tracing

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::{
    trace::{RandomIdGenerator, Sampler, TracerProvider},
    Resource,
};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};
use uuid::Uuid;

const SERVICE_NAME: &str = "cron-scheduler";

/// Initialize structured logging with JSON formatting and trace context
///
/// This function sets up the tracing subscriber with:
/// - JSON formatting for structured logs
/// - Trace context (trace_id, span_id) in all log entries
/// - Log levels from configuration or `RUST_LOG`
/// - Optional OpenTelemetry integration
#[tracing::instrument(skip_all)]
pub fn init_logging(log_level: &str, tracing_endpoint: Option<&str>) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .map_err(|e| anyhow::anyhow!("Failed to create env filter: {}", e))?;

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_filter(env_filter);

    let registry = tracing_subscriber::registry().with(json_layer);

    if let Some(endpoint) = tracing_endpoint {
        let tracer = init_tracer(endpoint)?;
        let telemetry_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        registry
            .with(telemetry_layer)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    } else {
        registry
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing subscriber: {}", e))?;
    }

    tracing::info!(
        log_level = log_level,
        tracing_endpoint = tracing_endpoint,
        "Structured logging initialized with JSON formatting"
    );

    Ok(())
}

/// Initialize OpenTelemetry tracer with OTLP exporter
#[tracing::instrument(skip_all)]
fn init_tracer(endpoint: &str) -> Result<opentelemetry_sdk::trace::Tracer> {
    use opentelemetry_sdk::runtime::Tokio;

    let exporter = opentelemetry_otlp::new_exporter()
        .tonic()
        .with_endpoint(endpoint)
        .build_span_exporter()
        .map_err(|e| anyhow::anyhow!("Failed to build span exporter: {}", e))?;

    let tracer_provider = TracerProvider::builder()
        .with_batch_exporter(exporter, Tokio)
        .with_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::AlwaysOn)
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![
                    KeyValue::new("service.name", SERVICE_NAME),
                    KeyValue::new("service.version", env!("CARGO_PKG_VERSION")),
                ])),
        )
        .build();

    global::set_tracer_provider(tracer_provider.clone());
    let tracer = tracer_provider.tracer(SERVICE_NAME);

    tracing::info!(
        endpoint = endpoint,
        "OpenTelemetry tracer initialized with OTLP exporter"
    );

    Ok(tracer)
}

/// Shutdown OpenTelemetry tracer provider
///
/// This should be called on graceful shutdown to flush remaining spans
pub fn shutdown_tracer() {
    global::shutdown_tracer_provider();
}

/// Install the Prometheus recorder and describe all scheduler metrics
///
/// The returned handle renders the scrape body for `GET /metrics`.
#[tracing::instrument(skip_all)]
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))?;

    describe_counter!(
        "executions_triggered_total",
        "Executions dispatched by the driver loop"
    );
    describe_counter!(
        "execution_success_total",
        "Executions that ended in SUCCESS"
    );
    describe_counter!("execution_failed_total", "Executions that ended in FAILED");
    describe_counter!(
        "execution_rejected_total",
        "Submissions refused by the executor"
    );
    describe_histogram!(
        "execution_duration_seconds",
        "End-to-end duration of executions including retries"
    );
    describe_histogram!(
        "schedule_drift_milliseconds",
        "Distance between expected and detected fire instants"
    );
    describe_gauge!("executions_in_flight", "Executions currently running");
    describe_gauge!("executions_backlog", "Executions waiting for capacity");
    describe_counter!("alerts_total", "Terminal-failure alerts by delivery outcome");

    tracing::info!("Prometheus metrics recorder initialized");

    Ok(handle)
}

/// Record a dispatched execution
#[inline]
pub fn record_execution_triggered(job_id: &Uuid) {
    counter!("executions_triggered_total", "job_id" => job_id.to_string()).increment(1);
}

/// Record a successful terminal outcome
#[inline]
pub fn record_execution_success(job_id: &Uuid) {
    counter!("execution_success_total", "job_id" => job_id.to_string()).increment(1);
}

/// Record a failed terminal outcome; `kind` is a fixed label such as
/// `http_status`, `timeout` or `request_failed`
#[inline]
pub fn record_execution_failure(job_id: &Uuid, kind: &'static str) {
    counter!(
        "execution_failed_total",
        "job_id" => job_id.to_string(),
        "reason" => kind
    )
    .increment(1);
}

/// Record a submission the executor refused
#[inline]
pub fn record_execution_rejected(job_id: &Uuid) {
    counter!("execution_rejected_total", "job_id" => job_id.to_string()).increment(1);
}

/// Record end-to-end execution duration
#[inline]
pub fn record_execution_duration(job_id: &Uuid, duration_seconds: f64) {
    histogram!(
        "execution_duration_seconds",
        "job_id" => job_id.to_string()
    )
    .record(duration_seconds);
}

#[inline]
pub fn record_drift(drift_ms: u64) {
    histogram!("schedule_drift_milliseconds").record(drift_ms as f64);
}

/// Update executor occupancy gauges
#[inline]
pub fn update_executor_load(in_flight: usize, backlog: usize) {
    gauge!("executions_in_flight").set(in_flight as f64);
    gauge!("executions_backlog").set(backlog as f64);
}

#[inline]
pub fn record_alert(outcome: &'static str) {
    counter!("alerts_total", "outcome" => outcome).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_installs_subscriber_once() {
        let _ = init_logging("info", None);
        assert!(tracing::dispatcher::has_been_set());
        assert!(init_logging("debug", None).is_err());
    }

    #[test]
    fn test_metrics_recording_without_recorder() {
        let job_id = Uuid::new_v4();
        record_execution_triggered(&job_id);
        record_execution_success(&job_id);
        record_execution_failure(&job_id, "http_status");
        record_execution_rejected(&job_id);
        record_execution_duration(&job_id, 1.5);
        record_drift(12);
        update_executor_load(3, 1);
        record_alert("delivered");
    }
}
