//! Prometheus metrics for dispatch and actions.
//!
//! Counters are fed from [`Observation`]s through [`MetricsObserver`], so the
//! dispatcher and actions stay unaware of Prometheus.

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use prometheus::{register_int_counter_vec_with_registry, Encoder, IntCounterVec, Registry, TextEncoder};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::observer::{DispatchObserver, Observation, OutputStream};

/// Path the metrics listener serves.
pub const METRICS_PATH: &str = "/metrics";

/// Counters exported by the service.
#[derive(Clone)]
pub struct Metrics {
    /// Alert groups received, by status
    pub alert_groups_received_total: IntCounterVec,
    /// Rules that matched a firing group, by action
    pub rules_matched_total: IntCounterVec,
    /// Actions started, by action
    pub action_executions_total: IntCounterVec,
    /// Actions that returned an error, by action
    pub action_failures_total: IntCounterVec,
    /// Remote command output lines, by stream
    pub command_output_lines_total: IntCounterVec,

    registry: Arc<Registry>,
}

impl Metrics {
    /// Create the counters in a fresh registry.
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let alert_groups_received_total = register_int_counter_vec_with_registry!(
            "actioner_alert_groups_received_total",
            "Alert groups received from Alertmanager by status",
            &["status"],
            registry
        )?;

        let rules_matched_total = register_int_counter_vec_with_registry!(
            "actioner_rules_matched_total",
            "Rules that matched a firing alert group by action",
            &["action"],
            registry
        )?;

        let action_executions_total = register_int_counter_vec_with_registry!(
            "actioner_action_executions_total",
            "Actions started by action",
            &["action"],
            registry
        )?;

        let action_failures_total = register_int_counter_vec_with_registry!(
            "actioner_action_failures_total",
            "Actions that failed by action",
            &["action"],
            registry
        )?;

        let command_output_lines_total = register_int_counter_vec_with_registry!(
            "actioner_command_output_lines_total",
            "Remote command output lines by stream",
            &["stream"],
            registry
        )?;

        Ok(Self {
            alert_groups_received_total,
            rules_matched_total,
            action_executions_total,
            action_failures_total,
            command_output_lines_total,
            registry: Arc::new(registry),
        })
    }

    /// Update counters for one observation.
    pub fn record(&self, observation: &Observation) {
        match observation {
            Observation::EventReceived { status, .. } => self
                .alert_groups_received_total
                .with_label_values(&[status.to_string().as_str()])
                .inc(),
            Observation::RuleMatched { action, .. } => {
                self.rules_matched_total.with_label_values(&[action.as_str()]).inc();
            }
            Observation::ActionStarted { action } => {
                self.action_executions_total.with_label_values(&[action.as_str()]).inc();
            }
            Observation::ActionFailed { action, .. } => {
                self.action_failures_total.with_label_values(&[action.as_str()]).inc();
            }
            Observation::CommandOutput { stream, .. } => {
                let stream = match stream {
                    OutputStream::Stdout => "stdout",
                    OutputStream::Stderr => "stderr",
                };
                self.command_output_lines_total
                    .with_label_values(&[stream])
                    .inc();
            }
            _ => {}
        }
    }

    /// Export in the Prometheus text format.
    pub fn export(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Counts observations, then hands them on.
pub struct MetricsObserver {
    metrics: Arc<Metrics>,
    inner: Arc<dyn DispatchObserver>,
}

impl MetricsObserver {
    /// Wrap `inner`, recording into `metrics` first.
    pub fn new(metrics: Arc<Metrics>, inner: Arc<dyn DispatchObserver>) -> Self {
        Self { metrics, inner }
    }
}

impl DispatchObserver for MetricsObserver {
    fn observe(&self, observation: Observation) {
        self.metrics.record(&observation);
        self.inner.observe(observation);
    }
}

/// Router serving [`METRICS_PATH`].
pub fn router(metrics: Arc<Metrics>) -> Router {
    Router::new()
        .route(METRICS_PATH, get(prometheus_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(metrics)
}

async fn prometheus_metrics(State(metrics): State<Arc<Metrics>>) -> Response {
    match metrics.export() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
