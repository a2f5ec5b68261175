//! Prometheus metrics for the relay
//!
//! All metrics live in the default registry and are exposed as text on
//! `GET /metrics`.

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter_vec, register_int_gauge,
    Encoder, Histogram, HistogramVec, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ── HTTP ────────────────────────────────────────────────────────────────
    pub static ref CHAT_REQUESTS: IntCounterVec = register_int_counter_vec!(
        "siteforge_chat_requests_total",
        "Chat requests by response status",
        &["status"]
    )
    .expect("register siteforge_chat_requests_total");

    pub static ref REQUESTS_IN_FLIGHT: IntGauge = register_int_gauge!(
        "siteforge_chat_requests_in_flight",
        "Chat requests currently being orchestrated"
    )
    .expect("register siteforge_chat_requests_in_flight");

    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "siteforge_errors_total",
        "Errors by kind",
        &["kind"]
    )
    .expect("register siteforge_errors_total");

    // ── Orchestrator ────────────────────────────────────────────────────────
    pub static ref AGENT_RUNS: IntCounterVec = register_int_counter_vec!(
        "siteforge_agent_runs_total",
        "Orchestrator runs by outcome",
        &["outcome"]
    )
    .expect("register siteforge_agent_runs_total");

    pub static ref AGENT_ITERATIONS: Histogram = register_histogram!(
        "siteforge_agent_iterations",
        "Model calls per orchestrator run",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 50.0, 100.0]
    )
    .expect("register siteforge_agent_iterations");

    pub static ref MODEL_CALL_DURATION: HistogramVec = register_histogram_vec!(
        "siteforge_model_call_duration_seconds",
        "Latency of a single model call",
        &["model"],
        vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    )
    .expect("register siteforge_model_call_duration_seconds");

    // ── Tools ───────────────────────────────────────────────────────────────
    pub static ref TOOL_CALLS: IntCounterVec = register_int_counter_vec!(
        "siteforge_tool_calls_total",
        "Tool dispatches by tool and result prefix",
        &["tool", "outcome"]
    )
    .expect("register siteforge_tool_calls_total");

    pub static ref TOOL_DURATION: HistogramVec = register_histogram_vec!(
        "siteforge_tool_duration_seconds",
        "Time spent inside a tool",
        &["tool"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]
    )
    .expect("register siteforge_tool_duration_seconds");
}

/// Render every registered metric in the Prometheus text format
pub fn gather() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Content type for [`gather`] output
pub fn content_type() -> String {
    TextEncoder::new().format_type().to_string()
}
