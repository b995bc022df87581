//! Prometheus metrics for the console session
//!
//! All metrics live in the default registry. The session renders them in
//! text exposition format when it shuts down.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Conversation Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Turns appended to the conversation.
    ///
    /// Labels:
    /// - role: "system", "user" or "assistant"
    pub static ref TURNS_APPENDED: CounterVec = register_counter_vec!(
        "echo_turns_appended_total",
        "Turns appended to the conversation by role",
        &["role"]
    ).expect("failed to register TURNS_APPENDED metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Completion Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Wall-clock duration of each streamed completion, in seconds.
    pub static ref LLM_CALL_TIME: HistogramVec = register_histogram_vec!(
        "echo_llm_call_duration_seconds",
        "Duration of streamed completion calls",
        &["model"],
        vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    ).expect("failed to register LLM_CALL_TIME metric");

    /// Completion streams that failed mid-reply.
    pub static ref BACKEND_ERRORS: CounterVec = register_counter_vec!(
        "echo_backend_errors_total",
        "Completion streams that ended with a backend error",
        &["model"]
    ).expect("failed to register BACKEND_ERRORS metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Execution Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Fenced code blocks found in assistant replies.
    pub static ref CODE_BLOCKS_DETECTED: CounterVec = register_counter_vec!(
        "echo_code_blocks_detected_total",
        "Executable code blocks detected in replies",
        &["language"]
    ).expect("failed to register CODE_BLOCKS_DETECTED metric");

    /// User decisions at the execution gate.
    ///
    /// Labels:
    /// - decision: "approved" or "declined"
    pub static ref GATE_DECISIONS: CounterVec = register_counter_vec!(
        "echo_gate_decisions_total",
        "Execution gate decisions",
        &["language", "decision"]
    ).expect("failed to register GATE_DECISIONS metric");
}

/// Render every registered metric in Prometheus text format
pub fn render() -> String {
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&prometheus::gather(), &mut buffer) {
        tracing::warn!(error = %e, "Failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        GATE_DECISIONS
            .with_label_values(&["python", "declined"])
            .inc();
        let text = render();
        assert!(text.contains("echo_gate_decisions_total"));
    }
}
