//! Prometheus metrics for monitoring the ledger server.
//!
//! Metrics are exposed in Prometheus text format by an exporter listening on
//! its own address. Without an installed exporter the recording functions are
//! no-ops.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use tl_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::http_requests_total("POST", "/fund", 200);
//! metrics::ledger_operation("fund", "ok");
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tourney_ledger::LedgerError;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

// ============================================================================
// HTTP Metrics
// ============================================================================

/// Record HTTP request.
pub fn http_requests_total(method: &str, path: &str, status: u16) {
    metrics::counter!("http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record HTTP request duration in milliseconds.
pub fn http_request_duration_ms(method: &str, path: &str, duration_ms: f64) {
    metrics::histogram!("http_request_duration_ms",
        "method" => method.to_string(),
        "path" => path.to_string()
    )
    .record(duration_ms);
}

// ============================================================================
// Ledger Metrics
// ============================================================================

/// Count a settlement operation by outcome.
pub fn ledger_operation(operation: &'static str, outcome: &'static str) {
    metrics::counter!("ledger_operations_total",
        "operation" => operation,
        "outcome" => outcome
    )
    .increment(1);
}

/// Outcome label for a failed ledger operation.
pub fn outcome_label(err: &LedgerError) -> &'static str {
    match err {
        LedgerError::NotFound { .. } => "not_found",
        LedgerError::Conflict { .. } => "conflict",
        LedgerError::InsufficientFunds { .. } => "insufficient_funds",
        LedgerError::UpdateFailed { .. } => "update_failed",
        LedgerError::BalanceOutOfRange { .. } => "out_of_range",
        LedgerError::Storage { .. } => "storage",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourney_ledger::Entity;

    #[test]
    fn test_outcome_labels() {
        let err = LedgerError::InsufficientFunds {
            player: "P1".to_string(),
        };
        assert_eq!(outcome_label(&err), "insufficient_funds");

        let err = LedgerError::Conflict {
            entity: Entity::Tournament,
            key: "1".to_string(),
        };
        assert_eq!(outcome_label(&err), "conflict");

        let err = LedgerError::UpdateFailed {
            entity: Entity::Player,
            key: "P1".to_string(),
        };
        assert_eq!(outcome_label(&err), "update_failed");

        let err = LedgerError::BalanceOutOfRange {
            player: "P1".to_string(),
        };
        assert_eq!(outcome_label(&err), "out_of_range");
    }

    #[test]
    fn test_recording_without_exporter_is_noop() {
        http_requests_total("GET", "/balance", 200);
        http_request_duration_ms("GET", "/balance", 1.5);
        ledger_operation("fund", "ok");
    }
}
