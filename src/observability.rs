use std::net::SocketAddr;
use std::time::Instant;

use crate::engine::EngineError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: engine operations executed. Labels: operation, status.
pub const OPERATIONS_TOTAL: &str = "timeoff_operations_total";

/// Histogram: engine operation latency in seconds. Labels: operation.
pub const OPERATION_DURATION_SECONDS: &str = "timeoff_operation_duration_seconds";

// ── Storage ─────────────────────────────────────────────────────

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "timeoff_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "timeoff_wal_flush_batch_size";

/// Counter: WAL compactions. Labels: status.
pub const WAL_COMPACTIONS_TOTAL: &str = "timeoff_wal_compactions_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Records count + latency for one engine operation when finished.
pub(crate) struct OpTimer {
    operation: &'static str,
    started: Instant,
}

impl OpTimer {
    pub(crate) fn start(operation: &'static str) -> Self {
        Self {
            operation,
            started: Instant::now(),
        }
    }

    pub(crate) fn finish<T>(self, result: &Result<T, EngineError>) {
        let status = match result {
            Ok(_) => "ok",
            Err(e) => e.label(),
        };
        metrics::counter!(OPERATIONS_TOTAL, "operation" => self.operation, "status" => status)
            .increment(1);
        metrics::histogram!(OPERATION_DURATION_SECONDS, "operation" => self.operation)
            .record(self.started.elapsed().as_secs_f64());
    }
}
