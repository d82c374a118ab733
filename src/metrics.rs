//! Prometheus metrics for cash

use crate::protocol::Operation;
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Registry};

/// Global metrics instance
pub struct Metrics {
    pub registry: Registry,

    // Command counters
    pub cmd_get: IntCounter,
    pub cmd_set: IntCounter,
    pub cmd_delete: IntCounter,
    pub cmd_expires: IntCounter,

    // Hit/miss counters
    pub get_hits: IntCounter,
    pub get_misses: IntCounter,

    // Expiration
    pub expired_lazy: IntCounter,
    pub expired_swept: IntCounter,

    // Command log
    pub log_appends: IntCounter,
    pub log_errors: IntCounter,
    pub replayed_commands: IntCounter,
    pub replay_errors: IntCounter,

    // Connection metrics
    pub active_connections: IntGauge,
    pub total_connections: IntCounter,
    pub rejected_connections: IntCounter,

    // Bytes counters
    pub bytes_read: IntCounter,
    pub bytes_written: IntCounter,

    // Latency histograms
    pub cmd_latency: Histogram,

    // Error counters
    pub protocol_errors: IntCounter,
    pub request_errors: IntCounter,
}

impl Metrics {
    /// Create a new metrics instance
    pub fn new() -> Self {
        let registry = Registry::new();

        let cmd_get = IntCounter::new("cash_cmd_get_total", "Total GET commands").unwrap();
        let cmd_set = IntCounter::new("cash_cmd_set_total", "Total SET commands").unwrap();
        let cmd_delete =
            IntCounter::new("cash_cmd_delete_total", "Total DELETE commands").unwrap();
        let cmd_expires =
            IntCounter::new("cash_cmd_expires_total", "Total EXPIRES commands").unwrap();

        let get_hits = IntCounter::new("cash_get_hits_total", "Total GET hits").unwrap();
        let get_misses = IntCounter::new("cash_get_misses_total", "Total GET misses").unwrap();

        let expired_lazy = IntCounter::new(
            "cash_expired_lazy_total",
            "Keys removed by read-time expiration",
        )
        .unwrap();
        let expired_swept = IntCounter::new(
            "cash_expired_swept_total",
            "Keys removed by the expiration sweeper",
        )
        .unwrap();

        let log_appends =
            IntCounter::new("cash_log_appends_total", "Commands appended to the log").unwrap();
        let log_errors =
            IntCounter::new("cash_log_errors_total", "Failed command log appends").unwrap();
        let replayed_commands = IntCounter::new(
            "cash_replayed_commands_total",
            "Commands applied during startup replay",
        )
        .unwrap();
        let replay_errors = IntCounter::new(
            "cash_replay_errors_total",
            "Log records skipped during startup replay",
        )
        .unwrap();

        let active_connections =
            IntGauge::new("cash_active_connections", "Current active connections").unwrap();
        let total_connections =
            IntCounter::new("cash_connections_total", "Total connections accepted").unwrap();
        let rejected_connections = IntCounter::new(
            "cash_rejected_connections_total",
            "Total connections rejected",
        )
        .unwrap();

        let bytes_read = IntCounter::new("cash_bytes_read_total", "Total bytes read").unwrap();
        let bytes_written =
            IntCounter::new("cash_bytes_written_total", "Total bytes written").unwrap();

        let cmd_latency = Histogram::with_opts(
            HistogramOpts::new(
                "cash_cmd_latency_seconds",
                "Dispatcher apply latency in seconds",
            )
            .buckets(vec![
                0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
            ]),
        )
        .unwrap();

        let protocol_errors =
            IntCounter::new("cash_protocol_errors_total", "Total protocol errors").unwrap();
        let request_errors = IntCounter::new(
            "cash_request_errors_total",
            "Commands answered with an error",
        )
        .unwrap();

        // Register all metrics
        registry.register(Box::new(cmd_get.clone())).unwrap();
        registry.register(Box::new(cmd_set.clone())).unwrap();
        registry.register(Box::new(cmd_delete.clone())).unwrap();
        registry.register(Box::new(cmd_expires.clone())).unwrap();
        registry.register(Box::new(get_hits.clone())).unwrap();
        registry.register(Box::new(get_misses.clone())).unwrap();
        registry.register(Box::new(expired_lazy.clone())).unwrap();
        registry.register(Box::new(expired_swept.clone())).unwrap();
        registry.register(Box::new(log_appends.clone())).unwrap();
        registry.register(Box::new(log_errors.clone())).unwrap();
        registry
            .register(Box::new(replayed_commands.clone()))
            .unwrap();
        registry.register(Box::new(replay_errors.clone())).unwrap();
        registry
            .register(Box::new(active_connections.clone()))
            .unwrap();
        registry
            .register(Box::new(total_connections.clone()))
            .unwrap();
        registry
            .register(Box::new(rejected_connections.clone()))
            .unwrap();
        registry.register(Box::new(bytes_read.clone())).unwrap();
        registry.register(Box::new(bytes_written.clone())).unwrap();
        registry.register(Box::new(cmd_latency.clone())).unwrap();
        registry
            .register(Box::new(protocol_errors.clone()))
            .unwrap();
        registry.register(Box::new(request_errors.clone())).unwrap();

        Self {
            registry,
            cmd_get,
            cmd_set,
            cmd_delete,
            cmd_expires,
            get_hits,
            get_misses,
            expired_lazy,
            expired_swept,
            log_appends,
            log_errors,
            replayed_commands,
            replay_errors,
            active_connections,
            total_connections,
            rejected_connections,
            bytes_read,
            bytes_written,
            cmd_latency,
            protocol_errors,
            request_errors,
        }
    }

    /// Counter for an operation
    pub fn command_counter(&self, operation: Operation) -> &IntCounter {
        match operation {
            Operation::Get => &self.cmd_get,
            Operation::Set => &self.cmd_set,
            Operation::Delete => &self.cmd_delete,
            Operation::Expires => &self.cmd_expires,
        }
    }

    /// Get Prometheus formatted metrics
    pub fn gather(&self) -> String {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            return format!("# failed to encode metrics: {e}\n");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
