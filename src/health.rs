//! Simple HTTP health and metrics server (synchronous)
//!
//! Serves `/health`, `/ready` and `/metrics` from a plain std thread so that
//! probes keep answering even when the async runtime is saturated.

use crate::config::MetricsConfig;
use crate::metrics::Metrics;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{error, info};

/// Poll period of the non-blocking accept loop
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Endpoint selected by a request line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Health,
    Ready,
    Metrics,
    NotFound,
    MethodNotAllowed,
    BadRequest,
}

impl Route {
    /// Route a request line such as `GET /health HTTP/1.1`
    fn from_request_line(line: &str) -> Self {
        let mut parts = line.split_whitespace();
        let (Some(method), Some(path)) = (parts.next(), parts.next()) else {
            return Route::BadRequest;
        };

        if method != "GET" {
            return Route::MethodNotAllowed;
        }

        // Ignore any query string
        match path.split('?').next().unwrap_or(path) {
            "/health" | "/healthz" => Route::Health,
            "/ready" | "/readyz" => Route::Ready,
            "/metrics" => Route::Metrics,
            _ => Route::NotFound,
        }
    }
}

/// Health server state
pub struct HealthServer {
    metrics: Arc<Metrics>,
    ready: AtomicBool,
    running: AtomicBool,
}

impl HealthServer {
    /// Create a new health server. It reports not-ready until [`set_ready`](Self::set_ready).
    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            ready: AtomicBool::new(false),
            running: AtomicBool::new(true),
        }
    }

    /// Set the ready state (log replayed and listener bound)
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Stop the accept loop
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Start the health server (blocking, run in separate thread)
    pub fn run(self: Arc<Self>, config: &MetricsConfig) -> std::io::Result<()> {
        let listener = TcpListener::bind(&config.listen_addr)?;
        listener.set_nonblocking(true)?;
        info!("Health server listening on {}", config.listen_addr);

        while self.running.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    if let Err(e) = self.handle_connection(stream) {
                        error!("Health connection error: {}", e);
                    }
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    std::thread::sleep(ACCEPT_POLL_INTERVAL);
                }
                Err(e) => {
                    error!("Health server accept error: {}", e);
                }
            }
        }

        info!("Health server stopped");
        Ok(())
    }

    fn handle_connection(&self, mut stream: TcpStream) -> std::io::Result<()> {
        stream.set_nonblocking(false)?;

        let mut request_line = String::new();
        BufReader::new(&stream).read_line(&mut request_line)?;

        let response = self.respond(Route::from_request_line(&request_line));
        stream.write_all(response.as_bytes())?;
        stream.flush()
    }

    /// Render the full HTTP response for a route
    fn respond(&self, route: Route) -> String {
        match route {
            Route::Health => http_response(200, "application/json", r#"{"status":"healthy"}"#),
            Route::Ready if self.is_ready() => {
                http_response(200, "application/json", r#"{"status":"ready"}"#)
            }
            Route::Ready => http_response(503, "application/json", r#"{"status":"not ready"}"#),
            Route::Metrics => {
                http_response(200, "text/plain; version=0.0.4", &self.metrics.gather())
            }
            Route::NotFound => http_response(404, "text/plain", "Not Found"),
            Route::MethodNotAllowed => http_response(405, "text/plain", "Method Not Allowed"),
            Route::BadRequest => http_response(400, "text/plain", "Bad Request"),
        }
    }
}

fn http_response(status: u16, content_type: &str, body: &str) -> String {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        503 => "Service Unavailable",
        _ => "Unknown",
    };

    format!(
        "HTTP/1.1 {status} {status_text}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes() {
        assert_eq!(Route::from_request_line("GET /health HTTP/1.1\r\n"), Route::Health);
        assert_eq!(Route::from_request_line("GET /readyz HTTP/1.1"), Route::Ready);
        assert_eq!(Route::from_request_line("GET /metrics?x=1 HTTP/1.1"), Route::Metrics);
        assert_eq!(Route::from_request_line("GET /nope HTTP/1.1"), Route::NotFound);
        assert_eq!(
            Route::from_request_line("POST /health HTTP/1.1"),
            Route::MethodNotAllowed
        );
        assert_eq!(Route::from_request_line("garbage"), Route::BadRequest);
        assert_eq!(Route::from_request_line(""), Route::BadRequest);
    }

    #[test]
    fn test_ready_state() {
        let server = HealthServer::new(Arc::new(Metrics::new()));

        assert!(!server.is_ready());
        assert!(server.respond(Route::Ready).starts_with("HTTP/1.1 503"));

        server.set_ready(true);
        assert!(server.is_ready());
        assert!(server.respond(Route::Ready).starts_with("HTTP/1.1 200"));
    }

    #[test]
    fn test_metrics_response() {
        let metrics = Arc::new(Metrics::new());
        metrics.cmd_set.inc();
        let server = HealthServer::new(metrics);

        let response = server.respond(Route::Metrics);
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("cash_cmd_set_total 1"));
    }

    #[test]
    fn test_http_response_length() {
        let response = http_response(404, "text/plain", "Not Found");
        assert_eq!(
            response,
            "HTTP/1.1 404 Not Found\r\nContent-Type: text/plain\r\nContent-Length: 9\r\nConnection: close\r\n\r\nNot Found"
        );
    }
}
