//! # cash
//!
//! In-memory key-value cache server speaking a line-oriented text protocol.
//!
//! ## Features
//!
//! - `GET`, `SET`, `DELETE` and `EXPIRES` commands, batched with `;`
//! - Per-key expiry with lazy eviction on read plus a background sweeper
//! - Optional gzip compression of stored values (`SET key value COMPRESS`)
//! - Append-only command log replayed on startup
//! - Prometheus metrics and health check endpoints
//!
//! ## Example
//!
//! ```ignore
//! use cash::config::Config;
//! use cash::engine::Engine;
//! use cash::metrics::Metrics;
//! use cash::server::Server;
//!
//! let config = Config::default();
//! let metrics = Arc::new(Metrics::new());
//! let (engine, _stats) = Engine::start(&config.engine, Arc::clone(&metrics), cancel.clone())?;
//! let server = Arc::new(Server::new(config.server, engine.clone(), metrics, cancel));
//! let listener = server.bind().await?;
//! Arc::clone(&server).serve(listener).await?;
//! engine.shutdown().await;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐  "SET a 1;GET a\n"  ┌──────────────────────────────┐
//! │ TCP client   │────────────────────▶│ cash                         │
//! │              │◀────────────────────│  ├─ protocol (parse/encode)  │
//! └──────────────┘    "OK\n1\n"        │  ├─ engine (single writer)   │
//!                                      │  ├─ storage (values + TTLs)  │
//!                                      │  └─ persistence (cmd log)    │
//!                                      └──────────────────────────────┘
//! ```

// Modules
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod health;
pub mod metrics;
pub mod persistence;
pub mod prelude;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-exports for convenience
pub use error::{CacheError, CashError, ErrorKind, ProtocolError, Result};
