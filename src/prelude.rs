//! Prelude module for common imports.
//!
//! # Usage
//!
//! ```ignore
//! use cash::prelude::*;
//! ```

// Error types
pub use crate::error::{CacheError, CashError, ErrorKind, ProtocolError, Result};

// Configuration
pub use crate::config::{Config, EngineConfig, MetricsConfig, ServerConfig};

// Engine and storage
pub use crate::engine::Engine;
pub use crate::storage::{CacheStore, Reply};

// Persistence
pub use crate::persistence::{CommandLog, ReplayStats, SyncPolicy};

// Protocol
pub use crate::protocol::{Command, Operation, ResponseWriter};

// Metrics
pub use crate::metrics::Metrics;

// Server
pub use crate::server::Server;

// Common external crates
pub use std::sync::Arc;
pub use tracing::{debug, error, info, trace, warn};
