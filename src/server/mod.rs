//! TCP front end for the cash text protocol
//!
//! The listener runs until the shutdown token fires or the engine stops.
//! Each admitted client is served on its own task; clients over the
//! connection limit get one error line and are disconnected.

mod connection;
mod handler;

use crate::config::ServerConfig;
use crate::engine::Engine;
use crate::metrics::Metrics;
use crate::protocol::ResponseWriter;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sent to a client refused because of the connection limit
const TOO_MANY_CONNECTIONS: &str = "too many connections";

/// Cash server: owns the listener side and hands clients to the engine
pub struct Server {
    pub(crate) config: ServerConfig,
    pub(crate) engine: Engine,
    pub(crate) metrics: Arc<Metrics>,
    client_slots: Arc<Semaphore>,
    pub(crate) cancel_token: CancellationToken,
}

impl Server {
    pub fn new(
        config: ServerConfig,
        engine: Engine,
        metrics: Arc<Metrics>,
        cancel_token: CancellationToken,
    ) -> Self {
        let client_slots = Arc::new(Semaphore::new(config.max_connections));

        Self {
            config,
            engine,
            metrics,
            client_slots,
            cancel_token,
        }
    }

    /// Bind the configured listen address
    pub async fn bind(&self) -> anyhow::Result<TcpListener> {
        let addr: SocketAddr = self.config.listen_addr.parse()?;
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        Ok(listener)
    }

    /// Accept clients on `listener` until shutdown or until the engine stops.
    ///
    /// Clients already connected are not waited for; they notice the
    /// cancellation on their own.
    pub async fn serve(self: Arc<Self>, listener: TcpListener) -> anyhow::Result<()> {
        loop {
            let (stream, peer_addr) = tokio::select! {
                _ = self.cancel_token.cancelled() => {
                    info!("Shutdown requested, closing listener");
                    break;
                }
                _ = self.engine.stopped() => {
                    warn!("Engine is not running, closing listener");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        error!(error = %e, "Failed to accept client");
                        continue;
                    }
                },
            };

            self.admit(stream, peer_addr);
        }

        Ok(())
    }

    fn admit(self: &Arc<Self>, stream: TcpStream, peer_addr: SocketAddr) {
        let Ok(slot) = Arc::clone(&self.client_slots).try_acquire_owned() else {
            self.metrics.rejected_connections.inc();
            warn!(
                %peer_addr,
                limit = self.config.max_connections,
                "Client limit reached, refusing"
            );
            refuse(&stream, TOO_MANY_CONNECTIONS);
            return;
        };

        // Replies are short lines
        if let Err(e) = stream.set_nodelay(true) {
            debug!(%peer_addr, error = %e, "TCP_NODELAY not set");
        }

        self.metrics.total_connections.inc();
        self.metrics.active_connections.inc();
        debug!(%peer_addr, "Client connected");

        let server = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = connection::handle(server, stream, slot).await {
                debug!(%peer_addr, error = %e, "Client connection failed");
            }
            debug!(%peer_addr, "Client disconnected");
        });
    }
}

/// Best-effort error line for a client that is about to be dropped
fn refuse(stream: &TcpStream, reason: &str) {
    let mut response = ResponseWriter::new(64);
    response.server_error(reason);
    // A fresh socket's send buffer is empty, so this does not block
    let _ = stream.try_write(response.buffer());
}
