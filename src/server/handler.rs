//! Executes one client message against the engine

use super::Server;
use crate::protocol::{ResponseWriter, parse_message};
use tracing::debug;

/// Parse a message and run its commands in order, writing one response line
/// per command.
///
/// A parse error rejects the whole message with a single error line; none of
/// its commands are run. Request errors only affect their own command.
pub async fn execute_message(server: &Server, message: &[u8], response: &mut ResponseWriter) {
    let commands = match parse_message(message) {
        Ok(commands) => commands,
        Err(e) => {
            server.metrics.protocol_errors.inc();
            debug!(error = %e, "Rejected message");
            response.protocol_error(&e);
            return;
        }
    };

    for command in commands {
        match server.engine.submit(command).await {
            Ok(Ok(payload)) => response.payload(&payload),
            Ok(Err(e)) => {
                debug!(error = %e, "Command failed");
                response.error(&e);
            }
            Err(e) => {
                // Engine is gone; the rest of the message cannot run either
                response.server_error(&e.to_string());
                return;
            }
        }
    }
}
