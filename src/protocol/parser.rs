//! Parser for `;`-delimited command batches
//!
//! The same grammar is used for client messages and for the command log:
//! fragments are split on `;`, trimmed, empty fragments are skipped, and each
//! fragment is split on whitespace into an operation token and arguments.

use crate::ProtocolError;
use crate::protocol::command::{COMMAND_DELIMITER, Command, Operation};

/// Iterate over the non-empty, trimmed command fragments of a batch
pub fn fragments(input: &str) -> impl Iterator<Item = &str> {
    input
        .split(COMMAND_DELIMITER)
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
}

/// Parse a single command fragment (no delimiter)
pub fn parse_command(fragment: &str) -> Result<Command, ProtocolError> {
    let mut tokens = fragment.split_whitespace();

    let name = tokens.next().ok_or(ProtocolError::EmptyCommand)?;
    let operation = Operation::from_token(name)
        .ok_or_else(|| ProtocolError::UnknownOperation(name.to_string()))?;

    Ok(Command::new(operation, tokens))
}

/// Parse a whole batch. The first bad fragment fails the batch.
pub fn parse_batch(input: &str) -> Result<Vec<Command>, ProtocolError> {
    fragments(input).map(parse_command).collect()
}

/// Parse a raw message buffer
pub fn parse_message(buf: &[u8]) -> Result<Vec<Command>, ProtocolError> {
    let input = std::str::from_utf8(buf).map_err(|_| ProtocolError::InvalidUtf8)?;
    parse_batch(input)
}
