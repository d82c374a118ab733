//! cash text protocol: command model, batch parser and response lines

pub mod command;
pub mod parser;
pub mod response;

pub use command::{COMMAND_DELIMITER, COMPRESS_FLAG, Command, Operation};
pub use parser::{fragments, parse_batch, parse_command, parse_message};
pub use response::ResponseWriter;
