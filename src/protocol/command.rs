//! Command model for the cash text protocol

use std::fmt;

/// Terminator between commands in a batch and in the command log
pub const COMMAND_DELIMITER: char = ';';

/// Flag accepted as the third SET argument to store the value compressed
pub const COMPRESS_FLAG: &str = "COMPRESS";

/// Operations understood by the cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// GET <key>
    Get,
    /// SET <key> <value> [COMPRESS]
    Set,
    /// DELETE <key>
    Delete,
    /// EXPIRES <key> <seconds>
    Expires,
}

impl Operation {
    pub const ALL: [Operation; 4] = [
        Operation::Get,
        Operation::Set,
        Operation::Delete,
        Operation::Expires,
    ];

    /// Match an operation token (case-insensitive, exact)
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str().eq_ignore_ascii_case(token))
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Get => "GET",
            Operation::Set => "SET",
            Operation::Delete => "DELETE",
            Operation::Expires => "EXPIRES",
        }
    }

    /// Returns true if a successful run changes the store and must be logged
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::Get)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed command: operation plus positional arguments.
///
/// Argument counts are not checked here; the store validates them so that
/// a malformed command surfaces as an `invalid request` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    operation: Operation,
    args: Vec<String>,
}

impl Command {
    pub fn new<I, S>(operation: Operation, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get(key: impl Into<String>) -> Self {
        Self::new(Operation::Get, [key.into()])
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(Operation::Set, [key.into(), value.into()])
    }

    pub fn set_compressed(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(
            Operation::Set,
            [key.into(), value.into(), COMPRESS_FLAG.to_string()],
        )
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::new(Operation::Delete, [key.into()])
    }

    pub fn expires(key: impl Into<String>, seconds: u64) -> Self {
        Self::new(Operation::Expires, [key.into(), seconds.to_string()])
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// First argument that would not come back unchanged from
    /// [`encode`](Self::encode) and a re-parse: empty, or holding whitespace
    /// or the command delimiter.
    pub fn unencodable_arg(&self) -> Option<&str> {
        self.args
            .iter()
            .map(String::as_str)
            .find(|arg| {
                arg.is_empty()
                    || arg.contains(|c: char| c.is_whitespace() || c == COMMAND_DELIMITER)
            })
    }

    /// Serialize to the batch grammar: `OP arg1 arg2;`
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(
            self.operation.as_str().len() + self.args.iter().map(|a| a.len() + 1).sum::<usize>() + 1,
        );
        out.push_str(self.operation.as_str());
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out.push(COMMAND_DELIMITER);
        out
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.operation.as_str())?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_token() {
        assert_eq!(Operation::from_token("GET"), Some(Operation::Get));
        assert_eq!(Operation::from_token("get"), Some(Operation::Get));
        assert_eq!(Operation::from_token("Set"), Some(Operation::Set));
        assert_eq!(Operation::from_token("delete"), Some(Operation::Delete));
        assert_eq!(Operation::from_token("EXPIRES"), Some(Operation::Expires));
        // Exact match only, no aliases or prefixes
        assert_eq!(Operation::from_token("DEL"), None);
        assert_eq!(Operation::from_token("GETS"), None);
        assert_eq!(Operation::from_token(""), None);
    }

    #[test]
    fn test_is_mutating() {
        assert!(!Operation::Get.is_mutating());
        assert!(Operation::Set.is_mutating());
        assert!(Operation::Delete.is_mutating());
        assert!(Operation::Expires.is_mutating());
    }

    #[test]
    fn test_encode() {
        assert_eq!(Command::set("a", "1").encode(), "SET a 1;");
        assert_eq!(Command::get("a").encode(), "GET a;");
        assert_eq!(Command::expires("a", 30).encode(), "EXPIRES a 30;");
        assert_eq!(Command::set_compressed("k", "v").encode(), "SET k v COMPRESS;");
        assert_eq!(Command::new(Operation::Get, Vec::<String>::new()).encode(), "GET;");
    }

    #[test]
    fn test_unencodable_arg() {
        assert_eq!(Command::set("a", "1").unencodable_arg(), None);
        assert_eq!(Command::set_compressed("k", "v").unencodable_arg(), None);
        assert_eq!(Command::set("k", "hello world").unencodable_arg(), Some("hello world"));
        assert_eq!(Command::set("j", "x;DELETE k").unencodable_arg(), Some("x;DELETE k"));
        assert_eq!(Command::get("tab\there").unencodable_arg(), Some("tab\there"));
        assert_eq!(Command::delete("").unencodable_arg(), Some(""));
    }

    #[test]
    fn test_display() {
        assert_eq!(Command::delete("user:1").to_string(), "DELETE user:1");
    }
}
