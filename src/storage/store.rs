//! In-memory cache store
//!
//! Holds three per-key maps: values, expiration deadlines and the set of keys
//! whose value is stored compressed. An expiration may exist without a value
//! (EXPIRES before SET). A compressed flag never outlives its value.
//!
//! The store itself is not synchronized. It is shared as [`SharedStore`] and
//! only the dispatcher and the expiration sweeper ever lock it.

use crate::protocol::{COMMAND_DELIMITER, COMPRESS_FLAG, Command, Operation};
use crate::storage::compression;
use crate::CacheError;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::trace;

/// Outcome of one command: payload on success, request error otherwise
pub type Reply = Result<Bytes, CacheError>;

/// Store handle shared by the dispatcher and the sweeper
pub type SharedStore = Arc<Mutex<CacheStore>>;

const OK: Bytes = Bytes::from_static(b"OK");

/// Key/value store with TTL and compression metadata
#[derive(Debug, Default)]
pub struct CacheStore {
    values: HashMap<String, Bytes>,
    expirations: HashMap<String, Instant>,
    compressed: HashSet<String>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap the store in the lock shared by the dispatcher and the sweeper
    pub fn into_shared(self) -> SharedStore {
        Arc::new(Mutex::new(self))
    }

    /// Apply a command using the current time
    pub fn apply(&mut self, command: &Command) -> Reply {
        self.apply_at(command, Instant::now())
    }

    /// Apply a command as if the current time were `now`
    pub fn apply_at(&mut self, command: &Command, now: Instant) -> Reply {
        // Anything applied must be able to go through the command log unchanged
        if let Some(arg) = command.unencodable_arg() {
            return Err(CacheError::invalid_request(format!(
                "argument '{arg}' is empty or contains whitespace or '{COMMAND_DELIMITER}'"
            )));
        }

        let args = command.args();
        match command.operation() {
            Operation::Get => self.get(args, now),
            Operation::Set => self.set(args),
            Operation::Delete => self.delete(args),
            Operation::Expires => self.expires(args, now),
        }
    }

    /// GET <key>
    fn get(&mut self, args: &[String], now: Instant) -> Reply {
        let [key] = args else {
            return Err(CacheError::invalid_request(
                "GET expects exactly 1 argument: key",
            ));
        };

        if self.is_expired(key, now) {
            trace!(key = %key, "Lazy expiration: removed expired key");
            self.evict(key);
            return Err(CacheError::key_expired(key));
        }

        let Some(value) = self.values.get(key) else {
            return Err(CacheError::key_not_found(key));
        };

        if self.compressed.contains(key) {
            compression::decompress(value)
        } else {
            Ok(value.clone())
        }
    }

    /// SET <key> <value> [COMPRESS]
    fn set(&mut self, args: &[String]) -> Reply {
        let (key, value, compress) = match args {
            [key, value] => (key, value, false),
            [key, value, flag] if flag.eq_ignore_ascii_case(COMPRESS_FLAG) => (key, value, true),
            [_, _, flag] => {
                return Err(CacheError::invalid_request(format!(
                    "unknown SET flag '{flag}'"
                )));
            }
            _ => {
                return Err(CacheError::invalid_request(
                    "SET expects 2 or 3 arguments: key value [COMPRESS]",
                ));
            }
        };

        if compress {
            let data = compression::compress(value.as_bytes())?;
            self.values.insert(key.clone(), data);
            self.compressed.insert(key.clone());
        } else {
            self.values
                .insert(key.clone(), Bytes::copy_from_slice(value.as_bytes()));
            self.compressed.remove(key);
        }

        Ok(OK)
    }

    /// DELETE <key>
    fn delete(&mut self, args: &[String]) -> Reply {
        let [key] = args else {
            return Err(CacheError::invalid_request(
                "DELETE expects exactly 1 argument: key",
            ));
        };

        self.evict(key);
        Ok(OK)
    }

    /// EXPIRES <key> <seconds>
    fn expires(&mut self, args: &[String], now: Instant) -> Reply {
        let [key, seconds] = args else {
            return Err(CacheError::invalid_request(
                "EXPIRES expects exactly 2 arguments: key seconds",
            ));
        };

        let seconds: u64 = seconds.parse().map_err(|_| {
            CacheError::invalid_request(format!("invalid number of seconds '{seconds}'"))
        })?;
        let deadline = now
            .checked_add(Duration::from_secs(seconds))
            .ok_or_else(|| CacheError::invalid_request("expiration is out of range"))?;

        self.expirations.insert(key.clone(), deadline);
        Ok(OK)
    }

    /// Remove every key whose deadline has passed at `now`.
    ///
    /// Returns the number of expirations removed.
    pub fn sweep_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<String> = self
            .expirations
            .iter()
            .filter(|&(_, &deadline)| deadline <= now)
            .map(|(key, _)| key.clone())
            .collect();

        for key in &expired {
            trace!(key = %key, "Sweep: removed expired key");
            self.evict(key);
        }

        expired.len()
    }

    /// Drop the value and all metadata of a key
    fn evict(&mut self, key: &str) {
        self.values.remove(key);
        self.expirations.remove(key);
        self.compressed.remove(key);
    }

    fn is_expired(&self, key: &str, now: Instant) -> bool {
        self.expirations
            .get(key)
            .is_some_and(|&deadline| deadline <= now)
    }

    /// Number of keys holding a value
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns true if the key holds a value (expired or not)
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Recorded expiration deadline for a key
    pub fn expiration(&self, key: &str) -> Option<Instant> {
        self.expirations.get(key).copied()
    }

    /// Returns true if the key's value is stored compressed
    pub fn is_compressed(&self, key: &str) -> bool {
        self.compressed.contains(key)
    }

    /// Number of recorded expirations
    pub fn expiration_count(&self) -> usize {
        self.expirations.len()
    }
}
