//! Startup replay of the command log into the store
//!
//! Commands are re-applied in file order exactly as live requests would be,
//! but nothing is re-appended. Bad fragments are reported and skipped.

use crate::protocol::{fragments, parse_command};
use crate::storage::CacheStore;
use tracing::{info, warn};

/// Outcome counters of one replay pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Commands applied successfully
    pub applied: usize,
    /// Fragments that did not parse
    pub parse_errors: usize,
    /// Commands that parsed but were rejected by the store
    pub apply_errors: usize,
}

impl ReplayStats {
    pub fn errors(&self) -> usize {
        self.parse_errors + self.apply_errors
    }
}

/// Apply every command in `contents` to `store`, best-effort
pub fn replay(store: &mut CacheStore, contents: &str) -> ReplayStats {
    let mut stats = ReplayStats::default();

    for (index, fragment) in fragments(contents).enumerate() {
        let command = match parse_command(fragment) {
            Ok(command) => command,
            Err(e) => {
                warn!(index, fragment, error = %e, "Replay: skipping unparsable record");
                stats.parse_errors += 1;
                continue;
            }
        };

        match store.apply(&command) {
            Ok(_) => stats.applied += 1,
            Err(e) => {
                warn!(index, command = %command, error = %e, "Replay: command rejected");
                stats.apply_errors += 1;
            }
        }
    }

    info!(
        applied = stats.applied,
        parse_errors = stats.parse_errors,
        apply_errors = stats.apply_errors,
        keys = store.len(),
        "Command log replayed"
    );

    stats
}
