//! Append-only command log
//!
//! Record format: the serialized command (`OP arg...;`) followed by `\n`.
//! No header, footer or checksum. The file is never rewritten or compacted.

use crate::protocol::Command;
use serde::Deserialize;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Minimum spacing between syncs for [`SyncPolicy::EverySecond`]
const SYNC_INTERVAL: Duration = Duration::from_secs(1);

/// When appended records are forced to stable storage
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncPolicy {
    /// Hand records to the OS, never fsync while running
    #[default]
    Never,
    /// fsync at most once per second, piggybacked on appends
    EverySecond,
    /// fsync after every append
    Always,
}

impl FromStr for SyncPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "never" => Ok(SyncPolicy::Never),
            "every_second" => Ok(SyncPolicy::EverySecond),
            "always" => Ok(SyncPolicy::Always),
            other => Err(format!(
                "unknown sync policy '{other}' (expected never, every_second or always)"
            )),
        }
    }
}

/// Open handle on the command log
#[derive(Debug)]
pub struct CommandLog {
    file: File,
    path: PathBuf,
    sync_policy: SyncPolicy,
    last_sync: Instant,
    appended: u64,
    /// Length of the file up to the last complete record
    len: u64,
}

impl CommandLog {
    /// Open (or create) the log for reading and appending
    pub fn open(path: impl AsRef<Path>, sync_policy: SyncPolicy) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Ensure the directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        let len = seal_torn_tail(&mut file, &path)?;

        info!(path = ?path, sync_policy = ?sync_policy, len, "Command log opened");

        Ok(Self {
            file,
            path,
            sync_policy,
            last_sync: Instant::now(),
            appended: 0,
            len,
        })
    }

    /// Read the whole log from the beginning.
    ///
    /// Invalid UTF-8 is replaced rather than rejected so that a damaged
    /// record only spoils its own fragment during replay.
    pub fn read_contents(&mut self) -> io::Result<String> {
        let mut buf = Vec::new();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.read_to_end(&mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Append one command record and apply the sync policy
    pub fn append(&mut self, command: &Command) -> io::Result<()> {
        let mut record = command.encode();
        record.push('\n');

        if let Err(e) = self.file.write_all(record.as_bytes()) {
            // Drop any partial record so the next one starts on a clean boundary
            if let Err(truncate_err) = self.file.set_len(self.len) {
                warn!(path = ?self.path, error = %truncate_err, "Failed to truncate partial record");
            }
            return Err(e);
        }
        self.len += record.len() as u64;
        self.appended += 1;

        match self.sync_policy {
            SyncPolicy::Always => self.sync()?,
            SyncPolicy::EverySecond if self.last_sync.elapsed() >= SYNC_INTERVAL => self.sync()?,
            SyncPolicy::EverySecond | SyncPolicy::Never => {}
        }

        Ok(())
    }

    /// Force appended records to disk
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_data()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Sync and close the log
    pub fn close(self) -> io::Result<()> {
        self.file.sync_all()?;
        debug!(path = ?self.path, appended = self.appended, "Command log closed");
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Records appended through this handle
    pub fn appended(&self) -> u64 {
        self.appended
    }

}

/// Terminate a record cut short by a crash or a failed write.
///
/// Appending `;\n` turns the partial bytes into a fragment of their own, so
/// replay rejects just that fragment and later records stay intact. Returns
/// the resulting file length.
fn seal_torn_tail(file: &mut File, path: &Path) -> io::Result<u64> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(0);
    }

    let tail_len = len.min(2);
    let mut tail = [0u8; 2];
    let tail = &mut tail[..tail_len as usize];
    file.seek(SeekFrom::Start(len - tail_len))?;
    file.read_exact(tail)?;

    if tail.ends_with(b";\n") || tail.ends_with(b";") {
        return Ok(len);
    }

    warn!(path = ?path, "Command log ends with a partial record, sealing it");
    file.write_all(b";\n")?;
    Ok(len + 2)
}
