//! Append-only record log backing every durable map.
//!
//! Each put is one framed entry. Replaying the log in order and keeping the
//! last value per key rebuilds the map; a damaged tail is truncated on open
//! so the next append starts on a clean boundary.
//!
//! File Format
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Record Log Layout                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Header (32 bytes)                                          │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │ Magic Number (8 bytes): "VDBPLOG\0"                 │    │
//! │  │ Version (4 bytes)                                   │    │
//! │  │ Creation Time (8 bytes)                             │    │
//! │  │ Reserved (12 bytes)                                 │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Entry 1                                                    │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │ Entry Header (32 bytes)                             │    │
//! │  │   - Length (4 bytes)                                │    │
//! │  │   - Sequence (8 bytes)                              │    │
//! │  │   - Timestamp (8 bytes)                             │    │
//! │  │   - Entry Type (1 byte)                             │    │
//! │  │   - Flags (1 byte)                                  │    │
//! │  │   - CRC32 of payload (4 bytes)                      │    │
//! │  │   - Reserved (6 bytes)                              │    │
//! │  ├─────────────────────────────────────────────────────┤    │
//! │  │ Payload (Variable length, MessagePack key/value)    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Entry 2...N                                                │
//! └─────────────────────────────────────────────────────────────┘

mod file;
mod types;

pub use types::{EntryType, LogConfig, LogEntry, ENTRY_HEADER_SIZE, LOG_HEADER_SIZE};

use std::ffi::OsString;
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info, warn};

use vdatabprot_core::error::{Error, Result};

use file::{create_file, encode_entry, recover_file, LogFile};

pub struct RecordLog {
    file: LogFile,
    config: LogConfig,
    next_sequence: u64,
}

impl RecordLog {
    /// Open or create the log at `path`, returning every intact entry in
    /// append order.
    pub fn open(path: impl AsRef<Path>, config: LogConfig) -> Result<(Self, Vec<LogEntry>)> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| Error::Io {
                    message: format!("Failed to create {:?}", parent),
                    source: e,
                })?;
            }
        }

        let scratch = compaction_path(path);
        if scratch.exists() {
            warn!(path = ?scratch, "Removing leftover compaction file");
            fs::remove_file(&scratch)?;
        }

        let (file, entries) = if path.exists() {
            recover_file(path)?
        } else {
            info!("Creating record log: {:?}", path);
            (create_file(path)?, Vec::new())
        };

        let next_sequence = entries.last().map(|e| e.sequence + 1).unwrap_or(0);
        Ok((
            Self {
                file,
                config,
                next_sequence,
            },
            entries,
        ))
    }

    /// Append one payload. Durable on return when `sync_on_write` is set.
    pub fn append(&mut self, data: &[u8]) -> Result<u64> {
        let entry = LogEntry {
            sequence: self.next_sequence,
            timestamp: now_millis(),
            entry_type: EntryType::Put,
            data: Bytes::copy_from_slice(data),
        };
        let buffer = encode_entry(&entry);

        if let Err(e) = self.write_frame(&buffer) {
            self.rollback();
            return Err(e);
        }

        self.file.size += buffer.len() as u64;
        self.file.entry_count += 1;
        self.next_sequence += 1;
        Ok(entry.sequence)
    }

    fn write_frame(&mut self, buffer: &[u8]) -> Result<()> {
        self.file.file.write_all(buffer)?;
        if self.config.sync_on_write {
            self.file.file.sync_data()?;
        }
        Ok(())
    }

    /// Drop a partially written frame so later appends stay readable
    fn rollback(&mut self) {
        let size = self.file.size;
        let result = self
            .file
            .file
            .set_len(size)
            .and_then(|_| self.file.file.seek(SeekFrom::End(0)).map(|_| ()));
        if let Err(e) = result {
            warn!(path = ?self.file.path, error = %e, "Failed to roll back partial append");
        }
    }

    pub fn sync(&mut self) -> Result<()> {
        self.file.file.sync_all()?;
        Ok(())
    }

    /// Replace the log's contents with `payloads`.
    ///
    /// The new log is written beside the old one, synced, and renamed over
    /// it, so a crash leaves either the old or the new file intact.
    pub fn rewrite<I>(&mut self, payloads: I) -> Result<()>
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let path = self.file.path.clone();
        let scratch = compaction_path(&path);
        let mut compacted = create_file(&scratch)?;
        let timestamp = now_millis();

        let mut sequence = 0u64;
        for data in payloads {
            let entry = LogEntry {
                sequence,
                timestamp,
                entry_type: EntryType::Put,
                data: Bytes::from(data),
            };
            let buffer = encode_entry(&entry);
            compacted.file.write_all(&buffer)?;
            compacted.size += buffer.len() as u64;
            compacted.entry_count += 1;
            sequence += 1;
        }
        compacted.file.sync_all()?;

        fs::rename(&scratch, &path).map_err(|e| Error::Io {
            message: format!("Failed to replace {:?}", path),
            source: e,
        })?;
        sync_parent_dir(&path);

        debug!(
            path = ?path,
            before = self.file.size,
            after = compacted.size,
            entries = compacted.entry_count,
            "Record log rewritten"
        );

        compacted.path = path;
        self.file = compacted;
        self.next_sequence = sequence;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Bytes on disk, header included
    pub fn size(&self) -> u64 {
        self.file.size
    }

    pub fn entry_count(&self) -> u64 {
        self.file.entry_count
    }

    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }
}

fn compaction_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".compact");
    PathBuf::from(name)
}

fn now_millis() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

#[cfg(unix)]
fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::File::open(parent).and_then(|dir| dir.sync_all()) {
            warn!(path = ?parent, error = %e, "Failed to sync directory");
        }
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) {}
