//! # Access Log
//!
//! Line-oriented record of every read and write, one line per access:
//!
//! ```text
//! 2024-05-01 12:00:00.123456 - INFO - READ - 3f2a...
//! ```
//!
//! Timestamps are UTC. The auditor replays this file for staleness and
//! co-access analysis; a line that cannot be parsed is skipped, not fatal.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use parking_lot::Mutex;
use tracing::warn;

use vdatabprot_core::error::{Error, Result, ResultExt};
use vdatabprot_core::types::{AccessKind, AccessLogEntry, VectorId};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";
const PARSE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const SEPARATOR: &str = " - ";
const LEVEL: &str = "INFO";

pub struct AccessLog {
    path: PathBuf,
    writer: Mutex<File>,
}

impl AccessLog {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Io {
                message: format!("Failed to open access log {:?}", path),
                source: e,
            })?;

        Ok(Self {
            path,
            writer: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &AccessLogEntry) -> Result<()> {
        let line = format_line(entry);
        let mut writer = self.writer.lock();
        writer.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Record an access happening now
    pub fn record(&self, kind: AccessKind, id: &VectorId) -> Result<()> {
        self.append(&AccessLogEntry::now(kind, id.clone()))
    }

    /// Every parseable entry, in file order
    pub fn entries(&self) -> Result<Vec<AccessLogEntry>> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        let mut skipped = 0usize;
        for line in BufReader::new(file).lines() {
            let line = line
                .map_err(Error::from)
                .with_context(|| format!("Failed to read {:?}", self.path))?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Ok(entry) => entries.push(entry),
                Err(_) => skipped += 1,
            }
        }

        if skipped > 0 {
            warn!(path = ?self.path, skipped, "Skipped malformed access log lines");
        }
        Ok(entries)
    }
}

pub fn format_line(entry: &AccessLogEntry) -> String {
    format!(
        "{}{sep}{}{sep}{}{sep}{}\n",
        entry.timestamp.format(TIMESTAMP_FORMAT),
        LEVEL,
        entry.kind,
        entry.vector_id,
        sep = SEPARATOR
    )
}

/// Parse one line. Comma fractional separators are accepted as well.
pub fn parse_line(line: &str) -> Result<AccessLogEntry> {
    let malformed = || Error::Serialization {
        message: format!("Malformed access log line: {:?}", line),
    };

    let mut parts = line.trim_end_matches(['\r', '\n']).splitn(4, SEPARATOR);
    let timestamp = parts.next().ok_or_else(malformed)?;
    let _level = parts.next().ok_or_else(malformed)?;
    let kind = parts.next().ok_or_else(malformed)?;
    let id = parts.next().ok_or_else(malformed)?;
    if id.is_empty() {
        return Err(malformed());
    }

    let timestamp = NaiveDateTime::parse_from_str(&timestamp.replace(',', "."), PARSE_FORMAT)
        .map_err(|e| Error::Serialization {
            message: format!("Bad access log timestamp {:?}: {}", timestamp, e),
        })?
        .and_utc();

    Ok(AccessLogEntry {
        timestamp,
        kind: kind.parse()?,
        vector_id: VectorId::from(id),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    #[test]
    fn test_format_and_parse() {
        let timestamp = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
            + chrono::Duration::microseconds(123_456);
        let entry = AccessLogEntry {
            timestamp,
            kind: AccessKind::Read,
            vector_id: VectorId::from("vec-1"),
        };

        let line = format_line(&entry);
        assert_eq!(line, "2024-05-01 12:00:00.123456 - INFO - READ - vec-1\n");
        assert_eq!(parse_line(&line).unwrap(), entry);
    }

    #[test]
    fn test_parse_comma_fraction() {
        let entry = parse_line("2024-05-01 12:00:01,500000 - INFO - WRITE - abc").unwrap();
        assert_eq!(entry.kind, AccessKind::Write);
        assert_eq!(entry.vector_id, VectorId::from("abc"));
        assert_eq!(entry.timestamp.timestamp_subsec_micros(), 500_000);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_line("not a log line").is_err());
        assert!(parse_line("2024-05-01 12:00:00.0 - INFO - DELETE - x").is_err());
        assert!(parse_line("yesterday - INFO - READ - x").is_err());
        assert!(parse_line("2024-05-01 12:00:00.0 - INFO - READ - ").is_err());
    }

    #[test]
    fn test_entries_skip_malformed_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log = AccessLog::open(temp_dir.path().join("access.log")).unwrap();
        assert!(log.entries().unwrap().is_empty());

        log.record(AccessKind::Write, &VectorId::from("a")).unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(log.path())
            .unwrap()
            .write_all(b"garbage line\n\n")
            .unwrap();
        log.record(AccessKind::Read, &VectorId::from("a")).unwrap();

        let entries = log.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].kind, AccessKind::Write);
        assert_eq!(entries[1].kind, AccessKind::Read);
        assert!(entries[0].timestamp <= entries[1].timestamp);
    }

    #[test]
    fn test_missing_file_has_no_entries() {
        let temp_dir = TempDir::new().unwrap();
        let log = AccessLog::open(temp_dir.path().join("access.log")).unwrap();
        std::fs::remove_file(log.path()).unwrap();
        assert!(log.entries().unwrap().is_empty());
    }
}
