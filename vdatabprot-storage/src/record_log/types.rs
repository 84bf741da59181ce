use bytes::Bytes;
use vdatabprot_core::error::{Error, Result};

pub const LOG_MAGIC: &[u8; 8] = b"VDBPLOG\0";
pub const LOG_VERSION: u32 = 1;
pub const LOG_HEADER_SIZE: usize = 32;
pub const ENTRY_HEADER_SIZE: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EntryType {
    /// Full value for a key; a later put for the same key supersedes it
    Put = 1,
}

impl TryFrom<u8> for EntryType {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(EntryType::Put),
            _ => Err(Error::Serialization {
                message: format!("Invalid entry type: {}", value),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub sequence: u64,
    /// Milliseconds since the Unix epoch
    pub timestamp: u64,
    pub entry_type: EntryType,
    pub data: Bytes,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub sync_on_write: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            sync_on_write: true,
        }
    }
}
