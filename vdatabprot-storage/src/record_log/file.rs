use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::Bytes;
use tracing::{info, warn};

use vdatabprot_core::{
    crypto::crc32_checksum,
    error::{Error, Result},
};

use super::types::*;

/// In-memory struct of an open record log file.
pub(crate) struct LogFile {
    pub path: PathBuf,
    pub file: File,
    pub size: u64,
    pub entry_count: u64,
}

pub(crate) fn create_file(path: &Path) -> Result<LogFile> {
    let mut file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .read(true)
        .open(path)?;

    file.write_all(&encode_header())?;
    file.sync_all()?;

    Ok(LogFile {
        path: path.to_path_buf(),
        file,
        size: LOG_HEADER_SIZE as u64,
        entry_count: 0,
    })
}

/// Replay every intact entry and cut the file back to the last one.
///
/// A short read, an impossible length or a CRC mismatch ends the replay;
/// whatever follows is treated as a torn write and truncated away.
pub(crate) fn recover_file(path: &Path) -> Result<(LogFile, Vec<LogEntry>)> {
    info!("Recovering from record log: {:?}", path);

    let mut file = OpenOptions::new().read(true).write(true).open(path)?;
    let file_len = file.metadata()?.len();

    if file_len < LOG_HEADER_SIZE as u64 {
        // Crashed while writing the header; nothing was ever appended
        warn!(path = ?path, len = file_len, "Record log header incomplete, reinitializing");
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&encode_header())?;
        file.sync_all()?;
        return Ok((
            LogFile {
                path: path.to_path_buf(),
                file,
                size: LOG_HEADER_SIZE as u64,
                entry_count: 0,
            },
            Vec::new(),
        ));
    }

    let mut entries = Vec::new();
    let mut offset = LOG_HEADER_SIZE as u64;
    {
        let mut reader = BufReader::new(&mut file);
        read_header(&mut reader, path)?;

        while offset < file_len {
            match read_entry(&mut reader, file_len - offset) {
                Ok(entry) => {
                    offset += entry_size(&entry) as u64;
                    entries.push(entry);
                }
                Err(e) => {
                    warn!(
                        path = ?path,
                        offset,
                        error = %e,
                        "Stopping replay at damaged entry"
                    );
                    break;
                }
            }
        }
    }

    if offset < file_len {
        warn!(
            path = ?path,
            discarded_bytes = file_len - offset,
            "Truncating torn tail of record log"
        );
        file.set_len(offset)?;
        file.sync_all()?;
    }
    file.seek(SeekFrom::End(0))?;

    Ok((
        LogFile {
            path: path.to_path_buf(),
            file,
            size: offset,
            entry_count: entries.len() as u64,
        },
        entries,
    ))
}

fn encode_header() -> Vec<u8> {
    let mut header = Vec::with_capacity(LOG_HEADER_SIZE);
    header.extend_from_slice(LOG_MAGIC);
    header.extend_from_slice(&LOG_VERSION.to_le_bytes());
    header.extend_from_slice(&(chrono::Utc::now().timestamp().max(0) as u64).to_le_bytes());
    header.extend_from_slice(&[0u8; 12]); // Reserved
    header
}

fn read_header(reader: &mut impl Read, path: &Path) -> Result<()> {
    let mut magic = [0u8; 8];
    reader.read_exact(&mut magic)?;
    if &magic != LOG_MAGIC {
        return Err(Error::LogCorruption {
            path: path.display().to_string(),
            message: "Invalid record log magic number".to_string(),
        });
    }

    let version = reader.read_u32::<LittleEndian>()?;
    if version != LOG_VERSION {
        return Err(Error::LogCorruption {
            path: path.display().to_string(),
            message: format!("Unsupported record log version: {}", version),
        });
    }

    let _creation_time = reader.read_u64::<LittleEndian>()?;
    reader.read_exact(&mut [0u8; 12])?;
    Ok(())
}

/// Frame one entry: fixed header followed by the payload.
pub(crate) fn encode_entry(entry: &LogEntry) -> Vec<u8> {
    let mut buffer = Vec::with_capacity(entry_size(entry));
    buffer.extend_from_slice(&(entry.data.len() as u32).to_le_bytes());
    buffer.extend_from_slice(&entry.sequence.to_le_bytes());
    buffer.extend_from_slice(&entry.timestamp.to_le_bytes());
    buffer.push(entry.entry_type as u8);
    buffer.push(0); // Flags
    buffer.extend_from_slice(&crc32_checksum(&entry.data).to_le_bytes());
    buffer.extend_from_slice(&[0u8; 6]); // Reserved
    buffer.extend_from_slice(&entry.data);
    buffer
}

pub(crate) fn read_entry(reader: &mut impl Read, remaining: u64) -> Result<LogEntry> {
    let length = reader.read_u32::<LittleEndian>()? as u64;
    if length + ENTRY_HEADER_SIZE as u64 > remaining {
        return Err(Error::Serialization {
            message: format!("Entry length {} runs past end of log", length),
        });
    }

    let sequence = reader.read_u64::<LittleEndian>()?;
    let timestamp = reader.read_u64::<LittleEndian>()?;
    let entry_type = EntryType::try_from(reader.read_u8()?)?;
    let _flags = reader.read_u8()?;
    let crc = reader.read_u32::<LittleEndian>()?;
    reader.read_exact(&mut [0u8; 6])?;

    let mut data = vec![0u8; length as usize];
    reader.read_exact(&mut data)?;

    if crc32_checksum(&data) != crc {
        return Err(Error::Serialization {
            message: format!("CRC mismatch at sequence {}", sequence),
        });
    }

    Ok(LogEntry {
        sequence,
        timestamp,
        entry_type,
        data: Bytes::from(data),
    })
}

pub(crate) fn entry_size(entry: &LogEntry) -> usize {
    ENTRY_HEADER_SIZE + entry.data.len()
}
