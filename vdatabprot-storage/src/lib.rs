//! # VDataBProt Storage
//!
//! Durable record store, link graph, prefetching access layer and
//! integrity auditor.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Access Layer                           │
//! │                                                             │
//! │  write ──> Codec ──> RecordStore ──> Access Log             │
//! │  read  ──> Prefetch Cache ──> RecordStore ──> Link Graph    │
//! │                 ▲                                 │         │
//! │                 └──── stage strong link targets ──┘         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Auditor                              │
//! │                                                             │
//! │  patrol    ──> RecordStore snapshot ──> decode + verify     │
//! │  staleness ──> Access Log ──> last access per id            │
//! │  analysis  ──> Access Log ──> co-access ──> Link Graph      │
//! └─────────────────────────────────────────────────────────────┘
//!
//! On disk (data_dir):
//!   vectors.log   record log of id -> VectorRecord
//!   links.log     record log of id -> [Link]
//!   access.log    one text line per read or write
//! ```

pub mod access;
pub mod access_log;
pub mod auditor;
pub mod cache;
pub mod durable;
pub mod links;
pub mod record_log;
pub mod store;

pub use access::AccessLayer;
pub use access_log::AccessLog;
pub use auditor::{AuditSchedule, Auditor, AuditorHandle, PatrolReport};
pub use cache::{CacheStats, PrefetchCache};
pub use durable::DurableMap;
pub use links::LinkGraph;
pub use record_log::RecordLog;
pub use store::{LogStore, MemoryStore, RecordStore};
