//! # VDataBProt Core
//!
//! This crate provides the fundamental building blocks for VDataBProt:
//! - Core data structures (records, ids, links, access log entries)
//! - The vector codec
//! - Error types
//! - Configuration
//! - Cryptographic digests
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                 vdatabprot-core                 │
//! ├─────────────────────────────────────────────────┤
//! │  • types    - Records, ids, links               │
//! │  • codec    - Compress / fingerprint / decode   │
//! │  • crypto   - SHA-256 fingerprints, CRC32       │
//! │  • error    - Error handling                    │
//! │  • config   - TOML-backed configuration         │
//! │  • metrics  - Operation counters                │
//! └─────────────────────────────────────────────────┘
//! ```

pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod metrics;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use codec::VectorCodec;
pub use config::Config;
pub use error::{Error, Result};
pub use types::{
    AccessKind, AccessLogEntry, CompressionAlgorithm, ContextType, Fingerprint, HashAlgorithm,
    Link, StructuralMetadata, Timestamp, VectorId, VectorRecord,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
