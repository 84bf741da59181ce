//! # Core Types
//!
//! Data structures shared by every layer of the store.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::Error;

/// Timestamp type used throughout the system
pub type Timestamp = DateTime<Utc>;

/// Opaque identifier of a stored vector record.
///
/// Either supplied by the caller or generated at write time.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorId(String);

impl VectorId {
    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for VectorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VectorId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for VectorId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for VectorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// SHA-256 digest of the original, uncompressed bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint(pub [u8; 32]);

impl Fingerprint {
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Compression algorithms a record payload can be stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    Zstd,
    Snappy,
}

impl CompressionAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionAlgorithm::None => "none",
            CompressionAlgorithm::Zstd => "zstd",
            CompressionAlgorithm::Snappy => "snappy",
        }
    }
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(CompressionAlgorithm::None),
            "zstd" => Ok(CompressionAlgorithm::Zstd),
            "snappy" => Ok(CompressionAlgorithm::Snappy),
            other => Err(Error::Configuration {
                message: format!("Unknown compression algorithm: {}", other),
            }),
        }
    }
}

/// Digest algorithms used for fingerprints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    Sha256,
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha256 => f.write_str("sha256"),
        }
    }
}

/// Describes how to turn a payload back into the original bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuralMetadata {
    pub original_size: u64,
    pub compression_algorithm: CompressionAlgorithm,
    pub hash_algorithm: HashAlgorithm,
    pub original_type: Option<String>,
}

/// The unit of stored truth: compressed bytes plus what is needed to verify them.
///
/// Created once by the codec and never mutated; a later write under the same
/// id replaces the whole record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub compressed_payload: Bytes,
    pub statistical_fingerprint: Fingerprint,
    pub structural_metadata: StructuralMetadata,
}

/// Nature of a relationship between two vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextType {
    Causal,
    /// Derived from temporal co-access
    AccessedWithin,
    ContentSimilarity,
}

impl ContextType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextType::Causal => "causal",
            ContextType::AccessedWithin => "accessed_within",
            ContextType::ContentSimilarity => "content_similarity",
        }
    }
}

impl fmt::Display for ContextType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContextType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "causal" => Ok(ContextType::Causal),
            "accessed_within" => Ok(ContextType::AccessedWithin),
            "content_similarity" => Ok(ContextType::ContentSimilarity),
            other => Err(Error::Configuration {
                message: format!("Unknown context type: {}", other),
            }),
        }
    }
}

/// Directed, typed, weighted edge between two vectors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub source_vector_id: VectorId,
    pub target_vector_id: VectorId,
    pub context_type: ContextType,
    /// Confidence in `[0, 1]` by convention; not enforced
    pub strength_score: f32,
}

impl Link {
    pub fn new(
        source: impl Into<VectorId>,
        target: impl Into<VectorId>,
        context_type: ContextType,
        strength_score: f32,
    ) -> Self {
        Self {
            source_vector_id: source.into(),
            target_vector_id: target.into(),
            context_type,
            strength_score,
        }
    }

    pub fn is_self_loop(&self) -> bool {
        self.source_vector_id == self.target_vector_id
    }

    /// The same edge pointing the other way
    pub fn reversed(&self) -> Self {
        Self {
            source_vector_id: self.target_vector_id.clone(),
            target_vector_id: self.source_vector_id.clone(),
            context_type: self.context_type,
            strength_score: self.strength_score,
        }
    }
}

/// Kind of access recorded in the access log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessKind::Read => "READ",
            AccessKind::Write => "WRITE",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccessKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READ" => Ok(AccessKind::Read),
            "WRITE" => Ok(AccessKind::Write),
            other => Err(Error::Serialization {
                message: format!("Unknown access kind: {}", other),
            }),
        }
    }
}

/// One line of the access log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: Timestamp,
    pub kind: AccessKind,
    pub vector_id: VectorId,
}

impl AccessLogEntry {
    pub fn now(kind: AccessKind, vector_id: VectorId) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            vector_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = VectorId::generate();
        let b = VectorId::generate();
        assert_ne!(a, b);
        assert_eq!(a.as_str().len(), 36);
    }

    #[test]
    fn test_link_reversal() {
        let link = Link::new("a", "b", ContextType::Causal, 0.7);
        let back = link.reversed();
        assert_eq!(back.source_vector_id.as_str(), "b");
        assert_eq!(back.target_vector_id.as_str(), "a");
        assert_eq!(back.context_type, ContextType::Causal);
        assert_eq!(back.strength_score, 0.7);
        assert!(!link.is_self_loop());
        assert!(Link::new("x", "x", ContextType::Causal, 1.0).is_self_loop());
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("accessed-within".parse::<ContextType>().unwrap(), ContextType::AccessedWithin);
        assert_eq!("ZSTD".parse::<CompressionAlgorithm>().unwrap(), CompressionAlgorithm::Zstd);
        assert_eq!("READ".parse::<AccessKind>().unwrap(), AccessKind::Read);
        assert!("read".parse::<AccessKind>().is_err());
        assert!("lzma".parse::<CompressionAlgorithm>().is_err());
    }
}
