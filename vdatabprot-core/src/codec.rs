//! # Vector Codec
//!
//! Turns raw bytes into a [`VectorRecord`] and back.
//!
//! ```text
//! encode:  raw ──┬──> compress(level) ──> compressed_payload
//!                ├──> SHA-256 ──────────> statistical_fingerprint
//!                └──> len, algorithms ──> structural_metadata
//!
//! decode:  compressed_payload ──> decompress ──> raw'
//! verify:  SHA-256(raw') == statistical_fingerprint
//! ```
//!
//! Decoding dispatches on the algorithm stored in the record, not on the
//! codec's own configuration, so records stay readable after the configured
//! algorithm changes.

use bytes::Bytes;

use crate::config::CodecConfig;
use crate::crypto;
use crate::error::{Error, Result};
use crate::types::{CompressionAlgorithm, HashAlgorithm, StructuralMetadata, VectorId, VectorRecord};

/// Highest compression level the linked zstd supports
pub fn zstd_max_level() -> i32 {
    *zstd::compression_level_range().end()
}

#[derive(Debug, Clone)]
pub struct VectorCodec {
    algorithm: CompressionAlgorithm,
    level: i32,
}

impl Default for VectorCodec {
    fn default() -> Self {
        Self::new(&CodecConfig::default())
    }
}

impl VectorCodec {
    pub fn new(config: &CodecConfig) -> Self {
        Self {
            algorithm: config.algorithm,
            level: config.level.unwrap_or_else(zstd_max_level),
        }
    }

    pub fn algorithm(&self) -> CompressionAlgorithm {
        self.algorithm
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    /// Compress `raw`, fingerprint it and describe it
    pub fn encode(&self, raw: &[u8]) -> Result<VectorRecord> {
        self.encode_typed(raw, None)
    }

    /// Like [`encode`](Self::encode), recording the caller's content type
    pub fn encode_typed(&self, raw: &[u8], original_type: Option<&str>) -> Result<VectorRecord> {
        let compressed = compress(raw, self.algorithm, self.level)?;
        let fingerprint = crypto::fingerprint(raw);

        tracing::trace!(
            original = raw.len(),
            compressed = compressed.len(),
            algorithm = %self.algorithm,
            "Encoded record"
        );

        Ok(VectorRecord {
            compressed_payload: Bytes::from(compressed),
            statistical_fingerprint: fingerprint,
            structural_metadata: StructuralMetadata {
                original_size: raw.len() as u64,
                compression_algorithm: self.algorithm,
                hash_algorithm: HashAlgorithm::Sha256,
                original_type: original_type.map(str::to_string),
            },
        })
    }

    /// Decompress the payload. Does not check the fingerprint.
    pub fn decode(&self, record: &VectorRecord) -> Result<Vec<u8>> {
        decompress(
            &record.compressed_payload,
            record.structural_metadata.compression_algorithm,
        )
    }

    /// True if `data` hashes to the record's fingerprint
    pub fn verify(&self, record: &VectorRecord, data: &[u8]) -> bool {
        crypto::verify_fingerprint(data, &record.statistical_fingerprint)
    }

    /// Decode and verify; the bytes are only returned if they match the fingerprint
    pub fn reconstitute(&self, id: &VectorId, record: &VectorRecord) -> Result<Vec<u8>> {
        let data = self.decode(record)?;
        let actual = crypto::fingerprint(&data);
        if actual != record.statistical_fingerprint {
            return Err(Error::IntegrityViolation {
                id: id.to_string(),
                expected: record.statistical_fingerprint.to_hex(),
                actual: actual.to_hex(),
            });
        }
        Ok(data)
    }
}

fn compress(data: &[u8], algorithm: CompressionAlgorithm, level: i32) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zstd => zstd::encode_all(data, level).map_err(|e| Error::Compression {
            message: format!("Zstd compression failed: {}", e),
        }),
        CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
            .compress_vec(data)
            .map_err(|e| Error::Compression {
                message: format!("Snappy compression failed: {}", e),
            }),
    }
}

fn decompress(data: &[u8], algorithm: CompressionAlgorithm) -> Result<Vec<u8>> {
    match algorithm {
        CompressionAlgorithm::None => Ok(data.to_vec()),
        CompressionAlgorithm::Zstd => zstd::decode_all(data).map_err(|e| Error::CorruptPayload {
            message: format!("Zstd decompression failed: {}", e),
        }),
        CompressionAlgorithm::Snappy => snap::raw::Decoder::new()
            .decompress_vec(data)
            .map_err(|e| Error::CorruptPayload {
                message: format!("Snappy decompression failed: {}", e),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    fn random_bytes(len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        rand::thread_rng().fill_bytes(&mut buf);
        buf
    }

    #[test]
    fn test_encode_describes_original() {
        let codec = VectorCodec::default();
        let raw = b"The Architect's Mandate License (AML) v1.0".repeat(20);
        let record = codec.encode_typed(&raw, Some("text/license")).unwrap();

        let meta = &record.structural_metadata;
        assert_eq!(meta.original_size, raw.len() as u64);
        assert_eq!(meta.compression_algorithm, CompressionAlgorithm::Zstd);
        assert_eq!(meta.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(meta.original_type.as_deref(), Some("text/license"));
        assert!(record.compressed_payload.len() < raw.len());
        assert_eq!(record.statistical_fingerprint, crypto::fingerprint(&raw));
    }

    #[test]
    fn test_encode_is_deterministic() {
        let codec = VectorCodec::default();
        let raw = random_bytes(4096);
        assert_eq!(codec.encode(&raw).unwrap(), codec.encode(&raw).unwrap());
    }

    #[test]
    fn test_decode_every_algorithm() {
        let raw = random_bytes(2048);
        for algorithm in [
            CompressionAlgorithm::None,
            CompressionAlgorithm::Zstd,
            CompressionAlgorithm::Snappy,
        ] {
            let codec = VectorCodec::new(&CodecConfig { algorithm, level: Some(3) });
            let record = codec.encode(&raw).unwrap();
            assert_eq!(codec.decode(&record).unwrap(), raw, "{}", algorithm);
        }
    }

    #[test]
    fn test_decode_follows_record_algorithm() {
        let snappy = VectorCodec::new(&CodecConfig {
            algorithm: CompressionAlgorithm::Snappy,
            level: None,
        });
        let record = snappy.encode(b"written under snappy").unwrap();

        let zstd = VectorCodec::default();
        assert_eq!(zstd.decode(&record).unwrap(), b"written under snappy");
    }

    #[test]
    fn test_empty_input() {
        let codec = VectorCodec::default();
        let record = codec.encode(b"").unwrap();
        assert_eq!(record.structural_metadata.original_size, 0);
        let data = codec.reconstitute(&VectorId::from("empty"), &record).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_garbage_payload_is_corrupt() {
        let codec = VectorCodec::default();
        let mut record = codec.encode(&random_bytes(1024)).unwrap();
        record.compressed_payload = Bytes::from(vec![0xAB; 64]);

        let err = codec.decode(&record).unwrap_err();
        assert!(matches!(err, Error::CorruptPayload { .. }), "{:?}", err);
    }

    #[test]
    fn test_reconstitute_rejects_wrong_fingerprint() {
        let codec = VectorCodec::default();
        let mut record = codec.encode(b"original").unwrap();
        let other = codec.encode(b"replacement").unwrap();
        // Readable payload, wrong fingerprint
        record.compressed_payload = other.compressed_payload;

        let err = codec.reconstitute(&VectorId::from("v1"), &record).unwrap_err();
        match err {
            Error::IntegrityViolation { id, expected, actual } => {
                assert_eq!(id, "v1");
                assert_eq!(expected, crypto::fingerprint(b"original").to_hex());
                assert_eq!(actual, crypto::fingerprint(b"replacement").to_hex());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }
}
