//! # Cryptographic Primitives
//!
//! Digests used to detect corruption.
//!
//! 1. **Fingerprints**: SHA-256 over the original bytes of a record
//! 2. **Checksums**: CRC32 over record-log entry payloads, to find torn writes

use crc32fast::Hasher as Crc32Hasher;
use ring::digest;

use crate::types::Fingerprint;

/// SHA-256 fingerprint of the original (uncompressed) bytes
pub fn fingerprint(data: &[u8]) -> Fingerprint {
    let digest = digest::digest(&digest::SHA256, data);
    let mut out = [0u8; 32];
    out.copy_from_slice(digest.as_ref());
    Fingerprint(out)
}

/// Recompute the fingerprint of `data` and compare with `expected`
pub fn verify_fingerprint(data: &[u8], expected: &Fingerprint) -> bool {
    fingerprint(data) == *expected
}

/// Fast CRC32 checksum for data integrity
pub fn crc32_checksum(data: &[u8]) -> u32 {
    let mut hasher = Crc32Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

/// Verify CRC32 checksum
pub fn verify_crc32(data: &[u8], expected: u32) -> bool {
    crc32_checksum(data) == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_known_vector() {
        // SHA-256("abc")
        assert_eq!(
            fingerprint(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_fingerprint_detects_single_byte_change() {
        let data = b"This is the integrity test string. It must be guarded!".to_vec();
        let fp = fingerprint(&data);
        assert!(verify_fingerprint(&data, &fp));

        let mut tampered = data.clone();
        tampered[0] = tampered[0].wrapping_add(1);
        assert!(!verify_fingerprint(&tampered, &fp));
        assert!(!verify_fingerprint(b"", &fp));
    }

    #[test]
    fn test_checksums() {
        let data = b"test data";
        let checksum = crc32_checksum(data);
        assert!(verify_crc32(data, checksum));
        assert!(!verify_crc32(b"tampered", checksum));
    }
}
