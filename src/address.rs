//! Content-addressed document identity.
//!
//! Document ids are the hex-encoded SHA-256 of the raw content bytes, so
//! identical content always maps to the identical id and any single-byte
//! change produces a different one. Total over every byte sequence,
//! including empty input.

use sha2::{Digest, Sha256};

/// Derive the document id for a content byte sequence.
pub fn address_of(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
