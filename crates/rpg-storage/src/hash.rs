//! Content fingerprint of a planning document.

use rpg_core::{canonical_json, content_value, RpgDocument};

use crate::error::StorageError;

/// Hex characters kept from the blake3 digest.
pub const FINGERPRINT_LEN: usize = 16;

/// Hashes the canonical content of `doc`.
///
/// Bookkeeping (`rev`, cached layout and plan) is excluded, so two documents
/// with the same nodes, ports and edges hash equal regardless of how they were
/// built or how often they were saved.
pub fn content_hash(doc: &RpgDocument) -> Result<String, StorageError> {
    let value = content_value(doc)?;
    let digest = blake3::hash(canonical_json(&value).as_bytes());
    Ok(digest.to_hex().as_str()[..FINGERPRINT_LEN].to_string())
}
