//! CBOR encoding of entitlement snapshots.

use entitle_core::EntitlementState;

use crate::error::{Result, StoreError};

/// Encode a snapshot to CBOR bytes.
pub fn encode_snapshot(state: &EntitlementState) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(state, &mut buf)
        .map_err(|e| StoreError::Unavailable(format!("snapshot encoding failed: {}", e)))?;
    Ok(buf)
}

/// Decode a snapshot from CBOR bytes.
pub fn decode_snapshot(bytes: &[u8]) -> Result<EntitlementState> {
    ciborium::from_reader(bytes)
        .map_err(|e| StoreError::Corrupted(format!("snapshot decoding failed: {}", e)))
}
