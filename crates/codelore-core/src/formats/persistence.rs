//! # Snapshot Format
//!
//! Binary serialization for codelore knowledge graphs.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("CLOR")
//! - 1 byte: Version
//!
//! Pre-deserialization validation guards against corrupted or hostile
//! snapshot data: minimum size, maximum payload size, and header checks
//! all run before any payload parsing or allocation.

use crate::graph::{KnowledgeGraph, SerializableKnowledge};
use crate::limits::{FORMAT_VERSION, MAGIC_BYTES, MAX_SNAPSHOT_PAYLOAD_SIZE};
use crate::types::LoreError;

/// Minimum valid snapshot size (header only).
const MIN_SNAPSHOT_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The snapshot header precedes all graph data.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Create a new header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *MAGIC_BYTES,
            version: FORMAT_VERSION,
        }
    }

    /// Validate the header.
    pub fn validate(&self) -> Result<(), LoreError> {
        if &self.magic != MAGIC_BYTES {
            return Err(LoreError::Persistence("invalid magic bytes".to_string()));
        }
        if self.version != FORMAT_VERSION {
            return Err(LoreError::Persistence(format!(
                "unsupported snapshot version: {} (expected {})",
                self.version, FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Write header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        bytes[0..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    /// Read header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, LoreError> {
        if bytes.len() < MIN_SNAPSHOT_SIZE {
            return Err(LoreError::Persistence("header too short".to_string()));
        }
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[0..4]);
        Ok(Self {
            magic,
            version: bytes[4],
        })
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
///
/// Pure transformation, no file I/O. Identical graph state always yields
/// identical bytes.
pub fn knowledge_to_bytes(graph: &KnowledgeGraph) -> Result<Vec<u8>, LoreError> {
    let header = SnapshotHeader::new();
    let serializable = SerializableKnowledge::from(graph);

    let payload = postcard::to_stdvec(&serializable)
        .map_err(|e| LoreError::Persistence(e.to_string()))?;

    let mut result = Vec::with_capacity(MIN_SNAPSHOT_SIZE + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);

    Ok(result)
}

/// Deserialize a graph from bytes, rebuilding all indices.
///
/// Size and header validation occur BEFORE payload deserialization so a
/// corrupted length field can never trigger a huge allocation.
pub fn knowledge_from_bytes(bytes: &[u8]) -> Result<KnowledgeGraph, LoreError> {
    if bytes.len() < MIN_SNAPSHOT_SIZE {
        return Err(LoreError::Persistence(
            "snapshot too short: minimum 5 bytes required".to_string(),
        ));
    }

    if bytes.len() > MAX_SNAPSHOT_PAYLOAD_SIZE {
        return Err(LoreError::Persistence(format!(
            "snapshot size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_PAYLOAD_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = &bytes[MIN_SNAPSHOT_SIZE..];
    let serializable: SerializableKnowledge = postcard::from_bytes(payload)
        .map_err(|e| LoreError::Persistence(format!("failed to deserialize snapshot: {e}")))?;

    Ok(KnowledgeGraph::from(serializable))
}

/// Integrity checksum over snapshot bytes (FNV-1a).
///
/// Not cryptographic; exports pair the snapshot with this value so a
/// consumer can detect truncation or corruption cheaply.
#[must_use]
pub fn snapshot_checksum(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

// =============================================================================
// TESTS
// =============================================================================
