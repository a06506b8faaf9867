//! # Engine Limits
//!
//! Hardcoded bounds compiled into the engine. The graph starts empty but
//! every accepted input and every query is computationally bounded by the
//! constants below.

/// Magic bytes for the codelore snapshot format header.
///
/// File Header = Magic Bytes ("CLOR") + Version (u8) before payload.
pub const MAGIC_BYTES: &[u8; 4] = b"CLOR";

/// Current snapshot format version.
///
/// Increment this when making breaking changes to the snapshot format.
pub const FORMAT_VERSION: u8 = 1;

/// Maximum allowed payload size for a persisted snapshot.
///
/// Validated BEFORE deserialization to prevent allocation-based memory
/// exhaustion from corrupted or malicious snapshot data.
pub const MAX_SNAPSHOT_PAYLOAD_SIZE: usize = 500 * 1024 * 1024; // 500 MB

// =============================================================================
// INPUT VALIDATION LIMITS
// =============================================================================

/// Maximum length for record names (entity, pattern, convention) and for
/// relationship endpoints and type tags.
pub const MAX_NAME_LENGTH: usize = 512;

/// Maximum length for text fields: summaries, descriptions, signatures,
/// observations, and examples (64 KB).
pub const MAX_TEXT_LENGTH: usize = 65536;

/// Maximum compiled size of an entity name-pattern regex, in bytes.
///
/// The regex engine guarantees linear-time matching; this additionally
/// bounds the memory a single query pattern may occupy.
pub const MAX_REGEX_SIZE: usize = 1 << 16;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_bytes_correct() {
        assert_eq!(MAGIC_BYTES, b"CLOR");
    }

    #[test]
    fn text_limit_exceeds_name_limit() {
        assert!(MAX_TEXT_LENGTH > MAX_NAME_LENGTH);
    }
}
