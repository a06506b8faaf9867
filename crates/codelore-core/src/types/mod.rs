//! # Core Type Definitions
//!
//! This module contains all record types for the codelore knowledge graph:
//! - Record identifiers (`RecordKind`, `RecordId`) and timestamps
//! - The four record kinds (`Entity`, `Relationship`, `Pattern`, `StyleConvention`)
//! - Metadata values (`MetaValue`) — a closed, tagged union
//! - Registration drafts (the caller-supplied side of a write)
//! - Error types (`LoreError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer timestamps (milliseconds since epoch, no floating-point)
//! - Implement `Ord` where needed for deterministic `BTreeMap`/`BTreeSet` use
//! - Serialize identically for identical graph state

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS & TIMESTAMPS
// =============================================================================

/// The four record kinds stored in the graph.
///
/// Each kind has its own monotonically increasing id counter, so an
/// `entity_1` and a `pattern_1` may coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Entity,
    Relationship,
    Pattern,
    StyleConvention,
}

impl RecordKind {
    /// Stable textual prefix used in the `Display` form of ids.
    #[must_use]
    pub const fn prefix(self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Relationship => "relationship",
            Self::Pattern => "pattern",
            Self::StyleConvention => "convention",
        }
    }
}

/// Unique identifier for a record, assigned by the id generator.
///
/// Ids are opaque to callers, scoped per kind, and never reused for the
/// lifetime of a graph (a full clear resets the counters explicitly).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId {
    /// The record kind this id belongs to.
    pub kind: RecordKind,
    /// Sequence number within the kind, starting at 1.
    pub seq: u64,
}

impl RecordId {
    /// Create a record id.
    #[must_use]
    pub const fn new(kind: RecordKind, seq: u64) -> Self {
        Self { kind, seq }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.kind.prefix(), self.seq)
    }
}

/// Wall-clock instant in integer milliseconds since the Unix epoch.
///
/// The engine never reads the clock itself; callers (the store, tests)
/// supply timestamps, keeping graph mutation fully deterministic.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// Create a timestamp from raw epoch milliseconds.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Raw epoch milliseconds.
    #[must_use]
    pub const fn millis(self) -> u64 {
        self.0
    }
}

// =============================================================================
// METADATA
// =============================================================================

/// An `f64` stored as its IEEE-754 bit pattern.
///
/// Floats carried in metadata are never computed with, only stored and
/// echoed back, so bit-exact identity is the right equality: it keeps
/// `Eq` (and deterministic serialization) for everything containing
/// metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloatBits(u64);

impl FloatBits {
    #[must_use]
    pub const fn from_f64(value: f64) -> Self {
        Self(value.to_bits())
    }

    #[must_use]
    pub const fn to_f64(self) -> f64 {
        f64::from_bits(self.0)
    }
}

/// A metadata value: the tagged union accepted from untyped callers.
///
/// This is a closed shape — cyclic or otherwise non-serializable values are
/// unrepresentable by construction. Conversion from loose JSON happens at
/// the transport boundary, where `null` is rejected with a validation
/// error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetaValue {
    /// UTF-8 text.
    Str(String),
    /// Signed integer.
    Int(i64),
    /// Floating-point number, kept bit-exact.
    Float(FloatBits),
    /// Boolean flag.
    Bool(bool),
    /// Ordered sequence of values.
    Seq(Vec<MetaValue>),
    /// Nested mapping with unique string keys.
    Map(BTreeMap<String, MetaValue>),
}

/// Metadata attached to a record: string keys, unique, deterministic order.
pub type Metadata = BTreeMap<String, MetaValue>;

// =============================================================================
// RECORDS
// =============================================================================

/// A named code construct (class, function, module, ...) recorded in the graph.
///
/// `name` uniquely identifies at most one live entity; registering the same
/// name again merges into the existing record instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub id: RecordId,
    /// Unique within the graph, case-sensitive, trimmed.
    pub name: String,
    /// Free-form tag such as "class" or "function".
    pub entity_type: String,
    pub summary: String,
    pub signature: Option<String>,
    pub language: Option<String>,
    /// Append-only notes; a note textually identical to the one immediately
    /// preceding it is skipped.
    pub observations: Vec<String>,
    pub metadata: Metadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A directed, typed edge between two entity names.
///
/// Endpoints need not be registered entities — dangling references are
/// permitted and resolved lazily at read time. The `(from, to, type)`
/// triple is unique; re-registration merges metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub id: RecordId,
    pub from_entity: String,
    pub to_entity: String,
    /// Free-form tag such as "calls", "inherits", "imports".
    pub relationship_type: String,
    pub metadata: Metadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A reusable, named code-design idiom, unique per `(name, language)`.
///
/// The same pattern name may exist once per language and once with no
/// language at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub example: Option<String>,
    pub metadata: Metadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// A named formatting/style rule, unique per `(name, language)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleConvention {
    pub id: RecordId,
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    /// Ordered example snippets; appended like entity observations.
    pub examples: Vec<String>,
    pub metadata: Metadata,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// =============================================================================
// DRAFTS (caller-supplied side of a write)
// =============================================================================

/// Input for `register_entity`. Optional fields left empty never erase
/// previously stored data on merge.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDraft {
    pub name: String,
    pub entity_type: String,
    pub summary: String,
    pub signature: Option<String>,
    pub language: Option<String>,
    pub observations: Vec<String>,
    pub metadata: Metadata,
}

impl EntityDraft {
    /// Draft with the required fields; the rest default to empty.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        entity_type: impl Into<String>,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            summary: summary.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    #[must_use]
    pub fn with_observations<I, S>(mut self, observations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.observations = observations.into_iter().map(Into::into).collect();
        self
    }
}

/// Input for `register_relationship`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDraft {
    pub from_entity: String,
    pub to_entity: String,
    pub relationship_type: String,
    pub metadata: Metadata,
}

impl RelationshipDraft {
    #[must_use]
    pub fn new(
        from_entity: impl Into<String>,
        to_entity: impl Into<String>,
        relationship_type: impl Into<String>,
    ) -> Self {
        Self {
            from_entity: from_entity.into(),
            to_entity: to_entity.into(),
            relationship_type: relationship_type.into(),
            metadata: Metadata::new(),
        }
    }
}

/// Input for `register_pattern`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternDraft {
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub example: Option<String>,
    pub metadata: Metadata,
}

impl PatternDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// Input for `register_style_convention`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionDraft {
    pub name: String,
    pub description: String,
    pub language: Option<String>,
    pub examples: Vec<String>,
    pub metadata: Metadata,
}

impl ConventionDraft {
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// =============================================================================
// REGISTRATION OUTCOME
// =============================================================================

/// Result of a `register_*` operation: the record's id plus whether the
/// call created a new record or merged into an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub id: RecordId,
    pub created: bool,
}

impl Registration {
    #[must_use]
    pub const fn created(id: RecordId) -> Self {
        Self { id, created: true }
    }

    #[must_use]
    pub const fn merged(id: RecordId) -> Self {
        Self { id, created: false }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors surfaced by the codelore engine.
///
/// - No silent failures: every failed operation carries a reason string
///   whose prefix names the taxonomy kind.
/// - `Validation` and `NotFound` are recoverable and leave the graph
///   untouched. `Persistence` on the write path rolls the in-memory
///   mutation back so memory and durable state never diverge.
#[derive(Debug, Error)]
pub enum LoreError {
    /// Malformed or missing required field, unrepresentable metadata, or
    /// an invalid query parameter.
    #[error("validation error: {0}")]
    Validation(String),

    /// Lookup by name failed; no mutation occurred.
    #[error("not found: {0}")]
    NotFound(String),

    /// The durable store is unreadable or unwritable.
    #[error("persistence error: {0}")]
    Persistence(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_id_display_uses_kind_prefix() {
        assert_eq!(RecordId::new(RecordKind::Entity, 1).to_string(), "entity_1");
        assert_eq!(
            RecordId::new(RecordKind::StyleConvention, 7).to_string(),
            "convention_7"
        );
    }

    #[test]
    fn record_ids_order_by_kind_then_seq() {
        let a = RecordId::new(RecordKind::Entity, 5);
        let b = RecordId::new(RecordKind::Entity, 6);
        let c = RecordId::new(RecordKind::Relationship, 0);
        assert!(a < b);
        assert!(b < c);
    }

    #[test]
    fn meta_value_nests_deterministically() {
        let mut inner = BTreeMap::new();
        inner.insert("z".to_string(), MetaValue::Int(1));
        inner.insert("a".to_string(), MetaValue::Bool(true));
        let value = MetaValue::Map(inner);

        if let MetaValue::Map(map) = &value {
            let keys: Vec<_> = map.keys().cloned().collect();
            assert_eq!(keys, vec!["a".to_string(), "z".to_string()]);
        } else {
            unreachable!("constructed a map");
        }
    }

    #[test]
    fn float_bits_round_trip_bit_exact() {
        let bits = FloatBits::from_f64(0.95);
        assert_eq!(bits.to_f64(), 0.95);
        assert_eq!(bits, FloatBits::from_f64(0.95));
        assert_ne!(bits, FloatBits::from_f64(0.96));
        assert_eq!(
            MetaValue::Float(bits),
            MetaValue::Float(FloatBits::from_f64(0.95))
        );
    }

    #[test]
    fn registration_flags() {
        let id = RecordId::new(RecordKind::Pattern, 3);
        assert!(Registration::created(id).created);
        assert!(!Registration::merged(id).created);
        assert_eq!(Registration::merged(id).id, id);
    }
}
