//! # codelore-core
//!
//! The deterministic knowledge-graph engine for codelore - THE LOGIC.
//!
//! This crate records what an external analyzer (typically an LLM reading
//! a codebase) has learned: named entities, relationships between them,
//! recurring design patterns, and style conventions. Writes merge into
//! existing records instead of duplicating; reads filter via indices and
//! return records in creation order.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Is the ONLY place where graph state exists (stateful)
//! - Is deterministic: `BTreeMap` everywhere, no floats, no clocks inside
//!   the graph (the store stamps mutations)
//! - Does no I/O outside `store` and `storage`; the transports live in
//!   the app crates
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod formats;
pub mod graph;
pub mod ids;
pub mod index;
pub mod limits;
pub mod merge;
pub mod query;
pub mod storage;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    ConventionDraft, Entity, EntityDraft, FloatBits, LoreError, MetaValue, Metadata, Pattern,
    PatternDraft, RecordId, RecordKind, Registration, Relationship, RelationshipDraft,
    StyleConvention, Timestamp,
};

// =============================================================================
// RE-EXPORTS: Graph Engine
// =============================================================================

pub use graph::{KnowledgeGraph, SerializableKnowledge};
pub use ids::IdGenerator;
pub use query::{
    CatalogQuery, DirectedRelationship, Direction, EntityDetails, EntityQuery, KnowledgeStats,
};
pub use storage::SnapshotDb;
pub use store::{Persistence, Store};

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{SnapshotHeader, knowledge_from_bytes, knowledge_to_bytes, snapshot_checksum};
