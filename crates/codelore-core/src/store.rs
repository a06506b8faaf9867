//! # Store
//!
//! Owns a [`KnowledgeGraph`] together with its persistence backend and
//! stamps mutations with wall-clock time. This is the only place in the
//! engine that reads the clock or touches I/O; the graph itself stays
//! pure and deterministic.
//!
//! ## Write contract
//!
//! Every mutating operation flushes a full snapshot before returning
//! success. If the flush fails, the in-memory mutation is rolled back and
//! the persistence error is surfaced, so memory and durable state never
//! diverge: an operation the caller was told succeeded can always be
//! found after a restart.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::formats::persistence::{knowledge_from_bytes, knowledge_to_bytes};
use crate::graph::KnowledgeGraph;
use crate::query::{CatalogQuery, EntityDetails, EntityQuery, KnowledgeStats};
use crate::storage::SnapshotDb;
use crate::types::{
    ConventionDraft, Entity, EntityDraft, LoreError, Pattern, PatternDraft, Registration,
    RelationshipDraft, StyleConvention, Timestamp,
};

/// Current wall-clock time in epoch milliseconds.
fn now() -> Timestamp {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Timestamp::from_millis(millis)
}

// =============================================================================
// PERSISTENCE BACKENDS
// =============================================================================

/// Where snapshots go after each mutation.
pub enum Persistence {
    /// No durability; state lives only in memory.
    Ephemeral,
    /// One snapshot file, rewritten atomically (write-to-temp, rename).
    File(PathBuf),
    /// redb database; each snapshot replaces the previous in one ACID
    /// transaction.
    Database(SnapshotDb),
}

impl std::fmt::Debug for Persistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ephemeral => f.write_str("Ephemeral"),
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::Database(db) => f.debug_tuple("Database").field(db).finish(),
        }
    }
}

// =============================================================================
// STORE
// =============================================================================

/// The engine's front door: graph + persistence + clock.
#[derive(Debug)]
pub struct Store {
    graph: KnowledgeGraph,
    persistence: Persistence,
}

impl Store {
    /// Purely in-memory store, used by tests and test servers.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            graph: KnowledgeGraph::new(),
            persistence: Persistence::Ephemeral,
        }
    }

    /// Open a file-backed store.
    ///
    /// A missing file starts an empty graph; an unreadable or corrupt
    /// file is an error, never silently replaced by an empty graph.
    pub fn open_file(path: impl Into<PathBuf>) -> Result<Self, LoreError> {
        let path = path.into();
        let graph = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| {
                LoreError::Persistence(format!("cannot read {}: {e}", path.display()))
            })?;
            knowledge_from_bytes(&bytes)?
        } else {
            KnowledgeGraph::new()
        };
        Ok(Self {
            graph,
            persistence: Persistence::File(path),
        })
    }

    /// Open a redb-backed store. Same load contract as [`Store::open_file`].
    pub fn open_database(path: impl AsRef<Path>) -> Result<Self, LoreError> {
        let db = SnapshotDb::open(path)?;
        let graph = match db.load()? {
            Some(bytes) => knowledge_from_bytes(&bytes)?,
            None => KnowledgeGraph::new(),
        };
        Ok(Self {
            graph,
            persistence: Persistence::Database(db),
        })
    }

    /// Read-only view of the graph.
    #[must_use]
    pub fn graph(&self) -> &KnowledgeGraph {
        &self.graph
    }

    /// Whether this store survives a restart.
    #[must_use]
    pub fn is_durable(&self) -> bool {
        !matches!(self.persistence, Persistence::Ephemeral)
    }

    // -------------------------------------------------------------------------
    // Mutations (graph op + flush, rolled back together)
    // -------------------------------------------------------------------------

    /// Run a mutation and flush. On flush failure the pre-mutation graph
    /// is restored before the error is returned.
    fn commit<T>(
        &mut self,
        op: impl FnOnce(&mut KnowledgeGraph, Timestamp) -> Result<T, LoreError>,
    ) -> Result<T, LoreError> {
        let backup = self.graph.clone();
        let result = op(&mut self.graph, now())?;
        if let Err(e) = self.flush() {
            self.graph = backup;
            return Err(e);
        }
        Ok(result)
    }

    pub fn register_entity(&mut self, draft: EntityDraft) -> Result<Registration, LoreError> {
        self.commit(|graph, now| graph.register_entity(draft, now))
    }

    pub fn register_relationship(
        &mut self,
        draft: RelationshipDraft,
    ) -> Result<Registration, LoreError> {
        self.commit(|graph, now| graph.register_relationship(draft, now))
    }

    pub fn register_pattern(&mut self, draft: PatternDraft) -> Result<Registration, LoreError> {
        self.commit(|graph, now| graph.register_pattern(draft, now))
    }

    pub fn register_style_convention(
        &mut self,
        draft: ConventionDraft,
    ) -> Result<Registration, LoreError> {
        self.commit(|graph, now| graph.register_style_convention(draft, now))
    }

    /// Append one observation to an existing entity. Returns true if the
    /// note was stored (false when skipped as an immediate repeat).
    pub fn add_entity_observation(
        &mut self,
        entity_name: &str,
        observation: &str,
    ) -> Result<bool, LoreError> {
        self.commit(|graph, now| graph.add_entity_observation(entity_name, observation, now))
    }

    /// Empty the graph and reset id counters. Irreversible.
    pub fn clear(&mut self) -> Result<(), LoreError> {
        self.commit(|graph, _now| {
            graph.clear();
            Ok(())
        })
    }

    // -------------------------------------------------------------------------
    // Reads (never touch persistence)
    // -------------------------------------------------------------------------

    pub fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, LoreError> {
        self.graph.query_entities(query)
    }

    pub fn entity_details(&self, entity_name: &str) -> Result<EntityDetails, LoreError> {
        self.graph.entity_details(entity_name)
    }

    #[must_use]
    pub fn query_patterns(&self, query: &CatalogQuery) -> Vec<Pattern> {
        self.graph.query_patterns(query)
    }

    #[must_use]
    pub fn query_style_conventions(&self, query: &CatalogQuery) -> Vec<StyleConvention> {
        self.graph.query_style_conventions(query)
    }

    #[must_use]
    pub fn statistics(&self) -> KnowledgeStats {
        self.graph.statistics()
    }

    /// Serialize the current graph in the snapshot format (used by export
    /// and by the flush path).
    pub fn snapshot_bytes(&self) -> Result<Vec<u8>, LoreError> {
        knowledge_to_bytes(&self.graph)
    }

    fn flush(&self) -> Result<(), LoreError> {
        match &self.persistence {
            Persistence::Ephemeral => Ok(()),
            Persistence::File(path) => {
                let bytes = self.snapshot_bytes()?;
                // Write to a sibling temp file first so a crash mid-write
                // can never destroy the previous snapshot.
                let tmp = path.with_extension("tmp");
                fs::write(&tmp, &bytes).map_err(|e| {
                    LoreError::Persistence(format!("cannot write {}: {e}", tmp.display()))
                })?;
                fs::rename(&tmp, path).map_err(|e| {
                    LoreError::Persistence(format!("cannot replace {}: {e}", path.display()))
                })
            }
            Persistence::Database(db) => {
                let bytes = self.snapshot_bytes()?;
                db.save(&bytes)
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
