//! # Identifier Allocation
//!
//! Per-kind monotonic sequence counters. Every record kind draws from its
//! own counter, so `entity_1` and `pattern_1` coexist. Counters only ever
//! move forward; merging into an existing record does not consume an id,
//! and deleting records (which the engine does not support individually)
//! would not recycle one. The sole reset point is a full graph clear.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::types::{RecordId, RecordKind};

/// Allocates record ids, one independent sequence per [`RecordKind`].
///
/// Serialized as part of the graph snapshot so that ids remain unique
/// across process restarts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdGenerator {
    counters: BTreeMap<RecordKind, u64>,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next id for `kind`. The first id of each kind is 1.
    pub fn next_id(&mut self, kind: RecordKind) -> RecordId {
        let counter = self.counters.entry(kind).or_insert(0);
        *counter = counter.saturating_add(1);
        RecordId::new(kind, *counter)
    }

    /// Highest sequence number allocated so far for `kind` (0 if none).
    #[must_use]
    pub fn current(&self, kind: RecordKind) -> u64 {
        self.counters.get(&kind).copied().unwrap_or(0)
    }

    /// Reset every counter to zero. Only valid alongside a full graph
    /// clear; previously issued ids must no longer be live.
    pub fn reset(&mut self) {
        self.counters.clear();
    }
}
