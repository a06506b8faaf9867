//! # Knowledge Graph
//!
//! The deterministic record store at the heart of codelore.
//!
//! Primary state is four `BTreeMap`s keyed by [`RecordId`] plus the id
//! generator. Everything else (uniqueness and filter indices) is derived
//! and rebuilt on load. All data structures use `BTreeMap` for
//! deterministic ordering. No `HashMap` allowed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::IdGenerator;
use crate::index::{CatalogIndex, EntityIndex, RelationshipIndex};
use crate::types::{Entity, Pattern, RecordId, Relationship, StyleConvention};

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The in-memory knowledge graph.
///
/// Mutation entry points (`register_*`, `add_entity_observation`, `clear`)
/// live in the `merge` module; queries live in the `query` module. This
/// struct owns the state both operate on.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KnowledgeGraph {
    pub(crate) entities: BTreeMap<RecordId, Entity>,
    pub(crate) relationships: BTreeMap<RecordId, Relationship>,
    pub(crate) patterns: BTreeMap<RecordId, Pattern>,
    pub(crate) conventions: BTreeMap<RecordId, StyleConvention>,

    pub(crate) ids: IdGenerator,

    // Derived state, never serialized.
    pub(crate) entity_index: EntityIndex,
    pub(crate) relationship_index: RelationshipIndex,
    pub(crate) pattern_index: CatalogIndex,
    pub(crate) convention_index: CatalogIndex,
}

impl KnowledgeGraph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Entities in deterministic (id) order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Relationships in deterministic (id) order.
    pub fn relationships(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.values()
    }

    /// Patterns in deterministic (id) order.
    pub fn patterns(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.values()
    }

    /// Style conventions in deterministic (id) order.
    pub fn conventions(&self) -> impl Iterator<Item = &StyleConvention> {
        self.conventions.values()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn relationship_count(&self) -> usize {
        self.relationships.len()
    }

    #[must_use]
    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn convention_count(&self) -> usize {
        self.conventions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.relationships.is_empty()
            && self.patterns.is_empty()
            && self.conventions.is_empty()
    }

    /// Look up an entity by exact name.
    #[must_use]
    pub fn entity_by_name(&self, name: &str) -> Option<&Entity> {
        let id = self.entity_index.id_for_name(name)?;
        self.entities.get(&id)
    }

    /// Remove every record and reset all id counters.
    ///
    /// After a clear the next registered entity receives `entity_1` again.
    /// This is the only operation that ever reuses an id.
    pub fn clear(&mut self) {
        self.entities.clear();
        self.relationships.clear();
        self.patterns.clear();
        self.conventions.clear();
        self.ids.reset();
        self.entity_index.clear();
        self.relationship_index.clear();
        self.pattern_index.clear();
        self.convention_index.clear();
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// Serializable representation of the graph for persistence.
///
/// Only primary state is stored; indices are reconstructed on load so a
/// snapshot can never carry inconsistent derived state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableKnowledge {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
    pub patterns: Vec<Pattern>,
    pub conventions: Vec<StyleConvention>,
    pub ids: IdGenerator,
}

impl From<&KnowledgeGraph> for SerializableKnowledge {
    fn from(graph: &KnowledgeGraph) -> Self {
        Self {
            entities: graph.entities.values().cloned().collect(),
            relationships: graph.relationships.values().cloned().collect(),
            patterns: graph.patterns.values().cloned().collect(),
            conventions: graph.conventions.values().cloned().collect(),
            ids: graph.ids.clone(),
        }
    }
}

impl From<SerializableKnowledge> for KnowledgeGraph {
    fn from(sk: SerializableKnowledge) -> Self {
        let mut graph = Self {
            ids: sk.ids,
            ..Self::default()
        };

        for entity in sk.entities {
            graph.entity_index.insert(&entity);
            graph.entities.insert(entity.id, entity);
        }
        for relationship in sk.relationships {
            graph.relationship_index.insert(&relationship);
            graph.relationships.insert(relationship.id, relationship);
        }
        for pattern in sk.patterns {
            graph.pattern_index.insert_pattern(&pattern);
            graph.patterns.insert(pattern.id, pattern);
        }
        for convention in sk.conventions {
            graph.convention_index.insert_convention(&convention);
            graph.conventions.insert(convention.id, convention);
        }

        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        ConventionDraft, EntityDraft, PatternDraft, RecordKind, RelationshipDraft, Timestamp,
    };

    fn populated() -> KnowledgeGraph {
        let now = Timestamp::from_millis(1_000);
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(EntityDraft::new("Lexer", "class", "tokenizes input"), now)
            .expect("entity");
        graph
            .register_entity(EntityDraft::new("Parser", "class", "builds the tree"), now)
            .expect("entity");
        graph
            .register_relationship(RelationshipDraft::new("Parser", "Lexer", "uses"), now)
            .expect("relationship");
        graph
            .register_pattern(PatternDraft::new("visitor", "double dispatch"), now)
            .expect("pattern");
        graph
            .register_style_convention(ConventionDraft::new("snake_case", "for functions"), now)
            .expect("convention");
        graph
    }

    #[test]
    fn counts_reflect_registrations() {
        let graph = populated();
        assert_eq!(graph.entity_count(), 2);
        assert_eq!(graph.relationship_count(), 1);
        assert_eq!(graph.pattern_count(), 1);
        assert_eq!(graph.convention_count(), 1);
        assert!(!graph.is_empty());
    }

    #[test]
    fn clear_empties_graph_and_restarts_ids() {
        let mut graph = populated();
        graph.clear();

        assert!(graph.is_empty());
        assert!(graph.entity_by_name("Lexer").is_none());

        let registration = graph
            .register_entity(
                EntityDraft::new("Lexer", "class", "tokenizes input"),
                Timestamp::from_millis(2_000),
            )
            .expect("entity");
        assert_eq!(registration.id, RecordId::new(RecordKind::Entity, 1));
    }

    #[test]
    fn serialization_roundtrip_preserves_state_and_indices() {
        let graph = populated();

        let serializable = SerializableKnowledge::from(&graph);
        let restored = KnowledgeGraph::from(serializable);

        assert_eq!(restored, graph);
        assert!(restored.entity_by_name("Parser").is_some());

        // Counters survive, so new ids continue after the old ones.
        let mut restored = restored;
        let registration = restored
            .register_entity(
                EntityDraft::new("Emitter", "class", "writes output"),
                Timestamp::from_millis(3_000),
            )
            .expect("entity");
        assert_eq!(registration.id, RecordId::new(RecordKind::Entity, 3));
    }
}
