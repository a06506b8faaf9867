//! # Secondary Indices
//!
//! Lookup structures maintained alongside the primary record maps. Indices
//! are derived state: they are never serialized and are rebuilt in full
//! when a snapshot is loaded. All of them are plain BTree structures so
//! iteration order is deterministic.

use std::collections::{BTreeMap, BTreeSet};

use crate::types::{Entity, Pattern, RecordId, Relationship, StyleConvention};

// =============================================================================
// ENTITY INDEX
// =============================================================================

/// Indices over the entity map: unique name lookup plus type and language
/// groupings used by filtered queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIndex {
    by_name: BTreeMap<String, RecordId>,
    by_type: BTreeMap<String, BTreeSet<RecordId>>,
    by_language: BTreeMap<String, BTreeSet<RecordId>>,
}

impl EntityIndex {
    pub fn insert(&mut self, entity: &Entity) {
        self.by_name.insert(entity.name.clone(), entity.id);
        self.by_type
            .entry(entity.entity_type.clone())
            .or_default()
            .insert(entity.id);
        if let Some(language) = &entity.language {
            self.by_language
                .entry(language.clone())
                .or_default()
                .insert(entity.id);
        }
    }

    /// Drop the groupings derived from `entity`'s mutable fields. Called
    /// before a merge rewrites those fields, then `insert` restores them.
    pub fn remove(&mut self, entity: &Entity) {
        self.by_name.remove(&entity.name);
        if let Some(ids) = self.by_type.get_mut(&entity.entity_type) {
            ids.remove(&entity.id);
            if ids.is_empty() {
                self.by_type.remove(&entity.entity_type);
            }
        }
        if let Some(language) = &entity.language {
            if let Some(ids) = self.by_language.get_mut(language) {
                ids.remove(&entity.id);
                if ids.is_empty() {
                    self.by_language.remove(language);
                }
            }
        }
    }

    #[must_use]
    pub fn id_for_name(&self, name: &str) -> Option<RecordId> {
        self.by_name.get(name).copied()
    }

    #[must_use]
    pub fn ids_for_type(&self, entity_type: &str) -> Option<&BTreeSet<RecordId>> {
        self.by_type.get(entity_type)
    }

    #[must_use]
    pub fn ids_for_language(&self, language: &str) -> Option<&BTreeSet<RecordId>> {
        self.by_language.get(language)
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
        self.by_type.clear();
        self.by_language.clear();
    }
}

// =============================================================================
// RELATIONSHIP INDEX
// =============================================================================

/// Key for relationship uniqueness: (from, to, type).
pub type RelationshipKey = (String, String, String);

/// Indices over the relationship map: the uniqueness triple plus adjacency
/// by endpoint name. Endpoints are names, not ids, since relationships may
/// reference entities that were never registered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationshipIndex {
    by_triple: BTreeMap<RelationshipKey, RecordId>,
    outgoing: BTreeMap<String, BTreeSet<RecordId>>,
    incoming: BTreeMap<String, BTreeSet<RecordId>>,
}

impl RelationshipIndex {
    pub fn insert(&mut self, relationship: &Relationship) {
        self.by_triple.insert(
            (
                relationship.from_entity.clone(),
                relationship.to_entity.clone(),
                relationship.relationship_type.clone(),
            ),
            relationship.id,
        );
        self.outgoing
            .entry(relationship.from_entity.clone())
            .or_default()
            .insert(relationship.id);
        self.incoming
            .entry(relationship.to_entity.clone())
            .or_default()
            .insert(relationship.id);
    }

    #[must_use]
    pub fn id_for_triple(&self, from: &str, to: &str, relationship_type: &str) -> Option<RecordId> {
        self.by_triple
            .get(&(from.to_owned(), to.to_owned(), relationship_type.to_owned()))
            .copied()
    }

    #[must_use]
    pub fn outgoing_from(&self, name: &str) -> Option<&BTreeSet<RecordId>> {
        self.outgoing.get(name)
    }

    #[must_use]
    pub fn incoming_to(&self, name: &str) -> Option<&BTreeSet<RecordId>> {
        self.incoming.get(name)
    }

    pub fn clear(&mut self) {
        self.by_triple.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }
}

// =============================================================================
// CATALOG INDEX
// =============================================================================

/// Key for pattern and convention uniqueness: (name, language). A record
/// with no language occupies the `None` slot for its name.
pub type CatalogKey = (String, Option<String>);

/// Shared index shape for the two catalog collections (patterns and style
/// conventions), which have identical uniqueness and filter semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogIndex {
    by_key: BTreeMap<CatalogKey, RecordId>,
    by_language: BTreeMap<String, BTreeSet<RecordId>>,
}

impl CatalogIndex {
    pub fn insert_pattern(&mut self, pattern: &Pattern) {
        self.insert_key(&pattern.name, pattern.language.as_deref(), pattern.id);
    }

    pub fn insert_convention(&mut self, convention: &StyleConvention) {
        self.insert_key(&convention.name, convention.language.as_deref(), convention.id);
    }

    fn insert_key(&mut self, name: &str, language: Option<&str>, id: RecordId) {
        self.by_key
            .insert((name.to_owned(), language.map(str::to_owned)), id);
        if let Some(language) = language {
            self.by_language
                .entry(language.to_owned())
                .or_default()
                .insert(id);
        }
    }

    #[must_use]
    pub fn id_for(&self, name: &str, language: Option<&str>) -> Option<RecordId> {
        self.by_key
            .get(&(name.to_owned(), language.map(str::to_owned)))
            .copied()
    }

    #[must_use]
    pub fn ids_for_language(&self, language: &str) -> Option<&BTreeSet<RecordId>> {
        self.by_language.get(language)
    }

    pub fn clear(&mut self) {
        self.by_key.clear();
        self.by_language.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Metadata, RecordKind, Timestamp};

    fn entity(seq: u64, name: &str, entity_type: &str, language: Option<&str>) -> Entity {
        Entity {
            id: RecordId::new(RecordKind::Entity, seq),
            name: name.to_owned(),
            entity_type: entity_type.to_owned(),
            summary: "summary".to_owned(),
            signature: None,
            language: language.map(str::to_owned),
            observations: Vec::new(),
            metadata: Metadata::new(),
            created_at: Timestamp::from_millis(1),
            updated_at: Timestamp::from_millis(1),
        }
    }

    #[test]
    fn entity_index_groups_by_type_and_language() {
        let mut index = EntityIndex::default();
        index.insert(&entity(1, "parse", "function", Some("rust")));
        index.insert(&entity(2, "Lexer", "class", Some("rust")));
        index.insert(&entity(3, "main", "function", None));

        assert_eq!(index.ids_for_type("function").map(BTreeSet::len), Some(2));
        assert_eq!(index.ids_for_language("rust").map(BTreeSet::len), Some(2));
        assert!(index.ids_for_language("go").is_none());
    }

    #[test]
    fn entity_index_remove_drops_empty_groups() {
        let mut index = EntityIndex::default();
        let e = entity(1, "parse", "function", Some("rust"));
        index.insert(&e);
        index.remove(&e);

        assert!(index.id_for_name("parse").is_none());
        assert!(index.ids_for_type("function").is_none());
        assert!(index.ids_for_language("rust").is_none());
    }

    #[test]
    fn catalog_index_distinguishes_language_variants() {
        let mut index = CatalogIndex::default();
        index.insert_key("builder", Some("rust"), RecordId::new(RecordKind::Pattern, 1));
        index.insert_key("builder", None, RecordId::new(RecordKind::Pattern, 2));

        assert!(index.id_for("builder", Some("rust")).is_some());
        assert!(index.id_for("builder", None).is_some());
        assert_ne!(
            index.id_for("builder", Some("rust")),
            index.id_for("builder", None)
        );
    }
}
