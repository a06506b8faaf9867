//! # Query Engine
//!
//! Read-only views over the knowledge graph. Queries never touch
//! persistence and never mutate; they intersect indices, apply the
//! optional name filter, and return records in creation order.

use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::graph::KnowledgeGraph;
use crate::limits::MAX_REGEX_SIZE;
use crate::types::{Entity, LoreError, Pattern, RecordId, Relationship, StyleConvention};

// =============================================================================
// QUERY PARAMETERS
// =============================================================================

/// Filters for `query_entities`. Every field is optional; an empty query
/// returns every entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityQuery {
    /// Exact match against `entity_type`.
    pub entity_type: Option<String>,
    /// Exact match against `language`.
    pub language: Option<String>,
    /// Regex searched (unanchored, case-sensitive) against `name`.
    pub name_pattern: Option<String>,
    /// Maximum result count; must be positive when given.
    pub limit: Option<i64>,
}

impl EntityQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_entity_type(mut self, entity_type: impl Into<String>) -> Self {
        self.entity_type = Some(entity_type.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    #[must_use]
    pub fn with_name_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.name_pattern = Some(pattern.into());
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Filters for the pattern and style-convention catalogs. Both filters are
/// exact matches; the catalogs are small and named precisely, so regex
/// search is deliberately not offered here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogQuery {
    pub name: Option<String>,
    pub language: Option<String>,
}

impl CatalogQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

// =============================================================================
// QUERY RESULTS
// =============================================================================

/// Which end of a relationship the queried entity occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Outgoing,
    Incoming,
}

/// A relationship annotated with its direction relative to a queried entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectedRelationship {
    pub direction: Direction,
    pub relationship: Relationship,
}

/// Full entity record plus every relationship touching it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDetails {
    pub entity: Entity,
    pub relationships: Vec<DirectedRelationship>,
}

/// Aggregate counts over the whole graph, computed by full scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub entity_count: usize,
    pub entities_by_type: BTreeMap<String, usize>,
    pub entities_by_language: BTreeMap<String, usize>,
    pub relationship_count: usize,
    pub relationships_by_type: BTreeMap<String, usize>,
    pub pattern_count: usize,
    pub convention_count: usize,
    /// Total stored observations plus convention examples.
    pub note_count: usize,
}

// =============================================================================
// QUERY EXECUTION
// =============================================================================

fn validated_limit(limit: Option<i64>) -> Result<Option<usize>, LoreError> {
    match limit {
        None => Ok(None),
        Some(n) if n <= 0 => Err(LoreError::Validation(format!(
            "limit must be positive, got {n}"
        ))),
        Some(n) => Ok(Some(n as usize)),
    }
}

impl KnowledgeGraph {
    /// Filtered entity query, ordered by creation time ascending.
    pub fn query_entities(&self, query: &EntityQuery) -> Result<Vec<Entity>, LoreError> {
        let limit = validated_limit(query.limit)?;

        let name_filter = match &query.name_pattern {
            None => None,
            Some(pattern) => Some(
                RegexBuilder::new(pattern)
                    .size_limit(MAX_REGEX_SIZE)
                    .build()
                    .map_err(|e| LoreError::Validation(format!("invalid name_pattern: {e}")))?,
            ),
        };

        // Start from the narrowest index available, then intersect.
        let mut candidates: BTreeSet<RecordId> = match &query.entity_type {
            Some(entity_type) => match self.entity_index.ids_for_type(entity_type) {
                Some(ids) => ids.clone(),
                None => return Ok(Vec::new()),
            },
            None => self.entities.keys().copied().collect(),
        };

        if let Some(language) = &query.language {
            match self.entity_index.ids_for_language(language) {
                Some(ids) => candidates = candidates.intersection(ids).copied().collect(),
                None => return Ok(Vec::new()),
            }
        }

        let mut results: Vec<Entity> = candidates
            .into_iter()
            .filter_map(|id| self.entities.get(&id))
            .filter(|entity| {
                name_filter
                    .as_ref()
                    .is_none_or(|regex| regex.is_match(&entity.name))
            })
            .cloned()
            .collect();

        results.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        if let Some(limit) = limit {
            results.truncate(limit);
        }
        Ok(results)
    }

    /// Full record for one entity plus every relationship naming it, each
    /// annotated with its direction. A self-referential relationship shows
    /// up once per direction.
    pub fn entity_details(&self, entity_name: &str) -> Result<EntityDetails, LoreError> {
        let name = entity_name.trim();
        let Some(entity) = self.entity_by_name(name) else {
            return Err(LoreError::NotFound(format!("no entity named '{name}'")));
        };

        let mut relationships = Vec::new();
        if let Some(ids) = self.relationship_index.outgoing_from(name) {
            for id in ids {
                if let Some(relationship) = self.relationships.get(id) {
                    relationships.push(DirectedRelationship {
                        direction: Direction::Outgoing,
                        relationship: relationship.clone(),
                    });
                }
            }
        }
        if let Some(ids) = self.relationship_index.incoming_to(name) {
            for id in ids {
                if let Some(relationship) = self.relationships.get(id) {
                    relationships.push(DirectedRelationship {
                        direction: Direction::Incoming,
                        relationship: relationship.clone(),
                    });
                }
            }
        }

        Ok(EntityDetails {
            entity: entity.clone(),
            relationships,
        })
    }

    /// Filtered pattern catalog, in creation order.
    #[must_use]
    pub fn query_patterns(&self, query: &CatalogQuery) -> Vec<Pattern> {
        let candidates = match &query.language {
            Some(language) => match self.pattern_index.ids_for_language(language) {
                Some(ids) => ids.clone(),
                None => return Vec::new(),
            },
            None => self.patterns.keys().copied().collect(),
        };

        let mut results: Vec<Pattern> = candidates
            .into_iter()
            .filter_map(|id| self.patterns.get(&id))
            .filter(|pattern| query.name.as_deref().is_none_or(|name| pattern.name == name))
            .cloned()
            .collect();
        results.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        results
    }

    /// Filtered style-convention catalog, in creation order.
    #[must_use]
    pub fn query_style_conventions(&self, query: &CatalogQuery) -> Vec<StyleConvention> {
        let candidates = match &query.language {
            Some(language) => match self.convention_index.ids_for_language(language) {
                Some(ids) => ids.clone(),
                None => return Vec::new(),
            },
            None => self.conventions.keys().copied().collect(),
        };

        let mut results: Vec<StyleConvention> = candidates
            .into_iter()
            .filter_map(|id| self.conventions.get(&id))
            .filter(|convention| {
                query
                    .name
                    .as_deref()
                    .is_none_or(|name| convention.name == name)
            })
            .cloned()
            .collect();
        results.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));
        results
    }

    /// Aggregate counts over the whole graph. Recomputed on every call;
    /// statistics reads are rare relative to writes.
    #[must_use]
    pub fn statistics(&self) -> KnowledgeStats {
        let mut stats = KnowledgeStats {
            entity_count: self.entities.len(),
            relationship_count: self.relationships.len(),
            pattern_count: self.patterns.len(),
            convention_count: self.conventions.len(),
            ..KnowledgeStats::default()
        };

        for entity in self.entities.values() {
            *stats
                .entities_by_type
                .entry(entity.entity_type.clone())
                .or_insert(0) += 1;
            if let Some(language) = &entity.language {
                *stats
                    .entities_by_language
                    .entry(language.clone())
                    .or_insert(0) += 1;
            }
            stats.note_count = stats.note_count.saturating_add(entity.observations.len());
        }
        for relationship in self.relationships.values() {
            *stats
                .relationships_by_type
                .entry(relationship.relationship_type.clone())
                .or_insert(0) += 1;
        }
        for convention in self.conventions.values() {
            stats.note_count = stats.note_count.saturating_add(convention.examples.len());
        }

        stats
    }
}

// =============================================================================
// TESTS
// =============================================================================
