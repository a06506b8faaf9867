//! # Merge Engine
//!
//! Create-or-merge write path for all four record kinds.
//!
//! Every write is keyed: entities by name, relationships by the
//! (from, to, type) triple, patterns and conventions by (name, language).
//! A key match updates the existing record in place; a miss allocates a
//! fresh id. The merge contract is "update without loss": an empty or
//! omitted field in the incoming draft never erases previously stored
//! data, while a non-empty incoming value always wins.

use crate::graph::KnowledgeGraph;
use crate::limits::{MAX_NAME_LENGTH, MAX_TEXT_LENGTH};
use crate::types::{
    ConventionDraft, Entity, EntityDraft, LoreError, Pattern, PatternDraft, RecordKind,
    Registration, Relationship, RelationshipDraft, StyleConvention, Timestamp,
};

// =============================================================================
// FIELD VALIDATION
// =============================================================================

/// Trim and validate a required name-like field (record names, relationship
/// endpoints and type tags).
fn required_name(field: &'static str, value: &str) -> Result<String, LoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LoreError::Validation(format!("{field} must not be empty")));
    }
    if trimmed.len() > MAX_NAME_LENGTH {
        return Err(LoreError::Validation(format!(
            "{field} exceeds {MAX_NAME_LENGTH} bytes"
        )));
    }
    Ok(trimmed.to_owned())
}

/// Validate a free text field. May be empty; bounded in size.
fn bounded_text(field: &'static str, value: &str) -> Result<String, LoreError> {
    if value.len() > MAX_TEXT_LENGTH {
        return Err(LoreError::Validation(format!(
            "{field} exceeds {MAX_TEXT_LENGTH} bytes"
        )));
    }
    Ok(value.trim().to_owned())
}

/// Normalize an optional field: trimmed, with empty collapsing to `None`
/// so that `Some("")` and an omitted field behave identically on merge.
fn optional_text(
    field: &'static str,
    value: Option<String>,
) -> Result<Option<String>, LoreError> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let trimmed = bounded_text(field, &raw)?;
            Ok(if trimmed.is_empty() { None } else { Some(trimmed) })
        }
    }
}

fn bounded_notes(field: &'static str, notes: Vec<String>) -> Result<Vec<String>, LoreError> {
    for note in &notes {
        if note.len() > MAX_TEXT_LENGTH {
            return Err(LoreError::Validation(format!(
                "{field} entry exceeds {MAX_TEXT_LENGTH} bytes"
            )));
        }
    }
    Ok(notes)
}

/// Overwrite `target` only when the incoming value is non-empty.
fn merge_text(target: &mut String, incoming: String) {
    if !incoming.is_empty() {
        *target = incoming;
    }
}

fn merge_optional(target: &mut Option<String>, incoming: Option<String>) {
    if incoming.is_some() {
        *target = incoming;
    }
}

/// Append notes in order, skipping any note textually identical to the one
/// currently last in the sequence. Returns true if anything was appended.
fn append_deduped(target: &mut Vec<String>, incoming: Vec<String>) -> bool {
    let mut appended = false;
    for note in incoming {
        if target.last().map(String::as_str) == Some(note.as_str()) {
            continue;
        }
        target.push(note);
        appended = true;
    }
    appended
}

// =============================================================================
// REGISTRATION
// =============================================================================

impl KnowledgeGraph {
    /// Register an entity: create it, or merge into the entity already
    /// holding the same name.
    pub fn register_entity(
        &mut self,
        draft: EntityDraft,
        now: Timestamp,
    ) -> Result<Registration, LoreError> {
        let name = required_name("name", &draft.name)?;
        let entity_type = bounded_text("entity_type", &draft.entity_type)?;
        let summary = bounded_text("summary", &draft.summary)?;
        let signature = optional_text("signature", draft.signature)?;
        let language = optional_text("language", draft.language)?;
        let observations = bounded_notes("observations", draft.observations)?;

        if let Some(id) = self.entity_index.id_for_name(&name) {
            let Some(existing) = self.entities.get_mut(&id) else {
                return Err(LoreError::NotFound(format!(
                    "entity index references missing record {id}"
                )));
            };

            // Type and language groupings may change; re-index around the
            // mutation so indices never disagree with the record.
            let before = existing.clone();
            merge_text(&mut existing.entity_type, entity_type);
            merge_text(&mut existing.summary, summary);
            merge_optional(&mut existing.signature, signature);
            merge_optional(&mut existing.language, language);
            append_deduped(&mut existing.observations, observations);
            existing.metadata.extend(draft.metadata);
            existing.updated_at = now;

            let after = existing.clone();
            self.entity_index.remove(&before);
            self.entity_index.insert(&after);
            return Ok(Registration::merged(id));
        }

        let id = self.ids.next_id(RecordKind::Entity);
        let entity = Entity {
            id,
            name,
            entity_type,
            summary,
            signature,
            language,
            observations,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        self.entity_index.insert(&entity);
        self.entities.insert(id, entity);
        Ok(Registration::created(id))
    }

    /// Register a relationship keyed on the (from, to, type) triple.
    ///
    /// Endpoints are not required to name registered entities.
    pub fn register_relationship(
        &mut self,
        draft: RelationshipDraft,
        now: Timestamp,
    ) -> Result<Registration, LoreError> {
        let from_entity = required_name("from_entity", &draft.from_entity)?;
        let to_entity = required_name("to_entity", &draft.to_entity)?;
        let relationship_type = required_name("relationship_type", &draft.relationship_type)?;

        if let Some(id) =
            self.relationship_index
                .id_for_triple(&from_entity, &to_entity, &relationship_type)
        {
            let Some(existing) = self.relationships.get_mut(&id) else {
                return Err(LoreError::NotFound(format!(
                    "relationship index references missing record {id}"
                )));
            };
            existing.metadata.extend(draft.metadata);
            existing.updated_at = now;
            return Ok(Registration::merged(id));
        }

        let id = self.ids.next_id(RecordKind::Relationship);
        let relationship = Relationship {
            id,
            from_entity,
            to_entity,
            relationship_type,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        self.relationship_index.insert(&relationship);
        self.relationships.insert(id, relationship);
        Ok(Registration::created(id))
    }

    /// Register a pattern keyed on (name, language).
    pub fn register_pattern(
        &mut self,
        draft: PatternDraft,
        now: Timestamp,
    ) -> Result<Registration, LoreError> {
        let name = required_name("name", &draft.name)?;
        let description = bounded_text("description", &draft.description)?;
        let language = optional_text("language", draft.language)?;
        let example = optional_text("example", draft.example)?;

        if let Some(id) = self.pattern_index.id_for(&name, language.as_deref()) {
            let Some(existing) = self.patterns.get_mut(&id) else {
                return Err(LoreError::NotFound(format!(
                    "pattern index references missing record {id}"
                )));
            };
            merge_text(&mut existing.description, description);
            merge_optional(&mut existing.example, example);
            existing.metadata.extend(draft.metadata);
            existing.updated_at = now;
            return Ok(Registration::merged(id));
        }

        let id = self.ids.next_id(RecordKind::Pattern);
        let pattern = Pattern {
            id,
            name,
            description,
            language,
            example,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        self.pattern_index.insert_pattern(&pattern);
        self.patterns.insert(id, pattern);
        Ok(Registration::created(id))
    }

    /// Register a style convention keyed on (name, language). Examples
    /// append like entity observations.
    pub fn register_style_convention(
        &mut self,
        draft: ConventionDraft,
        now: Timestamp,
    ) -> Result<Registration, LoreError> {
        let name = required_name("name", &draft.name)?;
        let description = bounded_text("description", &draft.description)?;
        let language = optional_text("language", draft.language)?;
        let examples = bounded_notes("examples", draft.examples)?;

        if let Some(id) = self.convention_index.id_for(&name, language.as_deref()) {
            let Some(existing) = self.conventions.get_mut(&id) else {
                return Err(LoreError::NotFound(format!(
                    "convention index references missing record {id}"
                )));
            };
            merge_text(&mut existing.description, description);
            append_deduped(&mut existing.examples, examples);
            existing.metadata.extend(draft.metadata);
            existing.updated_at = now;
            return Ok(Registration::merged(id));
        }

        let id = self.ids.next_id(RecordKind::StyleConvention);
        let convention = StyleConvention {
            id,
            name,
            description,
            language,
            examples,
            metadata: draft.metadata,
            created_at: now,
            updated_at: now,
        };
        self.convention_index.insert_convention(&convention);
        self.conventions.insert(id, convention);
        Ok(Registration::created(id))
    }

    /// Append one observation to an existing entity.
    ///
    /// Never creates the entity implicitly. The note is stored exactly as
    /// supplied, like observations arriving through `register_entity`.
    /// Returns true if the note was stored, false if it was skipped as
    /// identical to the current last note; `updated_at` advances only
    /// when the note is stored.
    pub fn add_entity_observation(
        &mut self,
        entity_name: &str,
        observation: &str,
        now: Timestamp,
    ) -> Result<bool, LoreError> {
        let name = required_name("entity_name", entity_name)?;
        let notes = bounded_notes("observation", vec![observation.to_owned()])?;

        let Some(id) = self.entity_index.id_for_name(&name) else {
            return Err(LoreError::NotFound(format!("no entity named '{name}'")));
        };
        let Some(entity) = self.entities.get_mut(&id) else {
            return Err(LoreError::NotFound(format!(
                "entity index references missing record {id}"
            )));
        };

        let appended = append_deduped(&mut entity.observations, notes);
        if appended {
            entity.updated_at = now;
        }
        Ok(appended)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MetaValue;

    const T1: Timestamp = Timestamp::from_millis(1_000);
    const T2: Timestamp = Timestamp::from_millis(2_000);

    #[test]
    fn entity_name_is_trimmed_and_required() {
        let mut graph = KnowledgeGraph::new();

        let err = graph.register_entity(EntityDraft::new("   ", "class", "x"), T1);
        assert!(matches!(err, Err(LoreError::Validation(_))));

        graph
            .register_entity(EntityDraft::new("  Lexer  ", "class", "x"), T1)
            .expect("register");
        assert!(graph.entity_by_name("Lexer").is_some());
    }

    #[test]
    fn reregistration_merges_instead_of_duplicating() {
        let mut graph = KnowledgeGraph::new();
        let first = graph
            .register_entity(
                EntityDraft::new("parse", "function", "parses input").with_language("rust"),
                T1,
            )
            .expect("register");
        assert!(first.created);

        let second = graph
            .register_entity(
                EntityDraft::new("parse", "function", "parses tokens into a tree"),
                T2,
            )
            .expect("register");
        assert!(!second.created);
        assert_eq!(second.id, first.id);
        assert_eq!(graph.entity_count(), 1);

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.summary, "parses tokens into a tree");
        assert_eq!(entity.created_at, T1);
        assert_eq!(entity.updated_at, T2);
    }

    #[test]
    fn empty_update_fields_never_erase_data() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(
                EntityDraft::new("parse", "function", "parses input")
                    .with_language("rust")
                    .with_signature("fn parse(input: &str) -> Ast"),
                T1,
            )
            .expect("register");

        let mut update = EntityDraft::new("parse", "", "");
        update.signature = Some("   ".to_owned());
        graph.register_entity(update, T2).expect("merge");

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.entity_type, "function");
        assert_eq!(entity.summary, "parses input");
        assert_eq!(entity.signature.as_deref(), Some("fn parse(input: &str) -> Ast"));
        assert_eq!(entity.language.as_deref(), Some("rust"));
    }

    #[test]
    fn merge_reindexes_changed_type_and_language() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(
                EntityDraft::new("parse", "function", "x").with_language("python"),
                T1,
            )
            .expect("register");
        graph
            .register_entity(
                EntityDraft::new("parse", "method", "x").with_language("rust"),
                T2,
            )
            .expect("merge");

        assert!(graph.entity_index.ids_for_type("function").is_none());
        assert!(graph.entity_index.ids_for_type("method").is_some());
        assert!(graph.entity_index.ids_for_language("python").is_none());
        assert!(graph.entity_index.ids_for_language("rust").is_some());
    }

    #[test]
    fn observations_dedup_against_immediately_preceding_only() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(
                EntityDraft::new("parse", "function", "x")
                    .with_observations(["slow", "slow", "fast", "slow"]),
                T1,
            )
            .expect("register");

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.observations, vec!["slow", "fast", "slow"]);
    }

    #[test]
    fn observations_keep_supplied_whitespace_on_both_write_paths() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(
                EntityDraft::new("parse", "function", "x").with_observations([" slow "]),
                T1,
            )
            .expect("register");

        // The same raw note arriving through the append path must dedup
        // against what the register path stored.
        assert!(!graph.add_entity_observation("parse", " slow ", T2).expect("append"));

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.observations, vec![" slow "]);
        assert_eq!(entity.updated_at, T1);
    }

    #[test]
    fn metadata_merges_key_by_key() {
        let mut graph = KnowledgeGraph::new();
        let mut draft = EntityDraft::new("parse", "function", "x");
        draft.metadata.insert("file".to_owned(), MetaValue::Str("lib.rs".to_owned()));
        draft.metadata.insert("line".to_owned(), MetaValue::Int(10));
        graph.register_entity(draft, T1).expect("register");

        let mut update = EntityDraft::new("parse", "function", "x");
        update.metadata.insert("line".to_owned(), MetaValue::Int(42));
        update.metadata.insert("public".to_owned(), MetaValue::Bool(true));
        graph.register_entity(update, T2).expect("merge");

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.metadata.get("file"), Some(&MetaValue::Str("lib.rs".to_owned())));
        assert_eq!(entity.metadata.get("line"), Some(&MetaValue::Int(42)));
        assert_eq!(entity.metadata.get("public"), Some(&MetaValue::Bool(true)));
    }

    #[test]
    fn relationship_triple_is_unique() {
        let mut graph = KnowledgeGraph::new();
        let first = graph
            .register_relationship(RelationshipDraft::new("Parser", "Lexer", "uses"), T1)
            .expect("register");
        let dup = graph
            .register_relationship(RelationshipDraft::new("Parser", "Lexer", "uses"), T2)
            .expect("register");
        let other = graph
            .register_relationship(RelationshipDraft::new("Parser", "Lexer", "wraps"), T2)
            .expect("register");

        assert!(first.created);
        assert!(!dup.created);
        assert_eq!(dup.id, first.id);
        assert!(other.created);
        assert_eq!(graph.relationship_count(), 2);
    }

    #[test]
    fn relationship_endpoints_may_dangle() {
        let mut graph = KnowledgeGraph::new();
        let registration = graph
            .register_relationship(RelationshipDraft::new("Ghost", "Phantom", "haunts"), T1)
            .expect("register");
        assert!(registration.created);
        assert_eq!(graph.entity_count(), 0);
    }

    #[test]
    fn patterns_are_unique_per_name_and_language() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_pattern(PatternDraft::new("Singleton", "one instance").with_language("python"), T1)
            .expect("register");
        graph
            .register_pattern(PatternDraft::new("Singleton", "one instance").with_language("go"), T1)
            .expect("register");
        let merged = graph
            .register_pattern(PatternDraft::new("Singleton", "exactly one").with_language("go"), T2)
            .expect("register");

        assert!(!merged.created);
        assert_eq!(graph.pattern_count(), 2);
    }

    #[test]
    fn convention_examples_append_like_observations() {
        let mut graph = KnowledgeGraph::new();
        let mut draft = ConventionDraft::new("snake_case", "for functions");
        draft.examples = vec!["fn read_file()".to_owned()];
        graph.register_style_convention(draft, T1).expect("register");

        let mut update = ConventionDraft::new("snake_case", "");
        update.examples = vec!["fn read_file()".to_owned(), "fn parse_args()".to_owned()];
        graph.register_style_convention(update, T2).expect("merge");

        let convention = graph.conventions().next().expect("convention");
        assert_eq!(convention.examples, vec!["fn read_file()", "fn parse_args()"]);
        assert_eq!(convention.description, "for functions");
    }

    #[test]
    fn observation_append_requires_existing_entity() {
        let mut graph = KnowledgeGraph::new();
        let err = graph.add_entity_observation("ghost", "boo", T1);
        assert!(matches!(err, Err(LoreError::NotFound(_))));
        assert_eq!(graph.entity_count(), 0);
    }

    #[test]
    fn observation_append_skips_repeat_and_keeps_updated_at() {
        let mut graph = KnowledgeGraph::new();
        graph
            .register_entity(EntityDraft::new("parse", "function", "x"), T1)
            .expect("register");

        assert!(graph.add_entity_observation("parse", "slow on unicode", T1).expect("append"));
        assert!(!graph.add_entity_observation("parse", "slow on unicode", T2).expect("append"));

        let entity = graph.entity_by_name("parse").expect("entity");
        assert_eq!(entity.observations.len(), 1);
        assert_eq!(entity.updated_at, T1);
    }
}
