//! # Engine Contract Tests
//!
//! End-to-end checks of the documented write/read/persistence behavior,
//! exercised through the public `Store` API the app layer uses.

use codelore_core::{
    CatalogQuery, Direction, EntityDraft, EntityQuery, LoreError, PatternDraft, RelationshipDraft,
    Store,
};

#[test]
fn idempotent_merge_keeps_one_record() {
    let mut store = Store::in_memory();
    let draft = EntityDraft::new("parse", "function", "parses input")
        .with_language("rust")
        .with_signature("fn parse(input: &str) -> Ast");

    let first = store.register_entity(draft.clone()).expect("register");
    let second = store.register_entity(draft).expect("register");

    assert!(first.created);
    assert!(!second.created);
    assert_eq!(first.id, second.id);
    assert_eq!(store.graph().entity_count(), 1);
}

#[test]
fn partial_update_preserves_omitted_fields() {
    let mut store = Store::in_memory();
    store
        .register_entity(
            EntityDraft::new("parse", "function", "parses input")
                .with_language("rust")
                .with_signature("fn parse(input: &str) -> Ast"),
        )
        .expect("register");

    // Update carrying only a new summary
    store
        .register_entity(EntityDraft::new("parse", "", "parses tokens"))
        .expect("merge");

    let details = store.entity_details("parse").expect("details");
    assert_eq!(details.entity.summary, "parses tokens");
    assert_eq!(details.entity.language.as_deref(), Some("rust"));
    assert_eq!(
        details.entity.signature.as_deref(),
        Some("fn parse(input: &str) -> Ast")
    );
}

#[test]
fn repeated_observation_is_stored_once() {
    let mut store = Store::in_memory();
    store
        .register_entity(EntityDraft::new("parse", "function", "x"))
        .expect("register");

    assert!(store
        .add_entity_observation("parse", "slow on unicode")
        .expect("append"));
    assert!(!store
        .add_entity_observation("parse", "slow on unicode")
        .expect("append"));
    assert!(store
        .add_entity_observation("parse", "fixed in v2")
        .expect("append"));

    let details = store.entity_details("parse").expect("details");
    assert_eq!(
        details.entity.observations,
        vec!["slow on unicode", "fixed in v2"]
    );
}

#[test]
fn patterns_coexist_across_languages_and_merge_within_one() {
    let mut store = Store::in_memory();
    store
        .register_pattern(PatternDraft::new("Singleton", "one instance").with_language("python"))
        .expect("register");
    store
        .register_pattern(PatternDraft::new("Singleton", "one instance").with_language("go"))
        .expect("register");
    let merged = store
        .register_pattern(PatternDraft::new("Singleton", "exactly one").with_language("go"))
        .expect("register");

    assert!(!merged.created);
    assert_eq!(store.graph().pattern_count(), 2);

    let go = store.query_patterns(&CatalogQuery::new().with_language("go"));
    assert_eq!(go.len(), 1);
    assert_eq!(go[0].description, "exactly one");
}

#[test]
fn query_filters_select_documented_subsets() {
    let mut store = Store::in_memory();
    store
        .register_entity(EntityDraft::new("A", "class", "x").with_language("python"))
        .expect("register");
    store
        .register_entity(EntityDraft::new("B", "function", "x").with_language("python"))
        .expect("register");
    store
        .register_entity(EntityDraft::new("C", "class", "x").with_language("go"))
        .expect("register");

    let by_type = store
        .query_entities(&EntityQuery::new().with_entity_type("class"))
        .expect("query");
    let names: Vec<_> = by_type.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A", "C"]);

    let by_language = store
        .query_entities(&EntityQuery::new().with_language("python"))
        .expect("query");
    let names: Vec<_> = by_language.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B"]);

    let by_pattern = store
        .query_entities(&EntityQuery::new().with_name_pattern("^A$"))
        .expect("query");
    let names: Vec<_> = by_pattern.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["A"]);
}

#[test]
fn relationship_direction_is_visible_from_both_ends() {
    let mut store = Store::in_memory();
    store
        .register_entity(EntityDraft::new("A", "class", "x"))
        .expect("register");
    store
        .register_entity(EntityDraft::new("B", "class", "x"))
        .expect("register");
    store
        .register_relationship(RelationshipDraft::new("A", "B", "calls"))
        .expect("register");

    let a = store.entity_details("A").expect("details");
    assert!(a
        .relationships
        .iter()
        .any(|r| r.direction == Direction::Outgoing && r.relationship.to_entity == "B"));

    let b = store.entity_details("B").expect("details");
    assert!(b
        .relationships
        .iter()
        .any(|r| r.direction == Direction::Incoming && r.relationship.from_entity == "A"));
}

#[test]
fn clear_resets_statistics_and_id_sequences() {
    let mut store = Store::in_memory();
    let first = store
        .register_entity(EntityDraft::new("A", "class", "x"))
        .expect("register");
    store
        .register_relationship(RelationshipDraft::new("A", "B", "calls"))
        .expect("register");

    store.clear().expect("clear");

    let stats = store.statistics();
    assert_eq!(stats.entity_count, 0);
    assert_eq!(stats.relationship_count, 0);
    assert_eq!(stats.pattern_count, 0);
    assert_eq!(stats.convention_count, 0);
    assert_eq!(stats.note_count, 0);

    let fresh = store
        .register_entity(EntityDraft::new("A", "class", "x"))
        .expect("register");
    assert_eq!(fresh.id, first.id);
}

#[test]
fn restart_reproduces_identical_records_file_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lore.bin");

    let expected = {
        let mut store = Store::open_file(&path).expect("open");
        store
            .register_entity(
                EntityDraft::new("parse", "function", "parses input")
                    .with_language("rust")
                    .with_observations(["slow on unicode"]),
            )
            .expect("register");
        store
            .register_entity(EntityDraft::new("parse", "", "parses tokens"))
            .expect("merge");
        store
            .register_relationship(RelationshipDraft::new("parse", "lex", "calls"))
            .expect("register");
        store.graph().clone()
    };

    let reloaded = Store::open_file(&path).expect("reopen");
    assert_eq!(reloaded.graph(), &expected);
}

#[test]
fn restart_reproduces_identical_records_database_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("lore.redb");

    let expected = {
        let mut store = Store::open_database(&path).expect("open");
        store
            .register_pattern(PatternDraft::new("visitor", "double dispatch").with_language("rust"))
            .expect("register");
        store
            .register_entity(EntityDraft::new("Walker", "class", "tree walker"))
            .expect("register");
        store.graph().clone()
    };

    let reloaded = Store::open_database(&path).expect("reopen");
    assert_eq!(reloaded.graph(), &expected);
}

#[test]
fn flush_failure_rolls_back_the_in_memory_mutation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let nested = dir.path().join("store");
    std::fs::create_dir(&nested).expect("mkdir");
    let path = nested.join("lore.bin");

    let mut store = Store::open_file(&path).expect("open");
    store
        .register_entity(EntityDraft::new("parse", "function", "parses input"))
        .expect("register");
    let before = store.graph().clone();

    // Removing the snapshot's directory makes the next flush fail.
    std::fs::remove_dir_all(&nested).expect("rmdir");

    let err = store.register_entity(EntityDraft::new("lex", "function", "tokenizes"));
    assert!(matches!(err, Err(LoreError::Persistence(_))));
    assert_eq!(store.graph(), &before);
    assert!(store.graph().entity_by_name("lex").is_none());

    // Once the directory is back, writes resume and the failed attempt
    // has not consumed an id: the next create reuses sequence number 2.
    std::fs::create_dir(&nested).expect("mkdir");
    let next = store
        .register_entity(EntityDraft::new("lex", "function", "tokenizes"))
        .expect("register");
    assert!(next.created);
    assert_eq!(next.id.seq, 2);
}

#[test]
fn unknown_entity_lookup_is_not_found_without_mutation() {
    let mut store = Store::in_memory();
    let err = store.add_entity_observation("ghost", "boo");
    assert!(matches!(err, Err(LoreError::NotFound(_))));
    assert!(store.graph().is_empty());
}
