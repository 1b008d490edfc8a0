//! Tests for entity.rs, entity_type.rs and registry.rs: construction,
//! forks, resident masks, change tracking and the identity map.

use pretty_assertions::assert_eq;
use serde_json::json;
use stratum_model::{
    AttributeExposure, AttributeOptions, Entity, EntityId, EntityKind, EntityResolver, EntityType,
    EntityTypeRef, ExposureTable, FieldMask, ModelError, Operation, Registry, Value,
};

fn director_type() -> EntityTypeRef {
    EntityType::document("Director")
        .attribute("name", AttributeOptions::new())
        .attribute("country", AttributeOptions::new())
        .build()
        .unwrap()
}

fn address_type() -> EntityTypeRef {
    EntityType::subdocument("Address")
        .attribute("city", AttributeOptions::new())
        .attribute("street", AttributeOptions::new())
        .build()
        .unwrap()
}

fn movie_type() -> EntityTypeRef {
    EntityType::document("Movie")
        .attribute(
            "title",
            AttributeOptions::new().default_value(|_| Value::from("")),
        )
        .attribute("year", AttributeOptions::new())
        .attribute("director", AttributeOptions::new())
        .attribute("location", AttributeOptions::new())
        .attribute(
            "display_title",
            AttributeOptions::new().getter(|owner| {
                owner
                    .entity()
                    .and_then(|movie| movie.get_or_none("title").ok().flatten())
                    .and_then(|title| title.as_str().map(str::to_uppercase))
                    .map_or_else(Value::null, Value::from)
            }),
        )
        .exposure(ExposureTable::read_only())
        .build()
        .unwrap()
}

fn mask(paths: &[&str]) -> FieldMask {
    FieldMask::from_paths(paths).unwrap()
}

// ── Entity types ────────────────────────────────────────────────

#[test]
fn type_declaration() {
    let movie_type = movie_type();
    assert_eq!(movie_type.name(), "Movie");
    assert_eq!(movie_type.kind(), EntityKind::Document);
    assert!(movie_type.has_attribute("title"));
    assert!(!movie_type.has_attribute("rating"));
    assert_eq!(
        movie_type.stored_attribute_names().collect::<Vec<_>>(),
        vec!["title", "year", "director", "location"]
    );
    assert!(movie_type.exposure().allows(Operation::Find));
    assert!(!movie_type.exposure().allows(Operation::Save));
}

#[test]
fn invalid_type_declarations_fail_fast() {
    let reserved = EntityType::document("Movie")
        .attribute("_id", AttributeOptions::new())
        .build();
    assert!(matches!(reserved, Err(ModelError::InvalidType { .. })));

    let duplicate = EntityType::document("Movie")
        .attribute("title", AttributeOptions::new())
        .attribute("title", AttributeOptions::new())
        .build();
    assert!(matches!(duplicate, Err(ModelError::InvalidType { .. })));

    let misconfigured = EntityType::document("Movie")
        .attribute(
            "title",
            AttributeOptions::new().setter(|_, _| {}),
        )
        .build();
    assert!(matches!(
        misconfigured,
        Err(ModelError::InvalidAttributeConfig { .. })
    ));
}

#[test]
fn static_attributes_belong_to_the_type() {
    let movie_type = EntityType::document("Movie")
        .static_attribute(
            "limit",
            AttributeOptions::new()
                .value(100_i64)
                .exposure(AttributeExposure::get()),
        )
        .build()
        .unwrap();

    let limit = movie_type.static_attribute("limit").unwrap();
    assert_eq!(limit.owner().describe(), "Movie");
    assert_eq!(limit.get_value().unwrap(), Value::from(100_i64));
}

#[test]
fn type_introspection() {
    let movie_type = EntityType::document("Movie")
        .attribute(
            "title",
            AttributeOptions::new()
                .default_value(|_| Value::from(""))
                .exposure(AttributeExposure::get_set()),
        )
        .attribute("secret", AttributeOptions::new())
        .static_attribute(
            "limit",
            AttributeOptions::new()
                .value(100_i64)
                .exposure(AttributeExposure::get()),
        )
        .exposure(ExposureTable::read_only())
        .build()
        .unwrap();

    assert_eq!(
        serde_json::to_value(movie_type.introspect()).unwrap(),
        json!({
            "name": "Movie",
            "type": "document",
            "attributes": [
                {"name": "limit", "type": "attribute", "value": 100, "exposure": {"get": true}}
            ],
            "instance_attributes": [
                {"name": "title", "type": "attribute", "default": "", "exposure": {"get": true, "set": true}},
                {"name": "secret", "type": "attribute"}
            ],
            "exposure": ["get", "load", "find"]
        })
    );
}

// ── Construction ────────────────────────────────────────────────

#[test]
fn new_entity_materializes_defaults() {
    let movie = Entity::new(&movie_type());

    assert!(movie.is_new());
    assert!(!movie.id().as_str().is_empty());
    assert!(movie.is_set("title"));
    assert_eq!(movie.get("title").unwrap(), Value::from(""));
    assert!(!movie.is_set("year"));
}

#[test]
fn shell_applies_defaults_lazily() {
    let movie = Entity::shell(&movie_type(), EntityId::parse("m1").unwrap());

    assert!(!movie.is_new());
    assert!(!movie.is_set("title"));
    assert_eq!(movie.get("title").unwrap(), Value::from(""));
    assert!(matches!(
        movie.get("year"),
        Err(ModelError::AttributeUnset { .. })
    ));
    assert_eq!(movie.get_or_none("year").unwrap(), None);
    assert_eq!(movie.to_string(), "Movie(m1)");
}

#[test]
fn unknown_attributes_are_rejected() {
    let movie = Entity::new(&movie_type());
    let err = movie.set("rating", 5_i64).unwrap_err();
    assert!(matches!(err, ModelError::UnknownAttribute { .. }));
}

#[test]
fn computed_attribute_reads_other_attributes() {
    let movie = Entity::new(&movie_type());
    movie.set("title", "Inception").unwrap();

    assert!(movie.is_set("display_title"));
    assert_eq!(movie.get("display_title").unwrap(), Value::from("INCEPTION"));
}

// ── Forks ───────────────────────────────────────────────────────

#[test]
fn fork_is_copy_on_write() {
    let movie = Entity::new(&movie_type());
    movie.set("title", "Inception").unwrap();
    movie.set("year", 2010_i64).unwrap();

    let fork = movie.fork();
    assert!(fork.is_fork());
    assert_eq!(fork.id(), movie.id());
    assert_eq!(fork.is_new(), movie.is_new());
    assert_eq!(fork.get("title").unwrap(), Value::from("Inception"));

    fork.set("title", "Inception 2").unwrap();
    assert_eq!(fork.get("title").unwrap(), Value::from("Inception 2"));
    assert_eq!(movie.get("title").unwrap(), Value::from("Inception"));

    movie.set("year", 2011_i64).unwrap();
    assert_eq!(fork.get("year").unwrap(), Value::from(2011_i64));
}

#[test]
fn fork_computed_attribute_is_bound_to_the_fork() {
    let movie = Entity::new(&movie_type());
    movie.set("title", "Inception").unwrap();

    let fork = movie.fork();
    fork.set("title", "Memento").unwrap();

    assert_eq!(fork.get("display_title").unwrap(), Value::from("MEMENTO"));
    assert_eq!(movie.get("display_title").unwrap(), Value::from("INCEPTION"));
}

#[test]
fn merge_fork_writes_changes_back() {
    let movie = Entity::new(&movie_type());
    movie.set("title", "Inception").unwrap();
    movie.set("year", 2010_i64).unwrap();

    let fork = movie.fork();
    fork.set("title", "Inception 2").unwrap();
    fork.unset("year").unwrap();
    movie.merge_fork(&fork).unwrap();

    assert_eq!(movie.get("title").unwrap(), Value::from("Inception 2"));
    assert!(!movie.is_set("year"));
}

#[test]
fn merge_fork_rejects_unrelated_entities() {
    let movie = Entity::new(&movie_type());
    let other = Entity::new(&movie_type());

    assert!(matches!(
        movie.merge_fork(&other),
        Err(ModelError::NotAFork(_))
    ));
    assert!(matches!(
        movie.merge_fork(&other.fork()),
        Err(ModelError::NotAFork(_))
    ));
}

// ── Resident fields ─────────────────────────────────────────────

#[test]
fn resident_mask_tracks_set_attributes() {
    let movie = Entity::shell(&movie_type(), EntityId::parse("m1").unwrap());
    assert_eq!(movie.resident_mask(), mask(&["display_title"]));

    movie.set("title", "Inception").unwrap();
    assert!(movie.fields_are_resident(&mask(&["title"])));
    assert!(!movie.fields_are_resident(&mask(&["title", "year"])));
    assert!(!movie.fields_are_resident(&FieldMask::all()));
    assert!(movie.fields_are_resident(&FieldMask::identifier_only()));
    assert!(movie.fields_are_resident(&mask(&["title", "undeclared"])));
}

#[test]
fn referenced_documents_are_resident_for_their_holder() {
    let movie = Entity::shell(&movie_type(), EntityId::parse("m1").unwrap());
    let director = Entity::shell(&director_type(), EntityId::parse("d1").unwrap());
    movie.set("director", director.clone()).unwrap();

    let wanted = mask(&["director.name"]);
    assert!(movie.resident_mask().includes(&mask(&["director"])));
    assert!(!director.fields_are_resident(&mask(&["name"])));

    let nested = movie.nested_entities(&wanted);
    assert_eq!(nested.len(), 1);
    assert!(std::sync::Arc::ptr_eq(&nested[0].0, &director));
    assert_eq!(nested[0].1, mask(&["name"]));
}

#[test]
fn subdocuments_contribute_their_own_fields() {
    let movie = Entity::shell(&movie_type(), EntityId::parse("m1").unwrap());
    let address = Entity::new(&address_type());
    address.set("city", "Paris").unwrap();
    movie.set("location", address).unwrap();

    assert!(movie.fields_are_resident(&mask(&["location.city"])));
    assert!(!movie.fields_are_resident(&mask(&["location.street"])));
    assert!(
        movie
            .resident_mask()
            .includes(&mask(&["location.city"]))
    );
}

#[test]
fn list_values_are_resident_when_every_item_is() {
    let movie = Entity::shell(&movie_type(), EntityId::parse("m1").unwrap());
    let first = Entity::new(&address_type());
    first.set("city", "Paris").unwrap();
    let second = Entity::new(&address_type());
    second.set("street", "Main").unwrap();
    movie
        .set("location", vec![Value::from(first), Value::from(second)])
        .unwrap();

    assert!(!movie.fields_are_resident(&mask(&["location.city"])));
    assert_eq!(movie.nested_entities(&mask(&["location"])).len(), 2);
}

// ── Change tracking ─────────────────────────────────────────────

#[test]
fn mark_saved_resets_the_baseline() {
    let movie = Entity::new(&movie_type());
    movie.set("title", "Inception").unwrap();
    assert_eq!(movie.changed_attributes(), vec!["title".to_string()]);

    movie.mark_saved();
    assert!(!movie.is_new());
    assert!(movie.changed_attributes().is_empty());

    movie.set("year", 2010_i64).unwrap();
    assert_eq!(movie.changed_attributes(), vec!["year".to_string()]);

    movie.mark_deleted();
    assert!(movie.is_new());
    assert_eq!(
        movie.changed_attributes(),
        vec!["title".to_string(), "year".to_string()]
    );
}

// ── Registry ────────────────────────────────────────────────────

#[test]
fn registry_rejects_duplicate_types() {
    let registry = Registry::new();
    registry.register(movie_type()).unwrap();
    assert!(registry.register(movie_type()).is_err());
    assert_eq!(registry.type_names(), vec!["Movie".to_string()]);
    assert!(matches!(
        registry.entity_type("Actor"),
        Err(ModelError::UnknownType(_))
    ));
}

#[test]
fn identity_map_returns_the_live_instance() {
    let registry = Registry::new();
    let movie_type = movie_type();
    registry.register(movie_type.clone()).unwrap();
    let id = EntityId::parse("m1").unwrap();

    let first = registry.instance(&movie_type, &id);
    let second = registry.instance(&movie_type, &id);
    assert!(std::sync::Arc::ptr_eq(&first, &second));

    let created = registry.create("Movie").unwrap();
    let resident = registry.resident("Movie", created.id()).unwrap();
    assert!(std::sync::Arc::ptr_eq(&created, &resident));

    registry.forget(&first);
    assert!(registry.resident("Movie", &id).is_none());
}

#[test]
fn identity_map_does_not_keep_entities_alive() {
    let registry = Registry::new();
    let movie_type = movie_type();
    let id = EntityId::parse("m1").unwrap();

    drop(registry.instance(&movie_type, &id));
    assert!(registry.resident("Movie", &id).is_none());
}
