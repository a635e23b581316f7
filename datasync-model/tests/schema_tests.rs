use datasync_model::{singularize, ModelSchema, RelationDescriptor, RelationKind};
use pretty_assertions::assert_eq;

// ── singularize ──────────────────────────────────────────────────

#[test]
fn singularize_regular_endings() {
    assert_eq!(singularize("tags"), "tag");
    assert_eq!(singularize("categories"), "category");
    assert_eq!(singularize("addresses"), "address");
    assert_eq!(singularize("boxes"), "box");
    assert_eq!(singularize("branches"), "branch");
}

#[test]
fn singularize_leaves_singular_names_alone() {
    assert_eq!(singularize("address"), "address");
    assert_eq!(singularize("person"), "person");
    assert_eq!(singularize("s"), "s");
}

// ── RelationDescriptor ───────────────────────────────────────────

#[test]
fn owned_relation_constructor() {
    let r = RelationDescriptor::owned("addresses", "address_rows");
    assert_eq!(r.name, "addresses");
    assert_eq!(r.singular_name, "address");
    assert_eq!(r.kind, RelationKind::Owned);
    assert_eq!(r.target_model, "address_rows");
}

#[test]
fn linked_relation_with_explicit_singular() {
    let r = RelationDescriptor::linked("people", "people").with_singular_name("person");
    assert_eq!(r.kind, RelationKind::Linked);
    assert_eq!(r.singular_name, "person");
}

#[test]
fn relation_kind_serializes_snake_case() {
    assert_eq!(serde_json::to_string(&RelationKind::Owned).unwrap(), r#""owned""#);
    assert_eq!(serde_json::to_string(&RelationKind::Linked).unwrap(), r#""linked""#);
}

// ── ModelSchema ──────────────────────────────────────────────────

fn users_schema() -> ModelSchema {
    ModelSchema::new("users")
        .with_relation(RelationDescriptor::owned("addresses", "addresses"))
        .with_relation(RelationDescriptor::linked("tags", "tags"))
}

#[test]
fn schema_derives_singular_name() {
    let schema = ModelSchema::new("users");
    assert_eq!(schema.singular_name, "user");
    let schema = ModelSchema::new("staff").with_singular_name("member");
    assert_eq!(schema.singular_name, "member");
}

#[test]
fn relation_lookup() {
    let schema = users_schema();
    assert!(schema.has_relation("tags"));
    assert!(!schema.has_relation("orders"));
    assert_eq!(schema.relation("addresses").unwrap().kind, RelationKind::Owned);
}

#[test]
fn matching_relations_keeps_declaration_order() {
    let target = users_schema().with_relation(RelationDescriptor::owned("orders", "orders"));
    let source = ModelSchema::new("legacy_users")
        .with_relation(RelationDescriptor::linked("tags", "labels"))
        .with_relation(RelationDescriptor::owned("addresses", "legacy_addresses"));

    let names: Vec<&str> = target
        .matching_relations(&source)
        .iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(names, vec!["addresses", "tags"]);
}

#[test]
fn matching_relations_empty_when_nothing_shared() {
    let a = users_schema();
    let b = ModelSchema::new("users");
    assert!(a.matching_relations(&b).is_empty());
}

#[test]
fn schema_deserializes_without_relations() {
    let json = r#"{"name":"users","singular_name":"user"}"#;
    let schema: ModelSchema = serde_json::from_str(json).unwrap();
    assert!(schema.relations.is_empty());
}
