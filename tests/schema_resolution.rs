//! Schema resolution from derived metadata

use std::sync::Arc;

use tidemap::schema::DefaultValue;
use tidemap::{
    Cardinality, ChangeTracker, Entity, MapperError, ModelCollection, ModelEnum, Registry, Related,
};

#[derive(Debug, Clone, Default, PartialEq, ModelEnum)]
pub enum Status {
    #[default]
    Active,
    Suspended,
}

#[derive(Entity)]
#[table_name = "user"]
pub struct User {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    #[max_length = 64]
    #[unique]
    pub name: String,
    pub email: Option<String>,
    #[column_name = "is_admin"]
    pub admin: bool,
    #[default_value = "guest"]
    pub role: String,
    #[reference(one_to_many)]
    pub status: Status,
    #[skip]
    pub scratch: u32,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "group"]
pub struct Group {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    #[reference(many_to_many, target = "User")]
    pub users: ModelCollection,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "post"]
pub struct Post {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub title: String,
    #[reference(one_to_many, column = "author_id", nullable = false)]
    pub author: Related<User>,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "note"]
pub struct Note {
    pub body: String,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "pin"]
pub struct Pin {
    #[primary_key]
    pub id: i64,
    #[reference(one_to_many)]
    pub note: Related<Note>,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "membership"]
pub struct Membership {
    #[primary_key]
    pub user_id: i64,
    #[primary_key]
    pub group_id: i64,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "setting"]
#[table_defaults]
pub struct Setting {
    #[primary_key]
    pub id: i64,
    pub retries: i32,
    pub tracker: ChangeTracker,
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            id: 0,
            retries: 3,
            tracker: ChangeTracker::default(),
        }
    }
}

fn registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry
        .register::<User>()
        .register::<Group>()
        .register::<Post>()
        .register::<Membership>()
        .register::<Setting>()
        .register_enum::<Status>();
    registry
}

#[test]
fn test_columns_follow_declarations() {
    let schema = registry().resolve("User").unwrap();
    assert_eq!(schema.table_name, "user");
    assert_eq!(schema.uid, vec!["id".to_string()]);

    let id = schema.column("id").unwrap();
    assert!(id.auto_increment);
    assert!(!id.nullable);
    assert_eq!(id.column_type, "INT");

    let name = schema.column("name").unwrap();
    assert_eq!(name.column_type, "VARCHAR(64)");
    assert!(name.unique);

    assert!(schema.column("email").unwrap().nullable);
    assert_eq!(schema.column("email").unwrap().column_type, "TEXT");

    let admin = schema.column("admin").unwrap();
    assert_eq!(admin.name, "is_admin");
    assert_eq!(admin.column_type, "TINYINT(1)");

    assert_eq!(
        schema.column("role").unwrap().default,
        Some(DefaultValue::Text("guest".into()))
    );
    assert!(schema.column("scratch").is_none());
}

#[test]
fn test_enum_reference_replaces_column() {
    let registry = registry();
    let schema = registry.resolve("User").unwrap();
    assert!(schema.column("status").is_none());
    let status = schema.reference("status").unwrap();
    assert_eq!(status.cardinality, Cardinality::OneToMany);
    assert_eq!(status.target, "Status");
    assert_eq!(status.column_name, "status");
    assert!(!status.nullable);

    let lookup = registry.resolve("Status").unwrap();
    assert!(lookup.is_enum);
    assert_eq!(lookup.enum_variants, vec!["Active", "Suspended"]);
    assert_eq!(Status::VARIANTS, &["Active", "Suspended"]);
}

#[test]
fn test_many_to_many_defaults() {
    let schema = registry().resolve("Group").unwrap();
    let users = schema.reference("users").unwrap();
    assert_eq!(users.cardinality, Cardinality::ManyToMany);
    assert_eq!(users.column_name, "id");
    assert_eq!(users.foreign_table.as_deref(), Some("groupHaveuser"));
    assert_eq!(users.foreign_column.as_deref(), Some("groupId"));
    assert_eq!(users.foreign_right_column.as_deref(), Some("userId"));
}

#[test]
fn test_one_to_many_explicit_column() {
    let schema = registry().resolve("Post").unwrap();
    let author = schema.reference("author").unwrap();
    assert_eq!(author.column_name, "author_id");
    assert_eq!(author.target, "User");
    assert!(!author.nullable);
}

#[test]
fn test_reference_to_type_without_identifier_fails() {
    let registry = Registry::new();
    registry.register::<Note>().register::<Pin>();
    match registry.resolve("Pin") {
        Err(MapperError::SchemaResolution(message)) => {
            assert!(message.contains("no identifier"), "{message}")
        }
        other => panic!("expected a schema resolution error, got {other:?}"),
    }
}

#[test]
fn test_unregistered_type_fails() {
    let registry = Registry::new();
    assert!(matches!(
        registry.resolve("Ghost"),
        Err(MapperError::SchemaResolution(_))
    ));
}

#[test]
fn test_composite_identifier_keeps_declaration_order() {
    let schema = registry().resolve("Membership").unwrap();
    assert_eq!(schema.uid, vec!["user_id".to_string(), "group_id".to_string()]);
    assert!(schema.single_uid_column().is_none());
}

#[test]
fn test_table_defaults_from_default_impl() {
    let schema = registry().resolve("Setting").unwrap();
    assert_eq!(schema.column("retries").unwrap().default, Some(DefaultValue::Int(3)));
}

#[test]
fn test_resolution_is_cached_until_reregistered() {
    let registry = registry();
    let first = registry.resolve("User").unwrap();
    let second = registry.resolve("User").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    registry.register::<User>();
    let third = registry.resolve("User").unwrap();
    assert!(!Arc::ptr_eq(&first, &third));
}

#[test]
fn test_entity_names() {
    assert_eq!(User::NAME, "User");
    assert_eq!(<Status as ModelEnum>::NAME, "Status");
}
