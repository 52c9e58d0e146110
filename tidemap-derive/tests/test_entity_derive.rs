//! Tests for the code generated by `#[derive(Entity)]` and `#[derive(ModelEnum)]`

use sea_query::Value;
use serde_json::json;
use tidemap::schema::{Cardinality, DefaultValue, TableDefinition};
use tidemap::value::ColumnKind;
use tidemap::{
    ChangeTracker, Entity, MapperError, Model, ModelCollection, ModelEnum, Related, TryGetable,
    ValueType,
};

#[derive(Debug, Clone, Default, PartialEq, ModelEnum)]
#[enum_name = "ArticleState"]
pub enum State {
    #[default]
    Draft,
    Published,
}

#[derive(Entity)]
#[table_name = "author"]
pub struct Author {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "article"]
pub struct Article {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    #[max_length = 120]
    pub title: String,
    #[column_name = "body_text"]
    #[column_type = "MEDIUMTEXT"]
    pub body: Option<String>,
    #[default_value = "0"]
    pub score: i32,
    #[reference(one_to_many)]
    pub state: State,
    #[reference(one_to_many, column = "author_id")]
    pub author: Related<Author>,
    #[reference(many_to_many, target = "Author", foreign_table = "articleEditors")]
    pub editors: ModelCollection,
    #[skip]
    pub views: u64,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "tagging"]
pub struct Tagging {
    #[primary_key]
    pub article_id: i64,
    #[primary_key]
    pub tag: String,
    pub tracker: ChangeTracker,
}

fn article() -> Article {
    Article {
        id: 4,
        title: "Hello".into(),
        body: None,
        score: 2,
        state: State::Published,
        author: Related::default(),
        editors: ModelCollection::default(),
        views: 10,
        tracker: ChangeTracker::default(),
    }
}

fn described<T: Entity>() -> TableDefinition {
    let mut def = TableDefinition::new(T::NAME);
    T::describe(&mut def);
    def
}

#[test]
fn test_describe_columns() {
    let def = described::<Article>();
    assert_eq!(def.table_name.as_deref(), Some("article"));
    let properties: Vec<&str> = def.columns.iter().map(|c| c.property.as_str()).collect();
    assert_eq!(properties, vec!["id", "title", "body", "score"]);

    let id = &def.columns[0];
    assert!(id.primary_key);
    assert!(id.auto_increment);

    assert_eq!(def.columns[1].max_length, Some(120));
    assert_eq!(def.columns[1].kind, ColumnKind::Text);

    let body = &def.columns[2];
    assert_eq!(body.name.as_deref(), Some("body_text"));
    assert_eq!(body.column_type.as_deref(), Some("MEDIUMTEXT"));
    assert!(body.nullable);

    assert_eq!(def.columns[3].default, Some(DefaultValue::Int(0)));
}

#[test]
fn test_describe_references() {
    let def = described::<Article>();
    let state = &def.references[0];
    assert_eq!(state.property, "state");
    assert_eq!(state.target, "ArticleState");
    assert_eq!(state.nullable, Some(false));

    let author = &def.references[1];
    assert_eq!(author.cardinality, Cardinality::OneToMany);
    assert_eq!(author.target, "Author");
    assert_eq!(author.column.as_deref(), Some("author_id"));

    let editors = &def.references[2];
    assert_eq!(editors.cardinality, Cardinality::ManyToMany);
    assert_eq!(editors.foreign_table.as_deref(), Some("articleEditors"));
}

#[test]
fn test_get_and_set() {
    let mut article = article();
    assert_eq!(article.get("title"), Some(Value::String(Some("Hello".into()))));
    assert_eq!(article.get("body"), Some(Value::String(None)));
    assert_eq!(article.get("state"), Some(Value::String(Some("Published".into()))));
    assert_eq!(article.get("views"), None);
    assert_eq!(article.get("author"), None);

    article.set("score", Value::BigInt(Some(9))).unwrap();
    article.set("state", Value::String(Some("Draft".into()))).unwrap();
    assert_eq!(article.score, 9);
    assert_eq!(article.state, State::Draft);
    assert!(!article.tracker.has_modifications());
}

#[test]
fn test_set_reports_coercion_errors() {
    let mut article = article();
    match article.set("score", Value::String(Some("many".into()))) {
        Err(MapperError::TypeCoercion { entity, property, .. }) => {
            assert_eq!(entity, "Article");
            assert_eq!(property, "score");
        }
        other => panic!("expected a coercion error, got {other:?}"),
    }
    assert!(article.set("rating", Value::Int(Some(1))).is_err());
    assert!(article.set("state", Value::String(Some("Archived".into()))).is_err());
}

#[test]
fn test_setters_record_modifications() {
    let mut article = article();
    article.set_title("Bye".into());
    article.set_score(3);
    article.set_title("Again".into());
    assert_eq!(article.tracker.modified(), &["title".to_string(), "score".to_string()]);

    let author = std::rc::Rc::new(std::cell::RefCell::new(Author {
        id: 1,
        name: "ann".into(),
        tracker: ChangeTracker::default(),
    }));
    article.set_author(Some(author));
    assert!(article.tracker.is_modified("author"));
    assert_eq!(article.author.get().unwrap().unwrap().borrow().name, "ann");
}

#[test]
fn test_relationship_slots() {
    let mut article = article();
    assert_eq!(article.related("author").unwrap().target(), "Author");
    assert!(article.related("editors").is_none());
    assert!(article.collection("editors").is_some());
    assert!(article.collection_mut("author").is_none());
    assert!(article.related_mut("author").is_some());
}

#[test]
fn test_identifier_and_json() {
    let article = article();
    assert_eq!(article.model_id().canonical(), "4");
    assert_eq!(
        article.to_json(),
        json!({ "id": 4, "title": "Hello", "body": null, "score": 2, "state": "Published" })
    );

    let tagging = Tagging {
        article_id: 4,
        tag: "rust".into(),
        tracker: ChangeTracker::default(),
    };
    assert_eq!(tagging.model_id().arity(), 2);
    assert_eq!(tagging.model_id().canonical(), "4, rust");
}

#[test]
fn test_blank_and_names() {
    let blank = Article::blank();
    assert_eq!(blank.id, 0);
    assert_eq!(blank.state, State::Draft);
    assert_eq!(Article::NAME, "Article");
    assert_eq!(blank.entity_name(), "Article");
    assert!(blank.as_any().downcast_ref::<Article>().is_some());
}

#[test]
fn test_model_enum_values() {
    assert_eq!(<State as ModelEnum>::NAME, "ArticleState");
    assert_eq!(State::VARIANTS, &["Draft", "Published"]);
    assert_eq!(State::Published.variant_name(), "Published");
    assert_eq!(State::from_variant("Draft"), Some(State::Draft));
    assert_eq!(State::from_variant("draft"), None);

    assert_eq!(
        State::Published.into_value(),
        Value::String(Some("Published".into()))
    );
    assert_eq!(State::null_value(), Value::String(None));
    assert_eq!(State::column_kind(), ColumnKind::Enum(&["Draft", "Published"]));
    assert_eq!(
        State::try_get(Value::String(Some("Published".into()))),
        Ok(State::Published)
    );
    assert!(State::try_get(Value::Int(Some(1))).is_err());
    assert_eq!(State::try_get_opt(Value::String(None)), Ok(None));
}
