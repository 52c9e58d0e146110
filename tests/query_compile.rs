//! Filter compilation into SELECT statements

use std::rc::Rc;
use std::sync::Arc;

use chrono::NaiveDate;
use sea_query::Value;
use tidemap::driver::{Backend, MockDatabase};
use tidemap::{
    ChangeTracker, Comparator, Condition, Count, Entity, Instance, MapperError, ModelCollection,
    Operand, Order, Registry, Related, Search, Session,
};

#[derive(Entity)]
#[table_name = "user"]
pub struct User {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    pub active: bool,
    pub created: Option<chrono::NaiveDateTime>,
    #[reference(many_to_one, target = "Post", column = "author")]
    pub posts: ModelCollection,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "post"]
pub struct Post {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub title: String,
    #[reference(one_to_many)]
    pub author: Related<User>,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "group"]
pub struct Group {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    #[reference(
        many_to_many,
        target = "User",
        foreign_table = "userHaveGroup",
        foreign_column = "groupId",
        foreign_right_column = "userId"
    )]
    pub users: ModelCollection,
    pub tracker: ChangeTracker,
}

fn session() -> Session {
    let registry = Arc::new(Registry::new());
    registry.register::<User>().register::<Post>().register::<Group>();
    Session::builder(registry)
        .database(Rc::new(MockDatabase::new(Backend::MySql)))
        .build()
}

fn user(id: i64) -> Instance {
    Instance::new(User {
        id,
        name: format!("user{id}"),
        active: true,
        created: None,
        posts: ModelCollection::default(),
        tracker: ChangeTracker::default(),
    })
}

fn group(id: i64) -> Instance {
    Instance::new(Group {
        id,
        name: "staff".into(),
        users: ModelCollection::default(),
        tracker: ChangeTracker::default(),
    })
}

#[test]
fn test_column_condition_is_table_qualified() {
    let session = session();
    let (sql, values) = Search::new("User")
        .filter(Condition::eq("name", "ann"))
        .to_sql(&session)
        .unwrap();
    assert!(sql.starts_with("SELECT `user`.`id` AS `id`"), "{sql}");
    assert!(sql.contains("FROM `user` WHERE `user`.`name` = ?"), "{sql}");
    assert!(sql.ends_with("ORDER BY `user`.`id` ASC"), "{sql}");
    assert_eq!(values, vec![Value::String(Some("ann".into()))]);
}

#[test]
fn test_values_are_coerced_for_storage() {
    let session = session();
    let created = NaiveDate::from_ymd_opt(2024, 1, 2)
        .and_then(|d| d.and_hms_opt(3, 4, 5))
        .unwrap();
    let (_, values) = Search::new("User")
        .filter(Condition::eq("active", true).and(Condition::gt("created", created)))
        .to_sql(&session)
        .unwrap();
    assert_eq!(
        values,
        vec![
            Value::Int(Some(1)),
            Value::String(Some("2024-01-02 03:04:05".into())),
        ]
    );
}

#[test]
fn test_groups_nest_with_operators() {
    let session = session();
    let (sql, values) = Search::new("User")
        .filter(Condition::like("name", "a%"))
        .or(Condition::eq("id", 7i64))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains("`user`.`name` LIKE ? OR `user`.`id` = ?"), "{sql}");
    assert_eq!(values.len(), 2);
}

#[test]
fn test_null_comparison_on_nullable_reference() {
    let session = session();
    let (sql, values) = Search::new("Post")
        .filter(Condition::eq("author", tidemap::Operand::null()))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains("`post`.`author` IS NULL"), "{sql}");
    assert!(values.is_empty());
}

#[test]
fn test_one_to_many_instance_compares_identifier() {
    let session = session();
    let (sql, values) = Search::new("Post")
        .filter(Condition::eq("author", user(4)))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains("`post`.`author` = ?"), "{sql}");
    assert_eq!(values, vec![Value::BigInt(Some(4))]);
}

#[test]
fn test_in_set_over_one_to_many_is_single_predicate() {
    let session = session();
    let authors = vec![user(1), user(2), user(3)];
    let (sql, values) = Search::new("Post")
        .filter(Condition::is_in("author", authors))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains("`post`.`author` IN (?, ?, ?)"), "{sql}");
    assert_eq!(
        values,
        vec![Value::BigInt(Some(1)), Value::BigInt(Some(2)), Value::BigInt(Some(3))]
    );
}

#[test]
fn test_in_set_accepts_a_collection() {
    let session = session();
    let mut authors = ModelCollection::default();
    authors.push(user(4)).unwrap();
    authors.push(user(7)).unwrap();
    let (sql, values) = Search::new("Post")
        .filter(Condition::is_in("author", Operand::models(&mut authors).unwrap()))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains("`post`.`author` IN (?, ?)"), "{sql}");
    assert_eq!(values, vec![Value::BigInt(Some(4)), Value::BigInt(Some(7))]);
}

#[test]
fn test_in_set_over_many_to_one_is_rejected() {
    let session = session();
    let post = Instance::new(Post {
        id: 9,
        title: "hello".into(),
        author: Related::default(),
        tracker: ChangeTracker::default(),
    });
    let err = Search::new("User")
        .filter(Condition::is_in("posts", vec![post]))
        .to_sql(&session)
        .unwrap_err();
    match err {
        MapperError::ReferenceResolution(message) => {
            assert!(message.contains("not implemented"), "{message}")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_reference_with_wrong_instance_type() {
    let session = session();
    let err = Search::new("Post")
        .filter(Condition::eq("author", group(1)))
        .to_sql(&session)
        .unwrap_err();
    match err {
        MapperError::ReferenceResolution(message) => {
            assert!(message.contains("instance of User"), "{message}")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_reference_with_scalar_value_is_rejected() {
    let session = session();
    let err = Search::new("Post")
        .filter(Condition::eq("author", 3i64))
        .to_sql(&session)
        .unwrap_err();
    assert!(matches!(err, MapperError::ReferenceResolution(_)));
}

#[test]
fn test_many_to_many_instance_joins_association_table() {
    let session = session();
    let (sql, values) = Search::new("Group")
        .filter(Condition::eq("users", user(5)))
        .to_sql(&session)
        .unwrap();
    assert!(
        sql.contains("INNER JOIN `userHaveGroup` ON `userHaveGroup`.`groupId` = `group`.`id`"),
        "{sql}"
    );
    assert!(sql.contains("WHERE `userHaveGroup`.`userId` = ?"), "{sql}");
    assert_eq!(values, vec![Value::BigInt(Some(5))]);
}

#[test]
fn test_traversal_selects_members_of_instance() {
    let session = session();
    let staff = group(2);
    let (sql, values) = Search::new("User")
        .with("users", Comparator::Equal, &staff)
        .to_sql(&session)
        .unwrap();
    assert!(
        sql.contains("INNER JOIN `userHaveGroup` ON `userHaveGroup`.`userId` = `user`.`id`"),
        "{sql}"
    );
    assert!(sql.contains("WHERE `userHaveGroup`.`groupId` = ?"), "{sql}");
    assert_eq!(values, vec![Value::BigInt(Some(2))]);
}

#[test]
fn test_unknown_property() {
    let session = session();
    let err = Search::new("User")
        .filter(Condition::eq("nickname", "x"))
        .to_sql(&session)
        .unwrap_err();
    match err {
        MapperError::ReferenceResolution(message) => {
            assert_eq!(message, "property nickname not found in schema user")
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_order_and_paging() {
    let session = session();
    let (sql, _) = Search::new("User")
        .order("name", Order::Desc)
        .limit(10)
        .offset(20)
        .to_sql(&session)
        .unwrap();
    assert!(
        sql.ends_with("ORDER BY `user`.`name` DESC, `user`.`id` ASC LIMIT ? OFFSET ?")
            || sql.ends_with("ORDER BY `user`.`name` DESC, `user`.`id` ASC LIMIT 10 OFFSET 20"),
        "{sql}"
    );
}

#[test]
fn test_order_by_unknown_property_fails() {
    let session = session();
    let err = Search::new("User")
        .order("rank", Order::Asc)
        .to_sql(&session)
        .unwrap_err();
    assert!(matches!(err, MapperError::ReferenceResolution(_)));
}

#[test]
fn test_grouped_count() {
    let session = session();
    let (sql, _) = Count::new("User").group_by("active").to_sql(&session).unwrap();
    assert!(sql.contains("COUNT(*) AS `tidemap_count`"), "{sql}");
    assert!(sql.contains("GROUP BY `user`.`active`"), "{sql}");
}

#[test]
fn test_postgres_placeholders() {
    let registry = Arc::new(Registry::new());
    registry.register::<User>().register::<Post>();
    let session = Session::builder(registry)
        .database(Rc::new(MockDatabase::new(Backend::Postgres)))
        .build();
    let (sql, _) = Search::new("User")
        .filter(Condition::eq("name", "ann"))
        .to_sql(&session)
        .unwrap();
    assert!(sql.contains(r#"WHERE "user"."name" = $1"#), "{sql}");
}
