//! Search, Read, Count, Create, Update and Delete against the scripted driver

use std::rc::Rc;
use std::sync::Arc;

use sea_query::Value;
use tidemap::driver::{Backend, MockDatabase, Row};
use tidemap::{
    ChangeTracker, Condition, Count, CountResult, Create, Delete, Entity, Hydrator, Instance,
    MapperConfig, MapperError, Read, Registry, Related, Search, Session, StatementState, Update,
};

#[derive(Entity)]
#[table_name = "user"]
pub struct User {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    #[max_length = 64]
    pub name: String,
    pub active: bool,
    pub email: Option<String>,
    pub tracker: ChangeTracker,
}

#[derive(Entity)]
#[table_name = "post"]
pub struct Post {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub title: String,
    #[reference(one_to_many, nullable = false)]
    pub author: Related<User>,
    pub tracker: ChangeTracker,
}

fn registry() -> Arc<Registry> {
    let registry = Arc::new(Registry::new());
    registry.register::<User>().register::<Post>();
    registry
}

fn session_with(db: &MockDatabase) -> Session {
    Session::builder(registry())
        .database(Rc::new(db.clone()))
        .build()
}

fn new_user(name: &str) -> Instance {
    Instance::new(User {
        id: 0,
        name: name.to_string(),
        active: true,
        email: None,
        tracker: ChangeTracker::default(),
    })
}

fn user_row(id: i64, name: &str) -> Row {
    Row::new()
        .with("id", id)
        .with("name", name)
        .with("active", 1i32)
        .with("email", Value::String(None))
}

#[test]
fn test_create_then_read_round_trips_columns() {
    let db = MockDatabase::new(Backend::MySql).with_next_insert_id(1);
    let session = session_with(&db);

    let created = new_user("ann");
    let id = Create::new(&created).execute(&session).unwrap();
    assert_eq!(id.canonical(), "1");
    assert_eq!(created.downcast::<User>().unwrap().borrow().id, 1);

    let insert = &db.statements_starting_with("INSERT")[0];
    assert_eq!(
        insert.sql,
        "INSERT INTO `user` (`name`, `active`, `email`) VALUES (?, ?, ?)"
    );
    let mut row = Row::new().with("id", 1i64);
    for (column, value) in ["name", "active", "email"].iter().zip(insert.values.iter()) {
        row.push(column, value.clone());
    }
    db.push_query_results(vec![vec![row]]);

    let read = Read::new("User")
        .filter(Condition::eq("id", 1i64))
        .execute(&session)
        .unwrap()
        .unwrap();
    assert!(!read.ptr_eq(&created));
    assert_eq!(read.borrow().to_json(), created.borrow().to_json());
}

#[test]
fn test_read_twice_returns_cached_instance() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![user_row(3, "ann")]]);
    let session = session_with(&db);

    let first = User::read()
        .filter(Condition::eq("id", 3i64))
        .execute(&session)
        .unwrap()
        .unwrap();
    let second = User::read()
        .filter(Condition::eq("id", 3i64))
        .execute(&session)
        .unwrap()
        .unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(db.statements_starting_with("SELECT").len(), 1);
    assert_eq!(session.identity_count(), 1);
}

#[test]
fn test_identity_cache_can_be_disabled() {
    let db = MockDatabase::new(Backend::MySql)
        .append_query_results(vec![vec![user_row(3, "ann")], vec![user_row(3, "ann")]]);
    let session = Session::builder(registry())
        .database(Rc::new(db.clone()))
        .config(MapperConfig {
            use_internal_cache: false,
            ..MapperConfig::default()
        })
        .build();

    let first = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    let second = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(db.statements_starting_with("SELECT").len(), 2);
}

#[test]
fn test_read_without_row() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![]]);
    let session = session_with(&db);
    let found = Read::new("User")
        .filter(Condition::eq("name", "nobody"))
        .execute_as::<User>(&session)
        .unwrap();
    assert!(found.is_none());
}

#[test]
fn test_update_without_modifications_writes_nothing() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![user_row(3, "ann")]]);
    let session = session_with(&db);
    let user = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    db.clear_log();

    assert!(!Update::new(&user).execute(&session).unwrap());
    assert!(db.statements().is_empty());
}

#[test]
fn test_update_writes_only_modified_columns() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![user_row(3, "ann")]]);
    let session = session_with(&db);
    let user = User::read()
        .filter(Condition::eq("id", 3i64))
        .execute_as::<User>(&session)
        .unwrap()
        .unwrap();
    user.borrow_mut().set_name("bob".to_string());
    db.clear_log();

    assert!(Update::new(&Instance::from_rc(user.clone())).execute(&session).unwrap());
    let statements = db.statements();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0].sql, "UPDATE `user` SET `name` = ? WHERE `user`.`id` = ?");
    assert_eq!(
        statements[0].values,
        vec![Value::String(Some("bob".into())), Value::BigInt(Some(3))]
    );
    assert!(!user.borrow().tracker.has_modifications());
}

#[test]
fn test_update_unmodified_writes_every_column() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![user_row(3, "ann")]]);
    let session = session_with(&db);
    let user = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    user.borrow_mut().tracker_mut().update_unmodified = true;
    db.clear_log();

    assert!(Update::new(&user).execute(&session).unwrap());
    let update = &db.statements_starting_with("UPDATE")[0];
    assert_eq!(
        update.sql,
        "UPDATE `user` SET `name` = ?, `active` = ?, `email` = ? WHERE `user`.`id` = ?"
    );
}

#[test]
fn test_delete_removes_row_and_identity() {
    let db = MockDatabase::new(Backend::MySql)
        .append_query_results(vec![vec![user_row(3, "ann")], vec![user_row(3, "ann")]]);
    let session = session_with(&db);
    let user = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();

    assert!(Delete::new(&user).execute(&session).unwrap());
    let delete = &db.statements_starting_with("DELETE")[0];
    assert_eq!(delete.sql, "DELETE FROM `user` WHERE `user`.`id` = ?");
    assert_eq!(session.identity_count(), 0);

    let again = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    assert!(!again.ptr_eq(&user));
}

#[test]
fn test_delete_reports_missing_row() {
    let db = MockDatabase::new(Backend::MySql).append_exec_results(vec![0]);
    let session = session_with(&db);
    let user = Instance::new(User {
        id: 42,
        name: "ghost".into(),
        active: false,
        email: None,
        tracker: ChangeTracker::default(),
    });
    assert!(!Delete::new(&user).execute(&session).unwrap());
}

#[test]
fn test_count_total_and_grouped() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        vec![Row::new().with("tidemap_count", 3i64)],
        vec![
            Row::new().with("active", 0i32).with("tidemap_count", 1i64),
            Row::new().with("active", 1i32).with("tidemap_count", 2i64),
        ],
    ]);
    let session = session_with(&db);

    let total = User::count().execute(&session).unwrap();
    assert_eq!(total, CountResult::Total(3));

    let grouped = Count::new("User").group_by("active").execute(&session).unwrap();
    assert_eq!(grouped.total(), 3);
    match grouped {
        CountResult::Grouped(groups) => {
            assert_eq!(groups.len(), 2);
            assert_eq!(groups[1], (Value::Int(Some(1)), 2));
        }
        other => panic!("expected grouped counts, got {other:?}"),
    }
}

#[test]
fn test_statement_executes_once_until_reset() {
    let db = MockDatabase::new(Backend::MySql);
    let session = session_with(&db);
    let mut search = Search::new("User");
    search.execute(&session).unwrap();
    assert_eq!(search.state(), StatementState::Executed);
    assert!(matches!(search.execute(&session), Err(MapperError::Statement(_))));
    search.reset();
    assert!(search.execute(&session).is_ok());
}

#[test]
fn test_missing_database() {
    let session = Session::builder(registry()).build();
    assert!(matches!(
        Search::new("User").to_sql(&session),
        Err(MapperError::MissingDatabase(_))
    ));
    assert!(matches!(
        Create::new(&new_user("ann")).execute(&session),
        Err(MapperError::MissingDatabase(_))
    ));

    let row = Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64);
    let err = Hydrator::new(&session, "Post")
        .unwrap()
        .fetch(&row, &session, false)
        .unwrap_err();
    assert!(matches!(err, MapperError::MissingDatabase(_)));
}

#[test]
fn test_null_in_required_column_is_a_coercion_error() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![vec![Row::new()
        .with("id", 5i64)
        .with("name", Value::String(None))
        .with("active", 1i32)]]);
    let session = session_with(&db);
    match User::read().execute(&session) {
        Err(MapperError::TypeCoercion { entity, property, .. }) => {
            assert_eq!(entity, "User");
            assert_eq!(property, "name");
        }
        other => panic!("expected a coercion error, got {other:?}"),
    }
}

#[test]
fn test_required_reference_loads_eagerly() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        vec![Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64)],
        vec![user_row(3, "ann")],
    ]);
    let session = session_with(&db);
    let post = Post::read()
        .filter(Condition::eq("id", 1i64))
        .execute_as::<Post>(&session)
        .unwrap()
        .unwrap();
    assert_eq!(db.statements_starting_with("SELECT").len(), 2);
    let author = post.borrow().author.get().unwrap().unwrap();
    assert_eq!(author.borrow().name, "ann");
}

#[test]
fn test_failed_reference_load_leaves_nothing_cached() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        vec![Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64)],
        vec![Row::new()
            .with("id", 3i64)
            .with("name", Value::String(None))
            .with("active", 1i32)],
    ]);
    let session = session_with(&db);

    let err = Post::read()
        .filter(Condition::eq("id", 1i64))
        .execute(&session)
        .unwrap_err();
    assert!(matches!(err, MapperError::TypeCoercion { .. }), "{err:?}");
    assert_eq!(session.identity_count(), 0);

    db.push_query_results(vec![
        vec![Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64)],
        vec![user_row(3, "ann")],
    ]);
    let post = Post::read()
        .filter(Condition::eq("id", 1i64))
        .execute_as::<Post>(&session)
        .unwrap()
        .unwrap();
    assert_eq!(post.borrow().author.get().unwrap().unwrap().borrow().name, "ann");
    assert_eq!(db.statements_starting_with("SELECT").len(), 4);
}

#[test]
fn test_lazy_read_defers_reference_until_access() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        vec![Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64)],
        vec![user_row(3, "ann")],
    ]);
    let session = session_with(&db);
    let post = Post::read()
        .lazy(true)
        .execute_as::<Post>(&session)
        .unwrap()
        .unwrap();
    assert_eq!(db.statements_starting_with("SELECT").len(), 1);

    let author = post.borrow().author.get().unwrap().unwrap();
    assert_eq!(author.borrow().id, 3);
    assert_eq!(db.statements_starting_with("SELECT").len(), 2);
    let again = post.borrow().author.get().unwrap().unwrap();
    assert!(Rc::ptr_eq(&author, &again));
}

#[test]
fn test_reference_reuses_cached_target() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        vec![user_row(3, "ann")],
        vec![Row::new().with("id", 1i64).with("title", "hi").with("author", 3i64)],
    ]);
    let session = session_with(&db);
    let user = User::read().filter(Condition::eq("id", 3i64)).execute(&session).unwrap().unwrap();
    let post = Post::read().execute_as::<Post>(&session).unwrap().unwrap();
    assert_eq!(db.statements_starting_with("SELECT").len(), 2);

    let author = post.borrow().author.get().unwrap().unwrap();
    assert!(Instance::from_rc(author).ptr_eq(&user));
}

#[test]
fn test_create_writes_reference_column() {
    let db = MockDatabase::new(Backend::MySql).append_insert_ids(vec![10, 11]);
    let session = session_with(&db);
    let author = new_user("ann");
    Create::new(&author).execute(&session).unwrap();

    let post = Instance::new(Post {
        id: 0,
        title: "hi".into(),
        author: Related::loaded(author.downcast::<User>()),
        tracker: ChangeTracker::default(),
    });
    Create::new(&post).execute(&session).unwrap();
    let insert = &db.statements_starting_with("INSERT")[1];
    assert_eq!(insert.sql, "INSERT INTO `post` (`title`, `author`) VALUES (?, ?)");
    assert_eq!(insert.values[1], Value::BigInt(Some(10)));
    assert_eq!(post.downcast::<Post>().unwrap().borrow().id, 11);
}

#[test]
fn test_create_rejects_unsaved_reference() {
    let db = MockDatabase::new(Backend::MySql);
    let session = session_with(&db);
    let post = Instance::new(Post {
        id: 0,
        title: "hi".into(),
        author: Related::loaded(new_user("ann").downcast::<User>()),
        tracker: ChangeTracker::default(),
    });
    assert!(matches!(
        Create::new(&post).execute(&session),
        Err(MapperError::ReferenceResolution(_))
    ));
}
