//! Lazy, keyed access to search results

use std::rc::Rc;
use std::sync::Arc;

use serde_json::json;
use tidemap::driver::{Backend, MockDatabase, Row};
use tidemap::{ChangeTracker, CountResult, Entity, MapperError, Order, Registry, Session};

#[derive(Entity)]
#[table_name = "user"]
pub struct User {
    #[primary_key]
    #[auto_increment]
    pub id: i64,
    pub name: String,
    pub tracker: ChangeTracker,
}

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing_subscriber::filter::LevelFilter::TRACE)
        .with_test_writer()
        .try_init();
}

fn session_with(db: &MockDatabase) -> Session {
    init_logging();
    let registry = Arc::new(Registry::new());
    registry.register::<User>();
    Session::builder(registry)
        .database(Rc::new(db.clone()))
        .build()
}

fn rows(names: &[&str]) -> Vec<Row> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| Row::new().with("id", i as i64 + 1).with("name", *name))
        .collect()
}

#[test]
fn test_iteration_matches_count() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![
        rows(&["ann", "bob", "cid"]),
        vec![Row::new().with("tidemap_count", 3i64)],
    ]);
    let session = session_with(&db);

    let mut users = User::search().execute(&session).unwrap();
    assert!(db.statements().is_empty());
    let iterated = users.iter().map(|entry| entry.unwrap()).count();
    assert_eq!(iterated, 3);
    assert_eq!(User::count().execute(&session).unwrap(), CountResult::Total(3));
    assert!(users.is_exhausted());
    assert!(users.is_list());
}

#[test]
fn test_keyed_access_returns_the_iterated_instance() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann", "bob", "cid"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();

    let bob = users.get("2").unwrap().unwrap();
    assert!(!users.is_exhausted());
    let entries: Vec<_> = users.iter().collect::<Result<_, _>>().unwrap();
    assert_eq!(entries[1].0, "2");
    assert!(entries[1].1.ptr_eq(&bob));
    assert!(users.get("4").unwrap().is_none());
    assert_eq!(db.statements_starting_with("SELECT").len(), 1);
}

#[test]
fn test_absolute_fetch_jumps_to_key() {
    let db = MockDatabase::new(Backend::MySql)
        .with_absolute_fetch(true)
        .append_query_results(vec![rows(&["ann", "bob", "cid"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    users.fetch_absolute = true;

    let cid = users.get("3").unwrap().unwrap();
    assert_eq!(cid.downcast::<User>().unwrap().borrow().name, "cid");
    assert!(!users.is_exhausted());
    assert_eq!(
        users.keys().unwrap(),
        vec!["1".to_string(), "2".to_string(), "3".to_string()]
    );
}

#[test]
fn test_keyed_access_with_custom_order() {
    let db = MockDatabase::new(Backend::MySql)
        .with_absolute_fetch(true)
        .append_query_results(vec![vec![
            Row::new().with("id", 3i64).with("name", "cid"),
            Row::new().with("id", 2i64).with("name", "bob"),
            Row::new().with("id", 1i64).with("name", "ann"),
        ]]);
    let session = session_with(&db);
    let mut users = User::search()
        .order("name", Order::Desc)
        .execute(&session)
        .unwrap();
    users.fetch_absolute = true;

    let ann = users.get("1").unwrap().unwrap();
    assert!(users.is_list());
    assert_eq!(ann.downcast::<User>().unwrap().borrow().name, "ann");
    assert_eq!(
        users.keys().unwrap(),
        vec!["3".to_string(), "2".to_string(), "1".to_string()]
    );
}

#[test]
fn test_missing_row_count_is_scanned() {
    let db = MockDatabase::new(Backend::MySql)
        .without_row_count()
        .append_query_results(vec![rows(&["ann", "bob"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    assert_eq!(users.len().unwrap(), 2);
    assert_eq!(users.as_array().unwrap().len(), 2);
    assert_eq!(db.pending_query_results(), 0);
}

#[test]
fn test_remove_and_push_change_membership() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann", "bob"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();

    users.remove("1").unwrap();
    users
        .push(tidemap::Instance::new(User {
            id: 5,
            name: "eve".into(),
            tracker: ChangeTracker::default(),
        }))
        .unwrap();
    assert_eq!(users.len().unwrap(), 2);
    assert_eq!(users.keys().unwrap(), vec!["2".to_string(), "5".to_string()]);
    assert!(users.get("1").unwrap().is_none());

    let instance = users.get("5").unwrap().unwrap();
    assert!(users.has(&instance).unwrap());
}

#[test]
fn test_reset_runs_the_query_again() {
    let db = MockDatabase::new(Backend::MySql)
        .append_query_results(vec![rows(&["ann"]), rows(&["ann", "bob"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    assert_eq!(users.len().unwrap(), 1);

    users.reset(false);
    assert!(!users.is_executed());
    assert_eq!(users.len().unwrap(), 2);
    assert_eq!(db.statements_starting_with("SELECT").len(), 2);
}

#[test]
fn test_execute_keeps_pending_additions() {
    let db = MockDatabase::new(Backend::MySql)
        .append_query_results(vec![rows(&["ann"]), rows(&["ann"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    users
        .push(tidemap::Instance::new(User {
            id: 8,
            name: "new".into(),
            tracker: ChangeTracker::default(),
        }))
        .unwrap();

    assert_eq!(users.execute().unwrap(), 1);
    assert_eq!(users.added_keys(), &["8".to_string()]);
    assert_eq!(users.len().unwrap(), 2);
}

#[test]
fn test_manual_execution_required_when_auto_execute_is_off() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    users.auto_execute = false;

    assert!(matches!(users.len(), Err(MapperError::Statement(_))));
    users.execute().unwrap();
    assert_eq!(users.len().unwrap(), 1);
}

#[test]
fn test_uncached_collection_hydrates_on_every_access() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann"])]);
    let session = Session::builder({
        let registry = Arc::new(Registry::new());
        registry.register::<User>();
        registry
    })
    .database(Rc::new(db.clone()))
    .config(tidemap::MapperConfig {
        use_internal_cache: false,
        collection_cache: false,
        ..tidemap::MapperConfig::default()
    })
    .build();

    let mut users = User::search().execute(&session).unwrap();
    users.auto_close = false;
    let first = users.fetch(0).unwrap().unwrap().1;
    let second = users.fetch(0).unwrap().unwrap().1;
    assert!(!first.ptr_eq(&second));
}

#[test]
fn test_json_and_snapshot() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann", "bob"])]);
    let session = session_with(&db);
    let mut users = User::search().execute(&session).unwrap();
    users.remove("2").unwrap();

    assert_eq!(users.to_json().unwrap(), json!([{ "id": 1, "name": "ann" }]));
    let snapshot = users.snapshot().unwrap();
    assert_eq!(snapshot.entity, "User");
    assert_eq!(snapshot.keys, vec!["1".to_string()]);
    assert_eq!(snapshot.removed, vec!["2".to_string()]);
    assert_eq!(snapshot.object("1"), Some(&json!({ "id": 1, "name": "ann" })));
    assert_eq!(snapshot.to_json()["count"], json!(1));
}

#[test]
fn test_collection_outliving_its_session() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["ann"])]);
    let mut users = {
        let session = session_with(&db);
        User::search().execute(&session).unwrap()
    };
    assert!(matches!(users.len(), Err(MapperError::MissingDatabase(_))));
}

#[test]
fn test_paged_search_is_not_a_list() {
    let db = MockDatabase::new(Backend::MySql).append_query_results(vec![rows(&["bob"])]);
    let session = session_with(&db);
    let mut users = User::search().limit(1).offset(1).execute(&session).unwrap();
    assert_eq!(users.len().unwrap(), 1);
    assert!(!users.is_list());
}
