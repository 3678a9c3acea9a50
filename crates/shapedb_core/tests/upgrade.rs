//! Versioning and upgrade behaviour.

use shapedb_core::{Schema, SerdeCodec, Shape, Value};
use shapedb_testkit::prelude::*;

fn with_posts(version: u32) -> Schema {
    Schema::builder(version)
        .collection(USERS, "id", SerdeCodec::<User>::new())
        .collection("posts", "slug", Shape::record([("slug", Shape::Text)]))
        .build()
        .unwrap()
}

#[tokio::test]
async fn higher_version_keeps_records_and_adds_collections() {
    init_tracing();
    let db = TestDb::open(user_schema(1)).await;
    db.users().insert(User::new(1, "James")).await.unwrap();
    db.close();

    let upgraded = db.reopen(with_posts(2)).await.unwrap();
    let report = upgraded.upgrade().unwrap();
    assert_eq!((report.old_version, report.new_version), (1, 2));
    assert_eq!(report.created, vec!["posts".to_string()]);

    let users = upgraded.collection::<User>(USERS);
    assert_eq!(users.get(1).await.unwrap(), User::new(1, "James"));

    let posts = upgraded.collection::<Value>("posts");
    let post = Value::record([("slug", Value::from("hello"))]);
    posts.insert(post.clone()).await.unwrap();
    assert_eq!(posts.get("hello").await.unwrap(), post);
}

#[tokio::test]
async fn same_version_runs_no_upgrade() {
    let db = TestDb::open(user_schema(3)).await;
    assert!(db.upgrade().is_some());

    let again = db.reopen(user_schema(3)).await.unwrap();
    assert!(again.upgrade().is_none());
    assert_eq!(db.engine.stored_version(DB_NAME), Some(3));
}

#[tokio::test]
async fn lower_version_never_downgrades() {
    let db = TestDb::open(user_schema(2)).await;
    let err = db.reopen(user_schema(1)).await.unwrap_err();
    assert!(err.is_connection());
    assert_eq!(db.engine.stored_version(DB_NAME), Some(2));
}

#[tokio::test]
async fn retired_collections_are_kept() {
    let db = TestDb::open(with_posts(1)).await;
    db.close();

    let shrunk = db.reopen(user_schema(2)).await.unwrap();
    assert!(shrunk.upgrade().unwrap().created.is_empty());
    assert_eq!(
        db.engine.store_names(DB_NAME).unwrap(),
        vec!["posts".to_string(), USERS.to_string()]
    );

    // Not in the schema, so not reachable through this connection.
    let err = shrunk
        .collection::<Value>("posts")
        .count()
        .await
        .unwrap_err();
    assert!(err.is_collection_not_found());
}

#[tokio::test]
async fn connection_is_bound_to_requested_schema() {
    let db = TestDb::open(with_posts(1)).await;
    assert_eq!(db.version(), 1);
    assert_eq!(db.schema().collection_names(), vec!["posts", USERS]);
}
