//! Gate serialization across concurrent callers.

use futures::future::join_all;
use shapedb_core::{
    Config, ConnectionManager, CoreError, GateScope, InMemoryEngine, OperationGate, Value,
};
use shapedb_testkit::prelude::*;
use tokio::sync::oneshot;

#[tokio::test]
async fn back_to_back_operations_observe_call_order() {
    let db = TestDb::open_deferred(user_schema(1)).await;
    let users = db.users();

    let (inserted, read, removed, after) = tokio::join!(
        users.insert(User::new(1, "James")),
        users.get(1),
        users.remove(1),
        users.get_optional(1),
    );

    inserted.unwrap();
    assert_eq!(read.unwrap(), User::new(1, "James"));
    assert!(removed.unwrap());
    assert_eq!(after.unwrap(), None);
}

#[tokio::test]
async fn interleaved_puts_apply_in_order() {
    let db = TestDb::open_deferred(user_schema(1)).await;
    let users = db.users();

    let writes = (0..20).map(|i| users.put(User::new(1, format!("v{i}"))));
    for result in join_all(writes).await {
        result.unwrap();
    }

    assert_eq!(users.get(1).await.unwrap().name, "v19");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn spawned_writers_all_land() {
    let db = TestDb::open_deferred(user_schema(1)).await;

    let mut handles = Vec::new();
    for id in 0..32 {
        let users = db.users();
        handles.push(tokio::spawn(async move {
            users.insert(User::new(id, "x")).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(db.users().count().await.unwrap(), 32);
    assert_eq!(db.gate().pending(), 0);
}

#[tokio::test]
async fn connections_sharing_a_gate_serialize_together() {
    let engine = InMemoryEngine::new();
    let gate = OperationGate::new();
    let manager = ConnectionManager::with_config(
        engine.clone(),
        Config::new().gate_scope(GateScope::Connection),
    )
    .with_gate(gate.clone());

    let a = manager.open("a", shaped_user_schema(1)).await.unwrap();
    let b = manager.open("b", shaped_user_schema(1)).await.unwrap();
    assert!(a.gate().same_domain(b.gate()));

    let record = Value::record([("id", Value::from(1)), ("name", Value::from("x"))]);
    let a_users = a.collection::<Value>(USERS);
    let b_users = b.collection::<Value>(USERS);
    let (ra, rb) = tokio::join!(
        a_users.insert(record.clone()),
        b_users.insert(record.clone()),
    );
    ra.unwrap();
    rb.unwrap();
    assert_eq!(engine.record_count("a", USERS), Some(1));
    assert_eq!(engine.record_count("b", USERS), Some(1));
}

#[tokio::test]
async fn close_while_queued_rejects_later_operations() {
    let db = TestDb::open_deferred(user_schema(1)).await;
    db.users().insert(User::new(1, "James")).await.unwrap();

    // Hold the gate so the next operation has to queue behind it.
    let gate = db.gate().clone();
    let (held_tx, held_rx) = oneshot::channel();
    let (release_tx, release_rx) = oneshot::channel::<()>();
    let holder = tokio::spawn(async move {
        gate.run_exclusive(move || async move {
            let _ = held_tx.send(());
            let _ = release_rx.await;
            Ok(())
        })
        .await
    });
    held_rx.await.unwrap();

    let users = db.users();
    let queued = tokio::spawn(async move { users.get(1).await });
    tokio::task::yield_now().await;

    db.close();
    release_tx.send(()).unwrap();
    holder.await.unwrap().unwrap();

    assert!(matches!(
        queued.await.unwrap(),
        Err(CoreError::ConnectionClosed)
    ));
}
