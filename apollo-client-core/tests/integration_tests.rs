use std::sync::Arc;
use std::time::Duration;

use apollo_client_core::json_ext::Object;
use apollo_client_core::store::DataIdFromObject;
use apollo_client_core::store::TypenameAndId;
use apollo_client_core::Configuration;
use apollo_client_core::QueryManager;
use apollo_client_core::Transport;
use apollo_client_core::WatchQueryOptions;
use futures::StreamExt;
use serde_json_bytes::json;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;
use test_log::test;

use crate::common::data;
use crate::common::ScriptedTransport;

mod common;

fn manager(transport: &ScriptedTransport) -> QueryManager {
    let transport: Arc<dyn Transport> = Arc::new(transport.clone());
    let data_id_from_object: Arc<dyn DataIdFromObject> = Arc::new(TypenameAndId);
    QueryManager::builder()
        .transport(transport)
        .configuration(Configuration {
            add_typename: true,
            ..Default::default()
        })
        .data_id_from_object(data_id_from_object)
        .build()
}

fn object(value: Value) -> Object {
    value.as_object().cloned().unwrap()
}

fn secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}

#[test(tokio::test(start_paused = true))]
async fn polling_queries_share_wakeups() {
    let transport = ScriptedTransport::new(|request, index| {
        let field = request.operation_name.clone().unwrap_or_default().to_lowercase();
        let mut result = Object::new();
        result.insert(ByteString::from(field), json!(index));
        (Duration::ZERO, data(Value::Object(result)))
    });
    let manager = manager(&transport);

    let watch = |name: &str, interval: u64| {
        manager
            .watch_query(
                WatchQueryOptions::builder()
                    .query(format!("query {name} {{ {} }}", name.to_lowercase()))
                    .poll_interval(secs(interval))
                    .build(),
            )
            .unwrap()
    };
    let _a = watch("A", 4);
    let _b = watch("B", 4);
    let _c = watch("C", 10);

    tokio::time::sleep(Duration::from_millis(20_500)).await;

    let every_four = vec![secs(0), secs(4), secs(8), secs(12), secs(16), secs(20)];
    assert_eq!(transport.request_times("A"), every_four);
    assert_eq!(transport.request_times("B"), every_four);
    assert_eq!(transport.request_times("C"), vec![secs(0), secs(10), secs(20)]);
}

#[test(tokio::test(start_paused = true))]
async fn out_of_order_responses_keep_the_latest() {
    let transport = ScriptedTransport::new(|_, index| match index {
        0 => (secs(5), data(json!({"status": "old"}))),
        _ => (secs(1), data(json!({"status": "new"}))),
    });
    let manager = manager(&transport);

    let mut observable = manager
        .watch_query(WatchQueryOptions::builder().query("{ status }").build())
        .unwrap();
    observable.refetch(None).unwrap();

    let result = observable.next().await.unwrap();
    assert_eq!(result.data, Some(object(json!({"status": "new"}))));

    // the first response lands now, and is ignored
    tokio::time::sleep(secs(10)).await;
    assert_eq!(transport.request_count(), 2);
    assert_eq!(
        observable.current_result().unwrap().data,
        Some(object(json!({"status": "new"})))
    );
    assert_eq!(
        manager.read_query("{ status }", Object::new()).unwrap(),
        object(json!({"status": "new"}))
    );
    let state = manager.query_state(observable.query_id()).unwrap();
    assert_eq!(state.last_request_id, 2);
    assert!(!state.in_flight);
}

#[test(tokio::test(start_paused = true))]
async fn partial_results_then_complete_ones() {
    let transport = ScriptedTransport::new(|request, _| {
        if request.query.contains("email") {
            (
                secs(1),
                data(json!({"me": {"id": "1", "name": "Ann", "email": "ann@example.com", "__typename": "User"}})),
            )
        } else {
            (
                Duration::ZERO,
                data(json!({"me": {"id": "1", "name": "Ann", "__typename": "User"}})),
            )
        }
    });
    let manager = manager(&transport);

    let result = manager
        .query(WatchQueryOptions::builder().query("{ me { id name } }").build())
        .await
        .unwrap();
    assert!(!result.partial);

    let mut observable = manager
        .watch_query(
            WatchQueryOptions::builder()
                .query("{ me { id name email } }")
                .return_partial_data(true)
                .build(),
        )
        .unwrap();

    let first = observable.next().await.unwrap();
    assert!(first.loading);
    assert!(first.partial);
    assert_eq!(
        first.data,
        Some(object(json!({"me": {"id": "1", "name": "Ann", "__typename": "User"}})))
    );

    let second = observable.next().await.unwrap();
    assert!(!second.loading);
    assert!(!second.partial);
    assert_eq!(
        second.data,
        Some(object(json!({
            "me": {"id": "1", "name": "Ann", "email": "ann@example.com", "__typename": "User"}
        })))
    );
    assert_eq!(transport.request_count(), 2);
}

#[test(tokio::test(start_paused = true))]
async fn store_reset_refetches_watched_queries() {
    let transport = ScriptedTransport::new(|_, index| (Duration::ZERO, data(json!({"visits": index}))));
    let manager = manager(&transport);

    let mut observable = manager
        .watch_query(WatchQueryOptions::builder().query("{ visits }").build())
        .unwrap();
    let first = observable.next().await.unwrap();
    assert_eq!(first.data, Some(object(json!({"visits": 0}))));

    manager.reset_store();
    let second = observable.next().await.unwrap();
    assert_eq!(second.data, Some(object(json!({"visits": 1}))));
    assert_eq!(transport.request_count(), 2);
}

#[test(tokio::test(start_paused = true))]
async fn stopped_queries_ignore_late_responses() {
    let transport = ScriptedTransport::new(|_, _| (secs(2), data(json!({"late": true}))));
    let manager = manager(&transport);

    let observable = manager
        .watch_query(WatchQueryOptions::builder().query("{ late }").build())
        .unwrap();
    let query_id = observable.query_id().to_string();
    observable.unsubscribe();
    // kept while its request is out
    let stopped = manager.query_state(&query_id).unwrap();
    assert!(stopped.stopped);
    assert!(stopped.in_flight);

    tokio::time::sleep(secs(5)).await;
    assert_eq!(transport.request_count(), 1);
    assert!(manager.store_snapshot().is_empty());
    assert_eq!(manager.query_state(&query_id), None);
}

#[test(tokio::test(start_paused = true))]
async fn refetch_with_new_variables() {
    let transport = ScriptedTransport::new(|request, _| {
        let id = request.variables.get("id").cloned().unwrap_or_default();
        (
            Duration::ZERO,
            data(json!({"user": {"id": id, "__typename": "User"}})),
        )
    });
    let manager = manager(&transport);

    let mut observable = manager
        .watch_query(
            WatchQueryOptions::builder()
                .query("query User($id: ID = \"1\") { user(id: $id) { id } }")
                .build(),
        )
        .unwrap();
    let first = observable.next().await.unwrap();
    assert_eq!(first.data, Some(object(json!({"user": {"id": "1", "__typename": "User"}}))));

    observable.refetch(Some(object(json!({"id": "2"})))).unwrap();
    let second = observable.next().await.unwrap();
    assert_eq!(second.data, Some(object(json!({"user": {"id": "2", "__typename": "User"}}))));

    let store = manager.store_snapshot();
    assert!(store.contains("User:1"));
    assert!(store.contains("User:2"));
}
