//! Record service behavior through its RPC entry point, backed by the
//! in-memory store.

use std::sync::Arc;

use postgate_core::{CoreError, Record};
use postgate_posts::RecordService;
use postgate_rpc::services::{EmptyRequest, PostRequest, PostsResponse, Status, UpdatePostRequest};
use postgate_rpc::{topics, Message, Service, ServiceError};
use postgate_storage::MemoryRecordStore;

fn records(ids: std::ops::RangeInclusive<i32>) -> Vec<Record> {
    ids.map(|id| Record {
        id,
        owner_id: 100,
        title: format!("title {id}"),
        body: format!("body {id}"),
    })
    .collect()
}

fn service(rows: Vec<Record>) -> RecordService {
    RecordService::new(Arc::new(MemoryRecordStore::with_records(rows)))
}

async fn call<T: serde::Serialize>(
    svc: &RecordService,
    topic: &str,
    payload: &T,
) -> Result<Message, ServiceError> {
    svc.handle(Message::new(topic, payload).unwrap()).await
}

#[tokio::test]
async fn list_returns_every_row() {
    let svc = service(records(1..=6));
    let reply = call(&svc, topics::POST_LIST, &EmptyRequest {}).await.unwrap();
    let resp: PostsResponse = reply.decode().unwrap();
    assert_eq!(resp.posts.len(), 6);
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let svc = service(Vec::new());
    let err = call(&svc, topics::POST_GET, &PostRequest { id: 42 }).await.unwrap_err();
    assert_eq!(err.code, 404);
    assert_eq!(err.message, "record 42 not found");
}

#[tokio::test]
async fn update_then_get_scenario() {
    let svc = service(records(1..=6));

    let update = UpdatePostRequest {
        id: 3,
        title: Some("X".into()),
        body: None,
    };
    let reply = call(&svc, topics::POST_UPDATE, &update).await.unwrap();
    assert_eq!(reply.decode::<Status>().unwrap().info, "Updated");

    let record: Record = call(&svc, topics::POST_GET, &PostRequest { id: 3 })
        .await
        .unwrap()
        .decode()
        .unwrap();
    assert_eq!(record.title, "X");
    assert_eq!(record.body, "body 3");
    assert_eq!(record.owner_id, 100);

    let reply = call(&svc, topics::POST_DELETE, &PostRequest { id: 3 }).await.unwrap();
    assert_eq!(reply.decode::<Status>().unwrap().info, "Deleted");
    let err = call(&svc, topics::POST_GET, &PostRequest { id: 3 }).await.unwrap_err();
    assert_eq!(err.code, 404);
}

#[tokio::test]
async fn empty_update_is_bad_request() {
    let svc = service(records(1..=2));
    let update = UpdatePostRequest {
        id: 1,
        title: None,
        body: None,
    };
    let err = call(&svc, topics::POST_UPDATE, &update).await.unwrap_err();
    assert_eq!(err.code, 400);
    assert_eq!(err.message, CoreError::EmptyUpdate.to_string());
}

#[tokio::test]
async fn update_of_missing_id_is_not_found() {
    let svc = service(records(1..=2));
    let update = UpdatePostRequest {
        id: 9,
        title: Some("t".into()),
        body: None,
    };
    let err = call(&svc, topics::POST_UPDATE, &update).await.unwrap_err();
    assert_eq!(err.code, 404);
}

#[tokio::test]
async fn delete_is_idempotent() {
    let svc = service(records(1..=2));
    for _ in 0..2 {
        let reply = call(&svc, topics::POST_DELETE, &PostRequest { id: 2 }).await.unwrap();
        assert_eq!(reply.decode::<Status>().unwrap().info, "Deleted");
    }
    let reply = call(&svc, topics::POST_DELETE, &PostRequest { id: 77 }).await.unwrap();
    assert_eq!(reply.decode::<Status>().unwrap().info, "Deleted");
}

#[tokio::test]
async fn malformed_payload_is_bad_request() {
    let svc = service(Vec::new());
    let err = call(&svc, topics::POST_GET, &"three".to_string()).await.unwrap_err();
    assert_eq!(err.code, 400);
}
