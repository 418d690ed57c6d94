//! Board placement, audit trail and public routes over HTTP

mod common;

use common::{HEX, TestApp, new_op_id, token};
use http::{Method, StatusCode};
use serde_json::{Value, json};

fn append(sticker_id: Value, op_id: &str) -> Value {
    json!({
        "opId": op_id,
        "stickers": [{ "stickerId": sticker_id, "x": 12.5, "y": 40.0 }],
    })
}

async fn cheers_of(app: &TestApp, user_id: &str) -> Value {
    let (raw,): (String,) = sqlx::query_as("SELECT cheers FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_one(&app.state.pool)
        .await
        .unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn guest_cheer_placement_consumes_one_credit_and_replays() {
    let app = TestApp::new().await;
    app.seed_user("owner", "[]").await;
    app.seed_user("guest", "[2, 5]").await;
    app.seed_board("b1", "owner").await;
    let guest = token("guest", "user");
    let op_id = new_op_id();

    let placed = app
        .send(Method::PUT, "/api/boards/b1", Some(&guest), Some(append(json!(2), &op_id)))
        .await;
    assert_eq!(placed.status, StatusCode::OK);
    assert_eq!(placed.body["data"]["consumedStickerId"], "2");
    assert_eq!(placed.body["data"]["board"]["version"], 2);
    assert_eq!(cheers_of(&app, "guest").await, json!([5]));

    // same opId: cached ack, no second consumption
    let replay = app
        .send(Method::PUT, "/api/boards/b1", Some(&guest), Some(append(json!(2), &op_id)))
        .await;
    assert_eq!(replay.status, StatusCode::OK);
    assert_eq!(replay.body["cached"], true);
    assert_eq!(cheers_of(&app, "guest").await, json!([5]));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_legacy_placements_apply_exactly_once() {
    let app = TestApp::file_backed().await;
    app.seed_user("owner", "[]").await;
    app.seed_user("guest", "[2, 2]").await;
    app.seed_board("b1", "owner").await;
    let guest = token("guest", "user");

    let first = app.send(
        Method::PUT,
        "/api/boards/b1",
        Some(&guest),
        Some(append(json!(2), &new_op_id())),
    );
    let second = app.send(
        Method::PUT,
        "/api/boards/b1",
        Some(&guest),
        Some(append(json!(2), &new_op_id())),
    );
    let (first, second) = tokio::join!(first, second);

    let statuses = [first.status, second.status];
    assert_eq!(statuses.iter().filter(|s| **s == StatusCode::OK).count(), 1);
    // the loser sees the board already grown, never a storage error
    assert!(statuses.contains(&StatusCode::BAD_REQUEST), "{statuses:?}");

    let (stickers,): (String,) = sqlx::query_as("SELECT stickers FROM boards WHERE id = 'b1'")
        .fetch_one(&app.state.pool)
        .await
        .unwrap();
    let stickers: Vec<Value> = serde_json::from_str(&stickers).unwrap();
    assert_eq!(stickers.len(), 1);
    assert_eq!(cheers_of(&app, "guest").await, json!([2]));
}

#[tokio::test]
async fn guest_without_credit_is_rejected_and_ledger_failed() {
    let app = TestApp::new().await;
    app.seed_user("owner", "[]").await;
    app.seed_user("guest", "[]").await;
    app.seed_board("b1", "owner").await;
    let guest = token("guest", "user");
    let op_id = new_op_id();

    let response = app
        .send(Method::PUT, "/api/boards/b1", Some(&guest), Some(append(json!(7), &op_id)))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(app.ledger_status(&op_id).await.as_deref(), Some("failed"));

    let (version,): (i64,) = sqlx::query_as("SELECT version FROM boards WHERE id = 'b1'")
        .fetch_one(&app.state.pool)
        .await
        .unwrap();
    assert_eq!(version, 1);

    // failed entries may be retried under the same opId
    sqlx::query("UPDATE users SET cheers = '[7]' WHERE id = 'guest'")
        .execute(&app.state.pool)
        .await
        .unwrap();
    let retry = app
        .send(Method::PUT, "/api/boards/b1", Some(&guest), Some(append(json!(7), &op_id)))
        .await;
    assert_eq!(retry.status, StatusCode::OK);
    assert_eq!(app.ledger_status(&op_id).await.as_deref(), Some("completed"));
}

#[tokio::test]
async fn guest_cannot_touch_other_fields() {
    let app = TestApp::new().await;
    app.seed_user("owner", "[]").await;
    app.seed_user("guest", "[2]").await;
    app.seed_board("b1", "owner").await;
    let guest = token("guest", "user");

    let mut body = append(json!(2), &new_op_id());
    body["name"] = json!("taken over");
    let response = app.send(Method::PUT, "/api/boards/b1", Some(&guest), Some(body)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(cheers_of(&app, "guest").await, json!([2]));
}

#[tokio::test]
async fn owner_placement_draws_from_inventory() {
    let app = TestApp::new().await;
    app.seed_user("owner", "[]").await;
    app.seed_board("b1", "owner").await;
    let admin = token("admin-1", "admin");
    let owner = token("owner", "user");

    let awarded = app
        .send(
            Method::POST,
            "/api/inventory/award",
            Some(&admin),
            Some(json!({ "opId": new_op_id(), "userId": "owner", "stickerId": HEX })),
        )
        .await;
    assert_eq!(awarded.status, StatusCode::OK);

    let placed = app
        .send(Method::PUT, "/api/boards/b1", Some(&owner), Some(append(json!(HEX), &new_op_id())))
        .await;
    assert_eq!(placed.status, StatusCode::OK);
    assert_eq!(placed.body["data"]["consumedStickerId"], HEX);
    assert_eq!(app.quantity("owner", HEX).await, Some(0));

    // a second copy is no longer in stock
    let body = json!({
        "opId": new_op_id(),
        "stickers": [
            { "stickerId": HEX, "x": 12.5, "y": 40.0 },
            { "stickerId": HEX, "x": 1.0, "y": 1.0 },
        ],
    });
    let denied = app.send(Method::PUT, "/api/boards/b1", Some(&owner), Some(body)).await;
    assert_eq!(denied.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn audit_trail_records_awards() {
    let app = TestApp::new().await;
    let tasks = app.state.start_background_tasks();
    let admin = token("admin-1", "admin");
    let op_id = new_op_id();

    let awarded = app
        .send(
            Method::POST,
            "/api/inventory/award",
            Some(&admin),
            Some(json!({ "opId": op_id, "userId": "u1", "stickerId": HEX })),
        )
        .await;
    assert_eq!(awarded.status, StatusCode::OK);

    // draining the worker flushes every queued record
    tasks.shutdown().await;

    let listed = app
        .send(Method::GET, "/api/audit?action=sticker_awarded", Some(&admin), None)
        .await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["total"], 1);
    assert_eq!(listed.body["items"][0]["op_id"], op_id.as_str());
    assert_eq!(listed.body["items"][0]["operator_id"], "admin-1");

    let verified = app.send(Method::GET, "/api/audit/verify", Some(&admin), None).await;
    assert_eq!(verified.status, StatusCode::OK);
    assert_eq!(verified.body["chain_intact"], true);

    let user = token("u1", "user");
    let denied = app.send(Method::GET, "/api/audit", Some(&user), None).await;
    assert_eq!(denied.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new().await;

    let response = app.send(Method::GET, "/api/health", None, None).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");
    assert_eq!(response.body["environment"], "test");
    assert_eq!(response.body["database"]["status"], "ok");

    let guarded = app.send(Method::GET, &format!("/api/ledger/{}", new_op_id()), None, None).await;
    assert_eq!(guarded.status, StatusCode::UNAUTHORIZED);
}
