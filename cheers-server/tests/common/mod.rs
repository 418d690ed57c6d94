//! Shared harness for HTTP-level tests: full router over SQLite, minted tokens

#![allow(dead_code)]

use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode};
use http_body_util::BodyExt;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use cheers_server::auth::{Claims, JwtConfig};
use cheers_server::core::{Config, ServerState, build_app};
use cheers_server::db::DbService;

pub const HEX: &str = "65a1b2c3d4e5f6a7b8c9d0e1";

pub struct TestApp {
    pub state: ServerState,
    pub app: Router,
    /// Keeps the database file alive for file-backed apps
    _dir: Option<TempDir>,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: http::HeaderMap,
    pub body: Value,
}

impl TestApp {
    /// Single-connection in-memory database: requests are serialized
    pub async fn new() -> Self {
        let db = DbService::in_memory().await.expect("in-memory database");
        Self::with_db(Config::for_tests(), db, None).await
    }

    /// WAL database file with a real pool, the way production runs
    pub async fn file_backed() -> Self {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("cheers.db");
        let mut config = Config::for_tests();
        config.database_path = path.to_string_lossy().into_owned();
        config.db_max_connections = 5;
        let db = DbService::new(&config.database_path, config.db_max_connections)
            .await
            .expect("file database");
        Self::with_db(config, db, Some(dir)).await
    }

    async fn with_db(config: Config, db: DbService, dir: Option<TempDir>) -> Self {
        let state = ServerState::with_database(config, db)
            .await
            .expect("server state");
        let app = build_app(&state);
        Self {
            state,
            app,
            _dir: dir,
        }
    }

    pub async fn send(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(http::header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(http::header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .app
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("infallible router");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }

    pub async fn seed_user(&self, id: &str, cheers: &str) {
        sqlx::query("INSERT INTO users (id, cheers) VALUES (?, ?)")
            .bind(id)
            .bind(cheers)
            .execute(&self.state.pool)
            .await
            .expect("seed user");
    }

    pub async fn seed_board(&self, id: &str, owner_id: &str) {
        sqlx::query(
            "INSERT INTO boards (id, owner_id, name, description, stickers, version, updated_at) \
             VALUES (?, ?, 'Week 1', '', '[]', 1, 0)",
        )
        .bind(id)
        .bind(owner_id)
        .execute(&self.state.pool)
        .await
        .expect("seed board");
    }

    pub async fn quantity(&self, user_id: &str, sticker_id: &str) -> Option<i64> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT quantity FROM inventory WHERE user_id = ? AND sticker_id = ?")
                .bind(user_id)
                .bind(sticker_id)
                .fetch_optional(&self.state.pool)
                .await
                .expect("quantity");
        row.map(|r| r.0)
    }

    pub async fn ledger_status(&self, op_id: &str) -> Option<String> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT status FROM operation_ledger WHERE op_id = ?")
                .bind(op_id)
                .fetch_optional(&self.state.pool)
                .await
                .expect("ledger status");
        row.map(|r| r.0)
    }
}

/// Mint an actor token the way the external auth service would
pub fn token(sub: &str, role: &str) -> String {
    let config = JwtConfig::for_tests();
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: sub.to_string(),
        username: sub.to_string(),
        role: role.to_string(),
        exp: now + 3600,
        iat: now,
        iss: config.issuer.clone(),
        aud: config.audience.clone(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .expect("sign token")
}

pub fn new_op_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
