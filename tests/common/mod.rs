#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;
use tempfile::{tempdir, TempDir};
use tower::util::ServiceExt; // for `oneshot`

use housing_desk::jwt::JwtConfig;
use housing_desk::lifecycle::TransitionMode;
use housing_desk::{router, AppState};

pub const PASSWORD: &str = "secret123";

pub struct TestApp {
    pub app: Router,
    pub pool: SqlitePool,
    next_phone: std::cell::Cell<u64>,
    _dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Result<Self> {
        Self::with_mode(TransitionMode::Permissive).await
    }

    pub async fn with_mode(mode: TransitionMode) -> Result<Self> {
        let dir = tempdir().context("failed to create tempdir")?;
        let db_path = dir.path().join("test.db");

        let opts = housing_desk::db::tune(SqliteConnectOptions::new().filename(db_path.as_path()));
        let pool = SqlitePool::connect_with(opts).await?;

        let migrator =
            sqlx::migrate::Migrator::new(std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")).await?;
        migrator.run(&pool).await?;

        let state = AppState::new(pool.clone(), JwtConfig::new("test-secret", 24), mode);
        state.spawn_activity_listener();

        Ok(Self {
            app: router(state),
            pool,
            next_phone: std::cell::Cell::new(79160000001),
            _dir: dir,
        })
    }

    /// Sends a request and returns the status with the body (`Null` when empty).
    pub async fn send(&self, method: &str, uri: &str, token: Option<&str>, body: Option<Value>) -> Result<(StatusCode, Value)> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))?,
            None => builder.body(Body::empty())?,
        };

        let resp = self.app.clone().oneshot(req).await?;
        let status = resp.status();
        let bytes = body::to_bytes(resp.into_body(), 10_485_760).await?;
        // axum's own rejections (query strings, missing routes) are plain text.
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Ok((status, value))
    }

    pub async fn get(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> Result<(StatusCode, Value)> {
        self.send("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> Result<(StatusCode, Value)> {
        self.send("DELETE", uri, Some(token), None).await
    }

    pub fn fresh_username(&self) -> String {
        let phone = self.next_phone.get();
        self.next_phone.set(phone + 1);
        phone.to_string()
    }

    pub async fn register(&self, username: &str, fullname: &str) -> Result<Value> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/register",
                None,
                Some(serde_json::json!({
                    "username": username,
                    "password": PASSWORD,
                    "fullname": fullname,
                    "address": "Lenina st. 1"
                })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {status} {body}");
        Ok(body)
    }

    pub async fn login(&self, username: &str) -> Result<String> {
        let (status, body) = self
            .send(
                "POST",
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": PASSWORD })),
            )
            .await?;
        anyhow::ensure!(status == StatusCode::OK, "login failed: {status} {body}");
        body.get("access_token")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("missing access_token")
    }

    /// Registers a user, promotes it to `role` directly in storage, and logs in.
    pub async fn user(&self, role: &str) -> Result<(i64, String)> {
        let username = self.fresh_username();
        let user = self.register(&username, &format!("Test {role}")).await?;
        let id = user["id"].as_i64().context("missing user id")?;

        sqlx::query("UPDATE users SET role = ? WHERE id = ?")
            .bind(role)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok((id, self.login(&username).await?))
    }

    pub async fn create_request(&self, token: &str, kind: &str, description: &str) -> Result<Value> {
        let (status, body) = self
            .post("/api/requests", token, serde_json::json!({ "type": kind, "description": description }))
            .await?;
        anyhow::ensure!(status == StatusCode::CREATED, "create request failed: {status} {body}");
        Ok(body)
    }
}

pub fn id_of(value: &Value) -> i64 {
    value["id"].as_i64().unwrap_or_default()
}
