mod common;

use std::time::Duration;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::{json, Value};

use common::{id_of, TestApp};

/// The listener writes asynchronously; waits until `count` rows named `event_name` exist.
async fn wait_for(app: &TestApp, event_name: &str, count: i64) -> Result<()> {
    for _ in 0..50 {
        let found: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM activity_log WHERE event_name = ?")
            .bind(event_name)
            .fetch_one(&app.pool)
            .await?;
        if found >= count {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    anyhow::bail!("timed out waiting for {count} x {event_name}")
}

#[tokio::test]
async fn mutations_land_in_the_activity_log() -> Result<()> {
    let app = TestApp::new().await?;
    let (client_id, client) = app.user("client").await?;
    let (executor_id, _) = app.user("executor").await?;
    let (manager_id, manager) = app.user("manager").await?;
    let (_, admin) = app.user("admin").await?;

    let id = id_of(&app.create_request(&client, "plumbing", "Shower head fell off the wall").await?);
    app.post(&format!("/api/requests/{id}/assign"), &manager, json!({ "executor_id": executor_id }))
        .await?;
    app.put("/api/settings/response_time_hours", &admin, json!({ "value": "12" }))
        .await?;

    wait_for(&app, "request.created", 1).await?;
    wait_for(&app, "request.assigned", 1).await?;
    wait_for(&app, "setting.updated", 1).await?;
    wait_for(&app, "user.login", 4).await?;

    let (status, entries) = app.get("/api/activity?event_name=request.assigned", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    let entry = &entries[0];
    assert_eq!(entry["actor_id"], manager_id);
    assert_eq!(entry["subject_id"], id);
    assert_eq!(entry["description"], "Executor assigned to request");
    assert_eq!(entry["properties"]["payload"]["old"]["status"], "new");
    assert_eq!(entry["properties"]["payload"]["new"]["status"], "assigned");

    let (_, created) = app.get("/api/activity?event_name=request.created", &admin).await?;
    assert_eq!(created[0]["actor_id"], client_id);
    assert!(created[0]["properties"]["payload"].get("old").is_none());

    let (_, settings) = app.get("/api/activity?event_name=setting.updated", &admin).await?;
    assert_eq!(settings[0]["severity"], "critical");

    let (_, logins) = app.get("/api/activity?event_name=user.login", &admin).await?;
    assert!(logins
        .as_array()
        .unwrap()
        .iter()
        .all(|entry: &Value| entry["severity"] == "noise"));
    Ok(())
}

#[tokio::test]
async fn activity_is_newest_first_and_admin_only() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, client) = app.user("client").await?;
    let (_, manager) = app.user("manager").await?;
    let (_, admin) = app.user("admin").await?;

    let first = id_of(&app.create_request(&client, "cleaning", "Windows in the lobby are dirty").await?);
    wait_for(&app, "request.created", 1).await?;
    let second = id_of(&app.create_request(&client, "cleaning", "Snow is blocking the entrance").await?);
    wait_for(&app, "request.created", 2).await?;

    let (status, body) = app.get("/api/activity", &manager).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role-insufficient");

    let (_, created) = app.get("/api/activity?event_name=request.created", &admin).await?;
    let subjects: Vec<i64> = created
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["subject_id"].as_i64().unwrap())
        .collect();
    assert_eq!(subjects, vec![second, first]);

    let (_, page) = app.get("/api/activity?event_name=request.created&limit=1", &admin).await?;
    assert_eq!(page.as_array().map(Vec::len), Some(1));
    assert_eq!(page[0]["subject_id"], second);

    app.delete(&format!("/api/requests/{first}"), &client).await?;
    wait_for(&app, "request.deleted", 1).await?;
    let (_, deleted) = app.get("/api/activity?event_name=request.deleted", &admin).await?;
    assert_eq!(deleted[0]["severity"], "critical");
    Ok(())
}
