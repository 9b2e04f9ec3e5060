mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{id_of, TestApp};

#[tokio::test]
async fn settings_are_admin_only() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("admin").await?;
    let (_, manager) = app.user("manager").await?;

    let (status, body) = app.get("/api/settings", &manager).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "role-insufficient");
    let (status, _) = app
        .put("/api/settings/response_time_hours", &manager, json!({ "value": "1" }))
        .await?;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, all) = app.get("/api/settings", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all[0]["key"], "response_time_hours");
    assert_eq!(all[0]["value"], "24");

    let (status, one) = app.get("/api/settings/response_time_hours", &admin).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["value"], "24");

    let (status, _) = app.get("/api/settings/office_phone", &admin).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn response_time_must_stay_parseable() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, admin) = app.user("admin").await?;
    let uri = "/api/settings/response_time_hours";

    for bad in ["0", "-3", "two days"] {
        let (status, body) = app.put(uri, &admin, json!({ "value": bad })).await?;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{bad}");
        assert_eq!(body["field"], "value");
    }

    let (status, _) = app.put("/api/settings/office_phone", &admin, json!({ "value": "123" })).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, updated) = app.put(uri, &admin, json!({ "value": "72" })).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["value"], "72");
    Ok(())
}

#[tokio::test]
async fn dashboard_counts_requests_and_users() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, client) = app.user("client").await?;
    let (executor_id, executor) = app.user("executor").await?;
    let (_, manager) = app.user("manager").await?;

    let (status, empty) = app.get("/api/stats/dashboard", &manager).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(empty["total_requests"], 0);
    assert_eq!(empty["requests_by_status"]["completed"], 0);

    let first = id_of(&app.create_request(&client, "plumbing", "Kitchen sink drains slowly").await?);
    let second = id_of(&app.create_request(&client, "heating", "Radiator valve is leaking").await?);
    let third = id_of(&app.create_request(&client, "other", "Front door lock is broken").await?);
    app.create_request(&client, "cleaning", "Basement needs to be cleaned").await?;

    for id in [first, second] {
        app.post(&format!("/api/requests/{id}/assign"), &manager, json!({ "executor_id": executor_id }))
            .await?;
    }
    app.put(&format!("/api/requests/{second}"), &executor, json!({ "status": "completed" }))
        .await?;
    app.put(&format!("/api/requests/{third}"), &client, json!({ "status": "cancelled" }))
        .await?;

    let (_, stats) = app.get("/api/stats/dashboard", &manager).await?;
    assert_eq!(stats["total_requests"], 4);
    assert_eq!(stats["new_requests"], 1);
    assert_eq!(stats["in_progress_requests"], 1);
    assert_eq!(stats["completed_requests"], 1);
    assert_eq!(stats["cancelled_requests"], 1);
    assert_eq!(stats["total_users"], 3);
    assert_eq!(stats["total_clients"], 1);
    assert_eq!(stats["total_executors"], 1);
    assert_eq!(stats["total_admins"], 0);
    assert_eq!(stats["users_by_role"]["manager"], 1);

    let (status, _) = app.get("/api/stats/dashboard", &executor).await?;
    assert_eq!(status, StatusCode::FORBIDDEN);
    Ok(())
}
