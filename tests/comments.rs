mod common;

use anyhow::Result;
use axum::http::StatusCode;
use serde_json::json;

use common::{id_of, TestApp};

#[tokio::test]
async fn parties_discuss_a_request_in_order() -> Result<()> {
    let app = TestApp::new().await?;
    let (client_id, client) = app.user("client").await?;
    let (executor_id, executor) = app.user("executor").await?;
    let (_, manager) = app.user("manager").await?;
    let id = id_of(&app.create_request(&client, "elevator", "Elevator doors do not close").await?);
    app.post(&format!("/api/requests/{id}/assign"), &manager, json!({ "executor_id": executor_id }))
        .await?;

    let uri = format!("/api/requests/{id}/comments");
    let (status, first) = app.post(&uri, &client, json!({ "text": "It started yesterday" })).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["request_id"], id);
    assert_eq!(first["user_id"], client_id);

    let (status, _) = app
        .post("/api/comments", &executor, json!({ "request_id": id, "text": "Coming tomorrow morning" }))
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&uri, &manager, json!({ "text": "Тест: кириллица" })).await?;
    assert_eq!(status, StatusCode::CREATED);

    let (status, thread) = app.get(&uri, &executor).await?;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = thread
        .as_array()
        .unwrap()
        .iter()
        .map(|comment| comment["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, ["It started yesterday", "Coming tomorrow morning", "Тест: кириллица"]);
    assert_eq!(thread[1]["user"]["id"], executor_id);
    assert_eq!(thread[1]["user"]["role"], "executor");
    Ok(())
}

#[tokio::test]
async fn outsiders_cannot_read_or_write_comments() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, owner) = app.user("client").await?;
    let (_, stranger) = app.user("client").await?;
    let (_, idle_executor) = app.user("executor").await?;
    let id = id_of(&app.create_request(&owner, "cleaning", "Trash chute is blocked again").await?);
    let uri = format!("/api/requests/{id}/comments");

    for token in [&stranger, &idle_executor] {
        let (status, _) = app.get(&uri, token).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app.post(&uri, token, json!({ "text": "Let me in" })).await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = app
            .post("/api/comments", token, json!({ "request_id": id, "text": "Let me in" }))
            .await?;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    let (status, _) = app
        .post("/api/comments", &owner, json!({ "request_id": 777, "text": "Nobody home" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, thread) = app.get(&uri, &owner).await?;
    assert_eq!(thread, json!([]));
    Ok(())
}

#[tokio::test]
async fn comment_text_is_bounded() -> Result<()> {
    let app = TestApp::new().await?;
    let (_, client) = app.user("client").await?;
    let id = id_of(&app.create_request(&client, "other", "Door intercom is not working").await?);
    let uri = format!("/api/requests/{id}/comments");

    let (status, body) = app.post(&uri, &client, json!({ "text": "" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field"], "text");

    let (status, _) = app.post(&uri, &client, json!({ "text": "я".repeat(1000) })).await?;
    assert_eq!(status, StatusCode::CREATED);
    let (status, _) = app.post(&uri, &client, json!({ "text": "я".repeat(1001) })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    Ok(())
}
