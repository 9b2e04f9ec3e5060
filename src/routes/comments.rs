use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::authz::{authorize_on, Action, ResourceContext};
use crate::db::requests::fetch_request;
use crate::errors::AppResult;
use crate::events::log_activity;
use crate::extract::ValidJson;
use crate::jwt::AuthUser;
use crate::models::comment::{
    Comment, CommentCreateRequest, CommentWithUser, DbComment, DbCommentWithUser, RequestCommentCreateRequest,
};

#[utoipa::path(
    get,
    path = "/api/requests/{id}/comments",
    tag = "Comments",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Comments, oldest first", body = [CommentWithUser]),
        (status = 404, description = "Unknown request, or not visible to the caller")
    )
)]
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<i64>,
) -> AppResult<Json<Vec<CommentWithUser>>> {
    let request = fetch_request(&state.pool, request_id).await?;
    let ctx = ResourceContext::new().with_request(request.client_id, request.executor_id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetRequest, Action::ListComments, &ctx)?;

    let rows = sqlx::query_as::<_, DbCommentWithUser>(
        "SELECT c.id, c.request_id, c.user_id, c.text, c.created_at, \
         u.username, u.fullname, u.address, u.role \
         FROM comments c JOIN users u ON u.id = c.user_id \
         WHERE c.request_id = ? ORDER BY julianday(c.created_at) ASC, c.id ASC",
    )
    .bind(request_id)
    .fetch_all(&state.pool)
    .await?;

    let comments = rows
        .into_iter()
        .map(CommentWithUser::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(comments))
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/comments",
    tag = "Comments",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    request_body = CommentCreateRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Unknown request, or not visible to the caller"),
        (status = 422, description = "Text must be 1 to 1000 characters")
    )
)]
pub async fn create_request_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(request_id): Path<i64>,
    ValidJson(payload): ValidJson<CommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = add_comment(&state, &auth, request_id, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

#[utoipa::path(
    post,
    path = "/api/comments",
    tag = "Comments",
    security(("bearerAuth" = [])),
    request_body = RequestCommentCreateRequest,
    responses(
        (status = 201, description = "Comment added", body = Comment),
        (status = 404, description = "Unknown request, or not visible to the caller"),
        (status = 422, description = "Text must be 1 to 1000 characters")
    )
)]
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(payload): ValidJson<RequestCommentCreateRequest>,
) -> AppResult<(StatusCode, Json<Comment>)> {
    let comment = add_comment(&state, &auth, payload.request_id, &payload.text).await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

async fn add_comment(state: &AppState, auth: &AuthUser, request_id: i64, text: &str) -> AppResult<Comment> {
    let request = fetch_request(&state.pool, request_id).await?;
    let ctx = ResourceContext::new().with_request(request.client_id, request.executor_id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetRequest, Action::CreateComment, &ctx)?;

    let row = sqlx::query_as::<_, DbComment>(
        "INSERT INTO comments (request_id, user_id, text, created_at) VALUES (?, ?, ?, ?) \
         RETURNING id, request_id, user_id, text, created_at",
    )
    .bind(request_id)
    .bind(auth.id())
    .bind(text)
    .bind(crate::utils::utc_now())
    .fetch_one(&state.pool)
    .await?;

    let comment = Comment::from(row);
    log_activity(&state.events, "created", Some(auth.id()), &comment);
    Ok(comment)
}
