use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use crate::app::AppState;
use crate::authz::scope::Page;
use crate::authz::{authorize_collection, authorize_on, ensure_role, Action, RequestScope, ResourceContext};
use crate::db::requests::{fetch_request, fetch_with_parties, store_lifecycle};
use crate::db::settings::get_value;
use crate::db::users::fetch_db_user;
use crate::db::WriteTx;
use crate::errors::{AppError, AppResult};
use crate::events::{log_activity, log_change};
use crate::extract::ValidJson;
use crate::jwt::AuthUser;
use crate::lifecycle::{
    deadline, reduce, response_time_hours, LifecycleEvent, LifecycleState, RESPONSE_TIME_HOURS_KEY,
};
use crate::models::request::{
    AssignRequest, DbRequestWithParties, RequestCreateRequest, RequestListQuery, RequestUpdateRequest,
    RequestWithParties, ServiceRequest, DEFAULT_PRIORITY,
};
use crate::models::user::{Role, User};
use crate::utils::utc_now;

fn request_context(request: &ServiceRequest) -> ResourceContext {
    ResourceContext::new().with_request(request.client_id, request.executor_id)
}

#[utoipa::path(
    get,
    path = "/api/requests",
    tag = "Requests",
    security(("bearerAuth" = [])),
    params(RequestListQuery),
    responses((status = 200, description = "Visible requests, newest first", body = [RequestWithParties]))
)]
pub async fn list_requests(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RequestListQuery>,
) -> AppResult<Json<Vec<RequestWithParties>>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ListRequests)?;

    let scope = RequestScope::for_principal(&auth.principal);
    let page = Page::new(query.skip, query.limit);

    let mut builder = QueryBuilder::<Sqlite>::new(format!("{} WHERE 1 = 1", DbRequestWithParties::SELECT));
    scope.push_predicate(&mut builder, "r");
    if let Some(status) = query.status {
        builder.push(" AND r.status = ").push_bind(status.as_str());
    }
    if let Some(request_type) = query.request_type {
        builder.push(" AND r.type = ").push_bind(request_type.as_str());
    }
    builder.push(" ORDER BY julianday(r.created_at) DESC, r.id DESC");
    page.push_limit(&mut builder);

    let rows = builder
        .build_query_as::<DbRequestWithParties>()
        .fetch_all(&state.pool)
        .await?;

    let requests = rows
        .into_iter()
        .map(RequestWithParties::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Json(requests))
}

#[utoipa::path(
    get,
    path = "/api/requests/{id}",
    tag = "Requests",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    responses(
        (status = 200, description = "Request with client and executor", body = RequestWithParties),
        (status = 404, description = "Unknown request, or not visible to the caller")
    )
)]
pub async fn get_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RequestWithParties>> {
    let found = fetch_with_parties(&state.pool, id).await?;
    authorize_on(
        state.policy.as_ref(),
        &auth.principal,
        Action::GetRequest,
        Action::GetRequest,
        &request_context(&found.request),
    )?;

    Ok(Json(found))
}

#[utoipa::path(
    post,
    path = "/api/requests",
    tag = "Requests",
    security(("bearerAuth" = [])),
    request_body = RequestCreateRequest,
    responses(
        (status = 201, description = "Request filed", body = ServiceRequest),
        (status = 403, description = "Only clients file requests"),
        (status = 422, description = "Invalid field")
    )
)]
pub async fn create_request(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidJson(payload): ValidJson<RequestCreateRequest>,
) -> AppResult<(StatusCode, Json<ServiceRequest>)> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::CreateRequest)?;

    let mut tx = WriteTx::begin(&state.pool).await?;

    let hours = response_time_hours(get_value(&mut *tx, RESPONSE_TIME_HOURS_KEY).await?.as_deref());
    let now = utc_now();

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO requests (client_id, type, description, status, priority, created_at, updated_at, deadline) \
         VALUES (?, ?, ?, 'new', ?, ?, ?, ?) RETURNING id",
    )
    .bind(auth.id())
    .bind(payload.request_type.as_str())
    .bind(&payload.description)
    .bind(DEFAULT_PRIORITY)
    .bind(now)
    .bind(now)
    .bind(deadline(now, hours))
    .fetch_one(&mut *tx)
    .await?;

    let request = fetch_request(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(request_id = id, client_id = auth.id(), hours, "request created");
    log_activity(&state.events, "created", Some(auth.id()), &request);

    Ok((StatusCode::CREATED, Json(request)))
}

/// The policy action guarding each field present in `payload`.
fn update_actions(payload: &RequestUpdateRequest) -> Vec<Action> {
    let mut actions = Vec::with_capacity(3);
    if payload.description.is_some() {
        actions.push(Action::UpdateRequestDescription);
    }
    if payload.status.is_some() {
        actions.push(Action::UpdateRequestStatus);
    }
    if payload.priority.is_some() {
        actions.push(Action::UpdateRequestPriority);
    }
    actions
}

#[utoipa::path(
    put,
    path = "/api/requests/{id}",
    tag = "Requests",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    request_body = RequestUpdateRequest,
    responses(
        (status = 200, description = "Updated request", body = ServiceRequest),
        (status = 403, description = "A supplied field may not be changed by the caller; nothing applied"),
        (status = 404, description = "Unknown request, or not visible to the caller"),
        (status = 409, description = "Status change rejected by the state machine")
    )
)]
pub async fn update_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<RequestUpdateRequest>,
) -> AppResult<Json<ServiceRequest>> {
    let policy = state.policy.as_ref();
    let actions = update_actions(&payload);
    for action in &actions {
        ensure_role(policy, &auth.principal, *action)?;
    }

    let mut tx = WriteTx::begin(&state.pool).await?;
    let old = fetch_request(&mut *tx, id).await?;
    let ctx = request_context(&old);

    authorize_on(policy, &auth.principal, Action::GetRequest, Action::GetRequest, &ctx)?;
    for action in actions.iter().copied() {
        authorize_on(policy, &auth.principal, Action::GetRequest, action, &ctx)?;
    }

    if actions.is_empty() {
        return Ok(Json(old));
    }

    let lifecycle = match payload.status {
        Some(status) => {
            let transition = reduce(
                &LifecycleState::from(&old),
                LifecycleEvent::SetStatus(status),
                utc_now(),
                state.transitions,
            )?;
            transition.state
        }
        None => LifecycleState::from(&old),
    };

    sqlx::query("UPDATE requests SET description = ?, priority = ? WHERE id = ?")
        .bind(payload.description.as_deref().unwrap_or(&old.description))
        .bind(payload.priority.unwrap_or(old.priority))
        .bind(id)
        .execute(&mut *tx)
        .await?;
    store_lifecycle(&mut *tx, id, &lifecycle).await?;

    let request = fetch_request(&mut *tx, id).await?;
    tx.commit().await?;

    if old.status != request.status {
        tracing::info!(
            request_id = id,
            from = old.status.as_str(),
            to = request.status.as_str(),
            "request status changed"
        );
    }
    log_change(&state.events, "updated", Some(auth.id()), &request, Some(&old));

    Ok(Json(request))
}

/// The assignee must exist and hold the executor role.
async fn load_executor(conn: &mut SqliteConnection, executor_id: i64) -> AppResult<User> {
    let executor: User = fetch_db_user(conn, executor_id)
        .await?
        .ok_or_else(|| AppError::not_found("executor not found"))?
        .try_into()?;

    if executor.role != Role::Executor {
        return Err(AppError::validation("executor_id", "user is not an executor"));
    }
    Ok(executor)
}

#[utoipa::path(
    post,
    path = "/api/requests/{id}/assign",
    tag = "Requests",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    request_body = AssignRequest,
    responses(
        (status = 200, description = "Executor assigned", body = ServiceRequest),
        (status = 403, description = "Managers and admins only"),
        (status = 404, description = "Unknown request or executor"),
        (status = 409, description = "Request can no longer be assigned"),
        (status = 422, description = "Target user is not an executor")
    )
)]
pub async fn assign_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<AssignRequest>,
) -> AppResult<Json<ServiceRequest>> {
    let policy = state.policy.as_ref();
    ensure_role(policy, &auth.principal, Action::AssignExecutor)?;

    let mut tx = WriteTx::begin(&state.pool).await?;
    let old = fetch_request(&mut *tx, id).await?;
    authorize_on(policy, &auth.principal, Action::GetRequest, Action::AssignExecutor, &request_context(&old))?;

    let executor = load_executor(&mut tx, payload.executor_id).await?;

    let transition = reduce(
        &LifecycleState::from(&old),
        LifecycleEvent::Assign { executor_id: executor.id },
        utc_now(),
        state.transitions,
    )?;

    store_lifecycle(&mut *tx, id, &transition.state).await?;
    let request = fetch_request(&mut *tx, id).await?;
    tx.commit().await?;

    tracing::info!(request_id = id, executor_id = executor.id, "executor assigned");
    log_change(&state.events, "assigned", Some(auth.id()), &request, Some(&old));

    Ok(Json(request))
}

#[utoipa::path(
    delete,
    path = "/api/requests/{id}",
    tag = "Requests",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "Request id")),
    responses(
        (status = 204, description = "Request and its comments deleted"),
        (status = 403, description = "Only the owning client or an admin"),
        (status = 404, description = "Unknown request, or not visible to the caller")
    )
)]
pub async fn delete_request(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let policy = state.policy.as_ref();
    ensure_role(policy, &auth.principal, Action::DeleteRequest)?;

    let mut tx = WriteTx::begin(&state.pool).await?;
    let request = fetch_request(&mut *tx, id).await?;
    authorize_on(policy, &auth.principal, Action::GetRequest, Action::DeleteRequest, &request_context(&request))?;

    sqlx::query("DELETE FROM comments WHERE request_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM requests WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;

    log_activity(&state.events, "deleted", Some(auth.id()), &request);
    Ok(StatusCode::NO_CONTENT)
}
