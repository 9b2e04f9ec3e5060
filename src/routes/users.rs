use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::app::AppState;
use crate::authz::scope::Page;
use crate::authz::{authorize_collection, authorize_on, ensure_role, Action, ResourceContext};
use crate::db::users::{fetch_user, COLUMNS};
use crate::db::WriteTx;
use crate::errors::AppResult;
use crate::events::{log_activity, log_change};
use crate::extract::ValidJson;
use crate::jwt::AuthUser;
use crate::models::user::{DbUser, User, UserAdminUpdateRequest, UserListQuery, UserUpdateRequest};
use crate::utils::{hash_password, utc_now};

#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(UserListQuery),
    responses(
        (status = 200, description = "Users ordered by id", body = [User]),
        (status = 403, description = "Managers and admins only")
    )
)]
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<UserListQuery>,
) -> AppResult<Json<Vec<User>>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ListUsers)?;

    let page = Page::new(query.skip, query.limit);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(str::to_lowercase);

    let mut builder = QueryBuilder::<Sqlite>::new(format!("SELECT {COLUMNS} FROM users WHERE 1 = 1"));
    if let Some(role) = query.role {
        builder.push(" AND role = ").push_bind(role.as_str());
    }
    if let Some(status) = query.status {
        builder.push(" AND status = ").push_bind(status.as_str());
    }
    builder.push(" ORDER BY id ASC");

    // SQLite's lower() folds ASCII only, so search is matched here and paged after.
    if search.is_none() {
        page.push_limit(&mut builder);
    }

    let rows = builder.build_query_as::<DbUser>().fetch_all(&state.pool).await?;
    let users = rows
        .into_iter()
        .map(User::try_from)
        .collect::<Result<Vec<_>, _>>()?;

    let users = match search {
        Some(term) => page.slice(
            users
                .into_iter()
                .filter(|user| matches_search(user, &term))
                .collect(),
        ),
        None => users,
    };

    Ok(Json(users))
}

fn matches_search(user: &User, lowered_term: &str) -> bool {
    user.username.to_lowercase().contains(lowered_term) || user.fullname.to_lowercase().contains(lowered_term)
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = User),
        (status = 404, description = "Unknown user, or not visible to the caller")
    )
)]
pub async fn get_user(State(state): State<AppState>, auth: AuthUser, Path(id): Path<i64>) -> AppResult<Json<User>> {
    let ctx = ResourceContext::new().with_user(id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetUser, Action::GetUser, &ctx)?;

    Ok(Json(fetch_user(&state.pool, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = UserUpdateRequest,
    responses(
        (status = 200, description = "Updated profile", body = User),
        (status = 403, description = "Only the user may edit their own profile"),
        (status = 404, description = "Unknown user, or not visible to the caller")
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<UserUpdateRequest>,
) -> AppResult<Json<User>> {
    let old = fetch_user(&state.pool, id).await?;
    let ctx = ResourceContext::new().with_user(old.id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetUser, Action::UpdateUserProfile, &ctx)?;

    apply_update(&state.pool, id, &payload, None).await?;
    let user = fetch_user(&state.pool, id).await?;

    log_change(&state.events, "updated", Some(auth.id()), &user, Some(&old));
    Ok(Json(user))
}

#[utoipa::path(
    put,
    path = "/api/users/{id}/admin",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "User id")),
    request_body = UserAdminUpdateRequest,
    responses(
        (status = 200, description = "Updated user", body = User),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn update_user_admin(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
    ValidJson(payload): ValidJson<UserAdminUpdateRequest>,
) -> AppResult<Json<User>> {
    ensure_role(state.policy.as_ref(), &auth.principal, Action::UpdateUserAdmin)?;
    let ctx = ResourceContext::new().with_user(id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetUser, Action::UpdateUserAdmin, &ctx)?;

    let old = fetch_user(&state.pool, id).await?;
    apply_update(&state.pool, id, &payload.profile(), Some(&payload)).await?;
    let user = fetch_user(&state.pool, id).await?;

    let action = if old.role != user.role || old.status != user.status || old.is_active != user.is_active {
        tracing::info!(
            user_id = user.id,
            role = user.role.as_str(),
            status = user.status.as_str(),
            is_active = user.is_active,
            "account changed by admin"
        );
        "role_changed"
    } else {
        "updated"
    };
    log_change(&state.events, action, Some(auth.id()), &user, Some(&old));

    Ok(Json(user))
}

/// Single statement; absent fields keep their stored value.
async fn apply_update(
    pool: &SqlitePool,
    id: i64,
    profile: &UserUpdateRequest,
    admin: Option<&UserAdminUpdateRequest>,
) -> AppResult<()> {
    let password_hash = profile.password.as_deref().map(hash_password).transpose()?;

    sqlx::query(
        "UPDATE users SET fullname = COALESCE(?, fullname), address = COALESCE(?, address), \
         password_hash = COALESCE(?, password_hash), role = COALESCE(?, role), status = COALESCE(?, status), \
         is_active = COALESCE(?, is_active), updated_at = ? WHERE id = ?",
    )
    .bind(&profile.fullname)
    .bind(&profile.address)
    .bind(password_hash)
    .bind(admin.and_then(|a| a.role).map(|role| role.as_str()))
    .bind(admin.and_then(|a| a.status).map(|status| status.as_str()))
    .bind(admin.and_then(|a| a.is_active))
    .bind(utc_now())
    .bind(id)
    .execute(pool)
    .await?;

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    security(("bearerAuth" = [])),
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User, their requests and their comments deleted"),
        (status = 403, description = "Admins only"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn delete_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    ensure_role(state.policy.as_ref(), &auth.principal, Action::DeleteUser)?;
    let ctx = ResourceContext::new().with_user(id);
    authorize_on(state.policy.as_ref(), &auth.principal, Action::GetUser, Action::DeleteUser, &ctx)?;

    let user = fetch_user(&state.pool, id).await?;

    let mut tx = WriteTx::begin(&state.pool).await?;

    sqlx::query("DELETE FROM comments WHERE user_id = ? OR request_id IN (SELECT id FROM requests WHERE client_id = ?)")
        .bind(id)
        .bind(id)
        .execute(&mut *tx)
        .await?;

    let removed = sqlx::query("DELETE FROM requests WHERE client_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    let unassigned = sqlx::query("UPDATE requests SET executor_id = NULL, updated_at = ? WHERE executor_id = ?")
        .bind(utc_now())
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

    sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    tracing::info!(user_id = id, removed, unassigned, "user deleted");
    log_activity(&state.events, "deleted", Some(auth.id()), &user);

    Ok(StatusCode::NO_CONTENT)
}
