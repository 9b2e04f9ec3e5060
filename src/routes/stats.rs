use std::collections::BTreeMap;

use axum::extract::State;
use axum::Json;
use sqlx::SqlitePool;

use crate::app::AppState;
use crate::authz::{authorize_collection, Action};
use crate::errors::AppResult;
use crate::jwt::AuthUser;
use crate::models::stats::DashboardStats;

async fn grouped_counts(pool: &SqlitePool, sql: &str) -> AppResult<BTreeMap<String, i64>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(sql).fetch_all(pool).await?;
    Ok(rows.into_iter().collect())
}

#[utoipa::path(
    get,
    path = "/api/stats/dashboard",
    tag = "Stats",
    security(("bearerAuth" = [])),
    responses(
        (status = 200, description = "Request and user counters", body = DashboardStats),
        (status = 403, description = "Managers and admins only")
    )
)]
pub async fn dashboard(State(state): State<AppState>, auth: AuthUser) -> AppResult<Json<DashboardStats>> {
    authorize_collection(state.policy.as_ref(), &auth.principal, Action::ViewDashboard)?;

    let by_status = grouped_counts(&state.pool, "SELECT status, COUNT(*) FROM requests GROUP BY status").await?;
    let by_role = grouped_counts(&state.pool, "SELECT role, COUNT(*) FROM users GROUP BY role").await?;

    Ok(Json(DashboardStats::from_counts(by_status, by_role)))
}
