use sqlx::{Sqlite, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::lifecycle::LifecycleState;
use crate::models::request::{DbRequestWithParties, DbServiceRequest, RequestWithParties, ServiceRequest};

const COLUMNS: &str = "id, client_id, executor_id, type, description, status, priority, created_at, updated_at, \
	assigned_at, started_at, completed_at, deadline";

pub async fn fetch_request<'e, E>(executor: E, request_id: i64) -> AppResult<ServiceRequest>
where
	E: sqlx::Executor<'e, Database = Sqlite>,
{
	sqlx::query_as::<_, DbServiceRequest>(&format!("SELECT {COLUMNS} FROM requests WHERE id = ?"))
		.bind(request_id)
		.fetch_optional(executor)
		.await?
		.ok_or_else(|| AppError::not_found("request not found"))?
		.try_into()
}

pub async fn fetch_with_parties(pool: &SqlitePool, request_id: i64) -> AppResult<RequestWithParties> {
	sqlx::query_as::<_, DbRequestWithParties>(&format!("{} WHERE r.id = ?", DbRequestWithParties::SELECT))
		.bind(request_id)
		.fetch_optional(pool)
		.await?
		.ok_or_else(|| AppError::not_found("request not found"))?
		.try_into()
}

/// Writes the lifecycle fields of `state` and bumps `updated_at`.
///
/// Stamps already present in the row are kept whatever `state` says.
pub async fn store_lifecycle<'e, E>(executor: E, request_id: i64, state: &LifecycleState) -> AppResult<()>
where
	E: sqlx::Executor<'e, Database = Sqlite>,
{
	sqlx::query(
		"UPDATE requests SET status = ?, executor_id = ?, assigned_at = COALESCE(assigned_at, ?), \
		 started_at = COALESCE(started_at, ?), completed_at = COALESCE(completed_at, ?), \
		 updated_at = ? WHERE id = ?",
	)
	.bind(state.status.as_str())
	.bind(state.executor_id)
	.bind(state.assigned_at)
	.bind(state.started_at)
	.bind(state.completed_at)
	.bind(crate::utils::utc_now())
	.bind(request_id)
	.execute(executor)
	.await?;
	Ok(())
}
