use sqlx::SqlitePool;

use crate::errors::{AppError, AppResult};
use crate::models::setting::SystemSetting;

const COLUMNS: &str = "id, key, value, description, updated_at";

pub async fn list(pool: &SqlitePool) -> AppResult<Vec<SystemSetting>> {
	let rows = sqlx::query_as::<_, SystemSetting>(&format!("SELECT {COLUMNS} FROM system_settings ORDER BY key ASC"))
		.fetch_all(pool)
		.await?;
	Ok(rows)
}

pub async fn fetch(pool: &SqlitePool, key: &str) -> AppResult<SystemSetting> {
	sqlx::query_as::<_, SystemSetting>(&format!("SELECT {COLUMNS} FROM system_settings WHERE key = ?"))
		.bind(key)
		.fetch_optional(pool)
		.await?
		.ok_or_else(|| AppError::not_found(format!("setting `{key}` not found")))
}

/// Raw value of `key`, `None` when the row is missing.
pub async fn get_value<'e, E>(executor: E, key: &str) -> AppResult<Option<String>>
where
	E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
	let value = sqlx::query_scalar::<_, String>("SELECT value FROM system_settings WHERE key = ?")
		.bind(key)
		.fetch_optional(executor)
		.await?;
	Ok(value)
}
