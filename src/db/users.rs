use sqlx::{Sqlite, SqlitePool};

use crate::errors::{AppError, AppResult};
use crate::models::user::{DbUser, NewUser, User};
use crate::utils::utc_now;

pub const COLUMNS: &str =
	"id, username, password_hash, fullname, address, role, status, is_active, created_at, updated_at";

pub async fn insert_user<'e, E>(executor: E, new_user: &NewUser) -> AppResult<User>
where
	E: sqlx::Executor<'e, Database = Sqlite>,
{
	let now = utc_now();

	let row = sqlx::query_as::<_, DbUser>(&format!(
		"INSERT INTO users (username, password_hash, fullname, address, role, status, is_active, created_at, updated_at) \
		 VALUES (?, ?, ?, ?, ?, ?, 1, ?, ?) RETURNING {COLUMNS}"
	))
	.bind(&new_user.username)
	.bind(&new_user.password_hash)
	.bind(&new_user.fullname)
	.bind(&new_user.address)
	.bind(new_user.role.as_str())
	.bind(new_user.status.as_str())
	.bind(now)
	.bind(now)
	.fetch_one(executor)
	.await?;

	row.try_into()
}

pub async fn fetch_db_user<'e, E>(executor: E, user_id: i64) -> AppResult<Option<DbUser>>
where
	E: sqlx::Executor<'e, Database = Sqlite>,
{
	let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {COLUMNS} FROM users WHERE id = ?"))
		.bind(user_id)
		.fetch_optional(executor)
		.await?;
	Ok(row)
}

pub async fn fetch_user(pool: &SqlitePool, user_id: i64) -> AppResult<User> {
	fetch_db_user(pool, user_id)
		.await?
		.ok_or_else(|| AppError::not_found("user not found"))?
		.try_into()
}

pub async fn fetch_user_by_username(pool: &SqlitePool, username: &str) -> AppResult<Option<DbUser>> {
	let row = sqlx::query_as::<_, DbUser>(&format!("SELECT {COLUMNS} FROM users WHERE username = ?"))
		.bind(username)
		.fetch_optional(pool)
		.await?;
	Ok(row)
}

pub async fn username_taken(pool: &SqlitePool, username: &str) -> AppResult<bool> {
	let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE username = ?")
		.bind(username)
		.fetch_one(pool)
		.await?;
	Ok(count > 0)
}
