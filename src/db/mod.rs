use std::ops::{Deref, DerefMut};
use std::time::Duration;

use anyhow::Context;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool};

use crate::errors::AppResult;

pub mod requests;
pub mod settings;
pub mod users;

pub async fn init() -> anyhow::Result<SqlitePool> {
	let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
	connect(&database_url).await
}

/// Connection settings every pool in the crate shares: foreign keys, WAL and
/// a busy timeout so concurrent writers queue instead of failing.
pub fn tune(options: SqliteConnectOptions) -> SqliteConnectOptions {
	options
		.create_if_missing(true)
		.foreign_keys(true)
		.journal_mode(SqliteJournalMode::Wal)
		.busy_timeout(Duration::from_secs(10))
}

/// Opens the pool and applies pending migrations.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
	let options = database_url
		.parse::<SqliteConnectOptions>()
		.context("invalid DATABASE_URL")?;

	let pool = SqlitePoolOptions::new()
		.max_connections(10)
		.min_connections(1)
		.acquire_timeout(Duration::from_secs(10))
		.connect_with(tune(options))
		.await
		.context("failed to connect to database")?;

	sqlx::migrate!()
		.run(&pool)
		.await
		.context("failed to run migrations")?;

	Ok(pool)
}

/// A transaction that holds the write lock from its first statement.
///
/// A deferred `BEGIN` that reads before writing cannot upgrade its lock while
/// another connection writes, and SQLite fails it without waiting. `BEGIN
/// IMMEDIATE` waits on the busy timeout instead, so read-decide-write handlers
/// serialize with each other and with the activity listener.
///
/// Dropping without [`WriteTx::commit`] rolls back.
pub struct WriteTx {
	conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTx {
	pub async fn begin(pool: &SqlitePool) -> AppResult<Self> {
		let mut conn = pool.acquire().await?;
		sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
		Ok(Self { conn: Some(conn) })
	}

	pub async fn commit(mut self) -> AppResult<()> {
		sqlx::query("COMMIT").execute(&mut *self).await?;
		// back to the pool; nothing left for `Drop` to undo
		self.conn = None;
		Ok(())
	}
}

impl Deref for WriteTx {
	type Target = SqliteConnection;

	fn deref(&self) -> &Self::Target {
		match &self.conn {
			Some(conn) => conn,
			None => unreachable!("WriteTx used after commit"),
		}
	}
}

impl DerefMut for WriteTx {
	fn deref_mut(&mut self) -> &mut Self::Target {
		match &mut self.conn {
			Some(conn) => conn,
			None => unreachable!("WriteTx used after commit"),
		}
	}
}

impl Drop for WriteTx {
	fn drop(&mut self) {
		let Some(mut conn) = self.conn.take() else {
			return;
		};
		tokio::spawn(async move {
			if let Err(err) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
				tracing::warn!(error = %err, "rollback failed, discarding connection");
				let _ = conn.close().await;
			}
		});
	}
}
