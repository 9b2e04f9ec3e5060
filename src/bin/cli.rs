use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::migrate::Migrator;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::SqlitePool;

use housing_desk::db;
use housing_desk::extract::Validate;
use housing_desk::models::user::{NewUser, RegisterRequest, Role, UserStatus};
use housing_desk::utils::hash_password;

#[derive(Parser, Debug)]
#[command(author, version, about = "housing-desk maintenance tool", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scaffold a reversible migration pair under ./migrations
    MakeMigration { name: String },
    /// Apply every pending migration
    MigrateRun,
    /// List migrations with their applied/pending state
    MigrateStatus,
    /// Revert the most recently applied migration
    MigrateRollback,
    /// Create an administrator account
    CreateAdmin {
        /// 11-digit phone number used to log in
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        fullname: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if dotenvy::dotenv().is_err() {
        let _ = dotenvy::from_path(Path::new(env!("CARGO_MANIFEST_DIR")).join(".env"));
    }

    match Cli::parse().command {
        Command::MakeMigration { name } => {
            for path in scaffold_migration(Path::new("migrations"), &name)? {
                println!("created {}", path.display());
            }
        }
        Command::MigrateRun => {
            let tool = MigrationTool::open().await?;
            tool.migrator.run(&tool.pool).await.context("migration failed")?;
            println!("migrations applied");
        }
        Command::MigrateStatus => MigrationTool::open().await?.print_status().await?,
        Command::MigrateRollback => {
            let reverted = MigrationTool::open().await?.rollback().await?;
            println!("rolled back migration {reverted}");
        }
        Command::CreateAdmin { username, password, fullname } => create_admin(username, password, fullname).await?,
    }

    Ok(())
}

/// Writes `<timestamp>_<name>.up.sql` and its `.down.sql` twin.
fn scaffold_migration(dir: &Path, name: &str) -> anyhow::Result<[PathBuf; 2]> {
    let stem = format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S"), sanitize_name(name));
    let up = dir.join(format!("{stem}.up.sql"));
    let down = dir.join(format!("{stem}.down.sql"));

    if up.exists() || down.exists() {
        anyhow::bail!("migration {stem} already exists");
    }

    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    for (path, body) in [(&up, "-- forward change\n"), (&down, "-- undo the matching .up.sql\n")] {
        fs::write(path, body).with_context(|| format!("cannot write {}", path.display()))?;
    }

    Ok([up, down])
}

fn sanitize_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect()
}

/// A database connection paired with the migrations found on disk.
struct MigrationTool {
    pool: SqlitePool,
    migrator: Migrator,
}

impl MigrationTool {
    async fn open() -> anyhow::Result<Self> {
        let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
        let options = url.parse::<SqliteConnectOptions>().context("invalid DATABASE_URL")?;
        let pool = SqlitePool::connect_with(db::tune(options))
            .await
            .with_context(|| format!("cannot open {url}"))?;

        // Repo-relative first so `make-migration` output is picked up immediately.
        let dir = match Path::new("migrations") {
            local if local.is_dir() => local.to_path_buf(),
            _ => Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations"),
        };
        let migrator = Migrator::new(dir.clone())
            .await
            .with_context(|| format!("cannot load migrations from {}", dir.display()))?;

        Ok(Self { pool, migrator })
    }

    /// Versions recorded as successfully applied, ascending.
    async fn applied(&self) -> anyhow::Result<Vec<i64>> {
        let tracked: Option<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_optional(&self.pool)
        .await?;
        if tracked.is_none() {
            return Ok(Vec::new());
        }

        let versions: Vec<i64> = sqlx::query_scalar("SELECT version FROM _sqlx_migrations WHERE success = 1 ORDER BY version")
            .fetch_all(&self.pool)
            .await?;
        Ok(versions)
    }

    async fn print_status(&self) -> anyhow::Result<()> {
        let applied = self.applied().await?;

        println!("{:<8} {:<16} description", "state", "version");
        for migration in self.migrator.iter().filter(|m| !m.migration_type.is_down_migration()) {
            let state = if applied.contains(&migration.version) { "applied" } else { "pending" };
            println!("{:<8} {:<16} {}", state, migration.version, migration.description.trim());
        }
        Ok(())
    }

    /// Undoes down to the second-newest applied version; returns the reverted one.
    async fn rollback(&self) -> anyhow::Result<i64> {
        let mut applied = self.applied().await?;
        let Some(newest) = applied.pop() else {
            anyhow::bail!("nothing to roll back");
        };
        let target = applied.last().copied().unwrap_or(0);

        self.migrator
            .undo(&self.pool, target)
            .await
            .with_context(|| format!("failed to revert {newest}"))?;
        Ok(newest)
    }
}

async fn create_admin(username: String, password: String, fullname: String) -> anyhow::Result<()> {
    RegisterRequest {
        username: username.clone(),
        password: password.clone(),
        fullname: fullname.clone(),
        address: None,
    }
    .validate()?;

    let url = std::env::var("DATABASE_URL").context("DATABASE_URL not set")?;
    let pool = db::connect(&url).await?;

    let admin = db::users::insert_user(
        &pool,
        &NewUser {
            username,
            password_hash: hash_password(&password)?,
            fullname,
            address: None,
            role: Role::Admin,
            status: UserStatus::Confirmed,
        },
    )
    .await?;

    println!("created admin {} (id {})", admin.username, admin.id);
    Ok(())
}
