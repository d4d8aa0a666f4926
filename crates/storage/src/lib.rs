//! Storage layer: SQLite schemas and helpers.
//!
//! Holds DB pool setup, the migration runner and the row models the core
//! maps into domain types.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub mod models;

/// Open a pool for either a `sqlite:` URL or a plain file path.
///
/// Plain paths get their parent directory created and the database file is
/// created on first use.
pub async fn connect(database_url: &str) -> anyhow::Result<SqlitePool> {
    let is_url = database_url.starts_with("sqlite:");
    let in_memory = is_url && is_memory_url(database_url);
    let mut options = if is_url {
        SqliteConnectOptions::from_str(database_url)?
    } else {
        let path = std::path::PathBuf::from(database_url);
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        SqliteConnectOptions::new().filename(path)
    };
    options = options
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(Duration::from_secs(10));

    let mut opts = SqlitePoolOptions::new();
    if in_memory {
        // A private in-memory database lives exactly as long as its one connection.
        opts = opts
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None);
    } else {
        options = options.journal_mode(SqliteJournalMode::Wal);
        opts = opts.max_connections(5);
    }
    let pool = opts.connect_with(options).await?;
    debug!(url = database_url, "sqlite pool ready");
    Ok(pool)
}

/// `sqlite::memory:` and `sqlite:file:...?mode=memory` style URLs.
fn is_memory_url(url: &str) -> bool {
    let rest = url.trim_start_matches("sqlite:").trim_start_matches("//");
    let (path, query) = rest.split_once('?').unwrap_or((rest, ""));
    path == ":memory:" || path.is_empty() || query.split('&').any(|kv| kv == "mode=memory")
}

pub async fn migrate(pool: &SqlitePool) -> anyhow::Result<()> {
    // Applies SQLx migrations located in crates/storage/migrations, including
    // the full-text index over items. Safe to run multiple times (idempotent).
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}
