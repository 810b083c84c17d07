use anyhow::Context;
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use std::path::Path;

/// Открыть (и при необходимости создать) файл базы SQLite
pub async fn connect(db_file: &Path) -> anyhow::Result<DatabaseConnection> {
    if let Some(parent) = db_file.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create database directory {}", parent.display()))?;
    }
    let absolute_path = if db_file.is_absolute() {
        db_file.to_path_buf()
    } else {
        std::env::current_dir()?.join(db_file)
    };
    let db_url = sqlite_url(&absolute_path.to_string_lossy());
    tracing::info!("Connecting to database {}", db_url);

    let mut options = ConnectOptions::new(db_url);
    options.sqlx_logging(false);
    let conn = Database::connect(options).await?;
    Ok(conn)
}

/// URL вида `sqlite://<path>?mode=rwc`
fn sqlite_url(path: &str) -> String {
    // Normalize path separators and ensure proper URL form on Windows
    let normalized = path.replace('\\', "/");
    let needs_leading_slash = !normalized.starts_with('/') && normalized.contains(':');
    let prefix = if needs_leading_slash { "/" } else { "" };
    format!("sqlite://{}{}?mode=rwc", prefix, normalized)
}
