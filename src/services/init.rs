//! Initialization helpers for the application:
//! - database connection + migrations
//! - background worker spawn helpers
//!
//! This module centralizes bits that would otherwise live in `main.rs`.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;

use crate::config::Config;
use crate::services::reminders::ReminderScanner;

/// Initialize the SQLite database connection and run migrations.
///
/// Creates the parent directory for the database file (if applicable),
/// opens a connection pool using `create_if_missing(true)` and runs
/// migrations.
pub async fn init_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let db_url = &config.database.url;
    tracing::info!("Connecting to database: {}", db_url);

    let db_path = db_url.strip_prefix("sqlite://").unwrap_or(db_url);
    let db_file_path = Path::new(db_path);

    if let Some(parent) = db_file_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| {
                anyhow::anyhow!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                )
            })?;
        }
    }

    let connect_options = sqlx::sqlite::SqliteConnectOptions::new()
        .filename(db_path)
        .foreign_keys(true)
        .create_if_missing(true);

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect_with(connect_options)
        .await?;

    tracing::info!("Running database migrations");
    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

/// Spawn background workers:
/// - the periodic reminder scan over upcoming confirmed appointments
///
/// Workers are spawned as `tokio::spawn` tasks. The function returns the
/// `JoinHandle`s so callers can await task shutdown. Each worker listens for
/// a shutdown notification via a `tokio::sync::broadcast::Sender<()>`.
pub fn spawn_background_workers(
    state: Arc<crate::AppState>,
    shutdown: tokio::sync::broadcast::Sender<()>,
) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    // Reminder worker
    {
        let mut shutdown_rx = shutdown.subscribe();
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            if !state.config.reminders.enabled {
                tracing::info!("Reminder worker disabled by configuration");
                return;
            }

            let scanner = ReminderScanner::new(
                state.db.clone(),
                state.store.dispatcher(),
                state.config.reminders.clone(),
            );
            let interval =
                std::time::Duration::from_secs(state.config.reminders.poll_interval_seconds);

            // One immediate scan at startup, then the fixed interval.
            loop {
                match scanner.scan(Utc::now().naive_utc()).await {
                    Ok(0) => tracing::debug!("Reminder scan: nothing due"),
                    Ok(n) => tracing::info!("Reminder scan emitted {} reminder(s)", n),
                    Err(e) => tracing::warn!("Reminder scan failed: {:?}", e),
                }

                tokio::select! {
                    _ = shutdown_rx.recv() => {
                        tracing::info!("Reminder worker shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        }));
    }

    handles
}
