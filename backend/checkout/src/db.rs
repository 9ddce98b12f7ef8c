//! Database layer: migrations and the checkout attempt log.

use std::str::FromStr;

use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::errors::Result;
use crate::orchestrator::SessionSnapshot;

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    // Every connection to `:memory:` is its own database.
    let max_connections = if url.contains(":memory:") { 1 } else { 5 };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;
    info!("Database migrations applied successfully");
    Ok(pool)
}

/// A row of the attempt log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct AttemptRecord {
    pub id: i64,
    pub user_id: String,
    pub campaign_id: String,
    pub plan_id: String,
    pub gateway_order_id: Option<String>,
    pub amount: i64,
    pub outcome: String,
    pub failure_kind: Option<String>,
    pub failure_message: Option<String>,
    pub created_at: i64,
}

/// Append the terminal state of an attempt. Snapshots that are not terminal
/// or carry no user are skipped and yield `None`.
pub async fn record_attempt(pool: &SqlitePool, snapshot: &SessionSnapshot) -> Result<Option<i64>> {
    if !snapshot.status.is_terminal() {
        return Ok(None);
    }
    let Some(user_id) = snapshot.user_id.as_deref() else {
        return Ok(None);
    };

    let amount = snapshot
        .amount
        .map(|a| i64::try_from(a.minor_units()).unwrap_or(i64::MAX))
        .unwrap_or(0);

    let id = sqlx::query(
        r#"
        INSERT INTO checkout_attempts
            (user_id, campaign_id, plan_id, gateway_order_id, amount, outcome,
             failure_kind, failure_message, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
    )
    .bind(user_id)
    .bind(snapshot.campaign_id.as_deref().unwrap_or_default())
    .bind(snapshot.plan_id.as_deref().unwrap_or_default())
    .bind(snapshot.gateway_order_id.as_deref())
    .bind(amount)
    .bind(snapshot.status.as_str())
    .bind(snapshot.failure.as_ref().map(|f| f.kind))
    .bind(snapshot.failure.as_ref().map(|f| f.message.as_str()))
    .bind(chrono::Utc::now().timestamp())
    .execute(pool)
    .await?
    .last_insert_rowid();

    debug!("recorded checkout attempt {id} ({})", snapshot.status);
    Ok(Some(id))
}

/// A user's attempts, newest first.
pub async fn attempts_for_user(pool: &SqlitePool, user_id: &str) -> Result<Vec<AttemptRecord>> {
    let rows = sqlx::query_as::<_, AttemptRecord>(
        r#"
        SELECT id, user_id, campaign_id, plan_id, gateway_order_id, amount, outcome,
               failure_kind, failure_message, created_at
        FROM   checkout_attempts
        WHERE  user_id = ?1
        ORDER  BY created_at DESC, id DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
