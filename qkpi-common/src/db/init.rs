//! Database initialization
//!
//! Creates the database on first run, applies connection PRAGMAs, creates
//! every table idempotently and then runs versioned migrations.

use crate::kpi::{CounterKind, Kpi};
use crate::time;
use crate::workshops::CANONICAL_WORKSHOPS;
use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::{debug, info};

/// Author recorded on seeded thresholds
pub const SYSTEM_USER: &str = "system";

/// Default per-workshop thresholds
///
/// Only applied to (workshop, indicator) pairs without any history.
pub const DEFAULT_THRESHOLDS: [(Kpi, f64); 7] = [
    (Kpi::PpmOfficial, 100.0),
    (Kpi::PpmUnofficial, 500.0),
    (Kpi::ScrapRate, 2.0),
    (Kpi::ReworkRate, 5.0),
    (Kpi::NonQualityCostIndex, 1000.0),
    (Kpi::ScrapCost, 500.0),
    (Kpi::OfficialComplaints, 10.0),
];

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;

    // WAL lets report reads proceed while data entry writes
    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// Initialize a private in-memory database
///
/// Uses a single connection that never expires, since each SQLite memory
/// connection owns its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    create_tables(&pool).await?;
    crate::db::migrations::run_migrations(&pool).await?;

    Ok(pool)
}

async fn create_tables(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    for kind in CounterKind::ALL {
        create_counter_table(pool, kind).await?;
    }
    create_thresholds_table(pool).await?;
    create_non_quality_cost_table(pool).await?;
    Ok(())
}

async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Create the fact table of one counter kind
///
/// Monetary counters store a REAL amount, piece counters an INTEGER quantity.
pub async fn create_counter_table(pool: &SqlitePool, kind: CounterKind) -> Result<()> {
    let value_type = if kind.is_monetary() {
        "REAL NOT NULL DEFAULT 0"
    } else {
        "INTEGER NOT NULL DEFAULT 0"
    };

    let sql = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            workshop TEXT NOT NULL,
            sub_unit TEXT NOT NULL,
            {column} {value_type},
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE (month, year, workshop, sub_unit)
        )
        "#,
        table = kind.table(),
        column = kind.value_column(),
        value_type = value_type,
    );
    sqlx::query(&sql).execute(pool).await?;

    Ok(())
}

async fn create_thresholds_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS thresholds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            scope_key TEXT NOT NULL,
            indicator TEXT NOT NULL,
            value REAL NOT NULL,
            modified_by TEXT,
            modified_at TIMESTAMP NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_non_quality_cost_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS non_quality_cost (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            workshop TEXT NOT NULL DEFAULT 'Total',
            value REAL NOT NULL DEFAULT 0,
            threshold REAL,
            ytd_snapshot REAL,
            updated_at TIMESTAMP NOT NULL,
            UNIQUE (month, year, workshop)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed default thresholds for every canonical workshop
///
/// Pairs that already have at least one history row are left alone, so this
/// is safe to run on every startup. Returns the number of rows inserted.
pub async fn seed_default_thresholds(pool: &SqlitePool) -> Result<u64> {
    let now = time::now();
    let mut inserted = 0;

    for workshop in CANONICAL_WORKSHOPS {
        for (kpi, value) in DEFAULT_THRESHOLDS {
            let result = sqlx::query(
                r#"
                INSERT INTO thresholds (scope_key, indicator, value, modified_by, modified_at)
                SELECT ?1, ?2, ?3, ?4, ?5
                WHERE NOT EXISTS (
                    SELECT 1 FROM thresholds WHERE scope_key = ?1 AND indicator = ?2
                )
                "#,
            )
            .bind(workshop)
            .bind(kpi.indicator_name())
            .bind(value)
            .bind(SYSTEM_USER)
            .bind(now)
            .execute(pool)
            .await?;

            inserted += result.rows_affected();
        }
    }

    if inserted > 0 {
        info!("Seeded {} default thresholds", inserted);
    } else {
        debug!("Default thresholds already present");
    }

    Ok(inserted)
}
