//! # Database Module
//!
//! This module handles all database operations for the membership backend.
//! PostgreSQL stores:
//!
//! - User records (identity, subscription state, referral linkage)
//! - Affiliate accounts (cached balance aggregates)
//! - Ledger entries (append-only system of record for every balance change)
//! - Orders and the authoritative product price list
//! - Live trade signals and their closed history
//!
//! ## Why the split between affiliates and ledger_entries?
//!
//! The ledger is the system of record: every balance-affecting event is an
//! immutable row. The balance columns on `affiliates` are a cached
//! aggregate that must always equal the sum of that account's entries.
//! Keeping both means reads are one row while the entry history remains
//! fully auditable.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      DATABASE LAYER                              │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                   Connection Pool                         │   │
//! │  │                  (deadpool-postgres)                      │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                              │                                   │
//! │      ┌──────────┬────────────┼───────────┬──────────────┐       │
//! │      ▼          ▼            ▼           ▼              ▼       │
//! │  ┌───────┐ ┌──────────┐ ┌─────────┐ ┌────────┐ ┌────────────┐  │
//! │  │ users │ │affiliates│ │ ledger_ │ │ orders │ │ signals_*  │  │
//! │  │       │ │          │ │ entries │ │products│ │            │  │
//! │  └───────┘ └──────────┘ └─────────┘ └────────┘ └────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod models;
pub mod queries;

use deadpool_postgres::{Config, Pool, Runtime};
use thiserror::Error;
use tokio_postgres::{Config as TokioConfig, NoTls};
use tracing::info;

/// Database-related errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to connect to the database
    #[error("Database connection failed: {0}")]
    ConnectionError(String),

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryError(#[from] tokio_postgres::Error),

    /// Migration failed
    #[error("Migration failed: {0}")]
    MigrationError(String),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}

/// Schema applied at startup.
///
/// Everything is `CREATE ... IF NOT EXISTS`, so running it on every boot
/// is safe.
const SCHEMA_SQL: &str = include_str!("../../migrations/001_initial_schema.sql");

/// Database connection wrapper.
///
/// Wraps the deadpool-postgres connection pool and provides methods for
/// connection setup and schema migration.
///
/// ## Usage
///
/// ```rust,ignore
/// let db = Database::connect("postgres://...").await?;
/// db.run_migrations().await?;
/// let user = queries::get_user_by_email(db.pool(), "a@b.c").await?;
/// ```
#[derive(Clone)]
pub struct Database {
    /// The connection pool
    pool: Pool,
}

impl Database {
    /// Connect to the PostgreSQL database.
    ///
    /// Creates a connection pool (max 10 connections) and verifies it
    /// with a trivial query.
    ///
    /// ## Arguments
    ///
    /// * `database_url` - PostgreSQL connection string
    pub async fn connect(database_url: &str) -> Result<Self, DatabaseError> {
        info!("Connecting to database...");

        // Parse the connection string using tokio_postgres::Config
        let tokio_config = database_url.parse::<TokioConfig>()
            .map_err(|e| DatabaseError::ConfigError(format!("Invalid database URL: {}", e)))?;

        // Convert to deadpool config
        let mut config = Config::new();

        if let Some(dbname) = tokio_config.get_dbname() {
            config.dbname = Some(dbname.to_string());
        }
        if let Some(user) = tokio_config.get_user() {
            config.user = Some(user.to_string());
        }
        if let Some(password) = tokio_config.get_password() {
            // Password is &[u8], convert to String
            config.password = Some(String::from_utf8_lossy(password).to_string());
        }
        if let Some(host) = tokio_config.get_hosts().first() {
            if let tokio_postgres::config::Host::Tcp(host_str) = host {
                config.host = Some(host_str.clone());
            }
        }
        if let Some(port) = tokio_config.get_ports().first() {
            config.port = Some(*port);
        }

        config.pool = Some(deadpool_postgres::PoolConfig {
            max_size: 10,
            ..Default::default()
        });

        let pool = config
            .create_pool(Some(Runtime::Tokio1), NoTls)
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        // Test connection
        let client = pool.get().await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        client.query("SELECT 1", &[]).await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        info!("Database connection established");

        Ok(Self { pool })
    }

    /// Apply the schema migration.
    ///
    /// The migration SQL is embedded in the binary at compile time and is
    /// idempotent, so it runs unconditionally on every startup.
    pub async fn run_migrations(&self) -> Result<(), DatabaseError> {
        info!("Running database migrations...");

        let client = self.pool.get().await
            .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

        client
            .batch_execute(SCHEMA_SQL)
            .await
            .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

        info!("Migrations completed");
        Ok(())
    }

    /// Get a reference to the connection pool.
    ///
    /// Use this when you need direct access to the pool
    /// for custom queries.
    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

// Re-export commonly used items
pub use models::*;
