//! Record Store
//!
//! Persistence for confirmed extraction results. Two tables, append-only:
//! `phone_numbers(phone_number)` and `emails(email)`.
//!
//! Backends:
//! - `PostgresStore`: the production store (sqlx pool)
//! - `SqliteStore`: embedded store for local runs and tests (rusqlite)
//!
//! `PersistenceGateway` wraps a backend and turns every error into a
//! boolean / `None` so nothing propagates into the dispatch loop.

use async_trait::async_trait;
use rusqlite::{types::ValueRef, Connection};
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Row as _;
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info};

/// One result row, every column rendered as text
pub type Row = Vec<String>;

/// Store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Postgres error: {0}")]
    Postgres(#[from] sqlx::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Store lock poisoned")]
    Poisoned,
}

/// Kind of record a workflow extracts and stores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    Phone,
    Email,
}

impl RecordKind {
    pub fn table(&self) -> &'static str {
        match self {
            Self::Phone => "phone_numbers",
            Self::Email => "emails",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            Self::Phone => "phone_number",
            Self::Email => "email",
        }
    }

    fn insert_sql(&self, placeholder: &str) -> String {
        format!(
            "INSERT INTO {} ({}) VALUES ({});",
            self.table(),
            self.column(),
            placeholder
        )
    }

    /// Read-all statement used by `/get_emails` and `/get_phone_numbers`
    pub fn select_all_sql(&self) -> String {
        format!("SELECT * FROM {};", self.table())
    }
}

/// Backend contract: one batch insert per call, one read statement per call
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Create both tables if they are missing
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Insert one row per item inside a single transaction
    async fn insert_batch(&self, kind: RecordKind, items: &[String]) -> Result<usize, StoreError>;

    /// Execute one read statement and return all rows
    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError>;
}

// ============ SQLite ============

/// Embedded store backed by a single SQLite connection
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create the database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        info!("SQLite store opened: {}", path.display());
        Ok(store)
    }

    /// In-memory database, gone when the store is dropped
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS phone_numbers (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                phone_number TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL
            );
            "#,
        )?;
        Ok(())
    }
}

fn sqlite_value_to_string(value: ValueRef<'_>) -> String {
    match value {
        ValueRef::Null => "NULL".to_string(),
        ValueRef::Integer(i) => i.to_string(),
        ValueRef::Real(f) => f.to_string(),
        ValueRef::Text(t) => String::from_utf8_lossy(t).into_owned(),
        ValueRef::Blob(b) => format!("<{} bytes>", b.len()),
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.init_schema()
    }

    async fn insert_batch(&self, kind: RecordKind, items: &[String]) -> Result<usize, StoreError> {
        let mut conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&kind.insert_sql("?1"))?;
            for item in items {
                stmt.execute([item])?;
            }
        }
        tx.commit()?;

        debug!("Inserted {} rows into {}", items.len(), kind.table());
        Ok(items.len())
    }

    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError> {
        let conn = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        let mut stmt = conn.prepare(statement)?;
        let columns = stmt.column_count();

        let rows = stmt
            .query_map([], |row| {
                (0..columns)
                    .map(|i| row.get_ref(i).map(sqlite_value_to_string))
                    .collect::<Result<Row, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }
}

// ============ PostgreSQL ============

/// Connection settings for the Postgres store
#[derive(Debug, Clone)]
pub struct PostgresSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Production store on PostgreSQL
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Lazily connecting pool; the first statement opens the connection.
    pub fn connect_lazy(settings: &PostgresSettings) -> Self {
        let options = PgConnectOptions::new()
            .host(&settings.host)
            .port(settings.port)
            .username(&settings.user)
            .password(&settings.password)
            .database(&settings.database);

        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect_lazy_with(options);

        info!(
            "Postgres store configured: {}@{}:{}/{}",
            settings.user, settings.host, settings.port, settings.database
        );
        Self::new(pool)
    }
}

/// Render a Postgres column as text. Unknown types fall back to a placeholder.
fn pg_value_to_string(row: &sqlx::postgres::PgRow, index: usize) -> String {
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return v.unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return v.map(|n| n.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(index) {
        return v.map(|n| n.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return v.map(|n| n.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return v.map(|b| b.to_string()).unwrap_or_else(|| "NULL".to_string());
    }
    "?".to_string()
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS phone_numbers (
                id SERIAL PRIMARY KEY,
                phone_number VARCHAR(32) NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS emails (
                id SERIAL PRIMARY KEY,
                email VARCHAR(255) NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn insert_batch(&self, kind: RecordKind, items: &[String]) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let sql = kind.insert_sql("$1");

        for item in items {
            sqlx::query(&sql).bind(item).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        debug!("Inserted {} rows into {}", items.len(), kind.table());
        Ok(items.len())
    }

    async fn query(&self, statement: &str) -> Result<Vec<Row>, StoreError> {
        let rows = sqlx::query(statement).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| {
                (0..row.columns().len())
                    .map(|i| pg_value_to_string(row, i))
                    .collect()
            })
            .collect())
    }
}

// ============ Gateway ============

/// Boundary between the bot and the store: errors become `false` / `None`.
#[derive(Clone)]
pub struct PersistenceGateway {
    store: Arc<dyn RecordStore>,
}

impl PersistenceGateway {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Create missing tables. Failure is logged and reported, never fatal.
    pub async fn bootstrap(&self) -> bool {
        match self.store.ensure_schema().await {
            Ok(()) => true,
            Err(e) => {
                error!("Error preparing store schema: {}", e);
                false
            }
        }
    }

    /// Insert every item as its own row. No retry, no compensation on failure.
    pub async fn save(&self, kind: RecordKind, items: &[String]) -> bool {
        match self.store.insert_batch(kind, items).await {
            Ok(count) => {
                info!("Saved {} records to {}", count, kind.table());
                true
            }
            Err(e) => {
                error!("Error saving to db ({}): {}", kind.table(), e);
                false
            }
        }
    }

    pub async fn query(&self, statement: &str) -> Option<Vec<Row>> {
        match self.store.query(statement).await {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!("Error executing query {:?}: {}", statement, e);
                None
            }
        }
    }

    /// All stored rows of one kind
    pub async fn list(&self, kind: RecordKind) -> Option<Vec<Row>> {
        self.query(&kind.select_all_sql()).await
    }
}

/// Rows as text: columns joined with `". "`, one row per line.
pub fn format_rows(rows: &[Row]) -> String {
    rows.iter()
        .map(|row| row.join(". "))
        .collect::<Vec<_>>()
        .join("\n")
}
