//! SurrealDB Handle - Connection management
//!
//! Supports in-memory (tests), local file (`surrealkv://`), plain URL and
//! authenticated cloud (WebSocket) connections. Every constructor runs the
//! idempotent schema setup in [`crate::migrations`].
//!
//! The storage trait implementations for the handle live in
//! [`crate::surreal_store`].

use crate::error::StateError;
use crate::migrations;
use crate::schema::CounterRow;
use crate::storage_traits::StorageResult;
use crate::Result;
use surrealdb::engine::any::Any;
use surrealdb::opt::auth::{Database, Root};
use surrealdb::Surreal;
use tracing::{debug, info, instrument};

/// Namespace used when none is configured
pub const DEFAULT_NAMESPACE: &str = "gradebook";
/// Database used when none is configured
pub const DEFAULT_DATABASE: &str = "main";
/// Directory for local persistence when no remote database is configured
pub const DEFAULT_LOCAL_PATH: &str = ".gradebook/db";

/// Configuration for an authenticated SurrealDB connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// Endpoint URL (e.g., "wss://xxx.aws-use1.surrealdb.cloud")
    pub endpoint: String,
    /// Database username
    pub username: String,
    /// Database password
    pub password: String,
    /// Namespace (default: "gradebook")
    pub namespace: String,
    /// Database name (default: "main")
    pub database: String,
    /// Whether this is a root user (true) or database user (false)
    pub is_root: bool,
}

impl DbConfig {
    /// Create a new configuration for a database user
    pub fn new(
        endpoint: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            username: username.into(),
            password: password.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            is_root: false,
        }
    }

    /// Set custom namespace
    pub fn with_namespace(mut self, ns: impl Into<String>) -> Self {
        self.namespace = ns.into();
        self
    }

    /// Set custom database
    pub fn with_database(mut self, db: impl Into<String>) -> Self {
        self.database = db.into();
        self
    }

    /// Set whether this is a root user
    pub fn with_root(mut self, is_root: bool) -> Self {
        self.is_root = is_root;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - SURREALDB_ENDPOINT (required)
    /// - SURREALDB_USERNAME (required)
    /// - SURREALDB_PASSWORD (required)
    /// - SURREALDB_NAMESPACE (optional, default: "gradebook")
    /// - SURREALDB_DATABASE (optional, default: "main")
    /// - SURREALDB_ROOT (optional, default: "false") - set to "true" for root users
    pub fn from_env() -> std::result::Result<Self, StateError> {
        let required = |name: &str| {
            std::env::var(name).map_err(|_| StateError::Config(format!("{name} not set")))
        };
        let endpoint = required("SURREALDB_ENDPOINT")?;
        let username = required("SURREALDB_USERNAME")?;
        let password = required("SURREALDB_PASSWORD")?;
        let namespace = std::env::var("SURREALDB_NAMESPACE")
            .unwrap_or_else(|_| DEFAULT_NAMESPACE.to_string());
        let database =
            std::env::var("SURREALDB_DATABASE").unwrap_or_else(|_| DEFAULT_DATABASE.to_string());
        let is_root = std::env::var("SURREALDB_ROOT")
            .map(|v| v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);

        Ok(Self {
            endpoint,
            username,
            password,
            namespace,
            database,
            is_root,
        })
    }
}

/// SurrealDB connection handle for Gradebook
///
/// Cloning is cheap; clones share the underlying connection.
#[derive(Clone)]
pub struct SurrealHandle {
    pub(crate) db: Surreal<Any>,
}

impl std::fmt::Debug for SurrealHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealHandle").finish_non_exhaustive()
    }
}

impl SurrealHandle {
    /// Connect to SurrealDB in-memory and set up schema
    #[instrument(skip_all)]
    pub async fn in_memory() -> Result<Self> {
        info!("Connecting to SurrealDB (in-memory)");
        Self::connect_url("mem://").await
    }

    /// Connect to any URL understood by the `any` engine
    /// (`mem://`, `surrealkv://path`, `ws://host:port`, ...)
    #[instrument]
    pub async fn connect_url(url: &str) -> Result<Self> {
        let db = surrealdb::engine::any::connect(url)
            .await
            .map_err(|e| StateError::Connection(format!("Failed to connect to {}: {}", url, e)))?;

        db.use_ns(DEFAULT_NAMESPACE)
            .use_db(DEFAULT_DATABASE)
            .await
            .map_err(|e| StateError::Connection(e.to_string()))?;

        let handle = SurrealHandle { db };
        migrations::init_schema(&handle.db).await?;

        info!("SurrealDB connected and schema initialized");
        Ok(handle)
    }

    /// Connect with credentials
    #[instrument(skip(config), fields(endpoint = %config.endpoint, namespace = %config.namespace, database = %config.database))]
    pub async fn connect(config: DbConfig) -> Result<Self> {
        info!("Connecting to SurrealDB (root={})", config.is_root);

        let db = surrealdb::engine::any::connect(&config.endpoint)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to connect to {}: {}", config.endpoint, e))
            })?;

        if config.is_root {
            db.signin(Root {
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| StateError::Connection(format!("Root authentication failed: {}", e)))?;
        } else {
            db.signin(Database {
                namespace: &config.namespace,
                database: &config.database,
                username: &config.username,
                password: &config.password,
            })
            .await
            .map_err(|e| {
                StateError::Connection(format!("Database authentication failed: {}", e))
            })?;
        }

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await
            .map_err(|e| {
                StateError::Connection(format!("Failed to select namespace/database: {}", e))
            })?;

        let handle = SurrealHandle { db };
        migrations::init_schema(&handle.db).await?;

        info!("SurrealDB connected (authenticated) and schema initialized");
        Ok(handle)
    }

    /// Connect using environment variables
    ///
    /// If SURREALDB_ENDPOINT (and credentials) are set, connects with auth.
    /// If SURREALDB_URL is set, connects to that URL.
    /// Otherwise, falls back to local persistence in `.gradebook/db`.
    #[instrument(skip_all)]
    pub async fn from_env() -> Result<Self> {
        if let Ok(config) = DbConfig::from_env() {
            info!("Credentials found, connecting to {}", config.endpoint);
            return Self::connect(config).await;
        }

        if let Ok(url) = std::env::var("SURREALDB_URL") {
            info!("SURREALDB_URL found, connecting to {}", url);
            return Self::connect_url(&url).await;
        }

        Self::local(DEFAULT_LOCAL_PATH).await
    }

    /// Open (creating if needed) a local SurrealKV database directory
    #[instrument]
    pub async fn local(path: &str) -> Result<Self> {
        std::fs::create_dir_all(path).map_err(|e| {
            StateError::Connection(format!(
                "Failed to create database directory {}: {}",
                path, e
            ))
        })?;
        let url = format!("surrealkv://{}", path);
        info!("Using local persistence: {}", url);
        Self::connect_url(&url).await
    }

    /// Hand out the next integer id for `table`.
    ///
    /// Backed by an atomic UPSERT on `counters:<table>`, so concurrent callers
    /// never receive the same id.
    pub(crate) async fn next_id(&self, table: &'static str) -> StorageResult<i64> {
        let mut result = self
            .db
            .query("UPSERT type::thing('counters', $table) SET value += 1 RETURN AFTER")
            .bind(("table", table))
            .await?;

        let rows: Vec<CounterRow> = result.take(0)?;
        let id = rows.into_iter().next().map(|row| row.value).ok_or_else(|| {
            crate::StorageError::Backend(format!("counter for {table} returned no value"))
        })?;
        debug!(table, id, "allocated id");
        Ok(id)
    }
}
