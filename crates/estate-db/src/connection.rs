//! SurrealDB connection management.
//!
//! The server and the database are usually started together, so opening
//! a connection retries for a while before giving up. A manager is only
//! handed out once the schema is current.

use std::time::Duration;

use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::{info, warn};

use crate::error::DbError;
use crate::schema::run_migrations;

/// Where and how to reach SurrealDB.
#[derive(Debug, Clone)]
pub struct DbConfig {
    /// WebSocket endpoint, `host:port`.
    pub url: String,
    pub namespace: String,
    pub database: String,
    /// Root credentials.
    pub username: String,
    pub password: String,
    /// Connection attempts before startup fails (default: 10).
    pub connect_attempts: u32,
    /// Pause between connection attempts in milliseconds (default: 1000).
    pub retry_delay_ms: u64,
}

impl DbConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "estate".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            connect_attempts: 10,
            retry_delay_ms: 1_000,
        }
    }
}

/// A migrated SurrealDB connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
}

impl DbManager {
    /// Connect, retrying up to `connect_attempts` times, then apply any
    /// pending migrations.
    pub async fn open(config: &DbConfig) -> Result<Self, DbError> {
        let max_attempts = config.connect_attempts.max(1);
        let mut attempt = 1;

        let db = loop {
            match connect(config).await {
                Ok(db) => break db,
                Err(e) if attempt < max_attempts => {
                    warn!(
                        attempt,
                        max_attempts,
                        url = %config.url,
                        error = %e,
                        "SurrealDB not reachable yet"
                    );
                    tokio::time::sleep(config.retry_delay()).await;
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        };

        run_migrations(&db).await?;
        info!(
            namespace = %config.namespace,
            database = %config.database,
            "SurrealDB ready"
        );

        Ok(Self { db })
    }

    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }
}

async fn connect(config: &DbConfig) -> Result<Surreal<Client>, surrealdb::Error> {
    info!(url = %config.url, "Connecting to SurrealDB");

    let db = Surreal::new::<Ws>(&config.url).await?;
    db.signin(Root {
        username: config.username.clone(),
        password: config.password.clone(),
    })
    .await?;
    db.use_ns(&config.namespace)
        .use_db(&config.database)
        .await?;

    Ok(db)
}
