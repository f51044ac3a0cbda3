use clap::Parser;
use estate_db::DbConfig;
use estate_service::ServiceConfig;

#[derive(Parser, Debug)]
#[command(name = "estate-server")]
#[command(about = "Service-request SLA escalation monitor", long_about = None)]
pub struct Cli {
    /// SurrealDB WebSocket endpoint
    #[arg(long, env = "ESTATE_DB_URL", default_value = "127.0.0.1:8000")]
    pub db_url: String,

    /// SurrealDB namespace
    #[arg(long, env = "ESTATE_DB_NAMESPACE", default_value = "estate")]
    pub db_namespace: String,

    /// SurrealDB database
    #[arg(long, env = "ESTATE_DB_DATABASE", default_value = "main")]
    pub db_database: String,

    /// SurrealDB root user
    #[arg(long, env = "ESTATE_DB_USERNAME", default_value = "root")]
    pub db_username: String,

    /// SurrealDB root password
    #[arg(long, env = "ESTATE_DB_PASSWORD", default_value = "root", hide_env_values = true)]
    pub db_password: String,

    /// Connection attempts before giving up at startup
    #[arg(long, env = "ESTATE_DB_CONNECT_ATTEMPTS", default_value_t = 10)]
    pub db_connect_attempts: u32,

    /// Milliseconds between connection attempts
    #[arg(long, env = "ESTATE_DB_RETRY_DELAY_MS", default_value_t = 1000)]
    pub db_retry_delay_ms: u64,

    /// Seconds between escalation sweeps of one tenant
    #[arg(long, env = "ESTATE_SWEEP_INTERVAL_SECS", default_value_t = 60)]
    pub sweep_interval_secs: u64,

    /// Seconds between refreshes of the tenant list
    #[arg(long, env = "ESTATE_TENANT_REFRESH_SECS", default_value_t = 300)]
    pub tenant_refresh_secs: u64,

    /// Maximum overdue requests handled per sweep
    #[arg(long, env = "ESTATE_SWEEP_BATCH_SIZE", default_value_t = 100)]
    pub sweep_batch_size: u64,

    /// Log filter used when RUST_LOG is unset
    #[arg(short, long, default_value = "estate=info")]
    pub log_level: String,
}

impl Cli {
    pub fn db_config(&self) -> DbConfig {
        DbConfig {
            url: self.db_url.clone(),
            namespace: self.db_namespace.clone(),
            database: self.db_database.clone(),
            username: self.db_username.clone(),
            password: self.db_password.clone(),
            connect_attempts: self.db_connect_attempts,
            retry_delay_ms: self.db_retry_delay_ms,
        }
    }

    pub fn service_config(&self) -> ServiceConfig {
        ServiceConfig {
            sweep_interval_secs: self.sweep_interval_secs,
            tenant_refresh_secs: self.tenant_refresh_secs,
            sweep_batch_size: self.sweep_batch_size,
            ..ServiceConfig::default()
        }
    }
}
