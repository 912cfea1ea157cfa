//! Scratch Postgres databases for the sink tests.
//!
//! The server is configured through environment variables:
//! - `TESTS_DATABASE_HOST` (required, tests are skipped when it is unset)
//! - `TESTS_DATABASE_PORT` (defaults to 5432)
//! - `TESTS_DATABASE_USERNAME` (defaults to `postgres`)
//! - `TESTS_DATABASE_PASSWORD` (optional)

use migrate_config::shared::{IntoConnectOptions, PgConnectionConfig, TlsConfig};
use pg_escape::quote_identifier;
use rand::Rng;
use secrecy::SecretString;
use tokio_postgres::{Client, Config, NoTls};

/// Database every scratch database is created from and dropped through.
const MAINTENANCE_DATABASE: &str = "postgres";

/// A uniquely named database that lives for one test.
pub struct TestDatabase {
    pub config: PgConnectionConfig,
    admin: Client,
}

impl TestDatabase {
    /// Opens a new client on the scratch database.
    pub async fn connect(&self) -> Client {
        connect(&self.config).await
    }

    /// Kills every session on the scratch database except the admin one.
    pub async fn terminate_sessions(&self) -> u64 {
        self.admin
            .query(
                "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = $1",
                &[&self.config.name],
            )
            .await
            .expect("Failed to terminate sessions")
            .len() as u64
    }

    /// Drops the database, disconnecting whoever is still using it.
    pub async fn drop_database(self) {
        self.admin
            .execute(
                &format!(
                    "DROP DATABASE IF EXISTS {} WITH (FORCE)",
                    quote_identifier(&self.config.name)
                ),
                &[],
            )
            .await
            .expect("Failed to drop the test database");
    }
}

/// Reads the server location from `TESTS_DATABASE_*`, `None` when no server is configured.
fn local_pg_connection_config() -> Option<PgConnectionConfig> {
    let host = std::env::var("TESTS_DATABASE_HOST").ok()?;

    Some(PgConnectionConfig {
        host,
        port: std::env::var("TESTS_DATABASE_PORT")
            .map(|port| port.parse().expect("TESTS_DATABASE_PORT must be a port number"))
            .unwrap_or(5432),
        name: format!("migrate_test_{:016x}", rand::thread_rng().r#gen::<u64>()),
        username: std::env::var("TESTS_DATABASE_USERNAME")
            .unwrap_or_else(|_| MAINTENANCE_DATABASE.to_string()),
        password: std::env::var("TESTS_DATABASE_PASSWORD")
            .ok()
            .map(SecretString::new),
        tls: TlsConfig {
            trusted_root_certs: String::new(),
            enabled: false,
        },
    })
}

/// Creates an empty database with a random name.
///
/// Returns `None` when `TESTS_DATABASE_HOST` is unset so tests can skip themselves.
pub async fn spawn_sink_database() -> Option<TestDatabase> {
    let Some(config) = local_pg_connection_config() else {
        eprintln!("TESTS_DATABASE_HOST is not set, skipping the Postgres sink test");
        return None;
    };

    let admin_config = PgConnectionConfig {
        name: MAINTENANCE_DATABASE.to_string(),
        ..config.clone()
    };
    let admin = connect(&admin_config).await;
    admin
        .execute(
            &format!("CREATE DATABASE {}", quote_identifier(&config.name)),
            &[],
        )
        .await
        .expect("Failed to create the test database");

    Some(TestDatabase { config, admin })
}

async fn connect(config: &PgConnectionConfig) -> Client {
    let options: Config = config.with_db();
    let (client, connection) = options
        .connect(NoTls)
        .await
        .expect("Failed to connect to the test server");
    tokio::spawn(async move {
        let _ = connection.await;
    });

    client
}
