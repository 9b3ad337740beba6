use std::env;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::ConnectionManager;
use diesel::PgConnection;
use log::{info, warn};

pub type Pool = r2d2::Pool<ConnectionManager<PgConnection>>;

const MIGRATION: &str = include_str!("../../migrations/2025-06-01-000000_messaging/up.sql");

#[derive(Clone)]
pub struct Config {
    host: String,
    port: u16,
    user: String,
    password: String,
    db: String,
    pool_size: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: String::from("127.0.0.1"),
            port: 5432,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("marketplace"),
            pool_size: 10,
        }
    }
}

impl Config {
    pub fn env() -> Option<Self> {
        let host = env::var("PG_HOST").ok();
        let port = env::var("PG_PORT")
            .unwrap_or_else(|_| "5432".to_string())
            .parse()
            .ok();

        if let (Some(host), Some(port)) = (host, port) {
            let default = Self::default();
            Some(Self {
                host,
                port,
                user: env::var("PG_USER").unwrap_or(default.user),
                password: env::var("PG_PASSWORD").unwrap_or(default.password),
                db: env::var("PG_DB").unwrap_or(default.db),
                pool_size: env::var("PG_POOL_SIZE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default.pool_size),
            })
        } else {
            warn!("PG env is not configured");
            None
        }
    }

    fn url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.db
        )
    }

    pub fn connect(&self) -> Pool {
        let manager = ConnectionManager::<PgConnection>::new(self.url());

        match r2d2::Pool::builder()
            .max_size(self.pool_size)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)
        {
            Ok(pool) => pool,
            Err(e) => panic!("Failed to connect to Postgres: {e}"),
        }
    }
}

/// Applies the idempotent schema DDL.
pub fn migrate(pool: &Pool) {
    let mut conn = match pool.get() {
        Ok(c) => c,
        Err(e) => panic!("Failed to acquire Postgres connection: {e}"),
    };

    if let Err(e) = conn.batch_execute(MIGRATION) {
        panic!("Failed to apply schema: {e}");
    }
    info!("database schema is up to date");
}

#[cfg(test)]
impl Config {
    pub async fn test(
        node: &testcontainers_modules::testcontainers::ContainerAsync<
            testcontainers_modules::postgres::Postgres,
        >,
    ) -> Self {
        let port = node
            .get_host_port_ipv4(5432)
            .await
            .expect("postgres port should be exposed");

        Self {
            host: String::from("127.0.0.1"),
            port,
            user: String::from("postgres"),
            password: String::from("postgres"),
            db: String::from("postgres"),
            pool_size: 2,
        }
    }
}
