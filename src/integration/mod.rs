use std::env;
use std::str::FromStr;
use std::{fs::File, net::SocketAddr};

use axum::http::HeaderValue;
use axum_server::tls_openssl::OpenSSLConfig;
use dotenv::dotenv;
use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, TermLogger, TerminalMode, WriteLogger};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::{attachment, auth};

pub mod db;

/// Deployment stage, read from `ENV`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Env {
    Local,
    Dev,
    Stage,
    Production,
}

impl FromStr for Env {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "local" => Ok(Self::Local),
            "dev" => Ok(Self::Dev),
            "stg" => Ok(Self::Stage),
            "prod" => Ok(Self::Production),
            other => Err(format!("Invalid environment: {other}")),
        }
    }
}

impl Env {
    pub fn addr(&self) -> SocketAddr {
        match self {
            Env::Local => SocketAddr::from(([127, 0, 0, 1], 8000)),
            Env::Dev | Env::Stage => SocketAddr::from(([0, 0, 0, 0], 8000)),
            Env::Production => SocketAddr::from(([0, 0, 0, 0], 8443)),
        }
    }

    /// TLS terminates here only in production.
    pub fn ssl_config(&self) -> Option<OpenSSLConfig> {
        if *self != Env::Production {
            return None;
        }

        let cert = env::var("SSL_CERT_FILE").expect("SSL_CERT_FILE must be set");
        let key = env::var("SSL_KEY_FILE").expect("SSL_KEY_FILE must be set");
        match OpenSSLConfig::from_pem_file(cert, key) {
            Ok(ssl_config) => Some(ssl_config),
            Err(e) => panic!("Failed to load TLS material: {e}"),
        }
    }

    pub fn cors(&self) -> CorsLayer {
        let origin = match self {
            Env::Local | Env::Dev => AllowOrigin::any(),
            Env::Stage | Env::Production => {
                let origins = env::var("ALLOW_ORIGIN")
                    .expect("ALLOW_ORIGIN must be set")
                    .split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(|o| HeaderValue::from_str(o).expect("invalid ALLOW_ORIGIN value"))
                    .collect::<Vec<HeaderValue>>();
                AllowOrigin::list(origins)
            }
        };

        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods(AllowMethods::any())
            .allow_headers(AllowHeaders::any())
    }
}

#[derive(Clone)]
pub struct Config {
    pub env: Env,

    pub pg: db::Config,
    pub storage: attachment::storage::Config,

    pub auth: auth::Config,
}

impl Default for Config {
    fn default() -> Self {
        dotenv().ok();
        init_logger();

        let env = env::var("ENV")
            .map(|env| env.parse().unwrap_or_else(|e: String| panic!("{e}")))
            .unwrap_or(Env::Local);

        Self {
            env,
            pg: db::Config::env().unwrap_or_default(),
            storage: attachment::storage::Config::env(),
            auth: auth::Config::new(env::var("JWT_SECRET").expect("JWT_SECRET must be set")),
        }
    }
}

/// Terminal plus `<SERVICE_NAME>.log`, at the `RUST_LOG` level.
fn init_logger() {
    let level = env::var("RUST_LOG")
        .ok()
        .and_then(|l| LevelFilter::from_str(&l).ok())
        .unwrap_or(LevelFilter::Info);
    let log_file = env::var("SERVICE_NAME")
        .map(|name| format!("{name}.log"))
        .unwrap_or("service.log".into());

    CombinedLogger::init(vec![
        TermLogger::new(
            level,
            simplelog::Config::default(),
            TerminalMode::Mixed,
            ColorChoice::Auto,
        ),
        WriteLogger::new(
            level,
            simplelog::Config::default(),
            File::create(log_file).expect("Failed to create log file"),
        ),
    ])
    .expect("Failed to initialize logger");
}
