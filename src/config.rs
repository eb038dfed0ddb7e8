//! Server configuration, read from the environment (a `.env` file is honoured by `main`).
//!
//! | Variable | Default |
//! |---|---|
//! | `MARKET_HOST` | `127.0.0.1` |
//! | `MARKET_PORT` | `8080` |
//! | `MARKET_STORAGE` | `mongodb` (or `memory`) |
//! | `DATABASE_URL` | required when storage is `mongodb` |
//! | `DATABASE_NAME` | `e_market` |
//! | `JWT_SECRET` | required |
//! | `ACCESS_TOKEN_TTL_SECS` | `3600` |
//! | `REFRESH_TOKEN_TTL_SECS` | `604800` |
//! | `ARGON2_MEM_COST` | rust-argon2 default |
//! | `ARGON2_TIME_COST` | rust-argon2 default |
use std::{env, str::FromStr};

use chrono::Duration;
use log::*;

use crate::{auth::HashConfig, errors::ServerError};

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;
const DEFAULT_DATABASE_NAME: &str = "e_market";
const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
const DEFAULT_REFRESH_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StorageBackend {
    MongoDb,
    Memory,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(Self::MongoDb),
            "memory" | "in-memory" => Ok(Self::Memory),
            other => Err(format!("'{other}' is not a storage backend. Use 'mongodb' or 'memory'.")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub storage: StorageBackend,
    pub database_url: Option<String>,
    pub database_name: String,
    pub auth: AuthConfig,
    pub hashing: HashConfig,
}

impl ServerConfig {
    /// Builds the configuration from environment variables. A missing `JWT_SECRET`, or a missing `DATABASE_URL` for
    /// the MongoDB backend, is an error. Unparseable optional values fall back to their defaults with a warning.
    pub fn from_env() -> Result<Self, ServerError> {
        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ServerError::ConfigurationError("JWT_SECRET must be set".into()))?;
        let storage = match env::var("MARKET_STORAGE") {
            Ok(s) => s.parse().map_err(ServerError::ConfigurationError)?,
            Err(_) => StorageBackend::MongoDb,
        };
        let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());
        if storage == StorageBackend::MongoDb && database_url.is_none() {
            return Err(ServerError::ConfigurationError("DATABASE_URL must be set for the mongodb backend".into()));
        }
        let hash_defaults = HashConfig::default();
        Ok(Self {
            host: env::var("MARKET_HOST").unwrap_or_else(|_| DEFAULT_HOST.into()),
            port: parse_or_default("MARKET_PORT", DEFAULT_PORT),
            storage,
            database_url,
            database_name: env::var("DATABASE_NAME").unwrap_or_else(|_| DEFAULT_DATABASE_NAME.into()),
            auth: AuthConfig {
                jwt_secret,
                access_token_ttl: Duration::seconds(parse_or_default(
                    "ACCESS_TOKEN_TTL_SECS",
                    DEFAULT_ACCESS_TOKEN_TTL_SECS,
                )),
                refresh_token_ttl: Duration::seconds(parse_or_default(
                    "REFRESH_TOKEN_TTL_SECS",
                    DEFAULT_REFRESH_TOKEN_TTL_SECS,
                )),
            },
            hashing: HashConfig {
                mem_cost: parse_or_default("ARGON2_MEM_COST", hash_defaults.mem_cost),
                time_cost: parse_or_default("ARGON2_TIME_COST", hash_defaults.time_cost),
            },
        })
    }
}

fn parse_or_default<T>(var: &str, default: T) -> T
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(s) => s.trim().parse::<T>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
