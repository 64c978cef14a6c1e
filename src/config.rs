use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::engine::Settings;
use crate::error::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    Memory,
}

impl FromStr for StoreKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" => Ok(StoreKind::Postgres),
            "memory" => Ok(StoreKind::Memory),
            _ => Err(Error::config_error("RIDE_STORE")),
        }
    }
}

/// Process configuration, read from the environment (and `.env`, once loaded).
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub store: StoreKind,
    pub bind_addr: SocketAddr,
    pub sweep_interval: Duration,
    pub sweep_record_timeout: Duration,
    pub retry_budget: u32,
    pub retry_backoff: Duration,
    pub sweep_concurrency: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|key| match env::var(key) {
            Ok(value) => Ok(Some(value)),
            Err(env::VarError::NotPresent) => Ok(None),
            Err(err) => Err(err.into()),
        })
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> Result<Option<String>, Error>,
    {
        let parse = |key: &str, default: &str| -> Result<String, Error> {
            Ok(lookup(key)?.unwrap_or_else(|| default.to_string()))
        };

        let retry_budget: u32 = parse_value("RETRY_BUDGET", &parse("RETRY_BUDGET", "5")?)?;
        if retry_budget == 0 {
            return Err(Error::config_error("RETRY_BUDGET"));
        }

        let sweep_concurrency: usize =
            parse_value("SWEEP_CONCURRENCY", &parse("SWEEP_CONCURRENCY", "4")?)?;
        if sweep_concurrency == 0 {
            return Err(Error::config_error("SWEEP_CONCURRENCY"));
        }

        Ok(Self {
            database_url: lookup("DATABASE_URL")?,
            database_max_connections: parse_value(
                "DATABASE_MAX_CONNECTIONS",
                &parse("DATABASE_MAX_CONNECTIONS", "5")?,
            )?,
            store: parse("RIDE_STORE", "postgres")?.parse()?,
            bind_addr: parse_value("BIND_ADDR", &parse("BIND_ADDR", "127.0.0.1:3000")?)?,
            sweep_interval: Duration::from_secs(parse_value(
                "SWEEP_INTERVAL_SECS",
                &parse("SWEEP_INTERVAL_SECS", "5")?,
            )?),
            sweep_record_timeout: Duration::from_millis(parse_value(
                "SWEEP_RECORD_TIMEOUT_MS",
                &parse("SWEEP_RECORD_TIMEOUT_MS", "2000")?,
            )?),
            retry_budget,
            retry_backoff: Duration::from_millis(parse_value(
                "RETRY_BACKOFF_MS",
                &parse("RETRY_BACKOFF_MS", "10")?,
            )?),
            sweep_concurrency,
        })
    }

    pub fn engine_settings(&self) -> Settings {
        Settings {
            retry_budget: self.retry_budget,
            retry_backoff: self.retry_backoff,
            sweep_record_timeout: self.sweep_record_timeout,
            sweep_concurrency: self.sweep_concurrency,
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str) -> Result<T, Error> {
    raw.trim().parse().map_err(|_| Error::config_error(key))
}
