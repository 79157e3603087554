use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-me";

/// Ten years; keeps `now + ttl` far inside chrono's date range.
const MAX_SESSION_DAYS: i64 = 3650;

pub struct Config {
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub addr: SocketAddr,
    pub session_ttl: chrono::Duration,
}

impl Config {
    /// Read `WARBLER_*` variables, falling back to development defaults.
    pub fn from_env() -> Result<Self> {
        let jwt_secret = std::env::var("WARBLER_JWT_SECRET").unwrap_or_else(|_| {
            warn!("WARBLER_JWT_SECRET not set, using the development secret");
            DEV_JWT_SECRET.into()
        });
        let db_path = std::env::var("WARBLER_DB_PATH").unwrap_or_else(|_| "warbler.db".into());
        let host = std::env::var("WARBLER_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = std::env::var("WARBLER_PORT")
            .unwrap_or_else(|_| "3000".into())
            .parse()
            .context("WARBLER_PORT must be a port number")?;
        let session_days: i64 = std::env::var("WARBLER_SESSION_DAYS")
            .unwrap_or_else(|_| "30".into())
            .parse()
            .context("WARBLER_SESSION_DAYS must be a whole number of days")?;

        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        Ok(Self {
            db_path: PathBuf::from(db_path),
            jwt_secret,
            addr,
            session_ttl: session_ttl(session_days)?,
        })
    }
}

/// Between 1 and `MAX_SESSION_DAYS` days.
fn session_ttl(days: i64) -> Result<chrono::Duration> {
    if !(1..=MAX_SESSION_DAYS).contains(&days) {
        bail!(
            "WARBLER_SESSION_DAYS must be between 1 and {}, got {}",
            MAX_SESSION_DAYS,
            days
        );
    }
    chrono::Duration::try_days(days)
        .with_context(|| format!("WARBLER_SESSION_DAYS is out of range: {}", days))
}
