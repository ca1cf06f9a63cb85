//! Runtime configuration, read from the environment (and `.env`).

use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{Context, Result};

use crate::consts;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub db_path: PathBuf,
    pub outbox_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: consts::HTTP_PORT,
            db_path: consts::DB_PATH.into(),
            outbox_path: consts::OUTBOX_PATH.into(),
        }
    }
}

impl Config {
    /// Builds the configuration from `CLINIC_*` variables, falling back to
    /// the defaults in [`consts`].
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(port) = env::var("CLINIC_HTTP_PORT") {
            config.http_port = port
                .parse()
                .with_context(|| format!("Invalid CLINIC_HTTP_PORT: {port}"))?;
        }
        if let Ok(path) = env::var("CLINIC_DB_PATH") {
            config.db_path = path.into();
        }
        if let Ok(path) = env::var("CLINIC_OUTBOX_PATH") {
            config.outbox_path = path.into();
        }

        Ok(config)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.http_port))
    }
}
