use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;

use campus_digest::GeminiConfig;
use campus_digest::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT};

#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub gemini: GeminiConfig,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = var("CAMPUS_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = var("CAMPUS_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("CAMPUS_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", host, port))?;

        let db_path = PathBuf::from(var("CAMPUS_DB_PATH").unwrap_or_else(|| "campus.db".into()));

        let timeout = match var("CAMPUS_GENERATION_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(
                secs.parse()
                    .context("CAMPUS_GENERATION_TIMEOUT_SECS must be a whole number of seconds")?,
            ),
            None => DEFAULT_TIMEOUT,
        };

        // Without a key the service refuses every request; chat still runs.
        let gemini = GeminiConfig {
            api_key: var("GEMINI_API_KEY").unwrap_or_default(),
            model: var("CAMPUS_GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.into()),
            base_url: var("CAMPUS_GEMINI_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.into()),
            timeout,
        };

        Ok(Self {
            addr,
            db_path,
            gemini,
        })
    }
}
