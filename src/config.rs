//! Environment-driven configuration for the bridge.

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::{debug, info};

fn env_opt(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.is_empty())
}

#[derive(Debug)]
pub struct Settings {
    pub octopus_api_url: String,
    pub octopus_web_url: String,
    pub atproto_pds_url: String,
    pub database_path: PathBuf,
    pub sync_interval_days: i64,
}

impl Settings {
    /// Read settings from the environment. Missing required variables are
    /// collected and reported together.
    pub fn from_env() -> Result<Self> {
        let mut missing: Vec<&str> = Vec::new();
        let mut require = |name: &'static str| {
            env_opt(name).unwrap_or_else(|| {
                missing.push(name);
                String::new()
            })
        };

        let octopus_api_url = require("OCTOPUS_API_URL");
        let octopus_web_url = require("OCTOPUS_WEB_URL");
        let atproto_pds_url =
            env_opt("ATPROTO_PDS_URL").unwrap_or_else(|| "https://bsky.social".to_string());
        let database_path = env_opt("DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("octosphere.db"));
        let sync_interval_days = match env_opt("SYNC_INTERVAL_DAYS") {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|e| anyhow!("SYNC_INTERVAL_DAYS must be an integer: {e}"))?,
            None => 7,
        };

        if !missing.is_empty() {
            return Err(anyhow!(
                "Missing required environment variables: {}",
                missing.join(", ")
            ));
        }

        Ok(Self {
            octopus_api_url,
            octopus_web_url,
            atproto_pds_url,
            database_path,
            sync_interval_days,
        })
    }

    pub fn trace_loaded(&self) {
        info!(
            octopus_api_url = %self.octopus_api_url,
            atproto_pds_url = %self.atproto_pds_url,
            database_path = %self.database_path.display(),
            "Loaded settings"
        );
        debug!(?self, "Settings loaded (full debug)");
    }
}
