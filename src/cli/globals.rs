use crate::{
    api::ApiConfig,
    auth::Routes,
    relay::RelayConfig,
    session::FileStore,
};
use anyhow::{Context, Result};
use std::{path::PathBuf, time::Duration};

/// Settings shared by every subcommand.
#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_base_url: String,
    pub relay_base_url: String,
    pub relay_prefix: String,
    pub timeout: Duration,
    pub session_dir: PathBuf,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_base_url: String) -> Self {
        Self {
            api_base_url,
            relay_base_url: crate::api::client::DEFAULT_RELAY_BASE_URL.to_string(),
            relay_prefix: crate::api::client::DEFAULT_RELAY_PREFIX.to_string(),
            timeout: crate::api::client::DEFAULT_TIMEOUT,
            session_dir: PathBuf::from("."),
        }
    }

    #[must_use]
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig::new(self.api_base_url.clone())
            .with_relay(self.relay_base_url.clone(), &self.relay_prefix)
            .with_timeout(self.timeout)
    }

    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig::new(self.api_base_url.clone(), &self.relay_prefix).with_timeout(self.timeout)
    }

    #[must_use]
    pub fn routes(&self) -> Routes {
        Routes::default()
    }

    /// # Errors
    ///
    /// Returns an error if the session directory cannot be opened.
    pub fn open_store(&self) -> Result<FileStore> {
        FileStore::open(&self.session_dir).with_context(|| {
            format!(
                "Failed to open session store in {}",
                self.session_dir.display()
            )
        })
    }
}
