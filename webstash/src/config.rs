use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::backend::{BackendOptions, DurableOptions, LegacyOptions, SessionOptions};
use crate::host::PageContext;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StashConfig {
    pub backends: BackendsConfig,
    pub page: PageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendsConfig {
    pub durable: DurableOptions,
    pub session: SessionOptions,
    pub legacy: LegacyOptions,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageConfig {
    /// URL the store namespaces keys under
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for StashConfig {
    fn default() -> Self {
        let backends = BackendOptions::default();
        Self {
            backends: BackendsConfig {
                durable: backends.durable,
                session: backends.session,
                legacy: backends.legacy,
            },
            page: PageConfig {
                url: "http://localhost/".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
            },
        }
    }
}

impl StashConfig {
    /// Load configuration from YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: StashConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Convert to BackendOptions
    pub fn to_backend_options(&self) -> BackendOptions {
        BackendOptions {
            durable: self.backends.durable.clone(),
            session: self.backends.session.clone(),
            legacy: self.backends.legacy.clone(),
        }
    }

    /// Parse the configured page URL
    pub fn to_page_context(&self) -> anyhow::Result<PageContext> {
        PageContext::from_url(&self.page.url)
            .map_err(|e| anyhow::anyhow!("Invalid page url {:?}: {}", self.page.url, e))
    }
}
