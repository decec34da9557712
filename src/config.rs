use std::{env, net::SocketAddr};

use anyhow::Result;
use blob_store::BlobStorageConfig;
use figment::{
    providers::{Format, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};

fn default_listen_addr() -> String {
    // Loopback only; the desktop shell is the only intended client.
    "127.0.0.1:8900".to_string()
}

fn default_catalog_path() -> String {
    env::current_dir()
        .unwrap()
        .join("datadeck_storage/catalog.db")
        .to_str()
        .unwrap()
        .to_string()
}

fn default_max_upload_size_bytes() -> usize {
    100 * 1024 * 1024
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind. Port 0 asks the OS for a free port; the bound
    /// address is logged once the listener is up.
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default = "default_catalog_path")]
    pub catalog_path: String,
    #[serde(default)]
    pub blob_storage: BlobStorageConfig,
    #[serde(default = "default_max_upload_size_bytes")]
    pub max_upload_size_bytes: usize,
    #[serde(default)]
    pub structured_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen_addr: default_listen_addr(),
            catalog_path: default_catalog_path(),
            blob_storage: Default::default(),
            max_upload_size_bytes: default_max_upload_size_bytes(),
            structured_logging: false,
        }
    }
}

impl ServerConfig {
    pub fn from_path(path: &str) -> Result<ServerConfig> {
        let config_str = std::fs::read_to_string(path)?;
        let config: ServerConfig = Figment::new().merge(Yaml::string(&config_str)).extract()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.listen_addr.parse::<SocketAddr>().is_err() {
            return Err(anyhow::anyhow!(
                "invalid listen address: {}",
                self.listen_addr
            ));
        }
        if self.max_upload_size_bytes == 0 {
            return Err(anyhow::anyhow!("max_upload_size_bytes must be non zero"));
        }
        Ok(())
    }
}
