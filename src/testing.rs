use std::path::PathBuf;

use anyhow::Result;
use blob_store::BlobStorageConfig;
use tracing::subscriber;
use tracing_subscriber::{layer::SubscriberExt, Layer};

use crate::{
    config::ServerConfig,
    routes::RouteState,
    service::Service,
};

pub struct TestService {
    pub service: Service,
    // Dropping the TempDir deletes the catalog and every blob, so it
    // has to outlive the service built on top of it.
    temp_dir: tempfile::TempDir,
}

impl TestService {
    pub async fn new() -> Result<Self> {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("trace"));
        let _ = subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(tracing_subscriber::fmt::layer().with_filter(env_filter)),
        );

        let temp_dir = tempfile::tempdir()?;

        let cfg = ServerConfig {
            catalog_path: temp_dir
                .path()
                .join("catalog.db")
                .to_str()
                .unwrap()
                .to_string(),
            blob_storage: BlobStorageConfig {
                path: format!(
                    "file://{}",
                    temp_dir.path().join("blob_store").to_str().unwrap()
                ),
            },
            ..Default::default()
        };
        let srv = Service::new(cfg).await?;

        Ok(Self {
            service: srv,
            temp_dir,
        })
    }

    pub fn route_state(&self) -> RouteState {
        RouteState {
            file_manager: self.service.file_manager.clone(),
            max_upload_size_bytes: self.service.config.max_upload_size_bytes,
        }
    }

    /// Directory the blob store writes into, for asserting on what is
    /// actually on disk.
    pub fn blob_dir(&self) -> PathBuf {
        self.temp_dir.path().join("blob_store")
    }
}
