use std::{net::SocketAddr, path::Path, sync::Arc};

use anyhow::{Context, Result};
use axum_server::Handle;
use blob_store::BlobStorage;
use catalog_store::CatalogStore;
use tokio::{self, signal};
use tracing::info;

use crate::{
    config::ServerConfig,
    files::FileManager,
    routes::{create_routes, RouteState},
};

/// Everything the server owns, wired once at startup and handed to the
/// routes. No handler reaches for globals.
#[derive(Clone)]
#[allow(dead_code)]
pub struct Service {
    pub config: ServerConfig,
    pub blob_storage: Arc<BlobStorage>,
    pub catalog: Arc<CatalogStore>,
    pub file_manager: Arc<FileManager>,
}

impl Service {
    pub async fn new(config: ServerConfig) -> Result<Self> {
        let blob_storage = Arc::new(
            BlobStorage::new(config.blob_storage.clone())
                .context("error initializing BlobStorage")?,
        );

        // SQLite will not create missing directories on its own.
        if let Some(dir) = Path::new(&config.catalog_path).parent() {
            std::fs::create_dir_all(dir).context("error creating catalog directory")?;
        }
        let catalog = Arc::new(
            CatalogStore::open(&config.catalog_path).context("error opening CatalogStore")?,
        );

        let file_manager = Arc::new(FileManager::new(catalog.clone(), blob_storage.clone()));

        Ok(Self {
            config,
            blob_storage,
            catalog,
            file_manager,
        })
    }

    pub async fn start(&self) -> Result<()> {
        let route_state = RouteState {
            file_manager: self.file_manager.clone(),
            max_upload_size_bytes: self.config.max_upload_size_bytes,
        };

        let handle = Handle::new();
        let handle_sh = handle.clone();
        tokio::spawn(async move {
            shutdown_signal(handle_sh).await;
            info!("graceful shutdown signal received, shutting down server gracefully");
        });

        // listen_addr may name port 0, so report the address the OS
        // actually bound. The desktop shell reads it from the log to
        // find the server.
        let handle_listening = handle.clone();
        tokio::spawn(async move {
            if let Some(addr) = handle_listening.listening().await {
                info!("server api listening on {}", addr);
            }
        });

        let addr: SocketAddr = self.config.listen_addr.parse()?;
        let routes = create_routes(route_state);
        axum_server::bind(addr)
            .handle(handle)
            .serve(routes.into_make_service())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal(handle: Handle) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
        },
        _ = terminate => {
        },
    }
    handle.shutdown();
    info!("signal received, shutting down server gracefully");
}
