use std::sync::Arc;

use anyhow::Result;
use blob_store::BlobStorage;
use bytes::Bytes;
use catalog_store::CatalogStore;
use data_model::{generate_storage_name, FileFormat, FileMetadata, Row};
use tracing::{error, info};

#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error(transparent)]
    Parse(#[from] tabular::Error),
    #[error(transparent)]
    Catalog(#[from] catalog_store::Error),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Coordinates the blob store and the catalog. Uploaded bytes land in
/// the blob store first, then the catalog entry is written; a file is
/// only visible once both steps succeed.
pub struct FileManager {
    catalog: Arc<CatalogStore>,
    blob_storage: Arc<BlobStorage>,
}

impl FileManager {
    pub fn new(catalog: Arc<CatalogStore>, blob_storage: Arc<BlobStorage>) -> Self {
        Self {
            catalog,
            blob_storage,
        }
    }

    /// Accept one uploaded file. Validates the name before touching
    /// storage, streams the bytes to the blob store under a generated
    /// name, then records the catalog entry. If cataloging fails the
    /// blob is deleted so the store holds no unreferenced data.
    pub async fn ingest(
        &self,
        original_filename: &str,
        data: impl futures::Stream<Item = Result<Bytes>> + Send + Unpin,
    ) -> Result<FileMetadata, FileError> {
        let format = FileFormat::from_file_name(original_filename)
            .ok_or_else(|| FileError::UnsupportedFormat(original_filename.to_string()))?;

        let storage_name = generate_storage_name(format);
        let put_result = self.blob_storage.put(&storage_name, data).await?;

        let entry = match self.catalog.create(
            original_filename,
            &storage_name,
            put_result.size_bytes,
            &put_result.sha256_hash,
        ) {
            Ok(entry) => entry,
            Err(catalog_store::Error::Conflict { .. }) => {
                // The request body is gone at this point, so a name
                // collision is handled by renaming the blob we already
                // wrote, not by re-uploading.
                self.retry_with_fresh_name(original_filename, format, &storage_name, &put_result)
                    .await?
            }
            Err(e) => {
                self.discard_blob(&storage_name).await;
                return Err(FileError::Catalog(e));
            }
        };

        info!(
            "ingested {} as {} with id {}",
            original_filename, entry.storage_name, entry.id
        );
        Ok(entry)
    }

    async fn retry_with_fresh_name(
        &self,
        original_filename: &str,
        format: FileFormat,
        storage_name: &str,
        put_result: &blob_store::PutResult,
    ) -> Result<FileMetadata, FileError> {
        let retry_name = generate_storage_name(format);
        if let Err(e) = self.blob_storage.rename(storage_name, &retry_name).await {
            self.discard_blob(storage_name).await;
            return Err(FileError::Storage(e));
        }
        match self.catalog.create(
            original_filename,
            &retry_name,
            put_result.size_bytes,
            &put_result.sha256_hash,
        ) {
            Ok(entry) => Ok(entry),
            Err(catalog_store::Error::Conflict { storage_name }) => {
                self.discard_blob(&retry_name).await;
                Err(FileError::Storage(anyhow::anyhow!(
                    "storage name collided twice: {}",
                    storage_name
                )))
            }
            Err(e) => {
                self.discard_blob(&retry_name).await;
                Err(FileError::Catalog(e))
            }
        }
    }

    // Compensation for a failed ingest. The catalog row does not exist,
    // so the blob must not survive either.
    async fn discard_blob(&self, storage_name: &str) {
        if let Err(e) = self.blob_storage.delete(storage_name).await {
            error!("failed to remove orphaned blob {}: {:?}", storage_name, e);
        }
    }

    pub fn list_all(&self) -> Result<Vec<FileMetadata>, FileError> {
        Ok(self.catalog.list_all()?)
    }

    /// Load the blob for a catalog id and parse it into rows. Parsing
    /// happens on demand; nothing is cached between calls.
    pub async fn file_data(&self, id: i64) -> Result<(FileMetadata, Vec<Row>), FileError> {
        let entry = self.catalog.get_by_id(id)?;
        let format = FileFormat::from_file_name(&entry.storage_name)
            .ok_or_else(|| FileError::UnsupportedFormat(entry.storage_name.clone()))?;
        let bytes = self.blob_storage.read_bytes(&entry.storage_name).await?;
        let rows = tabular::parse(format, &bytes)?;
        Ok((entry, rows))
    }
}
