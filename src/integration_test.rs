#[cfg(test)]
mod tests {
    use anyhow::Result;
    use bytes::Bytes;
    use data_model::FileFormat;
    use futures::stream;

    use crate::{files::FileError, testing::TestService};

    const SALES_CSV: &[u8] = b"name,amount\nAlice,10\nBob,20\n";

    fn byte_stream(
        data: &'static [u8],
    ) -> impl futures::Stream<Item = Result<Bytes>> + Send + Unpin {
        stream::iter(vec![Ok(Bytes::from_static(data))])
    }

    fn blob_count(test_srv: &TestService) -> usize {
        match std::fs::read_dir(test_srv.blob_dir()) {
            Ok(entries) => entries.count(),
            Err(_) => 0,
        }
    }

    #[tokio::test]
    async fn test_csv_upload_round_trip() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        let entry = file_manager.ingest("sales.csv", byte_stream(SALES_CSV)).await?;
        assert_eq!(entry.id, 1);
        assert_eq!(entry.display_name, "sales.csv");
        assert_ne!(entry.storage_name, "sales.csv");
        assert!(entry.storage_name.ends_with(".csv"));
        assert_eq!(entry.size_bytes, SALES_CSV.len() as u64);

        let (fetched, rows) = file_manager.file_data(entry.id).await?;
        assert_eq!(fetched.display_name, "sales.csv");
        // Stored-then-retrieved data equals parsing the source bytes.
        assert_eq!(rows, tabular::parse(FileFormat::Csv, SALES_CSV)?);
        assert_eq!(
            serde_json::to_string(&rows)?,
            r#"[{"name":"Alice","amount":10},{"name":"Bob","amount":20}]"#
        );

        assert_eq!(blob_count(&test_srv), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_xlsx_upload_round_trip() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;
        let workbook: &[u8] = include_bytes!("../tabular/tests/data/simple.xlsx");

        let entry = file_manager.ingest("simple.xlsx", byte_stream(workbook)).await?;
        assert!(entry.storage_name.ends_with(".xlsx"));

        let (_, rows) = file_manager.file_data(entry.id).await?;
        assert_eq!(rows, tabular::parse(FileFormat::Xlsx, workbook)?);
        assert_eq!(rows.len(), 3);
        Ok(())
    }

    #[tokio::test]
    async fn test_rejected_upload_leaves_no_trace() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        let err = file_manager
            .ingest("report.pdf", byte_stream(b"%PDF-1.7"))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFormat(_)));
        assert!(file_manager.list_all()?.is_empty());
        // Validation happens before storage, so the blob directory was
        // never even created.
        assert!(!test_srv.blob_dir().exists());

        // Same once real data exists: counts stay put.
        file_manager.ingest("sales.csv", byte_stream(SALES_CSV)).await?;
        let err = file_manager
            .ingest("sales.CSV", byte_stream(SALES_CSV))
            .await
            .unwrap_err();
        assert!(matches!(err, FileError::UnsupportedFormat(_)));
        assert_eq!(file_manager.list_all()?.len(), 1);
        assert_eq!(blob_count(&test_srv), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_listing_preserves_upload_order() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        for name in ["q1.csv", "q2.csv", "q3.csv"] {
            file_manager.ingest(name, byte_stream(SALES_CSV)).await?;
        }

        let entries = file_manager.list_all()?;
        assert_eq!(entries.len(), 3);
        let names: Vec<&str> = entries.iter().map(|e| e.display_name.as_str()).collect();
        assert_eq!(names, ["q1.csv", "q2.csv", "q3.csv"]);
        assert!(entries.windows(2).all(|pair| pair[0].id < pair[1].id));
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_uploads_of_the_same_filename() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        let (first, second) = tokio::join!(
            file_manager.ingest("sales.csv", byte_stream(b"name,amount\nAlice,10\n")),
            file_manager.ingest("sales.csv", byte_stream(b"name,amount\nBob,20\n")),
        );
        let first = first?;
        let second = second?;

        // Same display name, but never merged.
        assert_ne!(first.id, second.id);
        assert_ne!(first.storage_name, second.storage_name);

        let (_, first_rows) = file_manager.file_data(first.id).await?;
        let (_, second_rows) = file_manager.file_data(second.id).await?;
        assert_ne!(first_rows, second_rows);
        assert_eq!(first_rows[0]["name"], data_model::CellValue::Text("Alice".into()));
        assert_eq!(second_rows[0]["name"], data_model::CellValue::Text("Bob".into()));
        Ok(())
    }

    #[tokio::test]
    async fn test_data_for_unknown_id_is_not_found() -> Result<()> {
        let test_srv = TestService::new().await?;
        let err = test_srv
            .service
            .file_manager
            .file_data(42)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            FileError::Catalog(catalog_store::Error::NotFound { id: 42 })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_data_for_missing_blob_is_an_error() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        let entry = file_manager.ingest("sales.csv", byte_stream(SALES_CSV)).await?;
        // Corrupt the store behind the catalog's back.
        test_srv
            .service
            .blob_storage
            .delete(&entry.storage_name)
            .await?;

        // The caller has to see the failure, not an empty result.
        let err = file_manager.file_data(entry.id).await.unwrap_err();
        assert!(matches!(err, FileError::Storage(_)));
        Ok(())
    }

    #[tokio::test]
    async fn test_unparseable_content_fails_at_read_time() -> Result<()> {
        let test_srv = TestService::new().await?;
        let file_manager = &test_srv.service.file_manager;

        // Uploads are not parsed inline, so a ragged CSV is accepted...
        let entry = file_manager
            .ingest("ragged.csv", byte_stream(b"a,b\n1\n"))
            .await?;

        // ...and the parse failure surfaces when the data is requested.
        let err = file_manager.file_data(entry.id).await.unwrap_err();
        assert!(matches!(err, FileError::Parse(_)));
        Ok(())
    }
}
