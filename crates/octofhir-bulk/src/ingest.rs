//! NDJSON ingestion of export output files.

use async_trait::async_trait;
use futures_util::future::try_join_all;
use octofhir_labs::{Record, ResourceCollection, ResourceKind};

use crate::error::{BulkError, BulkResult};
use crate::manifest::ExportManifest;

/// Fetches the body of an output file.
#[async_trait]
pub trait NdjsonSource: Send + Sync {
    async fn fetch_ndjson(&self, url: &str) -> BulkResult<String>;
}

/// Parses an NDJSON body as records of `kind`, skipping blank lines.
///
/// # Errors
///
/// Returns `BulkError::Record` naming `url` and the 1-based line number of the
/// first line that is not a valid record of `kind`.
pub fn parse_ndjson(kind: ResourceKind, url: &str, body: &str) -> BulkResult<Vec<Record>> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(idx, line)| {
            Record::parse(kind, line).map_err(|source| BulkError::Record {
                url: url.to_string(),
                line: idx + 1,
                source,
            })
        })
        .collect()
}

/// Downloads every output file of a manifest and groups the records by kind.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResourceIngester;

impl ResourceIngester {
    pub fn new() -> Self {
        Self
    }

    /// Downloads all files concurrently and merges them in manifest order.
    ///
    /// Every output kind is checked before the first download starts. Any
    /// failed download or parse fails the whole ingestion.
    ///
    /// # Errors
    ///
    /// - `BulkError::UnknownResourceKind` for an unsupported output kind
    /// - any error of the source
    /// - `BulkError::Record` for an invalid line
    pub async fn ingest<S>(&self, source: &S, manifest: &ExportManifest) -> BulkResult<ResourceCollection>
    where
        S: NdjsonSource + ?Sized,
    {
        let kinds = manifest.output_kinds()?;

        let downloads = manifest
            .output
            .iter()
            .zip(kinds)
            .map(|(file, kind)| async move {
                let body = source.fetch_ndjson(&file.url).await?;
                let records = parse_ndjson(kind, &file.url, &body)?;
                tracing::debug!(
                    url = %file.url,
                    collection = kind.collection_key(),
                    records = records.len(),
                    "Output file parsed"
                );
                Ok::<_, BulkError>(records)
            });
        let files = try_join_all(downloads).await?;

        let mut collection = ResourceCollection::new();
        for records in files {
            collection.extend(records);
        }

        tracing::info!(
            files = manifest.output.len(),
            patients = collection.count(ResourceKind::Patient),
            observations = collection.count(ResourceKind::Observation),
            "Export output ingested"
        );
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::OutputFileReference;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MapSource {
        files: HashMap<String, String>,
        fetched: Mutex<Vec<String>>,
    }

    impl MapSource {
        fn with(mut self, url: &str, body: &str) -> Self {
            self.files.insert(url.to_string(), body.to_string());
            self
        }
    }

    #[async_trait]
    impl NdjsonSource for MapSource {
        async fn fetch_ndjson(&self, url: &str) -> BulkResult<String> {
            self.fetched.lock().unwrap().push(url.to_string());
            self.files.get(url).cloned().ok_or_else(|| BulkError::UnexpectedStatus {
                url: url.to_string(),
                status: 404,
                message: "not found".to_string(),
            })
        }
    }

    fn output(kind: &str, url: &str) -> OutputFileReference {
        OutputFileReference {
            resource_type: kind.to_string(),
            url: url.to_string(),
            count: None,
        }
    }

    fn manifest(outputs: Vec<OutputFileReference>) -> ExportManifest {
        ExportManifest {
            output: outputs,
            ..Default::default()
        }
    }

    #[test]
    fn test_parse_skips_blank_lines() {
        let body = "{\"resourceType\":\"Patient\",\"id\":\"p1\"}\n\n  \n{\"resourceType\":\"Patient\",\"id\":\"p2\"}\n";
        let records = parse_ndjson(ResourceKind::Patient, "u", body).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let body = "{\"resourceType\":\"Patient\",\"id\":\"p1\"}\n\n{broken\n";
        let err = parse_ndjson(ResourceKind::Patient, "https://files/p.ndjson", body).unwrap_err();
        match err {
            BulkError::Record { url, line, .. } => {
                assert_eq!(url, "https://files/p.ndjson");
                assert_eq!(line, 3);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_ingest_groups_in_manifest_order() {
        let source = MapSource::default()
            .with(
                "o1",
                "{\"resourceType\":\"Observation\",\"id\":\"o1\"}\n{\"resourceType\":\"Observation\",\"id\":\"o2\"}",
            )
            .with("p1", "{\"resourceType\":\"Patient\",\"id\":\"p1\"}")
            .with("o2", "{\"resourceType\":\"Observation\",\"id\":\"o3\"}\n");
        let manifest = manifest(vec![
            output("Observation", "o1"),
            output("Patient", "p1"),
            output("Observation", "o2"),
        ]);

        let collection = ResourceIngester::new().ingest(&source, &manifest).await.unwrap();

        let ids: Vec<_> = collection.observations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, ["o1", "o2", "o3"]);
        assert_eq!(collection.patients.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected_before_download() {
        let source = MapSource::default().with("p1", "{\"resourceType\":\"Patient\",\"id\":\"p1\"}");
        let manifest = manifest(vec![output("Patient", "p1"), output("Encounter", "e1")]);

        let err = ResourceIngester::new().ingest(&source, &manifest).await.unwrap_err();
        assert!(matches!(err, BulkError::UnknownResourceKind { .. }));
        assert!(source.fetched.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_failure_fails_ingestion() {
        let source = MapSource::default().with("p1", "{\"resourceType\":\"Patient\",\"id\":\"p1\"}");
        let manifest = manifest(vec![output("Patient", "p1"), output("Observation", "missing")]);

        let err = ResourceIngester::new().ingest(&source, &manifest).await.unwrap_err();
        assert!(matches!(err, BulkError::UnexpectedStatus { status: 404, url, .. } if url == "missing"));
    }

    #[tokio::test]
    async fn test_kind_mismatch_fails_ingestion() {
        let source = MapSource::default().with("p1", "{\"resourceType\":\"Observation\",\"id\":\"o1\"}");
        let manifest = manifest(vec![output("Patient", "p1")]);

        let err = ResourceIngester::new().ingest(&source, &manifest).await.unwrap_err();
        assert!(matches!(err, BulkError::Record { line: 1, .. }));
    }

    #[tokio::test]
    async fn test_empty_manifest() {
        let collection = ResourceIngester::new()
            .ingest(&MapSource::default(), &manifest(vec![]))
            .await
            .unwrap();
        assert!(collection.is_empty());
    }
}
