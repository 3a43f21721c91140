use crate::embeddings::Embedder;
use crate::extractor::PdfExtractor;
use crate::traits::VectorIndex;
use crate::{build_chunks, IngestError, IngestionOptions, PdfChunk, VectorRecord};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use walkdir::WalkDir;

/// Lists the `*.pdf` files directly inside `folder`, sorted by path.
pub fn discover_pdf_files(folder: &Path) -> Result<Vec<PathBuf>, IngestError> {
    if !fs::metadata(folder)?.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "not a directory: {}",
            folder.display()
        )));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    Ok(files)
}

#[derive(Debug, Clone)]
pub struct FileReport {
    pub path: PathBuf,
    pub pages: usize,
    pub chunks: usize,
}

#[derive(Debug, Clone, Default)]
pub struct IngestionReport {
    pub files: Vec<FileReport>,
    pub records_upserted: usize,
}

/// Load → chunk → embed → upsert, one file at a time.
///
/// The first error aborts the run. Batches already upserted stay in the index.
pub struct IngestionPipeline {
    extractor: Arc<dyn PdfExtractor>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorIndex>,
    options: IngestionOptions,
    last_stamp: AtomicI64,
}

impl IngestionPipeline {
    pub fn new(
        extractor: Arc<dyn PdfExtractor>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorIndex>,
        options: IngestionOptions,
    ) -> Self {
        Self {
            extractor,
            embedder,
            index,
            options,
            last_stamp: AtomicI64::new(0),
        }
    }

    pub async fn ingest_folder(&self, folder: &Path) -> Result<IngestionReport, IngestError> {
        let files = discover_pdf_files(folder)?;
        if files.is_empty() {
            warn!(folder = %folder.display(), "no pdf files found");
        }

        let mut report = IngestionReport::default();
        let mut cursor = 0u64;

        for path in files {
            let (file_report, upserted) = self.ingest_file(&path, &mut cursor).await?;
            report.records_upserted += upserted;
            report.files.push(file_report);
        }

        info!(
            files = report.files.len(),
            records = report.records_upserted,
            "all pdf files processed"
        );
        Ok(report)
    }

    pub async fn ingest_file(
        &self,
        path: &Path,
        cursor: &mut u64,
    ) -> Result<(FileReport, usize), IngestError> {
        let source = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| IngestError::MissingFileName(path.display().to_string()))?
            .to_string();
        info!(file = %source, "processing");

        let extractor = Arc::clone(&self.extractor);
        let owned_path = path.to_path_buf();
        let pages =
            tokio::task::spawn_blocking(move || extractor.extract_pages(&owned_path)).await??;
        if pages.is_empty() {
            warn!(file = %source, "no extractable text");
        }

        let stamp = self.next_stamp();
        let mut chunks: Vec<PdfChunk> = Vec::new();
        for page in &pages {
            let (page_chunks, next_cursor) =
                build_chunks(&source, page.number, &page.text, &self.options, stamp, *cursor)?;
            *cursor = next_cursor;
            chunks.extend(page_chunks);
        }

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let values = self.embedder.embed(&chunk.text).await?;
            records.push(VectorRecord::from_chunk(chunk, values));
        }

        for batch in records.chunks(self.options.upsert_batch_size.max(1)) {
            self.index.upsert(batch).await?;
        }

        info!(file = %source, pages = pages.len(), chunks = chunks.len(), "completed");
        Ok((
            FileReport {
                path: path.to_path_buf(),
                pages: pages.len(),
                chunks: chunks.len(),
            },
            records.len(),
        ))
    }

    /// Wall-clock millis, bumped so that no two files of this pipeline share a stamp.
    fn next_stamp(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let mut previous = self.last_stamp.load(Ordering::SeqCst);
        loop {
            let candidate = now.max(previous + 1);
            match self.last_stamp.compare_exchange(
                previous,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return candidate,
                Err(actual) => previous = actual,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::PageText;
    use crate::stores::InMemoryIndex;
    use crate::{CharacterNgramEmbedder, IndexStats, QueryMatch, SearchError};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct FakeExtractor;

    impl PdfExtractor for FakeExtractor {
        fn extract_pages(&self, path: &Path) -> Result<Vec<PageText>, IngestError> {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if name.starts_with("broken") {
                return Err(IngestError::PdfParse(format!("cannot parse {name}")));
            }
            Ok(vec![
                PageText {
                    number: 1,
                    text: format!("{name} covers IFRS17 measurement models."),
                },
                PageText {
                    number: 2,
                    text: "aaaa bbbb cccc dddd eeee ffff".to_string(),
                },
            ])
        }
    }

    #[derive(Default)]
    struct RecordingIndex {
        inner: InMemoryIndex,
        batch_sizes: Mutex<Vec<usize>>,
    }

    #[async_trait]
    impl VectorIndex for RecordingIndex {
        async fn upsert(&self, records: &[VectorRecord]) -> Result<(), SearchError> {
            self.batch_sizes.lock().unwrap().push(records.len());
            self.inner.upsert(records).await
        }

        async fn query(&self, vector: &[f32], top_k: usize) -> Result<Vec<QueryMatch>, SearchError> {
            self.inner.query(vector, top_k).await
        }

        async fn describe_stats(&self) -> Result<IndexStats, SearchError> {
            self.inner.describe_stats().await
        }

        async fn delete(&self, ids: &[String]) -> Result<(), SearchError> {
            self.inner.delete(ids).await
        }

        async fn delete_all(&self) -> Result<(), SearchError> {
            self.inner.delete_all().await
        }
    }

    fn pipeline(index: Arc<dyn VectorIndex>, options: IngestionOptions) -> IngestionPipeline {
        IngestionPipeline::new(
            Arc::new(FakeExtractor),
            Arc::new(CharacterNgramEmbedder::default()),
            index,
            options,
        )
    }

    fn small_chunks(batch: usize) -> IngestionOptions {
        IngestionOptions {
            chunk_size: 20,
            chunk_overlap: 5,
            upsert_batch_size: batch,
        }
    }

    #[test]
    fn discover_pdf_files_is_flat_and_case_insensitive() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        let nested = dir.path().join("nested");
        fs::create_dir(&nested)?;
        fs::write(dir.path().join("b.pdf"), b"%PDF")?;
        fs::write(dir.path().join("A.PDF"), b"%PDF")?;
        fs::write(dir.path().join("notes.txt"), b"text")?;
        fs::write(nested.join("c.pdf"), b"%PDF")?;

        let files = discover_pdf_files(dir.path())?;
        let names: Vec<_> = files
            .iter()
            .filter_map(|path| path.file_name().and_then(|n| n.to_str()))
            .collect();
        assert_eq!(names, vec!["A.PDF", "b.pdf"]);
        Ok(())
    }

    #[test]
    fn missing_folder_is_an_error() {
        assert!(discover_pdf_files(Path::new("/no/such/folder")).is_err());
    }

    #[tokio::test]
    async fn empty_folder_is_a_successful_noop() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let index = Arc::new(InMemoryIndex::new());
        let report = pipeline(index.clone(), IngestionOptions::default())
            .ingest_folder(dir.path())
            .await?;
        assert!(report.files.is_empty());
        assert!(index.is_empty().await);
        Ok(())
    }

    #[tokio::test]
    async fn each_pdf_produces_records_and_reruns_accumulate(
    ) -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("ifrs17.pdf"), b"%PDF")?;
        fs::write(dir.path().join("kics.pdf"), b"%PDF")?;

        let index = Arc::new(InMemoryIndex::new());
        let pipeline = pipeline(index.clone(), small_chunks(100));

        let first = pipeline.ingest_folder(dir.path()).await?;
        assert_eq!(first.files.len(), 2);
        assert!(first.records_upserted >= 2);
        let after_first = index.len().await;
        assert_eq!(after_first, first.records_upserted);

        pipeline.ingest_folder(dir.path()).await?;
        assert!(index.len().await > after_first);
        Ok(())
    }

    #[tokio::test]
    async fn records_are_upserted_in_fixed_size_batches() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        fs::write(dir.path().join("one.pdf"), b"%PDF")?;

        let index = Arc::new(RecordingIndex::default());
        let report = pipeline(index.clone(), small_chunks(2))
            .ingest_folder(dir.path())
            .await?;

        let sizes = index.batch_sizes.lock().unwrap().clone();
        assert_eq!(sizes.iter().sum::<usize>(), report.records_upserted);
        assert!(sizes.iter().all(|size| *size <= 2));
        assert_eq!(sizes.len(), report.records_upserted.div_ceil(2));
        Ok(())
    }

    #[tokio::test]
    async fn first_failure_aborts_and_keeps_earlier_files() -> Result<(), Box<dyn std::error::Error>>
    {
        let dir = tempdir()?;
        fs::write(dir.path().join("a_good.pdf"), b"%PDF")?;
        fs::write(dir.path().join("broken.pdf"), b"%PDF")?;
        fs::write(dir.path().join("c_never.pdf"), b"%PDF")?;

        let index = Arc::new(InMemoryIndex::new());
        let result = pipeline(index.clone(), small_chunks(100))
            .ingest_folder(dir.path())
            .await;

        assert!(matches!(result, Err(IngestError::PdfParse(_))));
        let stats = index.describe_stats().await?;
        assert!(stats.total_vector_count > 0);
        let sources = index.query(&[0.0; 128], 1_000).await?;
        assert!(sources
            .iter()
            .filter_map(|hit| hit.metadata.as_ref())
            .all(|metadata| metadata.source == "a_good.pdf"));
        Ok(())
    }
}
