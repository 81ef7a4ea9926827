use std::sync::Arc;

use regex::Regex;
use retrova_core::{Payload, RetrovaError, RetrovaResult};
use retrova_model::EmbeddingProvider;
use retrova_store::VectorStore;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::splitter::{self, Chunk, SplitterConfig};

/// The output of the external document-extraction service: plain section
/// strings and newline-delimited tables, format parsing already done.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedDocument {
    /// Section text, in document order.
    #[serde(default)]
    pub sections: Vec<String>,
    /// Tables as newline-delimited rows, first row the header.
    #[serde(default)]
    pub tables: Vec<String>,
}

/// Outcome of one document ingestion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks embedded and written.
    pub inserted: usize,
    /// Chunks whose content hash was already stored.
    pub skipped: usize,
}

/// Chunks, embeds and upserts extracted documents into a collection.
///
/// Ingestion is chunk-at-a-time, not transactional: a failure mid-document
/// leaves previously committed chunks intact and surfaces the failing
/// stage's error. Identity is content-derived, so re-running an unchanged
/// document only skips.
pub struct IngestPipeline {
    store: Arc<VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    config: SplitterConfig,
    heading: Regex,
}

impl IngestPipeline {
    /// Creates a pipeline over the given store and embedding provider with
    /// the default splitter configuration.
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            store,
            embedder,
            config: SplitterConfig::default(),
            heading: Self::heading_pattern(),
        }
    }

    /// Overrides the splitter configuration. Chainable.
    pub fn with_config(mut self, config: SplitterConfig) -> Self {
        self.config = config;
        self
    }

    /// Ingests one extracted document into `collection_name`, creating the
    /// collection on first use with the embedder's dimension.
    pub async fn ingest_document(
        &self,
        collection_name: &str,
        document: &ExtractedDocument,
        source: Option<&str>,
    ) -> RetrovaResult<IngestReport> {
        let collection = self
            .store
            .get_or_create_collection(collection_name, self.embedder.dimension())
            .await?;

        let doc_title = self.title_from_sections(&document.sections);
        let text_chunks = splitter::split_sections(&document.sections, &self.config);
        let table_chunks = splitter::split_tables(&document.tables, &self.config);
        info!(
            collection = collection_name,
            source,
            text_chunks = text_chunks.len(),
            table_chunks = table_chunks.len(),
            "ingesting document"
        );

        let mut report = IngestReport::default();
        self.insert_chunks(&collection, &text_chunks, "section", source, doc_title.as_deref(), &mut report)
            .await?;
        self.insert_chunks(&collection, &table_chunks, "table", source, doc_title.as_deref(), &mut report)
            .await?;

        info!(
            collection = collection_name,
            inserted = report.inserted,
            skipped = report.skipped,
            "document ingested"
        );
        Ok(report)
    }

    async fn insert_chunks(
        &self,
        collection: &retrova_store::Collection,
        chunks: &[Chunk],
        label: &str,
        source: Option<&str>,
        doc_title: Option<&str>,
        report: &mut IngestReport,
    ) -> RetrovaResult<()> {
        // Title cascade: a heading found in this batch, else the document
        // title, else a label derived from the source file.
        let batch_title = chunks
            .iter()
            .find_map(|c| self.heading.captures(&c.text))
            .map(|caps| caps[1].trim().to_string());

        for chunk in chunks {
            let id = splitter::chunk_id(&chunk.text);

            match collection.get(&id).await {
                Ok(_) => {
                    debug!(id = %id, "unchanged chunk, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(RetrovaError::PointNotFound { .. }) => {}
                Err(e) => return Err(e),
            }

            let title = batch_title
                .as_deref()
                .or(doc_title)
                .map(str::to_string)
                .unwrap_or_else(|| format!("{label} from {}", source.unwrap_or("unknown")));

            let embedding = self
                .embedder
                .embed_one(&format!("{title}\n{}", chunk.text))
                .await?;

            let mut payload = Payload::new();
            payload.insert("content".to_string(), json!(chunk.text));
            payload.insert("type".to_string(), json!(label));
            if let Some(source) = source {
                payload.insert("source".to_string(), json!(source));
            }
            payload.insert("title".to_string(), json!(title));
            // Chunk metadata is flattened on top and may refine `type`
            // (text chunks store "text" rather than the batch label).
            if let serde_json::Value::Object(metadata) = serde_json::to_value(&chunk.metadata)? {
                for (key, value) in metadata {
                    payload.insert(key, value);
                }
            }

            collection.upsert(id, embedding, payload).await?;
            report.inserted += 1;
        }
        Ok(())
    }

    /// Markdown-style heading: `# Title`.
    #[allow(clippy::expect_used)]
    fn heading_pattern() -> Regex {
        Regex::new(r"#\s*(.+)").expect("static heading pattern")
    }

    fn title_from_sections(&self, sections: &[String]) -> Option<String> {
        sections.iter().find_map(|section| {
            let caps = self.heading.captures(section)?;
            let matched = caps.get(0)?;
            // Anchored at the start of the section, like a markdown H1 line.
            (matched.start() == 0).then(|| caps[1].trim().to_string())
        })
    }
}
