use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use common::{error::AppError, storage::tiers::TieredStore};
use retrieval_pipeline::CascadeEngine;

/// An ingestion request with its payload already extracted: page texts for
/// PDFs, raw text for plain files, parsed JSON for QA datasets. File-format
/// parsing happens upstream.
#[derive(Debug)]
pub enum IngestPayload {
    PdfText { pages: Vec<String>, source: String },
    PlainText { text: String, source: String },
    QaJson { records: Value },
}

#[derive(Debug, Deserialize)]
struct PdfTextBody {
    pages: Vec<String>,
    source: String,
}

#[derive(Debug, Deserialize)]
struct PlainTextBody {
    text: String,
    source: String,
}

#[derive(Debug, Deserialize)]
struct QaJsonBody {
    records: Value,
}

impl IngestPayload {
    /// Parses a request body of the shape `{"kind": …, …}`. An unknown kind
    /// is rejected before anything touches the store.
    pub fn parse(body: Value) -> Result<Self, AppError> {
        let kind = body
            .get("kind")
            .and_then(Value::as_str)
            .ok_or_else(|| AppError::Validation("missing 'kind' field".into()))?
            .to_owned();

        match kind.as_str() {
            "pdf-text" => {
                let body: PdfTextBody = serde_json::from_value(body)
                    .map_err(|e| AppError::Validation(format!("malformed pdf-text payload: {e}")))?;
                Ok(Self::PdfText {
                    pages: body.pages,
                    source: body.source,
                })
            }
            "plain-text" => {
                let body: PlainTextBody = serde_json::from_value(body).map_err(|e| {
                    AppError::Validation(format!("malformed plain-text payload: {e}"))
                })?;
                Ok(Self::PlainText {
                    text: body.text,
                    source: body.source,
                })
            }
            "qa-json" => {
                let body: QaJsonBody = serde_json::from_value(body)
                    .map_err(|e| AppError::Validation(format!("malformed qa-json payload: {e}")))?;
                Ok(Self::QaJson {
                    records: body.records,
                })
            }
            other => Err(AppError::UnsupportedFormat(format!(
                "unknown ingest kind '{other}'"
            ))),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::PdfText { .. } => "pdf-text",
            Self::PlainText { .. } => "plain-text",
            Self::QaJson { .. } => "qa-json",
        }
    }
}

/// One item that could not be ingested. The batch keeps going; failures are
/// reported, not thrown.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct IngestFailure {
    pub item: String,
    pub error: String,
}

/// Outcome of one ingestion batch.
#[derive(Debug, Clone, Serialize, Default)]
pub struct IngestReport {
    pub stored: usize,
    pub failures: Vec<IngestFailure>,
}

impl IngestReport {
    fn failure(&mut self, item: impl Into<String>, error: impl ToString) {
        self.failures.push(IngestFailure {
            item: item.into(),
            error: error.to_string(),
        });
    }
}

/// Chunks, embeds, and stores incoming knowledge, then refreshes the
/// lexical corpus and flushes the store.
pub struct IngestionPipeline {
    store: Arc<TieredStore>,
    engine: Arc<CascadeEngine>,
    chunk_size: usize,
    chunk_overlap: usize,
}

impl IngestionPipeline {
    pub fn new(
        store: Arc<TieredStore>,
        engine: Arc<CascadeEngine>,
        chunk_size: usize,
        chunk_overlap: usize,
    ) -> Self {
        Self {
            store,
            engine,
            chunk_size,
            chunk_overlap,
        }
    }

    /// Runs one ingestion batch. Individual pages/records fail in
    /// isolation; the report carries the partial counts either way. Ends
    /// with a wholesale lexical rebuild and an index flush so queries see
    /// the new knowledge immediately.
    #[instrument(skip_all, fields(kind = payload.kind()))]
    pub async fn ingest(&self, payload: IngestPayload) -> Result<IngestReport, AppError> {
        let mut report = IngestReport::default();

        match payload {
            IngestPayload::PdfText { pages, source } => {
                if pages.is_empty() {
                    return Err(AppError::Validation("pdf-text payload has no pages".into()));
                }
                for (number, page) in pages.iter().enumerate() {
                    let label = format!("{source}#page{}", number + 1);
                    if let Err(err) = self.store_chunks(page, &label, &mut report).await {
                        warn!(page = number + 1, error = %err, "page failed to ingest");
                        report.failure(label, err);
                    }
                }
            }
            IngestPayload::PlainText { text, source } => {
                if text.trim().is_empty() {
                    return Err(AppError::Validation("plain-text payload is empty".into()));
                }
                self.store_chunks(&text, &source, &mut report).await?;
            }
            IngestPayload::QaJson { records } => {
                self.store_qa_records(records, &mut report).await?;
            }
        }

        let indexed = self.engine.rebuild_lexical().await?;
        self.store.flush().await?;

        info!(
            stored = report.stored,
            failed = report.failures.len(),
            lexical_documents = indexed,
            "ingestion batch complete"
        );
        Ok(report)
    }

    async fn store_chunks(
        &self,
        text: &str,
        source: &str,
        report: &mut IngestReport,
    ) -> Result<(), AppError> {
        let windows = crate::chunking::chunk(text, self.chunk_size, self.chunk_overlap)?;
        for window in windows {
            self.store.add_doc(window, source).await?;
            report.stored += 1;
        }
        Ok(())
    }

    /// Accepts a bare array or `{"data": [...]}`. `question`/`answer`
    /// records land in the QA tier, `query`/`answer` records in the Query
    /// tier; anything else is a per-record failure.
    async fn store_qa_records(
        &self,
        records: Value,
        report: &mut IngestReport,
    ) -> Result<(), AppError> {
        let items = match &records {
            Value::Array(items) => items.as_slice(),
            Value::Object(map) => map
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .ok_or_else(|| {
                    AppError::Validation(
                        "qa-json records must be an array or an object with a 'data' array".into(),
                    )
                })?,
            _ => {
                return Err(AppError::Validation(
                    "qa-json records must be an array or an object with a 'data' array".into(),
                ))
            }
        };

        for (number, record) in items.iter().enumerate() {
            let item_label = format!("record {}", number + 1);
            let answer = record.get("answer").and_then(Value::as_str);

            let outcome = match (
                record.get("question").and_then(Value::as_str),
                record.get("query").and_then(Value::as_str),
                answer,
            ) {
                (Some(question), _, Some(answer)) => {
                    self.store.add_qa(question, answer).await.map(|_| ())
                }
                (None, Some(query), Some(answer)) => {
                    self.store.add_query(query, answer).await.map(|_| ())
                }
                _ => Err(AppError::Processing(
                    "record needs 'answer' plus 'question' or 'query'".into(),
                )),
            };

            match outcome {
                Ok(()) => report.stored += 1,
                Err(err) => {
                    warn!(record = number + 1, error = %err, "qa record failed to ingest");
                    report.failure(item_label, err);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use common::{
        storage::db::SurrealDbClient,
        utils::{config::ThresholdPolicy, embedding::EmbeddingProvider},
    };
    use retrieval_pipeline::{GenerationService, GenerationSettings};
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    const DIMENSION: usize = 64;

    struct SilentGeneration;

    #[async_trait]
    impl GenerationService for SilentGeneration {
        async fn generate(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> String {
            "generated".to_owned()
        }
    }

    async fn setup_pipeline() -> (Arc<TieredStore>, Arc<CascadeEngine>, IngestionPipeline) {
        let db = SurrealDbClient::memory("ingest_test_ns", &Uuid::new_v4().to_string())
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_tier_indexes(DIMENSION)
            .await
            .expect("Failed to define indexes");
        let embedder = EmbeddingProvider::new_hashed(DIMENSION).expect("hashed provider");
        let store = Arc::new(TieredStore::new(Arc::new(db), Arc::new(embedder)));

        let engine = Arc::new(CascadeEngine::new(
            store.clone(),
            Arc::new(SilentGeneration),
            ThresholdPolicy::new(0.9, 0.75, 0.7).expect("valid thresholds"),
            5,
            GenerationSettings {
                max_tokens: 128,
                temperature: 0.0,
            },
        ));
        let pipeline = IngestionPipeline::new(store.clone(), engine.clone(), 40, 10);

        (store, engine, pipeline)
    }

    #[tokio::test]
    async fn plain_text_is_chunked_and_stored() {
        let (store, _engine, pipeline) = setup_pipeline().await;

        let text = "word ".repeat(30); // 150 chars, several windows at size 40
        let report = pipeline
            .ingest(IngestPayload::PlainText {
                text,
                source: "notes.txt".into(),
            })
            .await
            .expect("ingest");

        assert!(report.stored > 1);
        assert!(report.failures.is_empty());

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.doc_count as usize, report.stored);
    }

    #[tokio::test]
    async fn pdf_pages_fail_in_isolation() {
        let (_store, _engine, pipeline) = setup_pipeline().await;

        let report = pipeline
            .ingest(IngestPayload::PdfText {
                pages: vec![
                    "a real page with enough text to store".into(),
                    String::new(), // whitespace-only page stores nothing but is not an error
                    "another page with content".into(),
                ],
                source: "manual.pdf".into(),
            })
            .await
            .expect("ingest");

        assert!(report.stored >= 2);
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn qa_json_routes_records_to_their_tiers() {
        let (store, _engine, pipeline) = setup_pipeline().await;

        let records = json!([
            {"question": "refund policy?", "answer": "thirty days"},
            {"query": "reset password", "answer": "settings page"},
            {"nonsense": true}
        ]);

        let report = pipeline
            .ingest(IngestPayload::QaJson { records })
            .await
            .expect("ingest");

        assert_eq!(report.stored, 2);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].item, "record 3");

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.qa_count, 1);
        assert_eq!(stats.query_count, 1);
        assert_eq!(stats.doc_count, 0);
    }

    #[tokio::test]
    async fn qa_json_accepts_the_data_wrapper_shape() {
        let (store, _engine, pipeline) = setup_pipeline().await;

        let records = json!({"data": [
            {"question": "shipping time?", "answer": "five days"}
        ]});

        let report = pipeline
            .ingest(IngestPayload::QaJson { records })
            .await
            .expect("ingest");
        assert_eq!(report.stored, 1);

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.qa_count, 1);
    }

    #[tokio::test]
    async fn empty_plain_text_is_a_validation_error() {
        let (store, _engine, pipeline) = setup_pipeline().await;

        let err = pipeline
            .ingest(IngestPayload::PlainText {
                text: "   ".into(),
                source: "notes.txt".into(),
            })
            .await
            .expect_err("must reject");
        assert!(matches!(err, AppError::Validation(_)));

        let stats = store.stats().await.expect("stats");
        assert_eq!(stats.total_count, 0, "no state mutated on validation errors");
    }

    #[tokio::test]
    async fn unknown_kind_is_rejected_before_parsing_fields() {
        let err = IngestPayload::parse(json!({"kind": "spreadsheet", "rows": []}))
            .expect_err("must reject");
        assert!(matches!(err, AppError::UnsupportedFormat(_)));
    }

    #[tokio::test]
    async fn parse_maps_known_kinds() {
        let payload = IngestPayload::parse(json!({
            "kind": "plain-text",
            "text": "hello",
            "source": "note.txt"
        }))
        .expect("parse");
        assert!(matches!(payload, IngestPayload::PlainText { .. }));

        let payload = IngestPayload::parse(json!({
            "kind": "qa-json",
            "records": [{"question": "q", "answer": "a"}]
        }))
        .expect("parse");
        assert!(matches!(payload, IngestPayload::QaJson { .. }));

        let err = IngestPayload::parse(json!({"text": "missing kind"})).expect_err("must reject");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn ingest_makes_documents_lexically_searchable() {
        let (_store, engine, pipeline) = setup_pipeline().await;

        pipeline
            .ingest(IngestPayload::PlainText {
                text: "The warranty covers manufacturing defects.".into(),
                source: "faq.txt".into(),
            })
            .await
            .expect("ingest");

        // hashed embeddings of an unrelated query miss every vector tier;
        // the rebuilt lexical index still finds the keyword overlap
        let result = engine
            .answer("warranty manufacturing")
            .await
            .expect("answer");
        assert!(result.layer <= 4, "ingested text must be reachable");
    }
}
