use std::sync::Arc;

use futures::try_join;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::{
    error::AppError,
    storage::{
        db::SurrealDbClient,
        types::{doc_chunk::DocChunk, qa_record::QARecord, query_record::QueryRecord},
    },
    utils::embedding::EmbeddingProvider,
};

/// The three knowledge collections, ordered from most to least specific.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Query,
    Qa,
    Doc,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Query, Tier::Qa, Tier::Doc];

    pub const fn table_name(self) -> &'static str {
        match self {
            Tier::Query => "query_kb",
            Tier::Qa => "qa_kb",
            Tier::Doc => "doc_kb",
        }
    }

    pub const fn id_prefix(self) -> &'static str {
        match self {
            Tier::Query => "query",
            Tier::Qa => "qa",
            Tier::Doc => "doc",
        }
    }

    pub const fn index_name(self) -> &'static str {
        match self {
            Tier::Query => "idx_embedding_query_kb",
            Tier::Qa => "idx_embedding_qa_kb",
            Tier::Doc => "idx_embedding_doc_kb",
        }
    }
}

/// Per-tier record counts, shaped for the stats endpoint.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct TierStats {
    pub query_count: u64,
    pub qa_count: u64,
    pub doc_count: u64,
    pub total_count: u64,
}

/// The three vector collections plus the embedding provider that feeds them.
///
/// Record ids are `{prefix}_{count + 1}`, so every write takes `write_gate`
/// for the whole count-embed-insert sequence; two interleaved writers would
/// otherwise derive the same id.
pub struct TieredStore {
    pub db: Arc<SurrealDbClient>,
    pub embedder: Arc<EmbeddingProvider>,
    write_gate: Mutex<()>,
}

impl TieredStore {
    pub fn new(db: Arc<SurrealDbClient>, embedder: Arc<EmbeddingProvider>) -> Self {
        Self {
            db,
            embedder,
            write_gate: Mutex::new(()),
        }
    }

    async fn next_id(&self, tier: Tier) -> Result<String, AppError> {
        let count = self.db.count_table(tier.table_name()).await?;
        Ok(format!("{}_{}", tier.id_prefix(), count + 1))
    }

    /// Store a canonical query with its verbatim answer. Returns the new id.
    pub async fn add_query(&self, query: &str, answer: &str) -> Result<String, AppError> {
        let _guard = self.write_gate.lock().await;

        let embedding = self.embedder.embed(query).await?;
        let id = self.next_id(Tier::Query).await?;
        let record = QueryRecord::new(id.clone(), query.to_owned(), answer.to_owned(), embedding);
        self.db.store_item(record).await?;

        debug!(id = %id, tier = Tier::Query.table_name(), "stored record");
        Ok(id)
    }

    /// Store a question/answer pair. The embedded text combines both sides.
    pub async fn add_qa(&self, question: &str, answer: &str) -> Result<String, AppError> {
        let _guard = self.write_gate.lock().await;

        let input = QARecord::embedding_input(question, answer);
        let embedding = self.embedder.embed(&input).await?;
        let id = self.next_id(Tier::Qa).await?;
        let record = QARecord::new(id.clone(), question.to_owned(), answer.to_owned(), embedding);
        self.db.store_item(record).await?;

        debug!(id = %id, tier = Tier::Qa.table_name(), "stored record");
        Ok(id)
    }

    /// Store one document chunk with its source label. Returns the new id.
    pub async fn add_doc(&self, text: &str, source: &str) -> Result<String, AppError> {
        let _guard = self.write_gate.lock().await;

        let embedding = self.embedder.embed(text).await?;
        let id = self.next_id(Tier::Doc).await?;
        let record = DocChunk::new(id.clone(), text.to_owned(), source.to_owned(), embedding);
        self.db.store_item(record).await?;

        debug!(id = %id, tier = Tier::Doc.table_name(), "stored record");
        Ok(id)
    }

    /// All document chunk texts with their ids, in insertion order. The
    /// lexical index is rebuilt from this.
    pub async fn doc_texts(&self) -> Result<Vec<(String, String)>, AppError> {
        let mut chunks: Vec<DocChunk> = self.db.get_all_stored_items().await?;
        chunks.sort_by_key(|chunk| id_ordinal(&chunk.id));
        Ok(chunks.into_iter().map(|chunk| (chunk.id, chunk.text)).collect())
    }

    pub async fn stats(&self) -> Result<TierStats, AppError> {
        let (query_count, qa_count, doc_count) = try_join!(
            self.db.count_table(Tier::Query.table_name()),
            self.db.count_table(Tier::Qa.table_name()),
            self.db.count_table(Tier::Doc.table_name()),
        )?;

        Ok(TierStats {
            query_count,
            qa_count,
            doc_count,
            total_count: query_count + qa_count + doc_count,
        })
    }

    /// Bring the vector indexes up to date after a batch of writes.
    pub async fn flush(&self) -> Result<(), AppError> {
        self.db.rebuild_indexes().await?;
        Ok(())
    }
}

/// Insertion ordinal from a `{prefix}_{n}` id. Lexicographic order would put
/// `doc_10` before `doc_2`.
fn id_ordinal(id: &str) -> u64 {
    id.rsplit('_')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(u64::MAX)
}
