use serde::Deserialize;
use tracing::debug;

use common::{
    error::AppError,
    storage::{
        tiers::{Tier, TieredStore},
        types::{doc_chunk, qa_record, query_record},
    },
};

use crate::scoring::{cosine_similarity, sort_by_score_desc};

// Candidate pool width for the knn operator.
const KNN_EF: usize = 40;

/// Tier-specific fields carried alongside a hit, enough for the cascade to
/// synthesize an answer without a second lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum TierMeta {
    Query { answer: String },
    Qa { question: String, answer: String },
    Doc { source: String },
}

/// One qualifying candidate from a vector tier.
#[derive(Debug, Clone, PartialEq)]
pub struct TierHit {
    pub id: String,
    pub text: String,
    pub similarity: f32,
    pub meta: TierMeta,
}

#[derive(Debug, Deserialize)]
struct QueryRow {
    #[serde(deserialize_with = "query_record::deserialize_flexible_id")]
    id: String,
    query: String,
    answer: String,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct QaRow {
    #[serde(deserialize_with = "qa_record::deserialize_flexible_id")]
    id: String,
    question: String,
    answer: String,
    distance: f32,
}

#[derive(Debug, Deserialize)]
struct DocRow {
    #[serde(deserialize_with = "doc_chunk::deserialize_flexible_id")]
    id: String,
    text: String,
    source: String,
    distance: f32,
}

/// Nearest-neighbor search against one tier.
///
/// Embeds the query, runs the tier's HNSW index, converts cosine distances
/// to similarities, drops candidates below `threshold`, and returns the
/// survivors sorted by similarity descending (ties keep index rank). An
/// empty tier yields an empty vec; an embedding failure is an error.
pub async fn search_tier(
    store: &TieredStore,
    tier: Tier,
    query_text: &str,
    top_k: usize,
    threshold: f32,
) -> Result<Vec<TierHit>, AppError> {
    let embedding = store.embedder.embed(query_text).await?;

    let sql = format!(
        "SELECT *, vector::distance::knn() AS distance FROM {table} \
         WHERE embedding <|{top_k},{KNN_EF}|> {embedding:?} ORDER BY distance",
        table = tier.table_name(),
    );

    let mut response = store.db.query(sql).await?;

    let mut hits: Vec<TierHit> = match tier {
        Tier::Query => {
            let rows: Vec<QueryRow> = response.take(0)?;
            rows.into_iter()
                .map(|row| TierHit {
                    similarity: cosine_similarity(row.distance),
                    id: row.id,
                    text: row.query,
                    meta: TierMeta::Query { answer: row.answer },
                })
                .collect()
        }
        Tier::Qa => {
            let rows: Vec<QaRow> = response.take(0)?;
            rows.into_iter()
                .map(|row| TierHit {
                    similarity: cosine_similarity(row.distance),
                    id: row.id,
                    text: row.question.clone(),
                    meta: TierMeta::Qa {
                        question: row.question,
                        answer: row.answer,
                    },
                })
                .collect()
        }
        Tier::Doc => {
            let rows: Vec<DocRow> = response.take(0)?;
            rows.into_iter()
                .map(|row| TierHit {
                    similarity: cosine_similarity(row.distance),
                    id: row.id,
                    text: row.text,
                    meta: TierMeta::Doc { source: row.source },
                })
                .collect()
        }
    };

    let candidates = hits.len();
    hits.retain(|hit| hit.similarity >= threshold);
    sort_by_score_desc(&mut hits, |hit| hit.similarity);

    debug!(
        tier = tier.table_name(),
        candidates,
        qualifying = hits.len(),
        top_similarity = hits.first().map(|hit| hit.similarity),
        "tier search"
    );

    Ok(hits)
}
