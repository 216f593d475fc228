use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use common::{
    error::AppError,
    storage::tiers::{Tier, TieredStore},
    utils::config::ThresholdPolicy,
};

use crate::{
    generation::{free_prompt, GenerationService},
    lexical::LexicalIndex,
    scoring::{clamp_unit, lexical_confidence, FREE_GENERATION_CONFIDENCE},
    vector::{search_tier, TierMeta},
};

/// Which kind of source produced the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerKind {
    Query,
    Qa,
    Docs,
    Lexical,
    Free,
}

/// The single structured result of one query. Built fresh per request,
/// never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct CascadeResult {
    pub layer: u8,
    pub kind: AnswerKind,
    pub source: String,
    pub answer: String,
    pub confidence: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<String>>,
}

/// Generation knobs forwarded on every synthesis call.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_tokens: u32,
    pub temperature: f32,
}

/// The cascade controller and the shared state it orchestrates.
///
/// Built once at startup and shared via `Arc`; requests walk the five
/// layers strictly in order and stop at the first that qualifies. The
/// lexical index is replaced wholesale by [`rebuild_lexical`]: the new
/// index is built off-lock and swapped in, so concurrent readers see the
/// old or the new corpus, never a partial one.
///
/// [`rebuild_lexical`]: CascadeEngine::rebuild_lexical
pub struct CascadeEngine {
    store: Arc<TieredStore>,
    lexical: RwLock<LexicalIndex>,
    generation: Arc<dyn GenerationService>,
    thresholds: ThresholdPolicy,
    top_k: usize,
    generation_settings: GenerationSettings,
}

impl CascadeEngine {
    pub fn new(
        store: Arc<TieredStore>,
        generation: Arc<dyn GenerationService>,
        thresholds: ThresholdPolicy,
        top_k: usize,
        generation_settings: GenerationSettings,
    ) -> Self {
        Self {
            store,
            lexical: RwLock::new(LexicalIndex::empty()),
            generation,
            thresholds,
            top_k,
            generation_settings,
        }
    }

    pub fn store(&self) -> &TieredStore {
        &self.store
    }

    /// Rebuilds the lexical index from the Doc tier's texts and publishes
    /// it atomically. Returns the number of indexed documents.
    pub async fn rebuild_lexical(&self) -> Result<usize, AppError> {
        let documents = self.store.doc_texts().await?;
        let index = LexicalIndex::build(documents);
        let count = index.len();

        *self.lexical.write().await = index;

        info!(documents = count, "lexical index rebuilt");
        Ok(count)
    }

    /// Answers a query by walking the layers in order. Exactly one layer is
    /// reported; retrieval failures abort the request, generation failures
    /// degrade into the answer text.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn answer(&self, query: &str) -> Result<CascadeResult, AppError> {
        if let Some(result) = self.try_query_tier(query).await? {
            return Ok(result);
        }
        if let Some(result) = self.try_qa_tier(query).await? {
            return Ok(result);
        }
        if let Some(result) = self.try_doc_tier(query).await? {
            return Ok(result);
        }
        if let Some(result) = self.try_lexical(query).await? {
            return Ok(result);
        }
        Ok(self.free_generation(query).await)
    }

    /// Layer 1: a previously seen query with a verified answer. The only
    /// layer with a strict `>` gate, and the only one that skips generation.
    async fn try_query_tier(&self, query: &str) -> Result<Option<CascadeResult>, AppError> {
        let hits = search_tier(
            &self.store,
            Tier::Query,
            query,
            self.top_k,
            self.thresholds.query,
        )
        .await?;

        let Some(top) = hits.first() else {
            return Ok(None);
        };
        if top.similarity <= self.thresholds.query {
            debug!(
                layer = 1,
                similarity = top.similarity,
                threshold = self.thresholds.query,
                "top query hit does not clear the strict gate"
            );
            return Ok(None);
        }

        let TierMeta::Query { answer } = &top.meta else {
            return Ok(None);
        };

        debug!(layer = 1, similarity = top.similarity, "answered from query tier");
        Ok(Some(CascadeResult {
            layer: 1,
            kind: AnswerKind::Query,
            source: Tier::Query.table_name().to_owned(),
            answer: answer.clone(),
            confidence: clamp_unit(top.similarity),
            contexts: None,
        }))
    }

    /// Layer 2: curated Q&A pairs, synthesized with `Q:`/`A:` contexts.
    async fn try_qa_tier(&self, query: &str) -> Result<Option<CascadeResult>, AppError> {
        let hits = search_tier(&self.store, Tier::Qa, query, self.top_k, self.thresholds.qa)
            .await?;

        let Some(top) = hits.first() else {
            return Ok(None);
        };
        let confidence = clamp_unit(top.similarity);

        let contexts: Vec<String> = hits
            .iter()
            .filter_map(|hit| match &hit.meta {
                TierMeta::Qa { question, answer } => Some(format!("Q: {question}\nA: {answer}")),
                _ => None,
            })
            .collect();

        debug!(layer = 2, hits = hits.len(), confidence, "answering from qa tier");
        Ok(Some(self.synthesize(AnswerKind::Qa, 2, query, contexts, confidence).await))
    }

    /// Layer 3: document chunks, synthesized with the raw chunk texts.
    async fn try_doc_tier(&self, query: &str) -> Result<Option<CascadeResult>, AppError> {
        let hits = search_tier(&self.store, Tier::Doc, query, self.top_k, self.thresholds.doc)
            .await?;

        let Some(top) = hits.first() else {
            return Ok(None);
        };
        let confidence = clamp_unit(top.similarity);
        let contexts: Vec<String> = hits.iter().map(|hit| hit.text.clone()).collect();

        debug!(layer = 3, hits = hits.len(), confidence, "answering from doc tier");
        Ok(Some(self.synthesize(AnswerKind::Docs, 3, query, contexts, confidence).await))
    }

    /// Layer 4: keyword-overlap fallback when every vector tier missed.
    async fn try_lexical(&self, query: &str) -> Result<Option<CascadeResult>, AppError> {
        let hits = {
            let index = self.lexical.read().await;
            index.search(query, self.top_k)
        };

        let Some(top) = hits.first() else {
            return Ok(None);
        };
        let confidence = lexical_confidence(top.score);
        let contexts: Vec<String> = hits.iter().map(|hit| hit.text.clone()).collect();

        debug!(
            layer = 4,
            hits = hits.len(),
            top_score = top.score,
            confidence,
            "answering from lexical index"
        );
        Ok(Some(
            self.synthesize(AnswerKind::Lexical, 4, query, contexts, confidence)
                .await,
        ))
    }

    /// Layer 5: unconditional terminal state, ungrounded generation.
    async fn free_generation(&self, query: &str) -> CascadeResult {
        debug!(layer = 5, "no tier qualified, generating freely");
        let answer = self
            .generation
            .generate(
                &free_prompt(query),
                self.generation_settings.max_tokens,
                self.generation_settings.temperature,
            )
            .await;

        CascadeResult {
            layer: 5,
            kind: AnswerKind::Free,
            source: "free generation".to_owned(),
            answer,
            confidence: FREE_GENERATION_CONFIDENCE,
            contexts: None,
        }
    }

    async fn synthesize(
        &self,
        kind: AnswerKind,
        layer: u8,
        query: &str,
        contexts: Vec<String>,
        confidence: f32,
    ) -> CascadeResult {
        let answer = self
            .generation
            .generate_with_context(
                query,
                &contexts,
                self.generation_settings.max_tokens,
                self.generation_settings.temperature,
            )
            .await;

        let source = match kind {
            AnswerKind::Query => Tier::Query.table_name().to_owned(),
            AnswerKind::Qa => format!("{} + generation", Tier::Qa.table_name()),
            AnswerKind::Docs => format!("{} + generation", Tier::Doc.table_name()),
            AnswerKind::Lexical => "lexical + generation".to_owned(),
            AnswerKind::Free => "free generation".to_owned(),
        };

        CascadeResult {
            layer,
            kind,
            source,
            answer,
            confidence,
            contexts: Some(contexts),
        }
    }
}
