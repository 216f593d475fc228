use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::error::AppError;

#[derive(Clone, Copy, Deserialize, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    OpenAI,
    Hashed,
}

fn default_embedding_backend() -> EmbeddingBackend {
    EmbeddingBackend::Hashed
}

#[derive(Clone, Deserialize, Debug)]
pub struct AppConfig {
    pub openai_api_key: String,
    pub surrealdb_address: String,
    pub surrealdb_username: String,
    pub surrealdb_password: String,
    pub surrealdb_namespace: String,
    pub surrealdb_database: String,
    #[serde(default = "default_http_port")]
    pub http_port: u16,
    #[serde(default = "default_base_url")]
    pub openai_base_url: String,
    #[serde(default = "default_embedding_backend")]
    pub embedding_backend: EmbeddingBackend,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dimensions")]
    pub embedding_dimensions: u32,
    #[serde(default = "default_generation_model")]
    pub generation_model: String,
    #[serde(default = "default_generation_max_tokens")]
    pub generation_max_tokens: u32,
    #[serde(default = "default_generation_temperature")]
    pub generation_temperature: f32,
    #[serde(default = "default_generation_timeout_secs")]
    pub generation_timeout_secs: u64,
    #[serde(default = "default_query_threshold")]
    pub query_threshold: f32,
    #[serde(default = "default_qa_threshold")]
    pub qa_threshold: f32,
    #[serde(default = "default_doc_threshold")]
    pub doc_threshold: f32,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_ingest_max_body_bytes")]
    pub ingest_max_body_bytes: usize,
}

fn default_http_port() -> u16 {
    5000
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dimensions() -> u32 {
    1536
}

fn default_generation_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_generation_max_tokens() -> u32 {
    2048
}

fn default_generation_temperature() -> f32 {
    0.7
}

fn default_generation_timeout_secs() -> u64 {
    30
}

fn default_query_threshold() -> f32 {
    0.90
}

fn default_qa_threshold() -> f32 {
    0.75
}

fn default_doc_threshold() -> f32 {
    0.70
}

fn default_top_k() -> usize {
    5
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_ingest_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

/// Minimum similarity per vector tier. The exact-match tier is the
/// strictest; thresholds must not increase further down the cascade.
#[derive(Clone, Copy, Debug)]
pub struct ThresholdPolicy {
    pub query: f32,
    pub qa: f32,
    pub doc: f32,
}

impl ThresholdPolicy {
    pub fn new(query: f32, qa: f32, doc: f32) -> Result<Self, AppError> {
        for (name, value) in [("query", query), ("qa", qa), ("doc", doc)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AppError::Validation(format!(
                    "{name}_threshold {value} is outside [0, 1]"
                )));
            }
        }

        if query < qa || qa < doc {
            return Err(AppError::Validation(format!(
                "tier thresholds must be non-increasing: query {query}, qa {qa}, doc {doc}"
            )));
        }

        Ok(Self { query, qa, doc })
    }
}

impl AppConfig {
    pub fn threshold_policy(&self) -> Result<ThresholdPolicy, AppError> {
        ThresholdPolicy::new(self.query_threshold, self.qa_threshold, self.doc_threshold)
    }

    /// Rejects settings the engine cannot run with. Called once at startup
    /// so bad values fail the process instead of a later request.
    pub fn validate(&self) -> Result<(), AppError> {
        self.threshold_policy()?;

        if self.chunk_size == 0 {
            return Err(AppError::Validation(
                "chunk_size must be greater than zero".into(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Validation(format!(
                "chunk_overlap {} must be smaller than chunk_size {}",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Validation("top_k must be greater than zero".into()));
        }

        Ok(())
    }
}

pub fn get_config() -> Result<AppConfig, ConfigError> {
    let config = Config::builder()
        .add_source(File::with_name("config").required(false))
        .add_source(Environment::default())
        .build()?;

    config.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig {
            openai_api_key: "test-key".into(),
            surrealdb_address: "mem://".into(),
            surrealdb_username: "root".into(),
            surrealdb_password: "root".into(),
            surrealdb_namespace: "test".into(),
            surrealdb_database: "test".into(),
            http_port: default_http_port(),
            openai_base_url: default_base_url(),
            embedding_backend: EmbeddingBackend::Hashed,
            embedding_model: default_embedding_model(),
            embedding_dimensions: 64,
            generation_model: default_generation_model(),
            generation_max_tokens: default_generation_max_tokens(),
            generation_temperature: default_generation_temperature(),
            generation_timeout_secs: default_generation_timeout_secs(),
            query_threshold: default_query_threshold(),
            qa_threshold: default_qa_threshold(),
            doc_threshold: default_doc_threshold(),
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            ingest_max_body_bytes: default_ingest_max_body_bytes(),
        }
    }

    #[test]
    fn default_configuration_validates() {
        base_config().validate().expect("defaults should be valid");
    }

    #[test]
    fn equal_thresholds_are_allowed() {
        ThresholdPolicy::new(0.8, 0.8, 0.8).expect("non-increasing thresholds are fine");
    }

    #[test]
    fn increasing_thresholds_are_rejected() {
        let err = ThresholdPolicy::new(0.7, 0.75, 0.7).expect_err("qa above query must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let err = ThresholdPolicy::new(1.2, 0.75, 0.7).expect_err("threshold above 1 must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let mut config = base_config();
        config.chunk_size = 50;
        config.chunk_overlap = 50;
        let err = config.validate().expect_err("overlap == size must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let mut config = base_config();
        config.chunk_size = 0;
        config.chunk_overlap = 0;
        let err = config.validate().expect_err("zero chunk size must fail");
        assert!(matches!(err, AppError::Validation(_)));
    }
}
