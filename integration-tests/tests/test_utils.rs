use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use api_router::{api_routes_v1, api_state::ApiState};
use async_trait::async_trait;
use axum_test::TestServer;
use common::{
    storage::{db::SurrealDbClient, tiers::TieredStore},
    utils::{
        config::{AppConfig, EmbeddingBackend, ThresholdPolicy},
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{CascadeEngine, GenerationService, GenerationSettings};
use uuid::Uuid;

pub const EMBEDDING_DIMENSION: usize = 64;

/// Generation double: fixed reply, counts calls.
pub struct ScriptedGeneration {
    reply: String,
    calls: AtomicUsize,
}

impl ScriptedGeneration {
    pub fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_owned(),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationService for ScriptedGeneration {
    async fn generate(&self, _prompt: &str, _max_tokens: u32, _temperature: f32) -> String {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.reply.clone()
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        openai_api_key: "test-key".into(),
        surrealdb_address: "mem://".into(),
        surrealdb_username: "root".into(),
        surrealdb_password: "root".into(),
        surrealdb_namespace: "integration_test_ns".into(),
        surrealdb_database: Uuid::new_v4().to_string(),
        http_port: 5000,
        openai_base_url: "http://localhost:11434/v1".into(),
        embedding_backend: EmbeddingBackend::Hashed,
        embedding_model: "text-embedding-3-small".into(),
        embedding_dimensions: EMBEDDING_DIMENSION as u32,
        generation_model: "gpt-4o-mini".into(),
        generation_max_tokens: 256,
        generation_temperature: 0.0,
        generation_timeout_secs: 5,
        query_threshold: 0.90,
        qa_threshold: 0.75,
        doc_threshold: 0.70,
        top_k: 5,
        chunk_size: 200,
        chunk_overlap: 20,
        ingest_max_body_bytes: 1024 * 1024,
    }
}

pub struct TestApp {
    pub server: TestServer,
    pub engine: Arc<CascadeEngine>,
    pub store: Arc<TieredStore>,
    pub generation: Arc<ScriptedGeneration>,
}

/// Full server over an in-memory database, hashed embeddings, and a
/// scripted generation double.
pub async fn setup_server(thresholds: ThresholdPolicy, reply: &str) -> TestApp {
    let config = test_config();

    let db = Arc::new(
        SurrealDbClient::memory(&config.surrealdb_namespace, &config.surrealdb_database)
            .await
            .expect("Failed to start in-memory surrealdb"),
    );
    db.ensure_tier_indexes(EMBEDDING_DIMENSION)
        .await
        .expect("Failed to define indexes");

    let embedder = EmbeddingProvider::new_hashed(EMBEDDING_DIMENSION).expect("hashed provider");
    let store = Arc::new(TieredStore::new(db.clone(), Arc::new(embedder)));

    let generation = ScriptedGeneration::new(reply);
    let engine = Arc::new(CascadeEngine::new(
        store.clone(),
        generation.clone(),
        thresholds,
        config.top_k,
        GenerationSettings {
            max_tokens: config.generation_max_tokens,
            temperature: config.generation_temperature,
        },
    ));

    let pipeline = Arc::new(IngestionPipeline::new(
        store.clone(),
        engine.clone(),
        config.chunk_size,
        config.chunk_overlap,
    ));

    let api_state = ApiState::new(db, engine.clone(), pipeline, config);
    let app = api_routes_v1(&api_state).with_state(api_state);
    let server = TestServer::new(app).expect("Failed to start test server");

    TestApp {
        server,
        engine,
        store,
        generation,
    }
}

pub fn default_thresholds() -> ThresholdPolicy {
    ThresholdPolicy::new(0.90, 0.75, 0.70).expect("valid thresholds")
}
