use std::sync::Arc;

use api_router::{api_routes_v1, api_state::ApiState};
use common::{
    storage::{db::SurrealDbClient, tiers::TieredStore},
    utils::{
        config::{get_config, EmbeddingBackend},
        embedding::EmbeddingProvider,
    },
};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::{CascadeEngine, GenerationSettings, OpenAiGeneration};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Get config and fail fast on settings the engine cannot run with
    let config = get_config()?;
    config.validate()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    // Embedding provider sized per config; the vector indexes follow it
    let openai_for_embeddings = matches!(config.embedding_backend, EmbeddingBackend::OpenAI)
        .then(|| openai_client.clone());
    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, openai_for_embeddings)?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    db.ensure_tier_indexes(embedding_provider.dimension()).await?;

    let store = Arc::new(TieredStore::new(db.clone(), embedding_provider));
    let generation = Arc::new(OpenAiGeneration::new(
        openai_client,
        config.generation_model.clone(),
        config.generation_timeout_secs,
    ));

    let engine = Arc::new(CascadeEngine::new(
        store.clone(),
        generation,
        config.threshold_policy()?,
        config.top_k,
        GenerationSettings {
            max_tokens: config.generation_max_tokens,
            temperature: config.generation_temperature,
        },
    ));

    // The lexical index is never persisted; rebuild it from the Doc tier
    let indexed = engine.rebuild_lexical().await?;
    info!(documents = indexed, "Lexical index ready");

    let pipeline = Arc::new(IngestionPipeline::new(
        store,
        engine.clone(),
        config.chunk_size,
        config.chunk_overlap,
    ));

    let api_state = ApiState::new(db, engine, pipeline, config.clone());
    let app = api_routes_v1(&api_state).with_state(api_state);

    info!("Starting server listening on 0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.http_port)).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
