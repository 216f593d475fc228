use std::sync::Arc;

use common::{storage::db::SurrealDbClient, utils::config::AppConfig};
use ingestion_pipeline::IngestionPipeline;
use retrieval_pipeline::CascadeEngine;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub engine: Arc<CascadeEngine>,
    pub pipeline: Arc<IngestionPipeline>,
    pub config: AppConfig,
}

impl ApiState {
    pub fn new(
        db: Arc<SurrealDbClient>,
        engine: Arc<CascadeEngine>,
        pipeline: Arc<IngestionPipeline>,
        config: AppConfig,
    ) -> Self {
        Self {
            db,
            engine,
            pipeline,
            config,
        }
    }
}
