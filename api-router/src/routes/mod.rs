pub mod chat;
pub mod ingest;
pub mod liveness;
pub mod readiness;
pub mod stats;
