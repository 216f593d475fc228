//! Offline path: raw text and QA datasets in, embedded tier records out.

pub mod chunking;
pub mod pipeline;

pub use chunking::chunk;
pub use pipeline::{IngestFailure, IngestPayload, IngestReport, IngestionPipeline};
