//! Cascading retrieval: tier searches, lexical fallback, and answer
//! synthesis, walked in strict priority order by the [`CascadeEngine`].

pub mod cascade;
pub mod generation;
pub mod lexical;
pub mod scoring;
pub mod vector;

pub use cascade::{AnswerKind, CascadeEngine, CascadeResult, GenerationSettings};
pub use generation::{GenerationService, OpenAiGeneration, GENERATION_UNAVAILABLE};
pub use lexical::{LexicalHit, LexicalIndex};
pub use vector::{TierHit, TierMeta};
