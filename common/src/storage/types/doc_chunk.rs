use crate::stored_object;

stored_object!(DocChunk, "doc_kb", {
    text: String,
    source: String,
    embedding: Vec<f32>
});

impl DocChunk {
    pub fn new(id: String, text: String, source: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            text,
            source,
            embedding,
        }
    }
}
