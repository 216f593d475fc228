use crate::stored_object;

stored_object!(QueryRecord, "query_kb", {
    query: String,
    answer: String,
    embedding: Vec<f32>
});

impl QueryRecord {
    pub fn new(id: String, query: String, answer: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            query,
            answer,
            embedding,
        }
    }
}
