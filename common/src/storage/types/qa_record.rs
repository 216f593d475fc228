use crate::stored_object;

stored_object!(QARecord, "qa_kb", {
    question: String,
    answer: String,
    embedding: Vec<f32>
});

impl QARecord {
    pub fn new(id: String, question: String, answer: String, embedding: Vec<f32>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            question,
            answer,
            embedding,
        }
    }

    /// Text that gets embedded for a QA pair. Question and answer are
    /// combined so a query can match either side of the pair.
    pub fn embedding_input(question: &str, answer: &str) -> String {
        format!("{question} AND {answer}")
    }
}
