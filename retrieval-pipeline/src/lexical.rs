use std::collections::HashMap;

use tracing::debug;
use unicode_segmentation::UnicodeSegmentation;

use crate::scoring::sort_by_score_desc;

// Okapi BM25 constants; the epsilon floor keeps very common terms from
// contributing a negative idf.
const K1: f32 = 1.5;
const B: f32 = 0.75;
const IDF_EPSILON: f32 = 0.25;

/// One ranked result from the lexical index.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub doc_id: String,
    pub text: String,
    pub score: f32,
}

/// BM25 ranking over the Doc tier's raw texts.
///
/// The index is a value: `build` constructs a complete new one and the owner
/// publishes it by swapping it in behind a lock, so concurrent readers never
/// observe a half-built corpus. Never persisted; always rebuilt wholesale.
#[derive(Debug, Default)]
pub struct LexicalIndex {
    doc_ids: Vec<String>,
    texts: Vec<String>,
    term_frequencies: Vec<HashMap<String, f32>>,
    doc_lengths: Vec<f32>,
    average_length: f32,
    idf: HashMap<String, f32>,
}

impl LexicalIndex {
    /// An index over no documents; every search returns nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn build(documents: Vec<(String, String)>) -> Self {
        let mut doc_ids = Vec::with_capacity(documents.len());
        let mut texts = Vec::with_capacity(documents.len());
        let mut term_frequencies = Vec::with_capacity(documents.len());
        let mut doc_lengths = Vec::with_capacity(documents.len());
        let mut document_counts: HashMap<String, u32> = HashMap::new();

        for (id, text) in documents {
            let tokens = tokenize(&text);
            let mut frequencies: HashMap<String, f32> = HashMap::new();
            for token in &tokens {
                *frequencies.entry(token.clone()).or_insert(0.0) += 1.0;
            }
            for term in frequencies.keys() {
                *document_counts.entry(term.clone()).or_insert(0) += 1;
            }

            doc_lengths.push(tokens.len() as f32);
            term_frequencies.push(frequencies);
            texts.push(text);
            doc_ids.push(id);
        }

        let doc_count = doc_ids.len() as f32;
        let average_length = if doc_ids.is_empty() {
            0.0
        } else {
            doc_lengths.iter().sum::<f32>() / doc_count
        };

        let idf = compute_idf(&document_counts, doc_count);

        debug!(
            documents = doc_ids.len(),
            vocabulary = idf.len(),
            "built lexical index"
        );

        Self {
            doc_ids,
            texts,
            term_frequencies,
            doc_lengths,
            average_length,
            idf,
        }
    }

    pub fn len(&self) -> usize {
        self.doc_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doc_ids.is_empty()
    }

    /// Scores every document against the query, keeps only strictly positive
    /// scores, and returns up to `top_k` hits sorted by score descending.
    /// Ties keep insertion order. An empty or never-built index returns
    /// nothing.
    pub fn search(&self, query: &str, top_k: usize) -> Vec<LexicalHit> {
        if self.is_empty() {
            return Vec::new();
        }

        let query_terms = tokenize(query);
        if query_terms.is_empty() {
            return Vec::new();
        }

        let mut hits: Vec<LexicalHit> = self
            .doc_ids
            .iter()
            .enumerate()
            .filter_map(|(position, doc_id)| {
                let score = self.score_document(position, &query_terms);
                (score > 0.0).then(|| LexicalHit {
                    doc_id: doc_id.clone(),
                    text: self.texts[position].clone(),
                    score,
                })
            })
            .collect();

        sort_by_score_desc(&mut hits, |hit| hit.score);
        hits.truncate(top_k);
        hits
    }

    fn score_document(&self, position: usize, query_terms: &[String]) -> f32 {
        let frequencies = &self.term_frequencies[position];
        let length_norm = 1.0 - B + B * self.doc_lengths[position] / self.average_length;

        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *frequencies.get(term)?;
                let idf = *self.idf.get(term)?;
                Some(idf * tf * (K1 + 1.0) / (tf + K1 * length_norm))
            })
            .sum()
    }
}

/// Okapi idf with the rank-bm25 epsilon floor: terms appearing in most
/// documents would get a negative idf; those are raised to a fraction of the
/// mean idf instead of being dropped.
fn compute_idf(document_counts: &HashMap<String, u32>, doc_count: f32) -> HashMap<String, f32> {
    let mut idf: HashMap<String, f32> = HashMap::new();
    let mut idf_sum = 0.0;
    let mut negative_terms: Vec<String> = Vec::new();

    for (term, df) in document_counts {
        let value = ((doc_count - *df as f32 + 0.5) / (*df as f32 + 0.5)).ln();
        idf_sum += value;
        if value < 0.0 {
            negative_terms.push(term.clone());
        }
        idf.insert(term.clone(), value);
    }

    if !idf.is_empty() {
        let floor = IDF_EPSILON * idf_sum / idf.len() as f32;
        for term in negative_terms {
            idf.insert(term, floor.abs());
        }
    }

    idf
}

/// Unicode word segmentation (UAX-29), lowercased. The same tokenizer runs
/// at build and query time.
fn tokenize(text: &str) -> Vec<String> {
    text.unicode_words()
        .map(|word| word.to_lowercase())
        .collect()
}
