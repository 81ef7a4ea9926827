use std::collections::HashMap;

use retrova_core::Payload;

/// BM25 parameters.
const K1: f32 = 1.2;
const B: f32 = 0.75;

/// Tokenize text into lowercase alphanumeric words, dropping single chars.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.len() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// The text a point contributes to the keyword index: its `content` payload
/// field plus the `title` field when present.
pub fn indexable_text(payload: &Payload) -> String {
    let content = payload.get("content").and_then(|v| v.as_str()).unwrap_or("");
    match payload.get("title").and_then(|v| v.as_str()) {
        Some(title) if !title.is_empty() => format!("{content}\n{title}"),
        _ => content.to_string(),
    }
}

/// A BM25 inverted index over point ids.
///
/// The index is the in-process counterpart of a database full-text index:
/// the owning collection updates it in lockstep with every point mutation,
/// so a point is searchable exactly as long as it is stored. Scores are an
/// unbounded text-rank scale; higher is better.
#[derive(Debug, Default)]
pub struct KeywordIndex {
    /// term -> (point id -> term frequency)
    postings: HashMap<String, HashMap<String, f32>>,
    /// point id -> the distinct terms it contributed (for removal)
    doc_terms: HashMap<String, Vec<String>>,
    /// point id -> token count
    doc_lengths: HashMap<String, f32>,
    /// Sum of all document lengths, kept to derive the average cheaply.
    total_length: f32,
}

impl KeywordIndex {
    /// Creates a new, empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.doc_lengths.len()
    }

    /// Whether the index holds no documents.
    pub fn is_empty(&self) -> bool {
        self.doc_lengths.is_empty()
    }

    /// Adds (or replaces) a document under the given point id.
    pub fn add(&mut self, id: &str, text: &str) {
        self.remove(id);

        let tokens = tokenize(text);
        let doc_len = tokens.len() as f32;

        let mut term_freq: HashMap<String, f32> = HashMap::new();
        for token in tokens {
            *term_freq.entry(token).or_insert(0.0) += 1.0;
        }

        let mut terms = Vec::with_capacity(term_freq.len());
        for (term, freq) in term_freq {
            self.postings
                .entry(term.clone())
                .or_default()
                .insert(id.to_string(), freq);
            terms.push(term);
        }

        self.doc_terms.insert(id.to_string(), terms);
        self.doc_lengths.insert(id.to_string(), doc_len);
        self.total_length += doc_len;
    }

    /// Removes a document. Unknown ids are a no-op.
    pub fn remove(&mut self, id: &str) {
        let Some(length) = self.doc_lengths.remove(id) else {
            return;
        };
        self.total_length -= length;

        if let Some(terms) = self.doc_terms.remove(id) {
            for term in terms {
                if let Some(postings) = self.postings.get_mut(&term) {
                    postings.remove(id);
                    if postings.is_empty() {
                        self.postings.remove(&term);
                    }
                }
            }
        }
    }

    /// Drops every document.
    pub fn clear(&mut self) {
        self.postings.clear();
        self.doc_terms.clear();
        self.doc_lengths.clear();
        self.total_length = 0.0;
    }

    /// Searches the index, returning up to `limit` `(id, score)` pairs
    /// sorted by descending BM25 score.
    pub fn search(&self, query: &str, limit: usize) -> Vec<(String, f32)> {
        if self.doc_lengths.is_empty() {
            return Vec::new();
        }

        let n = self.doc_lengths.len() as f32;
        let avg_len = self.total_length / n;
        let mut scores: HashMap<&str, f32> = HashMap::new();

        for term in tokenize(query) {
            let Some(postings) = self.postings.get(&term) else {
                continue;
            };
            let df = postings.len() as f32;
            let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();

            for (id, tf) in postings {
                let dl = self.doc_lengths.get(id).copied().unwrap_or(0.0);
                let denom = tf + K1 * (1.0 - B + B * dl / avg_len);
                *scores.entry(id.as_str()).or_insert(0.0) += idf * (tf * (K1 + 1.0)) / denom;
            }
        }

        let mut ranked: Vec<(String, f32)> = scores
            .into_iter()
            .map(|(id, score)| (id.to_string(), score))
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(limit);
        ranked
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ranks_keyword_matches_first() {
        let mut index = KeywordIndex::new();
        index.add("a", "rust rust rust systems programming");
        index.add("b", "python scripting language");
        index.add("c", "gardening tips for spring");

        let results = index.search("rust systems", 10);
        assert!(!results.is_empty());
        assert_eq!(results[0].0, "a");
        assert!(results[0].1 > 0.0);
        assert!(!results.iter().any(|(id, _)| id == "c"));
    }

    #[test]
    fn limit_caps_results() {
        let mut index = KeywordIndex::new();
        for i in 0..10 {
            index.add(&format!("doc{i}"), "shared term plus unique filler");
        }
        assert_eq!(index.search("shared", 3).len(), 3);
    }

    #[test]
    fn remove_drops_document_from_results() {
        let mut index = KeywordIndex::new();
        index.add("a", "ferrous metallurgy");
        index.add("b", "ferrous alloys");
        index.remove("a");

        let results = index.search("ferrous", 10);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].0, "b");
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn add_replaces_previous_text() {
        let mut index = KeywordIndex::new();
        index.add("a", "original topic");
        index.add("a", "replacement subject");

        assert!(index.search("original", 10).is_empty());
        assert_eq!(index.search("replacement", 10).len(), 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn empty_index_returns_nothing() {
        let index = KeywordIndex::new();
        assert!(index.search("anything", 5).is_empty());
    }

    #[test]
    fn indexable_text_includes_title() {
        let payload: Payload = [
            ("content".to_string(), json!("body text")),
            ("title".to_string(), json!("Heading")),
        ]
        .into_iter()
        .collect();
        let text = indexable_text(&payload);
        assert!(text.contains("body text"));
        assert!(text.contains("Heading"));

        let bare: Payload = [("content".to_string(), json!("body only"))]
            .into_iter()
            .collect();
        assert_eq!(indexable_text(&bare), "body only");
    }
}
