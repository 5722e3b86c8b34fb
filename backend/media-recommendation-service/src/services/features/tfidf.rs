use super::sparse::CsrMatrix;
use super::stop_words::is_stop_word;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Split text into lowercase terms.
///
/// A term is a maximal run of alphanumeric characters or `_`, at least two
/// characters long, that is not an English stop word.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|s| s.chars().count() >= 2)
        .map(|s| s.to_lowercase())
        .filter(|s| !is_stop_word(s))
        .collect()
}

/// TF-IDF vectorizer fitted on one text feature of the catalog.
///
/// - Vocabulary columns are ordered lexicographically
/// - idf(t) = ln((1 + n_docs) / (1 + df(t))) + 1
/// - Rows are raw term counts × idf, then L2-normalized
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TfidfVectorizer {
    /// Term for each column
    terms: Vec<String>,
    /// Inverse document frequency for each column
    idf: Vec<f32>,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl TfidfVectorizer {
    /// Learn the vocabulary and idf weights, returning the document-term matrix.
    pub fn fit_transform(documents: &[String]) -> (Self, CsrMatrix) {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();

        // Document frequency per term, ordered for stable column ids
        let mut doc_freq: BTreeMap<&str, usize> = BTreeMap::new();
        for tokens in &tokenized {
            let mut seen: Vec<&str> = tokens.iter().map(String::as_str).collect();
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }

        let n_docs = documents.len() as f64;
        let terms: Vec<String> = doc_freq.keys().map(|t| t.to_string()).collect();
        let idf: Vec<f32> = doc_freq
            .values()
            .map(|&df| (((1.0 + n_docs) / (1.0 + df as f64)).ln() + 1.0) as f32)
            .collect();

        let mut vectorizer = Self {
            terms,
            idf,
            lookup: HashMap::new(),
        };
        vectorizer.rebuild_lookup();

        let rows = tokenized
            .iter()
            .map(|tokens| vectorizer.weigh(tokens))
            .collect();
        let matrix = CsrMatrix::from_rows(vectorizer.vocab_size(), rows);

        (vectorizer, matrix)
    }

    pub fn vocab_size(&self) -> usize {
        self.terms.len()
    }

    pub fn column_of(&self, term: &str) -> Option<usize> {
        self.lookup.get(term).copied()
    }

    /// Restore the term → column index after deserialization
    pub fn rebuild_lookup(&mut self) {
        self.lookup = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();
    }

    fn weigh(&self, tokens: &[String]) -> Vec<(usize, f32)> {
        let mut counts: HashMap<usize, f32> = HashMap::new();
        for token in tokens {
            if let Some(col) = self.column_of(token) {
                *counts.entry(col).or_insert(0.0) += 1.0;
            }
        }

        let mut row: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(col, tf)| (col, tf * self.idf[col]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            row.iter_mut().for_each(|(_, v)| *v /= norm);
        }

        row.sort_by_key(|(col, _)| *col);
        row
    }
}

impl PartialEq for TfidfVectorizer {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms && self.idf == other.idf
    }
}
