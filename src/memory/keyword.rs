//! Keyword-overlap memory
//!
//! Ranks stored items by Jaccard similarity between the keyword sets of the
//! query and of each item, returning the best `k` above a minimum score.

use crate::errors::Result;
use crate::memory::{MemoryItem, MemorySource};
use async_trait::async_trait;
use std::collections::HashSet;
use tokio::sync::RwLock;

/// Default number of items returned per query
pub const DEFAULT_TOP_K: usize = 3;

/// Default minimum similarity
pub const DEFAULT_MIN_SCORE: f64 = 0.1;

struct Indexed {
    item: MemoryItem,
    keywords: HashSet<String>,
}

/// Relevance-ranked memory store
pub struct KeywordMemory {
    name: String,
    items: RwLock<Vec<Indexed>>,
    top_k: usize,
    min_score: f64,
}

impl KeywordMemory {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: RwLock::new(Vec::new()),
            top_k: DEFAULT_TOP_K,
            min_score: DEFAULT_MIN_SCORE,
        }
    }

    /// Number of items returned per query
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    /// Minimum similarity for an item to be returned
    pub fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = min_score;
        self
    }
}

#[async_trait]
impl MemorySource for KeywordMemory {
    fn name(&self) -> &str {
        &self.name
    }

    async fn query(&self, context: &str) -> Result<Vec<MemoryItem>> {
        let query = extract_keywords(context);
        let store = self.items.read().await;

        let mut scored: Vec<(f64, usize)> = store
            .iter()
            .enumerate()
            .map(|(i, indexed)| (jaccard_similarity(&query, &indexed.keywords), i))
            .filter(|(score, _)| *score >= self.min_score)
            .collect();

        // Highest score first; ties keep insertion order
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal).then(a.1.cmp(&b.1)));

        Ok(scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, i)| store[i].item.clone())
            .collect())
    }

    async fn add(&self, item: MemoryItem) -> Result<()> {
        let keywords = extract_keywords(&item.content);
        self.items.write().await.push(Indexed { item, keywords });
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.items.write().await.clear();
        Ok(())
    }
}

/// Extract keywords from text
fn extract_keywords(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.len() > 3)
        .filter(|word| !is_stopword(word))
        .map(|s| s.to_string())
        .collect()
}

/// Check if word is a stopword
fn is_stopword(word: &str) -> bool {
    matches!(
        word,
        "this" | "that" | "these" | "those" | "with" | "from" | "have" | "been" | "were" | "what"
            | "should" | "would" | "about"
    )
}

fn jaccard_similarity(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}
