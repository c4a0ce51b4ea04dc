//! Secondary indexes derived from key-value writes.
//!
//! This is wired in-process as an observer of the engine's apply path, not
//! as a network-facing component: it has no durability story of its own
//! and is rebuilt for free whenever the engine replays its WAL, since
//! replay drives writes back through the same apply path that populates
//! these indexes live.
//!
//! The vector index is a toy: a deterministic pseudo-embedding hashed from
//! the string's bytes, compared by brute-force cosine similarity. It is not
//! a real nearest-neighbor structure and is not meant to be one.

use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

use kv_types::Value;

const EMBEDDING_DIM: usize = 10;

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .collect()
}

/// A small, deterministic, seedable PRNG (splitmix64) so the same string
/// always hashes to the same pseudo-embedding across process restarts.
struct SplitMix64(u64);

impl SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.0 = self.0.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.0;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }

    fn next_unit_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }
}

fn seed_from_str(s: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    s.hash(&mut hasher);
    hasher.finish()
}

fn pseudo_embedding(text: &str) -> [f64; EMBEDDING_DIM] {
    let mut rng = SplitMix64(seed_from_str(text));
    let mut v = [0.0; EMBEDDING_DIM];
    for slot in v.iter_mut() {
        *slot = rng.next_unit_f64();
    }
    v
}

fn cosine_similarity(a: &[f64; EMBEDDING_DIM], b: &[f64; EMBEDDING_DIM]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f64 = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Maintains an inverted word index and a toy vector index over string
/// values in the store.
#[derive(Default)]
pub struct IndexManager {
    inverted: HashMap<String, HashSet<String>>,
    embeddings: HashMap<String, [f64; EMBEDDING_DIM]>,
}

impl IndexManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Called after a key's value changes (including first insertion).
    pub fn update(&mut self, key: &str, new_value: &Value, old_value: Option<&Value>) {
        if let Some(old) = old_value {
            self.unindex(key, old);
        }
        if let Value::String(text) = new_value {
            for word in tokenize(text) {
                self.inverted.entry(word).or_default().insert(key.to_string());
            }
            self.embeddings.insert(key.to_string(), pseudo_embedding(text));
        }
    }

    /// Called after a key is deleted.
    pub fn remove(&mut self, key: &str, old_value: &Value) {
        self.unindex(key, old_value);
    }

    fn unindex(&mut self, key: &str, old_value: &Value) {
        if let Value::String(text) = old_value {
            for word in tokenize(text) {
                if let Some(keys) = self.inverted.get_mut(&word) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.inverted.remove(&word);
                    }
                }
            }
        }
        self.embeddings.remove(key);
    }

    /// Returns the keys whose string value contains every word in `query`,
    /// case-insensitive.
    pub fn search(&self, query: &str) -> Vec<String> {
        let words = tokenize(query);
        if words.is_empty() {
            return Vec::new();
        }

        let mut iter = words.iter();
        let first = iter.next().unwrap();
        let mut result: HashSet<String> = self
            .inverted
            .get(first)
            .cloned()
            .unwrap_or_default();

        for word in iter {
            let keys = self.inverted.get(word);
            result = match keys {
                Some(keys) => result.intersection(keys).cloned().collect(),
                None => HashSet::new(),
            };
        }

        let mut out: Vec<String> = result.into_iter().collect();
        out.sort();
        out
    }

    /// Returns up to `top_k` keys ranked by cosine similarity of their toy
    /// embedding to `query`'s embedding, descending.
    pub fn vector_search(&self, query: &str, top_k: usize) -> Vec<(String, f64)> {
        let query_embedding = pseudo_embedding(query);
        let mut scored: Vec<(String, f64)> = self
            .embeddings
            .iter()
            .map(|(k, emb)| (k.clone(), cosine_similarity(&query_embedding, emb)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        scored
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_finds_keys_containing_all_words() {
        let mut idx = IndexManager::new();
        idx.update("k1", &Value::String("the quick brown fox".into()), None);
        idx.update("k2", &Value::String("the lazy dog".into()), None);

        assert_eq!(idx.search("quick fox"), vec!["k1".to_string()]);
        assert_eq!(idx.search("the"), {
            let mut v = vec!["k1".to_string(), "k2".to_string()];
            v.sort();
            v
        });
        assert!(idx.search("nonexistent").is_empty());
    }

    #[test]
    fn remove_clears_inverted_entries() {
        let mut idx = IndexManager::new();
        idx.update("k1", &Value::String("hello world".into()), None);
        idx.remove("k1", &Value::String("hello world".into()));
        assert!(idx.search("hello").is_empty());
    }

    #[test]
    fn update_replaces_previous_indexing() {
        let mut idx = IndexManager::new();
        idx.update("k1", &Value::String("first value".into()), None);
        idx.update(
            "k1",
            &Value::String("second text".into()),
            Some(&Value::String("first value".into())),
        );
        assert!(idx.search("first").is_empty());
        assert_eq!(idx.search("second"), vec!["k1".to_string()]);
    }

    #[test]
    fn vector_search_is_deterministic_across_calls() {
        let mut idx = IndexManager::new();
        idx.update("a", &Value::String("apples and oranges".into()), None);
        idx.update("b", &Value::String("completely unrelated topic".into()), None);

        let first = idx.vector_search("apples", 2);
        let second = idx.vector_search("apples", 2);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn non_string_values_are_not_indexed() {
        let mut idx = IndexManager::new();
        idx.update("k1", &Value::Number(42.0), None);
        assert!(idx.search("42").is_empty());
        assert!(idx.vector_search("anything", 5).is_empty());
    }
}
