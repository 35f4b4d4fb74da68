use std::io::Read;

use super::{ConditionCatalog, ConditionIndex, IndexError, ScoredCondition, SearchFilter};
use crate::models::{load_conditions_json, MedicalCondition};
use crate::pipeline::embedding::{EmbeddingError, EmbeddingModel};

/// In-process condition index using cosine similarity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryConditionIndex {
    entries: Vec<IndexedCondition>,
}

#[derive(Debug, Clone)]
struct IndexedCondition {
    condition: MedicalCondition,
    embedding: Vec<f32>,
}

impl InMemoryConditionIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every condition from its indexing text and store it.
    pub fn from_conditions<E: EmbeddingModel + ?Sized>(
        conditions: Vec<MedicalCondition>,
        embedder: &E,
    ) -> Result<Self, IndexError> {
        let texts: Vec<String> = conditions.iter().map(MedicalCondition::embedding_text).collect();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let embeddings = embedder.embed_batch(&refs)?;
        if embeddings.len() != conditions.len() {
            return Err(IndexError::Embedding(EmbeddingError::CountMismatch {
                expected: conditions.len(),
                actual: embeddings.len(),
            }));
        }

        let mut index = Self::new();
        for (condition, embedding) in conditions.into_iter().zip(embeddings) {
            index.insert(condition, embedding);
        }
        tracing::info!(count = index.len(), "In-memory condition index built");
        Ok(index)
    }

    /// Read a JSON array of conditions and index them.
    pub fn from_json<R: Read, E: EmbeddingModel + ?Sized>(
        reader: R,
        embedder: &E,
    ) -> Result<Self, IndexError> {
        let conditions =
            load_conditions_json(reader).map_err(|e| IndexError::InvalidPayload(e.to_string()))?;
        Self::from_conditions(conditions, embedder)
    }

    /// Add a condition with a precomputed embedding. Later inserts rank after
    /// earlier ones on equal similarity.
    pub fn insert(&mut self, condition: MedicalCondition, embedding: Vec<f32>) {
        self.entries.push(IndexedCondition { condition, embedding });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ConditionIndex for InMemoryConditionIndex {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f64,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredCondition>, IndexError> {
        let mut scored: Vec<(f64, &IndexedCondition)> = self
            .entries
            .iter()
            .filter(|entry| filter.matches(&entry.condition))
            .map(|entry| (cosine_similarity(query, &entry.embedding).clamp(0.0, 1.0), entry))
            .filter(|(score, _)| *score >= score_threshold)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(similarity, entry)| ScoredCondition {
                condition: entry.condition.clone(),
                similarity,
            })
            .collect())
    }

    fn get_condition_by_id(&self, condition_id: &str) -> Result<Option<MedicalCondition>, IndexError> {
        Ok(self
            .entries
            .iter()
            .find(|entry| entry.condition.condition_id == condition_id)
            .map(|entry| entry.condition.clone()))
    }
}

impl ConditionCatalog for InMemoryConditionIndex {
    fn conditions(&self, filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError> {
        Ok(self
            .entries
            .iter()
            .filter(|entry| filter.matches(&entry.condition))
            .map(|entry| entry.condition.clone())
            .collect())
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
