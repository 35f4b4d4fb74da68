pub mod candidates;
pub mod memory;
pub mod qdrant;

pub use candidates::{CandidateRetriever, CandidateSet};
pub use memory::InMemoryConditionIndex;
pub use qdrant::QdrantConditionIndex;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::embedding::EmbeddingError;
use super::DiagnosticError;
use crate::models::{MedicalCondition, UrgencyLevel};

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Vector index connection failed: {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Vector index returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Malformed condition payload: {0}")]
    InvalidPayload(String),

    #[error("Condition embedding failed: {0}")]
    Embedding(#[from] EmbeddingError),
}

impl From<IndexError> for DiagnosticError {
    fn from(err: IndexError) -> Self {
        DiagnosticError::IndexUnavailable(err.to_string())
    }
}

/// Typed retrieval filter. Unset fields do not constrain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub rare_disease: Option<bool>,
    pub min_prevalence: Option<f64>,
    pub max_prevalence: Option<f64>,
    pub urgency: Option<UrgencyLevel>,
}

impl SearchFilter {
    /// Common-condition pass: excludes anything below `min_prevalence`.
    pub fn common(min_prevalence: f64) -> Self {
        Self {
            min_prevalence: Some(min_prevalence),
            ..Self::default()
        }
    }

    /// Rare-disease pass: flagged conditions only.
    pub fn rare() -> Self {
        Self {
            rare_disease: Some(true),
            ..Self::default()
        }
    }

    /// A condition without prevalence never satisfies a prevalence bound.
    pub fn matches(&self, condition: &MedicalCondition) -> bool {
        if let Some(rare) = self.rare_disease {
            if condition.is_rare_disease != rare {
                return false;
            }
        }
        if let Some(min) = self.min_prevalence {
            if !condition.prevalence.is_some_and(|p| p >= min) {
                return false;
            }
        }
        if let Some(max) = self.max_prevalence {
            if !condition.prevalence.is_some_and(|p| p <= max) {
                return false;
            }
        }
        if let Some(urgency) = self.urgency {
            if condition.urgency_level != urgency {
                return false;
            }
        }
        true
    }
}

/// A retrieved condition with its similarity in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCondition {
    pub condition: MedicalCondition,
    pub similarity: f64,
}

/// Vector index over the condition knowledge base.
pub trait ConditionIndex: Send + Sync {
    /// Hits at or above `score_threshold`, best first, at most `limit`.
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f64,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredCondition>, IndexError>;

    fn get_condition_by_id(&self, condition_id: &str) -> Result<Option<MedicalCondition>, IndexError>;
}

/// Full listing of the knowledge base, for strategies that do not search by vector.
pub trait ConditionCatalog: Send + Sync {
    fn conditions(&self, filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError>;
}

/// A knowledge base that serves both retrieval strategies.
pub trait KnowledgeBase: ConditionIndex + ConditionCatalog {}

impl<T: ConditionIndex + ConditionCatalog + ?Sized> KnowledgeBase for T {}

impl<T: ConditionIndex + ?Sized> ConditionIndex for Box<T> {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f64,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredCondition>, IndexError> {
        (**self).search(query, limit, score_threshold, filter)
    }

    fn get_condition_by_id(&self, condition_id: &str) -> Result<Option<MedicalCondition>, IndexError> {
        (**self).get_condition_by_id(condition_id)
    }
}

impl<T: ConditionIndex + ?Sized> ConditionIndex for Arc<T> {
    fn search(
        &self,
        query: &[f32],
        limit: usize,
        score_threshold: f64,
        filter: &SearchFilter,
    ) -> Result<Vec<ScoredCondition>, IndexError> {
        (**self).search(query, limit, score_threshold, filter)
    }

    fn get_condition_by_id(&self, condition_id: &str) -> Result<Option<MedicalCondition>, IndexError> {
        (**self).get_condition_by_id(condition_id)
    }
}

impl<T: ConditionCatalog + ?Sized> ConditionCatalog for Arc<T> {
    fn conditions(&self, filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError> {
        (**self).conditions(filter)
    }
}

impl<T: ConditionCatalog + ?Sized> ConditionCatalog for Box<T> {
    fn conditions(&self, filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError> {
        (**self).conditions(filter)
    }
}
