pub mod narrative;
pub mod orchestrator;
pub mod ranking;
pub mod recommend;
pub mod scoring;
pub mod strategy;
pub mod tier;

pub use narrative::ReasoningNarrator;
pub use orchestrator::DiagnosticOrchestrator;
pub use ranking::Ranker;
pub use recommend::{RecommendationAggregator, Recommendations};
pub use scoring::{DiagnosisScorer, ScoredDiagnosis};
pub use strategy::{CandidateStrategy, EmbeddingStrategy, KeywordStrategy};
pub use tier::TierClassifier;
