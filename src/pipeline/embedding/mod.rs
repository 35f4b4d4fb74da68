pub mod constellation;
pub mod deterministic;
pub mod ollama;

pub use constellation::ConstellationEncoder;
pub use deterministic::DeterministicEmbedder;
pub use ollama::OllamaEmbedder;

use std::sync::Arc;

use thiserror::Error;

use super::DiagnosticError;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding provider connection failed: {0}")]
    Connection(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Embedding provider returned {status}: {body}")]
    Provider { status: u16, body: String },

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Expected {expected} embeddings, got {actual}")]
    CountMismatch { expected: usize, actual: usize },

    #[error("Expected dimension {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Embedding has zero norm")]
    ZeroVector,
}

impl From<EmbeddingError> for DiagnosticError {
    fn from(err: EmbeddingError) -> Self {
        DiagnosticError::EmbeddingUnavailable(err.to_string())
    }
}

/// Text embedding provider. Vectors are unit-norm with a fixed dimension.
pub trait EmbeddingModel: Send + Sync {
    /// One vector per input, in input order. A single call is one retryable unit.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.embed_batch(&[text])?;
        if vectors.len() != 1 {
            return Err(EmbeddingError::CountMismatch {
                expected: 1,
                actual: vectors.len(),
            });
        }
        vectors.pop().ok_or(EmbeddingError::CountMismatch {
            expected: 1,
            actual: 0,
        })
    }
}

impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Box<T> {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

impl<T: EmbeddingModel + ?Sized> EmbeddingModel for Arc<T> {
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        (**self).embed_batch(texts)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }
}

/// Scale `vector` to unit L2 norm in place. Returns false (leaving it untouched) on zero norm.
pub fn l2_normalize(vector: &mut [f32]) -> bool {
    let norm = vector
        .iter()
        .map(|x| f64::from(*x) * f64::from(*x))
        .sum::<f64>()
        .sqrt();
    if norm == 0.0 || !norm.is_finite() {
        return false;
    }
    for value in vector.iter_mut() {
        *value = (f64::from(*value) / norm) as f32;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn l2_normalize_scales_to_unit() {
        let mut v = vec![3.0f32, 4.0];
        assert!(l2_normalize(&mut v));
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn l2_normalize_rejects_zero() {
        let mut v = vec![0.0f32; 4];
        assert!(!l2_normalize(&mut v));
        assert_eq!(v, vec![0.0; 4]);
    }

    #[test]
    fn embedding_error_maps_to_unavailable() {
        let err: DiagnosticError = EmbeddingError::Connection("http://localhost:11434".into()).into();
        assert!(matches!(err, DiagnosticError::EmbeddingUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn boxed_and_shared_handles_delegate() {
        let boxed: Box<dyn EmbeddingModel> = Box::new(DeterministicEmbedder::new(16));
        let shared: Arc<dyn EmbeddingModel> = Arc::new(DeterministicEmbedder::new(16));
        assert_eq!(boxed.dimension(), 16);
        assert_eq!(boxed.embed("fever").unwrap(), shared.embed("fever").unwrap());
    }
}
