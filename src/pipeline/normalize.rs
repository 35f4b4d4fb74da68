use std::collections::BTreeMap;

use crate::models::{PatientCase, SymptomInput};

/// Characters of a descriptor kept as its feature-importance key.
const FEATURE_KEY_CHARS: usize = 50;

/// Importance policy for descriptors. `symptom` is `None` for the chief complaint.
pub trait SymptomWeighting: Send + Sync {
    fn weight(&self, descriptor: &str, symptom: Option<&SymptomInput>) -> f64;
}

/// Every descriptor weighs 1.0.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformWeighting;

impl SymptomWeighting for UniformWeighting {
    fn weight(&self, _descriptor: &str, _symptom: Option<&SymptomInput>) -> f64 {
        1.0
    }
}

/// Descriptor texts with parallel weights. Chief complaint first.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSymptoms {
    descriptors: Vec<String>,
    weights: Vec<f64>,
}

impl NormalizedSymptoms {
    /// Build from explicit pairs. Mismatched lengths keep the shorter prefix.
    pub fn from_parts(descriptors: Vec<String>, weights: Vec<f64>) -> Self {
        let n = descriptors.len().min(weights.len());
        let mut descriptors = descriptors;
        let mut weights = weights;
        descriptors.truncate(n);
        weights.truncate(n);
        Self { descriptors, weights }
    }

    pub fn descriptors(&self) -> &[String] {
        &self.descriptors
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Normalized weight per descriptor, keyed by its first 50 characters.
    pub fn feature_importance(&self) -> BTreeMap<String, f64> {
        let total: f64 = self.weights.iter().sum();
        if total <= 0.0 {
            return BTreeMap::new();
        }
        self.descriptors
            .iter()
            .zip(&self.weights)
            .map(|(descriptor, weight)| {
                let key: String = descriptor.chars().take(FEATURE_KEY_CHARS).collect();
                (key, weight / total)
            })
            .collect()
    }
}

pub struct SymptomNormalizer<W = UniformWeighting> {
    weighting: W,
}

impl SymptomNormalizer<UniformWeighting> {
    pub fn new() -> Self {
        Self {
            weighting: UniformWeighting,
        }
    }
}

impl Default for SymptomNormalizer<UniformWeighting> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: SymptomWeighting> SymptomNormalizer<W> {
    pub fn with_weighting(weighting: W) -> Self {
        Self { weighting }
    }

    pub fn normalize(&self, case: &PatientCase) -> NormalizedSymptoms {
        let mut descriptors = Vec::with_capacity(case.symptoms.len() + 1);
        let mut weights = Vec::with_capacity(case.symptoms.len() + 1);

        weights.push(self.weighting.weight(&case.chief_complaint, None));
        descriptors.push(case.chief_complaint.clone());

        for symptom in &case.symptoms {
            let descriptor = describe(symptom);
            weights.push(self.weighting.weight(&descriptor, Some(symptom)));
            descriptors.push(descriptor);
        }

        NormalizedSymptoms { descriptors, weights }
    }
}

/// "description (severity severity) for N days in location"
fn describe(symptom: &SymptomInput) -> String {
    let mut text = format!("{} ({} severity)", symptom.description, symptom.severity);
    if let Some(days) = symptom.duration_days.filter(|d| *d > 0) {
        text.push_str(&format!(" for {days} days"));
    }
    if let Some(location) = symptom.location.as_deref().filter(|l| !l.is_empty()) {
        text.push_str(&format!(" in {location}"));
    }
    text
}
