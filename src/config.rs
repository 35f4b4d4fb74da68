use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Constellation";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prefix for every environment override.
pub const ENV_PREFIX: &str = "CONSTELLATION_";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "constellation_lib=info,warn"
}

/// Get the application data directory (~/Constellation/).
/// Falls back to the system temp dir when no home directory is known.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_NAME)
}

/// Default directory for JSONL audit files.
pub fn audit_log_dir() -> PathBuf {
    app_data_dir().join("audit")
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("{field} must be within [0, 1], got {value}")]
    OutOfRange { field: &'static str, value: f64 },

    #[error("Tier thresholds must satisfy tier1 >= tier2 >= tier3")]
    TierOrdering,

    #[error("{0} must be at least 1")]
    ZeroLimit(&'static str),
}

/// Which candidate strategy the orchestrator runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategyKind {
    /// Constellation embedding + vector search.
    #[default]
    Embedding,
    /// Keyword overlap against the full catalog, no embeddings.
    Keyword,
}

impl RetrievalStrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Embedding => "embedding",
            Self::Keyword => "keyword",
        }
    }
}

impl FromStr for RetrievalStrategyKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "embedding" => Ok(Self::Embedding),
            "keyword" | "lite" => Ok(Self::Keyword),
            other => Err(ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}STRATEGY"),
                value: other.to_string(),
            }),
        }
    }
}

/// Engine tuning. Thresholds and caps for retrieval, ranking and tiering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tier1_confidence_threshold: f64,
    pub tier2_confidence_threshold: f64,
    pub tier3_confidence_threshold: f64,
    pub top_k_candidates: usize,
    pub final_results_limit: usize,
    pub enable_rare_disease_detection: bool,
    pub common_score_threshold: f64,
    pub common_min_prevalence: f64,
    pub rare_score_threshold: f64,
    pub rare_result_limit: usize,
    pub max_symptoms: usize,
    pub embedding_dimension: usize,
    pub strategy: RetrievalStrategyKind,
    pub model_version: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tier1_confidence_threshold: 0.85,
            tier2_confidence_threshold: 0.60,
            tier3_confidence_threshold: 0.40,
            top_k_candidates: 50,
            final_results_limit: 10,
            enable_rare_disease_detection: true,
            common_score_threshold: 0.5,
            common_min_prevalence: 0.001,
            rare_score_threshold: 0.6,
            rare_result_limit: 20,
            max_symptoms: 50,
            embedding_dimension: 768,
            strategy: RetrievalStrategyKind::Embedding,
            model_version: APP_VERSION.to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `CONSTELLATION_*` environment variables, validated.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        override_parsed(&mut config.tier1_confidence_threshold, get("TIER1_THRESHOLD"))?;
        override_parsed(&mut config.tier2_confidence_threshold, get("TIER2_THRESHOLD"))?;
        override_parsed(&mut config.tier3_confidence_threshold, get("TIER3_THRESHOLD"))?;
        override_parsed(&mut config.top_k_candidates, get("TOP_K_CANDIDATES"))?;
        override_parsed(&mut config.final_results_limit, get("FINAL_RESULTS_LIMIT"))?;
        override_parsed(&mut config.enable_rare_disease_detection, get("ENABLE_RARE_DISEASE"))?;
        override_parsed(&mut config.common_score_threshold, get("COMMON_SCORE_THRESHOLD"))?;
        override_parsed(&mut config.common_min_prevalence, get("COMMON_MIN_PREVALENCE"))?;
        override_parsed(&mut config.rare_score_threshold, get("RARE_SCORE_THRESHOLD"))?;
        override_parsed(&mut config.rare_result_limit, get("RARE_RESULT_LIMIT"))?;
        override_parsed(&mut config.max_symptoms, get("MAX_SYMPTOMS"))?;
        override_parsed(&mut config.embedding_dimension, get("EMBEDDING_DIMENSION"))?;
        if let Some((_, value)) = get("STRATEGY") {
            config.strategy = value.parse()?;
        }
        if let Some((_, value)) = get("MODEL_VERSION") {
            config.model_version = value;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let unit_fields = [
            ("tier1_confidence_threshold", self.tier1_confidence_threshold),
            ("tier2_confidence_threshold", self.tier2_confidence_threshold),
            ("tier3_confidence_threshold", self.tier3_confidence_threshold),
            ("common_score_threshold", self.common_score_threshold),
            ("common_min_prevalence", self.common_min_prevalence),
            ("rare_score_threshold", self.rare_score_threshold),
        ];
        for (field, value) in unit_fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::OutOfRange { field, value });
            }
        }
        if self.tier1_confidence_threshold < self.tier2_confidence_threshold
            || self.tier2_confidence_threshold < self.tier3_confidence_threshold
        {
            return Err(ConfigError::TierOrdering);
        }
        let limits = [
            ("final_results_limit", self.final_results_limit),
            ("top_k_candidates", self.top_k_candidates),
            ("embedding_dimension", self.embedding_dimension),
            ("max_symptoms", self.max_symptoms),
        ];
        for (field, value) in limits {
            if value == 0 {
                return Err(ConfigError::ZeroLimit(field));
            }
        }
        Ok(())
    }
}

fn override_parsed<T: FromStr>(
    slot: &mut T,
    entry: Option<(String, String)>,
) -> Result<(), ConfigError> {
    if let Some((key, value)) = entry {
        *slot = value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value })?;
    }
    Ok(())
}

/// Endpoints for the external embedding and vector-index providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    pub embedding_url: String,
    pub embedding_model: String,
    pub index_url: String,
    pub index_api_key: Option<String>,
    pub index_collection: String,
    pub timeout_secs: u64,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            embedding_url: "http://localhost:11434".into(),
            embedding_model: "nomic-embed-text".into(),
            index_url: "http://localhost:6333".into(),
            index_api_key: None,
            index_collection: "medical_conditions".into(),
            timeout_secs: 30,
        }
    }
}

impl ProviderSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, v)) = get("EMBEDDING_URL") {
            settings.embedding_url = v;
        }
        if let Some((_, v)) = get("EMBEDDING_MODEL") {
            settings.embedding_model = v;
        }
        if let Some((_, v)) = get("INDEX_URL") {
            settings.index_url = v;
        }
        if let Some((_, v)) = get("INDEX_API_KEY") {
            settings.index_api_key = Some(v).filter(|k| !k.is_empty());
        }
        if let Some((_, v)) = get("INDEX_COLLECTION") {
            settings.index_collection = v;
        }
        override_parsed(&mut settings.timeout_secs, get("TIMEOUT_SECS"))?;
        Ok(settings)
    }
}

/// Where and how diagnostic audit records are written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSettings {
    pub audit_dir: PathBuf,
    pub anonymize: bool,
    /// Pseudonymization key material. Unset falls back to a fixed development key.
    pub secret: Option<String>,
}

impl Default for AuditSettings {
    fn default() -> Self {
        Self {
            audit_dir: audit_log_dir(),
            anonymize: true,
            secret: None,
        }
    }
}

impl AuditSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();
        let get = |name: &str| {
            let key = format!("{ENV_PREFIX}{name}");
            lookup(&key).map(|value| (key, value))
        };

        if let Some((_, v)) = get("AUDIT_DIR") {
            settings.audit_dir = PathBuf::from(v);
        }
        override_parsed(&mut settings.anonymize, get("AUDIT_ANONYMIZE"))?;
        if let Some((_, v)) = get("AUDIT_SECRET") {
            settings.secret = Some(v).filter(|s| !s.is_empty());
        }
        Ok(settings)
    }
}
