//! End-to-end case analysis.
//!
//! validate → red-flag screen → normalize → retrieve → score → rank → tier
//! → recommend → narrate → assemble → audit.
//!
//! Provider failures propagate unchanged. The only failure that does not
//! abort an analysis is the audit sink's, which is logged.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use super::narrative::ReasoningNarrator;
use super::ranking::Ranker;
use super::recommend::RecommendationAggregator;
use super::scoring::ScoredDiagnosis;
use super::strategy::{CandidateStrategy, EmbeddingStrategy, KeywordStrategy};
use super::tier::TierClassifier;
use crate::audit::{AuditRecord, AuditSink, CallerContext};
use crate::config::{ConfigError, EngineConfig, RetrievalStrategyKind};
use crate::models::{DiagnosticResult, PatientCase};
use crate::pipeline::embedding::EmbeddingModel;
use crate::pipeline::normalize::SymptomNormalizer;
use crate::pipeline::retrieval::{KnowledgeBase, ScoredCondition};
use crate::pipeline::safety::RedFlagScreen;
use crate::pipeline::{CancellationFlag, DiagnosticError};

/// Rare-pass diagnoses reported separately.
const RARE_CONSIDERED_CAP: usize = 5;

pub struct DiagnosticOrchestrator {
    config: EngineConfig,
    strategy: Box<dyn CandidateStrategy>,
    normalizer: SymptomNormalizer,
    tiers: TierClassifier,
    audit: Option<Arc<dyn AuditSink>>,
}

impl DiagnosticOrchestrator {
    pub fn new(config: EngineConfig, strategy: Box<dyn CandidateStrategy>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            tiers: TierClassifier::from_config(&config),
            config,
            strategy,
            normalizer: SymptomNormalizer::new(),
            audit: None,
        })
    }

    /// Strategy selected by `config.strategy`. The keyword strategy never calls `embedder`.
    pub fn from_config(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingModel>,
        knowledge_base: Arc<dyn KnowledgeBase>,
    ) -> Result<Self, ConfigError> {
        let strategy: Box<dyn CandidateStrategy> = match config.strategy {
            RetrievalStrategyKind::Embedding => {
                if embedder.dimension() != config.embedding_dimension {
                    tracing::warn!(
                        configured = config.embedding_dimension,
                        provider = embedder.dimension(),
                        "Embedding dimension differs from configuration"
                    );
                }
                Box::new(EmbeddingStrategy::from_config(&config, embedder, knowledge_base))
            }
            RetrievalStrategyKind::Keyword => Box::new(KeywordStrategy::from_config(&config, knowledge_base)),
        };
        Self::new(config, strategy)
    }

    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn analyze(
        &self,
        case: &PatientCase,
        caller: &CallerContext,
    ) -> Result<DiagnosticResult, DiagnosticError> {
        self.analyze_with_cancel(case, caller, &CancellationFlag::new())
    }

    /// Like `analyze`, stopping with `Cancelled` at the next provider call once `cancel` is set.
    pub fn analyze_with_cancel(
        &self,
        case: &PatientCase,
        caller: &CallerContext,
        cancel: &CancellationFlag,
    ) -> Result<DiagnosticResult, DiagnosticError> {
        let started = Instant::now();
        case.validate(self.config.max_symptoms)?;

        let red_flags = RedFlagScreen::screen(case);
        let requires_emergency_care = red_flags.requires_emergency_care();

        let symptoms = self.normalizer.normalize(case);
        let candidates = self.strategy.retrieve(case, &symptoms, cancel)?;

        let score_pass = |pass: &[ScoredCondition]| -> Vec<ScoredDiagnosis> {
            pass.iter()
                .map(|candidate| self.strategy.score(candidate, case, &symptoms))
                .collect()
        };
        let ranked = Ranker::rank(score_pass(&candidates.common), score_pass(&candidates.rare));

        let overall_confidence = ranked.first().map_or(0.0, ScoredDiagnosis::confidence);
        let review_tier = self.tiers.classify(overall_confidence, requires_emergency_care);
        let primary_diagnosis = ranked
            .first()
            .filter(|_| overall_confidence >= self.tiers.tier1)
            .map(|top| top.diagnosis.clone());

        let recommendations = RecommendationAggregator::aggregate(&ranked);
        let reasoning_summary = ReasoningNarrator::narrate(
            &case.chief_complaint,
            symptoms.len(),
            &ranked,
            self.strategy.basis(),
        );

        let result = DiagnosticResult {
            result_id: new_result_id(),
            case_id: case.case_id.clone(),
            differential_diagnoses: Ranker::visible(&ranked, self.config.final_results_limit),
            primary_diagnosis,
            review_tier,
            overall_confidence,
            red_flags_detected: red_flags.flags,
            requires_emergency_care,
            rare_diseases_considered: Ranker::rare_considered(
                &ranked,
                &candidates.rare_ids(),
                RARE_CONSIDERED_CAP,
            ),
            recommended_specialists: recommendations.specialists,
            recommended_tests: recommendations.tests,
            reasoning_summary,
            feature_importance: symptoms.feature_importance(),
            processing_time_ms: started.elapsed().as_secs_f64() * 1000.0,
            model_version: self.config.model_version.clone(),
            created_at: Utc::now(),
        };

        tracing::info!(
            case_id = %result.case_id,
            result_id = %result.result_id,
            strategy = self.strategy.name(),
            diagnoses = ranked.len(),
            confidence = overall_confidence,
            tier = %review_tier,
            elapsed_ms = result.processing_time_ms,
            "Analysis complete"
        );

        if let Some(sink) = &self.audit {
            let scores = ranked.iter().map(|s| s.diagnosis.similarity_score).collect();
            let record = AuditRecord::diagnostic_analysis(case, &result, caller, scores);
            match sink.record(record) {
                Ok(audit_id) => tracing::debug!(audit_id = %audit_id, result_id = %result.result_id, "Analysis audited"),
                Err(e) => tracing::warn!(result_id = %result.result_id, error = %e, "Audit record failed"),
            }
        }

        Ok(result)
    }
}

/// "result_" followed by 12 hex characters.
fn new_result_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("result_{}", &hex[..12])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::{AnonymizationPolicy, AuditError, MemoryAuditSink};
    use crate::models::{MedicalCondition, ReviewTier, Severity, Sex, SymptomInput};
    use crate::pipeline::embedding::{DeterministicEmbedder, EmbeddingError};
    use crate::pipeline::retrieval::{
        ConditionCatalog, ConditionIndex, InMemoryConditionIndex, IndexError, SearchFilter,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    const DIM: usize = 16;

    // ── fixtures ────────────────────────────────

    fn case(chief: &str, symptoms: Vec<SymptomInput>) -> PatientCase {
        PatientCase {
            case_id: "case_orch".into(),
            patient_id: Some("MRN-7".into()),
            age: 54,
            sex: Sex::Female,
            chief_complaint: chief.into(),
            symptoms,
            medical_history: vec![],
            family_history: vec![],
            current_medications: vec![],
            geographic_location: Some("Lyon".into()),
        }
    }

    fn fever_case() -> PatientCase {
        case(
            "fever and cough",
            vec![SymptomInput::new("fever"), SymptomInput::new("productive cough")],
        )
    }

    fn condition(id: &str, prevalence: f64, rare: bool) -> MedicalCondition {
        let mut c = MedicalCondition::new(id, format!("Condition {id}"));
        c.prevalence = Some(prevalence);
        c.is_rare_disease = rare;
        c.typical_symptoms = vec!["fever".into(), "cough".into(), "fatigue".into()];
        c
    }

    fn hit(c: MedicalCondition, similarity: f64) -> ScoredCondition {
        ScoredCondition {
            condition: c,
            similarity,
        }
    }

    struct CountingEmbedder {
        inner: DeterministicEmbedder,
        calls: Arc<AtomicUsize>,
    }

    impl EmbeddingModel for CountingEmbedder {
        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    struct DownEmbedder;

    impl EmbeddingModel for DownEmbedder {
        fn embed_batch(&self, _texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Connection("http://localhost:11434".into()))
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    /// Serves fixed hit lists per pass, ignoring the query.
    #[derive(Default)]
    struct ScriptedIndex {
        common: Vec<ScoredCondition>,
        rare: Vec<ScoredCondition>,
    }

    impl ConditionIndex for ScriptedIndex {
        fn search(
            &self,
            _query: &[f32],
            limit: usize,
            _score_threshold: f64,
            filter: &SearchFilter,
        ) -> Result<Vec<ScoredCondition>, IndexError> {
            let pass = if filter.rare_disease == Some(true) { &self.rare } else { &self.common };
            Ok(pass.iter().take(limit).cloned().collect())
        }

        fn get_condition_by_id(&self, _id: &str) -> Result<Option<MedicalCondition>, IndexError> {
            Ok(None)
        }
    }

    impl ConditionCatalog for ScriptedIndex {
        fn conditions(&self, _filter: &SearchFilter) -> Result<Vec<MedicalCondition>, IndexError> {
            Ok(Vec::new())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _record: AuditRecord) -> Result<String, AuditError> {
            Err(AuditError::KeyDerivation)
        }
    }

    fn orchestrator(index: ScriptedIndex) -> (DiagnosticOrchestrator, Arc<AtomicUsize>) {
        orchestrator_with(EngineConfig::default(), index)
    }

    fn orchestrator_with(
        config: EngineConfig,
        index: ScriptedIndex,
    ) -> (DiagnosticOrchestrator, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = CountingEmbedder {
            inner: DeterministicEmbedder::new(DIM),
            calls: calls.clone(),
        };
        let orch = DiagnosticOrchestrator::from_config(config, Arc::new(embedder), Arc::new(index)).unwrap();
        (orch, calls)
    }

    fn analyze(orch: &DiagnosticOrchestrator, case: &PatientCase) -> DiagnosticResult {
        orch.analyze(case, &CallerContext::new("u-1", "physician")).unwrap()
    }

    // ── scenarios ───────────────────────────────

    #[test]
    fn critical_chest_pain_is_emergency_tier1() {
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let case = case(
            "severe chest pain",
            vec![SymptomInput::new("crushing pressure").with_severity(Severity::Critical)],
        );
        let result = analyze(&orch, &case);
        assert!(result.requires_emergency_care);
        assert!(result.red_flags_detected.contains(&"chest pain".to_string()));
        assert!(result
            .red_flags_detected
            .contains(&"Critical severity: crushing pressure".to_string()));
        assert_eq!(result.review_tier, ReviewTier::Tier1Automated);
        assert!(result.primary_diagnosis.is_none());
    }

    #[test]
    fn prevalent_common_condition_clears_tier1() {
        let index = ScriptedIndex {
            common: vec![hit(condition("flu", 0.2, false), 0.9)],
            rare: vec![],
        };
        let (orch, _) = orchestrator(index);
        let result = analyze(&orch, &fever_case());

        assert!((result.overall_confidence - 0.9).abs() < 1e-12);
        assert_eq!(result.review_tier, ReviewTier::Tier1Automated);
        let primary = result.primary_diagnosis.as_ref().unwrap();
        assert_eq!(primary.condition_id, "flu");
        assert_eq!(result.top_diagnosis().unwrap().condition_id, "flu");
        assert!(result.rare_diseases_considered.is_empty());
        assert!(!result.requires_emergency_care);
    }

    #[test]
    fn rare_disease_penalty_and_reporting() {
        let index = ScriptedIndex {
            common: vec![],
            rare: vec![hit(condition("orphan", 0.00001, true), 0.9)],
        };
        let (orch, _) = orchestrator(index);
        let result = analyze(&orch, &fever_case());

        assert!((result.overall_confidence - 0.729).abs() < 1e-3);
        assert_eq!(result.review_tier, ReviewTier::Tier2PrimaryCare);
        assert!(result.primary_diagnosis.is_none());
        assert_eq!(result.rare_diseases_considered.len(), 1);
        assert_eq!(result.rare_diseases_considered[0].condition_id, "orphan");
    }

    #[test]
    fn empty_retrieval_is_tier4_with_consultation_narrative() {
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let result = analyze(&orch, &fever_case());

        assert!(result.differential_diagnoses.is_empty());
        assert_eq!(result.overall_confidence, 0.0);
        assert!(result.primary_diagnosis.is_none());
        assert_eq!(result.review_tier, ReviewTier::Tier4Multidisciplinary);
        assert!(result.reasoning_summary.ends_with("Recommend specialist consultation."));
        assert!(result.recommended_specialists.is_empty());
    }

    #[test]
    fn fifty_one_symptoms_rejected_before_embedding() {
        let (orch, calls) = orchestrator(ScriptedIndex::default());
        let case = case(
            "many complaints",
            (0..51).map(|i| SymptomInput::new(format!("symptom {i}"))).collect(),
        );
        let err = orch.analyze(&case, &CallerContext::anonymous()).unwrap_err();
        assert!(matches!(err, DiagnosticError::InvalidInput(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn same_case_twice_gives_same_content() {
        let index = ScriptedIndex {
            common: vec![
                hit(condition("a", 0.1, false), 0.8),
                hit(condition("b", 0.05, false), 0.8),
                hit(condition("c", 0.3, false), 0.6),
            ],
            rare: vec![hit(condition("r", 0.0001, true), 0.7)],
        };
        let (orch, _) = orchestrator(index);
        let case = fever_case();

        let normalize = |mut r: DiagnosticResult| {
            r.result_id = String::new();
            r.processing_time_ms = 0.0;
            r.created_at = Default::default();
            r
        };
        let first = normalize(analyze(&orch, &case));
        let second = normalize(analyze(&orch, &case));
        assert_eq!(first, second);
    }

    #[test]
    fn result_metadata() {
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let result = analyze(&orch, &fever_case());
        assert!(result.result_id.starts_with("result_"));
        assert_eq!(result.result_id.len(), 7 + 12);
        assert_eq!(result.case_id, "case_orch");
        assert_eq!(result.model_version, EngineConfig::default().model_version);
        assert!(result.processing_time_ms >= 0.0);
        // chief complaint + two symptoms, uniform weights
        assert_eq!(result.feature_importance.len(), 3);
        assert!(result.feature_importance.values().all(|w| (w - 1.0 / 3.0).abs() < 1e-12));
    }

    #[test]
    fn visible_list_is_truncated_but_audit_sees_all_scores() {
        let common = (0..15)
            .map(|i| hit(condition(&format!("c{i:02}"), 0.1, false), 0.5 + i as f64 * 0.01))
            .collect();
        let (orch, _) = orchestrator(ScriptedIndex { common, rare: vec![] });
        let sink = Arc::new(MemoryAuditSink::default());
        let orch = orch.with_audit_sink(sink.clone());

        let result = analyze(&orch, &fever_case());
        assert_eq!(result.differential_diagnoses.len(), 10);
        assert_eq!(result.top_diagnosis().unwrap().condition_id, "c14");
        for pair in result.differential_diagnoses.windows(2) {
            assert!(pair[0].confidence_score >= pair[1].confidence_score);
        }

        let records = sink.entries();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].similarity_scores.len(), 15);
        assert_eq!(records[0].result_id, result.result_id);
        assert_eq!(records[0].output.num_differential_diagnoses, 10);
    }

    #[test]
    fn audit_sink_anonymizes_raw_case() {
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let sink = Arc::new(MemoryAuditSink::new(AnonymizationPolicy::new("k")));
        let orch = orch.with_audit_sink(sink.clone());
        analyze(&orch, &fever_case());

        let record = &sink.entries()[0];
        assert!(record.data_anonymized);
        assert!(record.input.patient_id.as_deref().unwrap().starts_with("anon_"));
        assert_eq!(record.input.geographic_location.as_deref(), Some("anonymized"));
        assert_eq!(record.caller.user_id.as_deref(), Some("u-1"));
    }

    #[test]
    fn audit_failure_does_not_fail_analysis() {
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let orch = orch.with_audit_sink(Arc::new(FailingSink));
        assert!(orch.analyze(&fever_case(), &CallerContext::anonymous()).is_ok());
    }

    #[test]
    fn specialists_come_from_top_three() {
        let mut cardiac = condition("mi", 0.01, false);
        cardiac.specialist_referral = Some("Cardiology".into());
        cardiac.recommended_tests = vec!["ECG".into(), "Troponin".into()];
        let mut pulmonary = condition("pe", 0.01, false);
        pulmonary.specialist_referral = Some("Pulmonology".into());
        pulmonary.recommended_tests = vec!["CT angiography".into(), "ECG".into()];
        let index = ScriptedIndex {
            common: vec![hit(cardiac, 0.8), hit(pulmonary, 0.7)],
            rare: vec![],
        };
        let (orch, _) = orchestrator(index);
        let result = analyze(&orch, &fever_case());
        assert_eq!(result.recommended_specialists, vec!["Cardiology", "Pulmonology"]);
        assert_eq!(result.recommended_tests, vec!["ECG", "Troponin", "CT angiography"]);
    }

    #[test]
    fn embedding_failure_propagates() {
        let orch = DiagnosticOrchestrator::from_config(
            EngineConfig::default(),
            Arc::new(DownEmbedder),
            Arc::new(ScriptedIndex::default()),
        )
        .unwrap();
        let err = orch.analyze(&fever_case(), &CallerContext::anonymous()).unwrap_err();
        assert!(matches!(err, DiagnosticError::EmbeddingUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn cancelled_analysis_stops_before_provider_calls() {
        let (orch, calls) = orchestrator(ScriptedIndex::default());
        let cancel = CancellationFlag::new();
        cancel.cancel();
        let err = orch
            .analyze_with_cancel(&fever_case(), &CallerContext::anonymous(), &cancel)
            .unwrap_err();
        assert!(matches!(err, DiagnosticError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_config_rejected() {
        let config = EngineConfig {
            tier1_confidence_threshold: 0.3,
            ..EngineConfig::default()
        };
        let result = DiagnosticOrchestrator::from_config(
            config,
            Arc::new(DeterministicEmbedder::new(DIM)),
            Arc::new(ScriptedIndex::default()),
        );
        assert!(matches!(result, Err(ConfigError::TierOrdering)));
    }

    // ── keyword strategy end to end ─────────────

    #[test]
    fn keyword_strategy_runs_without_embeddings() {
        let mut flu = MedicalCondition::new("flu", "Influenza");
        flu.prevalence = Some(0.1);
        flu.typical_symptoms = vec!["fever".into(), "cough".into()];
        let mut kb = InMemoryConditionIndex::new();
        kb.insert(flu, vec![0.0; DIM]);

        let config = EngineConfig {
            strategy: RetrievalStrategyKind::Keyword,
            ..EngineConfig::default()
        };
        let calls = Arc::new(AtomicUsize::new(0));
        let embedder = CountingEmbedder {
            inner: DeterministicEmbedder::new(DIM),
            calls: calls.clone(),
        };
        let orch = DiagnosticOrchestrator::from_config(config, Arc::new(embedder), Arc::new(kb)).unwrap();
        assert_eq!(orch.strategy_name(), "keyword");

        let result = analyze(&orch, &fever_case());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let top = result.top_diagnosis().unwrap();
        assert_eq!(top.condition_id, "flu");
        assert!(top.supporting_evidence[0].starts_with("Keyword match score: "));
        assert!(result
            .reasoning_summary
            .contains("based on keyword matching of reported symptoms."));
    }

    #[test]
    fn shared_sink_sees_every_analysis() {
        let sink = Arc::new(MemoryAuditSink::default());
        let (orch, _) = orchestrator(ScriptedIndex::default());
        let orch = orch.with_audit_sink(sink.clone());
        for _ in 0..3 {
            analyze(&orch, &fever_case());
        }
        let ids: Vec<String> = sink.drain().into_iter().map(|r| r.audit_id).collect();
        assert_eq!(ids.len(), 3);
        let unique: std::collections::BTreeSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), 3);
    }
}
