use crate::config::EngineConfig;
use crate::models::ReviewTier;

/// Confidence cut-offs, highest first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierClassifier {
    pub tier1: f64,
    pub tier2: f64,
    pub tier3: f64,
}

impl Default for TierClassifier {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

impl TierClassifier {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            tier1: config.tier1_confidence_threshold,
            tier2: config.tier2_confidence_threshold,
            tier3: config.tier3_confidence_threshold,
        }
    }

    /// Emergency presentations are always Tier 1; otherwise the first threshold cleared.
    pub fn classify(&self, confidence: f64, requires_emergency_care: bool) -> ReviewTier {
        if requires_emergency_care {
            return ReviewTier::Tier1Automated;
        }
        if confidence >= self.tier1 {
            ReviewTier::Tier1Automated
        } else if confidence >= self.tier2 {
            ReviewTier::Tier2PrimaryCare
        } else if confidence >= self.tier3 {
            ReviewTier::Tier3Specialist
        } else {
            ReviewTier::Tier4Multidisciplinary
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn thresholds_are_inclusive() {
        let tiers = TierClassifier::default();
        assert_eq!(tiers.classify(0.85, false), ReviewTier::Tier1Automated);
        assert_eq!(tiers.classify(0.60, false), ReviewTier::Tier2PrimaryCare);
        assert_eq!(tiers.classify(0.40, false), ReviewTier::Tier3Specialist);
        assert_eq!(tiers.classify(0.3999, false), ReviewTier::Tier4Multidisciplinary);
    }

    #[test]
    fn no_diagnoses_is_tier4() {
        assert_eq!(TierClassifier::default().classify(0.0, false), ReviewTier::Tier4Multidisciplinary);
    }

    #[test]
    fn emergency_overrides_low_confidence() {
        assert_eq!(TierClassifier::default().classify(0.0, true), ReviewTier::Tier1Automated);
    }

    proptest! {
        #[test]
        fn higher_confidence_never_worse_tier(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let tiers = TierClassifier::default();
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(tiers.classify(hi, false).level() <= tiers.classify(lo, false).level());
        }

        #[test]
        fn emergency_always_tier1(c in 0.0f64..=1.0) {
            prop_assert_eq!(TierClassifier::default().classify(c, true), ReviewTier::Tier1Automated);
        }
    }
}
