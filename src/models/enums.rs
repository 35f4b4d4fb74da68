use serde::{Deserialize, Serialize};

use super::ModelError;

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($(#[$attr:meta])* $name:ident { $($(#[$vattr:meta])* $variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        $(#[$attr])*
        pub enum $name {
            $($(#[$vattr])* $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = ModelError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(ModelError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(#[derive(Default)] Severity {
    Mild => "mild",
    #[default]
    Moderate => "moderate",
    Severe => "severe",
    Critical => "critical",
});

str_enum!(#[derive(Default)] Frequency {
    #[default]
    Constant => "constant",
    Intermittent => "intermittent",
    Episodic => "episodic",
    Progressive => "progressive",
});

str_enum!(Sex {
    Male => "male",
    Female => "female",
    Other => "other",
    Unknown => "unknown",
});

str_enum!(#[derive(Default)] UrgencyLevel {
    Emergency => "emergency",
    Urgent => "urgent",
    #[default]
    Routine => "routine",
    NonUrgent => "non_urgent",
});

str_enum!(ReviewTier {
    Tier1Automated => "tier1_automated",
    Tier2PrimaryCare => "tier2_primary_care",
    Tier3Specialist => "tier3_specialist",
    Tier4Multidisciplinary => "tier4_multidisciplinary",
});

impl ReviewTier {
    /// Numeric escalation level: 1 needs the least human oversight, 4 the most.
    pub fn level(&self) -> u8 {
        match self {
            Self::Tier1Automated => 1,
            Self::Tier2PrimaryCare => 2,
            Self::Tier3Specialist => 3,
            Self::Tier4Multidisciplinary => 4,
        }
    }
}
