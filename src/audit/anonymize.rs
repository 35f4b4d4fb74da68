use hkdf::Hkdf;
use sha2::Sha256;

use super::{AuditError, AuditRecord};
use crate::config::AuditSettings;

/// Used when no audit secret is configured.
const DEVELOPMENT_SECRET: &[u8] = b"default-audit-key";
const PSEUDONYM_SALT: &[u8] = b"constellation-audit-pseudonym";
const PSEUDONYM_HEX_CHARS: usize = 12;
const REDACTED_LOCATION: &str = "anonymized";

/// Rewrites identifying fields of an audit record before it is stored.
///
/// Patient ids become a keyed pseudonym, stable for a given secret so one
/// patient can be followed across records without storing the id itself.
#[derive(Clone)]
pub struct AnonymizationPolicy {
    secret: Vec<u8>,
    enabled: bool,
}

impl std::fmt::Debug for AnonymizationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnonymizationPolicy")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl AnonymizationPolicy {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
            enabled: true,
        }
    }

    /// Leaves records untouched.
    pub fn disabled() -> Self {
        Self {
            secret: Vec::new(),
            enabled: false,
        }
    }

    pub fn from_settings(settings: &AuditSettings) -> Self {
        if !settings.anonymize {
            return Self::disabled();
        }
        match settings.secret.as_deref() {
            Some(secret) => Self::new(secret),
            None => {
                tracing::warn!("No audit secret configured, using development key");
                Self::new(DEVELOPMENT_SECRET)
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// "anon_" followed by 12 hex characters of an HKDF-SHA256 derivation.
    pub fn pseudonym(&self, identifier: &str) -> Result<String, AuditError> {
        let hk = Hkdf::<Sha256>::new(Some(PSEUDONYM_SALT), &self.secret);
        let mut okm = [0u8; PSEUDONYM_HEX_CHARS / 2];
        hk.expand(identifier.as_bytes(), &mut okm)
            .map_err(|_| AuditError::KeyDerivation)?;
        let hex: String = okm.iter().map(|b| format!("{b:02x}")).collect();
        Ok(format!("anon_{hex}"))
    }

    pub fn apply(&self, record: &mut AuditRecord) -> Result<(), AuditError> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(patient_id) = record.input.patient_id.as_deref() {
            record.input.patient_id = Some(self.pseudonym(patient_id)?);
        }
        if record.input.geographic_location.is_some() {
            record.input.geographic_location = Some(REDACTED_LOCATION.to_string());
        }
        record.data_anonymized = true;
        Ok(())
    }
}
