use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::{AnonymizationPolicy, AuditError, AuditRecord, AuditSink};
use crate::config::AuditSettings;

// ═══════════════════════════════════════════
// In-memory sink
// ═══════════════════════════════════════════

/// Buffers records in memory, anonymized by its policy.
#[derive(Debug)]
pub struct MemoryAuditSink {
    buffer: Mutex<Vec<AuditRecord>>,
    policy: AnonymizationPolicy,
}

impl MemoryAuditSink {
    pub fn new(policy: AnonymizationPolicy) -> Self {
        Self {
            buffer: Mutex::new(Vec::new()),
            policy,
        }
    }

    pub fn entries(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|buf| buf.clone())
            .unwrap_or_default()
    }

    pub fn drain(&self) -> Vec<AuditRecord> {
        self.buffer
            .lock()
            .map(|mut buf| buf.drain(..).collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.buffer.lock().map(|buf| buf.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new(AnonymizationPolicy::disabled())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, mut record: AuditRecord) -> Result<String, AuditError> {
        self.policy.apply(&mut record)?;
        let audit_id = record.audit_id.clone();
        self.buffer
            .lock()
            .map_err(|_| AuditError::LockPoisoned)?
            .push(record);
        Ok(audit_id)
    }
}

// ═══════════════════════════════════════════
// JSON Lines sink
// ═══════════════════════════════════════════

/// Appends one JSON object per line to `audit_YYYY-MM-DD.jsonl`, keyed by the
/// record's UTC date.
#[derive(Debug)]
pub struct JsonlAuditSink {
    dir: PathBuf,
    policy: AnonymizationPolicy,
    write_lock: Mutex<()>,
}

impl JsonlAuditSink {
    /// Creates `dir` if needed.
    pub fn new(dir: impl Into<PathBuf>, policy: AnonymizationPolicy) -> Result<Self, AuditError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            policy,
            write_lock: Mutex::new(()),
        })
    }

    pub fn from_settings(settings: &AuditSettings) -> Result<Self, AuditError> {
        Self::new(&settings.audit_dir, AnonymizationPolicy::from_settings(settings))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_for(&self, record: &AuditRecord) -> PathBuf {
        self.dir
            .join(format!("audit_{}.jsonl", record.timestamp.format("%Y-%m-%d")))
    }

    /// Read back stored records, oldest file first, optionally for one case.
    /// Unparseable lines are skipped.
    pub fn read_records(&self, case_id: Option<&str>) -> Result<Vec<AuditRecord>, AuditError> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("audit_") && n.ends_with(".jsonl"))
            })
            .collect();
        files.sort();

        let mut records = Vec::new();
        for path in files {
            let reader = BufReader::new(fs::File::open(&path)?);
            for (line_no, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<AuditRecord>(&line) {
                    Ok(record) => {
                        if case_id.map_or(true, |id| record.case_id == id) {
                            records.push(record);
                        }
                    }
                    Err(e) => {
                        tracing::warn!(line = line_no + 1, error = %e, "Skipping malformed audit line");
                    }
                }
            }
        }
        Ok(records)
    }
}

impl AuditSink for JsonlAuditSink {
    fn record(&self, mut record: AuditRecord) -> Result<String, AuditError> {
        self.policy.apply(&mut record)?;
        let line = serde_json::to_string(&record)?;
        let path = self.file_for(&record);

        let _guard = self.write_lock.lock();
        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(file, "{line}")?;

        tracing::debug!(audit_id = %record.audit_id, "Audit record written");
        Ok(record.audit_id)
    }
}
