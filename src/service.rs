//! Async façade over the blocking orchestrator.
//!
//! Each analysis runs on tokio's blocking pool. Dropping the returned future
//! before it resolves cancels the analysis at its next provider call.

use std::sync::Arc;

use crate::audit::CallerContext;
use crate::models::{DiagnosticResult, PatientCase};
use crate::pipeline::diagnosis::DiagnosticOrchestrator;
use crate::pipeline::{CancellationFlag, DiagnosticError};

#[derive(Clone)]
pub struct DiagnosticService {
    orchestrator: Arc<DiagnosticOrchestrator>,
}

impl DiagnosticService {
    pub fn new(orchestrator: DiagnosticOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    pub fn from_shared(orchestrator: Arc<DiagnosticOrchestrator>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Arc<DiagnosticOrchestrator> {
        &self.orchestrator
    }

    pub async fn analyze(
        &self,
        case: PatientCase,
        caller: CallerContext,
    ) -> Result<DiagnosticResult, DiagnosticError> {
        self.analyze_with_cancel(case, caller, CancellationFlag::new()).await
    }

    /// `cancel` is also set if this future is dropped before completion.
    pub async fn analyze_with_cancel(
        &self,
        case: PatientCase,
        caller: CallerContext,
        cancel: CancellationFlag,
    ) -> Result<DiagnosticResult, DiagnosticError> {
        let mut guard = CancelOnDrop::new(cancel.clone());
        let orchestrator = self.orchestrator.clone();

        let joined = tokio::task::spawn_blocking(move || {
            orchestrator.analyze_with_cancel(&case, &caller, &cancel)
        })
        .await;
        guard.disarm();

        joined.map_err(|e| DiagnosticError::WorkerFailed(e.to_string()))?
    }
}

/// Sets the flag when dropped while armed.
struct CancelOnDrop {
    flag: CancellationFlag,
    armed: bool,
}

impl CancelOnDrop {
    fn new(flag: CancellationFlag) -> Self {
        Self { flag, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if self.armed {
            tracing::debug!("Analysis future dropped, cancelling worker");
            self.flag.cancel();
        }
    }
}
