//! Undo stack for multi-step lifecycle operations.

use crate::errors::ApplicationError;
use std::future::Future;
use std::pin::Pin;

type UndoStep = Pin<Box<dyn Future<Output = Result<(), ApplicationError>> + Send>>;

/// Undo actions recorded as each mutating step completes.
///
/// Rolling back runs the actions in reverse. The first undo failure is
/// returned; later failures are logged and kept in `secondary_failures`.
#[derive(Default)]
pub(crate) struct Compensation {
    steps: Vec<(&'static str, UndoStep)>,
}

/// Failures collected while rolling back
#[derive(Debug)]
pub(crate) struct RollbackFailure {
    pub primary: ApplicationError,
    pub secondary_failures: Vec<ApplicationError>,
}

impl Compensation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push<F>(&mut self, label: &'static str, undo: F)
    where
        F: Future<Output = Result<(), ApplicationError>> + Send + 'static,
    {
        self.steps.push((label, Box::pin(undo)));
    }

    pub(crate) fn len(&self) -> usize {
        self.steps.len()
    }

    pub(crate) async fn rollback(self) -> Result<(), RollbackFailure> {
        let mut failures = Vec::new();
        for (label, undo) in self.steps.into_iter().rev() {
            if let Err(error) = undo.await {
                tracing::error!(step = label, error = ?error, "compensation step failed");
                failures.push(error);
            }
        }

        let mut failures = failures.into_iter();
        match failures.next() {
            None => Ok(()),
            Some(primary) => Err(RollbackFailure {
                primary,
                secondary_failures: failures.collect(),
            }),
        }
    }

    /// Roll back and pick the error to surface: an undo failure takes
    /// priority over the error that triggered the rollback.
    pub(crate) async fn abort(self, cause: ApplicationError) -> ApplicationError {
        if self.len() == 0 {
            return cause;
        }
        match self.rollback().await {
            Ok(()) => cause,
            Err(failure) => {
                tracing::error!(
                    error = ?cause,
                    secondary = failure.secondary_failures.len(),
                    "rollback failed after operation error"
                );
                failure.primary
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn test_rollback_runs_in_reverse() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut compensation = Compensation::new();
        for step in ["first", "second", "third"] {
            let order = order.clone();
            compensation.push(step, async move {
                order.lock().unwrap().push(step);
                Ok(())
            });
        }

        assert!(compensation.rollback().await.is_ok());
        assert_eq!(*order.lock().unwrap(), vec!["third", "second", "first"]);
    }

    #[tokio::test]
    async fn test_undo_failure_takes_priority() {
        let mut compensation = Compensation::new();
        compensation.push("ok", async { Ok(()) });
        compensation.push("fails", async {
            Err(ApplicationError::CertificateServerError(
                "delete failed".to_string(),
            ))
        });
        compensation.push("also fails", async {
            Err(ApplicationError::CertificateClientError(
                "recreate failed".to_string(),
            ))
        });

        let error = compensation
            .abort(ApplicationError::Internal("store down".to_string()))
            .await;
        assert!(matches!(error, ApplicationError::CertificateClientError(_)));
    }

    #[tokio::test]
    async fn test_cause_returned_when_rollback_succeeds() {
        let mut compensation = Compensation::new();
        compensation.push("ok", async { Ok(()) });
        let error = compensation
            .abort(ApplicationError::Internal("store down".to_string()))
            .await;
        assert!(matches!(error, ApplicationError::Internal(_)));
    }
}
