//! Compensating actions for multi-step writes

use tracing::{info, warn};

use harbor_backend::{Bucket, ObjectStorage};

/// An undo step registered after a forward step succeeds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
    RemoveObject { bucket: Bucket, path: String },
}

impl Compensation {
    pub fn remove_object(bucket: Bucket, path: impl Into<String>) -> Self {
        Compensation::RemoveObject {
            bucket,
            path: path.into(),
        }
    }
}

/// Ordered log of undo steps.
///
/// On failure [`Saga::abort`] runs the steps newest-first and hands back the
/// original error; compensation failures are logged, never returned.
pub struct Saga<'a> {
    name: &'static str,
    storage: &'a dyn ObjectStorage,
    undo: Vec<Compensation>,
}

impl<'a> Saga<'a> {
    pub fn new(name: &'static str, storage: &'a dyn ObjectStorage) -> Self {
        Self {
            name,
            storage,
            undo: Vec::new(),
        }
    }

    pub fn record(&mut self, compensation: Compensation) {
        self.undo.push(compensation);
    }

    /// Forget a step whose effect has already been reversed
    pub fn release(&mut self, compensation: &Compensation) {
        self.undo.retain(|c| c != compensation);
    }

    pub fn pending(&self) -> &[Compensation] {
        &self.undo
    }

    pub fn commit(self) {
        info!(saga = self.name, steps = self.undo.len(), "Saga committed");
    }

    pub async fn abort<E: std::fmt::Display>(self, error: E) -> E {
        warn!(saga = self.name, error = %error, steps = self.undo.len(), "Saga aborted, compensating");

        for compensation in self.undo.into_iter().rev() {
            match &compensation {
                Compensation::RemoveObject { bucket, path } => {
                    match self.storage.remove(*bucket, std::slice::from_ref(path)).await {
                        Ok(()) => info!(saga = self.name, %bucket, path = %path, "Compensated"),
                        Err(e) => warn!(
                            saga = self.name,
                            %bucket,
                            path = %path,
                            error = %e,
                            "Compensation failed, object orphaned"
                        ),
                    }
                }
            }
        }
        error
    }
}
