//! The run-scoped artifact store.
//!
//! The store is the single piece of shared mutable state in a pipeline run.
//! Every key is written exactly once by its producer stage and read any
//! number of times afterward; the write-once discipline removes the need for
//! finer-grained locking.

use crate::core::{Artifact, StageStatus};
use crate::errors::{ArtifactUnavailableError, DuplicateArtifactError};
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct StoreState {
    /// Stored artifacts by name.
    artifacts: HashMap<String, Artifact>,
    /// Registered producer stage for each expected artifact name.
    producers: HashMap<String, String>,
    /// Terminal outcome per stage, sealed by the executor.
    sealed: HashMap<String, StageStatus>,
}

/// Write-once-per-key, many-reader store for artifacts and small capability
/// handles, scoped to one pipeline run.
///
/// [`get`](Self::get) cooperatively suspends the calling stage task until
/// the named artifact's producer reaches a terminal status; it never blocks
/// the scheduler and never observes a partially written payload.
#[derive(Debug, Default)]
pub struct ArtifactStore {
    state: Mutex<StoreState>,
    changed: Notify,
}

impl ArtifactStore {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the producer stage for an artifact name.
    ///
    /// Registration happens at pipeline-assembly time so that readers of an
    /// artifact whose producer fails (and therefore never writes) still
    /// resolve instead of suspending forever.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateArtifactError` if the name is already registered.
    pub fn expect(
        &self,
        name: impl Into<String>,
        producer: impl Into<String>,
    ) -> Result<(), DuplicateArtifactError> {
        let name = name.into();
        let mut state = self.state.lock();

        if let Some(existing) = state.producers.get(&name) {
            return Err(DuplicateArtifactError::new(name, existing.clone()));
        }

        state.producers.insert(name, producer.into());
        Ok(())
    }

    /// Stores an artifact under its name.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateArtifactError` if the name already holds a payload.
    pub fn put(&self, artifact: Artifact) -> Result<(), DuplicateArtifactError> {
        {
            let mut state = self.state.lock();

            if let Some(existing) = state.artifacts.get(&artifact.name) {
                return Err(DuplicateArtifactError::new(
                    artifact.name.clone(),
                    existing.producer.clone(),
                ));
            }

            // Late registration for producers that were not declared up
            // front; keeps `get` resolvable either way.
            state
                .producers
                .entry(artifact.name.clone())
                .or_insert_with(|| artifact.producer.clone());

            state.artifacts.insert(artifact.name.clone(), artifact);
        }

        self.changed.notify_waiters();
        Ok(())
    }

    /// Records a stage's terminal status, waking any suspended readers.
    ///
    /// Called by the executor for every stage that reaches a terminal state,
    /// including skipped stages.
    pub fn seal_stage(&self, stage: impl Into<String>, status: StageStatus) {
        {
            let mut state = self.state.lock();
            state.sealed.insert(stage.into(), status);
        }
        self.changed.notify_waiters();
    }

    /// Fetches an artifact, suspending until its producer is terminal.
    ///
    /// Resolution rules:
    /// - payload present: returned immediately;
    /// - producer sealed without a payload, or sealed failed/skipped:
    ///   `ArtifactUnavailableError`;
    /// - no producer registered for the name: `ArtifactUnavailableError`
    ///   immediately (the artifact can never arrive);
    /// - otherwise: suspend until one of the above holds.
    ///
    /// # Errors
    ///
    /// Returns `ArtifactUnavailableError` as described above.
    pub async fn get(&self, name: &str) -> Result<Artifact, ArtifactUnavailableError> {
        loop {
            let notified = self.changed.notified();
            tokio::pin!(notified);
            // Register interest before inspecting state so a concurrent
            // put/seal between the check and the await is not lost.
            notified.as_mut().enable();

            {
                let state = self.state.lock();

                if let Some(artifact) = state.artifacts.get(name) {
                    return Ok(artifact.clone());
                }

                match state.producers.get(name) {
                    None => {
                        return Err(ArtifactUnavailableError::new(
                            name,
                            "no producer registered for this artifact",
                        ));
                    }
                    Some(producer) => {
                        if let Some(status) = state.sealed.get(producer) {
                            let reason = if status.is_blocked() {
                                format!("producer stage '{producer}' finished as {status}")
                            } else {
                                format!(
                                    "producer stage '{producer}' succeeded without storing it"
                                )
                            };
                            return Err(ArtifactUnavailableError::new(name, reason));
                        }
                    }
                }
            }

            notified.await;
        }
    }

    /// Returns a stored artifact if it is already present, without
    /// suspending.
    #[must_use]
    pub fn try_get(&self, name: &str) -> Option<Artifact> {
        self.state.lock().artifacts.get(name).cloned()
    }

    /// Returns true if an artifact with this name has been stored.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.state.lock().artifacts.contains_key(name)
    }

    /// Returns the number of stored artifacts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().artifacts.len()
    }

    /// Returns true if no artifacts have been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.lock().artifacts.is_empty()
    }

    /// Returns all stored artifact names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.state.lock().artifacts.keys().cloned().collect()
    }
}
