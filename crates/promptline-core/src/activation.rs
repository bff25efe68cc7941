use crate::errors::{Result, RolloutError};
use crate::model::{PromptVersion, Scope};
use crate::state::{self, Decision, ScopeState, StartAbTest};
use crate::storage::VersionStore;

/// Operator-driven state changes for a scope.
///
/// Every change is a pure transition applied through `VersionStore::transition`,
/// so the store, not this type, owns serialization. Errors are returned as-is;
/// retry policy belongs to the caller.
pub struct ActivationManager<'a, S: VersionStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: VersionStore + ?Sized> ActivationManager<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn activate(&self, id: &str) -> Result<PromptVersion> {
        self.store.set_active(id)?;
        let version = self.require(id)?;

        tracing::info!(
            event = "version_activated",
            id = %id,
            scope = %version.scope(),
            version = version.version,
        );
        Ok(version)
    }

    /// Starts a test of `req.challenger_id` against the scope's active version.
    pub fn start_ab_test(&self, req: &StartAbTest) -> Result<ScopeState> {
        let challenger = self.require(&req.challenger_id)?;
        let scope = challenger.scope();
        let next = self
            .store
            .transition(&scope, &|current| state::start_test(current, req))?;

        if let Some(t) = next.ab_test() {
            tracing::info!(
                event = "ab_test_started",
                scope = %scope,
                control = %t.control_id,
                challenger = %t.challenger_id,
                split_percent = t.split_percent.get(),
                min_tasks = ?t.min_tasks,
            );
        }
        Ok(next)
    }

    pub fn conclude_ab_test(&self, scope: &Scope, decision: Decision) -> Result<ScopeState> {
        let next = self
            .store
            .transition(scope, &|current| state::conclude_test(current, decision))?;

        tracing::info!(
            event = "ab_test_concluded",
            scope = %scope,
            decision = ?decision,
            active = %next.serving_id(),
        );
        Ok(next)
    }

    fn require(&self, id: &str) -> Result<PromptVersion> {
        self.store
            .get(id)?
            .ok_or_else(|| RolloutError::not_found(format!("prompt version {id}")))
    }
}
