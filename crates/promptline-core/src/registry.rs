use crate::activation::ActivationManager;
use crate::config::Settings;
use crate::errors::{Result, RolloutError};
use crate::metrics::{aggregate, VersionMetrics};
use crate::model::{NewVersion, PromptVersion, Sample, Scope, SplitPercent};
use crate::rollout::{Resolution, Resolver};
use crate::state::{Decision, ScopeState, StartAbTest};
use crate::storage::{ActiveOrPair, OutcomeSource, VersionStore};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Operator view of a scope's rollout.
///
/// In stable mode `active` is false and every other field is absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbTestState {
    pub active: bool,
    pub control: Option<PromptVersion>,
    pub challenger: Option<PromptVersion>,
    pub control_metrics: Option<VersionMetrics>,
    pub challenger_metrics: Option<VersionMetrics>,
    pub split_percent: Option<SplitPercent>,
    pub started_at: Option<DateTime<Utc>>,
    pub min_tasks: Option<u32>,
    /// Advisory: both legs have at least `min_tasks` outcomes.
    pub min_tasks_reached: Option<bool>,
}

/// The operation set exposed to transports.
pub struct PromptRegistry<S> {
    store: S,
    default_author: String,
    default_min_tasks: Option<u32>,
}

impl<S: VersionStore + OutcomeSource> PromptRegistry<S> {
    pub fn new(store: S) -> Self {
        Self::with_settings(store, &Settings::default())
    }

    pub fn with_settings(store: S, settings: &Settings) -> Self {
        Self {
            store,
            default_author: settings.default_author.clone(),
            default_min_tasks: settings.default_min_tasks,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn create_version(&self, mut req: NewVersion) -> Result<PromptVersion> {
        if req.created_by.as_deref().is_none_or(|a| a.trim().is_empty()) {
            req.created_by = Some(self.default_author.clone());
        }
        self.store.create(&req)
    }

    pub fn list_versions(&self, role: &str, model: Option<&str>) -> Result<Vec<PromptVersion>> {
        self.store.list_by_scope(&Scope::new(role, model)?)
    }

    pub fn get_version(&self, id: &str) -> Result<PromptVersion> {
        self.store
            .get(id)?
            .ok_or_else(|| RolloutError::not_found(format!("prompt version {id}")))
    }

    /// The version followed by its ancestors, newest first.
    pub fn lineage(&self, id: &str) -> Result<Vec<PromptVersion>> {
        let mut chain = vec![self.get_version(id)?];
        let mut seen: HashSet<String> = HashSet::from([id.to_string()]);

        while let Some(parent_id) = chain.last().and_then(|v| v.parent_version_id.clone()) {
            if !seen.insert(parent_id.clone()) {
                return Err(RolloutError::integrity(format!(
                    "lineage of {id} revisits {parent_id}"
                )));
            }
            let parent = self.store.get(&parent_id)?.ok_or_else(|| {
                RolloutError::integrity(format!("lineage of {id} points at missing {parent_id}"))
            })?;
            chain.push(parent);
        }
        Ok(chain)
    }

    pub fn activate_version(&self, id: &str) -> Result<PromptVersion> {
        ActivationManager::new(&self.store).activate(id)
    }

    pub fn resolve_active(
        &self,
        role: &str,
        model: Option<&str>,
        sample: Sample,
    ) -> Result<Option<Resolution>> {
        Resolver::new(&self.store).resolve_active(&Scope::new(role, model)?, sample)
    }

    pub fn start_ab_test(
        &self,
        challenger_id: &str,
        split_percent: Option<u8>,
        min_tasks: Option<u32>,
    ) -> Result<ScopeState> {
        let req = StartAbTest {
            challenger_id: challenger_id.to_string(),
            split_percent: split_percent.map(SplitPercent::new).transpose()?,
            min_tasks: min_tasks.or(self.default_min_tasks),
            started_at: Utc::now(),
        };
        ActivationManager::new(&self.store).start_ab_test(&req)
    }

    pub fn conclude_ab_test(
        &self,
        role: &str,
        model: Option<&str>,
        decision: Decision,
    ) -> Result<ScopeState> {
        ActivationManager::new(&self.store).conclude_ab_test(&Scope::new(role, model)?, decision)
    }

    /// Metrics only count outcomes recorded since the test started.
    pub fn ab_test_state(&self, role: &str, model: Option<&str>) -> Result<AbTestState> {
        let scope = Scope::new(role, model)?;
        let (control, challenger) = match self.store.active_or_pair(&scope)? {
            Some(ActiveOrPair::Pair {
                control,
                challenger,
            }) => (control, challenger),
            _ => return Ok(AbTestState::default()),
        };

        let started_at = challenger.ab_started_at.or(control.ab_started_at);
        let min_tasks = challenger.ab_min_tasks.or(control.ab_min_tasks);

        let control_metrics = aggregate(
            &control.id,
            &self.store.outcomes_for(&control.id, started_at)?,
        );
        let challenger_metrics = aggregate(
            &challenger.id,
            &self.store.outcomes_for(&challenger.id, started_at)?,
        );

        let min_tasks_reached = min_tasks.map(|n| {
            control_metrics.total_tasks >= u64::from(n)
                && challenger_metrics.total_tasks >= u64::from(n)
        });

        Ok(AbTestState {
            active: true,
            split_percent: challenger.ab_split_percent,
            started_at,
            min_tasks,
            min_tasks_reached,
            control_metrics: Some(control_metrics),
            challenger_metrics: Some(challenger_metrics),
            control: Some(control),
            challenger: Some(challenger),
        })
    }
}
