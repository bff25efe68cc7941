use crate::errors::{Result, RolloutError};
use crate::model::{AbStatus, NewVersion, PromptVersion, Scope, TaskOutcome};
use crate::state::{self, AbTest, ScopeState};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// What a scope currently serves.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ActiveOrPair {
    Active(PromptVersion),
    Pair {
        control: PromptVersion,
        challenger: PromptVersion,
    },
}

impl ActiveOrPair {
    /// Classifies a scope snapshot, rejecting anything that breaks the
    /// single-active and paired-test invariants.
    pub fn from_versions(scope: &Scope, versions: Vec<PromptVersion>) -> Result<Option<Self>> {
        let mut active = Vec::new();
        let mut controls = Vec::new();
        let mut challengers = Vec::new();

        for v in versions {
            match v.ab_status {
                AbStatus::Control => controls.push(v),
                AbStatus::Challenger => challengers.push(v),
                AbStatus::None if v.active => active.push(v),
                AbStatus::None => {}
            }
        }

        match (controls.pop(), challengers.pop()) {
            (None, None) => match (active.pop(), active.len()) {
                (None, _) => Ok(None),
                (Some(v), 0) => Ok(Some(ActiveOrPair::Active(v))),
                (Some(_), n) => Err(RolloutError::integrity(format!(
                    "{} active versions in scope {}",
                    n + 1,
                    scope
                ))),
            },
            (Some(control), Some(challenger)) => {
                if !controls.is_empty() || !challengers.is_empty() {
                    return Err(RolloutError::integrity(format!(
                        "more than one A/B pair in scope {scope}"
                    )));
                }
                if !active.is_empty() {
                    return Err(RolloutError::integrity(format!(
                        "stable active version alongside a running test in scope {scope}"
                    )));
                }
                if challenger.ab_split_percent.is_none()
                    || control.ab_split_percent != challenger.ab_split_percent
                {
                    return Err(RolloutError::integrity(format!(
                        "A/B pair in scope {scope} has no common split_percent"
                    )));
                }
                Ok(Some(ActiveOrPair::Pair {
                    control,
                    challenger,
                }))
            }
            (c, ch) => Err(RolloutError::integrity(format!(
                "unbalanced A/B pair in scope {}: control={}, challenger={}",
                scope,
                c.map(|v| v.id).unwrap_or_else(|| "-".into()),
                ch.map(|v| v.id).unwrap_or_else(|| "-".into()),
            ))),
        }
    }

    pub fn state(&self) -> Result<ScopeState> {
        match self {
            ActiveOrPair::Active(v) => Ok(ScopeState::Stable {
                active_id: v.id.clone(),
            }),
            ActiveOrPair::Pair {
                control,
                challenger,
            } => {
                let split_percent = challenger.ab_split_percent.ok_or_else(|| {
                    RolloutError::integrity("challenger has no split_percent")
                })?;
                let started_at = challenger
                    .ab_started_at
                    .or(control.ab_started_at)
                    .ok_or_else(|| RolloutError::integrity("A/B pair has no start time"))?;
                Ok(ScopeState::Testing(AbTest {
                    control_id: control.id.clone(),
                    challenger_id: challenger.id.clone(),
                    split_percent,
                    started_at,
                    min_tasks: challenger.ab_min_tasks.or(control.ab_min_tasks),
                }))
            }
        }
    }
}

/// The narrow contract the registry needs from durable storage.
///
/// Implementations must serialize writes per scope: `transition` reads the
/// scope state, applies the supplied pure function and writes the result
/// without any other writer interleaving.
pub trait VersionStore: Send + Sync {
    fn create(&self, req: &NewVersion) -> Result<PromptVersion>;

    fn get(&self, id: &str) -> Result<Option<PromptVersion>>;

    fn list_by_scope(&self, scope: &Scope) -> Result<Vec<PromptVersion>>;

    fn active_or_pair(&self, scope: &Scope) -> Result<Option<ActiveOrPair>>;

    fn transition(
        &self,
        scope: &Scope,
        f: &dyn Fn(Option<&ScopeState>) -> Result<ScopeState>,
    ) -> Result<ScopeState>;

    /// Makes `id` the only active version of its scope and ends any test there.
    fn set_active(&self, id: &str) -> Result<()> {
        let version = self
            .get(id)?
            .ok_or_else(|| RolloutError::not_found(format!("prompt version {id}")))?;
        self.transition(&version.scope(), &|current| Ok(state::activate(current, id)))?;
        Ok(())
    }
}

/// Source of already-attributed task outcomes.
pub trait OutcomeSource: Send + Sync {
    fn outcomes_for(
        &self,
        version_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TaskOutcome>>;
}
