//! Per-scope activation state and its transitions.
//!
//! A scope is either stable (one active version) or testing (a control and a
//! challenger). The store reads and writes this value as a unit, so the
//! transitions below never see or produce a half-applied flip.

use crate::errors::{Result, RolloutError};
use crate::model::SplitPercent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum ScopeState {
    Stable { active_id: String },
    Testing(AbTest),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbTest {
    pub control_id: String,
    pub challenger_id: String,
    pub split_percent: SplitPercent,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tasks: Option<u32>,
}

/// How a running test ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// Challenger becomes the active version.
    Promote,
    /// Control stays active.
    Rollback,
}

/// Request to put a challenger against the scope's current active version.
#[derive(Debug, Clone)]
pub struct StartAbTest {
    pub challenger_id: String,
    pub split_percent: Option<SplitPercent>,
    pub min_tasks: Option<u32>,
    pub started_at: DateTime<Utc>,
}

impl ScopeState {
    /// Version currently treated as trusted: the active one, or the control.
    pub fn serving_id(&self) -> &str {
        match self {
            ScopeState::Stable { active_id } => active_id,
            ScopeState::Testing(t) => &t.control_id,
        }
    }

    pub fn ab_test(&self) -> Option<&AbTest> {
        match self {
            ScopeState::Stable { .. } => None,
            ScopeState::Testing(t) => Some(t),
        }
    }

    pub fn is_testing(&self) -> bool {
        matches!(self, ScopeState::Testing(_))
    }
}

/// Activating any version ends whatever the scope was doing.
pub fn activate(_current: Option<&ScopeState>, id: &str) -> ScopeState {
    ScopeState::Stable {
        active_id: id.to_string(),
    }
}

pub fn start_test(current: Option<&ScopeState>, req: &StartAbTest) -> Result<ScopeState> {
    let split_percent = req.split_percent.ok_or_else(|| {
        RolloutError::validation("split_percent is required to start an A/B test")
    })?;

    match current {
        None => Err(RolloutError::validation(
            "scope has no active version to use as control",
        )),
        Some(ScopeState::Testing(t)) => Err(RolloutError::validation(format!(
            "an A/B test is already running (control {}, challenger {})",
            t.control_id, t.challenger_id
        ))),
        Some(ScopeState::Stable { active_id }) => {
            if *active_id == req.challenger_id {
                return Err(RolloutError::validation(
                    "challenger must differ from the active version",
                ));
            }
            Ok(ScopeState::Testing(AbTest {
                control_id: active_id.clone(),
                challenger_id: req.challenger_id.clone(),
                split_percent,
                started_at: req.started_at,
                min_tasks: req.min_tasks,
            }))
        }
    }
}

pub fn conclude_test(current: Option<&ScopeState>, decision: Decision) -> Result<ScopeState> {
    match current {
        Some(ScopeState::Testing(t)) => {
            let winner = match decision {
                Decision::Promote => &t.challenger_id,
                Decision::Rollback => &t.control_id,
            };
            Ok(ScopeState::Stable {
                active_id: winner.clone(),
            })
        }
        _ => Err(RolloutError::validation("no A/B test is running for this scope")),
    }
}
