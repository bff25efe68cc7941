use crate::errors::{Result, RolloutError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub const DEFAULT_AUTHOR: &str = "system";

/// The (role, model) key of an independent configuration line.
///
/// A blank model is the same scope as an absent one ("all models for this role").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Scope {
    pub fn new(role: impl Into<String>, model: Option<impl Into<String>>) -> Result<Self> {
        let role = role.into().trim().to_string();
        if role.is_empty() {
            return Err(RolloutError::validation("role is required"));
        }
        let model = model
            .map(Into::into)
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());
        Ok(Self { role, model })
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(m) => write!(f, "{}/{}", self.role, m),
            None => write!(f, "{}/*", self.role),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbStatus {
    Control,
    Challenger,
    #[default]
    None,
}

impl AbStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AbStatus::Control => "control",
            AbStatus::Challenger => "challenger",
            AbStatus::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "control" => Some(AbStatus::Control),
            "challenger" => Some(AbStatus::Challenger),
            "none" => Some(AbStatus::None),
            _ => None,
        }
    }
}

/// Branch picked by the resolver while a test is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbVariant {
    Control,
    Challenger,
}

/// Percentage of resolutions routed to the challenger, 0..=100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct SplitPercent(u8);

impl SplitPercent {
    pub const ZERO: SplitPercent = SplitPercent(0);

    pub fn new(value: u8) -> Result<Self> {
        if value > 100 {
            return Err(RolloutError::validation(format!(
                "split_percent must be within 0..=100 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for SplitPercent {
    type Error = RolloutError;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SplitPercent> for u8 {
    fn from(value: SplitPercent) -> Self {
        value.0
    }
}

/// A uniform traffic draw in 0..100, supplied by the caller per resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Sample(u8);

impl Sample {
    pub fn new(value: u8) -> Result<Self> {
        if value >= 100 {
            return Err(RolloutError::validation(format!(
                "sample must be within 0..100 (got {value})"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptVersion {
    pub id: String,
    pub role: String,
    #[serde(default)]
    pub model: Option<String>,
    pub version: i64,
    pub content: String,
    pub content_sha256: String,
    #[serde(default)]
    pub change_summary: Option<String>,
    #[serde(default)]
    pub parent_version_id: Option<String>,
    pub created_by: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub ab_status: AbStatus,
    #[serde(default)]
    pub ab_split_percent: Option<SplitPercent>,
    #[serde(default)]
    pub ab_started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ab_min_tasks: Option<u32>,
}

impl PromptVersion {
    pub fn scope(&self) -> Scope {
        Scope {
            role: self.role.clone(),
            model: self.model.clone(),
        }
    }
}

/// Creation request. Lineage and payload are fixed once the record exists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewVersion {
    pub role: String,
    pub content: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub change_summary: Option<String>,
    #[serde(default)]
    pub parent_version_id: Option<String>,
    #[serde(default)]
    pub created_by: Option<String>,
}

impl NewVersion {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn parent(mut self, parent_version_id: impl Into<String>) -> Self {
        self.parent_version_id = Some(parent_version_id.into());
        self
    }

    pub fn summary(mut self, change_summary: impl Into<String>) -> Self {
        self.change_summary = Some(change_summary.into());
        self
    }

    pub fn author(mut self, created_by: impl Into<String>) -> Self {
        self.created_by = Some(created_by.into());
        self
    }

    /// Checks required fields and returns the normalized scope.
    pub fn validate(&self) -> Result<Scope> {
        let scope = Scope::new(self.role.as_str(), self.model.as_deref())?;
        if self.content.trim().is_empty() {
            return Err(RolloutError::validation("content is required"));
        }
        Ok(scope)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeResult {
    Success,
    Failure,
    Partial,
    Abandoned,
}

impl OutcomeResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeResult::Success => "success",
            OutcomeResult::Failure => "failure",
            OutcomeResult::Partial => "partial",
            OutcomeResult::Abandoned => "abandoned",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(OutcomeResult::Success),
            "failure" => Some(OutcomeResult::Failure),
            "partial" => Some(OutcomeResult::Partial),
            "abandoned" => Some(OutcomeResult::Abandoned),
            _ => None,
        }
    }
}

/// One finished task attributed to a prompt version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub version_id: String,
    pub result: OutcomeResult,
    pub confidence: f64,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub tokens: Option<u64>,
}

impl TaskOutcome {
    pub fn new(version_id: impl Into<String>, result: OutcomeResult, confidence: f64) -> Self {
        Self {
            version_id: version_id.into(),
            result,
            confidence,
            duration_ms: None,
            tokens: None,
        }
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_tokens(mut self, tokens: u64) -> Self {
        self.tokens = Some(tokens);
        self
    }
}

pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}
