use super::{emit, Registry};
use anyhow::Result;
use promptline_core::config::Settings;
use serde::Serialize;

#[derive(Serialize)]
struct StatusReport {
    db: String,
    schema_version: Option<String>,
    versions: Option<u64>,
    scopes: Option<u64>,
    outcomes: Option<u64>,
    running_tests: Option<u64>,
}

pub fn cmd_status(reg: &Registry, settings: &Settings) -> Result<i32> {
    let stats = reg.store().stats_best_effort()?;
    emit(&StatusReport {
        db: settings.db.display().to_string(),
        schema_version: stats.version,
        versions: stats.versions,
        scopes: stats.scopes,
        outcomes: stats.outcomes,
        running_tests: stats.running_tests,
    })
}
