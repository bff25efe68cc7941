use super::adapter::{ActiveOrPair, OutcomeSource, VersionStore};
use crate::errors::{Result, RolloutError};
use crate::model::{
    content_digest, AbStatus, NewVersion, OutcomeResult, PromptVersion, Scope, SplitPercent,
    TaskOutcome, DEFAULT_AUTHOR,
};
use crate::state::ScopeState;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const VERSION_COLUMNS: &str = "id, role, model, version, content, content_sha256, change_summary,
    parent_version_id, created_by, active, created_at, ab_status, ab_split_percent,
    ab_started_at, ab_min_tasks";

/// SQLite-backed version store.
///
/// Every scope write runs in a `BEGIN IMMEDIATE` transaction, which takes the
/// database write lock up front. That serializes writers across connections
/// and processes, not just across threads sharing this handle.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

pub struct StoreStats {
    pub versions: Option<u64>,
    pub scopes: Option<u64>,
    pub outcomes: Option<u64>,
    pub running_tests: Option<u64>,
    pub version: Option<String>,
}

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock();
        conn.execute_batch(crate::storage::schema::DDL)
            .context("failed to apply schema")?;

        let current: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if current < crate::storage::schema::SCHEMA_VERSION {
            conn.pragma_update(None, "user_version", crate::storage::schema::SCHEMA_VERSION)?;
        }
        Ok(())
    }

    pub fn set_busy_timeout(&self, ms: u64) -> anyhow::Result<()> {
        self.lock().busy_timeout(Duration::from_millis(ms))?;
        Ok(())
    }

    // A panic mid-transaction drops the transaction, which rolls it back, so
    // the connection behind a poisoned lock is still consistent.
    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends one outcome to the log. The version must exist.
    pub fn record_outcome(&self, outcome: &TaskOutcome) -> Result<()> {
        if !outcome.confidence.is_finite() || !(0.0..=1.0).contains(&outcome.confidence) {
            return Err(RolloutError::validation(format!(
                "confidence must be within 0..=1 (got {})",
                outcome.confidence
            )));
        }

        let duration_ms = sql_counter("duration_ms", outcome.duration_ms)?;
        let tokens = sql_counter("tokens", outcome.tokens)?;

        let conn = self.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM prompt_versions WHERE id = ?1",
                params![outcome.version_id],
                |r| r.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(RolloutError::not_found(format!(
                "prompt version {}",
                outcome.version_id
            )));
        }

        conn.execute(
            "INSERT INTO task_outcomes(version_id, result, confidence, duration_ms, tokens, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                outcome.version_id,
                outcome.result,
                outcome.confidence,
                duration_ms,
                tokens,
                Utc::now(),
            ],
        )?;
        Ok(())
    }

    pub fn stats_best_effort(&self) -> anyhow::Result<StoreStats> {
        let conn = self.lock();

        let count = |sql: &str| -> Option<u64> {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0).map(|x| x as u64))
                .ok()
        };

        let versions = count("SELECT COUNT(*) FROM prompt_versions");
        let scopes = count(
            "SELECT COUNT(*) FROM (SELECT DISTINCT role, IFNULL(model, '') FROM prompt_versions)",
        );
        let outcomes = count("SELECT COUNT(*) FROM task_outcomes");
        let running_tests =
            count("SELECT COUNT(*) FROM prompt_versions WHERE ab_status = 'challenger'");

        let v_str: Option<String> = conn
            .query_row("PRAGMA user_version", [], |r| r.get(0))
            .ok()
            .map(|v: i64| v.to_string());

        Ok(StoreStats {
            versions,
            scopes,
            outcomes,
            running_tests,
            version: v_str,
        })
    }
}

impl VersionStore for Store {
    fn create(&self, req: &NewVersion) -> Result<PromptVersion> {
        let scope = req.validate()?;

        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Parenthood is write-once and the parent must already exist, so the
        // lineage relation can never close a cycle.
        let parent = match &req.parent_version_id {
            Some(pid) => {
                let parent = get_version(&tx, pid)?
                    .ok_or_else(|| RolloutError::not_found(format!("parent version {pid}")))?;
                if parent.scope() != scope {
                    return Err(RolloutError::validation(format!(
                        "parent version {} belongs to scope {}, not {}",
                        pid,
                        parent.scope(),
                        scope
                    )));
                }
                Some(parent)
            }
            None => None,
        };

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(version), 0) + 1 FROM prompt_versions
             WHERE role = ?1 AND model IS ?2",
            params![scope.role, scope.model],
            |r| r.get(0),
        )?;

        // A scope that holds versions always serves one of them.
        let activate = load_scope(&tx, &scope)?.is_none();

        let version = PromptVersion {
            id: uuid::Uuid::new_v4().to_string(),
            role: scope.role.clone(),
            model: scope.model.clone(),
            version: next,
            content: req.content.clone(),
            content_sha256: content_digest(&req.content),
            change_summary: req.change_summary.clone(),
            parent_version_id: parent.as_ref().map(|p| p.id.clone()),
            created_by: req
                .created_by
                .clone()
                .filter(|a| !a.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_AUTHOR.to_string()),
            active: activate,
            created_at: Utc::now(),
            ab_status: AbStatus::None,
            ab_split_percent: None,
            ab_started_at: None,
            ab_min_tasks: None,
        };

        tx.execute(
            "INSERT INTO prompt_versions(
                id, role, model, version, content, content_sha256, change_summary,
                parent_version_id, created_by, active, created_at, ab_status
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                version.id,
                version.role,
                version.model,
                version.version,
                version.content,
                version.content_sha256,
                version.change_summary,
                version.parent_version_id,
                version.created_by,
                version.active,
                version.created_at,
                version.ab_status,
            ],
        )?;
        tx.commit()?;

        tracing::info!(
            event = "version_created",
            id = %version.id,
            scope = %scope,
            version = version.version,
            parent = ?version.parent_version_id,
            active = version.active,
        );
        if parent.is_some_and(|p| p.content_sha256 == version.content_sha256) {
            tracing::warn!(
                event = "version_content_unchanged",
                id = %version.id,
                scope = %scope,
                "new version has the same content as its parent"
            );
        }

        Ok(version)
    }

    fn get(&self, id: &str) -> Result<Option<PromptVersion>> {
        let conn = self.lock();
        get_version(&conn, id)
    }

    fn list_by_scope(&self, scope: &Scope) -> Result<Vec<PromptVersion>> {
        let conn = self.lock();
        list_scope(&conn, scope)
    }

    fn active_or_pair(&self, scope: &Scope) -> Result<Option<ActiveOrPair>> {
        let conn = self.lock();
        load_scope(&conn, scope)
    }

    fn transition(
        &self,
        scope: &Scope,
        f: &dyn Fn(Option<&ScopeState>) -> Result<ScopeState>,
    ) -> Result<ScopeState> {
        let mut conn = self.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current = load_scope(&tx, scope)?
            .map(|s| s.state())
            .transpose()?;
        let next = f(current.as_ref())?;
        write_scope_state(&tx, scope, &next)?;

        tx.commit()?;
        Ok(next)
    }
}

impl OutcomeSource for Store {
    fn outcomes_for(
        &self,
        version_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<TaskOutcome>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT version_id, result, confidence, duration_ms, tokens, recorded_at
             FROM task_outcomes
             WHERE version_id = ?1
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map(params![version_id], |row| {
            let recorded_at: DateTime<Utc> = row.get(5)?;
            Ok((
                recorded_at,
                TaskOutcome {
                    version_id: row.get(0)?,
                    result: row.get(1)?,
                    confidence: row.get(2)?,
                    duration_ms: row.get::<_, Option<i64>>(3)?.map(|v| v as u64),
                    tokens: row.get::<_, Option<i64>>(4)?.map(|v| v as u64),
                },
            ))
        })?;

        let mut out = Vec::new();
        for r in rows {
            let (recorded_at, outcome) = r?;
            if since.is_none_or(|s| recorded_at >= s) {
                out.push(outcome);
            }
        }
        Ok(out)
    }
}

/// SQLite integers are signed; larger counters are rejected, not wrapped.
fn sql_counter(field: &str, value: Option<u64>) -> Result<Option<i64>> {
    value
        .map(|v| {
            i64::try_from(v).map_err(|_| {
                RolloutError::validation(format!("{field} must be at most {} (got {v})", i64::MAX))
            })
        })
        .transpose()
}

fn get_version(conn: &Connection, id: &str) -> Result<Option<PromptVersion>> {
    let sql = format!("SELECT {VERSION_COLUMNS} FROM prompt_versions WHERE id = ?1");
    Ok(conn
        .query_row(&sql, params![id], row_to_version)
        .optional()?)
}

fn list_scope(conn: &Connection, scope: &Scope) -> Result<Vec<PromptVersion>> {
    let sql = format!(
        "SELECT {VERSION_COLUMNS} FROM prompt_versions
         WHERE role = ?1 AND model IS ?2
         ORDER BY version ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![scope.role, scope.model], row_to_version)?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn load_scope(conn: &Connection, scope: &Scope) -> Result<Option<ActiveOrPair>> {
    ActiveOrPair::from_versions(scope, list_scope(conn, scope)?)
}

fn write_scope_state(conn: &Connection, scope: &Scope, state: &ScopeState) -> Result<()> {
    // Clear first: the partial unique indexes are checked per statement.
    conn.execute(
        "UPDATE prompt_versions
         SET active = 0, ab_status = 'none', ab_split_percent = NULL,
             ab_started_at = NULL, ab_min_tasks = NULL
         WHERE role = ?1 AND model IS ?2",
        params![scope.role, scope.model],
    )?;

    match state {
        ScopeState::Stable { active_id } => {
            let n = conn.execute(
                "UPDATE prompt_versions SET active = 1
                 WHERE id = ?1 AND role = ?2 AND model IS ?3",
                params![active_id, scope.role, scope.model],
            )?;
            expect_one(n, active_id, scope)
        }
        ScopeState::Testing(t) => {
            for (id, status, active) in [
                (&t.control_id, AbStatus::Control, true),
                (&t.challenger_id, AbStatus::Challenger, false),
            ] {
                let n = conn.execute(
                    "UPDATE prompt_versions
                     SET active = ?1, ab_status = ?2, ab_split_percent = ?3,
                         ab_started_at = ?4, ab_min_tasks = ?5
                     WHERE id = ?6 AND role = ?7 AND model IS ?8",
                    params![
                        active,
                        status,
                        t.split_percent,
                        t.started_at,
                        t.min_tasks,
                        id,
                        scope.role,
                        scope.model
                    ],
                )?;
                expect_one(n, id, scope)?;
            }
            Ok(())
        }
    }
}

fn expect_one(changed: usize, id: &str, scope: &Scope) -> Result<()> {
    if changed == 1 {
        Ok(())
    } else {
        Err(RolloutError::not_found(format!(
            "prompt version {id} in scope {scope}"
        )))
    }
}

fn row_to_version(row: &Row) -> rusqlite::Result<PromptVersion> {
    Ok(PromptVersion {
        id: row.get(0)?,
        role: row.get(1)?,
        model: row.get(2)?,
        version: row.get(3)?,
        content: row.get(4)?,
        content_sha256: row.get(5)?,
        change_summary: row.get(6)?,
        parent_version_id: row.get(7)?,
        created_by: row.get(8)?,
        active: row.get(9)?,
        created_at: row.get(10)?,
        ab_status: row.get(11)?,
        ab_split_percent: row.get(12)?,
        ab_started_at: row.get(13)?,
        ab_min_tasks: row.get(14)?,
    })
}

impl ToSql for AbStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for AbStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        AbStatus::parse(s).ok_or_else(|| FromSqlError::Other(format!("unknown ab_status '{s}'").into()))
    }
}

impl ToSql for OutcomeResult {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for OutcomeResult {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        OutcomeResult::parse(s)
            .ok_or_else(|| FromSqlError::Other(format!("unknown outcome result '{s}'").into()))
    }
}

impl ToSql for SplitPercent {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(i64::from(self.get())))
    }
}

impl FromSql for SplitPercent {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let v = value.as_i64()?;
        u8::try_from(v)
            .ok()
            .and_then(|p| SplitPercent::new(p).ok())
            .ok_or(FromSqlError::OutOfRange(v))
    }
}
