pub const SCHEMA_VERSION: i64 = 1;

pub const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS prompt_versions (
  id TEXT PRIMARY KEY,
  role TEXT NOT NULL,
  model TEXT,
  version INTEGER NOT NULL,
  content TEXT NOT NULL,
  content_sha256 TEXT NOT NULL,
  change_summary TEXT,
  parent_version_id TEXT REFERENCES prompt_versions(id),
  created_by TEXT NOT NULL,
  active INTEGER NOT NULL DEFAULT 0,
  created_at TEXT NOT NULL,
  ab_status TEXT NOT NULL DEFAULT 'none',
  ab_split_percent INTEGER,
  ab_started_at TEXT,
  ab_min_tasks INTEGER
);

CREATE INDEX IF NOT EXISTS idx_prompt_versions_scope
  ON prompt_versions(role, model);

CREATE UNIQUE INDEX IF NOT EXISTS idx_prompt_versions_scope_version
  ON prompt_versions(role, IFNULL(model, ''), version);

CREATE UNIQUE INDEX IF NOT EXISTS idx_prompt_versions_one_active
  ON prompt_versions(role, IFNULL(model, ''))
  WHERE active = 1;

CREATE UNIQUE INDEX IF NOT EXISTS idx_prompt_versions_one_per_leg
  ON prompt_versions(role, IFNULL(model, ''), ab_status)
  WHERE ab_status != 'none';

CREATE TABLE IF NOT EXISTS task_outcomes (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  version_id TEXT NOT NULL REFERENCES prompt_versions(id),
  result TEXT NOT NULL,
  confidence REAL NOT NULL,
  duration_ms INTEGER,
  tokens INTEGER,
  recorded_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_task_outcomes_version
  ON task_outcomes(version_id);
"#;
