use promptline_core::model::{NewVersion, OutcomeResult, Scope, TaskOutcome};
use promptline_core::storage::{OutcomeSource, Store, VersionStore};
use promptline_core::{PromptRegistry, RolloutError};
use tempfile::tempdir;

#[test]
fn test_storage_smoke_lifecycle() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("nested").join("promptline.db");

    // 1. Open store (creates parent dirs) and init schema twice (idempotent)
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    store.init_schema()?;

    // 2. Create a lineage of two versions
    let v1 = store.create(&NewVersion::new("reviewer", "Review the diff.").model("kimi"))?;
    let v2 = store.create(
        &NewVersion::new("reviewer", "Review the diff. Be terse.")
            .model("kimi")
            .parent(&v1.id)
            .summary("shorter answers")
            .author("ops"),
    )?;
    assert_eq!(v1.version, 1);
    assert_eq!(v2.version, 2);
    assert_eq!(v1.created_by, "system");
    assert_eq!(v2.created_by, "ops");
    assert_eq!(v2.parent_version_id.as_deref(), Some(v1.id.as_str()));

    store.record_outcome(&TaskOutcome::new(&v1.id, OutcomeResult::Success, 0.9).with_duration(120))?;
    drop(store);

    // 3. Reopen and read back
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    let scope = Scope::new("reviewer", Some("kimi"))?;
    let listed = store.list_by_scope(&scope)?;
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].id, v1.id);
    assert_eq!(listed[1].content, "Review the diff. Be terse.");
    assert_eq!(listed[1].change_summary.as_deref(), Some("shorter answers"));
    assert_eq!(listed[0].content_sha256, v1.content_sha256);
    assert_eq!(listed[0].created_at, v1.created_at);

    let outcomes = store.outcomes_for(&v1.id, None)?;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].duration_ms, Some(120));

    // 4. Verify via raw SQL
    let conn = rusqlite::Connection::open(&db_path)?;
    let count: i64 = conn.query_row("SELECT count(*) FROM prompt_versions", [], |r| r.get(0))?;
    assert_eq!(count, 2);
    let user_version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
    assert_eq!(user_version, 1);

    let stats = store.stats_best_effort()?;
    assert_eq!(stats.versions, Some(2));
    assert_eq!(stats.scopes, Some(1));
    assert_eq!(stats.outcomes, Some(1));
    assert_eq!(stats.running_tests, Some(0));
    assert_eq!(stats.version.as_deref(), Some("1"));

    Ok(())
}

#[test]
fn test_outcome_validation() -> anyhow::Result<()> {
    let store = Store::memory()?;
    store.init_schema()?;
    let v1 = store.create(&NewVersion::new("dev", "p1"))?;

    let err = store
        .record_outcome(&TaskOutcome::new("missing", OutcomeResult::Success, 0.5))
        .unwrap_err();
    assert!(matches!(err, RolloutError::NotFound(_)));

    let err = store
        .record_outcome(&TaskOutcome::new(&v1.id, OutcomeResult::Success, 1.5))
        .unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    let err = store
        .record_outcome(&TaskOutcome::new(&v1.id, OutcomeResult::Success, f64::NAN))
        .unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    let err = store
        .record_outcome(
            &TaskOutcome::new(&v1.id, OutcomeResult::Success, 0.5).with_tokens(u64::MAX),
        )
        .unwrap_err();
    assert!(matches!(err, RolloutError::Validation(ref m) if m.contains("tokens")));

    let err = store
        .record_outcome(
            &TaskOutcome::new(&v1.id, OutcomeResult::Success, 0.5)
                .with_duration(i64::MAX as u64 + 1),
        )
        .unwrap_err();
    assert!(matches!(err, RolloutError::Validation(ref m) if m.contains("duration_ms")));

    // Rejected outcomes leave nothing behind.
    assert!(store.outcomes_for(&v1.id, None)?.is_empty());

    Ok(())
}

#[test]
fn test_partial_indexes_reject_second_active_row() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("p.db");
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    store.create(&NewVersion::new("dev", "p1"))?;
    store.create(&NewVersion::new("dev", "p2"))?;

    // Writing around the adapter still cannot produce two active rows.
    let conn = rusqlite::Connection::open(&db_path)?;
    let res = conn.execute(
        "UPDATE prompt_versions SET active = 1 WHERE role = 'dev' AND version = 2",
        [],
    );
    assert!(res.is_err());
    Ok(())
}

#[test]
fn test_uninitialized_store_reports_unavailable() -> anyhow::Result<()> {
    let store = Store::memory()?;
    let err = store.create(&NewVersion::new("dev", "p1")).unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.code(), "E_STORE_UNAVAILABLE");
    Ok(())
}

#[test]
fn test_lineage_reports_corrupt_parent_links() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("p.db");
    let store = Store::open(&db_path)?;
    store.init_schema()?;
    let reg = PromptRegistry::new(store);

    let v1 = reg.create_version(NewVersion::new("dev", "p1"))?;
    let v2 = reg.create_version(NewVersion::new("dev", "p2").parent(&v1.id))?;
    let v3 = reg.create_version(NewVersion::new("dev", "p3"))?;

    let conn = rusqlite::Connection::open(&db_path)?;
    conn.execute_batch("PRAGMA foreign_keys = OFF")?;

    // v1 -> v2 -> v1
    conn.execute(
        "UPDATE prompt_versions SET parent_version_id = ?1 WHERE id = ?2",
        rusqlite::params![v2.id, v1.id],
    )?;
    let err = reg.lineage(&v2.id).unwrap_err();
    assert!(matches!(err, RolloutError::Integrity(ref m) if m.contains("revisits")));
    assert_eq!(err.code(), "E_INTEGRITY");
    assert!(!err.is_retryable());

    // Self-parent.
    conn.execute(
        "UPDATE prompt_versions SET parent_version_id = id WHERE id = ?1",
        rusqlite::params![v3.id],
    )?;
    let err = reg.lineage(&v3.id).unwrap_err();
    assert!(matches!(err, RolloutError::Integrity(_)));

    // Dangling parent.
    conn.execute(
        "UPDATE prompt_versions SET parent_version_id = 'gone' WHERE id = ?1",
        rusqlite::params![v1.id],
    )?;
    let err = reg.lineage(&v2.id).unwrap_err();
    assert!(matches!(err, RolloutError::Integrity(ref m) if m.contains("missing gone")));

    Ok(())
}
