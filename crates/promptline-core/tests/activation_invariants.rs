use promptline_core::model::{AbStatus, NewVersion};
use promptline_core::state::Decision;
use promptline_core::storage::Store;
use promptline_core::{PromptRegistry, RolloutError};

fn registry() -> PromptRegistry<Store> {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    PromptRegistry::new(store)
}

fn counts(reg: &PromptRegistry<Store>, role: &str, model: Option<&str>) -> (usize, usize, usize) {
    let versions = reg.list_versions(role, model).unwrap();
    let active = versions.iter().filter(|v| v.active).count();
    let control = versions
        .iter()
        .filter(|v| v.ab_status == AbStatus::Control)
        .count();
    let challenger = versions
        .iter()
        .filter(|v| v.ab_status == AbStatus::Challenger)
        .count();
    (active, control, challenger)
}

#[test]
fn test_first_version_becomes_active() {
    let reg = registry();
    let v1 = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    assert!(v1.active);
    let v2 = reg.create_version(NewVersion::new("dev", "p2")).unwrap();
    assert!(!v2.active);
    assert_eq!(counts(&reg, "dev", None), (1, 0, 0));
}

#[test]
fn test_version_numbers_are_per_scope() {
    let reg = registry();
    let a1 = reg.create_version(NewVersion::new("dev", "a")).unwrap();
    let b1 = reg.create_version(NewVersion::new("dev", "b").model("kimi")).unwrap();
    let a2 = reg.create_version(NewVersion::new("dev", "a2")).unwrap();
    let c1 = reg.create_version(NewVersion::new("qa", "c")).unwrap();

    assert_eq!((a1.version, a2.version), (1, 2));
    assert_eq!(b1.version, 1);
    assert_eq!(c1.version, 1);

    // Each scope has its own active version.
    assert!(b1.active && c1.active);
    assert_eq!(counts(&reg, "dev", None), (1, 0, 0));
    assert_eq!(counts(&reg, "dev", Some("kimi")), (1, 0, 0));
}

#[test]
fn test_activation_is_mutually_exclusive() {
    let reg = registry();
    let v1 = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    let v2 = reg.create_version(NewVersion::new("dev", "p2")).unwrap();
    let v3 = reg.create_version(NewVersion::new("dev", "p3")).unwrap();

    reg.start_ab_test(&v2.id, Some(30), Some(10)).unwrap();
    assert_eq!(counts(&reg, "dev", None), (1, 1, 1));

    reg.activate_version(&v3.id).unwrap();
    let activated = reg.activate_version(&v1.id).unwrap();
    assert!(activated.active);

    let versions = reg.list_versions("dev", None).unwrap();
    let active: Vec<_> = versions.iter().filter(|v| v.active).map(|v| &v.id).collect();
    assert_eq!(active, vec![&v1.id]);
    for v in &versions {
        assert_eq!(v.ab_status, AbStatus::None);
        assert_eq!(v.ab_split_percent, None);
        assert_eq!(v.ab_started_at, None);
        assert_eq!(v.ab_min_tasks, None);
    }
}

#[test]
fn test_activate_unknown_id_is_not_found() {
    let reg = registry();
    reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    let err = reg.activate_version("does-not-exist").unwrap_err();
    assert!(matches!(err, RolloutError::NotFound(_)));
    assert!(!err.is_retryable());
    assert_eq!(counts(&reg, "dev", None), (1, 0, 0));
}

#[test]
fn test_create_validation() {
    let reg = registry();
    let err = reg.create_version(NewVersion::new("", "p1")).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));
    let err = reg.create_version(NewVersion::new("dev", "   ")).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));
    assert!(reg.list_versions("dev", None).unwrap().is_empty());
}

#[test]
fn test_lineage_requires_existing_parent_in_scope() {
    let reg = registry();
    let root = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    let child = reg
        .create_version(NewVersion::new("dev", "p2").parent(&root.id))
        .unwrap();
    let grandchild = reg
        .create_version(NewVersion::new("dev", "p3").parent(&child.id))
        .unwrap();

    let chain: Vec<_> = reg
        .lineage(&grandchild.id)
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(chain, vec![3, 2, 1]);

    let err = reg
        .create_version(NewVersion::new("dev", "p4").parent("not-yet-created"))
        .unwrap_err();
    assert!(matches!(err, RolloutError::NotFound(_)));

    let err = reg
        .create_version(NewVersion::new("dev", "p4").model("kimi").parent(&root.id))
        .unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    // Rejected creations do not consume version numbers or records.
    assert_eq!(reg.list_versions("dev", None).unwrap().len(), 3);
    assert!(reg.list_versions("dev", Some("kimi")).unwrap().is_empty());
}

#[test]
fn test_start_test_validation() {
    let reg = registry();
    let v1 = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    let v2 = reg.create_version(NewVersion::new("dev", "p2")).unwrap();
    let other = reg.create_version(NewVersion::new("qa", "q1")).unwrap();

    let err = reg.start_ab_test(&v2.id, None, None).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(ref m) if m.contains("split_percent")));

    let err = reg.start_ab_test(&v2.id, Some(101), None).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    let err = reg.start_ab_test(&v1.id, Some(20), None).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    let err = reg.start_ab_test("missing", Some(20), None).unwrap_err();
    assert!(matches!(err, RolloutError::NotFound(_)));

    reg.start_ab_test(&v2.id, Some(20), None).unwrap();
    let v3 = reg.create_version(NewVersion::new("dev", "p3")).unwrap();
    let err = reg.start_ab_test(&v3.id, Some(20), None).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(ref m) if m.contains("already running")));

    // Other scopes are unaffected.
    assert_eq!(counts(&reg, "qa", None), (1, 0, 0));
    assert!(reg.get_version(&other.id).unwrap().active);
}

#[test]
fn test_conclude_promote_and_rollback() {
    let reg = registry();
    let v1 = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    let v2 = reg.create_version(NewVersion::new("dev", "p2")).unwrap();

    let err = reg.conclude_ab_test("dev", None, Decision::Promote).unwrap_err();
    assert!(matches!(err, RolloutError::Validation(_)));

    reg.start_ab_test(&v2.id, Some(50), None).unwrap();
    let state = reg.conclude_ab_test("dev", None, Decision::Rollback).unwrap();
    assert_eq!(state.serving_id(), v1.id);
    assert_eq!(counts(&reg, "dev", None), (1, 0, 0));
    assert!(reg.get_version(&v1.id).unwrap().active);

    reg.start_ab_test(&v2.id, Some(50), None).unwrap();
    let state = reg.conclude_ab_test("dev", None, Decision::Promote).unwrap();
    assert_eq!(state.serving_id(), v2.id);
    assert_eq!(counts(&reg, "dev", None), (1, 0, 0));
    assert!(reg.get_version(&v2.id).unwrap().active);
    assert!(!reg.get_version(&v1.id).unwrap().active);
}

#[test]
fn test_default_min_tasks_from_settings() {
    let store = Store::memory().unwrap();
    store.init_schema().unwrap();
    let settings = promptline_core::config::Settings {
        default_min_tasks: Some(100),
        default_author: "release-bot".into(),
        ..Default::default()
    };
    let reg = PromptRegistry::with_settings(store, &settings);

    let v1 = reg.create_version(NewVersion::new("dev", "p1")).unwrap();
    assert_eq!(v1.created_by, "release-bot");
    let v2 = reg.create_version(NewVersion::new("dev", "p2")).unwrap();
    let state = reg.start_ab_test(&v2.id, Some(10), None).unwrap();
    assert_eq!(state.ab_test().unwrap().min_tasks, Some(100));
}
