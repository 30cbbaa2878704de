use embargo_ledger::core::error::LedgerError;
use embargo_ledger::plugins::policy::{
    DatasetTypePolicy, PolicyError, PolicyTable, RetentionPeriod, load_policy_file,
};
use embargo_ledger::plugins::prompt_outputs::{EMBARGO_PERIOD_HOURS, prompt_processing_outputs};
use std::fs;
use std::num::NonZeroU32;
use tempfile::tempdir;

fn days(n: u32) -> RetentionPeriod {
    RetentionPeriod::Days(NonZeroU32::new(n).unwrap())
}

fn sample_table() -> PolicyTable {
    PolicyTable::new([
        ("calexp", DatasetTypePolicy::new(80, true, RetentionPeriod::Forever)),
        ("src", DatasetTypePolicy::new(0, true, days(30))),
        ("diff", DatasetTypePolicy::new(80, true, days(30))),
        ("apdb_marker", DatasetTypePolicy::new(0, false, days(30))),
    ])
}

#[test]
fn test_group_by_partitions_and_sorts() {
    let table = sample_table();

    let by_embargo = table.group_by(|p| p.embargo_hours);
    assert_eq!(by_embargo.len(), 2);
    assert_eq!(by_embargo[0].key, 0);
    assert_eq!(by_embargo[0].dataset_types, vec!["apdb_marker", "src"]);
    assert_eq!(by_embargo[1].key, 80);
    assert_eq!(by_embargo[1].dataset_types, vec!["calexp", "diff"]);

    let by_public = table.group_by(|p| p.public);
    assert_eq!(by_public.len(), 2);
    assert!(!by_public[0].key);
    assert_eq!(by_public[0].dataset_types, vec!["apdb_marker"]);
    assert!(by_public[1].key);
    assert_eq!(by_public[1].dataset_types, vec!["calexp", "diff", "src"]);
}

#[test]
fn test_group_by_is_deterministic() {
    let forward = sample_table();
    let reversed = PolicyTable::new(
        sample_table()
            .iter()
            .map(|(name, policy)| (name.to_string(), *policy))
            .collect::<Vec<_>>()
            .into_iter()
            .rev(),
    );
    assert_eq!(
        forward.group_by(|p| (p.embargo_hours, p.public)),
        reversed.group_by(|p| (p.embargo_hours, p.public))
    );
}

#[test]
fn test_group_by_empty_table() {
    let table = PolicyTable::default();
    assert!(table.is_empty());
    assert!(table.group_by(|p| p.embargo_hours).is_empty());
}

#[test]
fn test_check_known_reports_first_unknown_type() {
    let table = sample_table();
    assert!(table.check_known(["calexp", "src"]).is_ok());
    assert_eq!(
        table.check_known(["calexp", "mystery", "other"]),
        Err(PolicyError::UnknownDatasetType("mystery".to_string()))
    );
}

#[test]
fn test_load_policy_file_with_tiers() {
    let tmp = tempdir().unwrap();
    let path = tmp.path().join("policy.toml");
    fs::write(
        &path,
        r#"
[tiers.pixel]
embargo_hours = 80
public = true
retention_days = "forever"

[tiers.internal]
embargo_hours = 0
public = false
retention_days = 30

[dataset_types]
preliminary_visit_image = "pixel"
dia_source_schema = "internal"
"#,
    )
    .unwrap();

    let table = load_policy_file(&path).unwrap();
    assert_eq!(table.len(), 2);
    assert_eq!(
        table.get("preliminary_visit_image"),
        Some(&DatasetTypePolicy::new(80, true, RetentionPeriod::Forever))
    );
    assert_eq!(
        table.get("dia_source_schema"),
        Some(&DatasetTypePolicy::new(0, false, days(30)))
    );
}

#[test]
fn test_policy_file_with_undefined_tier_is_rejected() {
    let err = PolicyTable::from_toml_str("[dataset_types]\ncalexp = \"tier9\"\n").unwrap_err();
    match err {
        LedgerError::PolicyError(PolicyError::UnknownTier { dataset_type, tier }) => {
            assert_eq!(dataset_type, "calexp");
            assert_eq!(tier, "tier9");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_prompt_processing_outputs() {
    let table = prompt_processing_outputs();
    assert!(!table.is_empty());

    let visit_image = table.require("preliminary_visit_image").unwrap();
    assert_eq!(visit_image.embargo_hours, EMBARGO_PERIOD_HOURS);
    assert!(visit_image.public);
    assert_eq!(visit_image.retention, RetentionPeriod::Forever);

    let region = table.require("regionTimeInfo").unwrap();
    assert_eq!(region.embargo_hours, 0);
    assert!(region.public);

    let internal = table.require("dia_source_schema").unwrap();
    assert!(!internal.public);

    // Only two embargo periods are in use.
    let keys: Vec<u32> = table
        .group_by(|p| p.embargo_hours)
        .into_iter()
        .map(|g| g.key)
        .collect();
    assert_eq!(keys, vec![0, EMBARGO_PERIOD_HOURS]);
}
