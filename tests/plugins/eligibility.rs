use chrono::{DateTime, Duration, TimeZone, Utc};
use embargo_ledger::core::error::LedgerError;
use embargo_ledger::core::ledger::Ledger;
use embargo_ledger::core::model::{DatasetLocationStatus, DatasetOrigin, Hop, RepositoryRole};
use embargo_ledger::plugins::eligibility::{find_publication_candidates, find_release_candidates};
use embargo_ledger::plugins::ingest::register_embargo_datasets;
use embargo_ledger::plugins::policy::{DatasetTypePolicy, PolicyError, PolicyTable, RetentionPeriod};
use embargo_ledger::store::manifest::{Manifest, ManifestDataset, ManifestVisit};
use embargo_ledger::store::{DataIdValue, DatasetStore, ManifestStore, Timespan};
use rusqlite::params;
use std::collections::BTreeMap;
use tempfile::{TempDir, tempdir};
use uuid::Uuid;

const TIMED_VISIT: i64 = 2025120200439;
const UNTIMED_VISIT: i64 = 2025120200440;

fn visit_end() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 12, 3, 7, 59, 1).unwrap() + Duration::milliseconds(355)
}

fn policy() -> PolicyTable {
    PolicyTable::new([
        ("calexp", DatasetTypePolicy::new(80, true, RetentionPeriod::Forever)),
        ("region", DatasetTypePolicy::new(0, true, RetentionPeriod::Forever)),
        ("internal", DatasetTypePolicy::new(0, false, RetentionPeriod::Forever)),
    ])
}

fn dataset(id: Uuid, dataset_type: &str, visit: Option<i64>) -> ManifestDataset {
    let mut data_id = BTreeMap::new();
    data_id.insert("instrument".to_string(), DataIdValue::Str("LSSTCam".into()));
    data_id.insert("detector".to_string(), DataIdValue::Int(10));
    match visit {
        Some(v) => data_id.insert("visit".to_string(), DataIdValue::Int(v)),
        None => data_id.insert("group".to_string(), DataIdValue::Str("g1".into())),
    };
    ManifestDataset {
        id,
        dataset_type: dataset_type.to_string(),
        collection: "LSSTCam/prompt/output".to_string(),
        data_id,
        stored: true,
    }
}

struct Fixture {
    _tmp: TempDir,
    ledger: Ledger,
    source: ManifestStore,
}

impl Fixture {
    fn new() -> Self {
        let tmp = tempdir().unwrap();
        let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
        ledger.initialize().unwrap();

        let mut manifest = Manifest::default();
        for name in ["calexp", "internal", "mystery"] {
            manifest.dataset_types.insert(
                name.to_string(),
                vec!["instrument".into(), "detector".into(), "visit".into()],
            );
        }
        manifest.dataset_types.insert(
            "region".to_string(),
            vec!["instrument".into(), "detector".into(), "group".into()],
        );
        manifest.visits.push(ManifestVisit {
            instrument: "LSSTCam".into(),
            visit: TIMED_VISIT,
            timespan: Some(Timespan {
                begin: Some(visit_end() - Duration::seconds(30)),
                end: Some(visit_end()),
            }),
        });

        Self {
            _tmp: tmp,
            ledger,
            source: ManifestStore::in_memory("embargo", manifest),
        }
    }

    /// Register a new dataset and return its id.
    fn add(&self, dataset_type: &str, visit: Option<i64>) -> Uuid {
        let id = Uuid::new_v4();
        self.source
            .update(|m| m.datasets.push(dataset(id, dataset_type, visit)))
            .unwrap();
        let handles = self.source.resolve(&[id]).unwrap();
        register_embargo_datasets(
            &self.ledger,
            DatasetOrigin::PromptProcessing,
            &self.source,
            &handles,
        )
        .unwrap();
        id
    }

    fn set_status(&self, id: Uuid, role: RepositoryRole, status: DatasetLocationStatus) {
        let sql = format!("UPDATE dataset SET {} = ?1 WHERE id = ?2", role.status_column());
        self.ledger
            .with_write("test.set_status", |conn| {
                conn.execute(&sql, params![status, id.to_string()])?;
                Ok(())
            })
            .unwrap();
    }
}

fn sorted(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort();
    ids
}

#[test]
fn test_embargo_expires_after_policy_hours() {
    let fx = Fixture::new();
    let calexp = fx.add("calexp", Some(TIMED_VISIT));

    let early = find_release_candidates(&policy(), &fx.ledger, visit_end() + Duration::hours(79), 100)
        .unwrap();
    assert!(early.is_empty());

    let late = find_release_candidates(&policy(), &fx.ledger, visit_end() + Duration::hours(81), 100)
        .unwrap();
    assert_eq!(late, vec![calexp]);
}

#[test]
fn test_zero_hour_embargo_is_immediately_eligible() {
    let fx = Fixture::new();
    let region = fx.add("region", None);
    let internal = fx.add("internal", Some(UNTIMED_VISIT));

    let now = visit_end() + Duration::seconds(1);
    let candidates = find_release_candidates(&policy(), &fx.ledger, now, 100).unwrap();
    assert_eq!(candidates.len(), 2);
    assert_eq!(sorted(candidates), sorted(vec![region, internal]));
}

#[test]
fn test_unknown_visit_time_is_never_eligible() {
    let fx = Fixture::new();
    fx.add("calexp", Some(UNTIMED_VISIT));

    let far_future = visit_end() + Duration::days(3650);
    let candidates = find_release_candidates(&policy(), &fx.ledger, far_future, 100).unwrap();
    assert!(candidates.is_empty());
}

#[test]
fn test_datasets_already_released_or_missing_are_skipped() {
    let fx = Fixture::new();
    let released = fx.add("region", None);
    let missing = fx.add("region", None);
    let gone = fx.add("region", None);
    let pending = fx.add("region", None);

    fx.set_status(released, RepositoryRole::PromptPrep, DatasetLocationStatus::Present);
    fx.set_status(missing, RepositoryRole::PromptPrep, DatasetLocationStatus::Missing);
    fx.set_status(gone, RepositoryRole::Embargo, DatasetLocationStatus::Missing);

    let candidates = find_release_candidates(&policy(), &fx.ledger, Utc::now(), 100).unwrap();
    assert_eq!(candidates, vec![pending]);
}

#[test]
fn test_limit_bounds_the_result() {
    let fx = Fixture::new();
    for _ in 0..5 {
        fx.add("region", None);
    }
    fx.add("calexp", Some(TIMED_VISIT));

    let now = visit_end() + Duration::hours(100);
    assert_eq!(find_release_candidates(&policy(), &fx.ledger, now, 3).unwrap().len(), 3);
    assert_eq!(find_release_candidates(&policy(), &fx.ledger, now, 100).unwrap().len(), 6);
    assert!(find_release_candidates(&policy(), &fx.ledger, now, 0).unwrap().is_empty());
    assert_eq!(
        find_release_candidates(&policy(), &fx.ledger, now, usize::MAX).unwrap().len(),
        6
    );
}

#[test]
fn test_unknown_dataset_type_fails_the_query() {
    let fx = Fixture::new();
    fx.add("region", None);
    fx.add("mystery", Some(TIMED_VISIT));

    let err = find_release_candidates(&policy(), &fx.ledger, Utc::now(), 100).unwrap_err();
    match err {
        LedgerError::PolicyError(PolicyError::UnknownDatasetType(name)) => assert_eq!(name, "mystery"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_empty_policy_on_empty_ledger() {
    let fx = Fixture::new();
    let candidates =
        find_release_candidates(&PolicyTable::default(), &fx.ledger, Utc::now(), 100).unwrap();
    assert!(candidates.is_empty());
}

#[test]
fn test_publication_candidates_are_public_and_unembargoed() {
    let fx = Fixture::new();
    let public = fx.add("region", None);
    let private = fx.add("internal", Some(TIMED_VISIT));
    let still_embargoed = fx.add("calexp", Some(TIMED_VISIT));

    fx.set_status(public, RepositoryRole::PromptPrep, DatasetLocationStatus::Present);
    fx.set_status(private, RepositoryRole::PromptPrep, DatasetLocationStatus::Present);

    let hop = Hop::publish_to(RepositoryRole::RepoMain).unwrap();
    let candidates = find_publication_candidates(&policy(), &fx.ledger, hop, 100).unwrap();
    assert_eq!(candidates, vec![public]);
    assert!(!candidates.contains(&still_embargoed));

    // Publishing to one repository does not affect another.
    fx.set_status(public, RepositoryRole::RepoMain, DatasetLocationStatus::Present);
    assert!(find_publication_candidates(&policy(), &fx.ledger, hop, 100).unwrap().is_empty());
    let google = Hop::publish_to(RepositoryRole::GoogleProd).unwrap();
    assert_eq!(
        find_publication_candidates(&policy(), &fx.ledger, google, 100).unwrap(),
        vec![public]
    );
}

#[test]
fn test_publication_hops_start_at_prompt_prep() {
    assert!(Hop::publish_to(RepositoryRole::Embargo).is_none());
    assert!(Hop::publish_to(RepositoryRole::PromptPrep).is_none());
    let hop = Hop::publish_to(RepositoryRole::GoogleInt).unwrap();
    assert_eq!(hop.source, RepositoryRole::PromptPrep);
    assert_eq!(hop.to_string(), "prompt-prep -> google-int");
}
