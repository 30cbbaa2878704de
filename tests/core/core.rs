use embargo_ledger::core::config::{AppConfig, load_config};
use embargo_ledger::core::db;
use embargo_ledger::core::error::LedgerError;
use embargo_ledger::core::ledger::Ledger;
use embargo_ledger::core::migration;
use embargo_ledger::core::model::{DatasetLocationStatus, DatasetOrigin, RepositoryRole};
use embargo_ledger::core::schemas;
use rusqlite::params;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::tempdir;
use uuid::Uuid;

fn insert_dataset(ledger: &Ledger, id: Uuid, dataset_type: &str) {
    ledger
        .with_write("test.insert", |conn| {
            conn.execute(
                schemas::INSERT_DATASET,
                params![
                    id.to_string(),
                    DatasetOrigin::PromptProcessing,
                    dataset_type,
                    Option::<String>::None,
                    Option::<i64>::None,
                    DatasetLocationStatus::Present,
                ],
            )?;
            Ok(())
        })
        .expect("insert dataset");
}

#[test]
fn db_connect_sets_pragmas() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("ledger.sqlite");
    let conn = db::db_connect(&path, 5).expect("db connect");

    let fk_on: i64 = conn
        .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
        .expect("pragma foreign_keys");
    assert_eq!(fk_on, 1);
    let journal: String = conn
        .query_row("PRAGMA journal_mode;", [], |row| row.get(0))
        .expect("pragma journal_mode");
    assert_eq!(journal.to_lowercase(), "wal");
}

#[test]
fn ledger_open_creates_schema_once() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("nested").join("publication_state.sqlite");
    let uri = format!("sqlite+aiosqlite:///{}", path.display().to_string().trim_start_matches('/'));

    let ledger = Ledger::open(&uri).expect("open ledger");
    assert_eq!(ledger.path(), path.as_path());
    assert!(path.exists());
    assert_eq!(ledger.initialize().expect("re-initialize"), 0);

    let version = ledger
        .with_read(migration::current_version)
        .expect("schema version");
    assert_eq!(version, migration::latest_version());

    let counts = ledger.counts().expect("counts");
    assert_eq!((counts.datasets, counts.visits, counts.unknown_datasets), (0, 0, 0));
}

#[test]
fn ledger_rejects_newer_schema() {
    let tmp = tempdir().expect("tempdir");
    let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
    ledger.initialize().expect("initialize");
    ledger
        .with_write("test.bump", |conn| {
            conn.execute_batch("PRAGMA user_version = 99;")?;
            Ok(())
        })
        .expect("bump version");

    match ledger.initialize() {
        Err(LedgerError::SchemaTooNew { found, supported }) => {
            assert_eq!(found, 99);
            assert_eq!(supported, migration::latest_version());
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn unsupported_ledger_uri_is_rejected() {
    let err = Ledger::open("postgresql://usdf-db.example/ppub").unwrap_err();
    assert_eq!(err.to_string(), "Unhandled database engine 'postgresql'");
}

#[test]
fn dataset_visit_must_exist() {
    let tmp = tempdir().expect("tempdir");
    let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
    ledger.initialize().expect("initialize");

    let result = ledger.with_write("test.orphan", |conn| {
        conn.execute(
            schemas::INSERT_DATASET,
            params![
                Uuid::new_v4().to_string(),
                DatasetOrigin::PromptProcessing,
                "calexp",
                "LSSTCam",
                2025120200439_i64,
                DatasetLocationStatus::Present,
            ],
        )?;
        Ok(())
    });
    assert!(matches!(result, Err(LedgerError::RusqliteError(_))));
    assert_eq!(ledger.counts().expect("counts").datasets, 0);
}

#[test]
fn failed_unit_of_work_rolls_back() {
    let tmp = tempdir().expect("tempdir");
    let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
    ledger.initialize().expect("initialize");

    let result: Result<(), LedgerError> = ledger.with_write("test.rollback", |conn| {
        conn.execute(
            schemas::INSERT_DATASET,
            params![
                Uuid::new_v4().to_string(),
                DatasetOrigin::PromptProcessing,
                "region",
                Option::<String>::None,
                Option::<i64>::None,
                DatasetLocationStatus::Present,
            ],
        )?;
        Err(LedgerError::ValidationError("abort".to_string()))
    });
    assert!(result.is_err());
    assert_eq!(ledger.counts().expect("counts").datasets, 0);
}

#[test]
fn status_summary_counts_every_role() {
    let tmp = tempdir().expect("tempdir");
    let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
    ledger.initialize().expect("initialize");

    let ids: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
    for id in &ids {
        insert_dataset(&ledger, *id, "region");
    }
    ledger
        .with_write("test.advance", |conn| {
            conn.execute(
                "UPDATE dataset SET prompt_prep_status = ?1 WHERE id = ?2",
                params![DatasetLocationStatus::Present, ids[0].to_string()],
            )?;
            Ok(())
        })
        .expect("advance");

    let summary = ledger.status_summary().expect("summary");
    let count = |role: RepositoryRole, status: DatasetLocationStatus| {
        summary
            .iter()
            .find(|s| s.role == role && s.status == status)
            .map(|s| s.count)
            .unwrap_or(0)
    };
    assert_eq!(count(RepositoryRole::Embargo, DatasetLocationStatus::Present), 3);
    assert_eq!(count(RepositoryRole::PromptPrep, DatasetLocationStatus::Present), 1);
    assert_eq!(count(RepositoryRole::PromptPrep, DatasetLocationStatus::NeverPresent), 2);
    assert_eq!(count(RepositoryRole::GoogleProd, DatasetLocationStatus::NeverPresent), 3);
}

#[test]
fn concurrent_writers_do_not_lose_rows() {
    let tmp = tempdir().expect("tempdir");
    let ledger = Ledger::at_path(tmp.path().join("ledger.sqlite"));
    ledger.initialize().expect("initialize");

    let workers = 4;
    let per_worker = 10;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let ledger = ledger.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                for _ in 0..per_worker {
                    insert_dataset(&ledger, Uuid::new_v4(), "region");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker");
    }

    assert_eq!(
        ledger.counts().expect("counts").datasets,
        (workers * per_worker) as u64
    );
}

#[test]
fn config_file_overrides_defaults() {
    let tmp = tempdir().expect("tempdir");
    let path = tmp.path().join("embargo-ledger.toml");
    fs::write(
        &path,
        "[ledger]\nuri = \"sqlite:///data/state.sqlite\"\n\n[transfer]\nbatch_size = 250\n\n[policy]\nfile = \"policy.toml\"\n",
    )
    .expect("write config");

    let config = load_config(Some(&path)).expect("load config");
    assert_eq!(config.ledger_uri(None), "sqlite:///data/state.sqlite");
    let settings = config.transfer_settings();
    assert_eq!(settings.batch_size, 250);
    assert_eq!(settings.max_candidates, 1_000_000);
    assert_eq!(
        config.policy.file.as_deref(),
        Some(std::path::Path::new("policy.toml"))
    );

    assert_eq!(load_config(None).expect("defaults"), AppConfig::default());
}
