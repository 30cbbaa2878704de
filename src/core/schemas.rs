//! Centralized schema definitions for the location ledger.
//!
//! The ledger is a single SQLite database with three tables:
//! 1. visit: end-of-observation timing for each (instrument, visit).
//! 2. dataset: one row per tracked dataset with a status per repository.
//! 3. unknown_dataset: ids we were asked to track but could not find upstream.

pub const DEFAULT_LEDGER_NAME: &str = "publication_state.sqlite";

pub const VISIT_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS visit (
        visit INTEGER NOT NULL,
        instrument TEXT NOT NULL,
        time TEXT,
        PRIMARY KEY (visit, instrument)
    )
";

// Status columns hold `DatasetLocationStatus` integers; time columns hold
// fixed-width UTC text from `core::time::to_db_time`.
pub const DATASET_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dataset (
        id TEXT PRIMARY KEY,
        origin INTEGER NOT NULL,
        dataset_type TEXT NOT NULL,
        instrument TEXT,
        visit INTEGER,
        embargo_status INTEGER NOT NULL,
        prompt_prep_status INTEGER NOT NULL DEFAULT 0,
        repo_main_status INTEGER NOT NULL DEFAULT 0,
        google_int_status INTEGER NOT NULL DEFAULT 0,
        google_prod_status INTEGER NOT NULL DEFAULT 0,
        unembargo_time TEXT,
        repo_main_time TEXT,
        google_int_time TEXT,
        google_prod_time TEXT,
        FOREIGN KEY (visit, instrument) REFERENCES visit(visit, instrument)
    )
";

pub const UNKNOWN_DATASET_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS unknown_dataset (
        id TEXT PRIMARY KEY,
        origin INTEGER NOT NULL,
        error TEXT NOT NULL
    )
";

/// Transfer searches always constrain `dataset_type` and `prompt_prep_status`,
/// since prompt_prep is involved in every hop. One index per repository status.
pub const DATASET_LOOKUP_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS embargo_status_lookup ON dataset(embargo_status, prompt_prep_status, dataset_type)",
    "CREATE INDEX IF NOT EXISTS repo_main_status_lookup ON dataset(repo_main_status, prompt_prep_status, dataset_type)",
    "CREATE INDEX IF NOT EXISTS google_prod_status_lookup ON dataset(google_prod_status, prompt_prep_status, dataset_type)",
    "CREATE INDEX IF NOT EXISTS google_int_status_lookup ON dataset(google_int_status, prompt_prep_status, dataset_type)",
];

/// Insert-if-absent, except that a visit stored without an end time takes
/// the first known one. A stored end time is never replaced.
pub const INSERT_VISIT: &str = "
    INSERT INTO visit(visit, instrument, time) VALUES(?1, ?2, ?3)
    ON CONFLICT(visit, instrument) DO UPDATE SET time = excluded.time
    WHERE visit.time IS NULL AND excluded.time IS NOT NULL
";

pub const INSERT_UNKNOWN_DATASET: &str = "
    INSERT INTO unknown_dataset(id, origin, error) VALUES(?1, ?2, ?3)
    ON CONFLICT(id) DO NOTHING
";

pub const INSERT_DATASET: &str = "
    INSERT INTO dataset(id, origin, dataset_type, instrument, visit, embargo_status)
    VALUES(?1, ?2, ?3, ?4, ?5, ?6)
    ON CONFLICT(id) DO NOTHING
";

pub const SELECT_DATASET_COLUMNS: &str = "
    SELECT id, origin, dataset_type, instrument, visit,
           embargo_status, prompt_prep_status, repo_main_status, google_int_status, google_prod_status,
           unembargo_time, repo_main_time, google_int_time, google_prod_time
    FROM dataset
";
