//! Release eligibility.
//!
//! Eligibility depends only on a dataset type's policy, never on the type
//! name itself, so dataset types are grouped by the relevant policy field and
//! each group becomes one `SELECT`. The groups are combined with `UNION ALL`
//! and run as a single bounded query.

use crate::core::error::LedgerError;
use crate::core::ledger::{Ledger, id_from_db};
use crate::core::model::{DatasetLocationStatus, Hop};
use crate::core::time;
use crate::plugins::policy::PolicyTable;
use chrono::{DateTime, Duration, Utc};
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use tracing::debug;
use uuid::Uuid;

/// Upper bound on candidates per invocation.
pub const MAX_CANDIDATES: usize = 1_000_000;

/// Datasets whose embargo has run out at `now`.
///
/// A dataset qualifies when it is present in embargo, has never reached
/// prompt_prep, and either its type has no embargo or its visit ended more
/// than the embargo period before `now`. Visits with an unknown end time
/// never qualify under a non-zero embargo.
pub fn find_release_candidates(
    policy: &PolicyTable,
    ledger: &Ledger,
    now: DateTime<Utc>,
    limit: usize,
) -> Result<Vec<Uuid>, LedgerError> {
    if policy.is_empty() {
        return Ok(Vec::new());
    }
    let hop = Hop::UNEMBARGO;
    check_pending_types(policy, ledger, hop)?;

    let mut query = CandidateQuery::new(hop);
    for group in policy.group_by(|p| p.embargo_hours) {
        let cutoff = (group.key > 0).then(|| now - Duration::hours(i64::from(group.key)));
        query.push_group(&group.dataset_types, cutoff);
    }
    query.run(ledger, limit)
}

/// Datasets of public types waiting to cross `hop`. The embargo was already
/// enforced on the way into prompt_prep, so there is no timing gate here.
pub fn find_publication_candidates(
    policy: &PolicyTable,
    ledger: &Ledger,
    hop: Hop,
    limit: usize,
) -> Result<Vec<Uuid>, LedgerError> {
    if policy.is_empty() {
        return Ok(Vec::new());
    }
    check_pending_types(policy, ledger, hop)?;

    let mut query = CandidateQuery::new(hop);
    for group in policy.group_by(|p| p.public) {
        if group.key {
            query.push_group(&group.dataset_types, None);
        }
    }
    query.run(ledger, limit)
}

/// Every dataset type still waiting on `hop` must have a policy.
fn check_pending_types(policy: &PolicyTable, ledger: &Ledger, hop: Hop) -> Result<(), LedgerError> {
    let pending = ledger.with_read(|conn| {
        let sql = format!(
            "SELECT DISTINCT dataset_type FROM dataset WHERE {} = ?1 AND {} = ?2 ORDER BY dataset_type",
            hop.source.status_column(),
            hop.target.status_column(),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params![
                DatasetLocationStatus::Present,
                DatasetLocationStatus::NeverPresent
            ],
            |row| row.get::<_, String>(0),
        )?;
        let mut out = Vec::new();
        for r in rows {
            out.push(r?);
        }
        Ok(out)
    })?;
    policy.check_known(pending.iter().map(String::as_str))?;
    Ok(())
}

struct CandidateQuery {
    hop: Hop,
    selects: Vec<String>,
    params: Vec<Value>,
}

impl CandidateQuery {
    fn new(hop: Hop) -> Self {
        Self {
            hop,
            selects: Vec::new(),
            params: Vec::new(),
        }
    }

    /// Add one group. With a `visit_ended_before` cutoff the group is joined
    /// to `visit`, which also drops datasets that have no visit.
    fn push_group(&mut self, dataset_types: &[String], visit_ended_before: Option<DateTime<Utc>>) {
        if dataset_types.is_empty() {
            return;
        }
        let placeholders = vec!["?"; dataset_types.len()].join(", ");
        let mut sql = String::from("SELECT dataset.id FROM dataset");
        if visit_ended_before.is_some() {
            sql.push_str(
                " JOIN visit ON visit.visit = dataset.visit AND visit.instrument = dataset.instrument",
            );
        }
        sql.push_str(&format!(
            " WHERE dataset.dataset_type IN ({}) AND dataset.{} = ? AND dataset.{} = ?",
            placeholders,
            self.hop.source.status_column(),
            self.hop.target.status_column(),
        ));
        self.params
            .extend(dataset_types.iter().cloned().map(Value::Text));
        self.params
            .push(Value::Integer(DatasetLocationStatus::Present as i64));
        self.params
            .push(Value::Integer(DatasetLocationStatus::NeverPresent as i64));

        if let Some(cutoff) = visit_ended_before {
            sql.push_str(" AND visit.time < ?");
            self.params.push(Value::Text(time::to_db_time(&cutoff)));
        }
        self.selects.push(sql);
    }

    fn run(mut self, ledger: &Ledger, limit: usize) -> Result<Vec<Uuid>, LedgerError> {
        if self.selects.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let sql = format!("{} LIMIT ?", self.selects.join(" UNION ALL "));
        self.params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        debug!(hop = %self.hop, groups = self.selects.len(), "running candidate query");

        ledger.with_read(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params_from_iter(self.params.iter()), |row| {
                row.get::<_, String>(0)
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(id_from_db(&r?)?);
            }
            Ok(out)
        })
    }
}
