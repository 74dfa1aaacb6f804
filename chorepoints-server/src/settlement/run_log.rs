use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;

use crate::storage::StorageError;
use crate::storage::models::RunLog as RunLogRow;
use crate::storage::schema::run_logs;

/// Idempotency guard of scheduled jobs, keyed by `(job_code, date)`.
pub trait RunLog {
    fn has_run(&mut self, job_code: &str, date: NaiveDate) -> Result<bool, StorageError>;
    fn mark_run(
        &mut self,
        job_code: &str,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<(), StorageError>;
}

impl RunLog for SqliteConnection {
    fn has_run(&mut self, job_code: &str, date: NaiveDate) -> Result<bool, StorageError> {
        let count: i64 = run_logs::table
            .filter(run_logs::job_code.eq(job_code))
            .filter(run_logs::run_date.eq(date))
            .count()
            .get_result(self)?;
        Ok(count > 0)
    }

    fn mark_run(
        &mut self,
        job_code: &str,
        date: NaiveDate,
        at: NaiveDateTime,
    ) -> Result<(), StorageError> {
        diesel::insert_into(run_logs::table)
            .values(&RunLogRow {
                job_code: job_code.to_string(),
                run_date: date,
                completed_at: at,
            })
            .on_conflict((run_logs::job_code, run_logs::run_date))
            .do_update()
            .set(run_logs::completed_at.eq(at))
            .execute(self)?;
        Ok(())
    }
}

/// Run-log code of one step of a job, e.g. `nightly/child/alice`.
pub fn step_code(job_code: &str, step: &str, entity: Option<&str>) -> String {
    match entity {
        Some(id) => format!("{job_code}/{step}/{id}"),
        None => format!("{job_code}/{step}"),
    }
}
