//! Daily snapshot job
//!
//! Invoked by an external timer (or by hand) once per day: aggregate
//! yesterday, persist the snapshot, and hand back the formatted report for
//! delivery to the admin channel. Safe to run any number of times for the
//! same date; the persist step is insert-or-replace.

use crate::db::Database;
use crate::error::{Error, Result};
use crate::report;
use chrono::{Duration, FixedOffset, NaiveDate, Utc};

/// Outcome of one snapshot run.
#[derive(Debug, Clone)]
pub struct SnapshotRun {
    /// The date that was aggregated
    pub date: NaiveDate,
    /// Formatted report ready for delivery
    pub report: String,
}

/// Yesterday's date in a fixed-offset timezone.
pub fn yesterday(utc_offset_hours: i32) -> Result<NaiveDate> {
    let offset = FixedOffset::east_opt(utc_offset_hours * 3600)
        .ok_or_else(|| Error::Config(format!("invalid UTC offset: {}", utc_offset_hours)))?;
    Ok(Utc::now().with_timezone(&offset).date_naive() - Duration::days(1))
}

/// Aggregate, persist, and format a snapshot for one date.
pub fn run_for_date(db: &Database, date: NaiveDate) -> Result<SnapshotRun> {
    let stats = db.daily_stats(date)?;
    db.persist_snapshot(&stats)?;

    tracing::info!(
        date = %date,
        total_actions = stats.total_actions,
        new_users = stats.new_users,
        "Daily snapshot persisted"
    );

    Ok(SnapshotRun {
        date,
        report: report::format_daily(&stats),
    })
}

/// Aggregate yesterday in the configured timezone.
pub fn run_daily(db: &Database, utc_offset_hours: i32) -> Result<SnapshotRun> {
    run_for_date(db, yesterday(utc_offset_hours)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActionType, UserInfo};

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    #[test]
    fn rerun_overwrites_instead_of_duplicating() {
        let db = db();
        db.record_user(&UserInfo::new(1)).unwrap();
        db.record_action(1, ActionType::Start, None, None, None, None)
            .unwrap();

        let today = Utc::now().date_naive();
        let first = run_for_date(&db, today).unwrap();
        assert_eq!(first.date, today);

        db.record_action(
            1,
            ActionType::DeviceSelected,
            Some("scanner"),
            None,
            None,
            None,
        )
        .unwrap();
        run_for_date(&db, today).unwrap();

        let stored = db.get_snapshot(today).unwrap().unwrap();
        assert_eq!(stored.total_actions, 2);
    }

    #[test]
    fn snapshot_of_quiet_date_is_empty() {
        let db = db();
        let run = run_for_date(&db, NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()).unwrap();
        assert!(run.report.contains("• Всего действий: 0"));
    }

    #[test]
    fn yesterday_respects_offset_bounds() {
        assert!(yesterday(3).is_ok());
        assert!(yesterday(0).is_ok());
        assert!(yesterday(99).is_err());
    }
}
