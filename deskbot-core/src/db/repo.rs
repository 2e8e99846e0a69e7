//! Database repository layer
//!
//! Every operation is a self-contained transaction against one SQLite
//! connection behind a mutex; concurrent writers from different user events
//! serialize here. Timestamps come from the database clock
//! (`CURRENT_TIMESTAMP`), never from the caller, so insertion order and
//! timestamp order agree.

use crate::error::{Error, Result};
use crate::types::{ActionRecord, ActionType, UserInfo, UserProfile};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use serde::Serialize;
use std::path::Path;
use std::sync::Mutex;

/// One entry of a top-users ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopUser {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub action_count: i64,
}

impl TopUser {
    /// Name to show in reports: username, else first name, else the id.
    pub fn display_name(&self) -> String {
        self.username
            .clone()
            .or_else(|| self.first_name.clone())
            .unwrap_or_else(|| format!("ID{}", self.user_id))
    }
}

/// Aggregate of one calendar date, persisted by the daily snapshot job.
#[derive(Debug, Clone, Serialize)]
pub struct DailyStatsSnapshot {
    pub date: NaiveDate,
    /// Lifetime user count as of aggregation time
    pub total_users: i64,
    /// Profiles whose first_seen falls on `date`
    pub new_users: i64,
    pub total_actions: i64,
    /// serial_number → count, ordered by count descending
    pub device_stats: Vec<(String, i64)>,
    /// question → count, top 10, ordered by count descending
    pub question_stats: Vec<(String, i64)>,
    /// Most active users of the day (not persisted)
    pub top_users: Vec<TopUser>,
}

/// Rolling-window aggregate for weekly/monthly reports.
#[derive(Debug, Clone, Serialize)]
pub struct PeriodStats {
    pub unique_users: i64,
    pub total_actions: i64,
    /// date → action count, ascending by date
    pub daily_actions: Vec<(String, i64)>,
    /// ISO week → action count; populated for monthly windows only
    pub weekly_actions: Vec<(String, i64)>,
    pub device_stats: Vec<(String, i64)>,
    pub question_stats: Vec<(String, i64)>,
    pub top_users: Vec<TopUser>,
}

/// Lifetime statistics for one user.
#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub profile: UserProfile,
    pub total_actions: i64,
    /// serial_number → count, ordered by count descending
    pub device_stats: Vec<(String, i64)>,
    /// 10 most recent actions, newest first
    pub recent_actions: Vec<ActionRecord>,
}

/// Database handle wrapping a single mutex-guarded connection.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // WAL mode so the snapshot job can read while the bot writes
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this database
    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        super::schema::run_migrations(&conn)
    }

    // ============================================
    // User profiles
    // ============================================

    /// Upsert a user profile. New users get `first_seen` from the database
    /// clock; existing users keep it and have the mutable fields plus
    /// `last_seen` refreshed.
    pub fn record_user(&self, user: &UserInfo) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO users (user_id, username, first_name, last_name)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(user_id) DO UPDATE SET
                username = excluded.username,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                last_seen = CURRENT_TIMESTAMP
            "#,
            params![user.id, user.username, user.first_name, user.last_name],
        )?;
        Ok(())
    }

    /// Fetch a user profile by id.
    pub fn get_user(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT user_id, username, first_name, last_name, first_seen, last_seen
             FROM users WHERE user_id = ?",
            [user_id],
            row_to_profile,
        )
        .optional()
        .map_err(Error::from)
    }

    // ============================================
    // Action log
    // ============================================

    /// Append one action record, timestamped by the database clock.
    pub fn record_action(
        &self,
        user_id: i64,
        action_type: ActionType,
        device_type: Option<&str>,
        model: Option<&str>,
        number: Option<&str>,
        question: Option<&str>,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT INTO user_actions (user_id, action_type, device_type, model, number, question)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user_id,
                action_type.as_str(),
                device_type,
                model,
                number,
                question
            ],
        )?;
        Ok(())
    }

    // ============================================
    // Rollups
    // ============================================

    /// Aggregate one calendar date.
    pub fn daily_stats(&self, date: NaiveDate) -> Result<DailyStatsSnapshot> {
        let conn = self.conn.lock().unwrap();
        let day = date.format("%Y-%m-%d").to_string();

        let total_users: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;

        let new_users: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE DATE(first_seen) = ?",
            [&day],
            |r| r.get(0),
        )?;

        let total_actions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_actions WHERE DATE(timestamp) = ?",
            [&day],
            |r| r.get(0),
        )?;

        let device_stats = collect_pairs(
            &conn,
            "SELECT number, COUNT(*) as count
             FROM user_actions
             WHERE DATE(timestamp) = ? AND number IS NOT NULL
             GROUP BY number
             ORDER BY count DESC",
            [&day],
        )?;

        let question_stats = collect_pairs(
            &conn,
            "SELECT question, COUNT(*) as count
             FROM user_actions
             WHERE DATE(timestamp) = ? AND question IS NOT NULL
             GROUP BY question
             ORDER BY count DESC
             LIMIT 10",
            [&day],
        )?;

        let top_users = collect_top_users(
            &conn,
            "SELECT u.user_id, u.username, u.first_name, COUNT(ua.id) as action_count
             FROM users u
             JOIN user_actions ua ON u.user_id = ua.user_id
             WHERE DATE(ua.timestamp) = ?
             GROUP BY u.user_id, u.username, u.first_name
             ORDER BY action_count DESC
             LIMIT 5",
            [&day],
        )?;

        Ok(DailyStatsSnapshot {
            date,
            total_users,
            new_users,
            total_actions,
            device_stats,
            question_stats,
            top_users,
        })
    }

    /// Rolling 7-day window from the current instant.
    pub fn weekly_stats(&self) -> Result<PeriodStats> {
        self.period_stats(7, 5, false)
    }

    /// Rolling 30-day window with a per-ISO-week breakdown.
    pub fn monthly_stats(&self) -> Result<PeriodStats> {
        self.period_stats(30, 10, true)
    }

    fn period_stats(
        &self,
        window_days: u32,
        top_user_limit: u32,
        with_weekly_breakdown: bool,
    ) -> Result<PeriodStats> {
        let conn = self.conn.lock().unwrap();
        let since = format!("-{} days", window_days);

        let (unique_users, total_actions): (i64, i64) = conn.query_row(
            "SELECT COUNT(DISTINCT user_id), COUNT(*)
             FROM user_actions
             WHERE timestamp >= datetime('now', ?)",
            [&since],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?;

        let daily_actions = collect_pairs(
            &conn,
            "SELECT DATE(timestamp) as date, COUNT(*) as actions
             FROM user_actions
             WHERE timestamp >= datetime('now', ?)
             GROUP BY DATE(timestamp)
             ORDER BY date",
            [&since],
        )?;

        let weekly_actions = if with_weekly_breakdown {
            collect_pairs(
                &conn,
                "SELECT strftime('%Y-%W', timestamp) as week, COUNT(*) as actions
                 FROM user_actions
                 WHERE timestamp >= datetime('now', ?)
                 GROUP BY strftime('%Y-%W', timestamp)
                 ORDER BY week",
                [&since],
            )?
        } else {
            Vec::new()
        };

        let device_stats = collect_pairs(
            &conn,
            "SELECT number, COUNT(*) as count
             FROM user_actions
             WHERE timestamp >= datetime('now', ?) AND number IS NOT NULL
             GROUP BY number
             ORDER BY count DESC",
            [&since],
        )?;

        let question_stats = collect_pairs(
            &conn,
            "SELECT question, COUNT(*) as count
             FROM user_actions
             WHERE timestamp >= datetime('now', ?) AND question IS NOT NULL
             GROUP BY question
             ORDER BY count DESC
             LIMIT 10",
            [&since],
        )?;

        let top_users = collect_top_users(
            &conn,
            &format!(
                "SELECT u.user_id, u.username, u.first_name, COUNT(*) as action_count
                 FROM user_actions ua
                 JOIN users u ON ua.user_id = u.user_id
                 WHERE ua.timestamp >= datetime('now', ?)
                 GROUP BY ua.user_id
                 ORDER BY action_count DESC
                 LIMIT {}",
                top_user_limit
            ),
            [&since],
        )?;

        Ok(PeriodStats {
            unique_users,
            total_actions,
            daily_actions,
            weekly_actions,
            device_stats,
            question_stats,
            top_users,
        })
    }

    /// Lifetime stats for one user, or `UserNotFound`.
    pub fn user_stats(&self, user_id: i64) -> Result<UserStats> {
        let profile = self
            .get_user(user_id)?
            .ok_or(Error::UserNotFound(user_id))?;

        let conn = self.conn.lock().unwrap();

        let total_actions: i64 = conn.query_row(
            "SELECT COUNT(*) FROM user_actions WHERE user_id = ?",
            [user_id],
            |r| r.get(0),
        )?;

        let device_stats = collect_pairs(
            &conn,
            "SELECT number, COUNT(*) as count
             FROM user_actions
             WHERE user_id = ? AND number IS NOT NULL
             GROUP BY number
             ORDER BY count DESC",
            [user_id],
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, action_type, device_type, model, number, question, timestamp
             FROM user_actions
             WHERE user_id = ?
             ORDER BY timestamp DESC, id DESC
             LIMIT 10",
        )?;
        let recent_actions = stmt
            .query_map([user_id], row_to_action)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(UserStats {
            profile,
            total_actions,
            device_stats,
            recent_actions,
        })
    }

    // ============================================
    // Snapshots and retention
    // ============================================

    /// Insert-or-replace a daily snapshot, keyed by date. Re-running the
    /// job for the same date overwrites instead of duplicating.
    pub fn persist_snapshot(&self, snapshot: &DailyStatsSnapshot) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            INSERT OR REPLACE INTO daily_stats
                (date, total_users, new_users, total_actions, device_stats, question_stats)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                snapshot.date.format("%Y-%m-%d").to_string(),
                snapshot.total_users,
                snapshot.new_users,
                snapshot.total_actions,
                serde_json::to_string(&snapshot.device_stats)?,
                serde_json::to_string(&snapshot.question_stats)?,
            ],
        )?;
        Ok(())
    }

    /// Read a persisted snapshot back. `top_users` is not persisted and
    /// comes back empty.
    pub fn get_snapshot(&self, date: NaiveDate) -> Result<Option<DailyStatsSnapshot>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT total_users, new_users, total_actions, device_stats, question_stats
             FROM daily_stats WHERE date = ?",
            [date.format("%Y-%m-%d").to_string()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?
        .map(|(total_users, new_users, total_actions, device_json, question_json)| {
            Ok(DailyStatsSnapshot {
                date,
                total_users,
                new_users,
                total_actions,
                device_stats: device_json
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?
                    .unwrap_or_default(),
                question_stats: question_json
                    .map(|s| serde_json::from_str(&s))
                    .transpose()?
                    .unwrap_or_default(),
                top_users: Vec::new(),
            })
        })
        .transpose()
    }

    /// Delete action records and snapshots strictly older than the
    /// retention window. Returns `(actions_deleted, snapshots_deleted)`.
    pub fn cleanup(&self, retention_days: u32) -> Result<(usize, usize)> {
        let conn = self.conn.lock().unwrap();
        let cutoff = format!("-{} days", retention_days);

        let deleted_actions = conn.execute(
            "DELETE FROM user_actions WHERE timestamp < datetime('now', ?)",
            [&cutoff],
        )?;
        let deleted_stats = conn.execute(
            "DELETE FROM daily_stats WHERE date < date('now', ?)",
            [&cutoff],
        )?;

        tracing::info!(deleted_actions, deleted_stats, "Retention cleanup complete");
        Ok((deleted_actions, deleted_stats))
    }
}

// ============================================
// Row mapping
// ============================================

fn collect_pairs<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<rusqlite::Result<_>>().map_err(Error::from)
}

fn collect_top_users<P: Params>(conn: &Connection, sql: &str, params: P) -> Result<Vec<TopUser>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| {
        Ok(TopUser {
            user_id: row.get(0)?,
            username: row.get(1)?,
            first_name: row.get(2)?,
            action_count: row.get(3)?,
        })
    })?;
    rows.collect::<rusqlite::Result<_>>().map_err(Error::from)
}

fn row_to_profile(row: &Row) -> rusqlite::Result<UserProfile> {
    Ok(UserProfile {
        user_id: row.get(0)?,
        username: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        first_seen: parse_db_time(&row.get::<_, String>(4)?),
        last_seen: parse_db_time(&row.get::<_, String>(5)?),
    })
}

fn row_to_action(row: &Row) -> rusqlite::Result<ActionRecord> {
    let action_str: String = row.get(2)?;
    let action_type = action_str.parse::<ActionType>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, e.into())
    })?;

    Ok(ActionRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        action_type,
        device_type: row.get(3)?,
        model: row.get(4)?,
        number: row.get(5)?,
        question: row.get(6)?,
        timestamp: parse_db_time(&row.get::<_, String>(7)?),
    })
}

/// SQLite's CURRENT_TIMESTAMP is `YYYY-MM-DD HH:MM:SS` in UTC.
fn parse_db_time(s: &str) -> DateTime<Utc> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserInfo;

    fn db() -> Database {
        let db = Database::open_in_memory().unwrap();
        db.migrate().unwrap();
        db
    }

    fn user(id: i64, username: &str) -> UserInfo {
        UserInfo {
            id,
            username: Some(username.to_string()),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn record_user_upsert_preserves_first_seen() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();
        let first = db.get_user(1).unwrap().unwrap();

        db.record_user(&user(1, "alice_renamed")).unwrap();
        let second = db.get_user(1).unwrap().unwrap();

        assert_eq!(second.first_seen, first.first_seen);
        assert_eq!(second.username.as_deref(), Some("alice_renamed"));
        assert!(second.last_seen >= second.first_seen);
    }

    #[test]
    fn daily_stats_for_empty_date() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();

        // Today: one new profile, zero actions
        let today = Utc::now().date_naive();
        let stats = db.daily_stats(today).unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.new_users, 1);
        assert_eq!(stats.total_actions, 0);
        assert!(stats.device_stats.is_empty());
        assert!(stats.question_stats.is_empty());

        // A date nobody touched
        let empty = NaiveDate::from_ymd_opt(2001, 1, 1).unwrap();
        let stats = db.daily_stats(empty).unwrap();
        assert_eq!(stats.new_users, 0);
        assert_eq!(stats.total_actions, 0);
    }

    #[test]
    fn daily_stats_aggregates_numbers_and_questions() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();
        db.record_user(&user(2, "bob")).unwrap();

        for _ in 0..3 {
            db.record_action(
                1,
                ActionType::NumberSelected,
                Some("scanner"),
                Some("netum"),
                Some("C750"),
                None,
            )
            .unwrap();
        }
        db.record_action(
            2,
            ActionType::QuestionSelected,
            Some("scanner"),
            Some("netum"),
            Some("C750"),
            Some("Не включается"),
        )
        .unwrap();
        db.record_action(
            2,
            ActionType::NumberSelected,
            Some("printer"),
            Some("xprinter"),
            Some("XP365B"),
            None,
        )
        .unwrap();

        let stats = db.daily_stats(Utc::now().date_naive()).unwrap();
        assert_eq!(stats.total_actions, 5);
        assert_eq!(stats.device_stats[0], ("C750".to_string(), 4));
        assert_eq!(stats.device_stats[1], ("XP365B".to_string(), 1));
        assert_eq!(stats.question_stats[0], ("Не включается".to_string(), 1));
        assert_eq!(stats.top_users[0].user_id, 1);
        assert_eq!(stats.top_users[0].action_count, 3);
    }

    #[test]
    fn weekly_and_monthly_windows_cover_today() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();
        db.record_action(1, ActionType::Start, None, None, None, None)
            .unwrap();
        db.record_action(
            1,
            ActionType::DeviceSelected,
            Some("scanner"),
            None,
            None,
            None,
        )
        .unwrap();

        let weekly = db.weekly_stats().unwrap();
        assert_eq!(weekly.unique_users, 1);
        assert_eq!(weekly.total_actions, 2);
        assert_eq!(weekly.daily_actions.len(), 1);
        assert!(weekly.weekly_actions.is_empty());

        let monthly = db.monthly_stats().unwrap();
        assert_eq!(monthly.total_actions, 2);
        assert_eq!(monthly.weekly_actions.len(), 1);
    }

    #[test]
    fn user_stats_reports_recent_actions_newest_first() {
        let db = db();
        db.record_user(&user(7, "carol")).unwrap();
        for i in 0..12 {
            db.record_action(
                7,
                ActionType::NumberSelected,
                Some("scanner"),
                Some("netum"),
                Some(if i % 2 == 0 { "C750" } else { "1228BL" }),
                None,
            )
            .unwrap();
        }

        let stats = db.user_stats(7).unwrap();
        assert_eq!(stats.total_actions, 12);
        assert_eq!(stats.recent_actions.len(), 10);
        // Newest first: ids descending
        assert!(stats
            .recent_actions
            .windows(2)
            .all(|w| w[0].id > w[1].id));
        assert_eq!(stats.device_stats[0].0, "C750");

        assert!(matches!(db.user_stats(999), Err(Error::UserNotFound(999))));
    }

    #[test]
    fn snapshot_upsert_overwrites_same_date() {
        let db = db();
        let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();

        let mut snapshot = DailyStatsSnapshot {
            date,
            total_users: 5,
            new_users: 2,
            total_actions: 40,
            device_stats: vec![("C750".to_string(), 12)],
            question_stats: vec![("Не включается".to_string(), 7)],
            top_users: Vec::new(),
        };
        db.persist_snapshot(&snapshot).unwrap();

        snapshot.total_actions = 41;
        db.persist_snapshot(&snapshot).unwrap();

        let stored = db.get_snapshot(date).unwrap().unwrap();
        assert_eq!(stored.total_actions, 41);
        assert_eq!(stored.device_stats, vec![("C750".to_string(), 12)]);

        let count: i64 = {
            let conn = db.conn.lock().unwrap();
            conn.query_row("SELECT COUNT(*) FROM daily_stats", [], |r| r.get(0))
                .unwrap()
        };
        assert_eq!(count, 1);
    }

    #[test]
    fn cleanup_is_idempotent_once_window_cleared() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();
        db.record_action(1, ActionType::Start, None, None, None, None)
            .unwrap();

        // Backdate the action past the retention window
        {
            let conn = db.conn.lock().unwrap();
            conn.execute(
                "UPDATE user_actions SET timestamp = datetime('now', '-120 days')",
                [],
            )
            .unwrap();
        }

        let (actions, stats) = db.cleanup(90).unwrap();
        assert_eq!(actions, 1);
        assert_eq!(stats, 0);

        let (actions, stats) = db.cleanup(90).unwrap();
        assert_eq!(actions, 0);
        assert_eq!(stats, 0);
    }

    #[test]
    fn cleanup_keeps_recent_rows() {
        let db = db();
        db.record_user(&user(1, "alice")).unwrap();
        db.record_action(1, ActionType::Start, None, None, None, None)
            .unwrap();

        let (actions, _) = db.cleanup(90).unwrap();
        assert_eq!(actions, 0);
    }
}
