//! Report formatting for the admin surface
//!
//! Turns rollup results into the plain-text summaries delivered to
//! administrators. The transport may apply its own markup; the section
//! structure here is the contract.

use crate::db::{DailyStatsSnapshot, PeriodStats, UserStats};

/// Daily summary, as persisted and delivered by the snapshot job.
pub fn format_daily(stats: &DailyStatsSnapshot) -> String {
    let mut out = format!("📊 Статистика бота за {}\n\n", stats.date.format("%Y-%m-%d"));

    out.push_str("👥 Пользователи:\n");
    out.push_str(&format!("• Всего пользователей: {}\n", stats.total_users));
    out.push_str(&format!("• Новых за день: {}\n", stats.new_users));
    out.push_str(&format!("• Всего действий: {}\n\n", stats.total_actions));

    push_pairs(&mut out, "🔧 Популярные номера устройств:", &stats.device_stats);
    push_pairs(
        &mut out,
        "❓ Популярные вопросы:",
        &stats.question_stats[..stats.question_stats.len().min(5)],
    );

    if !stats.top_users.is_empty() {
        out.push_str("⭐ Активные пользователи:\n");
        for user in &stats.top_users {
            out.push_str(&format!(
                "• {}: {} действий\n",
                user.display_name(),
                user.action_count
            ));
        }
    }

    out.trim_end().to_string()
}

/// Weekly or monthly summary over a rolling window.
pub fn format_period(title: &str, stats: &PeriodStats) -> String {
    let mut out = format!("📊 Статистика бота за {}\n\n", title);

    out.push_str("👥 Пользователи:\n");
    out.push_str(&format!("• Уникальных пользователей: {}\n", stats.unique_users));
    out.push_str(&format!("• Всего действий: {}\n\n", stats.total_actions));

    if !stats.weekly_actions.is_empty() {
        out.push_str("📅 Активность по неделям:\n");
        for (week, actions) in &stats.weekly_actions {
            out.push_str(&format!("• Неделя {}: {} действий\n", week, actions));
        }
        out.push('\n');
    }

    if !stats.daily_actions.is_empty() {
        // Monthly windows only show the last week of days for brevity
        let start = stats.daily_actions.len().saturating_sub(7);
        out.push_str("📅 Активность по дням:\n");
        for (date, actions) in &stats.daily_actions[start..] {
            out.push_str(&format!("• {}: {} действий\n", date, actions));
        }
        out.push('\n');
    }

    push_pairs(&mut out, "🔧 Популярные номера устройств:", &stats.device_stats);
    push_pairs(
        &mut out,
        "❓ Популярные вопросы:",
        &stats.question_stats[..stats.question_stats.len().min(5)],
    );

    if !stats.top_users.is_empty() {
        out.push_str("⭐ Топ пользователи:\n");
        for user in &stats.top_users {
            out.push_str(&format!(
                "• {}: {} действий\n",
                user.display_name(),
                user.action_count
            ));
        }
    }

    out.trim_end().to_string()
}

/// Per-user summary for the `mystats` command.
pub fn format_user(stats: &UserStats) -> String {
    let profile = &stats.profile;
    let mut out = String::from("👤 Статистика пользователя\n\n");

    out.push_str(&format!(
        "• Username: @{}\n",
        profile.username.as_deref().unwrap_or("не указан")
    ));
    out.push_str(&format!(
        "• Имя: {}\n",
        profile.first_name.as_deref().unwrap_or("не указано")
    ));
    out.push_str(&format!(
        "• Первый визит: {}\n",
        profile.first_seen.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!(
        "• Последний визит: {}\n",
        profile.last_seen.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!("• Всего действий: {}\n\n", stats.total_actions));

    push_pairs(&mut out, "🔧 Популярные номера устройств:", &stats.device_stats);

    if !stats.recent_actions.is_empty() {
        out.push_str("Последние действия:\n");
        for action in stats.recent_actions.iter().take(5) {
            let mut line = action.action_type.as_str().to_string();
            if let Some(device) = &action.device_type {
                line.push_str(&format!(" ({}", device));
                if let Some(model) = &action.model {
                    line.push_str(&format!(" {}", model));
                }
                if let Some(number) = &action.number {
                    line.push_str(&format!(" {}", number));
                }
                line.push(')');
            }
            out.push_str(&format!(
                "• {}: {}\n",
                line,
                action.timestamp.format("%Y-%m-%d %H:%M:%S")
            ));
        }
    }

    out.trim_end().to_string()
}

fn push_pairs(out: &mut String, header: &str, pairs: &[(String, i64)]) {
    if pairs.is_empty() {
        return;
    }
    out.push_str(header);
    out.push('\n');
    for (key, count) in pairs {
        out.push_str(&format!("• {}: {}\n", key, count));
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::TopUser;
    use chrono::NaiveDate;

    fn snapshot() -> DailyStatsSnapshot {
        DailyStatsSnapshot {
            date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            total_users: 12,
            new_users: 3,
            total_actions: 57,
            device_stats: vec![("C750".to_string(), 20), ("XP365B".to_string(), 4)],
            question_stats: vec![("Не включается".to_string(), 9)],
            top_users: vec![TopUser {
                user_id: 7,
                username: Some("alice".to_string()),
                first_name: None,
                action_count: 15,
            }],
        }
    }

    #[test]
    fn daily_report_includes_all_sections() {
        let report = format_daily(&snapshot());
        assert!(report.contains("за 2025-06-01"));
        assert!(report.contains("• Всего пользователей: 12"));
        assert!(report.contains("• Новых за день: 3"));
        assert!(report.contains("• C750: 20"));
        assert!(report.contains("• Не включается: 9"));
        assert!(report.contains("• alice: 15 действий"));
    }

    #[test]
    fn daily_report_omits_empty_sections() {
        let mut stats = snapshot();
        stats.device_stats.clear();
        stats.question_stats.clear();
        stats.top_users.clear();

        let report = format_daily(&stats);
        assert!(!report.contains("Популярные номера"));
        assert!(!report.contains("Популярные вопросы"));
        assert!(!report.contains("Активные пользователи"));
    }

    #[test]
    fn period_report_shows_weekly_breakdown_when_present() {
        let stats = PeriodStats {
            unique_users: 4,
            total_actions: 30,
            daily_actions: vec![("2025-06-01".to_string(), 30)],
            weekly_actions: vec![("2025-22".to_string(), 30)],
            device_stats: vec![],
            question_stats: vec![],
            top_users: vec![],
        };
        let report = format_period("месяц", &stats);
        assert!(report.contains("Неделя 2025-22: 30 действий"));
        assert!(report.contains("• 2025-06-01: 30 действий"));
    }

    #[test]
    fn top_user_falls_back_to_id() {
        let user = TopUser {
            user_id: 42,
            username: None,
            first_name: None,
            action_count: 1,
        };
        assert_eq!(user.display_name(), "ID42");
    }
}
