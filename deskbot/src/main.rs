//! deskbot - menu-driven hardware support assistant
//!
//! Operational CLI around the deskbot core: statistics reports, the daily
//! snapshot job, retention cleanup, and an interactive walk mode that drives
//! the controller from stdin the way a chat transport would.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use deskbot_core::catalog::DeviceCatalog;
use deskbot_core::config::AdminConfig;
use deskbot_core::content::ContentResolver;
use deskbot_core::dispatch::{Command as BotCommand, Controller};
use deskbot_core::types::{Render, UserInfo};
use deskbot_core::{report, snapshot, Config, Database};

#[derive(Parser)]
#[command(name = "deskbot")]
#[command(about = "Menu-driven hardware support assistant")]
#[command(version)]
struct Args {
    /// Path to the statistics database (defaults to the XDG data dir)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Path to the config file (defaults to the XDG config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a statistics report
    Report {
        #[command(subcommand)]
        which: ReportKind,

        /// Emit JSON instead of the formatted report
        #[arg(long, global = true)]
        json: bool,
    },

    /// Aggregate and persist the daily snapshot, then print its report
    Snapshot {
        /// Date to aggregate (YYYY-MM-DD); defaults to yesterday in the
        /// configured timezone
        #[arg(long)]
        date: Option<NaiveDate>,
    },

    /// Delete action-log rows and snapshots past the retention window
    Cleanup {
        /// Retention window in days (defaults to the configured value)
        #[arg(long)]
        days: Option<u32>,
    },

    /// Drive the controller interactively from stdin
    ///
    /// Each line is either a command (/start, /stats, ...) or a raw
    /// callback payload (device_scanner, back_to_start, ...).
    Walk {
        /// User id to act as
        #[arg(long, default_value_t = 1)]
        user: i64,
    },
}

#[derive(Subcommand)]
enum ReportKind {
    /// One calendar date (defaults to today, UTC)
    Daily {
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// Rolling 7-day window
    Weekly,
    /// Rolling 30-day window
    Monthly,
    /// Lifetime statistics for one user
    User { id: i64 },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => Config::load_from(path).context("failed to load configuration")?,
        None => Config::load().context("failed to load configuration")?,
    };

    // Initialize logging
    let _log_guard =
        deskbot_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = args.db.clone().unwrap_or_else(Config::database_path);
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Commands::Report { which, json } => run_report(&db, which, json),
        Commands::Snapshot { date } => {
            let run = match date {
                Some(date) => snapshot::run_for_date(&db, date)?,
                None => snapshot::run_daily(&db, config.timezone.utc_offset_hours)?,
            };
            println!("{}", run.report);
            Ok(())
        }
        Commands::Cleanup { days } => {
            let days = days.unwrap_or(config.retention.days);
            let (actions, snapshots) = db.cleanup(days)?;
            println!(
                "Removed {} action(s) and {} snapshot(s) older than {} days",
                actions, snapshots, days
            );
            Ok(())
        }
        Commands::Walk { user } => run_walk(&config, db, user),
    }
}

fn run_report(db: &Database, which: ReportKind, json: bool) -> Result<()> {
    match which {
        ReportKind::Daily { date } => {
            let date = date.unwrap_or_else(|| chrono::Utc::now().date_naive());
            let stats = db.daily_stats(date)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", report::format_daily(&stats));
            }
        }
        ReportKind::Weekly => {
            let stats = db.weekly_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", report::format_period("неделю", &stats));
            }
        }
        ReportKind::Monthly => {
            let stats = db.monthly_stats()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", report::format_period("месяц", &stats));
            }
        }
        ReportKind::User { id } => {
            let stats = db.user_stats(id)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
            } else {
                println!("{}", report::format_user(&stats));
            }
        }
    }
    Ok(())
}

fn run_walk(config: &Config, db: Database, user_id: i64) -> Result<()> {
    let catalog = match &config.catalog.path {
        Some(path) => DeviceCatalog::load(path).context("failed to load catalog")?,
        None => DeviceCatalog::builtin(),
    };
    let controller = Controller::new(
        catalog,
        ContentResolver::new(config.content.base_path.clone()),
        db,
        AdminConfig {
            admin_ids: config.admin.admin_ids.clone(),
            admin_chat_id: config.admin.admin_chat_id,
        },
    );
    let user = UserInfo::new(user_id);

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    print_render(&mut stdout, &controller.handle_command(&user, BotCommand::Start)?)?;

    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let result = if line.starts_with('/') {
            match line.parse::<BotCommand>() {
                Ok(command) => controller.handle_command(&user, command),
                Err(e) => {
                    writeln!(stdout, "! {}", e)?;
                    continue;
                }
            }
        } else {
            controller.handle_event(&user, line)
        };

        match result {
            Ok(render) => print_render(&mut stdout, &render)?,
            Err(e) => writeln!(stdout, "! {}", e)?,
        }
    }
    Ok(())
}

/// Print a render instruction the way a transport would lay it out: the
/// text, then one line per button row with each label and its payload.
fn print_render(out: &mut impl Write, render: &Render) -> Result<()> {
    match render {
        Render::Menu { text, rows } => {
            writeln!(out, "{}", text)?;
            print_rows(out, rows)?;
        }
        Render::Content {
            caption,
            kind,
            path,
            rows,
        } => {
            writeln!(out, "{}", caption)?;
            if let Some(path) = path {
                writeln!(out, "[{}: {}]", kind.as_str(), path.display())?;
            }
            print_rows(out, rows)?;
        }
        Render::Notice { text } => writeln!(out, "{}", text)?,
    }
    writeln!(out)?;
    Ok(())
}

fn print_rows(out: &mut impl Write, rows: &[Vec<deskbot_core::types::MenuButton>]) -> Result<()> {
    for row in rows {
        let cells: Vec<String> = row
            .iter()
            .map(|b| format!("[{}] ({})", b.label, b.callback))
            .collect();
        writeln!(out, "  {}", cells.join("  "))?;
    }
    Ok(())
}
