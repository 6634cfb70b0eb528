use std::time::Duration;

use daymark::ai::PlanRelay;
use daymark::auth::Identity;
use daymark::config::DaymarkConfig;
use daymark::core::clock;
use daymark::events::EventBus;
use daymark::reminder::{LogNotifier, ReminderSweeper};
use daymark::session::score::ScoreKeeper;
use daymark::session::SessionTasks;
use daymark::store::rest::RestStore;

const SWEEP_CADENCE: Duration = Duration::from_secs(3600);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = DaymarkConfig::load();
    setup_logging(&config);
    if !DaymarkConfig::path().exists() {
        if let Err(e) = config.save() {
            log::warn!("could not write default config: {e}");
        }
    }

    let store = RestStore::new(&config.store_url, Duration::from_secs(config.poll_secs))?;
    let identity = identity_from_env()?;

    let args: Vec<String> = std::env::args().collect();
    if args.iter().any(|a| a == "--sweep") {
        let owner = identity.require_verified()?.clone();
        let sweeper = ReminderSweeper::new(store, LogNotifier, SWEEP_CADENCE);
        log::info!("starting reminder sweeper for {owner}");
        sweeper.run(vec![owner]).await;
        return Ok(());
    }

    let bus = EventBus::new();
    let relay = PlanRelay::new(config.api_key(), &config.model);
    let mut session = SessionTasks::new(store.clone(), &identity, bus)?
        .with_relay(relay)
        .with_freshness(Duration::from_secs(config.freshness_secs));
    session.load(clock::today()).await?;

    println!("Tasks for {}:", session.date());
    if session.tasks().is_empty() {
        println!("  (none)");
    }
    for task in session.tasks() {
        println!(
            "  [{}] {} (due {}, {})",
            task.status.as_str(),
            task.text,
            task.due.format("%H:%M"),
            task.priority.as_str()
        );
    }

    let keeper = ScoreKeeper::new(store, &identity)?;
    let board = keeper.recompute().await?;
    println!("Score: {}  Streak: {} day(s)", board.score, board.streak);

    if args.iter().any(|a| a == "--plan") {
        println!("\n{}", session.day_plan().await);
    }

    Ok(())
}

fn identity_from_env() -> Result<Identity, Box<dyn std::error::Error>> {
    let owner = std::env::var("DAYMARK_OWNER").map_err(|_| "DAYMARK_OWNER is not set")?;
    let email = std::env::var("DAYMARK_EMAIL").unwrap_or_else(|_| format!("{owner}@localhost"));
    Ok(Identity::new(owner, email, true))
}

// Logging goes to the systemd user journal (`journalctl --user -t daymark -f`).
// Wrapper filters: daymark crate at info/debug (per config), everything else at warn.
fn setup_logging(config: &DaymarkConfig) {
    struct FilteredJournal {
        inner: systemd_journal_logger::JournalLog,
    }

    impl log::Log for FilteredJournal {
        fn enabled(&self, metadata: &log::Metadata) -> bool {
            if metadata.target().starts_with("daymark") {
                let max = if daymark::debug_logging() {
                    log::LevelFilter::Debug
                } else {
                    log::LevelFilter::Info
                };
                metadata.level() <= max
            } else {
                metadata.level() <= log::LevelFilter::Warn
            }
        }
        fn log(&self, record: &log::Record) {
            if self.enabled(record.metadata()) {
                self.inner.log(record);
            }
        }
        fn flush(&self) {
            self.inner.flush();
        }
    }

    daymark::set_debug_logging(config.debug_logging);

    if let Ok(journal) = systemd_journal_logger::JournalLog::new() {
        let journal = journal.with_syslog_identifier("daymark".to_string());
        if log::set_boxed_logger(Box::new(FilteredJournal { inner: journal })).is_ok() {
            // Global max must be Debug so daymark debug logs can pass through when toggled
            log::set_max_level(log::LevelFilter::Debug);
        }
    }
}
