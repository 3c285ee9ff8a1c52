//! Terminal front end. Each subcommand is one user action on the calendar.

use chrono::{Datelike, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::Path;
use std::time::Duration;

use crate::commands::AppState;
use crate::config::{self, Config};
use crate::date_key;
use crate::error::{Error, Result};
use crate::models::{FlowLevel, Mood, PredictedDay};
use crate::notify::Notifier;
use crate::storage::{FileStore, KeyValueStore, SealedStore};

#[derive(Parser, Debug)]
#[command(name = "lunacal")]
#[command(version, about = "Private period calendar with cycle predictions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Toggle the period mark on a day
    Period { day: String },

    /// Toggle the ovulation mark on a day
    Ovulation { day: String },

    /// Set flow (1-3 or light/medium/heavy); repeating the same level clears it
    Flow { day: String, level: FlowLevel },

    /// Set the mood for a day; repeating the same mood clears it
    Mood { day: String, mood: Mood },

    /// Replace the notes for a day; no text clears them
    Note { day: String, text: Vec<String> },

    /// Mark a range of days as a period
    Range { start: String, end: Option<String> },

    /// Mark today as a period day
    Today,

    /// Delete the whole period starting on a day
    DeletePeriod { start: String },

    /// Remove everything logged on a day
    Clear { day: String },

    /// List predicted periods, ovulation days and fertile windows
    Predict,

    /// Show cycle statistics
    Stats,

    /// Show the most recent periods
    Recent {
        #[arg(default_value_t = 3)]
        count: usize,
    },

    /// Show a month (YYYY-MM, default current month)
    Month { month: Option<String> },

    /// Suggest when the next period starts
    Suggest,

    /// Print the whole log as JSON
    Export,

    /// Write a default config.toml into the data directory
    Init {
        /// Replace an existing config.toml
        #[arg(long)]
        force: bool,
    },

    /// Delete the stored log, including one sealed with a lost passphrase
    Wipe {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

/// Open the configured store and run one command against it.
pub fn run(cli: Cli) -> Result<()> {
    let home = config::resolve_home()?;
    if let Commands::Init { force } = cli.command {
        return init(&home, force);
    }
    let config = Config::load_from_dir(&home)?;

    let files = FileStore::new(&home);
    let store: Box<dyn KeyValueStore> = match config::passphrase_from_env() {
        Some(passphrase) => Box::new(SealedStore::new(files, passphrase)),
        None => Box::new(files),
    };
    let notifier = Notifier::with_delay(Duration::from_millis(config.notice_delay_ms));
    let mut state = AppState::load(store, &config.namespace, notifier);
    if state.is_read_only() {
        eprintln!(
            "Warning: the stored log could not be opened; changes will not be saved (check {})",
            config::PASSPHRASE_ENV
        );
    }

    let result = execute(&mut state, &config, cli.command, date_key::today());
    // The process is about to exit, so debounced notices fire now.
    for notice in state.flush_notices() {
        println!("{notice}");
    }
    result
}

fn init(home: &Path, force: bool) -> Result<()> {
    let path = home.join(config::CONFIG_FILE);
    if path.exists() && !force {
        println!("{} already exists; use --force to replace it", path.display());
        return Ok(());
    }
    Config::default().save_to_dir(home)?;
    println!("Wrote {}", path.display());
    Ok(())
}

fn day(input: &str, today: NaiveDate) -> Result<NaiveDate> {
    date_key::resolve(input, today).ok_or_else(|| Error::InvalidDate(input.to_string()))
}

fn execute<S: KeyValueStore>(
    state: &mut AppState<S>,
    config: &Config,
    command: Commands,
    today: NaiveDate,
) -> Result<()> {
    match command {
        Commands::Period { day: d } => {
            state.toggle_period(day(&d, today)?)?;
        }
        Commands::Ovulation { day: d } => {
            state.toggle_ovulation(day(&d, today)?)?;
        }
        Commands::Flow { day: d, level } => {
            state.set_flow(day(&d, today)?, level)?;
        }
        Commands::Mood { day: d, mood } => {
            state.set_mood(day(&d, today)?, mood)?;
        }
        Commands::Note { day: d, text } => {
            state.save_notes(day(&d, today)?, &text.join(" "))?;
        }
        Commands::Range { start, end } => {
            let start = day(&start, today)?;
            let end = end.map(|e| day(&e, today)).transpose()?;
            let marked = state.log_period_range(start, end)?;
            println!("{marked} day(s) marked");
        }
        Commands::Today => state.quick_log_today(today)?,
        Commands::DeletePeriod { start } => {
            let removed = state.delete_period(day(&start, today)?)?;
            if removed == 0 {
                println!("No period starts on {start}");
            }
        }
        Commands::Clear { day: d } => {
            if !state.clear_day(day(&d, today)?)? {
                println!("Nothing logged on {d}");
            }
        }
        Commands::Predict => print_predictions(state, config),
        Commands::Stats => print_stats(state),
        Commands::Recent { count } => {
            let recent = state.recent_periods(count);
            if recent.is_empty() {
                println!("No periods logged yet");
            }
            for period in recent {
                println!("{}  {} days", date_key::format(period.start), period.length);
            }
        }
        Commands::Month { month } => {
            let (year, month) = match month {
                Some(m) => parse_month(&m)?,
                None => (today.year(), today.month()),
            };
            print_month(state, config, year, month, today)?;
        }
        Commands::Suggest => {
            println!("{}", date_key::format(state.suggested_next_start(today)));
        }
        Commands::Export => println!("{}", state.export_json()?),
        Commands::Wipe { yes } => {
            if !yes {
                println!("This deletes every logged day; run again with --yes to confirm");
            } else {
                state.wipe()?;
            }
        }
        Commands::Init { .. } => unreachable!("init runs before the store is opened"),
    }
    Ok(())
}

fn parse_month(input: &str) -> Result<(i32, u32)> {
    NaiveDate::parse_from_str(&format!("{}-01", input.trim()), "%Y-%m-%d")
        .map(|first| (first.year(), first.month()))
        .map_err(|_| Error::InvalidMonth(input.to_string()))
}

fn prediction_labels(day: &PredictedDay, show_fertility: bool) -> Vec<&'static str> {
    let mut labels = Vec::new();
    if day.predicted_period {
        labels.push("period");
    }
    if show_fertility && day.predicted_ovulation {
        labels.push("ovulation");
    }
    if show_fertility && day.fertile_window {
        labels.push("fertile");
    }
    labels
}

fn print_predictions<S: KeyValueStore>(state: &AppState<S>, config: &Config) {
    if state.predictions().is_empty() {
        println!("Not enough history for predictions; log at least two periods");
        return;
    }
    for (date, predicted) in state.predictions().iter() {
        let labels = prediction_labels(predicted, config.show_fertility);
        if !labels.is_empty() {
            println!("{}  {}", date_key::format(date), labels.join(", "));
        }
    }
}

fn print_stats<S: KeyValueStore>(state: &AppState<S>) {
    let stats = state.stats();
    let or_dash = |v: Option<String>| v.unwrap_or_else(|| "-".to_string());
    println!("Periods logged:       {}", stats.total_periods);
    println!(
        "Average cycle:        {}",
        or_dash(stats.avg_cycle_length.map(|v| format!("{v} days")))
    );
    println!(
        "Shortest cycle:       {}",
        or_dash(stats.shortest_cycle.map(|v| format!("{v} days")))
    );
    println!(
        "Longest cycle:        {}",
        or_dash(stats.longest_cycle.map(|v| format!("{v} days")))
    );
    println!(
        "Average period:       {}",
        or_dash(stats.avg_period_length.map(|v| format!("{v:.1} days")))
    );
    println!(
        "Last period:          {}",
        or_dash(stats.last_period_start.map(date_key::format))
    );
}

fn print_month<S: KeyValueStore>(
    state: &AppState<S>,
    config: &Config,
    year: i32,
    month: u32,
    today: NaiveDate,
) -> Result<()> {
    let data = state
        .month(year, month, today)
        .ok_or_else(|| Error::InvalidMonth(format!("{year}-{month:02}")))?;

    println!("{year}-{month:02}");
    for day in &data.days {
        let mut parts = Vec::new();
        if let Some(record) = &day.record {
            if record.period {
                parts.push(match record.flow {
                    Some(flow) => format!("period ({})", flow.label().to_lowercase()),
                    None => "period".to_string(),
                });
            }
            if record.ovulation {
                parts.push("ovulation".to_string());
            }
            if let Some(mood) = record.mood {
                parts.push(format!("mood: {}", mood.label().to_lowercase()));
            }
            if let Some(notes) = &record.notes {
                parts.push(format!("\"{notes}\""));
            }
        }
        if let Some(predicted) = &day.prediction {
            let labels = prediction_labels(predicted, config.show_fertility);
            if !labels.is_empty() {
                parts.push(format!("predicted {}", labels.join(", ")));
            }
        }
        let marker = if day.is_today { "*" } else { " " };
        if !parts.is_empty() || day.is_today {
            println!("{marker} {}  {}", date_key::format(day.date), parts.join("; "));
        }
    }
    Ok(())
}
