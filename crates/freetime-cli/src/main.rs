//! `freetime` CLI: expand calendars and report free time from the command line.
//!
//! ## Usage
//!
//! ```sh
//! # Occurrences per day (dates inclusive)
//! freetime events -i calendar.ics --from 2025-01-20 --to 2025-01-26
//!
//! # Free intervals per day with totals
//! freetime free -i calendar.ics --from 20.01.2025 --to 26.01.2025
//!
//! # Working hours only, ignore gaps of an hour or less
//! freetime free -i calendar.ics --from 2025-01-20 --to 2025-01-26 \
//!     --day-start 08.00 --day-end 18.00 --min-gap 60
//!
//! # Options from a JSON file (flags still override)
//! freetime free -i calendar.ics --from 2025-01-20 --to 2025-01-26 --config options.json
//!
//! # Turn a {"dd.mm.yyyy": ["hh.mm-hh.mm Title"]} plan into an .ics file
//! freetime export -i plan.json -o plan.ics
//! ```

use std::collections::BTreeMap;
use std::io::{self, Read};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use freetime_engine::{DayEnvelope, DayKey, DaySchedule, FreeTimeOptions};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "freetime",
    version,
    about = "Expand iCalendar feeds and report free time per day"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List event occurrences per day as JSON
    Events {
        /// Calendar file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// First day of the range (YYYY-MM-DD or dd.mm.yyyy)
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        /// Last day of the range, inclusive
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Report free intervals per day, total free hours, and free days as JSON
    Free {
        /// Calendar file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// First day of the range (YYYY-MM-DD or dd.mm.yyyy)
        #[arg(long, value_parser = parse_date)]
        from: NaiveDate,
        /// Last day of the range, inclusive
        #[arg(long, value_parser = parse_date)]
        to: NaiveDate,
        /// JSON file with free-time options
        #[arg(long)]
        config: Option<String>,
        /// Start of the usable day (hh.mm)
        #[arg(long)]
        day_start: Option<String>,
        /// End of the usable day (hh.mm)
        #[arg(long)]
        day_end: Option<String>,
        /// Gaps of this many minutes or fewer are not reported
        #[arg(long)]
        min_gap: Option<u32>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Convert a JSON day plan into iCalendar text
    Export {
        /// Plan file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
        /// Output file (writes to stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Events {
            input,
            from,
            to,
            output,
        } => {
            let payload = read_input(input.as_deref())?;
            let schedule = freetime_engine::expand_ics(&payload, from, to)
                .context("Failed to expand calendar")?;
            let json = serde_json::to_string_pretty(&schedule)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Free {
            input,
            from,
            to,
            config,
            day_start,
            day_end,
            min_gap,
            output,
        } => {
            let options = build_options(
                config.as_deref(),
                day_start.as_deref(),
                day_end.as_deref(),
                min_gap,
            )?;
            debug!(envelope = %options.envelope, min_gap = options.min_gap_minutes, "free-time options");

            let payload = read_input(input.as_deref())?;
            let schedule = freetime_engine::expand_ics(&payload, from, to)
                .context("Failed to expand calendar")?;
            let report = freetime_engine::compute_free(from, to, &schedule, &options)
                .context("Failed to compute free time")?;
            let json = serde_json::to_string_pretty(&report)?;
            write_output(output.as_deref(), &json)?;
        }
        Commands::Export { input, output } => {
            let json = read_input(input.as_deref())?;
            let plan: BTreeMap<String, Vec<String>> = serde_json::from_slice(&json)
                .context("Plan must be a JSON object of day -> entries")?;
            let schedule = DaySchedule::from_formatted(plan).context("Failed to read plan")?;
            write_output(output.as_deref(), &freetime_engine::to_ics(&schedule))?;
        }
    }

    Ok(())
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Accept both the ISO form a date picker emits and the `dd.mm.yyyy` day key form.
fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| raw.parse::<DayKey>().ok().map(|key| key.date()))
        .ok_or_else(|| format!("'{}' is not a date (use YYYY-MM-DD or dd.mm.yyyy)", raw))
}

/// Build options from defaults, then --config, then individual flags.
fn build_options(
    config: Option<&str>,
    day_start: Option<&str>,
    day_end: Option<&str>,
    min_gap: Option<u32>,
) -> Result<FreeTimeOptions> {
    let mut options = match config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path))?;
            serde_json::from_str(&raw).with_context(|| format!("Invalid config: {}", path))?
        }
        None => FreeTimeOptions::default(),
    };

    if day_start.is_some() || day_end.is_some() {
        let start = day_start.map(str::to_string).unwrap_or_else(|| {
            freetime_engine::interval::format_hhmm(options.envelope.start())
        });
        let end = day_end
            .map(str::to_string)
            .unwrap_or_else(|| freetime_engine::interval::format_hhmm(options.envelope.end()));
        options.envelope = DayEnvelope::parse(&start, &end).context("Invalid day envelope")?;
    }

    if let Some(gap) = min_gap {
        options.min_gap_minutes = gap;
    }

    Ok(options)
}

/// Raw bytes: text decoding is left to the engine, which reports bad
/// encodings as calendar parse errors.
fn read_input(path: Option<&str>) -> Result<Vec<u8>> {
    match path {
        Some(path) => std::fs::read(path).with_context(|| format!("Failed to read file: {}", path)),
        None => {
            let mut buf = Vec::new();
            io::stdin()
                .read_to_end(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn write_output(path: Option<&str>, content: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, content)
                .with_context(|| format!("Failed to write file: {}", path))?;
        }
        None => {
            print!("{}", content);
        }
    }
    Ok(())
}
