//! uie CLI - Command-line interface for User Interaction Events
//!
//! Commands:
//! - replay: Replay a recorded session and print the queue payloads (batch mode)
//! - run: Drive a tracker from events streamed on stdin (streaming mode)
//! - schedule: Print a variant's timer schedule
//! - validate: Validate recorded input events

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::{DateTime, Utc};
use user_interaction_events::adapter::{
    parse_array, parse_event_line, parse_ndjson, parse_session, resolve_offset, validate_events,
    Session,
};
use user_interaction_events::pipeline::{activate, Emission, HostEnvironment, LiveDriver, Replay};
use user_interaction_events::{TrackerConfig, TrackerError, Variant, TRACKER_VERSION};

/// uie - Engagement beacons for an analytics event queue
#[derive(Parser)]
#[command(name = "uie")]
#[command(author = "Firebrand LLC")]
#[command(version = TRACKER_VERSION)]
#[command(about = "Classify user interaction intervals as active or inactive", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args, Clone)]
struct TrackerArgs {
    /// Tracker variant
    #[arg(long, value_enum)]
    variant: Option<VariantArg>,

    /// Override the event category
    #[arg(long)]
    category: Option<String>,

    /// Tracker configuration file (JSON)
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay a recorded session (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "session")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        /// Unload the page at this offset (ms); later work never runs
        #[arg(long)]
        until_ms: Option<u64>,

        /// Include the push time with each payload
        #[arg(long)]
        with_timing: bool,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Drive a tracker from NDJSON events on stdin (streaming mode)
    Run {
        /// Page-ready time for events carrying absolute timestamps (RFC3339)
        #[arg(long)]
        page_ready_at: Option<DateTime<Utc>>,

        /// Unload the page at this offset (ms) once input ends
        #[arg(long)]
        until_ms: Option<u64>,

        /// Fire every remaining timer once input ends
        #[arg(long, conflicts_with = "until_ms")]
        drain: bool,

        /// Include the push time with each payload
        #[arg(long)]
        with_timing: bool,

        /// Flush output after each record (`--flush false` to buffer)
        #[arg(long, default_value_t = true, action = ArgAction::Set)]
        flush: bool,

        #[command(flatten)]
        tracker: TrackerArgs,
    },

    /// Print the timer schedule
    Schedule {
        #[command(flatten)]
        tracker: TrackerArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate recorded input events
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "session")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum VariantArg {
    /// Four timers up to 67 seconds
    Classic,
    /// Seven timers up to 233 seconds
    Extended,
}

impl From<VariantArg> for Variant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Classic => Variant::Classic,
            VariantArg::Extended => Variant::Extended,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Session object with page_ready_at and events
    Session,
    /// JSON array of events
    Json,
    /// Newline-delimited JSON (one event per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one payload per line)
    Ndjson,
    /// JSON array of payloads
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), UieCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            until_ms,
            with_timing,
            tracker,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            until_ms,
            with_timing,
            &tracker,
        ),

        Commands::Run {
            page_ready_at,
            until_ms,
            drain,
            with_timing,
            flush,
            tracker,
        } => cmd_run(page_ready_at, until_ms, drain, with_timing, flush, &tracker),

        Commands::Schedule { tracker, json } => cmd_schedule(&tracker, json),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),
    }
}

fn load_config(args: &TrackerArgs) -> Result<TrackerConfig, UieCliError> {
    let mut config = match &args.config {
        Some(path) => TrackerConfig::from_json(&fs::read_to_string(path)?)?,
        None => TrackerConfig::default(),
    };
    if let Some(variant) = args.variant {
        config.variant = variant.into();
    }
    if let Some(category) = &args.category {
        config = config.with_event_category(category.clone());
    }
    Ok(config)
}

fn read_input(input: &Path) -> Result<String, UieCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn read_session(input: &Path, input_format: InputFormat) -> Result<Session, UieCliError> {
    let data = read_input(input)?;
    let session = match input_format {
        InputFormat::Session => parse_session(&data)?,
        InputFormat::Json => Session::from_events(parse_array(&data)?),
        InputFormat::Ndjson => Session::from_events(parse_ndjson(&data)?),
    };
    Ok(session)
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    until_ms: Option<u64>,
    with_timing: bool,
    tracker: &TrackerArgs,
) -> Result<(), UieCliError> {
    let config = load_config(tracker)?;
    let session = read_session(input, input_format)?;

    let mut replay = Replay::new(config);
    if let Some(until) = until_ms {
        replay = replay.with_until(until);
    }
    let report = replay.run(&session)?;

    if !report.activated {
        return Err(UieCliError::NotActivated);
    }

    let output_data = format_output(&report.emissions, &output_format, with_timing)?;
    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    if !report.failures.is_empty() {
        return Err(UieCliError::CallbacksFailed(report.failures.len()));
    }
    Ok(())
}

fn cmd_run(
    page_ready_at: Option<DateTime<Utc>>,
    until_ms: Option<u64>,
    drain: bool,
    with_timing: bool,
    flush: bool,
    tracker: &TrackerArgs,
) -> Result<(), UieCliError> {
    let config = load_config(tracker)?;
    let schedule = config.schedule()?;
    let tracker =
        activate(&HostEnvironment::default(), &config).ok_or(UieCliError::NotActivated)?;
    let mut driver = LiveDriver::new(tracker, schedule);

    if atty::is(atty::Stream::Stdin) {
        eprintln!("Reading events from the terminal; finish with Ctrl-D");
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut failures = 0;

    for line in stdin.lock().lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event = parse_event_line(&line)?;
        event.validate()?;
        let at_ms = resolve_offset(&event, page_ready_at)?;
        driver.dispatch(at_ms, &event);

        failures += driver.take_failures().len();
        write_emissions(&mut stdout, &driver.take_emissions(), with_timing)?;
        if flush {
            stdout.flush()?;
        }
    }

    let horizon = if drain {
        None
    } else {
        Some(until_ms.unwrap_or_else(|| driver.now_ms()))
    };
    driver.finish(horizon);
    failures += driver.take_failures().len();
    write_emissions(&mut stdout, &driver.take_emissions(), with_timing)?;
    stdout.flush()?;

    if failures > 0 {
        return Err(UieCliError::CallbacksFailed(failures));
    }
    Ok(())
}

fn write_emissions(
    out: &mut impl Write,
    emissions: &[Emission],
    with_timing: bool,
) -> Result<(), UieCliError> {
    for emission in emissions {
        let line = if with_timing {
            serde_json::to_string(emission)?
        } else {
            serde_json::to_string(&emission.payload)?
        };
        writeln!(out, "{}", line)?;
    }
    Ok(())
}

fn cmd_schedule(tracker: &TrackerArgs, json: bool) -> Result<(), UieCliError> {
    let config = load_config(tracker)?;
    let schedule = config.schedule()?;

    if json {
        println!("{}", serde_json::to_string_pretty(schedule.ticks())?);
    } else {
        println!("Category: {}", config.category());
        println!("Queue:    {:?}", config.queue_policy());
        println!();
        for tick in schedule.ticks() {
            println!("  {:>7}ms  {}", tick.delay_ms, tick.label);
        }
    }
    Ok(())
}

fn cmd_validate(input: &Path, input_format: InputFormat, json: bool) -> Result<(), UieCliError> {
    let session = read_session(input, input_format)?;
    let results = validate_events(&session.events, session.page_ready_at);

    let errors: Vec<ValidationErrorDetail> = results
        .iter()
        .filter_map(|r| {
            r.result.as_ref().map(|e| ValidationErrorDetail {
                index: r.index,
                event_type: session.events[r.index].kind.dom_event().to_string(),
                error: e.to_string(),
            })
        })
        .collect();

    let report = ValidationReport {
        total_events: results.len(),
        valid_events: results.len() - errors.len(),
        invalid_events: errors.len(),
        errors,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for error in &report.errors {
                println!("  [{}] {}: {}", error.index, error.event_type, error.error);
            }
        }
    }

    if report.invalid_events > 0 {
        return Err(UieCliError::ValidationFailed(report.invalid_events));
    }
    Ok(())
}

fn format_output(
    emissions: &[Emission],
    format: &OutputFormat,
    with_timing: bool,
) -> Result<String, UieCliError> {
    let values: Vec<serde_json::Value> = emissions
        .iter()
        .map(|e| {
            if with_timing {
                serde_json::to_value(e)
            } else {
                serde_json::to_value(&e.payload)
            }
        })
        .collect::<Result<_, _>>()?;

    match format {
        OutputFormat::Ndjson => {
            let mut output = String::new();
            for value in &values {
                output.push_str(&serde_json::to_string(value)?);
                output.push('\n');
            }
            Ok(output)
        }
        OutputFormat::Json => Ok(serde_json::to_string(&values)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(&values)? + "\n"),
    }
}

// Error types

#[derive(Debug)]
enum UieCliError {
    Io(io::Error),
    Tracker(TrackerError),
    Json(serde_json::Error),
    NotActivated,
    CallbacksFailed(usize),
    ValidationFailed(usize),
}

impl From<io::Error> for UieCliError {
    fn from(e: io::Error) -> Self {
        UieCliError::Io(e)
    }
}

impl From<TrackerError> for UieCliError {
    fn from(e: TrackerError) -> Self {
        UieCliError::Tracker(e)
    }
}

impl From<serde_json::Error> for UieCliError {
    fn from(e: serde_json::Error) -> Self {
        UieCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<UieCliError> for CliError {
    fn from(e: UieCliError) -> Self {
        match e {
            UieCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            UieCliError::Tracker(e) => CliError {
                code: "TRACKER_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Run 'uie validate' to check the input events".to_string()),
            },
            UieCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            UieCliError::NotActivated => CliError {
                code: "NOT_ACTIVATED".to_string(),
                message: "Tracker was not activated".to_string(),
                hint: Some("The session reports the DOM helper library as unavailable".to_string()),
            },
            UieCliError::CallbacksFailed(count) => CliError {
                code: "CALLBACKS_FAILED".to_string(),
                message: format!("{} callbacks raised while pushing", count),
                hint: Some("Define the event queue or use --variant extended".to_string()),
            },
            UieCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    event_type: String,
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_flush(args: &[&str]) -> bool {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Run { flush, .. } => flush,
            _ => panic!("expected the run command"),
        }
    }

    #[test]
    fn test_run_flushes_by_default() {
        assert!(run_flush(&["uie", "run"]));
    }

    #[test]
    fn test_run_flush_can_be_turned_off() {
        assert!(!run_flush(&["uie", "run", "--flush", "false"]));
        assert!(run_flush(&["uie", "run", "--flush", "true"]));
    }
}
