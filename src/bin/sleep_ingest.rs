//! Sleep Ingest CLI - Command-line interface for sleep extraction
//!
//! Commands:
//! - extract: Run the pipeline and write interval/night rows
//! - stages: Print per-night, per-stage totals
//! - info: Print export header metadata
//! - schema: Describe the output rows

use clap::{Parser, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sleep_ingest::encoder::BatchEncoder;
use sleep_ingest::sink::{NdjsonSink, SleepSink};
use sleep_ingest::{
    read_export_header, IngestConfig, IngestError, SleepExtraction, SleepPipeline,
    INGEST_VERSION,
};

/// Sleep Ingest - extract sleep stages and nightly metrics from health exports
#[derive(Parser)]
#[command(name = "sleep-ingest")]
#[command(version = INGEST_VERSION)]
#[command(about = "Extract sleep stages and nightly sleep metrics from a health export", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline and write interval and night rows
    Extract {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        format: OutputFormat,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Succeed even when the export has no sleep records
        #[arg(long)]
        allow_empty: bool,
    },

    /// Print per-night, per-stage totals
    Stages {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print export header metadata (locale, export date, personal characteristics)
    Info {
        /// Export file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Describe the output rows
    Schema {
        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

#[derive(clap::Args)]
struct PipelineArgs {
    /// Record category to extract (overrides SLEEP_INGEST_RECORD_TYPE)
    #[arg(long)]
    record_type: Option<String>,

    /// Local hour at which a night begins, 0-23 (overrides SLEEP_INGEST_NIGHT_BOUNDARY_HOUR)
    #[arg(long)]
    night_boundary_hour: Option<u32>,
}

impl PipelineArgs {
    fn build(self) -> Result<SleepPipeline, CliError> {
        let mut config = IngestConfig::from_env()?;
        if let Some(record_type) = self.record_type {
            config.record_type = record_type;
        }
        if let Some(hour) = self.night_boundary_hour {
            config.night_boundary_hour = hour;
        }
        Ok(SleepPipeline::new(config)?)
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON rows tagged with `kind`
    Ndjson,
    /// One JSON batch with intervals, nights, stages and the run report
    Batch,
    /// Pretty-printed JSON batch
    BatchPretty,
}

fn main() -> ExitCode {
    init_logging();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&ErrorReport::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("sleep_ingest=info"));

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Extract {
            input,
            output,
            format,
            pipeline,
            allow_empty,
        } => cmd_extract(&input, &output, format, pipeline.build()?, allow_empty),

        Commands::Stages {
            input,
            pipeline,
            json,
        } => cmd_stages(&input, pipeline.build()?, json),

        Commands::Info { input, json } => cmd_info(&input, json),

        Commands::Schema { json_schema } => cmd_schema(json_schema),
    }
}

fn cmd_extract(
    input: &Path,
    output: &Path,
    format: OutputFormat,
    pipeline: SleepPipeline,
    allow_empty: bool,
) -> Result<(), CliError> {
    // Output is opened only after a successful, non-empty run
    let extraction = pipeline.run(open_input(input)?)?;
    if extraction.is_empty() && !allow_empty {
        return Err(CliError::NoSleepRecords {
            record_type: pipeline.config().record_type.clone(),
        });
    }

    let mut writer = open_output(output)?;
    match format {
        OutputFormat::Ndjson => {
            let mut sink = NdjsonSink::new(writer);
            sink.write_intervals(&extraction.intervals)?;
            sink.upsert_nights(&extraction.nights)?;
        }
        OutputFormat::Batch | OutputFormat::BatchPretty => {
            let batch = BatchEncoder::new().encode(extraction);
            if matches!(format, OutputFormat::BatchPretty) {
                serde_json::to_writer_pretty(&mut writer, &batch)?;
            } else {
                serde_json::to_writer(&mut writer, &batch)?;
            }
            writeln!(writer)?;
            writer.flush()?;
        }
    }

    Ok(())
}

fn cmd_stages(input: &Path, pipeline: SleepPipeline, json: bool) -> Result<(), CliError> {
    let SleepExtraction { stages, .. } = pipeline.run(open_input(input)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&stages)?);
        return Ok(());
    }

    println!(
        "{:<10}  {:<18}  {:>7}  {:>9}  {:<25}  {:<25}",
        "night", "stage", "minutes", "intervals", "first_event", "last_event"
    );
    for row in &stages {
        println!(
            "{:<10}  {:<18}  {:>7}  {:>9}  {:<25}  {:<25}",
            row.date,
            row.stage,
            row.total_minutes,
            row.interval_count,
            row.first_event.to_rfc3339(),
            row.last_event.to_rfc3339()
        );
    }

    Ok(())
}

fn cmd_info(input: &Path, json: bool) -> Result<(), CliError> {
    let header = read_export_header(open_input(input)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&header)?);
        return Ok(());
    }

    println!("Export Header");
    println!("=============");
    println!("Locale:      {}", header.locale.as_deref().unwrap_or("-"));
    println!(
        "Export date: {}",
        header
            .export_instant()
            .map(|t| t.to_rfc3339())
            .or(header.export_date.clone())
            .unwrap_or_else(|| "-".to_string())
    );
    if !header.me.is_empty() {
        println!("\nCharacteristics:");
        for (key, value) in &header.me {
            println!("  {key}: {value}");
        }
    }

    Ok(())
}

fn cmd_schema(json_schema: bool) -> Result<(), CliError> {
    if json_schema {
        println!("{}", get_rows_json_schema());
        return Ok(());
    }

    println!("Output rows (ndjson, tagged by \"kind\")");
    println!();
    println!("interval - one per accepted sleep record");
    println!("  stage: in_bed, asleep_unspecified, awake, asleep_core, asleep_deep, asleep_rem, unknown");
    println!("  start, end: RFC 3339 with the export's original offset");
    println!("  duration_minutes: whole minutes, truncated");
    println!("  night: YYYY-MM-DD bucket from the local start date");
    println!("  source_name, record_type, source_version, device, unit, creation_date, value");
    println!();
    println!("night - one per night bucket, ascending by date");
    println!("  sleep_start, sleep_end: span of asleep intervals");
    println!("  total_sleep_minutes, total_sleep_hours, time_in_bed_minutes, sleep_efficiency_pct");
    println!("  asleep_core/deep/rem_minutes and _pct (share of total sleep)");
    println!("  awake_minutes, awake_pct (share of time in bed)");
    println!("  source_name: first source seen for the night");

    Ok(())
}

// Helper functions

fn open_input(path: &Path) -> Result<Box<dyn BufRead>, CliError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdin().lock()));
    }

    let file = File::open(path).map_err(|e| {
        IngestError::DocumentUnreadable(format!("cannot open {}: {e}", path.display()))
    })?;
    Ok(Box::new(BufReader::new(file)))
}

fn open_output(path: &Path) -> Result<Box<dyn Write>, CliError> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(io::stdout().lock()));
    }
    Ok(Box::new(BufWriter::new(File::create(path)?)))
}

fn get_rows_json_schema() -> String {
    let timestamp = serde_json::json!({ "type": "string", "format": "date-time" });
    let nullable_timestamp = serde_json::json!({ "type": ["string", "null"], "format": "date-time" });
    let nullable_string = serde_json::json!({ "type": ["string", "null"] });

    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "sleep-ingest rows",
        "oneOf": [
            {
                "title": "interval",
                "type": "object",
                "required": ["kind", "stage", "start", "end", "duration_minutes", "night", "record_type"],
                "properties": {
                    "kind": { "const": "interval" },
                    "stage": {
                        "enum": ["in_bed", "asleep_unspecified", "awake", "asleep_core", "asleep_deep", "asleep_rem", "unknown"]
                    },
                    "start": timestamp,
                    "end": timestamp,
                    "duration_minutes": { "type": "integer", "minimum": 0 },
                    "night": { "type": "string", "format": "date" },
                    "source_name": nullable_string,
                    "record_type": { "type": "string" },
                    "source_version": nullable_string,
                    "device": nullable_string,
                    "unit": nullable_string,
                    "creation_date": nullable_string,
                    "value": nullable_string
                }
            },
            {
                "title": "night",
                "type": "object",
                "required": ["kind", "date", "total_sleep_minutes", "time_in_bed_minutes", "sleep_efficiency_pct"],
                "properties": {
                    "kind": { "const": "night" },
                    "date": { "type": "string", "format": "date" },
                    "sleep_start": nullable_timestamp,
                    "sleep_end": nullable_timestamp,
                    "total_sleep_minutes": { "type": "integer" },
                    "total_sleep_hours": { "type": "number" },
                    "time_in_bed_minutes": { "type": "integer" },
                    "sleep_efficiency_pct": { "type": "number" },
                    "asleep_core_minutes": { "type": "integer" },
                    "asleep_deep_minutes": { "type": "integer" },
                    "asleep_rem_minutes": { "type": "integer" },
                    "awake_minutes": { "type": "integer" },
                    "asleep_core_pct": { "type": "number" },
                    "asleep_deep_pct": { "type": "number" },
                    "asleep_rem_pct": { "type": "number" },
                    "awake_pct": { "type": "number" },
                    "source_name": nullable_string
                }
            }
        ]
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum CliError {
    Io(io::Error),
    Ingest(IngestError),
    Json(serde_json::Error),
    NoSleepRecords { record_type: String },
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Io(e)
    }
}

impl From<IngestError> for CliError {
    fn from(e: IngestError) -> Self {
        CliError::Ingest(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct ErrorReport {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<CliError> for ErrorReport {
    fn from(e: CliError) -> Self {
        match e {
            CliError::Io(e) => ErrorReport {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            CliError::Ingest(IngestError::DocumentUnreadable(msg)) => ErrorReport {
                code: "DOCUMENT_UNREADABLE".to_string(),
                message: msg,
                hint: Some("Ensure the input is a complete, well-formed export.xml".to_string()),
            },
            CliError::Ingest(IngestError::InvalidConfig(msg)) => ErrorReport {
                code: "INVALID_CONFIG".to_string(),
                message: msg,
                hint: Some("Check --night-boundary-hour and SLEEP_INGEST_* variables".to_string()),
            },
            CliError::Ingest(e) => ErrorReport {
                code: "INGEST_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CliError::Json(e) => ErrorReport {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            CliError::NoSleepRecords { record_type } => ErrorReport {
                code: "NO_SLEEP_RECORDS".to_string(),
                message: format!("No {record_type} records found in input"),
                hint: Some("Check --record-type, or pass --allow-empty".to_string()),
            },
        }
    }
}
