use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use wetterfee::app::{DataManager, FetchResult, ResolveResult};
use wetterfee::archive::FtpSession;
use wetterfee::config::{ConfigLoader, Overrides};
use wetterfee::domain::{DataSource, Frequency, Period, StationQuery};
use wetterfee::error::WetterfeeError;
use wetterfee::extract::Value;
use wetterfee::output::{CsvOutput, JsonOutput, OutputMode};

#[derive(Parser)]
#[command(name = "wetterfee")]
#[command(about = "Fetch daily climate records of German weather stations from the DWD archive")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[arg(long, global = true, help = "Path to a wetterfee.json settings file")]
    config: Option<String>,

    #[arg(long, global = true, help = "Archive host, e.g. opendata.dwd.de:21")]
    host: Option<String>,

    #[arg(long, global = true, help = "Directory holding downloaded files")]
    data_dir: Option<String>,

    #[arg(long, global = true)]
    frequency: Option<Frequency>,

    #[arg(long, global = true)]
    period: Option<Period>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "List stations whose description matches a name or pattern")]
    Resolve(ResolveArgs),
    #[command(about = "Fetch the records of one station by id or name")]
    Fetch(FetchArgs),
}

#[derive(Args)]
struct ResolveArgs {
    query: String,
}

#[derive(Args)]
struct FetchArgs {
    station: String,

    #[arg(long, help = "Write the records as CSV to this file")]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<WetterfeeError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &WetterfeeError) -> u8 {
    match error {
        WetterfeeError::NoMatch(_)
        | WetterfeeError::AmbiguousMatch { .. }
        | WetterfeeError::StationFileNotFound(_)
        | WetterfeeError::AmbiguousOrMissingFile { .. }
        | WetterfeeError::NotFound(_) => 2,
        WetterfeeError::Connection { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    let overrides = Overrides {
        host: cli.host,
        data_dir: cli.data_dir,
        frequency: cli.frequency,
        period: cli.period,
    };
    let settings = ConfigLoader::resolve(cli.config.as_deref(), overrides)?;
    let session = FtpSession::from_settings(&settings);
    let mut manager = DataManager::new(settings, session);

    match cli.command {
        Commands::Resolve(args) => {
            let result = manager.resolve(&args.query)?;
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_resolve(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    print_resolve_summary(&result);
                    Ok(())
                }
            }
        }
        Commands::Fetch(args) => {
            let query = args.station.parse::<StationQuery>()?;
            let result = manager.get_weather_data(&query)?;
            if let Some(output) = args.output {
                CsvOutput::write_file(&result.dataset, &Utf8PathBuf::from(output))?;
            }
            match output_mode {
                OutputMode::NonInteractive => JsonOutput::print_fetch(&result).into_diagnostic(),
                OutputMode::Interactive => {
                    print_fetch_summary(&result);
                    Ok(())
                }
            }
        }
    }
}

fn print_resolve_summary(result: &ResolveResult) {
    if result.stations.is_empty() {
        println!("no station matches `{}`", result.query);
        return;
    }
    for station in &result.stations {
        println!("{}  {}", station.id.padded(), station.name);
    }
}

fn print_fetch_summary(result: &FetchResult) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    let color = match result.source {
        DataSource::Cache => green,
        DataSource::Download => cyan,
    };
    let name = result.station_name.as_deref().unwrap_or("-");
    println!(
        "{color}station {} ({name}) from {}{reset}",
        result.station_id.padded(),
        result.source
    );
    println!("   file: {}", result.path);
    println!(
        "   {} rows, columns: {}",
        result.dataset.len(),
        result.dataset.columns.join(", ")
    );

    let dates = result
        .dataset
        .iter()
        .filter_map(|row| row.values().iter().find_map(Value::as_date))
        .collect::<Vec<_>>();
    if let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) {
        println!("   from {first} to {last}");
    }
}
