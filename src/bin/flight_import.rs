use std::ffi::OsString;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use clap::error::ErrorKind;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use flight_data_import::app::{ImportOptions, Importer};
use flight_data_import::config::ConfigLoader;
use flight_data_import::error::ImportError;
use flight_data_import::opensky::OpenSkyTrinoClient;
use flight_data_import::output::ConsoleOutput;
use flight_data_import::store::MongoFlightStore;
use flight_data_import::window;

#[derive(Debug, Parser)]
#[command(name = "flight-import")]
#[command(about = "Import OpenSky state vectors for one time window, replacing what the store holds for it")]
#[command(
    long_about = "Import OpenSky state vectors for one time window, replacing what the store holds for it.\n\n\
                  Without dates the most recent completed 15-minute slot four weeks ago is imported."
)]
#[command(version)]
struct Cli {
    /// Window start, UTC, "YYYY-MM-DD HH:MM"
    start: Option<String>,

    /// Window end, UTC, "YYYY-MM-DD HH:MM"
    end: Option<String>,

    /// Read credentials from this dotenv file instead of ./.env
    #[arg(long)]
    env_file: Option<Utf8PathBuf>,

    /// Create the position and time indexes before writing
    #[arg(long)]
    ensure_indexes: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<ImportError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &ImportError) -> u8 {
    match error {
        ImportError::InvalidArguments(_)
        | ImportError::MissingEnv(_)
        | ImportError::InvalidEnv { .. }
        | ImportError::EnvFile { .. } => 2,
        ImportError::StoreUnavailable(_) => 3,
        error if error.is_upstream() => 4,
        ImportError::NoData(_) => 5,
        ImportError::StoreWrite(_) => 6,
        _ => 1,
    }
}

fn parse_cli<I, T>(args: I) -> Result<Cli, ImportError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    Cli::try_parse_from(args).map_err(|err| match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
        _ => ImportError::InvalidArguments(err.to_string().trim_end().to_string()),
    })
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = parse_cli(std::env::args_os())?;
    let window = window::resolve(cli.start.as_deref(), cli.end.as_deref())?;
    println!("Starting Import with daterange: {window}");

    let config = ConfigLoader::resolve(cli.env_file.as_deref())?;
    let store = MongoFlightStore::connect(&config.store)?;
    let source = OpenSkyTrinoClient::new(config.opensky.clone())?;
    let importer = Importer::new(source, store, config.opensky.table);
    importer.check_store()?;

    let options = ImportOptions {
        ensure_indexes: cli.ensure_indexes,
    };
    let summary = importer.run(&window, &options, &ConsoleOutput)?;
    ConsoleOutput::print_summary(&summary).into_diagnostic()?;
    Ok(())
}
