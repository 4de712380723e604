use std::{env, io, io::Read};

use clap::{Args, Parser, Subcommand};
use ordergen::{
    config::{self, Config},
    order::{Generator, random_seed},
    run::{self, Summary},
    timestream::{self, Timestream},
    writer::{DryRun, OrderWriter, Writer},
};
use tokio::runtime::Builder;
use tracing::{debug, error, info};
use tracing_subscriber::{EnvFilter, util::SubscriberInitExt};

const CONFIG_ENV: &str = "ORDERGEN_CONFIG";

#[derive(thiserror::Error, Debug)]
enum Error {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Invalid ordergen config: {0}")]
    Config(#[from] config::Error),
    #[error("Failed to set up the Timestream client: {0}")]
    Setup(#[from] timestream::Error),
    #[error("Run aborted: {0}")]
    Write(#[from] run::Error),
}

#[derive(Parser)]
#[clap(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate orders and write them
    Run(RunCommand),
    /// Validate configuration and exit
    ConfigCheck(ConfigCheckCommand),
}

#[derive(Args)]
struct RunCommand {
    /// path on disk to the configuration file, defaults are used when absent
    #[clap(long)]
    config_path: Option<String>,
    /// number of orders to write, overrides the configuration
    #[clap(long)]
    record_count: Option<u64>,
    /// print each request as JSON instead of sending it
    #[clap(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ConfigCheckCommand {
    /// path on disk to the configuration file
    #[clap(long)]
    config_path: Option<String>,
}

/// Configuration from `env_config` if set, else from the file at
/// `config_path`, else the empty document.
fn load_config_contents(
    env_config: Option<String>,
    config_path: Option<&str>,
) -> Result<String, Error> {
    if let Some(contents) = env_config {
        debug!("Using config from env var '{CONFIG_ENV}'");
        return Ok(contents);
    }
    let Some(config_path) = config_path else {
        debug!("No configuration given, using defaults");
        return Ok(String::new());
    };

    debug!("Attempting to open configuration file at: {config_path}");
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .open(config_path)
        .map_err(|err| {
            error!("Could not read config file '{config_path}': {err}");
            err
        })?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    Ok(contents)
}

fn get_config(config_path: Option<&str>) -> Result<Config, Error> {
    let contents = load_config_contents(env::var(CONFIG_ENV).ok(), config_path)?;
    Config::from_yaml(&contents).map_err(|err| {
        error!("Configuration validation failed: {err}");
        Error::Config(err)
    })
}

/// Dry-run requests go to stderr so stdout carries only the order lines.
async fn build_writer(config: &Config, dry_run: bool) -> Result<Box<dyn Writer>, Error> {
    if dry_run {
        info!("Dry run, requests are printed to stderr instead of sent");
        return Ok(Box::new(DryRun::new(io::stderr())));
    }
    Ok(Box::new(Timestream::new(config).await?))
}

async fn inner_main<W, O>(config: &Config, writer: W, console: &mut O) -> Result<Summary, Error>
where
    W: Writer,
    O: io::Write,
{
    let seed = config.seed.unwrap_or_else(random_seed);
    info!(?seed, "Seeding order ids");

    let writer = OrderWriter::new(writer, &config.database, &config.table);
    let mut generator = Generator::new(seed);
    let summary = run::run(&writer, &mut generator, config.record_count, console).await?;
    Ok(summary)
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_ansi(false)
        .with_writer(io::stderr)
        .finish()
        .init();

    let version = env!("CARGO_PKG_VERSION");
    info!("Starting ordergen {version} run.");

    let cli = Cli::parse();
    let (config_path, record_count, dry_run) = match cli.command {
        Commands::Run(run) => (run.config_path, run.record_count, run.dry_run),
        Commands::ConfigCheck(check) => match get_config(check.config_path.as_deref()) {
            Ok(_) => {
                info!("Configuration file is valid");
                std::process::exit(0)
            }
            Err(_) => std::process::exit(1),
        },
    };

    let mut config = get_config(config_path.as_deref())?;
    if let Some(record_count) = record_count {
        config.record_count = record_count;
    }
    let runtime = Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let res = runtime.block_on(async {
        let writer = build_writer(&config, dry_run).await.map_err(|err| {
            error!("Setup failed: {err}");
            err
        })?;
        inner_main(&config, writer, &mut io::stdout()).await
    });
    match &res {
        Ok(summary) => info!("Wrote {} orders. Bye. :)", summary.written),
        Err(err) => error!("{err}"),
    }
    res.map(|_| ())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use clap::Parser;
    use ordergen::{config::Config, record::WriteRecords, writer::DryRun};

    use super::{Cli, Commands, inner_main, load_config_contents};

    #[test]
    fn run_command_parses() {
        let cli = Cli::parse_from([
            "ordergen",
            "run",
            "--config-path",
            "/etc/ordergen/ordergen.yaml",
            "--record-count",
            "3",
            "--dry-run",
        ]);
        match cli.command {
            Commands::Run(run) => {
                assert_eq!(
                    run.config_path.as_deref(),
                    Some("/etc/ordergen/ordergen.yaml")
                );
                assert_eq!(run.record_count, Some(3));
                assert!(run.dry_run);
            }
            Commands::ConfigCheck(_) => panic!("expected the run command"),
        }
    }

    #[test]
    fn config_check_parses_without_path() {
        let cli = Cli::parse_from(["ordergen", "config-check"]);
        assert!(matches!(
            cli.command,
            Commands::ConfigCheck(ref check) if check.config_path.is_none()
        ));
    }

    #[test]
    fn config_contents_precedence() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "record_count: 4").expect("write");
        let path = file.path().to_str().expect("utf8 path");

        let from_file = load_config_contents(None, Some(path)).expect("read");
        assert_eq!(from_file.trim(), "record_count: 4");

        let from_env =
            load_config_contents(Some("record_count: 9".to_string()), Some(path)).expect("env");
        assert_eq!(from_env, "record_count: 9");

        let defaults = load_config_contents(None, None).expect("defaults");
        assert!(defaults.is_empty());

        assert!(load_config_contents(None, Some("/nonexistent/ordergen.yaml")).is_err());
    }

    #[tokio::test]
    async fn inner_main_dry_run() {
        let config = Config {
            record_count: 3,
            seed: Some([5; 32]),
            ..Config::default()
        };
        let sink = DryRun::new(Vec::new());
        let mut console = Vec::new();
        let summary = inner_main(&config, &sink, &mut console)
            .await
            .expect("dry run succeeds");
        assert_eq!(summary.written, 3);

        // Order lines and request JSON land in separate streams.
        let console = String::from_utf8(console).expect("utf8");
        assert_eq!(console.lines().count(), 3);
        assert!(console.lines().all(|line| !line.starts_with('{')));
        let requests = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(requests.lines().count(), 3);
        for line in requests.lines() {
            let request: WriteRecords = serde_json::from_str(line).expect("json line");
            assert_eq!(request.table_name, "checkins");
        }
    }
}
