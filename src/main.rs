use clap::Parser;
use petstore_suite::cli::{Cli, Commands, OutputFormat, RunArgs};
use petstore_suite::config::{CONFIG_DIR_VAR, DEFAULT_CONFIG_DIR, DEFAULT_ENVIRONMENT, ENVIRONMENT_VAR};
use petstore_suite::scenarios::scenarios_for;
use petstore_suite::{CancellationToken, ScenarioRunner, Settings, StoreClient, NAME, VERSION};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose);
    log::debug!("{} v{}", NAME, VERSION);

    let settings = resolve_settings(&cli);

    let code = match cli.command {
        Commands::Config => {
            print_settings(&settings);
            0
        }
        Commands::Run(args) => run(settings, args).await,
    };
    process::exit(code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    let log_level = if verbose {
        "debug".to_string()
    } else {
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string())
    };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&log_level)).init();
}

/// Command line flags win over `ENV` and `PETSTORE_CONFIG_DIR`; without
/// either flag the process-wide settings are used
fn resolve_settings(cli: &Cli) -> Settings {
    if cli.environment.is_none() && cli.config_dir.is_none() {
        return Settings::global().clone();
    }

    let environment = cli
        .environment
        .clone()
        .or_else(|| std::env::var(ENVIRONMENT_VAR).ok())
        .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
    let config_dir = cli
        .config_dir
        .clone()
        .or_else(|| std::env::var(CONFIG_DIR_VAR).ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_DIR));
    Settings::resolve(&environment, &config_dir)
}

fn print_settings(settings: &Settings) {
    println!("environment:        {}", settings.environment);
    println!("base.url:           {}", settings.base_url);
    println!("request.timeout:    {} ms", settings.request_timeout.as_millis());
    println!("connection.timeout: {} ms", settings.connection_timeout.as_millis());
    println!("log.requests:       {}", settings.log_requests);
    println!("log.responses:      {}", settings.log_responses);
    println!("source:             {}", settings.source);
}

async fn run(settings: Settings, args: RunArgs) -> i32 {
    if let Err(e) = settings.validate() {
        eprintln!("Invalid configuration: {}", e);
        return 1;
    }

    let client = match StoreClient::new(&settings) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to build HTTP client: {}", e);
            return 1;
        }
    };

    let cancellation = CancellationToken::new();
    let shutdown = setup_signal_handling(cancellation.clone());

    let runner = ScenarioRunner::new(Arc::new(client), settings.environment.clone()).with_cancellation(cancellation);
    let summary = runner.run(&scenarios_for(args.suite.suite())).await;
    shutdown.abort();

    match args.format {
        OutputFormat::Text => print!("{}", summary.render_text()),
        OutputFormat::Json => match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Failed to serialize results: {}", e);
                return 1;
            }
        },
    }

    if summary.is_successful() {
        0
    } else {
        1
    }
}

/// Cancel outstanding waits on Ctrl+C so the current scenario can clean up
fn setup_signal_handling(cancellation: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl+C, finishing current scenario and cleaning up...");
                cancellation.cancel();
            }
            Err(e) => log::warn!("Failed to listen for Ctrl+C: {}", e),
        }
    })
}
