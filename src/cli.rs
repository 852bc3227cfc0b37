use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::scenarios::Suite;

/// Petstore Store Suite - functional checks for the Petstore store endpoints
#[derive(Parser, Debug)]
#[command(name = "petstore-suite")]
#[command(about = "Functional checks for the Petstore store endpoints")]
#[command(version = crate::VERSION)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Environment to use (overrides the ENV variable)
    #[arg(short, long, global = true)]
    pub environment: Option<String>,

    /// Directory holding the per-environment settings files
    #[arg(short, long, global = true)]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run scenarios against the store
    Run(RunArgs),

    /// Show the resolved settings and where they came from
    Config,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Suite to run
    #[arg(short, long, value_enum, default_value = "all")]
    pub suite: SuiteSelection,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SuiteSelection {
    All,
    Inventory,
    Order,
}

impl SuiteSelection {
    pub fn suite(self) -> Option<Suite> {
        match self {
            SuiteSelection::All => None,
            SuiteSelection::Inventory => Some(Suite::Inventory),
            SuiteSelection::Order => Some(Suite::Order),
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
