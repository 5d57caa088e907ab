//! ---
//! sw_section: "05-networking-external-interfaces"
//! sw_subsection: "binary"
//! sw_type: "source"
//! sw_scope: "code"
//! sw_description: "Control CLI for the splitwatch timing record service."
//! sw_version: "v0.0.0-prealpha"
//! sw_owner: "tbd"
//! ---
use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use splitwatch_client::ApiClient;
use splitwatch_common::{init_cli_tracing, VersionInfo};

mod records;
mod run;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "splitwatch stopwatch and record utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    /// Base URL of the splitwatch daemon.
    #[arg(
        long,
        global = true,
        env = "SPLITWATCH_API",
        default_value = "http://127.0.0.1:5000"
    )]
    api: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(flatten)]
    Records(records::RecordCommand),
    #[command(about = "Run an interactive stopwatch and save results to the daemon")]
    Run(run::RunOptions),
}

#[tokio::main]
async fn main() -> Result<()> {
    init_cli_tracing();
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }

    let Some(command) = cli.command else {
        eprintln!("no command provided; use --help for usage");
        return Ok(());
    };

    let client = ApiClient::new(&cli.api)?;
    match command {
        Commands::Records(command) => records::run(&client, command).await,
        Commands::Run(options) => run::run(client, options).await,
    }
}
