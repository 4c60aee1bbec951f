// labpower command-line entry point
use clap::{Args, CommandFactory, Parser, Subcommand};
use color_eyre::eyre::Result;
use std::io::stderr;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, registry, EnvFilter};

mod cmd;

use labpower_mgmt::Target;

#[derive(Parser, Debug)]
#[command(author, version, about = "Power control for lab hardware", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Device configuration file
    #[arg(short, long, env = "LABPOWER_CONFIG", default_value = "labpower.toml", global = true)]
    config: PathBuf,

    /// Verbose output - shows more detailed logs
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lists the configured devices.
    List,
    /// Powers a device (or one of its outlets/nodes) on.
    On(TargetArgs),
    /// Powers a device (or one of its outlets/nodes) off.
    Off(TargetArgs),
    /// Power cycles a device.
    Cycle(TargetArgs),
    /// Requests a backend-specific state, e.g. `soft` for IPMI or `S3` for a system device.
    Set(SetArgs),
    /// Shows the power states the local system offers.
    States(StatesArgs),
}

#[derive(Args, Debug)]
pub struct TargetArgs {
    /// Device name from the configuration file
    device: String,

    /// Outlet number on a PDU or power switch
    #[arg(long, conflicts_with = "node")]
    outlet: Option<u32>,

    /// Node name on a CC-SG appliance
    #[arg(long)]
    node: Option<String>,
}

impl TargetArgs {
    pub fn target(&self) -> Option<Target> {
        match (&self.outlet, &self.node) {
            (Some(outlet), _) => Some(Target::Outlet(*outlet)),
            (None, Some(node)) => Some(Target::Device(node.clone())),
            (None, None) => None,
        }
    }
}

#[derive(Args, Debug)]
pub struct SetArgs {
    /// State name understood by the device's backend
    state: String,

    #[command(flatten)]
    target: TargetArgs,
}

#[derive(Args, Debug)]
pub struct StatesArgs {
    /// System device name from the configuration file
    device: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();

    // Respect RUST_LOG, fallback to verbose/info for our crates
    let level = if cli.verbose { "debug" } else { "info" };
    let default_directives = format!(
        "labpower={level},labpower_mgmt={level},labpower_connect={level},reqwest=warn,hyper=warn,rustls=warn",
        level = level
    );
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directives));
    registry().with(filter).with(fmt::layer().with_writer(stderr)).init();

    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        return Ok(());
    };

    debug!(config = %cli.config.display(), "Loading lab configuration");
    let lab = cmd::config::LabConfig::load(&cli.config)?;

    match command {
        Commands::List => cmd::power::list(&lab),
        Commands::On(args) => cmd::power::power_on(&lab, &args).await,
        Commands::Off(args) => cmd::power::power_off(&lab, &args).await,
        Commands::Cycle(args) => cmd::power::power_cycle(&lab, &args).await,
        Commands::Set(args) => cmd::power::set_state(&lab, &args.target, &args.state).await,
        Commands::States(args) => cmd::power::states(&lab, &args.device).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_target_from_args() {
        let cli = Cli::parse_from(["labpower", "on", "rack-pdu", "--outlet", "3"]);
        match cli.command {
            Some(Commands::On(args)) => assert_eq!(args.target(), Some(Target::Outlet(3))),
            other => panic!("unexpected command: {:?}", other),
        }

        let cli = Cli::parse_from(["labpower", "set", "soft", "bmc1"]);
        match cli.command {
            Some(Commands::Set(args)) => {
                assert_eq!(args.state, "soft");
                assert_eq!(args.target.device, "bmc1");
                assert_eq!(args.target.target(), None);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_outlet_and_node_conflict() {
        let result = Cli::try_parse_from(["labpower", "off", "x", "--outlet", "1", "--node", "n"]);
        assert!(result.is_err());
    }
}
