// CLI module - command-line argument parsing and handlers
//
// Runtime overrides (--port, --upstream) plus a small config management
// surface:
// - config --show: Display effective configuration
// - config --path: Show config file path

use crate::config::{Config, VERSION};
use clap::{Parser, Subcommand};

/// gembridge - OpenAI-compatible proxy for Gemini's OpenAI endpoint
#[derive(Parser)]
#[command(name = "gembridge")]
#[command(version = VERSION)]
#[command(about = "Schema-sanitizing, signature-threading proxy for Gemini's OpenAI-compat API", long_about = None)]
pub struct Cli {
    /// Port to listen on (overrides config)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Upstream base URL (overrides config)
    #[arg(short, long)]
    pub upstream: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage configuration
    Config {
        /// Show effective configuration
        #[arg(long)]
        show: bool,

        /// Show config file path
        #[arg(long)]
        path: bool,
    },
}

/// Parse arguments and handle subcommands. Returns the effective config
/// when the proxy should run, None when a subcommand was handled and the
/// process should exit.
pub fn handle_cli() -> Option<Config> {
    let cli = Cli::parse();

    if let Some(Commands::Config { show, path }) = cli.command {
        if path {
            match Config::config_path() {
                Some(p) => println!("{}", p.display()),
                None => {
                    eprintln!("Error: Could not determine config path");
                    std::process::exit(1);
                }
            }
        } else if show {
            print!("{}", Config::from_env().to_toml());
        } else {
            println!("Usage: gembridge config [--show|--path]");
        }
        return None;
    }

    let mut config = Config::from_env();
    if let Some(port) = cli.port {
        config.bind_addr.set_port(port);
    }
    if let Some(upstream) = cli.upstream {
        config.upstream_url = upstream;
    }
    Some(config)
}
