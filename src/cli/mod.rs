//! Command-line interface for the `pages` binary.

pub mod workflow;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code for success
pub const EXIT_SUCCESS: u8 = 0;
/// Exit code for build or runtime failure
pub const EXIT_ERROR: u8 = 1;
/// Exit code for invalid arguments or configuration
pub const EXIT_INVALID_ARGS: u8 = 2;

#[derive(Parser)]
#[command(name = "pages", version, about = "Static site build pipeline")]
pub struct Cli {
    /// Path to pages.toml (found by walking up from the cwd when omitted)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Build with production settings
    #[arg(short = 'P', long, global = true)]
    pub production: bool,

    /// Alias of --production
    #[arg(long, global = true)]
    pub prod: bool,

    /// Per-stage progress output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Lint scripts and stylesheets
    Lint,
    /// Compile sources into the intermediate tree
    Compile,
    /// Full build into dist
    Build,
    /// Development build, dev server, and watch mode
    Serve {
        /// Dev-server port (default 2080)
        #[arg(long)]
        port: Option<u16>,
        /// Open a browser once the server is up
        #[arg(long)]
        open: bool,
    },
    /// Production build with image optimization, then serve dist
    Start {
        /// Dev-server port (default 2080)
        #[arg(long)]
        port: Option<u16>,
        /// Open a browser once the server is up
        #[arg(long)]
        open: bool,
    },
    /// Production build, then publish dist
    Deploy {
        /// Publish target directory
        #[arg(long, value_name = "DIR")]
        target: Option<PathBuf>,
    },
    /// Remove the intermediate and output trees
    Clean,
}

/// Parse arguments and dispatch. This is the whole binary.
pub fn run() -> ExitCode {
    let cli = Cli::parse();
    ExitCode::from(workflow::dispatch(cli))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_build() {
        let cli = Cli::try_parse_from(["pages", "build", "--production"]).unwrap();
        assert!(cli.production);
        assert!(matches!(cli.command, Commands::Build));
    }

    #[test]
    fn test_cli_parses_serve_port() {
        let cli = Cli::try_parse_from(["pages", "serve", "--port", "3000", "--open"]).unwrap();
        match cli.command {
            Commands::Serve { port, open } => {
                assert_eq!(port, Some(3000));
                assert!(open);
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_cli_prod_alias() {
        let cli = Cli::try_parse_from(["pages", "deploy", "--prod"]).unwrap();
        assert!(cli.prod);
        assert!(!cli.production);
    }

    #[test]
    fn test_cli_rejects_unknown_command() {
        assert!(Cli::try_parse_from(["pages", "transmogrify"]).is_err());
    }
}
