use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "labwatch")]
#[command(about = "Daily FHIR bulk export lab report")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (overrides LABWATCH_CONFIG, default labwatch.toml)
    #[arg(short, long, global = true, env = "LABWATCH_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run the cron scheduler (and the JWKS endpoint when enabled)
    Run,
    /// Run a single report cycle now
    Once,
    /// Only serve the public JWKS
    ServeJwks,
    /// Load and validate the configuration
    CheckConfig {
        /// Print the effective configuration as TOML (secrets omitted)
        #[arg(long)]
        print: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        let cli = Cli::try_parse_from(["labwatch", "once"]).unwrap();
        assert_eq!(cli.command, Commands::Once);

        let cli =
            Cli::try_parse_from(["labwatch", "--config", "prod.toml", "serve-jwks"]).unwrap();
        assert_eq!(cli.command, Commands::ServeJwks);
        assert_eq!(cli.config, Some(PathBuf::from("prod.toml")));

        let cli = Cli::try_parse_from(["labwatch", "check-config", "-c", "x.toml"]).unwrap();
        assert_eq!(cli.command, Commands::CheckConfig { print: false });

        let cli = Cli::try_parse_from(["labwatch", "check-config", "--print"]).unwrap();
        assert_eq!(cli.command, Commands::CheckConfig { print: true });
    }

    #[test]
    fn test_command_required() {
        assert!(Cli::try_parse_from(["labwatch"]).is_err());
    }
}
