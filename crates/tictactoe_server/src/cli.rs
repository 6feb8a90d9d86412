//! Command-line interface for the league server.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Tic-tac-toe league server with REST and MCP interfaces
#[derive(Parser, Debug)]
#[command(name = "tictactoe_server")]
#[command(about = "Tic-tac-toe league server", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Settings shared by every command
    #[command(flatten)]
    pub common: CommonArgs,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Flags accepted by every command.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to a TOML config file (defaults are used if it does not exist)
    #[arg(short, long, global = true, default_value = "tictactoe.toml")]
    pub config: PathBuf,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    pub db_path: Option<String>,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the REST server with background jobs
    Http {
        /// Port to bind to, overriding the config
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to, overriding the config
        #[arg(long)]
        host: Option<String>,
    },

    /// Run the MCP tool server (stdio mode)
    Mcp,

    /// Apply pending database migrations and exit
    Migrate,

    /// Send one round of reminders and exit
    Remind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_overrides_parse() {
        let cli = Cli::parse_from([
            "tictactoe_server",
            "--db-path",
            "league.db",
            "http",
            "--port",
            "8080",
        ]);
        assert_eq!(cli.common.db_path.as_deref(), Some("league.db"));
        assert!(matches!(
            cli.command,
            Command::Http {
                port: Some(8080),
                host: None
            }
        ));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["tictactoe_server", "migrate", "--config", "other.toml"]);
        assert_eq!(cli.common.config, PathBuf::from("other.toml"));
        assert!(matches!(cli.command, Command::Migrate));
    }
}
