pub mod commands;
pub mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "bizadmin")]
#[command(about = "BizAdmin CLI - database maintenance and API access")]
#[command(version)]
pub struct Cli {
    #[arg(long, global = true, help = "Output in JSON format")]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Apply pending database migrations")]
    Migrate,

    #[command(about = "User account management (direct database access)")]
    User {
        #[command(subcommand)]
        cmd: commands::user::UserCommands,
    },

    #[command(about = "Call the HTTP API as a signed-in user")]
    Api(commands::api::ApiArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_cli(cli: &Cli) -> Self {
        if cli.json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let output_format = OutputFormat::from_cli(&cli);

    match cli.command {
        Commands::Migrate => commands::migrate::handle(output_format).await,
        Commands::User { cmd } => commands::user::handle(cmd, output_format).await,
        Commands::Api(args) => commands::api::handle(args).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_api_post() {
        let cli = Cli::try_parse_from([
            "bizadmin", "api", "--username", "admin", "--password", "secret123", "post", "/api/products",
            "--body", r#"{"sku":"A-1"}"#,
        ])
        .unwrap();
        assert!(matches!(cli.command, Commands::Api(_)));
    }

    #[test]
    fn parses_user_create() {
        let cli = Cli::try_parse_from([
            "bizadmin", "--json", "user", "create", "--username", "maria", "--password", "secret123", "--role", "manager",
        ])
        .unwrap();
        assert_eq!(OutputFormat::from_cli(&cli), OutputFormat::Json);
    }
}
