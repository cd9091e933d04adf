use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::database::models::user::CreateUser;
use crate::error::ApiError;
use crate::services::Actor;
use crate::state::AppState;
use crate::validation::Validate;

#[derive(Subcommand)]
pub enum UserCommands {
    #[command(about = "Create a user account")]
    Create {
        #[arg(long, help = "Login name")]
        username: String,
        #[arg(long, help = "Initial password (8-128 chars, a letter and a digit)")]
        password: String,
        #[arg(long, default_value = "viewer", help = "viewer, manager or admin")]
        role: String,
        #[arg(long, help = "Email address")]
        email: Option<String>,
        #[arg(long, help = "Display name (defaults to the username)")]
        display_name: Option<String>,
    },
}

pub async fn handle(cmd: UserCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        UserCommands::Create { username, password, role, email, display_name } => {
            let input = CreateUser { username, password, role, email, display_name };
            input.validate().map_err(|e| describe(ApiError::from(e)))?;

            let state = AppState::new(config().clone(), super::connect().await?);
            let actor = Actor {
                username: Some("cli".to_string()),
                ..Actor::default()
            };
            let user = state.users().create(input, &actor).await.map_err(describe)?;

            output_success(
                output_format,
                &format!("User '{}' created with role {}", user.username, user.role),
                Some(json!(user)),
            )
        }
    }
}

/// Field errors are listed one per line
fn describe(err: ApiError) -> anyhow::Error {
    match err.to_problem().errors {
        Some(errors) => {
            let lines: Vec<String> = errors
                .iter()
                .flat_map(|(field, messages)| messages.iter().map(move |m| format!("  {}: {}", field, m)))
                .collect();
            anyhow::anyhow!("{}\n{}", err, lines.join("\n"))
        }
        None => anyhow::anyhow!("{}", err),
    }
}
