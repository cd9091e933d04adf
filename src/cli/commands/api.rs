use anyhow::Context;
use clap::{Args, Subcommand};
use serde_json::Value;

use crate::cli::utils::output_json;
use crate::client::ApiClient;

#[derive(Args)]
pub struct ApiArgs {
    #[arg(long, env = "BIZADMIN_URL", default_value = "http://localhost:3000", help = "API base URL")]
    pub url: String,

    #[arg(long, env = "BIZADMIN_USERNAME", help = "Login name")]
    pub username: String,

    #[arg(long, env = "BIZADMIN_PASSWORD", help = "Password")]
    pub password: String,

    #[command(subcommand)]
    pub request: ApiRequest,
}

#[derive(Subcommand)]
pub enum ApiRequest {
    #[command(about = "GET a path, e.g. /api/products?length=10")]
    Get { path: String },

    #[command(about = "DELETE a path")]
    Delete { path: String },

    #[command(about = "POST a JSON body")]
    Post {
        path: String,
        #[arg(long, help = "JSON request body")]
        body: String,
    },

    #[command(about = "PUT a JSON body")]
    Put {
        path: String,
        #[arg(long, help = "JSON request body")]
        body: String,
    },
}

pub async fn handle(args: ApiArgs) -> anyhow::Result<()> {
    let client = ApiClient::new(&args.url);
    client
        .login(&args.username, &args.password)
        .await
        .with_context(|| format!("login to {} failed", args.url))?;

    let response = match &args.request {
        ApiRequest::Get { path } => client.get(path).await?,
        ApiRequest::Delete { path } => client.delete(path).await?,
        ApiRequest::Post { path, body } => client.post(path, &parse_body(body)?).await?,
        ApiRequest::Put { path, body } => client.put(path, &parse_body(body)?).await?,
    };
    output_json(&response)?;

    if let Err(e) = client.logout().await {
        tracing::debug!("Logout failed: {}", e);
    }
    Ok(())
}

fn parse_body(raw: &str) -> anyhow::Result<Value> {
    serde_json::from_str(raw).context("--body must be valid JSON")
}
