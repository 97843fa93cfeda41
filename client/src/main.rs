//! Main entry point for the `reserva` command line client.
//!
//! This file parses the command line, loads configuration and the stored
//! session, and runs one authenticated request against the API.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use reserva_adapters::OperationResult;
use reserva_client::auth::FileSessionStore;
use reserva_client::services::{branch_list, business_context, RoleScopedStore};
use reserva_client::{AuthenticatedApi, ClientError, Config, SessionStore};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "reserva", about = "Authenticated requests against the Reserva API")]
struct Cli {
    /// File holding the signed-in session.
    #[arg(long, env = "RESERVA_SESSION_FILE", default_value = "session.json")]
    session: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Get { path: String },
    Post {
        path: String,
        #[arg(long)]
        body: String,
    },
    Put {
        path: String,
        #[arg(long)]
        body: String,
    },
    Delete { path: String },
    /// Print the stored session.
    Session,
    /// Invalidate the session remotely and forget it locally.
    Logout,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), ClientError> {
    let config = Config::from_env()?;
    let sessions = Arc::new(FileSessionStore::open(&cli.session).await?);
    tracing::debug!(api_url = %config.api_url, session = %cli.session.display(), "starting");

    let client_scoped: Vec<Arc<dyn RoleScopedStore>> =
        vec![Arc::new(business_context()), Arc::new(branch_list())];
    let api = AuthenticatedApi::from_config(&config, sessions.clone(), client_scoped)?;

    let result: OperationResult<Value> = match cli.command {
        Command::Get { path } => api.get(&path).await,
        Command::Post { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            api.post(&path, &body).await
        }
        Command::Put { path, body } => {
            let body: Value = serde_json::from_str(&body)?;
            api.put(&path, &body).await
        }
        Command::Delete { path } => api.delete(&path).await,
        Command::Session => {
            let session = sessions.current().await?;
            println!("{}", serde_json::to_string_pretty(&session)?);
            return Ok(());
        }
        Command::Logout => return logout(&api, sessions.as_ref()).await,
    };

    let value = result.into_result().map_err(ClientError::Request)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

async fn logout(api: &AuthenticatedApi, sessions: &FileSessionStore) -> Result<(), ClientError> {
    if sessions.current().await?.is_empty() {
        return Err(ClientError::NotSignedIn);
    }
    api.logout().await?;
    Ok(())
}
