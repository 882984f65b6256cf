//! `agrisk` - command-line client for the risk-assessment API

#![forbid(unsafe_code)]

mod cli;
mod commands;
mod logging;

use agrisk_client::{ApiClient, ClientConfig, TokenStore};
use agrisk_core::DataLayer;
use anyhow::Context;
use commands::Session;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let matches = cli::command().get_matches();

    let config_path = matches
        .get_one::<String>("config")
        .map_or(cli::DEFAULT_CONFIG, String::as_str);
    let config = ClientConfig::load(Path::new(config_path))
        .with_context(|| format!("loading {config_path}"))?;
    logging::init(&config.log_filter, matches.get_flag("log-json"))?;
    tracing::debug!(base_url = %config.base_url, "configuration loaded");

    let tokens = TokenStore::persistent(config.token_path());
    let client = ApiClient::new(&config, tokens)?;
    let data = DataLayer::from_config(Arc::new(client.clone()), &config);
    let session = Session {
        client,
        data,
        json: matches.get_flag("json"),
    };

    match matches.subcommand() {
        Some(("login", args)) => commands::login(&session, args).await,
        Some(("logout", _)) => commands::logout(&session),
        Some(("assessments", args)) => commands::assessments(&session, args).await,
        Some(("gaps", args)) => commands::gaps(&session, args).await,
        Some(("correct", args)) => commands::correct(&session, args).await,
        Some(("intake", args)) => commands::intake(&session, args).await,
        Some(("comment", args)) => commands::comment(&session, args).await,
        Some(("scores", args)) => commands::scores(&session, args).await,
        Some(("recommend", args)) => commands::recommend(&session, args).await,
        Some(("report", args)) => commands::report(&session, args).await,
        Some((other, _)) => anyhow::bail!("unknown command {other}"),
        None => anyhow::bail!("no command given"),
    }
}
