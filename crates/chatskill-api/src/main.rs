//! chatskill CLI entry point.
//!
//! Binary name: `cskill`
//!
//! Parses CLI arguments, initializes tracing and the local platform, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use chatskill_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(&TracingOptions {
        verbosity: cli.verbose,
        quiet: cli.quiet,
        json: cli.log_json,
        otel: cli.otel,
    })
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "cskill", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init().await?;
    let json = cli.json;

    let result = match cli.command {
        Commands::Tenant { action } => cli::tenant::handle_tenant_command(action, &state, json).await,
        Commands::Dataset { action } => {
            cli::dataset::handle_dataset_command(action, &state, json).await
        }
        Commands::Retrieval { action } => {
            cli::retrieval::handle_retrieval_command(action, &state, json).await
        }
        Commands::Model { action } => cli::model::handle_model_command(action, &state, json).await,
        Commands::Slu { action } => cli::slu::handle_slu_command(action, &state, json).await,
        Commands::TermIndex { action } => {
            cli::term_index::handle_term_index_command(action, &state, json).await
        }
        Commands::Completions { .. } => unreachable!("handled above"),
    };

    shutdown_tracing();
    result
}
