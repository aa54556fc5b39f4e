//! CLI command definitions for the `cskill` binary.
//!
//! Uses clap derive macros for argument parsing. Commands follow a noun-verb
//! pattern (e.g., `cskill dataset create`, `cskill slu query`).

pub mod dataset;
pub mod model;
pub mod output;
pub mod retrieval;
pub mod slu;
pub mod tenant;
pub mod term_index;

use std::path::Path;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use serde::de::DeserializeOwned;

/// Manage chatbot skills: retrieval, SLU models, and their data.
#[derive(Parser)]
#[command(name = "cskill", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, hide = true)]
    pub log_json: bool,

    /// Export spans to stdout via OpenTelemetry.
    #[arg(long, global = true, hide = true)]
    pub otel: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage tenants (chatbots).
    Tenant {
        #[command(subcommand)]
        action: tenant::TenantCommand,
    },

    /// Manage retrieval datasets.
    Dataset {
        #[command(subcommand)]
        action: dataset::DatasetCommand,
    },

    /// Manage retrieval skills (create, mount, deploy, query).
    Retrieval {
        #[command(subcommand)]
        action: retrieval::RetrievalCommand,
    },

    /// Manage SLU models (train, export, import).
    Model {
        #[command(subcommand)]
        action: model::ModelCommand,
    },

    /// Manage SLU skills (create, deploy, query).
    Slu {
        #[command(subcommand)]
        action: slu::SluCommand,
    },

    /// Manage correction vocabularies.
    #[command(name = "term-index")]
    TermIndex {
        #[command(subcommand)]
        action: term_index::TermIndexCommand,
    },

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Read and deserialize a JSON file.
pub(crate) async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["cskill", "tenant", "list", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
        assert!(matches!(
            cli.command,
            Commands::Tenant {
                action: tenant::TenantCommand::List
            }
        ));
    }

    #[tokio::test]
    async fn test_read_json_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, "{not json").await.unwrap();
        let err = read_json::<serde_json::Value>(&path).await.unwrap_err();
        assert!(err.to_string().contains("bad.json"));
    }
}
