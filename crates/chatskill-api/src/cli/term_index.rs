//! Term index subcommands: upload correction vocabularies.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use console::style;

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TermIndexCommand {
    /// Create a term index from terms given inline or one per line in a file.
    Create {
        /// Index name, shared by every tenant.
        name: String,

        /// Terms to index.
        terms: Vec<String>,

        /// Text file with one term per line.
        #[arg(long, short)]
        file: Option<PathBuf>,
    },
}

pub async fn handle_term_index_command(
    cmd: TermIndexCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        TermIndexCommand::Create { name, terms, file } => {
            let content = match &file {
                Some(path) => Some(
                    tokio::fs::read_to_string(path)
                        .await
                        .with_context(|| format!("Failed to read {}", path.display()))?,
                ),
                None => None,
            };
            let terms = collect_terms(content.as_deref(), terms);
            if terms.is_empty() {
                bail!("no terms given; pass them as arguments or with --file");
            }
            create_term_index(state, &name, &terms, json).await
        }
    }
}

/// Inline terms followed by the non-blank lines of the file.
fn collect_terms(file_content: Option<&str>, inline: Vec<String>) -> Vec<String> {
    let mut terms = inline;
    if let Some(content) = file_content {
        terms.extend(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string),
        );
    }
    terms
}

async fn create_term_index(state: &AppState, name: &str, terms: &[String], json: bool) -> Result<()> {
    let spinner = output::spinner("Indexing terms...", json);
    let result = state.registry.create_term_index(name, terms).await;
    spinner.finish_and_clear();
    let indexed = result?;

    if json {
        return output::print_json(&serde_json::json!({
            "name": name,
            "terms": indexed,
        }));
    }
    output::success(format!(
        "Created term index '{}' with {indexed} term(s)",
        style(name).cyan()
    ));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_terms_merges_inline_and_file() {
        let terms = collect_terms(
            Some("taipei\n\n  tainan \r\nkaohsiung"),
            vec!["hsinchu".to_string()],
        );
        assert_eq!(terms, vec!["hsinchu", "taipei", "tainan", "kaohsiung"]);
    }

    #[test]
    fn test_collect_terms_without_file() {
        assert!(collect_terms(None, Vec::new()).is_empty());
    }
}
