//! Dataset subcommands: upload, inspect, and delete retrieval datasets.

use std::path::PathBuf;

use anyhow::{Result, bail};
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use chatskill_infra::segment::segment_request;
use chatskill_types::dataset::{CreateDatasetRequest, DatasetId, NewDocument};
use chatskill_types::tenant::TenantId;

use super::{output, read_json};
use crate::state::AppState;

#[derive(Subcommand)]
pub enum DatasetCommand {
    /// Upload a dataset from a JSON array of documents.
    ///
    /// Every object needs a `content` string; other keys are kept as
    /// attributes and returned with query hits.
    Create {
        /// Tenant ID.
        tenant: TenantId,

        /// Dataset name.
        name: String,

        /// JSON file holding the documents.
        #[arg(long, short)]
        file: PathBuf,

        /// Split documents into sentences and index each one.
        #[arg(long)]
        segment: bool,
    },

    /// List a tenant's datasets.
    List {
        /// Tenant ID.
        tenant: TenantId,
    },

    /// Show a dataset and its documents.
    Show {
        /// Tenant ID.
        tenant: TenantId,

        /// Dataset ID.
        id: DatasetId,
    },

    /// Delete a dataset and unmount it from every retrieval skill.
    Delete {
        /// Tenant ID.
        tenant: TenantId,

        /// Dataset ID.
        id: DatasetId,
    },
}

pub async fn handle_dataset_command(
    cmd: DatasetCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        DatasetCommand::Create {
            tenant,
            name,
            file,
            segment,
        } => create_dataset(state, &tenant, name, file, segment, json).await,
        DatasetCommand::List { tenant } => list_datasets(state, &tenant, json).await,
        DatasetCommand::Show { tenant, id } => show_dataset(state, &tenant, &id, json).await,
        DatasetCommand::Delete { tenant, id } => delete_dataset(state, &tenant, &id, json).await,
    }
}

/// Turn an uploaded JSON array into documents, reporting the offending
/// position on failure.
fn parse_documents(value: serde_json::Value) -> Result<Vec<NewDocument>> {
    let serde_json::Value::Array(items) = value else {
        bail!("expected a JSON array of documents");
    };
    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| match item {
            serde_json::Value::Object(object) => NewDocument::from_json_object(object)
                .map_err(|e| anyhow::anyhow!("document {position}: {e}")),
            _ => bail!("document {position}: expected a JSON object"),
        })
        .collect()
}

async fn create_dataset(
    state: &AppState,
    tenant: &TenantId,
    name: String,
    file: PathBuf,
    segment: bool,
    json: bool,
) -> Result<()> {
    let session = state.session(tenant).await?;
    let documents = parse_documents(read_json(&file).await?)?;

    let mut request = CreateDatasetRequest {
        name,
        segment,
        documents,
    };
    segment_request(&mut request, state.config().retrieval.segment_max_chars);

    let spinner = output::spinner("Indexing documents...", json);
    let result = session.datasets().create(request).await;
    spinner.finish_and_clear();
    let dataset = result?;

    if json {
        return output::print_json(&dataset);
    }
    output::success(format!(
        "Created dataset '{}' ({}) with {} documents",
        style(&dataset.name).cyan(),
        style(&dataset.id).dim(),
        dataset.document_count
    ));
    Ok(())
}

async fn list_datasets(state: &AppState, tenant: &TenantId, json: bool) -> Result<()> {
    let datasets = state.session(tenant).await?.datasets().list().await?;

    if json {
        return output::print_json(&datasets);
    }
    if datasets.is_empty() {
        output::empty(
            "No datasets yet.",
            "Upload one with: cskill dataset create <tenant> <name> --file docs.json",
        );
        return Ok(());
    }

    let mut table = output::table(&["ID", "NAME", "DOCUMENTS", "SEGMENTED", "CREATED"]);
    for dataset in &datasets {
        table.add_row(vec![
            Cell::new(&dataset.id),
            Cell::new(&dataset.name),
            Cell::new(dataset.document_count),
            Cell::new(if dataset.segmented { "yes" } else { "no" }),
            Cell::new(dataset.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show_dataset(state: &AppState, tenant: &TenantId, id: &DatasetId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;
    let dataset = session.datasets().get(id).await?;
    let documents = session.datasets().documents(id).await?;

    if json {
        return output::print_json(&serde_json::json!({
            "dataset": dataset,
            "documents": documents,
        }));
    }

    println!();
    println!(
        "  {} {}",
        style(&dataset.name).cyan().bold(),
        style(&dataset.id).dim()
    );
    println!();
    let mut table = output::table(&["DOC", "CONTENT", "SENTENCES", "ATTRIBUTES"]);
    for doc in &documents {
        let attributes = doc.attributes.keys().cloned().collect::<Vec<_>>().join(", ");
        table.add_row(vec![
            Cell::new(doc.id),
            Cell::new(output::preview(&doc.content, 60)),
            Cell::new(doc.sentences.len()),
            Cell::new(attributes),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn delete_dataset(
    state: &AppState,
    tenant: &TenantId,
    id: &DatasetId,
    json: bool,
) -> Result<()> {
    let unmounted = state.session(tenant).await?.delete_dataset(id).await?;

    if json {
        return output::print_json(&serde_json::json!({
            "deleted": id,
            "unmounted_from": unmounted,
        }));
    }
    output::success(format!("Deleted dataset {}", style(id).cyan()));
    if !unmounted.is_empty() {
        println!(
            "  {} unmounted from {} retrieval skill(s); redeploy them to refresh their indexes",
            style("!").yellow().bold(),
            unmounted.len()
        );
        println!();
    }
    Ok(())
}
