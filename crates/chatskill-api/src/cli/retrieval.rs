//! Retrieval skill subcommands: create, mount, deploy, and query.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use chatskill_core::skill::SkillManager;
use chatskill_types::dataset::DatasetId;
use chatskill_types::error::SkillError;
use chatskill_types::retrieval::{CreateRetrievalSkillRequest, QueryHit, QueryRequest, RetrievalSkill};
use chatskill_types::skill::{SkillId, SkillType};
use chatskill_types::tenant::TenantId;

use super::output;
use crate::state::{AppState, Session};

#[derive(Subcommand)]
pub enum RetrievalCommand {
    /// Create a retrieval skill.
    Create {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill name.
        name: String,
    },

    /// List a tenant's retrieval skills.
    List {
        /// Tenant ID.
        tenant: TenantId,
    },

    /// Show a retrieval skill.
    Show {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,
    },

    /// Delete a retrieval skill and its deployed index.
    Delete {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,
    },

    /// Mount datasets onto a retrieval skill.
    Mount {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,

        /// Dataset IDs to mount.
        #[arg(required = true)]
        datasets: Vec<DatasetId>,
    },

    /// Embed the mounted datasets and make the skill queryable.
    Deploy {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,
    },

    /// Ask a deployed retrieval skill a question.
    Query {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,

        /// The question.
        question: String,

        /// Share of the lexical score in the ranking (0 to 1).
        #[arg(long, default_value_t = 0.5)]
        weight: f32,

        /// Drop hits scoring below this (0 to 1).
        #[arg(long, default_value_t = 0.0)]
        threshold: f32,

        /// Maximum number of hits.
        #[arg(long, short = 'k', default_value_t = 10)]
        top_k: usize,
    },
}

pub async fn handle_retrieval_command(
    cmd: RetrievalCommand,
    state: &AppState,
    json: bool,
) -> Result<()> {
    match cmd {
        RetrievalCommand::Create { tenant, name } => create_skill(state, &tenant, name, json).await,
        RetrievalCommand::List { tenant } => list_skills(state, &tenant, json).await,
        RetrievalCommand::Show { tenant, id } => show_skill(state, &tenant, &id, json).await,
        RetrievalCommand::Delete { tenant, id } => delete_skill(state, &tenant, &id, json).await,
        RetrievalCommand::Mount {
            tenant,
            id,
            datasets,
        } => mount(state, &tenant, &id, &datasets, json).await,
        RetrievalCommand::Deploy { tenant, id } => deploy(state, &tenant, &id, json).await,
        RetrievalCommand::Query {
            tenant,
            id,
            question,
            weight,
            threshold,
            top_k,
        } => {
            let request = QueryRequest {
                question,
                weight,
                threshold,
                top_k,
            };
            query(state, &tenant, &id, &request, json).await
        }
    }
}

async fn all_skills(session: &Session) -> Result<Vec<RetrievalSkill>, SkillError> {
    session.retrieval().await?.get_all_skills().await
}

fn deployment_label(skill: &RetrievalSkill) -> String {
    match skill.deploy_time {
        Some(time) => time.format("%Y-%m-%d %H:%M").to_string(),
        None => "not deployed".to_string(),
    }
}

async fn create_skill(state: &AppState, tenant: &TenantId, name: String, json: bool) -> Result<()> {
    let skill = state
        .session(tenant)
        .await?
        .create_retrieval_skill(CreateRetrievalSkillRequest { name })
        .await?;

    if json {
        return output::print_json(&skill);
    }
    output::success(format!(
        "Created retrieval skill '{}' ({})",
        style(&skill.name).cyan(),
        style(&skill.id).dim()
    ));
    Ok(())
}

async fn list_skills(state: &AppState, tenant: &TenantId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;
    let skills = output::or_empty(all_skills(&session).await)?;

    if json {
        return output::print_json(&skills);
    }
    if skills.is_empty() {
        output::empty(
            "No retrieval skills yet.",
            "Create one with: cskill retrieval create <tenant> <name>",
        );
        return Ok(());
    }

    let mut table = output::table(&["ID", "NAME", "DATASETS", "DEPLOYED"]);
    for skill in &skills {
        table.add_row(vec![
            Cell::new(&skill.id),
            Cell::new(&skill.name),
            Cell::new(skill.mounted_dataset_ids.len()),
            Cell::new(deployment_label(skill)),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show_skill(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let skill = state
        .session(tenant)
        .await?
        .retrieval()
        .await?
        .get_certain_skill(id)
        .await?;

    if json {
        return output::print_json(&skill);
    }

    println!();
    println!("  {} {}", style(&skill.name).cyan().bold(), style(&skill.id).dim());
    println!("  {} {}", style("Deployed:").dim(), deployment_label(&skill));
    if let Some(path) = &skill.deploy_path {
        println!("  {} {path}", style("Index:").dim());
    }
    println!("  {}", style("Mounted datasets:").dim());
    if skill.mounted_dataset_ids.is_empty() {
        println!("    none");
    }
    for dataset_id in &skill.mounted_dataset_ids {
        println!("    {dataset_id}");
    }
    println!();
    Ok(())
}

async fn delete_skill(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    state
        .session(tenant)
        .await?
        .delete_skill(SkillType::Retrieve, id)
        .await?;

    if json {
        return output::print_json(&serde_json::json!({ "deleted": id }));
    }
    output::success(format!("Deleted retrieval skill {}", style(id).cyan()));
    Ok(())
}

async fn mount(
    state: &AppState,
    tenant: &TenantId,
    id: &SkillId,
    datasets: &[DatasetId],
    json: bool,
) -> Result<()> {
    let mounted = state.session(tenant).await?.mount_datasets(id, datasets).await?;

    if json {
        return output::print_json(&serde_json::json!({
            "skill_id": id,
            "mounted": mounted,
        }));
    }
    output::success(format!(
        "Skill {} now mounts {} dataset(s)",
        style(id).cyan(),
        mounted.len()
    ));
    Ok(())
}

async fn deploy(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;

    let spinner = output::spinner("Embedding documents and building the index...", json);
    let result = session.deploy_retrieval(id).await;
    spinner.finish_and_clear();
    let skill = result?;

    if json {
        return output::print_json(&skill);
    }
    output::success(format!(
        "Deployed '{}' at {}",
        style(&skill.name).cyan(),
        deployment_label(&skill)
    ));
    Ok(())
}

async fn query(
    state: &AppState,
    tenant: &TenantId,
    id: &SkillId,
    request: &QueryRequest,
    json: bool,
) -> Result<()> {
    let hits = state.session(tenant).await?.query_retrieval(id, request).await?;

    if json {
        return output::print_json(&hits);
    }
    if hits.is_empty() {
        output::empty(
            "No matching documents.",
            "Try a lower --threshold or a different --weight.",
        );
        return Ok(());
    }

    let mut table = output::table(&["SCORE", "LEXICAL", "EMBEDDING", "DOC", "TEXT"]);
    for hit in &hits {
        table.add_row(vec![
            Cell::new(format!("{:.3}", hit.score)),
            Cell::new(format!("{:.3}", hit.lexical_score)),
            Cell::new(format!("{:.3}", hit.embedding_score)),
            Cell::new(hit.document_id),
            Cell::new(output::preview(hit_text(hit), 72)),
        ]);
    }
    println!("{table}");
    Ok(())
}

/// The matched sentence when the hit is sentence-level, else the document.
fn hit_text(hit: &QueryHit) -> &str {
    hit.sentence.as_deref().unwrap_or(&hit.content)
}
