//! SLU skill subcommands: create, deploy models and term indexes, infer.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use console::style;

use chatskill_core::skill::SkillManager;
use chatskill_types::error::SkillError;
use chatskill_types::skill::{SkillId, SkillType, SluTask};
use chatskill_types::slu::{CreateSluSkillRequest, SluResponse, SluSkill};
use chatskill_types::tenant::TenantId;

use super::output;
use crate::state::{AppState, Session};

#[derive(Subcommand)]
pub enum SluCommand {
    /// Create an SLU skill.
    Create {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill name.
        name: String,

        /// What the skill serves: intent, slot, or both.
        #[arg(long, default_value = "SLU-intent")]
        task: SluTask,
    },

    /// List a tenant's SLU skills.
    List {
        /// Tenant ID.
        tenant: TenantId,
    },

    /// Show an SLU skill.
    Show {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,
    },

    /// Delete an SLU skill.
    Delete {
        /// Tenant ID.
        tenant: TenantId,

        /// Skill ID.
        id: SkillId,
    },

    /// Serve a trained model from an SLU skill.
    Deploy {
        /// Tenant ID.
        tenant: TenantId,

        /// SLU skill ID.
        id: SkillId,

        /// Model ID.
        model: SkillId,

        /// Task to serve. Defaults to the model's own task.
        #[arg(long)]
        task: Option<SluTask>,
    },

    /// Attach a correction vocabulary to an SLU skill.
    TermIndex {
        /// Tenant ID.
        tenant: TenantId,

        /// SLU skill ID.
        id: SkillId,

        /// Name of a term index created with `cskill term-index create`.
        name: String,
    },

    /// Run inference through a deployed SLU skill.
    Query {
        /// Tenant ID.
        tenant: TenantId,

        /// SLU skill ID.
        id: SkillId,

        /// The utterance.
        question: String,

        /// Correct recognised slot values against the term index.
        #[arg(long)]
        correct: bool,
    },

    /// Run inference against a model directly.
    Test {
        /// Tenant ID.
        tenant: TenantId,

        /// Model ID.
        model: SkillId,

        /// The utterance.
        question: String,

        /// Correct recognised slot values against `--term-index`.
        #[arg(long)]
        correct: bool,

        /// Term index used for correction.
        #[arg(long)]
        term_index: Option<String>,
    },
}

pub async fn handle_slu_command(cmd: SluCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        SluCommand::Create { tenant, name, task } => {
            create_skill(state, &tenant, CreateSluSkillRequest { name, task }, json).await
        }
        SluCommand::List { tenant } => list_skills(state, &tenant, json).await,
        SluCommand::Show { tenant, id } => show_skill(state, &tenant, &id, json).await,
        SluCommand::Delete { tenant, id } => delete_skill(state, &tenant, &id, json).await,
        SluCommand::Deploy {
            tenant,
            id,
            model,
            task,
        } => deploy_model(state, &tenant, &id, &model, task, json).await,
        SluCommand::TermIndex { tenant, id, name } => {
            deploy_term_index(state, &tenant, &id, &name, json).await
        }
        SluCommand::Query {
            tenant,
            id,
            question,
            correct,
        } => {
            let response = state
                .session(&tenant)
                .await?
                .slu_inference(&id, &question, correct)
                .await?;
            print_response(&response, json)
        }
        SluCommand::Test {
            tenant,
            model,
            question,
            correct,
            term_index,
        } => {
            let response = state
                .session(&tenant)
                .await?
                .test_model(&model, &question, correct, term_index.as_deref())
                .await?;
            print_response(&response, json)
        }
    }
}

async fn all_skills(session: &Session) -> Result<Vec<SluSkill>, SkillError> {
    session.slu().await?.get_all_skills().await
}

async fn create_skill(
    state: &AppState,
    tenant: &TenantId,
    request: CreateSluSkillRequest,
    json: bool,
) -> Result<()> {
    let skill = state.session(tenant).await?.create_slu_skill(request).await?;

    if json {
        return output::print_json(&skill);
    }
    output::success(format!(
        "Created {} skill '{}' ({})",
        skill.task,
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
            "No SLU skills yet.",
            "Create one with: cskill slu create <tenant> <name> --task SLU-intent",
        );
        return Ok(());
    }

    let mut table = output::table(&["ID", "NAME", "TASK", "MODEL", "TERM INDEX"]);
    for skill in &skills {
        table.add_row(vec![
            Cell::new(&skill.id),
            Cell::new(&skill.name),
            Cell::new(skill.task),
            Cell::new(
                skill
                    .deployed_model_id
                    .as_ref()
                    .map_or_else(|| "-".to_string(), ToString::to_string),
            ),
            Cell::new(skill.term_index.as_deref().unwrap_or("-")),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show_skill(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let skill = state
        .session(tenant)
        .await?
        .slu()
        .await?
        .get_certain_skill(id)
        .await?;

    if json {
        return output::print_json(&skill);
    }

    println!();
    println!("  {} {}", style(&skill.name).cyan().bold(), style(&skill.id).dim());
    println!("  {} {}", style("Task:").dim(), skill.task);
    match &skill.deployed_model_id {
        Some(model_id) => println!("  {} {model_id}", style("Model:").dim()),
        None => println!("  {} not deployed", style("Model:").dim()),
    }
    println!(
        "  {} {}",
        style("Term index:").dim(),
        skill.term_index.as_deref().unwrap_or("none")
    );
    println!();
    Ok(())
}

async fn delete_skill(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    state
        .session(tenant)
        .await?
        .delete_skill(SkillType::Slu, id)
        .await?;

    if json {
        return output::print_json(&serde_json::json!({ "deleted": id }));
    }
    output::success(format!("Deleted SLU skill {}", style(id).cyan()));
    Ok(())
}

async fn deploy_model(
    state: &AppState,
    tenant: &TenantId,
    id: &SkillId,
    model: &SkillId,
    task: Option<SluTask>,
    json: bool,
) -> Result<()> {
    let skill = state
        .session(tenant)
        .await?
        .deploy_slu_model(id, model, task)
        .await?;

    if json {
        return output::print_json(&skill);
    }
    output::success(format!(
        "'{}' now serves model {} ({})",
        style(&skill.name).cyan(),
        style(model).cyan(),
        skill.task
    ));
    Ok(())
}

async fn deploy_term_index(
    state: &AppState,
    tenant: &TenantId,
    id: &SkillId,
    name: &str,
    json: bool,
) -> Result<()> {
    let skill = state
        .session(tenant)
        .await?
        .deploy_term_index(id, name)
        .await?;

    if json {
        return output::print_json(&skill);
    }
    output::success(format!(
        "'{}' now corrects against term index '{}'",
        style(&skill.name).cyan(),
        style(name).cyan()
    ));
    Ok(())
}

fn print_response(response: &SluResponse, json: bool) -> Result<()> {
    if json {
        return output::print_json(response);
    }

    println!();
    println!("  {} {}", style("Question:").dim(), response.question);

    if let Some(intents) = &response.intent {
        println!();
        let mut table = output::table(&["INTENT", "SCORE"]);
        for intent in intents {
            table.add_row(vec![
                Cell::new(&intent.label),
                Cell::new(format!("{:.3}", intent.score)),
            ]);
        }
        println!("{table}");
    }

    if let Some(slots) = &response.slot {
        println!();
        if slots.is_empty() {
            println!("  {} no slots recognised", style("i").blue().bold());
        } else {
            let mut table = output::table(&["SLOT", "VALUE", "OFFSET"]);
            for slot in slots {
                table.add_row(vec![
                    Cell::new(&slot.label),
                    Cell::new(&slot.value),
                    Cell::new(slot.start),
                ]);
            }
            println!("{table}");
        }
    }

    for correction in &response.correction {
        println!(
            "  {} {} -> {} ({:.2})",
            style("~").yellow().bold(),
            correction.original,
            style(&correction.corrected).green(),
            correction.similarity
        );
    }
    println!();
    Ok(())
}
