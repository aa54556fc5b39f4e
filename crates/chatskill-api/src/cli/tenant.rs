//! Tenant management subcommands.

use anyhow::Result;
use clap::Subcommand;
use comfy_table::Cell;
use console::style;
use dialoguer::Confirm;

use chatskill_types::tenant::{CreateTenantRequest, TenantId};

use super::output;
use crate::state::AppState;

#[derive(Subcommand)]
pub enum TenantCommand {
    /// Register a new tenant.
    Create {
        /// Free-form description of the chatbot.
        #[arg(long, short, default_value = "")]
        description: String,
    },

    /// List all tenants.
    List,

    /// Delete a tenant with all of its skills, datasets, and models.
    Delete {
        /// Tenant ID.
        id: TenantId,

        /// Skip the confirmation prompt.
        #[arg(long)]
        force: bool,
    },

    /// Show the skill types a tenant currently serves.
    Show {
        /// Tenant ID.
        id: TenantId,
    },
}

pub async fn handle_tenant_command(cmd: TenantCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        TenantCommand::Create { description } => create_tenant(state, description, json).await,
        TenantCommand::List => list_tenants(state, json).await,
        TenantCommand::Delete { id, force } => delete_tenant(state, &id, force, json).await,
        TenantCommand::Show { id } => show_tenant(state, &id, json).await,
    }
}

async fn create_tenant(state: &AppState, description: String, json: bool) -> Result<()> {
    let tenant = state
        .registry
        .create_tenant(CreateTenantRequest { description })
        .await?;

    if json {
        return output::print_json(&tenant);
    }
    output::success(format!("Created tenant {}", style(&tenant.id).cyan().bold()));
    Ok(())
}

async fn list_tenants(state: &AppState, json: bool) -> Result<()> {
    let tenants = state.registry.list_tenants().await?;

    if json {
        return output::print_json(&tenants);
    }
    if tenants.is_empty() {
        output::empty("No tenants yet.", "Create one with: cskill tenant create");
        return Ok(());
    }

    let mut table = output::table(&["ID", "DESCRIPTION", "CREATED"]);
    for tenant in &tenants {
        table.add_row(vec![
            Cell::new(&tenant.id),
            Cell::new(output::preview(&tenant.description, 48)),
            Cell::new(tenant.created_at.format("%Y-%m-%d %H:%M")),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show_tenant(state: &AppState, id: &TenantId, json: bool) -> Result<()> {
    let session = state.session(id).await?;
    let skill_types = session.skill_types().await;

    if json {
        return output::print_json(&serde_json::json!({
            "tenant": session.tenant(),
            "skill_types": skill_types,
        }));
    }

    let tenant = session.tenant();
    println!();
    println!("  {} {}", style("Tenant").bold(), style(&tenant.id).cyan());
    if !tenant.description.is_empty() {
        println!("  {}", tenant.description);
    }
    println!(
        "  {} {}",
        style("Created:").dim(),
        tenant.created_at.format("%Y-%m-%d %H:%M:%S")
    );
    let served = if skill_types.is_empty() {
        "none".to_string()
    } else {
        skill_types
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("  {} {served}", style("Skills:").dim());
    println!();
    Ok(())
}

async fn delete_tenant(state: &AppState, id: &TenantId, force: bool, json: bool) -> Result<()> {
    if !force && !json {
        let confirmed = Confirm::new()
            .with_prompt(format!(
                "Delete tenant {id} and everything it owns? This cannot be undone"
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("  Cancelled.");
            return Ok(());
        }
    }

    let spinner = output::spinner("Deleting tenant...", json);
    let result = state.registry.delete_tenant(id).await;
    spinner.finish_and_clear();
    result?;

    if json {
        return output::print_json(&serde_json::json!({ "deleted": id }));
    }
    output::success(format!("Deleted tenant {}", style(id).cyan()));
    Ok(())
}
