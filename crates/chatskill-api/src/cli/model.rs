//! Model subcommands: train, retrain, export, and import SLU models.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use comfy_table::Cell;
use console::style;

use chatskill_core::skill::SkillManager;
use chatskill_types::error::SkillError;
use chatskill_types::model::{ModelSkill, TrainOutcome, TrainRequest, TrainingArgs, TrainingExample};
use chatskill_types::skill::{SkillId, SkillType, SluTask};
use chatskill_types::tenant::TenantId;

use super::{output, read_json};
use crate::state::{AppState, Session};

/// Hyperparameter overrides. Unset flags keep the configured defaults.
#[derive(Args, Default)]
pub struct TrainingArgFlags {
    /// Passes over the training set (1 to 30).
    #[arg(long)]
    pub epoch: Option<u32>,

    /// Examples per batch (1 to 64).
    #[arg(long)]
    pub batch_size: Option<u32>,

    /// Learning rate (1e-5 to 1e-3).
    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Weight decay (1e-5 to 1).
    #[arg(long)]
    pub weight_decay: Option<f64>,

    /// Evaluations without improvement before stopping (1 to 5).
    #[arg(long)]
    pub patience: Option<u32>,

    /// Minimum improvement that resets patience (0 to 0.001).
    #[arg(long)]
    pub threshold: Option<f64>,
}

impl TrainingArgFlags {
    /// Overlay the given flags on `defaults`, or `None` when no flag is set.
    fn resolve(self, defaults: &TrainingArgs) -> Option<TrainingArgs> {
        let any = self.epoch.is_some()
            || self.batch_size.is_some()
            || self.learning_rate.is_some()
            || self.weight_decay.is_some()
            || self.patience.is_some()
            || self.threshold.is_some();
        if !any {
            return None;
        }
        Some(TrainingArgs {
            epoch: self.epoch.unwrap_or(defaults.epoch),
            train_batch_size: self.batch_size.unwrap_or(defaults.train_batch_size),
            learning_rate: self.learning_rate.unwrap_or(defaults.learning_rate),
            weight_decay: self.weight_decay.unwrap_or(defaults.weight_decay),
            early_stop_patience: self.patience.unwrap_or(defaults.early_stop_patience),
            early_stop_threshold: self.threshold.unwrap_or(defaults.early_stop_threshold),
        })
    }
}

#[derive(Subcommand)]
pub enum ModelCommand {
    /// Train a new model for an SLU skill.
    Train {
        /// Tenant ID.
        tenant: TenantId,

        /// SLU skill the model is trained for.
        skill: SkillId,

        /// What the model predicts: intent, slot, or both.
        #[arg(long, default_value = "SLU-intent")]
        task: SluTask,

        /// JSON file with training examples.
        #[arg(long)]
        train: PathBuf,

        /// JSON file with evaluation examples. Defaults to a holdout split.
        #[arg(long)]
        eval: Option<PathBuf>,

        #[command(flatten)]
        args: TrainingArgFlags,
    },

    /// Train an existing model again from its stored request.
    Retrain {
        /// Tenant ID.
        tenant: TenantId,

        /// Model ID.
        id: SkillId,
    },

    /// List a tenant's models.
    List {
        /// Tenant ID.
        tenant: TenantId,
    },

    /// Show a model with its hyperparameters and metrics.
    Show {
        /// Tenant ID.
        tenant: TenantId,

        /// Model ID.
        id: SkillId,
    },

    /// Delete a model and its tracked run.
    Delete {
        /// Tenant ID.
        tenant: TenantId,

        /// Model ID.
        id: SkillId,
    },

    /// Package a trained model into a portable archive.
    Export {
        /// Tenant ID.
        tenant: TenantId,

        /// Model ID.
        id: SkillId,
    },

    /// Register an exported archive as a new model.
    Import {
        /// Tenant ID.
        tenant: TenantId,

        /// Archive produced by `cskill model export`.
        archive: PathBuf,

        /// SLU skill the imported model serves.
        #[arg(long)]
        skill: SkillId,
    },
}

pub async fn handle_model_command(cmd: ModelCommand, state: &AppState, json: bool) -> Result<()> {
    match cmd {
        ModelCommand::Train {
            tenant,
            skill,
            task,
            train,
            eval,
            args,
        } => {
            let train_data: Vec<TrainingExample> = read_json(&train).await?;
            let eval_data = match eval {
                Some(path) => Some(read_json::<Vec<TrainingExample>>(&path).await?),
                None => None,
            };
            let request = TrainRequest {
                task,
                skill_type: SkillType::Slu,
                skill_id: skill,
                train_data,
                eval_data,
                args: args.resolve(&state.config().training.default_args),
            };
            train_model(state, &tenant, request, json).await
        }
        ModelCommand::Retrain { tenant, id } => retrain_model(state, &tenant, &id, json).await,
        ModelCommand::List { tenant } => list_models(state, &tenant, json).await,
        ModelCommand::Show { tenant, id } => show_model(state, &tenant, &id, json).await,
        ModelCommand::Delete { tenant, id } => delete_model(state, &tenant, &id, json).await,
        ModelCommand::Export { tenant, id } => export_model(state, &tenant, &id, json).await,
        ModelCommand::Import {
            tenant,
            archive,
            skill,
        } => import_model(state, &tenant, archive, &skill, json).await,
    }
}

async fn all_models(session: &Session) -> Result<Vec<ModelSkill>, SkillError> {
    session.models().await?.get_all_skills().await
}

fn format_metrics(model: &ModelSkill) -> String {
    if model.metrics.is_empty() {
        return "-".to_string();
    }
    model
        .metrics
        .iter()
        .map(|(name, value)| format!("{name}={value:.3}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn print_outcome(verb: &str, outcome: &TrainOutcome, json: bool) -> Result<()> {
    if json {
        return output::print_json(outcome);
    }
    output::success(format!(
        "{verb} model {} ({})",
        style(&outcome.model.id).cyan().bold(),
        outcome.model.task
    ));
    println!("  {} {}", style("Run:").dim(), outcome.run_id);
    println!("  {} {}", style("Tracking:").dim(), outcome.tracking_uri);
    println!("  {} {}", style("Artifact:").dim(), outcome.save_path.display());
    println!("  {} {}", style("Metrics:").dim(), format_metrics(&outcome.model));
    println!();
    Ok(())
}

async fn train_model(
    state: &AppState,
    tenant: &TenantId,
    request: TrainRequest,
    json: bool,
) -> Result<()> {
    let session = state.session(tenant).await?;

    let spinner = output::spinner(
        format!("Training {} model on {} examples...", request.task, request.train_data.len()),
        json,
    );
    let result = session.train_model(request).await;
    spinner.finish_and_clear();

    print_outcome("Trained", &result?, json)
}

async fn retrain_model(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;

    let spinner = output::spinner("Retraining model...", json);
    let result = session.retrain_model(id).await;
    spinner.finish_and_clear();

    print_outcome("Retrained", &result?, json)
}

async fn list_models(state: &AppState, tenant: &TenantId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;
    let models = output::or_empty(all_models(&session).await)?;

    if json {
        return output::print_json(&models);
    }
    if models.is_empty() {
        output::empty(
            "No models yet.",
            "Train one with: cskill model train <tenant> <slu-skill> --train examples.json",
        );
        return Ok(());
    }

    let mut table = output::table(&["ID", "TASK", "SKILL", "TRAINED", "METRICS"]);
    for model in &models {
        table.add_row(vec![
            Cell::new(&model.id),
            Cell::new(model.task),
            Cell::new(&model.skill_id),
            Cell::new(if model.is_trained() { "yes" } else { "no" }),
            Cell::new(format_metrics(model)),
        ]);
    }
    println!("{table}");
    Ok(())
}

async fn show_model(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let model = state
        .session(tenant)
        .await?
        .models()
        .await?
        .get_certain_skill(id)
        .await?;

    if json {
        return output::print_json(&model);
    }

    println!();
    println!("  {} {}", style("Model").bold(), style(&model.id).cyan());
    println!("  {} {}", style("Task:").dim(), model.task);
    println!("  {} {} {}", style("For:").dim(), model.skill_type, model.skill_id);
    println!(
        "  {} {} examples",
        style("Train data:").dim(),
        model.original_request.train_data.len()
    );
    match &model.artifact_uri {
        Some(uri) => println!("  {} {uri}", style("Artifact:").dim()),
        None => println!("  {} not trained", style("Artifact:").dim()),
    }
    if let Some(run_id) = &model.run_id {
        println!("  {} {run_id}", style("Run:").dim());
    }
    println!();

    let mut table = output::table(&["PARAMETER", "VALUE"]);
    for (name, value) in model.args.to_params() {
        table.add_row(vec![Cell::new(name), Cell::new(value)]);
    }
    for (name, value) in &model.metrics {
        table.add_row(vec![Cell::new(name), Cell::new(format!("{value:.4}"))]);
    }
    println!("{table}");
    Ok(())
}

async fn delete_model(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    state
        .session(tenant)
        .await?
        .delete_skill(SkillType::ModelManager, id)
        .await?;

    if json {
        return output::print_json(&serde_json::json!({ "deleted": id }));
    }
    output::success(format!("Deleted model {}", style(id).cyan()));
    Ok(())
}

async fn export_model(state: &AppState, tenant: &TenantId, id: &SkillId, json: bool) -> Result<()> {
    let session = state.session(tenant).await?;

    let spinner = output::spinner("Packaging model...", json);
    let result = session.export_model(id).await;
    spinner.finish_and_clear();
    let path = result?;

    if json {
        return output::print_json(&serde_json::json!({
            "model_id": id,
            "archive": path,
        }));
    }
    output::success(format!("Exported model to {}", style(path.display()).cyan()));
    Ok(())
}

async fn import_model(
    state: &AppState,
    tenant: &TenantId,
    archive: PathBuf,
    skill: &SkillId,
    json: bool,
) -> Result<()> {
    let session = state.session(tenant).await?;

    let spinner = output::spinner("Importing model...", json);
    let result = session.import_model(&archive, skill).await;
    spinner.finish_and_clear();

    print_outcome("Imported", &result?, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags_keeps_defaults_unset() {
        assert!(TrainingArgFlags::default().resolve(&TrainingArgs::default()).is_none());
    }

    #[test]
    fn test_flags_overlay_defaults() {
        let flags = TrainingArgFlags {
            epoch: Some(5),
            batch_size: Some(8),
            ..TrainingArgFlags::default()
        };
        let defaults = TrainingArgs::default();
        let args = flags.resolve(&defaults).unwrap();
        assert_eq!(args.epoch, 5);
        assert_eq!(args.train_batch_size, 8);
        assert_eq!(args.learning_rate, defaults.learning_rate);
        assert_eq!(args.early_stop_patience, defaults.early_stop_patience);
    }
}
