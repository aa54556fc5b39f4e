//! Model skills: training requests, hyperparameters, and export manifests.

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skill::{SkillId, SkillType, SluTask};
use crate::tenant::TenantId;

/// Training hyperparameters with their accepted ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingArgs {
    /// Passes over the training set, 1..=30.
    pub epoch: u32,
    /// 1..=64.
    pub train_batch_size: u32,
    /// 1e-5..=1e-3.
    pub learning_rate: f64,
    /// 1e-5..=1.
    pub weight_decay: f64,
    /// Evaluations without improvement before stopping, 1..=5.
    pub early_stop_patience: u32,
    /// Minimum improvement that resets patience, 0..=0.001.
    pub early_stop_threshold: f64,
}

impl Default for TrainingArgs {
    fn default() -> Self {
        Self {
            epoch: 2,
            train_batch_size: 16,
            learning_rate: 5e-5,
            weight_decay: 0.01,
            early_stop_patience: 2,
            early_stop_threshold: 0.0,
        }
    }
}

impl TrainingArgs {
    pub fn validate(&self) -> Result<(), String> {
        fn check<T: PartialOrd + std::fmt::Display>(
            name: &str,
            value: T,
            min: T,
            max: T,
        ) -> Result<(), String> {
            if value < min || value > max {
                return Err(format!("{name} must be within [{min}, {max}], got {value}"));
            }
            Ok(())
        }

        check("epoch", self.epoch, 1, 30)?;
        check("train_batch_size", self.train_batch_size, 1, 64)?;
        check("learning_rate", self.learning_rate, 1e-5, 1e-3)?;
        check("weight_decay", self.weight_decay, 1e-5, 1.0)?;
        check("early_stop_patience", self.early_stop_patience, 1, 5)?;
        check("early_stop_threshold", self.early_stop_threshold, 0.0, 0.001)?;
        Ok(())
    }

    /// Flatten into tracker parameters.
    pub fn to_params(&self) -> BTreeMap<String, String> {
        BTreeMap::from([
            ("epoch".to_string(), self.epoch.to_string()),
            ("train_batch_size".to_string(), self.train_batch_size.to_string()),
            ("learning_rate".to_string(), self.learning_rate.to_string()),
            ("weight_decay".to_string(), self.weight_decay.to_string()),
            ("early_stop_patience".to_string(), self.early_stop_patience.to_string()),
            ("early_stop_threshold".to_string(), self.early_stop_threshold.to_string()),
        ])
    }
}

/// A labelled slot value inside a training utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotAnnotation {
    pub label: String,
    pub value: String,
}

/// One labelled utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slots: Vec<SlotAnnotation>,
}

/// Everything needed to (re)train a model; stored verbatim for export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainRequest {
    pub task: SluTask,
    /// Kind of the skill this model is trained for.
    pub skill_type: SkillType,
    /// Id of the skill this model is trained for.
    pub skill_id: SkillId,
    pub train_data: Vec<TrainingExample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eval_data: Option<Vec<TrainingExample>>,
    /// Hyperparameters; unset takes the configured defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<TrainingArgs>,
}

impl TrainRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.skill_type != SkillType::Slu {
            return Err(format!(
                "models can only be trained for {} skills, got {}",
                SkillType::Slu,
                self.skill_type
            ));
        }
        if self.train_data.is_empty() {
            return Err("train_data must not be empty".to_string());
        }
        if let Some(args) = &self.args {
            args.validate()?;
        }

        let examples = self
            .train_data
            .iter()
            .chain(self.eval_data.iter().flatten());
        for (i, example) in examples.enumerate() {
            if example.text.trim().is_empty() {
                return Err(format!("example {i} has empty text"));
            }
            if self.task.predicts_intent()
                && example.intent.as_deref().is_none_or(|s| s.trim().is_empty())
            {
                return Err(format!("example {i} is missing an intent label for {}", self.task));
            }
            if let Some(slot) = example.slots.iter().find(|s| !example.text.contains(&s.value)) {
                return Err(format!(
                    "example {i} slot '{}' value '{}' does not occur in the text",
                    slot.label, slot.value
                ));
            }
        }
        Ok(())
    }
}

/// A trainable model owned by a tenant's model manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSkill {
    pub id: SkillId,
    pub tenant_id: TenantId,
    pub task: SluTask,
    /// Kind of the skill this model was trained for.
    pub skill_type: SkillType,
    /// Skill this model was trained for. Not enforced at deploy time.
    pub skill_id: SkillId,
    pub args: TrainingArgs,
    pub original_request: TrainRequest,
    pub run_id: Option<String>,
    /// Set only after training succeeds.
    pub artifact_uri: Option<String>,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
}

impl ModelSkill {
    pub fn is_trained(&self) -> bool {
        self.artifact_uri.is_some()
    }
}

/// Result of a successful train or import.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub model: ModelSkill,
    /// Local directory holding the model artifact.
    pub save_path: PathBuf,
    pub tracking_uri: String,
    pub run_id: String,
}

/// A tracked experiment run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    pub namespace: String,
    pub name: String,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
}

/// Metadata packaged alongside the artifact files in an exported model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelManifest {
    pub model_id: SkillId,
    pub task: SluTask,
    pub params: BTreeMap<String, String>,
    pub metrics: BTreeMap<String, f64>,
    pub tags: BTreeMap<String, String>,
    pub original_request: TrainRequest,
}

/// Deterministic archive file name for an exported model.
pub fn archive_file_name(model_id: &SkillId) -> String {
    format!("model_{model_id}.json.gz")
}
