//! SLU skills and inference output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::skill::{SkillId, SluTask};
use crate::tenant::TenantId;

/// An intent/slot understanding skill served by a deployed model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SluSkill {
    pub id: SkillId,
    pub tenant_id: TenantId,
    pub name: String,
    pub task: SluTask,
    /// Model skill id, resolved through the tenant's model manager.
    pub deployed_model_id: Option<SkillId>,
    /// Lexical index used by the correction pass.
    pub term_index: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSluSkillRequest {
    pub name: String,
    pub task: SluTask,
}

/// A ranked intent label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentScore {
    pub label: String,
    pub score: f32,
}

/// A slot value found in the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotValue {
    pub label: String,
    pub value: String,
    /// Character offset of `value` in the question.
    pub start: usize,
}

/// Raw model output before task-dependent shaping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SluPrediction {
    pub intents: Vec<IntentScore>,
    pub slots: Vec<SlotValue>,
}

/// One replacement applied by the correction pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correction {
    pub original: String,
    pub corrected: String,
    pub similarity: f32,
}

/// Inference response. `intent` is omitted for `SLU-slot`, `slot` for `SLU-intent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SluResponse {
    /// The question after correction.
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<Vec<IntentScore>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slot: Option<Vec<SlotValue>>,
    pub correction: Vec<Correction>,
}

impl SluResponse {
    /// Shape a prediction according to the serving task.
    pub fn shaped(
        task: SluTask,
        question: String,
        prediction: SluPrediction,
        correction: Vec<Correction>,
    ) -> Self {
        Self {
            question,
            intent: task.predicts_intent().then_some(prediction.intents),
            slot: task.predicts_slot().then_some(prediction.slots),
            correction,
        }
    }
}
