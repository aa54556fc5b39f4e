//! Skill kinds and the task vocabulary shared by SLU and model skills.

use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

pub use crate::id::SkillId;

/// The closed set of skill kinds a tenant can own.
///
/// Each kind is served by exactly one skill manager per tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SkillType {
    /// Hybrid lexical + embedding document retrieval.
    #[serde(rename = "Retrieve")]
    Retrieve,
    /// Intent/slot understanding backed by a deployed model.
    #[serde(rename = "SLU")]
    Slu,
    /// Model lifecycle: train, export, import.
    #[serde(rename = "ModelManager")]
    ModelManager,
    /// Knowledge-base question answering. Recognised, not served.
    #[serde(rename = "KBQA")]
    Kbqa,
}

impl SkillType {
    /// Every kind, in manager construction order.
    pub const ALL: [SkillType; 4] = [
        SkillType::Retrieve,
        SkillType::Slu,
        SkillType::ModelManager,
        SkillType::Kbqa,
    ];
}

impl fmt::Display for SkillType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkillType::Retrieve => write!(f, "Retrieve"),
            SkillType::Slu => write!(f, "SLU"),
            SkillType::ModelManager => write!(f, "ModelManager"),
            SkillType::Kbqa => write!(f, "KBQA"),
        }
    }
}

impl FromStr for SkillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "retrieve" | "retrieval" => Ok(SkillType::Retrieve),
            "slu" => Ok(SkillType::Slu),
            "modelmanager" | "model" => Ok(SkillType::ModelManager),
            "kbqa" => Ok(SkillType::Kbqa),
            other => Err(format!("invalid skill type: '{other}'")),
        }
    }
}

/// What an SLU model (and the skill serving it) predicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SluTask {
    #[serde(rename = "SLU-intent")]
    Intent,
    #[serde(rename = "SLU-slot")]
    Slot,
    #[serde(rename = "SLU-both")]
    Both,
}

impl SluTask {
    pub fn predicts_intent(&self) -> bool {
        matches!(self, SluTask::Intent | SluTask::Both)
    }

    pub fn predicts_slot(&self) -> bool {
        matches!(self, SluTask::Slot | SluTask::Both)
    }
}

impl fmt::Display for SluTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SluTask::Intent => write!(f, "SLU-intent"),
            SluTask::Slot => write!(f, "SLU-slot"),
            SluTask::Both => write!(f, "SLU-both"),
        }
    }
}

impl FromStr for SluTask {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "slu-intent" | "intent" => Ok(SluTask::Intent),
            "slu-slot" | "slot" => Ok(SluTask::Slot),
            "slu-both" | "both" => Ok(SluTask::Both),
            other => Err(format!("invalid SLU task: '{other}'")),
        }
    }
}
