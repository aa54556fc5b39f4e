//! A materialized SLU skill and the shared inference path.

use std::sync::Arc;

use chatskill_types::error::SkillError;
use chatskill_types::model::ModelSkill;
use chatskill_types::retrieval::{CandidateKey, IndexEntry};
use chatskill_types::skill::{SkillId, SluTask};
use chatskill_types::slu::{SluResponse, SluSkill};
use tokio::sync::{Mutex, RwLock};

use super::correction;
use crate::capability::search::SearchEngine;
use crate::capability::slu_model::SluModel;
use crate::platform::{Backends, Platform};
use crate::repository::slu::SluSkillRepository;

pub struct SluSkillRuntime<P: Platform> {
    id: SkillId,
    record: RwLock<SluSkill>,
    lock: Arc<Mutex<()>>,
    backends: Backends<P>,
}

impl<P: Platform> SluSkillRuntime<P> {
    pub fn new(record: SluSkill, backends: Backends<P>, lock: Arc<Mutex<()>>) -> Self {
        Self {
            id: record.id.clone(),
            record: RwLock::new(record),
            lock,
            backends,
        }
    }

    pub fn id(&self) -> &SkillId {
        &self.id
    }

    pub async fn record(&self) -> SluSkill {
        self.record.read().await.clone()
    }

    /// Serve `model` with `task`.
    ///
    /// A model trained for another skill is accepted with a warning. The
    /// task must match the model's, except that an `SLU-both` model can
    /// serve any task.
    pub async fn deploy_model(
        &self,
        model: &ModelSkill,
        task: SluTask,
    ) -> Result<SluSkill, SkillError> {
        if !model.is_trained() {
            return Err(SkillError::Validation(format!(
                "model {} has not been trained",
                model.id
            )));
        }
        if model.task != task && model.task != SluTask::Both {
            return Err(SkillError::Validation(format!(
                "model {} was trained for {}, cannot serve {task}",
                model.id, model.task
            )));
        }
        if model.skill_id != self.id {
            tracing::warn!(
                skill_id = %self.id,
                model_id = %model.id,
                trained_for = %model.skill_id,
                "deploying a model trained for a different skill"
            );
        }

        self.update(|record| {
            record.deployed_model_id = Some(model.id.clone());
            record.task = task;
        })
        .await
    }

    /// Use the named term index for corrections.
    pub async fn deploy_term_index(&self, name: &str) -> Result<SluSkill, SkillError> {
        if !self.backends.search.index_exists(name).await? {
            return Err(SkillError::NotFound(format!("term index {name}")));
        }
        self.update(|record| record.term_index = Some(name.to_string()))
            .await
    }

    /// Run inference with the model this skill has deployed.
    pub async fn inference<M: SluModel>(
        &self,
        model: &M,
        question: &str,
        use_correction: bool,
    ) -> Result<SluResponse, SkillError> {
        let record = self.record.read().await.clone();
        run_inference(
            &self.backends,
            model,
            record.task,
            record.term_index.as_deref(),
            question,
            use_correction,
        )
        .await
    }

    async fn update(
        &self,
        apply: impl FnOnce(&mut SluSkill) + Send,
    ) -> Result<SluSkill, SkillError> {
        let _guard = self.lock.lock().await;
        let mut next = self.record.read().await.clone();
        apply(&mut next);
        let stored = self.backends.slus.update(&next).await?;
        *self.record.write().await = stored.clone();
        tracing::info!(
            skill_id = %self.id,
            model_id = ?stored.deployed_model_id,
            term_index = ?stored.term_index,
            "updated SLU deployment"
        );
        Ok(stored)
    }
}

/// Correct (optionally) and classify `question`, shaping the output by
/// `task`.
pub(crate) async fn run_inference<P: Platform, M: SluModel>(
    backends: &Backends<P>,
    model: &M,
    task: SluTask,
    term_index: Option<&str>,
    question: &str,
    use_correction: bool,
) -> Result<SluResponse, SkillError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(SkillError::Validation(
            "question must not be empty".to_string(),
        ));
    }

    let (question, trace) = match (use_correction, term_index) {
        (true, Some(index)) => {
            correction::correct(backends.search.as_ref(), index, question, &backends.config.slu)
                .await?
        }
        (true, None) => {
            tracing::debug!("correction requested without a term index");
            (question.to_string(), Vec::new())
        }
        (false, _) => (question.to_string(), Vec::new()),
    };

    let prediction = model
        .predict(&question, backends.config.slu.inference_top_k.max(1))
        .await?;
    Ok(SluResponse::shaped(task, question, prediction, trace))
}

/// Create a term index holding `terms`, one entry per distinct term.
pub async fn create_term_index<S: SearchEngine>(
    search: &S,
    name: &str,
    terms: &[String],
) -> Result<usize, SkillError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(SkillError::Validation(
            "term index name must not be empty".to_string(),
        ));
    }

    let mut distinct: Vec<&str> = Vec::new();
    for term in terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()) {
        if !distinct.contains(&term) {
            distinct.push(term);
        }
    }
    if distinct.is_empty() {
        return Err(SkillError::Validation(
            "a term index needs at least one term".to_string(),
        ));
    }

    search.create_index(name).await.map_err(|e| match e {
        chatskill_types::error::RepositoryError::Conflict(_) => {
            SkillError::Validation(format!("term index {name} already exists"))
        }
        other => other.into(),
    })?;

    let entries: Vec<IndexEntry> = distinct
        .iter()
        .enumerate()
        .map(|(i, term)| IndexEntry {
            key: CandidateKey::document(i as i64),
            text: term.to_string(),
        })
        .collect();
    if let Err(e) = search.index_entries(name, &entries).await {
        if let Err(cleanup) = search.delete_index(name).await {
            tracing::warn!(index = %name, "failed to drop partial term index: {cleanup}");
        }
        return Err(e.into());
    }

    tracing::info!(index = %name, terms = entries.len(), "created term index");
    Ok(entries.len())
}
