//! The bundle of ports a deployment wires together.
//!
//! Services are generic over a single [`Platform`] instead of a dozen type
//! parameters; the composition root pins it to the concrete infra types.

use std::path::PathBuf;
use std::sync::Arc;

use chatskill_types::config::ChatskillConfig;
use chatskill_types::skill::SkillId;

use crate::capability::archive::ModelArchiver;
use crate::capability::encoder::Encoder;
use crate::capability::search::SearchEngine;
use crate::capability::slu_model::SluModelLoader;
use crate::capability::tracker::ExperimentTracker;
use crate::capability::trainer::Trainer;
use crate::capability::vector::VectorIndex;
use crate::repository::dataset::DatasetRepository;
use crate::repository::model::ModelSkillRepository;
use crate::repository::retrieval::RetrievalSkillRepository;
use crate::repository::slu::SluSkillRepository;
use crate::repository::tenant::TenantRepository;

/// Type-level selection of every port implementation.
pub trait Platform: Send + Sync + 'static {
    type Tenants: TenantRepository + 'static;
    type Models: ModelSkillRepository + 'static;
    type Retrievals: RetrievalSkillRepository + 'static;
    type Slus: SluSkillRepository + 'static;
    type Datasets: DatasetRepository + 'static;
    type Encoder: Encoder + 'static;
    type Search: SearchEngine + 'static;
    type Vectors: VectorIndex + 'static;
    type Trainer: Trainer + 'static;
    type Tracker: ExperimentTracker + 'static;
    type Loader: SluModelLoader + 'static;
    type Archiver: ModelArchiver + 'static;
}

/// Shared handles to every port plus configuration.
///
/// Cheap to clone; every tenant session and skill manager holds one.
pub struct Backends<P: Platform> {
    pub tenants: Arc<P::Tenants>,
    pub models: Arc<P::Models>,
    pub retrievals: Arc<P::Retrievals>,
    pub slus: Arc<P::Slus>,
    pub datasets: Arc<P::Datasets>,
    pub encoder: Arc<P::Encoder>,
    pub search: Arc<P::Search>,
    pub vectors: Arc<P::Vectors>,
    pub trainer: Arc<P::Trainer>,
    pub tracker: Arc<P::Tracker>,
    pub loader: Arc<P::Loader>,
    pub archiver: Arc<P::Archiver>,
    pub config: Arc<ChatskillConfig>,
    /// Root for training output, exports, and import staging.
    pub work_dir: PathBuf,
}

impl<P: Platform> Clone for Backends<P> {
    fn clone(&self) -> Self {
        Self {
            tenants: Arc::clone(&self.tenants),
            models: Arc::clone(&self.models),
            retrievals: Arc::clone(&self.retrievals),
            slus: Arc::clone(&self.slus),
            datasets: Arc::clone(&self.datasets),
            encoder: Arc::clone(&self.encoder),
            search: Arc::clone(&self.search),
            vectors: Arc::clone(&self.vectors),
            trainer: Arc::clone(&self.trainer),
            tracker: Arc::clone(&self.tracker),
            loader: Arc::clone(&self.loader),
            archiver: Arc::clone(&self.archiver),
            config: Arc::clone(&self.config),
            work_dir: self.work_dir.clone(),
        }
    }
}

impl<P: Platform> Backends<P> {
    /// Fresh output directory for one training attempt of a model.
    pub fn training_dir(&self, model_id: &SkillId, attempt: &str) -> PathBuf {
        self.work_dir
            .join("training")
            .join(model_id.simple())
            .join(attempt)
    }

    pub fn export_dir(&self) -> PathBuf {
        self.work_dir.join("exports")
    }

    /// Staging directory for unpacking one imported archive.
    pub fn import_dir(&self, attempt: &str) -> PathBuf {
        self.work_dir.join("imports").join(attempt)
    }
}
