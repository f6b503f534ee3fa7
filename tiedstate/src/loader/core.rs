//! Model loader: pool files and model definition into a [`LoadedModel`].

use crate::config::ModelConfig;
use crate::error::Result;
use crate::format::TokenReader;
use crate::hmm::HmmManager;
use crate::logmath::LogMath;
use crate::pool::{Pool, PoolFeature};
use crate::senone::Senone;
use crate::traits::Loader;
use crate::types::ModelDir;
use crate::unit::{Unit, UnitManager};
use ndarray::{Array1, Array2};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

/// Pool file base names under the data directory.
pub const MEANS: &str = "means";
pub const VARIANCES: &str = "variances";
pub const MIXTURE_WEIGHTS: &str = "mixture_weights";
pub const TRANSITION_MATRICES: &str = "transition_matrices";

/// Everything read from one model directory.
#[derive(Debug)]
pub struct LoadedModel {
    pub means: Pool<Array1<f32>>,
    pub variances: Pool<Array1<f32>>,
    pub mixture_weights: Pool<Array1<f32>>,
    pub transition_matrices: Pool<Arc<Array2<f32>>>,
    pub senones: Pool<Arc<Senone>>,
    pub hmm_manager: HmmManager,
    /// Context-independent units in model-definition order
    pub context_independent_units: Vec<Arc<Unit>>,
    pub log_math: LogMath,
    ci_by_name: HashMap<String, Arc<Unit>>,
}

impl LoadedModel {
    /// Context-independent unit named `name`.
    pub fn context_independent_unit(&self, name: &str) -> Option<&Arc<Unit>> {
        self.ci_by_name.get(name)
    }

    /// Number of Gaussians per senone.
    pub fn gaussians_per_state(&self) -> usize {
        self.mixture_weights
            .feature_or(PoolFeature::NumGaussiansPerState, 0)
    }

    pub fn log_info(&self) {
        self.means.log_info();
        self.variances.log_info();
        self.mixture_weights.log_info();
        self.transition_matrices.log_info();
        self.senones.log_info();
        self.hmm_manager.log_info();
        tracing::info!(
            context_independent_units = self.context_independent_units.len(),
            "units"
        );
    }
}

/// Loads a model directory laid out as
/// `<root>/<model_definition>` and `<root>/<data_location>/<pool>[.ascii]`.
#[derive(Clone, Debug)]
pub struct ModelLoader {
    dir: ModelDir,
    config: ModelConfig,
    log_math: LogMath,
}

impl ModelLoader {
    pub fn new(root: impl Into<PathBuf>, config: ModelConfig) -> Self {
        let log_math = LogMath::new(config.log_base);
        Self {
            dir: ModelDir::new(root),
            config,
            log_math,
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn log_math(&self) -> LogMath {
        self.log_math
    }

    pub fn model_dir(&self) -> &ModelDir {
        &self.dir
    }

    fn pool_path(&self, name: &str) -> Result<PathBuf> {
        let file = format!("{name}{}", self.config.pool_suffix());
        self.dir.resolve(self.config.data_location.join(file))
    }

    fn model_definition_path(&self) -> Result<PathBuf> {
        self.dir.resolve(&self.config.model_definition)
    }
}

impl Loader for ModelLoader {
    fn load(&self, units: &UnitManager) -> Result<LoadedModel> {
        self.config.validate()?;
        let start = Instant::now();
        tracing::info!(
            root = %self.dir.root().display(),
            model_definition = %self.config.model_definition,
            data_location = %self.config.data_location.display(),
            binary = self.config.is_binary,
            "loading acoustic model"
        );

        let means = self.load_density_pool(&self.pool_path(MEANS)?, -f32::MAX)?;
        let variances =
            self.load_density_pool(&self.pool_path(VARIANCES)?, self.config.variance_floor)?;
        let mixture_weights = self.load_mixture_weights(
            &self.pool_path(MIXTURE_WEIGHTS)?,
            self.config.mixture_weight_floor,
        )?;
        let transition_matrices =
            self.load_transition_matrices(&self.pool_path(TRANSITION_MATRICES)?)?;
        let senones = self.build_senone_pool(&means, &variances, &mixture_weights)?;

        let reader = TokenReader::open(self.model_definition_path()?)?;
        let definition =
            self.load_model_definition(reader, units, &senones, &transition_matrices)?;

        tracing::debug!(elapsed = ?start.elapsed(), "model files loaded");

        let mut ci_by_name = HashMap::with_capacity(definition.context_independent_units.len());
        for unit in &definition.context_independent_units {
            ci_by_name
                .entry(unit.name().to_string())
                .or_insert_with(|| Arc::clone(unit));
        }

        Ok(LoadedModel {
            means,
            variances,
            mixture_weights,
            transition_matrices,
            senones,
            hmm_manager: definition.hmm_manager,
            context_independent_units: definition.context_independent_units,
            log_math: self.log_math,
            ci_by_name,
        })
    }
}

/// Pool name for a model file: its file name.
pub(super) fn pool_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
