//! Tied-state acoustic model: allocation and the query surface.

use crate::config::ModelConfig;
use crate::error::{LookupError, Result};
use crate::hmm::{HmmPosition, SenoneHmm, SenoneSequence};
use crate::loader::{LoadedModel, ModelLoader};
use crate::traits::{AcousticModel, Loader};
use crate::unit::{Unit, UnitManager};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

/// Composite senone sequences keyed by unit display string.
pub(super) type CompositeCache = Mutex<HashMap<String, Arc<OnceCell<Arc<SenoneSequence>>>>>;

/// Acoustic model over tied-state HMMs.
///
/// Nothing is loaded until [`allocate`](AcousticModel::allocate). After that the
/// model is read-only apart from the composite cache, and can be shared
/// between decoding threads.
pub struct TiedStateAcousticModel<L> {
    pub(super) loader: L,
    pub(super) units: Arc<UnitManager>,
    pub(super) use_composites: bool,
    pub(super) loaded: Option<LoadedModel>,
    pub(super) composites: CompositeCache,
    pub(super) composites_built: AtomicUsize,
}

impl TiedStateAcousticModel<ModelLoader> {
    /// Model stored under `root`, with its own unit manager.
    pub fn from_dir(root: impl Into<PathBuf>, config: ModelConfig) -> Self {
        let use_composites = config.use_composites;
        Self::new(
            ModelLoader::new(root, config),
            Arc::new(UnitManager::new()),
            use_composites,
        )
    }
}

impl<L: Loader> TiedStateAcousticModel<L> {
    pub fn new(loader: L, units: Arc<UnitManager>, use_composites: bool) -> Self {
        Self {
            loader,
            units,
            use_composites,
            loaded: None,
            composites: Mutex::new(HashMap::new()),
            composites_built: AtomicUsize::new(0),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Factory that interned every unit of this model.
    pub fn unit_manager(&self) -> &Arc<UnitManager> {
        &self.units
    }

    pub fn is_allocated(&self) -> bool {
        self.loaded.is_some()
    }

    /// Loaded pools and HMMs.
    pub fn model(&self) -> Result<&LoadedModel> {
        self.loaded
            .as_ref()
            .ok_or_else(|| LookupError::NotAllocated.into())
    }

    /// Number of composite senone sequences built so far.
    pub fn composite_sequences_built(&self) -> usize {
        self.composites_built.load(Ordering::Acquire)
    }

    /// Number of units with a cached composite senone sequence.
    pub fn composite_cache_len(&self) -> usize {
        self.composites
            .lock()
            .values()
            .filter(|cell| cell.get().is_some())
            .count()
    }

    fn log_info(&self, model: &LoadedModel) {
        model.log_info();
        tracing::info!(
            composite_senone_sequences = self.composite_cache_len(),
            "composites"
        );
    }
}

impl<L: Loader> AcousticModel for TiedStateAcousticModel<L> {
    fn allocate(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            tracing::debug!("acoustic model already allocated");
            return Ok(());
        }

        let start = Instant::now();
        let model = self.loader.load(&self.units)?;
        tracing::info!(
            elapsed = ?start.elapsed(),
            hmms = model.hmm_manager.len(),
            senones = model.senones.len(),
            "acoustic model allocated"
        );
        self.log_info(&model);
        self.loaded = Some(model);
        Ok(())
    }

    fn hmms(&self) -> Result<Vec<Arc<SenoneHmm>>> {
        Ok(self.model()?.hmm_manager.hmms())
    }

    fn context_independent_units(&self) -> Result<Vec<Arc<Unit>>> {
        Ok(self.model()?.context_independent_units.clone())
    }

    fn lookup_nearest_hmm(
        &self,
        unit: &Unit,
        position: HmmPosition,
        exact_match: bool,
    ) -> Result<Option<Arc<SenoneHmm>>> {
        let model = self.model()?;
        if exact_match {
            return Ok(model.hmm_manager.get(position, unit));
        }
        self.nearest_hmm(model, unit, position).map(Some)
    }

    fn left_context_size(&self) -> usize {
        self.loader.left_context_size()
    }

    fn right_context_size(&self) -> usize {
        self.loader.right_context_size()
    }
}
