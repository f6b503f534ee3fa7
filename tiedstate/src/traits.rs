//! Core traits for acoustic model components.

use crate::error::Result;
use crate::hmm::{HmmPosition, SenoneHmm};
use crate::loader::LoadedModel;
use crate::unit::{Unit, UnitManager};
use std::sync::Arc;

/// Source of model parameters.
///
/// Implementations read pools and the model definition, interning every unit
/// through the shared `units` factory.
pub trait Loader: Send + Sync {
    /// Load a complete model. Either everything loads or an error is returned.
    fn load(&self, units: &UnitManager) -> Result<LoadedModel>;

    /// Number of left context units in context-dependent units.
    fn left_context_size(&self) -> usize {
        1
    }

    /// Number of right context units in context-dependent units.
    fn right_context_size(&self) -> usize {
        1
    }
}

/// Read interface consumed by a decoder.
///
/// Every query fails with `LookupError::NotAllocated` until
/// [`allocate`](AcousticModel::allocate) has succeeded.
pub trait AcousticModel {
    /// Load the model. A second call after success does nothing.
    fn allocate(&mut self) -> Result<()>;

    /// All HMMs, including composites built so far.
    fn hmms(&self) -> Result<Vec<Arc<SenoneHmm>>>;

    /// All context-independent units.
    fn context_independent_units(&self) -> Result<Vec<Arc<Unit>>>;

    /// Best HMM for `unit` at `position`.
    ///
    /// With `exact_match` only an HMM stored under exactly `(position, unit)`
    /// is returned, possibly none. Otherwise the nearest match is always found.
    fn lookup_nearest_hmm(
        &self,
        unit: &Unit,
        position: HmmPosition,
        exact_match: bool,
    ) -> Result<Option<Arc<SenoneHmm>>>;

    fn left_context_size(&self) -> usize;

    fn right_context_size(&self) -> usize;
}
