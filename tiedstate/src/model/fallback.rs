//! Nearest-HMM resolution for units with no exact match.

use super::core::TiedStateAcousticModel;
use crate::error::{LookupError, Result};
use crate::hmm::{HmmPosition, SenoneHmm};
use crate::loader::LoadedModel;
use crate::traits::Loader;
use crate::unit::{Context, Unit};
use std::sync::Arc;

/// Whether a composite HMM may stand in for `unit`: a non-filler with a
/// left/right context missing at least one whole side.
pub fn is_composite_eligible(unit: &Unit) -> bool {
    if unit.is_filler() {
        return false;
    }
    match unit.context() {
        Context::LeftRight { left, right } => left.is_unspecified() || right.is_unspecified(),
        Context::Empty => false,
    }
}

impl<L: Loader> TiedStateAcousticModel<L> {
    /// Resolve `unit` at `position`, trying in order:
    ///
    /// 1. the exact `(position, unit)` HMM
    /// 2. a composite HMM, for eligible units
    /// 3. the unit at any other position
    /// 4. the unit with non-silence filler contexts replaced by silence
    /// 5. the context-independent HMM of the base phone
    pub(super) fn nearest_hmm(
        &self,
        model: &LoadedModel,
        unit: &Unit,
        position: HmmPosition,
    ) -> Result<Arc<SenoneHmm>> {
        let manager = &model.hmm_manager;

        if let Some(hmm) = manager.get(position, unit) {
            return Ok(hmm);
        }

        if self.use_composites && is_composite_eligible(unit) {
            return self.composite_hmm(model, unit, position);
        }

        if let Some(hmm) = manager.get_any_position(unit) {
            tracing::debug!(%unit, %position, found = %hmm, "matched at another position");
            return Ok(hmm);
        }

        if let Some(hmm) = self.hmm_in_silence_context(model, unit, position) {
            return Ok(hmm);
        }

        let hmm = self.context_independent_hmm(model, unit.name())?;
        tracing::debug!(%unit, %position, "backed off to context-independent hmm");
        Ok(hmm)
    }

    /// Retry with every non-silence filler in the context replaced by silence.
    fn hmm_in_silence_context(
        &self,
        model: &LoadedModel,
        unit: &Unit,
        position: HmmPosition,
    ) -> Option<Arc<SenoneHmm>> {
        let Context::LeftRight { left, right } = unit.context() else {
            return None;
        };

        let silence = self.units.silence();
        let left_filled = left.has_non_silence_filler(silence);
        let right_filled = right.has_non_silence_filler(silence);
        if !left_filled && !right_filled {
            return None;
        }

        let left = if left_filled {
            left.with_fillers_silenced(silence)
        } else {
            left.clone()
        };
        let right = if right_filled {
            right.with_fillers_silenced(silence)
        } else {
            right.clone()
        };
        let substituted = self.units.get_unit(
            unit.name(),
            unit.is_filler(),
            Context::left_right(left, right),
        );
        tracing::debug!(%unit, %substituted, "trying silence context");

        model
            .hmm_manager
            .get(position, &substituted)
            .or_else(|| model.hmm_manager.get_any_position(&substituted))
    }

    /// Undefined-position HMM of the base phone `name`.
    ///
    /// Loading guarantees one exists for every base phone, so a miss means
    /// the model is corrupt.
    pub(super) fn context_independent_hmm(
        &self,
        model: &LoadedModel,
        name: &str,
    ) -> Result<Arc<SenoneHmm>> {
        let unit = model.context_independent_unit(name).ok_or_else(|| {
            tracing::error!(name, "no context-independent unit");
            LookupError::MissingContextIndependentUnit {
                name: name.to_string(),
            }
        })?;

        model
            .hmm_manager
            .get(HmmPosition::Undefined, unit)
            .ok_or_else(|| {
                tracing::error!(%unit, "no context-independent hmm");
                LookupError::MissingContextIndependentHmm {
                    unit: unit.to_string(),
                }
                .into()
            })
    }
}
