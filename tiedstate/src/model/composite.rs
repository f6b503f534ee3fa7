//! Composite senone sequences for partially specified contexts.

use super::core::TiedStateAcousticModel;
use crate::error::Result;
use crate::hmm::{HmmPosition, SenoneHmm, SenoneSequence};
use crate::loader::LoadedModel;
use crate::senone::{CompositeSenone, Senone};
use crate::traits::Loader;
use crate::unit::Unit;
use std::sync::Arc;
use std::sync::atomic::Ordering;

impl<L: Loader> TiedStateAcousticModel<L> {
    /// Composite senone sequence covering every HMM at `position` whose unit
    /// matches `unit`'s name and specified context.
    ///
    /// Built at most once per unit and cached by the unit's display string;
    /// concurrent callers for the same unit wait for the one build.
    pub fn composite_senone_sequence(
        &self,
        unit: &Unit,
        position: HmmPosition,
    ) -> Result<Arc<SenoneSequence>> {
        let model = self.model()?;
        self.cached_composite_sequence(model, unit, position)
    }

    fn cached_composite_sequence(
        &self,
        model: &LoadedModel,
        unit: &Unit,
        position: HmmPosition,
    ) -> Result<Arc<SenoneSequence>> {
        let cell = {
            let mut cache = self.composites.lock();
            Arc::clone(cache.entry(unit.to_string()).or_default())
        };

        cell.get_or_try_init(|| self.build_composite_sequence(model, unit, position))
            .cloned()
    }

    fn build_composite_sequence(
        &self,
        model: &LoadedModel,
        unit: &Unit,
        position: HmmPosition,
    ) -> Result<Arc<SenoneSequence>> {
        let mut sequences: Vec<Arc<SenoneSequence>> = model
            .hmm_manager
            .hmms_at(position)
            .into_iter()
            .filter(|hmm| hmm.unit().is_partial_match(unit.name(), unit.context()))
            .inspect(|hmm| {
                tracing::debug!(target_unit = %unit, collected = %hmm.unit(), "composite member")
            })
            .map(|hmm| Arc::clone(hmm.senone_sequence()))
            .collect();

        if sequences.is_empty() {
            let ci = self.context_independent_hmm(model, unit.name())?;
            sequences.push(Arc::clone(ci.senone_sequence()));
        }

        let longest = sequences.iter().map(|s| s.len()).max().unwrap_or(0);
        let senones = (0..longest)
            .map(|state| {
                let members = sequences.iter().filter_map(|s| s.get(state).cloned());
                Arc::new(Senone::from(CompositeSenone::new(members)))
            })
            .collect();

        self.composites_built.fetch_add(1, Ordering::AcqRel);
        tracing::debug!(
            %unit,
            %position,
            sequences = sequences.len(),
            states = longest,
            "built composite senone sequence"
        );

        Ok(Arc::new(SenoneSequence::new(senones)))
    }

    /// Composite HMM for `unit`, published in the HMM manager.
    ///
    /// The transition matrix is borrowed from the base phone's
    /// context-independent HMM.
    pub(super) fn composite_hmm(
        &self,
        model: &LoadedModel,
        unit: &Unit,
        position: HmmPosition,
    ) -> Result<Arc<SenoneHmm>> {
        let sequence = self.cached_composite_sequence(model, unit, position)?;
        let ci = self.context_independent_hmm(model, unit.name())?;
        let unit = self
            .units
            .get_unit(unit.name(), unit.is_filler(), unit.context().clone());

        let hmm = SenoneHmm::new(
            unit,
            sequence,
            Arc::clone(ci.transition_matrix()),
            position,
        );
        Ok(model.hmm_manager.get_or_insert(Arc::new(hmm)))
    }
}
