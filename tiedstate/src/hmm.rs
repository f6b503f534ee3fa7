//! HMMs over tied states and the (position, unit) index.

use crate::senone::Senone;
use crate::unit::Unit;
use ndarray::Array2;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Position of a unit within a word.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HmmPosition {
    Begin,
    End,
    Single,
    Internal,
    /// Context-independent units
    Undefined,
}

impl HmmPosition {
    /// Every position, in any-position scan order.
    pub const ALL: [HmmPosition; 5] = [
        HmmPosition::Begin,
        HmmPosition::End,
        HmmPosition::Single,
        HmmPosition::Internal,
        HmmPosition::Undefined,
    ];

    /// Parse a model-definition position token.
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "b" | "begin" => Some(HmmPosition::Begin),
            "e" | "end" => Some(HmmPosition::End),
            "s" | "single" => Some(HmmPosition::Single),
            "i" | "internal" => Some(HmmPosition::Internal),
            "-" => Some(HmmPosition::Undefined),
            _ => None,
        }
    }

    pub fn token(&self) -> &'static str {
        match self {
            HmmPosition::Begin => "b",
            HmmPosition::End => "e",
            HmmPosition::Single => "s",
            HmmPosition::Internal => "i",
            HmmPosition::Undefined => "-",
        }
    }

    pub fn is_word_beginning(&self) -> bool {
        matches!(self, HmmPosition::Begin | HmmPosition::Single)
    }

    pub fn is_word_ending(&self) -> bool {
        matches!(self, HmmPosition::End | HmmPosition::Single)
    }
}

impl fmt::Display for HmmPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Senones of an HMM's emitting states, in state order.
#[derive(Clone, Debug)]
pub struct SenoneSequence {
    senones: Vec<Arc<Senone>>,
}

impl SenoneSequence {
    pub fn new(senones: Vec<Arc<Senone>>) -> Self {
        Self { senones }
    }

    pub fn senones(&self) -> &[Arc<Senone>] {
        &self.senones
    }

    pub fn get(&self, index: usize) -> Option<&Arc<Senone>> {
        self.senones.get(index)
    }

    pub fn len(&self) -> usize {
        self.senones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senones.is_empty()
    }
}

/// An HMM whose emitting states share tied senones.
///
/// The transition matrix is square, in the log domain, with one row per
/// state including the non-emitting final state.
#[derive(Clone, Debug)]
pub struct SenoneHmm {
    unit: Arc<Unit>,
    senones: Arc<SenoneSequence>,
    transition_matrix: Arc<Array2<f32>>,
    position: HmmPosition,
}

impl SenoneHmm {
    pub fn new(
        unit: Arc<Unit>,
        senones: Arc<SenoneSequence>,
        transition_matrix: Arc<Array2<f32>>,
        position: HmmPosition,
    ) -> Self {
        Self {
            unit,
            senones,
            transition_matrix,
            position,
        }
    }

    pub fn unit(&self) -> &Arc<Unit> {
        &self.unit
    }

    pub fn senone_sequence(&self) -> &Arc<SenoneSequence> {
        &self.senones
    }

    pub fn transition_matrix(&self) -> &Arc<Array2<f32>> {
        &self.transition_matrix
    }

    pub fn position(&self) -> HmmPosition {
        self.position
    }

    /// Number of emitting states.
    pub fn order(&self) -> usize {
        self.senones.len()
    }

    pub fn is_composite(&self) -> bool {
        self.senones.senones().iter().any(|s| s.is_composite())
    }
}

impl fmt::Display for SenoneHmm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HMM({} {})", self.unit, self.position)
    }
}

#[derive(Debug, Default)]
struct Table {
    by_position: HashMap<HmmPosition, HashMap<Arc<Unit>, Arc<SenoneHmm>>>,
    /// Insertion order
    all: Vec<Arc<SenoneHmm>>,
}

/// Index of HMMs by (position, unit).
///
/// Populated while loading; afterwards only composite HMMs are added, through
/// [`HmmManager::get_or_insert`].
#[derive(Debug, Default)]
pub struct HmmManager {
    table: RwLock<Table>,
}

impl HmmManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `hmm`, returning the HMM it replaced under the same key, if any.
    pub fn put(&self, hmm: Arc<SenoneHmm>) -> Option<Arc<SenoneHmm>> {
        let mut table = self.table.write();
        let replaced = table
            .by_position
            .entry(hmm.position())
            .or_default()
            .insert(Arc::clone(hmm.unit()), Arc::clone(&hmm));

        match &replaced {
            Some(old) => {
                if let Some(slot) = table.all.iter_mut().find(|h| Arc::ptr_eq(h, old)) {
                    *slot = hmm;
                }
            }
            None => table.all.push(hmm),
        }
        replaced
    }

    /// Insert `hmm` unless its key is taken; returns whichever HMM ends up stored.
    pub fn get_or_insert(&self, hmm: Arc<SenoneHmm>) -> Arc<SenoneHmm> {
        let mut table = self.table.write();
        let slot = table.by_position.entry(hmm.position()).or_default();
        if let Some(existing) = slot.get(hmm.unit().as_ref()) {
            return Arc::clone(existing);
        }
        slot.insert(Arc::clone(hmm.unit()), Arc::clone(&hmm));
        table.all.push(Arc::clone(&hmm));
        hmm
    }

    pub fn get(&self, position: HmmPosition, unit: &Unit) -> Option<Arc<SenoneHmm>> {
        self.table
            .read()
            .by_position
            .get(&position)
            .and_then(|units| units.get(unit))
            .cloned()
    }

    /// First HMM for `unit` at any position, scanning [`HmmPosition::ALL`] in order.
    pub fn get_any_position(&self, unit: &Unit) -> Option<Arc<SenoneHmm>> {
        let table = self.table.read();
        HmmPosition::ALL.iter().find_map(|position| {
            table
                .by_position
                .get(position)
                .and_then(|units| units.get(unit))
                .cloned()
        })
    }

    /// Snapshot of every HMM in insertion order.
    pub fn hmms(&self) -> Vec<Arc<SenoneHmm>> {
        self.table.read().all.clone()
    }

    /// Snapshot of the HMMs at `position`.
    pub fn hmms_at(&self, position: HmmPosition) -> Vec<Arc<SenoneHmm>> {
        self.table
            .read()
            .all
            .iter()
            .filter(|hmm| hmm.position() == position)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().all.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Log HMM counts per position.
    pub fn log_info(&self) {
        let table = self.table.read();
        for position in HmmPosition::ALL {
            let count = table.by_position.get(&position).map_or(0, HashMap::len);
            tracing::info!(%position, count, "hmms");
        }
    }
}
