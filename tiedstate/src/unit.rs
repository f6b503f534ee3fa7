//! Phonetic units, their triphone contexts, and the interning factory.
//!
//! Units are value types compared structurally, but every unit handed out by
//! [`UnitManager`] is interned: asking twice for the same name, filler flag and
//! context yields the same `Arc`. HMM manager keys and the composite cache both
//! rely on that.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Name of the silence filler phone.
pub const SILENCE_NAME: &str = "SIL";

/// One side (left or right) of a triphone context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContextSide {
    /// Matches any context on this side.
    Unspecified,
    /// Explicit units; an empty slot matches any unit in that slot.
    Specified(Vec<Option<Arc<Unit>>>),
}

impl ContextSide {
    /// A fully specified side made of `units`.
    pub fn units<I>(units: I) -> Self
    where
        I: IntoIterator<Item = Arc<Unit>>,
    {
        ContextSide::Specified(units.into_iter().map(Some).collect())
    }

    pub fn is_unspecified(&self) -> bool {
        matches!(self, ContextSide::Unspecified)
    }

    pub fn slots(&self) -> Option<&[Option<Arc<Unit>>]> {
        match self {
            ContextSide::Unspecified => None,
            ContextSide::Specified(slots) => Some(slots),
        }
    }

    /// Whether `candidate` satisfies this side used as a pattern.
    ///
    /// Unspecified sides and empty slots of the pattern are wildcards.
    pub fn accepts(&self, candidate: &ContextSide) -> bool {
        let ContextSide::Specified(wanted) = self else {
            return true;
        };
        let ContextSide::Specified(found) = candidate else {
            return false;
        };
        wanted.len() == found.len()
            && wanted.iter().zip(found).all(|pair| match pair {
                (None, _) => true,
                (Some(w), Some(f)) => w.name() == f.name(),
                (Some(_), None) => false,
            })
    }

    /// Whether any slot holds a filler other than `silence`.
    pub fn has_non_silence_filler(&self, silence: &Unit) -> bool {
        self.slots().is_some_and(|slots| {
            slots
                .iter()
                .flatten()
                .any(|unit| unit.is_filler() && **unit != *silence)
        })
    }

    /// Copy of this side with every non-silence filler replaced by `silence`.
    pub fn with_fillers_silenced(&self, silence: &Arc<Unit>) -> ContextSide {
        match self {
            ContextSide::Unspecified => ContextSide::Unspecified,
            ContextSide::Specified(slots) => ContextSide::Specified(
                slots
                    .iter()
                    .map(|slot| {
                        slot.as_ref().map(|unit| {
                            if unit.is_filler() && **unit != **silence {
                                Arc::clone(silence)
                            } else {
                                Arc::clone(unit)
                            }
                        })
                    })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for ContextSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextSide::Unspecified => f.write_str("*"),
            ContextSide::Specified(slots) => {
                for (i, slot) in slots.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    match slot {
                        Some(unit) => f.write_str(unit.name())?,
                        None => f.write_str("?")?,
                    }
                }
                Ok(())
            }
        }
    }
}

/// Phonetic context of a unit.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum Context {
    /// Context-independent.
    #[default]
    Empty,
    /// Triphone context.
    LeftRight {
        left: ContextSide,
        right: ContextSide,
    },
}

impl Context {
    pub fn left_right(left: ContextSide, right: ContextSide) -> Self {
        Context::LeftRight { left, right }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Context::Empty)
    }

    /// Whether `candidate` matches this context used as a pattern.
    ///
    /// `Empty` only matches `Empty`. A left/right pattern treats its
    /// unspecified sides and empty slots as wildcards.
    pub fn is_partial_match(&self, candidate: &Context) -> bool {
        match (self, candidate) {
            (Context::Empty, candidate) => candidate.is_empty(),
            (Context::LeftRight { left, right }, Context::Empty) => {
                left.is_unspecified() && right.is_unspecified()
            }
            (
                Context::LeftRight { left, right },
                Context::LeftRight {
                    left: candidate_left,
                    right: candidate_right,
                },
            ) => left.accepts(candidate_left) && right.accepts(candidate_right),
        }
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Context::Empty => Ok(()),
            Context::LeftRight { left, right } => write!(f, "[{left},{right}]"),
        }
    }
}

/// A phonetic unit: base phone name, filler flag and context.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Unit {
    name: String,
    filler: bool,
    context: Context,
}

impl Unit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_filler(&self) -> bool {
        self.filler
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn is_context_dependent(&self) -> bool {
        !self.context.is_empty()
    }

    pub fn is_silence(&self) -> bool {
        self.filler && self.name == SILENCE_NAME && self.context.is_empty()
    }

    /// Whether this unit has base `name` and a context matched by `pattern`.
    pub fn is_partial_match(&self, name: &str, pattern: &Context) -> bool {
        self.name == name && pattern.is_partial_match(&self.context)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.name, self.context)
    }
}

/// Interning factory for units.
///
/// The silence unit is created up front and is returned for every request
/// for a context-independent `SIL` filler.
#[derive(Debug)]
pub struct UnitManager {
    units: Mutex<HashMap<Unit, Arc<Unit>>>,
    silence: Arc<Unit>,
}

impl Default for UnitManager {
    fn default() -> Self {
        Self::new()
    }
}

impl UnitManager {
    pub fn new() -> Self {
        let silence = Unit {
            name: SILENCE_NAME.to_string(),
            filler: true,
            context: Context::Empty,
        };
        let silence = Arc::new(silence);
        let mut units = HashMap::new();
        units.insert((*silence).clone(), Arc::clone(&silence));

        Self {
            units: Mutex::new(units),
            silence,
        }
    }

    /// The silence filler unit.
    pub fn silence(&self) -> &Arc<Unit> {
        &self.silence
    }

    /// Get the unique unit for `(name, filler, context)`, creating it on first use.
    pub fn get_unit(&self, name: &str, filler: bool, context: Context) -> Arc<Unit> {
        let key = Unit {
            name: name.to_string(),
            filler,
            context,
        };

        let mut units = self.units.lock();
        if let Some(unit) = units.get(&key) {
            return Arc::clone(unit);
        }
        let unit = Arc::new(key.clone());
        units.insert(key, Arc::clone(&unit));
        unit
    }

    /// Context-independent unit for `name`.
    pub fn get_ci_unit(&self, name: &str, filler: bool) -> Arc<Unit> {
        self.get_unit(name, filler, Context::Empty)
    }

    /// Number of distinct units created so far.
    pub fn len(&self) -> usize {
        self.units.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.lock().is_empty()
    }
}
