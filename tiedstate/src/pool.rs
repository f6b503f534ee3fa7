//! Densely indexed parameter pools.

use crate::error::{InvariantError, Result};
use std::collections::BTreeMap;
use std::fmt;

/// Largest number of records reserved up front; bigger pools grow as
/// records arrive.
pub const PREALLOCATION_LIMIT: usize = 4096;

/// Product of header counts, failing on overflow.
pub fn checked_count(what: &'static str, counts: &[usize]) -> Result<usize> {
    counts
        .iter()
        .try_fold(1usize, |acc, &count| acc.checked_mul(count))
        .ok_or_else(|| InvariantError::CountOverflow { what }.into())
}

/// Scalar metadata recorded alongside a pool's records.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PoolFeature {
    /// Number of tied states (senones)
    NumSenones,
    /// Number of feature streams
    NumStreams,
    /// Number of Gaussians per tied state
    NumGaussiansPerState,
}

impl fmt::Display for PoolFeature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PoolFeature::NumSenones => "num_senones",
            PoolFeature::NumStreams => "num_streams",
            PoolFeature::NumGaussiansPerState => "num_gaussians",
        };
        f.write_str(name)
    }
}

/// An append-only table of records with ids `0..len`.
///
/// Records are added once during loading and only read afterwards.
#[derive(Clone, Debug)]
pub struct Pool<T> {
    name: String,
    records: Vec<T>,
    features: BTreeMap<PoolFeature, usize>,
}

impl<T> Pool<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            records: Vec::new(),
            features: BTreeMap::new(),
        }
    }

    pub fn with_capacity(name: impl Into<String>, capacity: usize) -> Self {
        Self {
            name: name.into(),
            records: Vec::with_capacity(capacity.min(PREALLOCATION_LIMIT)),
            features: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store `record` under `id`, which must be the next dense id.
    pub fn put(&mut self, id: usize, record: T) -> Result<()> {
        let next = self.records.len();
        if id != next {
            return Err(InvariantError::NonDenseId {
                pool: self.name.clone(),
                id,
                next,
            }
            .into());
        }
        self.records.push(record);
        Ok(())
    }

    /// Append `record`, returning its id.
    pub fn push(&mut self, record: T) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    pub fn get(&self, id: usize) -> Option<&T> {
        self.records.get(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.records.iter()
    }

    pub fn set_feature(&mut self, feature: PoolFeature, value: usize) {
        self.features.insert(feature, value);
    }

    pub fn feature(&self, feature: PoolFeature) -> Option<usize> {
        self.features.get(&feature).copied()
    }

    /// Feature value, or `default` when unset.
    pub fn feature_or(&self, feature: PoolFeature, default: usize) -> usize {
        self.feature(feature).unwrap_or(default)
    }

    /// Log the pool name, size and features.
    pub fn log_info(&self) {
        let features = self
            .features
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join(" ");
        tracing::info!(pool = %self.name, entries = self.len(), features, "pool");
    }
}

impl<'a, T> IntoIterator for &'a Pool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
