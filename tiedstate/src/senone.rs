//! Senones: Gaussian mixtures and composites of them.

use crate::logmath::{LOG_ZERO, LogMath};
use ndarray::prelude::*;
use ndarray_stats::QuantileExt;
use std::f64::consts::PI;
use std::sync::Arc;

/// One diagonal-covariance Gaussian of a mixture.
#[derive(Clone, Debug)]
pub struct MixtureComponent {
    mean: Array1<f32>,
    variance: Array1<f32>,
    /// `-1 / (2 σ²)` per dimension
    precision: Array1<f64>,
    /// `-(n/2) ln 2π - ½ Σ ln σ²`
    log_normalizer: f64,
    score_floor: f32,
    log_math: LogMath,
}

impl MixtureComponent {
    /// Build a component, flooring every variance at `variance_floor`.
    ///
    /// `score_floor` is given in the linear domain.
    pub fn new(
        mean: Array1<f32>,
        variance: Array1<f32>,
        variance_floor: f32,
        score_floor: f32,
        log_math: LogMath,
    ) -> Self {
        let variance = variance.mapv(|v| v.max(variance_floor));
        let precision = variance.mapv(|v| -0.5 / f64::from(v));
        let log_normalizer = -0.5 * variance.len() as f64 * (2.0 * PI).ln()
            - 0.5 * variance.iter().map(|&v| f64::from(v).ln()).sum::<f64>();

        Self {
            mean,
            variance,
            precision,
            log_normalizer,
            score_floor: log_math.linear_to_log(f64::from(score_floor)),
            log_math,
        }
    }

    pub fn mean(&self) -> ArrayView1<'_, f32> {
        self.mean.view()
    }

    /// Floored variance vector.
    pub fn variance(&self) -> ArrayView1<'_, f32> {
        self.variance.view()
    }

    /// Log-likelihood of `feature` in the model's log base.
    pub fn score(&self, feature: ArrayView1<'_, f32>) -> f32 {
        let exponent: f64 = self
            .mean
            .iter()
            .zip(&self.precision)
            .zip(feature.iter())
            .map(|((&m, &p), &x)| {
                let d = f64::from(x - m);
                d * d * p
            })
            .sum();

        let score = self.log_math.ln_to_log(self.log_normalizer + exponent);
        score.max(self.score_floor)
    }
}

/// A tied state: weighted mixture of Gaussians.
#[derive(Clone, Debug)]
pub struct GaussianMixture {
    id: usize,
    components: Vec<MixtureComponent>,
    /// Log mixture weight per component
    log_weights: Array1<f32>,
    log_math: LogMath,
}

impl GaussianMixture {
    pub fn new(
        id: usize,
        components: Vec<MixtureComponent>,
        log_weights: Array1<f32>,
        log_math: LogMath,
    ) -> Self {
        Self {
            id,
            components,
            log_weights,
            log_math,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn components(&self) -> &[MixtureComponent] {
        &self.components
    }

    pub fn log_weights(&self) -> ArrayView1<'_, f32> {
        self.log_weights.view()
    }

    pub fn score(&self, feature: ArrayView1<'_, f32>) -> f32 {
        self.components
            .iter()
            .zip(&self.log_weights)
            .fold(LOG_ZERO, |acc, (component, &weight)| {
                self.log_math
                    .add_as_linear(acc, component.score(feature) + weight)
            })
    }
}

/// Union of several senones occupying the same state across context variants.
///
/// Scores as the best member. Members are always mixtures: composites passed
/// in are flattened, and duplicates are dropped.
#[derive(Clone, Debug)]
pub struct CompositeSenone {
    members: Vec<Arc<Senone>>,
    log_weight: f32,
}

impl CompositeSenone {
    pub fn new<I>(senones: I) -> Self
    where
        I: IntoIterator<Item = Arc<Senone>>,
    {
        let mut members: Vec<Arc<Senone>> = Vec::new();
        let mut add = |senone: &Arc<Senone>| {
            if !members.iter().any(|m| Arc::ptr_eq(m, senone)) {
                members.push(Arc::clone(senone));
            }
        };

        for senone in senones {
            match senone.as_ref() {
                Senone::Mixture(_) => add(&senone),
                Senone::Composite(inner) => inner.members.iter().for_each(&mut add),
            }
        }

        Self {
            members,
            log_weight: 0.0,
        }
    }

    pub fn members(&self) -> &[Arc<Senone>] {
        &self.members
    }

    pub fn score(&self, feature: ArrayView1<'_, f32>) -> f32 {
        let scores: Array1<f32> = self.members.iter().map(|m| m.score(feature)).collect();
        scores.max().map_or(LOG_ZERO, |best| *best + self.log_weight)
    }
}

/// Output distribution of one HMM state.
#[derive(Clone, Debug)]
pub enum Senone {
    Mixture(GaussianMixture),
    Composite(CompositeSenone),
}

impl Senone {
    /// Log-likelihood of one feature frame.
    pub fn score(&self, feature: ArrayView1<'_, f32>) -> f32 {
        match self {
            Senone::Mixture(mixture) => mixture.score(feature),
            Senone::Composite(composite) => composite.score(feature),
        }
    }

    /// Pool id of a mixture; composites have none.
    pub fn id(&self) -> Option<usize> {
        match self {
            Senone::Mixture(mixture) => Some(mixture.id()),
            Senone::Composite(_) => None,
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self, Senone::Composite(_))
    }
}

impl From<GaussianMixture> for Senone {
    fn from(mixture: GaussianMixture) -> Self {
        Senone::Mixture(mixture)
    }
}

impl From<CompositeSenone> for Senone {
    fn from(composite: CompositeSenone) -> Self {
        Senone::Composite(composite)
    }
}
