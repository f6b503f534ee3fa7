//! Senone pool assembly from means, variances and mixture weights.

use super::core::ModelLoader;
use crate::error::{InvariantError, Result};
use crate::logmath::LogMath;
use crate::pool::{Pool, PoolFeature, checked_count};
use crate::senone::{GaussianMixture, MixtureComponent, Senone};
use ndarray::Array1;
use std::sync::Arc;

impl ModelLoader {
    /// Build one Gaussian mixture senone per mixture weight row.
    pub fn build_senone_pool(
        &self,
        means: &Pool<Array1<f32>>,
        variances: &Pool<Array1<f32>>,
        mixture_weights: &Pool<Array1<f32>>,
    ) -> Result<Pool<Arc<Senone>>> {
        let config = self.config();
        build_senone_pool(
            means,
            variances,
            mixture_weights,
            config.mixture_component_score_floor,
            config.variance_floor,
            self.log_math(),
        )
    }
}

/// Assemble senones, checking that the pool sizes agree.
///
/// Senone `i` takes mixture weight row `i` and the mean and variance vectors
/// `i * numGaussiansPerState + j` for each component `j`.
pub fn build_senone_pool(
    means: &Pool<Array1<f32>>,
    variances: &Pool<Array1<f32>>,
    mixture_weights: &Pool<Array1<f32>>,
    score_floor: f32,
    variance_floor: f32,
    log_math: LogMath,
) -> Result<Pool<Arc<Senone>>> {
    let num_gaussians = mixture_weights.feature_or(PoolFeature::NumGaussiansPerState, 0);
    let num_senones = mixture_weights.feature_or(PoolFeature::NumSenones, 0);

    tracing::debug!(
        num_gaussians,
        num_senones,
        mixture_weights = mixture_weights.len(),
        means = means.len(),
        variances = variances.len(),
        "building senone pool"
    );

    if num_gaussians == 0 {
        return Err(InvariantError::NoGaussians.into());
    }
    let num_densities = checked_count("senone densities", &[num_senones, num_gaussians])?;
    check_size("mixture weights", num_senones, mixture_weights.len())?;
    check_size("variances", num_densities, variances.len())?;
    check_size("means", num_densities, means.len())?;

    let mut pool = Pool::with_capacity("senones", num_senones);
    pool.set_feature(PoolFeature::NumSenones, num_senones);
    pool.set_feature(PoolFeature::NumGaussiansPerState, num_gaussians);

    for (id, weights) in mixture_weights.iter().enumerate() {
        check_size("mixture weight row", num_gaussians, weights.len())?;

        let components = (0..num_gaussians)
            .map(|j| -> Result<MixtureComponent> {
                let which = id * num_gaussians + j;
                let (Some(mean), Some(variance)) = (means.get(which), variances.get(which)) else {
                    return Err(InvariantError::SizeMismatch {
                        what: "gaussians",
                        expected: which + 1,
                        actual: means.len().min(variances.len()),
                    }
                    .into());
                };
                check_size("variance vector", mean.len(), variance.len())?;
                Ok(MixtureComponent::new(
                    mean.clone(),
                    variance.clone(),
                    variance_floor,
                    score_floor,
                    log_math,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        let senone = GaussianMixture::new(id, components, weights.clone(), log_math);
        pool.put(id, Arc::new(Senone::from(senone)))?;
    }

    Ok(pool)
}

fn check_size(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(InvariantError::SizeMismatch {
            what,
            expected,
            actual,
        }
        .into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use ndarray::array;

    fn pools(
        senones: usize,
        gaussians: usize,
        mixture_rows: usize,
    ) -> (Pool<Array1<f32>>, Pool<Array1<f32>>, Pool<Array1<f32>>) {
        let mut means = Pool::new("means");
        let mut variances = Pool::new("variances");
        for i in 0..senones * gaussians {
            means.push(array![i as f32, 0.0]);
            variances.push(array![1.0, 1.0]);
        }
        let mut weights = Pool::new("mixture_weights");
        weights.set_feature(PoolFeature::NumSenones, senones);
        weights.set_feature(PoolFeature::NumGaussiansPerState, gaussians);
        for _ in 0..mixture_rows {
            weights.push(Array1::zeros(gaussians));
        }
        (means, variances, weights)
    }

    #[test]
    fn assembles_components_in_state_order() {
        let (means, variances, weights) = pools(3, 2, 3);

        let pool = build_senone_pool(&means, &variances, &weights, 0.0, 1e-4, LogMath::default())
            .unwrap();

        assert_eq!(pool.len(), 3);
        let Senone::Mixture(second) = pool.get(1).unwrap().as_ref() else {
            panic!("expected a mixture");
        };
        assert_eq!(second.id(), 1);
        assert_eq!(second.components().len(), 2);
        assert_eq!(second.components()[1].mean(), array![3.0, 0.0]);
    }

    #[test]
    fn mixture_weight_count_must_match_senones() {
        let (means, variances, weights) = pools(3, 2, 2);

        let result = build_senone_pool(&means, &variances, &weights, 0.0, 1e-4, LogMath::default());

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::SizeMismatch {
                what: "mixture weights",
                expected: 3,
                actual: 2
            }))
        ));
    }

    #[test]
    fn requires_gaussians() {
        let (means, variances, weights) = pools(1, 0, 1);

        let result = build_senone_pool(&means, &variances, &weights, 0.0, 1e-4, LogMath::default());

        assert!(matches!(result, Err(Error::Invariant(InvariantError::NoGaussians))));
    }

    #[test]
    fn header_features_must_not_overflow() {
        let (means, variances, mut weights) = pools(0, 0, 0);
        weights.set_feature(PoolFeature::NumSenones, usize::MAX / 2);
        weights.set_feature(PoolFeature::NumGaussiansPerState, 4);

        let result = build_senone_pool(&means, &variances, &weights, 0.0, 1e-4, LogMath::default());

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::CountOverflow { .. }))
        ));
    }

    #[test]
    fn density_pools_must_cover_every_gaussian() {
        let (mut means, variances, weights) = pools(2, 1, 2);
        means.push(array![9.0, 9.0]);

        let result = build_senone_pool(&means, &variances, &weights, 0.0, 1e-4, LogMath::default());

        assert!(matches!(
            result,
            Err(Error::Invariant(InvariantError::SizeMismatch { what: "means", .. }))
        ));
    }
}
