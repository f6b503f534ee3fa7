//! Log-domain arithmetic in a configurable base.

/// Log of zero probability.
pub const LOG_ZERO: f32 = -f32::MAX;

/// Converts between the linear domain and logarithms of a fixed base.
///
/// Every pool value and score in a model shares one `LogMath`, so values from
/// different pools can be added directly.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LogMath {
    base: f32,
    ln_base: f64,
    inverse_ln_base: f64,
}

impl Default for LogMath {
    fn default() -> Self {
        Self::new(1.0001)
    }
}

impl LogMath {
    /// Create a log-math context for `base`. The base must be greater than 1.
    pub fn new(base: f32) -> Self {
        let ln_base = f64::from(base).ln();
        Self {
            base,
            ln_base,
            inverse_ln_base: 1.0 / ln_base,
        }
    }

    pub fn base(&self) -> f32 {
        self.base
    }

    /// Convert a linear value; zero and negative values map to [`LOG_ZERO`].
    pub fn linear_to_log(&self, value: f64) -> f32 {
        if value <= 0.0 {
            return LOG_ZERO;
        }
        Self::clamp(value.ln() * self.inverse_ln_base)
    }

    /// Convert a log value back to the linear domain.
    pub fn log_to_linear(&self, value: f32) -> f64 {
        if value <= LOG_ZERO {
            return 0.0;
        }
        (f64::from(value) * self.ln_base).exp()
    }

    /// Convert a natural logarithm to this base.
    pub fn ln_to_log(&self, value: f64) -> f32 {
        if value.is_nan() {
            return LOG_ZERO;
        }
        Self::clamp(value * self.inverse_ln_base)
    }

    /// Log of the sum of the linear values of `a` and `b`.
    pub fn add_as_linear(&self, a: f32, b: f32) -> f32 {
        if a <= LOG_ZERO {
            return b;
        }
        if b <= LOG_ZERO {
            return a;
        }
        let (high, low) = if a >= b { (a, b) } else { (b, a) };
        let diff = f64::from(low - high) * self.ln_base;
        Self::clamp(f64::from(high) + diff.exp().ln_1p() * self.inverse_ln_base)
    }

    fn clamp(value: f64) -> f32 {
        if value.is_nan() || value <= f64::from(LOG_ZERO) {
            LOG_ZERO
        } else if value >= f64::from(f32::MAX) {
            f32::MAX
        } else {
            value as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_maps_to_log_zero() {
        let log_math = LogMath::default();

        assert_eq!(log_math.linear_to_log(0.0), LOG_ZERO);
        assert_eq!(log_math.linear_to_log(-1.0), LOG_ZERO);
        assert_eq!(log_math.log_to_linear(LOG_ZERO), 0.0);
    }

    #[test]
    fn round_trips_linear_values() {
        let log_math = LogMath::new(1.0001);

        for value in [1e-7, 0.25, 1.0, 3.5] {
            let back = log_math.log_to_linear(log_math.linear_to_log(value));
            assert!((back - value).abs() / value < 1e-4, "{value} -> {back}");
        }
    }

    #[test]
    fn one_is_log_zero_point() {
        let log_math = LogMath::new(10.0);

        assert_eq!(log_math.linear_to_log(1.0), 0.0);
        assert!((log_math.linear_to_log(100.0) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn adds_in_linear_domain() {
        let log_math = LogMath::new(1.0001);
        let a = log_math.linear_to_log(0.25);
        let b = log_math.linear_to_log(0.5);

        let sum = log_math.log_to_linear(log_math.add_as_linear(a, b));

        assert!((sum - 0.75).abs() < 1e-4);
        assert_eq!(log_math.add_as_linear(LOG_ZERO, b), b);
        assert_eq!(log_math.add_as_linear(a, LOG_ZERO), a);
    }

    #[test]
    fn ln_conversion_handles_nan_and_infinity() {
        let log_math = LogMath::default();

        assert_eq!(log_math.ln_to_log(f64::NAN), LOG_ZERO);
        assert_eq!(log_math.ln_to_log(f64::NEG_INFINITY), LOG_ZERO);
        let expected = 1.0 / f64::from(1.0001f32).ln();
        assert!((f64::from(log_math.ln_to_log(1.0)) - expected).abs() < 1e-2);
    }
}
