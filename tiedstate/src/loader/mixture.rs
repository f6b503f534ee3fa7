//! Mixture weights pool.

use super::core::{ModelLoader, pool_name};
use crate::error::{InvariantError, Result};
use crate::format::{BinaryModelReader, TokenReader};
use crate::logmath::LogMath;
use crate::pool::{Pool, PoolFeature, checked_count};
use ndarray::Array1;
use std::io::Read;
use std::path::Path;

/// Supported binary mixture weight file version.
pub const MIXW_FILE_VERSION: &str = "1.0";

impl ModelLoader {
    /// Load one row of log mixture weights per senone, floored at `floor`.
    pub fn load_mixture_weights(&self, path: &Path, floor: f32) -> Result<Pool<Array1<f32>>> {
        tracing::debug!(path = %path.display(), floor, "loading mixture weights");
        if self.config().is_binary {
            let reader = BinaryModelReader::open(path)?;
            read_mixture_weights_binary(reader, floor, self.log_math())
        } else {
            let mut reader = TokenReader::open(path)?;
            read_mixture_weights_ascii(&mut reader, floor, self.log_math())
        }
    }
}

/// Scale `row` to sum to one; an all-zero row is left unchanged.
pub(super) fn normalize(row: &mut Array1<f32>) {
    let sum = row.sum();
    if sum != 0.0 {
        row.mapv_inplace(|v| v / sum);
    }
}

/// Convert every value of `row` to the log domain.
pub(super) fn to_log(row: Array1<f32>, log_math: LogMath) -> Array1<f32> {
    row.mapv(|v| log_math.linear_to_log(f64::from(v)))
}

/// Read a binary mixture weight file. Rows are normalized, floored, then logged.
pub fn read_mixture_weights_binary<R: Read>(
    mut reader: BinaryModelReader<R>,
    floor: f32,
    log_math: LogMath,
) -> Result<Pool<Array1<f32>>> {
    reader.expect_version(MIXW_FILE_VERSION)?;

    let num_states = reader.read_count("numStates")?;
    let num_streams = reader.read_count("numStreams")?;
    let num_gaussians = reader.read_count("numGaussiansPerState")?;
    let num_values = reader.read_count("numValues")?;

    let expected = checked_count(
        "mixture weight values",
        &[num_states, num_streams, num_gaussians],
    )?;
    if num_values != expected {
        return Err(InvariantError::SizeMismatch {
            what: "mixture weight values",
            expected,
            actual: num_values,
        }
        .into());
    }
    if num_streams != 1 {
        return Err(InvariantError::MultipleStreams {
            path: reader.path().to_path_buf(),
            streams: num_streams,
        }
        .into());
    }
    if num_gaussians == 0 {
        return Err(InvariantError::NoGaussians.into());
    }

    let mut pool = Pool::with_capacity(pool_name(reader.path()), num_states);
    pool.set_feature(PoolFeature::NumSenones, num_states);
    pool.set_feature(PoolFeature::NumStreams, num_streams);
    pool.set_feature(PoolFeature::NumGaussiansPerState, num_gaussians);

    for state in 0..num_states {
        let mut row = reader.read_f32_array(num_gaussians)?;
        normalize(&mut row);
        row.mapv_inplace(|v| v.max(floor));
        pool.put(state, to_log(row, log_math))?;
    }

    reader.read_checksum()?;
    Ok(pool)
}

/// Read an ASCII mixture weight file. Rows are floored and logged but not normalized.
///
/// ```text
/// mixw <numStates> <numStreams> <numGaussiansPerState>
/// mixw [<state> 0] <total> <weight>...
/// ```
pub fn read_mixture_weights_ascii(
    reader: &mut TokenReader,
    floor: f32,
    log_math: LogMath,
) -> Result<Pool<Array1<f32>>> {
    reader.expect_string("mixw")?;
    let num_states = reader.get_count("numStates")?;
    let num_streams = reader.get_count("numStreams")?;
    let num_gaussians = reader.get_count("numGaussiansPerState")?;

    let mut pool = Pool::with_capacity(pool_name(reader.path()), num_states);
    pool.set_feature(PoolFeature::NumSenones, num_states);
    pool.set_feature(PoolFeature::NumStreams, num_streams);
    pool.set_feature(PoolFeature::NumGaussiansPerState, num_gaussians);

    for state in 0..num_states {
        reader.expect_string("mixw")?;
        reader.expect_string(&format!("[{state}"))?;
        reader.expect_string("0]")?;
        let _total = reader.get_float("total")?;

        let row = (0..num_gaussians)
            .map(|_| reader.get_float("mixture weight").map(|v| v.max(floor)))
            .collect::<Result<Array1<f32>>>()?;
        pool.put(state, to_log(row, log_math))?;
    }

    Ok(pool)
}
