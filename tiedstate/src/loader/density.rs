//! Means and variances pools.

use super::core::{ModelLoader, pool_name};
use crate::error::{InvariantError, Result};
use crate::format::{BinaryModelReader, TokenReader};
use crate::pool::{Pool, PoolFeature, checked_count};
use ndarray::Array1;
use std::io::Read;
use std::path::Path;

/// Supported binary density file version.
pub const DENSITY_FILE_VERSION: &str = "1.0";

impl ModelLoader {
    /// Load a means or variances pool, raising every value below `floor` to `floor`.
    ///
    /// The pool holds `numStates * numGaussiansPerState` vectors, indexed
    /// `state * numGaussiansPerState + gaussian`.
    pub fn load_density_pool(&self, path: &Path, floor: f32) -> Result<Pool<Array1<f32>>> {
        tracing::debug!(path = %path.display(), floor, "loading density pool");
        if self.config().is_binary {
            let reader = BinaryModelReader::open(path)?;
            read_density_binary(reader, floor, self.config().vector_length)
        } else {
            let mut reader = TokenReader::open(path)?;
            read_density_ascii(&mut reader, floor, self.config().vector_length)
        }
    }
}

/// Read a binary density file. Vector lengths come from the file;
/// `vector_length` only triggers a warning when they differ.
pub fn read_density_binary<R: Read>(
    mut reader: BinaryModelReader<R>,
    floor: f32,
    vector_length: usize,
) -> Result<Pool<Array1<f32>>> {
    reader.expect_version(DENSITY_FILE_VERSION)?;

    let num_states = reader.read_count("numStates")?;
    let num_streams = reader.read_count("numStreams")?;
    let num_gaussians = reader.read_count("numGaussiansPerState")?;
    let stream_lengths = (0..num_streams)
        .map(|_| reader.read_count("vectorLength"))
        .collect::<Result<Vec<_>>>()?;
    let raw_length = reader.read_count("rawLength")?;

    if num_streams != 1 {
        return Err(InvariantError::MultipleStreams {
            path: reader.path().to_path_buf(),
            streams: num_streams,
        }
        .into());
    }

    let block_size: usize = stream_lengths.iter().sum();
    let expected = checked_count("density raw length", &[num_gaussians, block_size, num_states])?;
    if raw_length != expected {
        return Err(InvariantError::SizeMismatch {
            what: "density raw length",
            expected,
            actual: raw_length,
        }
        .into());
    }

    if block_size == 0 {
        return Err(InvariantError::SizeMismatch {
            what: "density vector length",
            expected: vector_length,
            actual: block_size,
        }
        .into());
    }
    if block_size != vector_length {
        tracing::warn!(
            path = %reader.path().display(),
            file = block_size,
            configured = vector_length,
            "density vector length differs from configuration"
        );
    }

    let records = checked_count("density records", &[num_states, num_gaussians])?;
    let mut pool = Pool::with_capacity(pool_name(reader.path()), records);
    pool.set_feature(PoolFeature::NumSenones, num_states);
    pool.set_feature(PoolFeature::NumStreams, num_streams);
    pool.set_feature(PoolFeature::NumGaussiansPerState, num_gaussians);

    for state in 0..num_states {
        for &length in &stream_lengths {
            for gaussian in 0..num_gaussians {
                let density = reader.read_f32_array(length)?.mapv_into(|v| v.max(floor));
                pool.put(state * num_gaussians + gaussian, density)?;
            }
        }
    }

    reader.read_checksum()?;
    Ok(pool)
}

/// Read an ASCII density file of `vector_length` long vectors.
///
/// ```text
/// param <numStates> <numStreams> <numGaussiansPerState>
/// mgau <state>
/// feat 0
/// density <gaussian> <value>...
/// ```
pub fn read_density_ascii(
    reader: &mut TokenReader,
    floor: f32,
    vector_length: usize,
) -> Result<Pool<Array1<f32>>> {
    reader.expect_string("param")?;
    let num_states = reader.get_count("numStates")?;
    let num_streams = reader.get_count("numStreams")?;
    let num_gaussians = reader.get_count("numGaussiansPerState")?;

    let records = checked_count("density records", &[num_states, num_gaussians])?;
    let mut pool = Pool::with_capacity(pool_name(reader.path()), records);
    pool.set_feature(PoolFeature::NumSenones, num_states);
    pool.set_feature(PoolFeature::NumStreams, num_streams);
    pool.set_feature(PoolFeature::NumGaussiansPerState, num_gaussians);

    for state in 0..num_states {
        reader.expect_string("mgau")?;
        reader.expect_int("mgau index", state as i64)?;
        reader.expect_string("feat")?;
        reader.expect_int("feat index", 0)?;

        for gaussian in 0..num_gaussians {
            reader.expect_string("density")?;
            reader.expect_int("density index", gaussian as i64)?;
            let density = (0..vector_length)
                .map(|_| reader.get_float("density value").map(|v| v.max(floor)))
                .collect::<Result<Array1<f32>>>()?;
            pool.put(state * num_gaussians + gaussian, density)?;
        }
    }

    Ok(pool)
}
