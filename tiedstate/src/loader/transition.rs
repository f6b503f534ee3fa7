//! Transition matrices pool.

use super::core::{ModelLoader, pool_name};
use super::mixture::{normalize, to_log};
use crate::error::{InvariantError, Result};
use crate::format::{BinaryModelReader, TokenReader};
use crate::logmath::{LOG_ZERO, LogMath};
use crate::pool::{Pool, checked_count};
use ndarray::{Array1, Array2, Axis};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

/// Supported binary transition matrix file version.
pub const TMAT_FILE_VERSION: &str = "1.0";

impl ModelLoader {
    /// Load square log-domain transition matrices, one per tied matrix id.
    pub fn load_transition_matrices(&self, path: &Path) -> Result<Pool<Arc<Array2<f32>>>> {
        tracing::debug!(path = %path.display(), "loading transition matrices");
        if self.config().is_binary {
            let reader = BinaryModelReader::open(path)?;
            read_transition_matrices_binary(reader, self.log_math())
        } else {
            let mut reader = TokenReader::open(path)?;
            read_transition_matrices_ascii(&mut reader, self.config().sparse_form, self.log_math())
        }
    }
}

/// Read a binary transition matrix file.
///
/// The file stores `numRows` rows per matrix; each is normalized and logged.
/// Rows past those, the final non-emitting state, are all [`LOG_ZERO`].
pub fn read_transition_matrices_binary<R: Read>(
    mut reader: BinaryModelReader<R>,
    log_math: LogMath,
) -> Result<Pool<Arc<Array2<f32>>>> {
    reader.expect_version(TMAT_FILE_VERSION)?;

    let num_matrices = reader.read_count("numMatrices")?;
    let num_rows = reader.read_count("numRows")?;
    let num_states = reader.read_count("numStates")?;
    let num_values = reader.read_count("numValues")?;

    let expected = checked_count(
        "transition matrix values",
        &[num_states, num_rows, num_matrices],
    )?;
    if num_values != expected {
        return Err(InvariantError::SizeMismatch {
            what: "transition matrix values",
            expected,
            actual: num_values,
        }
        .into());
    }
    if num_rows == 0 || num_rows >= num_states {
        return Err(InvariantError::Topology(format!(
            "{}: {num_rows} stored rows for {num_states} states",
            reader.path().display()
        ))
        .into());
    }

    let mut pool = Pool::with_capacity(pool_name(reader.path()), num_matrices);
    for id in 0..num_matrices {
        let rows = (0..num_rows)
            .map(|_| {
                let mut row = reader.read_f32_array(num_states)?;
                row.mapv_inplace(|v| v.max(0.0));
                normalize(&mut row);
                Ok(to_log(row, log_math))
            })
            .collect::<Result<Vec<Array1<f32>>>>()?;

        let mut matrix = Array2::from_elem((num_states, num_states), LOG_ZERO);
        for (mut target, row) in matrix.axis_iter_mut(Axis(0)).zip(&rows) {
            target.assign(row);
        }
        pool.put(id, Arc::new(matrix))?;
    }

    reader.read_checksum()?;
    Ok(pool)
}

/// Read an ASCII transition matrix file.
///
/// ```text
/// tmat <numMatrices> <numStates>
/// tmat [<id>]
/// <values>...
/// ```
///
/// The last row is never stored. In sparse form only the diagonal and
/// super-diagonal of the other rows are present; omitted cells are zero.
/// Every cell, zeros included, is converted to the log domain.
pub fn read_transition_matrices_ascii(
    reader: &mut TokenReader,
    sparse: bool,
    log_math: LogMath,
) -> Result<Pool<Arc<Array2<f32>>>> {
    reader.expect_string("tmat")?;
    let num_matrices = reader.get_count("numMatrices")?;
    let num_states = reader.get_count("numStates")?;

    tracing::debug!(
        num_matrices,
        num_states,
        form = if sparse { "sparse" } else { "dense" },
        "transition matrices"
    );

    let mut pool = Pool::with_capacity(pool_name(reader.path()), num_matrices);
    for id in 0..num_matrices {
        reader.expect_string("tmat")?;
        reader.expect_string(&format!("[{id}]"))?;

        let mut cells = Vec::new();
        for j in 0..num_states.saturating_sub(1) {
            let columns = if sparse {
                j..(j + 2).min(num_states)
            } else {
                0..num_states
            };
            for k in columns {
                cells.push(((j, k), reader.get_float("tmat value")?));
            }
        }

        // Omitted cells are zero, which is LOG_ZERO once logged.
        let mut matrix = Array2::from_elem((num_states, num_states), LOG_ZERO);
        for (index, value) in cells {
            matrix[index] = log_math.linear_to_log(f64::from(value));
        }
        tracing::trace!(id, ?matrix, "transition matrix");
        pool.put(id, Arc::new(matrix))?;
    }

    Ok(pool)
}
