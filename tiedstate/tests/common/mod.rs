//! Toy acoustic model written to a temporary directory.
//!
//! Six base phones (two fillers) and three `AA` triphones at word begin,
//! three emitting states per HMM, two Gaussians per senone and one
//! transition matrix.

#![allow(dead_code)]

use eyre::Result;
use std::fs::{create_dir_all, write};
use std::path::Path;
use tempfile::TempDir;
use tiedstate::config::ModelConfig;
use tiedstate::format::binary::BYTE_ORDER_MAGIC;
use tracing_subscriber::EnvFilter;

pub const VECTOR_LENGTH: usize = 2;
pub const GAUSSIANS: usize = 2;
pub const STATES_PER_HMM: usize = 4;
pub const EMITTING_STATES: usize = STATES_PER_HMM - 1;

/// Base phones and whether each is a filler.
pub const BASE_PHONES: &[(&str, bool)] = &[
    ("SIL", true),
    ("AA", false),
    ("B", false),
    ("D", false),
    ("T", false),
    ("LAUGH", true),
];

/// Triphones as `(name, left, right, position)`.
pub const TRIPHONES: &[(&str, &str, &str, &str)] = &[
    ("AA", "B", "D", "b"),
    ("AA", "SIL", "T", "b"),
    ("AA", "B", "T", "b"),
];

/// Unnormalized mixture weights of every senone.
pub const MIXTURE_WEIGHTS: [f32; GAUSSIANS] = [1.0, 3.0];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Encoding {
    BigEndian,
    LittleEndian,
    Ascii,
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn num_senones() -> usize {
    (BASE_PHONES.len() + TRIPHONES.len()) * EMITTING_STATES
}

pub fn num_ci_senones() -> usize {
    BASE_PHONES.len() * EMITTING_STATES
}

pub fn config(encoding: Encoding) -> ModelConfig {
    ModelConfig {
        is_binary: encoding != Encoding::Ascii,
        vector_length: VECTOR_LENGTH,
        ..ModelConfig::default()
    }
}

/// Write the toy model and return its directory.
pub fn write_model(encoding: Encoding) -> Result<TempDir> {
    init_tracing();

    let dir = tempfile::tempdir()?;
    write(dir.path().join("models.mdef"), model_definition())?;

    let data = dir.path().join("data");
    create_dir_all(&data)?;
    match encoding {
        Encoding::BigEndian => write_binary_pools(&data, false)?,
        Encoding::LittleEndian => write_binary_pools(&data, true)?,
        Encoding::Ascii => write_ascii_pools(&data)?,
    }

    Ok(dir)
}

pub fn model_definition() -> String {
    let mut text = format!(
        concat!(
            "0.3\n{} n_base\n{} n_tri\n{} n_state_map\n",
            "{} n_tied_state\n{} n_tied_ci_state\n1 n_tied_tmat\n",
        ),
        BASE_PHONES.len(),
        TRIPHONES.len(),
        (BASE_PHONES.len() + TRIPHONES.len()) * STATES_PER_HMM,
        num_senones(),
        num_ci_senones(),
    );

    let mut next_state = 0;
    let mut state_ids = || {
        let ids: Vec<String> = (next_state..next_state + EMITTING_STATES)
            .map(|id| id.to_string())
            .collect();
        next_state += EMITTING_STATES;
        ids.join(" ")
    };

    text.push_str("# base phones\n");
    for (name, filler) in BASE_PHONES {
        let attribute = if *filler { "filler" } else { "n/a" };
        text.push_str(&format!("{name} - - - {attribute} 0 {} N\n", state_ids()));
    }
    text.push_str("# triphones\n");
    for (name, left, right, position) in TRIPHONES {
        text.push_str(&format!(
            "{name} {left} {right} {position} n/a 0 {} N\n",
            state_ids()
        ));
    }
    text
}

/// Mean of Gaussian `gaussian` of senone `senone` in dimension `dim`.
pub fn mean(senone: usize, gaussian: usize, dim: usize) -> f32 {
    senone as f32 + gaussian as f32 * 0.5 + dim as f32 * 0.1
}

/// Stored rows of the transition matrix: stay or advance with equal odds.
pub fn transition_row(row: usize) -> [f32; STATES_PER_HMM] {
    let mut values = [0.0; STATES_PER_HMM];
    values[row] = 0.5;
    values[row + 1] = 0.5;
    values
}

fn densities(value: impl Fn(usize, usize, usize) -> f32) -> Vec<f32> {
    let mut values = Vec::with_capacity(num_senones() * GAUSSIANS * VECTOR_LENGTH);
    for senone in 0..num_senones() {
        for gaussian in 0..GAUSSIANS {
            for dim in 0..VECTOR_LENGTH {
                values.push(value(senone, gaussian, dim));
            }
        }
    }
    values
}

/// Binary model file with a checksum trailer.
pub struct BinaryFile {
    little_endian: bool,
    bytes: Vec<u8>,
}

impl BinaryFile {
    pub fn new(little_endian: bool) -> Self {
        let mut bytes = b"s3\nversion 1.0\nchksum0 yes\nendhdr\n".to_vec();
        bytes.extend_from_slice(&if little_endian {
            BYTE_ORDER_MAGIC.to_le_bytes()
        } else {
            BYTE_ORDER_MAGIC.to_be_bytes()
        });
        Self {
            little_endian,
            bytes,
        }
    }

    pub fn int(self, value: usize) -> Self {
        self.i32(value as i32)
    }

    pub fn i32(mut self, value: i32) -> Self {
        self.bytes.extend_from_slice(&if self.little_endian {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        });
        self
    }

    pub fn floats(mut self, values: &[f32]) -> Self {
        for value in values {
            self.bytes.extend_from_slice(&if self.little_endian {
                value.to_le_bytes()
            } else {
                value.to_be_bytes()
            });
        }
        self
    }

    pub fn finish(self) -> Vec<u8> {
        self.int(0).bytes
    }

    /// Bytes written so far, without the checksum trailer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

pub fn binary_density(little_endian: bool, values: &[f32]) -> Vec<u8> {
    BinaryFile::new(little_endian)
        .int(num_senones())
        .int(1)
        .int(GAUSSIANS)
        .int(VECTOR_LENGTH)
        .int(values.len())
        .floats(values)
        .finish()
}

pub fn binary_mixture_weights(little_endian: bool, num_states: usize) -> Vec<u8> {
    let values: Vec<f32> = (0..num_states).flat_map(|_| MIXTURE_WEIGHTS).collect();
    BinaryFile::new(little_endian)
        .int(num_states)
        .int(1)
        .int(GAUSSIANS)
        .int(values.len())
        .floats(&values)
        .finish()
}

pub fn binary_transition_matrices(little_endian: bool) -> Vec<u8> {
    let rows = STATES_PER_HMM - 1;
    let values: Vec<f32> = (0..rows).flat_map(transition_row).collect();
    BinaryFile::new(little_endian)
        .int(1)
        .int(rows)
        .int(STATES_PER_HMM)
        .int(values.len())
        .floats(&values)
        .finish()
}

fn write_binary_pools(data: &Path, little_endian: bool) -> Result<()> {
    write(
        data.join("means"),
        binary_density(little_endian, &densities(mean)),
    )?;
    write(
        data.join("variances"),
        binary_density(little_endian, &densities(|_, _, _| 1.0)),
    )?;
    write(
        data.join("mixture_weights"),
        binary_mixture_weights(little_endian, num_senones()),
    )?;
    write(
        data.join("transition_matrices"),
        binary_transition_matrices(little_endian),
    )?;
    Ok(())
}

fn ascii_density(value: impl Fn(usize, usize, usize) -> f32) -> String {
    let mut text = format!("param {} 1 {GAUSSIANS}\n", num_senones());
    for senone in 0..num_senones() {
        text.push_str(&format!("mgau {senone}\nfeat 0\n"));
        for gaussian in 0..GAUSSIANS {
            let values: Vec<String> = (0..VECTOR_LENGTH)
                .map(|dim| value(senone, gaussian, dim).to_string())
                .collect();
            text.push_str(&format!("density {gaussian} {}\n", values.join(" ")));
        }
    }
    text
}

fn write_ascii_pools(data: &Path) -> Result<()> {
    write(data.join("means.ascii"), ascii_density(mean))?;
    write(data.join("variances.ascii"), ascii_density(|_, _, _| 1.0))?;

    let total: f32 = MIXTURE_WEIGHTS.iter().sum();
    let mut mixw = format!("mixw {} 1 {GAUSSIANS}\n", num_senones());
    for senone in 0..num_senones() {
        mixw.push_str(&format!(
            "mixw [{senone} 0] {total}\n{} {}\n",
            MIXTURE_WEIGHTS[0], MIXTURE_WEIGHTS[1]
        ));
    }
    write(data.join("mixture_weights.ascii"), mixw)?;

    let mut tmat = format!("tmat 1 {STATES_PER_HMM}\ntmat [0]\n");
    for row in 0..STATES_PER_HMM - 1 {
        let stored = transition_row(row);
        tmat.push_str(&format!("{} {}\n", stored[row], stored[row + 1]));
    }
    write(data.join("transition_matrices.ascii"), tmat)?;
    Ok(())
}
