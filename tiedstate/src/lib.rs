//! tiedstate: tied-state (senone) HMM acoustic models.
//!
//! This crate loads the parameter pools of a trained acoustic model, ties
//! them into senones and HMMs through the model definition, and answers the
//! decoder's question "which HMM models this unit at this word position".
//!
//! # Architecture
//!
//! The library is built around two traits:
//!
//! - [`traits::Loader`]: Reads pool files and the model definition into a
//!   [`loader::LoadedModel`]
//! - [`traits::AcousticModel`]: Query surface a decoder consumes, implemented
//!   by [`model::TiedStateAcousticModel`]
//!
//! Lookups that miss fall back through composite HMMs, other word
//! positions, silence-substituted contexts and finally the
//! context-independent HMM, so a non-exact lookup always yields an HMM.
//!
//! # Quick Start
//!
//! ```ignore
//! use tiedstate::config::ModelConfig;
//! use tiedstate::hmm::HmmPosition;
//! use tiedstate::model::TiedStateAcousticModel;
//! use tiedstate::traits::AcousticModel;
//! use tiedstate::unit::{Context, ContextSide};
//!
//! let mut model = TiedStateAcousticModel::from_dir("wsj_8k", ModelConfig::default());
//! model.allocate()?;
//!
//! let units = model.unit_manager();
//! let context = Context::left_right(
//!     ContextSide::units([units.get_ci_unit("B", false)]),
//!     ContextSide::Unspecified,
//! );
//! let unit = units.get_unit("AA", false, context);
//! let hmm = model.lookup_nearest_hmm(&unit, HmmPosition::Begin, false)?;
//! ```

pub mod config;
pub mod error;
pub mod format;
pub mod hmm;
pub mod loader;
pub mod logmath;
pub mod model;
pub mod pool;
pub mod senone;
pub mod traits;
pub mod types;
pub mod unit;

pub use error::{Error, Result};
