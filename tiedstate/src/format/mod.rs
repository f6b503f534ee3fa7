//! Low-level model file readers.

pub mod ascii;
pub mod binary;

pub use ascii::TokenReader;
pub use binary::BinaryModelReader;
