//! Tied-state acoustic model implementation.

pub mod composite;
pub mod core;
pub mod fallback;

pub use self::core::TiedStateAcousticModel;
pub use fallback::is_composite_eligible;
