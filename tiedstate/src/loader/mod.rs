//! Model file loading: pools, senones and the model definition.

pub mod core;
pub mod density;
pub mod mdef;
pub mod mixture;
pub mod senones;
pub mod transition;

pub use self::core::{LoadedModel, ModelLoader};
pub use mdef::{ModelDefinition, ModelDefinitionHeader};
