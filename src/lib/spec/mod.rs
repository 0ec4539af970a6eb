//! Validated container descriptions.

pub mod env;
pub mod spec;
pub mod types;

pub use env::merge_env;
pub use types::{ContainerSpec, ContainerSpecInput, Script, SpecError, SpecResult};
