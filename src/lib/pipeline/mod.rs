//! The provisioning pipeline: sequenced, observable phases that take a
//! `ContainerSpec` to a running, configured container.

pub mod creator;
pub mod types;

pub use creator::create_command;
pub use types::{ContainerCreator, CreateOptions, CreateTasks, Failure, Phase, PipelineError};
