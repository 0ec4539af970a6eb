//! Provision disposable Elasticsearch (and optional Kibana) containers, wait
//! for them to come up and push their configuration.

pub mod container;
pub mod executor;
pub mod fleet;
pub mod host;
pub mod image;
pub mod pipeline;
pub mod poller;
pub mod provenance;
pub mod spec;
pub mod tasks;
pub mod uploader;

pub use container::Container;
pub use executor::{CommandExecutor, ShellExecutor};
pub use pipeline::{ContainerCreator, CreateOptions, CreateTasks};
pub use spec::{ContainerSpec, ContainerSpecInput};
