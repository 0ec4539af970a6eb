//! Batch operations over every container and image this crate manages,
//! through the Docker Engine API.

pub mod docker;
pub mod types;

pub use types::{ContainerRow, DockerClient, FleetError, FleetResult, ImageRow};
