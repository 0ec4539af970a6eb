//! Live handles on provisioned containers.

pub mod container;
pub mod types;

pub use types::{
    ClusterHealth, Container, ContainerError, ContainerResult, DATA_DIR, ELASTIC_PORT,
    HealthStatus, KIBANA_PORT,
};
