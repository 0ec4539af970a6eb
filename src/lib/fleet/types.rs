use bollard::Docker;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct DockerClient {
    pub client: Docker,
}

/// One managed container, as shown by `led ls`.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerRow {
    pub name: String,
    pub status: String,
    pub created: i64,
    pub image: String,
}

/// One managed image, as shown by `led images`.
#[derive(Debug, Clone, Serialize)]
pub struct ImageRow {
    pub repository: String,
    pub id: String,
    pub created: i64,
    pub size: i64,
}

#[derive(Debug, Error)]
pub enum FleetError {
    #[error("docker client error: {0}")]
    Docker(#[from] bollard::errors::Error),
    #[error("{action} failed for {target}: {source}")]
    Action {
        action: &'static str,
        target: String,
        #[source]
        source: bollard::errors::Error,
    },
}

pub type FleetResult<T> = Result<T, FleetError>;
