use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::executor::{CommandExecutor, ExecError};
use crate::poller::PollError;
use crate::spec::ContainerSpec;

/// Elasticsearch HTTP port inside the container.
pub const ELASTIC_PORT: u16 = 9200;
/// Kibana HTTP port inside the container.
pub const KIBANA_PORT: u16 = 5601;
pub const DATA_DIR: &str = "/usr/share/elasticsearch/data";

/// Handle on a created container. Operations run against the container name
/// through the executor; `spec` is whatever the container was created from.
#[derive(Clone)]
pub struct Container {
    pub(crate) spec: ContainerSpec,
    pub(crate) executor: Arc<dyn CommandExecutor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Green,
    Yellow,
    Red,
    #[serde(other)]
    Unknown,
}

impl HealthStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, HealthStatus::Green | HealthStatus::Yellow)
    }
}

/// Subset of the `GET _cluster/health` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterHealth {
    pub status: HealthStatus,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub number_of_nodes: Option<u64>,
    #[serde(default)]
    pub active_shards: Option<u64>,
}

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("command missing")]
    EmptyCommand,
    #[error("{0} isn't a kibana container")]
    NotKibana(String),
    #[error("unexpected {what} response: {source}")]
    Response {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("unexpected kibana status {0:?}")]
    Status(String),
    #[error(transparent)]
    Poll(#[from] PollError),
}

pub type ContainerResult<T> = Result<T, ContainerError>;
