use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::container::{ClusterHealth, Container, ContainerError};
use crate::executor::{CommandExecutor, ExecError};
use crate::poller::DEFAULT_POLL_INTERVAL;
use crate::provenance::ProvenanceError;
use crate::spec::ContainerSpec;
use crate::tasks::{EndTask, FullTask};
use crate::uploader::UploadError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("couldn't fetch image labels for {image}: {source}")]
    ImageLabels {
        image: String,
        #[source]
        source: ExecError,
    },
    #[error("{0} exists but it's not an image this package created")]
    ForeignImage(String),
    #[error("container {0} has a kibana image, yet its kibana property isn't set")]
    UnexpectedKibana(String),
    #[error("container {name} wants kibana, but image {image} doesn't include it")]
    MissingKibana { name: String, image: String },
    #[error("couldn't prepare volume dir {path}: {source}")]
    Volume {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Provenance(#[from] ProvenanceError),
    #[error(transparent)]
    Container(#[from] ContainerError),
    #[error(transparent)]
    Upload(#[from] UploadError),
    #[error("provisioning cancelled")]
    Cancelled,
}

/// Failure shared by a phase task and the terminal task.
pub type Failure = Arc<PipelineError>;

pub type Phase<T = ()> = FullTask<T, Failure>;

#[derive(Debug, Clone)]
pub struct CreateOptions {
    pub clear_volume_dir: bool,
    pub verbose: bool,
    pub poll_interval: Duration,
    /// Upper bound on each readiness wait. `None` waits forever.
    pub ready_deadline: Option<Duration>,
    pub cancel: CancellationToken,
}

impl Default for CreateOptions {
    fn default() -> Self {
        CreateOptions {
            clear_volume_dir: false,
            verbose: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            ready_deadline: None,
            cancel: CancellationToken::new(),
        }
    }
}

/// Every task of one provisioning run, in phase order, plus the terminal
/// `main` task.
#[derive(Debug, Clone)]
pub struct CreateTasks {
    pub image_check: Phase,
    pub volume_rm: Phase,
    pub container_rm: Phase,
    pub container_mk: Phase<Container>,
    pub container_start: Phase,
    pub elastic_ready: Phase<ClusterHealth>,
    /// Resolves with `None` when no kibana was requested.
    pub kibana_ready: Phase<Option<u16>>,
    pub kso_upload: Phase<Vec<Value>>,
    pub scripts_upload: Phase<Vec<Value>>,
    pub sm_upload: Phase<Vec<Value>>,
    pub main: EndTask<Container, Failure>,
}

pub struct ContainerCreator {
    pub(crate) spec: ContainerSpec,
    pub(crate) opts: CreateOptions,
    pub(crate) executor: Arc<dyn CommandExecutor>,
}
