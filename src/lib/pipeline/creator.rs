use std::future::Future;
use std::io;
use std::path::Path;
use std::sync::Arc;

use tracing::{Instrument, debug, error, info, info_span};
use uuid::Uuid;

use super::types::{
    ContainerCreator, CreateOptions, CreateTasks, Failure, Phase, PipelineError,
};
use crate::container::{ClusterHealth, Container, DATA_DIR, ELASTIC_PORT, KIBANA_PORT};
use crate::executor::{CommandExecutor, shell_quote};
use crate::poller::ReadinessPoller;
use crate::provenance::{
    ELASTIC_IMAGE_LABEL, KIBANA_IMAGE_LABEL, ProvenanceError, encode_spec, parse_image_labels,
};
use crate::spec::{ContainerSpec, merge_env};
use crate::tasks::{EndTask, FullTask};

impl CreateTasks {
    pub fn new() -> Self {
        CreateTasks {
            image_check: FullTask::new(),
            volume_rm: FullTask::new(),
            container_rm: FullTask::new(),
            container_mk: FullTask::new(),
            container_start: FullTask::new(),
            elastic_ready: FullTask::new(),
            kibana_ready: FullTask::new(),
            kso_upload: FullTask::new(),
            scripts_upload: FullTask::new(),
            sm_upload: FullTask::new(),
            main: EndTask::new(),
        }
    }

    /// Marks every phase that hasn't ended as abandoned. Ended phases keep
    /// their outcome.
    pub fn abandon_unfinished(&self) {
        self.image_check.abandon();
        self.volume_rm.abandon();
        self.container_rm.abandon();
        self.container_mk.abandon();
        self.container_start.abandon();
        self.elastic_ready.abandon();
        self.kibana_ready.abandon();
        self.kso_upload.abandon();
        self.scripts_upload.abandon();
        self.sm_upload.abandon();
    }
}

impl Default for CreateTasks {
    fn default() -> Self {
        Self::new()
    }
}

/// `docker create` invocation for `spec`, provenance label included.
pub fn create_command(spec: &ContainerSpec) -> Result<String, ProvenanceError> {
    let mut cmd = format!(
        "docker create --name {} --label {}={}",
        spec.name(),
        ELASTIC_IMAGE_LABEL,
        encode_spec(spec)?
    );
    if let Some(dir) = spec.volume_dir() {
        let binding = format!("{}:{}", dir.display(), DATA_DIR);
        cmd.push_str(&format!(" -v {}", shell_quote(&binding)));
    }
    cmd.push_str(&format!(" -p {}:{}", spec.port(), ELASTIC_PORT));
    if let Some(kibana_port) = spec.kibana_port().filter(|_| spec.kibana()) {
        cmd.push_str(&format!(" -p {}:{}", kibana_port, KIBANA_PORT));
    }
    for (key, value) in merge_env(spec) {
        cmd.push_str(&format!(" -e {}", shell_quote(&format!("{key}={value}"))));
    }
    cmd.push(' ');
    cmd.push_str(spec.image());
    Ok(cmd)
}

async fn empty_dir(dir: &Path) -> io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }
    Ok(())
}

impl ContainerCreator {
    pub fn new(
        spec: ContainerSpec,
        opts: CreateOptions,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        ContainerCreator {
            spec,
            opts,
            executor,
        }
    }

    /// Returns the run's tasks right away. Phases start on a spawned task, so
    /// the caller can subscribe to all of them before anything fires.
    pub fn create(self) -> CreateTasks {
        let tasks = CreateTasks::new();
        let run = tasks.clone();
        let span = info_span!(
            "provision",
            container = %self.spec.name(),
            run = %Uuid::new_v4()
        );

        tokio::spawn(
            async move {
                tokio::task::yield_now().await;
                match self.run(&run).await {
                    Ok(container) => {
                        self.report(&container);
                        run.main.resolve(container);
                    }
                    Err(err) => {
                        error!(error = %err, "provisioning failed");
                        run.abandon_unfinished();
                        run.main.reject(err);
                    }
                }
            }
            .instrument(span),
        );

        tasks
    }

    async fn run(&self, tasks: &CreateTasks) -> Result<Container, Failure> {
        self.phase(&tasks.image_check, self.check_image()).await?;
        self.phase(&tasks.volume_rm, self.reconcile_volume()).await?;
        self.phase(&tasks.container_rm, self.remove_existing()).await?;
        let container = self
            .phase(&tasks.container_mk, self.create_container())
            .await?;
        self.phase(&tasks.container_start, async {
            container.start(self.opts.verbose).await.map_err(PipelineError::from)
        })
        .await?;
        self.phase(&tasks.elastic_ready, self.wait_for_elastic(&container))
            .await?;
        self.phase(&tasks.kibana_ready, self.wait_for_kibana(&container))
            .await?;

        let uploader = container.uploader(self.opts.verbose);
        let (kso, scripts, sm) = tokio::join!(
            self.phase(&tasks.kso_upload, async {
                uploader.saved_objects().await.map_err(PipelineError::from)
            }),
            self.phase(&tasks.scripts_upload, async {
                uploader.scripts().await.map_err(PipelineError::from)
            }),
            self.phase(&tasks.sm_upload, async {
                uploader.index_settings().await.map_err(PipelineError::from)
            }),
        );
        kso?;
        scripts?;
        sm?;

        Ok(container)
    }

    /// Runs one phase bound to `task`: start, do the work unless cancelled,
    /// then end the task with the outcome.
    async fn phase<T, F>(&self, task: &Phase<T>, work: F) -> Result<T, Failure>
    where
        T: Clone + Send + Sync + 'static,
        F: Future<Output = Result<T, PipelineError>>,
    {
        task.start().await;
        let outcome = tokio::select! {
            biased;
            _ = self.opts.cancel.cancelled() => Err(PipelineError::Cancelled),
            outcome = work => outcome,
        };
        match outcome {
            Ok(value) => {
                task.resolve(value.clone());
                Ok(value)
            }
            Err(err) => {
                let failure = Arc::new(err);
                task.reject(failure.clone());
                Err(failure)
            }
        }
    }

    async fn check_image(&self) -> Result<(), PipelineError> {
        let image = self.spec.image();
        if self.opts.verbose {
            info!("checking labels of image {}", image);
        }
        let cmd = format!(
            "docker image inspect --format '{{{{json .Config.Labels}}}}' {}",
            image
        );
        let raw = self
            .executor
            .execute(&cmd, false)
            .await
            .map_err(|source| PipelineError::ImageLabels {
                image: image.to_string(),
                source,
            })?;
        let labels = parse_image_labels(&raw)?;

        if !labels.contains_key(ELASTIC_IMAGE_LABEL) {
            return Err(PipelineError::ForeignImage(image.to_string()));
        }
        match (labels.contains_key(KIBANA_IMAGE_LABEL), self.spec.kibana()) {
            (true, false) => Err(PipelineError::UnexpectedKibana(self.spec.name().to_string())),
            (false, true) => Err(PipelineError::MissingKibana {
                name: self.spec.name().to_string(),
                image: image.to_string(),
            }),
            _ => Ok(()),
        }
    }

    async fn reconcile_volume(&self) -> Result<(), PipelineError> {
        let Some(dir) = self.spec.volume_dir() else {
            return Ok(());
        };
        let result = if self.opts.clear_volume_dir {
            info!("clearing volume dir {}", dir.display());
            empty_dir(dir).await
        } else {
            debug!("ensuring volume dir {} exists", dir.display());
            tokio::fs::create_dir_all(dir).await
        };
        result.map_err(|source| PipelineError::Volume {
            path: dir.to_path_buf(),
            source,
        })
    }

    async fn remove_existing(&self) -> Result<(), PipelineError> {
        let cmd = format!("docker rm -f {}", self.spec.name());
        if self.opts.verbose {
            info!("removing container {} via {}", self.spec.name(), cmd);
        }
        match self.executor.execute(&cmd, self.opts.verbose).await {
            Ok(_) => Ok(()),
            Err(err) if err.is_no_such_container() => {
                debug!("no existing container named {}", self.spec.name());
                Ok(())
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn create_container(&self) -> Result<Container, PipelineError> {
        let cmd = create_command(&self.spec)?;
        if self.opts.verbose {
            info!("creating container {}", self.spec.name());
        }
        self.executor.execute(&cmd, self.opts.verbose).await?;
        Ok(Container::new(self.spec.clone(), self.executor.clone()))
    }

    fn poller(&self) -> ReadinessPoller {
        ReadinessPoller::new(self.opts.poll_interval)
            .with_deadline(self.opts.ready_deadline)
            .with_cancellation(self.opts.cancel.clone())
    }

    async fn wait_for_elastic(
        &self,
        container: &Container,
    ) -> Result<ClusterHealth, PipelineError> {
        Ok(container
            .wait_for_elastic(&self.poller(), self.opts.verbose)
            .await?)
    }

    async fn wait_for_kibana(&self, container: &Container) -> Result<Option<u16>, PipelineError> {
        if !container.kibana() {
            return Ok(None);
        }
        let status = container
            .wait_for_kibana(&self.poller(), self.opts.verbose)
            .await?;
        Ok(Some(status))
    }

    fn report(&self, container: &Container) {
        match container.kibana_port().filter(|_| container.kibana()) {
            Some(kibana_port) => info!(
                "setup complete for {}: elastic @ localhost:{}, kibana @ localhost:{}",
                container.name(),
                container.port(),
                kibana_port
            ),
            None => info!(
                "setup complete for {}: elastic @ localhost:{}",
                container.name(),
                container.port()
            ),
        }
    }
}
