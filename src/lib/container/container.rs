use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use super::types::{
    ClusterHealth, Container, ContainerError, ContainerResult, ELASTIC_PORT, HealthStatus,
    KIBANA_PORT,
};
use crate::executor::CommandExecutor;
use crate::fleet::{DockerClient, FleetResult};
use crate::poller::ReadinessPoller;
use crate::provenance::transport_encode;
use crate::spec::ContainerSpec;

#[derive(Deserialize)]
struct SavedObjectsPage {
    saved_objects: Vec<Value>,
}

impl Container {
    pub fn new(spec: ContainerSpec, executor: Arc<dyn CommandExecutor>) -> Self {
        Container { spec, executor }
    }

    /// Rebuilds a handle for every container this crate created, using the
    /// spec stored in each container's provenance label.
    pub async fn fetch_all(
        docker: &DockerClient,
        executor: Arc<dyn CommandExecutor>,
    ) -> FleetResult<Vec<Container>> {
        let specs = docker.managed_specs().await?;
        Ok(specs
            .into_iter()
            .map(|spec| Container::new(spec, executor.clone()))
            .collect())
    }

    pub fn spec(&self) -> &ContainerSpec {
        &self.spec
    }

    pub fn name(&self) -> &str {
        self.spec.name()
    }

    pub fn port(&self) -> u16 {
        self.spec.port()
    }

    pub fn kibana(&self) -> bool {
        self.spec.kibana()
    }

    pub fn kibana_port(&self) -> Option<u16> {
        self.spec.kibana_port()
    }

    /// Executes `cmd` inside the container and returns its stdout. The command
    /// travels base64 encoded so quotes and `$` survive both shells.
    pub async fn exec(&self, cmd: &str, verbose: bool) -> ContainerResult<String> {
        if cmd.trim().is_empty() {
            return Err(ContainerError::EmptyCommand);
        }

        let wrapped = format!(
            "docker exec -i {} bash -c 'eval \"$(echo {} | base64 --decode)\"'",
            self.name(),
            transport_encode(cmd)
        );
        debug!(container = self.name(), cmd, "exec");

        Ok(self.executor.execute(&wrapped, verbose).await?)
    }

    /// `GET _cluster/health`, failing on any transport or parse error.
    pub async fn probe_health(&self, verbose: bool) -> ContainerResult<ClusterHealth> {
        let cmd = format!("curl -s localhost:{ELASTIC_PORT}/_cluster/health");
        let raw = self.exec(&cmd, verbose).await?;
        serde_json::from_str(&raw).map_err(|source| ContainerError::Response {
            what: "cluster health",
            source,
        })
    }

    pub async fn cluster_health(&self, verbose: bool) -> Option<ClusterHealth> {
        if verbose {
            info!("fetching cluster health for {}", self.name());
        }
        match self.probe_health(verbose).await {
            Ok(health) => Some(health),
            Err(err) => {
                debug!(container = self.name(), error = %err, "cluster health unavailable");
                None
            }
        }
    }

    pub async fn cluster_state(&self, verbose: bool) -> Option<HealthStatus> {
        self.cluster_health(verbose).await.map(|health| health.status)
    }

    /// HTTP status code of the Kibana root page.
    pub async fn probe_kibana(&self, verbose: bool) -> ContainerResult<u16> {
        if !self.kibana() {
            return Err(ContainerError::NotKibana(self.name().to_string()));
        }
        let cmd = format!("curl -s -o /dev/null -w \"%{{http_code}}\" localhost:{KIBANA_PORT}");
        let raw = self.exec(&cmd, verbose).await?;
        let code = raw.trim();
        code.parse()
            .map_err(|_| ContainerError::Status(code.to_string()))
    }

    pub async fn kibana_status(&self, verbose: bool) -> Option<u16> {
        if !self.kibana() {
            return None;
        }
        match self.probe_kibana(verbose).await {
            Ok(code) => Some(code),
            Err(err) => {
                debug!(container = self.name(), error = %err, "kibana status unavailable");
                None
            }
        }
    }

    pub async fn kibana_saved_objects(&self, verbose: bool) -> ContainerResult<Vec<Value>> {
        if !self.kibana() {
            return Err(ContainerError::NotKibana(self.name().to_string()));
        }
        let cmd = format!("curl -s localhost:{KIBANA_PORT}/api/saved_objects/_find?per_page=10000");
        let raw = self.exec(&cmd, verbose).await?;
        let page: SavedObjectsPage =
            serde_json::from_str(&raw).map_err(|source| ContainerError::Response {
                what: "saved objects",
                source,
            })?;
        Ok(page.saved_objects)
    }

    /// Polls cluster health until the cluster reports green or yellow.
    pub async fn wait_for_elastic(
        &self,
        poller: &ReadinessPoller,
        verbose: bool,
    ) -> ContainerResult<ClusterHealth> {
        if verbose {
            info!("waiting for state >= yellow from elastic for {}", self.name());
        }
        let ready = poller
            .poll(
                || self.probe_health(verbose),
                |health| health.status.is_ready(),
            )
            .await?;
        info!(
            container = self.name(),
            status = ?ready.snapshot.status,
            attempts = ready.attempts,
            "elastic ready"
        );
        Ok(ready.snapshot)
    }

    /// Polls Kibana until it answers 200.
    pub async fn wait_for_kibana(
        &self,
        poller: &ReadinessPoller,
        verbose: bool,
    ) -> ContainerResult<u16> {
        if !self.kibana() {
            return Err(ContainerError::NotKibana(self.name().to_string()));
        }
        if verbose {
            info!("waiting for status 200 from kibana for {}", self.name());
        }
        let ready = poller
            .poll(|| self.probe_kibana(verbose), |status| *status == 200)
            .await?;
        info!(container = self.name(), attempts = ready.attempts, "kibana ready");
        Ok(ready.snapshot)
    }

    pub async fn start(&self, verbose: bool) -> ContainerResult<()> {
        let cmd = format!("docker start {}", self.name());
        if verbose {
            info!("starting container {} via {}", self.name(), cmd);
        }
        self.executor.execute(&cmd, verbose).await?;
        Ok(())
    }

    pub async fn stop(&self, verbose: bool) -> ContainerResult<()> {
        let cmd = format!("docker stop {}", self.name());
        if verbose {
            info!("stopping container {} via {}", self.name(), cmd);
        }
        self.executor.execute(&cmd, verbose).await?;
        Ok(())
    }

    pub async fn restart(&self, verbose: bool) -> ContainerResult<()> {
        self.stop(verbose).await?;
        self.start(verbose).await
    }

    pub async fn delete(&self, verbose: bool) -> ContainerResult<()> {
        let cmd = format!("docker rm -f {}", self.name());
        if verbose {
            info!("deleting container {} via {}", self.name(), cmd);
        }
        self.executor.execute(&cmd, verbose).await?;
        Ok(())
    }
}

impl std::fmt::Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Container").field("spec", &self.spec).finish()
    }
}
