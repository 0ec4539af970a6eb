use std::collections::HashMap;

use bollard::{
    Docker,
    container::{
        ListContainersOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    },
    image::{ListImagesOptions, RemoveImageOptions},
    models::{ContainerSummary, ImageSummary},
};
use tracing::{info, warn};

use super::types::{ContainerRow, DockerClient, FleetError, FleetResult, ImageRow};
use crate::provenance::{ELASTIC_IMAGE_LABEL, decode_spec};
use crate::spec::ContainerSpec;

fn label_filter() -> HashMap<String, Vec<String>> {
    HashMap::from([("label".to_string(), vec![ELASTIC_IMAGE_LABEL.to_string()])])
}

fn container_name(summary: &ContainerSummary) -> Option<String> {
    summary
        .names
        .as_ref()
        .and_then(|names| names.first())
        .map(|name| name.trim_start_matches('/').to_string())
}

impl DockerClient {
    pub fn connect() -> FleetResult<Self> {
        let client = Docker::connect_with_unix_defaults()?;
        Ok(DockerClient { client })
    }

    async fn managed_containers(&self) -> FleetResult<Vec<ContainerSummary>> {
        let containers = self
            .client
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                filters: label_filter(),
                ..Default::default()
            }))
            .await?;
        Ok(containers)
    }

    async fn images_matching(
        &self,
        filters: HashMap<String, Vec<String>>,
    ) -> FleetResult<Vec<ImageSummary>> {
        let images = self
            .client
            .list_images(Some(ListImagesOptions::<String> {
                filters,
                ..Default::default()
            }))
            .await?;
        Ok(images)
    }

    /// Specs decoded from the provenance label of every managed container.
    /// Containers whose label can't be decoded are skipped.
    pub async fn managed_specs(&self) -> FleetResult<Vec<ContainerSpec>> {
        let mut specs = Vec::new();
        for summary in self.managed_containers().await? {
            let label = summary
                .labels
                .as_ref()
                .and_then(|labels| labels.get(ELASTIC_IMAGE_LABEL));
            let Some(label) = label else {
                continue;
            };
            match decode_spec(label) {
                Ok(spec) => specs.push(spec),
                Err(err) => warn!(
                    container = %container_name(&summary).unwrap_or_default(),
                    error = %err,
                    "skipping container with unreadable label"
                ),
            }
        }
        Ok(specs)
    }

    pub async fn containers(&self) -> FleetResult<Vec<ContainerRow>> {
        let rows = self
            .managed_containers()
            .await?
            .into_iter()
            .map(|summary| ContainerRow {
                name: container_name(&summary).unwrap_or_default(),
                status: summary.status.unwrap_or_default(),
                created: summary.created.unwrap_or_default(),
                image: summary.image.unwrap_or_default(),
            })
            .collect();
        Ok(rows)
    }

    pub async fn images(&self) -> FleetResult<Vec<ImageRow>> {
        let rows = self
            .images_matching(label_filter())
            .await?
            .into_iter()
            .map(|image| ImageRow {
                repository: image
                    .repo_tags
                    .first()
                    .cloned()
                    .unwrap_or_else(|| "<none>".to_string()),
                id: image.id,
                created: image.created,
                size: image.size,
            })
            .collect();
        Ok(rows)
    }

    pub async fn start_all(&self) -> FleetResult<Vec<String>> {
        let mut started = Vec::new();
        for name in self.managed_names().await? {
            info!("starting container {}", name);
            self.client
                .start_container(&name, None::<StartContainerOptions<String>>)
                .await
                .map_err(|source| FleetError::Action {
                    action: "start",
                    target: name.clone(),
                    source,
                })?;
            started.push(name);
        }
        Ok(started)
    }

    pub async fn stop_all(&self) -> FleetResult<Vec<String>> {
        let mut stopped = Vec::new();
        for name in self.managed_names().await? {
            info!("stopping container {}", name);
            self.client
                .stop_container(&name, None::<StopContainerOptions>)
                .await
                .map_err(|source| FleetError::Action {
                    action: "stop",
                    target: name.clone(),
                    source,
                })?;
            stopped.push(name);
        }
        Ok(stopped)
    }

    pub async fn remove_all(&self) -> FleetResult<Vec<String>> {
        let mut removed = Vec::new();
        for name in self.managed_names().await? {
            info!("removing container {}", name);
            self.client
                .remove_container(
                    &name,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
                .map_err(|source| FleetError::Action {
                    action: "remove",
                    target: name.clone(),
                    source,
                })?;
            removed.push(name);
        }
        Ok(removed)
    }

    pub async fn remove_images(&self) -> FleetResult<Vec<String>> {
        let images = self.images_matching(label_filter()).await?;
        self.force_remove_images(images).await
    }

    pub async fn remove_dangling_images(&self) -> FleetResult<Vec<String>> {
        let dangling = HashMap::from([("dangling".to_string(), vec!["true".to_string()])]);
        let images = self.images_matching(dangling).await?;
        self.force_remove_images(images).await
    }

    async fn managed_names(&self) -> FleetResult<Vec<String>> {
        Ok(self
            .managed_containers()
            .await?
            .iter()
            .filter_map(container_name)
            .collect())
    }

    async fn force_remove_images(&self, images: Vec<ImageSummary>) -> FleetResult<Vec<String>> {
        let mut removed = Vec::new();
        for image in images {
            info!("removing image {}", image.id);
            self.client
                .remove_image(
                    &image.id,
                    Some(RemoveImageOptions {
                        force: true,
                        ..Default::default()
                    }),
                    None,
                )
                .await
                .map_err(|source| FleetError::Action {
                    action: "remove image",
                    target: image.id.clone(),
                    source,
                })?;
            removed.push(image.id);
        }
        Ok(removed)
    }
}
