use tracing::info;

use super::types::{ImageError, ImageResult, ImageSpec};
use crate::executor::CommandExecutor;
use crate::provenance::{ELASTIC_IMAGE_LABEL, KIBANA_IMAGE_LABEL};
use crate::spec::spec::{IMAGE_REF_EXTRA, is_docker_name};

const KIBANA_DOWNLOADS: &str = "https://artifacts.elastic.co/downloads/kibana/kibana";

fn is_version(version: &str) -> bool {
    let parts: Vec<&str> = version.split('.').collect();
    parts.len() == 3
        && parts
            .iter()
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
}

impl ImageSpec {
    pub fn new(name: &str, es_version: &str, kibana: bool) -> ImageResult<Self> {
        if !is_docker_name(name, IMAGE_REF_EXTRA) {
            return Err(ImageError::InvalidName(name.to_string()));
        }
        if !is_version(es_version) {
            return Err(ImageError::InvalidVersion(es_version.to_string()));
        }
        Ok(ImageSpec {
            name: name.to_string(),
            es_version: es_version.to_string(),
            kibana,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dockerfile(&self) -> String {
        let version = &self.es_version;
        let mut lines = vec![format!(
            "FROM docker.elastic.co/elasticsearch/elasticsearch:{version}"
        )];
        if self.kibana {
            lines.push(format!("RUN wget -q {KIBANA_DOWNLOADS}-{version}-x86_64.rpm"));
            lines.push(format!("RUN rpm --install kibana-{version}-x86_64.rpm"));
            lines.push(format!("LABEL {KIBANA_IMAGE_LABEL}=\"whatever\""));
        }
        lines.push(format!("LABEL {ELASTIC_IMAGE_LABEL}=\"whatever\""));
        lines.push("WORKDIR /usr/share".to_string());

        let kibana_cmd = if self.kibana {
            " & kibana/bin/kibana --server.host=0.0.0.0"
        } else {
            ""
        };
        lines.push(format!(
            "CMD /usr/local/bin/docker-entrypoint.sh eswrapper{kibana_cmd}"
        ));
        lines.join("\n")
    }

    /// Builds the image, feeding the Dockerfile on stdin with no build context.
    pub async fn build(&self, executor: &dyn CommandExecutor, verbose: bool) -> ImageResult<()> {
        let dockerfile = self.dockerfile();
        if verbose {
            info!("creating image {} from the following dockerfile:\n{}", self.name, dockerfile);
        }
        let cmd = format!("docker build -t {} - <<'EOF'\n{}\nEOF", self.name, dockerfile);
        executor.execute(&cmd, verbose).await?;
        info!("image {} created", self.name);
        Ok(())
    }
}
