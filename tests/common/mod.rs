#![allow(dead_code)]

use std::sync::Mutex;

use async_trait::async_trait;
use led::executor::{CommandExecutor, ExecError, ExecResult};
use led::provenance::{ELASTIC_IMAGE_LABEL, KIBANA_IMAGE_LABEL, transport_encode};
use led::spec::{ContainerSpec, ContainerSpecInput};

type Reply = Box<dyn Fn(&str) -> ExecResult<String> + Send + Sync>;

/// Answers each command with the most recently added rule whose pattern the
/// command contains. Unmatched commands succeed with empty output.
pub struct Scripted {
    rules: Vec<(String, Reply)>,
    seen: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn new() -> Self {
        Scripted {
            rules: Vec::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn on<F>(mut self, pattern: impl Into<String>, reply: F) -> Self
    where
        F: Fn(&str) -> ExecResult<String> + Send + Sync + 'static,
    {
        self.rules.push((pattern.into(), Box::new(reply)));
        self
    }

    pub fn answer(self, pattern: impl Into<String>, out: &'static str) -> Self {
        self.on(pattern, move |_| Ok(out.to_string()))
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }

    pub fn ran(&self, pattern: &str) -> bool {
        self.seen().iter().any(|command| command.contains(pattern))
    }
}

#[async_trait]
impl CommandExecutor for Scripted {
    async fn execute(&self, command: &str, _verbose: bool) -> ExecResult<String> {
        self.seen.lock().unwrap().push(command.to_string());
        match self.rules.iter().rev().find(|(pattern, _)| command.contains(pattern.as_str())) {
            Some((_, reply)) => reply(command),
            None => Ok(String::new()),
        }
    }
}

pub fn failed(stderr: &str) -> ExecResult<String> {
    Err(ExecError::Failed {
        command: "docker".to_string(),
        status: Some(1),
        stderr: stderr.to_string(),
    })
}

/// Pattern matching a `docker exec` of the cluster health probe.
pub fn health_probe() -> String {
    transport_encode("curl -s localhost:9200/_cluster/health")
}

pub fn kibana_probe() -> String {
    transport_encode("curl -s -o /dev/null -w \"%{http_code}\" localhost:5601")
}

pub fn elastic_labels() -> String {
    format!("{{\"{ELASTIC_IMAGE_LABEL}\":\"whatever\"}}\n")
}

pub fn kibana_labels() -> String {
    format!("{{\"{ELASTIC_IMAGE_LABEL}\":\"whatever\",\"{KIBANA_IMAGE_LABEL}\":\"whatever\"}}\n")
}

/// A node whose image checks out and whose cluster is green straight away.
pub fn healthy() -> Scripted {
    Scripted::new()
        .on("docker image inspect", |_| Ok(elastic_labels()))
        .answer(health_probe(), r#"{"cluster_name":"c1","status":"green"}"#)
        .answer("base64 --decode | curl", r#"{"acknowledged":true}"#)
}

pub fn spec(input: ContainerSpecInput) -> ContainerSpec {
    ContainerSpec::validate(
        ContainerSpecInput {
            name: "n1".to_string(),
            image: "led-es".to_string(),
            port: 5000,
            hsize: 500,
            ..input
        },
        64_000,
    )
    .unwrap()
}
