use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Stored script uploaded to `_scripts/{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    pub lang: String,
    pub source: String,
}

/// Raw, unvalidated container description as read from a config file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ContainerSpecInput {
    pub name: String,
    pub image: String,
    pub port: i64,
    pub hsize: i64,
    pub khsize: Option<i64>,
    pub kibana: bool,
    pub kibana_port: Option<i64>,
    pub cluster_name: Option<String>,
    pub node_name: Option<String>,
    pub data: Option<bool>,
    pub ingest: Option<bool>,
    pub master: Option<bool>,
    pub env: Vec<String>,
    pub volume_dir: Option<PathBuf>,
    pub scripts: IndexMap<String, Script>,
    #[serde(alias = "sm")]
    pub index_settings: IndexMap<String, Value>,
    #[serde(alias = "kso")]
    pub saved_objects: IndexMap<String, Value>,
}

/// Validated, immutable description of one Elasticsearch (+ Kibana) container.
/// Only built through validation; labels decode via `ContainerSpecInput`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContainerSpec {
    pub(crate) name: String,
    pub(crate) image: String,
    pub(crate) port: u16,
    pub(crate) hsize: u32,
    pub(crate) khsize: u32,
    pub(crate) kibana: bool,
    pub(crate) kibana_port: Option<u16>,
    pub(crate) cluster_name: Option<String>,
    pub(crate) node_name: Option<String>,
    pub(crate) data: bool,
    pub(crate) ingest: bool,
    pub(crate) master: bool,
    pub(crate) env: Vec<String>,
    pub(crate) volume_dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) scripts: IndexMap<String, Script>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) index_settings: IndexMap<String, Value>,
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub(crate) saved_objects: IndexMap<String, Value>,
}

#[derive(Debug, Error)]
pub enum SpecError {
    #[error("{field} `{value}` must be a non-empty string without whitespace")]
    InvalidString { field: &'static str, value: String },
    #[error("{field} {value} is out of range (1-65535)")]
    PortOutOfRange { field: &'static str, value: i64 },
    #[error("{field} {value} MB is out of range")]
    HeapOutOfRange { field: &'static str, value: i64 },
    #[error("requested {field} of {requested} MB is too large for this system ({available} MB available)")]
    HeapTooLarge {
        field: &'static str,
        requested: i64,
        available: u64,
    },
    #[error("{0} has an invalid env format, expected KEY=VALUE")]
    InvalidEnv(String),
    #[error("kibana port can't be the same as the elastic port ({0})")]
    PortConflict(u16),
    #[error("a kibana container needs a kibana port")]
    MissingKibanaPort,
    #[error("{kind} `{name}` is invalid: {reason}")]
    InvalidUpload {
        kind: &'static str,
        name: String,
        reason: &'static str,
    },
    #[error("couldn't resolve volume dir {path}: {source}")]
    Volume {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type SpecResult<T> = Result<T, SpecError>;
