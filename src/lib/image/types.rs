use thiserror::Error;

use crate::executor::ExecError;

/// An Elasticsearch image (optionally bundling Kibana) built by this crate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSpec {
    pub(crate) name: String,
    pub(crate) es_version: String,
    pub(crate) kibana: bool,
}

#[derive(Debug, Error)]
pub enum ImageError {
    #[error("{0} is an invalid version, expected N.N.N")]
    InvalidVersion(String),
    #[error("`{0}` is an invalid image name")]
    InvalidName(String),
    #[error("image build failed: {0}")]
    Build(#[from] ExecError),
}

pub type ImageResult<T> = Result<T, ImageError>;
