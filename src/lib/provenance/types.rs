use thiserror::Error;

use crate::spec::SpecError;

/// Label every image and container managed by this crate carries. On
/// containers it holds the transport-encoded `ContainerSpec`.
pub const ELASTIC_IMAGE_LABEL: &str = "_led_elastic_image";

/// Label present only on images that bundle Kibana.
pub const KIBANA_IMAGE_LABEL: &str = "_led_kibana_image";

#[derive(Debug, Error)]
pub enum ProvenanceError {
    #[error("label is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("label is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("label does not hold a container spec: {0}")]
    Json(#[from] serde_json::Error),
    #[error("label holds an invalid container spec: {0}")]
    Spec(#[from] SpecError),
}

pub type ProvenanceResult<T> = Result<T, ProvenanceError>;
