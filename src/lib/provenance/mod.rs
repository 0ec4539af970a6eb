//! Provenance labels: how containers describe themselves without a registry.

pub mod labels;
pub mod types;

pub use labels::{decode_spec, encode_spec, parse_image_labels, transport_decode, transport_encode};
pub use types::{ELASTIC_IMAGE_LABEL, KIBANA_IMAGE_LABEL, ProvenanceError, ProvenanceResult};
