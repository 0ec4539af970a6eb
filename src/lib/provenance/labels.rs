use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD};

use super::types::ProvenanceResult;
use crate::spec::{ContainerSpec, ContainerSpecInput};

/// Base64 keeps payloads clear of shell quoting.
pub fn transport_encode(raw: impl AsRef<[u8]>) -> String {
    STANDARD.encode(raw)
}

pub fn transport_decode(encoded: &str) -> ProvenanceResult<String> {
    let bytes = STANDARD.decode(encoded.trim())?;
    Ok(String::from_utf8(bytes)?)
}

pub fn encode_spec(spec: &ContainerSpec) -> ProvenanceResult<String> {
    Ok(transport_encode(serde_json::to_vec(spec)?))
}

/// Decodes and re-validates a label. Heap sizes aren't checked against the
/// memory free right now, since the container already exists.
pub fn decode_spec(label: &str) -> ProvenanceResult<ContainerSpec> {
    let input: ContainerSpecInput = serde_json::from_str(&transport_decode(label)?)?;
    Ok(ContainerSpec::validate(input, u64::MAX)?)
}

/// Parses `docker inspect --format '{{json .Config.Labels}}'` output. Images
/// without labels print `null`.
pub fn parse_image_labels(output: &str) -> ProvenanceResult<HashMap<String, String>> {
    let labels: Option<HashMap<String, String>> = serde_json::from_str(output.trim())?;
    Ok(labels.unwrap_or_default())
}
