use indexmap::IndexMap;

use super::types::ContainerSpec;

/// Builds the container environment.
///
/// Required defaults come first, then the optional cluster/node names, then
/// every `KEY=VALUE` from `ContainerSpec::env`. A later entry overwrites the value of an
/// earlier key but keeps that key's original position.
pub fn merge_env(spec: &ContainerSpec) -> IndexMap<String, String> {
    let mut merged = IndexMap::new();
    merged.insert(
        "ES_JAVA_OPTS".to_string(),
        format!("-Xms{0}m -Xmx{0}m", spec.hsize()),
    );
    merged.insert(
        "NODE_OPTIONS".to_string(),
        format!("--max-old-space-size={}", spec.khsize()),
    );
    merged.insert("node.data".to_string(), spec.data().to_string());
    merged.insert("node.ingest".to_string(), spec.ingest().to_string());
    merged.insert("node.master".to_string(), spec.master().to_string());

    if let Some(cluster_name) = spec.cluster_name() {
        merged.insert("cluster.name".to_string(), cluster_name.to_string());
    }
    if let Some(node_name) = spec.node_name() {
        merged.insert("node.name".to_string(), node_name.to_string());
    }

    for entry in spec.env() {
        if let Some((key, value)) = entry.split_once('=') {
            merged.insert(key.to_string(), value.to_string());
        }
    }

    merged
}
