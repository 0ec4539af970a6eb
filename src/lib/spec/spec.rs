use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde_json::Value;

use super::types::{ContainerSpec, ContainerSpecInput, Script, SpecError, SpecResult};
use crate::host::available_memory_mb;

const ES_HEAP_MIN: i64 = 100;
const ES_HEAP_MAX: i64 = 31000;
const KIBANA_HEAP_MIN: i64 = 100;
const KIBANA_HEAP_DEFAULT: u32 = 512;

impl ContainerSpec {
    /// Validates `input` against the memory currently available on this host.
    pub fn new(input: ContainerSpecInput) -> SpecResult<Self> {
        Self::validate(input, available_memory_mb())
    }

    /// Validates `input`, treating `available_mb` as the host's free memory.
    pub fn validate(input: ContainerSpecInput, available_mb: u64) -> SpecResult<Self> {
        let name = docker_name("name", &input.name, &[])?;
        let image = docker_name("image", &input.image, IMAGE_REF_EXTRA)?;
        let cluster_name = optional_token("cluster_name", input.cluster_name.as_deref())?;
        let node_name = optional_token("node_name", input.node_name.as_deref())?;
        let port = parse_port("port", input.port)?;
        let kibana_port = input
            .kibana_port
            .map(|value| parse_port("kibana_port", value))
            .transpose()?;

        let hsize = heap("hsize", input.hsize, ES_HEAP_MIN, Some(ES_HEAP_MAX), available_mb)?;
        let khsize = match input.khsize {
            Some(value) => heap("khsize", value, KIBANA_HEAP_MIN, None, available_mb)?,
            None => KIBANA_HEAP_DEFAULT,
        };

        if let Some(entry) = input.env.iter().find(|entry| !entry.contains('=')) {
            return Err(SpecError::InvalidEnv(entry.clone()));
        }

        let volume_dir = input
            .volume_dir
            .as_deref()
            .map(resolve_volume_dir)
            .transpose()?;

        if kibana_port == Some(port) {
            return Err(SpecError::PortConflict(port));
        } else if input.kibana && kibana_port.is_none() {
            return Err(SpecError::MissingKibanaPort);
        }

        check_scripts(&input.scripts)?;
        check_documents("index", &input.index_settings)?;
        check_documents("saved object", &input.saved_objects)?;

        Ok(ContainerSpec {
            name,
            image,
            port,
            hsize,
            khsize,
            kibana: input.kibana,
            kibana_port,
            cluster_name,
            node_name,
            data: input.data.unwrap_or(true),
            ingest: input.ingest.unwrap_or(false),
            master: input.master.unwrap_or(true),
            env: input.env,
            volume_dir,
            scripts: input.scripts,
            index_settings: input.index_settings,
            saved_objects: input.saved_objects,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn hsize(&self) -> u32 {
        self.hsize
    }

    pub fn khsize(&self) -> u32 {
        self.khsize
    }

    pub fn kibana(&self) -> bool {
        self.kibana
    }

    pub fn kibana_port(&self) -> Option<u16> {
        self.kibana_port
    }

    pub fn cluster_name(&self) -> Option<&str> {
        self.cluster_name.as_deref()
    }

    pub fn node_name(&self) -> Option<&str> {
        self.node_name.as_deref()
    }

    pub fn data(&self) -> bool {
        self.data
    }

    pub fn ingest(&self) -> bool {
        self.ingest
    }

    pub fn master(&self) -> bool {
        self.master
    }

    pub fn env(&self) -> &[String] {
        &self.env
    }

    pub fn volume_dir(&self) -> Option<&Path> {
        self.volume_dir.as_deref()
    }

    pub fn scripts(&self) -> &IndexMap<String, Script> {
        &self.scripts
    }

    pub fn index_settings(&self) -> &IndexMap<String, Value> {
        &self.index_settings
    }

    pub fn saved_objects(&self) -> &IndexMap<String, Value> {
        &self.saved_objects
    }
}

impl TryFrom<ContainerSpecInput> for ContainerSpec {
    type Error = SpecError;

    fn try_from(input: ContainerSpecInput) -> SpecResult<Self> {
        ContainerSpec::new(input)
    }
}

/// Characters image references allow beyond a container name's.
pub(crate) const IMAGE_REF_EXTRA: &[char] = &['/', ':', '@'];

/// Docker's name rule, `[a-zA-Z0-9][a-zA-Z0-9_.-]*`, widened by `extra`.
/// Anything passing it is safe to put in a shell command unquoted.
pub(crate) fn is_docker_name(value: &str, extra: &[char]) -> bool {
    let mut chars = value.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c) || extra.contains(&c))
}

fn docker_name(field: &'static str, value: &str, extra: &[char]) -> SpecResult<String> {
    if is_docker_name(value, extra) {
        Ok(value.to_string())
    } else {
        Err(SpecError::InvalidString {
            field,
            value: value.to_string(),
        })
    }
}

fn is_token(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

fn token(field: &'static str, value: &str) -> SpecResult<String> {
    if is_token(value) {
        Ok(value.to_string())
    } else {
        Err(SpecError::InvalidString {
            field,
            value: value.to_string(),
        })
    }
}

fn optional_token(field: &'static str, value: Option<&str>) -> SpecResult<Option<String>> {
    value.map(|value| token(field, value)).transpose()
}

fn parse_port(field: &'static str, value: i64) -> SpecResult<u16> {
    match u16::try_from(value) {
        Ok(port) if port >= 1 => Ok(port),
        _ => Err(SpecError::PortOutOfRange { field, value }),
    }
}

fn heap(
    field: &'static str,
    value: i64,
    min: i64,
    max: Option<i64>,
    available_mb: u64,
) -> SpecResult<u32> {
    if value < min || max.is_some_and(|max| value > max) {
        return Err(SpecError::HeapOutOfRange { field, value });
    }
    if value as u64 >= available_mb {
        return Err(SpecError::HeapTooLarge {
            field,
            requested: value,
            available: available_mb,
        });
    }
    u32::try_from(value).map_err(|_| SpecError::HeapOutOfRange { field, value })
}

fn resolve_volume_dir(path: &Path) -> SpecResult<PathBuf> {
    let raw = path.to_string_lossy();
    if !is_token(&raw) {
        return Err(SpecError::InvalidString {
            field: "volume_dir",
            value: raw.into_owned(),
        });
    }
    std::path::absolute(path).map_err(|source| SpecError::Volume {
        path: path.to_path_buf(),
        source,
    })
}

fn check_name(kind: &'static str, name: &str) -> SpecResult<()> {
    if !is_token(name) || name.contains('/') {
        return Err(SpecError::InvalidUpload {
            kind,
            name: name.to_string(),
            reason: "names must be non-empty and contain no whitespace or '/'",
        });
    }
    Ok(())
}

fn check_scripts(scripts: &IndexMap<String, Script>) -> SpecResult<()> {
    for (name, script) in scripts {
        check_name("script", name)?;
        if script.source.is_empty() {
            return Err(SpecError::InvalidUpload {
                kind: "script",
                name: name.clone(),
                reason: "source is empty",
            });
        }
    }
    Ok(())
}

fn check_documents(kind: &'static str, documents: &IndexMap<String, Value>) -> SpecResult<()> {
    for (name, document) in documents {
        check_name(kind, name)?;
        if !document.is_object() {
            return Err(SpecError::InvalidUpload {
                kind,
                name: name.clone(),
                reason: "body must be a JSON object",
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PLENTY: u64 = 64_000;

    fn input() -> ContainerSpecInput {
        ContainerSpecInput {
            name: "n1".to_string(),
            image: "led-es".to_string(),
            port: 5000,
            hsize: 500,
            ..Default::default()
        }
    }

    #[test]
    fn fills_in_defaults() {
        let spec = ContainerSpec::validate(input(), PLENTY).unwrap();
        assert_eq!(spec.port(), 5000);
        assert_eq!(spec.kibana_port(), None);
        assert_eq!(spec.khsize(), 512);
        assert!(spec.data() && spec.master() && !spec.ingest());
        assert!(!spec.kibana());
    }

    #[test]
    fn kibana_port_must_differ_from_port() {
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                kibana: true,
                kibana_port: Some(5000),
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::PortConflict(5000)));
    }

    #[test]
    fn kibana_requires_a_port() {
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                kibana: true,
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::MissingKibanaPort));
    }

    #[test]
    fn rejects_bad_names_and_ports() {
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                name: "my node".to_string(),
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidString { field: "name", .. }));

        for bad in ["n1;x", "n1$IFS", "`id`", "a|b", "-n1", "n1/x"] {
            let err = ContainerSpec::validate(
                ContainerSpecInput {
                    name: bad.to_string(),
                    ..input()
                },
                PLENTY,
            )
            .unwrap_err();
            assert!(matches!(err, SpecError::InvalidString { field: "name", .. }), "{bad}");
        }
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                image: "led-es;rm".to_string(),
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidString { field: "image", .. }));

        let spec = ContainerSpec::validate(
            ContainerSpecInput {
                name: "es_node-1.a".to_string(),
                image: "docker.elastic.co/elasticsearch/elasticsearch:6.3.2".to_string(),
                ..input()
            },
            PLENTY,
        )
        .unwrap();
        assert_eq!(spec.name(), "es_node-1.a");

        for bad in [0, 65536, -4] {
            let err = ContainerSpec::validate(
                ContainerSpecInput {
                    port: bad,
                    ..input()
                },
                PLENTY,
            )
            .unwrap_err();
            assert!(matches!(err, SpecError::PortOutOfRange { field: "port", .. }));
        }
    }

    #[test]
    fn heap_is_bounded_by_range_and_host_memory() {
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                hsize: 99,
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::HeapOutOfRange { .. }));

        let err = ContainerSpec::validate(input(), 400).unwrap_err();
        assert!(matches!(
            err,
            SpecError::HeapTooLarge {
                requested: 500,
                available: 400,
                ..
            }
        ));
    }

    #[test]
    fn env_entries_need_an_equals_sign() {
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                env: vec!["a=b".to_string(), "broken".to_string()],
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidEnv(ref e) if e == "broken"));
    }

    #[test]
    fn relative_volume_dir_becomes_absolute() {
        let spec = ContainerSpec::validate(
            ContainerSpecInput {
                volume_dir: Some(PathBuf::from("data/n1")),
                ..input()
            },
            PLENTY,
        )
        .unwrap();
        let dir = spec.volume_dir().unwrap();
        assert!(dir.is_absolute());
        assert!(dir.ends_with("data/n1"));
    }

    #[test]
    fn upload_bodies_must_be_objects() {
        let mut index_settings = IndexMap::new();
        index_settings.insert("users".to_string(), json!([1, 2]));
        let err = ContainerSpec::validate(
            ContainerSpecInput {
                index_settings,
                ..input()
            },
            PLENTY,
        )
        .unwrap_err();
        assert!(matches!(err, SpecError::InvalidUpload { kind: "index", .. }));
    }

    #[test]
    fn parses_config_file_aliases() {
        let raw = json!({
            "name": "n2",
            "image": "led-kibana",
            "port": 5001,
            "hsize": 500,
            "kibana": true,
            "kibana_port": 6001,
            "scripts": { "calc_score": { "lang": "painless", "source": "Math.log(_score * 2)" } },
            "sm": { "users": { "settings": { "number_of_shards": 1 } } }
        });
        let input: ContainerSpecInput = serde_json::from_value(raw).unwrap();
        let spec = ContainerSpec::validate(input, PLENTY).unwrap();
        assert_eq!(spec.kibana_port(), Some(6001));
        assert_eq!(spec.scripts()["calc_score"].lang, "painless");
        assert!(spec.index_settings().contains_key("users"));
    }
}
