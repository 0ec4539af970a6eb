use futures_util::future::join_all;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::types::{EntryError, EntryFailure, UploadError, UploadKind, UploadResult, Uploader};
use crate::container::Container;
use crate::executor::shell_quote;
use crate::provenance::transport_encode;

struct Request {
    name: String,
    url: String,
    command: String,
}

fn request(name: &str, method: &str, url: String, body: &Value, headers: &[&str]) -> Request {
    let mut command = format!(
        "echo {} | base64 --decode | curl -s -X{} {} -H 'Content-Type: application/json'",
        transport_encode(body.to_string()),
        method,
        shell_quote(&url),
    );
    for header in headers {
        command.push_str(&format!(" -H {}", shell_quote(header)));
    }
    command.push_str(" -d @-");

    Request {
        name: name.to_string(),
        url,
        command,
    }
}

fn reject_error_field(body: Value) -> Result<Value, EntryError> {
    if body.get("error").is_some() {
        Err(EntryError::Rejected(body))
    } else {
        Ok(body)
    }
}

fn reject_saved_object_errors(body: Value) -> Result<Value, EntryError> {
    let body = reject_error_field(body)?;
    let failed = body
        .get("saved_objects")
        .and_then(Value::as_array)
        .and_then(|objects| objects.iter().find(|object| object.get("error").is_some()))
        .cloned();
    match failed {
        Some(object) => Err(EntryError::Rejected(object)),
        None => Ok(body),
    }
}

/// Kibana refuses `updated_at` on create.
fn prepare_saved_object(name: &str, object: &Value) -> Value {
    let mut object = object.clone();
    if let Some(fields) = object.as_object_mut() {
        fields.remove("updated_at");
        fields
            .entry("id")
            .or_insert_with(|| Value::String(name.to_string()));
    }
    Value::Array(vec![object])
}

impl<'a> Uploader<'a> {
    pub fn new(container: &'a Container, verbose: bool) -> Self {
        Uploader { container, verbose }
    }

    pub async fn scripts(&self) -> UploadResult<Vec<Value>> {
        let port = self.container.port();
        let requests = self
            .container
            .spec()
            .scripts()
            .iter()
            .map(|(name, script)| {
                let url = format!("localhost:{port}/_scripts/{name}");
                request(name, "POST", url, &json!({ "script": script }), &[])
            })
            .collect();
        self.fan_out(UploadKind::Scripts, requests, reject_error_field)
            .await
    }

    pub async fn index_settings(&self) -> UploadResult<Vec<Value>> {
        let port = self.container.port();
        let requests = self
            .container
            .spec()
            .index_settings()
            .iter()
            .map(|(index, body)| {
                request(index, "PUT", format!("localhost:{port}/{index}"), body, &[])
            })
            .collect();
        self.fan_out(UploadKind::IndexSettings, requests, reject_error_field)
            .await
    }

    /// Only Kibana containers take saved objects; others upload nothing.
    pub async fn saved_objects(&self) -> UploadResult<Vec<Value>> {
        let Some(port) = self.container.kibana_port().filter(|_| self.container.kibana()) else {
            return Ok(Vec::new());
        };
        let url = format!("localhost:{port}/api/saved_objects/_bulk_create?overwrite=true");
        let requests = self
            .container
            .spec()
            .saved_objects()
            .iter()
            .map(|(name, object)| {
                let body = prepare_saved_object(name, object);
                request(name, "POST", url.clone(), &body, &["kbn-xsrf: true"])
            })
            .collect();
        self.fan_out(UploadKind::SavedObjects, requests, reject_saved_object_errors)
            .await
    }

    /// Issues every request at once and waits for all of them. A failing
    /// entry never cancels its siblings.
    async fn fan_out<F>(
        &self,
        kind: UploadKind,
        requests: Vec<Request>,
        check: F,
    ) -> UploadResult<Vec<Value>>
    where
        F: Fn(Value) -> Result<Value, EntryError>,
    {
        let executor = &self.container.executor;
        let check = &check;
        let pending = requests.iter().map(|request| async move {
            if self.verbose {
                info!("uploading {} {} to {}", kind, request.name, request.url);
            }
            let raw = executor.execute(&request.command, self.verbose).await?;
            let body: Value = serde_json::from_str(&raw).map_err(EntryError::Response)?;
            check(body)
        });
        let outcomes = join_all(pending).await;

        let mut responses = Vec::new();
        let mut failures = Vec::new();
        for (request, outcome) in requests.iter().zip(outcomes) {
            match outcome {
                Ok(body) => responses.push(body),
                Err(error) => {
                    warn!(entry = %request.name, error = %error, "{} upload failed", kind);
                    failures.push(EntryFailure {
                        name: request.name.clone(),
                        error,
                    });
                }
            }
        }

        if failures.is_empty() {
            Ok(responses)
        } else {
            Err(UploadError { kind, failures })
        }
    }
}

impl Container {
    pub fn uploader(&self, verbose: bool) -> Uploader<'_> {
        Uploader::new(self, verbose)
    }
}
