use std::{error::Error, fmt};

use serde_json::Value;
use thiserror::Error;

use crate::container::Container;
use crate::executor::ExecError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Scripts,
    IndexSettings,
    SavedObjects,
}

impl fmt::Display for UploadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadKind::Scripts => write!(f, "script"),
            UploadKind::IndexSettings => write!(f, "index settings/mappings"),
            UploadKind::SavedObjects => write!(f, "kibana saved object"),
        }
    }
}

#[derive(Debug, Error)]
pub enum EntryError {
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error("unreadable response: {0}")]
    Response(#[source] serde_json::Error),
    #[error("rejected: {0}")]
    Rejected(Value),
}

#[derive(Debug)]
pub struct EntryFailure {
    pub name: String,
    pub error: EntryError,
}

/// Every failed entry of one fan-out, in declaration order.
#[derive(Debug)]
pub struct UploadError {
    pub kind: UploadKind,
    pub failures: Vec<EntryFailure>,
}

impl UploadError {
    pub fn first(&self) -> Option<&EntryFailure> {
        self.failures.first()
    }
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.first() {
            Some(first) => write!(f, "{} upload `{}` {}", self.kind, first.name, first.error)?,
            None => write!(f, "{} upload failed", self.kind)?,
        }
        if self.failures.len() > 1 {
            write!(f, " (and {} more)", self.failures.len() - 1)?;
        }
        Ok(())
    }
}

impl Error for UploadError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.first().map(|failure| &failure.error as &(dyn Error + 'static))
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Pushes a container's configuration payloads to its HTTP endpoints.
pub struct Uploader<'a> {
    pub container: &'a Container,
    pub verbose: bool,
}
