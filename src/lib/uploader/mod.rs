//! Configuration uploads: stored scripts, index settings/mappings and Kibana
//! saved objects.

pub mod types;
pub mod uploader;

pub use types::{EntryError, EntryFailure, UploadError, UploadKind, UploadResult, Uploader};
