//! Building the base images the pipeline provisions from.

pub mod image;
pub mod types;

pub use types::{ImageError, ImageResult, ImageSpec};
