//! Output artifacts: chapter manifest and container muxing

pub mod container;
pub mod manifest;

pub use container::{write_container, ContainerProfile};
pub use manifest::{ChapterEntry, Manifest, ManifestBuilder};
