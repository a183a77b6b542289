//! Core framework: error types shared by every pipeline stage

pub mod error;

pub use error::{PipelineError, Result, SynthesisError};
