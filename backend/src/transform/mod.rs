//! Row adjustment module.
//!
//! - Pipeline: rule sets applied to rows, CSV bytes, files and directories

pub mod pipeline;

pub use pipeline::*;
