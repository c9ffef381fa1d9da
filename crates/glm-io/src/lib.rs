//! # glm-io: GLM Model I/O
//!
//! Parser and serializer moving [`glm_core::Model`] values to and from
//! GLM text.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! let result = glm_io::read("feeder.glm")?;
//! println!("{}", result.stats.summary());
//! println!("{}", result.diagnostics.summary());
//!
//! let mut model = result.model;
//! model.rename_object("node", "n650", "feeder_head");
//! glm_io::write(&model, "feeder_out.glm")?;
//! # anyhow::Ok(())
//! ```
//!
//! ## Modules
//!
//! - [`token`] - Line classification table
//! - [`parser`] - Recursive-descent block parser, best-effort recovery
//! - [`serializer`] - Fixed-order text emission with comment replay

pub mod parser;
pub mod serializer;
pub mod token;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use glm_core::Model;

pub use parser::{parse_str, parse_str_with_schema, ParseResult};
pub use serializer::to_string;

/// Read and parse a GLM file. I/O failure and unterminated blocks are
/// errors; everything else lands in the result's diagnostics.
pub fn read(path: impl AsRef<Path>) -> Result<ParseResult> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read GLM file {}", path.display()))?;
    let result = parse_str(&text)
        .with_context(|| format!("failed to parse GLM file {}", path.display()))?;
    Ok(result)
}

/// Serialize a model and write it to `path`.
pub fn write(model: &Model, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    fs::write(path, to_string(model))
        .with_context(|| format!("failed to write GLM file {}", path.display()))?;
    Ok(())
}
