//! Configuration module

pub mod regime;
pub mod static_weights;

pub use regime::*;
pub use static_weights::*;

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::path::Path;

/// Read and parse a JSON config file
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
    serde_json::from_str(&raw)
        .map_err(|e| Error::config(format!("cannot parse {}: {}", path.display(), e)))
}
