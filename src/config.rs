//! Configuration loader and schema types.
//!
//! This module exposes the configuration schema used to drive playback, the
//! library and the catalog client, plus helpers to load it from disk and the
//! environment.

mod load;
mod schema;

pub use load::resolve_config_path;
pub use schema::*;
