//! Local library: track values, session handles, the file importer, file
//! discovery and the durable metadata store.

mod discovery;
mod handles;
mod import;
mod model;
mod store;

pub use discovery::*;
pub use handles::*;
pub use import::*;
pub use model::*;
pub use store::*;

#[cfg(test)]
mod tests;
