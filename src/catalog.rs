//! Remote track catalog (Jamendo): popular tracks, search, genres and
//! featured albums, turned into [`Track`](crate::library::Track) values with
//! network playable references.

mod client;
mod model;

pub use client::*;
pub use model::Album;
