//! Application module: the `App` model used by the TUI and runtime.
//!
//! `App` lives in `app::model` and holds the track list, selection, filter
//! and the latest playback snapshot.

mod model;

pub use model::*;
