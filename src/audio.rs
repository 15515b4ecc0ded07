//! Playback: the engine state machine, the queue policy, audio sinks and the
//! audio thread that owns them.

mod engine;
mod player;
mod queue;
mod sink;
mod thread;
mod types;

pub use engine::*;
pub use player::*;
pub use queue::*;
pub use sink::*;
pub use types::*;
