//! Queue navigation policy.
//!
//! A pure decision from the queue shape, the cursor, shuffle/repeat modes and
//! what triggered navigation. The engine applies the decision; nothing here
//! touches the sink.

use rand::Rng;

use super::types::RepeatMode;

/// "Previous" within this many seconds of the start moves to the previous
/// track; later it restarts the current one.
pub const PREVIOUS_RESTART_THRESHOLD_SECS: f64 = 3.0;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Trigger {
    Ended,
    UserNext,
    UserPrevious,
}

/// What the engine should do next.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueDecision {
    /// Load the queue entry at `cursor`. `new_cycle` starts a fresh shuffle pass.
    Load { cursor: usize, new_cycle: bool },
    /// Reload the current track; cursor unchanged.
    Replay,
    /// Seek the current track back to 0.
    Restart,
    /// Nothing left to play.
    Stop,
}

/// Inputs of a navigation decision.
#[derive(Debug, Clone, Copy)]
pub struct QueueView<'a> {
    pub len: usize,
    pub cursor: Option<usize>,
    pub shuffle: bool,
    pub repeat: RepeatMode,
    pub position_seconds: f64,
    /// Queue indices played in the current shuffle pass, oldest first.
    pub history: &'a [usize],
}

pub fn decide<R: Rng>(view: &QueueView<'_>, trigger: Trigger, rng: &mut R) -> QueueDecision {
    if trigger == Trigger::Ended && view.repeat == RepeatMode::One {
        return QueueDecision::Replay;
    }
    if view.len == 0 {
        return match trigger {
            Trigger::UserPrevious => QueueDecision::Restart,
            _ => QueueDecision::Stop,
        };
    }

    match trigger {
        Trigger::UserPrevious => previous(view),
        Trigger::Ended | Trigger::UserNext if view.shuffle => shuffled_next(view, rng),
        Trigger::Ended | Trigger::UserNext => ordered_next(view),
    }
}

fn ordered_next(view: &QueueView<'_>) -> QueueDecision {
    let next = match view.cursor {
        Some(c) => c + 1,
        None => 0,
    };
    if next < view.len {
        QueueDecision::Load {
            cursor: next,
            new_cycle: false,
        }
    } else if view.repeat == RepeatMode::All {
        QueueDecision::Load {
            cursor: 0,
            new_cycle: false,
        }
    } else {
        QueueDecision::Stop
    }
}

fn shuffled_next<R: Rng>(view: &QueueView<'_>, rng: &mut R) -> QueueDecision {
    let unplayed: Vec<usize> = (0..view.len)
        .filter(|i| Some(*i) != view.cursor && !view.history.contains(i))
        .collect();
    if !unplayed.is_empty() {
        return QueueDecision::Load {
            cursor: unplayed[rng.gen_range(0..unplayed.len())],
            new_cycle: false,
        };
    }

    if view.repeat != RepeatMode::All {
        return QueueDecision::Stop;
    }

    // Reshuffle the full set, avoiding an immediate repeat where possible.
    let pool: Vec<usize> = (0..view.len).filter(|i| Some(*i) != view.cursor).collect();
    let cursor = if pool.is_empty() {
        view.cursor.unwrap_or(0)
    } else {
        pool[rng.gen_range(0..pool.len())]
    };
    QueueDecision::Load {
        cursor,
        new_cycle: true,
    }
}

fn previous(view: &QueueView<'_>) -> QueueDecision {
    if view.position_seconds >= PREVIOUS_RESTART_THRESHOLD_SECS {
        return QueueDecision::Restart;
    }
    let Some(cursor) = view.cursor else {
        return QueueDecision::Restart;
    };

    if view.shuffle {
        // Walk back through the shuffle pass.
        let before = match view.history.iter().rposition(|&i| i == cursor) {
            Some(pos) if pos > 0 => view.history.get(pos - 1).copied(),
            Some(_) => None,
            None => view.history.last().copied(),
        };
        return match before {
            Some(c) if c < view.len => QueueDecision::Load {
                cursor: c,
                new_cycle: false,
            },
            _ => QueueDecision::Restart,
        };
    }

    if cursor > 0 {
        QueueDecision::Load {
            cursor: cursor - 1,
            new_cycle: false,
        }
    } else if view.repeat == RepeatMode::All {
        QueueDecision::Load {
            cursor: view.len - 1,
            new_cycle: false,
        }
    } else {
        QueueDecision::Restart
    }
}
