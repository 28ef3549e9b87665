// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// A broken engine invariant. These indicate a bug in whatever handed the engine its data
/// and are never clamped away.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error("position {position} is outside of [0, {max}]")]
    PositionOutOfBounds { position: usize, max: usize },

    #[error("sequence {0} has no steps between its sentinels")]
    EmptySequence(u32),

    #[error("step index {index} does not exist (sequence has {len} steps)")]
    MissingStep { index: usize, len: usize },
}

/// Errors surfaced by the playback engine and the cue store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaybackError {
    #[error("invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    #[error("no cue at or after memory {0}")]
    CueNotFound(f32),

    #[error("channel {0} is out of range")]
    ChannelOutOfRange(usize),

    #[error("invalid timing for {field}: {value}")]
    Timing { field: &'static str, value: f64 },

    #[error("playback worker panicked")]
    WorkerPanicked,
}

impl PlaybackError {
    /// Returns true if this error indicates a programming error rather than bad user input.
    pub fn is_invariant(&self) -> bool {
        matches!(self, PlaybackError::Invariant(_))
    }
}
