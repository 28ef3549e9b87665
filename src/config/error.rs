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
use crate::playback::error::PlaybackError;

/// Typed error for settings and show loading, so that callers can tell a missing file
/// from bad cue data without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Show parse error: {0}")]
    Yaml(#[from] serde_yml::Error),

    #[error("Unable to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid duration: {0}")]
    Duration(#[from] duration_string::Error),

    #[error("Invalid timing in cue {memory}: {source}")]
    Timing { memory: f32, source: PlaybackError },

    #[error("{0}")]
    Invalid(String),
}
