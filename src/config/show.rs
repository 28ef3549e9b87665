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
use std::{collections::BTreeMap, fs, path::Path};

use serde::Deserialize;
use tracing::debug;

use crate::cue::{ChannelTime, Cue, Step, Timing, MAX_CHANNELS};
use crate::sequence::Sequence;

use super::error::ConfigError;

const DEFAULT_FADE_SECONDS: f64 = 5.0;

fn default_fade() -> f64 {
    DEFAULT_FADE_SECONDS
}

/// A show file: one sequence of cues.
#[derive(Deserialize)]
pub struct Show {
    /// The name of the sequence.
    name: String,

    /// The cues, in playback order.
    #[serde(default)]
    steps: Vec<ShowStep>,
}

/// A single cue and its timing. Channels are numbered from 1 and times are in seconds.
#[derive(Deserialize)]
struct ShowStep {
    memory: f32,
    #[serde(default)]
    text: String,
    #[serde(default)]
    levels: BTreeMap<usize, u8>,
    #[serde(default = "default_fade")]
    time_in: f64,
    #[serde(default = "default_fade")]
    time_out: f64,
    #[serde(default)]
    delay_in: f64,
    #[serde(default)]
    delay_out: f64,
    #[serde(default)]
    wait: f64,
    #[serde(default)]
    channel_times: BTreeMap<usize, ShowChannelTime>,
}

#[derive(Deserialize)]
struct ShowChannelTime {
    #[serde(default)]
    delay: f64,
    duration: f64,
}

impl Show {
    /// Reads a show from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Show, ConfigError> {
        Self::parse(&fs::read_to_string(path)?)
    }

    /// Parses a show from YAML.
    pub fn parse(yaml: &str) -> Result<Show, ConfigError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Validates the show and turns it into a sequence with the given ID.
    pub fn to_sequence(&self, id: u32) -> Result<Sequence, ConfigError> {
        let mut sequence = Sequence::new(id, self.name.clone());
        let mut last_memory: Option<f32> = None;

        for show_step in &self.steps {
            let memory = show_step.memory;
            if !memory.is_finite() || last_memory.is_some_and(|last| memory <= last) {
                return Err(ConfigError::Invalid(format!(
                    "cue {} is out of order, memory numbers must increase",
                    memory
                )));
            }
            last_memory = Some(memory);

            let step = show_step.to_step(id)?;
            debug!(memory, total_time = step.total_time(), "Loaded cue.");
            sequence.add_step(step);
        }

        Ok(sequence)
    }
}

impl ShowStep {
    fn to_step(&self, sequence_id: u32) -> Result<Step, ConfigError> {
        let timing_error = |source| ConfigError::Timing {
            memory: self.memory,
            source,
        };

        let mut cue = Cue::new(sequence_id, self.memory);
        cue.text = self.text.clone();
        for (channel, level) in &self.levels {
            cue.levels[self.channel_index(*channel)?] = *level;
        }

        let timing = Timing {
            time_in: self.time_in,
            time_out: self.time_out,
            delay_in: self.delay_in,
            delay_out: self.delay_out,
            wait: self.wait,
        };
        timing.validate().map_err(timing_error)?;

        let mut step = Step::new(cue, timing);
        step.set_text(self.text.clone());
        for (channel, channel_time) in &self.channel_times {
            step.set_channel_time(
                self.channel_index(*channel)?,
                ChannelTime::new(channel_time.delay, channel_time.duration),
            )
            .map_err(timing_error)?;
        }
        Ok(step)
    }

    fn channel_index(&self, channel: usize) -> Result<usize, ConfigError> {
        if (1..=MAX_CHANNELS).contains(&channel) {
            Ok(channel - 1)
        } else {
            Err(ConfigError::Invalid(format!(
                "channel {} in cue {} is out of range",
                channel, self.memory
            )))
        }
    }
}
