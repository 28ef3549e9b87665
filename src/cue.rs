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
use std::collections::BTreeMap;
use std::fmt;

use crate::playback::error::PlaybackError;

/// The number of logical channels a cue can hold.
pub const MAX_CHANNELS: usize = 512;

/// A full set of channel levels.
pub type Levels = [u8; MAX_CHANNELS];

/// A recorded snapshot of per-channel levels.
#[derive(Clone, Debug, PartialEq)]
pub struct Cue {
    /// The sequence that owns this cue.
    pub sequence_id: u32,
    /// The memory number. Used for ordering and display, never as an index.
    pub memory: f32,
    /// Target level for every channel.
    pub levels: Levels,
    /// The operator's label.
    pub text: String,
}

impl Cue {
    /// Creates a new cue with every channel at zero.
    pub fn new(sequence_id: u32, memory: f32) -> Cue {
        Cue {
            sequence_id,
            memory,
            levels: [0; MAX_CHANNELS],
            text: String::new(),
        }
    }

    /// Creates a cue from the given levels.
    pub fn with_levels(sequence_id: u32, memory: f32, levels: Levels) -> Cue {
        Cue {
            sequence_id,
            memory,
            levels,
            text: String::new(),
        }
    }
}

/// A per-channel timing override. Supersedes the step level timing for that channel only,
/// regardless of fade direction.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ChannelTime {
    /// Seconds to hold before the channel starts moving.
    pub delay: f64,
    /// Seconds the channel takes to reach its target.
    pub duration: f64,
}

impl ChannelTime {
    pub fn new(delay: f64, duration: f64) -> ChannelTime {
        ChannelTime { delay, duration }
    }
}

/// Step level timing, in seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Timing {
    pub time_in: f64,
    pub time_out: f64,
    pub delay_in: f64,
    pub delay_out: f64,
    pub wait: f64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            time_in: 5.0,
            time_out: 5.0,
            delay_in: 0.0,
            delay_out: 0.0,
            wait: 0.0,
        }
    }
}

impl Timing {
    /// A timing with no waits, delays or fades. The step snaps to its levels.
    pub fn instant() -> Timing {
        Timing {
            time_in: 0.0,
            time_out: 0.0,
            delay_in: 0.0,
            delay_out: 0.0,
            wait: 0.0,
        }
    }

    /// Validates that all of the timing values are finite and non-negative.
    pub fn validate(&self) -> Result<(), PlaybackError> {
        validate_seconds("time_in", self.time_in)?;
        validate_seconds("time_out", self.time_out)?;
        validate_seconds("delay_in", self.delay_in)?;
        validate_seconds("delay_out", self.delay_out)?;
        validate_seconds("wait", self.wait)
    }
}

/// Rejects negative or non-finite seconds.
pub(crate) fn validate_seconds(field: &'static str, value: f64) -> Result<(), PlaybackError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(PlaybackError::Timing { field, value })
    }
}

/// A cue inside of a sequence along with the timing used to fade into it.
///
/// The timing fields are private so that `total_time` can never go stale: every setter
/// recomputes it.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    cue: Cue,
    timing: Timing,
    channel_times: BTreeMap<usize, ChannelTime>,
    text: String,
    total_time: f64,
}

impl Step {
    /// Creates a new step. Timing must already be validated.
    pub fn new(cue: Cue, timing: Timing) -> Step {
        let mut step = Step {
            cue,
            timing,
            channel_times: BTreeMap::new(),
            text: String::new(),
            total_time: 0.0,
        };
        step.recompute_total_time();
        step
    }

    /// A step that takes every channel to zero instantly.
    pub fn blackout(sequence_id: u32) -> Step {
        Step::new(Cue::new(sequence_id, 0.0), Timing::instant())
    }

    pub fn cue(&self) -> &Cue {
        &self.cue
    }

    pub fn levels(&self) -> &Levels {
        &self.cue.levels
    }

    pub fn memory(&self) -> f32 {
        self.cue.memory
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = text.into();
    }

    /// The time, in seconds, for the whole step to complete, including the wait.
    pub fn total_time(&self) -> f64 {
        self.total_time
    }

    /// The total time in milliseconds.
    pub fn total_time_ms(&self) -> f64 {
        self.total_time * 1000.0
    }

    /// Gets the channel time for the given channel, if any.
    pub fn channel_time(&self, channel: usize) -> Option<ChannelTime> {
        self.channel_times.get(&channel).copied()
    }

    pub fn channel_times(&self) -> &BTreeMap<usize, ChannelTime> {
        &self.channel_times
    }

    /// Replaces the step timing.
    pub fn set_timing(&mut self, timing: Timing) -> Result<(), PlaybackError> {
        timing.validate()?;
        self.timing = timing;
        self.recompute_total_time();
        Ok(())
    }

    /// Sets the channel time for a channel.
    pub fn set_channel_time(
        &mut self,
        channel: usize,
        channel_time: ChannelTime,
    ) -> Result<(), PlaybackError> {
        if channel >= MAX_CHANNELS {
            return Err(PlaybackError::ChannelOutOfRange(channel));
        }
        validate_seconds("channel delay", channel_time.delay)?;
        validate_seconds("channel duration", channel_time.duration)?;
        self.channel_times.insert(channel, channel_time);
        self.recompute_total_time();
        Ok(())
    }

    /// Removes the channel time for a channel.
    pub fn remove_channel_time(&mut self, channel: usize) -> Option<ChannelTime> {
        let removed = self.channel_times.remove(&channel);
        self.recompute_total_time();
        removed
    }

    /// Replaces the levels of the underlying cue.
    pub(crate) fn replace_levels(&mut self, levels: Levels) {
        self.cue.levels = levels;
    }

    fn recompute_total_time(&mut self) {
        let timing = &self.timing;
        let mut total = (timing.time_in + timing.delay_in).max(timing.time_out + timing.delay_out)
            + timing.wait;
        for channel_time in self.channel_times.values() {
            total = total.max(channel_time.delay + channel_time.duration + timing.wait);
        }
        self.total_time = total;
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (in {:.1}s, out {:.1}s, wait {:.1}s, total {:.1}s) {}",
            self.cue.memory,
            self.timing.time_in,
            self.timing.time_out,
            self.timing.wait,
            self.total_time,
            self.text,
        )
    }
}

#[cfg(test)]
mod test {
    use crate::playback::error::PlaybackError;

    use super::{ChannelTime, Cue, Step, Timing};

    fn timing(time_in: f64, time_out: f64, delay_in: f64, delay_out: f64, wait: f64) -> Timing {
        Timing {
            time_in,
            time_out,
            delay_in,
            delay_out,
            wait,
        }
    }

    #[test]
    fn test_total_time() {
        let step = Step::new(Cue::new(1, 1.0), timing(3.0, 2.0, 1.0, 4.0, 0.5));
        // max(3 + 1, 2 + 4) + 0.5
        assert_eq!(6.5, step.total_time());
        assert_eq!(6500.0, step.total_time_ms());
    }

    #[test]
    fn test_total_time_covers_channel_times() {
        let mut step = Step::new(Cue::new(1, 1.0), timing(2.0, 2.0, 0.0, 0.0, 1.0));
        assert_eq!(3.0, step.total_time());

        step.set_channel_time(4, ChannelTime::new(3.0, 5.0)).unwrap();
        assert_eq!(9.0, step.total_time());

        // A shorter channel time doesn't shrink the total.
        step.set_channel_time(5, ChannelTime::new(0.0, 1.0)).unwrap();
        assert_eq!(9.0, step.total_time());

        step.remove_channel_time(4);
        assert_eq!(3.0, step.total_time());
    }

    #[test]
    fn test_set_timing_recomputes() {
        let mut step = Step::new(Cue::new(1, 1.0), Timing::instant());
        assert_eq!(0.0, step.total_time());

        step.set_timing(timing(1.0, 2.0, 0.0, 0.0, 0.0)).unwrap();
        assert_eq!(2.0, step.total_time());
    }

    #[test]
    fn test_bad_timing_rejected() {
        let mut step = Step::new(Cue::new(1, 1.0), Timing::default());

        assert!(matches!(
            step.set_timing(timing(-1.0, 0.0, 0.0, 0.0, 0.0)),
            Err(PlaybackError::Timing {
                field: "time_in",
                ..
            })
        ));
        assert!(matches!(
            step.set_timing(timing(0.0, 0.0, 0.0, 0.0, f64::NAN)),
            Err(PlaybackError::Timing { field: "wait", .. })
        ));
        assert!(step
            .set_channel_time(1, ChannelTime::new(f64::INFINITY, 1.0))
            .is_err());
        assert!(matches!(
            step.set_channel_time(10_000, ChannelTime::new(0.0, 1.0)),
            Err(PlaybackError::ChannelOutOfRange(10_000))
        ));

        // The step is untouched.
        assert_eq!(Timing::default(), step.timing());
        assert!(step.channel_times().is_empty());
    }
}
