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
use std::fmt;

use crate::cue::{Levels, Step, MAX_CHANNELS};
use crate::playback::error::{InvariantError, PlaybackError};

/// An ordered, position-tracked list of steps.
///
/// Index 0 is always a blackout sentinel and the last index is always a closing sentinel
/// (also a blackout). `position` is the step that is fully applied; `position + 1` is the
/// step the next transition fades into.
pub struct Sequence {
    id: u32,
    name: String,
    steps: Vec<Step>,
    position: usize,
    channels_used: Vec<bool>,
}

impl Sequence {
    /// Creates a new sequence containing only its sentinels.
    pub fn new(id: u32, name: impl Into<String>) -> Sequence {
        Sequence {
            id,
            name: name.into(),
            steps: vec![Step::blackout(id), Step::blackout(id)],
            position: 0,
            channels_used: vec![false; MAX_CHANNELS],
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The number of steps, sentinels included.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if there are no steps between the sentinels.
    pub fn is_empty(&self) -> bool {
        self.steps.len() <= 2
    }

    /// All steps, sentinels included.
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Appends a step before the closing sentinel.
    pub fn add_step(&mut self, step: Step) {
        let index = self.steps.len() - 1;
        self.steps.insert(index, step);
        self.recompute_channels_used();
    }

    /// The index of the active step.
    pub fn position(&self) -> usize {
        self.position
    }

    /// The largest valid position.
    fn max_position(&self) -> usize {
        self.steps.len() - 2
    }

    /// Verifies the sequence can be played from its current position.
    pub fn check_position(&self) -> Result<(), InvariantError> {
        if self.is_empty() {
            return Err(InvariantError::EmptySequence(self.id));
        }
        if self.position > self.max_position() {
            return Err(InvariantError::PositionOutOfBounds {
                position: self.position,
                max: self.max_position(),
            });
        }
        Ok(())
    }

    /// Moves the position without fading.
    pub fn set_position(&mut self, position: usize) -> Result<(), InvariantError> {
        if position > self.max_position() {
            return Err(InvariantError::PositionOutOfBounds {
                position,
                max: self.max_position(),
            });
        }
        self.position = position;
        Ok(())
    }

    /// The position after the current one completes. Moving into the closing sentinel wraps
    /// back to the opening blackout.
    pub fn next_position(&self) -> usize {
        if self.position + 1 >= self.steps.len() - 1 {
            0
        } else {
            self.position + 1
        }
    }

    /// Advances the position by one step, returning the old and new positions.
    pub fn advance(&mut self) -> Result<(usize, usize), InvariantError> {
        self.check_position()?;
        let old = self.position;
        self.position = self.next_position();
        Ok((old, self.position))
    }

    /// Gets a step by index.
    pub fn step(&self, index: usize) -> Result<&Step, InvariantError> {
        self.steps.get(index).ok_or(InvariantError::MissingStep {
            index,
            len: self.steps.len(),
        })
    }

    /// The active step.
    pub fn current(&self) -> Result<&Step, InvariantError> {
        self.check_position()?;
        self.step(self.position)
    }

    /// The step that the next transition fades into.
    pub fn pending(&self) -> Result<&Step, InvariantError> {
        self.check_position()?;
        self.step(self.position + 1)
    }

    /// The total time of the step at the given index, in milliseconds.
    pub fn total_time_ms(&self, index: usize) -> Result<f64, InvariantError> {
        Ok(self.step(index)?.total_time_ms())
    }

    /// Finds the first step at or after the given memory number and moves the position to
    /// the step before it, so that the next transition fades into the found step. Returns
    /// the new position.
    pub fn goto(&mut self, memory: f32) -> Result<usize, PlaybackError> {
        self.check_position()?;
        let last = self.steps.len() - 1;
        let index = (1..last)
            .find(|index| self.steps[*index].memory() >= memory)
            .ok_or(PlaybackError::CueNotFound(memory))?;
        self.position = index - 1;
        Ok(self.position)
    }

    /// Replaces the levels of the active step's cue.
    pub fn update_current_levels(&mut self, levels: Levels) -> Result<(), InvariantError> {
        self.check_position()?;
        let position = self.position;
        self.steps[position].replace_levels(levels);
        self.recompute_channels_used();
        Ok(())
    }

    /// Whether any step uses the given channel. Advisory only.
    pub fn is_channel_used(&self, channel: usize) -> bool {
        self.channels_used.get(channel).copied().unwrap_or(false)
    }

    /// Iterates over every channel with a non-zero level in any step.
    pub fn channels_used(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels_used
            .iter()
            .enumerate()
            .filter_map(|(channel, used)| used.then_some(channel))
    }

    fn recompute_channels_used(&mut self) {
        self.channels_used.iter_mut().for_each(|used| *used = false);
        for step in self.steps.iter() {
            for (channel, level) in step.levels().iter().enumerate() {
                if *level > 0 {
                    self.channels_used[channel] = true;
                }
            }
        }
    }
}

impl fmt::Display for Sequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} steps, position {})",
            self.name,
            self.steps.len().saturating_sub(2),
            self.position
        )
    }
}

#[cfg(test)]
mod test {
    use crate::cue::{Cue, Step, Timing, MAX_CHANNELS};
    use crate::playback::error::{InvariantError, PlaybackError};

    use super::Sequence;

    fn step(memory: f32, channel: usize, level: u8) -> Step {
        let mut cue = Cue::new(1, memory);
        cue.levels[channel] = level;
        Step::new(cue, Timing::default())
    }

    fn sequence(memories: &[f32]) -> Sequence {
        let mut sequence = Sequence::new(1, "main");
        for (i, memory) in memories.iter().enumerate() {
            sequence.add_step(step(*memory, i, 100));
        }
        sequence
    }

    #[test]
    fn test_sentinels() {
        let sequence = sequence(&[1.0, 2.0]);
        assert_eq!(4, sequence.len());
        assert_eq!(0.0, sequence.steps()[0].memory());
        assert!(sequence.steps()[0].levels().iter().all(|level| *level == 0));
        assert!(sequence.steps()[3].levels().iter().all(|level| *level == 0));
        assert_eq!(1.0, sequence.pending().unwrap().memory());
    }

    #[test]
    fn test_empty_sequence_is_invariant_violation() {
        let sequence = Sequence::new(7, "empty");
        assert_eq!(
            Err(InvariantError::EmptySequence(7)),
            sequence.pending().map(|_| ())
        );
    }

    #[test]
    fn test_channels_used() {
        let mut sequence = sequence(&[1.0, 2.0]);
        assert_eq!(vec![0, 1], sequence.channels_used().collect::<Vec<_>>());
        assert!(!sequence.is_channel_used(2));

        sequence.add_step(step(3.0, 10, 1));
        assert!(sequence.is_channel_used(10));
        assert!(!sequence.is_channel_used(MAX_CHANNELS));
    }

    #[test]
    fn test_advance_wraps() {
        let mut sequence = sequence(&[1.0, 2.0, 3.0]);
        assert_eq!(Ok((0, 1)), sequence.advance());
        assert_eq!(Ok((1, 2)), sequence.advance());
        assert_eq!(Ok((2, 3)), sequence.advance());
        // Position 3 is the last cue; its pending step is the closing sentinel.
        assert_eq!(0.0, sequence.pending().unwrap().memory());
        assert_eq!(Ok((3, 0)), sequence.advance());
    }

    #[test]
    fn test_set_position_bounds() {
        let mut sequence = sequence(&[1.0, 2.0]);
        assert!(sequence.set_position(2).is_ok());
        assert_eq!(
            Err(InvariantError::PositionOutOfBounds {
                position: 3,
                max: 2
            }),
            sequence.set_position(3)
        );
        assert_eq!(2, sequence.position());
    }

    #[test]
    fn test_goto() {
        let mut sequence = sequence(&[1.0, 2.0, 2.5, 4.0]);

        // Exact match lands the pending step on the matching cue.
        assert_eq!(Ok(1), sequence.goto(2.0));
        assert_eq!(2.0, sequence.pending().unwrap().memory());

        // No exact match picks the next cue up.
        assert_eq!(Ok(3), sequence.goto(3.0));
        assert_eq!(4.0, sequence.pending().unwrap().memory());

        assert_eq!(Ok(0), sequence.goto(0.5));

        assert_eq!(Err(PlaybackError::CueNotFound(5.0)), sequence.goto(5.0));
        assert_eq!(0, sequence.position());
    }

    #[test]
    fn test_update_current_levels() {
        let mut sequence = sequence(&[1.0]);
        sequence.set_position(1).unwrap();

        let mut levels = [0; MAX_CHANNELS];
        levels[42] = 200;
        sequence.update_current_levels(levels).unwrap();

        assert_eq!(200, sequence.current().unwrap().levels()[42]);
        assert_eq!(0, sequence.current().unwrap().levels()[0]);
        assert!(sequence.is_channel_used(42));
        assert!(!sequence.is_channel_used(0));
    }
}
