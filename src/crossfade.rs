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

use crate::cue::{Levels, Step};
use crate::interpolate::{channel_level, Direction, Phases};

/// The top of a fader's travel.
pub const FADER_FULL: u8 = u8::MAX;

/// One of the two manual crossfade faders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fader {
    /// The A fader. Only moves channels that are falling.
    Out,
    /// The B fader. Only moves channels that are rising.
    In,
}

impl Fader {
    fn moves(&self, direction: Direction) -> bool {
        matches!(
            (self, direction),
            (Fader::Out, Direction::Down) | (Fader::In, Direction::Up)
        )
    }
}

impl fmt::Display for Fader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fader::Out => write!(f, "out (A)"),
            Fader::In => write!(f, "in (B)"),
        }
    }
}

/// State of the manual crossfade.
///
/// While engaged, fader positions stand in for the clock: a position maps linearly onto the
/// pending step's total time and the regular interpolation is used from there.
pub struct Crossfade {
    out_position: u8,
    in_position: u8,
    /// Cosmetic only. Flips after every commit, so that the physical end of travel alternates
    /// between 0% and 100% on successive cues.
    inverted: bool,
    /// The live levels at the moment the faders took over. None when not engaged.
    baseline: Option<Levels>,
}

impl Crossfade {
    pub fn new() -> Crossfade {
        Crossfade {
            out_position: 0,
            in_position: 0,
            inverted: false,
            baseline: None,
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.baseline.is_some()
    }

    /// Takes over from the given live levels.
    pub fn engage(&mut self, baseline: Levels) {
        self.baseline = Some(baseline);
    }

    /// Hands control back, returning both faders to zero.
    pub fn disengage(&mut self) {
        self.baseline = None;
        self.out_position = 0;
        self.in_position = 0;
    }

    pub fn position(&self, fader: Fader) -> u8 {
        match fader {
            Fader::Out => self.out_position,
            Fader::In => self.in_position,
        }
    }

    pub fn set_position(&mut self, fader: Fader, position: u8) {
        match fader {
            Fader::Out => self.out_position = position,
            Fader::In => self.in_position = position,
        }
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Both faders are at the top of their travel.
    pub fn is_complete(&self) -> bool {
        self.out_position == FADER_FULL && self.in_position == FADER_FULL
    }

    /// Finishes the crossfade: both faders go back to zero and the rendering flips.
    pub fn commit(&mut self) {
        self.disengage();
        self.inverted = !self.inverted;
    }

    /// Translates a fader position into elapsed time within the step.
    pub fn elapsed_ms(&self, fader: Fader, step: &Step) -> f64 {
        f64::from(self.position(fader)) / f64::from(FADER_FULL) * step.total_time_ms()
    }

    /// Computes the level of a channel driven by the given fader, or None if the fader doesn't
    /// move this channel.
    pub fn level(
        &self,
        fader: Fader,
        channel: usize,
        step: &Step,
        override_old: Option<u8>,
    ) -> Option<u8> {
        let baseline = self.baseline.as_ref()?;
        let old = override_old.unwrap_or(*baseline.get(channel)?);
        let next = *step.levels().get(channel)?;
        if !fader.moves(Direction::of(old, next)?) {
            return None;
        }

        Some(channel_level(
            old,
            next,
            self.elapsed_ms(fader, step),
            &Phases::from(step.timing()),
            step.channel_time(channel),
            None,
        ))
    }
}

impl Default for Crossfade {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod test {
    use crate::cue::{ChannelTime, Cue, Step, Timing, MAX_CHANNELS};
    use crate::interpolate::{channel_level, Phases};

    use super::{Crossfade, Fader, FADER_FULL};

    fn step() -> Step {
        let mut cue = Cue::new(1, 1.0);
        cue.levels[0] = 255;
        cue.levels[1] = 0;
        cue.levels[2] = 100;
        Step::new(
            cue,
            Timing {
                time_in: 4.0,
                time_out: 2.0,
                delay_in: 0.0,
                delay_out: 0.0,
                wait: 0.0,
            },
        )
    }

    fn engaged() -> Crossfade {
        let mut baseline = [0; MAX_CHANNELS];
        baseline[1] = 200;
        baseline[2] = 100;
        let mut crossfade = Crossfade::new();
        crossfade.engage(baseline);
        crossfade
    }

    #[test]
    fn test_not_engaged() {
        let crossfade = Crossfade::new();
        assert!(!crossfade.is_engaged());
        assert_eq!(None, crossfade.level(Fader::In, 0, &step(), None));
    }

    #[test]
    fn test_faders_split_by_direction() {
        let step = step();
        let mut crossfade = engaged();
        crossfade.set_position(Fader::In, 255);
        crossfade.set_position(Fader::Out, 255);

        // Channel 0 rises, so only the in fader moves it.
        assert_eq!(Some(255), crossfade.level(Fader::In, 0, &step, None));
        assert_eq!(None, crossfade.level(Fader::Out, 0, &step, None));

        // Channel 1 falls, so only the out fader moves it.
        assert_eq!(None, crossfade.level(Fader::In, 1, &step, None));
        assert_eq!(Some(0), crossfade.level(Fader::Out, 1, &step, None));

        // Channel 2 doesn't move.
        assert_eq!(None, crossfade.level(Fader::In, 2, &step, None));
        assert_eq!(None, crossfade.level(Fader::Out, 2, &step, None));
    }

    #[test]
    fn test_matches_timer() {
        let step = step();
        let mut crossfade = engaged();
        let phases = Phases::from(step.timing());

        for position in 0..=FADER_FULL {
            crossfade.set_position(Fader::In, position);
            crossfade.set_position(Fader::Out, position);
            let elapsed = crossfade.elapsed_ms(Fader::In, &step);
            assert_eq!(
                Some(channel_level(0, 255, elapsed, &phases, None, None)),
                crossfade.level(Fader::In, 0, &step, None)
            );
            assert_eq!(
                Some(channel_level(200, 0, elapsed, &phases, None, None)),
                crossfade.level(Fader::Out, 1, &step, None)
            );
        }
    }

    #[test]
    fn test_position_maps_onto_total_time() {
        let mut step = step();
        step.set_channel_time(0, ChannelTime::new(2.0, 4.0)).unwrap();
        // Total time is now 6 seconds.
        let mut crossfade = engaged();

        crossfade.set_position(Fader::In, 85);
        assert_eq!(2000.0, crossfade.elapsed_ms(Fader::In, &step));
        // Still in the channel's delay.
        assert_eq!(Some(0), crossfade.level(Fader::In, 0, &step, None));

        crossfade.set_position(Fader::In, 170);
        assert_eq!(Some(128), crossfade.level(Fader::In, 0, &step, None));
    }

    #[test]
    fn test_override_is_starting_point() {
        let step = step();
        let mut crossfade = engaged();
        crossfade.set_position(Fader::Out, 0);

        // Channel 0 would rise from the baseline, but the override puts it above the target.
        assert_eq!(None, crossfade.level(Fader::In, 0, &step, Some(255)));
        assert_eq!(None, crossfade.level(Fader::Out, 2, &step, Some(100)));
        assert_eq!(Some(150), crossfade.level(Fader::Out, 2, &step, Some(150)));
    }

    #[test]
    fn test_commit() {
        let mut crossfade = engaged();
        crossfade.set_position(Fader::Out, FADER_FULL);
        assert!(!crossfade.is_complete());
        crossfade.set_position(Fader::In, FADER_FULL);
        assert!(crossfade.is_complete());

        crossfade.commit();
        assert!(!crossfade.is_engaged());
        assert!(crossfade.is_inverted());
        assert_eq!(0, crossfade.position(Fader::Out));
        assert_eq!(0, crossfade.position(Fader::In));

        crossfade.engage([0; MAX_CHANNELS]);
        crossfade.commit();
        assert!(!crossfade.is_inverted());
    }
}
