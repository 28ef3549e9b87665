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
use std::sync::Arc;

use midly::{
    live::LiveEvent,
    num::{u4, u7},
    MidiMessage,
};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use crate::crossfade::{Fader, FADER_FULL};
use crate::playback::{error::PlaybackError, Engine};

mod takeover;

pub use self::takeover::{FaderState, SoftTakeover};

const MAX_7BIT: u32 = 127;
const MAX_14BIT: u32 = 16383;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("unable to parse MIDI message: {0}")]
    Parse(#[from] midly::Error),

    #[error(transparent)]
    Playback(#[from] PlaybackError),
}

/// Translates a 7 bit controller value onto the fader range, rounding to the nearest step.
pub fn scale_7bit(raw: u7) -> u8 {
    scale(u32::from(raw.as_int()), MAX_7BIT)
}

/// Translates a 14 bit pitch bend value onto the fader range, rounding to the nearest step.
pub fn scale_14bit(raw: u16) -> u8 {
    scale(u32::from(raw).min(MAX_14BIT), MAX_14BIT)
}

fn scale(raw: u32, max: u32) -> u8 {
    // Both inputs are non-negative, so adding half rounds half away from zero.
    let scaled = (raw * u32::from(FADER_FULL) + max / 2) / max;
    u8::try_from(scaled).unwrap_or(FADER_FULL)
}

/// Which message a physical fader sends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FaderSource {
    ControlChange(u7),
    PitchBend,
}

/// Which MIDI messages drive the two crossfade faders.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FaderMapping {
    pub channel: u4,
    pub out_fader: FaderSource,
    pub in_fader: FaderSource,
}

impl FaderMapping {
    /// Returns the fader the event is for and its translated position.
    pub fn translate(&self, event: &LiveEvent) -> Option<(Fader, u8)> {
        let (channel, message) = match event {
            LiveEvent::Midi { channel, message } => (*channel, *message),
            _ => return None,
        };
        if channel != self.channel {
            return None;
        }

        let (source, value) = match message {
            MidiMessage::Controller { controller, value } => {
                (FaderSource::ControlChange(controller), scale_7bit(value))
            }
            MidiMessage::PitchBend { bend } => {
                (FaderSource::PitchBend, scale_14bit(bend.0.as_int()))
            }
            _ => return None,
        };

        if source == self.out_fader {
            Some((Fader::Out, value))
        } else if source == self.in_fader {
            Some((Fader::In, value))
        } else {
            None
        }
    }
}

#[derive(Default)]
struct PhysicalFader {
    guard: SoftTakeover,
    /// The last position the hardware reported, before inversion.
    last: Option<u8>,
}

/// Feeds MIDI fader messages into the engine's manual crossfade through a soft takeover
/// guard for each fader.
pub struct MidiFaders {
    engine: Arc<Engine>,
    mapping: FaderMapping,
    faders: Mutex<[PhysicalFader; 2]>,
}

impl MidiFaders {
    pub fn new(engine: Arc<Engine>, mapping: FaderMapping) -> MidiFaders {
        MidiFaders {
            engine,
            mapping,
            faders: Mutex::new(Default::default()),
        }
    }

    /// Handles a raw MIDI message. Returns true if it moved a fader.
    pub fn handle(&self, raw: &[u8]) -> Result<bool, MidiError> {
        let event = LiveEvent::parse(raw)?;
        let Some((fader, physical)) = self.mapping.translate(&event) else {
            trace!(?raw, "Ignoring unmapped MIDI message.");
            return Ok(false);
        };

        // While inverted the top of the physical travel is zero.
        let inverted = self.engine.is_inverted();
        let to_logical = |physical: u8| {
            if inverted {
                FADER_FULL - physical
            } else {
                physical
            }
        };

        let mut faders = self.faders.lock();
        let state = &mut faders[match fader {
            Fader::Out => 0,
            Fader::In => 1,
        }];
        let previous = to_logical(state.last.unwrap_or(physical));
        state.last = Some(physical);
        state.guard.sync(self.engine.fader(fader), previous);

        match state.guard.accept(to_logical(physical)) {
            Some(position) => {
                self.engine.set_fader(fader, position)?;
                Ok(true)
            }
            None => {
                debug!(
                    fader = %fader,
                    physical,
                    state = ?state.guard.state(),
                    "Waiting for fader pickup."
                );
                Ok(false)
            }
        }
    }
}
