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
use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use duration_string::DurationString;
use midly::num::{u4, u7};
use serde::Deserialize;

use crate::cue::MAX_CHANNELS;
use crate::midi::{FaderMapping, FaderSource};
use crate::output::{PatchTable, UNIVERSE_SIZE};
use crate::playback::DEFAULT_TICK;

use super::error::ConfigError;

/// Environment variables with this prefix override values from the settings file.
const ENV_PREFIX: &str = "STAGEFADE";

/// The engine settings.
#[derive(Deserialize)]
pub struct Settings {
    /// How often a running transition is re-evaluated.
    tick_interval: Option<String>,

    /// Where each channel is output.
    #[serde(default)]
    patch: Vec<PatchEntry>,

    /// MIDI faders for the manual crossfade.
    midi: Option<Midi>,
}

/// A single patch entry. Outputs and channels are numbered from 1 as on the console.
#[derive(Deserialize, Clone)]
pub struct PatchEntry {
    universe: u16,
    output: u16,
    channel: usize,
}

/// The MIDI fader configuration.
#[derive(Deserialize, Clone)]
pub struct Midi {
    /// The MIDI channel, numbered from 1.
    channel: u8,
    out_fader: MidiFader,
    in_fader: MidiFader,
}

#[derive(Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MidiFader {
    ControlChange { controller: u8 },
    PitchBend,
}

impl MidiFader {
    fn source(&self) -> Result<FaderSource, ConfigError> {
        Ok(match self {
            MidiFader::ControlChange { controller } => {
                FaderSource::ControlChange(u7::try_from(*controller).ok_or_else(|| {
                    ConfigError::Invalid(format!("invalid MIDI controller {}", controller))
                })?)
            }
            MidiFader::PitchBend => FaderSource::PitchBend,
        })
    }
}

impl Settings {
    /// Parses settings from a YAML file, applying environment overrides.
    pub fn deserialize(path: &Path) -> Result<Settings, ConfigError> {
        Self::deserialize_with_prefix(path, ENV_PREFIX)
    }

    fn deserialize_with_prefix(path: &Path, prefix: &str) -> Result<Settings, ConfigError> {
        Ok(Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix(prefix))
            .build()?
            .try_deserialize::<Settings>()?)
    }

    /// The tick interval, or the default if none is configured.
    pub fn tick_interval(&self) -> Result<Duration, ConfigError> {
        let tick = match &self.tick_interval {
            Some(tick_interval) => DurationString::from_string(tick_interval.clone())?.into(),
            None => DEFAULT_TICK,
        };
        if tick.is_zero() {
            return Err(ConfigError::Invalid("tick interval must be non-zero".into()));
        }
        Ok(tick)
    }

    /// Builds the patch table.
    pub fn patch(&self) -> Result<PatchTable, ConfigError> {
        let mut patch = PatchTable::new();
        for entry in &self.patch {
            if !(1..=UNIVERSE_SIZE).contains(&usize::from(entry.output)) {
                return Err(ConfigError::Invalid(format!(
                    "output {} in universe {} is out of range",
                    entry.output, entry.universe
                )));
            }
            if !(1..=MAX_CHANNELS).contains(&entry.channel) {
                return Err(ConfigError::Invalid(format!(
                    "channel {} is out of range",
                    entry.channel
                )));
            }
            patch.patch(entry.universe, entry.output - 1, entry.channel - 1);
        }
        Ok(patch)
    }

    /// The MIDI fader mapping, if one is configured.
    pub fn fader_mapping(&self) -> Result<Option<FaderMapping>, ConfigError> {
        let Some(midi) = &self.midi else {
            return Ok(None);
        };

        let channel = midi
            .channel
            .checked_sub(1)
            .and_then(u4::try_from)
            .ok_or_else(|| {
                ConfigError::Invalid(format!("invalid MIDI channel {}", midi.channel))
            })?;
        if midi.out_fader == midi.in_fader {
            return Err(ConfigError::Invalid(
                "the out and in faders must use different MIDI messages".into(),
            ));
        }

        Ok(Some(FaderMapping {
            channel,
            out_fader: midi.out_fader.source()?,
            in_fader: midi.in_fader.source()?,
        }))
    }
}
