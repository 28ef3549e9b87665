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
use std::{path::Path, sync::Arc};

use tracing::info;

use crate::midi::FaderMapping;
use crate::output::{DmxSink, Observer};
use crate::playback::Engine;

pub mod error;
mod settings;
mod show;

pub use self::error::ConfigError;
pub use self::settings::{MidiFader, Settings};
pub use self::show::Show;

/// The ID given to the sequence loaded from a show file.
pub const MAIN_SEQUENCE_ID: u32 = 1;

/// Builds an engine from a settings file and a show file. Also returns the MIDI fader
/// mapping, if one is configured.
pub fn init_engine(
    settings_path: &Path,
    show_path: &Path,
    sink: Arc<dyn DmxSink>,
    observer: Arc<dyn Observer>,
) -> Result<(Arc<Engine>, Option<FaderMapping>), ConfigError> {
    let settings = Settings::deserialize(settings_path)?;
    let show = Show::deserialize(show_path)?;
    let sequence = show.to_sequence(MAIN_SEQUENCE_ID)?;
    let patch = settings.patch()?;
    let tick = settings.tick_interval()?;

    info!(
        show = show.name(),
        steps = sequence.len() - 2,
        patched = patch.len(),
        tick = ?tick,
        "Engine configured."
    );

    let engine = Engine::new(sequence, Arc::new(patch), sink, observer, tick);
    Ok((Arc::new(engine), settings.fader_mapping()?))
}
