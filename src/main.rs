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
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{crate_version, Parser, Subcommand};
use stagefade::config::{self, Show};
use stagefade::controller::{keyboard, Controller};
use stagefade::midi::MidiFaders;
use stagefade::output::{BufferedSink, LoggingObserver};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A cue playback and crossfade engine for stage lighting."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start will load a show and play it back from keyboard commands.
    Start {
        /// The path to the engine settings.
        settings_path: String,
        /// The path to the show.
        show_path: String,
    },
    /// Verify will load and validate a show, and print its cues.
    Verify {
        /// The path to the show.
        show_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            settings_path,
            show_path,
        } => {
            let (engine, mapping) = config::init_engine(
                &PathBuf::from(&settings_path),
                &PathBuf::from(&show_path),
                Arc::new(BufferedSink::new()),
                Arc::new(LoggingObserver),
            )?;
            let midi = mapping.map(|mapping| Arc::new(MidiFaders::new(engine.clone(), mapping)));

            let mut controller =
                Controller::new(engine.clone(), midi, Arc::new(keyboard::Driver::new()));
            controller.join().await?;

            // Nothing should keep writing levels once the controller is gone.
            tokio::task::spawn_blocking(move || engine.stop()).await?;
        }
        Commands::Verify { show_path } => {
            let show = Show::deserialize(&PathBuf::from(&show_path))?;
            let sequence = show.to_sequence(config::MAIN_SEQUENCE_ID)?;

            if sequence.is_empty() {
                println!("No cues found in {}.", show_path);
                return Ok(());
            }

            println!("Sequence {} (cues: {}):", show.name(), sequence.len() - 2);
            for step in &sequence.steps()[1..sequence.len() - 1] {
                println!("- {}", step);
            }

            let channels: Vec<String> = sequence
                .channels_used()
                .map(|channel| (channel + 1).to_string())
                .collect();
            println!(
                "\nChannels used (count: {}): {}",
                channels.len(),
                channels.join(", ")
            );
        }
    }

    Ok(())
}
