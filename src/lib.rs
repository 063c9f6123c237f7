/// GRIDSEQ - A four-track MIDI step sequencer engine
///
/// This library provides the engine of a 20-key hardware step sequencer:
/// - A shared sequence store with tracks, steps and transport state
/// - A playback engine with tempo clock or external trigger sync
/// - Key handling for live play, step recording and transport controls
/// - A status display renderer
/// - MIDI output to a wired serial link and a USB port at the same time

pub mod config;
pub mod display;
pub mod error;
pub mod input;
pub mod instrument;
pub mod midi;
pub mod sequencer;

#[cfg(test)]
mod testing;

// Re-export commonly used types
pub use config::Config;
pub use display::{DisplayRenderer, LogScreen, Screen, SharedScreen, TextLine};
pub use error::{Error, Result};
pub use input::{InputHandler, Key, KeyEvent, KeyState};
pub use instrument::Instrument;
pub use midi::{midi_note_name, MidiPortSink, MidiSink, MidiTransmitter, SerialSink, Transport};
pub use sequencer::playback::{PlaybackEngine, SyncInput};
pub use sequencer::{Articulation, SequencerStore, Step, TransportState};
