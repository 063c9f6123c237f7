/// Key input - maps the 20-key matrix onto notes and transport controls
use std::sync::Arc;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use tracing::debug;

use crate::config::Config;
use crate::midi::MidiTransmitter;
use crate::sequencer::{Controls, SequencerStore, Step};

pub const KEY_COUNT: usize = 20;
pub const NOTE_KEYS: usize = 12;

/// Physical key number (matrix scan order) to logical key.
const KEYMAP: [u8; KEY_COUNT] = [
    15, 14, 13, 12, 1, 19, 18, 17, 16, 0, 10, 8, 6, 5, 3, 11, 9, 7, 4, 2,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Pressed,
    Released,
}

/// A debounced transition reported by the key-matrix scanner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    pub key_number: u8,
    pub state: KeyState,
}

impl KeyEvent {
    pub fn pressed(key_number: u8) -> Self {
        Self {
            key_number,
            state: KeyState::Pressed,
        }
    }

    pub fn released(key_number: u8) -> Self {
        Self {
            key_number,
            state: KeyState::Released,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Semitone 0..=11 above the current octave.
    Note(u8),
    Record,
    StepInput,
    Length,
    Up,
    Modifier1,
    Modifier2,
    Articulation,
    Down,
}

impl Key {
    pub fn from_logical(logical: u8) -> Option<Key> {
        let key = match logical {
            0..=11 => Key::Note(logical),
            12 => Key::Record,
            13 => Key::StepInput,
            14 => Key::Length,
            15 => Key::Up,
            16 => Key::Modifier1,
            17 => Key::Modifier2,
            18 => Key::Articulation,
            19 => Key::Down,
            _ => return None,
        };
        Some(key)
    }

    pub fn from_key_number(key_number: u8) -> Option<Key> {
        KEYMAP
            .get(key_number as usize)
            .and_then(|logical| Key::from_logical(*logical))
    }

    /// Physical key number that produces this key.
    pub fn key_number(self) -> u8 {
        let logical = match self {
            Key::Note(semitone) => semitone,
            Key::Record => 12,
            Key::StepInput => 13,
            Key::Length => 14,
            Key::Up => 15,
            Key::Modifier1 => 16,
            Key::Modifier2 => 17,
            Key::Articulation => 18,
            Key::Down => 19,
        };
        KEYMAP
            .iter()
            .position(|l| *l == logical)
            .map_or(0, |p| p as u8)
    }
}

pub struct InputHandler {
    store: Arc<SequencerStore>,
    midi: Arc<MidiTransmitter>,
    events: UnboundedReceiver<KeyEvent>,
    config: Config,
    modifier1: bool,
    modifier2: bool,
    /// (pitch, channel) sounded by each note key while it is held.
    held: [Option<(u8, u8)>; NOTE_KEYS],
}

impl InputHandler {
    pub fn new(
        store: Arc<SequencerStore>,
        midi: Arc<MidiTransmitter>,
        events: UnboundedReceiver<KeyEvent>,
        config: Config,
    ) -> Self {
        Self {
            store,
            midi,
            events,
            config,
            modifier1: false,
            modifier2: false,
            held: [None; NOTE_KEYS],
        }
    }

    pub async fn run(mut self) {
        loop {
            self.process_batch().await;
            sleep(self.config.input_poll).await;
        }
    }

    /// Drains every queued event and commits the resulting transport changes.
    /// Returns the number of events handled.
    pub async fn process_batch(&mut self) -> usize {
        let mut controls = Controls::from_transport(&self.store.transport());
        let mut handled = 0;
        loop {
            let event = match self.events.try_recv() {
                Ok(event) => event,
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            };
            handled += 1;
            let Some(key) = Key::from_key_number(event.key_number) else {
                debug!(key_number = event.key_number, "ignoring unknown key");
                continue;
            };
            match event.state {
                KeyState::Pressed => self.press(key, &mut controls).await,
                KeyState::Released => self.release(key).await,
            }
        }
        if handled > 0 {
            self.store.commit(controls);
        }
        handled
    }

    async fn press(&mut self, key: Key, controls: &mut Controls) {
        debug!(?key, "key pressed");
        if let Key::Note(semitone) = key {
            let pitch = semitone + controls.octave * 12;
            let velocity = self.config.live_velocity;
            let channel = self.store.channel(controls.track);
            let previous = self.held[semitone as usize].replace((pitch, channel));
            if let Some((held, held_channel)) = previous {
                self.store.release_note(held, held_channel);
            }
            self.store.hold_note(pitch, channel);
            self.midi.note_on(pitch, velocity, channel).await;
            if controls.recording {
                self.store
                    .update_current_step(controls.track, |_| Step::note(pitch, velocity));
            }
            return;
        }

        controls.redraw = true;
        match key {
            Key::Record if self.modifier1 => self.store.reset_track(controls.track),
            Key::Record if controls.external_sync => controls.external_sync = false,
            Key::Record => controls.recording = !controls.recording,
            Key::StepInput if controls.external_sync => {
                self.store.step_forward();
            }
            Key::StepInput => controls.external_sync = true,
            Key::Length if self.modifier1 => controls.next_subdivision(),
            Key::Length if controls.recording => {
                self.store
                    .update_current_step(controls.track, Step::with_next_length);
            }
            Key::Articulation if controls.recording => {
                self.store
                    .update_current_step(controls.track, Step::with_next_articulation);
            }
            Key::Up | Key::Down => self.adjust(key == Key::Up, controls),
            Key::Modifier1 => self.modifier1 = true,
            Key::Modifier2 => self.modifier2 = true,
            _ => {}
        }
    }

    fn adjust(&mut self, up: bool, controls: &mut Controls) {
        match (self.modifier1, self.modifier2, controls.recording, up) {
            (true, _, _, true) => controls.octave_up(),
            (true, _, _, false) => controls.octave_down(),
            (false, true, _, up) => {
                self.store.adjust_channel(controls.track, up);
            }
            (false, false, false, true) => controls.tempo_up(),
            (false, false, false, false) => controls.tempo_down(),
            (false, false, true, true) => controls.track_up(),
            (false, false, true, false) => controls.track_down(),
        }
    }

    async fn release(&mut self, key: Key) {
        match key {
            Key::Note(semitone) => {
                if let Some((pitch, channel)) = self.held[semitone as usize].take() {
                    self.store.release_note(pitch, channel);
                    self.midi.note_off(pitch, channel).await;
                }
            }
            Key::Modifier1 => self.modifier1 = false,
            Key::Modifier2 => self.modifier2 = false,
            _ => {}
        }
    }
}
