/// MIDI output - frame encoding and the transmitter shared by every task
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{trace, warn};

use crate::sequencer::{Articulation, Step};

pub mod sink;

pub use sink::{MidiPortSink, MidiSink, SerialSink};

const NOTE_NAMES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

/// Data bytes saturate at 127 so an oversized velocity never wraps into a note-off.
pub fn note_on_frame(pitch: u8, velocity: u8, channel: u8) -> [u8; 3] {
    [0x90 | (channel & 0x0F), pitch.min(127), velocity.min(127)]
}

pub fn note_off_frame(pitch: u8, channel: u8) -> [u8; 3] {
    [0x80 | (channel & 0x0F), pitch.min(127), 0]
}

/// Note name as printed on the unit's display, where pitch 60 is C3.
pub fn midi_note_name(note: u8) -> String {
    let octave = (note / 12) as i32 - 2;
    let note_index = (note % 12) as usize;
    format!("{}{}", NOTE_NAMES[note_index], octave)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// Wired DIN link.
    Serial,
    Usb,
}

struct Transports {
    serial: Box<dyn MidiSink>,
    usb: Box<dyn MidiSink>,
}

impl Transports {
    fn write(&mut self, frame: &[u8]) {
        for sink in [&mut self.serial, &mut self.usb] {
            if let Err(e) = sink.write(frame) {
                warn!(sink = sink.name(), error = %e, "dropping MIDI frame");
            }
        }
    }
}

/// Writes every frame to both transports under one lock, so frames from
/// different tasks never interleave on the wire.
pub struct MidiTransmitter {
    transports: Mutex<Transports>,
}

impl MidiTransmitter {
    pub fn new(serial: Box<dyn MidiSink>, usb: Box<dyn MidiSink>) -> Self {
        Self {
            transports: Mutex::new(Transports { serial, usb }),
        }
    }

    pub fn disconnected() -> Self {
        Self::new(
            Box::new(MidiPortSink::disconnected("din")),
            Box::new(MidiPortSink::disconnected("usb")),
        )
    }

    pub async fn send(&self, frame: [u8; 3]) {
        let mut transports = self.transports.lock().await;
        trace!(?frame, "midi out");
        transports.write(&frame);
    }

    pub async fn note_on(&self, pitch: u8, velocity: u8, channel: u8) {
        self.send(note_on_frame(pitch, velocity, channel)).await;
    }

    pub async fn note_off(&self, pitch: u8, channel: u8) {
        self.send(note_off_frame(pitch, channel)).await;
    }

    pub async fn replace_sink(&self, transport: Transport, sink: Box<dyn MidiSink>) {
        let mut transports = self.transports.lock().await;
        Self::swap(&mut transports, transport, sink);
    }

    /// Same as [`replace_sink`](Self::replace_sink), for threads outside the engine runtime.
    pub fn replace_sink_blocking(&self, transport: Transport, sink: Box<dyn MidiSink>) {
        let mut transports = self.transports.blocking_lock();
        Self::swap(&mut transports, transport, sink);
    }

    fn swap(transports: &mut Transports, transport: Transport, sink: Box<dyn MidiSink>) {
        match transport {
            Transport::Serial => transports.serial = sink,
            Transport::Usb => transports.usb = sink,
        }
    }

    /// Note-on, hold for `duration`, note-off.
    pub async fn play_note(&self, pitch: u8, velocity: u8, duration: Duration, channel: u8) {
        self.note_on(pitch, velocity, channel).await;
        sleep(duration).await;
        self.note_off(pitch, channel).await;
    }

    /// Splits `duration` into `pulses` equal slices, each sounding for 90% of
    /// its slice followed by a 10% gap. No gap follows the last pulse.
    pub async fn play_pulses(
        &self,
        pitch: u8,
        velocity: u8,
        duration: Duration,
        channel: u8,
        pulses: u32,
    ) {
        let slice = duration / pulses.max(1);
        let hold = slice * 9 / 10;
        let gap = slice - hold;
        for pulse in 0..pulses {
            self.note_on(pitch, velocity, channel).await;
            sleep(hold).await;
            self.note_off(pitch, channel).await;
            if pulse + 1 < pulses {
                sleep(gap).await;
            }
        }
    }

    /// Sounds one step for `duration` using its articulation.
    pub async fn play_step(&self, step: Step, channel: u8, duration: Duration) {
        let Some(pitch) = step.pitch else {
            return;
        };
        match step.articulation {
            Articulation::Normal => self.play_note(pitch, step.velocity, duration, channel).await,
            articulation => {
                self.play_pulses(pitch, step.velocity, duration, channel, articulation.pulses())
                    .await
            }
        }
    }

    /// Sends note-off for every (pitch, channel) pair concurrently and waits for all of them.
    pub async fn all_notes_off(self: &Arc<Self>, notes: Vec<(u8, u8)>) {
        let mut sweep = JoinSet::new();
        for (pitch, channel) in notes {
            let midi = Arc::clone(self);
            sweep.spawn(async move { midi.note_off(pitch, channel).await });
        }
        while sweep.join_next().await.is_some() {}
    }
}

impl Default for MidiTransmitter {
    fn default() -> Self {
        Self::disconnected()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingSink, RecordingSink};
    use tokio::time::Instant;

    fn transmitter() -> (Arc<MidiTransmitter>, RecordingSink, RecordingSink) {
        let serial = RecordingSink::new();
        let usb = RecordingSink::new();
        let midi = MidiTransmitter::new(Box::new(serial.clone()), Box::new(usb.clone()));
        (Arc::new(midi), serial, usb)
    }

    #[test]
    fn test_frame_encoding() {
        assert_eq!(note_on_frame(60, 127, 0), [0x90, 60, 127]);
        assert_eq!(note_on_frame(60, 100, 15), [0x9F, 60, 100]);
        assert_eq!(note_off_frame(64, 3), [0x83, 64, 0]);
        assert_eq!(note_on_frame(200, 200, 17), [0x91, 127, 127]);
        assert_eq!(note_on_frame(60, 128, 0), [0x90, 60, 127]);
        assert_eq!(note_off_frame(200, 0), [0x80, 127, 0]);
    }

    #[test]
    fn test_note_names() {
        assert_eq!(midi_note_name(60), "C3");
        assert_eq!(midi_note_name(28), "E0");
        assert_eq!(midi_note_name(13), "C#-1");
    }

    #[tokio::test]
    async fn test_both_transports_get_identical_frames() {
        let (midi, serial, usb) = transmitter();
        midi.note_on(60, 127, 2).await;
        midi.note_off(60, 2).await;
        assert_eq!(serial.frames(), vec![[0x92, 60, 127], [0x82, 60, 0]]);
        assert_eq!(serial.frames(), usb.frames());
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_block_other_transport() {
        let usb = RecordingSink::new();
        let midi = MidiTransmitter::new(Box::new(FailingSink), Box::new(usb.clone()));
        midi.note_on(48, 90, 0).await;
        midi.note_on(50, 90, 0).await;
        assert_eq!(usb.frames().len(), 2);
    }

    #[tokio::test]
    async fn test_replace_sink() {
        let (midi, serial, _usb) = transmitter();
        let replacement = RecordingSink::new();
        midi.replace_sink(Transport::Serial, Box::new(replacement.clone()))
            .await;
        midi.note_on(60, 1, 0).await;
        assert!(serial.frames().is_empty());
        assert_eq!(replacement.frames(), vec![[0x90, 60, 1]]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_senders_keep_transports_in_step() {
        let serial = RecordingSink::bytewise();
        let usb = RecordingSink::bytewise();
        let midi = Arc::new(MidiTransmitter::new(
            Box::new(serial.clone()),
            Box::new(usb.clone()),
        ));

        let mut senders = JoinSet::new();
        for channel in 0..8u8 {
            let midi = Arc::clone(&midi);
            senders.spawn(async move {
                for pitch in 0..50u8 {
                    midi.note_on(pitch, 100, channel).await;
                    midi.note_off(pitch, channel).await;
                }
            });
        }
        while senders.join_next().await.is_some() {}

        let frames = serial.frames();
        assert_eq!(frames.len(), 8 * 50 * 2);
        assert_eq!(frames, usb.frames());
        assert_eq!(serial.bytes(), usb.bytes());

        // each sender's frames arrive in the order it sent them
        for channel in 0..8u8 {
            let own: Vec<[u8; 3]> = frames
                .iter()
                .filter(|f| f[0] & 0x0F == channel)
                .copied()
                .collect();
            let expected: Vec<[u8; 3]> = (0..50u8)
                .flat_map(|pitch| {
                    [
                        note_on_frame(pitch, 100, channel),
                        note_off_frame(pitch, channel),
                    ]
                })
                .collect();
            assert_eq!(own, expected);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_play_note_holds_for_duration() {
        let (midi, serial, _) = transmitter();
        let start = Instant::now();
        midi.play_note(60, 127, Duration::from_millis(62), 0).await;

        let sent = serial.timed_frames();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].1, [0x90, 60, 127]);
        assert_eq!(sent[1].1, [0x80, 60, 0]);
        assert_eq!(sent[0].0 - start, Duration::ZERO);
        assert_eq!(sent[1].0 - sent[0].0, Duration::from_millis(62));
    }

    #[tokio::test(start_paused = true)]
    async fn test_triplet_split() {
        let (midi, serial, _) = transmitter();
        let step = Step {
            articulation: Articulation::Triplet,
            ..Step::note(60, 127)
        };
        midi.play_step(step, 0, Duration::from_millis(120)).await;

        let sent = serial.timed_frames();
        assert_eq!(sent.len(), 6);
        for pair in sent.chunks(2) {
            assert_eq!(pair[0].1[0], 0x90);
            assert_eq!(pair[1].1[0], 0x80);
            assert_eq!(pair[1].0 - pair[0].0, Duration::from_millis(36));
        }
        assert_eq!(sent[2].0 - sent[1].0, Duration::from_millis(4));
        assert_eq!(sent[4].0 - sent[3].0, Duration::from_millis(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_doublet_split() {
        let (midi, serial, _) = transmitter();
        let step = Step {
            articulation: Articulation::Doublet,
            ..Step::note(40, 80)
        };
        midi.play_step(step, 1, Duration::from_millis(100)).await;

        let sent = serial.timed_frames();
        assert_eq!(sent.len(), 4);
        assert_eq!(sent[1].0 - sent[0].0, Duration::from_millis(45));
        assert_eq!(sent[2].0 - sent[1].0, Duration::from_millis(5));
        assert_eq!(sent[3].0 - sent[2].0, Duration::from_millis(45));
    }

    #[tokio::test]
    async fn test_empty_step_is_silent() {
        let (midi, serial, _) = transmitter();
        midi.play_step(Step::EMPTY, 0, Duration::from_millis(10)).await;
        assert!(serial.frames().is_empty());
    }

    #[tokio::test]
    async fn test_all_notes_off_sends_every_pair() {
        let (midi, serial, usb) = transmitter();
        midi.all_notes_off(vec![(28, 0), (40, 0), (60, 3)]).await;

        let mut frames = serial.frames();
        frames.sort();
        assert_eq!(frames, vec![[0x80, 28, 0], [0x80, 40, 0], [0x83, 60, 0]]);
        assert_eq!(usb.frames().len(), 3);
    }
}
