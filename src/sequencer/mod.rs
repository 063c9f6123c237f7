/// Sequence store - tracks, steps and transport state shared by every task
/// All access goes through short critical sections on one lock
use parking_lot::Mutex;
pub mod playback;

pub const PATTERN_LENGTH: usize = 16;
pub const TRACK_COUNT: usize = 4;
pub const MAX_TEMPO: u16 = 240;
pub const MAX_OCTAVE: u8 = 9;
pub const MAX_CHANNEL: u8 = 15;
pub const MAX_LENGTH: u8 = 4;
pub const MAX_SUBDIVISION: u8 = 4;

const DEMO_PATTERN: [u8; PATTERN_LENGTH] = [
    28, 40, 52, 28, 40, 50, 28, 40, 48, 28, 40, 46, 28, 40, 47, 48,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Articulation {
    #[default]
    Normal,
    Doublet,
    Triplet,
}

impl Articulation {
    /// Number of note pulses sounded within the step's duration.
    pub fn pulses(self) -> u32 {
        match self {
            Articulation::Normal => 1,
            Articulation::Doublet => 2,
            Articulation::Triplet => 3,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Articulation::Normal => Articulation::Doublet,
            Articulation::Doublet => Articulation::Triplet,
            Articulation::Triplet => Articulation::Normal,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Articulation::Normal => "-",
            Articulation::Doublet => "D",
            Articulation::Triplet => "T",
        }
    }
}

/// One slot of a track. Edits build a new value and replace the old one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Step {
    pub pitch: Option<u8>,
    pub velocity: u8,
    pub length: u8,
    pub articulation: Articulation,
}

impl Step {
    pub const EMPTY: Step = Step {
        pitch: None,
        velocity: 0,
        length: 0,
        articulation: Articulation::Normal,
    };

    pub fn note(pitch: u8, velocity: u8) -> Self {
        Self {
            pitch: Some(pitch.min(127)),
            velocity: velocity.min(127),
            length: 0,
            articulation: Articulation::Normal,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pitch.is_none()
    }

    /// Clamps every field into its stored range.
    pub fn normalized(self) -> Self {
        Self {
            pitch: self.pitch.map(|pitch| pitch.min(127)),
            velocity: self.velocity.min(127),
            length: self.length.min(MAX_LENGTH),
            ..self
        }
    }

    pub fn with_next_length(self) -> Self {
        Self {
            length: wrap_up(self.length, MAX_LENGTH),
            ..self
        }
    }

    pub fn with_next_articulation(self) -> Self {
        Self {
            articulation: self.articulation.next(),
            ..self
        }
    }
}

#[derive(Debug, Clone)]
struct Track {
    steps: [Step; PATTERN_LENGTH],
    channel: u8,
    last_pitch: Option<u8>,
}

impl Track {
    fn new() -> Self {
        Self {
            steps: [Step::EMPTY; PATTERN_LENGTH],
            channel: 0,
            last_pitch: None,
        }
    }

    fn clear(&mut self) {
        self.steps = [Step::EMPTY; PATTERN_LENGTH];
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportState {
    pub tempo: u16,
    pub subdivision: u8,
    pub step: usize,
    pub track: usize,
    pub recording: bool,
    pub external_sync: bool,
    pub octave: u8,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            tempo: 120,
            subdivision: 2,
            step: 0,
            track: 0,
            recording: false,
            external_sync: false,
            octave: 5,
        }
    }
}

/// Transport fields owned by the input handler, committed once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub tempo: u16,
    pub subdivision: u8,
    pub track: usize,
    pub recording: bool,
    pub external_sync: bool,
    pub octave: u8,
    pub redraw: bool,
}

impl Controls {
    pub fn from_transport(transport: &TransportState) -> Self {
        Self {
            tempo: transport.tempo,
            subdivision: transport.subdivision,
            track: transport.track,
            recording: transport.recording,
            external_sync: transport.external_sync,
            octave: transport.octave,
            redraw: false,
        }
    }

    pub fn tempo_up(&mut self) {
        self.tempo = (self.tempo + 1).min(MAX_TEMPO);
    }

    pub fn tempo_down(&mut self) {
        self.tempo = self.tempo.saturating_sub(1);
    }

    pub fn octave_up(&mut self) {
        self.octave = wrap_up(self.octave, MAX_OCTAVE);
    }

    pub fn octave_down(&mut self) {
        self.octave = wrap_down(self.octave, MAX_OCTAVE);
    }

    pub fn track_up(&mut self) {
        self.track = (self.track + 1) % TRACK_COUNT;
    }

    pub fn track_down(&mut self) {
        self.track = (self.track + TRACK_COUNT - 1) % TRACK_COUNT;
    }

    pub fn next_subdivision(&mut self) {
        self.subdivision = wrap_up(self.subdivision, MAX_SUBDIVISION);
    }
}

/// Every track's step at one cursor position, read in a single critical section.
#[derive(Debug, Clone, Copy)]
pub struct StepFrame {
    pub transport: TransportState,
    pub notes: [(Step, u8); TRACK_COUNT],
}

#[derive(Debug, Clone, Copy)]
pub struct DisplaySnapshot {
    pub transport: TransportState,
    pub step: Step,
    pub channel: u8,
    pub redraw_generation: u64,
}

struct State {
    tracks: Vec<Track>,
    transport: TransportState,
    redraw_generation: u64,
    /// (pitch, channel) of live notes whose key is still down.
    held_notes: Vec<(u8, u8)>,
}

pub struct SequencerStore {
    state: Mutex<State>,
}

impl SequencerStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tracks: (0..TRACK_COUNT).map(|_| Track::new()).collect(),
                transport: TransportState::default(),
                redraw_generation: 1,
                held_notes: Vec::new(),
            }),
        }
    }

    /// A store whose first track holds the factory demo riff.
    pub fn with_demo_pattern() -> Self {
        let store = Self::new();
        for (index, pitch) in DEMO_PATTERN.iter().enumerate() {
            store.set_step(0, index, Step::note(*pitch, 127));
        }
        store
    }

    pub fn transport(&self) -> TransportState {
        self.state.lock().transport
    }

    /// Step at `(track, index)`; out-of-range coordinates read as empty.
    pub fn step(&self, track: usize, index: usize) -> Step {
        let state = self.state.lock();
        state
            .tracks
            .get(track)
            .and_then(|t| t.steps.get(index))
            .copied()
            .unwrap_or(Step::EMPTY)
    }

    pub fn current_step(&self, track: usize) -> Step {
        let state = self.state.lock();
        let index = state.transport.step;
        state
            .tracks
            .get(track)
            .map_or(Step::EMPTY, |t| t.steps[index])
    }

    pub fn channel(&self, track: usize) -> u8 {
        self.state
            .lock()
            .tracks
            .get(track)
            .map_or(0, |t| t.channel)
    }

    /// Writes a step, clamped into range. Out-of-range coordinates are ignored.
    pub fn set_step(&self, track: usize, index: usize, step: Step) {
        let mut state = self.state.lock();
        if let Some(track) = state.tracks.get_mut(track) {
            if let Some(slot) = track.steps.get_mut(index) {
                *slot = step.normalized();
            }
        }
    }

    /// Replaces the step under the cursor with `f(old)` and returns the new value.
    pub fn update_current_step<F>(&self, track: usize, f: F) -> Option<Step>
    where
        F: FnOnce(Step) -> Step,
    {
        let mut state = self.state.lock();
        let index = state.transport.step;
        let slot = state.tracks.get_mut(track)?.steps.get_mut(index)?;
        *slot = f(*slot).normalized();
        Some(*slot)
    }

    pub fn reset_track(&self, track: usize) {
        if let Some(track) = self.state.lock().tracks.get_mut(track) {
            track.clear();
        }
    }

    /// Moves a track's channel one up or down, wrapping within 0..=15.
    pub fn adjust_channel(&self, track: usize, up: bool) -> Option<u8> {
        let mut state = self.state.lock();
        let track = state.tracks.get_mut(track)?;
        track.channel = if up {
            wrap_up(track.channel, MAX_CHANNEL)
        } else {
            wrap_down(track.channel, MAX_CHANNEL)
        };
        Some(track.channel)
    }

    /// Remembers a live note until its key is released.
    pub fn hold_note(&self, pitch: u8, channel: u8) {
        self.state.lock().held_notes.push((pitch, channel));
    }

    pub fn release_note(&self, pitch: u8, channel: u8) {
        let mut state = self.state.lock();
        if let Some(pos) = state.held_notes.iter().position(|n| *n == (pitch, channel)) {
            state.held_notes.swap_remove(pos);
        }
    }

    /// Moves the cursor one step forward without reading any step data.
    pub fn step_forward(&self) -> usize {
        let mut state = self.state.lock();
        state.transport.step = (state.transport.step + 1) % PATTERN_LENGTH;
        state.transport.step
    }

    /// Moves the cursor forward and returns every track's step at the new position.
    pub fn advance(&self) -> StepFrame {
        let mut state = self.state.lock();
        let index = (state.transport.step + 1) % PATTERN_LENGTH;
        state.transport.step = index;

        let mut notes = [(Step::EMPTY, 0); TRACK_COUNT];
        for (slot, track) in notes.iter_mut().zip(state.tracks.iter_mut()) {
            let step = track.steps[index];
            if step.pitch.is_some() {
                track.last_pitch = step.pitch;
            }
            *slot = (step, track.channel);
        }
        StepFrame {
            transport: state.transport,
            notes,
        }
    }

    /// Applies one input batch to the transport fields.
    pub fn commit(&self, controls: Controls) {
        let mut state = self.state.lock();
        let transport = &mut state.transport;
        transport.tempo = controls.tempo.min(MAX_TEMPO);
        transport.subdivision = controls.subdivision.min(MAX_SUBDIVISION);
        transport.track = controls.track % TRACK_COUNT;
        transport.recording = controls.recording;
        transport.external_sync = controls.external_sync;
        transport.octave = controls.octave.min(MAX_OCTAVE);
        if controls.redraw {
            state.redraw_generation += 1;
        }
    }

    pub fn display_snapshot(&self) -> DisplaySnapshot {
        let state = self.state.lock();
        let transport = state.transport;
        let track = &state.tracks[transport.track];
        DisplaySnapshot {
            transport,
            step: track.steps[transport.step],
            channel: track.channel,
            redraw_generation: state.redraw_generation,
        }
    }

    /// Every (pitch, channel) pair that may still be sounding: the pitches
    /// stored in each track, the last pitch each track played and every
    /// live note still held.
    pub fn sounding_notes(&self) -> Vec<(u8, u8)> {
        let state = self.state.lock();
        let mut notes: Vec<(u8, u8)> = state
            .tracks
            .iter()
            .flat_map(|track| {
                track
                    .steps
                    .iter()
                    .filter_map(|step| step.pitch)
                    .chain(track.last_pitch)
                    .map(move |pitch| (pitch, track.channel))
            })
            .chain(state.held_notes.iter().copied())
            .collect();
        notes.sort_unstable();
        notes.dedup();
        notes
    }
}

impl Default for SequencerStore {
    fn default() -> Self {
        Self::new()
    }
}

fn wrap_up(value: u8, max: u8) -> u8 {
    if value >= max {
        0
    } else {
        value + 1
    }
}

fn wrap_down(value: u8, max: u8) -> u8 {
    if value == 0 || value > max {
        max
    } else {
        value - 1
    }
}
