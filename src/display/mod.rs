/// Status display - renders transport state onto a small text screen
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::sleep;
use tracing::info;

use crate::config::Config;
use crate::midi::midi_note_name;
use crate::sequencer::{
    DisplaySnapshot, SequencerStore, MAX_LENGTH, MAX_SUBDIVISION, PATTERN_LENGTH, TRACK_COUNT,
};

pub const SCREEN_WIDTH: u16 = 128;
pub const SCREEN_HEIGHT: u16 = 64;

/// A monochrome text screen, drawn in full and then shown.
pub trait Screen: Send {
    fn clear(&mut self);
    fn text(&mut self, x: u16, y: u16, text: &str);
    fn show(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: u16,
    pub y: u16,
    pub text: String,
}

impl TextLine {
    fn new(x: u16, y: u16, text: impl Into<String>) -> Self {
        Self {
            x,
            y,
            text: text.into(),
        }
    }
}

/// Lines of the recording layout.
pub fn recording_layout(snapshot: &DisplaySnapshot) -> Vec<TextLine> {
    let transport = &snapshot.transport;
    let step = &snapshot.step;
    let note = match step.pitch {
        Some(pitch) => format!(
            "Note: {} ({}) {}",
            midi_note_name(pitch),
            1u32 << step.length.min(MAX_LENGTH),
            step.articulation.label()
        ),
        None => "Note: -".to_string(),
    };

    let mut lines = vec![
        header(snapshot),
        TextLine::new(0, 10, format!("OCT: {}", transport.octave)),
        TextLine::new(0, 20, format!("STP: {}/{}", transport.step + 1, PATTERN_LENGTH)),
        TextLine::new(
            0,
            30,
            format!(
                "TRK: {}/{} (CH{})",
                transport.track + 1,
                TRACK_COUNT,
                snapshot.channel + 1
            ),
        ),
        TextLine::new(0, 40, note),
        TextLine::new(100, 0, "REC"),
    ];
    if transport.external_sync {
        lines.push(TextLine::new(100, 10, "ST"));
    }
    lines
}

/// Lines of the playing layout.
pub fn playing_layout(snapshot: &DisplaySnapshot) -> Vec<TextLine> {
    let mut lines = vec![header(snapshot), TextLine::new(100, 0, "PLA")];
    if snapshot.transport.external_sync {
        lines.push(TextLine::new(100, 10, "ST"));
    }
    lines
}

fn header(snapshot: &DisplaySnapshot) -> TextLine {
    let transport = &snapshot.transport;
    TextLine::new(
        0,
        0,
        format!(
            "BPM: {} NPB: {}",
            transport.tempo,
            1u32 << transport.subdivision.min(MAX_SUBDIVISION)
        ),
    )
}

pub struct DisplayRenderer<S> {
    store: Arc<SequencerStore>,
    screen: S,
    config: Config,
    drawn_generation: u64,
}

impl<S: Screen> DisplayRenderer<S> {
    pub fn new(store: Arc<SequencerStore>, screen: S, config: Config) -> Self {
        Self {
            store,
            screen,
            config,
            drawn_generation: 0,
        }
    }

    pub async fn run(mut self) {
        loop {
            self.refresh();
            sleep(self.config.display_refresh).await;
        }
    }

    /// Draws one frame if needed. Returns whether the screen was repainted.
    pub fn refresh(&mut self) -> bool {
        let snapshot = self.store.display_snapshot();
        let lines = if snapshot.transport.recording {
            recording_layout(&snapshot)
        } else if snapshot.redraw_generation != self.drawn_generation {
            playing_layout(&snapshot)
        } else {
            return false;
        };

        self.screen.clear();
        for line in &lines {
            self.screen.text(line.x, line.y, &line.text);
        }
        self.screen.show();
        self.drawn_generation = snapshot.redraw_generation;
        true
    }
}

/// Screen contents shared with a front panel that paints them.
#[derive(Clone, Default)]
pub struct SharedScreen {
    drawing: Vec<TextLine>,
    shown: Arc<Mutex<Vec<TextLine>>>,
}

impl SharedScreen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<TextLine> {
        self.shown.lock().clone()
    }
}

impl Screen for SharedScreen {
    fn clear(&mut self) {
        self.drawing.clear();
    }

    fn text(&mut self, x: u16, y: u16, text: &str) {
        self.drawing.push(TextLine::new(x, y, text));
    }

    fn show(&mut self) {
        *self.shown.lock() = self.drawing.clone();
    }
}

/// Writes every shown frame to the log, for units running without a panel.
#[derive(Default)]
pub struct LogScreen {
    drawing: Vec<String>,
}

impl Screen for LogScreen {
    fn clear(&mut self) {
        self.drawing.clear();
    }

    fn text(&mut self, _x: u16, _y: u16, text: &str) {
        self.drawing.push(text.to_string());
    }

    fn show(&mut self) {
        info!(screen = %self.drawing.join(" | "), "display");
    }
}
