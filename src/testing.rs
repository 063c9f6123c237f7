/// Fakes shared by the unit tests
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::display::Screen;
use crate::error::{Error, Result};
use crate::midi::MidiSink;

/// Records every frame it receives together with the (virtual) time of arrival.
#[derive(Clone)]
pub struct RecordingSink {
    frames: Arc<Mutex<Vec<(Instant, Vec<u8>)>>>,
    bytes: Arc<Mutex<Vec<u8>>>,
    bytewise: bool,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self {
            frames: Arc::new(Mutex::new(Vec::new())),
            bytes: Arc::new(Mutex::new(Vec::new())),
            bytewise: false,
        }
    }

    /// Pushes one byte at a time and yields the thread in between, like a
    /// slow UART would.
    pub fn bytewise() -> Self {
        Self {
            bytewise: true,
            ..Self::new()
        }
    }

    pub fn frames(&self) -> Vec<[u8; 3]> {
        self.timed_frames().into_iter().map(|(_, f)| f).collect()
    }

    pub fn timed_frames(&self) -> Vec<(Instant, [u8; 3])> {
        self.frames
            .lock()
            .iter()
            .map(|(at, f)| (*at, [f[0], f[1], f[2]]))
            .collect()
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.bytes.lock().clone()
    }
}

impl MidiSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        if self.bytewise {
            for byte in frame {
                self.bytes.lock().push(*byte);
                std::thread::yield_now();
            }
        } else {
            self.bytes.lock().extend_from_slice(frame);
        }
        self.frames.lock().push((Instant::now(), frame.to_vec()));
        Ok(())
    }
}

pub struct FailingSink;

impl MidiSink for FailingSink {
    fn name(&self) -> &str {
        "failing"
    }

    fn write(&mut self, _frame: &[u8]) -> Result<()> {
        Err(Error::MidiSend("link down".to_string()))
    }
}

/// Keeps the text of every shown frame.
#[derive(Clone, Default)]
pub struct RecordingScreen {
    pending: Arc<Mutex<Vec<(u16, u16, String)>>>,
    shown: Arc<Mutex<Vec<Vec<(u16, u16, String)>>>>,
}

impl RecordingScreen {
    pub fn shown(&self) -> Vec<Vec<(u16, u16, String)>> {
        self.shown.lock().clone()
    }
}

impl Screen for RecordingScreen {
    fn clear(&mut self) {
        self.pending.lock().clear();
    }

    fn text(&mut self, x: u16, y: u16, text: &str) {
        self.pending.lock().push((x, y, text.to_string()));
    }

    fn show(&mut self) {
        let frame = self.pending.lock().clone();
        self.shown.lock().push(frame);
    }
}
