/// Instrument runtime - runs playback, input and display side by side on one
/// single-threaded executor and silences everything on the way out
use std::future::Future;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::Notify;
use tracing::info;

use crate::config::Config;
use crate::display::{DisplayRenderer, Screen};
use crate::error::Result;
use crate::input::{InputHandler, KeyEvent};
use crate::midi::MidiTransmitter;
use crate::sequencer::playback::{PlaybackEngine, SyncInput};
use crate::sequencer::SequencerStore;

pub struct Instrument<S> {
    store: Arc<SequencerStore>,
    midi: Arc<MidiTransmitter>,
    playback: PlaybackEngine,
    input: InputHandler,
    display: DisplayRenderer<S>,
}

impl<S: Screen + 'static> Instrument<S> {
    pub fn new(
        store: Arc<SequencerStore>,
        midi: Arc<MidiTransmitter>,
        sync: Arc<dyn SyncInput>,
        screen: S,
        keys: UnboundedReceiver<KeyEvent>,
        config: Config,
    ) -> Self {
        let playback = PlaybackEngine::new(
            Arc::clone(&store),
            Arc::clone(&midi),
            sync,
            config.clone(),
        );
        let input = InputHandler::new(Arc::clone(&store), Arc::clone(&midi), keys, config.clone());
        let display = DisplayRenderer::new(Arc::clone(&store), screen, config);
        Self {
            store,
            midi,
            playback,
            input,
            display,
        }
    }

    /// Runs the three tasks until `shutdown` completes, then sends note-off
    /// for everything that may still be sounding.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let Instrument {
            store,
            midi,
            playback,
            input,
            display,
        } = self;

        info!("sequencer running");
        tokio::select! {
            _ = async { tokio::join!(playback.run(), input.run(), display.run()) } => {}
            _ = shutdown => info!("shutting down"),
        }

        midi.all_notes_off(store.sounding_notes()).await;
        info!("all notes off");
    }

    /// Starts the instrument on its own thread with a current-thread runtime.
    /// It stops after `shutdown` is notified.
    pub fn spawn(self, shutdown: Arc<Notify>) -> Result<JoinHandle<()>> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()?;
        let handle = thread::Builder::new()
            .name("sequencer".to_string())
            .spawn(move || {
                runtime.block_on(self.run_until(async move { shutdown.notified().await }))
            })?;
        Ok(handle)
    }
}
