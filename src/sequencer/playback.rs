/// Playback engine - advances the step cursor and sounds every track's step
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, trace};

use super::{SequencerStore, MAX_LENGTH, MAX_SUBDIVISION};
use crate::config::Config;
use crate::midi::MidiTransmitter;

/// Level of the external sync jack. High is idle; a high-to-low transition
/// is one trigger.
pub trait SyncInput: Send + Sync {
    fn level(&self) -> bool;
}

impl SyncInput for AtomicBool {
    fn level(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

/// Length of one step in milliseconds. Tempo is floored to 1 BPM.
pub fn beat_slice_ms(tempo: u16, subdivision: u8) -> u64 {
    60_000 / u64::from(tempo.max(1)) / (1 << subdivision.min(MAX_SUBDIVISION))
}

pub fn note_duration_ms(beat_slice_ms: u64, length: u8) -> u64 {
    beat_slice_ms >> length.min(MAX_LENGTH)
}

pub struct PlaybackEngine {
    store: Arc<SequencerStore>,
    midi: Arc<MidiTransmitter>,
    sync: Arc<dyn SyncInput>,
    config: Config,
}

impl PlaybackEngine {
    pub fn new(
        store: Arc<SequencerStore>,
        midi: Arc<MidiTransmitter>,
        sync: Arc<dyn SyncInput>,
        config: Config,
    ) -> Self {
        Self {
            store,
            midi,
            sync,
            config,
        }
    }

    pub async fn run(self) {
        loop {
            self.cycle().await;
        }
    }

    /// One playback cycle. Returns the step that was played, or `None` while
    /// recording holds the cursor.
    pub async fn cycle(&self) -> Option<usize> {
        if self.store.transport().recording {
            sleep(self.config.record_poll).await;
            return None;
        }

        let frame = self.store.advance();
        let transport = frame.transport;
        let slice_ms = beat_slice_ms(transport.tempo, transport.subdivision);
        debug!(step = transport.step, slice_ms, "advance");

        let mut batch = JoinSet::new();
        for (step, channel) in frame.notes {
            if step.is_empty() {
                continue;
            }
            let midi = Arc::clone(&self.midi);
            let duration = Duration::from_millis(note_duration_ms(slice_ms, step.length));
            batch.spawn(async move { midi.play_step(step, channel, duration).await });
        }

        if transport.external_sync {
            batch.spawn(wait_for_trigger(
                Arc::clone(&self.store),
                Arc::clone(&self.sync),
                self.config.trigger_poll,
            ));
        } else {
            batch.spawn(sleep(Duration::from_millis(slice_ms)));
        }

        while batch.join_next().await.is_some() {}
        Some(transport.step)
    }
}

/// Waits for a falling edge on the sync input. Returns early once
/// external sync is switched off.
pub async fn wait_for_trigger(
    store: Arc<SequencerStore>,
    sync: Arc<dyn SyncInput>,
    poll: Duration,
) {
    let mut previous = sync.level();
    loop {
        let current = sync.level();
        if !current && previous {
            trace!("external trigger");
            return;
        }
        if !store.transport().external_sync {
            return;
        }
        sleep(poll).await;
        previous = current;
    }
}
