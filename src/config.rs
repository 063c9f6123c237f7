use std::time::Duration;

/// Compiled-in engine settings.
///
/// There is no configuration file; a unit runs with `Config::default()`.
#[derive(Debug, Clone)]
pub struct Config {
    /// Idle wait between two drained input batches.
    pub input_poll: Duration,
    /// How often playback re-checks the transport while recording.
    pub record_poll: Duration,
    /// Sampling interval of the external sync input.
    pub trigger_poll: Duration,
    /// Display refresh cadence.
    pub display_refresh: Duration,
    /// Velocity used for live key presses and recorded steps.
    pub live_velocity: u8,
    /// Client name announced to the MIDI backend.
    pub midi_client_name: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_poll: Duration::from_millis(10),
            record_poll: Duration::from_millis(33),
            trigger_poll: Duration::from_millis(1),
            display_refresh: Duration::from_millis(100),
            live_velocity: 127,
            midi_client_name: "gridseq".to_string(),
        }
    }
}
