#[cfg(feature = "gui")]
use eframe::egui;

#[cfg(feature = "gui")]
use gridseq::{
    display::{SCREEN_HEIGHT, SCREEN_WIDTH},
    input::KEY_COUNT,
    Config, Instrument, Key, KeyEvent, MidiPortSink, MidiTransmitter, SequencerStore,
    SharedScreen, Transport,
};
#[cfg(feature = "gui")]
use std::sync::atomic::{AtomicBool, Ordering};
#[cfg(feature = "gui")]
use std::sync::Arc;
#[cfg(feature = "gui")]
use std::thread::JoinHandle;
#[cfg(feature = "gui")]
use tokio::sync::{mpsc::UnboundedSender, Notify};

#[cfg(feature = "gui")]
fn main() -> Result<(), eframe::Error> {
    tracing_subscriber::fmt::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([560.0, 640.0])
            .with_title("GRIDSEQ - Step Sequencer"),
        ..Default::default()
    };

    eframe::run_native(
        "GRIDSEQ",
        options,
        Box::new(|_cc| match FrontPanel::new() {
            Ok(panel) => Ok(Box::new(panel)),
            Err(e) => Err(Box::new(e)),
        }),
    )
}

/// Without a window the unit plays its demo pattern on the first MIDI port
/// and logs the display until Ctrl-C.
#[cfg(not(feature = "gui"))]
fn main() -> gridseq::Result<()> {
    use gridseq::{
        Config, Instrument, LogScreen, MidiPortSink, MidiTransmitter, SequencerStore, Transport,
    };
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use tokio::sync::mpsc::unbounded_channel;
    use tracing::warn;

    tracing_subscriber::fmt::init();

    let config = Config::default();
    let store = Arc::new(SequencerStore::with_demo_pattern());
    let midi = Arc::new(MidiTransmitter::disconnected());
    match MidiPortSink::connect(&config.midi_client_name, 0) {
        Ok(sink) => midi.replace_sink_blocking(Transport::Usb, Box::new(sink)),
        Err(e) => warn!(error = %e, "no MIDI output, running silent"),
    }

    let (_keys, events) = unbounded_channel();
    let instrument = Instrument::new(
        store,
        midi,
        Arc::new(AtomicBool::new(true)),
        LogScreen::default(),
        events,
        config,
    );

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    runtime.block_on(instrument.run_until(async {
        let _ = tokio::signal::ctrl_c().await;
    }));
    Ok(())
}

#[cfg(feature = "gui")]
const SEMITONES: [&str; 12] = ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"];

#[cfg(feature = "gui")]
const DISPLAY_SCALE: f32 = 3.0;

#[cfg(feature = "gui")]
struct FrontPanel {
    keys: UnboundedSender<KeyEvent>,
    key_down: [bool; KEY_COUNT],
    sync_level: Arc<AtomicBool>,
    screen: SharedScreen,
    midi: Arc<MidiTransmitter>,
    config: Config,
    shutdown: Arc<Notify>,
    engine: Option<JoinHandle<()>>,

    // UI state
    available_midi_ports: Vec<String>,
    selected_ports: [Option<usize>; 2],
}

#[cfg(feature = "gui")]
impl FrontPanel {
    fn new() -> gridseq::Result<Self> {
        let config = Config::default();
        let store = Arc::new(SequencerStore::with_demo_pattern());
        let midi = Arc::new(MidiTransmitter::disconnected());
        let sync_level = Arc::new(AtomicBool::new(true));
        let screen = SharedScreen::new();
        let (keys, events) = tokio::sync::mpsc::unbounded_channel();
        let shutdown = Arc::new(Notify::new());

        let instrument = Instrument::new(
            store,
            Arc::clone(&midi),
            sync_level.clone(),
            screen.clone(),
            events,
            config.clone(),
        );
        let engine = instrument.spawn(Arc::clone(&shutdown))?;

        Ok(Self {
            keys,
            key_down: [false; KEY_COUNT],
            sync_level,
            screen,
            midi,
            available_midi_ports: MidiPortSink::available_ports(&config.midi_client_name),
            config,
            shutdown,
            engine: Some(engine),
            selected_ports: [None, None],
        })
    }

    fn select_port(&mut self, transport: Transport, port_index: usize) {
        match MidiPortSink::connect(&self.config.midi_client_name, port_index) {
            Ok(sink) => {
                self.midi.replace_sink_blocking(transport, Box::new(sink));
                self.selected_ports[slot(transport)] = Some(port_index);
            }
            Err(e) => tracing::warn!(error = %e, "could not open MIDI port"),
        }
    }

    fn port_selector(&mut self, ui: &mut egui::Ui, transport: Transport, label: &str) {
        let mut selected_port_changed = None;
        let selected = self.selected_ports[slot(transport)];
        ui.label(label);
        egui::ComboBox::from_id_source(label)
            .selected_text(
                selected
                    .and_then(|i| self.available_midi_ports.get(i))
                    .map(|name| name.as_str())
                    .unwrap_or("Select port..."),
            )
            .show_ui(ui, |ui| {
                for (i, port_name) in self.available_midi_ports.iter().enumerate() {
                    if ui.selectable_label(selected == Some(i), port_name).clicked() {
                        selected_port_changed = Some(i);
                    }
                }
            });
        if let Some(i) = selected_port_changed {
            self.select_port(transport, i);
        }
    }

    fn draw_display(&self, ui: &mut egui::Ui) {
        let size = egui::vec2(
            SCREEN_WIDTH as f32 * DISPLAY_SCALE,
            SCREEN_HEIGHT as f32 * DISPLAY_SCALE,
        );
        let (rect, _) = ui.allocate_exact_size(size, egui::Sense::hover());
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 4.0, egui::Color32::BLACK);
        for line in self.screen.lines() {
            let offset = egui::vec2(line.x as f32, line.y as f32) * DISPLAY_SCALE;
            painter.text(
                rect.min + offset,
                egui::Align2::LEFT_TOP,
                &line.text,
                egui::FontId::monospace(8.0 * DISPLAY_SCALE),
                egui::Color32::WHITE,
            );
        }
    }

    fn send_key(&mut self, key_number: usize, down: bool) {
        if self.key_down[key_number] == down {
            return;
        }
        self.key_down[key_number] = down;
        let event = if down {
            KeyEvent::pressed(key_number as u8)
        } else {
            KeyEvent::released(key_number as u8)
        };
        let _ = self.keys.send(event);
    }
}

#[cfg(feature = "gui")]
fn slot(transport: Transport) -> usize {
    match transport {
        Transport::Serial => 0,
        Transport::Usb => 1,
    }
}

#[cfg(feature = "gui")]
fn key_label(key_number: usize) -> String {
    match Key::from_key_number(key_number as u8) {
        Some(Key::Note(semitone)) => SEMITONES[semitone as usize].to_string(),
        Some(Key::Record) => "REC".to_string(),
        Some(Key::StepInput) => "STEP".to_string(),
        Some(Key::Length) => "LEN".to_string(),
        Some(Key::Up) => "+".to_string(),
        Some(Key::Modifier1) => "M1".to_string(),
        Some(Key::Modifier2) => "M2".to_string(),
        Some(Key::Articulation) => "ART".to_string(),
        Some(Key::Down) => "-".to_string(),
        None => String::new(),
    }
}

#[cfg(feature = "gui")]
impl eframe::App for FrontPanel {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.request_repaint();

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("GRIDSEQ - Step Sequencer");
            ui.add_space(10.0);

            // MIDI Port Selection
            ui.horizontal(|ui| {
                self.port_selector(ui, Transport::Serial, "DIN:");
                ui.add_space(20.0);
                self.port_selector(ui, Transport::Usb, "USB:");
            });
            if self.available_midi_ports.is_empty() {
                ui.label("No MIDI ports available");
            }

            ui.add_space(10.0);
            self.draw_display(ui);
            ui.add_space(20.0);

            // Key matrix: 4 rows of 5, numbered in scan order
            for row in 0..4 {
                ui.horizontal(|ui| {
                    for column in 0..5 {
                        let key_number = row * 5 + column;
                        let button = egui::Button::new(key_label(key_number))
                            .min_size(egui::vec2(80.0, 60.0));
                        let down = ui.add(button).is_pointer_button_down_on();
                        self.send_key(key_number, down);
                    }
                });
            }

            ui.add_space(10.0);
            ui.horizontal(|ui| {
                let sync = ui.add(egui::Button::new("SYNC").min_size(egui::vec2(80.0, 30.0)));
                self.sync_level
                    .store(!sync.is_pointer_button_down_on(), Ordering::Relaxed);
                ui.label("Hold M1 / M2 for the second and third key functions");
            });
        });
    }
}

#[cfg(feature = "gui")]
impl Drop for FrontPanel {
    fn drop(&mut self) {
        self.shutdown.notify_one();
        if let Some(engine) = self.engine.take() {
            let _ = engine.join();
        }
    }
}
