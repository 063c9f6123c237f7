/// Byte sinks for outgoing MIDI frames
use std::io::Write;

use midir::{MidiOutput, MidiOutputConnection};
use tracing::info;

use crate::error::{Error, Result};

/// An opaque transport that accepts complete MIDI frames.
///
/// Writes are fire-and-forget: an error means the frame was lost for this
/// transport only.
pub trait MidiSink: Send {
    fn name(&self) -> &str;
    fn write(&mut self, frame: &[u8]) -> Result<()>;
}

/// A MIDI output port (USB-class device or virtual port) opened through midir.
///
/// A disconnected port discards frames without error.
pub struct MidiPortSink {
    label: String,
    connection: Option<MidiOutputConnection>,
}

impl MidiPortSink {
    pub fn disconnected(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            connection: None,
        }
    }

    pub fn available_ports(client_name: &str) -> Vec<String> {
        if let Ok(midi_out) = MidiOutput::new(client_name) {
            midi_out
                .ports()
                .iter()
                .filter_map(|p| midi_out.port_name(p).ok())
                .collect()
        } else {
            vec![]
        }
    }

    pub fn connect(client_name: &str, port_index: usize) -> Result<Self> {
        let midi_out = MidiOutput::new(client_name)?;

        let ports = midi_out.ports();
        let port = ports
            .get(port_index)
            .ok_or(Error::UnknownPort(port_index))?;
        let label = midi_out
            .port_name(port)
            .unwrap_or_else(|_| format!("port {}", port_index));

        let connection = midi_out.connect(port, client_name)?;
        info!(port = %label, "connected MIDI output");

        Ok(Self {
            label,
            connection: Some(connection),
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }
}

impl MidiSink for MidiPortSink {
    fn name(&self) -> &str {
        &self.label
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        if let Some(ref mut conn) = self.connection {
            conn.send(frame)?;
        }
        Ok(())
    }
}

/// A wired DIN link driven through any byte writer (UART, tty device).
pub struct SerialSink<W> {
    label: String,
    writer: W,
}

impl<W: Write + Send> SerialSink<W> {
    pub fn new(label: impl Into<String>, writer: W) -> Self {
        Self {
            label: label.into(),
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MidiSink for SerialSink<W> {
    fn name(&self) -> &str {
        &self.label
    }

    fn write(&mut self, frame: &[u8]) -> Result<()> {
        self.writer.write_all(frame)?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_port_discards() {
        let mut sink = MidiPortSink::disconnected("usb");
        assert!(!sink.is_connected());
        assert!(sink.write(&[0x90, 60, 127]).is_ok());
        assert_eq!(sink.name(), "usb");
    }

    #[test]
    fn test_serial_sink_writes_frame_bytes() {
        let mut sink = SerialSink::new("din", Vec::new());
        sink.write(&[0x91, 64, 100]).unwrap();
        sink.write(&[0x81, 64, 0]).unwrap();
        assert_eq!(sink.into_inner(), vec![0x91, 64, 100, 0x81, 64, 0]);
    }
}
