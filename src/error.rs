/// Error types for the sequencer engine and its transports
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("MIDI backend error: {0}")]
    MidiInit(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI send error: {0}")]
    MidiSend(String),

    #[error("MIDI output port {0} not found")]
    UnknownPort(usize),
}

impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiInit(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::MidiSend(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
