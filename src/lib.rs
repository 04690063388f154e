//! Chip sound engines for a chiptune tracker
//!
//! A song is arranged from channel patterns; each note triggers a small
//! per-instrument program that drives emulated sound-chip oscillators tick by
//! tick. Three interchangeable backends share one contract ([`ChipBackend`]):
//!
//! - `LFT`: simple 4-oscillator engine, direct per-sample evaluation
//! - `P1XL`: band-limited multi-table engine (edge/delta synthesis, FIR filters,
//!   volume/duty/pan/wave tables)
//! - `BV`: register-level engine with a bit-packed prefix-coded instruction set
//!   driving SID-style voices
//!
//! Every backend ends its mix with the shared echo post-filter
//! ([`engine::echo::Expander`]).
//!
//! # Crate feature flags
//! - `export` (default): WAV rendering (`hound`) and CSV tick traces (`csv`)
//!
//! # Quick start
//! ```no_run
//! use chiptrack::{create_backend, EngineConfig, StereoFrame};
//!
//! let config = EngineConfig::default();
//! let mut chip = create_backend("p1xl", &config).unwrap();
//! chip.load_song(std::path::Path::new("tune.p1xl")).unwrap();
//! chip.play_song_from(0, 0);
//!
//! let mut buffer = vec![StereoFrame::default(); 1024];
//! chip.get_samples(&mut buffer);
//! ```

#![warn(missing_docs)]

pub mod backend; // Backend contract and the three chip engines
pub mod config; // Engine configuration
pub mod engine; // Shared interpreter, sequencer and synthesis parts
#[cfg(feature = "export")]
pub mod export; // WAV rendering and tick traces
pub mod format; // Song persistence
pub mod store; // Song/pattern/instrument data
pub mod tables; // Static lookup tables

/// Error types for chip engine operations
#[derive(thiserror::Error, Debug)]
pub enum ChipError {
    /// Song row list is at capacity
    #[error("Song is full.")]
    SongFull,

    /// Instrument program is at capacity
    #[error("Instrument is full.")]
    InstrumentFull,

    /// Modulation table is at capacity
    #[error("Table is full.")]
    TableFull,

    /// Deleting would leave a container without rows
    #[error("{0} cannot be empty.")]
    Empty(&'static str),

    /// Container has a fixed number of entries
    #[error("{0} tables are a fixed size.")]
    FixedSize(&'static str),

    /// Operation not offered by this backend
    #[error("Not supported: {0}")]
    NotSupported(&'static str),

    /// IO error from filesystem
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed song text
    #[error("Parse error on line {line}: {message}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        message: String,
    },

    /// Binary song file of the wrong size
    #[error("Invalid song size: expected {expected} bytes, got {actual}")]
    InvalidSize {
        /// Required size in bytes
        expected: usize,
        /// Size that was read
        actual: usize,
    },

    /// Backend name not recognised by [`create_backend`]
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Error writing audio file
    #[error("Audio file write error: {0}")]
    AudioFile(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<String> for ChipError {
    /// Converts a String into `ChipError::Other`.
    ///
    /// Prefer the specific variants where the failure has a name
    /// (`Config`, `Parse`, `AudioFile`, ...).
    fn from(msg: String) -> Self {
        ChipError::Other(msg)
    }
}

impl From<&str> for ChipError {
    /// Converts a string slice into `ChipError::Other`.
    fn from(msg: &str) -> Self {
        ChipError::Other(msg.to_string())
    }
}

/// Result type for chip engine operations
pub type Result<T> = std::result::Result<T, ChipError>;

/// Default output sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;

// Public API exports
pub use backend::{
    create_backend, CellKind, ChipBackend, MetaDataEntry, PlayState, StereoFrame, TableKind,
    TableStyle, VoiceSnapshot, BACKEND_NAMES,
};
pub use backend::multitable::MultiTableChip;
pub use backend::register::RegisterChip;
pub use backend::simple::SimpleChip;
pub use config::EngineConfig;
