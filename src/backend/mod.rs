//! Backend contract shared by the chip engines
//!
//! The tracker front end holds one `Box<dyn ChipBackend>` chosen by name at
//! startup ([`create_backend`]) and drives everything through this trait:
//! song persistence, structural and cell-level editing, live preview and
//! audio rendering.
//!
//! # Backends
//!
//! | id     | type                  | engine                                   |
//! |--------|-----------------------|------------------------------------------|
//! | `LFT`  | [`SimpleChip`]        | 4 oscillators, direct per-sample mixing  |
//! | `P1XL` | [`MultiTableChip`]    | band-limited deltas, FIR, mod tables     |
//! | `BV`   | [`RegisterChip`]      | prefix-coded programs on SID-style voices|

pub mod grid;
pub mod multitable;
pub mod register;
pub mod simple;

pub use crate::engine::sequencer::PlayState;
pub use crate::store::modtable::TableKind;
pub use multitable::MultiTableChip;
pub use register::RegisterChip;
pub use simple::SimpleChip;

use crate::config::EngineConfig;
use crate::{ChipError, Result};
use std::path::Path;
use tracing::debug;

/// Ids of the available backends
pub const BACKEND_NAMES: [&str; 3] = [SimpleChip::ID, MultiTableChip::ID, RegisterChip::ID];

/// One stereo output frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StereoFrame {
    /// Left sample
    pub left: i16,
    /// Right sample
    pub right: i16,
}

impl StereoFrame {
    /// Frame from both sides
    pub const fn new(left: i16, right: i16) -> Self {
        Self { left, right }
    }
}

/// How the UI renders and edits one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKind {
    /// Fixed text, not editable
    Label,
    /// Note value
    Note,
    /// One hex nibble
    Hex,
    /// One ASCII character
    Ascii,
}

/// Vertical layout of a table editor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableStyle {
    /// Bars grow from the bottom (volume, duty)
    Bottom,
    /// Bars grow from the centre line (pan, wave)
    Center,
}

/// A song-wide setting with a fixed set of options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaDataEntry {
    /// Display name
    pub name: &'static str,
    /// Option labels
    pub options: Vec<&'static str>,
    /// Index of the selected option
    pub value: usize,
}

/// Per-channel runtime state, for tests and tick traces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VoiceSnapshot {
    /// Instrument program running
    pub active: bool,
    /// Note selected by the program
    pub note: u8,
    /// Oscillator frequency step
    pub frequency: i32,
    /// Volume (0-255)
    pub volume: u8,
    /// Duty or pulse width
    pub duty: u16,
    /// Pan (8 = centre)
    pub pan: u8,
    /// Waveform selector byte
    pub waveform: u8,
    /// Program position
    pub program_position: usize,
    /// Remaining program wait ticks
    pub wait: u16,
}

/// Common interface of the chip engines
///
/// Indices outside the backend's ranges never panic: reads return neutral
/// values (0, `' '`, empty strings) and edits are ignored.
pub trait ChipBackend: Send {
    /// Short backend id ("LFT", "P1XL", "BV")
    fn id(&self) -> &'static str;

    /// File extension of the native song format
    fn file_extension(&self) -> &'static str;

    /// Output sample rate in Hz
    fn sample_rate(&self) -> u32;

    /// Reset the runtime state to power-on, keeping the song.
    fn init(&mut self) -> Result<()>;

    /// Release resources; the backend is silent afterwards.
    fn shutdown(&mut self) -> Result<()> {
        self.stop();
        Ok(())
    }

    /// Replace the song with an empty one.
    fn new_song(&mut self) -> Result<()>;

    /// Replace the song with one decoded from its native format.
    ///
    /// On error the previous song is kept.
    fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Encode the song in its native format.
    fn save_to_bytes(&self) -> Result<Vec<u8>>;

    /// Load a song file.
    fn load_song(&mut self, path: &Path) -> Result<()> {
        let bytes = std::fs::read(path)?;
        self.load_from_bytes(&bytes)?;
        debug!(backend = self.id(), path = %path.display(), "song loaded");
        Ok(())
    }

    /// Save the song to a file.
    fn save_song(&self, path: &Path) -> Result<()> {
        let bytes = self.save_to_bytes()?;
        std::fs::write(path, bytes)?;
        debug!(backend = self.id(), path = %path.display(), "song saved");
        Ok(())
    }

    // === Structural editing ===

    /// Insert an empty song row before `at`.
    fn insert_song_row(&mut self, at: usize) -> Result<()>;
    /// Append an empty song row.
    fn add_song_row(&mut self) -> Result<()>;
    /// Delete a song row.
    fn delete_song_row(&mut self, row: usize) -> Result<()>;

    /// Insert an empty pattern row, shifting the rest down.
    fn insert_pattern_row(&mut self, channel: usize, pattern: u8, at: usize) -> Result<()>;
    /// Append a pattern row (patterns have a fixed length, so usually a no-op).
    fn add_pattern_row(&mut self, channel: usize, pattern: u8) -> Result<()>;
    /// Delete a pattern row, shifting the rest up.
    fn delete_pattern_row(&mut self, channel: usize, pattern: u8, row: usize) -> Result<()>;

    /// Insert a program row before `at`.
    fn insert_instrument_row(&mut self, instrument: u8, at: usize) -> Result<()>;
    /// Append a program row.
    fn add_instrument_row(&mut self, instrument: u8) -> Result<()>;
    /// Delete a program row.
    fn delete_instrument_row(&mut self, instrument: u8, row: usize) -> Result<()>;

    /// Insert a table column before `at`.
    fn insert_table_column(&mut self, _kind: TableKind, _table: usize, _at: usize) -> Result<()> {
        Err(ChipError::NotSupported("modulation tables"))
    }
    /// Append a table column.
    fn add_table_column(&mut self, _kind: TableKind, _table: usize) -> Result<()> {
        Err(ChipError::NotSupported("modulation tables"))
    }
    /// Delete a table column.
    fn delete_table_column(&mut self, _kind: TableKind, _table: usize, _at: usize) -> Result<()> {
        Err(ChipError::NotSupported("modulation tables"))
    }

    // === Metadata ===

    /// Song-wide settings
    fn metadata(&self) -> Vec<MetaDataEntry> {
        Vec::new()
    }

    /// Select option `value` of setting `index`.
    fn set_metadata(&mut self, _index: usize, _value: usize) -> Result<()> {
        Err(ChipError::NotSupported("metadata"))
    }

    // === Song grid ===

    /// Number of song rows
    fn song_len(&self) -> usize;
    /// Cells per channel in a song row
    fn song_columns(&self, channel: usize) -> usize;
    /// Kind of a song cell
    fn song_cell_kind(&self, row: usize, channel: usize, column: usize) -> CellKind;
    /// Value of a song cell
    fn song_cell(&self, row: usize, channel: usize, column: usize) -> u8;
    /// Write a song cell; returns the resulting value.
    fn set_song_cell(&mut self, row: usize, channel: usize, column: usize, value: u8) -> u8;
    /// Clear a song cell; returns the resulting value.
    fn clear_song_cell(&mut self, row: usize, channel: usize, column: usize) -> u8;
    /// Route a channel of a song row to a pattern.
    fn set_song_pattern(&mut self, row: usize, channel: usize, pattern: u8);
    /// Help line for a song cell
    fn song_help(&self, _row: usize, _channel: usize, _column: usize) -> &'static str {
        ""
    }

    // === Channels ===

    /// Number of channels
    fn channel_count(&self) -> usize;

    /// Display name of a channel
    fn channel_name(&self, channel: usize) -> String {
        format!("CH{channel}")
    }

    // === Pattern grid ===

    /// Number of patterns
    fn pattern_count(&self) -> usize;
    /// Pattern a channel plays at a song row
    fn pattern_num(&self, song_row: usize, channel: usize) -> u8;
    /// Rows of a pattern
    fn pattern_len(&self, pattern: u8) -> usize;
    /// Cells in a pattern row
    fn pattern_columns(&self, channel: usize, pattern: u8, row: usize) -> usize;
    /// Kind of a pattern cell
    fn pattern_cell_kind(&self, channel: usize, pattern: u8, row: usize, column: usize) -> CellKind;
    /// Value of a pattern cell
    fn pattern_cell(&self, channel: usize, pattern: u8, row: usize, column: usize) -> u8;
    /// Help line for a pattern cell
    fn pattern_help(&self, _channel: usize, _pattern: u8, _row: usize, _column: usize) -> &'static str {
        ""
    }
    /// Clear a pattern cell; returns the resulting value.
    fn clear_pattern_cell(&mut self, channel: usize, pattern: u8, row: usize, column: usize) -> u8;
    /// Write a pattern cell; note cells also take `instrument`.
    fn set_pattern_cell(
        &mut self,
        channel: usize,
        pattern: u8,
        row: usize,
        column: usize,
        instrument: u8,
        value: u8,
    ) -> u8;
    /// Lowest octave the note entry offers
    fn min_octave(&self) -> u8;
    /// Highest octave the note entry offers
    fn max_octave(&self) -> u8;

    // === Instruments ===

    /// Display name of an instrument
    fn instrument_name(&self, instrument: u8) -> String;
    /// Rename an instrument (ignored where names are fixed).
    fn set_instrument_name(&mut self, _instrument: u8, _name: &str) {}
    /// Number of instruments
    fn instrument_count(&self) -> usize;
    /// Rows of an instrument
    fn instrument_len(&self, instrument: u8) -> usize;
    /// Parameter columns of an instrument row
    fn instrument_params(&self, _instrument: u8) -> usize {
        1
    }
    /// Heading of a parameter column
    fn instrument_param_name(&self, instrument: u8, param: usize) -> String;
    /// Cells of one parameter in one row
    fn instrument_columns(&self, instrument: u8, param: usize, row: usize) -> usize;
    /// Kind of an instrument cell
    fn instrument_cell_kind(&self, instrument: u8, param: usize, row: usize, column: usize) -> CellKind;
    /// Value of an instrument cell
    fn instrument_cell(&self, instrument: u8, param: usize, row: usize, column: usize) -> u8;
    /// Help line for an instrument cell
    fn instrument_help(&self, _instrument: u8, _param: usize, _row: usize, _column: usize) -> String {
        String::new()
    }
    /// Row label of an instrument row
    fn instrument_label(&self, _instrument: u8, row: usize) -> String {
        format!("{row:02X}")
    }
    /// Clear an instrument cell; returns the resulting value.
    fn clear_instrument_cell(&mut self, instrument: u8, param: usize, row: usize, column: usize) -> u8;
    /// Write an instrument cell; false when the value is rejected.
    fn set_instrument_cell(
        &mut self,
        instrument: u8,
        param: usize,
        row: usize,
        column: usize,
        value: u8,
    ) -> bool;
    /// Exchange two instrument rows.
    fn swap_instrument_rows(&mut self, instrument: u8, a: usize, b: usize);

    // === Tables ===

    /// Whether the backend has modulation tables
    fn uses_tables(&self) -> bool {
        false
    }
    /// Table kinds in editor order
    fn table_kinds(&self) -> &'static [TableKind] {
        &[]
    }
    /// Editor layout of a kind
    fn table_style(&self, _kind: TableKind) -> TableStyle {
        TableStyle::Bottom
    }
    /// First editable table index
    fn min_table(&self, _kind: TableKind) -> usize {
        0
    }
    /// Number of tables of a kind
    fn table_count(&self, _kind: TableKind) -> usize {
        0
    }
    /// Columns of a table
    fn table_len(&self, _kind: TableKind, _table: usize) -> usize {
        0
    }
    /// Value of a table column
    fn table_value(&self, _kind: TableKind, _table: usize, _column: usize) -> u8 {
        0
    }
    /// Write a table column; returns the stored value.
    fn set_table_value(&mut self, _kind: TableKind, _table: usize, _column: usize, _value: u8) -> u8 {
        0
    }

    // === Player ===

    /// Song row being played
    fn player_song_row(&self) -> usize;
    /// Pattern row being played
    fn player_pattern_row(&self) -> usize;
    /// Number of times a looping song wrapped since playback started
    fn loop_count(&self) -> u32;
    /// Preview `instrument` at `note` on `channel`; key release when `is_down` is false.
    fn plonk(&mut self, note: u8, channel: usize, instrument: u8, is_down: bool);
    /// Play the song from a row, restarting any playback.
    fn play_song_from(&mut self, song_row: usize, pattern_row: usize);
    /// Loop the patterns of one song row, restarting any playback.
    fn play_pattern_from(&mut self, song_row: usize, pattern_row: usize);
    /// Playback state
    fn play_state(&self) -> PlayState;
    /// Whether a song or pattern is playing
    fn is_playing(&self) -> bool {
        self.play_state() != PlayState::Idle
    }
    /// Stop playback and reset every channel to silence.
    fn stop(&mut self);
    /// Mute all channels and stop the sequencer.
    fn silence(&mut self);

    /// Render exactly `buffer.len()` frames, running ticks as they fall due.
    fn get_samples(&mut self, buffer: &mut [StereoFrame]);

    /// Run one playroutine tick without rendering audio.
    fn tick(&mut self);

    /// Runtime state of every channel
    fn snapshot(&self) -> Vec<VoiceSnapshot>;
}

/// Create a backend by id ("LFT", "P1XL", "BV") or alias
/// ("simple", "multitable", "register"), case-insensitively.
pub fn create_backend(name: &str, config: &EngineConfig) -> Result<Box<dyn ChipBackend>> {
    config.validate()?;
    let backend: Box<dyn ChipBackend> = match name.to_ascii_lowercase().as_str() {
        "lft" | "simple" => Box::new(SimpleChip::new(config)),
        "p1xl" | "multitable" => Box::new(MultiTableChip::new(config)),
        "bv" | "register" => Box::new(RegisterChip::new(config)),
        _ => return Err(ChipError::UnknownBackend(name.to_string())),
    };
    debug!(backend = backend.id(), "backend created");
    Ok(backend)
}

/// High nibble
#[inline]
pub(crate) fn hi(value: u8) -> u8 {
    value >> 4
}

/// Low nibble
#[inline]
pub(crate) fn lo(value: u8) -> u8 {
    value & 0x0f
}

/// Replace the high nibble
#[inline]
pub(crate) fn with_hi(value: u8, nibble: u8) -> u8 {
    (value & 0x0f) | ((nibble & 0x0f) << 4)
}

/// Replace the low nibble
#[inline]
pub(crate) fn with_lo(value: u8, nibble: u8) -> u8 {
    (value & 0xf0) | (nibble & 0x0f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_by_id_and_alias() {
        let config = EngineConfig::default();
        for (name, id) in [
            ("LFT", "LFT"),
            ("simple", "LFT"),
            ("p1xl", "P1XL"),
            ("MultiTable", "P1XL"),
            ("bv", "BV"),
            ("register", "BV"),
        ] {
            let backend = create_backend(name, &config).expect("known backend");
            assert_eq!(backend.id(), id, "{name}");
        }
        assert!(matches!(
            create_backend("sid", &config),
            Err(ChipError::UnknownBackend(_))
        ));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = EngineConfig {
            sample_rate: 0,
            ..EngineConfig::default()
        };
        assert!(matches!(
            create_backend("lft", &config),
            Err(ChipError::Config(_))
        ));
    }

    #[test]
    fn test_nibbles() {
        assert_eq!(hi(0xab), 0x0a);
        assert_eq!(lo(0xab), 0x0b);
        assert_eq!(with_hi(0xab, 0x3), 0x3b);
        assert_eq!(with_lo(0xab, 0x3), 0xa3);
    }

    #[test]
    fn test_backends_start_idle() {
        let config = EngineConfig::default();
        for name in BACKEND_NAMES {
            let mut backend = create_backend(name, &config).expect("known backend");
            assert_eq!(backend.play_state(), PlayState::Idle);
            let mut frames = vec![StereoFrame::new(1, 1); 256];
            backend.get_samples(&mut frames);
            assert!(
                frames.iter().all(|f| *f == StereoFrame::default()),
                "{name} must be silent before playback"
            );
        }
    }
}
