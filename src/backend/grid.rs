//! Cell-level editing of tracker-dialect songs
//!
//! The simple and band-limited backends render and edit songs the same way;
//! they differ only in their command set, whether the cut note exists and
//! whether pattern 0 is shown as an empty pad. [`Dialect`] captures those
//! differences and implements the song, pattern and instrument grids over a
//! [`TrackerSong`].
//!
//! Pattern row layout (12 columns):
//!
//! ```text
//! N . I I . C P P . C P P
//! 0 1 2 3 4 5 6 7 8 9 10 11
//! ```

use super::{hi, lo, with_hi, with_lo, CellKind};
use crate::store::tracker::{InstrumentLine, TrackerSong, CHANNELS, NOTE_CUT, PATTERN_ROWS};

/// Per-backend differences of the tracker grids
#[derive(Debug, Clone, Copy)]
pub struct Dialect {
    /// Valid instrument commands, lower case
    pub commands: &'static str,
    /// Note value 255 is stored verbatim as a cut
    pub cut_note: bool,
    /// Pattern 0 renders as a 14-column blank pad and ignores edits
    pub pad_pattern_zero: bool,
}

fn is_note_command(cmd: u8) -> bool {
    cmd == b'+' || cmd == b'='
}

impl Dialect {
    // === Song grid ===

    /// Song cell kinds: two pattern nibbles, ':' and two transpose nibbles
    pub fn song_cell_kind(&self, column: usize) -> CellKind {
        if column == 2 {
            CellKind::Label
        } else {
            CellKind::Hex
        }
    }

    /// Song cell value
    pub fn song_cell(&self, song: &TrackerSong, row: usize, channel: usize, column: usize) -> u8 {
        if channel >= CHANNELS {
            return 0;
        }
        let song_row = song.row(row);
        match column {
            0 => hi(song_row.pattern[channel]),
            1 => lo(song_row.pattern[channel]),
            2 => b':',
            3 => hi(song_row.transpose[channel]),
            4 => lo(song_row.transpose[channel]),
            _ => 0,
        }
    }

    /// Write a song cell nibble; returns the changed byte.
    pub fn set_song_cell(
        &self,
        song: &mut TrackerSong,
        row: usize,
        channel: usize,
        column: usize,
        value: u8,
    ) -> u8 {
        let Some(song_row) = song.rows.get_mut(row) else {
            return 0;
        };
        if channel >= CHANNELS {
            return 0;
        }
        let pattern = &mut song_row.pattern[channel];
        let transpose = &mut song_row.transpose[channel];
        match column {
            0 => {
                *pattern = with_hi(*pattern, value);
                *pattern
            }
            1 => {
                *pattern = with_lo(*pattern, value);
                *pattern
            }
            3 => {
                *transpose = with_hi(*transpose, value);
                *transpose
            }
            4 => {
                *transpose = with_lo(*transpose, value);
                *transpose
            }
            _ => value,
        }
    }

    /// Route a channel of a song row.
    pub fn set_song_pattern(&self, song: &mut TrackerSong, row: usize, channel: usize, pattern: u8) {
        if let Some(song_row) = song.rows.get_mut(row) {
            if channel < CHANNELS {
                song_row.pattern[channel] = pattern;
            }
        }
    }

    /// Pattern a channel plays at a song row
    pub fn pattern_num(&self, song: &TrackerSong, row: usize, channel: usize) -> u8 {
        if channel >= CHANNELS {
            return 0;
        }
        song.row(row).pattern[channel]
    }

    // === Pattern grid ===

    /// Cells in a pattern row
    pub fn pattern_columns(&self, pattern: u8) -> usize {
        if self.pad_pattern_zero && pattern == 0 {
            14
        } else {
            12
        }
    }

    /// Kind of a pattern cell
    pub fn pattern_cell_kind(&self, pattern: u8, column: usize) -> CellKind {
        if self.pad_pattern_zero && pattern == 0 {
            return CellKind::Label;
        }
        match column {
            0 => CellKind::Note,
            2 | 3 | 6 | 7 | 10 | 11 => CellKind::Hex,
            5 | 9 => CellKind::Ascii,
            _ => CellKind::Label,
        }
    }

    /// Value of a pattern cell; empty commands show as '.'
    pub fn pattern_cell(&self, song: &TrackerSong, pattern: u8, row: usize, column: usize) -> u8 {
        if (self.pad_pattern_zero && pattern == 0) || row >= PATTERN_ROWS {
            return b' ';
        }
        let line = song.pattern(pattern).line(row);
        let slot = |index: usize, part: usize| {
            let (cmd, param) = line.commands[index];
            match (cmd, part) {
                (0, _) => b'.',
                (_, 0) => cmd,
                (_, 1) => hi(param),
                _ => lo(param),
            }
        };
        match column {
            0 => line.note,
            2 => hi(line.instrument),
            3 => lo(line.instrument),
            5 => slot(0, 0),
            6 => slot(0, 1),
            7 => slot(0, 2),
            9 => slot(1, 0),
            10 => slot(1, 1),
            11 => slot(1, 2),
            _ => b' ',
        }
    }

    /// Clear a pattern cell.
    ///
    /// Clearing the note also clears the instrument; clearing an instrument
    /// nibble that leaves instrument 0 also clears the note. Clearing a
    /// command clears its parameter.
    pub fn clear_pattern_cell(&self, song: &mut TrackerSong, pattern: u8, row: usize, column: usize) -> u8 {
        if (self.pad_pattern_zero && pattern == 0) || row >= PATTERN_ROWS {
            return b' ';
        }
        let line = &mut song.pattern_mut(pattern).lines[row];
        match column {
            0 => {
                line.instrument = 0;
                line.note = 0;
                0
            }
            2 | 3 => {
                line.instrument = if column == 2 {
                    with_hi(line.instrument, 0)
                } else {
                    with_lo(line.instrument, 0)
                };
                if line.instrument == 0 {
                    line.note = 0;
                }
                line.instrument
            }
            5 | 9 => {
                let slot = &mut line.commands[usize::from(column == 9)];
                *slot = (0, 0);
                0
            }
            6 | 10 => {
                let slot = &mut line.commands[usize::from(column == 10)];
                slot.1 = with_hi(slot.1, 0);
                slot.1
            }
            7 | 11 => {
                let slot = &mut line.commands[usize::from(column == 11)];
                slot.1 = with_lo(slot.1, 0);
                slot.1
            }
            _ => b' ',
        }
    }

    /// Write a pattern cell.
    ///
    /// A note stores `value + 1` (or the cut sentinel verbatim where the
    /// dialect has one) together with `instrument`.
    pub fn set_pattern_cell(
        &self,
        song: &mut TrackerSong,
        pattern: u8,
        row: usize,
        column: usize,
        instrument: u8,
        value: u8,
    ) -> u8 {
        if (self.pad_pattern_zero && pattern == 0) || row >= PATTERN_ROWS {
            return b' ';
        }
        let cut_note = self.cut_note;
        let line = &mut song.pattern_mut(pattern).lines[row];
        match column {
            0 => {
                line.instrument = instrument;
                line.note = if cut_note && value == NOTE_CUT {
                    NOTE_CUT
                } else {
                    value.wrapping_add(1)
                };
                line.note
            }
            2 => {
                line.instrument = with_hi(line.instrument, value);
                line.instrument
            }
            3 => {
                line.instrument = with_lo(line.instrument, value);
                line.instrument
            }
            5 | 9 => {
                let slot = &mut line.commands[usize::from(column == 9)];
                slot.0 = value;
                value
            }
            6 | 10 => {
                let slot = &mut line.commands[usize::from(column == 10)];
                slot.1 = with_hi(slot.1, value);
                slot.1
            }
            7 | 11 => {
                let slot = &mut line.commands[usize::from(column == 11)];
                slot.1 = with_lo(slot.1, value);
                slot.1
            }
            _ => b' ',
        }
    }

    // === Instrument grid ===

    fn line(song: &TrackerSong, instrument: u8, row: usize) -> InstrumentLine {
        song.instrument(instrument).line(row).unwrap_or_default()
    }

    /// Cells of the command parameter: command plus two nibbles, or command
    /// plus one note
    pub fn instrument_columns(&self, song: &TrackerSong, instrument: u8, row: usize) -> usize {
        if is_note_command(Self::line(song, instrument, row).cmd) {
            2
        } else {
            3
        }
    }

    /// Kind of an instrument command cell
    pub fn instrument_cell_kind(&self, song: &TrackerSong, instrument: u8, row: usize, column: usize) -> CellKind {
        if column == 0 {
            CellKind::Ascii
        } else if is_note_command(Self::line(song, instrument, row).cmd) {
            CellKind::Note
        } else {
            CellKind::Hex
        }
    }

    /// Value of an instrument command cell; the command shows upper case
    pub fn instrument_cell(&self, song: &TrackerSong, instrument: u8, row: usize, column: usize) -> u8 {
        let line = Self::line(song, instrument, row);
        match column {
            0 => line.cmd.to_ascii_uppercase(),
            _ if is_note_command(line.cmd) => line.param,
            1 => hi(line.param),
            _ => lo(line.param),
        }
    }

    /// Write an instrument command cell.
    ///
    /// Commands outside the dialect are rejected; upper case is accepted and
    /// stored lower case. Note commands store `value + 1`.
    pub fn set_instrument_cell(
        &self,
        song: &mut TrackerSong,
        instrument: u8,
        row: usize,
        column: usize,
        value: u8,
    ) -> bool {
        let Some(line) = song.instrument_mut(instrument).lines.get_mut(row) else {
            return false;
        };
        if column == 0 {
            let cmd = value.to_ascii_lowercase();
            if !self.commands.as_bytes().contains(&cmd) {
                return false;
            }
            line.cmd = cmd;
            return true;
        }
        if is_note_command(line.cmd) {
            line.param = value.wrapping_add(1);
        } else if column == 1 {
            line.param = with_hi(line.param, value);
        } else {
            line.param = with_lo(line.param, value);
        }
        true
    }

    /// Clear an instrument cell; program rows always hold a command, so only
    /// the rendered value is reset.
    pub fn clear_instrument_cell(&self) -> u8 {
        0
    }
}
