//! Song data of the tracker dialects (simple and band-limited backends)

use super::{BoundedRows, RowsKind};
use crate::Result;

/// Channels of the tracker dialects
pub const CHANNELS: usize = 4;
/// Rows per pattern
pub const PATTERN_ROWS: usize = 32;
/// Pattern pool size (pattern 0 is never played)
pub const PATTERN_COUNT: usize = 256;
/// Instrument pool size (instrument 0 is "none")
pub const INSTRUMENT_COUNT: usize = 256;
/// Maximum song rows
pub const MAX_SONG_ROWS: usize = 256;
/// Maximum instrument program length
pub const MAX_INSTRUMENT_ROWS: usize = 256;

/// Pattern note value that cuts the channel
pub const NOTE_CUT: u8 = 255;

/// One row of the song order list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SongRow {
    /// Pattern per channel, 0 = channel idle
    pub pattern: [u8; CHANNELS],
    /// Transpose per channel, added to every note (wrapping)
    pub transpose: [u8; CHANNELS],
}

/// One row of a pattern
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatternLine {
    /// 0 = none, [`NOTE_CUT`] = cut, otherwise note + 1
    pub note: u8,
    /// 0 = keep the channel's last instrument
    pub instrument: u8,
    /// Two effect slots `(command, parameter)`; command 0 is empty
    pub commands: [(u8, u8); 2],
}

impl PatternLine {
    /// Whether the row carries nothing
    pub fn is_empty(&self) -> bool {
        self.note == 0 && self.instrument == 0 && self.commands[0].0 == 0 && self.commands[1].0 == 0
    }
}

/// Fixed-length pattern shared by every song row that references it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    /// Rows
    pub lines: [PatternLine; PATTERN_ROWS],
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            lines: [PatternLine::default(); PATTERN_ROWS],
        }
    }
}

impl Pattern {
    /// Row at `row`, empty when out of range
    pub fn line(&self, row: usize) -> PatternLine {
        self.lines.get(row).copied().unwrap_or_default()
    }

    /// Shift rows from `at` down by one, dropping the last, and clear `at`.
    pub fn insert_row(&mut self, at: usize) {
        if at >= PATTERN_ROWS {
            return;
        }
        self.lines[at..].rotate_right(1);
        self.lines[at] = PatternLine::default();
    }

    /// Shift rows below `at` up by one and clear the last.
    pub fn delete_row(&mut self, at: usize) {
        if at >= PATTERN_ROWS {
            return;
        }
        self.lines[at..].rotate_left(1);
        self.lines[PATTERN_ROWS - 1] = PatternLine::default();
    }
}

/// One `{command, parameter}` instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstrumentLine {
    /// ASCII command character, `'0'` or 0 loops
    pub cmd: u8,
    /// Parameter byte
    pub param: u8,
}

impl Default for InstrumentLine {
    fn default() -> Self {
        Self { cmd: b'0', param: 0 }
    }
}

/// Named instrument program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    /// Display name (band-limited dialect only)
    pub name: String,
    /// Program
    pub lines: BoundedRows<InstrumentLine>,
}

impl Instrument {
    /// Program of a single end instruction
    pub fn new(name: String) -> Self {
        Self {
            name,
            lines: BoundedRows::new(RowsKind::Instrument, MAX_INSTRUMENT_ROWS),
        }
    }

    /// Instruction at `position`; past the end this reads as the end marker
    pub fn line(&self, position: usize) -> Option<InstrumentLine> {
        self.lines.get(position).copied()
    }
}

/// Song order list, pattern pool and instrument pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSong {
    /// Song order list
    pub rows: BoundedRows<SongRow>,
    /// Pattern pool
    pub patterns: Vec<Pattern>,
    /// Instrument pool
    pub instruments: Vec<Instrument>,
}

impl TrackerSong {
    /// Empty song; instrument names come from `name_of`.
    pub fn new(name_of: impl Fn(usize) -> String) -> Self {
        Self {
            rows: BoundedRows::new(RowsKind::Song, MAX_SONG_ROWS),
            patterns: vec![Pattern::default(); PATTERN_COUNT],
            instruments: (0..INSTRUMENT_COUNT)
                .map(|i| Instrument::new(name_of(i)))
                .collect(),
        }
    }

    /// Number of song rows
    #[inline]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Never true: a song has at least one row
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Song row, default when out of range
    pub fn row(&self, index: usize) -> SongRow {
        self.rows.get(index).copied().unwrap_or_default()
    }

    /// Pattern by number
    pub fn pattern(&self, number: u8) -> &Pattern {
        &self.patterns[number as usize]
    }

    /// Mutable pattern by number
    pub fn pattern_mut(&mut self, number: u8) -> &mut Pattern {
        &mut self.patterns[number as usize]
    }

    /// Instrument by number
    pub fn instrument(&self, number: u8) -> &Instrument {
        &self.instruments[number as usize]
    }

    /// Mutable instrument by number
    pub fn instrument_mut(&mut self, number: u8) -> &mut Instrument {
        &mut self.instruments[number as usize]
    }

    /// Insert an empty song row.
    pub fn insert_row(&mut self, at: usize) -> Result<()> {
        self.rows.insert(at)
    }

    /// Append an empty song row.
    pub fn add_row(&mut self) -> Result<()> {
        self.rows.push()
    }

    /// Delete a song row.
    pub fn delete_row(&mut self, at: usize) -> Result<()> {
        self.rows.remove(at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(n: u8) -> PatternLine {
        PatternLine {
            note: n,
            ..PatternLine::default()
        }
    }

    #[test]
    fn test_pattern_insert_and_delete_keep_length() {
        let mut pattern = Pattern::default();
        pattern.lines[0] = note(1);
        pattern.lines[31] = note(32);

        pattern.insert_row(0);
        assert_eq!(pattern.line(0), PatternLine::default());
        assert_eq!(pattern.line(1).note, 1);
        assert_eq!(pattern.line(31).note, 0, "last row falls off");

        pattern.delete_row(0);
        assert_eq!(pattern.line(0).note, 1);
        assert_eq!(pattern.line(31), PatternLine::default());

        pattern.insert_row(99);
        assert_eq!(pattern.line(0).note, 1, "out of range is ignored");
    }

    #[test]
    fn test_new_song_shape() {
        let song = TrackerSong::new(|i| format!("INSTR {i:02X}"));
        assert_eq!(song.len(), 1);
        assert_eq!(song.patterns.len(), PATTERN_COUNT);
        assert_eq!(song.instrument(0x2a).name, "INSTR 2A");
        assert_eq!(song.instrument(1).lines.len(), 1);
        assert_eq!(song.instrument(1).line(0), Some(InstrumentLine::default()));
        assert_eq!(song.instrument(1).line(1), None);
    }

    #[test]
    fn test_song_rows_are_bounded() {
        let mut song = TrackerSong::new(|_| String::new());
        for _ in 1..MAX_SONG_ROWS {
            song.add_row().expect("room for 256 rows");
        }
        assert!(song.add_row().is_err());
        assert!(song.insert_row(3).is_err());
        song.delete_row(0).expect("deletable");
        assert_eq!(song.len(), MAX_SONG_ROWS - 1);
    }
}
