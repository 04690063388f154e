//! Packed song of the register-level engine
//!
//! A song file is exactly [`FILE_BYTES`] long: a 256-byte song block followed
//! by eight 32-byte instruments. Every field is a bit field inside those
//! bytes; reserved bits are kept so a load followed by a save reproduces the
//! input byte for byte.
//!
//! Song block layout:
//!
//! | offset | contents                                                       |
//! |--------|----------------------------------------------------------------|
//! | 0      | instrument set                                                 |
//! | 1      | octave ch0 (bits 0-1), ch1 (2-3), ch2 (4-5), meter (6), loop (7) |
//! | 2      | tempo (bits 0-2), reserved (3-7)                               |
//! | 3      | reserved                                                       |
//! | 4      | 3 × 20 track bytes: pattern (0-3), speed (4-5), options (6-7)  |
//! | 64     | 192 pattern lines: note (0-4), instrument (5-7)                |
//!
//! Instruments start with the attack/decay and sustain/release bytes followed
//! by a 30-byte program.

use super::opcode::{ControlBits, Instruction, END};
use crate::{ChipError, Result};
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Size of a song file
pub const FILE_BYTES: usize = 512;
/// Size of the song block
pub const SONG_BYTES: usize = 256;
/// Size of one instrument
pub const INSTRUMENT_BYTES: usize = 32;
/// Instruments per song
pub const INSTRUMENT_COUNT: usize = 8;
/// Program bytes per instrument
pub const PROGRAM_LEN: usize = 30;
/// Voices
pub const CHANNELS: usize = 3;
/// Track rows per voice
pub const TRACK_ROWS: usize = 20;
/// Pattern lines shared by all patterns
pub const PATTERN_LINES: usize = 192;

const TRACKS_OFFSET: usize = 4;
const LINES_OFFSET: usize = TRACKS_OFFSET + CHANNELS * TRACK_ROWS;

/// Voice octave; `Disabled` mutes the voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Octave {
    /// Voice is silent
    Disabled = 0,
    /// Lowest octave range
    Bass = 1,
    /// Middle octave range
    Alto = 2,
    /// Highest octave range
    Treble = 3,
}

/// Time signature; selects the pattern shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum Meter {
    /// 12 patterns of 16 lines
    FourFour = 0,
    /// 16 patterns of 12 lines
    ThreeFour = 1,
}

impl Meter {
    /// Lines per pattern
    pub fn pattern_len(self) -> usize {
        match self {
            Meter::FourFour => 16,
            Meter::ThreeFour => 12,
        }
    }

    /// Number of patterns
    pub fn pattern_count(self) -> usize {
        PATTERN_LINES / self.pattern_len()
    }
}

/// Track line speed; each step halves the playback rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum TrackSpeed {
    /// Full speed
    #[default]
    Normal = 0,
    /// Half speed
    Half = 1,
    /// Quarter speed
    Quarter = 2,
    /// Eighth speed
    Eighth = 3,
}

/// What a track row does with its pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromPrimitive)]
pub enum TrackOption {
    /// Play the pattern once
    #[default]
    PlayOnce = 0,
    /// Play the pattern twice
    PlayTwice = 1,
    /// Rest for the pattern's duration
    Silence = 2,
    /// End of this voice's track list
    EndLoop = 3,
}

/// One track row of one voice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Track {
    /// Pattern index (0-15)
    pub pattern: u8,
    /// Line speed
    pub speed: TrackSpeed,
    /// Playback option
    pub option: TrackOption,
}

impl Track {
    /// Unpack a track byte.
    pub fn from_byte(byte: u8) -> Self {
        Self {
            pattern: byte & 0x0f,
            speed: TrackSpeed::from_u8((byte >> 4) & 3).unwrap_or_default(),
            option: TrackOption::from_u8(byte >> 6).unwrap_or_default(),
        }
    }

    /// Pack into a track byte.
    pub fn to_byte(self) -> u8 {
        (self.pattern & 0x0f) | ((self.speed as u8) << 4) | ((self.option as u8) << 6)
    }
}

/// One pattern line; note 0 is a note off
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PatternLine {
    /// Note (0-31)
    pub note: u8,
    /// Instrument (0-7)
    pub instrument: u8,
}

impl PatternLine {
    fn from_byte(byte: u8) -> Self {
        Self {
            note: byte & 0x1f,
            instrument: byte >> 5,
        }
    }

    fn to_byte(self) -> u8 {
        (self.note & 0x1f) | ((self.instrument & 7) << 5)
    }
}

/// Envelope and program of one instrument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegisterInstrument {
    /// Attack rate (0-15)
    pub attack: u8,
    /// Decay rate (0-15)
    pub decay: u8,
    /// Sustain level (0-15)
    pub sustain: u8,
    /// Release rate (0-15)
    pub release: u8,
    /// Program bytes, see [`Instruction`]
    pub program: [u8; PROGRAM_LEN],
}

impl Default for RegisterInstrument {
    /// A gated triangle with full sustain that ends immediately.
    fn default() -> Self {
        let mut program = [END; PROGRAM_LEN];
        program[0] = Instruction::Control(ControlBits::TRIANGLE | ControlBits::GATE).encode();
        Self {
            attack: 0,
            decay: 0,
            sustain: 15,
            release: 0,
            program,
        }
    }
}

impl RegisterInstrument {
    /// Attack/decay register value
    #[inline]
    pub fn attack_decay(&self) -> u8 {
        (self.attack << 4) | (self.decay & 0x0f)
    }

    /// Sustain/release register value
    #[inline]
    pub fn sustain_release(&self) -> u8 {
        (self.sustain << 4) | (self.release & 0x0f)
    }

    /// Envelope nibble by editor row (attack, decay, sustain, release).
    pub fn envelope(&self, row: usize) -> Option<u8> {
        match row {
            0 => Some(self.attack),
            1 => Some(self.decay),
            2 => Some(self.sustain),
            3 => Some(self.release),
            _ => None,
        }
    }

    /// Set an envelope nibble by editor row.
    pub fn set_envelope(&mut self, row: usize, value: u8) -> bool {
        let slot = match row {
            0 => &mut self.attack,
            1 => &mut self.decay,
            2 => &mut self.sustain,
            3 => &mut self.release,
            _ => return false,
        };
        *slot = value & 0x0f;
        true
    }

    /// Position of the note-off marker, if the program has one
    pub fn note_off_marker(&self) -> Option<usize> {
        self.program
            .iter()
            .position(|&byte| Instruction::decode(byte) == Instruction::NoteOffJump)
    }

    fn read(bytes: &[u8]) -> Self {
        let mut program = [END; PROGRAM_LEN];
        program.copy_from_slice(&bytes[2..INSTRUMENT_BYTES]);
        Self {
            attack: bytes[0] >> 4,
            decay: bytes[0] & 0x0f,
            sustain: bytes[1] >> 4,
            release: bytes[1] & 0x0f,
            program,
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        out.push(self.attack_decay());
        out.push(self.sustain_release());
        out.extend_from_slice(&self.program);
    }
}

/// Whole song: settings, track lists, patterns and instruments
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterSong {
    /// Instrument set byte
    pub instrument_set: u8,
    /// Octave of each voice
    pub octaves: [Octave; CHANNELS],
    /// Time signature
    pub meter: Meter,
    /// Restart when every voice reached its end
    pub looping: bool,
    /// Tempo (0-7), higher is slower
    pub tempo: u8,
    reserved_tempo_bits: u8,
    reserved: u8,
    /// Track lists, one per voice
    pub tracks: [[Track; TRACK_ROWS]; CHANNELS],
    lines: [PatternLine; PATTERN_LINES],
    /// Instruments
    pub instruments: [RegisterInstrument; INSTRUMENT_COUNT],
}

impl Default for RegisterSong {
    fn default() -> Self {
        Self {
            instrument_set: 0,
            octaves: [Octave::Bass, Octave::Alto, Octave::Treble],
            meter: Meter::FourFour,
            looping: false,
            tempo: 2,
            reserved_tempo_bits: 0,
            reserved: 0,
            tracks: [[Track::default(); TRACK_ROWS]; CHANNELS],
            lines: [PatternLine::default(); PATTERN_LINES],
            instruments: [RegisterInstrument::default(); INSTRUMENT_COUNT],
        }
    }
}

impl RegisterSong {
    /// Lines per pattern under the current meter
    #[inline]
    pub fn pattern_len(&self) -> usize {
        self.meter.pattern_len()
    }

    /// Patterns under the current meter
    #[inline]
    pub fn pattern_count(&self) -> usize {
        self.meter.pattern_count()
    }

    fn line_index(&self, pattern: usize, row: usize) -> Option<usize> {
        (pattern < self.pattern_count() && row < self.pattern_len())
            .then(|| pattern * self.pattern_len() + row)
    }

    /// Pattern line, `None` out of range
    pub fn line(&self, pattern: usize, row: usize) -> Option<PatternLine> {
        self.line_index(pattern, row).map(|i| self.lines[i])
    }

    /// Mutable pattern line, `None` out of range
    pub fn line_mut(&mut self, pattern: usize, row: usize) -> Option<&mut PatternLine> {
        self.line_index(pattern, row).map(move |i| &mut self.lines[i])
    }

    /// Insert an empty line into a pattern; its last line drops off.
    pub fn insert_line(&mut self, pattern: usize, row: usize) {
        if let Some(start) = self.line_index(pattern, row) {
            let end = pattern * self.pattern_len() + self.pattern_len();
            self.lines[start..end].rotate_right(1);
            self.lines[start] = PatternLine::default();
        }
    }

    /// Delete a line from a pattern; an empty line fills the end.
    pub fn delete_line(&mut self, pattern: usize, row: usize) {
        if let Some(start) = self.line_index(pattern, row) {
            let end = pattern * self.pattern_len() + self.pattern_len();
            self.lines[start..end].rotate_left(1);
            self.lines[end - 1] = PatternLine::default();
        }
    }

    /// Line duration in ticks for a track speed
    #[inline]
    pub fn line_ticks(&self, speed: TrackSpeed) -> u16 {
        ((u16::from(self.tempo & 7) + 3) << 2) << (speed as u16)
    }

    /// Parse a song file.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != FILE_BYTES {
            return Err(ChipError::InvalidSize {
                expected: FILE_BYTES,
                actual: bytes.len(),
            });
        }

        let settings = bytes[1];
        let octave = |shift: u8| Octave::from_u8((settings >> shift) & 3).unwrap_or(Octave::Disabled);
        let mut song = Self {
            instrument_set: bytes[0],
            octaves: [octave(0), octave(2), octave(4)],
            meter: Meter::from_u8((settings >> 6) & 1).unwrap_or(Meter::FourFour),
            looping: settings & 0x80 != 0,
            tempo: bytes[2] & 7,
            reserved_tempo_bits: bytes[2] & !7,
            reserved: bytes[3],
            ..Self::default()
        };

        for (ch, tracks) in song.tracks.iter_mut().enumerate() {
            let start = TRACKS_OFFSET + ch * TRACK_ROWS;
            for (track, &byte) in tracks.iter_mut().zip(&bytes[start..start + TRACK_ROWS]) {
                *track = Track::from_byte(byte);
            }
        }
        for (line, &byte) in song.lines.iter_mut().zip(&bytes[LINES_OFFSET..SONG_BYTES]) {
            *line = PatternLine::from_byte(byte);
        }
        for (instrument, chunk) in song
            .instruments
            .iter_mut()
            .zip(bytes[SONG_BYTES..].chunks_exact(INSTRUMENT_BYTES))
        {
            *instrument = RegisterInstrument::read(chunk);
        }
        Ok(song)
    }

    /// Serialize into a song file.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(FILE_BYTES);
        out.push(self.instrument_set);
        let octaves = self
            .octaves
            .iter()
            .enumerate()
            .fold(0u8, |acc, (ch, &octave)| acc | ((octave as u8) << (ch * 2)));
        out.push(octaves | ((self.meter as u8) << 6) | (u8::from(self.looping) << 7));
        out.push((self.tempo & 7) | self.reserved_tempo_bits);
        out.push(self.reserved);
        for tracks in &self.tracks {
            out.extend(tracks.iter().map(|track| track.to_byte()));
        }
        out.extend(self.lines.iter().map(|line| line.to_byte()));
        for instrument in &self.instruments {
            instrument.write(&mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_song_layout() {
        let bytes = RegisterSong::default().to_bytes();
        assert_eq!(bytes.len(), FILE_BYTES);
        assert_eq!(bytes[1], 0b0011_1001, "bass, alto, treble, 4/4, no loop");
        assert_eq!(bytes[2], 2, "tempo");
        assert_eq!(&bytes[SONG_BYTES..SONG_BYTES + 3], &[0x00, 0xf0, 0x22]);
        assert!(bytes[SONG_BYTES + 3..SONG_BYTES + INSTRUMENT_BYTES]
            .iter()
            .all(|&b| b == END));
    }

    #[test]
    fn test_reserved_bits_survive() {
        let mut bytes: Vec<u8> = (0..FILE_BYTES).map(|i| (i * 37 + 11) as u8).collect();
        bytes[2] = 0xfd;
        bytes[3] = 0x5a;
        let song = RegisterSong::from_bytes(&bytes).expect("valid size");
        assert_eq!(song.tempo, 5);
        assert_eq!(song.to_bytes(), bytes);
    }

    #[test]
    fn test_wrong_size_is_rejected() {
        match RegisterSong::from_bytes(&[0; 100]) {
            Err(ChipError::InvalidSize { expected, actual }) => {
                assert_eq!((expected, actual), (FILE_BYTES, 100));
            }
            other => panic!("expected a size error, got {other:?}"),
        }
    }

    #[test]
    fn test_meter_reshapes_patterns() {
        let mut song = RegisterSong::default();
        song.line_mut(1, 0).expect("in range").note = 7;
        assert_eq!(song.line(0, 15).map(|l| l.note), Some(0));

        song.meter = Meter::ThreeFour;
        assert_eq!(song.pattern_count(), 16);
        assert_eq!(song.pattern_len(), 12);
        assert_eq!(song.line(1, 4).map(|l| l.note), Some(7), "line 16 is now pattern 1 row 4");
        assert!(song.line(0, 12).is_none());
    }

    #[test]
    fn test_insert_and_delete_line_stay_in_pattern() {
        let mut song = RegisterSong::default();
        for row in 0..16 {
            song.line_mut(0, row).expect("in range").note = row as u8 + 1;
        }
        song.line_mut(1, 0).expect("in range").note = 30;

        song.insert_line(0, 2);
        assert_eq!(song.line(0, 2).map(|l| l.note), Some(0));
        assert_eq!(song.line(0, 15).map(|l| l.note), Some(15));
        assert_eq!(song.line(1, 0).map(|l| l.note), Some(30), "next pattern untouched");

        song.delete_line(0, 2);
        assert_eq!(song.line(0, 2).map(|l| l.note), Some(3));
        assert_eq!(song.line(0, 15).map(|l| l.note), Some(0));
    }

    #[test]
    fn test_line_ticks() {
        let song = RegisterSong::default();
        assert_eq!(song.line_ticks(TrackSpeed::Normal), 20);
        assert_eq!(song.line_ticks(TrackSpeed::Eighth), 160);
    }

    #[test]
    fn test_note_off_marker() {
        let mut instrument = RegisterInstrument::default();
        assert_eq!(instrument.note_off_marker(), None);
        instrument.program[5] = 0xff;
        assert_eq!(instrument.note_off_marker(), Some(5));
    }
}
