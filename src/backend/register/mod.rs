//! Register-level engine
//!
//! Three SID-style voices driven through a register bank. Instrument programs
//! are one byte per instruction with a prefix-coded opcode ([`opcode`]), and
//! run one instruction per tick. Each voice follows its own track list of
//! patterns ([`track`]). The song, eight instruments included, is stored as
//! one fixed 512-byte block ([`song`]).
//!
//! Ticks run at `tick_rate_hz` (50 Hz by default). Between ticks the voices
//! are clocked at `clock_hz` and averaged down to the output rate.

mod channel;
pub mod opcode;
pub mod sid;
pub mod song;
pub mod track;

use self::channel::{Channel, ChannelHost};
use self::opcode::{Instruction, END};
use self::sid::{voice_register, Sid, SidRegisters};
use self::song::{
    Meter, Octave, RegisterSong, Track, TrackOption, TrackSpeed, CHANNELS, INSTRUMENT_COUNT,
    PROGRAM_LEN, TRACK_ROWS,
};
use self::track::{TrackEvent, TrackPlayer};
use super::{CellKind, ChipBackend, MetaDataEntry, PlayState, StereoFrame, VoiceSnapshot};
use crate::config::EngineConfig;
use crate::engine::echo::Expander;
use crate::engine::TickClock;
use crate::{ChipError, Result};
use num_traits::FromPrimitive;
use tracing::{debug, trace};

/// Editor rows before the program: attack, decay, sustain, release
const ENVELOPE_ROWS: usize = 4;
/// Last program row that can be inserted at or deleted
const LAST_EDITABLE_ROW: usize = 31;

const OCTAVE_OPTIONS: [&str; 4] = ["Disabled", "Bass", "Alto", "Treble"];

/// The register-level engine
pub struct RegisterChip {
    sample_rate: u32,
    clock_hz: u32,
    tick_rate_hz: u32,
    tick_clock: TickClock,
    cycle_clock: TickClock,
    player: TrackPlayer,
    channels: [Channel; CHANNELS],
    registers: SidRegisters,
    sid: Sid,
    song: RegisterSong,
    frame: usize,
    echo: Expander,
}

impl RegisterChip {
    /// Backend id
    pub const ID: &'static str = "BV";

    /// Create an idle engine with an empty song.
    pub fn new(config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let clock_hz = config.register.clock_hz;
        let tick_rate_hz = config.register.tick_rate_hz;
        Self {
            sample_rate,
            clock_hz,
            tick_rate_hz,
            tick_clock: TickClock::from_rate(u64::from(sample_rate), u64::from(tick_rate_hz)),
            cycle_clock: TickClock::from_rate(u64::from(clock_hz), u64::from(sample_rate)),
            player: TrackPlayer::new(),
            channels: Default::default(),
            registers: SidRegisters::new(),
            sid: Sid::new(),
            song: RegisterSong::default(),
            frame: 0,
            echo: Expander::new(&config.echo),
        }
    }

    /// Song being played and edited
    pub fn song(&self) -> &RegisterSong {
        &self.song
    }

    /// Mutable song
    pub fn song_mut(&mut self) -> &mut RegisterSong {
        &mut self.song
    }

    /// Register bank as last written by the playroutine
    pub fn registers(&self) -> &SidRegisters {
        &self.registers
    }

    /// Whether a voice's program raised the external voice flag
    pub fn external_voice(&self, channel: usize) -> bool {
        self.channels.get(channel).is_some_and(|ch| ch.external)
    }

    fn reset_runtime(&mut self) {
        self.player.stop();
        self.channels = Default::default();
        self.registers.reset();
        self.sid.reset();
        self.tick_clock.reset();
        self.cycle_clock.reset();
        self.frame = 0;
        self.echo.reset();
    }

    fn instrument(&self, index: u8) -> &song::RegisterInstrument {
        &self.song.instruments[usize::from(index) % INSTRUMENT_COUNT]
    }

    fn key_down(&mut self, channel: usize, note: u8, instrument: u8) {
        if self.song.octaves[channel] == Octave::Disabled {
            return;
        }
        let program = *self.instrument(instrument);
        self.channels[channel].trigger(channel, note, instrument % 8, &program, &mut self.registers);
    }

    fn key_up(&mut self, channel: usize) {
        let program = *self.instrument(self.channels[channel].instrument);
        self.channels[channel].release(channel, &program, &mut self.registers);
    }

    fn run_tick(&mut self) {
        for (channel, event) in self.player.tick(&self.song).into_iter().enumerate() {
            match event {
                Some(TrackEvent::Trigger { note, instrument }) => self.key_down(channel, note, instrument),
                Some(TrackEvent::Release) => self.key_up(channel),
                None => {}
            }
        }

        for (voice, ch) in self.channels.iter_mut().enumerate() {
            let program = &self.song.instruments[usize::from(ch.instrument) % INSTRUMENT_COUNT].program;
            let mut cursor = std::mem::take(&mut ch.cursor);
            cursor.run(&mut ChannelHost {
                voice,
                channel: ch,
                program,
                registers: &mut self.registers,
            });
            ch.cursor = cursor;
            if ch.cursor.is_active() || ch.key_down {
                ch.refresh(voice, self.song.octaves[voice], self.frame, &mut self.registers);
            }
        }
        self.frame = self.frame.wrapping_add(1);
        trace!(row = self.player.song_row(), line = self.player.pattern_row(), "bv tick");
    }

    fn track(&self, row: usize, channel: usize) -> Option<Track> {
        self.song.tracks.get(channel)?.get(row).copied()
    }

    fn track_mut(&mut self, row: usize, channel: usize) -> Option<&mut Track> {
        self.song.tracks.get_mut(channel)?.get_mut(row)
    }

    fn program_byte(&self, instrument: u8, row: usize) -> Option<u8> {
        let index = row.checked_sub(ENVELOPE_ROWS)?;
        self.song
            .instruments
            .get(usize::from(instrument))?
            .program
            .get(index)
            .copied()
    }

    fn program_mut(&mut self, instrument: u8) -> Option<&mut [u8; PROGRAM_LEN]> {
        self.song
            .instruments
            .get_mut(usize::from(instrument))
            .map(|i| &mut i.program)
    }

    /// Program index of an editable row, or `NotSupported`
    fn editable_program_row(row: usize) -> Result<usize> {
        if (ENVELOPE_ROWS..=LAST_EDITABLE_ROW).contains(&row) {
            Ok(row - ENVELOPE_ROWS)
        } else {
            Err(ChipError::NotSupported("instrument rows outside the program"))
        }
    }
}

impl ChipBackend for RegisterChip {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn file_extension(&self) -> &'static str {
        "bv"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn init(&mut self) -> Result<()> {
        self.reset_runtime();
        debug!(clock_hz = self.clock_hz, tick_rate_hz = self.tick_rate_hz, "bv engine initialised");
        Ok(())
    }

    fn new_song(&mut self) -> Result<()> {
        self.reset_runtime();
        self.song = RegisterSong::default();
        Ok(())
    }

    fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let song = RegisterSong::from_bytes(bytes)?;
        self.reset_runtime();
        self.song = song;
        debug!(meter = ?self.song.meter, tempo = self.song.tempo, "bv song decoded");
        Ok(())
    }

    fn save_to_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.song.to_bytes())
    }

    fn insert_song_row(&mut self, at: usize) -> Result<()> {
        if at >= TRACK_ROWS {
            return Err(ChipError::SongFull);
        }
        for tracks in self.song.tracks.iter_mut() {
            tracks[at..].rotate_right(1);
            tracks[at] = Track::default();
        }
        Ok(())
    }

    fn add_song_row(&mut self) -> Result<()> {
        Err(ChipError::SongFull)
    }

    fn delete_song_row(&mut self, row: usize) -> Result<()> {
        if row >= TRACK_ROWS {
            return Ok(());
        }
        for tracks in self.song.tracks.iter_mut() {
            tracks[row..].rotate_left(1);
            tracks[TRACK_ROWS - 1] = Track::default();
        }
        Ok(())
    }

    fn insert_pattern_row(&mut self, _channel: usize, pattern: u8, at: usize) -> Result<()> {
        self.song.insert_line(usize::from(pattern), at);
        Ok(())
    }

    fn add_pattern_row(&mut self, _channel: usize, _pattern: u8) -> Result<()> {
        Ok(())
    }

    fn delete_pattern_row(&mut self, _channel: usize, pattern: u8, row: usize) -> Result<()> {
        self.song.delete_line(usize::from(pattern), row);
        Ok(())
    }

    fn insert_instrument_row(&mut self, instrument: u8, at: usize) -> Result<()> {
        let start = Self::editable_program_row(at)?;
        if let Some(program) = self.program_mut(instrument) {
            program[start..].rotate_right(1);
            program[start] = END;
        }
        Ok(())
    }

    fn add_instrument_row(&mut self, _instrument: u8) -> Result<()> {
        Err(ChipError::NotSupported("programs have a fixed length"))
    }

    fn delete_instrument_row(&mut self, instrument: u8, row: usize) -> Result<()> {
        let start = Self::editable_program_row(row)?;
        if let Some(program) = self.program_mut(instrument) {
            program[start..].rotate_left(1);
            program[PROGRAM_LEN - 1] = END;
        }
        Ok(())
    }

    fn metadata(&self) -> Vec<MetaDataEntry> {
        let octave = |name: &'static str, channel: usize| MetaDataEntry {
            name,
            options: OCTAVE_OPTIONS.to_vec(),
            value: self.song.octaves[channel] as usize,
        };
        vec![
            octave("Ch.0 Octave", 0),
            octave("Ch.1 Octave", 1),
            octave("Ch.2 Octave", 2),
            MetaDataEntry {
                name: "Meter",
                options: vec!["4/4", "3/4"],
                value: self.song.meter as usize,
            },
            MetaDataEntry {
                name: "Loop",
                options: vec!["Stop", "Loop"],
                value: usize::from(self.song.looping),
            },
        ]
    }

    fn set_metadata(&mut self, index: usize, value: usize) -> Result<()> {
        let out_of_range = ChipError::NotSupported("metadata option out of range");
        match index {
            0..=2 => self.song.octaves[index] = Octave::from_usize(value).ok_or(out_of_range)?,
            3 => {
                let meter = Meter::from_usize(value).ok_or(out_of_range)?;
                if meter != self.song.meter {
                    self.player.stop();
                    self.song.meter = meter;
                }
            }
            4 => match value {
                0 | 1 => self.song.looping = value == 1,
                _ => return Err(out_of_range),
            },
            _ => return Err(ChipError::NotSupported("metadata index")),
        }
        Ok(())
    }

    fn song_len(&self) -> usize {
        TRACK_ROWS
    }

    fn song_columns(&self, _channel: usize) -> usize {
        5
    }

    fn song_cell_kind(&self, _row: usize, _channel: usize, column: usize) -> CellKind {
        match column {
            0 | 2 | 4 => CellKind::Hex,
            _ => CellKind::Label,
        }
    }

    fn song_cell(&self, row: usize, channel: usize, column: usize) -> u8 {
        let Some(track) = self.track(row, channel) else {
            return 0;
        };
        match column {
            0 => track.pattern,
            2 => track.speed as u8,
            4 => track.option as u8,
            _ => b':',
        }
    }

    fn set_song_cell(&mut self, row: usize, channel: usize, column: usize, value: u8) -> u8 {
        if let Some(track) = self.track_mut(row, channel) {
            match column {
                0 => track.pattern = value & 0x0f,
                2 => track.speed = TrackSpeed::from_u8(value & 3).unwrap_or_default(),
                4 => track.option = TrackOption::from_u8(value & 3).unwrap_or_default(),
                _ => {}
            }
        }
        self.song_cell(row, channel, column)
    }

    fn clear_song_cell(&mut self, row: usize, channel: usize, column: usize) -> u8 {
        self.set_song_cell(row, channel, column, 0)
    }

    fn set_song_pattern(&mut self, row: usize, channel: usize, pattern: u8) {
        if let Some(track) = self.track_mut(row, channel) {
            track.pattern = pattern & 0x0f;
        }
    }

    fn song_help(&self, _row: usize, _channel: usize, column: usize) -> &'static str {
        match column {
            0 => "PATTERN",
            2 => "SPEED:0=1/1,1=1/2,2=1/4,3=1/8",
            4 => "OPTIONS:0=ONCE,1=TWICE,2=SILENCE,3=END/LOOP",
            _ => "",
        }
    }

    fn channel_count(&self) -> usize {
        CHANNELS
    }

    fn pattern_count(&self) -> usize {
        self.song.pattern_count()
    }

    fn pattern_num(&self, song_row: usize, channel: usize) -> u8 {
        self.track(song_row, channel).map_or(0, |t| t.pattern)
    }

    fn pattern_len(&self, _pattern: u8) -> usize {
        self.song.pattern_len()
    }

    fn pattern_columns(&self, _channel: usize, _pattern: u8, _row: usize) -> usize {
        3
    }

    fn pattern_cell_kind(&self, _channel: usize, _pattern: u8, _row: usize, column: usize) -> CellKind {
        match column {
            0 => CellKind::Note,
            2 => CellKind::Hex,
            _ => CellKind::Label,
        }
    }

    fn pattern_cell(&self, _channel: usize, pattern: u8, row: usize, column: usize) -> u8 {
        let Some(line) = self.song.line(usize::from(pattern), row) else {
            return 0;
        };
        match column {
            0 => line.note,
            2 => line.instrument,
            _ => b':',
        }
    }

    fn pattern_help(&self, _channel: usize, _pattern: u8, _row: usize, column: usize) -> &'static str {
        match column {
            0 => "NOTE",
            2 => "INSTRUMENT",
            _ => "",
        }
    }

    fn clear_pattern_cell(&mut self, _channel: usize, pattern: u8, row: usize, column: usize) -> u8 {
        if let Some(line) = self.song.line_mut(usize::from(pattern), row) {
            match column {
                0 => {
                    line.note = 0;
                    line.instrument = 0;
                }
                2 => line.instrument = 0,
                _ => {}
            }
        }
        0
    }

    fn set_pattern_cell(
        &mut self,
        channel: usize,
        pattern: u8,
        row: usize,
        column: usize,
        instrument: u8,
        value: u8,
    ) -> u8 {
        if let Some(line) = self.song.line_mut(usize::from(pattern), row) {
            match column {
                0 => {
                    line.note = value & 0x1f;
                    line.instrument = instrument & 7;
                }
                2 => line.instrument = value & 7,
                _ => {}
            }
        }
        self.pattern_cell(channel, pattern, row, column)
    }

    fn min_octave(&self) -> u8 {
        0
    }

    fn max_octave(&self) -> u8 {
        2
    }

    fn instrument_name(&self, instrument: u8) -> String {
        format!("I{instrument}")
    }

    fn instrument_count(&self) -> usize {
        INSTRUMENT_COUNT
    }

    fn instrument_len(&self, _instrument: u8) -> usize {
        ENVELOPE_ROWS + PROGRAM_LEN
    }

    fn instrument_params(&self, _instrument: u8) -> usize {
        2
    }

    fn instrument_param_name(&self, _instrument: u8, param: usize) -> String {
        match param {
            0 => "Cmd",
            1 => "Info",
            _ => "",
        }
        .to_string()
    }

    fn instrument_columns(&self, _instrument: u8, param: usize, row: usize) -> usize {
        match param {
            0 if row < ENVELOPE_ROWS => 1,
            0 => 3,
            1 => 8,
            _ => 0,
        }
    }

    fn instrument_cell_kind(&self, _instrument: u8, param: usize, row: usize, column: usize) -> CellKind {
        match (param, column) {
            (0, _) if row < ENVELOPE_ROWS => CellKind::Hex,
            (0, 0) => CellKind::Ascii,
            (0, _) => CellKind::Hex,
            _ => CellKind::Label,
        }
    }

    fn instrument_cell(&self, instrument: u8, param: usize, row: usize, column: usize) -> u8 {
        if row < ENVELOPE_ROWS {
            return match (param, column) {
                (0, 0) => self
                    .song
                    .instruments
                    .get(usize::from(instrument))
                    .and_then(|i| i.envelope(row))
                    .unwrap_or(0),
                _ => b' ',
            };
        }
        let Some(byte) = self.program_byte(instrument, row) else {
            return b' ';
        };
        match (param, column) {
            (0, 0) => Instruction::decode(byte).letter(),
            (0, 1 | 2) => Instruction::payload_digits(byte)[column - 1].unwrap_or(b' '),
            (1, _) => Instruction::decode(byte)
                .describe(row - ENVELOPE_ROWS)
                .bytes()
                .nth(column)
                .unwrap_or(b' '),
            _ => b' ',
        }
    }

    fn instrument_help(&self, _instrument: u8, param: usize, row: usize, _column: usize) -> String {
        match param {
            0 if row < ENVELOPE_ROWS => "ATTACK DECAY SUSTAIN RELEASE".to_string(),
            0 => "Ctrl Inc Set Arp Loop Wait Vbr sYn Ring eXt (J)noff".to_string(),
            _ => String::new(),
        }
    }

    fn instrument_label(&self, _instrument: u8, row: usize) -> String {
        match row {
            0 => " A".to_string(),
            1 => " D".to_string(),
            2 => " S".to_string(),
            3 => " R".to_string(),
            _ => format!("{:02X}", row - ENVELOPE_ROWS),
        }
    }

    fn clear_instrument_cell(&mut self, instrument: u8, param: usize, row: usize, column: usize) -> u8 {
        if param == 0 {
            if row < ENVELOPE_ROWS {
                if let Some(instr) = self.song.instruments.get_mut(usize::from(instrument)) {
                    instr.set_envelope(row, 0);
                }
            } else if let Some(byte) = self.program_byte(instrument, row) {
                let cleared = match column {
                    0 => END,
                    _ => Instruction::set_payload_digit(byte, column, 0).unwrap_or(byte),
                };
                if let Some(program) = self.program_mut(instrument) {
                    program[row - ENVELOPE_ROWS] = cleared;
                }
            }
        }
        self.instrument_cell(instrument, param, row, column)
    }

    fn set_instrument_cell(
        &mut self,
        instrument: u8,
        param: usize,
        row: usize,
        column: usize,
        value: u8,
    ) -> bool {
        if param != 0 {
            return false;
        }
        if row < ENVELOPE_ROWS {
            return column == 0
                && self
                    .song
                    .instruments
                    .get_mut(usize::from(instrument))
                    .is_some_and(|i| i.set_envelope(row, value));
        }
        let Some(byte) = self.program_byte(instrument, row) else {
            return false;
        };
        let updated = match column {
            0 => Instruction::retag(byte, value),
            _ => Instruction::set_payload_digit(byte, column, value),
        };
        match (updated, self.program_mut(instrument)) {
            (Some(updated), Some(program)) => {
                program[row - ENVELOPE_ROWS] = updated;
                true
            }
            _ => false,
        }
    }

    fn swap_instrument_rows(&mut self, instrument: u8, a: usize, b: usize) {
        let program_rows = ENVELOPE_ROWS..ENVELOPE_ROWS + PROGRAM_LEN;
        if !program_rows.contains(&a) || !program_rows.contains(&b) {
            return;
        }
        if let Some(program) = self.program_mut(instrument) {
            program.swap(a - ENVELOPE_ROWS, b - ENVELOPE_ROWS);
        }
    }

    fn player_song_row(&self) -> usize {
        self.player.song_row()
    }

    fn player_pattern_row(&self) -> usize {
        self.player.pattern_row()
    }

    fn loop_count(&self) -> u32 {
        self.player.loop_count()
    }

    fn plonk(&mut self, note: u8, channel: usize, instrument: u8, is_down: bool) {
        if channel >= CHANNELS {
            return;
        }
        if is_down {
            self.key_down(channel, note, instrument);
        } else {
            self.key_up(channel);
        }
    }

    fn play_song_from(&mut self, song_row: usize, pattern_row: usize) {
        self.reset_runtime();
        self.player.play_song_from(&self.song, song_row, pattern_row);
    }

    fn play_pattern_from(&mut self, song_row: usize, pattern_row: usize) {
        self.reset_runtime();
        self.player.play_pattern_from(&self.song, song_row, pattern_row);
    }

    fn play_state(&self) -> PlayState {
        self.player.state()
    }

    fn stop(&mut self) {
        self.reset_runtime();
    }

    fn silence(&mut self) {
        self.player.stop();
        for (voice, ch) in self.channels.iter_mut().enumerate() {
            ch.mute(voice, &mut self.registers);
        }
    }

    fn get_samples(&mut self, buffer: &mut [StereoFrame]) {
        for frame in buffer.iter_mut() {
            if self.tick_clock.advance() {
                self.run_tick();
            }
            let cycles = self.cycle_clock.next_period();
            let sample = self.sid.clock(cycles, &self.registers);
            *frame = self.echo.process(StereoFrame::new(sample, sample));
        }
    }

    fn tick(&mut self) {
        self.run_tick();
    }

    fn snapshot(&self) -> Vec<VoiceSnapshot> {
        self.channels
            .iter()
            .enumerate()
            .map(|(voice, ch)| VoiceSnapshot {
                active: ch.cursor.is_active(),
                note: ch.note.wrapping_add(ch.arpeggio),
                frequency: i32::from(self.registers.read_u16_le(voice_register(voice, sid::FREQUENCY))),
                volume: self.sid.envelope_level(voice),
                duty: self.registers.read_u16_le(voice_register(voice, sid::PULSE_WIDTH)),
                pan: 8,
                waveform: self.registers.read(voice_register(voice, sid::CONTROL)),
                program_position: ch.cursor.position(),
                wait: ch.cursor.wait(),
            })
            .collect()
    }
}
