//! Band-limited multi-table engine
//!
//! Four oscillators with triangle, saw, pulse, noise and custom 32-step
//! wavetable shapes. Oscillators run on an internal clock 256 times the
//! 44.1 kHz output rate and feed their level changes into per-channel,
//! per-side [`BlipBuffer`]s; every channel then passes its own FIR band-pass
//! before the mix and the shared echo.
//!
//! Volume, duty and pan can be driven by modulation tables: a parameter
//! above 15 on `v`, `d` or `p` binds table `param >> 4` with stretch
//! `param & 15`.

mod channel;
pub mod synth;

use self::channel::{Channel, ChannelHost};
use self::synth::{Oscillator, CLOCK_RATE};
use super::grid::Dialect;
use super::{CellKind, ChipBackend, PlayState, StereoFrame, TableKind, TableStyle, VoiceSnapshot};
use crate::config::EngineConfig;
use crate::engine::blip::BlipBuffer;
use crate::engine::echo::Expander;
use crate::engine::fir::{ChannelFilter, FirBank};
use crate::engine::sequencer::{NoteAction, RowHit, Sequencer};
use crate::engine::TickClock;
use crate::format::text::{self, TextDialect};
use crate::store::modtable::{ModTables, TABLE_COUNT};
use crate::store::tracker::{
    TrackerSong, CHANNELS, INSTRUMENT_COUNT, NOTE_CUT, PATTERN_COUNT, PATTERN_ROWS,
};
use crate::{ChipError, Result};
use tracing::{debug, trace};

const DIALECT: Dialect = Dialect {
    commands: "0dfhijlopstvw+=",
    cut_note: true,
    pad_pattern_zero: true,
};

/// The band-limited engine
pub struct MultiTableChip {
    sample_rate: u32,
    tick_clock: TickClock,
    sequencer: Sequencer,
    channels: [Channel; CHANNELS],
    oscillators: [Oscillator; CHANNELS],
    blips: [[BlipBuffer; 2]; CHANNELS],
    bank: FirBank,
    filters: [ChannelFilter; CHANNELS],
    channel_filters: bool,
    song: TrackerSong,
    tables: ModTables,
    echo: Expander,
    scratch: Vec<i16>,
    mix: Vec<[i32; 2]>,
}

fn instrument_label(index: usize) -> String {
    format!("INSTR {index:02X}")
}

fn empty_song() -> TrackerSong {
    TrackerSong::new(instrument_label)
}

impl MultiTableChip {
    /// Backend id
    pub const ID: &'static str = "P1XL";

    /// Create an idle engine with an empty song and default tables.
    pub fn new(config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate.max(1);
        let bank = FirBank::new(sample_rate);
        Self {
            sample_rate,
            tick_clock: TickClock::from_rate(CLOCK_RATE, u64::from(config.multitable.tick_rate_hz)),
            sequencer: Sequencer::new(config.multitable.row_ticks, config.multitable.loop_song),
            channels: Default::default(),
            oscillators: Default::default(),
            blips: std::array::from_fn(|_| {
                std::array::from_fn(|_| BlipBuffer::new(CLOCK_RATE, u64::from(sample_rate)))
            }),
            filters: std::array::from_fn(|_| ChannelFilter::new(&bank)),
            bank,
            channel_filters: config.channel_filters,
            song: empty_song(),
            tables: ModTables::new(),
            echo: Expander::new(&config.echo),
            scratch: Vec::new(),
            mix: Vec::new(),
        }
    }

    /// Song being played and edited
    pub fn song(&self) -> &TrackerSong {
        &self.song
    }

    /// Mutable song
    pub fn song_mut(&mut self) -> &mut TrackerSong {
        &mut self.song
    }

    /// Modulation tables
    pub fn tables(&self) -> &ModTables {
        &self.tables
    }

    /// Mutable modulation tables
    pub fn tables_mut(&mut self) -> &mut ModTables {
        &mut self.tables
    }

    fn reset_runtime(&mut self) {
        self.sequencer.stop();
        self.channels = Default::default();
        self.oscillators = Default::default();
        for blip in self.blips.iter_mut().flatten() {
            blip.clear();
        }
        for filter in self.filters.iter_mut() {
            filter.set_cutoff(&self.bank, 0, 255);
            filter.reset();
        }
        self.tick_clock.reset();
        self.echo.reset();
    }

    fn apply_row(&mut self, channel: usize, hit: RowHit) {
        let ch = &mut self.channels[channel];
        match hit.action {
            NoteAction::Trigger { note, instrument } => ch.trigger(note, instrument),
            NoteAction::Cut => ch.cut(),
            NoteAction::None => {}
        }
        for (cmd, param) in hit.commands {
            if cmd != 0 {
                let step = ch.command(cmd, param, &self.tables);
                ch.cursor.apply_external(step);
            }
        }
    }

    fn run_tick(&mut self) {
        let hits = self.sequencer.tick(&self.song);
        for (channel, hit) in hits.into_iter().enumerate() {
            if let Some(hit) = hit {
                self.apply_row(channel, hit);
            }
        }

        for (index, ch) in self.channels.iter_mut().enumerate() {
            let program = self.song.instrument(ch.instrument);
            let mut cursor = std::mem::take(&mut ch.cursor);
            cursor.run(&mut ChannelHost {
                channel: ch,
                program,
                tables: &self.tables,
            });
            ch.cursor = cursor;
            ch.update(&self.tables);
            if ch.take_filter_change() {
                self.filters[index].set_cutoff(&self.bank, ch.filter_low, ch.filter_high);
            }
            ch.load(&mut self.oscillators[index]);
        }
        trace!(row = self.sequencer.pattern_row(), "p1xl tick");
    }

    /// Run one tick and synthesize its clocks into the blip buffers.
    fn fill_tick(&mut self) {
        self.run_tick();
        let clocks = u64::from(self.tick_clock.next_period());
        for (osc, pair) in self.oscillators.iter_mut().zip(self.blips.iter_mut()) {
            let [left, right] = pair;
            osc.fill(clocks, left, right, &self.tables.wave);
        }
        for blip in self.blips.iter_mut().flatten() {
            blip.end_frame(clocks);
        }
    }

    fn samples_avail(&self) -> usize {
        self.blips[0][0].samples_avail()
    }
}

impl ChipBackend for MultiTableChip {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn file_extension(&self) -> &'static str {
        "p1xl"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn init(&mut self) -> Result<()> {
        self.reset_runtime();
        Ok(())
    }

    fn new_song(&mut self) -> Result<()> {
        self.reset_runtime();
        self.song = empty_song();
        self.tables = ModTables::new();
        Ok(())
    }

    fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let source = std::str::from_utf8(bytes).map_err(|e| ChipError::Parse {
            line: 0,
            message: e.to_string(),
        })?;
        let parsed = text::parse_song(source, TextDialect::MultiTable)?;
        self.reset_runtime();
        self.song = parsed.song;
        self.tables = parsed.tables;
        debug!(rows = self.song.len(), "p1xl song decoded");
        Ok(())
    }

    fn save_to_bytes(&self) -> Result<Vec<u8>> {
        Ok(text::write_song(&self.song, Some(&self.tables), TextDialect::MultiTable).into_bytes())
    }

    fn insert_song_row(&mut self, at: usize) -> Result<()> {
        self.song.insert_row(at)
    }

    fn add_song_row(&mut self) -> Result<()> {
        self.song.add_row()
    }

    fn delete_song_row(&mut self, row: usize) -> Result<()> {
        self.song.delete_row(row)
    }

    fn insert_pattern_row(&mut self, _channel: usize, pattern: u8, at: usize) -> Result<()> {
        self.song.pattern_mut(pattern).insert_row(at);
        Ok(())
    }

    fn add_pattern_row(&mut self, _channel: usize, _pattern: u8) -> Result<()> {
        Ok(())
    }

    fn delete_pattern_row(&mut self, _channel: usize, pattern: u8, row: usize) -> Result<()> {
        self.song.pattern_mut(pattern).delete_row(row);
        Ok(())
    }

    fn insert_instrument_row(&mut self, instrument: u8, at: usize) -> Result<()> {
        self.song.instrument_mut(instrument).lines.insert(at)
    }

    fn add_instrument_row(&mut self, instrument: u8) -> Result<()> {
        self.song.instrument_mut(instrument).lines.push()
    }

    fn delete_instrument_row(&mut self, instrument: u8, row: usize) -> Result<()> {
        self.song.instrument_mut(instrument).lines.remove(row)
    }

    fn insert_table_column(&mut self, kind: TableKind, table: usize, at: usize) -> Result<()> {
        self.tables.insert_column(kind, table, at)
    }

    fn add_table_column(&mut self, kind: TableKind, table: usize) -> Result<()> {
        self.tables.add_column(kind, table)
    }

    fn delete_table_column(&mut self, kind: TableKind, table: usize, at: usize) -> Result<()> {
        self.tables.delete_column(kind, table, at)
    }

    fn song_len(&self) -> usize {
        self.song.len()
    }

    fn song_columns(&self, _channel: usize) -> usize {
        5
    }

    fn song_cell_kind(&self, _row: usize, _channel: usize, column: usize) -> CellKind {
        DIALECT.song_cell_kind(column)
    }

    fn song_cell(&self, row: usize, channel: usize, column: usize) -> u8 {
        DIALECT.song_cell(&self.song, row, channel, column)
    }

    fn set_song_cell(&mut self, row: usize, channel: usize, column: usize, value: u8) -> u8 {
        DIALECT.set_song_cell(&mut self.song, row, channel, column, value)
    }

    fn clear_song_cell(&mut self, row: usize, channel: usize, column: usize) -> u8 {
        DIALECT.set_song_cell(&mut self.song, row, channel, column, 0)
    }

    fn set_song_pattern(&mut self, row: usize, channel: usize, pattern: u8) {
        DIALECT.set_song_pattern(&mut self.song, row, channel, pattern);
    }

    fn channel_count(&self) -> usize {
        CHANNELS
    }

    fn pattern_count(&self) -> usize {
        PATTERN_COUNT
    }

    fn pattern_num(&self, song_row: usize, channel: usize) -> u8 {
        DIALECT.pattern_num(&self.song, song_row, channel)
    }

    fn pattern_len(&self, _pattern: u8) -> usize {
        PATTERN_ROWS
    }

    fn pattern_columns(&self, _channel: usize, pattern: u8, _row: usize) -> usize {
        DIALECT.pattern_columns(pattern)
    }

    fn pattern_cell_kind(&self, _channel: usize, pattern: u8, _row: usize, column: usize) -> CellKind {
        DIALECT.pattern_cell_kind(pattern, column)
    }

    fn pattern_cell(&self, _channel: usize, pattern: u8, row: usize, column: usize) -> u8 {
        DIALECT.pattern_cell(&self.song, pattern, row, column)
    }

    fn clear_pattern_cell(&mut self, _channel: usize, pattern: u8, row: usize, column: usize) -> u8 {
        DIALECT.clear_pattern_cell(&mut self.song, pattern, row, column)
    }

    fn set_pattern_cell(
        &mut self,
        _channel: usize,
        pattern: u8,
        row: usize,
        column: usize,
        instrument: u8,
        value: u8,
    ) -> u8 {
        DIALECT.set_pattern_cell(&mut self.song, pattern, row, column, instrument, value)
    }

    fn min_octave(&self) -> u8 {
        0
    }

    fn max_octave(&self) -> u8 {
        7
    }

    fn instrument_name(&self, instrument: u8) -> String {
        self.song.instrument(instrument).name.clone()
    }

    fn set_instrument_name(&mut self, instrument: u8, name: &str) {
        self.song.instrument_mut(instrument).name = name.chars().take(255).collect();
    }

    fn instrument_count(&self) -> usize {
        INSTRUMENT_COUNT
    }

    fn instrument_len(&self, instrument: u8) -> usize {
        self.song.instrument(instrument).lines.len()
    }

    fn instrument_params(&self, _instrument: u8) -> usize {
        2
    }

    fn instrument_param_name(&self, _instrument: u8, param: usize) -> String {
        match param {
            0 => "CMD".to_string(),
            1 => "V".to_string(),
            _ => String::new(),
        }
    }

    fn instrument_columns(&self, instrument: u8, param: usize, row: usize) -> usize {
        if param == 0 {
            DIALECT.instrument_columns(&self.song, instrument, row)
        } else {
            1
        }
    }

    fn instrument_cell_kind(&self, instrument: u8, param: usize, row: usize, column: usize) -> CellKind {
        if param == 0 {
            DIALECT.instrument_cell_kind(&self.song, instrument, row, column)
        } else {
            CellKind::Ascii
        }
    }

    fn instrument_cell(&self, instrument: u8, param: usize, row: usize, column: usize) -> u8 {
        if param == 0 {
            DIALECT.instrument_cell(&self.song, instrument, row, column)
        } else {
            b'0'
        }
    }

    fn clear_instrument_cell(&mut self, _instrument: u8, _param: usize, _row: usize, _column: usize) -> u8 {
        DIALECT.clear_instrument_cell()
    }

    fn set_instrument_cell(
        &mut self,
        instrument: u8,
        param: usize,
        row: usize,
        column: usize,
        value: u8,
    ) -> bool {
        param == 0 && DIALECT.set_instrument_cell(&mut self.song, instrument, row, column, value)
    }

    fn swap_instrument_rows(&mut self, instrument: u8, a: usize, b: usize) {
        self.song.instrument_mut(instrument).lines.swap(a, b);
    }

    fn uses_tables(&self) -> bool {
        true
    }

    fn table_kinds(&self) -> &'static [TableKind] {
        &TableKind::ALL
    }

    fn table_style(&self, kind: TableKind) -> TableStyle {
        match kind {
            TableKind::Volume | TableKind::Duty => TableStyle::Bottom,
            TableKind::Pan | TableKind::Wave => TableStyle::Center,
        }
    }

    fn min_table(&self, _kind: TableKind) -> usize {
        1
    }

    fn table_count(&self, _kind: TableKind) -> usize {
        TABLE_COUNT
    }

    fn table_len(&self, kind: TableKind, table: usize) -> usize {
        self.tables.len(kind, table)
    }

    fn table_value(&self, kind: TableKind, table: usize, column: usize) -> u8 {
        self.tables.value(kind, table, column)
    }

    fn set_table_value(&mut self, kind: TableKind, table: usize, column: usize, value: u8) -> u8 {
        self.tables.set_value(kind, table, column, value);
        self.tables.value(kind, table, column)
    }

    fn player_song_row(&self) -> usize {
        self.sequencer.song_row()
    }

    fn player_pattern_row(&self) -> usize {
        self.sequencer.pattern_row()
    }

    fn loop_count(&self) -> u32 {
        self.sequencer.loop_count()
    }

    fn plonk(&mut self, note: u8, channel: usize, instrument: u8, is_down: bool) {
        if !is_down {
            return;
        }
        let Some(ch) = self.channels.get_mut(channel) else {
            return;
        };
        if note == NOTE_CUT {
            ch.cut();
        } else {
            ch.trigger(note.wrapping_add(1), instrument);
        }
    }

    fn play_song_from(&mut self, song_row: usize, pattern_row: usize) {
        self.reset_runtime();
        self.sequencer.play_song_from(&self.song, song_row, pattern_row);
    }

    fn play_pattern_from(&mut self, song_row: usize, pattern_row: usize) {
        self.reset_runtime();
        self.sequencer.play_pattern_from(&self.song, song_row, pattern_row);
    }

    fn play_state(&self) -> PlayState {
        self.sequencer.state()
    }

    fn stop(&mut self) {
        self.reset_runtime();
        debug!("p1xl stopped");
    }

    fn silence(&mut self) {
        self.sequencer.stop();
        for ch in self.channels.iter_mut() {
            ch.cut();
        }
    }

    fn get_samples(&mut self, buffer: &mut [StereoFrame]) {
        let len = buffer.len();
        while self.samples_avail() < len {
            self.fill_tick();
        }

        self.scratch.resize(len, 0);
        self.mix.clear();
        self.mix.resize(len, [0; 2]);
        for (index, pair) in self.blips.iter_mut().enumerate() {
            for (side, blip) in pair.iter_mut().enumerate() {
                blip.read_samples(&mut self.scratch);
                for (acc, &sample) in self.mix.iter_mut().zip(&self.scratch) {
                    let sample = if self.channel_filters {
                        self.filters[index].process(sample, side)
                    } else {
                        sample
                    };
                    acc[side] += i32::from(sample);
                }
            }
        }

        for (frame, acc) in buffer.iter_mut().zip(&self.mix) {
            let raw = StereoFrame::new(clamp(acc[0]), clamp(acc[1]));
            *frame = self.echo.process(raw);
        }
    }

    fn tick(&mut self) {
        self.run_tick();
    }

    fn snapshot(&self) -> Vec<VoiceSnapshot> {
        self.channels
            .iter()
            .map(|ch| VoiceSnapshot {
                active: ch.cursor.is_active(),
                note: ch.pitch.note,
                frequency: ch.freq,
                volume: ch.level.volume,
                duty: u16::from(ch.duty),
                pan: ch.pan,
                waveform: ch.waveform,
                program_position: ch.cursor.position(),
                wait: ch.cursor.wait(),
            })
            .collect()
    }
}

#[inline]
fn clamp(value: i32) -> i16 {
    value.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16
}
