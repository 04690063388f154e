//! Simple 4-oscillator engine
//!
//! Four oscillators (triangle, saw, pulse, shared noise) evaluated directly at
//! the output rate. The playroutine runs every `tick_period_samples` samples;
//! channels 0-1 feed the left side and 2-3 the right, cross-mixed at 0.8 and
//! passed through the shared echo.
//!
//! Instrument commands:
//!
//! | cmd | effect                                   |
//! |-----|------------------------------------------|
//! | `0` | loop back by the parameter, 0 ends       |
//! | `d` | duty = param << 8                        |
//! | `f` | volume fade per tick (signed)            |
//! | `i` | pitch inertia = param << 1               |
//! | `j` | jump to program row                      |
//! | `l` | pitch bend per tick (signed)             |
//! | `m` | duty sweep per tick = param << 6         |
//! | `t` | wait ticks                               |
//! | `v` | volume                                   |
//! | `w` | waveform 0-3                             |
//! | `~` | vibrato depth/rate nibbles               |
//! | `+` | note relative to the pattern note        |
//! | `=` | absolute note                            |

mod channel;

use self::channel::{Channel, ChannelHost};
use super::grid::Dialect;
use super::{CellKind, ChipBackend, PlayState, StereoFrame, VoiceSnapshot};
use crate::config::EngineConfig;
use crate::engine::echo::Expander;
use crate::engine::oscillator::NoiseLfsr;
use crate::engine::sequencer::{NoteAction, RowHit, Sequencer};
use crate::engine::TickClock;
use crate::format::text::{self, TextDialect};
use crate::store::tracker::{TrackerSong, CHANNELS, INSTRUMENT_COUNT, PATTERN_COUNT, PATTERN_ROWS};
use crate::{ChipError, Result};
use tracing::{debug, trace};

const DIALECT: Dialect = Dialect {
    commands: "0dfijlmtvw~+=",
    cut_note: false,
    pad_pattern_zero: false,
};

/// Rate the step table is tuned for
const TABLE_RATE_HZ: f64 = 16_000.0;
/// Samples between two shifts of the noise register
const NOISE_PERIOD: u8 = 4;
/// Stereo cross-feed and output gain
const CROSS_MIX: f32 = 0.8;

/// The simple engine
pub struct SimpleChip {
    sample_rate: u32,
    phase_scale: f64,
    tick_clock: TickClock,
    noise: NoiseLfsr,
    sequencer: Sequencer,
    channels: [Channel; CHANNELS],
    song: TrackerSong,
    echo: Expander,
}

impl SimpleChip {
    /// Backend id
    pub const ID: &'static str = "LFT";

    /// Create an idle engine with an empty song.
    pub fn new(config: &EngineConfig) -> Self {
        let sample_rate = config.sample_rate.max(1);
        Self {
            sample_rate,
            phase_scale: TABLE_RATE_HZ / f64::from(sample_rate),
            tick_clock: TickClock::from_period(u64::from(config.simple.tick_period_samples)),
            noise: NoiseLfsr::new(NOISE_PERIOD),
            sequencer: Sequencer::new(config.simple.row_ticks, false),
            channels: Default::default(),
            song: empty_song(),
            echo: Expander::new(&config.echo),
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

    fn reset_runtime(&mut self) {
        self.sequencer.stop();
        self.channels = Default::default();
        self.tick_clock.reset();
        self.noise.reset();
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
                let step = ch.command(cmd, param);
                ch.cursor.apply_external(step);
            }
        }
    }

    /// One playroutine tick: sequencer, programs, parameter updates.
    fn run_tick(&mut self) {
        let hits = self.sequencer.tick(&self.song);
        for (channel, hit) in hits.into_iter().enumerate() {
            if let Some(hit) = hit {
                self.apply_row(channel, hit);
            }
        }

        for ch in self.channels.iter_mut() {
            let program = self.song.instrument(ch.instrument);
            let mut cursor = std::mem::take(&mut ch.cursor);
            cursor.run(&mut ChannelHost {
                channel: ch,
                program,
            });
            ch.cursor = cursor;
            ch.update();
        }
        trace!(
            row = self.sequencer.pattern_row(),
            volumes = ?self.channels.iter().map(|c| c.level.volume).collect::<Vec<_>>(),
            "lft tick"
        );
    }

    fn render_frame(&mut self) -> StereoFrame {
        let noise = self.noise.tick();
        if self.tick_clock.advance() {
            self.run_tick();
        }

        let mut left = 0i32;
        let mut right = 0i32;
        for (index, ch) in self.channels.iter_mut().enumerate() {
            let out = ch.sample(noise, self.phase_scale);
            if index & 2 == 0 {
                left += out;
            } else {
                right += out;
            }
        }
        let (left, right) = (left as f32, right as f32);
        let mixed_left = (left + right * CROSS_MIX) * CROSS_MIX;
        let mixed_right = (right + left * CROSS_MIX) * CROSS_MIX;
        self.echo.process(StereoFrame::new(clamp(mixed_left), clamp(mixed_right)))
    }
}

fn empty_song() -> TrackerSong {
    TrackerSong::new(|_| String::new())
}

#[inline]
fn clamp(value: f32) -> i16 {
    value.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
}

impl ChipBackend for SimpleChip {
    fn id(&self) -> &'static str {
        Self::ID
    }

    fn file_extension(&self) -> &'static str {
        "lft"
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
        Ok(())
    }

    fn load_from_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let source = std::str::from_utf8(bytes).map_err(|e| ChipError::Parse {
            line: 0,
            message: e.to_string(),
        })?;
        let parsed = text::parse_song(source, TextDialect::Simple)?;
        self.reset_runtime();
        self.song = parsed.song;
        debug!(rows = self.song.len(), "lft song decoded");
        Ok(())
    }

    fn save_to_bytes(&self) -> Result<Vec<u8>> {
        Ok(text::write_song(&self.song, None, TextDialect::Simple).into_bytes())
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

    fn instrument_name(&self, _instrument: u8) -> String {
        "INSTR".to_string()
    }

    fn instrument_count(&self) -> usize {
        INSTRUMENT_COUNT
    }

    fn instrument_len(&self, instrument: u8) -> usize {
        self.song.instrument(instrument).lines.len()
    }

    fn instrument_param_name(&self, _instrument: u8, param: usize) -> String {
        format!("P{param}")
    }

    fn instrument_columns(&self, instrument: u8, _param: usize, row: usize) -> usize {
        DIALECT.instrument_columns(&self.song, instrument, row)
    }

    fn instrument_cell_kind(&self, instrument: u8, _param: usize, row: usize, column: usize) -> CellKind {
        DIALECT.instrument_cell_kind(&self.song, instrument, row, column)
    }

    fn instrument_cell(&self, instrument: u8, _param: usize, row: usize, column: usize) -> u8 {
        DIALECT.instrument_cell(&self.song, instrument, row, column)
    }

    fn clear_instrument_cell(&mut self, _instrument: u8, _param: usize, _row: usize, _column: usize) -> u8 {
        DIALECT.clear_instrument_cell()
    }

    fn set_instrument_cell(
        &mut self,
        instrument: u8,
        _param: usize,
        row: usize,
        column: usize,
        value: u8,
    ) -> bool {
        DIALECT.set_instrument_cell(&mut self.song, instrument, row, column, value)
    }

    fn swap_instrument_rows(&mut self, instrument: u8, a: usize, b: usize) {
        self.song.instrument_mut(instrument).lines.swap(a, b);
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
        if let Some(ch) = self.channels.get_mut(channel) {
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
        debug!("lft stopped");
    }

    fn silence(&mut self) {
        self.sequencer.stop();
        for ch in self.channels.iter_mut() {
            ch.cut();
        }
    }

    fn get_samples(&mut self, buffer: &mut [StereoFrame]) {
        for frame in buffer.iter_mut() {
            *frame = self.render_frame();
        }
    }

    fn tick(&mut self) {
        self.run_tick();
    }

    fn snapshot(&self) -> Vec<VoiceSnapshot> {
        self.channels
            .iter()
            .enumerate()
            .map(|(index, ch)| VoiceSnapshot {
                active: ch.cursor.is_active(),
                note: ch.pitch.note,
                frequency: ch.freq,
                volume: ch.level.volume,
                duty: ch.duty,
                pan: if index & 2 == 0 { 16 } else { 0 },
                waveform: ch.waveform,
                program_position: ch.cursor.position(),
                wait: ch.cursor.wait(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tracker::{InstrumentLine, PatternLine};

    fn chip_with_tone() -> SimpleChip {
        let mut chip = SimpleChip::new(&EngineConfig::default());
        let song = chip.song_mut();
        song.rows.get_mut(0).expect("row 0").pattern[0] = 1;
        song.pattern_mut(1).lines[0] = PatternLine {
            note: 49,
            instrument: 1,
            ..PatternLine::default()
        };
        let lines = &mut song.instrument_mut(1).lines;
        lines.reset(InstrumentLine { cmd: b'w', param: 2 });
        lines.push_value(InstrumentLine { cmd: b'v', param: 0x80 }).expect("fits");
        lines.push_value(InstrumentLine { cmd: b'=', param: 36 }).expect("fits");
        lines.push_value(InstrumentLine { cmd: b't', param: 0x40 }).expect("fits");
        chip
    }

    #[test]
    fn test_first_sample_runs_a_tick() {
        let mut chip = chip_with_tone();
        chip.play_song_from(0, 0);
        let mut frames = vec![StereoFrame::default(); 64];
        chip.get_samples(&mut frames);
        let voice = chip.snapshot()[0];
        assert!(voice.active);
        assert_eq!(voice.volume, 0x80);
        assert_eq!(voice.note, 36);
        assert_eq!(voice.wait, 0x40);
        assert!(frames.iter().any(|f| f.left != 0), "pulse reaches the left side");
    }

    #[test]
    fn test_tick_period_follows_config() {
        let mut chip = chip_with_tone();
        chip.play_song_from(0, 0);
        let mut frames = vec![StereoFrame::default(); 496];
        chip.get_samples(&mut frames);
        assert_eq!(chip.snapshot()[0].wait, 0x40, "one tick in the first period");
        chip.get_samples(&mut frames[..1]);
        assert_eq!(chip.snapshot()[0].wait, 0x3f, "second tick on sample 496");
    }

    #[test]
    fn test_stop_resets_channels() {
        let mut chip = chip_with_tone();
        chip.play_song_from(0, 0);
        chip.tick();
        chip.stop();
        assert!(!chip.is_playing());
        assert!(chip.snapshot().iter().all(|v| !v.active && v.volume == 0));

        let mut frames = vec![StereoFrame::new(5, 5); 32];
        chip.get_samples(&mut frames);
        assert!(frames.iter().all(|f| *f == StereoFrame::default()));
    }

    #[test]
    fn test_plonk_previews_without_playback() {
        let mut chip = chip_with_tone();
        chip.plonk(48, 2, 1, true);
        chip.tick();
        let voice = chip.snapshot()[2];
        assert!(voice.active);
        assert_eq!(voice.volume, 0x80);
        assert!(!chip.is_playing());
        chip.plonk(48, 9, 1, true);
    }

    #[test]
    fn test_song_stops_at_end() {
        let mut chip = chip_with_tone();
        chip.play_song_from(0, 0);
        for _ in 0..(PATTERN_ROWS * 5) {
            chip.tick();
        }
        assert!(chip.is_playing());
        chip.tick();
        assert_eq!(chip.play_state(), PlayState::Idle);
    }

    #[test]
    fn test_structural_errors() {
        let mut chip = SimpleChip::new(&EngineConfig::default());
        assert!(matches!(chip.delete_song_row(0), Err(ChipError::Empty("Song"))));
        for _ in 1..256 {
            chip.add_song_row().expect("room left");
        }
        assert!(matches!(chip.add_song_row(), Err(ChipError::SongFull)));
        assert!(matches!(
            chip.add_table_column(crate::TableKind::Volume, 1),
            Err(ChipError::NotSupported(_))
        ));
    }
}
