//! Channel state and command set of the band-limited engine

use super::synth::Oscillator;
use crate::engine::interpreter::{ProgramHost, Step};
use crate::engine::modulation::TableBinding;
use crate::engine::voice::{Level, Pitch};
use crate::engine::ProgramCursor;
use crate::store::modtable::{ModTables, TableKind};
use crate::store::tracker::Instrument;
use crate::tables;

/// Bend units per `s` parameter step
const BEND_SCALE: i16 = 8;

#[derive(Debug, Clone)]
pub struct Channel {
    pub cursor: ProgramCursor,
    pub instrument: u8,
    pub track_note: u8,
    pub pitch: Pitch,
    pub level: Level,
    pub duty: u8,
    pub pan: u8,
    pub waveform: u8,
    pub freq: i32,
    pub volume_table: TableBinding,
    pub duty_table: TableBinding,
    pub pan_table: TableBinding,
    pub filter_low: u8,
    pub filter_high: u8,
    filter_changed: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            cursor: ProgramCursor::default(),
            instrument: 0,
            track_note: 0,
            pitch: Pitch::new(),
            level: Level::default(),
            duty: 0,
            pan: 8,
            waveform: 0,
            freq: 0,
            volume_table: TableBinding::new(),
            duty_table: TableBinding::new(),
            pan_table: TableBinding::new(),
            filter_low: 0,
            filter_high: 255,
            filter_changed: false,
        }
    }
}

impl Channel {
    pub fn trigger(&mut self, note: u8, instrument: u8) {
        self.track_note = note;
        self.instrument = instrument;
        self.cursor.start();
        self.pitch.retrigger();
        self.level.fade = 0;
    }

    /// Note cut: mute and release the volume table; the program keeps running.
    pub fn cut(&mut self) {
        self.volume_table.unbind();
        self.level.cut();
    }

    /// Whether `h`/`l` changed the cutoffs since the last call
    pub fn take_filter_change(&mut self) -> bool {
        std::mem::take(&mut self.filter_changed)
    }

    /// Execute one command; parameters above 15 on `d`, `p` and `v` bind
    /// table `param >> 4` with stretch `param & 15`.
    pub fn command(&mut self, cmd: u8, param: u8, tables: &ModTables) -> Step {
        let table = usize::from(param >> 4);
        match cmd {
            0 | b'0' => return Step::Loop(param as usize),
            b'd' => {
                if param > 15 {
                    self.duty_table.bind(param >> 4, param & 15);
                    self.duty = tables.value(TableKind::Duty, table, 0) & 15;
                } else {
                    self.duty_table.unbind();
                    self.duty = param;
                }
            }
            b'f' => self.level.fade = param as i8,
            b'h' => {
                self.filter_high = param;
                self.filter_changed = true;
            }
            b'i' => self.pitch.inertia = u16::from(param) << 1,
            b'j' => return Step::Jump(param as usize),
            b'l' => {
                self.filter_low = param;
                self.filter_changed = true;
            }
            b'o' => self.pitch.set_vibrato(param),
            b'p' => {
                if param > 15 {
                    self.pan_table.bind(param >> 4, param & 15);
                    self.pan = tables.value(TableKind::Pan, table, 0);
                } else {
                    self.pan_table.unbind();
                    self.pan = param;
                }
            }
            b's' => self.pitch.bend_rate = i16::from(param as i8),
            b't' => return Step::Wait(u16::from(param)),
            b'v' => {
                if param > 15 {
                    self.volume_table.bind(param >> 4, param & 15);
                    self.level.volume = tables.value(TableKind::Volume, table, 0) << 4;
                } else {
                    self.volume_table.unbind();
                    self.level.volume = param << 4;
                }
            }
            b'w' => self.waveform = param,
            b'+' => self.pitch.note = param.wrapping_add(self.track_note).wrapping_sub(48),
            b'=' => self.pitch.note = param,
            _ => {}
        }
        Step::Next
    }

    /// Per-tick update after the program ran: pitch, fade or volume table,
    /// duty and pan tables.
    pub fn update(&mut self, tables: &ModTables) {
        self.freq = self.pitch.update(tables::wave_step(self.pitch.note), BEND_SCALE);

        if self.volume_table.is_bound() {
            let table = usize::from(self.volume_table.table());
            if let Some(column) = self.volume_table.advance(tables.len(TableKind::Volume, table)) {
                self.level.volume = tables.value(TableKind::Volume, table, column) << 4;
            }
        } else {
            self.level.update();
        }

        let table = usize::from(self.duty_table.table());
        if let Some(column) = self.duty_table.advance(tables.len(TableKind::Duty, table)) {
            self.duty = tables.value(TableKind::Duty, table, column) & 15;
        }
        let table = usize::from(self.pan_table.table());
        if let Some(column) = self.pan_table.advance(tables.len(TableKind::Pan, table)) {
            self.pan = tables.value(TableKind::Pan, table, column);
        }
    }

    /// Copy the synthesis parameters into the oscillator.
    pub fn load(&self, osc: &mut Oscillator) {
        osc.freq = self.freq;
        osc.duty = self.duty;
        osc.waveform = self.waveform;
        osc.volume = self.level.volume;
        osc.pan = self.pan;
    }
}

pub struct ChannelHost<'a> {
    pub channel: &'a mut Channel,
    pub program: &'a Instrument,
    pub tables: &'a ModTables,
}

impl ProgramHost for ChannelHost<'_> {
    fn execute(&mut self, position: usize) -> Step {
        match self.program.line(position) {
            Some(line) => self.channel.command(line.cmd, line.param, self.tables),
            None => Step::End,
        }
    }
}
