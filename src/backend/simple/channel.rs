//! Channel state and command set of the simple engine

use crate::engine::interpreter::{ProgramHost, Step};
use crate::engine::oscillator::{simple_level, SimpleWave};
use crate::engine::voice::{Level, Pitch};
use crate::engine::ProgramCursor;
use crate::store::tracker::Instrument;
use crate::tables;

/// Duty cycle bounds; a sweep leaving them wraps to the other end
const DUTY_LOW: u16 = 0x2000;
const DUTY_HIGH: u16 = 0xe000;

/// One oscillator plus the instrument state driving it
#[derive(Debug, Clone, Default)]
pub struct Channel {
    /// Program position and wait counter
    pub cursor: ProgramCursor,
    /// Instrument whose program runs
    pub instrument: u8,
    /// Transposed pattern note, base for relative note commands
    pub track_note: u8,
    pub pitch: Pitch,
    pub level: Level,
    /// 16-bit pulse duty
    pub duty: u16,
    /// Added to the duty every tick
    pub duty_rate: i16,
    /// Waveform byte, see [`SimpleWave`]
    pub waveform: u8,
    /// Phase step per 16 kHz sample, never negative
    pub freq: i32,
    pub phase: u16,
}

impl Channel {
    /// Restart `instrument` for pattern note `note`.
    pub fn trigger(&mut self, note: u8, instrument: u8) {
        self.track_note = note;
        self.instrument = instrument;
        self.cursor.start();
        self.pitch.retrigger();
        self.level.fade = 0;
        self.duty_rate = 0;
    }

    /// Silence and stop the program.
    pub fn cut(&mut self) {
        self.cursor.stop();
        self.level.cut();
    }

    /// Execute one command; shared by programs and pattern effects.
    pub fn command(&mut self, cmd: u8, param: u8) -> Step {
        match cmd {
            0 | b'0' => return Step::Loop(param as usize),
            b'd' => self.duty = u16::from(param) << 8,
            b'f' => self.level.fade = param as i8,
            b'i' => self.pitch.inertia = u16::from(param) << 1,
            b'j' => return Step::Jump(param as usize),
            b'l' => self.pitch.bend_rate = i16::from(param as i8),
            b'm' => self.duty_rate = i16::from(param as i8) << 6,
            b't' => return Step::Wait(u16::from(param)),
            b'v' => self.level.volume = param,
            b'w' => self.waveform = param,
            b'~' => self.pitch.set_vibrato(param),
            b'+' => self.pitch.note = param.wrapping_add(self.track_note).wrapping_sub(48),
            b'=' => self.pitch.note = param,
            _ => {}
        }
        Step::Next
    }

    /// Per-tick parameter update, after the program ran.
    pub fn update(&mut self) {
        self.freq = self.pitch.update(tables::simple_step(self.pitch.note), 1).max(0);
        self.level.update();

        let mut duty = self.duty.wrapping_add(self.duty_rate as u16);
        if duty > DUTY_HIGH {
            duty = DUTY_LOW;
        }
        if duty < DUTY_LOW {
            duty = DUTY_HIGH;
        }
        self.duty = duty;
    }

    /// Output level for this sample, then advance the phase.
    ///
    /// `phase_scale` converts the 16 kHz table step to the output rate.
    #[inline]
    pub fn sample(&mut self, noise: u32, phase_scale: f64) -> i32 {
        let value = simple_level(SimpleWave::from_byte(self.waveform), self.phase, self.duty, noise);
        let step = (f64::from(self.freq) * phase_scale) as u32;
        self.phase = self.phase.wrapping_add(step as u16);
        i32::from(value) * i32::from(self.level.volume)
    }
}

/// Runs a channel's instrument program
pub struct ChannelHost<'a> {
    pub channel: &'a mut Channel,
    pub program: &'a Instrument,
}

impl ProgramHost for ChannelHost<'_> {
    fn execute(&mut self, position: usize) -> Step {
        match self.program.line(position) {
            Some(line) => self.channel.command(line.cmd, line.param),
            None => Step::End,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commands_map_to_steps() {
        let mut ch = Channel::default();
        assert_eq!(ch.command(b't', 5), Step::Wait(5));
        assert_eq!(ch.command(b'j', 3), Step::Jump(3));
        assert_eq!(ch.command(b'0', 0), Step::Loop(0));
        assert_eq!(ch.command(0, 2), Step::Loop(2));
        assert_eq!(ch.command(b'?', 2), Step::Next, "unknown commands are no-ops");
    }

    #[test]
    fn test_relative_note_uses_track_note() {
        let mut ch = Channel::default();
        ch.trigger(49, 1);
        ch.command(b'+', 48 + 7);
        assert_eq!(ch.pitch.note, 56);
        ch.command(b'=', 12);
        assert_eq!(ch.pitch.note, 12);
    }

    #[test]
    fn test_duty_sweep_wraps() {
        let mut ch = Channel {
            duty: 0xdf00,
            ..Channel::default()
        };
        ch.command(b'm', 0x10);
        ch.update();
        assert_eq!(ch.duty, DUTY_LOW, "sweeping past the top restarts low");

        ch.command(b'm', 0xf0);
        ch.update();
        assert_eq!(ch.duty, DUTY_HIGH, "sweeping below the bottom restarts high");
    }

    #[test]
    fn test_trigger_clears_modulation() {
        let mut ch = Channel::default();
        ch.command(b'f', 0xfe);
        ch.command(b'l', 4);
        ch.command(b'~', 0x31);
        ch.command(b'm', 2);
        ch.trigger(30, 2);
        assert_eq!(ch.level.fade, 0);
        assert_eq!(ch.pitch.bend_rate, 0);
        assert_eq!(ch.pitch.vibrato_depth, 0);
        assert_eq!(ch.duty_rate, 0);
        assert!(ch.cursor.is_active());
    }

    #[test]
    fn test_silent_at_zero_volume() {
        let mut ch = Channel {
            waveform: SimpleWave::Pulse as u8,
            freq: 1000,
            ..Channel::default()
        };
        assert_eq!(ch.sample(0, 1.0), 0);
        ch.level.volume = 2;
        assert_eq!(ch.sample(0, 1.0).abs(), 64, "pulse is at full swing");
    }
}
