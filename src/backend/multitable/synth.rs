//! Edge synthesis of the band-limited engine
//!
//! Each oscillator steps its 32-position phase every `freq` clocks of an
//! 11.2896 MHz internal clock and reports level changes per stereo side to a
//! [`DeltaSink`]. Nothing is emitted while a level holds, so the deltas of one
//! tick always add up to the level change over that tick.

use crate::engine::blip::DeltaSink;
use crate::engine::oscillator::{multitable_level, BuzzLfsr, WaveformFlags};
use crate::store::modtable::WAVE_LEN;

/// Internal oscillator clock, 256 clocks per 44.1 kHz sample
pub const CLOCK_RATE: u64 = 44_100 * 256;

/// Pan gains (0-15) of the left and right side; 8 is centre, 0 is hard
/// right and 16 hard left.
#[inline]
pub fn pan_gains(pan: u8) -> (i32, i32) {
    let pan = i32::from(pan.min(16));
    let left = if pan >= 8 { 15 } else { pan * 2 };
    let right = if pan <= 8 { 15 } else { (16 - pan) * 2 };
    (left, right)
}

/// Oscillator state read by the synthesizer
#[derive(Debug, Clone)]
pub struct Oscillator {
    /// Clocks per phase step; silent when not positive
    pub freq: i32,
    /// Pulse threshold, also the noise register length (0-15)
    pub duty: u8,
    /// Waveform selector byte
    pub waveform: u8,
    /// Volume (0-255)
    pub volume: u8,
    /// Pan (0-16)
    pub pan: u8,
    phase: u8,
    noise: BuzzLfsr,
    last_left: i32,
    last_right: i32,
    last_time: u64,
}

impl Default for Oscillator {
    fn default() -> Self {
        Self {
            freq: 0,
            duty: 0,
            waveform: 0,
            volume: 0,
            pan: 8,
            phase: 0,
            noise: BuzzLfsr::new(),
            last_left: 0,
            last_right: 0,
            last_time: 0,
        }
    }
}

impl Oscillator {
    /// Levels last sent to the left and right sink
    pub fn levels(&self) -> (i32, i32) {
        (self.last_left, self.last_right)
    }

    /// Current 32-step phase
    pub fn phase(&self) -> u8 {
        self.phase
    }

    /// Run one frame of `clocks` clocks, emitting level changes.
    ///
    /// A step that would fall past the frame carries over into the next one.
    pub fn fill<S: DeltaSink>(
        &mut self,
        clocks: u64,
        left: &mut S,
        right: &mut S,
        waves: &[[u8; WAVE_LEN]],
    ) {
        if self.freq <= 0 {
            self.settle(left, right);
            return;
        }
        let step = self.freq as u64;
        let flags = WaveformFlags::from_byte(self.waveform);
        let (pan_left, pan_right) = pan_gains(self.pan);
        let volume = i32::from(self.volume);

        let mut t = self.last_time;
        while t < clocks {
            let value = i32::from(multitable_level(flags, self.phase, self.duty, &mut self.noise, waves));
            let out_left = value * ((volume * pan_left) >> 4);
            let out_right = value * ((volume * pan_right) >> 4);
            if out_left != self.last_left {
                left.add_delta(t, out_left - self.last_left);
                self.last_left = out_left;
            }
            if out_right != self.last_right {
                right.add_delta(t, out_right - self.last_right);
                self.last_right = out_right;
            }
            self.phase = (self.phase + 1) & 31;
            t += step;
        }
        self.last_time = t - clocks;
    }

    /// Bring both sides back to 0 at the start of the frame.
    fn settle<S: DeltaSink>(&mut self, left: &mut S, right: &mut S) {
        if self.last_left != 0 {
            left.add_delta(0, -self.last_left);
            self.last_left = 0;
        }
        if self.last_right != 0 {
            right.add_delta(0, -self.last_right);
            self.last_right = 0;
        }
        self.last_time = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Sink remembering every delta
    #[derive(Default)]
    struct Recorder {
        deltas: Vec<(u64, i32)>,
    }

    impl DeltaSink for Recorder {
        fn add_delta(&mut self, time: u64, delta: i32) {
            self.deltas.push((time, delta));
        }
    }

    impl Recorder {
        fn sum(&self) -> i32 {
            self.deltas.iter().map(|(_, d)| d).sum()
        }
    }

    const FLAT: [[u8; WAVE_LEN]; 16] = [[8; WAVE_LEN]; 16];

    fn pulse(freq: i32) -> Oscillator {
        Oscillator {
            freq,
            duty: 7,
            waveform: WaveformFlags::PULSE.bits(),
            volume: 0xf0,
            ..Oscillator::default()
        }
    }

    #[test]
    fn test_pan_law() {
        assert_eq!(pan_gains(8), (15, 15));
        assert_eq!(pan_gains(0), (0, 15));
        assert_eq!(pan_gains(16), (15, 0));
        assert_eq!(pan_gains(4), (8, 15));
    }

    #[test]
    fn test_deltas_sum_to_level_change_per_tick() {
        let mut osc = pulse(1000);
        let (mut left, mut right) = (Recorder::default(), Recorder::default());
        for tick in 0..5 {
            let before = osc.levels();
            left.deltas.clear();
            right.deltas.clear();
            osc.fill(CLOCK_RATE / 60, &mut left, &mut right, &FLAT);
            if tick == 2 {
                osc.volume = 0x40;
            }
            let after = osc.levels();
            assert_eq!(left.sum(), after.0 - before.0, "left, tick {tick}");
            assert_eq!(right.sum(), after.1 - before.1, "right, tick {tick}");
        }
    }

    #[test]
    fn test_only_changes_are_emitted() {
        let mut osc = pulse(100);
        let (mut left, mut right) = (Recorder::default(), Recorder::default());
        osc.fill(100 * 64, &mut left, &mut right, &FLAT);
        // 64 steps of a square wave with 16-step halves: one edge every 16 steps
        assert_eq!(left.deltas.len(), 4);
        assert!(left.deltas.iter().all(|(t, _)| t % 100 == 0));
    }

    #[test]
    fn test_step_carries_across_frames() {
        let mut osc = pulse(300);
        let (mut left, mut right) = (Recorder::default(), Recorder::default());
        osc.fill(1000, &mut left, &mut right, &FLAT);
        assert_eq!(osc.phase(), 4, "steps at 0, 300, 600 and 900");
        osc.fill(1000, &mut left, &mut right, &FLAT);
        assert_eq!(osc.phase(), 7, "next frame continues at 200");
    }

    #[test]
    fn test_stopping_returns_level_to_zero() {
        let mut osc = pulse(100);
        let (mut left, mut right) = (Recorder::default(), Recorder::default());
        osc.fill(100 * 8, &mut left, &mut right, &FLAT);
        assert_ne!(osc.levels(), (0, 0), "pulse high in its first half");

        osc.freq = 0;
        osc.fill(CLOCK_RATE / 60, &mut left, &mut right, &FLAT);
        assert_eq!(osc.levels(), (0, 0));
        assert_eq!(left.sum(), 0, "left deltas cancel out");
        assert_eq!(right.sum(), 0, "right deltas cancel out");

        let emitted = left.deltas.len();
        osc.fill(CLOCK_RATE / 60, &mut left, &mut right, &FLAT);
        assert_eq!(left.deltas.len(), emitted, "nothing more once settled");
    }

    #[test]
    fn test_silent_without_frequency() {
        let mut osc = pulse(0);
        let (mut left, mut right) = (Recorder::default(), Recorder::default());
        osc.fill(CLOCK_RATE / 60, &mut left, &mut right, &FLAT);
        assert!(left.deltas.is_empty() && right.deltas.is_empty());
    }
}
