//! Waveform generators for the tracker engines
//!
//! This module contains the level functions and noise sources:
//! - Simple engine: 16-bit phase, 6-bit signed levels, shared 32-bit LFSR
//! - Band-limited engine: 32-step phase, 4-bit signed levels, per-voice
//!   selectable-length LFSR, custom wavetables

use crate::tables::BUZZ_FEED;
use bitflags::bitflags;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;

/// Waveform selector of the simple engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromPrimitive)]
pub enum SimpleWave {
    /// Symmetric triangle
    Triangle = 0,
    /// Rising sawtooth
    Saw = 1,
    /// Pulse with variable duty
    Pulse = 2,
    /// Shared noise register
    Noise = 3,
}

impl SimpleWave {
    /// Decode a waveform byte; unknown values are silent.
    pub fn from_byte(value: u8) -> Option<Self> {
        Self::from_u8(value)
    }
}

/// Level of a simple-engine oscillator in [-32, 31].
///
/// `phase` and `duty` are 16-bit fractions of one period; `noise` is the
/// current state of the shared [`NoiseLfsr`].
#[inline]
pub fn simple_level(wave: Option<SimpleWave>, phase: u16, duty: u16, noise: u32) -> i8 {
    match wave {
        Some(SimpleWave::Triangle) => {
            if phase < 0x8000 {
                -32 + (phase >> 9) as i8
            } else {
                31 - ((phase - 0x8000) >> 9) as i8
            }
        }
        Some(SimpleWave::Saw) => -32 + (phase >> 10) as i8,
        Some(SimpleWave::Pulse) => {
            if phase > duty {
                -32
            } else {
                31
            }
        }
        Some(SimpleWave::Noise) => (noise & 63) as i8 - 32,
        None => 0,
    }
}

/// 32-bit noise register shared by all simple-engine voices
///
/// Shifts left once every `period` output samples, feeding back the parity
/// of bits 31, 24, 9 and 6.
#[derive(Clone, Debug)]
pub struct NoiseLfsr {
    seed: u32,
    countdown: u8,
    period: u8,
}

impl NoiseLfsr {
    const TAPS: u32 = 0x8000_0000 | 0x0100_0000 | 0x0000_0200 | 0x0000_0040;

    /// Create a register clocked every `period` samples
    pub fn new(period: u8) -> Self {
        Self {
            seed: 1,
            countdown: 0,
            period: period.max(1),
        }
    }

    /// Advance one output sample and return the register state
    #[inline]
    pub fn tick(&mut self) -> u32 {
        if self.countdown > 0 {
            self.countdown -= 1;
        } else {
            let feedback = (self.seed & Self::TAPS).count_ones() & 1;
            self.seed = (self.seed << 1) | feedback;
            self.countdown = self.period - 1;
        }
        self.seed
    }

    /// Current register state
    #[inline]
    pub fn value(&self) -> u32 {
        self.seed
    }

    /// Reseed to the power-on state
    pub fn reset(&mut self) {
        self.seed = 1;
        self.countdown = 0;
    }
}

bitflags! {
    /// Waveform selector of the band-limited engine
    ///
    /// Several shape bits may be set; later shapes in the order triangle,
    /// saw, pulse, noise, wavetable override earlier ones. The high nibble
    /// selects a custom wavetable when non-zero.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct WaveformFlags: u8 {
        /// Pulse, compared against duty
        const PULSE = 0x01;
        /// Sawtooth
        const SAW = 0x02;
        /// Triangle
        const TRIANGLE = 0x04;
        /// Noise from the voice's shift register
        const NOISE = 0x08;
        /// Custom wavetable, index in the high nibble
        const WAVE = 0xF0;
    }
}

impl WaveformFlags {
    /// Decode a waveform byte, keeping every bit
    #[inline]
    pub fn from_byte(value: u8) -> Self {
        Self::from_bits_retain(value)
    }

    /// Custom wavetable index, when one is selected
    #[inline]
    pub fn wave_table(self) -> Option<usize> {
        let index = (self.bits() >> 4) as usize;
        (index != 0).then_some(index)
    }
}

/// Per-voice noise register of the band-limited engine
///
/// Galois LFSR whose feedback mask (and so its length, 4 to 28 bits) is
/// chosen by the voice's duty value.
#[derive(Clone, Debug)]
pub struct BuzzLfsr {
    seed: u32,
}

impl Default for BuzzLfsr {
    fn default() -> Self {
        Self::new()
    }
}

impl BuzzLfsr {
    /// Create a register in its power-on state
    pub fn new() -> Self {
        Self { seed: 1 }
    }

    /// Clock once with feedback mask `length` (0-15) and return the new state
    #[inline]
    pub fn clock(&mut self, length: u8) -> u32 {
        self.seed = if self.seed & 1 != 0 {
            (self.seed >> 1) ^ BUZZ_FEED[(length & 15) as usize]
        } else {
            self.seed >> 1
        };
        if self.seed == 0 {
            self.seed = 1;
        }
        self.seed
    }

    /// Current register state
    #[inline]
    pub fn value(&self) -> u32 {
        self.seed
    }
}

/// Level of a band-limited oscillator in [-8, 7] for one 32-step phase.
///
/// Clocks the noise register when the noise bit is set, so call exactly once
/// per phase step.
pub fn multitable_level(
    waveform: WaveformFlags,
    phase: u8,
    duty: u8,
    noise: &mut BuzzLfsr,
    wave_tables: &[[u8; 32]],
) -> i8 {
    let phase = phase & 31;
    let mut value: i8 = -1;
    if waveform.contains(WaveformFlags::TRIANGLE) {
        value = if phase < 8 {
            (phase & 7) as i8
        } else if phase < 24 {
            15 - phase as i8
        } else {
            -8 + (phase & 7) as i8
        };
    }
    if waveform.contains(WaveformFlags::SAW) {
        value = -8 + (phase >> 1) as i8;
    }
    if waveform.contains(WaveformFlags::PULSE) {
        value = if (phase >> 1) > duty { 7 } else { -8 };
    }
    if waveform.contains(WaveformFlags::NOISE) {
        value = (noise.clock(duty) & 15) as i8 - 8;
    }
    if let Some(table) = waveform.wave_table() {
        if let Some(wave) = wave_tables.get(table) {
            value = wave[phase as usize] as i8 - 8;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_levels_cover_range() {
        let tri = Some(SimpleWave::Triangle);
        assert_eq!(simple_level(tri, 0, 0, 0), -32);
        assert_eq!(simple_level(tri, 0x7fff, 0, 0), 31);
        assert_eq!(simple_level(tri, 0xffff, 0, 0), -32);

        let saw = Some(SimpleWave::Saw);
        assert_eq!(simple_level(saw, 0, 0, 0), -32);
        assert_eq!(simple_level(saw, 0xffff, 0, 0), 31);

        let pulse = Some(SimpleWave::Pulse);
        assert_eq!(simple_level(pulse, 0x1000, 0x8000, 0), 31);
        assert_eq!(simple_level(pulse, 0x9000, 0x8000, 0), -32);

        assert_eq!(simple_level(Some(SimpleWave::Noise), 0, 0, 0x3f), 31);
        assert_eq!(simple_level(SimpleWave::from_byte(9), 0x1234, 0, 0), 0);
    }

    #[test]
    fn test_noise_lfsr_steps_every_period() {
        let mut noise = NoiseLfsr::new(4);
        let first = noise.tick();
        assert_eq!(first, 0b10, "seed 1 shifts with zero feedback");
        for _ in 0..3 {
            assert_eq!(noise.tick(), first);
        }
        assert_ne!(noise.tick(), first);
    }

    #[test]
    fn test_noise_lfsr_never_sticks() {
        let mut noise = NoiseLfsr::new(1);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(noise.tick() & 63);
        }
        assert!(seen.len() > 8, "noise should spread over levels");
    }

    #[test]
    fn test_buzz_lfsr_period_matches_length() {
        // Mask 0 is a maximal 4-bit register: 15 states
        let mut noise = BuzzLfsr::new();
        let start = noise.value();
        let mut period = 0;
        loop {
            period += 1;
            if noise.clock(0) == start {
                break;
            }
            assert!(period < 100, "register must cycle");
        }
        assert_eq!(period, 15);
    }

    #[test]
    fn test_multitable_shapes() {
        let mut noise = BuzzLfsr::new();
        let tables = vec![[8u8; 32]; 16];
        let tri = WaveformFlags::TRIANGLE;
        let levels: Vec<i8> = (0..32)
            .map(|p| multitable_level(tri, p, 0, &mut noise, &tables))
            .collect();
        assert_eq!(levels[0], 0);
        assert_eq!(levels[7], 7);
        assert_eq!(levels[8], 7);
        assert_eq!(levels[23], -8);
        assert_eq!(levels[31], -1);

        assert_eq!(
            multitable_level(WaveformFlags::SAW, 31, 0, &mut noise, &tables),
            7
        );
        assert_eq!(
            multitable_level(WaveformFlags::PULSE, 4, 3, &mut noise, &tables),
            -8
        );
        assert_eq!(
            multitable_level(WaveformFlags::empty(), 4, 3, &mut noise, &tables),
            -1
        );
    }

    #[test]
    fn test_wavetable_overrides_shapes() {
        let mut noise = BuzzLfsr::new();
        let mut tables = vec![[8u8; 32]; 16];
        tables[2][5] = 15;
        let waveform = WaveformFlags::from_byte(0x21);
        assert_eq!(waveform.wave_table(), Some(2));
        assert_eq!(multitable_level(waveform, 5, 0, &mut noise, &tables), 7);
        assert_eq!(multitable_level(waveform, 6, 0, &mut noise, &tables), 0);
    }
}
