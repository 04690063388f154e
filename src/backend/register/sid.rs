//! SID-style voice emulation
//!
//! Three voices read their settings from a [`SidRegisters`] bank. Each voice
//! has a 24-bit phase accumulator clocked once per chip cycle, four waveforms
//! that combine by AND, hard sync and ring modulation from the previous voice
//! and an ADSR envelope with the piecewise exponential decay of the original
//! part.
//!
//! ## Register map
//!
//! | offset           | register                       |
//! |------------------|--------------------------------|
//! | `v*7 + 0..=1`    | frequency, little endian       |
//! | `v*7 + 2..=3`    | pulse width (12 bits), LE      |
//! | `v*7 + 4`        | control ([`ControlRegister`])  |
//! | `v*7 + 5`        | attack / decay                 |
//! | `v*7 + 6`        | sustain / release              |
//! | `0x18`           | master volume (low nibble)     |

use bitflags::bitflags;

/// Size of the register bank
pub const REGISTER_COUNT: usize = 0x20;
/// Voices
pub const VOICES: usize = 3;
/// Register stride between voices
pub const VOICE_STRIDE: usize = 7;
/// Frequency register offset inside a voice
pub const FREQUENCY: usize = 0;
/// Pulse width register offset inside a voice
pub const PULSE_WIDTH: usize = 2;
/// Control register offset inside a voice
pub const CONTROL: usize = 4;
/// Attack/decay register offset inside a voice
pub const ATTACK_DECAY: usize = 5;
/// Sustain/release register offset inside a voice
pub const SUSTAIN_RELEASE: usize = 6;
/// Master volume register
pub const MODE_VOLUME: usize = 0x18;

/// Divisor bringing three full-scale voices into 16-bit range
const OUTPUT_DIVISOR: i64 = 48;

/// Cycles per envelope step for each rate nibble
const RATE_PERIODS: [u16; 16] = [
    9, 32, 63, 95, 149, 220, 267, 313, 392, 977, 1954, 3126, 3907, 11720, 19532, 31251,
];

const NOISE_SEED: u32 = 0x7f_fff8;
const ACCUMULATOR_MASK: u32 = 0xff_ffff;
const ACCUMULATOR_MSB: u32 = 0x80_0000;
const NOISE_CLOCK_BIT: u32 = 0x08_0000;

bitflags! {
    /// Voice control register
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlRegister: u8 {
        /// Envelope gate
        const GATE = 0x01;
        /// Hard sync to the previous voice
        const SYNC = 0x02;
        /// Ring modulate the triangle with the previous voice
        const RING = 0x04;
        /// Hold the oscillator at zero
        const TEST = 0x08;
        /// Triangle waveform
        const TRIANGLE = 0x10;
        /// Sawtooth waveform
        const SAWTOOTH = 0x20;
        /// Pulse waveform
        const PULSE = 0x40;
        /// Noise waveform
        const NOISE = 0x80;
    }
}

/// Register address of a voice register
#[inline]
pub const fn voice_register(voice: usize, offset: usize) -> usize {
    voice * VOICE_STRIDE + offset
}

/// Register file written by the playroutine and read by the voices
#[derive(Debug, Clone)]
pub struct SidRegisters {
    bytes: [u8; REGISTER_COUNT],
}

impl Default for SidRegisters {
    fn default() -> Self {
        let mut bytes = [0; REGISTER_COUNT];
        bytes[MODE_VOLUME] = 0x0f;
        Self { bytes }
    }
}

impl SidRegisters {
    /// Bank with everything cleared and full master volume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a register; out-of-range addresses read as zero.
    #[inline]
    pub fn read(&self, addr: usize) -> u8 {
        self.bytes.get(addr).copied().unwrap_or(0)
    }

    /// Write a register; out-of-range addresses are ignored.
    #[inline]
    pub fn write(&mut self, addr: usize, value: u8) {
        if let Some(slot) = self.bytes.get_mut(addr) {
            *slot = value;
        }
    }

    /// Read a little-endian register pair.
    #[inline]
    pub fn read_u16_le(&self, addr: usize) -> u16 {
        u16::from_le_bytes([self.read(addr), self.read(addr + 1)])
    }

    /// Write a little-endian register pair.
    #[inline]
    pub fn write_u16_le(&mut self, addr: usize, value: u16) {
        let [lo, hi] = value.to_le_bytes();
        self.write(addr, lo);
        self.write(addr + 1, hi);
    }

    /// Control register of a voice
    #[inline]
    pub fn control(&self, voice: usize) -> ControlRegister {
        ControlRegister::from_bits_retain(self.read(voice_register(voice, CONTROL)))
    }

    /// Clear every register and restore full volume.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Stage {
    Attack,
    DecaySustain,
    #[default]
    Release,
}

#[derive(Debug, Clone, Default)]
struct Envelope {
    stage: Stage,
    level: u8,
    rate_counter: u16,
    exponential_counter: u8,
    gate: bool,
}

impl Envelope {
    fn clock(&mut self, gate: bool, attack_decay: u8, sustain_release: u8) {
        if gate != self.gate {
            self.gate = gate;
            self.stage = if gate { Stage::Attack } else { Stage::Release };
        }
        let rate = match self.stage {
            Stage::Attack => attack_decay >> 4,
            Stage::DecaySustain => attack_decay & 0x0f,
            Stage::Release => sustain_release & 0x0f,
        };
        self.rate_counter += 1;
        if self.rate_counter < RATE_PERIODS[usize::from(rate)] {
            return;
        }
        self.rate_counter = 0;

        match self.stage {
            Stage::Attack => {
                self.exponential_counter = 0;
                self.level = self.level.saturating_add(1);
                if self.level == u8::MAX {
                    self.stage = Stage::DecaySustain;
                }
            }
            Stage::DecaySustain => {
                let sustain = (sustain_release >> 4) * 0x11;
                if self.level > sustain && self.exponential_step() {
                    self.level -= 1;
                }
            }
            Stage::Release => {
                if self.level > 0 && self.exponential_step() {
                    self.level -= 1;
                }
            }
        }
    }

    /// Decay and release slow down as the level falls.
    fn exponential_step(&mut self) -> bool {
        let period = match self.level {
            93..=u8::MAX => 1,
            54..=92 => 2,
            26..=53 => 4,
            14..=25 => 8,
            6..=13 => 16,
            _ => 30,
        };
        self.exponential_counter += 1;
        if self.exponential_counter >= period {
            self.exponential_counter = 0;
            true
        } else {
            false
        }
    }
}

#[derive(Debug, Clone)]
struct Voice {
    accumulator: u32,
    noise: u32,
    msb_rising: bool,
    envelope: Envelope,
}

impl Default for Voice {
    fn default() -> Self {
        Self {
            accumulator: 0,
            noise: NOISE_SEED,
            msb_rising: false,
            envelope: Envelope::default(),
        }
    }
}

impl Voice {
    fn clock_oscillator(&mut self, frequency: u16, control: ControlRegister) {
        if control.contains(ControlRegister::TEST) {
            self.accumulator = 0;
            self.noise = NOISE_SEED;
            self.msb_rising = false;
            return;
        }
        let previous = self.accumulator;
        self.accumulator = (previous + u32::from(frequency)) & ACCUMULATOR_MASK;
        self.msb_rising = previous & ACCUMULATOR_MSB == 0 && self.accumulator & ACCUMULATOR_MSB != 0;
        if previous & NOISE_CLOCK_BIT == 0 && self.accumulator & NOISE_CLOCK_BIT != 0 {
            let feedback = ((self.noise >> 22) ^ (self.noise >> 17)) & 1;
            self.noise = ((self.noise << 1) | feedback) & 0x7f_ffff;
        }
    }

    fn noise_output(&self) -> u16 {
        let n = self.noise;
        let bit = |from: u32, to: u32| (((n >> from) & 1) << to) as u16;
        bit(22, 11) | bit(20, 10) | bit(16, 9) | bit(13, 8) | bit(11, 7) | bit(7, 6) | bit(4, 5) | bit(2, 4)
    }

    /// 12-bit waveform output, `None` when no waveform is selected.
    fn waveform(&self, control: ControlRegister, pulse_width: u16, ring_msb: bool) -> Option<u16> {
        let mut out: Option<u16> = None;
        let mut combine = |value: u16| out = Some(out.map_or(value, |o| o & value));

        if control.contains(ControlRegister::TRIANGLE) {
            let mut msb = self.accumulator & ACCUMULATOR_MSB != 0;
            if control.contains(ControlRegister::RING) {
                msb ^= ring_msb;
            }
            let folded = if msb { !self.accumulator } else { self.accumulator };
            combine(((folded >> 11) & 0x0fff) as u16);
        }
        if control.contains(ControlRegister::SAWTOOTH) {
            combine((self.accumulator >> 12) as u16);
        }
        if control.contains(ControlRegister::PULSE) {
            let high = control.contains(ControlRegister::TEST)
                || (self.accumulator >> 12) as u16 >= (pulse_width & 0x0fff);
            combine(if high { 0x0fff } else { 0 });
        }
        if control.contains(ControlRegister::NOISE) {
            combine(self.noise_output());
        }
        out
    }
}

/// Three voices mixed to one output
#[derive(Debug, Clone, Default)]
pub struct Sid {
    voices: [Voice; VOICES],
}

impl Sid {
    /// Voices at rest with the noise registers seeded.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return to the power-on state.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Envelope level (0-255) of a voice
    pub fn envelope_level(&self, voice: usize) -> u8 {
        self.voices.get(voice).map_or(0, |v| v.envelope.level)
    }

    /// Run `cycles` chip cycles and return their averaged mix scaled by the
    /// master volume.
    pub fn clock(&mut self, cycles: u32, registers: &SidRegisters) -> i16 {
        if cycles == 0 {
            return 0;
        }
        let mut frequency = [0u16; VOICES];
        let mut pulse_width = [0u16; VOICES];
        let mut control = [ControlRegister::empty(); VOICES];
        let mut attack_decay = [0u8; VOICES];
        let mut sustain_release = [0u8; VOICES];
        for v in 0..VOICES {
            frequency[v] = registers.read_u16_le(voice_register(v, FREQUENCY));
            pulse_width[v] = registers.read_u16_le(voice_register(v, PULSE_WIDTH));
            control[v] = registers.control(v);
            attack_decay[v] = registers.read(voice_register(v, ATTACK_DECAY));
            sustain_release[v] = registers.read(voice_register(v, SUSTAIN_RELEASE));
        }

        let mut sum: i64 = 0;
        for _ in 0..cycles {
            for (v, voice) in self.voices.iter_mut().enumerate() {
                voice.clock_oscillator(frequency[v], control[v]);
            }
            let rising = self.voices.each_ref().map(|v| v.msb_rising);
            let msb = self.voices.each_ref().map(|v| v.accumulator & ACCUMULATOR_MSB != 0);

            for (v, voice) in self.voices.iter_mut().enumerate() {
                let source = (v + VOICES - 1) % VOICES;
                if control[v].contains(ControlRegister::SYNC) && rising[source] {
                    voice.accumulator = 0;
                }
                voice.envelope.clock(
                    control[v].contains(ControlRegister::GATE),
                    attack_decay[v],
                    sustain_release[v],
                );
                if let Some(wave) = voice.waveform(control[v], pulse_width[v], msb[source]) {
                    sum += (i64::from(wave) - 0x800) * i64::from(voice.envelope.level);
                }
            }
        }

        let volume = i64::from(registers.read(MODE_VOLUME) & 0x0f);
        let mixed = sum / i64::from(cycles) * volume / 15 / OUTPUT_DIVISOR;
        mixed.clamp(i64::from(i16::MIN), i64::from(i16::MAX)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gated(voice: usize, waveform: ControlRegister) -> SidRegisters {
        let mut regs = SidRegisters::new();
        regs.write_u16_le(voice_register(voice, FREQUENCY), 0x1cd6);
        regs.write_u16_le(voice_register(voice, PULSE_WIDTH), 0x0800);
        regs.write(voice_register(voice, CONTROL), (waveform | ControlRegister::GATE).bits());
        regs.write(voice_register(voice, SUSTAIN_RELEASE), 0xf0);
        regs
    }

    #[test]
    fn test_register_pairs_are_little_endian() {
        let mut regs = SidRegisters::new();
        regs.write_u16_le(7, 0x1234);
        assert_eq!(regs.read(7), 0x34);
        assert_eq!(regs.read(8), 0x12);
        assert_eq!(regs.read_u16_le(7), 0x1234);
        assert_eq!(regs.read(MODE_VOLUME), 0x0f, "full volume after reset");
        regs.write(REGISTER_COUNT + 4, 1);
        assert_eq!(regs.read(REGISTER_COUNT + 4), 0);
    }

    #[test]
    fn test_idle_chip_is_silent() {
        let mut sid = Sid::new();
        let regs = SidRegisters::new();
        for _ in 0..100 {
            assert_eq!(sid.clock(22, &regs), 0);
        }
    }

    #[test]
    fn test_attack_reaches_full_then_sustains() {
        let mut sid = Sid::new();
        let mut regs = gated(0, ControlRegister::TRIANGLE);
        regs.write(voice_register(0, SUSTAIN_RELEASE), 0x80);
        sid.clock(255 * 9, &regs);
        assert_eq!(sid.envelope_level(0), 255);
        sid.clock(100_000, &regs);
        assert_eq!(sid.envelope_level(0), 0x88, "decays to the sustain level");
    }

    #[test]
    fn test_release_falls_to_zero() {
        let mut sid = Sid::new();
        let mut regs = gated(1, ControlRegister::SAWTOOTH);
        sid.clock(10_000, &regs);
        assert_eq!(sid.envelope_level(1), 255);
        regs.write(voice_register(1, CONTROL), ControlRegister::SAWTOOTH.bits());
        sid.clock(100_000, &regs);
        assert_eq!(sid.envelope_level(1), 0);
    }

    #[test]
    fn test_gated_pulse_is_audible() {
        let mut sid = Sid::new();
        let regs = gated(2, ControlRegister::PULSE);
        let samples: Vec<i16> = (0..2000).map(|_| sid.clock(22, &regs)).collect();
        let peak = samples.iter().map(|s| s.unsigned_abs()).max().unwrap_or(0);
        assert!(peak > 5_000, "peak {peak}");
    }

    #[test]
    fn test_master_volume_scales_output() {
        let mut loud = Sid::new();
        let mut quiet = Sid::new();
        let regs = gated(0, ControlRegister::PULSE);
        let mut low = regs.clone();
        low.write(MODE_VOLUME, 0);
        for _ in 0..500 {
            loud.clock(22, &regs);
            assert_eq!(quiet.clock(22, &low), 0);
        }
        assert_ne!(loud.clock(22, &regs), 0);
    }

    #[test]
    fn test_test_bit_holds_oscillator() {
        let mut sid = Sid::new();
        let regs = gated(0, ControlRegister::SAWTOOTH | ControlRegister::TEST);
        sid.clock(1000, &regs);
        assert_eq!(sid.voices[0].accumulator, 0);
    }

    #[test]
    fn test_hard_sync_resets_follower() {
        let mut sid = Sid::new();
        let mut regs = SidRegisters::new();
        // voice 2 is the sync source of voice 0
        regs.write_u16_le(voice_register(2, FREQUENCY), 0x8000);
        regs.write_u16_le(voice_register(0, FREQUENCY), 0x0100);
        regs.write(voice_register(0, CONTROL), ControlRegister::SYNC.bits());
        sid.clock(0x100, &regs);
        assert!(
            sid.voices[0].accumulator < 0x100 * 0x100,
            "voice 0 restarted when voice 2 wrapped"
        );
    }
}
