//! Band-limited step synthesis
//!
//! Oscillators running at a high internal clock report every level change as
//! a signed delta at a clock timestamp. The buffer spreads each delta over a
//! short windowed-sinc step kernel at the exact sub-sample phase, and reading
//! integrates the deltas back into output samples. Hard pulse and saw edges
//! therefore come out without aliasing.

/// Fractional bits of the resampled time position
const TIME_BITS: u32 = 32;
/// Sub-sample kernel phases, as a bit count
const PHASE_BITS: u32 = 5;
const PHASE_COUNT: usize = 1 << PHASE_BITS;
/// Kernel taps per phase
const KERNEL_WIDTH: usize = 16;
/// Fixed-point bits of one kernel (taps of a phase sum to `1 << DELTA_BITS`)
const DELTA_BITS: u32 = 15;
/// Output high-pass strength; removes DC drift of the integrator
const BASS_SHIFT: u32 = 9;

/// Receiver of level changes at clock timestamps
pub trait DeltaSink {
    /// Add a level change of `delta` at `time` clocks into the current frame.
    fn add_delta(&mut self, time: u64, delta: i32);
}

/// Step kernels for every sub-sample phase
fn build_kernels() -> Vec<[i32; KERNEL_WIDTH]> {
    use std::f64::consts::PI;

    let half = (KERNEL_WIDTH / 2) as f64;
    let unit = f64::from(1u32 << DELTA_BITS);
    (0..PHASE_COUNT)
        .map(|phase| {
            let frac = phase as f64 / PHASE_COUNT as f64;
            let raw: Vec<f64> = (0..KERNEL_WIDTH)
                .map(|k| {
                    let x = k as f64 - (half - 1.0) - frac;
                    let sinc = if x.abs() < 1e-9 {
                        1.0
                    } else {
                        (PI * x).sin() / (PI * x)
                    };
                    let t = (x + half) / KERNEL_WIDTH as f64;
                    let window = 0.42 - 0.5 * (2.0 * PI * t).cos() + 0.08 * (4.0 * PI * t).cos();
                    sinc * window
                })
                .collect();

            let total: f64 = raw.iter().sum();
            let mut taps = [0i32; KERNEL_WIDTH];
            for (tap, value) in taps.iter_mut().zip(&raw) {
                *tap = (value / total * unit).round() as i32;
            }
            // Rounding residue goes to the strongest tap so each phase is exact
            let residue = (1i32 << DELTA_BITS) - taps.iter().sum::<i32>();
            if let Some(peak) = taps
                .iter_mut()
                .max_by_key(|tap| tap.abs())
            {
                *peak += residue;
            }
            taps
        })
        .collect()
}

/// Accumulation buffer converting clock-timed deltas into output samples
#[derive(Clone, Debug)]
pub struct BlipBuffer {
    factor: u64,
    offset: u64,
    integrator: i64,
    samples: Vec<i64>,
    kernels: Vec<[i32; KERNEL_WIDTH]>,
}

impl BlipBuffer {
    /// Create a buffer resampling `clock_rate` clocks per second to `sample_rate`.
    pub fn new(clock_rate: u64, sample_rate: u64) -> Self {
        let clock_rate = u128::from(clock_rate.max(1));
        let scaled = u128::from(sample_rate) << TIME_BITS;
        let factor = scaled.div_ceil(clock_rate) as u64;
        Self {
            factor,
            offset: 0,
            integrator: 0,
            samples: Vec::new(),
            kernels: build_kernels(),
        }
    }

    /// Discard all pending samples and deltas.
    pub fn clear(&mut self) {
        self.offset = 0;
        self.integrator = 0;
        self.samples.clear();
    }

    /// Close the current frame of `clocks` clocks, making its samples readable.
    ///
    /// Delta timestamps of the next frame restart at zero.
    pub fn end_frame(&mut self, clocks: u64) {
        self.offset += clocks * self.factor;
        let needed = self.samples_avail() + KERNEL_WIDTH;
        if self.samples.len() < needed {
            self.samples.resize(needed, 0);
        }
    }

    /// Complete samples ready to read
    #[inline]
    pub fn samples_avail(&self) -> usize {
        (self.offset >> TIME_BITS) as usize
    }

    /// Read up to `out.len()` samples, returning the number written.
    pub fn read_samples(&mut self, out: &mut [i16]) -> usize {
        let count = out.len().min(self.samples_avail());
        let mut sum = self.integrator;
        for (dst, &delta) in out.iter_mut().zip(&self.samples[..count]) {
            let level = (sum >> DELTA_BITS).clamp(i64::from(i16::MIN), i64::from(i16::MAX));
            sum += delta;
            *dst = level as i16;
            sum -= level << (DELTA_BITS - BASS_SHIFT);
        }
        self.integrator = sum;
        self.samples.drain(..count);
        self.offset -= (count as u64) << TIME_BITS;
        count
    }
}

impl DeltaSink for BlipBuffer {
    fn add_delta(&mut self, time: u64, delta: i32) {
        let fixed = time * self.factor + self.offset;
        let index = (fixed >> TIME_BITS) as usize;
        let phase = ((fixed >> (TIME_BITS - PHASE_BITS)) as usize) & (PHASE_COUNT - 1);
        let end = index + KERNEL_WIDTH;
        if self.samples.len() < end {
            self.samples.resize(end, 0);
        }
        let delta = i64::from(delta);
        for (slot, &tap) in self.samples[index..end].iter_mut().zip(&self.kernels[phase]) {
            *slot += i64::from(tap) * delta;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_phases_sum_to_unit() {
        for (phase, taps) in build_kernels().iter().enumerate() {
            assert_eq!(
                taps.iter().sum::<i32>(),
                1 << DELTA_BITS,
                "phase {phase} must integrate to one"
            );
        }
    }

    #[test]
    fn test_clock_to_sample_ratio() {
        let mut blip = BlipBuffer::new(44_100 * 256, 44_100);
        blip.end_frame(256 * 735);
        assert_eq!(blip.samples_avail(), 735);
    }

    #[test]
    fn test_step_settles_to_delta() {
        let mut blip = BlipBuffer::new(44_100 * 256, 44_100);
        blip.add_delta(0, 1000);
        blip.end_frame(256 * 64);
        let mut out = [0i16; 64];
        assert_eq!(blip.read_samples(&mut out), 64);
        assert!(
            (900..=1060).contains(&out[20]),
            "step should settle near its height, got {}",
            out[20]
        );
        assert!(out[63] < out[20], "high-pass slowly pulls the level back");
        assert_eq!(blip.samples_avail(), 0);
    }

    #[test]
    fn test_silence_reads_zero() {
        let mut blip = BlipBuffer::new(1_000_000, 44_100);
        blip.end_frame(1_000_000 / 100);
        let mut out = vec![1i16; blip.samples_avail()];
        let read = blip.read_samples(&mut out);
        assert_eq!(read, out.len());
        assert!(out.iter().all(|&s| s == 0));
    }

    #[test]
    fn test_partial_reads_keep_remainder() {
        let mut blip = BlipBuffer::new(44_100, 44_100);
        blip.end_frame(100);
        let mut out = [0i16; 30];
        assert_eq!(blip.read_samples(&mut out), 30);
        assert_eq!(blip.samples_avail(), 70);
        blip.clear();
        assert_eq!(blip.samples_avail(), 0);
    }
}
