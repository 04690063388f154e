//! Per-channel windowed-sinc FIR filters
//!
//! [`FirBank`] precomputes one low-pass kernel per cutoff byte. A
//! [`ChannelFilter`] combines two of them into a band-pass (high cutoff minus
//! low cutoff) and convolves each stereo side of one channel.

/// Taps per kernel (odd, centred)
pub const FIR_TAPS: usize = 31;

/// Cutoff frequency in Hz for a cutoff byte; 255 is the Nyquist frequency of
/// 44.1 kHz output.
pub fn cutoff_hz(cutoff: u8) -> f64 {
    if cutoff == 255 {
        22_050.0
    } else {
        16.42 + 1.029_410_639_f64.powi(90 + i32::from(cutoff))
    }
}

/// Low-pass kernels for all 256 cutoff bytes
#[derive(Clone, Debug)]
pub struct FirBank {
    kernels: Vec<[f32; FIR_TAPS]>,
}

impl FirBank {
    /// Design the kernels for output at `sample_rate`.
    pub fn new(sample_rate: u32) -> Self {
        use std::f64::consts::PI;

        let rate = f64::from(sample_rate.max(1));
        let half = (FIR_TAPS as i32 - 1) / 2;
        let kernels = (0..=255u8)
            .map(|cutoff| {
                let freq = cutoff_hz(cutoff);
                let mut taps = [0f32; FIR_TAPS];
                for (j, tap) in taps.iter_mut().enumerate() {
                    let i = j as i32 - half;
                    let window = 0.5 - 0.5 * ((2.0 * PI * (j as f64 + 1.0)) / FIR_TAPS as f64).cos();
                    let b = 2.0 * freq * f64::from(i) / rate;
                    let sinc = if b == 0.0 { 1.0 } else { (PI * b).sin() / (PI * b) };
                    *tap = (window * (2.0 * freq / rate) * sinc) as f32;
                }
                taps
            })
            .collect();
        Self { kernels }
    }

    /// Kernel for one cutoff byte
    #[inline]
    pub fn kernel(&self, cutoff: u8) -> &[f32; FIR_TAPS] {
        &self.kernels[cutoff as usize]
    }
}

/// Filter state of one channel, both stereo sides
#[derive(Clone, Debug)]
pub struct ChannelFilter {
    kernel: [f32; FIR_TAPS],
    history: [[f32; FIR_TAPS]; 2],
    pos: [usize; 2],
    low: u8,
    high: u8,
}

impl ChannelFilter {
    /// Filter with the widest pass band (low 0, high 255).
    pub fn new(bank: &FirBank) -> Self {
        let mut filter = Self {
            kernel: [0.0; FIR_TAPS],
            history: [[0.0; FIR_TAPS]; 2],
            pos: [0; 2],
            low: 0,
            high: 255,
        };
        filter.set_cutoff(bank, 0, 255);
        filter
    }

    /// Rebuild the kernel as `kernel[high] - kernel[low]`, or plain
    /// `kernel[high]` when `low` is zero.
    pub fn set_cutoff(&mut self, bank: &FirBank, low: u8, high: u8) {
        self.low = low;
        self.high = high;
        let upper = bank.kernel(high);
        if low == 0 {
            self.kernel = *upper;
        } else {
            let lower = bank.kernel(low);
            for ((tap, hi), lo) in self.kernel.iter_mut().zip(upper).zip(lower) {
                *tap = hi - lo;
            }
        }
    }

    /// Current low cutoff byte
    pub fn low(&self) -> u8 {
        self.low
    }

    /// Current high cutoff byte
    pub fn high(&self) -> u8 {
        self.high
    }

    /// Zero the history of both sides.
    pub fn reset(&mut self) {
        self.history = [[0.0; FIR_TAPS]; 2];
        self.pos = [0; 2];
    }

    /// Filter one sample of `side` (0 = left, 1 = right).
    pub fn process(&mut self, input: i16, side: usize) -> i16 {
        let side = side & 1;
        let buf = &mut self.history[side];
        let mut pos = self.pos[side];
        buf[pos] = f32::from(input);
        pos = (pos + 1) % FIR_TAPS;
        self.pos[side] = pos;

        // Oldest sample first
        let out: f32 = self
            .kernel
            .iter()
            .enumerate()
            .map(|(i, tap)| buf[(pos + i) % FIR_TAPS] * tap)
            .sum();
        out.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cutoff_curve() {
        assert_relative_eq!(cutoff_hz(255), 22_050.0);
        assert!(cutoff_hz(0) < cutoff_hz(100));
        assert!(cutoff_hz(100) < cutoff_hz(254));
        assert_relative_eq!(cutoff_hz(0), 16.42 + 1.029_410_639_f64.powi(90), epsilon = 1e-9);
    }

    #[test]
    fn test_open_filter_is_near_identity() {
        let bank = FirBank::new(44_100);
        let kernel = bank.kernel(255);
        let centre = FIR_TAPS / 2;
        for (i, tap) in kernel.iter().enumerate() {
            if i == centre {
                assert!(*tap > 0.99, "centre tap {tap}");
            } else {
                assert!(tap.abs() < 1e-4, "tap {i} should vanish, got {tap}");
            }
        }
    }

    #[test]
    fn test_low_pass_passes_dc() {
        let bank = FirBank::new(44_100);
        let gain: f32 = bank.kernel(200).iter().sum();
        assert_relative_eq!(gain, 1.0, epsilon = 0.1);
    }

    #[test]
    fn test_band_pass_blocks_dc() {
        let bank = FirBank::new(44_100);
        let mut filter = ChannelFilter::new(&bank);
        filter.set_cutoff(&bank, 200, 255);
        let mut last = 0;
        for _ in 0..FIR_TAPS * 2 {
            last = filter.process(10_000, 0);
        }
        assert!(last.abs() < 2_000, "constant input mostly removed, got {last}");
    }

    #[test]
    fn test_sides_are_independent() {
        let bank = FirBank::new(44_100);
        let mut filter = ChannelFilter::new(&bank);
        for _ in 0..FIR_TAPS {
            filter.process(8_000, 0);
        }
        assert_eq!(filter.process(0, 1), 0, "right side never saw input");
    }
}
