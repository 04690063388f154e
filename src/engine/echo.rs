//! Stereo widening echo shared by every backend's final mix

use crate::backend::StereoFrame;
use crate::config::EchoConfig;

/// Delay line length in frames (power of two)
pub const DELAY_LEN: usize = 512;

/// Single-tap feedback delay
///
/// Each side is halved and mixed with a tap of the delay line, the left side
/// reading half a line further back than the right. The line is fed with the
/// mono sum scaled by the feedback gain, plus its own old content at half that
/// gain.
#[derive(Clone, Debug)]
pub struct Expander {
    delay: Box<[i16; DELAY_LEN]>,
    pos: usize,
    enabled: bool,
    feedback: f32,
}

impl Expander {
    /// Create an expander from its configuration
    pub fn new(config: &EchoConfig) -> Self {
        Self {
            delay: Box::new([0; DELAY_LEN]),
            pos: 0,
            enabled: config.enabled,
            feedback: config.feedback,
        }
    }

    /// Whether frames are modified at all
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Empty the delay line.
    pub fn reset(&mut self) {
        self.delay.fill(0);
        self.pos = 0;
    }

    /// Process one frame.
    pub fn process(&mut self, frame: StereoFrame) -> StereoFrame {
        if !self.enabled {
            return frame;
        }
        let mask = DELAY_LEN - 1;
        let left = (frame.left >> 1) + (self.delay[(self.pos + DELAY_LEN / 2) & mask] >> 1);
        let right = (frame.right >> 1) + (self.delay[self.pos & mask] >> 1);

        let old = (self.pos + DELAY_LEN - 1) & mask;
        let mono = (i32::from(frame.left) + i32::from(frame.right)) >> 1;
        let fed = f32::from(self.delay[old]) * (self.feedback / 2.0) + mono as f32 * self.feedback;
        self.delay[old] = fed.clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        self.pos = (self.pos + 1) & mask;

        StereoFrame { left, right }
    }

    /// Process a block of frames in place.
    pub fn process_block(&mut self, frames: &mut [StereoFrame]) {
        if !self.enabled {
            return;
        }
        for frame in frames.iter_mut() {
            *frame = self.process(*frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(left: i16, right: i16) -> StereoFrame {
        StereoFrame { left, right }
    }

    #[test]
    fn test_disabled_passes_through() {
        let mut echo = Expander::new(&EchoConfig {
            enabled: false,
            feedback: 0.6,
        });
        let input = frame(1234, -4321);
        assert_eq!(echo.process(input), input);
    }

    #[test]
    fn test_first_frame_is_halved() {
        let mut echo = Expander::new(&EchoConfig::default());
        assert_eq!(echo.process(frame(1000, -1000)), frame(500, -500));
    }

    #[test]
    fn test_impulse_echoes_on_both_sides() {
        let mut echo = Expander::new(&EchoConfig {
            enabled: true,
            feedback: 0.5,
        });
        let first = echo.process(frame(10_000, 10_000));
        assert_eq!(first, frame(5_000, 5_000));

        let mut right_echo = None;
        let mut left_echo = None;
        for n in 1..DELAY_LEN + 2 {
            let out = echo.process(frame(0, 0));
            if out.right != 0 && right_echo.is_none() {
                right_echo = Some(n);
            }
            if out.left != 0 && left_echo.is_none() {
                left_echo = Some(n);
            }
        }
        // Written one slot behind the cursor, read back a full line later
        assert_eq!(right_echo, Some(DELAY_LEN - 1));
        assert_eq!(left_echo, Some(DELAY_LEN / 2 - 1));
    }

    #[test]
    fn test_silence_stays_silent() {
        let mut echo = Expander::new(&EchoConfig::default());
        let mut block = vec![frame(0, 0); 2048];
        echo.process_block(&mut block);
        assert!(block.iter().all(|f| *f == frame(0, 0)));
    }
}
