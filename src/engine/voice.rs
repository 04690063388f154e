//! Per-channel pitch and level state shared by the tracker engines
//!
//! [`Pitch`] turns the interpreter's note into an oscillator step each tick:
//! inertia slews toward the table value, bend accumulates, vibrato adds a sine
//! offset. [`Level`] is a volume with a linear per-tick fade.

use crate::tables;

/// Slew `current` toward `target` by at most `inertia`.
///
/// The move is sign-preserving and never overshoots: when the distance is
/// within `inertia` the result is exactly `target`.
#[inline]
pub fn slew(current: u16, target: u16, inertia: u16) -> u16 {
    let diff = i32::from(target) - i32::from(current);
    let limit = i32::from(inertia);
    let step = diff.clamp(-limit, limit);
    (i32::from(current) + step) as u16
}

/// Pitch state of one channel
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Pitch {
    /// Note selected by the instrument program (index into the step table)
    pub note: u8,
    /// Slewed step, follows the table value through inertia
    pub slur: u16,
    /// Maximum step change per tick, 0 = snap
    pub inertia: u16,
    /// Accumulated pitch bend
    pub bend: i16,
    /// Bend added per tick
    pub bend_rate: i16,
    /// Vibrato depth (0-15)
    pub vibrato_depth: u8,
    /// Vibrato phase increment per tick
    pub vibrato_rate: u8,
    /// Free-running vibrato phase
    pub vibrato_pos: u8,
}

impl Pitch {
    /// Create a silent pitch state
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear bend and vibrato for a new note; the slewed step is kept so
    /// inertia glides from the previous note.
    pub fn retrigger(&mut self) {
        self.bend = 0;
        self.bend_rate = 0;
        self.vibrato_depth = 0;
    }

    /// Set vibrato from a packed `depth << 4 | rate` parameter.
    ///
    /// The phase restarts only when the depth changes.
    pub fn set_vibrato(&mut self, param: u8) {
        let depth = param >> 4;
        if self.vibrato_depth != depth {
            self.vibrato_pos = 0;
        }
        self.vibrato_depth = depth;
        self.vibrato_rate = param & 15;
    }

    /// Current vibrato offset in step units
    #[inline]
    pub fn vibrato_offset(&self) -> i32 {
        (i32::from(self.vibrato_depth) * i32::from(tables::sine(self.vibrato_pos))) >> 2
    }

    /// Advance one tick toward `target` and return the oscillator step.
    ///
    /// `bend_scale` multiplies the bend rate before accumulation.
    pub fn update(&mut self, target: u16, bend_scale: i16) -> i32 {
        self.slur = if self.inertia > 0 {
            slew(self.slur, target, self.inertia)
        } else {
            target
        };
        let step = i32::from(self.slur) + i32::from(self.bend) + self.vibrato_offset();
        self.bend = self
            .bend
            .wrapping_add(self.bend_rate.wrapping_mul(bend_scale));
        self.vibrato_pos = self.vibrato_pos.wrapping_add(self.vibrato_rate);
        step
    }
}

/// Volume (0-255) with a signed per-tick fade
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Level {
    /// Current volume
    pub volume: u8,
    /// Added every tick, result clamped to 0..=255
    pub fade: i8,
}

impl Level {
    /// Apply one tick of fade.
    #[inline]
    pub fn update(&mut self) {
        let next = i16::from(self.volume) + i16::from(self.fade);
        self.volume = next.clamp(0, 255) as u8;
    }

    /// Mute and stop fading.
    #[inline]
    pub fn cut(&mut self) {
        self.volume = 0;
        self.fade = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slew_limits_and_lands() {
        assert_eq!(slew(100, 200, 30), 130);
        assert_eq!(slew(200, 100, 30), 170);
        assert_eq!(slew(100, 120, 30), 120, "close targets are reached exactly");
        assert_eq!(slew(120, 100, 30), 100);
        assert_eq!(slew(100, 100, 30), 100);
    }

    #[test]
    fn test_inertia_moves_at_most_inertia_per_tick() {
        let mut pitch = Pitch::new();
        pitch.slur = 0x0100;
        pitch.inertia = 0x40;
        let target = 0x0200;

        let mut last = pitch.slur;
        while pitch.slur != target {
            pitch.update(target, 1);
            let moved = pitch.slur - last;
            assert!(moved <= 0x40, "moved {moved:#x}");
            last = pitch.slur;
        }
        assert_eq!(pitch.update(target, 1), i32::from(target));
    }

    #[test]
    fn test_bend_accumulates_after_use() {
        let mut pitch = Pitch::new();
        pitch.bend_rate = 2;
        assert_eq!(pitch.update(1000, 8), 1000, "bend applies from the next tick");
        assert_eq!(pitch.update(1000, 8), 1016);
        assert_eq!(pitch.update(1000, 8), 1032);
    }

    #[test]
    fn test_vibrato_phase_resets_on_depth_change() {
        let mut pitch = Pitch::new();
        pitch.set_vibrato(0x21);
        pitch.update(500, 1);
        pitch.update(500, 1);
        assert_eq!(pitch.vibrato_pos, 2);

        pitch.set_vibrato(0x23);
        assert_eq!(pitch.vibrato_pos, 2, "same depth keeps phase");
        pitch.set_vibrato(0x43);
        assert_eq!(pitch.vibrato_pos, 0, "new depth restarts phase");
        assert_eq!(pitch.vibrato_rate, 3);
    }

    #[test]
    fn test_level_fade_clamps() {
        let mut level = Level {
            volume: 250,
            fade: 10,
        };
        level.update();
        assert_eq!(level.volume, 255);
        level.fade = -128;
        level.update();
        level.update();
        assert_eq!(level.volume, 0);
    }
}
