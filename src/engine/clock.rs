//! Fractional tick clock
//!
//! Divides one time base into periods of another (output samples per tick,
//! chip cycles per sample, internal clocks per tick) without drift: the
//! fractional part of every period is carried in a running remainder instead
//! of being truncated.

/// Running-remainder period generator
///
/// A period of `num / den` units is produced as a sequence of integer lengths
/// whose sum after `k` periods is always `floor(k * num / den)`.
#[derive(Clone, Debug)]
pub struct TickClock {
    num: u64,
    den: u64,
    remainder: u64,
    countdown: u32,
}

impl TickClock {
    /// Clock firing `rate_hz` times per second on a `base_hz` time base.
    ///
    /// A zero rate is treated as one period per base second.
    pub fn from_rate(base_hz: u64, rate_hz: u64) -> Self {
        Self {
            num: base_hz.max(1),
            den: rate_hz.max(1),
            remainder: 0,
            countdown: 0,
        }
    }

    /// Clock with a fixed integer period.
    pub fn from_period(units: u64) -> Self {
        Self::from_rate(units, 1)
    }

    /// Length of the next period in base units.
    #[inline]
    pub fn next_period(&mut self) -> u32 {
        let total = self.remainder + self.num;
        self.remainder = total % self.den;
        (total / self.den) as u32
    }

    /// Step one base unit; returns true on the unit that starts a new period.
    ///
    /// The very first call after construction or [`reset`](Self::reset) fires.
    #[inline]
    pub fn advance(&mut self) -> bool {
        if self.countdown == 0 {
            self.countdown = self.next_period().max(1);
            self.countdown -= 1;
            true
        } else {
            self.countdown -= 1;
            false
        }
    }

    /// Exact period length as a float, for reporting.
    pub fn period(&self) -> f64 {
        self.num as f64 / self.den as f64
    }

    /// Forget the carried remainder and fire on the next [`advance`](Self::advance).
    pub fn reset(&mut self) {
        self.remainder = 0;
        self.countdown = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractional_periods_do_not_drift() {
        // 44100 / 50 Hz register ticks is exact, 44100 / 60 is exact, 44100 / 70 is not
        let mut clock = TickClock::from_rate(44_100, 70);
        let total: u64 = (0..70).map(|_| u64::from(clock.next_period())).sum();
        assert_eq!(total, 44_100, "one second of periods must add up exactly");
    }

    #[test]
    fn test_advance_fires_on_first_unit() {
        let mut clock = TickClock::from_period(4);
        let fired: Vec<bool> = (0..9).map(|_| clock.advance()).collect();
        assert_eq!(
            fired,
            vec![true, false, false, false, true, false, false, false, true]
        );
    }

    #[test]
    fn test_cycles_per_sample() {
        let mut clock = TickClock::from_rate(985_248, 44_100);
        let periods: Vec<u32> = (0..100).map(|_| clock.next_period()).collect();
        assert!(periods.iter().all(|&p| p == 22 || p == 23));
        let total: u32 = periods.iter().sum();
        assert_eq!(total, (985_248u64 * 100 / 44_100) as u32);
    }

    #[test]
    fn test_reset() {
        let mut clock = TickClock::from_period(3);
        assert!(clock.advance());
        assert!(!clock.advance());
        clock.reset();
        assert!(clock.advance(), "reset re-arms the clock");
    }
}
