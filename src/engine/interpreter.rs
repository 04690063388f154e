//! Instrument program interpreter
//!
//! Every channel owns a [`ProgramCursor`]. Once per playroutine tick the cursor
//! either burns one tick of a pending wait or fetches instructions from a
//! [`ProgramHost`], which executes them against the channel and reports how the
//! cursor should move as a [`Step`].

use tracing::warn;

/// Upper bound on instructions executed for one channel in one tick
pub const MAX_STEPS_PER_TICK: usize = 256;

/// Cursor movement requested by an executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Continue with the following instruction
    Next,
    /// Continue at an absolute program position
    Jump(usize),
    /// Sleep for the given number of ticks, then continue after this instruction
    Wait(u16),
    /// Jump back by the given offset; an offset of zero ends the program
    Loop(usize),
    /// Stop the program and deactivate the channel's interpreter
    End,
    /// Stay on this instruction until something external moves the cursor
    Hold,
}

/// How many instructions a cursor runs per tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Run until a wait (or end) is reached; the tracker dialects
    #[default]
    UntilWait,
    /// Run exactly one instruction per tick; the register-level dialect
    SingleStep,
}

/// Executes instructions on behalf of a cursor
pub trait ProgramHost {
    /// Fetch and execute the instruction at `position`.
    ///
    /// Positions past the end of the program must report [`Step::End`].
    fn execute(&mut self, position: usize) -> Step;

    /// Map a position that ran off the program back into it.
    fn wrap(&self, position: usize) -> usize {
        position
    }
}

/// Per-channel program position and wait counter
#[derive(Debug, Clone, Default)]
pub struct ProgramCursor {
    position: usize,
    wait: u16,
    active: bool,
    mode: ExecMode,
}

impl ProgramCursor {
    /// Create an idle cursor.
    pub fn new(mode: ExecMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Restart at the first instruction.
    pub fn start(&mut self) {
        self.start_at(0);
    }

    /// Restart at an arbitrary instruction.
    pub fn start_at(&mut self, position: usize) {
        self.position = position;
        self.wait = 0;
        self.active = true;
    }

    /// Deactivate without touching the channel.
    pub fn stop(&mut self) {
        self.active = false;
        self.wait = 0;
    }

    /// Whether a program is running
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Position of the next instruction
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Remaining wait ticks
    #[inline]
    pub fn wait(&self) -> u16 {
        self.wait
    }

    /// Run one tick worth of instructions.
    ///
    /// Returns the number of instructions executed (zero while waiting).
    pub fn run<H: ProgramHost>(&mut self, host: &mut H) -> usize {
        if !self.active {
            return 0;
        }
        if self.wait > 0 {
            self.wait -= 1;
            return 0;
        }

        let mut executed = 0;
        while executed < MAX_STEPS_PER_TICK {
            executed += 1;
            let step = host.execute(self.position);
            let keep_going = self.apply(step, host);
            if !keep_going || self.mode == ExecMode::SingleStep {
                return executed;
            }
        }

        warn!(
            position = self.position,
            "instrument program executed {} steps without waiting, yielding",
            MAX_STEPS_PER_TICK
        );
        executed
    }

    /// Apply a step produced outside the program (a pattern effect command).
    ///
    /// Only jumps, waits and ends touch the cursor; the others are ignored.
    pub fn apply_external(&mut self, step: Step) {
        match step {
            Step::Jump(target) => self.position = target,
            Step::Wait(ticks) => self.wait = ticks,
            Step::End | Step::Loop(0) => self.stop(),
            Step::Next | Step::Loop(_) | Step::Hold => {}
        }
    }

    /// Move the cursor; returns whether execution continues this tick.
    fn apply<H: ProgramHost>(&mut self, step: Step, host: &H) -> bool {
        match step {
            Step::Next => {
                self.position = host.wrap(self.position + 1);
                true
            }
            Step::Jump(target) => {
                self.position = host.wrap(target);
                true
            }
            Step::Wait(0) => {
                self.position = host.wrap(self.position + 1);
                true
            }
            Step::Wait(ticks) => {
                self.position = host.wrap(self.position + 1);
                self.wait = ticks;
                false
            }
            Step::Loop(0) | Step::End => {
                self.stop();
                false
            }
            Step::Loop(back) => {
                self.position = host.wrap(self.position.saturating_sub(back));
                true
            }
            Step::Hold => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Host over a fixed list of steps that records executed positions
    struct Script {
        steps: Vec<Step>,
        trace: Vec<usize>,
    }

    impl Script {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps,
                trace: Vec::new(),
            }
        }
    }

    impl ProgramHost for Script {
        fn execute(&mut self, position: usize) -> Step {
            self.trace.push(position);
            self.steps.get(position).copied().unwrap_or(Step::End)
        }
    }

    #[test]
    fn test_wait_blocks_following_ticks() {
        let mut host = Script::new(vec![Step::Wait(5), Step::Next, Step::Loop(0)]);
        let mut cursor = ProgramCursor::new(ExecMode::UntilWait);
        cursor.start();

        assert_eq!(cursor.run(&mut host), 1);
        for tick in 1..=5 {
            assert_eq!(cursor.run(&mut host), 0, "tick {tick} must wait");
        }
        assert_eq!(cursor.run(&mut host), 2);
        assert!(!cursor.is_active(), "loop 0 ends the program");
        assert_eq!(host.trace, vec![0, 1, 2]);
    }

    #[test]
    fn test_loop_jumps_back() {
        let mut host = Script::new(vec![Step::Next, Step::Wait(1), Step::Loop(2)]);
        let mut cursor = ProgramCursor::new(ExecMode::UntilWait);
        cursor.start();
        cursor.run(&mut host);
        cursor.run(&mut host);
        cursor.run(&mut host);
        assert_eq!(host.trace, vec![0, 1, 2, 0, 1]);
        assert!(cursor.is_active());
    }

    #[test]
    fn test_runaway_program_yields() {
        let mut host = Script::new(vec![Step::Next, Step::Loop(1)]);
        let mut cursor = ProgramCursor::new(ExecMode::UntilWait);
        cursor.start();
        assert_eq!(cursor.run(&mut host), MAX_STEPS_PER_TICK);
        assert!(cursor.is_active(), "a runaway program keeps running next tick");
    }

    #[test]
    fn test_reading_past_end_stops() {
        let mut host = Script::new(vec![Step::Next]);
        let mut cursor = ProgramCursor::new(ExecMode::UntilWait);
        cursor.start();
        assert_eq!(cursor.run(&mut host), 2);
        assert!(!cursor.is_active());
    }

    #[test]
    fn test_single_step_mode() {
        let mut host = Script::new(vec![Step::Next, Step::Next, Step::Hold]);
        let mut cursor = ProgramCursor::new(ExecMode::SingleStep);
        cursor.start();
        for _ in 0..5 {
            assert_eq!(cursor.run(&mut host), 1);
        }
        assert_eq!(cursor.position(), 2, "hold keeps the cursor in place");
        assert_eq!(host.trace, vec![0, 1, 2, 2, 2]);
    }

    #[test]
    fn test_external_steps() {
        let mut cursor = ProgramCursor::new(ExecMode::UntilWait);
        cursor.start();
        cursor.apply_external(Step::Jump(7));
        assert_eq!(cursor.position(), 7);
        cursor.apply_external(Step::Wait(3));
        assert_eq!(cursor.wait(), 3);
        cursor.apply_external(Step::Next);
        assert!(cursor.is_active());
        cursor.apply_external(Step::End);
        assert!(!cursor.is_active());
    }
}
