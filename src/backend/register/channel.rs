//! Voice state and instruction execution of the register-level engine

use super::opcode::{Instruction, Target, CONTROL_REGISTER_MASK};
use super::sid::{self, voice_register, ControlRegister, SidRegisters};
use super::song::{Octave, RegisterInstrument, PROGRAM_LEN};
use crate::engine::interpreter::{ExecMode, ProgramHost, Step};
use crate::engine::ProgramCursor;
use crate::tables;

#[derive(Debug, Clone)]
pub struct Channel {
    pub cursor: ProgramCursor,
    pub instrument: u8,
    pub note: u8,
    pub arpeggio: u8,
    pub frequency_offset: u16,
    pub pulse_width: u16,
    pub vibrato_target: Target,
    pub vibrato_depth: u8,
    pub external: bool,
    pub key_down: bool,
}

impl Default for Channel {
    fn default() -> Self {
        Self {
            cursor: ProgramCursor::new(ExecMode::SingleStep),
            instrument: 0,
            note: 0,
            arpeggio: 0,
            frequency_offset: 0,
            pulse_width: 0,
            vibrato_target: Target::Frequency,
            vibrato_depth: 0,
            external: false,
            key_down: false,
        }
    }
}

impl Channel {
    /// Key down: restart the program and load the envelope. The gate drops
    /// until the program raises it again, so the envelope re-attacks.
    pub fn trigger(
        &mut self,
        voice: usize,
        note: u8,
        instrument_index: u8,
        instrument: &RegisterInstrument,
        registers: &mut SidRegisters,
    ) {
        self.note = note;
        self.instrument = instrument_index;
        self.arpeggio = 0;
        self.vibrato_depth = 0;
        self.key_down = true;
        self.cursor.start();
        registers.write(voice_register(voice, sid::ATTACK_DECAY), instrument.attack_decay());
        registers.write(voice_register(voice, sid::SUSTAIN_RELEASE), instrument.sustain_release());
        self.clear_gate(voice, registers);
    }

    /// Key up: continue after the note-off marker, or stop and drop the gate.
    pub fn release(&mut self, voice: usize, instrument: &RegisterInstrument, registers: &mut SidRegisters) {
        if !self.key_down {
            return;
        }
        self.key_down = false;
        match instrument.note_off_marker() {
            Some(marker) => self.cursor.start_at((marker + 1) % PROGRAM_LEN),
            None => {
                self.cursor.stop();
                self.clear_gate(voice, registers);
            }
        }
    }

    /// Stop the program and drop the gate.
    pub fn mute(&mut self, voice: usize, registers: &mut SidRegisters) {
        self.key_down = false;
        self.cursor.stop();
        self.clear_gate(voice, registers);
    }

    fn clear_gate(&self, voice: usize, registers: &mut SidRegisters) {
        let addr = voice_register(voice, sid::CONTROL);
        let control = registers.read(addr) & !ControlRegister::GATE.bits();
        registers.write(addr, control);
    }

    /// Execute one instruction against this voice's registers.
    pub fn execute(&mut self, voice: usize, byte: u8, registers: &mut SidRegisters) -> Step {
        let control_addr = voice_register(voice, sid::CONTROL);
        let set_control_bit = |registers: &mut SidRegisters, bit: ControlRegister, on: bool| {
            let mut control = registers.control(voice);
            control.set(bit, on);
            registers.write(control_addr, control.bits());
        };

        match Instruction::decode(byte) {
            Instruction::Control(bits) => {
                let control = registers.read(control_addr) & !CONTROL_REGISTER_MASK;
                registers.write(control_addr, control | bits.register_value());
            }
            Instruction::Increment { target, amount } => {
                let amount = amount as i16 as u16;
                match target {
                    Target::Frequency => self.frequency_offset = self.frequency_offset.wrapping_add(amount),
                    Target::PulseWidth => self.pulse_width = self.pulse_width.wrapping_add(amount),
                }
            }
            Instruction::SetValue { target, value } => match target {
                Target::Frequency => self.frequency_offset = u16::from(value) << 11,
                Target::PulseWidth => self.pulse_width = u16::from(value) << 7,
            },
            Instruction::Arpeggio(offset) => self.arpeggio = offset,
            Instruction::Loop(back) => return Step::Loop(usize::from(back)),
            Instruction::Wait(index) => {
                return Step::Wait(u16::from(tables::REGISTER_WAIT[usize::from(index)]));
            }
            Instruction::Vibrato { target, depth } => {
                self.vibrato_target = target;
                self.vibrato_depth = depth;
            }
            Instruction::Sync(on) => set_control_bit(registers, ControlRegister::SYNC, on),
            Instruction::Ring(on) => set_control_bit(registers, ControlRegister::RING, on),
            Instruction::ExternalFlag(on) => self.external = on,
            Instruction::NoteOffJump => {
                if self.key_down {
                    return Step::Hold;
                }
            }
            Instruction::Reserved(_) => {}
        }
        Step::Next
    }

    /// Write frequency and pulse width for this tick. Disabled voices keep
    /// their registers untouched.
    pub fn refresh(&self, voice: usize, octave: Octave, frame: usize, registers: &mut SidRegisters) {
        if octave == Octave::Disabled {
            return;
        }
        let index = usize::from(self.note) + usize::from(self.arpeggio) + ((octave as usize - 1) << 5);
        let mut frequency = tables::register_freq(index).wrapping_add(self.frequency_offset);
        let mut pulse_width = self.pulse_width;
        if self.vibrato_depth > 0 {
            let wobble = (i16::from(tables::REGISTER_VIBRATO[frame & 15]) << self.vibrato_depth) as u16;
            match self.vibrato_target {
                Target::Frequency => frequency = frequency.wrapping_add(wobble),
                Target::PulseWidth => pulse_width = pulse_width.wrapping_add(wobble),
            }
        }
        registers.write_u16_le(voice_register(voice, sid::FREQUENCY), frequency);
        registers.write_u16_le(voice_register(voice, sid::PULSE_WIDTH), pulse_width);
    }
}

pub struct ChannelHost<'a> {
    pub voice: usize,
    pub channel: &'a mut Channel,
    pub program: &'a [u8; PROGRAM_LEN],
    pub registers: &'a mut SidRegisters,
}

impl ProgramHost for ChannelHost<'_> {
    fn execute(&mut self, position: usize) -> Step {
        let byte = self.program[position % PROGRAM_LEN];
        self.channel.execute(self.voice, byte, self.registers)
    }

    fn wrap(&self, position: usize) -> usize {
        position % PROGRAM_LEN
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::register::opcode::ControlBits;

    #[test]
    fn test_control_keeps_sync_and_ring() {
        let mut regs = SidRegisters::new();
        let mut ch = Channel::default();
        ch.execute(0, 0xf1, &mut regs);
        ch.execute(0, 0xf3, &mut regs);
        ch.execute(0, Instruction::Control(ControlBits::GATE | ControlBits::SAWTOOTH).encode(), &mut regs);
        let control = regs.control(0);
        assert!(control.contains(ControlRegister::SYNC | ControlRegister::RING));
        assert!(control.contains(ControlRegister::GATE | ControlRegister::SAWTOOTH));
        assert!(!control.contains(ControlRegister::TRIANGLE));
    }

    #[test]
    fn test_set_and_increment() {
        let mut regs = SidRegisters::new();
        let mut ch = Channel::default();
        ch.execute(0, 0xa2, &mut regs);
        assert_eq!(ch.frequency_offset, 2 << 11);
        ch.execute(0, 0x7f, &mut regs);
        assert_eq!(ch.frequency_offset, (2 << 11) - 1);
        ch.execute(0, 0x84, &mut regs);
        assert_eq!(ch.pulse_width, 4 << 7);
    }

    #[test]
    fn test_refresh_writes_note_frequency() {
        let mut regs = SidRegisters::new();
        let ch = Channel {
            note: 3,
            ..Channel::default()
        };
        ch.refresh(1, Octave::Alto, 0, &mut regs);
        assert_eq!(
            regs.read_u16_le(voice_register(1, sid::FREQUENCY)),
            tables::register_freq(3 + 32)
        );
        let mut untouched = SidRegisters::new();
        ch.refresh(1, Octave::Disabled, 0, &mut untouched);
        assert_eq!(untouched.read_u16_le(voice_register(1, sid::FREQUENCY)), 0);
    }

    #[test]
    fn test_release_without_marker_drops_gate() {
        let mut regs = SidRegisters::new();
        let instrument = RegisterInstrument::default();
        let mut ch = Channel::default();
        ch.trigger(0, 5, 0, &instrument, &mut regs);
        ch.execute(0, instrument.program[0], &mut regs);
        assert!(regs.control(0).contains(ControlRegister::GATE));
        ch.release(0, &instrument, &mut regs);
        assert!(!regs.control(0).contains(ControlRegister::GATE));
        assert!(!ch.cursor.is_active());
    }

    #[test]
    fn test_release_jumps_past_marker() {
        let mut regs = SidRegisters::new();
        let mut instrument = RegisterInstrument::default();
        instrument.program[3] = 0xff;
        let mut ch = Channel::default();
        ch.trigger(0, 5, 0, &instrument, &mut regs);
        assert_eq!(ch.execute(0, 0xff, &mut regs), Step::Hold, "marker holds while the key is down");
        ch.release(0, &instrument, &mut regs);
        assert_eq!(ch.cursor.position(), 4);
        assert_eq!(ch.execute(0, 0xff, &mut regs), Step::Next);
    }
}
