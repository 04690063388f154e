//! Register-level instruction set
//!
//! Every program byte is one instruction. The opcode is a prefix code read
//! from the top of the byte:
//!
//! | tag                | width | instruction                    | payload                 |
//! |--------------------|-------|--------------------------------|-------------------------|
//! | `00`               | 2     | Control                        | gate/wave/reset bits    |
//! | `01`               | 2     | Increment                      | mode bit, signed 5 bits |
//! | `10`               | 2     | Set                            | mode bit, 5 bits        |
//! | `1100`             | 4     | Arpeggio                       | note offset             |
//! | `1101`             | 4     | Loop                           | back offset, 0 = end    |
//! | `11100`            | 5     | Wait                           | duration index          |
//! | `11101`            | 5     | Vibrato                        | mode bit, depth         |
//! | `1111000`          | 7     | Sync                           | enable                  |
//! | `1111001`          | 7     | Ring                           | enable                  |
//! | `1111010`          | 7     | External voice flag            | enable                  |
//! | `11111111`         | 8     | Note-off jump marker           |                         |
//!
//! The `11` quadrant of the 2-bit space is split into the narrower tags; the
//! remaining 7-bit codes (`0xF6..=0xFE`) are reserved and execute as no-ops.

use bitflags::bitflags;

bitflags! {
    /// Payload of a Control instruction, as stored in the program byte
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ControlBits: u8 {
        /// Oscillator reset (test bit)
        const RESET = 0x01;
        /// Triangle waveform
        const TRIANGLE = 0x02;
        /// Sawtooth waveform
        const SAWTOOTH = 0x04;
        /// Pulse waveform
        const PULSE = 0x08;
        /// Noise waveform
        const NOISE = 0x10;
        /// Envelope gate
        const GATE = 0x20;
    }
}

impl ControlBits {
    /// Value for the voice control register: the payload rotated left by
    /// three, so gate lands in bit 0 and the waveforms in bits 3-7.
    #[inline]
    pub fn register_value(self) -> u8 {
        let bits = self.bits() & 0x3f;
        (bits << 3) | (bits >> 5)
    }
}

/// Control register bits a Control instruction replaces (sync and ring are kept)
pub const CONTROL_REGISTER_MASK: u8 = 0xf9;

/// Register an Increment, Set or Vibrato instruction acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Pulse width register
    PulseWidth,
    /// Frequency register
    Frequency,
}

impl Target {
    fn from_bit(set: bool) -> Self {
        if set {
            Target::Frequency
        } else {
            Target::PulseWidth
        }
    }

    fn bit(self) -> u8 {
        match self {
            Target::PulseWidth => 0,
            Target::Frequency => 1,
        }
    }

    /// Two-letter label
    pub fn label(self) -> &'static str {
        match self {
            Target::PulseWidth => "PW",
            Target::Frequency => "FQ",
        }
    }
}

/// One decoded program byte
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// Replace the gate, waveform and test bits of the control register
    Control(ControlBits),
    /// Add a signed amount (-16..=15) to the frequency or pulse width offset
    Increment {
        /// Register offset changed
        target: Target,
        /// Signed step
        amount: i8,
    },
    /// Set the frequency offset (`value << 11`) or pulse width (`value << 7`)
    SetValue {
        /// Register offset changed
        target: Target,
        /// 5-bit value
        value: u8,
    },
    /// Offset the played note (0-15)
    Arpeggio(u8),
    /// Jump back by the payload; 0 ends the program
    Loop(u8),
    /// Wait for an indexed number of ticks (1, 2, 4 ... 128)
    Wait(u8),
    /// Table vibrato on frequency or pulse width, depth 0-3
    Vibrato {
        /// Register modulated
        target: Target,
        /// Shift applied to the vibrato table, 0 = off
        depth: u8,
    },
    /// Hard sync to the previous voice
    Sync(bool),
    /// Ring modulation by the previous voice
    Ring(bool),
    /// External voice flag
    ExternalFlag(bool),
    /// Marks where a key release continues
    NoteOffJump,
    /// Unassigned code, a no-op
    Reserved(u8),
}

/// Program byte of an empty row: `Loop 0`
pub const END: u8 = 0xd0;
/// Program byte of the note-off marker
pub const NOTE_OFF_JUMP: u8 = 0xff;

impl Instruction {
    /// Decode a program byte, widest tag first.
    pub fn decode(byte: u8) -> Self {
        match byte {
            NOTE_OFF_JUMP => Instruction::NoteOffJump,
            0xf6..=0xfe => Instruction::Reserved(byte),
            0xf0..=0xf5 => {
                let enable = byte & 1 != 0;
                match (byte >> 1) & 3 {
                    0 => Instruction::Sync(enable),
                    1 => Instruction::Ring(enable),
                    _ => Instruction::ExternalFlag(enable),
                }
            }
            0xe8..=0xef => Instruction::Vibrato {
                target: Target::from_bit(byte & 0x04 != 0),
                depth: byte & 0x03,
            },
            0xe0..=0xe7 => Instruction::Wait(byte & 0x07),
            0xd0..=0xdf => Instruction::Loop(byte & 0x0f),
            0xc0..=0xcf => Instruction::Arpeggio(byte & 0x0f),
            0x80..=0xbf => Instruction::SetValue {
                target: Target::from_bit(byte & 0x20 != 0),
                value: byte & 0x1f,
            },
            0x40..=0x7f => Instruction::Increment {
                target: Target::from_bit(byte & 0x20 != 0),
                // sign-extend the 5-bit field
                amount: ((byte << 3) as i8) >> 3,
            },
            _ => Instruction::Control(ControlBits::from_bits_retain(byte & 0x3f)),
        }
    }

    /// Encode back into a program byte; payloads are masked to their width.
    pub fn encode(self) -> u8 {
        match self {
            Instruction::Control(bits) => bits.bits() & 0x3f,
            Instruction::Increment { target, amount } => {
                0x40 | (target.bit() << 5) | (amount as u8 & 0x1f)
            }
            Instruction::SetValue { target, value } => 0x80 | (target.bit() << 5) | (value & 0x1f),
            Instruction::Arpeggio(note) => 0xc0 | (note & 0x0f),
            Instruction::Loop(back) => END | (back & 0x0f),
            Instruction::Wait(index) => 0xe0 | (index & 0x07),
            Instruction::Vibrato { target, depth } => 0xe8 | (target.bit() << 2) | (depth & 0x03),
            Instruction::Sync(on) => 0xf0 | u8::from(on),
            Instruction::Ring(on) => 0xf2 | u8::from(on),
            Instruction::ExternalFlag(on) => 0xf4 | u8::from(on),
            Instruction::NoteOffJump => NOTE_OFF_JUMP,
            Instruction::Reserved(byte) => byte,
        }
    }

    /// Command letter shown in the instrument editor
    pub fn letter(self) -> u8 {
        match self {
            Instruction::Control(_) => b'C',
            Instruction::Increment { .. } => b'I',
            Instruction::SetValue { .. } => b'S',
            Instruction::Arpeggio(_) => b'A',
            Instruction::Loop(_) => b'L',
            Instruction::Wait(_) => b'W',
            Instruction::Vibrato { .. } => b'V',
            Instruction::Sync(_) => b'Y',
            Instruction::Ring(_) => b'R',
            Instruction::ExternalFlag(_) => b'X',
            Instruction::NoteOffJump => b'J',
            Instruction::Reserved(_) => b' ',
        }
    }

    /// Editor payload digits of a program byte (up to two)
    pub fn payload_digits(byte: u8) -> [Option<u8>; 2] {
        match Self::decode(byte) {
            Instruction::Control(_) | Instruction::Increment { .. } | Instruction::SetValue { .. } => {
                [Some((byte & 0x3f) >> 4), Some(byte & 0x0f)]
            }
            Instruction::Arpeggio(_) | Instruction::Loop(_) => [Some(byte & 0x0f), None],
            Instruction::Wait(_) | Instruction::Vibrato { .. } => [Some(byte & 0x07), None],
            Instruction::Sync(_) | Instruction::Ring(_) | Instruction::ExternalFlag(_) => {
                [Some(byte & 0x01), None]
            }
            Instruction::NoteOffJump | Instruction::Reserved(_) => [None, None],
        }
    }

    /// Overwrite payload digit `column` (1 or 2) of a program byte.
    ///
    /// Returns `None` when the instruction has no such digit.
    pub fn set_payload_digit(byte: u8, column: usize, value: u8) -> Option<u8> {
        let (mask, shift) = match (Self::decode(byte), column) {
            (
                Instruction::Control(_) | Instruction::Increment { .. } | Instruction::SetValue { .. },
                1,
            ) => (0x30, 4),
            (
                Instruction::Control(_) | Instruction::Increment { .. } | Instruction::SetValue { .. },
                2,
            ) => (0x0f, 0),
            (Instruction::Arpeggio(_) | Instruction::Loop(_), 1) => (0x0f, 0),
            (Instruction::Wait(_) | Instruction::Vibrato { .. }, 1) => (0x07, 0),
            (Instruction::Sync(_) | Instruction::Ring(_) | Instruction::ExternalFlag(_), 1) => {
                (0x01, 0)
            }
            _ => return None,
        };
        Some((byte & !mask) | ((value << shift) & mask))
    }

    /// Change the opcode of a program byte by its (lower case) letter,
    /// keeping as much of the payload as the new tag has room for.
    pub fn retag(byte: u8, letter: u8) -> Option<u8> {
        let tagged = match letter.to_ascii_lowercase() {
            b'c' => byte & 0x3f,
            b'i' => 0x40 | (byte & 0x3f),
            b's' => 0x80 | (byte & 0x3f),
            b'a' => 0xc0 | (byte & 0x0f),
            b'l' => END | (byte & 0x0f),
            b'w' => 0xe0 | (byte & 0x07),
            b'v' => 0xe8 | (byte & 0x07),
            b'y' => 0xf0 | (byte & 0x01),
            b'r' => 0xf2 | (byte & 0x01),
            b'x' => 0xf4 | (byte & 0x01),
            b'j' => NOTE_OFF_JUMP,
            _ => return None,
        };
        Some(tagged)
    }

    /// Human readable summary for the editor's info column.
    ///
    /// `row` is the program row holding the instruction; loops show their
    /// target row.
    pub fn describe(self, row: usize) -> String {
        let on_off = |on: bool| if on { "On" } else { "Off" };
        match self {
            Instruction::Control(bits) => {
                let flag = |bit: ControlBits, c: char| if bits.contains(bit) { c } else { '.' };
                [
                    'C',
                    ':',
                    flag(ControlBits::GATE, 'G'),
                    flag(ControlBits::NOISE, 'N'),
                    flag(ControlBits::PULSE, 'P'),
                    flag(ControlBits::SAWTOOTH, 'S'),
                    flag(ControlBits::TRIANGLE, 'T'),
                    flag(ControlBits::RESET, 'R'),
                ]
                .iter()
                .collect()
            }
            Instruction::Increment { target, amount } => {
                let sign = if amount < 0 { '-' } else { '+' };
                format!("Inc{}{}{:02}", target.label(), sign, amount.unsigned_abs())
            }
            Instruction::SetValue { target, value } => {
                format!("Set{} {:02X}", target.label(), value)
            }
            Instruction::Arpeggio(_) => "Arpeggio".to_string(),
            Instruction::Loop(0) => "End".to_string(),
            Instruction::Loop(back) => match row.checked_sub(usize::from(back)) {
                Some(target) => format!("Loop:{target:02X}"),
                None => "Loop:ERR".to_string(),
            },
            Instruction::Wait(_) => "Wait".to_string(),
            Instruction::Vibrato { .. } => "Vibrato".to_string(),
            Instruction::Sync(on) => format!("Sync:{}", on_off(on)),
            Instruction::Ring(on) => format!("Ring:{}", on_off(on)),
            Instruction::ExternalFlag(on) => format!("ExtV:{}", on_off(on)),
            Instruction::NoteOffJump => "NoteOff".to_string(),
            Instruction::Reserved(_) => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loop_and_control_prefixes() {
        assert_eq!(Instruction::decode(0b1101_0011), Instruction::Loop(0b0011));
        assert_eq!(
            Instruction::decode(0b0010_0010),
            Instruction::Control(ControlBits::GATE | ControlBits::TRIANGLE)
        );
    }

    #[test]
    fn test_every_byte_decodes_by_prefix_and_re_encodes() {
        for byte in 0..=255u8 {
            let decoded = Instruction::decode(byte);
            let expected_class = match byte {
                b if b >> 6 == 0b00 => "control",
                b if b >> 6 == 0b01 => "increment",
                b if b >> 6 == 0b10 => "set",
                b if b >> 4 == 0b1100 => "arpeggio",
                b if b >> 4 == 0b1101 => "loop",
                b if b >> 3 == 0b11100 => "wait",
                b if b >> 3 == 0b11101 => "vibrato",
                b if b >> 1 == 0b1111000 => "sync",
                b if b >> 1 == 0b1111001 => "ring",
                b if b >> 1 == 0b1111010 => "external",
                0xff => "noteoff",
                _ => "reserved",
            };
            let class = match decoded {
                Instruction::Control(bits) => {
                    assert_eq!(bits.bits(), byte & 0x3f, "control payload of {byte:#04x}");
                    "control"
                }
                Instruction::Increment { .. } => "increment",
                Instruction::SetValue { value, .. } => {
                    assert_eq!(value, byte & 0x1f);
                    "set"
                }
                Instruction::Arpeggio(note) => {
                    assert_eq!(note, byte & 0x0f);
                    "arpeggio"
                }
                Instruction::Loop(back) => {
                    assert_eq!(back, byte & 0x0f);
                    "loop"
                }
                Instruction::Wait(index) => {
                    assert_eq!(index, byte & 0x07);
                    "wait"
                }
                Instruction::Vibrato { .. } => "vibrato",
                Instruction::Sync(_) => "sync",
                Instruction::Ring(_) => "ring",
                Instruction::ExternalFlag(_) => "external",
                Instruction::NoteOffJump => "noteoff",
                Instruction::Reserved(_) => "reserved",
            };
            assert_eq!(class, expected_class, "byte {byte:#010b}");
            assert_eq!(decoded.encode(), byte, "encode inverts decode for {byte:#04x}");
        }
    }

    #[test]
    fn test_increment_is_signed() {
        assert_eq!(
            Instruction::decode(0x7f),
            Instruction::Increment {
                target: Target::Frequency,
                amount: -1
            }
        );
        assert_eq!(
            Instruction::decode(0x4f),
            Instruction::Increment {
                target: Target::PulseWidth,
                amount: 15
            }
        );
        assert_eq!(
            Instruction::decode(0x50),
            Instruction::Increment {
                target: Target::PulseWidth,
                amount: -16
            }
        );
    }

    #[test]
    fn test_control_register_rotation() {
        let bits = ControlBits::GATE | ControlBits::PULSE;
        assert_eq!(bits.register_value(), 0x41, "gate to bit 0, pulse to bit 6");
        assert_eq!(ControlBits::RESET.register_value(), 0x08, "reset is the test bit");
        assert_eq!(ControlBits::NOISE.register_value(), 0x80);
    }

    #[test]
    fn test_retag_keeps_payload() {
        assert_eq!(Instruction::retag(0x25, b'i'), Some(0x65));
        assert_eq!(Instruction::retag(0x65, b'L'), Some(0xd5));
        assert_eq!(Instruction::retag(0x65, b'j'), Some(0xff));
        assert_eq!(Instruction::retag(0x65, b'q'), None);
    }

    #[test]
    fn test_payload_digits() {
        assert_eq!(Instruction::payload_digits(0x25), [Some(2), Some(5)]);
        assert_eq!(Instruction::payload_digits(0xd3), [Some(3), None]);
        assert_eq!(Instruction::payload_digits(0xff), [None, None]);
        assert_eq!(Instruction::set_payload_digit(0x25, 1, 1), Some(0x15));
        assert_eq!(Instruction::set_payload_digit(0xe1, 1, 0xf), Some(0xe7));
        assert_eq!(Instruction::set_payload_digit(0xd3, 2, 1), None);
    }

    #[test]
    fn test_describe() {
        assert_eq!(Instruction::decode(0x22).describe(4), "C:G...T.");
        assert_eq!(Instruction::decode(0xd0).describe(4), "End");
        assert_eq!(Instruction::decode(0xd2).describe(6), "Loop:04");
        assert_eq!(Instruction::decode(0xd9).describe(6), "Loop:ERR");
        assert_eq!(Instruction::decode(0x7e).describe(0), "IncFQ-02");
        assert_eq!(Instruction::decode(0xbf).describe(0), "SetFQ 1F");
        assert_eq!(Instruction::decode(0xf3).describe(0), "Ring:On");
    }
}
