//! Static lookup tables
//!
//! Shared constants used by the three engines: note-to-step tables, the
//! vibrato sine, noise feedback masks and the register-level frequency table.

/// Simple engine phase increments per note (84 notes, 7 octaves from C-0)
///
/// Values are scaled so that `step / 2.75625` is the per-sample increment of a
/// 16-bit phase accumulator at 44.1 kHz.
pub const SIMPLE_FREQ_TABLE: [u16; 84] = [
    0x0085, 0x008d, 0x0096, 0x009f, 0x00a8, 0x00b2, 0x00bd, 0x00c8, 0x00d4, 0x00e1, 0x00ee, 0x00fc,
    0x010b, 0x011b, 0x012c, 0x013e, 0x0151, 0x0165, 0x017a, 0x0191, 0x01a9, 0x01c2, 0x01dd, 0x01f9,
    0x0217, 0x0237, 0x0259, 0x027d, 0x02a3, 0x02cb, 0x02f5, 0x0322, 0x0352, 0x0385, 0x03ba, 0x03f3,
    0x042f, 0x046f, 0x04b2, 0x04fa, 0x0546, 0x0596, 0x05eb, 0x0645, 0x06a5, 0x070a, 0x0775, 0x07e6,
    0x085f, 0x08de, 0x0965, 0x09f4, 0x0a8c, 0x0b2c, 0x0bd6, 0x0c8b, 0x0d4a, 0x0e14, 0x0eea, 0x0fcd,
    0x10be, 0x11bd, 0x12cb, 0x13e9, 0x1518, 0x1659, 0x17ad, 0x1916, 0x1a94, 0x1c28, 0x1dd5, 0x1f9b,
    0x217c, 0x237a, 0x2596, 0x27d3, 0x2a31, 0x2cb3, 0x2f5b, 0x322c, 0x3528, 0x3851, 0x3bab, 0x3f37,
];

/// Band-limited engine waveform periods per note (96 notes, 8 octaves)
///
/// Each entry is the number of internal clocks (sample rate × 256) between two
/// of the 32 phase steps of a waveform, so larger values are lower notes.
pub const WAVE_STEP_TABLE: [u16; 96] = [
    0x5448, 0x4f8d, 0x4b16, 0x46df, 0x42e5, 0x3f24, 0x3b98, 0x3840, 0x3518, 0x321d, 0x2f4d, 0x2ca5,
    0x2a24, 0x27c6, 0x258b, 0x2370, 0x2172, 0x1f92, 0x1dcc, 0x1c20, 0x1a8c, 0x190f, 0x17a7, 0x1653,
    0x1512, 0x13e3, 0x12c5, 0x11b8, 0x10b9, 0x0fc9, 0x0ee6, 0x0e10, 0x0d46, 0x0c87, 0x0bd3, 0x0b29,
    0x0a89, 0x09f2, 0x0963, 0x08dc, 0x085d, 0x07e4, 0x0773, 0x0708, 0x06a3, 0x0644, 0x05ea, 0x0595,
    0x0544, 0x04f9, 0x04b1, 0x046e, 0x042e, 0x03f2, 0x03ba, 0x0384, 0x0351, 0x0322, 0x02f5, 0x02ca,
    0x02a2, 0x027c, 0x0259, 0x0237, 0x0217, 0x01f9, 0x01dd, 0x01c2, 0x01a9, 0x0191, 0x017a, 0x0165,
    0x0151, 0x013e, 0x012c, 0x011b, 0x010c, 0x00fd, 0x00ee, 0x00e1, 0x00d4, 0x00c8, 0x00bd, 0x00b3,
    0x00a9, 0x009f, 0x0096, 0x008e, 0x0086, 0x007e, 0x0077, 0x0071, 0x006a, 0x0064, 0x005f, 0x0059,
];

/// One vibrato period, 64 steps of a signed sine
pub const SINE_TABLE: [i8; 64] = [
    0, 12, 25, 37, 49, 60, 71, 81, 90, 98, 106, 112, 117, 122, 125, 126, 127, 126, 125, 122, 117,
    112, 106, 98, 90, 81, 71, 60, 49, 37, 25, 12, 0, -12, -25, -37, -49, -60, -71, -81, -90, -98,
    -106, -112, -117, -122, -125, -126, -127, -126, -125, -122, -117, -112, -106, -98, -90, -81,
    -71, -60, -49, -37, -25, -12,
];

/// Feedback masks for the band-limited engine's noise shift register,
/// selected by the oscillator duty (4- to 28-bit maximal-length registers)
pub const BUZZ_FEED: [u32; 16] = [
    0x000_000C, 0x000_0012, 0x000_0021, 0x000_0044, 0x000_008E, 0x000_0108, 0x000_0204,
    0x000_0829, 0x000_2015, 0x000_8016, 0x002_0013, 0x008_0004, 0x020_0001, 0x080_000D,
    0x200_0023, 0x800_01D8,
];

/// Register-level frequency table, low bytes (PAL, bass/alto/treble × 32 notes)
pub const REGISTER_FREQ_LO: [u8; 96] = [
    // Bass
    0x17, 0x27, 0x39, 0x4b, 0x5f, 0x74, 0x8a, 0xa1, 0xba, 0xd4, 0xf0, 0x0e, 0x2d, 0x4e, 0x71, 0x96,
    0xbe, 0xe8, 0x14, 0x43, 0x74, 0xa9, 0xe1, 0x1c, 0x5a, 0x9c, 0xe2, 0x2d, 0x7c, 0xcf, 0x28, 0x85,
    // Alto
    0xe8, 0x52, 0xc1, 0x37, 0xb4, 0x39, 0xc5, 0x5a, 0xf7, 0x9e, 0x4f, 0x0a, 0xd1, 0xa3, 0x82, 0x6e,
    0x68, 0x71, 0x8a, 0xb3, 0xee, 0x3c, 0x9e, 0x15, 0xa2, 0x46, 0x04, 0xdc, 0xd0, 0xe2, 0x14, 0x67,
    // Treble
    0xdd, 0x79, 0x3c, 0x29, 0x44, 0x8d, 0x08, 0xb8, 0xa1, 0xc5, 0x28, 0xcd, 0xba, 0xf1, 0x78, 0x53,
    0x87, 0x1a, 0x10, 0x71, 0x42, 0x89, 0x4f, 0x9b, 0x74, 0xe2, 0xf0, 0xa6, 0x0e, 0x33, 0x20, 0xff,
];

/// Register-level frequency table, high bytes
pub const REGISTER_FREQ_HI: [u8; 96] = [
    // Bass
    0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x01, 0x02, 0x02, 0x02, 0x02, 0x02,
    0x02, 0x02, 0x03, 0x03, 0x03, 0x03, 0x03, 0x04, 0x04, 0x04, 0x04, 0x05, 0x05, 0x05, 0x06, 0x06,
    // Alto
    0x06, 0x07, 0x07, 0x08, 0x08, 0x09, 0x09, 0x0a, 0x0a, 0x0b, 0x0c, 0x0d, 0x0d, 0x0e, 0x0f, 0x10,
    0x11, 0x12, 0x13, 0x14, 0x15, 0x17, 0x18, 0x1a, 0x1b, 0x1d, 0x1f, 0x20, 0x22, 0x24, 0x27, 0x29,
    // Treble
    0x2b, 0x2e, 0x31, 0x34, 0x37, 0x3a, 0x3e, 0x41, 0x45, 0x49, 0x4e, 0x52, 0x57, 0x5c, 0x62, 0x68,
    0x6e, 0x75, 0x7c, 0x83, 0x8b, 0x93, 0x9c, 0xa5, 0xaf, 0xb9, 0xc4, 0xd0, 0xdd, 0xea, 0xf8, 0xff,
];

/// Register-level wait durations in ticks, indexed by the 3-bit payload
pub const REGISTER_WAIT: [u8; 8] = [1, 2, 4, 8, 16, 32, 64, 128];

/// Register-level vibrato shape, indexed by the low 4 bits of the frame counter
pub const REGISTER_VIBRATO: [i8; 16] = [
    0, 12, 22, 29, 31, 29, 22, 12, 0, -12, -22, -29, -31, -29, -22, -12,
];

/// Simple engine step for a note, clamped to the top of the table.
#[inline]
pub fn simple_step(note: u8) -> u16 {
    SIMPLE_FREQ_TABLE[(note as usize).min(SIMPLE_FREQ_TABLE.len() - 1)]
}

/// Band-limited engine period for a note, clamped to the top of the table.
#[inline]
pub fn wave_step(note: u8) -> u16 {
    WAVE_STEP_TABLE[(note as usize).min(WAVE_STEP_TABLE.len() - 1)]
}

/// 16-bit register-level frequency for a note index (0..96), clamped.
#[inline]
pub fn register_freq(note: usize) -> u16 {
    let note = note.min(REGISTER_FREQ_LO.len() - 1);
    u16::from(REGISTER_FREQ_LO[note]) | (u16::from(REGISTER_FREQ_HI[note]) << 8)
}

/// Sine lookup that wraps any phase into one period.
#[inline]
pub fn sine(phase: u8) -> i8 {
    SINE_TABLE[(phase & 63) as usize]
}
