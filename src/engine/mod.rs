//! Building blocks shared by the chip backends
//!
//! - [`clock`]: drift-free tick/sample/cycle dividers
//! - [`interpreter`]: instrument program cursor and step protocol
//! - [`sequencer`]: song/pattern playroutine of the tracker dialects
//! - [`voice`], [`modulation`]: per-channel pitch, level and table state
//! - [`oscillator`]: waveform level functions and noise registers
//! - [`blip`], [`fir`], [`echo`]: band-limited synthesis and post-filters

pub mod blip;
pub mod clock;
pub mod echo;
pub mod fir;
pub mod interpreter;
pub mod modulation;
pub mod oscillator;
pub mod sequencer;
pub mod voice;

pub use blip::{BlipBuffer, DeltaSink};
pub use clock::TickClock;
pub use echo::Expander;
pub use fir::{ChannelFilter, FirBank};
pub use interpreter::{ExecMode, ProgramCursor, ProgramHost, Step};
pub use modulation::TableBinding;
pub use sequencer::{NoteAction, PlayState, RowHit, Sequencer};
pub use voice::{Level, Pitch};
