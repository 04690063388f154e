//! Song persistence
//!
//! The tracker dialects store songs as line-oriented text ([`text`]); the
//! register-level engine uses a fixed binary block handled by
//! [`crate::backend::register::song`].

pub mod text;

pub use text::{parse_song, write_song, TextDialect, TextSong};
