//! Text primitives: ANSI parsing, display width, and hard wrapping.

pub mod ansi;
pub mod width;
pub mod wrap;

pub use ansi::{extract_ansi_code, track_text, AnsiCode, AnsiCodeKind, AnsiCodeTracker};
pub use width::{grapheme_width, visible_width};
pub use wrap::{wrap_ansi, wrap_with_prefix};
