//! The update loop and its scrollback bookkeeping.

pub mod overflow;
pub mod scroll;
pub mod updater;

pub use overflow::OverflowController;
pub use scroll::{is_scroll_event, scroll_banner, ScrollMode};
pub use updater::{TerminalUpdater, UpdaterEvent};
