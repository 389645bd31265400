//! Frame composition and screen diffing.

pub mod diff;
pub mod frame;
pub mod panes;
pub mod ui;

pub use diff::ScreenDiffEngine;
pub use frame::Frame;
pub use panes::CommandPane;
pub use ui::{center_align, logs_region_height, render_frame};
