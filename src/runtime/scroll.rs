//! Scroll mode: pausing updates so native terminal scrolling works.

use crate::render::center_align;

/// SGR mouse reports for scroll wheel events start with this prefix
/// (buttons 64 and 65).
const SCROLL_EVENT_PREFIX: &str = "\x1b[<6";

pub fn is_scroll_event(input: &str) -> bool {
    input.starts_with(SCROLL_EVENT_PREFIX)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum ScrollModeState {
    #[default]
    Inactive,
    /// The activation routine (flush, repaint, banner) is still running;
    /// gestures arriving in this window are dropped.
    Activating,
    Active,
}

/// Whether screen updates are currently paused for native scrolling.
#[derive(Debug, Default)]
pub struct ScrollMode {
    state: ScrollModeState,
}

impl ScrollMode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state != ScrollModeState::Inactive
    }

    pub fn begin_activation(&mut self) {
        self.state = ScrollModeState::Activating;
    }

    pub fn finish_activation(&mut self) {
        self.state = ScrollModeState::Active;
    }

    pub fn deactivate(&mut self) {
        self.state = ScrollModeState::Inactive;
    }
}

/// Banner shown near the bottom of the screen while scroll mode is active.
pub fn scroll_banner(columns: usize, rows: usize) -> String {
    let message = center_align(
        "\x1b[1mScroll Mode\x1b[22m \x1b[2m(output paused)\x1b[22m \
         \x1b[3mPress any key to resume...\x1b[23m",
        columns.saturating_sub(2),
    );
    format!(
        "\x1b[{};2H\x1b[47m\x1b[30m{message}\x1b[39m\x1b[49m",
        rows.saturating_sub(1)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheel_reports_are_scroll_events() {
        assert!(is_scroll_event("\x1b[<64;10;5M"));
        assert!(is_scroll_event("\x1b[<65;10;5M"));
        assert!(!is_scroll_event("\x1b[<0;10;5M"));
        assert!(!is_scroll_event("q"));
    }

    #[test]
    fn activation_passes_through_the_activating_state() {
        let mut mode = ScrollMode::new();
        assert!(!mode.is_active());

        mode.begin_activation();
        assert!(mode.is_active());

        mode.finish_activation();
        assert!(mode.is_active());

        mode.deactivate();
        assert!(!mode.is_active());
    }

    #[test]
    fn banner_is_positioned_above_the_bottom_row() {
        let banner = scroll_banner(80, 24);
        assert!(banner.starts_with("\x1b[23;2H"));
        assert!(banner.contains("Scroll Mode"));
        assert!(banner.contains("\x1b[47m"));
    }
}
