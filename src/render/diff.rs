//! Line-level screen diffing.
//!
//! The whole viewport is repainted row by row from the top-left corner, but
//! rows identical to the previous render are skipped (cursor advances over
//! them) so steady-state updates touch only the rows that changed. Every
//! update is wrapped in synchronized-output markers to avoid tearing.

pub const SYNC_START: &str = "\x1b[?2026h";
pub const SYNC_END: &str = "\x1b[?2026l";

const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_HOME: &str = "\x1b[1;1H";
const ERASE_LINE: &str = "\x1b[2K";
const CURSOR_DOWN: &str = "\x1b[1B";
const CURSOR_COL0: &str = "\x1b[1G";

/// Diffs successive full-screen outputs into minimal update sequences.
#[derive(Debug, Default)]
pub struct ScreenDiffEngine {
    previous_output: String,
}

impl ScreenDiffEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next render repaints every row, regardless of what changed.
    pub fn force_next(&mut self) {
        self.previous_output.clear();
    }

    /// Pretend the screen currently shows `rows` blank lines. Used after an
    /// overflow flush pushed old content into native scrollback.
    pub fn set_previous_blank(&mut self, rows: usize) {
        self.previous_output = "\n".repeat(rows.saturating_sub(1));
    }

    pub fn previous_output(&self) -> &str {
        &self.previous_output
    }

    /// Computes the update sequence taking the screen from the previous
    /// output to `new_output`. Returns `None` when nothing changed.
    pub fn render(&mut self, new_output: &str, terminal_rows: usize) -> Option<String> {
        if new_output == self.previous_output {
            return None;
        }

        let new_lines: Vec<&str> = new_output.split('\n').collect();
        let previous_lines: Vec<&str> = if self.previous_output.is_empty() {
            Vec::new()
        } else {
            self.previous_output.split('\n').collect()
        };
        let same_shape = previous_lines.len() == new_lines.len();

        let mut sequence = String::from(SYNC_START);
        sequence.push_str(CURSOR_HIDE);
        sequence.push_str(CURSOR_HOME);

        for row in 0..terminal_rows {
            let previous_line = previous_lines.get(row);
            let new_line = new_lines.get(row);

            if !(same_shape && previous_line == new_line) {
                sequence.push_str(ERASE_LINE);
                sequence.push_str(new_line.unwrap_or(&""));
            }

            sequence.push_str(CURSOR_DOWN);
            sequence.push_str(CURSOR_COL0);
        }

        sequence.push_str(SYNC_END);
        self.previous_output = new_output.to_string();
        Some(sequence)
    }

    /// Repaints the previous output in place. Used when leaving scroll mode:
    /// the user may have scrolled the native viewport, so the screen is
    /// restored from one viewport-height above the cursor.
    pub fn repaint_previous(&self) -> String {
        let previous_lines: Vec<&str> = self.previous_output.split('\n').collect();
        let mut sequence = format!("\x1b[{}A\x1b[G", previous_lines.len());
        for line in previous_lines {
            sequence.push_str(ERASE_LINE);
            sequence.push_str(line);
            sequence.push_str(CURSOR_DOWN);
            sequence.push_str(CURSOR_COL0);
        }
        sequence
    }
}
