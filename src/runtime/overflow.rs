//! Flushing overflowed log lines into native scrollback.
//!
//! The log view only shows the newest wrapped lines; everything older has
//! overflowed. When the user enters scroll mode (or the program exits), the
//! lines that overflowed since the last flush are written over the top of the
//! screen and pushed out of the viewport with newlines, landing in the
//! terminal's own scrollback buffer where native scrolling can reach them.

const CURSOR_TOP_LEFT: &str = "\x1b[1;1H";
const ERASE_LINE: &str = "\x1b[2K";
const CURSOR_DOWN: &str = "\x1b[1B";
const CURSOR_COL0: &str = "\x1b[1G";

/// Tracks which overflowed lines have already been flushed.
#[derive(Debug, Default)]
pub struct OverflowController {
    next_index: usize,
}

impl OverflowController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_index(&self) -> usize {
        self.next_index
    }

    /// Overflowed indices become meaningless after a rewrap, so flushing
    /// starts over from the first line.
    pub fn reset(&mut self) {
        self.next_index = 0;
    }

    /// Builds the sequence flushing the not-yet-flushed tail of `overflowed`.
    /// Returns `None` when there is nothing new to flush.
    ///
    /// The caller wraps the sequence in synchronized-output markers and tells
    /// the diff engine the screen is now blank.
    pub fn flush(&mut self, overflowed: &[&str], terminal_rows: usize) -> Option<String> {
        if overflowed.is_empty() || self.next_index >= overflowed.len() {
            return None;
        }

        let pending = overflowed.len() - self.next_index;
        let mut sequence = String::from(CURSOR_TOP_LEFT);

        // Overwrite as many top screen lines with overflowed lines as fit.
        let mut index = self.next_index;
        let overwrite_end = (self.next_index + terminal_rows).min(overflowed.len());
        while index < overwrite_end {
            sequence.push_str(ERASE_LINE);
            sequence.push_str(overflowed[index]);
            sequence.push_str(CURSOR_DOWN);
            sequence.push_str(CURSOR_COL0);
            index += 1;
        }

        let trailing_newlines = if index < overflowed.len() {
            sequence.push('\n');
            sequence.push_str(&overflowed[index..].join("\n"));
            terminal_rows - 1
        } else {
            // Fewer overflowed lines than screen rows: blank out the rest of
            // the screen, then push exactly the flushed lines into scrollback.
            while index <= terminal_rows {
                sequence.push_str(ERASE_LINE);
                sequence.push_str(CURSOR_DOWN);
                sequence.push_str(CURSOR_COL0);
                index += 1;
            }
            pending
        };
        sequence.push_str(&"\n".repeat(trailing_newlines));

        self.next_index = overflowed.len();
        Some(sequence)
    }
}
