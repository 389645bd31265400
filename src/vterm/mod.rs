//! In-memory terminal emulation for the log pane.
//!
//! Wrapped log lines are fed through a vte parser into an unbounded cell
//! grid, then read back out as attribute-RLE ANSI text. Emulating instead of
//! concatenating strings is what makes carriage-return progress bars and
//! cursor-addressed service output render correctly inside the pane.

pub mod cell;
pub mod encode;
pub mod grid;

pub use cell::{Cell, CellAttrs, Color};
pub use encode::push_cell_transition;
pub use grid::VtGrid;

/// Virtual terminal backing the log pane.
pub struct VirtualTerminal {
    parser: vte::Parser,
    grid: VtGrid,
}

impl VirtualTerminal {
    pub fn new(cols: usize, viewport_rows: usize) -> Self {
        Self {
            parser: vte::Parser::new(),
            grid: VtGrid::new(cols, viewport_rows),
        }
    }

    /// Feeds text (including any escape sequences) through the emulator.
    pub fn write(&mut self, text: &str) {
        self.parser.advance(&mut self.grid, text.as_bytes());
    }

    pub fn writeln(&mut self, text: &str) {
        self.write(text);
        self.write("\r\n");
    }

    /// Drops all content and adopts new dimensions. The caller replays the
    /// wrapped log lines afterwards.
    pub fn resize(&mut self, cols: usize, viewport_rows: usize) {
        self.parser = vte::Parser::new();
        self.grid.reset(cols, viewport_rows);
    }

    pub fn clear(&mut self) {
        let cols = self.grid.cols();
        let rows = self.grid.viewport_rows();
        self.resize(cols, rows);
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    pub fn viewport_rows(&self) -> usize {
        self.grid.viewport_rows()
    }

    pub fn grid(&self) -> &VtGrid {
        &self.grid
    }

    /// Rows scrolled out above the viewport, available for overflow flushes.
    pub fn scrolled_out_rows(&self) -> usize {
        self.grid.viewport_y()
    }

    /// Encodes one buffer row back into ANSI text, starting from default
    /// attributes.
    pub fn encode_row(&self, index: usize) -> String {
        let mut out = String::new();
        let mut prev = CellAttrs::default();
        for cell in self.grid.row(index) {
            push_cell_transition(&mut out, &prev, cell);
            prev = cell.attrs;
        }
        out
    }

    /// Renders the bottom `pane_height` rows of the buffer as the log pane
    /// content.
    ///
    /// While the buffer has not yet filled the viewport, trailing blank rows
    /// are collapsed and `title_line` is shown above the logs instead.
    pub fn pane_output(&self, pane_height: usize, title_line: &str) -> String {
        let length = self.grid.total_rows();

        let mut blank_from_bottom = 0;
        if self.grid.viewport_y() == 0 {
            for index in (1..length).rev() {
                if !self.grid.row_is_blank(index) {
                    break;
                }
                blank_from_bottom += 1;
            }
        }

        let start = length.saturating_sub(pane_height);
        let end = length - blank_from_bottom;

        let mut lines = Vec::with_capacity(end.saturating_sub(start));
        let mut prev = CellAttrs::default();
        for index in start..end {
            let mut line = String::new();
            for cell in self.grid.row(index) {
                push_cell_transition(&mut line, &prev, cell);
                prev = cell.attrs;
            }
            lines.push(line);
        }

        if blank_from_bottom > 0 {
            format!(
                "{title_line}{}{}",
                "\n".repeat(blank_from_bottom),
                lines.join("\n")
            )
        } else {
            lines.join("\n")
        }
    }
}
