//! Unbounded cell grid driven by the vte parser.
//!
//! Rows are never discarded: the grid keeps every line ever written so the
//! overflow controller can flush older rows into native scrollback. The
//! viewport is the trailing `viewport_rows` rows; cursor addressing is
//! relative to the viewport top, like a real terminal with scrollback.

use unicode_width::UnicodeWidthChar;
use vte::{Params, Perform};

use crate::vterm::cell::{Cell, CellAttrs, Color};

pub struct VtGrid {
    cols: usize,
    viewport_rows: usize,
    rows: Vec<Vec<Cell>>,
    cursor_row: usize,
    cursor_col: usize,
    attrs: CellAttrs,
}

impl VtGrid {
    pub fn new(cols: usize, viewport_rows: usize) -> Self {
        let cols = cols.max(1);
        let viewport_rows = viewport_rows.max(1);
        Self {
            cols,
            viewport_rows,
            rows: (0..viewport_rows).map(|_| vec![Cell::NULL; cols]).collect(),
            cursor_row: 0,
            cursor_col: 0,
            attrs: CellAttrs::default(),
        }
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn viewport_rows(&self) -> usize {
        self.viewport_rows
    }

    /// Total buffer length including scrolled-out rows.
    pub fn total_rows(&self) -> usize {
        self.rows.len()
    }

    /// Number of rows scrolled out above the viewport.
    pub fn viewport_y(&self) -> usize {
        self.rows.len().saturating_sub(self.viewport_rows)
    }

    pub fn row(&self, index: usize) -> &[Cell] {
        &self.rows[index]
    }

    pub fn row_is_blank(&self, index: usize) -> bool {
        self.rows[index]
            .iter()
            .all(|cell| matches!(cell.ch, None | Some(' ')))
    }

    /// Plain text of a row with styling dropped.
    pub fn row_text(&self, index: usize) -> String {
        let text: String = self.rows[index]
            .iter()
            .map(|cell| cell.ch.unwrap_or(' '))
            .collect();
        text.trim_end().to_string()
    }

    /// Resets the grid to new dimensions. Content is discarded; the caller
    /// replays the lines it wants to keep.
    pub fn reset(&mut self, cols: usize, viewport_rows: usize) {
        *self = Self::new(cols, viewport_rows);
    }

    fn ensure_row(&mut self, row: usize) {
        while self.rows.len() <= row {
            self.rows.push(vec![Cell::NULL; self.cols]);
        }
    }

    fn viewport_top(&self) -> usize {
        self.rows.len().saturating_sub(self.viewport_rows)
    }

    fn line_feed(&mut self) {
        self.cursor_row += 1;
        self.cursor_col = 0;
        self.ensure_row(self.cursor_row);
    }

    fn put_char(&mut self, ch: char) {
        let width = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width == 0 {
            return;
        }

        if self.cursor_col + width > self.cols {
            self.line_feed();
        }

        self.ensure_row(self.cursor_row);
        let attrs = self.attrs;
        let row = &mut self.rows[self.cursor_row];
        row[self.cursor_col] = Cell::new(ch, attrs);
        if width == 2 && self.cursor_col + 1 < self.cols {
            // Spacer cell behind a wide character.
            row[self.cursor_col + 1] = Cell::NULL;
        }
        self.cursor_col += width;
    }

    fn clear_cells(&mut self, row: usize, from: usize, to: usize) {
        if row >= self.rows.len() {
            return;
        }
        let row = &mut self.rows[row];
        for col in from..to.min(row.len()) {
            row[col] = Cell::NULL;
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let (row, col, cols) = (self.cursor_row, self.cursor_col, self.cols);
        match mode {
            0 => self.clear_cells(row, col, cols),
            1 => self.clear_cells(row, 0, (col + 1).min(cols)),
            2 => self.clear_cells(row, 0, cols),
            _ => {}
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        let top = self.viewport_top();
        let bottom = self.rows.len();
        match mode {
            0 => {
                self.erase_in_line(0);
                for row in self.cursor_row + 1..bottom {
                    self.clear_cells(row, 0, self.cols);
                }
            }
            1 => {
                for row in top..self.cursor_row {
                    self.clear_cells(row, 0, self.cols);
                }
                self.erase_in_line(1);
            }
            2 => {
                for row in top..bottom {
                    self.clear_cells(row, 0, self.cols);
                }
            }
            _ => {}
        }
    }

    fn apply_sgr(&mut self, params: &Params) {
        if params.is_empty() {
            self.attrs = CellAttrs::default();
            return;
        }

        let groups: Vec<Vec<u16>> = params.iter().map(|group| group.to_vec()).collect();
        let mut idx = 0;
        while idx < groups.len() {
            let group = &groups[idx];
            let code = group.first().copied().unwrap_or(0);

            // Extended colors: colon subparams arrive as one group, semicolon
            // parameters as consecutive groups.
            if code == 38 || code == 48 {
                let (color, consumed) = if group.len() > 1 {
                    (parse_extended_color(&group[1..]), 1)
                } else {
                    let flat: Vec<u16> = groups[idx + 1..]
                        .iter()
                        .filter_map(|g| g.first().copied())
                        .collect();
                    let color = parse_extended_color(&flat);
                    let used = match flat.first() {
                        Some(5) => 2,
                        Some(2) => 4,
                        _ => 0,
                    };
                    (color, 1 + used)
                };
                if let Some(color) = color {
                    if code == 38 {
                        self.attrs.fg = color;
                    } else {
                        self.attrs.bg = color;
                    }
                }
                idx += consumed.min(groups.len() - idx);
                continue;
            }

            match code {
                0 => self.attrs = CellAttrs::default(),
                1 => self.attrs.bold = true,
                2 => self.attrs.dim = true,
                3 => self.attrs.italic = true,
                4 => self.attrs.underline = true,
                7 => self.attrs.inverse = true,
                8 => self.attrs.hidden = true,
                9 => self.attrs.strikethrough = true,
                22 => {
                    self.attrs.bold = false;
                    self.attrs.dim = false;
                }
                23 => self.attrs.italic = false,
                24 => self.attrs.underline = false,
                27 => self.attrs.inverse = false,
                28 => self.attrs.hidden = false,
                29 => self.attrs.strikethrough = false,
                30..=37 => self.attrs.fg = Color::Palette((code - 30) as u8),
                39 => self.attrs.fg = Color::Default,
                40..=47 => self.attrs.bg = Color::Palette((code - 40) as u8),
                49 => self.attrs.bg = Color::Default,
                90..=97 => self.attrs.fg = Color::Palette((code - 90 + 8) as u8),
                100..=107 => self.attrs.bg = Color::Palette((code - 100 + 8) as u8),
                _ => {}
            }
            idx += 1;
        }
    }
}

fn parse_extended_color(params: &[u16]) -> Option<Color> {
    match params.first()? {
        5 => Some(Color::Palette(*params.get(1)? as u8)),
        2 => Some(Color::Rgb(
            *params.get(1)? as u8,
            *params.get(2)? as u8,
            *params.get(3)? as u8,
        )),
        _ => None,
    }
}

fn param(params: &Params, index: usize, default: u16) -> u16 {
    let value = param_raw(params, index, default);
    if value == 0 {
        default
    } else {
        value
    }
}

fn param_raw(params: &Params, index: usize, default: u16) -> u16 {
    params
        .iter()
        .nth(index)
        .and_then(|group| group.first().copied())
        .unwrap_or(default)
}

impl Perform for VtGrid {
    fn print(&mut self, c: char) {
        self.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            b'\n' => self.line_feed(),
            b'\r' => self.cursor_col = 0,
            0x08 => self.cursor_col = self.cursor_col.saturating_sub(1),
            b'\t' => {
                let next_stop = (self.cursor_col / 8 + 1) * 8;
                self.cursor_col = next_stop.min(self.cols - 1);
            }
            _ => {}
        }
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], ignore: bool, action: char) {
        if ignore || !intermediates.is_empty() {
            return;
        }

        match action {
            'm' => self.apply_sgr(params),
            'A' => {
                let n = param(params, 0, 1) as usize;
                let top = self.viewport_top();
                self.cursor_row = self.cursor_row.saturating_sub(n).max(top);
            }
            'B' => {
                let n = param(params, 0, 1) as usize;
                self.cursor_row += n;
                self.ensure_row(self.cursor_row);
            }
            'C' => {
                let n = param(params, 0, 1) as usize;
                self.cursor_col = (self.cursor_col + n).min(self.cols - 1);
            }
            'D' => {
                let n = param(params, 0, 1) as usize;
                self.cursor_col = self.cursor_col.saturating_sub(n);
            }
            'G' => {
                let n = param(params, 0, 1) as usize;
                self.cursor_col = (n - 1).min(self.cols - 1);
            }
            'H' | 'f' => {
                let row = param(params, 0, 1) as usize;
                let col = param(params, 1, 1) as usize;
                self.cursor_row = self.viewport_top() + (row - 1).min(self.viewport_rows - 1);
                self.cursor_col = (col - 1).min(self.cols - 1);
                self.ensure_row(self.cursor_row);
            }
            'd' => {
                let row = param(params, 0, 1) as usize;
                self.cursor_row = self.viewport_top() + (row - 1).min(self.viewport_rows - 1);
                self.ensure_row(self.cursor_row);
            }
            'J' => self.erase_in_display(param_raw(params, 0, 0)),
            'K' => self.erase_in_line(param_raw(params, 0, 0)),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, _intermediates: &[u8], _ignore: bool, _byte: u8) {}

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _action: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, _params: &[&[u8]], _bell_terminated: bool) {}
}
