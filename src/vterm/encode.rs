//! Attribute run-length encoding of grid cells back into ANSI text.
//!
//! Cells are emitted left to right with only the attribute transitions
//! between consecutive cells, so a row of uniformly styled text costs one
//! escape, not one per cell.

use crate::vterm::cell::{Cell, CellAttrs, Color};

fn fg_sequence(color: Color) -> String {
    match color {
        Color::Default => "\x1b[39m".to_string(),
        Color::Palette(n) => format!("\x1b[38;5;{n}m"),
        Color::Rgb(r, g, b) => format!("\x1b[38;2;{r};{g};{b}m"),
    }
}

fn bg_sequence(color: Color) -> String {
    match color {
        Color::Default => "\x1b[49m".to_string(),
        Color::Palette(n) => format!("\x1b[48;5;{n}m"),
        Color::Rgb(r, g, b) => format!("\x1b[48;2;{r};{g};{b}m"),
    }
}

/// Appends the escape codes that take `prev`'s attribute state to `next`'s,
/// followed by `next`'s character (nothing for null cells).
pub fn push_cell_transition(out: &mut String, prev: &CellAttrs, next: &Cell) {
    let next_attrs = &next.attrs;

    if prev.bold && !next_attrs.bold {
        out.push_str("\x1b[22m");
    } else if !prev.bold && next_attrs.bold {
        out.push_str("\x1b[1m");
    }

    if prev.italic && !next_attrs.italic {
        out.push_str("\x1b[23m");
    } else if !prev.italic && next_attrs.italic {
        out.push_str("\x1b[3m");
    }

    if prev.underline && !next_attrs.underline {
        out.push_str("\x1b[24m");
    } else if !prev.underline && next_attrs.underline {
        out.push_str("\x1b[4m");
    }

    if prev.strikethrough && !next_attrs.strikethrough {
        out.push_str("\x1b[29m");
    } else if !prev.strikethrough && next_attrs.strikethrough {
        out.push_str("\x1b[9m");
    }

    if prev.inverse && !next_attrs.inverse {
        out.push_str("\x1b[27m");
    } else if !prev.inverse && next_attrs.inverse {
        out.push_str("\x1b[7m");
    }

    if prev.dim && !next_attrs.dim {
        out.push_str("\x1b[22m");
    } else if !prev.dim && next_attrs.dim {
        out.push_str("\x1b[2m");
    }

    if prev.hidden && !next_attrs.hidden {
        out.push_str("\x1b[28m");
    } else if !prev.hidden && next_attrs.hidden {
        out.push_str("\x1b[8m");
    }

    if prev.fg != next_attrs.fg {
        out.push_str("\x1b[39m");
        if next_attrs.fg != Color::Default {
            out.push_str(&fg_sequence(next_attrs.fg));
        }
    }

    if prev.bg != next_attrs.bg {
        out.push_str("\x1b[49m");
        if next_attrs.bg != Color::Default {
            out.push_str(&bg_sequence(next_attrs.bg));
        }
    }

    if let Some(ch) = next.ch {
        out.push(ch);
    }
}
