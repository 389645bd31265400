//! Cell and attribute types for the virtual terminal grid.

/// Foreground or background color of a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Color {
    #[default]
    Default,
    Palette(u8),
    Rgb(u8, u8, u8),
}

/// SGR attribute state carried by a cell (and by the grid cursor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellAttrs {
    pub bold: bool,
    pub dim: bool,
    pub italic: bool,
    pub underline: bool,
    pub inverse: bool,
    pub hidden: bool,
    pub strikethrough: bool,
    pub fg: Color,
    pub bg: Color,
}

/// One grid cell. `ch == None` means the cell was never written; encoding a
/// null cell contributes no character, so the cursor does not advance past it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cell {
    pub ch: Option<char>,
    pub attrs: CellAttrs,
}

impl Cell {
    pub const NULL: Cell = Cell {
        ch: None,
        attrs: CellAttrs {
            bold: false,
            dim: false,
            italic: false,
            underline: false,
            inverse: false,
            hidden: false,
            strikethrough: false,
            fg: Color::Default,
            bg: Color::Default,
        },
    };

    #[must_use]
    pub fn new(ch: char, attrs: CellAttrs) -> Self {
        Self {
            ch: Some(ch),
            attrs,
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        self.ch.is_none()
    }
}
