//! Frame type produced by the frame renderer and consumed by the screen
//! diff engine.

/// One full-screen render: exactly `height` lines, top to bottom.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Frame {
    lines: Vec<String>,
}

impl Frame {
    pub fn new(lines: Vec<String>) -> Self {
        Self { lines }
    }

    /// Builds a frame padded or truncated to exactly `height` lines.
    pub fn sized(mut lines: Vec<String>, height: usize) -> Self {
        lines.truncate(height);
        while lines.len() < height {
            lines.push(String::new());
        }
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn height(&self) -> usize {
        self.lines.len()
    }

    /// Joins the frame into the single output string the diff engine
    /// compares between renders.
    pub fn into_output(self) -> String {
        self.lines.join("\n")
    }
}

impl From<Vec<String>> for Frame {
    fn from(lines: Vec<String>) -> Self {
        Self::new(lines)
    }
}
