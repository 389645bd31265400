//! Typed terminal output commands and a single output gate.
//!
//! Invariant: all terminal writes must flow through `OutputGate::flush(..)`.

use crate::core::terminal::Terminal;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalCmd {
    /// Raw bytes/control sequences (UTF-8 string) to be written to the terminal.
    Bytes(String),
    /// Static raw bytes/control sequences (UTF-8 string) to be written to the terminal.
    BytesStatic(&'static str),

    /// Cursor visibility.
    HideCursor,
    ShowCursor,

    /// Mouse reporting (button + any-motion + urxvt + SGR encodings).
    MouseCaptureEnable,
    MouseCaptureDisable,
}

impl TerminalCmd {
    pub fn bytes(data: impl Into<String>) -> Self {
        Self::Bytes(data.into())
    }
}

#[derive(Debug, Default)]
pub struct OutputGate {
    cmds: Vec<TerminalCmd>,
}

impl OutputGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: TerminalCmd) {
        self.cmds.push(cmd);
    }

    pub fn extend<I>(&mut self, cmds: I)
    where
        I: IntoIterator<Item = TerminalCmd>,
    {
        self.cmds.extend(cmds);
    }

    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    pub fn clear(&mut self) {
        self.cmds.clear();
    }

    /// Flush buffered commands to the terminal.
    ///
    /// This is the single write gate: `Terminal::write(..)` must not be called
    /// from anywhere else.
    pub fn flush<T: Terminal>(&mut self, term: &mut T) {
        for cmd in self.cmds.drain(..) {
            match cmd {
                TerminalCmd::Bytes(data) => term.write(&data),
                TerminalCmd::BytesStatic(data) => term.write(data),
                TerminalCmd::HideCursor => term.write("\x1b[?25l"),
                TerminalCmd::ShowCursor => term.write("\x1b[?25h"),
                TerminalCmd::MouseCaptureEnable => {
                    term.write("\x1b[?1000h\x1b[?1003h\x1b[?1015h\x1b[?1006h");
                }
                TerminalCmd::MouseCaptureDisable => {
                    term.write("\x1b[?1000l\x1b[?1003l\x1b[?1015l\x1b[?1006l");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::terminal::Terminal;

    #[derive(Default)]
    struct RecordingTerminal {
        written: String,
    }

    impl Terminal for RecordingTerminal {
        fn start(
            &mut self,
            _on_input: Box<dyn FnMut(String) + Send>,
            _on_resize: Box<dyn FnMut() + Send>,
        ) -> std::io::Result<()> {
            Ok(())
        }

        fn stop(&mut self) -> std::io::Result<()> {
            Ok(())
        }

        fn drain_input(&mut self, _max_ms: u64, _idle_ms: u64) {}

        fn write(&mut self, data: &str) {
            self.written.push_str(data);
        }

        fn columns(&self) -> u16 {
            80
        }

        fn rows(&self) -> u16 {
            24
        }
    }

    #[test]
    fn flush_drains_in_order() {
        let mut gate = OutputGate::new();
        let mut term = RecordingTerminal::default();
        gate.push(TerminalCmd::HideCursor);
        gate.push(TerminalCmd::bytes("hello"));
        gate.push(TerminalCmd::ShowCursor);
        gate.flush(&mut term);

        assert_eq!(term.written, "\x1b[?25lhello\x1b[?25h");
        assert!(gate.is_empty());
    }

    #[test]
    fn mouse_capture_sequences() {
        let mut gate = OutputGate::new();
        let mut term = RecordingTerminal::default();
        gate.push(TerminalCmd::MouseCaptureEnable);
        gate.push(TerminalCmd::MouseCaptureDisable);
        gate.flush(&mut term);

        assert_eq!(
            term.written,
            "\x1b[?1000h\x1b[?1003h\x1b[?1015h\x1b[?1006h\x1b[?1000l\x1b[?1003l\x1b[?1015l\x1b[?1006l"
        );
    }
}
