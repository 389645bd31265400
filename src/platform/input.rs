//! Stdin escape-sequence buffering.
//!
//! Raw-mode reads can split an escape sequence across chunks. The decoder
//! holds incomplete tails until they complete or a short timeout expires,
//! then emits them verbatim so no byte is ever dropped or reordered.

use std::time::{Duration, Instant};

const ESC: u8 = 0x1b;

#[derive(Debug)]
enum SequenceStatus {
    Complete,
    Incomplete,
}

#[derive(Debug)]
struct SequenceSplit {
    sequences: Vec<String>,
    remainder: String,
}

/// Buffers raw stdin bytes and emits complete key/mouse sequences.
pub struct InputDecoder {
    buffer: String,
    timeout_ms: u64,
    flush_deadline: Option<Instant>,
}

impl InputDecoder {
    pub fn new(timeout_ms: u64) -> Self {
        Self {
            buffer: String::new(),
            timeout_ms,
            flush_deadline: None,
        }
    }

    /// Feeds a chunk of raw bytes; returns every sequence completed by it.
    pub fn process(&mut self, data: &[u8]) -> Vec<String> {
        self.flush_deadline = None;

        let chunk = String::from_utf8_lossy(data);
        self.buffer.push_str(&chunk);

        let split = extract_complete_sequences(&self.buffer);
        self.buffer = split.remainder;

        if !self.buffer.is_empty() {
            self.flush_deadline = Some(Instant::now() + Duration::from_millis(self.timeout_ms));
        }

        split.sequences
    }

    /// Flushes a buffered incomplete tail once its deadline has passed.
    pub fn flush_due(&mut self, now: Instant) -> Vec<String> {
        if self.buffer.is_empty() {
            self.flush_deadline = None;
            return Vec::new();
        }

        if let Some(deadline) = self.flush_deadline {
            if now >= deadline {
                self.flush_deadline = None;
                let pending = std::mem::take(&mut self.buffer);
                return vec![pending];
            }
        }

        Vec::new()
    }

    /// Poll timeout for the read loop, capped by `default_ms`.
    pub fn next_timeout_ms(&self, now: Instant, default_ms: i32) -> i32 {
        if let Some(deadline) = self.flush_deadline {
            let remaining = deadline.saturating_duration_since(now);
            let ms = remaining.as_millis().min(i32::MAX as u128) as i32;
            return ms.min(default_ms).max(0);
        }
        default_ms
    }

    pub fn clear(&mut self) {
        self.flush_deadline = None;
        self.buffer.clear();
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }
}

fn extract_complete_sequences(buffer: &str) -> SequenceSplit {
    let mut sequences = Vec::new();
    let mut pos = 0;
    let bytes = buffer.as_bytes();

    while pos < bytes.len() {
        if bytes[pos] == ESC {
            let mut seq_end = pos + 1;
            let mut completed = false;

            while seq_end <= bytes.len() {
                let candidate = &buffer[pos..seq_end];
                match sequence_status(candidate) {
                    SequenceStatus::Complete => {
                        sequences.push(candidate.to_string());
                        pos = seq_end;
                        completed = true;
                        break;
                    }
                    SequenceStatus::Incomplete => {
                        seq_end += 1;
                    }
                }
            }

            if !completed {
                return SequenceSplit {
                    sequences,
                    remainder: buffer[pos..].to_string(),
                };
            }
        } else {
            let ch = buffer[pos..].chars().next().expect("buffer char missing");
            sequences.push(ch.to_string());
            pos += ch.len_utf8();
        }
    }

    SequenceSplit {
        sequences,
        remainder: String::new(),
    }
}

fn sequence_status(data: &str) -> SequenceStatus {
    debug_assert!(data.starts_with('\x1b'));

    if data.len() == 1 {
        return SequenceStatus::Incomplete;
    }

    let after = &data[1..];

    if let Some(payload) = after.strip_prefix('[') {
        return csi_status(payload);
    }

    if after.starts_with('O') {
        return if after.len() >= 2 {
            SequenceStatus::Complete
        } else {
            SequenceStatus::Incomplete
        };
    }

    // Alt-modified key (ESC + one char).
    SequenceStatus::Complete
}

fn csi_status(payload: &str) -> SequenceStatus {
    let Some(&last_byte) = payload.as_bytes().last() else {
        return SequenceStatus::Incomplete;
    };

    if !(0x40..=0x7e).contains(&last_byte) {
        return SequenceStatus::Incomplete;
    }

    // SGR mouse reports end in M/m but the '<' introducer also sits in the
    // final-byte range, so require the full "<b;x;y" parameter shape.
    if let Some(inner) = payload.strip_prefix('<') {
        let last_char = last_byte as char;
        if last_char == 'M' || last_char == 'm' {
            let params = &inner[..inner.len() - 1];
            let parts: Vec<&str> = params.split(';').collect();
            if parts.len() == 3
                && parts
                    .iter()
                    .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()))
            {
                return SequenceStatus::Complete;
            }
        }
        return SequenceStatus::Incomplete;
    }

    SequenceStatus::Complete
}
