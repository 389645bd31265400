//! ANSI-aware hard wrapping (the line wrapper feeding the log pane).
//!
//! Escapes are zero-width and survive wrapping; active SGR styles are
//! re-opened at the start of every continuation segment so color never
//! bleeds or disappears across wrap boundaries. Characters are never
//! dropped, and input is never trimmed.

use super::ansi::{extract_ansi_code, track_text, AnsiCodeTracker};
use super::width::{grapheme_width, visible_width};
use unicode_segmentation::UnicodeSegmentation;

/// Hard-wraps `text` to `width` columns.
///
/// Embedded newlines split segments first. Empty input and zero width both
/// yield a single empty line.
pub fn wrap_ansi(text: &str, width: usize) -> Vec<String> {
    if text.is_empty() || width == 0 {
        return vec![String::new()];
    }

    let mut result = Vec::new();
    let mut tracker = AnsiCodeTracker::default();

    for input_line in text.split('\n') {
        let reopen = if result.is_empty() {
            String::new()
        } else {
            tracker.active_codes()
        };
        let line = format!("{reopen}{input_line}");
        result.append(&mut wrap_single_line(&line, width));
        track_text(input_line, &mut tracker);
    }

    if result.is_empty() {
        vec![String::new()]
    } else {
        result
    }
}

/// Hard-wraps with a per-segment prefix; the width budget of every segment
/// is reduced by the prefix's visible width.
pub fn wrap_with_prefix(text: &str, width: usize, prefix: Option<&str>) -> Vec<String> {
    let Some(prefix) = prefix else {
        return wrap_ansi(text, width);
    };

    let budget = width.saturating_sub(visible_width(prefix)).max(1);
    wrap_ansi(text, budget)
        .into_iter()
        .map(|segment| format!("{prefix}{segment}"))
        .collect()
}

fn wrap_single_line(line: &str, width: usize) -> Vec<String> {
    if visible_width(line) <= width {
        return vec![line.to_string()];
    }

    let mut wrapped = Vec::new();
    let mut tracker = AnsiCodeTracker::default();
    let mut current = String::new();
    let mut current_width = 0;

    let mut idx = 0;
    while idx < line.len() {
        if let Some(ansi) = extract_ansi_code(line, idx) {
            tracker.process(&ansi.code);
            current.push_str(&ansi.code);
            idx += ansi.length;
            continue;
        }

        let text_end = next_ansi_or_end(line, idx);
        for grapheme in line[idx..text_end].graphemes(true) {
            let grapheme_cols = grapheme_width(grapheme);
            if current_width + grapheme_cols > width && current_width > 0 {
                wrapped.push(current);
                current = tracker.active_codes();
                current_width = 0;
            }
            current.push_str(grapheme);
            current_width += grapheme_cols;
        }
        idx = text_end;
    }

    if !current.is_empty() || wrapped.is_empty() {
        wrapped.push(current);
    }
    wrapped
}

fn next_ansi_or_end(line: &str, from: usize) -> usize {
    let bytes = line.as_bytes();
    let mut idx = from;
    while idx < bytes.len() {
        if bytes[idx] == 0x1b && extract_ansi_code(line, idx).is_some() {
            return idx;
        }
        idx += 1;
    }
    line.len()
}
