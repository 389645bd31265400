//! Deterministic interleaving of wrapped log lines across services.
//!
//! Ordering key: (timestamp, source id, per-source line id), with a source
//! line's wrapped segments kept contiguous in wrap order. Equal-timestamp
//! lines from different sources therefore group by source id instead of
//! interleaving their segments.

use log_store::LogLine;

use crate::core::text::wrap_with_prefix;

/// One wrapped display segment of a source log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedLogLine {
    pub source_id: String,
    pub timestamp: i64,
    pub source_line_id: u64,
    pub wrap_index: usize,
    pub text: String,
}

impl WrappedLogLine {
    fn line_key(&self) -> (i64, &str, u64) {
        (self.timestamp, &self.source_id, self.source_line_id)
    }
}

/// A source's contribution to a full rebuild.
pub struct MergeSource<'a> {
    pub source_id: &'a str,
    pub prefix: Option<&'a str>,
    pub lines: &'a [LogLine],
}

/// Maintains the merged, wrapped log line sequence for the log pane.
pub struct LogMerger {
    width: usize,
    lines: Vec<WrappedLogLine>,
}

impl LogMerger {
    pub fn new(width: usize) -> Self {
        Self {
            width,
            lines: Vec::new(),
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Changes the wrap width and drops all content; the caller rebuilds
    /// from the stores afterwards.
    pub fn set_width(&mut self, width: usize) {
        self.width = width;
        self.lines.clear();
    }

    pub fn lines(&self) -> &[WrappedLogLine] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Last `count` wrapped segments.
    pub fn tail(&self, count: usize) -> &[WrappedLogLine] {
        let start = self.lines.len().saturating_sub(count);
        &self.lines[start..]
    }

    /// Rewraps and re-sorts everything from scratch. Used on resize and when
    /// the set of displayed sources changes.
    pub fn rebuild(&mut self, sources: &[MergeSource<'_>]) {
        self.lines.clear();
        for source in sources {
            for line in source.lines {
                self.lines
                    .extend(wrap_segments(source.source_id, source.prefix, line, self.width));
            }
        }
        self.lines.sort_by(|a, b| {
            a.line_key()
                .cmp(&b.line_key())
                .then(a.wrap_index.cmp(&b.wrap_index))
        });
    }

    /// Inserts one new source line, keeping the sequence sorted.
    ///
    /// New lines almost always sort at the tail, so the insertion point is
    /// found by walking back from the end. Returns the index of the first
    /// inserted segment.
    pub fn insert(&mut self, source_id: &str, prefix: Option<&str>, line: &LogLine) -> usize {
        let segments = wrap_segments(source_id, prefix, line, self.width);
        let key = (line.timestamp, source_id, line.id);

        let mut index = self.lines.len();
        while index > 0 {
            if self.lines[index - 1].line_key() <= key {
                break;
            }
            index -= 1;
        }

        self.lines.splice(index..index, segments);
        index
    }
}

fn wrap_segments(
    source_id: &str,
    prefix: Option<&str>,
    line: &LogLine,
    width: usize,
) -> Vec<WrappedLogLine> {
    wrap_with_prefix(&line.text, width, prefix)
        .into_iter()
        .enumerate()
        .map(|(wrap_index, text)| WrappedLogLine {
            source_id: source_id.to_string(),
            timestamp: line.timestamp,
            source_line_id: line.id,
            wrap_index,
            text,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(id: u64, timestamp: i64, text: &str) -> LogLine {
        LogLine::new(id, timestamp, text)
    }

    fn texts(merger: &LogMerger) -> Vec<&str> {
        merger.lines().iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn interleaves_by_timestamp_across_sources() {
        let mut merger = LogMerger::new(80);
        merger.insert("a", None, &line(0, 100, "a first"));
        merger.insert("b", None, &line(0, 120, "b first"));
        merger.insert("a", None, &line(1, 150, "a second"));

        assert_eq!(texts(&merger), vec!["a first", "b first", "a second"]);
    }

    #[test]
    fn late_arrival_is_inserted_before_newer_lines() {
        let mut merger = LogMerger::new(80);
        merger.insert("a", None, &line(0, 100, "early"));
        merger.insert("a", None, &line(1, 300, "late"));
        merger.insert("b", None, &line(0, 200, "middle"));

        assert_eq!(texts(&merger), vec!["early", "middle", "late"]);
    }

    #[test]
    fn wrapped_segments_of_a_line_stay_contiguous() {
        let mut merger = LogMerger::new(4);
        merger.insert("a", None, &line(0, 100, "aaaaaaaa"));
        merger.insert("b", None, &line(0, 100, "bbbbbbbb"));

        assert_eq!(texts(&merger), vec!["aaaa", "aaaa", "bbbb", "bbbb"]);
    }

    #[test]
    fn equal_timestamps_group_by_source_id() {
        let mut merger = LogMerger::new(80);
        merger.insert("zeta", None, &line(0, 100, "z"));
        merger.insert("alpha", None, &line(0, 100, "a"));

        assert_eq!(texts(&merger), vec!["a", "z"]);
    }

    #[test]
    fn incremental_insert_matches_full_rebuild() {
        let a_lines = vec![line(0, 100, "a0"), line(1, 150, "a1")];
        let b_lines = vec![line(0, 120, "b0"), line(1, 150, "b1")];

        let mut incremental = LogMerger::new(80);
        for l in &a_lines {
            incremental.insert("a", Some("a: "), l);
        }
        for l in &b_lines {
            incremental.insert("b", Some("b: "), l);
        }

        let mut rebuilt = LogMerger::new(80);
        rebuilt.rebuild(&[
            MergeSource {
                source_id: "a",
                prefix: Some("a: "),
                lines: &a_lines,
            },
            MergeSource {
                source_id: "b",
                prefix: Some("b: "),
                lines: &b_lines,
            },
        ]);

        assert_eq!(incremental.lines(), rebuilt.lines());
    }

    #[test]
    fn set_width_clears_for_rebuild() {
        let mut merger = LogMerger::new(80);
        merger.insert("a", None, &line(0, 100, "hello"));
        merger.set_width(40);
        assert!(merger.is_empty());
        assert_eq!(merger.width(), 40);
    }

    #[test]
    fn tail_returns_the_newest_segments() {
        let mut merger = LogMerger::new(80);
        for n in 0..5 {
            merger.insert("a", None, &line(n, 100 + n as i64, &format!("line {n}")));
        }
        let tail = merger.tail(2);
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[1].text, "line 4");
    }

    #[test]
    fn prefix_is_applied_to_every_segment() {
        let mut merger = LogMerger::new(10);
        merger.insert("web", Some("web: "), &line(0, 100, "aaaaabbbbb"));
        assert_eq!(texts(&merger), vec!["web: aaaaa", "web: bbbbb"]);
    }
}
