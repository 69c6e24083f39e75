use serde::{Deserialize, Serialize};
use unicode_width::UnicodeWidthChar;

const TAB_STOP: usize = 8;

/// One physical row of pane output. `wrapped` marks a row that continues
/// on the next one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalLine {
    pub text: String,
    pub wrapped: bool,
}

/// Wrapped pane output with bounded scrollback and a scroll position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalBuffer {
    pub width: u16,
    pub height: u16,
    pub scrollback_limit: usize,
    pub lines: Vec<TerminalLine>,
    pub viewport_top: usize,
}

impl TerminalBuffer {
    pub fn new(width: u16, height: u16, scrollback_limit: usize) -> Self {
        TerminalBuffer {
            width,
            height,
            scrollback_limit,
            lines: Vec::new(),
            viewport_top: 0,
        }
    }

    pub fn max_top(&self) -> usize {
        self.lines.len().saturating_sub(self.height as usize)
    }

    pub fn is_at_bottom(&self) -> bool {
        self.viewport_top >= self.max_top()
    }

    /// Append `text`, one logical line per `\n`. A single trailing newline
    /// terminates the last line rather than opening an empty one.
    pub fn append_output(&mut self, text: &str) {
        let follow = self.is_at_bottom();
        let normalized = text.replace("\r\n", "\n");
        let body = normalized.strip_suffix('\n').unwrap_or(&normalized);
        for logical in body.split('\n') {
            let expanded = expand_tabs(&logical.replace('\r', ""));
            self.lines.extend(wrap_line(&expanded, self.width as usize));
        }
        if self.lines.len() > self.scrollback_limit {
            let excess = self.lines.len() - self.scrollback_limit;
            self.lines.drain(..excess);
        }
        if follow {
            self.viewport_top = self.max_top();
        } else {
            self.viewport_top = self.viewport_top.min(self.max_top());
        }
    }

    /// Positive `delta` scrolls toward older output.
    pub fn scroll_viewport(&mut self, delta: i64) {
        let target = (self.viewport_top as i64).saturating_sub(delta);
        self.viewport_top = target.clamp(0, self.max_top() as i64) as usize;
    }

    pub fn set_viewport_top(&mut self, line: usize) {
        self.viewport_top = line.min(self.max_top());
    }

    pub fn set_viewport_to_bottom(&mut self) {
        self.viewport_top = self.max_top();
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.viewport_top = 0;
    }

    /// Adopt new pane dimensions. Existing rows keep their wrapping.
    pub fn resize(&mut self, width: u16, height: u16) {
        let follow = self.is_at_bottom();
        self.width = width;
        self.height = height;
        if follow {
            self.set_viewport_to_bottom();
        } else {
            self.viewport_top = self.viewport_top.min(self.max_top());
        }
    }

    pub fn viewport_lines(&self) -> &[TerminalLine] {
        let start = self.viewport_top.min(self.lines.len());
        let end = (start + self.height as usize).min(self.lines.len());
        &self.lines[start..end]
    }
}

fn expand_tabs(line: &str) -> String {
    if !line.contains('\t') {
        return line.to_string();
    }
    let mut out = String::with_capacity(line.len() + TAB_STOP);
    let mut col = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_STOP - (col % TAB_STOP);
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(ch);
            col += ch.width().unwrap_or(0);
        }
    }
    out
}

/// Greedy wrap by display width. An empty line still occupies one row.
fn wrap_line(line: &str, width: usize) -> Vec<TerminalLine> {
    let width = width.max(1);
    let mut rows = Vec::new();
    let mut current = String::new();
    let mut used = 0;
    for ch in line.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > width && used > 0 {
            rows.push(TerminalLine { text: std::mem::take(&mut current), wrapped: true });
            used = 0;
        }
        current.push(ch);
        used += w;
    }
    rows.push(TerminalLine { text: current, wrapped: false });
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(buf: &TerminalBuffer) -> Vec<&str> {
        buf.viewport_lines().iter().map(|l| l.text.as_str()).collect()
    }

    #[test]
    fn test_long_line_wraps_into_ceil_segments() {
        let mut buf = TerminalBuffer::new(10, 10, 100);
        buf.append_output(&"x".repeat(25));
        assert_eq!(buf.lines.len(), 3);
        assert!(buf.lines[0].wrapped);
        assert!(buf.lines[1].wrapped);
        assert!(!buf.lines[2].wrapped);
        assert_eq!(buf.lines[2].text.len(), 5);
    }

    #[test]
    fn test_exact_width_line_is_one_segment() {
        let mut buf = TerminalBuffer::new(4, 5, 100);
        buf.append_output("abcd");
        assert_eq!(buf.lines.len(), 1);
        assert!(!buf.lines[0].wrapped);
    }

    #[test]
    fn test_crlf_and_trailing_newline() {
        let mut buf = TerminalBuffer::new(20, 5, 100);
        buf.append_output("one\r\ntwo\n");
        assert_eq!(texts(&buf), vec!["one", "two"]);
        buf.append_output("");
        assert_eq!(buf.lines.len(), 3);
        assert_eq!(buf.lines[2].text, "");
    }

    #[test]
    fn test_tabs_expand_to_stops() {
        let mut buf = TerminalBuffer::new(40, 5, 100);
        buf.append_output("ab\tc");
        assert_eq!(buf.lines[0].text, "ab      c");
    }

    #[test]
    fn test_scrollback_trims_oldest() {
        let mut buf = TerminalBuffer::new(20, 2, 3);
        buf.append_output("1\n2\n3\n4\n5");
        assert_eq!(buf.lines.len(), 3);
        assert_eq!(buf.lines[0].text, "3");
        assert_eq!(texts(&buf), vec!["4", "5"]);
    }

    #[test]
    fn test_follows_bottom_only_when_at_bottom() {
        let mut buf = TerminalBuffer::new(20, 2, 100);
        buf.append_output("a\nb\nc\nd");
        assert_eq!(buf.viewport_top, 2);
        buf.scroll_viewport(2);
        assert_eq!(buf.viewport_top, 0);
        buf.append_output("e");
        assert_eq!(buf.viewport_top, 0);
        buf.set_viewport_to_bottom();
        buf.append_output("f");
        assert_eq!(texts(&buf), vec!["e", "f"]);
    }

    #[test]
    fn test_scroll_is_clamped_and_zero_is_noop() {
        let mut buf = TerminalBuffer::new(20, 3, 100);
        buf.append_output("a\nb\nc\nd\ne");
        let before = buf.clone();
        buf.scroll_viewport(0);
        assert_eq!(buf, before);
        buf.scroll_viewport(100);
        assert_eq!(buf.viewport_top, 0);
        buf.scroll_viewport(-100);
        assert_eq!(buf.viewport_top, 2);
        buf.set_viewport_top(99);
        assert_eq!(buf.viewport_top, 2);
    }

    #[test]
    fn test_scroll_saturates_on_extreme_deltas() {
        let mut buf = TerminalBuffer::new(20, 3, 100);
        buf.append_output("a\nb\nc\nd\ne");
        buf.scroll_viewport(i64::MAX);
        assert_eq!(buf.viewport_top, 0);
        buf.scroll_viewport(i64::MIN);
        assert_eq!(buf.viewport_top, 2);
    }

    #[test]
    fn test_clear_resets_everything() {
        let mut buf = TerminalBuffer::new(20, 1, 100);
        buf.append_output("a\nb\nc");
        buf.clear();
        assert!(buf.lines.is_empty());
        assert_eq!(buf.viewport_top, 0);
        assert!(buf.viewport_lines().is_empty());
    }

    #[test]
    fn test_wide_chars_wrap_by_display_width() {
        let mut buf = TerminalBuffer::new(4, 5, 100);
        buf.append_output("日本語");
        assert_eq!(buf.lines.len(), 2);
        assert_eq!(buf.lines[0].text, "日本");
    }
}
