//! Editing-surface collaborator.
//!
//! Positions use a zero-based line index and a byte offset (`ch`) into that
//! line. Every method takes `&self`: a host editor is a shared handle, and
//! the user keeps typing while an embed is suspended on network I/O.

use std::cell::RefCell;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Position {
    pub line: usize,
    pub ch: usize,
}

impl Position {
    pub fn new(line: usize, ch: usize) -> Self {
        Self { line, ch }
    }

    /// Position right after `text` when it is written starting at `self`.
    pub fn advance(self, text: &str) -> Position {
        match text.rfind('\n') {
            Some(idx) => Position {
                line: self.line + text.matches('\n').count(),
                ch: text.len() - idx - 1,
            },
            None => Position {
                line: self.line,
                ch: self.ch + text.len(),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Boundary {
    pub start: Position,
    pub end: Position,
}

impl Boundary {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn empty(at: Position) -> Self {
        Self { start: at, end: at }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Handle to a span the editor keeps up to date while the document changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TrackedSpan(pub u64);

/// Snapshot of a speculative placeholder write. The commit only goes through
/// while the tracked span still holds `placeholder_text`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingEmbed {
    pub span: TrackedSpan,
    /// Where the placeholder was written
    pub boundary: Boundary,
    pub placeholder_text: String,
}

pub trait Editor {
    fn cursor(&self) -> Position;
    fn set_cursor(&self, pos: Position);

    /// Active non-empty selection, if any.
    fn selection(&self) -> Option<Boundary>;
    fn set_selection(&self, boundary: Boundary);

    fn line(&self, line: usize) -> Option<String>;
    fn line_count(&self) -> usize;

    /// Text inside `boundary`, `None` when the span no longer exists.
    fn range(&self, boundary: &Boundary) -> Option<String>;

    /// Replaces `boundary` with `text` and returns the span now holding `text`.
    fn replace_range(&self, text: &str, boundary: &Boundary) -> Boundary;

    /// Starts following `boundary`. Edits before it move it, edits after it
    /// leave it alone, edits touching its inside invalidate it.
    fn track(&self, boundary: Boundary) -> TrackedSpan;

    /// Current position of a tracked span, `None` once an edit went through it.
    fn tracked(&self, span: TrackedSpan) -> Option<Boundary>;

    fn untrack(&self, span: TrackedSpan);

    /// Replaces the pending span with `text` only if it still holds the
    /// exact placeholder, and returns the span now holding `text`. The span
    /// stops being tracked either way. Hosts with a transactional API
    /// should override this.
    fn compare_and_replace(&self, pending: &PendingEmbed, text: &str) -> Option<Boundary> {
        let current = self.tracked(pending.span);
        self.untrack(pending.span);
        let boundary = current?;
        match self.range(&boundary) {
            Some(found) if found == pending.placeholder_text => Some(self.replace_range(text, &boundary)),
            _ => None,
        }
    }
}

pub trait Clipboard {
    fn read_text(&self) -> Option<String>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticClipboard(pub Option<String>);

impl StaticClipboard {
    pub fn new(text: impl Into<String>) -> Self {
        Self(Some(text.into()))
    }
}

impl Clipboard for StaticClipboard {
    fn read_text(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Byte range of a tracked span, `None` once invalidated.
type SpanOffsets = Option<(usize, usize)>;

#[derive(Debug, Default)]
struct BufferState {
    text: String,
    cursor: Position,
    selection: Option<Boundary>,
    spans: HashMap<u64, SpanOffsets>,
    next_span: u64,
}

impl BufferState {
    fn line_starts(&self) -> Vec<usize> {
        std::iter::once(0)
            .chain(self.text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect()
    }

    fn line_end(&self, starts: &[usize], line: usize) -> usize {
        starts
            .get(line + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len())
    }

    /// Exact byte offset of `pos`, `None` if it falls outside the document.
    fn offset(&self, pos: Position) -> Option<usize> {
        let starts = self.line_starts();
        let start = *starts.get(pos.line)?;
        let end = self.line_end(&starts, pos.line);
        let offset = start + pos.ch;
        if offset > end || !self.text.is_char_boundary(offset) {
            return None;
        }
        Some(offset)
    }

    /// Like `offset`, but clamps into the document.
    fn clamped_offset(&self, pos: Position) -> usize {
        let starts = self.line_starts();
        match starts.get(pos.line) {
            Some(start) => {
                let end = self.line_end(&starts, pos.line);
                let mut offset = (start + pos.ch).min(end);
                while !self.text.is_char_boundary(offset) {
                    offset -= 1;
                }
                offset
            }
            None => self.text.len(),
        }
    }

    /// Moves tracked spans after the edit `start..end` that wrote `inserted` bytes.
    fn shift_spans(&mut self, start: usize, end: usize, inserted: usize) {
        for offsets in self.spans.values_mut() {
            let Some((s, t)) = *offsets else { continue };
            *offsets = if end <= s {
                Some((s + inserted - (end - start), t + inserted - (end - start)))
            } else if start >= t {
                Some((s, t))
            } else {
                None
            };
        }
    }

    fn position_of(&self, offset: usize) -> Position {
        let before = &self.text[..offset];
        let line = before.matches('\n').count();
        let ch = before.rfind('\n').map(|idx| offset - idx - 1).unwrap_or(offset);
        Position { line, ch }
    }
}

/// In-memory document implementing [`Editor`].
#[derive(Debug, Default)]
pub struct TextBuffer {
    state: RefCell<BufferState>,
}

impl TextBuffer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            state: RefCell::new(BufferState {
                text: text.into(),
                ..Default::default()
            }),
        }
    }

    pub fn with_cursor(self, cursor: Position) -> Self {
        self.set_cursor(cursor);
        self
    }

    pub fn text(&self) -> String {
        self.state.borrow().text.clone()
    }

    /// Inserts `text` at `pos` as the user would by typing.
    pub fn type_at(&self, pos: Position, text: &str) {
        self.replace_range(text, &Boundary::empty(pos));
    }
}

impl Editor for TextBuffer {
    fn cursor(&self) -> Position {
        self.state.borrow().cursor
    }

    fn set_cursor(&self, pos: Position) {
        let mut state = self.state.borrow_mut();
        let offset = state.clamped_offset(pos);
        state.cursor = state.position_of(offset);
        state.selection = None;
    }

    fn selection(&self) -> Option<Boundary> {
        self.state.borrow().selection.filter(|b| !b.is_empty())
    }

    fn set_selection(&self, boundary: Boundary) {
        let mut state = self.state.borrow_mut();
        state.selection = Some(boundary);
        state.cursor = boundary.end;
    }

    fn line(&self, line: usize) -> Option<String> {
        self.state.borrow().text.split('\n').nth(line).map(str::to_owned)
    }

    fn line_count(&self) -> usize {
        self.state.borrow().text.split('\n').count()
    }

    fn range(&self, boundary: &Boundary) -> Option<String> {
        let state = self.state.borrow();
        let start = state.offset(boundary.start)?;
        let end = state.offset(boundary.end)?;
        if start > end {
            return None;
        }
        Some(state.text[start..end].to_string())
    }

    fn replace_range(&self, text: &str, boundary: &Boundary) -> Boundary {
        let mut state = self.state.borrow_mut();
        let start = state.clamped_offset(boundary.start);
        let end = state.clamped_offset(boundary.end).max(start);
        state.text.replace_range(start..end, text);
        state.shift_spans(start, end, text.len());

        let start_pos = state.position_of(start);
        let end_pos = start_pos.advance(text);
        state.cursor = end_pos;
        state.selection = None;
        Boundary::new(start_pos, end_pos)
    }

    fn track(&self, boundary: Boundary) -> TrackedSpan {
        let mut state = self.state.borrow_mut();
        let start = state.clamped_offset(boundary.start);
        let end = state.clamped_offset(boundary.end).max(start);
        let id = state.next_span;
        state.next_span += 1;
        state.spans.insert(id, Some((start, end)));
        TrackedSpan(id)
    }

    fn tracked(&self, span: TrackedSpan) -> Option<Boundary> {
        let state = self.state.borrow();
        let (start, end) = (*state.spans.get(&span.0)?)?;
        Some(Boundary::new(state.position_of(start), state.position_of(end)))
    }

    fn untrack(&self, span: TrackedSpan) {
        self.state.borrow_mut().spans.remove(&span.0);
    }
}
