//! Works out which text an embed request is about.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::editor::{Boundary, Clipboard, Editor, Position};
use crate::errors::EmbedError;
use crate::logging::LogContext;

/// Brackets end a link unless they come as a balanced `(...)` group:
/// `(https://a.com)` yields the bare link while
/// `https://en.wikipedia.org/wiki/Rust_(language)` matches whole.
static URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://(?:[^\s<>"'()\[\]{}]|\([^\s<>"'()\[\]{}]*\))+"#)
        .expect("Failed to compile URL regex")
});

/// Subject of an embed request. `can_replace` is false when the text came
/// from the clipboard, in which case `boundary` is empty at the cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub can_replace: bool,
    pub text: String,
    pub boundary: Boundary,
}

pub fn is_url(text: &str) -> bool {
    URL_REGEX.is_match(text)
}

/// Span of the URL on the cursor's line that contains the cursor, if any.
fn url_boundary_at_cursor(editor: &dyn Editor, log: &LogContext) -> Option<Boundary> {
    let cursor = editor.cursor();
    let line_text = editor.line(cursor.line)?;
    log.debug(&format!("cursor {cursor:?}, line text {line_text:?}"));

    URL_REGEX
        .find_iter(&line_text)
        .find(|m| m.start() <= cursor.ch && cursor.ch <= m.end())
        .map(|m| {
            Boundary::new(
                Position::new(cursor.line, m.start()),
                Position::new(cursor.line, m.end()),
            )
        })
}

/// Resolves the selection, falling back to the clipboard. Never fails:
/// "nothing usable" ends up as an empty, non-replaceable selection.
pub fn resolve(editor: &dyn Editor, clipboard: &dyn Clipboard, log: &LogContext) -> Selection {
    if let Some(boundary) = editor.selection() {
        if let Some(text) = editor.range(&boundary) {
            return Selection {
                can_replace: true,
                text,
                boundary,
            };
        }
    }

    if let Some(boundary) = url_boundary_at_cursor(editor, log) {
        if let Some(text) = editor.range(&boundary) {
            editor.set_selection(boundary);
            return Selection {
                can_replace: true,
                text,
                boundary,
            };
        }
    }

    let cursor = editor.cursor();
    log.debug("nothing selected, reading clipboard");
    Selection {
        can_replace: false,
        text: clipboard.read_text().unwrap_or_default(),
        boundary: Boundary::empty(cursor),
    }
}

/// Raises the user notice and rejects selections that are not links.
pub fn check_url_valid(selection: &Selection, log: &LogContext) -> Result<(), EmbedError> {
    if selection.text.is_empty() || !is_url(&selection.text) {
        log.notice("Need a link to convert to embed.");
        return Err(EmbedError::NeedLink);
    }
    Ok(())
}
