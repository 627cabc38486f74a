//! Placeholder/commit protocol.
//!
//! An embed writes a placeholder block right away, fetches metadata and the
//! preview image while the user keeps editing, then swaps the placeholder
//! for the final block. The swap only happens if the placeholder is still
//! there, byte for byte; otherwise the embed is dropped and the user's text
//! wins.

use std::time::Duration;

use crate::config::Config;
use crate::editor::{Boundary, Clipboard, Editor, PendingEmbed, Position};
use crate::errors::EmbedError;
use crate::images::ImageMaterializer;
use crate::logging::{guarded, LogContext};
use crate::metadata::{EmbedMetadata, ParserChain, ParserKind};
use crate::selection::{self, Selection};
use crate::template::{self, TemplateKind};
use crate::vault::FsVault;

pub const ABORT_NOTICE: &str = "Dummy preview has been deleted or modified. Replacing is cancelled.";

#[derive(Debug, Clone)]
pub struct EmbedOptions {
    /// Chain used by [`Embedder::embed_link`]
    pub parsers: Vec<ParserKind>,
    pub in_place: bool,
    pub delay: Duration,
    pub template: TemplateKind,
    pub enable_error_wrapping: bool,
}

impl Default for EmbedOptions {
    fn default() -> Self {
        Self {
            parsers: vec![ParserKind::MicroLink, ParserKind::JsonLink],
            in_place: false,
            delay: Duration::ZERO,
            template: TemplateKind::default(),
            enable_error_wrapping: false,
        }
    }
}

impl EmbedOptions {
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            parsers: config.default_chain()?,
            in_place: config.in_place,
            delay: Duration::from_millis(config.delay_ms),
            template: config.template,
            enable_error_wrapping: config.enable_error_wrapping,
        })
    }
}

/// Where a single embed is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedState {
    Idle,
    SelectionResolved,
    PlaceholderInserted,
    /// Trying the parser at this index of the chain
    Fetching(usize),
    Materializing,
    Committing,
    Committed,
    Aborted,
    FetchExhausted,
}

fn advance(state: &mut EmbedState, next: EmbedState, log: &LogContext) {
    log.trace(&format!("embed state {state:?} -> {next:?}"));
    *state = next;
}

/// A committed embed.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbedOutcome {
    /// Span now holding `markup`
    pub boundary: Boundary,
    pub markup: String,
    pub metadata: EmbedMetadata,
}

pub struct Embedder {
    chain: ParserChain,
    materializer: ImageMaterializer,
    options: EmbedOptions,
}

impl Embedder {
    pub fn new(chain: ParserChain, materializer: ImageMaterializer, options: EmbedOptions) -> Self {
        Self {
            chain,
            materializer,
            options,
        }
    }

    pub fn from_config(config: &Config, vault: &FsVault) -> anyhow::Result<Self> {
        let chain = ParserChain::from_config(config)?;
        let materializer = ImageMaterializer::new(
            chain.client().clone(),
            vault.attachments(&config.attachments_dir)?,
            &config.attachments_dir,
            &config.fallback_extension,
        );
        Ok(Self::new(chain, materializer, EmbedOptions::from_config(config)?))
    }

    /// Embeds the resolved link with the configured `[primary, backup]` chain.
    pub async fn embed_link(
        &self,
        editor: &dyn Editor,
        clipboard: &dyn Clipboard,
        log: &LogContext,
    ) -> Result<EmbedOutcome, EmbedError> {
        guarded(
            log,
            self.options.enable_error_wrapping,
            "embed_link",
            self.run(editor, clipboard, &self.options.parsers, log),
        )
        .await
    }

    /// Embeds the resolved link with a single parser.
    pub async fn embed_link_with(
        &self,
        editor: &dyn Editor,
        clipboard: &dyn Clipboard,
        kind: ParserKind,
        log: &LogContext,
    ) -> Result<EmbedOutcome, EmbedError> {
        guarded(
            log,
            self.options.enable_error_wrapping,
            "embed_link_with",
            self.run(editor, clipboard, &[kind], log),
        )
        .await
    }

    async fn run(
        &self,
        editor: &dyn Editor,
        clipboard: &dyn Clipboard,
        parsers: &[ParserKind],
        log: &LogContext,
    ) -> Result<EmbedOutcome, EmbedError> {
        let selected = selection::resolve(editor, clipboard, log);
        selection::check_url_valid(&selected, log)?;
        self.embed_url(editor, &selected, parsers, log).await
    }

    /// Writes the placeholder for `selected` and returns the snapshot the
    /// commit is checked against. The placeholder span is tracked until the
    /// embed ends.
    pub fn insert_placeholder(&self, editor: &dyn Editor, selected: &Selection, log: &LogContext) -> PendingEmbed {
        if self.options.in_place && selected.can_replace {
            editor.replace_range("", &selected.boundary);
        }

        let placeholder_text = format!(
            "{}\n",
            template::render(self.options.template, &template::placeholder(&selected.text))
        );

        let cursor = editor.cursor();
        let line_text = editor.line(cursor.line).unwrap_or_default();
        let (at, text) = if line_text.is_empty() {
            (Position::new(cursor.line, 0), placeholder_text.clone())
        } else if cursor.line + 1 < editor.line_count() {
            (Position::new(cursor.line + 1, 0), placeholder_text.clone())
        } else {
            (
                Position::new(cursor.line, line_text.len()),
                format!("\n{placeholder_text}"),
            )
        };

        let written = editor.replace_range(&text, &Boundary::empty(at));
        let start = if text.starts_with('\n') {
            Position::new(written.start.line + 1, 0)
        } else {
            written.start
        };
        log.debug(&format!("placeholder written at {start:?}"));

        let boundary = Boundary::new(start, written.end);
        PendingEmbed {
            span: editor.track(boundary),
            boundary,
            placeholder_text,
        }
    }

    /// Runs the protocol for an already validated selection.
    pub async fn embed_url(
        &self,
        editor: &dyn Editor,
        selected: &Selection,
        parsers: &[ParserKind],
        log: &LogContext,
    ) -> Result<EmbedOutcome, EmbedError> {
        let mut state = EmbedState::Idle;
        advance(&mut state, EmbedState::SelectionResolved, log);

        let pending = self.insert_placeholder(editor, selected, log);
        advance(&mut state, EmbedState::PlaceholderInserted, log);

        let fetched = self
            .chain
            .embed_with(&selected.text, parsers, log, |idx, _| {
                advance(&mut state, EmbedState::Fetching(idx), log)
            })
            .await;
        let metadata = match fetched {
            Ok(metadata) => metadata,
            Err(err) => {
                advance(&mut state, EmbedState::FetchExhausted, log);
                editor.untrack(pending.span);
                log.debug(&err.to_string());
                log.warn("embedUrl", "Failed to fetch data");
                return Err(err);
            }
        };

        advance(&mut state, EmbedState::Materializing, log);
        let image = match self.materializer.materialize(&metadata.image, log).await {
            Ok(image) => image,
            Err(err) => {
                advance(&mut state, EmbedState::Aborted, log);
                editor.untrack(pending.span);
                log.error("embedUrl", &err);
                return Err(err.into());
            }
        };
        let metadata = metadata.with_image(image);
        let markup = format!("{}\n", template::render(self.options.template, &metadata));

        if !self.options.delay.is_zero() {
            tokio::time::sleep(self.options.delay).await;
        }

        advance(&mut state, EmbedState::Committing, log);
        let Some(boundary) = editor.compare_and_replace(&pending, &markup) else {
            advance(&mut state, EmbedState::Aborted, log);
            log.notice(ABORT_NOTICE);
            return Err(EmbedError::ConcurrencyAbort);
        };
        advance(&mut state, EmbedState::Committed, log);

        Ok(EmbedOutcome {
            boundary,
            markup,
            metadata,
        })
    }
}
