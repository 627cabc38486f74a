pub mod config;
pub mod editor;
pub mod embed;
pub mod errors;
pub mod images;
pub mod logging;
pub mod metadata;
pub mod scrape;
pub mod selection;
pub mod template;
pub mod vault;


pub use config::Config;
pub use editor::{Boundary, Clipboard, Editor, PendingEmbed, Position, StaticClipboard, TextBuffer};
pub use embed::{EmbedOptions, EmbedOutcome, EmbedState, Embedder};
pub use errors::{EmbedError, MaterializeError, ProviderError};
pub use logging::{LogContext, Notifier, StderrNotifier};
pub use metadata::{EmbedMetadata, ParserChain, ParserKind};
pub use selection::Selection;
pub use template::TemplateKind;
