pub mod fetchers;
pub mod normalize;
pub mod types;

pub use fetchers::{Parser, ParserChain, ParserKind};
pub use types::EmbedMetadata;
