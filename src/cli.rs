use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Vault directory holding config.yaml and the attachments folder.
    /// Defaults to $LINKEMBED_BASE_PATH, then ~/.local/share/linkembed
    #[clap(long, global = true)]
    pub vault: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate api docs in markdown format
    #[cfg(feature = "markdown-docs")]
    #[clap(hide = true)]
    MarkdownDocs {},

    /// Embed a link into a markdown note.
    ///
    /// The link under the cursor is used, or --url when there is none.
    Embed {
        /// Note to edit in place
        file: PathBuf,

        /// Cursor line, zero-based. Defaults to the last line
        #[clap(long)]
        line: Option<usize>,

        /// Cursor byte offset in the line. Defaults to the end of the line
        #[clap(long)]
        ch: Option<usize>,

        /// Link to embed when the cursor is not on one
        #[clap(long)]
        url: Option<String>,

        /// Use only this parser instead of primary and backup
        #[clap(long)]
        parser: Option<String>,
    },
    /// Fetch and print normalized metadata for a url
    Meta {
        /// A url
        #[clap(allow_hyphen_values = true)]
        url: String,

        /// Parsers to try in order. Defaults to primary and backup
        #[clap(long = "parser")]
        parsers: Vec<String>,
    },
    /// Print the HTML card of every embed block in a note
    Render {
        file: PathBuf,
    },
    /// List available parsers
    Parsers {},
}
