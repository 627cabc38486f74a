use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use clap::Parser;
use homedir::my_home;
use tracing_subscriber::EnvFilter;

use linkembed::editor::{Editor, Position, StaticClipboard, TextBuffer};
use linkembed::logging::{LogContext, StderrNotifier};
use linkembed::template;
use linkembed::vault::{write_atomic, FsVault};
use linkembed::{Config, Embedder, ParserChain, ParserKind};

mod cli;

const LOG_NAME: &str = "EmbedLinks";

fn base_path(arg: Option<PathBuf>) -> anyhow::Result<PathBuf> {
    if let Some(path) = arg {
        return Ok(path);
    }
    if let Ok(path) = std::env::var("LINKEMBED_BASE_PATH") {
        return Ok(PathBuf::from(path));
    }
    let home = my_home()
        .map_err(|e| anyhow!("could not determine home directory: {e:?}"))?
        .context("home directory path is empty")?;
    Ok(home.join(".local/share/linkembed"))
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("linkembed={}", config.log_level)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    #[cfg(feature = "markdown-docs")]
    if let cli::Command::MarkdownDocs {} = args.command {
        clap_markdown::print_help_markdown::<cli::Args>();
        return Ok(());
    }

    if let cli::Command::Parsers {} = args.command {
        for kind in ParserKind::all() {
            println!("{}\t{}", kind.name(), kind.label());
        }
        return Ok(());
    }

    let vault = FsVault::new(base_path(args.vault)?)?;
    let config = Config::load_with(&vault)?;
    init_tracing(&config);

    let log = LogContext::new(LOG_NAME, config.level_filter()?, Box::new(StderrNotifier));
    log::debug!("vault at {}", vault.base_dir.display());

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let span = tracing::info_span!("linkembed", vault = %vault.base_dir.display());
    let result = span.in_scope(|| runtime.block_on(run(args.command, &config, &vault, &log)));

    log.retire();
    result
}

async fn run(command: cli::Command, config: &Config, vault: &FsVault, log: &LogContext) -> anyhow::Result<()> {
    match command {
        cli::Command::Embed {
            file,
            line,
            ch,
            url,
            parser,
        } => embed(&file, line, ch, url, parser, config, vault, log).await,

        cli::Command::Meta { url, parsers } => {
            let kinds = if parsers.is_empty() {
                config.default_chain()?
            } else {
                parsers
                    .iter()
                    .map(|name| name.parse::<ParserKind>())
                    .collect::<Result<Vec<_>, _>>()?
            };
            let chain = ParserChain::from_config(config)?;
            let meta = chain.embed(&url, &kinds, log).await?;
            println!("{}", serde_json::to_string_pretty(&meta)?);
            Ok(())
        }

        cli::Command::Render { file } => {
            let note = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            for block in template::find_blocks(&note) {
                match template::render_block_html(&block, vault, &config.attachments_dir) {
                    Ok(html) => println!("{html}\n"),
                    Err(err) => log.warn("render", err),
                }
            }
            Ok(())
        }

        cli::Command::Parsers {} => Ok(()),

        #[cfg(feature = "markdown-docs")]
        cli::Command::MarkdownDocs {} => Ok(()),
    }
}

#[allow(clippy::too_many_arguments)]
async fn embed(
    file: &Path,
    line: Option<usize>,
    ch: Option<usize>,
    url: Option<String>,
    parser: Option<String>,
    config: &Config,
    vault: &FsVault,
    log: &LogContext,
) -> anyhow::Result<()> {
    let original = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let buf = TextBuffer::new(original.as_str());

    let line = line.unwrap_or_else(|| buf.line_count().saturating_sub(1));
    let ch = ch.unwrap_or_else(|| buf.line(line).map(|l| l.len()).unwrap_or(0));
    buf.set_cursor(Position::new(line, ch));

    let clipboard = StaticClipboard(url);
    let embedder = Embedder::from_config(config, vault)?;

    let result = match parser {
        Some(name) => {
            let kind = name.parse::<ParserKind>()?;
            embedder.embed_link_with(&buf, &clipboard, kind, log).await
        }
        None => embedder.embed_link(&buf, &clipboard, log).await,
    };

    // a failed fetch leaves its placeholder behind, keep it like the editor would
    let text = buf.text();
    if text != original {
        write_atomic(file, text.as_bytes()).with_context(|| format!("failed to write {}", file.display()))?;
    }

    let outcome = result?;
    log.info(&format!("embedded {} into {}", outcome.metadata.url, file.display()));
    Ok(())
}
