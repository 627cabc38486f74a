//! Embed markup.
//!
//! `{{{name}}}` placeholders are substituted verbatim, `{{name}}` ones are
//! HTML-escaped first.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use url::Url;

use crate::images::{is_remote, LOCAL_SCHEME};
use crate::metadata::normalize::{escape_quoted, unescape_text};
use crate::metadata::EmbedMetadata;
use crate::vault::VaultPaths;

/// Language tag of fenced embed blocks.
pub const BLOCK_TAG: &str = "embed";

pub const FENCED_TEMPLATE: &str = r#"```embed
title: "{{{title}}}"
image: "{{{image}}}"
description: "{{{description}}}"
url: "{{{url}}}"
```"#;

pub const HTML_TEMPLATE: &str = r#"<div class="rich-link-card-container"><a class="rich-link-card" href="{{{url}}}" target="_blank">
	<div class="rich-link-image-container">
		<div class="rich-link-image" style="background-image: url('{{{image}}}')">
	</div>
	</div>
	<div class="rich-link-card-text">
		<h1 class="rich-link-card-title">{{title}}</h1>
		<p class="rich-link-card-description">
		{{description}}
		</p>
		<p class="rich-link-href">
		{{{url}}}
		</p>
	</div>
</a></div>"#;

const SPINNER_SVG: &str = r##"<svg xmlns="http://www.w3.org/2000/svg" width="48" height="48" viewBox="0 0 50 50"><circle cx="25" cy="25" r="20" fill="none" stroke="#888" stroke-width="5" stroke-linecap="round" stroke-dasharray="90 60"><animateTransform attributeName="transform" type="rotate" from="0 25 25" to="360 25 25" dur="1s" repeatCount="indefinite"/></circle></svg>"##;

/// Loading spinner used as the placeholder image.
pub static SPINNER: Lazy<String> =
    Lazy::new(|| format!("data:image/svg+xml;base64,{}", STANDARD.encode(SPINNER_SVG)));

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// ```` ```embed ```` code block with a key/value body
    #[default]
    Fenced,
    /// Legacy inline rich-link card
    Html,
}

fn html_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn substitute(template: &str, fields: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in fields {
        out = out.replace(&format!("{{{{{{{name}}}}}}}"), value);
        out = out.replace(&format!("{{{{{name}}}}}"), &html_escape(value));
    }
    out
}

pub fn render(kind: TemplateKind, meta: &EmbedMetadata) -> String {
    match kind {
        // title and description arrive escaped, url and image are raw
        TemplateKind::Fenced => substitute(
            FENCED_TEMPLATE,
            &[
                ("title", &meta.title),
                ("image", &escape_quoted(&meta.image)),
                ("description", &meta.description),
                ("url", &escape_quoted(&meta.url)),
            ],
        ),
        TemplateKind::Html => {
            // quotes were escaped for the key/value form, HTML has its own escaping
            let title = unescape_text(&meta.title);
            let description = unescape_text(&meta.description);
            substitute(
                HTML_TEMPLATE,
                &[
                    ("title", &title),
                    ("image", &meta.image),
                    ("description", &description),
                    ("url", &meta.url),
                ],
            )
        }
    }
}

/// Metadata shown while the real data is being fetched.
pub fn placeholder(url: &str) -> EmbedMetadata {
    EmbedMetadata::new("Fetching", SPINNER.as_str(), &format!("Fetching {url}"), url)
}

#[derive(Debug, Default, Deserialize)]
struct BlockBody {
    #[serde(default)]
    title: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

/// Reads the keys back out of a fenced block, with or without its fences.
pub fn parse_block(source: &str) -> Result<EmbedMetadata, serde_yml::Error> {
    let body = source
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");
    let parsed: BlockBody = serde_yml::from_str(body.trim())?;
    Ok(EmbedMetadata::new(
        &parsed.title,
        &parsed.image,
        &parsed.description,
        &parsed.url,
    ))
}

/// Bodies of every fenced embed block in a note.
pub fn find_blocks(note: &str) -> Vec<String> {
    let opening = format!("```{BLOCK_TAG}");
    let mut blocks = Vec::new();
    let mut current: Option<Vec<&str>> = None;

    for line in note.lines() {
        match current.as_mut() {
            None if line.trim() == opening => current = Some(Vec::new()),
            None => {}
            Some(_) if line.trim() == "```" => {
                if let Some(body) = current.take() {
                    blocks.push(body.join("\n"));
                }
            }
            Some(body) => body.push(line),
        }
    }

    blocks
}

/// Absolute `file://` URL for an image stored in the vault, `None` for
/// images living elsewhere.
///
/// - `file:///attachments/x.png` is vault-relative
/// - `http(s)://host/attachments/x.png` points at a stored file when its
///   path is under the attachments directory, `http(s)://host/x.png` when
///   `attachments/x.png` exists
/// - `attachments/x.png` or a bare `x.png` is relative to the vault or the
///   attachments directory
pub fn resolve_image(image: &str, vault: &dyn VaultPaths, attachments_dir: &str) -> Option<String> {
    let attachments = attachments_dir.trim_matches('/');
    let under_attachments = |path: &str| {
        let path = path.trim_start_matches('/');
        if path.starts_with(&format!("{attachments}/")) {
            path.to_string()
        } else {
            format!("{attachments}/{path}")
        }
    };

    let relative = if let Some(rest) = image.strip_prefix(LOCAL_SCHEME) {
        rest.to_string()
    } else if is_remote(image) {
        let url = Url::parse(image).ok()?;
        let path = url.path().trim_start_matches('/');
        if path.is_empty() {
            return None;
        }
        let candidate = under_attachments(path);
        let inside = path.starts_with(&format!("{attachments}/"));
        if !inside && !vault.resolve(&candidate).exists() {
            return None;
        }
        candidate
    } else if image.is_empty() || image.contains(':') {
        // data URIs and other schemes
        return None;
    } else {
        under_attachments(image)
    };

    Some(format!("file://{}", vault.resolve(&relative).display()))
}

/// Rendered HTML card for a fenced block, with stored images resolved to
/// absolute paths so the card can display them.
pub fn render_block_html(
    source: &str,
    vault: &dyn VaultPaths,
    attachments_dir: &str,
) -> Result<String, serde_yml::Error> {
    let mut meta = parse_block(source)?;
    if let Some(resolved) = resolve_image(&meta.image, vault, attachments_dir) {
        meta.image = resolved;
    }
    Ok(render(TemplateKind::Html, &meta))
}
