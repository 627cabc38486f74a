//! Raw page retrieval and DOM extraction for the local parser.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::metadata::fetchers::RawFields;

fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("Failed to compile CSS selector")
}

static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"head meta[property="og:title"]"#));
static TITLE: Lazy<Selector> = Lazy::new(|| selector("head title"));
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"head meta[property="og:image"]"#));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"head meta[property="og:description"]"#));
static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| selector(r#"head meta[name="description"]"#));

/// Content containers searched for a preview image when there is no og:image,
/// most specific first.
static IMAGE_SELECTORS: Lazy<Vec<Selector>> = Lazy::new(|| {
    [
        r#"div[itemtype$="://schema.org/Product"] noscript img"#,
        r#"div[itemtype$="://schema.org/Product"] img"#,
        "#main noscript img",
        "#main img",
        "main noscript img",
        "main img",
        r#"*[role="main"] img"#,
        "body noscript img",
        "body img",
    ]
    .into_iter()
    .map(selector)
    .collect()
});

static DISPLAY_NONE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"display:\s*none").expect("Failed to compile display regex"));

fn meta_content(document: &Html, sel: &Selector) -> Option<String> {
    document
        .select(sel)
        .filter_map(|el| el.value().attr("content"))
        .map(str::trim)
        .find(|content| !content.is_empty())
        .map(str::to_owned)
}

fn get_title(document: &Html, url: &Url) -> String {
    meta_content(document, &OG_TITLE)
        .or_else(|| {
            document
                .select(&TITLE)
                .map(|el| el.text().collect::<String>().trim().to_string())
                .find(|title| !title.is_empty())
        })
        .unwrap_or_else(|| url.host_str().unwrap_or_default().to_string())
}

/// False for images hidden inline or living inside a header.
fn meets_criteria(element: ElementRef) -> bool {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .all(|el| {
            let value = el.value();
            if DISPLAY_NONE.is_match(value.attr("style").unwrap_or_default()) {
                return false;
            }
            let in_header = value
                .id()
                .map(|id| id.to_lowercase().contains("header"))
                .unwrap_or(false)
                || value.classes().any(|c| c.to_lowercase().contains("header"));
            !in_header
        })
}

fn absolutize(url: &Url, src: &str) -> Option<String> {
    url.join(src).ok().map(|u| u.to_string())
}

fn get_image(document: &Html, url: &Url) -> String {
    if let Some(og) = meta_content(document, &OG_IMAGE) {
        return absolutize(url, &og).unwrap_or(og);
    }

    for sel in IMAGE_SELECTORS.iter() {
        for element in document.select(sel) {
            if !meets_criteria(element) {
                continue;
            }
            match element.value().attr("src").map(str::trim) {
                Some(src) if !src.is_empty() => {
                    if let Some(abs) = absolutize(url, src) {
                        return abs;
                    }
                }
                _ => {}
            }
        }
    }

    String::new()
}

fn get_description(document: &Html) -> String {
    meta_content(document, &OG_DESCRIPTION)
        .or_else(|| meta_content(document, &META_DESCRIPTION))
        .unwrap_or_default()
}

/// Extracts title, preview image and description from a page.
pub fn get_data_from_page(html: &str, url: &Url) -> RawFields {
    let document = Html::parse_document(html);
    RawFields {
        title: get_title(&document, url),
        image: get_image(&document, url),
        description: get_description(&document),
    }
}

/// Renders a page in headless Chromium and returns its HTML. Blocking.
#[cfg(feature = "headless")]
pub fn fetch_page_with_chrome(url: &str, chrome_path: Option<&str>) -> anyhow::Result<String> {
    use headless_chrome::{Browser, LaunchOptionsBuilder};
    use std::path::PathBuf;
    use std::time::Duration;

    let options = LaunchOptionsBuilder::default()
        .path(chrome_path.map(PathBuf::from))
        .window_size(Some((1366, 768)))
        .build()
        .map_err(|e| anyhow::anyhow!("invalid chrome launch options: {e}"))?;

    let browser = Browser::new(options)?;
    let tab = browser.new_tab()?;
    tab.set_default_timeout(Duration::from_secs(10));
    tab.navigate_to(url)?;
    tab.wait_until_navigated()?;

    let html = tab.get_content()?;
    let _ = tab.close(true);
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn page_url() -> Url {
        Url::parse("https://shop.example.com/items/42").unwrap()
    }

    #[test]
    fn test_open_graph_tags_win() {
        let html = r#"<html><head>
            <title>Plain title</title>
            <meta property="og:title" content="OG Title">
            <meta property="og:image" content="/img/cover.png">
            <meta name="description" content="plain description">
            <meta property="og:description" content="OG description">
        </head><body><img src="/body.png"></body></html>"#;

        assert_eq!(
            get_data_from_page(html, &page_url()),
            RawFields {
                title: "OG Title".into(),
                image: "https://shop.example.com/img/cover.png".into(),
                description: "OG description".into(),
            }
        );
    }

    #[test]
    fn test_fallbacks_without_open_graph() {
        let html = r#"<html><head>
            <title> Plain title </title>
            <meta name="description" content="plain description">
        </head><body>
            <div id="page-header"><img src="/logo.png"></div>
            <main>
                <img style="display: none" src="/hidden.png">
                <img src="pictures/product.jpg">
            </main>
        </body></html>"#;

        assert_eq!(
            get_data_from_page(html, &page_url()),
            RawFields {
                title: "Plain title".into(),
                image: "https://shop.example.com/items/pictures/product.jpg".into(),
                description: "plain description".into(),
            }
        );
    }

    #[test]
    fn test_empty_og_title_falls_through() {
        let html = r#"<html><head>
            <meta property="og:title" content="  ">
            <title>Real title</title>
        </head><body></body></html>"#;

        assert_eq!(get_data_from_page(html, &page_url()).title, "Real title");
    }

    #[test]
    fn test_hostname_when_nothing_else() {
        let html = "<html><head></head><body><p>hi</p></body></html>";
        let fields = get_data_from_page(html, &page_url());
        assert_eq!(fields.title, "shop.example.com");
        assert_eq!(fields.image, "");
        assert_eq!(fields.description, "");
    }

    #[test]
    fn test_header_class_on_ancestor_hides_image() {
        let html = r#"<html><head></head><body>
            <section class="Site-Header"><div><img src="/a.png"></div></section>
            <article><img src="/b.png"></article>
        </body></html>"#;

        assert_eq!(
            get_data_from_page(html, &page_url()).image,
            "https://shop.example.com/b.png"
        );
    }
}
