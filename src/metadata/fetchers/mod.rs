pub mod iframely;
pub mod jsonlink;
pub mod local;
pub mod microlink;

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde_json::Value;

use crate::config::{Config, LocalConfig, ProvidersConfig};
use crate::errors::{EmbedError, ProviderError};
use crate::logging::LogContext;
use crate::metadata::types::EmbedMetadata;

/// Placeholder every request template carries for the target URL.
pub const URL_PLACEHOLDER: &str = "{{{url}}}";

/// The fixed set of metadata providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParserKind {
    JsonLink,
    MicroLink,
    Iframely,
    Local,
}

impl ParserKind {
    pub fn all() -> [ParserKind; 4] {
        [
            ParserKind::JsonLink,
            ParserKind::MicroLink,
            ParserKind::Iframely,
            ParserKind::Local,
        ]
    }

    /// Config name, as used in `primary`/`backup`.
    pub fn name(&self) -> &'static str {
        match self {
            ParserKind::JsonLink => "jsonlink",
            ParserKind::MicroLink => "microlink",
            ParserKind::Iframely => "iframely",
            ParserKind::Local => "local",
        }
    }

    /// Human-readable label for command titles.
    pub fn label(&self) -> &'static str {
        match self {
            ParserKind::JsonLink => "JSONLink",
            ParserKind::MicroLink => "MicroLink",
            ParserKind::Iframely => "Iframely",
            ParserKind::Local => "Local",
        }
    }
}

impl fmt::Display for ParserKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ParserKind {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParserKind::all()
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| EmbedError::UnknownParser(s.to_string()))
    }
}

/// A provider instance: one variant per [`ParserKind`], each owning its
/// request template and response mapping.
#[derive(Debug, Clone)]
pub enum Parser {
    JsonLink(jsonlink::JsonLinkParser),
    MicroLink(microlink::MicroLinkParser),
    Iframely(iframely::IframelyParser),
    Local(local::LocalParser),
}

impl Parser {
    pub fn kind(&self) -> ParserKind {
        match self {
            Parser::JsonLink(_) => ParserKind::JsonLink,
            Parser::MicroLink(_) => ParserKind::MicroLink,
            Parser::Iframely(_) => ParserKind::Iframely,
            Parser::Local(_) => ParserKind::Local,
        }
    }

    pub async fn fetch_and_normalize(
        &self,
        client: &reqwest::Client,
        url: &str,
        log: &LogContext,
    ) -> Result<EmbedMetadata, ProviderError> {
        log.info(&format!("Fetching {url} with {}", self.kind().label()));

        let fields = match self {
            Parser::JsonLink(p) => {
                let data = fetch_json(client, &request_url(&p.api, url)).await?;
                log.debug(&format!("raw data: {data}"));
                jsonlink::JsonLinkParser::process(&data)?
            }
            Parser::MicroLink(p) => {
                let data = fetch_json(client, &request_url(&p.api, url)).await?;
                log.debug(&format!("raw data: {data}"));
                microlink::MicroLinkParser::process(&data)?
            }
            Parser::Iframely(p) => {
                let data = fetch_json(client, &request_url(&p.api, url)).await?;
                log.debug(&format!("raw data: {data}"));
                iframely::IframelyParser::process(&data)?
            }
            Parser::Local(p) => p.parse(client, url, log).await?,
        };

        Ok(EmbedMetadata::new(
            &fields.title,
            &fields.image,
            &fields.description,
            url,
        ))
    }
}

/// Provider output before text normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawFields {
    pub title: String,
    pub image: String,
    pub description: String,
}

pub fn request_url(template: &str, url: &str) -> String {
    template.replace(URL_PLACEHOLDER, url)
}

pub fn build_client(config: &Config) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .pool_idle_timeout(Duration::from_secs(10))
        .build()
}

async fn fetch_json(client: &reqwest::Client, api_url: &str) -> Result<Value, ProviderError> {
    let resp = client.get(api_url).send().await?.error_for_status()?;
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| ProviderError::Normalize(format!("invalid json: {e}")))
}

/// First string found at any of the given key paths. Numeric segments index arrays.
pub(crate) fn string_at(value: &Value, paths: &[&[&str]]) -> Option<String> {
    paths.iter().find_map(|path| {
        let mut current = value;
        for key in *path {
            current = match key.parse::<usize>() {
                Ok(idx) => current.get(idx)?,
                Err(_) => current.get(key)?,
            };
        }
        current
            .as_str()
            .filter(|s| !s.is_empty())
            .map(str::to_owned)
    })
}

/// Ordered provider fallback over the registered parsers.
pub struct ParserChain {
    client: reqwest::Client,
    providers: ProvidersConfig,
    local: LocalConfig,
}

impl ParserChain {
    pub fn new(client: reqwest::Client, providers: ProvidersConfig, local: LocalConfig) -> Self {
        Self {
            client,
            providers,
            local,
        }
    }

    pub fn from_config(config: &Config) -> reqwest::Result<Self> {
        Ok(Self::new(
            build_client(config)?,
            config.providers.clone(),
            config.local.clone(),
        ))
    }

    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Maps a kind to its configured instance.
    pub fn create(&self, kind: ParserKind) -> Parser {
        match kind {
            ParserKind::JsonLink => Parser::JsonLink(jsonlink::JsonLinkParser::new(&self.providers.jsonlink)),
            ParserKind::MicroLink => Parser::MicroLink(microlink::MicroLinkParser::new(&self.providers.microlink)),
            ParserKind::Iframely => Parser::Iframely(iframely::IframelyParser::new(&self.providers.iframely)),
            ParserKind::Local => Parser::Local(local::LocalParser::new(self.local.clone())),
        }
    }

    /// Tries `parsers` in order and returns the first success. Failures are
    /// logged at debug level and reported together once the list runs out.
    pub async fn embed(
        &self,
        url: &str,
        parsers: &[ParserKind],
        log: &LogContext,
    ) -> Result<EmbedMetadata, EmbedError> {
        self.embed_with(url, parsers, log, |_, _| {}).await
    }

    /// [`ParserChain::embed`], calling `on_attempt` before each parser is tried.
    pub async fn embed_with<F>(
        &self,
        url: &str,
        parsers: &[ParserKind],
        log: &LogContext,
        mut on_attempt: F,
    ) -> Result<EmbedMetadata, EmbedError>
    where
        F: FnMut(usize, ParserKind),
    {
        let mut failures = Vec::new();

        for (idx, kind) in parsers.iter().enumerate() {
            on_attempt(idx, *kind);
            log.debug(&format!("parser={kind}"));
            let parser = self.create(*kind);
            match parser.fetch_and_normalize(&self.client, url, log).await {
                Ok(meta) => {
                    log.debug(&format!("parser={kind} outcome=success meta={meta:?}"));
                    return Ok(meta);
                }
                Err(err) => {
                    log.debug(&format!("parser={kind} outcome=error err={err}"));
                    failures.push((*kind, err));
                }
            }
        }

        Err(EmbedError::AllParsersExhausted { failures })
    }
}
