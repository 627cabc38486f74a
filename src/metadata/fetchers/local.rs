use url::Url;

use crate::config::LocalConfig;
use crate::errors::ProviderError;
use crate::logging::LogContext;
use crate::metadata::fetchers::RawFields;
use crate::scrape;

/// Scrapes the page itself instead of asking a metadata service.
#[derive(Debug, Clone)]
pub struct LocalParser {
    config: LocalConfig,
}

impl LocalParser {
    pub fn new(config: LocalConfig) -> Self {
        Self { config }
    }

    #[cfg(feature = "headless")]
    async fn html_by_browser(&self, url: &str, log: &LogContext) -> Option<String> {
        if !self.config.use_browser {
            return None;
        }
        let target = url.to_string();
        let chrome_path = self.config.chrome_path.clone();
        let rendered = tokio::task::spawn_blocking(move || {
            scrape::fetch_page_with_chrome(&target, chrome_path.as_deref())
        })
        .await;

        match rendered {
            Ok(Ok(html)) => Some(html),
            Ok(Err(err)) => {
                log.debug(&format!("failed to use browser: {err}"));
                None
            }
            Err(err) => {
                log.debug(&format!("browser task failed: {err}"));
                None
            }
        }
    }

    #[cfg(not(feature = "headless"))]
    async fn html_by_browser(&self, _url: &str, log: &LogContext) -> Option<String> {
        if self.config.use_browser {
            log.debug("built without headless support, using plain request");
        }
        None
    }

    async fn html_by_request(
        &self,
        client: &reqwest::Client,
        url: &str,
    ) -> Result<String, ProviderError> {
        let resp = client.get(url).send().await?.error_for_status()?;
        Ok(resp.text().await?)
    }

    pub async fn parse(
        &self,
        client: &reqwest::Client,
        url: &str,
        log: &LogContext,
    ) -> Result<RawFields, ProviderError> {
        let page_url =
            Url::parse(url).map_err(|e| ProviderError::Fetch(format!("invalid url {url}: {e}")))?;

        let html = match self.html_by_browser(url, log).await {
            Some(html) => html,
            None => self.html_by_request(client, url).await?,
        };

        let fields = scrape::get_data_from_page(&html, &page_url);
        log.debug(&format!("scraped {fields:?}"));
        Ok(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::tests::recording_context;
    use log::LevelFilter;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_parse_fetches_and_scrapes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/article"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head><title>Article</title>
                <meta property="og:image" content="/cover.jpg"></head><body></body></html>"#,
            ))
            .mount(&server)
            .await;

        let (log, _) = recording_context(LevelFilter::Off);
        let url = format!("{}/article", server.uri());
        let fields = LocalParser::new(LocalConfig::default())
            .parse(&reqwest::Client::new(), &url, &log)
            .await
            .unwrap();

        assert_eq!(fields.title, "Article");
        assert_eq!(fields.image, format!("{}/cover.jpg", server.uri()));
    }

    #[tokio::test]
    async fn test_parse_http_error_is_fetch_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let (log, _) = recording_context(LevelFilter::Off);
        let err = LocalParser::new(LocalConfig::default())
            .parse(&reqwest::Client::new(), &server.uri(), &log)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_parse_rejects_invalid_url() {
        let (log, _) = recording_context(LevelFilter::Off);
        let err = LocalParser::new(LocalConfig::default())
            .parse(&reqwest::Client::new(), "not a url", &log)
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Fetch(_)));
    }
}
