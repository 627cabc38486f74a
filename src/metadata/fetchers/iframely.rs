use serde_json::Value;

use crate::errors::ProviderError;
use crate::metadata::fetchers::{string_at, RawFields};

#[derive(Debug, Clone)]
pub struct IframelyParser {
    pub api: String,
}

impl IframelyParser {
    pub fn new(api: &str) -> Self {
        Self {
            api: api.to_string(),
        }
    }

    pub fn process(resp: &Value) -> Result<RawFields, ProviderError> {
        if let Some(error) = resp.get("error").and_then(|v| v.as_str()) {
            let status = resp.get("status").and_then(|v| v.as_i64()).unwrap_or(0);
            return Err(ProviderError::Normalize(format!(
                "iframely error: status={status} error={error}"
            )));
        }
        if resp.get("meta").is_none() && resp.get("links").is_none() {
            return Err(ProviderError::Normalize("iframely: missing meta and links".into()));
        }

        // Self-hosted servers answer with a flat `links` array, the hosted API
        // groups links by rel.
        let image = string_at(
            resp,
            &[
                &["links", "0", "href"],
                &["links", "thumbnail", "0", "href"],
                &["links", "image", "0", "href"],
            ],
        )
        .unwrap_or_default();

        Ok(RawFields {
            title: string_at(resp, &[&["meta", "title"]]).unwrap_or_default(),
            image,
            description: string_at(resp, &[&["meta", "description"]]).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_process_links_array() {
        let resp = json!({
            "meta": {
                "title": "Example Page",
                "description": "A description of the page",
                "site": "Example"
            },
            "links": [
                {"href": "https://example.com/thumb.jpg", "rel": ["thumbnail"]},
                {"href": "https://example.com/favicon.ico", "rel": ["icon"]}
            ]
        });

        assert_eq!(
            IframelyParser::process(&resp).unwrap(),
            RawFields {
                title: "Example Page".into(),
                image: "https://example.com/thumb.jpg".into(),
                description: "A description of the page".into(),
            }
        );
    }

    #[test]
    fn test_process_grouped_links() {
        let resp = json!({
            "url": "https://example.com/page",
            "meta": {"title": "Grouped"},
            "links": {
                "thumbnail": [{"href": "https://example.com/t.jpg"}],
                "icon": [{"href": "https://example.com/favicon.ico"}]
            }
        });

        let fields = IframelyParser::process(&resp).unwrap();
        assert_eq!(fields.title, "Grouped");
        assert_eq!(fields.image, "https://example.com/t.jpg");
    }

    #[test]
    fn test_process_error_payload() {
        let resp = json!({"error": "Not found", "status": 404});
        match IframelyParser::process(&resp) {
            Err(ProviderError::Normalize(msg)) => assert!(msg.contains("status=404")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_process_no_meta_no_links() {
        let resp = json!({"url": "https://example.com/page"});
        assert!(IframelyParser::process(&resp).is_err());
    }
}
