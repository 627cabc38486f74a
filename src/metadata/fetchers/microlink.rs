use serde_json::Value;

use crate::errors::ProviderError;
use crate::metadata::fetchers::{string_at, RawFields};

#[derive(Debug, Clone)]
pub struct MicroLinkParser {
    pub api: String,
}

impl MicroLinkParser {
    pub fn new(api: &str) -> Self {
        Self {
            api: api.to_string(),
        }
    }

    pub fn process(resp: &Value) -> Result<RawFields, ProviderError> {
        let status = resp.get("status").and_then(|v| v.as_str()).unwrap_or("unknown");
        if status != "success" {
            let message = resp.get("message").and_then(|v| v.as_str()).unwrap_or("unknown");
            return Err(ProviderError::Normalize(format!(
                "microlink error: status={status} message={message}"
            )));
        }
        let data = resp
            .get("data")
            .filter(|d| d.is_object())
            .ok_or_else(|| ProviderError::Normalize("microlink: missing data".into()))?;

        Ok(RawFields {
            title: string_at(data, &[&["title"]]).unwrap_or_default(),
            image: string_at(data, &[&["image", "url"], &["logo", "url"]]).unwrap_or_default(),
            description: string_at(data, &[&["description"]]).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_process_full_response() {
        let resp = json!({
            "status": "success",
            "data": {
                "title": "Example Domain",
                "description": "Example description",
                "url": "https://example.com/",
                "image": {"url": "https://example.com/og.png", "type": "png"},
                "logo": {"url": "https://example.com/logo.png"}
            }
        });

        assert_eq!(
            MicroLinkParser::process(&resp).unwrap(),
            RawFields {
                title: "Example Domain".into(),
                image: "https://example.com/og.png".into(),
                description: "Example description".into(),
            }
        );
    }

    #[test]
    fn test_process_falls_back_to_logo() {
        let resp = json!({
            "status": "success",
            "data": {
                "title": "Logo only",
                "image": null,
                "logo": {"url": "https://example.com/logo.png"}
            }
        });

        let fields = MicroLinkParser::process(&resp).unwrap();
        assert_eq!(fields.image, "https://example.com/logo.png");
        assert_eq!(fields.description, "");
    }

    #[test]
    fn test_process_fail_status() {
        let resp = json!({
            "status": "fail",
            "message": "The URL is not reachable",
            "data": {"url": "The URL is not reachable"}
        });

        match MicroLinkParser::process(&resp) {
            Err(ProviderError::Normalize(msg)) => {
                assert!(msg.contains("status=fail"));
                assert!(msg.contains("not reachable"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_process_missing_data() {
        let resp = json!({"status": "success"});
        assert!(MicroLinkParser::process(&resp).is_err());
    }
}
