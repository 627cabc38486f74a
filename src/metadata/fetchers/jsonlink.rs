use serde_json::Value;

use crate::errors::ProviderError;
use crate::metadata::fetchers::{string_at, RawFields};

#[derive(Debug, Clone)]
pub struct JsonLinkParser {
    pub api: String,
}

impl JsonLinkParser {
    pub fn new(api: &str) -> Self {
        Self {
            api: api.to_string(),
        }
    }

    pub fn process(data: &Value) -> Result<RawFields, ProviderError> {
        if let Some(error) = data.get("error").and_then(|v| v.as_str()) {
            return Err(ProviderError::Normalize(format!("jsonlink error: {error}")));
        }
        if !data.get("images").is_some_and(Value::is_array) {
            return Err(ProviderError::Normalize("jsonlink: missing images".into()));
        }

        Ok(RawFields {
            title: string_at(data, &[&["title"]]).unwrap_or_default(),
            image: string_at(data, &[&["images", "0"]]).unwrap_or_default(),
            description: string_at(data, &[&["description"]]).unwrap_or_default(),
        })
    }
}
