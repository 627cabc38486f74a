use serde::{Deserialize, Serialize};

use crate::metadata::normalize::normalize_text;

/// Normalized link metadata, ready for template substitution.
///
/// `title` and `description` have newlines collapsed and quotes escaped;
/// `image` is a remote URL or a vault-relative reference.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct EmbedMetadata {
    pub title: String,
    pub image: String,
    pub description: String,
    pub url: String,
}

impl EmbedMetadata {
    pub fn new(title: &str, image: &str, description: &str, url: &str) -> Self {
        Self {
            title: normalize_text(title),
            image: image.trim().to_string(),
            description: normalize_text(description),
            url: url.to_string(),
        }
    }

    /// Same metadata pointing at another image reference.
    pub fn with_image(self, image: String) -> Self {
        Self { image, ..self }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_normalizes_text_fields_only() {
        let meta = EmbedMetadata::new(
            "Say \"hi\"\nthere",
            " https://x/img.png ",
            "line one\r\nline \\two",
            "https://example.com/?q=\"a\"",
        );

        assert_eq!(meta.title, "Say \\\"hi\\\" there");
        assert_eq!(meta.image, "https://x/img.png");
        assert_eq!(meta.description, "line one line \\\\two");
        assert_eq!(meta.url, "https://example.com/?q=\"a\"");
    }
}
