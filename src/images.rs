//! Content-addressed storage for preview images.
//!
//! Downloaded bytes land in a temp file inside the attachments directory,
//! are hashed with SHA-256 and moved to `<hash>.<ext>`. Identical bytes always
//! end up at the same path, so a second download of the same image is
//! discarded instead of rewritten.

use std::io::Write;
use std::path::{Path, PathBuf};

use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::errors::MaterializeError;
use crate::logging::LogContext;

/// Scheme used for image references written into embed blocks.
pub const LOCAL_SCHEME: &str = "file:///";

/// True for references that need downloading.
pub fn is_remote(image: &str) -> bool {
    image.starts_with("http://") || image.starts_with("https://")
}

/// Extension for an `image/*` content type, parameters ignored.
pub fn extension_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type.split(';').next()?.trim().to_lowercase();
    let (kind, subtype) = mime.split_once('/')?;
    if kind != "image" || subtype.is_empty() {
        return None;
    }
    let ext = match subtype {
        "jpeg" | "pjpeg" => "jpg",
        "svg+xml" => "svg",
        "x-icon" | "vnd.microsoft.icon" => "ico",
        other => other,
    };
    Some(ext.to_string())
}

/// Declared content type first, then magic bytes, then `fallback`.
pub fn detect_extension(content_type: Option<&str>, bytes: &[u8], fallback: &str) -> String {
    content_type
        .and_then(extension_from_content_type)
        .or_else(|| {
            infer::get(bytes)
                .filter(|t| t.matcher_type() == infer::MatcherType::Image)
                .map(|t| t.extension().to_string())
        })
        .unwrap_or_else(|| fallback.to_string())
}

pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// A downloaded image waiting to be moved into place.
#[derive(Debug)]
pub struct DownloadedAsset {
    temp: NamedTempFile,
    pub content_hash: String,
    pub extension: String,
    pub final_path: PathBuf,
}

impl DownloadedAsset {
    /// Writes `bytes` to a temp file in `dir` and works out the final path.
    pub fn stage(dir: &Path, bytes: &[u8], extension: String) -> Result<Self, MaterializeError> {
        std::fs::create_dir_all(dir)?;
        let mut temp = tempfile::Builder::new()
            .prefix(".temp_image-")
            .tempfile_in(dir)?;
        temp.write_all(bytes)?;
        temp.flush()?;

        let content_hash = content_hash(&std::fs::read(temp.path())?);
        let final_path = dir.join(format!("{content_hash}.{extension}"));

        Ok(Self {
            temp,
            content_hash,
            extension,
            final_path,
        })
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.content_hash, self.extension)
    }

    /// Moves the temp file to `final_path`, or drops it when that path is
    /// already taken. Returns true when a new file was written.
    pub fn commit(self) -> Result<bool, MaterializeError> {
        if self.final_path.exists() {
            return Ok(false);
        }
        match self.temp.persist_noclobber(&self.final_path) {
            Ok(_) => Ok(true),
            // another embed stored the same bytes in the meantime
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(MaterializeError::Persist(format!(
                "{}: {}",
                self.final_path.display(),
                e.error
            ))),
        }
    }
}

pub struct ImageMaterializer {
    client: reqwest::Client,
    attachments_dir: PathBuf,
    /// Vault-relative name of `attachments_dir`, used in references
    attachments_name: String,
    fallback_extension: String,
}

impl ImageMaterializer {
    pub fn new(
        client: reqwest::Client,
        attachments_dir: PathBuf,
        attachments_name: &str,
        fallback_extension: &str,
    ) -> Self {
        Self {
            client,
            attachments_dir,
            attachments_name: attachments_name.trim_matches('/').to_string(),
            fallback_extension: fallback_extension.to_string(),
        }
    }

    /// Reference written into embed blocks for a stored file.
    pub fn reference(&self, file_name: &str) -> String {
        format!("{LOCAL_SCHEME}{}/{file_name}", self.attachments_name)
    }

    async fn download(&self, url: &str, log: &LogContext) -> Result<DownloadedAsset, MaterializeError> {
        log.debug(&format!("downloading image from {url}"));
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let bytes = resp.bytes().await?;

        let extension = detect_extension(content_type.as_deref(), &bytes, &self.fallback_extension);
        log.debug(&format!(
            "image downloaded, {} bytes, content type {content_type:?}, extension {extension}",
            bytes.len()
        ));

        DownloadedAsset::stage(&self.attachments_dir, &bytes, extension)
    }

    /// Stores a remote image and returns its local reference. Local
    /// references and empty strings come back unchanged.
    pub async fn materialize(&self, image: &str, log: &LogContext) -> Result<String, MaterializeError> {
        if !is_remote(image) {
            log.debug(&format!("image {image:?} is already local"));
            return Ok(image.to_string());
        }

        let asset = self.download(image, log).await?;
        let file_name = asset.file_name();
        let final_path = asset.final_path.clone();
        if asset.commit()? {
            log.debug(&format!("image saved to {}", final_path.display()));
        } else {
            log.debug(&format!("image already stored at {}", final_path.display()));
        }

        Ok(self.reference(&file_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::tests::recording_context;
    use log::LevelFilter;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_extension_from_content_type() {
        assert_eq!(extension_from_content_type("image/png").as_deref(), Some("png"));
        assert_eq!(extension_from_content_type("image/jpeg; charset=binary").as_deref(), Some("jpg"));
        assert_eq!(extension_from_content_type("image/svg+xml").as_deref(), Some("svg"));
        assert_eq!(extension_from_content_type("IMAGE/WEBP").as_deref(), Some("webp"));
        assert_eq!(extension_from_content_type("text/html"), None);
        assert_eq!(extension_from_content_type("garbage"), None);
    }

    #[test]
    fn test_detect_extension_order() {
        assert_eq!(detect_extension(Some("image/gif"), PNG_MAGIC, "jpg"), "gif");
        assert_eq!(detect_extension(None, PNG_MAGIC, "jpg"), "png");
        assert_eq!(detect_extension(Some("application/octet-stream"), b"??", "jpg"), "jpg");
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_commit_dedups_identical_content() {
        let tmp = tempfile::tempdir().unwrap();

        let first = DownloadedAsset::stage(tmp.path(), b"same bytes", "png".into()).unwrap();
        let second = DownloadedAsset::stage(tmp.path(), b"same bytes", "png".into()).unwrap();
        assert_eq!(first.final_path, second.final_path);

        assert!(first.commit().unwrap());
        assert!(!second.commit().unwrap());
        // the listing includes hidden files, so no temp file is left behind
        assert_eq!(files_in(tmp.path()), vec![format!("{}.png", content_hash(b"same bytes"))]);
    }

    #[tokio::test]
    async fn test_materialize_downloads_and_names_by_hash() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.png"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_MAGIC.to_vec(), "image/png"))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (log, _) = recording_context(LevelFilter::Off);
        let materializer =
            ImageMaterializer::new(reqwest::Client::new(), tmp.path().to_path_buf(), "attachments", "jpg");

        let reference = materializer
            .materialize(&format!("{}/a.png", server.uri()), &log)
            .await
            .unwrap();

        let name = format!("{}.png", content_hash(PNG_MAGIC));
        assert_eq!(reference, format!("file:///attachments/{name}"));
        assert_eq!(files_in(tmp.path()), vec![name]);
    }

    #[tokio::test]
    async fn test_materialize_keeps_local_references() {
        let tmp = tempfile::tempdir().unwrap();
        let (log, _) = recording_context(LevelFilter::Off);
        let materializer =
            ImageMaterializer::new(reqwest::Client::new(), tmp.path().to_path_buf(), "attachments", "jpg");

        for image in ["attachments/x.png", "file:///attachments/y.png", ""] {
            assert_eq!(materializer.materialize(image, &log).await.unwrap(), image);
        }
        assert!(files_in(tmp.path()).is_empty());
    }

    #[tokio::test]
    async fn test_materialize_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let tmp = tempfile::tempdir().unwrap();
        let (log, _) = recording_context(LevelFilter::Off);
        let materializer =
            ImageMaterializer::new(reqwest::Client::new(), tmp.path().to_path_buf(), "attachments", "jpg");

        let err = materializer
            .materialize(&format!("{}/missing.png", server.uri()), &log)
            .await
            .unwrap_err();
        assert!(matches!(err, MaterializeError::Fetch(_)));
        assert!(files_in(tmp.path()).is_empty());
    }
}
