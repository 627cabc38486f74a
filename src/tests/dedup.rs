use log::LevelFilter;
use pretty_assertions::assert_eq;
use wiremock::MockServer;

use super::*;
use crate::editor::{Position, StaticClipboard, TextBuffer};
use crate::images::content_hash;
use crate::logging::tests::recording_context;
use crate::metadata::ParserKind;

#[tokio::test]
async fn test_identical_images_share_one_file() {
    let server = MockServer::start().await;
    let first_page = "https://one.example.com";
    let second_page = "https://two.example.com";
    mount_jsonlink(
        &server,
        first_page,
        jsonlink_body("One", &format!("{}/one.png", server.uri()), ""),
    )
    .await;
    mount_jsonlink(
        &server,
        second_page,
        jsonlink_body("Two", &format!("{}/other/two.png", server.uri()), ""),
    )
    .await;
    mount_png(&server, "/one.png").await;
    mount_png(&server, "/other/two.png").await;

    let tmp = tempfile::tempdir().unwrap();
    let (log, _) = recording_context(LevelFilter::Warn);
    let options = EmbedOptions {
        parsers: vec![ParserKind::JsonLink],
        ..Default::default()
    };
    let embedder = embedder_for(&server, tmp.path(), options);

    let first = TextBuffer::new(first_page).with_cursor(Position::new(0, 2));
    let second = TextBuffer::new(second_page).with_cursor(Position::new(0, 2));
    let clipboard = StaticClipboard::default();

    let (a, b) = tokio::join!(
        embedder.embed_link(&first, &clipboard, &log),
        embedder.embed_link(&second, &clipboard, &log),
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    let stored = format!("{}.png", content_hash(PNG));
    let reference = format!("file:///attachments/{stored}");
    assert_eq!(a.metadata.image, reference);
    assert_eq!(b.metadata.image, reference);
    assert!(first.text().contains(&reference));
    assert!(second.text().contains(&reference));
    assert_eq!(attachments(tmp.path()), vec![stored]);
}

#[tokio::test]
async fn test_repeat_embed_reuses_stored_file() {
    let server = MockServer::start().await;
    mount_jsonlink(
        &server,
        PAGE,
        jsonlink_body("Example", &format!("{}/img.png", server.uri()), ""),
    )
    .await;
    mount_png(&server, "/img.png").await;

    let tmp = tempfile::tempdir().unwrap();
    let (log, _) = recording_context(LevelFilter::Warn);
    let options = EmbedOptions {
        parsers: vec![ParserKind::JsonLink],
        ..Default::default()
    };
    let embedder = embedder_for(&server, tmp.path(), options);

    let buf = TextBuffer::new("");
    let clipboard = StaticClipboard::new(PAGE);
    embedder.embed_link(&buf, &clipboard, &log).await.unwrap();
    let stored = attachments(tmp.path());
    let modified = std::fs::metadata(tmp.path().join("attachments").join(&stored[0]))
        .unwrap()
        .modified()
        .unwrap();

    let buf = TextBuffer::new("");
    embedder.embed_link(&buf, &clipboard, &log).await.unwrap();

    assert_eq!(attachments(tmp.path()), stored);
    let again = std::fs::metadata(tmp.path().join("attachments").join(&stored[0]))
        .unwrap()
        .modified()
        .unwrap();
    assert_eq!(modified, again);
}
