use minutes_core::manifest::{ManifestEvent, ManifestWriter};
use minutes_core::resume;
use minutes_core::seeds::SeedMode;
use minutes_core::store::{save_bytes, sha1_hex, OutputLayout};
use tempfile::tempdir;

// A run journals a download and a completed seed; replaying the journal must
// reproduce exactly the state a resumed run needs, with the file on disk at
// the derived path.
#[test]
fn journal_replay_matches_disk_state() {
    let dir = tempdir().unwrap();
    let manifest_path = dir.path().join("manifest.jsonl");
    let writer = ManifestWriter::open(&manifest_path).unwrap();
    let layout = OutputLayout::new(dir.path().join("out"));

    let file_url = "http://town.example.jp/gikai/r6/teirei1.pdf";
    let file_path = layout.file_path("東京都", "青梅市", &format!("{}.pdf", sha1_hex(file_url)));
    save_bytes(&file_path, b"%PDF-1.4").unwrap();

    writer
        .append(&ManifestEvent::DownloadedFile {
            prefecture: "東京都".into(),
            city: "青梅市".into(),
            source_page: "http://town.example.jp/gikai/".into(),
            file_url: file_url.into(),
            content_type: "application/pdf".into(),
            path: file_path.display().to_string(),
        })
        .unwrap();
    writer
        .append(&ManifestEvent::SeedDone {
            prefecture: "東京都".into(),
            city: "青梅市".into(),
            mode: SeedMode::Parent,
            seed_url: "http://town.example.jp/gikai/".into(),
            found_count: 1,
        })
        .unwrap();

    let index = resume::load(&manifest_path);
    assert_eq!(index.completed_seeds.len(), 1);
    assert!(index.completed_seeds.contains("http://town.example.jp/gikai/"));
    assert!(index.downloaded_file_urls.contains(file_url));
    for url in &index.downloaded_file_urls {
        let expected = layout.file_path("東京都", "青梅市", &format!("{}.pdf", sha1_hex(url)));
        assert!(expected.exists());
    }
}
