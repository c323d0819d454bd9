use std::fs;
use std::path::PathBuf;

use crossbeam::channel::unbounded;
use url::Url;
use uuid::Uuid;

use super::{connect, DirBox};
use crate::boxes::registry::ConnectData;
use crate::boxes::{BoxError, ManagedBox, Notifier, UpdateReason};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::Meta;

fn unique_dir() -> PathBuf {
    let root = std::env::temp_dir().join(format!("zettelstore-dirbox-{}", Uuid::now_v7()));
    fs::create_dir_all(&root).expect("temp dir should be creatable");
    root
}

fn zid(n: u64) -> Zid {
    Zid::from_u64(20240101000000 + n).expect("zid should be valid")
}

fn started(dir: &PathBuf, read_only: bool) -> DirBox {
    let dir_box = DirBox::new(
        dir.clone(),
        format!("dir:{}", dir.display()),
        Notifier::default(),
        read_only,
    );
    dir_box
        .start_stopper()
        .expect("dir box should be startable")
        .start()
        .expect("dir box should start");
    dir_box
}

fn text_zettel(n: u64, title: &str, body: &str) -> Zettel {
    let mut meta = Meta::new(zid(n));
    meta.set("title", title);
    Zettel::new(meta, Content::from_text(body))
}

#[test]
fn scan_finds_existing_files() {
    let dir = unique_dir();
    fs::write(dir.join(format!("{}.zettel", zid(1))), "title: One\n\nbody one")
        .expect("zettel file should be writable");
    fs::write(dir.join(format!("{}.meta", zid(2))), "title: Pic\nsyntax: png\n")
        .expect("meta file should be writable");
    fs::write(dir.join(format!("{}.content", zid(2))), [0u8, 1, 2])
        .expect("content file should be writable");
    fs::write(dir.join("notes.txt"), "ignored").expect("other file should be writable");
    fs::write(dir.join(format!("{}.bak", zid(3))), "ignored").expect("backup should be writable");

    let dir_box = started(&dir, true);
    assert_eq!(dir_box.read_stats().zettel, 2);
    let one = dir_box.get_zettel(zid(1)).expect("zettel one should load");
    assert_eq!(one.meta.get("title"), Some("One"));
    assert_eq!(one.content.as_text(), Some("body one"));
    let pic = dir_box.get_zettel(zid(2)).expect("binary zettel should load");
    assert!(pic.content.is_binary());
    assert_eq!(pic.meta.get("syntax"), Some("png"));
    assert!(!dir_box.has_zettel(zid(3)));
}

#[test]
fn update_writes_files_and_switches_layout() {
    let dir = unique_dir();
    let dir_box = started(&dir, false);
    dir_box
        .update_zettel(text_zettel(1, "Text", "hello"))
        .expect("text zettel should be written");
    assert!(dir.join(format!("{}.zettel", zid(1))).exists());

    let mut binary = text_zettel(1, "Binary", "");
    binary.content = Content::new(vec![0, 255]);
    dir_box.update_zettel(binary.clone()).expect("binary zettel should be written");
    assert!(!dir.join(format!("{}.zettel", zid(1))).exists());
    assert!(dir.join(format!("{}.content", zid(1))).exists());
    assert_eq!(dir_box.get_zettel(zid(1)).expect("zettel should load"), binary);
}

#[test]
fn rename_and_delete_move_files() {
    let dir = unique_dir();
    let dir_box = started(&dir, false);
    dir_box
        .update_zettel(text_zettel(1, "T", "x"))
        .expect("zettel should be written");
    dir_box.rename_zettel(zid(1), zid(2)).expect("rename should work");
    assert!(!dir.join(format!("{}.zettel", zid(1))).exists());
    assert_eq!(dir_box.get_meta(zid(2)).expect("renamed zettel").zid, zid(2));

    dir_box.delete_zettel(zid(2)).expect("delete should work");
    assert!(!dir.join(format!("{}.zettel", zid(2))).exists());
    assert!(matches!(
        dir_box.get_zettel(zid(2)),
        Err(BoxError::ZettelNotFound(_))
    ));
}

#[test]
fn refresh_picks_up_external_changes() {
    let dir = unique_dir();
    let (tx, rx) = unbounded();
    let dir_box = DirBox::new(dir.clone(), "dir:".to_string(), Notifier::new(2, Some(tx)), false);
    dir_box
        .start_stopper()
        .expect("startable")
        .start()
        .expect("dir box should start");
    fs::write(dir.join(format!("{}.zettel", zid(5))), "title: Later\n\nx")
        .expect("zettel file should be writable");
    assert!(!dir_box.has_zettel(zid(5)));
    dir_box
        .refresher()
        .expect("dir box should be refreshable")
        .refresh()
        .expect("refresh should work");
    assert!(dir_box.has_zettel(zid(5)));

    let reasons: Vec<UpdateReason> = rx.try_iter().map(|info| info.reason).collect();
    assert_eq!(reasons, vec![UpdateReason::Ready, UpdateReason::Reload]);
}

#[test]
fn read_only_dir_box_rejects_writes() {
    let dir = unique_dir();
    fs::write(dir.join(format!("{}.zettel", zid(1))), "title: R\n\nx")
        .expect("zettel file should be writable");
    let dir_box = started(&dir, true);
    assert!(matches!(
        dir_box.update_zettel(text_zettel(1, "T", "y")),
        Err(BoxError::ReadOnly)
    ));
    assert!(matches!(
        dir_box.rename_zettel(zid(1), zid(2)),
        Err(BoxError::ReadOnly)
    ));
    dir_box
        .rename_zettel(zid(7), zid(8))
        .expect("renaming an absent zettel is a no-op");
    assert!(!dir_box.can_delete_zettel(zid(1)));
}

#[test]
fn uri_paths_are_percent_decoded() {
    let dir = unique_dir().join("notes with spaces");
    fs::create_dir_all(&dir).expect("spaced dir should be creatable");
    let url = Url::parse(&format!("dir:{}", dir.display())).expect("box uri should parse");
    assert!(url.path().contains("%20"));

    let data = ConnectData {
        number: 1,
        ..ConnectData::default()
    };
    let dir_box = connect(&url, &data).expect("dir box should connect");
    dir_box
        .start_stopper()
        .expect("dir box should be startable")
        .start()
        .expect("dir box should start");
    dir_box
        .update_zettel(text_zettel(1, "Spaced", "body"))
        .expect("update should succeed");
    assert!(dir.join(format!("{}.zettel", zid(1))).is_file());
    assert!(!dir
        .parent()
        .expect("spaced dir has a parent")
        .join("notes%20with%20spaces")
        .exists());
}
