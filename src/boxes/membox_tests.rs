use crossbeam::channel::unbounded;
use url::Url;

use super::connect;
use crate::boxes::registry::ConnectData;
use crate::boxes::{BoxError, ManagedBox, UpdateReason};
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::Meta;

fn mem_box(uri: &str) -> Box<dyn ManagedBox> {
    let url = Url::parse(uri).expect("test uri should parse");
    let data = ConnectData {
        number: 1,
        notify: None,
        ..ConnectData::default()
    };
    let mem = connect(&url, &data).expect("mem box should connect");
    mem.start_stopper()
        .expect("mem box should be startable")
        .start()
        .expect("mem box should start");
    mem
}

fn zettel(n: u64, content: &str) -> Zettel {
    let mut meta = Meta::new(Zid::from_u64(20240101000000 + n).expect("zid should be valid"));
    meta.set("title", "T");
    Zettel::new(meta, Content::from_text(content))
}

#[test]
fn update_creates_and_replaces() {
    let mem = mem_box("mem:");
    let z = zettel(1, "first");
    mem.update_zettel(z.clone()).expect("update should store");
    assert_eq!(mem.get_zettel(z.meta.zid).expect("zettel should exist"), z);
    mem.update_zettel(zettel(1, "second")).expect("update should replace");
    assert_eq!(
        mem.get_zettel(z.meta.zid)
            .expect("zettel should exist")
            .content
            .as_text(),
        Some("second")
    );
    assert_eq!(mem.read_stats().zettel, 1);
}

#[test]
fn create_allocates_fresh_zid() {
    let mem = mem_box("mem:");
    let zid = mem
        .create_zettel(zettel(1, "x"))
        .expect("create should succeed");
    assert!(zid.is_valid());
    assert!(mem.has_zettel(zid));
    assert_eq!(mem.get_meta(zid).expect("meta should exist").zid, zid);
}

#[test]
fn capacity_limits_are_enforced() {
    let mem = mem_box("mem:?max-zettel=1");
    mem.update_zettel(zettel(1, "a")).expect("first zettel fits");
    assert!(!mem.can_create_zettel());
    assert!(matches!(
        mem.update_zettel(zettel(2, "b")),
        Err(BoxError::Capacity)
    ));
    mem.update_zettel(zettel(1, "replacing is fine"))
        .expect("replacing should not count against max-zettel");

    let small = mem_box("mem:?max-bytes=10");
    assert!(!small.can_update_zettel(&zettel(1, "this content is too long")));
    assert!(matches!(
        small.update_zettel(zettel(1, "this content is too long")),
        Err(BoxError::Capacity)
    ));
}

#[test]
fn zero_limits_mean_unlimited() {
    let mem = mem_box("mem:?max-zettel=0&max-bytes=0");
    for n in 1..=5 {
        mem.update_zettel(zettel(n, "x")).expect("unlimited box should accept");
    }
    assert!(mem.can_create_zettel());
}

#[test]
fn read_only_box_rejects_writes() {
    let mem = mem_box("mem:?readonly");
    assert!(!mem.can_create_zettel());
    assert!(matches!(
        mem.update_zettel(zettel(1, "x")),
        Err(BoxError::ReadOnly)
    ));
    assert!(matches!(
        mem.delete_zettel(zettel(1, "x").meta.zid),
        Err(BoxError::ReadOnly)
    ));
    let missing = zettel(1, "x").meta.zid;
    mem.rename_zettel(missing, zettel(2, "x").meta.zid)
        .expect("renaming an absent zettel in a read-only box is a no-op");
}

#[test]
fn rename_moves_zettel_and_notifies() {
    let (tx, rx) = unbounded();
    let url = Url::parse("mem:").expect("uri should parse");
    let mem = connect(
        &url,
        &ConnectData {
            number: 3,
            notify: Some(tx),
            ..ConnectData::default()
        },
    )
    .expect("mem box should connect");
    let z = zettel(1, "x");
    let new_zid = zettel(2, "x").meta.zid;
    mem.update_zettel(z.clone()).expect("update should store");
    mem.rename_zettel(z.meta.zid, new_zid).expect("rename should work");
    assert!(!mem.has_zettel(z.meta.zid));
    assert_eq!(mem.get_meta(new_zid).expect("renamed zettel").zid, new_zid);

    let events: Vec<_> = rx.try_iter().collect();
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|info| info.box_number == 3));
    assert_eq!(events[1].reason, UpdateReason::Delete);
    assert_eq!(events[2].zid, new_zid);

    assert!(matches!(
        mem.rename_zettel(z.meta.zid, new_zid),
        Err(BoxError::InvalidZid(_))
    ));
}

#[test]
fn delete_frees_space() {
    let mem = mem_box("mem:?max-bytes=20");
    let z = zettel(1, "0123456789");
    mem.update_zettel(z.clone()).expect("zettel should fit");
    mem.delete_zettel(z.meta.zid).expect("delete should work");
    assert!(matches!(
        mem.delete_zettel(z.meta.zid),
        Err(BoxError::ZettelNotFound(_))
    ));
    mem.update_zettel(zettel(2, "0123456789")).expect("space should be free again");
}

#[test]
fn apply_respects_constraint() {
    let mem = mem_box("mem:");
    for n in 1..=3 {
        mem.update_zettel(zettel(n, "x")).expect("update should store");
    }
    let mut seen = Vec::new();
    let keep = zettel(2, "x").meta.zid;
    mem.apply_zid(&mut |zid| seen.push(zid), &|zid| zid != keep)
        .expect("apply should work");
    assert_eq!(seen.len(), 2);
    let mut metas = Vec::new();
    mem.apply_meta(&mut |meta| metas.push(meta), &|_| true)
        .expect("apply should work");
    assert_eq!(metas.len(), 3);
}
