use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use uuid::Uuid;
use zettelstore::boxes::manager::{Anteroom, AnteroomAction};
use zettelstore::boxes::{BoxError, Manager, UpdateReason};
use zettelstore::config::Config;
use zettelstore::content::{Content, Zettel};
use zettelstore::id::{Zid, ZidSet};
use zettelstore::meta::Meta;

const WAIT: Duration = Duration::from_secs(5);

fn zid(raw: &str) -> Zid {
    Zid::parse(raw).expect("scenario zid should parse")
}

fn zettel(zid: Zid, pairs: &[(&str, &str)], content: &str) -> Zettel {
    let mut meta = Meta::new(zid);
    for (key, value) in pairs {
        meta.set(key, value);
    }
    Zettel::new(meta, Content::from_text(content))
}

fn start<S: AsRef<str>>(uris: &[S]) -> Manager {
    let manager = Manager::new(&Config::with_boxes(uris)).expect("manager should be created");
    manager.start().expect("manager should start");
    assert!(manager.wait_started(WAIT), "manager should become ready");
    manager
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + WAIT;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn meta_value(manager: &Manager, zid: Zid, key: &str) -> Option<String> {
    manager
        .get_meta(zid)
        .expect("meta should be readable")
        .get(key)
        .map(str::to_string)
}

/// S1 setup: A names B as precursor before B exists.
fn create_a_and_b(manager: &Manager) -> (Zid, Zid) {
    let a = zid("20240101000000");
    let b = zid("20240101000100");
    manager
        .update_zettel(zettel(a, &[("title", "A"), ("precursor", "20240101000100")], ""))
        .expect("A should be stored");
    manager
        .update_zettel(zettel(b, &[("title", "B")], "content of B"))
        .expect("B should be stored");
    (a, b)
}

#[test]
fn s1_precursor_becomes_folge_on_target() {
    let manager = start(&["mem:"]);
    let (a, b) = create_a_and_b(&manager);

    assert!(wait_until(|| meta_value(&manager, b, "folge").as_deref()
        == Some("20240101000000")));
    assert!(wait_until(|| meta_value(&manager, a, "dead").is_none()));
    assert!(manager.wait_indexed(WAIT));
    assert_eq!(meta_value(&manager, a, "back"), None);
    assert_eq!(meta_value(&manager, a, "precursor").as_deref(), Some("20240101000100"));
}

#[test]
fn s2_dead_reference_resurrects() {
    let manager = start(&["mem:"]);
    let a = zid("20240101000000");
    manager
        .update_zettel(zettel(a, &[("title", "A"), ("precursor", "20240101000100")], ""))
        .expect("A should be stored");
    let c = zid("20240101000200");
    let d = zid("99999999999999");
    manager
        .update_zettel(zettel(c, &[("title", "C"), ("precursor", "99999999999999")], ""))
        .expect("C should be stored");
    assert_eq!(meta_value(&manager, c, "dead").as_deref(), Some("99999999999999"));

    manager
        .update_zettel(zettel(d, &[("title", "D")], ""))
        .expect("D should be stored");
    assert!(wait_until(|| meta_value(&manager, c, "dead").is_none()));
    assert!(wait_until(|| meta_value(&manager, d, "folge").as_deref()
        == Some("20240101000200")));
}

#[test]
fn s3_rename_keeps_content_and_requeues_referrers() {
    let manager = start(&["mem:"]);
    let (a, b) = create_a_and_b(&manager);
    assert!(wait_until(|| meta_value(&manager, b, "folge").is_some()));
    let before = manager.get_zettel(b).expect("B should be readable");

    let renamed = zid("20240101000101");
    manager.rename_zettel(b, renamed).expect("rename should succeed");
    assert!(matches!(
        manager.get_zettel(b),
        Err(BoxError::ZettelNotFound(missing)) if missing == b
    ));
    let after = manager.get_zettel(renamed).expect("renamed zettel should be readable");
    assert_eq!(after.content, before.content);
    assert_eq!(after.meta.get("title"), Some("B"));

    // A still names the old zid, which is now missing.
    assert!(wait_until(|| meta_value(&manager, a, "dead").as_deref()
        == Some("20240101000100")));
    assert_eq!(meta_value(&manager, a, "precursor").as_deref(), Some("20240101000100"));
}

#[test]
fn s4_repeated_events_are_destuttered() {
    let manager = start(&["mem:"]);
    assert!(manager.wait_indexed(WAIT));
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&seen);
    manager.register_observer(move |info| {
        if info.reason == UpdateReason::Zettel && info.zid == Zid::HOME {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    });
    for _ in 0..3 {
        manager.reindex(Zid::HOME).expect("reindex should be accepted");
    }
    assert!(wait_until(|| seen.load(Ordering::SeqCst) > 0));
    thread::sleep(Duration::from_millis(200));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    let anteroom = Anteroom::new(0);
    for _ in 0..3 {
        anteroom.enqueue(Zid::HOME);
    }
    assert_eq!(anteroom.len(), 1);
}

#[test]
fn s5_first_box_wins_on_overlay_reads() {
    let dir = std::env::temp_dir().join(format!("zettelstore-s5-{}", Uuid::now_v7()));
    fs::create_dir_all(&dir).expect("temp dir should be creatable");
    let z = zid("20240101000300");
    fs::write(dir.join(format!("{}.zettel", z)), "title: from R\n\nlower copy")
        .expect("zettel file should be writable");
    let read_only: PathBuf = dir.clone();

    let manager = start(&["mem:".to_string(), format!("dir:{}?readonly", read_only.display())]);
    manager
        .update_zettel(zettel(z, &[("title", "from M")], "upper copy"))
        .expect("update in M should succeed");

    let top = manager.get_zettel(z).expect("zettel should be readable");
    assert_eq!(top.meta.get("title"), Some("from M"));
    let all = manager.get_all_zettel(z).expect("all copies should be readable");
    let titles: Vec<_> = all.iter().map(|copy| copy.meta.get("title")).collect();
    assert_eq!(titles, vec![Some("from M"), Some("from R")]);

    drop(manager);
    fs::remove_dir_all(&dir).expect("temp dir should be removable");
}

#[test]
fn s6_reload_supersedes_earlier_entries() {
    let anteroom = Anteroom::new(10);
    let first = Zid::from_u64(100).expect("zid should be valid");
    let second = Zid::from_u64(200).expect("zid should be valid");
    anteroom.enqueue(first);
    anteroom.reset();
    anteroom.enqueue(second);

    let (action, reload_zid, r1) = anteroom.dequeue();
    assert_eq!((action, reload_zid), (AnteroomAction::Reload, Zid::INVALID));
    let (action, next, r2) = anteroom.dequeue();
    assert_eq!((action, next), (AnteroomAction::Zettel, second));
    assert_ne!(r1, r2);
    assert_eq!(anteroom.dequeue().0, AnteroomAction::Nothing);

    // A reload listing the current zids replaces the pending reload.
    anteroom.reset();
    let zids: ZidSet = [first, second].into_iter().collect();
    anteroom.reload(&zids);
    let drained: Vec<_> = std::iter::from_fn(|| match anteroom.dequeue() {
        (AnteroomAction::Zettel, zid, _) => Some(zid),
        _ => None,
    })
    .collect();
    assert_eq!(drained, vec![first, second]);
}
