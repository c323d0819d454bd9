use std::collections::BTreeSet;

use super::MemStore;
use crate::id::{Zid, ZidSet};
use crate::meta::Meta;
use crate::store::ZettelIndex;

fn zid(n: u64) -> Zid {
    Zid::from_u64(20240101000000 + n).expect("test zid should be valid")
}

fn index(n: u64) -> ZettelIndex {
    let mut meta = Meta::new(zid(n));
    meta.set("title", &format!("Zettel {}", n));
    ZettelIndex::new(meta)
}

fn words(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|item| item.to_string()).collect()
}

fn set(items: &[u64]) -> ZidSet {
    items.iter().map(|n| zid(*n)).collect()
}

fn enriched(store: &MemStore, n: u64) -> Meta {
    let mut meta = store.get_meta(zid(n)).expect("zettel should be indexed");
    store.enrich(&mut meta);
    meta
}

#[test]
fn forward_references_show_up_as_backward_on_target() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    store.update_references(a);

    let b = enriched(&store, 2);
    assert_eq!(b.get("backward"), Some(zid(1).to_string().as_str()));
    assert_eq!(b.get("back"), Some(zid(1).to_string().as_str()));
    let a = enriched(&store, 1);
    assert_eq!(a.get("forward"), Some(zid(2).to_string().as_str()));
    assert_eq!(a.get("back"), None);
}

#[test]
fn referencing_unindexed_zettel_asks_for_recheck() {
    let store = MemStore::new();
    let mut a = index(1);
    a.add_back_ref(zid(2));
    let to_check = store.update_references(a);
    assert_eq!(to_check, set(&[2]));
    assert!(store.get_meta(zid(2)).is_err());
    assert!(!store.has_zettel(zid(2)));
    assert_eq!(store.read_stats().zettel, 1);
}

#[test]
fn dead_references_are_rechecked_once_target_arrives() {
    let store = MemStore::new();
    let mut a = index(1);
    a.add_dead_ref(zid(9));
    store.update_references(a);
    assert_eq!(enriched(&store, 1).get("dead"), Some(zid(9).to_string().as_str()));
    assert_eq!(store.dead_references().len(), 1);

    let to_check = store.update_references(index(9));
    assert_eq!(to_check, set(&[1]));
}

#[test]
fn inverse_references_land_under_inverse_key() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_inverse_ref("folge", zid(2));
    store.update_references(a);

    let b = enriched(&store, 2);
    assert_eq!(b.get("folge"), Some(zid(1).to_string().as_str()));
    assert_eq!(b.get("back"), None);
    assert_eq!(b.get("forward"), None);
    assert_eq!(enriched(&store, 1).get("dead"), None);

    // Removing the reference drops the inverse value again.
    store.update_references(index(1));
    assert_eq!(enriched(&store, 2).get("folge"), None);
}

#[test]
fn delete_removes_zettel_from_all_lists() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    a.set_words(words(&["alpha"]));
    store.update_references(a);
    let mut c = index(3);
    c.add_back_ref(zid(1));
    c.add_inverse_ref("folge", zid(1));
    store.update_references(c);

    let to_check = store.delete_zettel(zid(1));
    assert_eq!(to_check, set(&[3]));
    assert!(store.get_meta(zid(1)).is_err());
    assert_eq!(enriched(&store, 2).get("backward"), None);
    let c = enriched(&store, 3);
    assert_eq!(c.get("forward"), None);
    assert!(store.search_equal("alpha").is_empty());
    assert!(!store.dump().contains(&zid(1).to_string()));
}

#[test]
fn words_and_urls_are_searchable() {
    let store = MemStore::new();
    let mut a = index(1);
    a.set_words(words(&["rust", "zettel"]));
    a.set_urls(words(&["https://example.com"]));
    store.update_references(a);
    let mut b = index(2);
    b.set_words(words(&["rusty"]));
    store.update_references(b);

    assert_eq!(store.search_equal("rust"), set(&[1]));
    assert_eq!(store.search_prefix("rust"), set(&[1, 2]));
    assert_eq!(store.search_suffix("ettel"), set(&[1]));
    assert_eq!(store.search_contains("example"), set(&[1]));

    let mut a = index(1);
    a.set_words(words(&["zettel"]));
    store.update_references(a);
    assert_eq!(store.search_equal("rust"), ZidSet::new());
    assert!(store.search_equal("https://example.com").is_empty());
    assert_eq!(store.read_stats().words, 2);
}

#[test]
fn zid_searches_include_referencing_zettel() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    store.update_references(a);

    assert_eq!(store.search_equal(&zid(2).to_string()), set(&[1, 2]));
    assert_eq!(store.search_prefix("2024010100000"), set(&[1, 2]));
    assert_eq!(store.search_suffix("01"), set(&[1]));
    assert_eq!(store.search_contains("00002"), set(&[1, 2]));
    assert!(store.search_suffix("+2").is_empty());
    assert!(store.search_suffix("-1").is_empty());
}

#[test]
fn rename_moves_index_data() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    a.set_words(words(&["moved"]));
    store.update_references(a);

    let to_check = store.rename_zettel(zid(1), zid(5));
    assert!(to_check.contains(zid(5)));
    assert!(store.get_meta(zid(1)).is_err());
    let renamed = store.get_meta(zid(5)).expect("renamed zettel should be indexed");
    assert_eq!(renamed.zid, zid(5));
    assert_eq!(store.search_equal("moved"), set(&[5]));
    assert_eq!(
        enriched(&store, 2).get("backward"),
        Some(zid(5).to_string().as_str())
    );

    // Renaming onto an existing zettel is refused.
    assert!(store.rename_zettel(zid(5), zid(2)).is_empty());
    assert!(store.has_zettel(zid(5)));
}

#[test]
fn index_strips_properties_but_keeps_whitelist() {
    let store = MemStore::new();
    let mut meta = Meta::new(zid(1));
    meta.set("title", "T");
    meta.set("back", &zid(3).to_string());
    meta.set("box-number", "1");
    store.update_references(ZettelIndex::new(meta));
    let stored = store.get_meta(zid(1)).expect("zettel should be indexed");
    assert_eq!(stored.get("back"), None);
    assert_eq!(stored.get("box-number"), Some("1"));
}

#[test]
fn dump_is_sorted_and_deterministic() {
    let store = MemStore::new();
    for n in [3, 1, 2] {
        let mut zi = index(n);
        zi.set_words(words(&["w"]));
        store.update_references(zi);
    }
    let dump = store.dump();
    let first = dump.find(&zid(1).to_string()).expect("zid 1 should be dumped");
    let third = dump.find(&zid(3).to_string()).expect("zid 3 should be dumped");
    assert!(first < third);
    assert!(dump.starts_with("=== Dump\n==== Zettel Index\n"));
    assert_eq!(dump, store.dump());
}

#[test]
fn enrich_counts_updates() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    store.update_references(a);
    let before = store.read_stats().updates;
    enriched(&store, 2);
    enriched(&store, 1);
    assert_eq!(store.read_stats().updates, before + 2);
    let mut unknown = Meta::new(zid(7));
    assert!(!store.enrich(&mut unknown));
}

#[test]
fn enriching_twice_gives_the_same_meta() {
    let store = MemStore::new();
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    a.add_back_ref(zid(9));
    a.add_inverse_ref("folge", zid(2));
    store.update_references(a);

    for n in [1, 2] {
        let once = enriched(&store, n);
        let mut twice = once.clone();
        store.enrich(&mut twice);
        assert!(once.equal(&twice, true), "zettel {} changed on second enrich", n);
    }
}

#[test]
fn neighbour_graph_links_both_directions() {
    let store = MemStore::new();
    store.update_references(index(3));
    store.update_references(index(2));
    let mut a = index(1);
    a.add_back_ref(zid(2));
    a.add_back_ref(zid(4));
    store.update_references(a);
    let mut c = index(3);
    c.add_inverse_ref("folge", zid(2));
    store.update_references(c);

    let graph = store.neighbour_graph();
    assert!(graph.has_edge(zid(1), zid(2)));
    assert!(graph.has_edge(zid(2), zid(1)));
    assert!(graph.has_edge(zid(3), zid(2)));
    assert!(graph.has_edge(zid(2), zid(3)));
    assert!(!graph.has_vertex(zid(4)));
    assert_eq!(graph.reachable_vertices(zid(3)), set(&[1, 2, 3]));
}
