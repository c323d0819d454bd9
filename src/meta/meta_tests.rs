use super::keys::{self, is_valid_key, KeyUsage, MetaType};
use super::Meta;
use crate::id::Zid;

fn zid() -> Zid {
    Zid::parse("20240101000000").expect("zid should parse")
}

#[test]
fn key_validity_boundaries() {
    assert!(is_valid_key("0"));
    assert!(is_valid_key("a-b-1"));
    assert!(!is_valid_key("-"));
    assert!(!is_valid_key("-a"));
    assert!(!is_valid_key("Title"));
    assert!(!is_valid_key(""));
    assert!(!is_valid_key("a b"));
    assert!(is_valid_key(&"a".repeat(255)));
    assert!(!is_valid_key(&"a".repeat(256)));
}

#[test]
fn registry_knows_types_usage_and_inverses() {
    assert_eq!(keys::key_type("tags"), MetaType::TagSet);
    assert_eq!(keys::key_type("my-zids"), MetaType::IdSet);
    assert_eq!(keys::key_type("unknown"), MetaType::Empty);
    assert_eq!(keys::inverse_key("precursor"), Some("folge"));
    assert_eq!(keys::inverse_key("folge"), None);
    assert!(keys::is_property("back"));
    assert!(keys::is_computed("created"));
    assert!(!keys::is_property("created"));
    let created = keys::descriptor("created").expect("created should be registered");
    assert_eq!(created.usage, KeyUsage::Computed);
}

#[test]
fn set_ignores_id_and_invalid_keys_and_trims_values() {
    let mut m = Meta::new(zid());
    m.set("id", "20240101000001");
    m.set("Bad", "x");
    m.set("title", "  Hello  ");
    assert_eq!(m.get("id"), None);
    assert_eq!(m.get("Bad"), None);
    assert_eq!(m.get("title"), Some("Hello"));
    assert_eq!(m.len(), 1);
}

#[test]
fn pairs_list_priority_keys_first_and_hide_properties() {
    let mut m = Meta::new(zid());
    m.set("author", "me");
    m.set("syntax", "zmk");
    m.set("title", "T");
    m.set("back", "20240101000001");
    m.set("tags", "#x");
    let keys: Vec<&str> = m.pairs().into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec!["title", "tags", "syntax", "author"]);
    let all: Vec<&str> = m.computed_pairs().into_iter().map(|(k, _)| k).collect();
    assert_eq!(all, vec!["title", "tags", "syntax", "author", "back"]);
    let rest: Vec<&str> = m.pairs_rest().into_iter().map(|(k, _)| k).collect();
    assert_eq!(rest, vec!["author"]);
}

#[test]
fn parse_handles_continuations_comments_and_types() {
    let input = "Title: A long\n  title\n% a comment\ntags: Rust #zettel rust\nprecursor: 20230101000000 bogus\ncreated: 2023\nrole: Manual\n\ncontent";
    let (m, start) = Meta::parse_header(zid(), input.as_bytes()).expect("header should parse");
    assert_eq!(m.get("title"), Some("A long title"));
    assert_eq!(m.get("tags"), Some("#rust #zettel"));
    assert_eq!(m.get("precursor"), Some("20230101000000"));
    assert_eq!(m.get("created"), Some("2023"));
    assert_eq!(m.get("role"), Some("manual"));
    assert_eq!(&input[start..], "content");
    assert!(!m.yaml_sep());
}

#[test]
fn parse_reads_yaml_fenced_header() {
    let input = "---\ntitle: Y\n\nrole: r\n---\nbody\n";
    let (m, start) = Meta::parse_header(zid(), input.as_bytes()).expect("header should parse");
    assert!(m.yaml_sep());
    assert_eq!(m.get("title"), Some("Y"));
    assert_eq!(m.get("role"), Some("r"));
    assert_eq!(&input[start..], "body\n");
}

#[test]
fn lines_without_key_are_skipped() {
    let m = Meta::parse(zid(), ": nothing\ntitle: ok\n");
    assert_eq!(m.len(), 1);
    assert_eq!(m.get("title"), Some("ok"));
}

#[test]
fn write_then_parse_preserves_stored_pairs() {
    for yaml in [false, true] {
        let mut m = Meta::new(zid());
        m.set_yaml_sep(yaml);
        m.set("title", "Round trip");
        m.set("tags", "#a #b");
        m.set("license", "");
        m.set("precursor", "20230101000000");
        m.set("forward", "20230101000000");
        let data = m.write_zettel(b"some content");
        let (parsed, start) = Meta::parse_header(zid(), &data).expect("header should parse");
        assert_eq!(parsed.yaml_sep(), yaml);
        assert_eq!(parsed.pairs(), m.pairs());
        assert_eq!(parsed.get("forward"), None);
        assert_eq!(&data[start..], b"some content");
    }
}

#[test]
fn header_must_be_utf8() {
    let data = b"title: \xff\xfe\n\nbody";
    assert!(Meta::parse_header(zid(), data).is_err());
}

#[test]
fn equality_can_ignore_properties() {
    let mut a = Meta::new(zid());
    a.set("title", "x");
    let mut b = a.clone();
    b.set("back", "20240101000001");
    assert!(a.equal(&b, false));
    assert!(!a.equal(&b, true));
    b.remove_properties();
    assert_eq!(a, b);
}
