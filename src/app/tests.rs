use super::{parse_zettel, App, AppError, GroupCount};
use crate::boxes::BoxError;
use crate::config::Config;
use crate::id::Zid;

fn open_mem_app() -> App {
    App::open(&Config::with_boxes(&["mem:"])).expect("app with a mem box should open")
}

#[test]
fn parse_zettel_splits_header_and_content() {
    let zid = Zid::from_u64(20240101000001).expect("zid should be valid");
    let zettel = parse_zettel(zid, b"title: Note\nrole: zettel\n\nBody text").expect("zettel should parse");
    assert_eq!(zettel.meta.zid, zid);
    assert_eq!(zettel.meta.get("title"), Some("Note"));
    assert_eq!(zettel.content.as_text(), Some("Body text"));
}

#[test]
fn created_zettel_is_readable_and_queryable() {
    let app = open_mem_app();
    let zid = app
        .create_zettel(b"title: First Note\ntags: #alpha #beta\n\nHello searchable world")
        .expect("create should succeed");

    let meta = app.get_meta(zid).expect("meta should be readable");
    assert_eq!(meta.get("title"), Some("First Note"));
    let zettel = app.get_zettel(zid).expect("zettel should be readable");
    assert_eq!(zettel.content.as_text(), Some("Hello searchable world"));

    let outcome = app.query("searchable | tags").expect("query should run");
    assert_eq!(outcome.zettel.len(), 1);
    assert_eq!(outcome.zettel[0].id, zid);
    let arrangement = outcome.arrangement.expect("tags action should arrange");
    assert_eq!(arrangement.key, "tags");
    assert_eq!(
        arrangement.groups,
        vec![
            GroupCount {
                name: "#alpha".to_string(),
                count: 1
            },
            GroupCount {
                name: "#beta".to_string(),
                count: 1
            },
        ]
    );
}

#[test]
fn updating_missing_zettel_fails() {
    let app = open_mem_app();
    let zid = Zid::from_u64(20200101000000).expect("zid should be valid");
    let err = app
        .update_zettel(zid, b"title: Ghost\n\n")
        .expect_err("update of a missing zettel should fail");
    assert!(matches!(err, AppError::Box(BoxError::ZettelNotFound(missing)) if missing == zid));
}

#[test]
fn malformed_query_is_reported() {
    let app = open_mem_app();
    let err = app.query("LIMIT lots").expect_err("bad limit should fail");
    assert!(matches!(err, AppError::Query(_)));
    assert!(err.to_string().starts_with("query error"));
}
