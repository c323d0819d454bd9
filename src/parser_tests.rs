use super::{parse_inlines, ContentParser, MarkupParser, ParseError};
use crate::ast::Node;
use crate::content::{Content, Zettel};
use crate::id::Zid;
use crate::meta::Meta;
use crate::reference::RefState;

fn zettel(syntax: &str, content: Content) -> Zettel {
    let mut meta = Meta::new(Zid::parse("20240101000000").expect("zid should parse"));
    if !syntax.is_empty() {
        meta.set("syntax", syntax);
    }
    Zettel::new(meta, content)
}

#[test]
fn inline_links_embeds_cites_and_literals() {
    let nodes = parse_inlines("see [[the note|20240101000001]] and {{20240101000002}} [@key p. 3] `code`");
    let links: Vec<&Node> = nodes
        .iter()
        .filter(|node| !matches!(node, Node::Text(_) | Node::Space))
        .collect();
    assert_eq!(links.len(), 4);
    match links[0] {
        Node::Link { reference, inlines } => {
            assert_eq!(reference.state, RefState::Zettel);
            assert_eq!(reference.value, "20240101000001");
            assert_eq!(inlines.len(), 3);
        }
        other => panic!("expected link, got {:?}", other),
    }
    assert!(matches!(links[1], Node::Embed { inlines, .. } if inlines.is_empty()));
    assert!(matches!(links[2], Node::Cite { key, .. } if key == "key"));
    assert_eq!(links[3], &Node::Literal("code".to_string()));
}

#[test]
fn unclosed_markup_stays_text() {
    let nodes = parse_inlines("a [[b");
    assert_eq!(
        nodes,
        vec![
            Node::Text("a".to_string()),
            Node::Space,
            Node::Text("[[b".to_string()),
        ]
    );
}

#[test]
fn blocks_cover_headings_lists_verbatim_and_transclusion() {
    let text = "=== Title\n\nfirst line\nsecond\n\n* one\n* [[20240101000003]]\n```\nraw [[x]]\n```\n{{{20240101000004}}}\n";
    let doc = MarkupParser
        .parse_zettel(&zettel("", Content::from_text(text)))
        .expect("markup should parse");
    assert!(matches!(doc.blocks[0], Node::Heading { level: 3, .. }));
    assert!(matches!(&doc.blocks[1], Node::Paragraph(inlines) if inlines.contains(&Node::Break)));
    assert!(matches!(&doc.blocks[2], Node::List(items) if items.len() == 2));
    assert_eq!(doc.blocks[3], Node::VerbatimBlock("raw [[x]]".to_string()));
    assert!(matches!(&doc.blocks[4], Node::Transclude(r) if r.value == "20240101000004"));
    assert_eq!(doc.blocks.len(), 5);
}

#[test]
fn syntax_selects_treatment() {
    let plain = MarkupParser
        .parse_zettel(&zettel("text", Content::from_text("[[not a link]]")))
        .expect("plain text should parse");
    assert_eq!(
        plain.blocks,
        vec![Node::Paragraph(vec![
            Node::Text("[[not".to_string()),
            Node::Space,
            Node::Text("a".to_string()),
            Node::Space,
            Node::Text("link]]".to_string()),
        ])]
    );

    let css = MarkupParser
        .parse_zettel(&zettel("css", Content::from_text("body {}")))
        .expect("css should parse");
    assert_eq!(css.blocks, vec![Node::VerbatimBlock("body {}".to_string())]);

    let image = MarkupParser
        .parse_zettel(&zettel("png", Content::new(vec![0x89, 0, 1])))
        .expect("images are ignored");
    assert!(image.blocks.is_empty());
}

#[test]
fn binary_markup_is_an_error() {
    let err = MarkupParser
        .parse_zettel(&zettel("zmk", Content::new(vec![0, 159, 146])))
        .expect_err("binary markup should fail");
    assert!(matches!(err, ParseError::BinaryContent { .. }));
}
