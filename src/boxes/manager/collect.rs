use std::collections::BTreeSet;

use url::Url;

use crate::ast::{walk_all, Node, Visitor};
use crate::id::{Zid, ZidSet};
use crate::meta::keys::{self, MetaType};
use crate::meta::{values, Meta};
use crate::parser::ContentParser;
use crate::reference::Reference;
use crate::store::{normalize_words, ZettelIndex};

#[derive(Debug, Default)]
pub(super) struct Collector {
    pub refs: ZidSet,
    pub words: BTreeSet<String>,
    pub urls: BTreeSet<String>,
}

impl Collector {
    fn add_text(&mut self, text: &str) {
        self.words.extend(normalize_words(text));
    }

    fn add_reference(&mut self, reference: &Reference) {
        if let Some(zid) = reference.zid() {
            self.refs.add(zid);
        } else if reference.is_external() {
            self.urls.insert(reference.value.to_lowercase());
        }
    }

    fn add_meta_value(&mut self, value: &str) {
        let words = normalize_words(value);
        if words.is_empty() {
            self.words.insert(value.to_lowercase());
        } else {
            self.words.extend(words);
        }
    }
}

impl Visitor for Collector {
    fn visit(&mut self, node: &Node) -> bool {
        match node {
            Node::Text(text) | Node::Literal(text) | Node::VerbatimBlock(text) => {
                self.add_text(text)
            }
            Node::Cite { key, .. } => self.add_text(key),
            Node::Link { reference, .. }
            | Node::Embed { reference, .. }
            | Node::Transclude(reference) => self.add_reference(reference),
            Node::Paragraph(_)
            | Node::Heading { .. }
            | Node::List(_)
            | Node::Space
            | Node::Break => {}
        }
        true
    }
}

pub(super) fn collect_from_meta(
    meta: &Meta,
    parser: &dyn ContentParser,
    exists: &dyn Fn(Zid) -> bool,
    zidx: &mut ZettelIndex,
    collector: &mut Collector,
) {
    for (key, value) in meta.computed_pairs() {
        let descriptor = keys::descriptor(key);
        if descriptor.is_some_and(|descriptor| descriptor.is_property()) {
            continue;
        }
        let inverse = descriptor.and_then(|descriptor| descriptor.inverse);
        match keys::key_type(key) {
            MetaType::Id => update_value(zidx, inverse, value, exists),
            MetaType::IdSet => {
                for item in values::list_from_value(value) {
                    update_value(zidx, inverse, item, exists);
                }
            }
            MetaType::Zettelmarkup => walk_all(collector, &parser.parse_inlines(value)),
            MetaType::Url => {
                if Url::parse(value).is_ok() {
                    collector.urls.insert(value.to_lowercase());
                }
            }
            meta_type if meta_type.is_set() => {
                for item in values::list_from_value(value) {
                    collector.add_meta_value(item);
                }
            }
            _ => collector.add_meta_value(value),
        }
    }
}

fn update_value(
    zidx: &mut ZettelIndex,
    inverse: Option<&str>,
    value: &str,
    exists: &dyn Fn(Zid) -> bool,
) {
    let Ok(zid) = Zid::parse(value) else {
        return;
    };
    if !exists(zid) {
        zidx.add_dead_ref(zid);
        return;
    }
    match inverse {
        Some(inverse) => zidx.add_inverse_ref(inverse, zid),
        None => zidx.add_back_ref(zid),
    }
}

#[cfg(test)]
mod tests {
    use super::{collect_from_meta, Collector};
    use crate::ast::walk_all;
    use crate::id::Zid;
    use crate::meta::Meta;
    use crate::parser::{parse_inlines, MarkupParser};
    use crate::store::ZettelIndex;

    fn zid(n: u64) -> Zid {
        Zid::from_u64(20240101000000 + n).expect("zid should be valid")
    }

    #[test]
    fn content_walk_collects_refs_words_and_urls() {
        let mut collector = Collector::default();
        let text = format!("Café [[{}]] and [[Site|HTTPS://Example.com/X]] `Code`", zid(2));
        walk_all(&mut collector, &parse_inlines(&text));
        assert!(collector.refs.contains(zid(2)));
        assert!(collector.urls.contains("https://example.com/x"));
        for word in ["cafe", "and", "site", "code"] {
            assert!(collector.words.contains(word), "missing word {}", word);
        }
    }

    #[test]
    fn metadata_is_classified_by_type() {
        let mut meta = Meta::new(zid(1));
        meta.set("title", "A [[link|https://example.org]]");
        meta.set("tags", "#rust #zettel");
        meta.set("precursor", &zid(2).to_string());
        meta.set("my-zid", &zid(3).to_string());
        meta.set("superior", &zid(9).to_string());
        meta.set("url", "https://zettelstore.de");
        meta.set("role", "--");
        meta.set("back", &zid(4).to_string());

        let mut zidx = ZettelIndex::new(meta.clone());
        let mut collector = Collector::default();
        let exists = |zid: Zid| zid.as_u64() % 10 != 9;
        collect_from_meta(&meta, &MarkupParser, &exists, &mut zidx, &mut collector);

        assert!(zidx.inverse_refs()["folge"].contains(zid(2)));
        assert!(zidx.back_refs().contains(zid(3)));
        assert!(zidx.dead_refs().contains(zid(9)));
        assert!(!zidx.back_refs().contains(zid(4)));
        assert!(collector.urls.contains("https://zettelstore.de"));
        assert!(collector.urls.contains("https://example.org"));
        assert!(collector.words.contains("rust"));
        assert!(collector.words.contains("--"));
    }
}
