//! In-memory index over all zettel of the box manager.
//!
//! The index is never persisted; it is rebuilt from the boxes on every
//! reload.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::id::{Zid, ZidSet};
use crate::meta::Meta;

mod memstore;

pub use memstore::MemStore;

#[derive(Debug, Clone)]
pub struct ZettelIndex {
    pub zid: Zid,
    meta: Meta,
    back_refs: ZidSet,
    inverse_refs: BTreeMap<String, ZidSet>,
    dead_refs: ZidSet,
    words: BTreeSet<String>,
    urls: BTreeSet<String>,
}

impl ZettelIndex {
    pub fn new(meta: Meta) -> Self {
        Self {
            zid: meta.zid,
            meta,
            back_refs: ZidSet::new(),
            inverse_refs: BTreeMap::new(),
            dead_refs: ZidSet::new(),
            words: BTreeSet::new(),
            urls: BTreeSet::new(),
        }
    }

    pub fn add_back_ref(&mut self, zid: Zid) {
        self.back_refs.add(zid);
        self.dead_refs.remove(zid);
    }

    pub fn add_inverse_ref(&mut self, inverse_key: &str, zid: Zid) {
        self.inverse_refs
            .entry(inverse_key.to_string())
            .or_default()
            .add(zid);
        self.dead_refs.remove(zid);
    }

    pub fn add_dead_ref(&mut self, zid: Zid) {
        self.dead_refs.add(zid);
    }

    pub fn set_words(&mut self, words: BTreeSet<String>) {
        self.words = words;
    }

    pub fn set_urls(&mut self, urls: BTreeSet<String>) {
        self.urls = urls;
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    pub fn back_refs(&self) -> &ZidSet {
        &self.back_refs
    }

    pub fn inverse_refs(&self) -> &BTreeMap<String, ZidSet> {
        &self.inverse_refs
    }

    pub fn dead_refs(&self) -> &ZidSet {
        &self.dead_refs
    }

    pub fn words(&self) -> &BTreeSet<String> {
        &self.words
    }

    pub fn urls(&self) -> &BTreeSet<String> {
        &self.urls
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub zettel: usize,
    pub updates: u64,
    pub words: usize,
    pub urls: usize,
}

pub fn normalize_words(text: &str) -> Vec<String> {
    let decomposed: String = text
        .nfkd()
        .filter(|ch| !is_combining_mark(*ch))
        .flat_map(char::to_lowercase)
        .collect();
    decomposed
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::normalize_words;

    #[test]
    fn words_are_decomposed_lowercased_and_split() {
        assert_eq!(normalize_words("Café, naïve-Test 42!"), vec!["cafe", "naive", "test", "42"]);
        assert_eq!(normalize_words("ﬁne"), vec!["fine"]);
        assert!(normalize_words(" -- ").is_empty());
    }
}
