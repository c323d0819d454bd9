use std::collections::BTreeMap;
use std::sync::Arc;

use crate::id::Zid;

pub mod arrange;
pub mod keys;
mod parse;
pub mod values;
mod write;

pub use keys::{KeyDescriptor, KeyUsage, MetaType};
pub use parse::ParseMetaError;

const FIRST_KEYS: [&str; 4] = [
    keys::KEY_TITLE,
    keys::KEY_ROLE,
    keys::KEY_TAGS,
    keys::KEY_SYNTAX,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Meta {
    pub zid: Zid,
    pairs: BTreeMap<Arc<str>, Arc<str>>,
    yaml_sep: bool,
}

impl Meta {
    pub fn new(zid: Zid) -> Self {
        Self {
            zid,
            pairs: BTreeMap::new(),
            yaml_sep: false,
        }
    }

    pub fn yaml_sep(&self) -> bool {
        self.yaml_sep
    }

    pub fn set_yaml_sep(&mut self, yaml_sep: bool) {
        self.yaml_sep = yaml_sep;
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn byte_len(&self) -> usize {
        self.pairs
            .iter()
            .map(|(key, value)| key.len() + value.len())
            .sum()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        if key == keys::KEY_ID {
            return None;
        }
        self.pairs.get(key).map(|value| value.as_ref())
    }

    pub fn get_default<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    pub fn has(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn get_list(&self, key: &str) -> Option<Vec<&str>> {
        self.get(key).map(values::list_from_value)
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).is_some_and(values::bool_value)
    }

    pub fn get_number(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(values::number_value)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        if key == keys::KEY_ID || !keys::is_valid_key(key) {
            return;
        }
        let value = values::clean_value(value);
        self.pairs.insert(Arc::from(key), Arc::from(value));
    }

    pub fn set_non_empty(&mut self, key: &str, value: &str) {
        if value.trim().is_empty() {
            self.delete(key);
        } else {
            self.set(key, value);
        }
    }

    pub(crate) fn set_shared(&mut self, key: Arc<str>, value: Arc<str>) {
        if key.as_ref() == keys::KEY_ID || !keys::is_valid_key(&key) {
            return;
        }
        self.pairs.insert(key, value);
    }

    pub fn set_list<S: AsRef<str>>(&mut self, key: &str, list: &[S]) {
        let joined = list
            .iter()
            .map(|item| item.as_ref().trim())
            .filter(|item| !item.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        self.set_non_empty(key, &joined);
    }

    pub fn delete(&mut self, key: &str) -> Option<String> {
        self.pairs.remove(key).map(|value| value.to_string())
    }

    pub fn remove_properties(&mut self) {
        self.pairs.retain(|key, _| !keys::is_property(key));
    }

    pub fn pairs(&self) -> Vec<(&str, &str)> {
        self.ordered_pairs(|key| !keys::is_property(key))
    }

    pub fn computed_pairs(&self) -> Vec<(&str, &str)> {
        self.ordered_pairs(|_| true)
    }

    pub fn pairs_rest(&self) -> Vec<(&str, &str)> {
        self.ordered_pairs(|key| !keys::is_property(key) && !FIRST_KEYS.contains(&key))
    }

    pub(crate) fn shared_pairs(&self) -> impl Iterator<Item = (&Arc<str>, &Arc<str>)> {
        self.pairs.iter()
    }

    fn ordered_pairs(&self, accept: impl Fn(&str) -> bool) -> Vec<(&str, &str)> {
        let mut result = Vec::with_capacity(self.pairs.len());
        for key in FIRST_KEYS {
            if let Some((k, v)) = self.pairs.get_key_value(key) {
                if accept(k) {
                    result.push((k.as_ref(), v.as_ref()));
                }
            }
        }
        for (key, value) in &self.pairs {
            if FIRST_KEYS.contains(&key.as_ref()) || !accept(key) {
                continue;
            }
            result.push((key.as_ref(), value.as_ref()));
        }
        result
    }

    pub fn equal(&self, other: &Meta, allow_computed: bool) -> bool {
        if self.zid != other.zid {
            return false;
        }
        if allow_computed {
            self.computed_pairs() == other.computed_pairs()
        } else {
            self.pairs() == other.pairs()
        }
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
