use std::borrow::Cow;
use std::cmp::Ordering;

use super::Op;
use crate::meta::keys::{self, MetaType};
use crate::meta::{values, Meta};

#[derive(Debug)]
pub(super) struct MetaMatcher {
    key: String,
    op: Op,
    negate: bool,
    value: String,
    meta_type: MetaType,
}

impl MetaMatcher {
    pub(super) fn new(key: &str, op: Op, negate: bool, value: &str) -> Self {
        let meta_type = keys::key_type(key);
        Self {
            key: key.to_string(),
            op,
            negate,
            value: normalize(meta_type, value),
            meta_type,
        }
    }

    pub(super) fn matches(&self, meta: &Meta) -> bool {
        let value = if self.key == keys::KEY_ID {
            Some(Cow::Owned(meta.zid.to_string()))
        } else {
            meta.get(&self.key).map(Cow::Borrowed)
        };
        let found = match (self.op, value) {
            (Op::Exists, value) => value.is_some(),
            (_, None) => false,
            (Op::Has, Some(_)) if self.value.is_empty() => true,
            (_, Some(value)) if self.meta_type.is_set() => values::list_from_value(&value)
                .into_iter()
                .any(|item| self.compare(&normalize(self.meta_type, item))),
            (_, Some(value)) => self.compare(&value.to_lowercase()),
        };
        found != self.negate
    }

    fn compare(&self, actual: &str) -> bool {
        let expected = self.value.as_str();
        match self.op {
            Op::Has => match self.meta_type {
                MetaType::Id | MetaType::Timestamp | MetaType::Number => {
                    actual.starts_with(expected)
                }
                MetaType::Word | MetaType::IdSet | MetaType::TagSet | MetaType::WordSet => {
                    actual == expected
                }
                _ => actual.contains(expected),
            },
            Op::Equal => actual == expected,
            Op::Prefix => actual.starts_with(expected),
            Op::Suffix => actual.ends_with(expected),
            Op::Contains => actual.contains(expected),
            Op::Less => self.order(actual) == Ordering::Less,
            Op::Greater => self.order(actual) == Ordering::Greater,
            Op::Exists => true,
        }
    }

    fn order(&self, actual: &str) -> Ordering {
        let expected = self.value.as_str();
        match self.meta_type {
            MetaType::Number => match (values::number_value(actual), values::number_value(expected)) {
                (Some(actual), Some(expected)) => actual.cmp(&expected),
                _ => actual.cmp(expected),
            },
            // "created<2024" compares the year only.
            MetaType::Id | MetaType::IdSet | MetaType::Timestamp => {
                actual.get(..expected.len()).unwrap_or(actual).cmp(expected)
            }
            _ => actual.cmp(expected),
        }
    }
}

fn normalize(meta_type: MetaType, value: &str) -> String {
    match meta_type {
        MetaType::TagSet => values::normalize_tag(value).unwrap_or_else(|| value.to_lowercase()),
        _ => value.to_lowercase(),
    }
}
