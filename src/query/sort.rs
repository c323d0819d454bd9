use std::cmp::Ordering;

use super::{Compiled, Order};
use crate::meta::keys::{self, MetaType};
use crate::meta::{values, Meta};

impl Compiled {
    pub fn after_search(&self, mut metas: Vec<Meta>) -> Vec<Meta> {
        if !self.order.is_empty() {
            metas.sort_by(|a, b| compare_metas(a, b, &self.order));
        } else if self.fixed.is_none() {
            metas.sort_by(|a, b| b.zid.cmp(&a.zid));
        }
        let limit = if self.limit == 0 { usize::MAX } else { self.limit };
        metas.into_iter().skip(self.offset).take(limit).collect()
    }
}

fn compare_metas(a: &Meta, b: &Meta, order: &[Order]) -> Ordering {
    order
        .iter()
        .map(|order| compare_key(a, b, order))
        .find(|ordering| ordering.is_ne())
        .unwrap_or_else(|| b.zid.cmp(&a.zid))
}

fn compare_key(a: &Meta, b: &Meta, order: &Order) -> Ordering {
    let directed = |ordering: Ordering| {
        if order.reverse {
            ordering.reverse()
        } else {
            ordering
        }
    };
    if order.key == keys::KEY_ID {
        return directed(a.zid.cmp(&b.zid));
    }
    match (a.get(&order.key), b.get(&order.key)) {
        (Some(x), Some(y)) => directed(compare_values(keys::key_type(&order.key), x, y)),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_values(meta_type: MetaType, x: &str, y: &str) -> Ordering {
    if meta_type == MetaType::Number {
        if let (Some(x), Some(y)) = (values::number_value(x), values::number_value(y)) {
            return x.cmp(&y);
        }
    }
    x.to_lowercase().cmp(&y.to_lowercase())
}
