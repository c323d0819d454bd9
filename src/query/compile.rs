use super::select::MetaMatcher;
use super::{Expr, Op, Order, Query, Searcher, Term};
use crate::id::{Digraph, Zid, ZidSet};
use crate::meta::Meta;
use crate::store::normalize_words;

#[derive(Debug)]
pub struct Compiled {
    pub(super) fixed: Option<Vec<Zid>>,
    pub(super) terms: Vec<CompiledTerm>,
    pub(super) order: Vec<Order>,
    pub(super) offset: usize,
    pub(super) limit: usize,
}

#[derive(Debug, Default)]
pub struct CompiledTerm {
    include: Option<ZidSet>,
    exclude: ZidSet,
    matchers: Vec<MetaMatcher>,
}

impl CompiledTerm {
    pub fn retrieve(&self, zid: Zid) -> bool {
        self.include.as_ref().map_or(true, |include| include.contains(zid))
            && !self.exclude.contains(zid)
    }

    pub fn matches(&self, meta: &Meta) -> bool {
        self.retrieve(meta.zid) && self.matchers.iter().all(|matcher| matcher.matches(meta))
    }
}

impl Compiled {
    pub fn fixed_zids(&self) -> Option<&[Zid]> {
        self.fixed.as_deref()
    }

    pub fn terms(&self) -> &[CompiledTerm] {
        &self.terms
    }

    pub fn matches(&self, meta: &Meta) -> bool {
        self.terms.iter().any(|term| term.matches(meta))
    }
}

pub(super) fn compile(query: &Query, searcher: &dyn Searcher) -> Compiled {
    let fixed = if query.zids.is_empty() {
        None
    } else if query.context {
        Some(context_zids(&query.zids, &searcher.neighbours()))
    } else {
        let mut seen = ZidSet::new();
        Some(query.zids.iter().copied().filter(|zid| seen.add(*zid)).collect())
    };
    let mut terms: Vec<CompiledTerm> = query
        .terms
        .iter()
        .map(|term| compile_term(term, searcher))
        .collect();
    if terms.is_empty() {
        terms.push(CompiledTerm::default());
    }
    Compiled {
        fixed,
        terms,
        order: query.order.clone(),
        offset: query.offset,
        limit: query.limit,
    }
}

fn compile_term(term: &Term, searcher: &dyn Searcher) -> CompiledTerm {
    let mut compiled = CompiledTerm::default();
    for expr in &term.exprs {
        match expr {
            Expr::Meta {
                key,
                op,
                negate,
                value,
            } => compiled
                .matchers
                .push(MetaMatcher::new(key, *op, *negate, value)),
            Expr::Search { op, negate, value } => {
                let found = search(searcher, *op, value);
                if *negate {
                    compiled.exclude.union_with(&found);
                } else if let Some(include) = compiled.include.as_mut() {
                    include.intersect_with(&found);
                } else {
                    compiled.include = Some(found);
                }
            }
        }
    }
    compiled
}

fn search(searcher: &dyn Searcher, op: Op, value: &str) -> ZidSet {
    let mut words = normalize_words(value);
    if words.is_empty() {
        words.push(value.to_lowercase());
    }
    let mut result: Option<ZidSet> = None;
    for word in words {
        let found = match op {
            Op::Has | Op::Equal => searcher.search_equal(&word),
            Op::Prefix => searcher.search_prefix(&word),
            Op::Suffix => searcher.search_suffix(&word),
            Op::Contains | Op::Less | Op::Greater | Op::Exists => searcher.search_contains(&word),
        };
        match result.as_mut() {
            Some(result) => result.intersect_with(&found),
            None => result = Some(found),
        }
    }
    result.unwrap_or_default()
}

fn context_zids(starts: &[Zid], graph: &Digraph) -> Vec<Zid> {
    let mut seen = ZidSet::new();
    let mut level: Vec<Zid> = starts.iter().copied().filter(|zid| seen.add(*zid)).collect();
    let mut result = Vec::new();
    while !level.is_empty() {
        result.extend(level.iter().copied());
        let mut next = ZidSet::new();
        for zid in &level {
            next.extend(graph.successors(*zid).iter().filter(|n| !seen.contains(*n)));
        }
        seen.union_with(&next);
        level = next.iter().collect();
    }
    result
}
