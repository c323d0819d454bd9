//! Queries over zettel metadata and the full-text index.
//!
//! ```text
//! 20240101000000 CONTEXT title~note OR tags:#rust ORDER REVERSE modified LIMIT 10 | tags
//! ```

use std::error::Error;
use std::fmt;

use crate::id::{Digraph, Zid, ZidSet};
use crate::store::MemStore;

mod compile;
mod parse;
mod select;
mod sort;

pub use compile::{Compiled, CompiledTerm};

pub(crate) const KW_CONTEXT: &str = "CONTEXT";
pub(crate) const KW_OR: &str = "OR";
pub(crate) const KW_ORDER: &str = "ORDER";
pub(crate) const KW_REVERSE: &str = "REVERSE";
pub(crate) const KW_OFFSET: &str = "OFFSET";
pub(crate) const KW_LIMIT: &str = "LIMIT";
pub(crate) const ACTION_SEP: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Has,
    Equal,
    Prefix,
    Suffix,
    Contains,
    Less,
    Greater,
    Exists,
}

impl Op {
    pub fn from_char(ch: char) -> Option<Op> {
        match ch {
            ':' => Some(Op::Has),
            '=' => Some(Op::Equal),
            '[' => Some(Op::Prefix),
            ']' => Some(Op::Suffix),
            '~' => Some(Op::Contains),
            '<' => Some(Op::Less),
            '>' => Some(Op::Greater),
            '?' => Some(Op::Exists),
            _ => None,
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Op::Has => ':',
            Op::Equal => '=',
            Op::Prefix => '[',
            Op::Suffix => ']',
            Op::Contains => '~',
            Op::Less => '<',
            Op::Greater => '>',
            Op::Exists => '?',
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Meta {
        key: String,
        op: Op,
        negate: bool,
        value: String,
    },
    Search { op: Op, negate: bool, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Term {
    pub exprs: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub key: String,
    pub reverse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Query {
    pub zids: Vec<Zid>,
    pub context: bool,
    pub terms: Vec<Term>,
    pub order: Vec<Order>,
    pub offset: usize,
    pub limit: usize,
    pub actions: Vec<String>,
}

impl Query {
    pub fn is_empty(&self) -> bool {
        *self == Query::default()
    }

    pub fn compile(&self, searcher: &dyn Searcher) -> Compiled {
        compile::compile(self, searcher)
    }
}

pub trait Searcher {
    fn search_equal(&self, word: &str) -> ZidSet;
    fn search_prefix(&self, prefix: &str) -> ZidSet;
    fn search_suffix(&self, suffix: &str) -> ZidSet;
    fn search_contains(&self, part: &str) -> ZidSet;
    fn neighbours(&self) -> Digraph;
}

impl Searcher for MemStore {
    fn search_equal(&self, word: &str) -> ZidSet {
        MemStore::search_equal(self, word)
    }

    fn search_prefix(&self, prefix: &str) -> ZidSet {
        MemStore::search_prefix(self, prefix)
    }

    fn search_suffix(&self, suffix: &str) -> ZidSet {
        MemStore::search_suffix(self, suffix)
    }

    fn search_contains(&self, part: &str) -> ZidSet {
        MemStore::search_contains(self, part)
    }

    fn neighbours(&self) -> Digraph {
        self.neighbour_graph()
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bang = |negate: bool| if negate { "!" } else { "" };
        match self {
            Expr::Meta {
                key,
                op,
                negate,
                value,
            } => write!(f, "{}{}{}{}", key, bang(*negate), op.as_char(), value),
            Expr::Search {
                op: Op::Contains,
                negate: false,
                value,
            } if parse::is_plain_word(value) => f.write_str(value),
            Expr::Search { op, negate, value } => {
                write!(f, "{}{}{}", bang(*negate), op.as_char(), value)
            }
        }
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = self.zids.iter().map(Zid::to_string).collect();
        if self.context {
            parts.push(KW_CONTEXT.to_string());
        }
        for (pos, term) in self.terms.iter().enumerate() {
            if pos > 0 {
                parts.push(KW_OR.to_string());
            }
            parts.extend(term.exprs.iter().map(Expr::to_string));
        }
        for order in &self.order {
            parts.push(KW_ORDER.to_string());
            if order.reverse {
                parts.push(KW_REVERSE.to_string());
            }
            parts.push(order.key.clone());
        }
        if self.offset > 0 {
            parts.push(format!("{} {}", KW_OFFSET, self.offset));
        }
        if self.limit > 0 {
            parts.push(format!("{} {}", KW_LIMIT, self.limit));
        }
        if !self.actions.is_empty() {
            parts.push(ACTION_SEP.to_string());
            parts.extend(self.actions.iter().cloned());
        }
        f.write_str(&parts.join(" "))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    InvalidNumber { keyword: &'static str, value: String },
    MissingArgument(&'static str),
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryError::InvalidNumber { keyword, value } => {
                write!(f, "{} needs a number, got '{}'", keyword, value)
            }
            QueryError::MissingArgument(keyword) => write!(f, "{} needs an argument", keyword),
        }
    }
}

impl Error for QueryError {}

#[cfg(test)]
#[path = "query_tests.rs"]
mod tests;
