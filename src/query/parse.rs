use std::mem;
use std::str::FromStr;

use super::{
    Expr, Op, Order, Query, QueryError, Term, ACTION_SEP, KW_CONTEXT, KW_LIMIT, KW_OFFSET,
    KW_OR, KW_ORDER, KW_REVERSE,
};
use crate::id::Zid;
use crate::meta::keys;

const KEYWORDS: [&str; 7] = [
    KW_CONTEXT, KW_OR, KW_ORDER, KW_REVERSE, KW_OFFSET, KW_LIMIT, ACTION_SEP,
];

impl Query {
    pub fn parse(input: &str) -> Result<Query, QueryError> {
        let mut query = Query::default();
        let mut tokens = input.split_whitespace().peekable();

        while let Some(zid) = tokens.peek().and_then(|token| Zid::parse(token).ok()) {
            query.zids.push(zid);
            tokens.next();
        }
        if !query.zids.is_empty() && tokens.peek() == Some(&KW_CONTEXT) {
            query.context = true;
            tokens.next();
        }

        let mut term = Term::default();
        while let Some(token) = tokens.next() {
            match token {
                KW_OR => {
                    if !term.exprs.is_empty() {
                        query.terms.push(mem::take(&mut term));
                    }
                }
                KW_ORDER => {
                    let mut key = tokens.next().ok_or(QueryError::MissingArgument(KW_ORDER))?;
                    let reverse = key == KW_REVERSE;
                    if reverse {
                        key = tokens.next().ok_or(QueryError::MissingArgument(KW_ORDER))?;
                    }
                    query.order.push(Order {
                        key: key.to_string(),
                        reverse,
                    });
                }
                KW_OFFSET => query.offset = number(KW_OFFSET, tokens.next())?,
                KW_LIMIT => query.limit = number(KW_LIMIT, tokens.next())?,
                ACTION_SEP => query.actions.extend(tokens.by_ref().map(str::to_string)),
                _ => term.exprs.push(parse_expr(token)),
            }
        }
        if !term.exprs.is_empty() {
            query.terms.push(term);
        }
        Ok(query)
    }
}

impl FromStr for Query {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Query::parse(s)
    }
}

fn number(keyword: &'static str, token: Option<&str>) -> Result<usize, QueryError> {
    let token = token.ok_or(QueryError::MissingArgument(keyword))?;
    token.parse().map_err(|_| QueryError::InvalidNumber {
        keyword,
        value: token.to_string(),
    })
}

fn parse_expr(token: &str) -> Expr {
    let key_len = token
        .bytes()
        .take_while(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || *b == b'-')
        .count();
    if key_len > 0 {
        let (key, rest) = token.split_at(key_len);
        let (negate, rest) = strip_negation(rest);
        let mut chars = rest.chars();
        if let Some(op) = chars.next().and_then(Op::from_char) {
            if keys::is_valid_key(key) {
                return Expr::Meta {
                    key: key.to_string(),
                    op,
                    negate,
                    value: chars.as_str().to_string(),
                };
            }
        }
    }
    parse_search(token)
}

fn parse_search(token: &str) -> Expr {
    let (negate, rest) = strip_negation(token);
    let mut chars = rest.chars();
    match chars.next().and_then(Op::from_char) {
        Some(op) if !matches!(op, Op::Less | Op::Greater | Op::Exists) => Expr::Search {
            op,
            negate,
            value: chars.as_str().to_string(),
        },
        _ => Expr::Search {
            op: Op::Contains,
            negate,
            value: rest.to_string(),
        },
    }
}

fn strip_negation(s: &str) -> (bool, &str) {
    match s.strip_prefix('!') {
        Some(rest) => (true, rest),
        None => (false, s),
    }
}

pub(super) fn is_plain_word(value: &str) -> bool {
    if value.is_empty() || KEYWORDS.contains(&value) || Zid::parse(value).is_ok() {
        return false;
    }
    matches!(
        parse_expr(value),
        Expr::Search { op: Op::Contains, negate: false, value: parsed } if parsed == value
    )
}
