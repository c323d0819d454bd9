use std::error::Error;
use std::fmt;

use super::keys::{self, MetaType};
use super::values::{self, normalize_tag};
use super::Meta;
use crate::id::Zid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseMetaError {
    NotUtf8 { zid: Zid, offset: usize },
}

impl fmt::Display for ParseMetaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseMetaError::NotUtf8 { zid, offset } => write!(
                f,
                "metadata header of zettel {} is not valid UTF-8 (byte {})",
                zid, offset
            ),
        }
    }
}

impl Error for ParseMetaError {}

impl Meta {
    pub fn parse(zid: Zid, input: &str) -> Meta {
        let (meta, _) = parse_lines(zid, input.as_bytes(), false);
        meta
    }

    pub fn parse_header(zid: Zid, data: &[u8]) -> Result<(Meta, usize), ParseMetaError> {
        let (meta, result) = parse_lines(zid, data, true);
        result.map(|content_start| (meta, content_start))
    }
}

fn parse_lines(
    zid: Zid,
    data: &[u8],
    strict_utf8: bool,
) -> (Meta, Result<usize, ParseMetaError>) {
    let mut meta = Meta::new(zid);
    let mut raw: Vec<(String, String)> = Vec::new();
    let mut pos = 0;
    let mut first_line = true;

    while pos < data.len() {
        let (line_end, next) = match data[pos..].iter().position(|b| *b == b'\n') {
            Some(offset) => (pos + offset, pos + offset + 1),
            None => (data.len(), data.len()),
        };
        let line = match std::str::from_utf8(&data[pos..line_end]) {
            Ok(line) => line,
            Err(_) if strict_utf8 => {
                return (meta, Err(ParseMetaError::NotUtf8 { zid, offset: pos }));
            }
            Err(_) => {
                pos = next;
                continue;
            }
        };
        let line = line.strip_suffix('\r').unwrap_or(line);
        pos = next;

        if first_line {
            first_line = false;
            if is_fence(line) {
                meta.yaml_sep = true;
                continue;
            }
        }
        if meta.yaml_sep && is_fence(line) {
            break;
        }
        if line.trim().is_empty() {
            if meta.yaml_sep {
                continue;
            }
            break;
        }
        if line.starts_with('%') {
            continue;
        }
        if line.starts_with([' ', '\t']) {
            if let Some((_, value)) = raw.last_mut() {
                let extra = line.trim();
                if !extra.is_empty() {
                    if !value.is_empty() {
                        value.push(' ');
                    }
                    value.push_str(extra);
                }
            }
            continue;
        }
        if let Some(pair) = split_key_value(line) {
            raw.push(pair);
        }
    }

    for (key, value) in raw {
        add_to_meta(&mut meta, &key, &value);
    }
    (meta, Ok(pos))
}

fn is_fence(line: &str) -> bool {
    let line = line.trim_end();
    line.len() >= 3 && line.bytes().all(|b| b == b'-')
}

fn split_key_value(line: &str) -> Option<(String, String)> {
    let key_len = line
        .bytes()
        .take_while(|b| b.is_ascii_alphanumeric() || *b == b'-')
        .count();
    if key_len == 0 {
        return None;
    }
    let key = line[..key_len].to_ascii_lowercase();
    if !keys::is_valid_key(&key) {
        return None;
    }
    let rest = line[key_len..].trim_start();
    let value = rest.strip_prefix(':').unwrap_or(rest).trim();
    Some((key, value.to_string()))
}

fn add_to_meta(meta: &mut Meta, key: &str, value: &str) {
    if key == keys::KEY_ID {
        return;
    }
    match keys::key_type(key) {
        MetaType::TagSet => {
            add_set(meta, key, value.split_whitespace().filter_map(normalize_tag));
        }
        MetaType::WordSet => {
            add_set(
                meta,
                key,
                value.split_whitespace().map(|word| word.to_lowercase()),
            );
        }
        MetaType::IdSet => add_set(
            meta,
            key,
            value
                .split_whitespace()
                .filter(|word| Zid::parse(word).is_ok())
                .map(str::to_string),
        ),
        MetaType::Id => {
            if Zid::parse(value).is_ok() {
                meta.set(key, value);
            }
        }
        MetaType::Word => meta.set_non_empty(key, &value.to_lowercase()),
        MetaType::Timestamp => {
            if values::timestamp_value(value).is_some() {
                meta.set(key, value);
            }
        }
        MetaType::Number => {
            if values::number_value(value).is_some() {
                meta.set(key, value);
            }
        }
        _ => match meta.get(key) {
            Some(old) if !old.is_empty() && !value.is_empty() => {
                let joined = format!("{} {}", old, value);
                meta.set(key, &joined);
            }
            Some(old) if !old.is_empty() => {}
            _ => meta.set(key, value),
        },
    }
}

fn add_set(meta: &mut Meta, key: &str, items: impl Iterator<Item = String>) {
    let mut list: Vec<String> = meta
        .get_list(key)
        .unwrap_or_default()
        .into_iter()
        .map(str::to_string)
        .collect();
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
    if !list.is_empty() {
        meta.set_list(key, &list);
    }
}
