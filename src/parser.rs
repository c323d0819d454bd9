use std::error::Error;
use std::fmt;

use crate::ast::{Document, Node};
use crate::content::Zettel;
use crate::id::Zid;
use crate::meta::keys;
use crate::reference::Reference;

pub const DEFAULT_SYNTAX: &str = "zmk";

pub trait ContentParser: Send + Sync {
    fn parse_zettel(&self, zettel: &Zettel) -> Result<Document, ParseError>;

    fn parse_inlines(&self, text: &str) -> Vec<Node>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    BinaryContent { zid: Zid, syntax: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::BinaryContent { zid, syntax } => write!(
                f,
                "zettel {} has binary content but textual syntax '{}'",
                zid, syntax
            ),
        }
    }
}

impl Error for ParseError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyntaxKind {
    Markup,
    Plain,
    Verbatim,
    Ignored,
}

fn syntax_kind(syntax: &str) -> SyntaxKind {
    match syntax {
        "zmk" | "md" | "markdown" => SyntaxKind::Markup,
        "txt" | "text" | "plain" => SyntaxKind::Plain,
        "none" | "gif" | "jpeg" | "jpg" | "png" | "webp" => SyntaxKind::Ignored,
        _ => SyntaxKind::Verbatim,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkupParser;

impl ContentParser for MarkupParser {
    fn parse_zettel(&self, zettel: &Zettel) -> Result<Document, ParseError> {
        let syntax = zettel.meta.get_default(keys::KEY_SYNTAX, DEFAULT_SYNTAX);
        let kind = syntax_kind(syntax);
        let text = match zettel.content.as_text() {
            Some(text) => text,
            None if kind == SyntaxKind::Ignored || kind == SyntaxKind::Verbatim => {
                return Ok(Document::default())
            }
            None => {
                return Err(ParseError::BinaryContent {
                    zid: zettel.meta.zid,
                    syntax: syntax.to_string(),
                })
            }
        };
        let blocks = match kind {
            SyntaxKind::Markup => parse_blocks(text),
            SyntaxKind::Plain => parse_plain(text),
            SyntaxKind::Verbatim if !text.is_empty() => {
                vec![Node::VerbatimBlock(text.to_string())]
            }
            SyntaxKind::Verbatim | SyntaxKind::Ignored => Vec::new(),
        };
        Ok(Document { blocks })
    }

    fn parse_inlines(&self, text: &str) -> Vec<Node> {
        parse_inlines(text)
    }
}

fn parse_plain(text: &str) -> Vec<Node> {
    paragraphs(text)
        .into_iter()
        .map(|para| {
            let mut inlines = Vec::new();
            for (pos, word) in para.split_whitespace().enumerate() {
                if pos > 0 {
                    inlines.push(Node::Space);
                }
                inlines.push(Node::Text(word.to_string()));
            }
            Node::Paragraph(inlines)
        })
        .collect()
}

fn paragraphs(text: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                result.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        result.push(current.join("\n"));
    }
    result
}

fn parse_blocks(text: &str) -> Vec<Node> {
    let mut blocks = Vec::new();
    let mut para: Vec<&str> = Vec::new();
    let mut items: Vec<Vec<Node>> = Vec::new();
    let mut lines = text.lines();

    while let Some(line) = lines.next() {
        let trimmed = line.trim();
        let is_item = line.starts_with("* ") || line.starts_with("# ");
        if !is_item && !items.is_empty() {
            blocks.push(Node::List(std::mem::take(&mut items)));
        }
        if trimmed.is_empty() {
            flush_paragraph(&mut blocks, &mut para);
            continue;
        }
        if let Some(fence) = fence_of(trimmed) {
            flush_paragraph(&mut blocks, &mut para);
            let mut body = Vec::new();
            for inner in lines.by_ref() {
                if inner.trim_start().starts_with(fence) {
                    break;
                }
                body.push(inner);
            }
            blocks.push(Node::VerbatimBlock(body.join("\n")));
            continue;
        }
        if let Some(inner) = trimmed
            .strip_prefix("{{{")
            .and_then(|rest| rest.strip_suffix("}}}"))
        {
            flush_paragraph(&mut blocks, &mut para);
            blocks.push(Node::Transclude(Reference::parse(inner.trim())));
            continue;
        }
        if let Some((level, title)) = heading_of(line) {
            flush_paragraph(&mut blocks, &mut para);
            blocks.push(Node::Heading {
                level,
                inlines: parse_inlines(title),
            });
            continue;
        }
        if is_item {
            flush_paragraph(&mut blocks, &mut para);
            items.push(parse_inlines(line[2..].trim()));
            continue;
        }
        para.push(line);
    }
    if !items.is_empty() {
        blocks.push(Node::List(items));
    }
    flush_paragraph(&mut blocks, &mut para);
    blocks
}

fn flush_paragraph(blocks: &mut Vec<Node>, para: &mut Vec<&str>) {
    if para.is_empty() {
        return;
    }
    blocks.push(Node::Paragraph(parse_inlines(&para.join("\n"))));
    para.clear();
}

fn fence_of(line: &str) -> Option<&'static str> {
    ["```", "~~~"]
        .into_iter()
        .find(|fence| line.starts_with(fence))
}

fn heading_of(line: &str) -> Option<(u8, &str)> {
    let level = line.bytes().take_while(|b| *b == b'=').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((level.min(6) as u8, rest.trim()))
}

pub fn parse_inlines(text: &str) -> Vec<Node> {
    let mut nodes = Vec::new();
    let mut rest = text;
    while let Some(ch) = rest.chars().next() {
        if let Some((node, len)) = special_inline(rest) {
            nodes.push(node);
            rest = &rest[len..];
            continue;
        }
        if ch == '\n' {
            nodes.push(Node::Break);
            rest = &rest[1..];
            continue;
        }
        if ch.is_whitespace() {
            let end = rest
                .find(|c: char| !c.is_whitespace() || c == '\n')
                .unwrap_or(rest.len());
            nodes.push(Node::Space);
            rest = &rest[end..];
            continue;
        }
        let end = text_end(rest);
        nodes.push(Node::Text(rest[..end].to_string()));
        rest = &rest[end..];
    }
    nodes
}

fn starts_special(s: &str) -> bool {
    s.starts_with("[[") || s.starts_with("{{") || s.starts_with("[@") || s.starts_with('`')
}

fn text_end(s: &str) -> usize {
    for (pos, ch) in s.char_indices().skip(1) {
        if ch.is_whitespace() || starts_special(&s[pos..]) {
            return pos;
        }
    }
    s.len()
}

fn special_inline(s: &str) -> Option<(Node, usize)> {
    if let Some(body) = s.strip_prefix("[[") {
        let close = body.find("]]")?;
        let (inlines, reference) = split_target(&body[..close]);
        return Some((Node::Link { reference, inlines }, close + 4));
    }
    if let Some(body) = s.strip_prefix("{{") {
        let close = body.find("}}")?;
        let (inlines, reference) = split_target(&body[..close]);
        return Some((Node::Embed { reference, inlines }, close + 4));
    }
    if let Some(body) = s.strip_prefix("[@") {
        let close = body.find(']')?;
        let inner = body[..close].trim();
        let (key, text) = inner
            .split_once(|c: char| c.is_whitespace() || c == ',')
            .unwrap_or((inner, ""));
        let node = Node::Cite {
            key: key.to_string(),
            inlines: parse_inlines(text.trim()),
        };
        return Some((node, close + 3));
    }
    if let Some(body) = s.strip_prefix('`') {
        let close = body.find('`')?;
        return Some((Node::Literal(body[..close].to_string()), close + 2));
    }
    None
}

fn split_target(inner: &str) -> (Vec<Node>, Reference) {
    match inner.rsplit_once('|') {
        Some((text, target)) => (parse_inlines(text.trim()), Reference::parse(target.trim())),
        None => (Vec::new(), Reference::parse(inner.trim())),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
