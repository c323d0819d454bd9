//! Syntax tree of parsed zettel content.

use crate::reference::Reference;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Paragraph(Vec<Node>),
    Heading { level: u8, inlines: Vec<Node> },
    List(Vec<Vec<Node>>),
    VerbatimBlock(String),
    Transclude(Reference),
    Text(String),
    Space,
    Break,
    Literal(String),
    Cite { key: String, inlines: Vec<Node> },
    Link { reference: Reference, inlines: Vec<Node> },
    Embed { reference: Reference, inlines: Vec<Node> },
}

impl Node {
    pub fn children(&self) -> Box<dyn Iterator<Item = &Node> + '_> {
        match self {
            Node::Paragraph(inlines)
            | Node::Heading { inlines, .. }
            | Node::Cite { inlines, .. }
            | Node::Link { inlines, .. }
            | Node::Embed { inlines, .. } => Box::new(inlines.iter()),
            Node::List(items) => Box::new(items.iter().flatten()),
            Node::VerbatimBlock(_)
            | Node::Transclude(_)
            | Node::Text(_)
            | Node::Space
            | Node::Break
            | Node::Literal(_) => Box::new(std::iter::empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<Node>,
}

pub trait Visitor {
    fn visit(&mut self, node: &Node) -> bool;

    fn leave(&mut self, _node: &Node) {}
}

pub fn walk<V: Visitor>(visitor: &mut V, node: &Node) {
    if visitor.visit(node) {
        for child in node.children() {
            walk(visitor, child);
        }
    }
    visitor.leave(node);
}

pub fn walk_all<V: Visitor>(visitor: &mut V, nodes: &[Node]) {
    for node in nodes {
        walk(visitor, node);
    }
}

#[cfg(test)]
mod tests {
    use super::{walk_all, Node, Visitor};
    use crate::reference::Reference;

    #[derive(Default)]
    struct Trace {
        events: Vec<String>,
        skip_links: bool,
    }

    impl Visitor for Trace {
        fn visit(&mut self, node: &Node) -> bool {
            let name = match node {
                Node::Text(text) => text.clone(),
                Node::Link { .. } => "link".to_string(),
                Node::Paragraph(_) => "para".to_string(),
                _ => "other".to_string(),
            };
            self.events.push(format!("+{}", name));
            !(self.skip_links && matches!(node, Node::Link { .. }))
        }

        fn leave(&mut self, _node: &Node) {
            self.events.push("-".to_string());
        }
    }

    fn sample() -> Vec<Node> {
        vec![Node::Paragraph(vec![
            Node::Text("a".to_string()),
            Node::Link {
                reference: Reference::parse("20240101000000"),
                inlines: vec![Node::Text("b".to_string())],
            },
        ])]
    }

    #[test]
    fn walk_visits_before_and_after_children() {
        let mut trace = Trace::default();
        walk_all(&mut trace, &sample());
        assert_eq!(trace.events, vec!["+para", "+a", "-", "+link", "+b", "-", "-", "-"]);
    }

    #[test]
    fn visitor_can_skip_children() {
        let mut trace = Trace {
            skip_links: true,
            ..Trace::default()
        };
        walk_all(&mut trace, &sample());
        assert!(!trace.events.contains(&"+b".to_string()));
    }
}
