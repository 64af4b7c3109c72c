//! Markup adapter: rendered fragments in, markup text out.
//!
//! Lexing uses logos in two passes: the outer lexer splits markup into tags,
//! comments and text; the attribute lexer tokenizes the inside of an open tag.
//! Parsing is lenient the way rendered server markup needs it to be: unknown
//! close tags are dropped and unclosed elements end with their parent.

use crate::error::{DomResult, MarkupError};
use crate::tree::{DocTree, NodeId};
use crate::visit::{walk_children, Visitor};
use logos::{Lexer, Logos};
use std::collections::BTreeMap;
use tracing::debug;

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track", "wbr",
];

fn lex_comment<'src>(lex: &mut Lexer<'src, MarkupToken<'src>>) -> Option<&'src str> {
    let rest = lex.remainder();
    let end = rest.find("-->")?;
    lex.bump(end + 3);
    Some(&rest[..end])
}

#[derive(Logos, Debug, Clone, PartialEq)]
enum MarkupToken<'src> {
    #[token("<!--", lex_comment)]
    Comment(&'src str),

    #[regex(r"</[a-zA-Z][a-zA-Z0-9_-]*[ \t\r\n]*>", |lex| {
        let s = lex.slice();
        s[2..s.len() - 1].trim()
    })]
    CloseTag(&'src str),

    #[regex(r#"<[a-zA-Z][a-zA-Z0-9_-]*([^<>"']|"[^"]*"|'[^']*')*>"#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    OpenTag(&'src str),

    #[regex(r"[^<]+", |lex| lex.slice())]
    Text(&'src str),
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum AttrToken<'src> {
    #[token("=")]
    Equals,

    #[token("/")]
    Slash,

    #[regex(r#""[^"]*""#, |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    Quoted(&'src str),

    #[regex(r"'[^']*'", |lex| {
        let s = lex.slice();
        &s[1..s.len() - 1]
    })]
    SingleQuoted(&'src str),

    #[regex(r#"[^ \t\r\n"'=/<>]+"#, |lex| lex.slice())]
    Word(&'src str),
}

struct OpenTag {
    name: String,
    attributes: BTreeMap<String, String>,
    self_closing: bool,
}

fn parse_open_tag(inner: &str, pos: usize) -> Result<OpenTag, MarkupError> {
    let mut tokens = Vec::new();
    for token in AttrToken::lexer(inner) {
        match token {
            Ok(token) => tokens.push(token),
            Err(()) => {
                return Err(MarkupError::MalformedTag {
                    pos,
                    message: format!("unexpected character in <{}>", inner),
                })
            }
        }
    }

    let mut iter = tokens.into_iter().peekable();
    let name = match iter.next() {
        Some(AttrToken::Word(name)) => name.to_ascii_lowercase(),
        _ => {
            return Err(MarkupError::MalformedTag {
                pos,
                message: "missing tag name".to_string(),
            })
        }
    };

    let mut attributes = BTreeMap::new();
    let mut self_closing = false;
    while let Some(token) = iter.next() {
        match token {
            AttrToken::Word(attr) => {
                self_closing = false;
                let value = if iter.peek() == Some(&AttrToken::Equals) {
                    iter.next();
                    match iter.next() {
                        Some(AttrToken::Quoted(v)) | Some(AttrToken::SingleQuoted(v)) | Some(AttrToken::Word(v)) => {
                            decode_entities(v)
                        }
                        _ => {
                            return Err(MarkupError::MalformedTag {
                                pos,
                                message: format!("attribute {:?} has no value", attr),
                            })
                        }
                    }
                } else {
                    String::new()
                };
                attributes.insert(attr.to_string(), value);
            }
            AttrToken::Slash => self_closing = true,
            other => {
                return Err(MarkupError::MalformedTag {
                    pos,
                    message: format!("unexpected {:?}", other),
                })
            }
        }
    }

    Ok(OpenTag {
        name,
        attributes,
        self_closing,
    })
}

/// Parse a markup fragment into detached nodes of `tree`, returning the
/// fragment's top-level nodes in order. Whitespace-only text between tags is
/// dropped.
pub fn parse_fragment(tree: &mut DocTree, markup: &str) -> DomResult<Vec<NodeId>> {
    let mut top_level = Vec::new();
    // open elements, innermost last
    let mut stack: Vec<(String, NodeId)> = Vec::new();
    let mut lexer = MarkupToken::lexer(markup);

    while let Some(token) = lexer.next() {
        let pos = lexer.span().start;
        let node = match token {
            Ok(MarkupToken::Comment(content)) => Some(tree.create_comment(content.trim())),
            Ok(MarkupToken::Text(text)) => {
                if text.trim().is_empty() {
                    None
                } else {
                    Some(tree.create_text(decode_entities(text)))
                }
            }
            Ok(MarkupToken::OpenTag(inner)) => {
                let open = parse_open_tag(inner, pos)?;
                let element = tree.create_element(open.name.clone());
                for (name, value) in open.attributes {
                    tree.set_attr(element, name, value)?;
                }
                attach(tree, &stack, &mut top_level, element)?;
                if !open.self_closing && !VOID_ELEMENTS.contains(&open.name.as_str()) {
                    stack.push((open.name, element));
                }
                None
            }
            Ok(MarkupToken::CloseTag(name)) => {
                let name = name.to_ascii_lowercase();
                match stack.iter().rposition(|(open, _)| *open == name) {
                    Some(index) => stack.truncate(index),
                    None => debug!(tag = %name, pos, "Dropping unmatched close tag"),
                }
                None
            }
            Err(()) => {
                let slice = lexer.slice();
                if slice.starts_with("<!--") {
                    return Err(MarkupError::UnterminatedComment { pos }.into());
                }
                Some(tree.create_text(slice))
            }
        };

        if let Some(node) = node {
            attach(tree, &stack, &mut top_level, node)?;
        }
    }

    Ok(top_level)
}

fn attach(
    tree: &mut DocTree,
    stack: &[(String, NodeId)],
    top_level: &mut Vec<NodeId>,
    node: NodeId,
) -> DomResult<()> {
    match stack.last() {
        Some((_, parent)) => tree.append_child(*parent, node),
        None => {
            top_level.push(node);
            Ok(())
        }
    }
}

impl DocTree {
    /// Build a document whose root holds the parsed fragment
    pub fn from_markup(markup: &str) -> DomResult<Self> {
        let mut tree = DocTree::new();
        let root = tree.root();
        for node in parse_fragment(&mut tree, markup)? {
            tree.append_child(root, node)?;
        }
        Ok(tree)
    }
}

struct MarkupWriter {
    out: String,
}

impl Visitor for MarkupWriter {
    fn visit_element(
        &mut self,
        tree: &DocTree,
        id: NodeId,
        tag: &str,
        attributes: &BTreeMap<String, String>,
    ) {
        self.out.push('<');
        self.out.push_str(tag);
        for (name, value) in attributes {
            self.out.push(' ');
            self.out.push_str(name);
            self.out.push_str("=\"");
            self.out.push_str(&escape(value, true));
            self.out.push('"');
        }
        self.out.push('>');
        if VOID_ELEMENTS.contains(&tag) {
            return;
        }
        walk_children(self, tree, id);
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn visit_text(&mut self, _tree: &DocTree, _id: NodeId, content: &str) {
        self.out.push_str(&escape(content, false));
    }

    fn visit_comment(&mut self, _tree: &DocTree, _id: NodeId, content: &str) {
        self.out.push_str("<!-- ");
        self.out.push_str(content);
        self.out.push_str(" -->");
    }
}

/// Serialize a node and its subtree (the document node serializes its children)
pub fn to_markup(tree: &DocTree, id: NodeId) -> String {
    let mut writer = MarkupWriter { out: String::new() };
    writer.visit_node(tree, id);
    writer.out
}

fn escape(raw: &str, attribute: bool) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if attribute => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        .replace("&nbsp;", "\u{a0}")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_nested_elements() {
        let markup = r#"
            <div data-uri="example.com/_components/article/instances/a1" class="article">
                <h1 data-editable="title">Hello &amp; welcome</h1>
                <div data-editable="content"></div>
            </div>
        "#;
        let tree = DocTree::from_markup(markup).unwrap();

        let article = tree.children(tree.root())[0];
        assert_eq!(tree.tag(article), Some("div"));
        assert_eq!(tree.attr(article, "class"), Some("article"));
        let children = tree.element_children(article);
        assert_eq!(children.len(), 2);
        assert_eq!(tree.text_content(children[0]), "Hello & welcome");
        assert_eq!(tree.attr(children[1], "data-editable"), Some("content"));
    }

    #[test]
    fn test_void_and_self_closing_elements() {
        let tree = DocTree::from_markup(r#"<p><img src="a.png"><br/>text</p>"#).unwrap();
        let p = tree.children(tree.root())[0];

        assert_eq!(tree.children(p).len(), 3);
        assert_eq!(tree.text_content(p), "text");
    }

    #[test]
    fn test_boolean_and_unquoted_attributes() {
        let tree = DocTree::from_markup("<input required type=text value='a b'>").unwrap();
        let input = tree.children(tree.root())[0];

        assert_eq!(tree.attr(input, "required"), Some(""));
        assert_eq!(tree.attr(input, "type"), Some("text"));
        assert_eq!(tree.attr(input, "value"), Some("a b"));
    }

    #[test]
    fn test_comments_are_kept() {
        let markup = "<div><!-- list-start content --><p>a</p><!-- list-end content --></div>";
        let tree = DocTree::from_markup(markup).unwrap();
        let div = tree.children(tree.root())[0];
        let children = tree.children(div);

        assert_eq!(children.len(), 3);
        assert_eq!(tree.comment(children[0]), Some("list-start content"));
        assert_eq!(tree.comment(children[2]), Some("list-end content"));
    }

    #[test]
    fn test_unterminated_comment_is_an_error() {
        assert!(DocTree::from_markup("<div><!-- oops</div>").is_err());
    }

    #[test]
    fn test_unmatched_close_tags_are_dropped() {
        let tree = DocTree::from_markup("<div><span>a</p></span></div>").unwrap();
        let div = tree.children(tree.root())[0];
        assert_eq!(to_markup(&tree, div), "<div><span>a</span></div>");
    }

    #[test]
    fn test_serialize_escapes() {
        let mut tree = DocTree::new();
        let p = tree.create_element("p");
        tree.set_attr(p, "title", "say \"hi\"").unwrap();
        tree.set_text(p, "1 < 2").unwrap();

        assert_eq!(
            to_markup(&tree, p),
            r#"<p title="say &quot;hi&quot;">1 &lt; 2</p>"#
        );
    }

    #[test]
    fn test_fragment_nodes_start_detached() {
        let mut tree = DocTree::new();
        let nodes = parse_fragment(&mut tree, "<p>a</p><p>b</p>").unwrap();

        assert_eq!(nodes.len(), 2);
        assert!(nodes.iter().all(|n| !tree.is_attached(*n)));
    }
}
