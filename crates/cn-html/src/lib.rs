//! HTML tokenization and tag-node tree construction.
//!
//! The engine works against this navigable tag-node structure: every parsed
//! fragment is wrapped in a synthetic `document` node, and `first_element`
//! hands back the real root. Serialization via [`TagNode::to_html`] is stable
//! under re-parsing, which the text-run segmenter relies on.

use std::collections::BTreeMap;

/// Name of the synthetic wrapper node returned by [`parse_fragment`].
pub const FRAGMENT_ROOT: &str = "document";

/// One node of the parsed markup tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkupNode {
    Tag(TagNode),
    Text(String),
}

/// A parsed markup element prior to engine-level wrapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagNode {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub children: Vec<MarkupNode>,
}

impl TagNode {
    fn wrapper() -> Self {
        Self {
            name: FRAGMENT_ROOT.to_owned(),
            attrs: BTreeMap::new(),
            children: Vec::new(),
        }
    }

    /// First element child in document order, the "first element" accessor.
    pub fn first_element(&self) -> Option<&TagNode> {
        self.children.iter().find_map(|child| match child {
            MarkupNode::Tag(tag) => Some(tag),
            MarkupNode::Text(_) => None,
        })
    }

    /// Concatenated descendant text in document order.
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(&self.children, &mut out);
        out
    }

    /// Serialized subtree markup.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        if self.name == FRAGMENT_ROOT {
            serialize_nodes(&self.children, &mut out);
        } else {
            serialize_tag(self, &mut out);
        }
        out
    }
}

/// Parses markup into a tree rooted at a synthetic `document` wrapper.
///
/// Tolerant by construction: stray end tags are dropped, unclosed elements
/// are closed at end of input, so re-parsing engine-generated markup cannot
/// fail.
pub fn parse_fragment(source: &str) -> TagNode {
    build_tree(Tokenizer::new(source).run())
}

fn collect_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(text),
            MarkupNode::Tag(tag) => collect_text(&tag.children, out),
        }
    }
}

fn serialize_nodes(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(text) => out.push_str(&escape_text(text)),
            MarkupNode::Tag(tag) => serialize_tag(tag, out),
        }
    }
}

fn serialize_tag(tag: &TagNode, out: &mut String) {
    out.push('<');
    out.push_str(&tag.name);
    for (name, value) in &tag.attrs {
        out.push(' ');
        out.push_str(name);
        out.push_str("=\"");
        out.push_str(&escape_attr(value));
        out.push('"');
    }
    out.push('>');

    if is_void(&tag.name) && tag.children.is_empty() {
        return;
    }

    serialize_nodes(&tag.children, out);
    out.push_str("</");
    out.push_str(&tag.name);
    out.push('>');
}

fn escape_text(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(ch),
        }
    }
    out
}

fn escape_attr(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[derive(Debug)]
enum Token {
    Start {
        name: String,
        attrs: BTreeMap<String, String>,
        self_closing: bool,
    },
    End {
        name: String,
    },
    Text(String),
}

/// Cursor over the source string. Every advance lands on a char boundary:
/// the cursor only moves by ASCII pattern lengths, `find` offsets, or whole
/// `char` widths.
struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn run(mut self) -> Vec<Token> {
        let mut tokens = Vec::new();

        while self.pos < self.src.len() {
            if self.eat("<!--") {
                self.skip_past("-->");
                continue;
            }

            if self.looking_at("</") {
                if let Some(token) = self.end_tag() {
                    tokens.push(token);
                    continue;
                }
            } else if self.looking_at("<!") || self.looking_at("<?") {
                self.pos += 2;
                self.skip_past(">");
                continue;
            } else if self.looking_at("<") {
                if let Some(token) = self.start_tag() {
                    let raw_body_of = match &token {
                        Token::Start {
                            name, self_closing, ..
                        } if !*self_closing && RAW_TEXT_TAGS.contains(&name.as_str()) => {
                            Some(name.clone())
                        }
                        _ => None,
                    };

                    tokens.push(token);
                    if let Some(name) = raw_body_of {
                        self.raw_text(&name, &mut tokens);
                    }
                    continue;
                }
            }

            let text = self.text_run();
            if !text.is_empty() {
                tokens.push(Token::Text(text));
            }
        }

        tokens
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn looking_at(&self, pat: &str) -> bool {
        self.rest().starts_with(pat)
    }

    fn eat(&mut self, pat: &str) -> bool {
        if self.looking_at(pat) {
            self.pos += pat.len();
            true
        } else {
            false
        }
    }

    /// Advances past the next occurrence of `pat`, or to end of input.
    fn skip_past(&mut self, pat: &str) {
        match self.rest().find(pat) {
            Some(offset) => self.pos += offset + pat.len(),
            None => self.pos = self.src.len(),
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    /// Consumes the longest prefix matching `pred` and returns it.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let rest = self.rest();
        let end = rest
            .char_indices()
            .find(|(_, ch)| !pred(*ch))
            .map_or(rest.len(), |(offset, _)| offset);
        self.pos += end;
        &rest[..end]
    }

    fn tag_name(&mut self) -> String {
        self.take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':'))
            .to_ascii_lowercase()
    }

    fn attr_name(&mut self) -> String {
        self.take_while(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | ':' | '.'))
            .to_ascii_lowercase()
    }

    /// A start tag, or `None` when the bracket opens no parseable tag (the
    /// caller then treats the `<` as text). The cursor is rewound on `None`.
    fn start_tag(&mut self) -> Option<Token> {
        let mark = self.pos;
        self.pos += 1;
        self.skip_whitespace();

        let name = self.tag_name();
        if name.is_empty() {
            self.pos = mark;
            return None;
        }

        let mut attrs = BTreeMap::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek() else {
                // Tag never closed before end of input.
                self.pos = mark;
                return None;
            };

            match ch {
                '>' => {
                    self.pos += 1;
                    break;
                }
                '/' => {
                    self_closing = true;
                    self.pos += 1;
                }
                _ => {
                    let attr = self.attr_name();
                    if attr.is_empty() {
                        // Unparseable char inside the tag; skip it rather
                        // than bail.
                        self.pos += ch.len_utf8();
                        continue;
                    }

                    self.skip_whitespace();
                    let value = if self.eat("=") {
                        self.skip_whitespace();
                        self.attr_value()
                    } else {
                        String::new()
                    };

                    // First declaration of an attribute wins.
                    attrs.entry(attr).or_insert(value);
                }
            }
        }

        Some(Token::Start {
            name,
            attrs,
            self_closing,
        })
    }

    fn attr_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let rest = self.rest();
                let end = rest.find(quote).unwrap_or(rest.len());
                self.pos += end;
                if self.peek() == Some(quote) {
                    self.pos += 1;
                }
                decode_entities(&rest[..end])
            }
            _ => {
                let raw = self.take_while(|ch| !ch.is_whitespace() && ch != '>');
                decode_entities(raw)
            }
        }
    }

    fn end_tag(&mut self) -> Option<Token> {
        let mark = self.pos;
        self.pos += 2;
        self.skip_whitespace();

        let name = self.tag_name();
        if name.is_empty() {
            self.pos = mark;
            return None;
        }

        // Anything between the name and the bracket is discarded.
        match self.rest().find('>') {
            Some(offset) => {
                self.pos += offset + 1;
                Some(Token::End { name })
            }
            None => {
                self.pos = mark;
                None
            }
        }
    }

    /// A bare text run up to the next `<`. Consumes a leading `<` that
    /// opened no tag so the scan always makes progress.
    fn text_run(&mut self) -> String {
        let start = self.pos;
        if self.looking_at("<") {
            self.pos += 1;
        }
        match self.rest().find('<') {
            Some(offset) => self.pos += offset,
            None => self.pos = self.src.len(),
        }
        self.src[start..self.pos].to_owned()
    }

    /// Raw-text element body: everything up to the matching end tag is one
    /// text token, brackets included. An unterminated body runs to end of
    /// input with no end token.
    fn raw_text(&mut self, name: &str, tokens: &mut Vec<Token>) {
        let body_start = self.pos;
        let mut search = self.pos;

        loop {
            let Some(offset) = self.src[search..].find("</") else {
                let body = &self.src[body_start..];
                if !body.is_empty() {
                    tokens.push(Token::Text(body.to_owned()));
                }
                self.pos = self.src.len();
                return;
            };

            let candidate = search + offset;
            let name_end = candidate + 2 + name.len();
            let name_matches = self
                .src
                .get(candidate + 2..name_end)
                .is_some_and(|slice| slice.eq_ignore_ascii_case(name));

            if name_matches {
                let close = self.src[name_end..]
                    .char_indices()
                    .find(|(_, ch)| !ch.is_whitespace());
                if let Some((bracket, '>')) = close {
                    let body = &self.src[body_start..candidate];
                    if !body.is_empty() {
                        tokens.push(Token::Text(body.to_owned()));
                    }
                    tokens.push(Token::End {
                        name: name.to_owned(),
                    });
                    self.pos = name_end + bracket + 1;
                    return;
                }
            }

            search = candidate + 2;
        }
    }
}

fn build_tree(tokens: Vec<Token>) -> TagNode {
    let mut stack = vec![TagNode::wrapper()];

    for token in tokens {
        match token {
            Token::Text(text) => {
                if let Some(cur) = stack.last_mut() {
                    cur.children.push(MarkupNode::Text(decode_entities(&text)));
                }
            }
            Token::Start {
                name,
                attrs,
                self_closing,
            } => {
                let node = TagNode {
                    name: name.clone(),
                    attrs,
                    children: Vec::new(),
                };

                if self_closing || is_void(&name) {
                    if let Some(cur) = stack.last_mut() {
                        cur.children.push(MarkupNode::Tag(node));
                    }
                } else {
                    stack.push(node);
                }
            }
            Token::End { name } => {
                if !stack.iter().skip(1).any(|open| open.name == name) {
                    // Stray end tag with no matching open element.
                    continue;
                }

                while stack.len() > 1 {
                    let Some(node) = stack.pop() else {
                        break;
                    };
                    let matched = node.name == name;
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(MarkupNode::Tag(node));
                    }
                    if matched {
                        break;
                    }
                }
            }
        }
    }

    while stack.len() > 1 {
        let Some(node) = stack.pop() else {
            break;
        };
        if let Some(parent) = stack.last_mut() {
            parent.children.push(MarkupNode::Tag(node));
        }
    }

    stack.pop().unwrap_or_else(TagNode::wrapper)
}

fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];

        let decoded = tail[1..]
            .find(';')
            .and_then(|semi| Some((decode_entity(&tail[1..1 + semi])?, semi + 2)));

        match decoded {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &tail[consumed..];
            }
            None => {
                // Not an entity; the ampersand stands for itself.
                out.push('&');
                rest = &tail[1..];
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    if let Some(code) = entity.strip_prefix('#') {
        let value = if let Some(hex) = code.strip_prefix(['x', 'X']) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            code.parse().ok()?
        };
        return char::from_u32(value);
    }

    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => None,
    }
}

const VOID_TAGS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

const RAW_TEXT_TAGS: &[&str] = &["script", "style"];

fn is_void(name: &str) -> bool {
    VOID_TAGS.contains(&name)
}
