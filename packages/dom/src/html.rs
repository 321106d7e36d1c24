//! Forgiving HTML parser and serializer.
//!
//! The parser never fails. It keeps whatever structure the markup states,
//! closes `p` and `li` implicitly, treats `script`/`style`/`textarea`/`title`
//! content as raw text and ignores unmatched end tags. No implied
//! `html`/`head`/`body` elements are synthesized.

use crate::dom::{Document, NodeData, NodeId};

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

/// Block elements whose start tag closes an open `p`
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "footer", "form", "h1",
    "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre", "section",
    "table", "ul",
];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

fn is_raw_text(tag: &str) -> bool {
    RAW_TEXT_ELEMENTS.contains(&tag)
}

pub fn parse_document(source: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    TreeBuilder::new(&mut doc, root).run(source);
    doc
}

/// Parse `source` into detached nodes owned by `doc`, in source order.
pub fn parse_fragment(doc: &mut Document, source: &str) -> Vec<NodeId> {
    let container = doc.create_element("template");
    TreeBuilder::new(doc, container).run(source);
    let nodes = doc.children(container).to_vec();
    doc.remove_children(container);
    nodes
}

/// Replace the children of `id` with the parsed `source`
pub fn set_inner_html(doc: &mut Document, id: NodeId, source: &str) {
    if doc.tag(id).is_some_and(is_raw_text) {
        doc.set_text_content(id, source);
        return;
    }
    let nodes = parse_fragment(doc, source);
    doc.remove_children(id);
    doc.insert_all_before(id, &nodes, None);
}

struct TreeBuilder<'d> {
    doc: &'d mut Document,
    stack: Vec<NodeId>,
}

impl<'d> TreeBuilder<'d> {
    fn new(doc: &'d mut Document, container: NodeId) -> Self {
        Self {
            doc,
            stack: vec![container],
        }
    }

    fn current(&self) -> NodeId {
        self.stack[self.stack.len() - 1]
    }

    fn open_tag(&self, index: usize) -> Option<&str> {
        self.stack.get(index).and_then(|id| self.doc.tag(*id))
    }

    fn run(mut self, source: &str) {
        let bytes = source.as_bytes();
        let mut pos = 0;
        let mut text_start = 0;

        while pos < bytes.len() {
            if bytes[pos] != b'<' {
                pos += 1;
                continue;
            }

            let rest = &source[pos..];
            let consumed = if rest.starts_with("<!--") {
                self.flush_text(&source[text_start..pos]);
                let end = rest[4..].find("-->").map(|i| i + 4);
                let body = end.map_or(&rest[4..], |e| &rest[4..e]);
                let node = self.doc.create_comment(body);
                self.append(node);
                end.map_or(rest.len(), |e| e + 3)
            } else if rest.starts_with("<!") || rest.starts_with("<?") {
                self.flush_text(&source[text_start..pos]);
                let end = rest.find('>').unwrap_or(rest.len());
                let body = &rest[2..end];
                let node = if body.get(..7).is_some_and(|p| p.eq_ignore_ascii_case("doctype")) {
                    self.doc.create_doctype(body)
                } else {
                    self.doc.create_comment(body)
                };
                self.append(node);
                (end + 1).min(rest.len())
            } else if rest.starts_with("</") && rest[2..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.flush_text(&source[text_start..pos]);
                let end = rest.find('>').unwrap_or(rest.len());
                let name = tag_name(&rest[2..end]);
                self.close(&name);
                (end + 1).min(rest.len())
            } else if rest[1..].starts_with(|c: char| c.is_ascii_alphabetic()) {
                self.flush_text(&source[text_start..pos]);
                self.start_tag(rest)
            } else {
                pos += 1;
                continue;
            };

            pos += consumed;
            text_start = pos;
        }

        self.flush_text(&source[text_start..]);
    }

    fn append(&mut self, node: NodeId) {
        let parent = self.current();
        self.doc.append_child(parent, node);
    }

    fn flush_text(&mut self, raw: &str) {
        if raw.is_empty() {
            return;
        }
        let node = self.doc.create_text(decode_entities(raw));
        self.append(node);
    }

    /// Parse a start tag at the head of `rest`; returns bytes consumed
    fn start_tag(&mut self, rest: &str) -> usize {
        let scan = TagScanner::new(rest);
        let StartTag {
            name,
            attrs,
            self_closing,
            consumed,
        } = scan.scan();

        self.close_implied(&name);

        let node = self.doc.create_element(&name);
        for (attr, value) in attrs {
            if self.doc.attr(node, &attr).is_none() {
                self.doc.set_attr(node, &attr, &value);
            }
        }
        self.append(node);

        if is_raw_text(&name) {
            let body = &rest[consumed..];
            let (content, after) = find_raw_end(body, &name);
            if !content.is_empty() {
                let text = if name == "script" || name == "style" {
                    content.to_string()
                } else {
                    decode_entities(content)
                };
                let text_node = self.doc.create_text(text);
                self.doc.append_child(node, text_node);
            }
            return consumed + after;
        }

        if !self_closing && !is_void(&name) {
            self.stack.push(node);
        }
        consumed
    }

    fn close_implied(&mut self, tag: &str) {
        if CLOSES_P.contains(&tag) && self.open_tag(self.stack.len() - 1) == Some("p") {
            self.stack.pop();
        }
        if tag == "li" {
            self.close_within("li", &["ul", "ol"]);
        }
        if tag == "dt" || tag == "dd" {
            self.close_within("dt", &["dl"]);
            self.close_within("dd", &["dl"]);
        }
        if tag == "tr" {
            self.close_within("tr", &["table", "tbody", "thead", "tfoot"]);
        }
        if tag == "td" || tag == "th" {
            self.close_within("td", &["tr", "table"]);
            self.close_within("th", &["tr", "table"]);
        }
    }

    /// Close the nearest open `tag` unless a `boundary` element is nearer
    fn close_within(&mut self, tag: &str, boundary: &[&str]) {
        for index in (1..self.stack.len()).rev() {
            let Some(open) = self.open_tag(index) else {
                continue;
            };
            if open == tag {
                self.stack.truncate(index);
                return;
            }
            if boundary.contains(&open) {
                return;
            }
        }
    }

    fn close(&mut self, name: &str) {
        if let Some(index) = (1..self.stack.len())
            .rev()
            .find(|i| self.open_tag(*i) == Some(name))
        {
            self.stack.truncate(index);
        }
    }
}

struct StartTag {
    name: String,
    attrs: Vec<(String, String)>,
    self_closing: bool,
    consumed: usize,
}

struct TagScanner<'s> {
    src: &'s str,
    pos: usize,
}

impl<'s> TagScanner<'s> {
    fn new(src: &'s str) -> Self {
        Self { src, pos: 1 }
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn take_while<F: Fn(char) -> bool>(&mut self, f: F) -> &'s str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !f(c) {
                break;
            }
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    fn skip_whitespace(&mut self) {
        self.take_while(char::is_whitespace);
    }

    fn scan(mut self) -> StartTag {
        let name = self
            .take_while(|c| !c.is_whitespace() && c != '>' && c != '/')
            .to_ascii_lowercase();
        let mut attrs = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            match self.peek() {
                None => break,
                Some('>') => {
                    self.bump();
                    break;
                }
                Some('/') => {
                    self.bump();
                    if self.peek() == Some('>') {
                        self_closing = true;
                    }
                }
                Some(_) => {
                    let attr = self
                        .take_while(|c| !c.is_whitespace() && c != '=' && c != '>' && c != '/')
                        .to_ascii_lowercase();
                    if attr.is_empty() {
                        self.bump();
                        continue;
                    }
                    self.skip_whitespace();
                    let value = if self.peek() == Some('=') {
                        self.bump();
                        self.skip_whitespace();
                        self.attr_value()
                    } else {
                        String::new()
                    };
                    attrs.push((attr, value));
                }
            }
        }

        StartTag {
            name,
            attrs,
            self_closing,
            consumed: self.pos,
        }
    }

    fn attr_value(&mut self) -> String {
        match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.bump();
                let raw = self.take_while(|c| c != quote);
                self.bump();
                decode_entities(raw)
            }
            _ => decode_entities(self.take_while(|c| !c.is_whitespace() && c != '>')),
        }
    }
}

fn tag_name(raw: &str) -> String {
    raw.split(|c: char| c.is_whitespace() || c == '/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Split raw text content from its end tag; returns (content, bytes consumed)
fn find_raw_end<'s>(body: &'s str, tag: &str) -> (&'s str, usize) {
    let needle = format!("</{}", tag);
    let lower = body.to_ascii_lowercase();
    match lower.find(&needle) {
        Some(start) => {
            let close = body[start..]
                .find('>')
                .map_or(body.len(), |i| start + i + 1);
            (&body[..start], close)
        }
        None => (body, body.len()),
    }
}

pub fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        let decoded = rest
            .find(';')
            .filter(|end| *end <= 10)
            .and_then(|end| decode_entity(&rest[1..end]).map(|c| (c, end)));
        match decoded {
            Some((c, end)) => {
                out.push(c);
                rest = &rest[end + 1..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" | "#39" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let digits = name.strip_prefix('#')?;
            let code = match digits.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => digits.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
}

fn escape_attr(value: &str, out: &mut String) {
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
}

/// Serialize the whole document
pub fn serialize(doc: &Document) -> String {
    inner_html(doc, doc.root())
}

pub fn inner_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    let raw = doc.tag(id).is_some_and(|t| t == "script" || t == "style");
    for child in doc.children(id) {
        write_node(doc, *child, raw, &mut out);
    }
    out
}

pub fn outer_html(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, false, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, raw_parent: bool, out: &mut String) {
    match doc.data(id) {
        NodeData::Document => {
            for child in doc.children(id) {
                write_node(doc, *child, false, out);
            }
        }
        NodeData::Doctype(text) => {
            out.push_str("<!");
            out.push_str(text);
            out.push('>');
        }
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Text(text) if raw_parent => out.push_str(text),
        NodeData::Text(text) => escape_text(text, out),
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (name, value) in &el.attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                escape_attr(value, out);
                out.push('"');
            }
            out.push('>');
            if is_void(&el.tag) {
                return;
            }
            let raw = el.tag == "script" || el.tag == "style";
            for child in doc.children(id) {
                write_node(doc, *child, raw, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}
