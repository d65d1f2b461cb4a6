// src/dom/parse.rs

//! Lenient HTML parsing into a [`Document`].
//!
//! This is not a conforming HTML5 parser. It understands what learner
//! submissions and check templates contain in practice: nested elements,
//! quoted/unquoted/boolean attributes, void and self-closing tags, comments,
//! doctypes, raw-text elements (`script`, `style`, `textarea`, `title`) and the
//! common character references. Unknown or unbalanced end tags are ignored;
//! parsing never fails.

use tracing::trace;

use super::{is_void_element, Document, NodeId};

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "textarea", "title"];

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Doctype,
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag {
        name: String,
    },
    Text(String),
    RawText(String),
    Comment(String),
}

struct Tokenizer<'a> {
    src: &'a str,
    pos: usize,
    pending: Option<Token>,
}

impl<'a> Tokenizer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            pending: None,
        }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek_byte().is_some_and(|b| b.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a str {
        let start = self.pos;
        while self.peek_byte().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.src[start..self.pos]
    }

    fn next_token(&mut self) -> Option<Token> {
        if let Some(tok) = self.pending.take() {
            return Some(tok);
        }
        if self.pos >= self.src.len() {
            return None;
        }

        let rest = self.rest();
        if let Some(body) = rest.strip_prefix("<!--") {
            let (comment, consumed) = match body.find("-->") {
                Some(end) => (&body[..end], 4 + end + 3),
                None => (body, rest.len()),
            };
            self.pos += consumed;
            return Some(Token::Comment(comment.to_string()));
        }
        if rest.starts_with("<!") || rest.starts_with("<?") {
            self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
            return Some(Token::Doctype);
        }
        if rest.starts_with("</") {
            if let Some(tok) = self.end_tag() {
                return Some(tok);
            }
        } else if rest.len() > 1
            && rest.starts_with('<')
            && rest.as_bytes()[1].is_ascii_alphabetic()
        {
            return Some(self.start_tag());
        }

        Some(self.text())
    }

    fn text(&mut self) -> Token {
        let rest = self.rest();
        // A lone '<' that did not open a tag is plain text.
        let skip = usize::from(rest.starts_with('<'));
        let len = rest[skip..]
            .find('<')
            .map(|i| i + skip)
            .unwrap_or(rest.len());
        self.pos += len;
        Token::Text(rest[..len].to_string())
    }

    fn end_tag(&mut self) -> Option<Token> {
        let save = self.pos;
        self.pos += 2;
        let name = self.take_while(is_name_byte);
        if name.is_empty() {
            self.pos = save;
            return None;
        }
        let name = name.to_ascii_lowercase();
        let rest = self.rest();
        self.pos += rest.find('>').map(|i| i + 1).unwrap_or(rest.len());
        Some(Token::EndTag { name })
    }

    fn start_tag(&mut self) -> Token {
        self.pos += 1;
        let name = self.take_while(is_name_byte).to_ascii_lowercase();
        let mut attrs: Vec<(String, String)> = Vec::new();
        let mut self_closing = false;

        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if rest.is_empty() {
                break;
            }
            if rest.starts_with("/>") {
                self.pos += 2;
                self_closing = true;
                break;
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }

            let attr_name = self
                .take_while(|b| !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/'))
                .to_ascii_lowercase();
            if attr_name.is_empty() {
                // Stray '/' or '=' inside the tag.
                self.pos += 1;
                continue;
            }

            self.skip_whitespace();
            let value = if self.peek_byte() == Some(b'=') {
                self.pos += 1;
                self.skip_whitespace();
                self.attribute_value()
            } else {
                String::new()
            };

            if !attrs.iter().any(|(k, _)| *k == attr_name) {
                attrs.push((attr_name, value));
            }
        }

        if !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            let rest = self.rest();
            let needle = format!("</{name}");
            let end = rest
                .to_ascii_lowercase()
                .find(&needle)
                .unwrap_or(rest.len());
            if end > 0 {
                self.pending = Some(Token::RawText(rest[..end].to_string()));
            }
            self.pos += end;
        }

        Token::StartTag {
            name,
            attrs,
            self_closing,
        }
    }

    fn attribute_value(&mut self) -> String {
        match self.peek_byte() {
            Some(quote @ (b'"' | b'\'')) => {
                self.pos += 1;
                let rest = self.rest();
                let end = rest.find(quote as char).unwrap_or(rest.len());
                let raw = &rest[..end];
                self.pos += (end + 1).min(rest.len());
                decode_entities(raw)
            }
            _ => {
                let raw = self.take_while(|b| !b.is_ascii_whitespace() && b != b'>');
                decode_entities(raw)
            }
        }
    }
}

fn is_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b':')
}

/// Decode the character references that show up in hand-written markup.
pub fn decode_entities(input: &str) -> String {
    if !input.contains('&') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let decoded = after.find(';').filter(|&semi| semi <= 10).and_then(|semi| {
            let name = &after[..semi];
            decode_reference(name).map(|c| (c, semi + 1))
        });
        match decoded {
            Some((c, consumed)) => {
                out.push(c);
                rest = &after[consumed..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn decode_reference(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        "copy" => Some('\u{a9}'),
        "hellip" => Some('\u{2026}'),
        "mdash" => Some('\u{2014}'),
        "ndash" => Some('\u{2013}'),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse::<u32>().ok()?,
            };
            char::from_u32(code)
        }
    }
}

impl Document {
    /// Parse a full document or a fragment.
    ///
    /// The result always has `html > head` and `html > body`; fragment
    /// content ends up inside `body`, as a browser's `DOMParser` would do.
    pub fn parse(markup: &str) -> Self {
        let mut doc = Document::new();
        let root = doc.root();
        build_into(&mut doc, root, markup);
        doc.ensure_structure();
        doc
    }

    /// Parse `markup` and append the resulting nodes under `parent`.
    pub fn append_fragment(&mut self, parent: NodeId, markup: &str) {
        build_into(self, parent, markup);
    }

    fn ensure_structure(&mut self) {
        let root = self.root();

        let html = match self.document_element() {
            Some(html) => html,
            None => {
                let html = self.create_element("html");
                for child in self.children(root).to_vec() {
                    self.append_child(html, child);
                }
                self.append_child(root, html);
                html
            }
        };

        if self.body().is_none() {
            let body = self.create_element("body");
            let movable: Vec<NodeId> = self
                .children(html)
                .iter()
                .copied()
                .filter(|&c| self.tag_name(c) != Some("head"))
                .collect();
            for child in movable {
                self.append_child(body, child);
            }
            self.append_child(html, body);
        }

        if self.head().is_none() {
            let head = self.create_element("head");
            self.prepend_child(html, head);
        }
    }
}

fn build_into(doc: &mut Document, container: NodeId, markup: &str) {
    let mut stack: Vec<NodeId> = vec![container];
    let mut tokenizer = Tokenizer::new(markup);
    let at_document_root = container == doc.root();

    while let Some(token) = tokenizer.next_token() {
        let current = stack.last().copied().unwrap_or(container);
        match token {
            Token::Doctype => {}
            Token::Comment(text) => {
                let node = doc.create_comment(text);
                doc.append_child(current, node);
            }
            Token::Text(text) => {
                if at_document_root && current == container && text.trim().is_empty() {
                    continue;
                }
                let node = doc.create_text(decode_entities(&text));
                doc.append_child(current, node);
            }
            Token::RawText(text) => {
                let node = doc.create_text(text);
                doc.append_child(current, node);
            }
            Token::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                // Implied end tags for list items and options.
                if matches!(name.as_str(), "li" | "option")
                    && doc.tag_name(current) == Some(name.as_str())
                {
                    stack.pop();
                }
                let parent = stack.last().copied().unwrap_or(container);
                let void = is_void_element(&name);
                let node = doc.create_element_with(name, attrs);
                doc.append_child(parent, node);
                if !self_closing && !void {
                    stack.push(node);
                }
            }
            Token::EndTag { name } => {
                let open = stack
                    .iter()
                    .rposition(|&n| n != container && doc.tag_name(n) == Some(name.as_str()));
                match open {
                    Some(idx) => stack.truncate(idx),
                    None => trace!(tag = %name, "ignoring unmatched end tag"),
                }
            }
        }
    }
}
