//! HTML fragment parsing into detached arena nodes.
//!
//! A small forgiving tokenizer, not a spec-complete HTML5 parser: open,
//! close and self-closing tags, void elements, quoted and bare attribute
//! values, comments (dropped), doctype (ignored), entity decoding for text
//! and attribute values. Unclosed tags close at end of input; a stray close
//! tag is ignored.
//!
//! The sanitizing path (the default for untrusted markup) drops
//! script/style/iframe/object/embed elements with their content, strips
//! `on*` event-handler attributes, and strips `href`/`src` values using a
//! `javascript:` scheme.

use crate::arena::Document;
use crate::error::Result;
use crate::types::{is_void_element, NodeId};

/// Elements removed entirely by the sanitizer, content included.
const DISALLOWED_ELEMENTS: &[&str] = &["script", "style", "iframe", "object", "embed"];

/// Elements whose content is raw text (no nested tags).
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Parse a markup fragment into detached nodes; returns the top-level ids
/// in source order.
pub fn parse_fragment(doc: &mut Document, markup: &str, sanitize: bool) -> Result<Vec<NodeId>> {
    Parser {
        doc,
        sanitize,
        chars: markup.chars().collect(),
        pos: 0,
    }
    .run()
}

struct Parser<'a> {
    doc: &'a mut Document,
    sanitize: bool,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn run(mut self) -> Result<Vec<NodeId>> {
        let mut roots: Vec<NodeId> = Vec::new();
        // Stack of open elements; children attach to the top.
        let mut stack: Vec<NodeId> = Vec::new();

        while self.pos < self.chars.len() {
            if self.peek() == Some('<') {
                if self.lookahead("<!--") {
                    self.skip_comment();
                    continue;
                }
                if self.lookahead("<!") {
                    self.skip_until('>');
                    continue;
                }
                if self.lookahead("</") {
                    let tag = self.read_close_tag();
                    // Pop to the matching open element; ignore a stray close.
                    if let Some(idx) = stack
                        .iter()
                        .rposition(|&id| self.doc.get(id).map(|n| n.name == tag).unwrap_or(false))
                    {
                        stack.truncate(idx);
                    }
                    continue;
                }
                if let Some((tag, attrs, self_closed)) = self.read_open_tag() {
                    if self.sanitize && DISALLOWED_ELEMENTS.contains(&tag.as_str()) {
                        if !self_closed && !is_void_element(&tag) {
                            self.skip_element_content(&tag);
                        }
                        continue;
                    }

                    let element = self.doc.create_element(&tag);
                    for (name, value) in attrs {
                        if self.sanitize && !attribute_allowed(&name, &value) {
                            continue;
                        }
                        self.doc.set_attr(element, &name, &value)?;
                    }
                    self.attach(&mut roots, &stack, element)?;

                    if self_closed || is_void_element(&tag) {
                        continue;
                    }
                    if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                        let raw = self.read_raw_text(&tag);
                        if !raw.is_empty() {
                            let text = self.doc.create_text(&raw);
                            self.doc.append_child(element, text)?;
                        }
                        continue;
                    }
                    stack.push(element);
                    continue;
                }
                // A lone '<' that opens nothing: treat as text.
                self.pos += 1;
                let text = self.doc.create_text("<");
                self.attach(&mut roots, &stack, text)?;
                continue;
            }

            let raw = self.read_text();
            let decoded = decode_entities(&raw);
            if decoded.trim().is_empty() && stack.is_empty() {
                // Drop pure-whitespace text between top-level nodes.
                continue;
            }
            let text = self.doc.create_text(&decoded);
            self.attach(&mut roots, &stack, text)?;
        }

        Ok(roots)
    }

    fn attach(&mut self, roots: &mut Vec<NodeId>, stack: &[NodeId], node: NodeId) -> Result<()> {
        if let Some(&parent) = stack.last() {
            self.doc.append_child(parent, node)?;
        } else {
            roots.push(node);
        }
        Ok(())
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn lookahead(&self, s: &str) -> bool {
        s.chars()
            .enumerate()
            .all(|(i, ch)| self.chars.get(self.pos + i) == Some(&ch))
    }

    fn skip_until(&mut self, stop: char) {
        while let Some(ch) = self.peek() {
            self.pos += 1;
            if ch == stop {
                break;
            }
        }
    }

    fn skip_comment(&mut self) {
        self.pos += 4; // past "<!--"
        while self.pos < self.chars.len() {
            if self.lookahead("-->") {
                self.pos += 3;
                return;
            }
            self.pos += 1;
        }
    }

    fn read_text(&mut self) -> String {
        let start = self.pos;
        while self.pos < self.chars.len() && self.chars[self.pos] != '<' {
            self.pos += 1;
        }
        self.chars[start..self.pos].iter().collect()
    }

    fn read_close_tag(&mut self) -> String {
        self.pos += 2; // past "</"
        let mut tag = String::new();
        while let Some(ch) = self.peek() {
            if ch == '>' {
                self.pos += 1;
                break;
            }
            if !ch.is_whitespace() {
                tag.push(ch.to_ascii_lowercase());
            }
            self.pos += 1;
        }
        tag
    }

    /// Parse `<tag attr=value ...>`; None when '<' starts no real tag.
    fn read_open_tag(&mut self) -> Option<(String, Vec<(String, String)>, bool)> {
        let next = self.chars.get(self.pos + 1).copied()?;
        if !next.is_ascii_alphabetic() {
            return None;
        }
        self.pos += 1; // past '<'

        let mut tag = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '-' {
                tag.push(ch.to_ascii_lowercase());
                self.pos += 1;
            } else {
                break;
            }
        }

        let mut attrs = Vec::new();
        let mut self_closed = false;
        loop {
            while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
                self.pos += 1;
            }
            match self.peek() {
                None => break,
                Some('>') => {
                    self.pos += 1;
                    break;
                }
                Some('/') => {
                    self.pos += 1;
                    if self.peek() == Some('>') {
                        self.pos += 1;
                        self_closed = true;
                        break;
                    }
                }
                Some(_) => {
                    if let Some(attr) = self.read_attr() {
                        attrs.push(attr);
                    } else {
                        self.pos += 1;
                    }
                }
            }
        }

        Some((tag, attrs, self_closed))
    }

    fn read_attr(&mut self) -> Option<(String, String)> {
        let mut name = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() || ch == '=' || ch == '>' || ch == '/' {
                break;
            }
            name.push(ch.to_ascii_lowercase());
            self.pos += 1;
        }
        if name.is_empty() {
            return None;
        }

        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.pos += 1;
        }
        if self.peek() != Some('=') {
            // Boolean attribute.
            return Some((name, String::new()));
        }
        self.pos += 1;
        while matches!(self.peek(), Some(ch) if ch.is_whitespace()) {
            self.pos += 1;
        }

        let mut value = String::new();
        match self.peek() {
            Some(q @ ('"' | '\'')) => {
                self.pos += 1;
                while let Some(ch) = self.peek() {
                    self.pos += 1;
                    if ch == q {
                        break;
                    }
                    value.push(ch);
                }
            }
            _ => {
                while let Some(ch) = self.peek() {
                    if ch.is_whitespace() || ch == '>' {
                        break;
                    }
                    value.push(ch);
                    self.pos += 1;
                }
            }
        }

        Some((name, decode_entities(&value)))
    }

    /// Content of a raw-text element up to its close tag.
    fn read_raw_text(&mut self, tag: &str) -> String {
        let close: String = format!("</{}", tag);
        let mut out = String::new();
        while self.pos < self.chars.len() {
            if self.lookahead(&close) {
                self.skip_until('>');
                return out;
            }
            out.push(self.chars[self.pos]);
            self.pos += 1;
        }
        out
    }

    /// Skip a disallowed element and everything inside it.
    fn skip_element_content(&mut self, tag: &str) {
        if RAW_TEXT_ELEMENTS.contains(&tag) {
            let _ = self.read_raw_text(tag);
            return;
        }
        let mut depth = 1usize;
        while self.pos < self.chars.len() && depth > 0 {
            if self.lookahead("</") {
                let closed = self.read_close_tag();
                if closed == tag {
                    depth -= 1;
                }
                continue;
            }
            if self.peek() == Some('<') {
                if let Some((opened, _, self_closed)) = self.read_open_tag() {
                    if opened == tag && !self_closed {
                        depth += 1;
                    }
                    continue;
                }
            }
            self.pos += 1;
        }
    }
}

fn attribute_allowed(name: &str, value: &str) -> bool {
    if name.starts_with("on") {
        return false;
    }
    if name == "href" || name == "src" {
        let scheme: String = value
            .chars()
            .filter(|c| !c.is_whitespace() && !c.is_control())
            .collect::<String>()
            .to_ascii_lowercase();
        if scheme.starts_with("javascript:") {
            return false;
        }
    }
    true
}

/// Decode the common named references plus numeric ones.
pub fn decode_entities(src: &str) -> String {
    if !src.contains('&') {
        return src.to_string();
    }

    fn decode_named(name: &str) -> Option<char> {
        match name {
            "amp" => Some('&'),
            "lt" => Some('<'),
            "gt" => Some('>'),
            "quot" => Some('"'),
            "apos" => Some('\''),
            "nbsp" => Some('\u{00A0}'),
            "copy" => Some('©'),
            "reg" => Some('®'),
            "trade" => Some('™'),
            "hellip" => Some('…'),
            "mdash" => Some('—'),
            "ndash" => Some('–'),
            "laquo" => Some('«'),
            "raquo" => Some('»'),
            "euro" => Some('€'),
            "pound" => Some('£'),
            "yen" => Some('¥'),
            "deg" => Some('°'),
            "plusmn" => Some('±'),
            "times" => Some('×'),
            "divide" => Some('÷'),
            _ => None,
        }
    }

    fn decode_numeric(body: &str) -> Option<char> {
        let cp = if let Some(hex) = body.strip_prefix('x').or_else(|| body.strip_prefix('X')) {
            u32::from_str_radix(hex, 16).ok()?
        } else {
            body.parse::<u32>().ok()?
        };
        char::from_u32(cp)
    }

    let mut out = String::with_capacity(src.len());
    let mut rest = src;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let semi = tail
            .char_indices()
            .take_while(|(i, _)| *i < 12)
            .find(|(_, ch)| *ch == ';')
            .map(|(i, _)| i);
        match semi {
            Some(end) => {
                let body = &tail[..end];
                let decoded = if let Some(num) = body.strip_prefix('#') {
                    decode_numeric(num)
                } else {
                    decode_named(body)
                };
                match decoded {
                    Some(ch) => {
                        out.push(ch);
                        rest = &tail[end + 1..];
                    }
                    None => {
                        out.push('&');
                        rest = tail;
                    }
                }
            }
            None => {
                out.push('&');
                rest = tail;
            }
        }
    }
    out.push_str(rest);
    out
}
