//! CSS selector subset: parsing and matching against the arena.
//!
//! Supported: `*`, `tag`, `#id`, `.class`, `[attr]`, `[attr=v]`,
//! `[attr^=v]`, `[attr$=v]`, `[attr*=v]`, compound steps, descendant and
//! child combinators, and comma-separated groups. Matching walks connected
//! elements in document order; a bare `#id` selector hits the arena's id
//! index directly.

use crate::arena::Document;
use crate::error::{DomError, Result};
use crate::types::NodeId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum AttrCondition {
    Exists { key: String },
    Eq { key: String, value: String },
    StartsWith { key: String, value: String },
    EndsWith { key: String, value: String },
    Contains { key: String, value: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct SelectorStep {
    pub(crate) tag: Option<String>,
    pub(crate) universal: bool,
    pub(crate) id: Option<String>,
    pub(crate) classes: Vec<String>,
    pub(crate) attrs: Vec<AttrCondition>,
}

impl SelectorStep {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }

    /// `Some(id)` when the step is exactly `#id` with nothing else.
    fn id_only(&self) -> Option<&str> {
        if !self.universal
            && self.tag.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
        {
            self.id.as_deref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

/// One compound step plus its relation to the step on its left.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SelectorPart {
    pub(crate) step: SelectorStep,
    pub(crate) combinator: Option<Combinator>,
}

/// A parsed selector: groups of combinator chains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    groups: Vec<Vec<SelectorPart>>,
}

impl Selector {
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DomError::Selector(input.to_string()));
        }

        let mut groups = Vec::new();
        for group in split_groups(input) {
            let group = group.trim();
            if group.is_empty() {
                return Err(DomError::Selector(input.to_string()));
            }
            groups.push(parse_chain(group)?);
        }
        Ok(Self { groups })
    }

    /// All connected elements matching this selector, in document order.
    pub fn query_all(&self, doc: &Document) -> Vec<NodeId> {
        // Fast path: a single `#id` group resolves through the index.
        if self.groups.len() == 1 && self.groups[0].len() == 1 {
            if let Some(id) = self.groups[0][0].step.id_only() {
                return doc.element_by_id(id).into_iter().collect();
            }
        }

        doc.document_elements()
            .into_iter()
            .filter(|&node_id| {
                self.groups
                    .iter()
                    .any(|chain| matches_chain(doc, node_id, chain))
            })
            .collect()
    }

    /// First match in document order, if any.
    pub fn query_first(&self, doc: &Document) -> Option<NodeId> {
        if self.groups.len() == 1 && self.groups[0].len() == 1 {
            if let Some(id) = self.groups[0][0].step.id_only() {
                return doc.element_by_id(id);
            }
        }

        doc.document_elements().into_iter().find(|&node_id| {
            self.groups
                .iter()
                .any(|chain| matches_chain(doc, node_id, chain))
        })
    }

    /// Whether a specific element matches (used for scoped `find`).
    pub fn matches(&self, doc: &Document, node_id: NodeId) -> bool {
        self.groups
            .iter()
            .any(|chain| matches_chain(doc, node_id, chain))
    }
}

/// Split on top-level commas, respecting `[...]` and quoted strings.
fn split_groups(input: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;

    for (i, ch) in input.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '"') | (None, '\'') => quote = Some(ch),
            (None, '[') => depth += 1,
            (None, ']') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                out.push(&input[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

fn is_ident_char(ch: char) -> bool {
    ch.is_ascii_alphanumeric() || ch == '-' || ch == '_'
}

fn parse_chain(input: &str) -> Result<Vec<SelectorPart>> {
    let chars: Vec<char> = input.chars().collect();
    let mut parts: Vec<SelectorPart> = Vec::new();
    let mut i = 0usize;
    let mut pending: Option<Combinator> = None;
    let mut saw_gap = false;

    while i < chars.len() {
        let ch = chars[i];
        if ch.is_whitespace() {
            saw_gap = true;
            i += 1;
            continue;
        }
        if ch == '>' {
            if parts.is_empty() || pending.is_some() {
                return Err(DomError::Selector(input.to_string()));
            }
            pending = Some(Combinator::Child);
            saw_gap = false;
            i += 1;
            continue;
        }

        if !parts.is_empty() && pending.is_none() {
            if !saw_gap {
                return Err(DomError::Selector(input.to_string()));
            }
            pending = Some(Combinator::Descendant);
        }

        let (step, next) = parse_step(&chars, i, input)?;
        if step.is_empty() {
            return Err(DomError::Selector(input.to_string()));
        }
        parts.push(SelectorPart {
            step,
            combinator: if parts.is_empty() { None } else { pending.take() },
        });
        saw_gap = false;
        i = next;
    }

    if pending.is_some() || parts.is_empty() {
        return Err(DomError::Selector(input.to_string()));
    }
    Ok(parts)
}

fn parse_step(chars: &[char], mut i: usize, input: &str) -> Result<(SelectorStep, usize)> {
    let mut step = SelectorStep::default();

    while i < chars.len() {
        match chars[i] {
            '*' => {
                step.universal = true;
                i += 1;
            }
            '#' => {
                let (ident, next) = read_ident(chars, i + 1);
                if ident.is_empty() {
                    return Err(DomError::Selector(input.to_string()));
                }
                step.id = Some(ident);
                i = next;
            }
            '.' => {
                let (ident, next) = read_ident(chars, i + 1);
                if ident.is_empty() {
                    return Err(DomError::Selector(input.to_string()));
                }
                step.classes.push(ident);
                i = next;
            }
            '[' => {
                let (cond, next) = parse_attr(chars, i + 1, input)?;
                step.attrs.push(cond);
                i = next;
            }
            ch if is_ident_char(ch) => {
                let (ident, next) = read_ident(chars, i);
                step.tag = Some(ident.to_ascii_lowercase());
                i = next;
            }
            _ => break,
        }
    }

    Ok((step, i))
}

fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && is_ident_char(chars[i]) {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

fn parse_attr(chars: &[char], start: usize, input: &str) -> Result<(AttrCondition, usize)> {
    let mut i = start;
    let mut body = String::new();
    let mut quote: Option<char> = None;
    loop {
        if i >= chars.len() {
            return Err(DomError::Selector(input.to_string()));
        }
        let ch = chars[i];
        match quote {
            Some(q) if ch == q => quote = None,
            Some(_) => {}
            None if ch == '"' || ch == '\'' => quote = Some(ch),
            None if ch == ']' => break,
            None => {}
        }
        body.push(ch);
        i += 1;
    }
    let end = i + 1; // past ']'

    let body = body.trim();
    let cond = if let Some(eq_pos) = find_op(body) {
        let (raw_key, op_len) = match body.as_bytes()[eq_pos] {
            b'^' | b'$' | b'*' => (&body[..eq_pos], 2),
            _ => (&body[..eq_pos], 1),
        };
        let key = raw_key.trim().to_string();
        let value = unquote(body[eq_pos + op_len..].trim());
        if key.is_empty() {
            return Err(DomError::Selector(input.to_string()));
        }
        match body.as_bytes()[eq_pos] {
            b'^' => AttrCondition::StartsWith { key, value },
            b'$' => AttrCondition::EndsWith { key, value },
            b'*' => AttrCondition::Contains { key, value },
            _ => AttrCondition::Eq { key, value },
        }
    } else {
        if body.is_empty() {
            return Err(DomError::Selector(input.to_string()));
        }
        AttrCondition::Exists {
            key: body.to_string(),
        }
    };

    Ok((cond, end))
}

/// Position of the operator start (`=`, `^=`, `$=`, `*=`) outside quotes.
fn find_op(body: &str) -> Option<usize> {
    let bytes = body.as_bytes();
    let mut quote: Option<u8> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'=' => {
                if i > 0 && matches!(bytes[i - 1], b'^' | b'$' | b'*') {
                    return Some(i - 1);
                }
                return Some(i);
            }
            None => {}
        }
    }
    None
}

fn unquote(value: &str) -> String {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && (bytes[0] == b'"' || bytes[0] == b'\'')
        && bytes[bytes.len() - 1] == bytes[0]
    {
        value[1..value.len() - 1].to_string()
    } else {
        value.to_string()
    }
}

fn matches_chain(doc: &Document, node_id: NodeId, chain: &[SelectorPart]) -> bool {
    matches_from(doc, node_id, chain, chain.len() - 1)
}

fn matches_from(doc: &Document, node_id: NodeId, chain: &[SelectorPart], idx: usize) -> bool {
    if !matches_step(doc, node_id, &chain[idx].step) {
        return false;
    }
    if idx == 0 {
        return true;
    }

    // The combinator on `chain[idx]` relates it to the step on its left.
    let parent = match doc.get(node_id).ok().and_then(|n| n.parent_id) {
        Some(p) => p,
        None => return false,
    };
    match chain[idx].combinator {
        Some(Combinator::Child) => matches_from(doc, parent, chain, idx - 1),
        Some(Combinator::Descendant) => {
            let mut current = Some(parent);
            while let Some(ancestor) = current {
                if matches_from(doc, ancestor, chain, idx - 1) {
                    return true;
                }
                current = doc.get(ancestor).ok().and_then(|n| n.parent_id);
            }
            false
        }
        None => false,
    }
}

fn matches_step(doc: &Document, node_id: NodeId, step: &SelectorStep) -> bool {
    let node = match doc.get(node_id) {
        Ok(n) => n,
        Err(_) => return false,
    };
    if !node.is_element() {
        return false;
    }
    if let Some(tag) = &step.tag {
        if node.name != *tag {
            return false;
        }
    }
    if let Some(id) = &step.id {
        if node.attr("id") != Some(id.as_str()) {
            return false;
        }
    }
    for class in &step.classes {
        if !node.has_class(class) {
            return false;
        }
    }
    for cond in &step.attrs {
        let ok = match cond {
            AttrCondition::Exists { key } => node.attr(key).is_some(),
            AttrCondition::Eq { key, value } => node.attr(key) == Some(value.as_str()),
            AttrCondition::StartsWith { key, value } => {
                node.attr(key).map(|v| v.starts_with(value)).unwrap_or(false)
            }
            AttrCondition::EndsWith { key, value } => {
                node.attr(key).map(|v| v.ends_with(value)).unwrap_or(false)
            }
            AttrCondition::Contains { key, value } => {
                node.attr(key).map(|v| v.contains(value)).unwrap_or(false)
            }
        };
        if !ok {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Document;

    fn build_doc() -> (Document, NodeId, NodeId, NodeId, NodeId) {
        // <div id="main" class="box">
        //   <p class="note">one</p>
        //   <section><p class="note hot" data-kind="x">two</p></section>
        // </div>
        let mut doc = Document::new();
        let root = doc.root_id();
        let div = doc.create_element("div");
        doc.append_child(root, div).unwrap();
        doc.set_attr(div, "id", "main").unwrap();
        doc.set_attr(div, "class", "box").unwrap();

        let p1 = doc.create_element("p");
        doc.append_child(div, p1).unwrap();
        doc.set_attr(p1, "class", "note").unwrap();

        let section = doc.create_element("section");
        doc.append_child(div, section).unwrap();
        let p2 = doc.create_element("p");
        doc.append_child(section, p2).unwrap();
        doc.set_attr(p2, "class", "note hot").unwrap();
        doc.set_attr(p2, "data-kind", "x").unwrap();

        (doc, div, p1, section, p2)
    }

    #[test]
    fn test_tag_and_class() {
        let (doc, _, p1, _, p2) = build_doc();
        let sel = Selector::parse("p.note").unwrap();
        assert_eq!(sel.query_all(&doc), vec![p1, p2]);

        let sel = Selector::parse(".hot").unwrap();
        assert_eq!(sel.query_all(&doc), vec![p2]);
    }

    #[test]
    fn test_id_fast_path() {
        let (doc, div, ..) = build_doc();
        let sel = Selector::parse("#main").unwrap();
        assert_eq!(sel.query_all(&doc), vec![div]);
        assert_eq!(sel.query_first(&doc), Some(div));

        let sel = Selector::parse("#missing").unwrap();
        assert!(sel.query_all(&doc).is_empty());
        assert_eq!(sel.query_first(&doc), None);
    }

    #[test]
    fn test_id_fast_path_after_rename() {
        let (mut doc, div, ..) = build_doc();
        doc.set_attr(div, "id", "renamed").unwrap();

        // Fast and slow paths must agree once the id changes.
        assert!(Selector::parse("#main").unwrap().query_all(&doc).is_empty());
        assert!(Selector::parse("div#main").unwrap().query_all(&doc).is_empty());
        assert_eq!(Selector::parse("#renamed").unwrap().query_all(&doc), vec![div]);
    }

    #[test]
    fn test_descendant_vs_child() {
        let (doc, _, p1, _, p2) = build_doc();
        let sel = Selector::parse("div p").unwrap();
        assert_eq!(sel.query_all(&doc), vec![p1, p2]);

        let sel = Selector::parse("div > p").unwrap();
        assert_eq!(sel.query_all(&doc), vec![p1]);

        let sel = Selector::parse("section > p").unwrap();
        assert_eq!(sel.query_all(&doc), vec![p2]);
    }

    #[test]
    fn test_attr_conditions() {
        let (doc, _, _, _, p2) = build_doc();
        assert_eq!(
            Selector::parse("[data-kind]").unwrap().query_all(&doc),
            vec![p2]
        );
        assert_eq!(
            Selector::parse("[data-kind=x]").unwrap().query_all(&doc),
            vec![p2]
        );
        assert_eq!(
            Selector::parse("[data-kind=\"x\"]").unwrap().query_all(&doc),
            vec![p2]
        );
        assert_eq!(
            Selector::parse("[class^=note]").unwrap().query_all(&doc).len(),
            2
        );
        assert_eq!(
            Selector::parse("[class$=hot]").unwrap().query_all(&doc),
            vec![p2]
        );
        assert!(Selector::parse("[class*=ot]")
            .unwrap()
            .query_all(&doc)
            .contains(&p2));
    }

    #[test]
    fn test_groups_document_order() {
        let (doc, div, p1, section, p2) = build_doc();
        let sel = Selector::parse("section, .box, p").unwrap();
        assert_eq!(sel.query_all(&doc), vec![div, p1, section, p2]);
    }

    #[test]
    fn test_detached_never_matches() {
        let (mut doc, div, ..) = build_doc();
        doc.detach(div).unwrap();
        assert!(Selector::parse("p").unwrap().query_all(&doc).is_empty());
        assert!(Selector::parse("#main").unwrap().query_first(&doc).is_none());
    }

    #[test]
    fn test_invalid_selectors() {
        assert!(Selector::parse("").is_err());
        assert!(Selector::parse("> p").is_err());
        assert!(Selector::parse("div >").is_err());
        assert!(Selector::parse("div,, p").is_err());
        assert!(Selector::parse("[=x]").is_err());
    }

    #[test]
    fn test_universal() {
        let (doc, ..) = build_doc();
        assert_eq!(Selector::parse("*").unwrap().query_all(&doc).len(), 4);
    }
}
