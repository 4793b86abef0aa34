//! DOM serializer: HTML output and an indented debug dump.
//!
//! Output is deterministic: attributes in alphabetical order, the inline
//! style map rendered as a sorted `style` attribute.

use crate::arena::Document;
use crate::error::Result;
use crate::types::{is_void_element, NodeId, NodeType};

/// Serialize a node and its subtree to HTML.
pub fn outer_html(doc: &Document, node_id: NodeId) -> Result<String> {
    let mut out = String::with_capacity(256);
    write_node(doc, node_id, &mut out)?;
    Ok(out)
}

/// Serialize only the children of a node.
pub fn inner_html(doc: &Document, node_id: NodeId) -> Result<String> {
    let mut out = String::with_capacity(256);
    let children: Vec<NodeId> = doc.get(node_id)?.children_ids.iter().copied().collect();
    for child in children {
        write_node(doc, child, &mut out)?;
    }
    Ok(out)
}

/// Indented tree dump for diagnostics.
pub fn pretty(doc: &Document, node_id: NodeId) -> Result<String> {
    let mut out = String::with_capacity(256);
    write_pretty(doc, node_id, 0, &mut out)?;
    Ok(out)
}

fn write_node(doc: &Document, node_id: NodeId, out: &mut String) -> Result<()> {
    let node = doc.get(node_id)?;

    match node.node_type {
        NodeType::Element => {
            out.push('<');
            out.push_str(&node.name);

            let mut names: Vec<&String> = node.attributes.keys().collect();
            names.sort();
            for name in names {
                if let Some(value) = node.attr(name) {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attr(value));
                    out.push('"');
                }
            }
            if !node.style.is_empty() {
                let mut props: Vec<&String> = node.style.keys().collect();
                props.sort();
                let decls: Vec<String> = props
                    .iter()
                    .filter_map(|p| node.style.get(*p).map(|v| format!("{}: {}", p, v)))
                    .collect();
                out.push_str(" style=\"");
                out.push_str(&escape_attr(&decls.join("; ")));
                out.push('"');
            }
            out.push('>');

            if is_void_element(&node.name) {
                return Ok(());
            }

            for &child_id in &node.children_ids {
                write_node(doc, child_id, out)?;
            }

            out.push_str("</");
            out.push_str(&node.name);
            out.push('>');
        }
        NodeType::Text => {
            out.push_str(&escape_text(&node.value));
        }
        NodeType::Comment => {
            out.push_str("<!--");
            out.push_str(&node.value);
            out.push_str("-->");
        }
        NodeType::Document => {
            for &child_id in &node.children_ids {
                write_node(doc, child_id, out)?;
            }
        }
    }

    Ok(())
}

fn write_pretty(doc: &Document, node_id: NodeId, depth: usize, out: &mut String) -> Result<()> {
    let node = doc.get(node_id)?;
    let indent = "  ".repeat(depth);

    match node.node_type {
        NodeType::Element => {
            out.push_str(&indent);
            out.push('<');
            out.push_str(&node.name);
            let mut names: Vec<&String> = node.attributes.keys().collect();
            names.sort();
            for name in names {
                if let Some(value) = node.attr(name) {
                    out.push_str(&format!(" {}=\"{}\"", name, escape_attr(value)));
                }
            }
            out.push_str(">\n");
            for &child_id in &node.children_ids {
                write_pretty(doc, child_id, depth + 1, out)?;
            }
        }
        NodeType::Text => {
            let text = node.value.trim();
            if !text.is_empty() {
                out.push_str(&indent);
                out.push_str(text);
                out.push('\n');
            }
        }
        NodeType::Document => {
            for &child_id in &node.children_ids {
                write_pretty(doc, child_id, depth, out)?;
            }
        }
        NodeType::Comment => {}
    }

    Ok(())
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attr(value: &str) -> String {
    escape_text(value).replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::Document;
    use crate::parser::parse_fragment;

    #[test]
    fn test_roundtrip_simple() {
        let mut doc = Document::new();
        let roots = parse_fragment(&mut doc, "<div class=\"a\"><p>hi</p></div>", true).unwrap();
        assert_eq!(
            outer_html(&doc, roots[0]).unwrap(),
            "<div class=\"a\"><p>hi</p></div>"
        );
        assert_eq!(inner_html(&doc, roots[0]).unwrap(), "<p>hi</p>");
    }

    #[test]
    fn test_escaping() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_attr(div, "title", "a\"b<c").unwrap();
        let text = doc.create_text("1 < 2 & 3");
        doc.append_child(div, text).unwrap();
        assert_eq!(
            outer_html(&doc, div).unwrap(),
            "<div title=\"a&quot;b&lt;c\">1 &lt; 2 &amp; 3</div>"
        );
    }

    #[test]
    fn test_void_element_output() {
        let mut doc = Document::new();
        let roots = parse_fragment(&mut doc, "<p>a<br>b</p>", true).unwrap();
        assert_eq!(outer_html(&doc, roots[0]).unwrap(), "<p>a<br>b</p>");
    }

    #[test]
    fn test_style_map_rendered_sorted() {
        let mut doc = Document::new();
        let div = doc.create_element("div");
        doc.set_style_prop(div, "margin", "0").unwrap();
        doc.set_style_prop(div, "color", "red").unwrap();
        assert_eq!(
            outer_html(&doc, div).unwrap(),
            "<div style=\"color: red; margin: 0\"></div>"
        );
    }

    #[test]
    fn test_pretty_dump() {
        let mut doc = Document::new();
        let roots = parse_fragment(&mut doc, "<div><p>hi</p></div>", true).unwrap();
        let dump = pretty(&doc, roots[0]).unwrap();
        assert!(dump.starts_with("<div>\n"));
        assert!(dump.contains("  <p>"));
        assert!(dump.contains("    hi"));
    }
}
