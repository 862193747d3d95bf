#![forbid(unsafe_code)]

//! Tree rendering: indented text and HTML.
//!
//! Both renderers are pure functions of a [`SerializedNode`]. Indentation is
//! two spaces per depth level. Composite nodes get a header line (`+ Sprite`,
//! `Array[3]`); scalar-ish leaves under an object render inline as
//! `key: value`; circular back-references render as
//! `* [circular reference to <Type>]`.

use crate::serialize::SerializedNode;

const INDENT: &str = "  ";

/// Render a tree as indented plain text.
#[must_use]
pub fn to_text(node: &SerializedNode) -> String {
    let mut lines = Vec::new();
    text_lines(node, 0, &mut lines);
    lines.join("\n")
}

/// The inline form of a leaf node, or `None` for composites and circular
/// references (which render their own line).
fn inline(node: &SerializedNode) -> Option<String> {
    match node {
        SerializedNode::Primitive { value, .. } => Some(value.to_string()),
        SerializedNode::Function { name, .. } => Some(format!("{name}()")),
        SerializedNode::Error { message, .. } => Some(format!("[error: {message}]")),
        _ => None,
    }
}

fn text_lines(node: &SerializedNode, depth: usize, lines: &mut Vec<String>) {
    let pad = INDENT.repeat(depth);
    match node {
        SerializedNode::Primitive { .. }
        | SerializedNode::Function { .. }
        | SerializedNode::Error { .. } => {
            // A leaf can only reach here at the root or as an array item.
            if let Some(text) = inline(node) {
                lines.push(format!("{pad}{text}"));
            }
        }
        SerializedNode::Circular { reference, .. } => {
            lines.push(format!("{pad}* [circular reference to {reference}]"));
        }
        SerializedNode::Array { length, items, .. } => {
            lines.push(format!("{pad}Array[{length}]"));
            for item in items {
                text_lines(item, depth + 1, lines);
            }
        }
        SerializedNode::Object {
            name, properties, ..
        } => {
            lines.push(format!("{pad}+ {name}"));
            for prop in properties {
                match inline(&prop.value) {
                    Some(text) => lines.push(format!("{pad}{INDENT}{}: {text}", prop.key)),
                    None => text_lines(&prop.value, depth + 1, lines),
                }
            }
        }
    }
}

/// Render a tree as HTML with per-node classes and `data-path` attributes.
#[must_use]
pub fn to_html(node: &SerializedNode) -> String {
    let mut out = String::new();
    html_into(node, 0, &mut out);
    out
}

fn html_into(node: &SerializedNode, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    match node {
        SerializedNode::Primitive { path, value } => {
            out.push_str(&format!(
                "{pad}<span class=\"property\" data-path=\"{}\">{}</span>\n",
                escape_html(path),
                escape_html(&value.to_string())
            ));
        }
        SerializedNode::Circular { path, reference } => {
            out.push_str(&format!(
                "{pad}<span class=\"circular\" data-path=\"{}\">* [circular reference to {}]</span>\n",
                escape_html(path),
                escape_html(reference)
            ));
        }
        SerializedNode::Function { path, name } => {
            out.push_str(&format!(
                "{pad}<span class=\"function\" data-path=\"{}\">{}()</span>\n",
                escape_html(path),
                escape_html(name)
            ));
        }
        SerializedNode::Error { path, message } => {
            out.push_str(&format!(
                "{pad}<span class=\"error\" data-path=\"{}\">Error: {}</span>\n",
                escape_html(path),
                escape_html(message)
            ));
        }
        SerializedNode::Array {
            path,
            length,
            items,
        } => {
            out.push_str(&format!(
                "{pad}<div class=\"array-node\" data-path=\"{}\">Array[{length}]\n",
                escape_html(path)
            ));
            for item in items {
                html_into(item, depth + 1, out);
            }
            out.push_str(&format!("{pad}</div>\n"));
        }
        SerializedNode::Object {
            path,
            name,
            properties,
        } => {
            out.push_str(&format!(
                "{pad}<div class=\"object-node\" data-path=\"{}\">+ {}\n",
                escape_html(path),
                escape_html(name)
            ));
            for prop in properties {
                out.push_str(&format!("{pad}{INDENT}{}: ", escape_html(&prop.key)));
                if let SerializedNode::Primitive { path, value } = &prop.value {
                    out.push_str(&format!(
                        "<span class=\"property\" data-path=\"{}\">{}</span>\n",
                        escape_html(path),
                        escape_html(&value.to_string())
                    ));
                } else {
                    out.push('\n');
                    html_into(&prop.value, depth + 1, out);
                }
            }
            out.push_str(&format!("{pad}</div>\n"));
        }
    }
}

/// Minimal HTML escaping for text content and attribute values.
#[must_use]
pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
