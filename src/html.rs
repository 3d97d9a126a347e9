//! HTML parsing and serialization for [`Document`].
//!
//! Book pages are read with quick-xml in its lenient configuration: end tag
//! names are not checked, unmatched end tags are tolerated, attributes may be
//! unquoted or valueless. On top of that the tree builder knows the HTML bits
//! an XML reader does not:
//!
//! - **Void elements** (`img`, `br`, `meta`, ...) never take children, with or
//!   without a trailing slash.
//! - **Raw text elements** (`script`, `style`) keep their body verbatim, so
//!   inline JavaScript with `<` comparisons survives a round trip.
//! - **Character references** are decoded one at a time against the full
//!   HTML5 entity table, plus decimal and hex references. Unknown references
//!   and bare `&` stay literal text.
//! - **End tags** close the nearest open element with that name; stray ones
//!   are dropped.
//!
//! Serialization writes HTML syntax back out (`<img ...>` without a slash,
//! attributes always quoted). Text and attribute values that are unchanged
//! since parsing are written the way the source spelled them, so `&mdash;`
//! stays `&mdash;` and `R&D` stays `R&D`.

use crate::dom::{Document, NodeData, NodeId};
use quick_xml::escape::{escape, partial_escape, resolve_html5_entity};
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::borrow::Cow;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtmlError {
    #[error("malformed HTML at byte {position}: {source}")]
    Syntax {
        position: u64,
        #[source]
        source: quick_xml::Error,
    },
}

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

pub fn is_void(tag: &str) -> bool {
    VOID_ELEMENTS.contains(&tag)
}

/// Parse a complete page into a new document.
pub fn parse(source: &str) -> Result<Document, HtmlError> {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, source)?;
    Ok(doc)
}

/// Parse a fragment and append the resulting nodes under `parent`.
///
/// Returns the top-level nodes that were created.
pub fn parse_into(
    doc: &mut Document,
    parent: NodeId,
    source: &str,
) -> Result<Vec<NodeId>, HtmlError> {
    let mut base = 0usize;
    let mut reader = lenient_reader(source);
    let mut stack: Vec<(NodeId, String)> = Vec::new();
    let mut created = Vec::new();

    loop {
        let event = reader.read_event().map_err(|source| HtmlError::Syntax {
            position: (base as u64) + reader.buffer_position() as u64,
            source,
        })?;
        let current = stack.last().map(|(id, _)| *id).unwrap_or(parent);

        let node = match event {
            Event::Start(start) => {
                let (node, tag) = element_from(doc, &start);
                attach(doc, current, node, &mut created, parent);
                if RAW_TEXT_ELEMENTS.contains(&tag.as_str()) {
                    // The reader would try to tokenize the body; cut it out by
                    // hand and restart reading after the closing tag.
                    let body_start = base + reader.buffer_position() as usize;
                    let rest = &source[body_start..];
                    let (body, consumed) = split_raw_text(rest, &tag);
                    if !body.is_empty() {
                        let text = doc.create_node(NodeData::RawText(body.to_string()));
                        doc.append_child(node, text);
                    }
                    base = body_start + consumed;
                    reader = lenient_reader(&source[base..]);
                } else if !is_void(&tag) {
                    stack.push((node, tag));
                }
                continue;
            }
            Event::Empty(start) => element_from(doc, &start).0,
            Event::End(end) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                if let Some(pos) = stack.iter().rposition(|(_, tag)| *tag == name) {
                    stack.truncate(pos);
                }
                continue;
            }
            Event::Text(text) => {
                let raw = String::from_utf8_lossy(&text);
                doc.create_parsed_text(decode_entities(&raw).into_owned(), &raw)
            }
            Event::CData(data) => doc.create_text(&String::from_utf8_lossy(&data)),
            Event::Comment(comment) => {
                let body = String::from_utf8_lossy(&comment).into_owned();
                doc.create_node(NodeData::Comment(body))
            }
            Event::DocType(doctype) => {
                let body = String::from_utf8_lossy(&doctype).trim().to_string();
                doc.create_node(NodeData::Doctype(body))
            }
            Event::Decl(_) | Event::PI(_) => continue,
            Event::Eof => break,
        };
        attach(doc, current, node, &mut created, parent);
    }

    Ok(created)
}

fn lenient_reader(source: &str) -> Reader<&[u8]> {
    let mut reader = Reader::from_str(source);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    reader
}

/// Split a raw text element body off `rest`. Returns the body and the number
/// of bytes consumed including the closing tag. An unclosed element runs to
/// the end of input.
fn split_raw_text<'a>(rest: &'a str, tag: &str) -> (&'a str, usize) {
    let needle = format!("</{tag}");
    match rest.to_ascii_lowercase().find(&needle) {
        Some(close) => {
            let consumed = rest[close..]
                .find('>')
                .map(|gt| close + gt + 1)
                .unwrap_or(rest.len());
            (&rest[..close], consumed)
        }
        None => (rest, rest.len()),
    }
}

fn attach(
    doc: &mut Document,
    current: NodeId,
    node: NodeId,
    created: &mut Vec<NodeId>,
    parent: NodeId,
) {
    doc.append_child(current, node);
    if current == parent {
        created.push(node);
    }
}

fn element_from(doc: &mut Document, start: &BytesStart<'_>) -> (NodeId, String) {
    let tag = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
    let node = doc.create_element(&tag);
    for attr in start.html_attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_ascii_lowercase();
        let raw = String::from_utf8_lossy(&attr.value);
        doc.set_parsed_attr(node, &key, decode_entities(&raw).into_owned(), &raw);
    }
    (node, tag)
}

/// Decode character references one at a time. References that do not
/// resolve, and `&` not starting a reference, are kept literally.
fn decode_entities(raw: &str) -> Cow<'_, str> {
    if !raw.contains('&') {
        return Cow::Borrowed(raw);
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let resolved = after
            .find(';')
            .and_then(|semi| resolve_reference(&after[..semi]).map(|text| (semi, text)));
        match resolved {
            Some((semi, text)) => {
                out.push_str(&text);
                rest = &after[semi + 1..];
            }
            None => {
                out.push('&');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Resolve the name between `&` and `;`.
fn resolve_reference(name: &str) -> Option<Cow<'static, str>> {
    let Some(number) = name.strip_prefix('#') else {
        return resolve_html5_entity(name).map(Cow::Borrowed);
    };
    let code = match number.strip_prefix(['x', 'X']) {
        Some(hex) if !hex.is_empty() && hex.bytes().all(|b| b.is_ascii_hexdigit()) => {
            u32::from_str_radix(hex, 16).ok()?
        }
        None if !number.is_empty() && number.bytes().all(|b| b.is_ascii_digit()) => {
            number.parse().ok()?
        }
        _ => return None,
    };
    char::from_u32(code)
        .filter(|&c| c != '\0')
        .map(|c| Cow::Owned(c.to_string()))
}

// =============================================================================
// Serialization
// =============================================================================

/// Serialize the whole document.
pub fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for &child in doc.children(doc.root()) {
        write_node(doc, child, &mut out);
    }
    out
}

/// Serialize one node including its own tag.
pub fn outer_html(doc: &Document, node: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, node, &mut out);
    out
}

fn write_node(doc: &Document, node: NodeId, out: &mut String) {
    match doc.data(node) {
        NodeData::Document => {
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
        }
        NodeData::Doctype(body) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(body);
            out.push('>');
        }
        NodeData::Text(text) => match doc.text_source(node) {
            Some(raw) => out.push_str(raw),
            None => out.push_str(&partial_escape(text)),
        },
        NodeData::RawText(text) => out.push_str(text),
        NodeData::Comment(text) => {
            out.push_str("<!--");
            out.push_str(text);
            out.push_str("-->");
        }
        NodeData::Element(el) => {
            out.push('<');
            out.push_str(&el.tag);
            for (key, value) in doc.attrs(node) {
                out.push(' ');
                out.push_str(key);
                out.push_str("=\"");
                match doc
                    .attr_source(node, key)
                    .filter(|raw| decode_entities(raw) == value.as_str())
                {
                    // Single-quoted sources may hold a literal `"`.
                    Some(raw) => out.push_str(&raw.replace('"', "&quot;")),
                    None => out.push_str(&escape(value.as_str())),
                }
                out.push('"');
            }
            out.push('>');
            if is_void(&el.tag) {
                return;
            }
            for &child in doc.children(node) {
                write_node(doc, child, out);
            }
            out.push_str("</");
            out.push_str(&el.tag);
            out.push('>');
        }
    }
}
