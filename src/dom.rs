//! In-memory document tree.
//!
//! A small arena-backed stand-in for a browser document: just enough of it to
//! let the widgets read markup, write attributes and classes, move focus, and
//! react to image loads and scrolling. Nodes are addressed by [`NodeId`]
//! handles that stay valid for the lifetime of the [`Document`]; detached
//! nodes are never reclaimed, which keeps handles held by widgets (focus
//! restoration, observers) safe to dereference.
//!
//! Besides the tree, the document carries the state a browser would keep next
//! to it:
//!
//! - **Focus**: the active element, moved only onto focusable elements.
//! - **Image state**: natural size and `complete` flag per `<img>`.
//! - **Layout**: an optional vertical [`Rect`] per element, used by the reveal
//!   observer. Nothing computes layout; callers (tests, harnesses) set it.
//! - **Viewport**: window size, scroll offset, scrollable height and the
//!   reduced-motion preference.

use crate::selector::Selector;
use serde::Serialize;

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Vertical placement of an element in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

/// Window state the widgets read.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    /// Inner width in CSS pixels.
    pub width: f64,
    /// Inner height in CSS pixels.
    pub height: f64,
    /// Vertical scroll offset.
    pub scroll_y: f64,
    /// Total scrollable height of the document element.
    pub scroll_height: f64,
    /// `prefers-reduced-motion: reduce`
    pub prefers_reduced_motion: bool,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 800.0,
            scroll_y: 0.0,
            scroll_height: 800.0,
            prefers_reduced_motion: false,
        }
    }
}

/// Load state of an `<img>` element.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImageState {
    /// Decoded pixel size, known once the image has loaded.
    pub natural_size: Option<Dimensions>,
    /// Whether loading has finished.
    pub complete: bool,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub tag: String,
    attrs: Vec<(String, String)>,
    /// Attribute values as written in parsed markup, entity references intact.
    attr_sources: Vec<(String, String)>,
    image: ImageState,
    rect: Option<Rect>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
            attr_sources: Vec::new(),
            image: ImageState::default(),
            rect: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Document,
    Doctype(String),
    Element(Element),
    Text(String),
    Comment(String),
    /// Body of a `script` or `style` element, kept verbatim.
    RawText(String),
}

#[derive(Debug, Clone)]
struct Node {
    data: NodeData,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    /// Markup a parsed text node was read from.
    source: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    active: Option<NodeId>,
    pub viewport: Viewport,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            nodes: vec![Node {
                data: NodeData::Document,
                parent: None,
                children: Vec::new(),
                source: None,
            }],
            active: None,
            viewport: Viewport::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub(crate) fn create_node(&mut self, data: NodeData) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            data,
            parent: None,
            children: Vec::new(),
            source: None,
        });
        id
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.create_node(NodeData::Element(Element::new(tag)))
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.create_node(NodeData::Text(text.to_string()))
    }

    /// Text node read from markup. `source` is kept for serialization.
    pub(crate) fn create_parsed_text(&mut self, text: String, source: &str) -> NodeId {
        let id = self.create_node(NodeData::Text(text));
        self.nodes[id.0].source = Some(source.to_string());
        id
    }

    pub(crate) fn text_source(&self, id: NodeId) -> Option<&str> {
        self.nodes[id.0].source.as_deref()
    }

    pub fn data(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0].data
    }

    pub fn element(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        match &mut self.nodes[id.0].data {
            NodeData::Element(el) => Some(el),
            _ => None,
        }
    }

    /// Lowercase tag name, `None` for non-element nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|el| el.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId, tag: &str) -> bool {
        self.tag(id) == Some(tag)
    }

    // =========================================================================
    // Tree structure
    // =========================================================================

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != child);
        }
    }

    /// Append `child` as the last child of `parent`, moving it if attached.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Insert `child` before `reference`. Appends when `reference` is not a
    /// child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.detach(child);
        let position = self.nodes[parent.0]
            .children
            .iter()
            .position(|&c| c == reference);
        self.nodes[child.0].parent = Some(parent);
        match position {
            Some(pos) => self.nodes[parent.0].children.insert(pos, child),
            None => self.nodes[parent.0].children.push(child),
        }
    }

    /// Ancestors of `id`, nearest first, not including `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&node| self.parent(node))
    }

    /// All descendants of `id` in document order, not including `id`.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.children(node).iter().rev().copied());
        }
        out
    }

    /// Whether `node` is `ancestor` or one of its descendants.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        node == ancestor || self.ancestors(node).any(|a| a == ancestor)
    }

    /// Whether `id` is reachable from the document root.
    pub fn is_connected(&self, id: NodeId) -> bool {
        self.contains(self.root(), id)
    }

    // =========================================================================
    // Attributes and classes
    // =========================================================================

    pub fn attrs(&self, id: NodeId) -> &[(String, String)] {
        self.element(id).map(|el| el.attrs.as_slice()).unwrap_or(&[])
    }

    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.attrs(id)
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(el) = self.element_mut(id) {
            match el.attrs.iter_mut().find(|(key, _)| key == name) {
                Some(slot) => slot.1 = value,
                None => el.attrs.push((name.to_ascii_lowercase(), value)),
            }
        }
    }

    /// Set an attribute read from markup, remembering how it was written.
    pub(crate) fn set_parsed_attr(
        &mut self,
        id: NodeId,
        name: &str,
        value: String,
        source: &str,
    ) {
        self.set_attr(id, name, value);
        if let Some(el) = self.element_mut(id) {
            el.attr_sources.retain(|(key, _)| key != name);
            el.attr_sources.push((name.to_ascii_lowercase(), source.to_string()));
        }
    }

    /// The written form of an attribute as parsed. Callers must check it
    /// still decodes to the current value.
    pub(crate) fn attr_source(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attr_sources
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, raw)| raw.as_str())
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        if let Some(el) = self.element_mut(id) {
            el.attrs.retain(|(key, _)| key != name);
        }
    }

    pub fn classes(&self, id: NodeId) -> impl Iterator<Item = &str> {
        self.attr(id, "class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.classes(id).any(|c| c == class)
    }

    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if self.element(id).is_none() || self.has_class(id, class) {
            return;
        }
        let mut list: Vec<String> = self.classes(id).map(str::to_string).collect();
        list.push(class.to_string());
        self.set_attr(id, "class", list.join(" "));
    }

    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        if !self.has_class(id, class) {
            return;
        }
        let list: Vec<&str> = self.classes(id).filter(|&c| c != class).collect();
        let joined = list.join(" ");
        self.set_attr(id, "class", joined);
    }

    /// Read one declaration from the inline `style` attribute.
    pub fn style_property(&self, id: NodeId, property: &str) -> Option<String> {
        self.attr(id, "style")?
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .find(|(name, _)| name.trim() == property)
            .map(|(_, value)| value.trim().to_string())
    }

    /// Set one declaration in the inline `style` attribute, keeping the rest.
    pub fn set_style_property(&mut self, id: NodeId, property: &str, value: &str) {
        let mut decls: Vec<(String, String)> = self
            .attr(id, "style")
            .unwrap_or("")
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
            .filter(|(name, _)| !name.is_empty())
            .collect();
        match decls.iter_mut().find(|(name, _)| name == property) {
            Some(slot) => slot.1 = value.to_string(),
            None => decls.push((property.to_string(), value.to_string())),
        }
        let style = decls
            .iter()
            .map(|(name, value)| format!("{name}: {value};"))
            .collect::<Vec<_>>()
            .join(" ");
        self.set_attr(id, "style", style);
    }

    pub fn is_disabled(&self, id: NodeId) -> bool {
        self.has_attr(id, "disabled")
    }

    pub fn set_disabled(&mut self, id: NodeId, disabled: bool) {
        if disabled {
            self.set_attr(id, "disabled", "");
        } else {
            self.remove_attr(id, "disabled");
        }
    }

    // =========================================================================
    // Text
    // =========================================================================

    /// Concatenated text of all descendant text nodes.
    pub fn text_content(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let NodeData::Text(text) = self.data(id) {
            out.push_str(text);
        }
        for node in self.descendants(id) {
            if let NodeData::Text(text) = self.data(node) {
                out.push_str(text);
            }
        }
        out
    }

    /// Replace all children with a single text node.
    pub fn set_text_content(&mut self, id: NodeId, text: &str) {
        for child in self.children(id).to_vec() {
            self.detach(child);
        }
        if !text.is_empty() {
            let node = self.create_text(text);
            self.append_child(id, node);
        }
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    pub fn body(&self) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&node| self.is_element(node, "body"))
    }

    pub fn element_by_id(&self, value: &str) -> Option<NodeId> {
        self.descendants(self.root())
            .into_iter()
            .find(|&node| self.attr(node, "id") == Some(value))
    }

    /// First descendant of `scope` matching `selector`.
    pub fn query(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
        self.descendants(scope)
            .into_iter()
            .find(|&node| selector.matches(self, node))
    }

    /// All descendants of `scope` matching `selector`, in document order.
    pub fn query_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|&node| selector.matches(self, node))
            .collect()
    }

    // =========================================================================
    // Focus
    // =========================================================================

    pub fn active_element(&self) -> Option<NodeId> {
        self.active.filter(|&node| self.is_connected(node))
    }

    /// Whether `id` can currently receive focus.
    pub fn is_focusable(&self, id: NodeId) -> bool {
        let Some(tag) = self.tag(id) else {
            return false;
        };
        if !self.is_connected(id) || self.is_disabled(id) {
            return false;
        }
        self.has_attr(id, "tabindex")
            || matches!(tag, "button" | "input" | "select" | "textarea")
            || (matches!(tag, "a" | "area") && self.has_attr(id, "href"))
    }

    /// Move focus to `id`. Returns `false` and leaves focus alone when `id`
    /// cannot take focus.
    pub fn focus(&mut self, id: NodeId) -> bool {
        if !self.is_focusable(id) {
            return false;
        }
        self.active = Some(id);
        true
    }

    // =========================================================================
    // Images and layout
    // =========================================================================

    pub fn image_state(&self, id: NodeId) -> Option<&ImageState> {
        self.element(id).map(|el| &el.image)
    }

    /// Record a finished load with its decoded size.
    pub fn set_natural_size(&mut self, id: NodeId, size: Dimensions) {
        if let Some(el) = self.element_mut(id) {
            el.image.natural_size = Some(size);
            el.image.complete = true;
        }
    }

    /// Mark an image as done loading without a decoded size (broken image).
    pub fn mark_complete(&mut self, id: NodeId) {
        if let Some(el) = self.element_mut(id) {
            el.image.complete = true;
        }
    }

    pub fn rect(&self, id: NodeId) -> Option<Rect> {
        self.element(id).and_then(|el| el.rect)
    }

    pub fn set_rect(&mut self, id: NodeId, rect: Rect) {
        if let Some(el) = self.element_mut(id) {
            el.rect = Some(rect);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc_with_body() -> (Document, NodeId) {
        let mut doc = Document::new();
        let html = doc.create_element("html");
        let body = doc.create_element("body");
        let root = doc.root();
        doc.append_child(root, html);
        doc.append_child(html, body);
        (doc, body)
    }

    #[test]
    fn class_list_round_trips_through_attribute() {
        let (mut doc, body) = doc_with_body();
        doc.add_class(body, "a");
        doc.add_class(body, "b");
        doc.add_class(body, "a");
        assert_eq!(doc.attr(body, "class"), Some("a b"));
        doc.remove_class(body, "a");
        assert_eq!(doc.attr(body, "class"), Some("b"));
        assert!(!doc.has_class(body, "a"));
    }

    #[test]
    fn insert_before_falls_back_to_append() {
        let (mut doc, body) = doc_with_body();
        let first = doc.create_element("p");
        let stray = doc.create_element("span");
        doc.append_child(body, first);
        let toolbar = doc.create_element("div");
        doc.insert_before(body, toolbar, stray);
        assert_eq!(doc.children(body), &[first, toolbar]);

        let other = doc.create_element("div");
        doc.insert_before(body, other, first);
        assert_eq!(doc.children(body), &[other, first, toolbar]);
    }

    #[test]
    fn text_content_concatenates_descendants() {
        let (mut doc, body) = doc_with_body();
        let p = doc.create_element("p");
        doc.append_child(body, p);
        let a = doc.create_text("Hello ");
        let em = doc.create_element("em");
        let b = doc.create_text("world");
        doc.append_child(p, a);
        doc.append_child(p, em);
        doc.append_child(em, b);
        assert_eq!(doc.text_content(p), "Hello world");

        doc.set_text_content(p, "replaced");
        assert_eq!(doc.text_content(p), "replaced");
        assert_eq!(doc.children(p).len(), 1);
    }

    #[test]
    fn focus_requires_focusable_connected_element() {
        let (mut doc, body) = doc_with_body();
        let div = doc.create_element("div");
        let button = doc.create_element("button");
        doc.append_child(body, div);
        assert!(!doc.focus(div));
        assert!(!doc.focus(button), "detached button cannot take focus");

        doc.append_child(body, button);
        assert!(doc.focus(button));
        assert_eq!(doc.active_element(), Some(button));

        doc.set_disabled(button, true);
        assert!(!doc.is_focusable(button));

        doc.set_attr(div, "tabindex", "-1");
        assert!(doc.focus(div));
    }

    #[test]
    fn style_property_preserves_other_declarations() {
        let (mut doc, body) = doc_with_body();
        doc.set_attr(body, "style", "color: red;");
        doc.set_style_property(body, "--reveal-order", "3");
        doc.set_style_property(body, "color", "blue");
        assert_eq!(doc.style_property(body, "color").as_deref(), Some("blue"));
        assert_eq!(doc.style_property(body, "--reveal-order").as_deref(), Some("3"));
        assert_eq!(doc.attr(body, "style"), Some("color: blue; --reveal-order: 3;"));
    }

    #[test]
    fn natural_size_marks_complete() {
        let (mut doc, body) = doc_with_body();
        let img = doc.create_element("img");
        doc.append_child(body, img);
        assert!(!doc.image_state(img).unwrap().complete);
        doc.set_natural_size(
            img,
            Dimensions {
                width: 10,
                height: 20,
            },
        );
        let state = doc.image_state(img).unwrap();
        assert!(state.complete);
        assert_eq!(state.natural_size.unwrap().height, 20);
    }
}
