//! In-memory document model.
//!
//! A small arena of elements and text nodes standing in for the platform
//! DOM. It holds exactly what the replay engine needs: tree shape, string
//! attributes, inline style, form-control state and document focus. Nodes
//! carry no protocol ids of their own; the replay engine stamps
//! [`NODE_ID_ATTR`](tephra_proto::NODE_ID_ATTR) on the elements it creates,
//! the same way a browser client tags real DOM nodes.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
};

use tephra_proto::{NODE_ID_ATTR, NodeId};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomId(u64);

impl fmt::Display for DomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dom#{}", self.0)
    }
}

/// Element data.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    tag: String,
    attributes: BTreeMap<String, String>,
    style: BTreeMap<String, String>,
    value: String,
    checked: bool,
}

impl Element {
    /// Lowercase tag name.
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Attribute value.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    /// All attributes.
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    /// Inline style property.
    pub fn style(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }

    /// Control value.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Checked state.
    pub fn checked(&self) -> bool {
        self.checked
    }

    /// `input`, `textarea` or `select`.
    pub fn is_form_control(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea" | "select")
    }

    /// `input` or `textarea`, whose value the user types into.
    pub fn is_text_like(&self) -> bool {
        matches!(self.tag.as_str(), "input" | "textarea")
    }

    /// Checkbox or radio input.
    pub fn is_checkable(&self) -> bool {
        self.tag == "input" && matches!(self.attribute("type"), Some("checkbox" | "radio"))
    }

    /// Button or input that submits its form when clicked.
    pub fn is_submit_control(&self) -> bool {
        match self.tag.as_str() {
            "button" => matches!(self.attribute("type"), None | Some("submit")),
            "input" => self.attribute("type") == Some("submit"),
            _ => false,
        }
    }
}

/// Kind of a document node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomNodeKind {
    /// Element
    Element(Element),
    /// Text node
    Text(String),
}

#[derive(Debug, Clone)]
struct DomNode {
    kind: DomNodeKind,
    parent: Option<DomId>,
    children: Vec<DomId>,
}

/// The document.
///
/// All methods taking a [`DomId`] return `None`/`false` for ids that are not
/// in the document instead of panicking; the replay engine validates ids
/// against its own registry first.
#[derive(Debug)]
pub struct Document {
    nodes: HashMap<DomId, DomNode>,
    root: DomId,
    focused: Option<DomId>,
    next: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Empty document with a `div` synchronization root.
    pub fn new() -> Self {
        let root = DomId(0);
        let element = Element { tag: "div".into(), ..Element::default() };
        let nodes = HashMap::from([(
            root,
            DomNode { kind: DomNodeKind::Element(element), parent: None, children: Vec::new() },
        )]);
        Self { nodes, root, focused: None, next: 1 }
    }

    /// Synchronization root container.
    pub fn root(&self) -> DomId {
        self.root
    }

    /// Create a detached element.
    pub fn create_element(&mut self, tag: &str) -> DomId {
        let element = Element { tag: tag.to_ascii_lowercase(), ..Element::default() };
        self.insert(DomNodeKind::Element(element))
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> DomId {
        self.insert(DomNodeKind::Text(text.to_owned()))
    }

    fn insert(&mut self, kind: DomNodeKind) -> DomId {
        let id = DomId(self.next);
        self.next += 1;
        self.nodes.insert(id, DomNode { kind, parent: None, children: Vec::new() });
        id
    }

    /// Whether `id` is in the document arena.
    pub fn contains(&self, id: DomId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Node kind.
    pub fn kind(&self, id: DomId) -> Option<&DomNodeKind> {
        self.nodes.get(&id).map(|n| &n.kind)
    }

    /// Element data, if `id` is an element.
    pub fn element(&self, id: DomId) -> Option<&Element> {
        match &self.nodes.get(&id)?.kind {
            DomNodeKind::Element(e) => Some(e),
            DomNodeKind::Text(_) => None,
        }
    }

    fn element_mut(&mut self, id: DomId) -> Option<&mut Element> {
        match &mut self.nodes.get_mut(&id)?.kind {
            DomNodeKind::Element(e) => Some(e),
            DomNodeKind::Text(_) => None,
        }
    }

    /// Text content of a text node.
    pub fn text(&self, id: DomId) -> Option<&str> {
        match &self.nodes.get(&id)?.kind {
            DomNodeKind::Text(t) => Some(t),
            DomNodeKind::Element(_) => None,
        }
    }

    /// Replace a text node's content. Returns whether `id` is a text node.
    pub fn set_text(&mut self, id: DomId, text: &str) -> bool {
        match self.nodes.get_mut(&id).map(|n| &mut n.kind) {
            Some(DomNodeKind::Text(t)) => {
                text.clone_into(t);
                true
            },
            _ => false,
        }
    }

    /// Concatenated text of `id` and its descendants.
    pub fn text_content(&self, id: DomId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: DomId, out: &mut String) {
        let Some(node) = self.nodes.get(&id) else { return };
        match &node.kind {
            DomNodeKind::Text(t) => out.push_str(t),
            DomNodeKind::Element(_) => {
                for child in &node.children {
                    self.collect_text(*child, out);
                }
            },
        }
    }

    /// Parent, if attached.
    pub fn parent(&self, id: DomId) -> Option<DomId> {
        self.nodes.get(&id)?.parent
    }

    /// Children in order.
    pub fn children(&self, id: DomId) -> &[DomId] {
        self.nodes.get(&id).map_or(&[], |n| n.children.as_slice())
    }

    /// `id` followed by its ancestors, innermost first.
    pub fn ancestors(&self, id: DomId) -> Vec<DomId> {
        let mut path = Vec::new();
        let mut cursor = self.contains(id).then_some(id);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.parent(node);
        }
        path
    }

    /// Nearest `form` element at or above `id`.
    pub fn enclosing_form(&self, id: DomId) -> Option<DomId> {
        self.ancestors(id)
            .into_iter()
            .find(|n| self.element(*n).is_some_and(|e| e.tag == "form"))
    }

    /// Protocol id stamped on an element.
    pub fn node_id(&self, id: DomId) -> Option<NodeId> {
        self.element(id)?.attribute(NODE_ID_ATTR)?.parse().ok().map(NodeId)
    }

    /// Append `child` to `parent`, moving it if already attached.
    pub fn append_child(&mut self, parent: DomId, child: DomId) -> bool {
        self.attach(parent, child, None)
    }

    /// Insert `child` before `before` under `parent`.
    pub fn insert_before(&mut self, parent: DomId, child: DomId, before: DomId) -> bool {
        self.attach(parent, child, Some(before))
    }

    fn attach(&mut self, parent: DomId, child: DomId, before: Option<DomId>) -> bool {
        if !self.contains(child) || self.element(parent).is_none() || child == self.root {
            return false;
        }
        if self.ancestors(parent).contains(&child) {
            return false;
        }
        self.detach(child);
        let Some(node) = self.nodes.get_mut(&parent) else { return false };
        let index = before
            .and_then(|b| node.children.iter().position(|&c| c == b))
            .unwrap_or(node.children.len());
        node.children.insert(index, child);
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
        true
    }

    fn detach(&mut self, child: DomId) {
        let Some(parent) = self.nodes.get_mut(&child).and_then(|c| c.parent.take()) else {
            return;
        };
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != child);
        }
    }

    /// Remove `child` and its subtree from the document. Returns the removed
    /// handles, `child` first.
    pub fn remove_subtree(&mut self, child: DomId) -> Vec<DomId> {
        self.detach(child);
        let mut removed = Vec::new();
        let mut stack = vec![child];
        while let Some(id) = stack.pop() {
            if let Some(node) = self.nodes.remove(&id) {
                stack.extend(node.children.iter().rev());
                removed.push(id);
            }
        }
        if self.focused.is_some_and(|f| removed.contains(&f)) {
            self.focused = None;
        }
        removed
    }

    /// Drop every node under the root.
    pub fn clear_root(&mut self) {
        for child in self.children(self.root).to_vec() {
            self.remove_subtree(child);
        }
    }

    /// Set a string attribute.
    pub fn set_attribute(&mut self, id: DomId, name: &str, value: &str) -> bool {
        self.element_mut(id)
            .map(|e| e.attributes.insert(name.to_owned(), value.to_owned()))
            .is_some()
    }

    /// Remove an attribute.
    pub fn remove_attribute(&mut self, id: DomId, name: &str) -> bool {
        self.element_mut(id).is_some_and(|e| e.attributes.remove(name).is_some())
    }

    /// Set an inline style property; an empty value clears it.
    pub fn set_style(&mut self, id: DomId, name: &str, value: &str) -> bool {
        let Some(element) = self.element_mut(id) else { return false };
        if value.is_empty() {
            element.style.remove(name);
        } else {
            element.style.insert(name.to_owned(), value.to_owned());
        }
        true
    }

    /// Drop every inline style property.
    pub fn clear_style(&mut self, id: DomId) -> bool {
        self.element_mut(id).map(|e| e.style.clear()).is_some()
    }

    /// Set a control's value.
    pub fn set_value(&mut self, id: DomId, value: &str) -> bool {
        self.element_mut(id).map(|e| value.clone_into(&mut e.value)).is_some()
    }

    /// Set a control's checked state.
    pub fn set_checked(&mut self, id: DomId, checked: bool) -> bool {
        self.element_mut(id).map(|e| e.checked = checked).is_some()
    }

    /// Focused element.
    pub fn focused(&self) -> Option<DomId> {
        self.focused
    }

    /// Move focus to `id`.
    pub fn focus(&mut self, id: DomId) {
        if self.element(id).is_some() {
            self.focused = Some(id);
        }
    }

    /// Drop focus if `id` holds it.
    pub fn blur(&mut self, id: DomId) {
        if self.focused == Some(id) {
            self.focused = None;
        }
    }
}
