//! Document head elements on the client.

use std::collections::BTreeMap;

use tephra_proto::{Attrs, HeadElementId};
use tracing::debug;

/// One rendered head element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeadElement {
    /// Tag name
    pub tag: String,
    /// String attributes
    pub attributes: BTreeMap<String, String>,
    /// Text content, from a `children` attribute
    pub text: Option<String>,
}

/// Head elements in insertion order.
#[derive(Debug, Default)]
pub struct Head {
    order: Vec<HeadElementId>,
    elements: BTreeMap<HeadElementId, HeadElement>,
}

impl Head {
    /// Empty head.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the element with `id` in place, or append it.
    pub fn append_or_update(&mut self, id: HeadElementId, tag: &str, attrs: &Attrs) {
        let mut element =
            HeadElement { tag: tag.to_owned(), attributes: BTreeMap::new(), text: None };
        for (name, value) in attrs {
            if name == "children" {
                if let Some(text) = value.as_str() {
                    element.text = Some(text.to_owned());
                }
            } else {
                element.attributes.insert(name.clone(), value.to_string());
            }
        }
        if self.elements.insert(id, element).is_none() {
            self.order.push(id);
        }
    }

    /// Remove an element. Unknown ids are ignored.
    pub fn delete(&mut self, id: HeadElementId) {
        if self.elements.remove(&id).is_none() {
            debug!(element = %id, "delete for unknown head element");
            return;
        }
        self.order.retain(|e| *e != id);
    }

    /// Element by id.
    pub fn get(&self, id: HeadElementId) -> Option<&HeadElement> {
        self.elements.get(&id)
    }

    /// Elements in document order.
    pub fn iter(&self) -> impl Iterator<Item = (HeadElementId, &HeadElement)> {
        self.order.iter().filter_map(|id| self.elements.get(id).map(|e| (*id, e)))
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the head is empty.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.order.clear();
        self.elements.clear();
    }
}

#[cfg(test)]
mod tests {
    use tephra_proto::AttrValue;

    use super::*;

    #[test]
    fn update_replaces_in_place() {
        let mut head = Head::new();
        let title = Attrs::from([("children".to_owned(), AttrValue::from("One"))]);
        head.append_or_update(HeadElementId(0), "title", &title);
        head.append_or_update(
            HeadElementId(1),
            "meta",
            &Attrs::from([("name".to_owned(), AttrValue::from("x"))]),
        );
        let renamed = Attrs::from([("children".to_owned(), AttrValue::from("Two"))]);
        head.append_or_update(HeadElementId(0), "title", &renamed);

        let order: Vec<_> = head.iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec![HeadElementId(0), HeadElementId(1)]);
        assert_eq!(head.get(HeadElementId(0)).and_then(|e| e.text.as_deref()), Some("Two"));
        assert_eq!(
            head.get(HeadElementId(1)).and_then(|e| e.attributes.get("name")).map(String::as_str),
            Some("x")
        );
    }

    #[test]
    fn delete_unknown_is_ignored() {
        let mut head = Head::new();
        head.delete(HeadElementId(3));
        assert!(head.is_empty());
    }
}
