//! Document-head elements.
//!
//! Head elements (`title`, `meta`, `link`, ...) live outside the node tree and
//! have their own id space starting at 0. The client replaces an element
//! wholesale on every update, so the registry remembers the last sent tag and
//! attributes and only produces a mutation when one of them changed.

use std::collections::HashMap;

use tephra_proto::{Attrs, HeadElementId, Mutation};

use crate::error::TreeError;

#[derive(Debug, Clone, PartialEq)]
struct HeadElement {
    tag: String,
    attrs: Attrs,
}

/// Head elements of one session.
#[derive(Debug, Default)]
pub struct HeadRegistry {
    elements: HashMap<HeadElementId, HeadElement>,
    next_id: u64,
}

impl HeadRegistry {
    /// Empty registry; the first id is 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new element and build its `AppendOrUpdateHead`.
    pub fn append(&mut self, tag: &str, attrs: Attrs) -> (HeadElementId, Mutation) {
        let element = HeadElementId(self.next_id);
        self.next_id += 1;
        self.elements.insert(element, HeadElement { tag: tag.to_owned(), attrs: attrs.clone() });
        (element, Mutation::AppendOrUpdateHead { element, tag: tag.to_owned(), attrs })
    }

    /// Replace an element. `None` when tag and attrs are unchanged.
    pub fn update(
        &mut self,
        element: HeadElementId,
        tag: &str,
        attrs: Attrs,
    ) -> Result<Option<Mutation>, TreeError> {
        let current =
            self.elements.get_mut(&element).ok_or(TreeError::UnknownHeadElement(element))?;
        if current.tag == tag && current.attrs == attrs {
            return Ok(None);
        }
        current.tag = tag.to_owned();
        current.attrs = attrs.clone();
        Ok(Some(Mutation::AppendOrUpdateHead { element, tag: tag.to_owned(), attrs }))
    }

    /// Forget an element and build its `DeleteHead`.
    pub fn remove(&mut self, element: HeadElementId) -> Result<Mutation, TreeError> {
        self.elements.remove(&element).ok_or(TreeError::UnknownHeadElement(element))?;
        Ok(Mutation::DeleteHead { element })
    }

    /// Whether `element` is live.
    pub fn contains(&self, element: HeadElementId) -> bool {
        self.elements.contains_key(&element)
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether no element is live.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tephra_proto::AttrValue;

    use super::*;

    fn title(text: &str) -> Attrs {
        Attrs::from([("children".to_owned(), AttrValue::from(text))])
    }

    #[test]
    fn ids_count_from_zero() {
        let mut head = HeadRegistry::new();
        let (a, _) = head.append("title", title("a"));
        let (b, _) = head.append("meta", Attrs::new());
        assert_eq!((a, b), (HeadElementId(0), HeadElementId(1)));
    }

    #[test]
    fn unchanged_update_is_silent() {
        let mut head = HeadRegistry::new();
        let (id, _) = head.append("title", title("a"));
        assert_eq!(head.update(id, "title", title("a")), Ok(None));
        assert_eq!(
            head.update(id, "title", title("b")),
            Ok(Some(Mutation::AppendOrUpdateHead {
                element: id,
                tag: "title".into(),
                attrs: title("b")
            }))
        );
    }

    #[test]
    fn removed_element_is_unknown() {
        let mut head = HeadRegistry::new();
        let (id, _) = head.append("title", title("a"));
        assert_eq!(head.remove(id), Ok(Mutation::DeleteHead { element: id }));
        assert_eq!(head.remove(id), Err(TreeError::UnknownHeadElement(id)));
        assert_eq!(head.update(id, "title", Attrs::new()), Err(TreeError::UnknownHeadElement(id)));
    }
}
