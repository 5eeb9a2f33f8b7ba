//! Element props as produced by the rendering collaborator, and the pure parts
//! of diffing them into attribute changes.
//!
//! Props map names to either a plain [`AttrValue`] or a [`Handler`]. A prop
//! whose name is `on` followed by an uppercase letter is an event prop; its
//! event name is the lowercased remainder (`onClick` → `click`).

use std::collections::{BTreeMap, BTreeSet};

use tephra_proto::{AttrValue, Attrs};

use crate::handler::Handler;

/// One prop value.
#[derive(Debug, Clone)]
pub enum PropValue {
    /// Plain attribute value
    Value(AttrValue),
    /// Event handler
    Handler(Handler),
}

impl PropValue {
    /// Plain value, treating `Null` as absent.
    pub fn as_value(&self) -> Option<&AttrValue> {
        match self {
            Self::Value(AttrValue::Null) | Self::Handler(_) => None,
            Self::Value(v) => Some(v),
        }
    }

    /// Handler, if this is one.
    pub fn as_handler(&self) -> Option<&Handler> {
        match self {
            Self::Handler(h) => Some(h),
            Self::Value(_) => None,
        }
    }
}

/// Values compare structurally, handlers by identity.
impl PartialEq for PropValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Handler(a), Self::Handler(b)) => a.same(b),
            _ => false,
        }
    }
}

impl From<Handler> for PropValue {
    fn from(h: Handler) -> Self {
        Self::Handler(h)
    }
}

impl From<AttrValue> for PropValue {
    fn from(v: AttrValue) -> Self {
        Self::Value(v)
    }
}

macro_rules! value_prop_from {
    ($($ty:ty),*) => {
        $(impl From<$ty> for PropValue {
            fn from(v: $ty) -> Self {
                Self::Value(AttrValue::from(v))
            }
        })*
    };
}

value_prop_from!(&str, String, bool, i32, i64, f64);

/// Props of one element.
pub type Props = BTreeMap<String, PropValue>;

/// Event name for an event prop, e.g. `onClick` → `click`.
pub fn event_name(prop: &str) -> Option<String> {
    let rest = prop.strip_prefix("on")?;
    let first = rest.chars().next()?;
    first.is_uppercase().then(|| rest.to_lowercase())
}

/// Names whose values differ between `old` and `new`, in key order.
pub fn changed_props<'a>(old: &'a Props, new: &'a Props) -> Vec<&'a str> {
    let keys: BTreeSet<&str> = old.keys().chain(new.keys()).map(String::as_str).collect();
    keys.into_iter().filter(|k| old.get(*k) != new.get(*k)).collect()
}

/// Shallow diff of two `style` maps.
///
/// Properties that disappear or become null are sent as the empty string,
/// which clears them on the client. Returns `None` when nothing changed.
pub fn style_diff(old: Option<&AttrValue>, new: Option<&AttrValue>) -> Option<Attrs> {
    let empty = BTreeMap::new();
    let old = old.and_then(AttrValue::as_map).unwrap_or(&empty);
    let new = new.and_then(AttrValue::as_map).unwrap_or(&empty);

    let mut diff = Attrs::new();
    for name in old.keys().chain(new.keys()) {
        if old.get(name) == new.get(name) || diff.contains_key(name) {
            continue;
        }
        let value = match new.get(name) {
            None | Some(AttrValue::Null) => AttrValue::String(String::new()),
            Some(v) => v.clone(),
        };
        diff.insert(name.clone(), value);
    }
    (!diff.is_empty()).then_some(diff)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_prop_names() {
        assert_eq!(event_name("onClick").as_deref(), Some("click"));
        assert_eq!(event_name("onDoubleClick").as_deref(), Some("doubleclick"));
        assert_eq!(event_name("one"), None);
        assert_eq!(event_name("on"), None);
        assert_eq!(event_name("title"), None);
    }

    #[test]
    fn changed_props_compares_handlers_by_identity() {
        let h = Handler::new(|_| {});
        let old = Props::from([
            ("onClick".to_owned(), PropValue::from(h.clone())),
            ("title".to_owned(), PropValue::from("a")),
        ]);
        let new = Props::from([
            ("onClick".to_owned(), PropValue::from(h)),
            ("title".to_owned(), PropValue::from("b")),
            ("id".to_owned(), PropValue::from("x")),
        ]);
        assert_eq!(changed_props(&old, &new), vec!["id", "title"]);
    }

    #[test]
    fn style_diff_clears_removed_properties() {
        let old = AttrValue::Map(BTreeMap::from([
            ("color".to_owned(), AttrValue::from("red")),
            ("width".to_owned(), AttrValue::Int(10)),
        ]));
        let new = AttrValue::Map(BTreeMap::from([
            ("color".to_owned(), AttrValue::from("red")),
            ("height".to_owned(), AttrValue::Int(0)),
        ]));
        let diff = style_diff(Some(&old), Some(&new)).unwrap();
        assert_eq!(diff.get("width"), Some(&AttrValue::String(String::new())));
        assert_eq!(diff.get("height"), Some(&AttrValue::Int(0)));
        assert!(!diff.contains_key("color"));

        assert_eq!(style_diff(Some(&old), Some(&old)), None);
    }
}
