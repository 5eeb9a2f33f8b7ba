//! Dynamically typed attribute values.
//!
//! The authority decides attribute types at runtime, so the wire carries an
//! explicit kind for every value instead of coercing everything to strings.
//! Nested lists and maps are used for `style` and for head-element attributes.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};

/// Attribute map, iterated in key order.
pub type Attrs = BTreeMap<String, AttrValue>;

/// One attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    /// Explicit null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Floating point number
    Float(f64),
    /// UTF-8 string
    String(String),
    /// Ordered list
    List(Vec<AttrValue>),
    /// String-keyed map
    Map(BTreeMap<String, AttrValue>),
    /// Marker telling the client to install a forwarding listener for the
    /// attribute's event name. The handler itself never leaves the authority.
    Callback,
}

impl AttrValue {
    /// Whether this is the callback marker.
    pub fn is_callback(&self) -> bool {
        matches!(self, Self::Callback)
    }

    /// Borrow the string payload, if any.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload, if any.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric payload of `Int` or `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Whether this is a number.
    pub fn is_number(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }

    /// Borrow the map payload, if any.
    pub fn as_map(&self) -> Option<&BTreeMap<String, AttrValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Nesting depth; scalars are depth 0.
    pub fn depth(&self) -> usize {
        match self {
            Self::List(items) => 1 + items.iter().map(Self::depth).max().unwrap_or(0),
            Self::Map(entries) => 1 + entries.values().map(Self::depth).max().unwrap_or(0),
            _ => 0,
        }
    }
}

/// Textual form used when a value is written as a plain element attribute.
impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                Ok(())
            },
            Self::Map(_) => f.write_str("[object Object]"),
            Self::Callback => f.write_str("[callback]"),
        }
    }
}

impl From<&str> for AttrValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_owned())
    }
}

impl From<String> for AttrValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for AttrValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for AttrValue {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for AttrValue {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<f64> for AttrValue {
    fn from(x: f64) -> Self {
        Self::Float(x)
    }
}

impl From<BTreeMap<String, AttrValue>> for AttrValue {
    fn from(m: BTreeMap<String, AttrValue>) -> Self {
        Self::Map(m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_attribute_text() {
        assert_eq!(AttrValue::from(1.0).to_string(), "1");
        assert_eq!(AttrValue::from(1.5).to_string(), "1.5");
        assert_eq!(AttrValue::from(true).to_string(), "true");
        assert_eq!(AttrValue::from("x").to_string(), "x");
        assert_eq!(
            AttrValue::List(vec![AttrValue::Int(1), AttrValue::from("a")]).to_string(),
            "1,a"
        );
    }

    #[test]
    fn depth_counts_containers() {
        assert_eq!(AttrValue::Null.depth(), 0);
        let nested = AttrValue::List(vec![AttrValue::Map(BTreeMap::from([(
            "k".to_owned(),
            AttrValue::Int(1),
        )]))]);
        assert_eq!(nested.depth(), 2);
    }
}
