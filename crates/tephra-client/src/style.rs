//! Inline style application.
//!
//! Numeric values get a `px` suffix unless the property is dimensionless.
//! The dimensionless test is the case-insensitive pattern
//!
//! ```text
//! acit|ex(?:s|g|n|p|$)|rph|grid|ows|mnc|ntw|ine[ch]|zoo|^ord
//! ```
//!
//! which catches `opacity`, `flex`, `flexGrow`, `zIndex`, `lineHeight`,
//! `order`, `zoom` and friends.

use tephra_proto::AttrValue;

/// Whether `name` takes unitless numbers.
pub fn is_dimensionless(name: &str) -> bool {
    let name = name.to_ascii_lowercase();
    if name.starts_with("ord") {
        return true;
    }
    if ["acit", "rph", "grid", "ows", "mnc", "ntw", "zoo"].iter().any(|p| name.contains(p)) {
        return true;
    }
    let bytes = name.as_bytes();
    bytes.windows(2).enumerate().any(|(i, w)| match w {
        b"ex" => matches!(bytes.get(i + 2), None | Some(b's' | b'g' | b'n' | b'p')),
        b"in" => bytes.get(i + 2) == Some(&b'e') && matches!(bytes.get(i + 3), Some(b'c' | b'h')),
        _ => false,
    })
}

/// CSS text for a style value; `None` clears the property.
pub fn style_value(name: &str, value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::Null => None,
        AttrValue::Int(_) | AttrValue::Float(_)
            if !name.starts_with('-') && !is_dimensionless(name) =>
        {
            Some(format!("{value}px"))
        },
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensionless_properties() {
        for name in ["opacity", "flex", "flexGrow", "zIndex", "lineHeight", "order", "zoom"] {
            assert!(is_dimensionless(name), "{name}");
        }
        for name in ["width", "marginTop", "fontSize", "borderRadius", "lineWidth"] {
            assert!(!is_dimensionless(name), "{name}");
        }
    }

    #[test]
    fn numbers_get_px_unless_dimensionless() {
        assert_eq!(style_value("width", &AttrValue::Int(10)).as_deref(), Some("10px"));
        assert_eq!(style_value("opacity", &AttrValue::Float(0.5)).as_deref(), Some("0.5"));
        assert_eq!(style_value("--gap", &AttrValue::Int(4)).as_deref(), Some("4"));
        assert_eq!(style_value("color", &AttrValue::from("red")).as_deref(), Some("red"));
        assert_eq!(style_value("color", &AttrValue::Null), None);
    }
}
