//! Typed attribute values.
//!
//! GLM attribute values arrive as raw text. The schema registry maps each
//! (class, attribute) pair to a [`SemanticKind`]; [`AttributeValue::parse`]
//! converts raw text into the matching closed variant, falling back to
//! [`AttributeValue::Text`] when the conversion fails so that unusual
//! values (unit-suffixed numbers, `${...}` macros) survive a round trip
//! untouched.

use serde::Serialize;

/// Semantic kind of a schema attribute.
///
/// Declared primitive kinds in the schema source map onto these via
/// [`SemanticKind::from_primitive`]. Timestamp, complex and array kinds are
/// stored text-encoded; only their kind tag differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SemanticKind {
    Real,
    Integer,
    Text,
    Bool,
    Timestamp,
    Complex,
    ComplexArray,
    RealArray,
    Enumeration,
    Set,
    ObjectRef,
}

impl SemanticKind {
    /// Map a declared primitive kind from the schema source onto a semantic
    /// kind. Returns `None` for unrecognized primitives, which callers skip
    /// with a diagnostic.
    pub fn from_primitive(primitive: &str) -> Option<SemanticKind> {
        match primitive {
            "double" => Some(SemanticKind::Real),
            "char8" | "char32" | "char256" | "char1024" => Some(SemanticKind::Text),
            "int16" | "int32" | "int64" => Some(SemanticKind::Integer),
            "enumeration" => Some(SemanticKind::Enumeration),
            "set" => Some(SemanticKind::Set),
            "bool" => Some(SemanticKind::Bool),
            "timestamp" => Some(SemanticKind::Timestamp),
            "complex" => Some(SemanticKind::Complex),
            "complex_array" => Some(SemanticKind::ComplexArray),
            "double_array" => Some(SemanticKind::RealArray),
            "enduse" | "loadshape" | "object" | "parent" => Some(SemanticKind::ObjectRef),
            _ => None,
        }
    }
}

/// A typed attribute value.
///
/// A closed tagged variant replacing the source language's dynamic
/// attribute injection. The textual form emitted by `Display` is what the
/// serializer writes back to a GLM file.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Real(f64),
    Integer(i64),
    Text(String),
    Bool(bool),
    /// Enumeration or set-of-flags keyword(s), e.g. `SWING` or `ABCN`
    Enum(String),
    /// Reference to another instance by name
    Object(String),
}

impl AttributeValue {
    /// Convert raw attribute text to the variant matching `kind`.
    ///
    /// Unit-suffixed numbers ("2500 kVA"), complex literals and anything
    /// else that fails strict conversion fall back to `Text` so the raw
    /// form is preserved.
    pub fn parse(kind: SemanticKind, raw: &str) -> AttributeValue {
        let raw = raw.trim();
        match kind {
            SemanticKind::Real => match raw.parse::<f64>() {
                Ok(v) => AttributeValue::Real(v),
                Err(_) => AttributeValue::Text(raw.to_string()),
            },
            SemanticKind::Integer => match raw.parse::<i64>() {
                Ok(v) => AttributeValue::Integer(v),
                Err(_) => AttributeValue::Text(raw.to_string()),
            },
            SemanticKind::Bool => match raw {
                "true" | "TRUE" => AttributeValue::Bool(true),
                "false" | "FALSE" => AttributeValue::Bool(false),
                _ => AttributeValue::Text(raw.to_string()),
            },
            SemanticKind::Enumeration | SemanticKind::Set => {
                AttributeValue::Enum(raw.to_string())
            }
            SemanticKind::ObjectRef => AttributeValue::Object(raw.to_string()),
            SemanticKind::Text
            | SemanticKind::Timestamp
            | SemanticKind::Complex
            | SemanticKind::ComplexArray
            | SemanticKind::RealArray => AttributeValue::Text(raw.to_string()),
        }
    }

    /// Raw text storage, used for attributes with no schema descriptor.
    pub fn text(raw: impl Into<String>) -> AttributeValue {
        AttributeValue::Text(raw.into())
    }

    /// The referenced instance name, if this value is a name-bearing
    /// variant (object reference, free text, or keyword).
    pub fn as_name(&self) -> Option<&str> {
        match self {
            AttributeValue::Object(s) | AttributeValue::Text(s) | AttributeValue::Enum(s) => {
                Some(s)
            }
            _ => None,
        }
    }

    /// True if the textual payload equals `name`. Used by rename to find
    /// every by-name reference regardless of stored variant.
    pub fn names(&self, name: &str) -> bool {
        self.as_name() == Some(name)
    }

    /// Replace the textual payload, keeping the variant. No-op for numeric
    /// and boolean variants.
    pub fn rename(&mut self, new_name: &str) {
        match self {
            AttributeValue::Object(s) | AttributeValue::Text(s) | AttributeValue::Enum(s) => {
                *s = new_name.to_string();
            }
            _ => {}
        }
    }
}

impl std::fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AttributeValue::Real(v) => write!(f, "{}", v),
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => write!(f, "{}", v),
            AttributeValue::Bool(v) => write!(f, "{}", v),
            AttributeValue::Enum(v) => write!(f, "{}", v),
            AttributeValue::Object(v) => write!(f, "{}", v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_mapping() {
        assert_eq!(
            SemanticKind::from_primitive("double"),
            Some(SemanticKind::Real)
        );
        assert_eq!(
            SemanticKind::from_primitive("char256"),
            Some(SemanticKind::Text)
        );
        assert_eq!(
            SemanticKind::from_primitive("int32"),
            Some(SemanticKind::Integer)
        );
        assert_eq!(
            SemanticKind::from_primitive("set"),
            Some(SemanticKind::Set)
        );
        assert_eq!(
            SemanticKind::from_primitive("loadshape"),
            Some(SemanticKind::ObjectRef)
        );
        assert_eq!(SemanticKind::from_primitive("quaternion"), None);
    }

    #[test]
    fn test_parse_real() {
        assert_eq!(
            AttributeValue::parse(SemanticKind::Real, "7200"),
            AttributeValue::Real(7200.0)
        );
        // unit suffix falls back to text, preserving the raw form
        assert_eq!(
            AttributeValue::parse(SemanticKind::Real, "2500 kVA"),
            AttributeValue::Text("2500 kVA".to_string())
        );
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(
            AttributeValue::parse(SemanticKind::Bool, "true"),
            AttributeValue::Bool(true)
        );
        assert_eq!(
            AttributeValue::parse(SemanticKind::Bool, "maybe"),
            AttributeValue::Text("maybe".to_string())
        );
    }

    #[test]
    fn test_display_round_trip() {
        let v = AttributeValue::parse(SemanticKind::Real, "7200");
        assert_eq!(v.to_string(), "7200");
        let v = AttributeValue::parse(SemanticKind::Set, "ABCN");
        assert_eq!(v.to_string(), "ABCN");
    }

    #[test]
    fn test_rename() {
        let mut v = AttributeValue::Object("n1".to_string());
        assert!(v.names("n1"));
        v.rename("n1_renamed");
        assert_eq!(v.to_string(), "n1_renamed");
        assert!(!v.names("n1"));

        let mut numeric = AttributeValue::Real(1.0);
        numeric.rename("n1");
        assert_eq!(numeric, AttributeValue::Real(1.0));
    }
}
