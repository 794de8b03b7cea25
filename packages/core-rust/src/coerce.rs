//! Conversion between textual wire values and typed [`Value`]s.
//!
//! Declared type names are matched case-insensitively and a handful of
//! aliases map onto each family (`int`, `integer` and `i32` are all
//! [`TypeFamily::Int`]). Only the text family accepts an empty value.

use crate::types::Value;

/// Leaf type families understood on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeFamily {
    Void,
    Boolean,
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
    Char,
    Text,
}

impl TypeFamily {
    /// Resolves a declared type name, accepting aliases and any letter case.
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let family = match lower.as_str() {
            "void" | "unit" | "()" => Self::Void,
            "boolean" | "bool" => Self::Boolean,
            "byte" | "i8" => Self::Byte,
            "short" | "i16" => Self::Short,
            "int" | "integer" | "i32" => Self::Int,
            "long" | "i64" => Self::Long,
            "float" | "f32" => Self::Float,
            "double" | "f64" => Self::Double,
            "char" | "character" => Self::Char,
            "string" | "str" | "text" => Self::Text,
            _ => return None,
        };
        Some(family)
    }

    /// The name this family is rendered with.
    #[must_use]
    pub fn canonical_name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Char => "char",
            Self::Text => "string",
        }
    }

    #[must_use]
    pub fn accepts_empty(self) -> bool {
        self == Self::Text
    }
}

/// Failure converting text to a typed value.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoerceError {
    #[error("unknown parameter type {0:?}")]
    UnknownType(String),
    #[error("type {0:?} cannot carry a value")]
    VoidParameter(String),
    #[error("empty value is not allowed for type {0:?}")]
    EmptyValue(String),
    #[error("invalid {type_name} value {value:?}: {reason}")]
    InvalidValue {
        type_name: String,
        value: String,
        reason: String,
    },
}

/// True when two declared type names denote the same type.
///
/// Known families compare by family; anything else compares
/// case-insensitively.
#[must_use]
pub fn types_equivalent(a: &str, b: &str) -> bool {
    match (TypeFamily::from_type_name(a), TypeFamily::from_type_name(b)) {
        (Some(fa), Some(fb)) => fa == fb,
        (None, None) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

/// Converts `text` into a value of the declared type.
///
/// # Errors
///
/// Returns `CoerceError` for unknown or void types, for empty text outside
/// the text family, and for text that does not parse as the declared type.
pub fn coerce(text: &str, type_name: &str) -> Result<Value, CoerceError> {
    let family = TypeFamily::from_type_name(type_name)
        .ok_or_else(|| CoerceError::UnknownType(type_name.to_string()))?;

    if family == TypeFamily::Void {
        return Err(CoerceError::VoidParameter(type_name.to_string()));
    }
    if family == TypeFamily::Text {
        return Ok(Value::Text(text.to_string()));
    }

    let trimmed = if family == TypeFamily::Char { text } else { text.trim() };
    if trimmed.is_empty() {
        return Err(CoerceError::EmptyValue(type_name.to_string()));
    }

    let invalid = |reason: String| CoerceError::InvalidValue {
        type_name: type_name.to_string(),
        value: text.to_string(),
        reason,
    };

    let value = match family {
        TypeFamily::Boolean => {
            if trimmed.eq_ignore_ascii_case("true") {
                Value::Bool(true)
            } else if trimmed.eq_ignore_ascii_case("false") {
                Value::Bool(false)
            } else {
                return Err(invalid("expected true or false".to_string()));
            }
        }
        TypeFamily::Byte => Value::Byte(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Short => Value::Short(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Int => Value::Int(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Long => Value::Long(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Float => Value::Float(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Double => Value::Double(trimmed.parse().map_err(|e| invalid(format!("{e}")))?),
        TypeFamily::Char => {
            let mut chars = trimmed.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Value::Char(c),
                _ => return Err(invalid("expected exactly one character".to_string())),
            }
        }
        TypeFamily::Text => Value::Text(text.to_string()),
        TypeFamily::Void => return Err(CoerceError::VoidParameter(type_name.to_string())),
    };
    Ok(value)
}

/// Renders a leaf value as text. Returns `None` for null and composites.
#[must_use]
pub fn render(value: &Value) -> Option<String> {
    let text = match value {
        Value::Bool(v) => v.to_string(),
        Value::Byte(v) => v.to_string(),
        Value::Short(v) => v.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Long(v) => v.to_string(),
        Value::Float(v) => v.to_string(),
        Value::Double(v) => v.to_string(),
        Value::Char(v) => v.to_string(),
        Value::Text(v) => v.clone(),
        Value::Null | Value::Sequence(_) | Value::Object(_) => return None,
    };
    Some(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_and_case() {
        assert_eq!(TypeFamily::from_type_name("INT"), Some(TypeFamily::Int));
        assert_eq!(TypeFamily::from_type_name("Integer"), Some(TypeFamily::Int));
        assert_eq!(TypeFamily::from_type_name("bool"), Some(TypeFamily::Boolean));
        assert_eq!(TypeFamily::from_type_name("String"), Some(TypeFamily::Text));
        assert_eq!(TypeFamily::from_type_name("Widget"), None);
    }

    #[test]
    fn equivalence() {
        assert!(types_equivalent("int", "Integer"));
        assert!(types_equivalent("Widget", "widget"));
        assert!(!types_equivalent("int", "long"));
        assert!(!types_equivalent("int", "Widget"));
    }

    #[test]
    fn coerce_numbers() {
        assert_eq!(coerce("42", "int").unwrap(), Value::Int(42));
        assert_eq!(coerce(" -7 ", "long").unwrap(), Value::Long(-7));
        assert_eq!(coerce("1.5", "double").unwrap(), Value::Double(1.5));
        assert_eq!(coerce("127", "byte").unwrap(), Value::Byte(127));
        assert!(matches!(
            coerce("128", "byte"),
            Err(CoerceError::InvalidValue { .. })
        ));
        assert!(matches!(coerce("abc", "int"), Err(CoerceError::InvalidValue { .. })));
    }

    #[test]
    fn empty_only_for_text() {
        assert_eq!(coerce("", "string").unwrap(), Value::Text(String::new()));
        assert_eq!(coerce("", "int"), Err(CoerceError::EmptyValue("int".into())));
        assert_eq!(coerce("  ", "boolean"), Err(CoerceError::EmptyValue("boolean".into())));
        assert_eq!(coerce("", "char"), Err(CoerceError::EmptyValue("char".into())));
    }

    #[test]
    fn coerce_bool_and_char() {
        assert_eq!(coerce("TRUE", "boolean").unwrap(), Value::Bool(true));
        assert!(coerce("yes", "boolean").is_err());
        assert_eq!(coerce("x", "char").unwrap(), Value::Char('x'));
        assert!(coerce("xy", "char").is_err());
        assert_eq!(coerce(" ", "char").unwrap(), Value::Char(' '));
    }

    #[test]
    fn unknown_and_void_types() {
        assert_eq!(coerce("1", "Widget"), Err(CoerceError::UnknownType("Widget".into())));
        assert_eq!(coerce("1", "void"), Err(CoerceError::VoidParameter("void".into())));
    }

    #[test]
    fn render_leaves() {
        assert_eq!(render(&Value::Int(3)).as_deref(), Some("3"));
        assert_eq!(render(&Value::Bool(false)).as_deref(), Some("false"));
        assert_eq!(render(&Value::Text("hi".into())).as_deref(), Some("hi"));
        assert_eq!(render(&Value::Null), None);
    }
}
