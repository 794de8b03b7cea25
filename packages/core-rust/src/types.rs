use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use crate::coerce::TypeFamily;
use crate::traits::Introspectable;

/// Shared handle to an introspectable object inside a value graph.
pub type ObjectRef = Arc<dyn Introspectable>;

/// Identity of an object instance, independent of value equality.
///
/// Two properties pointing at the same underlying instance produce the same
/// `ObjectId`; two equal-looking but distinct instances do not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId(usize);

impl ObjectId {
    /// Identity of the instance behind `obj` (its data address).
    #[must_use]
    pub fn of<T: Introspectable + ?Sized>(obj: &T) -> Self {
        Self(std::ptr::from_ref(obj).cast::<()>() as usize)
    }
}

/// Ordered sequence of values sharing a declared element type.
#[derive(Debug, Clone)]
pub struct Sequence {
    /// Declared type name of the elements (e.g. `"int"`, `"Connection"`).
    pub element_type: String,
    pub items: Vec<Value>,
}

/// Runtime value of a resource property, operation argument or result.
///
/// Leaf variants map one-to-one onto [`TypeFamily`]; `Sequence` and
/// `Object` are composite and are expanded by the graph walker.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Text(String),
    Sequence(Sequence),
    Object(ObjectRef),
}

impl Value {
    /// Wraps an introspectable object.
    pub fn object<T: Introspectable + 'static>(obj: T) -> Self {
        Self::Object(Arc::new(obj))
    }

    /// Builds a sequence from items and their declared element type.
    pub fn sequence(element_type: impl Into<String>, items: Vec<Value>) -> Self {
        Self::Sequence(Sequence {
            element_type: element_type.into(),
            items,
        })
    }

    /// The leaf type family of this value, if it is a leaf.
    #[must_use]
    pub fn family(&self) -> Option<TypeFamily> {
        match self {
            Self::Bool(_) => Some(TypeFamily::Boolean),
            Self::Byte(_) => Some(TypeFamily::Byte),
            Self::Short(_) => Some(TypeFamily::Short),
            Self::Int(_) => Some(TypeFamily::Int),
            Self::Long(_) => Some(TypeFamily::Long),
            Self::Float(_) => Some(TypeFamily::Float),
            Self::Double(_) => Some(TypeFamily::Double),
            Self::Char(_) => Some(TypeFamily::Char),
            Self::Text(_) => Some(TypeFamily::Text),
            Self::Null | Self::Sequence(_) | Self::Object(_) => None,
        }
    }

    /// Declared type name used when rendering this value.
    #[must_use]
    pub fn type_name(&self) -> Cow<'_, str> {
        match self {
            Self::Null => Cow::Borrowed("null"),
            Self::Sequence(seq) => Cow::Owned(format!("{}[]", seq.element_type)),
            Self::Object(obj) => Cow::Owned(obj.type_name().to_string()),
            leaf => Cow::Borrowed(
                leaf.family()
                    .map_or("unknown", TypeFamily::canonical_name),
            ),
        }
    }

    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.family().is_some()
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("Null"),
            Self::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Self::Byte(v) => f.debug_tuple("Byte").field(v).finish(),
            Self::Short(v) => f.debug_tuple("Short").field(v).finish(),
            Self::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Self::Long(v) => f.debug_tuple("Long").field(v).finish(),
            Self::Float(v) => f.debug_tuple("Float").field(v).finish(),
            Self::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Self::Char(v) => f.debug_tuple("Char").field(v).finish(),
            Self::Text(v) => f.debug_tuple("Text").field(v).finish(),
            Self::Sequence(seq) => f.debug_tuple("Sequence").field(seq).finish(),
            Self::Object(obj) => write!(f, "Object({})", obj.type_name()),
        }
    }
}

impl PartialEq for Value {
    /// Leaves compare by value; objects compare by instance identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Byte(a), Self::Byte(b)) => a == b,
            (Self::Short(a), Self::Short(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Long(a), Self::Long(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Double(a), Self::Double(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Sequence(a), Self::Sequence(b)) => {
                a.element_type == b.element_type && a.items == b.items
            }
            (Self::Object(a), Self::Object(b)) => ObjectId::of(a.as_ref()) == ObjectId::of(b.as_ref()),
            _ => false,
        }
    }
}

impl PartialEq for Sequence {
    fn eq(&self, other: &Self) -> bool {
        self.element_type == other.element_type && self.items == other.items
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Empty;

    impl Introspectable for Empty {
        fn type_name(&self) -> &str {
            "Empty"
        }
        fn property_names(&self) -> Vec<String> {
            Vec::new()
        }
        fn property_value(&self, name: &str) -> anyhow::Result<Value> {
            anyhow::bail!("no property {name}")
        }
    }

    #[test]
    fn type_names() {
        assert_eq!(Value::Int(1).type_name(), "int");
        assert_eq!(Value::Text("x".into()).type_name(), "string");
        assert_eq!(Value::Null.type_name(), "null");
        assert_eq!(Value::sequence("long", vec![]).type_name(), "long[]");
        assert_eq!(Value::object(Empty).type_name(), "Empty");
    }

    #[test]
    fn object_identity_not_value_equality() {
        let a: ObjectRef = Arc::new(Empty);
        let b: ObjectRef = Arc::new(Empty);
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn shared_arc_has_one_identity() {
        let a: ObjectRef = Arc::new(Empty);
        let alias = Arc::clone(&a);
        assert_eq!(ObjectId::of(a.as_ref()), ObjectId::of(alias.as_ref()));
    }
}
