use serde::{Deserialize, Serialize};

/// Closed classification of every observable runtime value.
///
/// Arrays are tagged together with their observed length, and objects carrying a class name are
/// distinguished from plain field bags, so a multiset of tags is enough to drive specialization
/// decisions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TypeTag {
    Null,
    Empty,
    Integer,
    Float,
    String,
    Boolean,
    Array(usize),
    NamedObject(String),
    PlainObject,
}

impl TypeTag {
    /// Tags that a specialized arithmetic path can assume.
    pub fn is_numeric(&self) -> bool {
        matches!(self, TypeTag::Integer | TypeTag::Float)
    }

    pub fn label(&self) -> String {
        match self {
            TypeTag::Null => "null".to_string(),
            TypeTag::Empty => "empty".to_string(),
            TypeTag::Integer => "integer".to_string(),
            TypeTag::Float => "float".to_string(),
            TypeTag::String => "string".to_string(),
            TypeTag::Boolean => "boolean".to_string(),
            TypeTag::Array(n) => format!("array[{n}]"),
            TypeTag::NamedObject(name) => format!("object:{name}"),
            TypeTag::PlainObject => "object".to_string(),
        }
    }
}
