//! Primary-key descriptors, opaque identifiers and key coercion.
//!
//! Identifiers arrive as `KeyValue` without static knowledge of the entity's
//! key type. `coerce_key` converts them with locale-independent rules:
//!
//! | declared | accepted input |
//! |---|---|
//! | `Integer` | integer, or text holding a base-10 integer (surrounding whitespace ignored) |
//! | `Text` | text as-is, integer rendered base-10, uuid rendered hyphenated |
//! | `Uuid` | uuid, or text in any form `uuid` parses |
//!
//! UUID keys are stored as lowercase hyphenated text.

use rusqlite::types::Value;
use std::fmt::{Display, Formatter};
use thiserror::Error;
use uuid::Uuid;

/// Declared storage type of one key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    Integer,
    Text,
    Uuid,
}

impl Display for KeyType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Integer => "integer",
            Self::Text => "text",
            Self::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// One primary-key column of a registered entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub name: String,
    pub key_type: KeyType,
    /// Whether an absent (`NULL`) key is a legal stored value.
    pub nullable: bool,
}

impl KeyField {
    pub fn new(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            name: name.into(),
            key_type,
            nullable: false,
        }
    }

    pub fn nullable(name: impl Into<String>, key_type: KeyType) -> Self {
        Self {
            nullable: true,
            ..Self::new(name, key_type)
        }
    }
}

/// Identifier supplied by a caller, not yet checked against any key type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyValue {
    Null,
    Integer(i64),
    Text(String),
    Uuid(Uuid),
    /// One component per key field, in declaration order.
    Composite(Vec<KeyValue>),
}

impl KeyValue {
    pub fn composite(parts: impl IntoIterator<Item = KeyValue>) -> Self {
        Self::Composite(parts.into_iter().collect())
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value:?}"),
            Self::Uuid(value) => write!(f, "{value}"),
            Self::Composite(parts) => {
                f.write_str("(")?;
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}

macro_rules! key_value_from_int {
    ($($ty:ty),*) => {
        $(impl From<$ty> for KeyValue {
            fn from(value: $ty) -> Self {
                Self::Integer(i64::from(value))
            }
        })*
    };
}

key_value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<&str> for KeyValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Uuid> for KeyValue {
    fn from(value: Uuid) -> Self {
        Self::Uuid(value)
    }
}

impl<T: Into<KeyValue>> From<Option<T>> for KeyValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl<A: Into<KeyValue>, B: Into<KeyValue>> From<(A, B)> for KeyValue {
    fn from((a, b): (A, B)) -> Self {
        Self::Composite(vec![a.into(), b.into()])
    }
}

impl<A: Into<KeyValue>, B: Into<KeyValue>, C: Into<KeyValue>> From<(A, B, C)> for KeyValue {
    fn from((a, b, c): (A, B, C)) -> Self {
        Self::Composite(vec![a.into(), b.into(), c.into()])
    }
}

/// Identifier could not be converted to the declared key type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoercionError {
    #[error("key `{field}` is not nullable but the identifier is null")]
    NullKey { field: String },
    #[error("identifier {found} cannot be converted to {expected} key `{field}`")]
    Incompatible {
        field: String,
        expected: KeyType,
        found: String,
    },
    #[error("key has {expected} component(s) but the identifier has {actual}")]
    Arity { expected: usize, actual: usize },
}

/// Converts one identifier component to the storage value of `field`.
///
/// Returns `Value::Null` only for nullable keys.
pub fn coerce_key(field: &KeyField, value: &KeyValue) -> Result<Value, CoercionError> {
    let incompatible = || CoercionError::Incompatible {
        field: field.name.clone(),
        expected: field.key_type,
        found: value.to_string(),
    };

    match (field.key_type, value) {
        (_, KeyValue::Null) if field.nullable => Ok(Value::Null),
        (_, KeyValue::Null) => Err(CoercionError::NullKey {
            field: field.name.clone(),
        }),
        (_, KeyValue::Composite(_)) => Err(incompatible()),
        (KeyType::Integer, KeyValue::Integer(number)) => Ok(Value::Integer(*number)),
        (KeyType::Integer, KeyValue::Text(text)) => text
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .map_err(|_| incompatible()),
        (KeyType::Integer, KeyValue::Uuid(_)) => Err(incompatible()),
        (KeyType::Text, KeyValue::Integer(number)) => Ok(Value::Text(number.to_string())),
        (KeyType::Text, KeyValue::Text(text)) => Ok(Value::Text(text.clone())),
        (KeyType::Text, KeyValue::Uuid(uuid)) => Ok(Value::Text(uuid.to_string())),
        (KeyType::Uuid, KeyValue::Uuid(uuid)) => Ok(Value::Text(uuid.to_string())),
        (KeyType::Uuid, KeyValue::Text(text)) => Uuid::parse_str(text.trim())
            .map(|uuid| Value::Text(uuid.to_string()))
            .map_err(|_| incompatible()),
        (KeyType::Uuid, KeyValue::Integer(_)) => Err(incompatible()),
    }
}
