//! Core authorization types

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::{AuthzError, Result};

const STR_TAG: &str = "str:";
const INT_TAG: &str = "int:";

/// Caller supplied identifier of a subject or role
///
/// IDs are either strings or integers. The variant is part of the identity:
/// `Str("100")` and `Int(100)` are two different entities. Serialized forms
/// carry the variant as a prefix (`"str:100"`, `"int:100"`) so it survives
/// string-only formats.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityId {
    /// Integer ID
    Int(i64),
    /// String ID
    Str(String),
}

impl EntityId {
    /// Tagged textual form, e.g. `str:egg` or `int:100`
    pub fn to_tagged(&self) -> String {
        match self {
            Self::Int(value) => format!("{INT_TAG}{value}"),
            Self::Str(value) => format!("{STR_TAG}{value}"),
        }
    }

    /// Parse the tagged textual form
    ///
    /// Strings without a recognised tag are taken verbatim as string IDs.
    pub fn from_tagged(s: &str) -> Result<Self> {
        if let Some(raw) = s.strip_prefix(INT_TAG) {
            raw.parse::<i64>()
                .map(Self::Int)
                .map_err(|e| AuthzError::InvalidEntityId {
                    id: s.to_string(),
                    reason: e.to_string(),
                })
        } else if let Some(raw) = s.strip_prefix(STR_TAG) {
            Ok(Self::Str(raw.to_string()))
        } else {
            Ok(Self::Str(s.to_string()))
        }
    }

    /// Length of the untagged textual form
    pub fn display_len(&self) -> usize {
        match self {
            Self::Int(value) => value.to_string().len(),
            Self::Str(value) => value.len(),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{}", value),
            Self::Str(value) => write!(f, "{}", value),
        }
    }
}

impl FromStr for EntityId {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tagged(s)
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&String> for EntityId {
    fn from(value: &String) -> Self {
        Self::Str(value.clone())
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&EntityId> for EntityId {
    fn from(value: &EntityId) -> Self {
        value.clone()
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_tagged())
    }
}

struct EntityIdVisitor;

impl<'de> Visitor<'de> for EntityIdVisitor {
    type Value = EntityId;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a tagged entity ID string or an integer")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<EntityId, E> {
        EntityId::from_tagged(v).map_err(E::custom)
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<EntityId, E> {
        Ok(EntityId::Int(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<EntityId, E> {
        i64::try_from(v).map(EntityId::Int).map_err(E::custom)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_any(EntityIdVisitor)
    }
}

/// The two kinds of permissionable entities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Leaf member, typically an end actor
    Subject,
    /// Group of subjects and other roles
    Role,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Subject => f.write_str("subject"),
            Self::Role => f.write_str("role"),
        }
    }
}

/// How subject and role IDs share the identifier space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdNamespace {
    /// A role and a subject may use the same ID
    #[default]
    PerKind,
    /// An ID is unique across roles and subjects
    Shared,
}

impl FromStr for IdNamespace {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "per_kind" => Ok(Self::PerKind),
            "shared" => Ok(Self::Shared),
            other => Err(format!("unknown ID namespace `{}`", other)),
        }
    }
}
