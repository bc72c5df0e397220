//! Entity identifiers
//!
//! Every entity is keyed by an [`Id`]. Ids issued by the server are
//! permanent; ids generated locally for entities that have not been
//! committed yet are temporary. A temporary id is only valid until the
//! commit that carries its `add` command succeeds, at which point the
//! server returns a mapping to the permanent id ([`IdMap`]).

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use uuid::Uuid;

/// Errors produced while parsing identifiers
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdError {
    /// Text is not in permanent-id syntax (resolve it by name instead)
    #[error("not an id: '{0}'")]
    NotAnId(String),

    /// Text is neither a permanent nor a temporary id
    #[error("malformed id on the wire: '{0}'")]
    Malformed(String),
}

/// Identifier of an entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Id {
    /// Server-assigned id
    Permanent(u64),
    /// Client-generated id, valid until the server maps it
    Temporary(Uuid),
}

impl Id {
    /// Parse user-supplied text as a permanent id.
    ///
    /// Only all-digit text is accepted. Anything else yields
    /// [`IdError::NotAnId`], which callers treat as "look this up by name".
    pub fn parse(text: &str) -> Result<Self, IdError> {
        let text = text.trim();
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(IdError::NotAnId(text.to_string()));
        }
        text.parse::<u64>()
            .map(Id::Permanent)
            .map_err(|_| IdError::NotAnId(text.to_string()))
    }

    /// Generate a fresh temporary id
    pub fn new_temporary() -> Self {
        Id::Temporary(Uuid::new_v4())
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Id::Temporary(_))
    }

    pub fn is_permanent(&self) -> bool {
        matches!(self, Id::Permanent(_))
    }

    /// Decode an id as it appears in payloads: digits or a UUID.
    fn from_wire(text: &str) -> Result<Self, IdError> {
        if let Ok(id) = Id::parse(text) {
            return Ok(id);
        }
        Uuid::parse_str(text)
            .map(Id::Temporary)
            .map_err(|_| IdError::Malformed(text.to_string()))
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Id::Permanent(n) => write!(f, "{}", n),
            Id::Temporary(uuid) => write!(f, "{}", uuid),
        }
    }
}

impl FromStr for Id {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Id::from_wire(s)
    }
}

impl From<u64> for Id {
    fn from(n: u64) -> Self {
        Id::Permanent(n)
    }
}

impl Serialize for Id {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Id {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct IdVisitor;

        impl Visitor<'_> for IdVisitor {
            type Value = Id;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a numeric id or a temporary uuid")
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Id, E> {
                Ok(Id::Permanent(v))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Id, E> {
                u64::try_from(v)
                    .map(Id::Permanent)
                    .map_err(|_| E::custom(format!("negative id: {}", v)))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Id, E> {
                Id::from_wire(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_any(IdVisitor)
    }
}

/// Temporary → permanent id mapping returned by the server
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdMap(HashMap<Id, Id>);

impl IdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, temporary: Id, permanent: Id) {
        self.0.insert(temporary, permanent);
    }

    /// Merge another mapping into this one
    pub fn extend(&mut self, other: &IdMap) {
        self.0.extend(other.0.iter().map(|(k, v)| (*k, *v)));
    }

    pub fn get(&self, temporary: &Id) -> Option<Id> {
        self.0.get(temporary).copied()
    }

    /// The permanent id for `id` if it is a mapped temporary, else `id`
    pub fn resolve(&self, id: Id) -> Id {
        if id.is_temporary() {
            self.get(&id).unwrap_or(id)
        } else {
            id
        }
    }

    /// Rewrite a single id field in place
    pub fn remap(&self, id: &mut Id) {
        *id = self.resolve(*id);
    }

    pub fn remap_opt(&self, id: &mut Option<Id>) {
        if let Some(id) = id.as_mut() {
            self.remap(id);
        }
    }

    pub fn remap_all(&self, ids: &mut [Id]) {
        for id in ids {
            self.remap(id);
        }
    }

    /// Whether `id` is a temporary this map knows about
    pub fn contains(&self, id: &Id) -> bool {
        self.0.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Id, &Id)> {
        self.0.iter()
    }
}
