//! Entity identity and raw-record model.
//!
//! An [`Entity`] is an opaque application record: a validated stable
//! identifier, a raw JSON payload, and a soft-deletion flag. Everything else
//! in the crate (ordering, sectioning, diffing, association resolution) is
//! defined in terms of this contract.
//!
//! Payload equality is structural JSON equality. At most one live entity per
//! id exists in any ordered set at a time; that invariant is enforced by
//! [`OrderedSet`](crate::order::OrderedSet), not here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::value::SortValue;

// ---------------------------------------------------------------------------
// IdError
// ---------------------------------------------------------------------------

/// Error returned when an entity id fails validation.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("invalid entity id `{value}`: {reason}")]
pub struct IdError {
    /// The raw value that failed validation.
    pub value: String,
    /// Why validation failed.
    pub reason: String,
}

// ---------------------------------------------------------------------------
// EntityId
// ---------------------------------------------------------------------------

/// A validated stable entity identifier.
///
/// Ids are non-empty strings without control characters. Ordering is
/// lexicographic by Unicode scalar values and is total, which makes the id a
/// usable final tie-break for otherwise equal entities.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    /// The maximum length of an entity id.
    pub const MAX_LEN: usize = 256;

    /// Create a new `EntityId` from a string, validating format.
    ///
    /// # Errors
    /// Returns an error if the id is empty, too long, or contains control
    /// characters.
    pub fn new(s: &str) -> Result<Self, IdError> {
        Self::validate(s)?;
        Ok(Self(s.to_owned()))
    }

    /// Return the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(s: &str) -> Result<(), IdError> {
        if s.is_empty() {
            return Err(IdError {
                value: s.to_owned(),
                reason: "id must not be empty".to_owned(),
            });
        }
        if s.len() > Self::MAX_LEN {
            return Err(IdError {
                value: s.to_owned(),
                reason: format!(
                    "id must be at most {} bytes, got {}",
                    Self::MAX_LEN,
                    s.len()
                ),
            });
        }
        if s.chars().any(char::is_control) {
            return Err(IdError {
                value: s.to_owned(),
                reason: "id must not contain control characters".to_owned(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntityId {
    type Err = IdError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for EntityId {
    type Error = IdError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::validate(&s)?;
        Ok(Self(s))
    }
}

impl From<EntityId> for String {
    fn from(id: EntityId) -> Self {
        id.0
    }
}

impl From<&EntityId> for SortValue {
    fn from(id: &EntityId) -> Self {
        Self::Text(id.0.clone())
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// An opaque application record managed by the result set.
///
/// The payload is replaced wholesale on update events; derived values
/// (sort keys, section keys, association dependencies) are always recomputed
/// from the current payload, never cached on the entity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Stable identity, unique among live entities in a result set.
    pub id: EntityId,
    /// Raw structured payload.
    pub payload: Value,
    /// Soft-deletion flag. A deleted entity may still be held by observers
    /// but is excluded from the managed result set.
    #[serde(default)]
    pub deleted: bool,
}

impl Entity {
    /// Create a live entity from an id and payload.
    #[must_use]
    pub const fn new(id: EntityId, payload: Value) -> Self {
        Self {
            id,
            payload,
            deleted: false,
        }
    }

    /// Materialize an entity from a raw payload carrying its own `id` field.
    ///
    /// Returns `None` when the payload has no string `id` or the id fails
    /// validation; such records are dropped at the ingestion boundary. A
    /// malformed payload is a collaborator defect, not a core error.
    #[must_use]
    pub fn from_json(payload: Value) -> Option<Self> {
        let id = payload.get("id").and_then(Value::as_str);
        let Some(id) = id.and_then(|s| EntityId::new(s).ok()) else {
            tracing::debug!("payload without a usable id dropped");
            return None;
        };
        Some(Self::new(id, payload))
    }

    /// Extract a top-level payload field as a comparable sort value.
    #[must_use]
    pub fn sort_field(&self, name: &str) -> SortValue {
        SortValue::field(&self.payload, name)
    }

    /// Whether this entity's payload is structurally equal to `other`.
    #[must_use]
    pub fn payload_eq(&self, other: &Value) -> bool {
        self.payload == *other
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
