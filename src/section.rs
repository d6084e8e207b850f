//! Sectioning engine — partitions the ordered collection into named groups.
//!
//! A [`Sectioner`] derives a [`SectionId`] per entity from a caller-supplied
//! key extractor and groups the chain-ordered rows into sections. Sections
//! order among themselves by their identifier using the same comparator
//! mechanics as rows ([`SortValue`] order); rows keep their chain order
//! within each section.
//!
//! With no section key configured, a non-empty result set has exactly one
//! default section holding all rows in document order. An entity whose key
//! extractor returns null lands in the default section, which sorts per the
//! nulls-last rule.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Entity, SortValue};
use crate::order::SortDirection;
use crate::snapshot::{RowSnapshot, SectionSnapshot, Snapshot};

/// A section key extractor: a pure function from an entity to its group key.
pub type SectionKeyFn = Box<dyn Fn(&Entity) -> SortValue>;

// ---------------------------------------------------------------------------
// SectionId
// ---------------------------------------------------------------------------

/// Identity of a section, derived from the per-entity section key.
///
/// The null key is the default section. Section identity ordering follows
/// [`SortValue`] ordering, so the default section sorts after all keyed
/// sections in an ascending layout.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SectionId(SortValue);

impl SectionId {
    /// Create a section id from a key value.
    #[must_use]
    pub const fn new(key: SortValue) -> Self {
        Self(key)
    }

    /// The default section (null key).
    #[must_use]
    pub const fn default_section() -> Self {
        Self(SortValue::Null)
    }

    /// The underlying key value.
    #[must_use]
    pub const fn key(&self) -> &SortValue {
        &self.0
    }

    /// Whether this is the default section.
    #[must_use]
    pub const fn is_default(&self) -> bool {
        self.0.is_null()
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("(default)")
        } else {
            fmt::Display::fmt(&self.0, f)
        }
    }
}

// ---------------------------------------------------------------------------
// Sectioner
// ---------------------------------------------------------------------------

/// Groups the chain-ordered entity sequence into ordered sections.
pub struct Sectioner {
    key: Option<SectionKeyFn>,
    direction: SortDirection,
}

impl Sectioner {
    /// No sectioning: one default section in document order.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            key: None,
            direction: SortDirection::Ascending,
        }
    }

    /// Section by an arbitrary key extractor.
    #[must_use]
    pub fn new(key: impl Fn(&Entity) -> SortValue + 'static, direction: SortDirection) -> Self {
        Self {
            key: Some(Box::new(key)),
            direction,
        }
    }

    /// Section by a top-level payload field.
    #[must_use]
    pub fn by_field(name: impl Into<String>, direction: SortDirection) -> Self {
        let name = name.into();
        Self::new(move |e| e.sort_field(&name), direction)
    }

    /// The section an entity belongs to.
    #[must_use]
    pub fn section_of(&self, entity: &Entity) -> SectionId {
        self.key
            .as_ref()
            .map_or_else(SectionId::default_section, |key| SectionId::new(key(entity)))
    }

    /// Build a sectioned snapshot from the chain-ordered row sequence.
    ///
    /// An empty input produces zero sections (not one empty section), so the
    /// first insert into an empty set surfaces as a section insert downstream.
    #[must_use]
    pub fn build(&self, rows: &[Entity]) -> Snapshot {
        if rows.is_empty() {
            return Snapshot::empty();
        }
        let Some(key) = &self.key else {
            return Snapshot {
                sections: vec![SectionSnapshot {
                    id: SectionId::default_section(),
                    rows: rows.iter().map(RowSnapshot::of).collect(),
                }],
            };
        };

        let mut groups: BTreeMap<SectionId, Vec<RowSnapshot>> = BTreeMap::new();
        for entity in rows {
            groups
                .entry(SectionId::new(key(entity)))
                .or_default()
                .push(RowSnapshot::of(entity));
        }
        let mut sections: Vec<SectionSnapshot> = groups
            .into_iter()
            .map(|(id, rows)| SectionSnapshot { id, rows })
            .collect();
        if self.direction == SortDirection::Descending {
            sections.reverse();
        }
        Snapshot { sections }
    }
}

impl fmt::Debug for Sectioner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sectioner")
            .field("keyed", &self.key.is_some())
            .field("direction", &self.direction)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
