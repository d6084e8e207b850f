//! Immutable ordered + sectioned snapshots.
//!
//! A [`Snapshot`] is the point-in-time view the diff engine works over: an
//! ordered list of sections, each holding ordered rows. Snapshots own clones
//! of the entity payloads, so a snapshot taken before a batch of mutations
//! stays valid as the "before" state while the live set changes underneath.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{Entity, EntityId};
use crate::section::SectionId;

// ---------------------------------------------------------------------------
// RowPath
// ---------------------------------------------------------------------------

/// Position of a row: section index plus row offset within the section.
///
/// Paths order by `(section, row)`, which is also the order rows appear in a
/// flattened snapshot.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct RowPath {
    /// Index of the section.
    pub section: usize,
    /// Offset of the row within the section.
    pub row: usize,
}

impl RowPath {
    /// Create a path.
    #[must_use]
    pub const fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

impl std::fmt::Display for RowPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.section, self.row)
    }
}

// ---------------------------------------------------------------------------
// RowSnapshot / SectionSnapshot / Snapshot
// ---------------------------------------------------------------------------

/// One row of a snapshot: the entity id plus its payload at capture time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowSnapshot {
    /// Stable identity of the row.
    pub id: EntityId,
    /// Payload at capture time.
    pub payload: Value,
}

impl RowSnapshot {
    /// Capture a row from a live entity.
    #[must_use]
    pub fn of(entity: &Entity) -> Self {
        Self {
            id: entity.id.clone(),
            payload: entity.payload.clone(),
        }
    }
}

/// One section of a snapshot: its identity plus ordered member rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionSnapshot {
    /// Section identity, derived from the per-entity section key.
    pub id: SectionId,
    /// Ordered member rows.
    pub rows: Vec<RowSnapshot>,
}

/// An immutable ordered + sectioned view of the result set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Ordered sections. Empty result sets have zero sections.
    pub sections: Vec<SectionSnapshot>,
}

impl Snapshot {
    /// The empty snapshot.
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            sections: Vec::new(),
        }
    }

    /// Number of sections.
    #[must_use]
    pub fn section_count(&self) -> usize {
        self.sections.len()
    }

    /// Total number of rows across all sections.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.sections.iter().map(|s| s.rows.len()).sum()
    }

    /// Borrow the row at `path`.
    #[must_use]
    pub fn row(&self, path: RowPath) -> Option<&RowSnapshot> {
        self.sections.get(path.section)?.rows.get(path.row)
    }

    /// Locate the row with `id`.
    #[must_use]
    pub fn path_of(&self, id: &EntityId) -> Option<RowPath> {
        for (s, section) in self.sections.iter().enumerate() {
            if let Some(r) = section.rows.iter().position(|row| &row.id == id) {
                return Some(RowPath::new(s, r));
            }
        }
        None
    }

    /// Iterate all rows in section-then-row order, with their paths.
    pub fn rows(&self) -> impl Iterator<Item = (RowPath, &RowSnapshot)> {
        self.sections.iter().enumerate().flat_map(|(s, section)| {
            section
                .rows
                .iter()
                .enumerate()
                .map(move |(r, row)| (RowPath::new(s, r), row))
        })
    }

    /// The flattened id sequence in document order.
    #[must_use]
    pub fn flat_ids(&self) -> Vec<EntityId> {
        self.rows().map(|(_, row)| row.id.clone()).collect()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::SortValue;
    use serde_json::json;

    fn snap() -> Snapshot {
        Snapshot {
            sections: vec![
                SectionSnapshot {
                    id: SectionId::new(SortValue::text("a")),
                    rows: vec![
                        RowSnapshot {
                            id: "x".parse().unwrap(),
                            payload: json!({"id": "x"}),
                        },
                        RowSnapshot {
                            id: "y".parse().unwrap(),
                            payload: json!({"id": "y"}),
                        },
                    ],
                },
                SectionSnapshot {
                    id: SectionId::new(SortValue::text("b")),
                    rows: vec![RowSnapshot {
                        id: "z".parse().unwrap(),
                        payload: json!({"id": "z"}),
                    }],
                },
            ],
        }
    }

    #[test]
    fn counts_and_lookup() {
        let s = snap();
        assert_eq!(s.section_count(), 2);
        assert_eq!(s.row_count(), 3);
        assert_eq!(s.path_of(&"z".parse().unwrap()), Some(RowPath::new(1, 0)));
        assert_eq!(s.path_of(&"ghost".parse().unwrap()), None);
        assert_eq!(s.row(RowPath::new(0, 1)).unwrap().id.as_str(), "y");
        assert!(s.row(RowPath::new(5, 0)).is_none());
    }

    #[test]
    fn rows_iterate_in_document_order() {
        let s = snap();
        let ids: Vec<&str> = s.rows().map(|(_, r)| r.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y", "z"]);
        let paths: Vec<RowPath> = s.rows().map(|(p, _)| p).collect();
        assert_eq!(
            paths,
            vec![RowPath::new(0, 0), RowPath::new(0, 1), RowPath::new(1, 0)]
        );
    }

    #[test]
    fn row_path_orders_section_first() {
        assert!(RowPath::new(0, 9) < RowPath::new(1, 0));
        assert!(RowPath::new(1, 0) < RowPath::new(1, 1));
    }
}
