//! Diff/reconciliation engine — minimal edit scripts between snapshots.
//!
//! [`diff`] computes the ordered sequence of section and row operations
//! transforming one [`Snapshot`] into another. Classification is by id-set
//! membership first: ids only in the before state are deletes, ids only in
//! the after state are inserts. Ids present in both are compared by section,
//! position, and payload.
//!
//! # Apply contract
//!
//! Deletions are reported against before-state indices, insertions against
//! after-state indices. A consumer applies a script in phases:
//!
//! 1. remove rows at delete and move-source paths, descending, then remove
//!    sections at delete and move-source indices, descending (before space);
//! 2. insert sections at insert and move-target indices, ascending, then
//!    insert rows at insert and move-target paths, ascending (after space),
//!    binding row content from the current store;
//! 3. rebind rows at update paths (after space).
//!
//! [`EditScript::replay`] is the reference applier implementing exactly this,
//! used by the property tests and available to consumers as a contract check.
//!
//! # Move semantics
//!
//! A row move is emitted only when a row's relative order among surviving
//! same-section rows changes; rows shifted by unrelated inserts or deletes
//! need no operation because index shifts are implied by the apply phases.
//! When a crossing pair leaves a choice of which row to report as moved, the
//! row whose payload changed is preferred. A row whose section key changed
//! reflows as a delete plus an insert, never as a cross-section move.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::EntityId;
use crate::section::SectionId;
use crate::snapshot::{RowPath, Snapshot};

// ---------------------------------------------------------------------------
// MovePolicy
// ---------------------------------------------------------------------------

/// How to report a row whose payload and position both changed.
///
/// List-view APIs differ on whether a move animation rebinds row content.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovePolicy {
    /// Classify as a move; the consumer rebinds content at the destination.
    #[default]
    CarryPayload,
    /// Classify as a move and additionally emit a row update at the
    /// destination path, for consumers whose moves do not rebind content.
    MoveThenReload,
}

// ---------------------------------------------------------------------------
// ChangeOp / EditScript
// ---------------------------------------------------------------------------

/// One operation of an edit script.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeOp {
    /// Start of an atomic batch.
    BeginBatch,
    /// Insert a section at an after-state index.
    SectionInsert(usize),
    /// Delete the section at a before-state index.
    SectionDelete(usize),
    /// Move a section from a before-state index to an after-state index.
    SectionMove {
        /// Before-state index.
        from: usize,
        /// After-state index.
        to: usize,
    },
    /// Refresh a section header. Part of the consumer contract; the engine
    /// never emits it today since sections carry no mutable payload.
    SectionUpdate(usize),
    /// Insert a row at an after-state path.
    RowInsert(RowPath),
    /// Delete the row at a before-state path.
    RowDelete(RowPath),
    /// Move a row from a before-state path to an after-state path.
    RowMove {
        /// Before-state path.
        from: RowPath,
        /// After-state path.
        to: RowPath,
    },
    /// Rebind the row at an after-state path.
    RowUpdate(RowPath),
    /// End of an atomic batch.
    EndBatch,
}

/// The ordered operation sequence transforming one snapshot into another.
///
/// A script is either entirely empty (no changes) or a single
/// `BeginBatch .. EndBatch` group in apply order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EditScript {
    ops: Vec<ChangeOp>,
}

impl EditScript {
    /// The empty script.
    #[must_use]
    pub const fn empty() -> Self {
        Self { ops: Vec::new() }
    }

    /// Whether the script contains no operations at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The operations, batch markers included.
    #[must_use]
    pub fn ops(&self) -> &[ChangeOp] {
        &self.ops
    }

    /// The operations without the batch markers.
    #[must_use]
    pub fn changes(&self) -> &[ChangeOp] {
        if self.ops.len() < 2 {
            return &self.ops;
        }
        &self.ops[1..self.ops.len() - 1]
    }

    /// Replay this script against `before`, binding row content from `after`.
    ///
    /// This is the reference implementation of the apply contract. Returns
    /// `None` if any operation references an out-of-range index, which would
    /// indicate a malformed script.
    #[must_use]
    pub fn replay(&self, before: &Snapshot, after: &Snapshot) -> Option<Snapshot> {
        let mut plan = ReplayPlan::default();
        for op in &self.ops {
            match *op {
                ChangeOp::RowDelete(p) => plan.row_removals.push(p),
                ChangeOp::RowMove { from, to } => {
                    plan.row_removals.push(from);
                    plan.row_fills.push(to);
                }
                ChangeOp::RowInsert(p) => plan.row_fills.push(p),
                ChangeOp::RowUpdate(p) => plan.row_updates.push(p),
                ChangeOp::SectionDelete(i) => plan.section_removals.push((i, None)),
                ChangeOp::SectionMove { from, to } => plan.section_removals.push((from, Some(to))),
                ChangeOp::SectionInsert(i) => plan.section_inserts.push(i),
                ChangeOp::SectionUpdate(_) | ChangeOp::BeginBatch | ChangeOp::EndBatch => {}
            }
        }
        plan.run(before, after)
    }
}

/// Collected operations of one script, grouped by apply phase.
#[derive(Default)]
struct ReplayPlan {
    row_removals: Vec<RowPath>,
    section_removals: Vec<(usize, Option<usize>)>,
    section_inserts: Vec<usize>,
    row_fills: Vec<RowPath>,
    row_updates: Vec<RowPath>,
}

impl ReplayPlan {
    fn run(mut self, before: &Snapshot, after: &Snapshot) -> Option<Snapshot> {
        let mut sections = before.sections.clone();

        // Phase 1: before-space removals, descending so indices stay valid.
        self.row_removals.sort_unstable();
        for path in self.row_removals.iter().rev() {
            let section = sections.get_mut(path.section)?;
            if path.row >= section.rows.len() {
                return None;
            }
            section.rows.remove(path.row);
        }
        self.section_removals.sort_unstable_by_key(|(from, _)| *from);
        let mut carried: Vec<(usize, crate::snapshot::SectionSnapshot)> = Vec::new();
        for &(from, to) in self.section_removals.iter().rev() {
            if from >= sections.len() {
                return None;
            }
            let section = sections.remove(from);
            if let Some(to) = to {
                carried.push((to, section));
            }
        }

        // Phase 2: after-space insertions, ascending.
        let mut incoming: Vec<(usize, crate::snapshot::SectionSnapshot)> = carried;
        for &at in &self.section_inserts {
            let id = after.sections.get(at)?.id.clone();
            incoming.push((
                at,
                crate::snapshot::SectionSnapshot {
                    id,
                    rows: Vec::new(),
                },
            ));
        }
        incoming.sort_by_key(|(at, _)| *at);
        for (at, section) in incoming {
            if at > sections.len() {
                return None;
            }
            sections.insert(at, section);
        }
        self.row_fills.sort_unstable();
        for &path in &self.row_fills {
            let row = after.row(path)?.clone();
            let section = sections.get_mut(path.section)?;
            if path.row > section.rows.len() {
                return None;
            }
            section.rows.insert(path.row, row);
        }

        // Phase 3: rebinds at after-space paths.
        for &path in &self.row_updates {
            let row = after.row(path)?.clone();
            *sections.get_mut(path.section)?.rows.get_mut(path.row)? = row;
        }

        Some(Snapshot { sections })
    }
}

// ---------------------------------------------------------------------------
// diff
// ---------------------------------------------------------------------------

/// Location of a row within a snapshot, for classification.
struct Loc<'a> {
    path: RowPath,
    section_id: &'a SectionId,
    payload: &'a Value,
}

/// Compute the minimal edit script transforming `before` into `after`.
#[must_use]
pub fn diff(before: &Snapshot, after: &Snapshot, policy: MovePolicy) -> EditScript {
    let mut section_deletes: Vec<usize> = Vec::new();
    let mut section_inserts: Vec<usize> = Vec::new();
    let mut section_moves: Vec<(usize, usize)> = Vec::new();
    let mut row_deletes: Vec<RowPath> = Vec::new();
    let mut row_inserts: Vec<RowPath> = Vec::new();
    let mut row_moves: Vec<(RowPath, RowPath)> = Vec::new();
    let mut row_updates: Vec<RowPath> = Vec::new();

    // --- section classification ---
    let before_sec_index: HashMap<&SectionId, usize> = before
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| (&s.id, i))
        .collect();
    let after_sec_index: HashMap<&SectionId, usize> = after
        .sections
        .iter()
        .enumerate()
        .map(|(i, s)| (&s.id, i))
        .collect();

    for (i, section) in before.sections.iter().enumerate() {
        if !after_sec_index.contains_key(&section.id) {
            section_deletes.push(i);
        }
    }
    for (i, section) in after.sections.iter().enumerate() {
        if !before_sec_index.contains_key(&section.id) {
            section_inserts.push(i);
        }
    }
    // Common sections whose relative order changed become moves. With
    // key-derived section identity the relative order of surviving sections
    // is stable, so this is exercised only by hand-built snapshots.
    {
        let mut seq = Vec::new();
        let mut locs = Vec::new();
        for (i, section) in after.sections.iter().enumerate() {
            if let Some(&b) = before_sec_index.get(&section.id) {
                seq.push(b);
                locs.push((b, i));
            }
        }
        let weights = vec![1_u64; seq.len()];
        let kept = weighted_lis(&seq, &weights);
        for (k, &(from, to)) in locs.iter().enumerate() {
            if !kept[k] && from != to {
                section_moves.push((from, to));
            }
        }
    }

    // --- row classification by id set ---
    let before_rows = index_rows(before);
    let after_rows = index_rows(after);

    for (id, b) in &before_rows {
        match after_rows.get(id) {
            None => row_deletes.push(b.path),
            // Section reflow: never a cross-section move or a bare update.
            Some(a) if a.section_id != b.section_id => {
                row_deletes.push(b.path);
                row_inserts.push(a.path);
            }
            Some(_) => {}
        }
    }
    for (id, a) in &after_rows {
        if !before_rows.contains_key(id) {
            row_inserts.push(a.path);
        }
    }

    // --- within-section survivors: moves and updates ---
    for (s_after, section) in after.sections.iter().enumerate() {
        if !before_sec_index.contains_key(&section.id) {
            continue;
        }
        let mut seq: Vec<usize> = Vec::new();
        let mut weights: Vec<u64> = Vec::new();
        let mut survivors: Vec<(RowPath, RowPath, bool)> = Vec::new();
        for (r_after, row) in section.rows.iter().enumerate() {
            let Some(b) = before_rows.get(&row.id) else {
                continue;
            };
            if b.section_id != &section.id {
                continue;
            }
            let dirty = b.payload != &row.payload;
            seq.push(b.path.row);
            // Clean rows weigh more, so when a crossing pair leaves a choice
            // the changed row is the one reported as moved.
            weights.push(if dirty { 1 } else { 2 });
            survivors.push((b.path, RowPath::new(s_after, r_after), dirty));
        }
        let kept = weighted_lis(&seq, &weights);
        for (k, &(from, to, dirty)) in survivors.iter().enumerate() {
            if kept[k] || from == to {
                if dirty {
                    row_updates.push(to);
                }
            } else {
                row_moves.push((from, to));
                if dirty && policy == MovePolicy::MoveThenReload {
                    row_updates.push(to);
                }
            }
        }
    }

    assemble(
        section_deletes,
        section_inserts,
        section_moves,
        row_deletes,
        row_inserts,
        row_moves,
        row_updates,
    )
}

fn index_rows(snapshot: &Snapshot) -> HashMap<&EntityId, Loc<'_>> {
    let mut map = HashMap::with_capacity(snapshot.row_count());
    for (s, section) in snapshot.sections.iter().enumerate() {
        for (r, row) in section.rows.iter().enumerate() {
            map.insert(
                &row.id,
                Loc {
                    path: RowPath::new(s, r),
                    section_id: &section.id,
                    payload: &row.payload,
                },
            );
        }
    }
    map
}

/// Order the collected operations per the apply contract and wrap them in
/// batch markers. All-empty input produces the empty script.
fn assemble(
    mut section_deletes: Vec<usize>,
    mut section_inserts: Vec<usize>,
    mut section_moves: Vec<(usize, usize)>,
    mut row_deletes: Vec<RowPath>,
    mut row_inserts: Vec<RowPath>,
    mut row_moves: Vec<(RowPath, RowPath)>,
    mut row_updates: Vec<RowPath>,
) -> EditScript {
    let total = section_deletes.len()
        + section_inserts.len()
        + section_moves.len()
        + row_deletes.len()
        + row_inserts.len()
        + row_moves.len()
        + row_updates.len();
    if total == 0 {
        return EditScript::empty();
    }

    let mut ops = Vec::with_capacity(total + 2);
    ops.push(ChangeOp::BeginBatch);

    row_deletes.sort_unstable();
    ops.extend(row_deletes.iter().rev().map(|p| ChangeOp::RowDelete(*p)));

    section_deletes.sort_unstable();
    ops.extend(
        section_deletes
            .iter()
            .rev()
            .map(|i| ChangeOp::SectionDelete(*i)),
    );

    section_inserts.sort_unstable();
    ops.extend(section_inserts.iter().map(|i| ChangeOp::SectionInsert(*i)));

    section_moves.sort_unstable_by_key(|(_, to)| *to);
    ops.extend(
        section_moves
            .iter()
            .map(|&(from, to)| ChangeOp::SectionMove { from, to }),
    );

    row_inserts.sort_unstable();
    ops.extend(row_inserts.iter().map(|p| ChangeOp::RowInsert(*p)));

    row_moves.sort_unstable_by_key(|(_, to)| *to);
    ops.extend(
        row_moves
            .iter()
            .map(|&(from, to)| ChangeOp::RowMove { from, to }),
    );

    row_updates.sort_unstable();
    ops.extend(row_updates.iter().map(|p| ChangeOp::RowUpdate(*p)));

    ops.push(ChangeOp::EndBatch);
    EditScript { ops }
}

// ---------------------------------------------------------------------------
// Weighted longest increasing subsequence
// ---------------------------------------------------------------------------

/// Maximum-weight strictly increasing subsequence of `seq`.
///
/// Returns a kept-flag per element; elements not kept are the movers.
/// Deterministic: among equal totals the leftmost chain wins. `seq` values
/// are unique (they are positions), so strictness never ties.
fn weighted_lis(seq: &[usize], weights: &[u64]) -> Vec<bool> {
    let n = seq.len();
    let mut kept = vec![false; n];
    if n == 0 {
        return kept;
    }
    let mut best: Vec<u64> = vec![0; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];
    for i in 0..n {
        best[i] = weights[i];
        for j in 0..i {
            if seq[j] < seq[i] && best[j] + weights[i] > best[i] {
                best[i] = best[j] + weights[i];
                parent[i] = Some(j);
            }
        }
    }
    let mut end = 0;
    for i in 1..n {
        if best[i] > best[end] {
            end = i;
        }
    }
    let mut cursor = Some(end);
    while let Some(i) = cursor {
        kept[i] = true;
        cursor = parent[i];
    }
    kept
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
#[allow(clippy::all, clippy::pedantic, clippy::nursery)]
mod tests {
    use super::*;
    use crate::model::{Entity, SortValue};
    use crate::order::{ComparatorChain, OrderedSet, SortDirection, SortRule};
    use crate::section::Sectioner;
    use crate::snapshot::{RowSnapshot, SectionSnapshot};
    use serde_json::json;

    fn entity(id: &str, tag: i64) -> Entity {
        Entity::from_json(json!({"id": id, "tag": tag})).unwrap()
    }

    fn snap_of(entities: &[Entity]) -> Snapshot {
        let mut set = OrderedSet::new(ComparatorChain::new(vec![SortRule::by_field(
            "tag",
            SortDirection::Ascending,
        )]));
        for e in entities {
            set.insert(e.clone());
        }
        Sectioner::none().build(set.all())
    }

    fn grouped_snap(entities: &[Entity]) -> Snapshot {
        let mut set = OrderedSet::new(ComparatorChain::new(vec![SortRule::by_field(
            "tag",
            SortDirection::Ascending,
        )]));
        for e in entities {
            set.insert(e.clone());
        }
        Sectioner::by_field("group", SortDirection::Ascending).build(set.all())
    }

    fn changes(script: &EditScript) -> Vec<ChangeOp> {
        script.changes().to_vec()
    }

    // -----------------------------------------------------------------------
    // No-op and markers
    // -----------------------------------------------------------------------

    #[test]
    fn identical_snapshots_diff_to_empty() {
        let s = snap_of(&[entity("a", 1), entity("b", 2)]);
        let script = diff(&s, &s, MovePolicy::CarryPayload);
        assert!(script.is_empty());
        assert!(script.ops().is_empty(), "no stray batch markers");
    }

    #[test]
    fn non_empty_scripts_are_bracketed() {
        let before = Snapshot::empty();
        let after = snap_of(&[entity("x", 1)]);
        let script = diff(&before, &after, MovePolicy::CarryPayload);
        assert_eq!(script.ops().first(), Some(&ChangeOp::BeginBatch));
        assert_eq!(script.ops().last(), Some(&ChangeOp::EndBatch));
    }

    // -----------------------------------------------------------------------
    // Scenario contracts
    // -----------------------------------------------------------------------

    #[test]
    fn first_insert_creates_section_then_row() {
        let before = Snapshot::empty();
        let after = snap_of(&[entity("x", 1)]);
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::CarryPayload)),
            vec![
                ChangeOp::SectionInsert(0),
                ChangeOp::RowInsert(RowPath::new(0, 0)),
            ]
        );
    }

    #[test]
    fn deleting_sole_row_drops_row_then_section() {
        let before = snap_of(&[entity("x", 1)]);
        let after = Snapshot::empty();
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::CarryPayload)),
            vec![
                ChangeOp::RowDelete(RowPath::new(0, 0)),
                ChangeOp::SectionDelete(0),
            ]
        );
    }

    #[test]
    fn reorder_by_payload_change_is_a_single_move() {
        // [a tag 0, b tag 1]; update a to tag 2 → a slides past b.
        let before = snap_of(&[entity("a", 0), entity("b", 1)]);
        let after = snap_of(&[entity("a", 2), entity("b", 1)]);
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::CarryPayload)),
            vec![ChangeOp::RowMove {
                from: RowPath::new(0, 0),
                to: RowPath::new(0, 1),
            }],
            "the changed row moves; the displaced neighbor needs no op"
        );
    }

    #[test]
    fn move_then_reload_policy_adds_update() {
        let before = snap_of(&[entity("a", 0), entity("b", 1)]);
        let after = snap_of(&[entity("a", 2), entity("b", 1)]);
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::MoveThenReload)),
            vec![
                ChangeOp::RowMove {
                    from: RowPath::new(0, 0),
                    to: RowPath::new(0, 1),
                },
                ChangeOp::RowUpdate(RowPath::new(0, 1)),
            ]
        );
    }

    #[test]
    fn payload_change_in_place_is_an_update() {
        let before = snap_of(&[entity("a", 1), entity("b", 2)]);
        let after = {
            let mut e = entity("a", 1);
            e.payload = json!({"id": "a", "tag": 1, "note": "x"});
            snap_of(&[e, entity("b", 2)])
        };
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::CarryPayload)),
            vec![ChangeOp::RowUpdate(RowPath::new(0, 0))]
        );
    }

    #[test]
    fn shifted_rows_need_no_ops() {
        // Insert c before a and b: a and b change absolute index but keep
        // relative order, so only the insert is emitted.
        let before = snap_of(&[entity("a", 5), entity("b", 6)]);
        let after = snap_of(&[entity("c", 1), entity("a", 5), entity("b", 6)]);
        assert_eq!(
            changes(&diff(&before, &after, MovePolicy::CarryPayload)),
            vec![ChangeOp::RowInsert(RowPath::new(0, 0))]
        );
    }

    // -----------------------------------------------------------------------
    // Section reflow
    // -----------------------------------------------------------------------

    fn grouped(id: &str, group: &str, tag: i64) -> Entity {
        Entity::from_json(json!({"id": id, "group": group, "tag": tag})).unwrap()
    }

    #[test]
    fn section_key_change_is_delete_plus_insert() {
        let before = grouped_snap(&[
            grouped("a", "red", 1),
            grouped("b", "red", 2),
            grouped("c", "blue", 3),
        ]);
        let after = grouped_snap(&[
            grouped("a", "blue", 1),
            grouped("b", "red", 2),
            grouped("c", "blue", 3),
        ]);
        let ops = changes(&diff(&before, &after, MovePolicy::CarryPayload));
        // blue sorts before red: a leaves red (section 1 before) and joins
        // blue (section 0 after) ahead of c.
        assert!(
            ops.contains(&ChangeOp::RowDelete(RowPath::new(1, 0))),
            "ops: {ops:?}"
        );
        assert!(
            ops.contains(&ChangeOp::RowInsert(RowPath::new(0, 0))),
            "ops: {ops:?}"
        );
        assert!(
            !ops.iter().any(|op| matches!(op, ChangeOp::RowUpdate(_))),
            "reflow must never surface as a bare update: {ops:?}"
        );
        assert!(
            !ops.iter().any(|op| matches!(op, ChangeOp::RowMove { .. })),
            "reflow must never surface as a cross-section move: {ops:?}"
        );
    }

    #[test]
    fn reflow_emptying_a_section_deletes_it() {
        let before = grouped_snap(&[grouped("a", "red", 1), grouped("c", "blue", 3)]);
        let after = grouped_snap(&[grouped("a", "blue", 1), grouped("c", "blue", 3)]);
        let ops = changes(&diff(&before, &after, MovePolicy::CarryPayload));
        assert_eq!(
            ops,
            vec![
                ChangeOp::RowDelete(RowPath::new(1, 0)),
                ChangeOp::SectionDelete(1),
                ChangeOp::RowInsert(RowPath::new(0, 0)),
            ]
        );
    }

    #[test]
    fn reflow_into_new_section_inserts_it() {
        let before = grouped_snap(&[grouped("a", "red", 1), grouped("b", "red", 2)]);
        let after = grouped_snap(&[grouped("a", "blue", 1), grouped("b", "red", 2)]);
        let ops = changes(&diff(&before, &after, MovePolicy::CarryPayload));
        assert_eq!(
            ops,
            vec![
                ChangeOp::RowDelete(RowPath::new(0, 0)),
                ChangeOp::SectionInsert(0),
                ChangeOp::RowInsert(RowPath::new(0, 0)),
            ]
        );
    }

    // -----------------------------------------------------------------------
    // Section moves (hand-built snapshots; key-sorted sections never reorder)
    // -----------------------------------------------------------------------

    fn raw_section(name: &str, ids: &[&str]) -> SectionSnapshot {
        SectionSnapshot {
            id: crate::section::SectionId::new(SortValue::text(name)),
            rows: ids
                .iter()
                .map(|id| RowSnapshot {
                    id: id.parse().unwrap(),
                    payload: json!({"id": id}),
                })
                .collect(),
        }
    }

    #[test]
    fn reordered_sections_emit_one_move() {
        let before = Snapshot {
            sections: vec![raw_section("a", &["x"]), raw_section("b", &["y"])],
        };
        let after = Snapshot {
            sections: vec![raw_section("b", &["y"]), raw_section("a", &["x"])],
        };
        let ops = changes(&diff(&before, &after, MovePolicy::CarryPayload));
        assert_eq!(ops.len(), 1, "ops: {ops:?}");
        assert!(matches!(ops[0], ChangeOp::SectionMove { .. }));
        let replayed = diff(&before, &after, MovePolicy::CarryPayload)
            .replay(&before, &after)
            .unwrap();
        assert_eq!(replayed, after);
    }

    // -----------------------------------------------------------------------
    // Replay correctness on hand-picked shapes
    // -----------------------------------------------------------------------

    #[test]
    fn replay_reproduces_after_state() {
        let before = grouped_snap(&[
            grouped("a", "red", 1),
            grouped("b", "red", 2),
            grouped("c", "blue", 3),
        ]);
        let after = grouped_snap(&[
            grouped("a", "blue", 9),
            grouped("b", "red", 2),
            grouped("d", "green", 4),
        ]);
        let script = diff(&before, &after, MovePolicy::CarryPayload);
        assert_eq!(script.replay(&before, &after), Some(after));
    }

    #[test]
    fn replay_handles_mixed_insert_and_move() {
        // Update a past b while inserting c between them.
        let before = snap_of(&[entity("a", 0), entity("b", 2)]);
        let after = snap_of(&[entity("a", 3), entity("b", 2), entity("c", 1)]);
        let script = diff(&before, &after, MovePolicy::CarryPayload);
        assert_eq!(script.replay(&before, &after), Some(after));
    }

    #[test]
    fn replay_rejects_out_of_range_ops() {
        let before = snap_of(&[entity("a", 1)]);
        let bogus = EditScript {
            ops: vec![
                ChangeOp::BeginBatch,
                ChangeOp::RowDelete(RowPath::new(3, 0)),
                ChangeOp::EndBatch,
            ],
        };
        assert_eq!(bogus.replay(&before, &before), None);
    }

    // -----------------------------------------------------------------------
    // weighted_lis
    // -----------------------------------------------------------------------

    #[test]
    fn lis_keeps_everything_when_sorted() {
        assert_eq!(
            weighted_lis(&[0, 1, 2, 3], &[1, 1, 1, 1]),
            vec![true, true, true, true]
        );
    }

    #[test]
    fn lis_prefers_heavier_chain() {
        // seq [1, 0]: either element alone is increasing; weights pick.
        assert_eq!(weighted_lis(&[1, 0], &[2, 1]), vec![true, false]);
        assert_eq!(weighted_lis(&[1, 0], &[1, 2]), vec![false, true]);
    }

    #[test]
    fn lis_empty_input() {
        assert!(weighted_lis(&[], &[]).is_empty());
    }
}
