//! Shared fixtures for the integration suite.

#![allow(dead_code)]

use liveset::{Entity, EntityId, Snapshot};
use serde_json::json;

/// Opt-in log output: `RUST_LOG=liveset=trace cargo test -- --nocapture`.
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A task-like record: sortable `tag`, groupable `group`, optional `done`.
pub fn task(id: &str, group: &str, tag: i64) -> Entity {
    Entity::from_json(json!({"id": id, "group": group, "tag": tag, "done": false}))
        .unwrap_or_else(|| panic!("fixture id {id:?} invalid"))
}

/// A record without a group field (lands in the default section).
pub fn ungrouped(id: &str, tag: i64) -> Entity {
    Entity::from_json(json!({"id": id, "tag": tag}))
        .unwrap_or_else(|| panic!("fixture id {id:?} invalid"))
}

pub fn id(s: &str) -> EntityId {
    s.parse().unwrap_or_else(|e| panic!("fixture id {s:?}: {e}"))
}

/// Flattened ids of a snapshot, as plain strings for terse assertions.
pub fn ids(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .flat_ids()
        .into_iter()
        .map(|id| id.as_str().to_owned())
        .collect()
}

/// Section names in display form, `(default)` for the null section.
pub fn sections(snapshot: &Snapshot) -> Vec<String> {
    snapshot
        .sections
        .iter()
        .map(|s| s.id.to_string())
        .collect()
}
