//! Short deterministic id generation.
//!
//! Entity/operation/constraint/message ids are derived from a `Sha256`
//! digest of a monotonic counter plus context, truncated to 8 hex
//! characters, rather than pulled from a UUID crate — the same "hash a
//! counter" approach this codebase already uses for content-addressed
//! identifiers elsewhere.

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate an 8 hex character suffix unique for this process, salted by
/// `context` so different callers with the same counter value never
/// collide.
#[must_use]
pub fn short_hex(context: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut hasher = Sha256::new();
    hasher.update(context.as_bytes());
    hasher.update(n.to_le_bytes());
    let digest = hasher.finalize();
    hex_prefix(&digest, 8)
}

fn hex_prefix(bytes: &[u8], len: usize) -> String {
    bytes
        .iter()
        .take(len.div_ceil(2))
        .map(|b| format!("{b:02x}"))
        .collect::<String>()
        .chars()
        .take(len)
        .collect()
}

/// Build an `entity_id` in the `<workspace_id>:<type>_<8-hex>` form (§3).
#[must_use]
pub fn entity_id(workspace_id: &str, entity_type: &str) -> String {
    let suffix = short_hex(&format!("{workspace_id}:{entity_type}"));
    format!("{workspace_id}:{entity_type}_{suffix}")
}

/// Build a `constraint_id`, analogous in shape to an entity id.
#[must_use]
pub fn constraint_id(workspace_id: &str) -> String {
    let suffix = short_hex(&format!("{workspace_id}:constraint"));
    format!("{workspace_id}:constraint_{suffix}")
}

/// Build an `operation_id`, scoped to a workspace.
#[must_use]
pub fn operation_id(workspace_id: &str) -> String {
    let suffix = short_hex(&format!("{workspace_id}:operation"));
    format!("{workspace_id}:op_{suffix}")
}

/// Build a branch `workspace_id` of the form `<owning_agent_id>:<name>`.
#[must_use]
pub fn branch_workspace_id(owning_agent_id: &str, name: &str) -> String {
    format!("{owning_agent_id}:{name}")
}

/// Build an `agent_message` id.
#[must_use]
pub fn message_id() -> String {
    let suffix = short_hex("message");
    format!("msg_{suffix}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_id_matches_spec_shape() {
        let id = entity_id("main", "point");
        assert!(id.starts_with("main:point_"));
        let suffix = id.rsplit('_').next().expect("suffix");
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn successive_ids_are_distinct() {
        let a = entity_id("main", "line");
        let b = entity_id("main", "line");
        assert_ne!(a, b);
    }

    #[test]
    fn branch_workspace_id_shape() {
        assert_eq!(branch_workspace_id("agent-1", "feature"), "agent-1:feature");
    }
}
