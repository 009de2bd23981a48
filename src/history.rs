//! Per-workspace undo/redo history (§4.7).
//!
//! A view over the operation journal with a cursor, not a second copy of
//! the journal's authority — `record` is expected to be called with the
//! same [`Operation`] the store just journaled.

use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::CoreError;
use crate::store::Operation;

const MAX_HISTORY: usize = 100;

struct Stack {
    entries: Vec<Operation>,
    /// Index of the "current" entry; `-1` means everything has been
    /// undone (or the stack is empty).
    cursor: i64,
}

impl Stack {
    const fn new() -> Self {
        Self {
            entries: Vec::new(),
            cursor: -1,
        }
    }

    fn record(&mut self, operation: Operation) {
        if self.cursor < self.entries.len() as i64 - 1 {
            self.entries.truncate((self.cursor + 1).max(0) as usize);
        }
        self.entries.push(operation);
        self.cursor = self.entries.len() as i64 - 1;

        if self.entries.len() > MAX_HISTORY {
            let overflow = self.entries.len() - MAX_HISTORY;
            self.entries.drain(0..overflow);
            self.cursor -= overflow as i64;
        }
    }

    const fn can_undo(&self) -> bool {
        self.cursor >= 0
    }

    fn can_redo(&self) -> bool {
        self.cursor < self.entries.len() as i64 - 1
    }

    fn undo(&mut self) -> Option<Operation> {
        if !self.can_undo() {
            return None;
        }
        let op = self.entries[self.cursor as usize].clone();
        self.cursor -= 1;
        Some(op)
    }

    fn redo(&mut self) -> Option<Operation> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.entries[self.cursor as usize].clone())
    }

    fn list(&self, include_future: bool) -> Vec<Operation> {
        if include_future || self.cursor < 0 {
            if self.cursor < 0 {
                return Vec::new();
            }
            return self.entries.clone();
        }
        self.entries[..=self.cursor as usize].to_vec()
    }
}

/// Undo/redo cursors, one stack per workspace.
#[derive(Default)]
pub struct HistoryManager {
    stacks: RwLock<HashMap<String, Stack>>,
}

impl HistoryManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn with_stack<R>(&self, workspace_id: &str, f: impl FnOnce(&mut Stack) -> R) -> R {
        let mut guard = self
            .stacks
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let stack = guard.entry(workspace_id.to_owned()).or_insert_with(Stack::new);
        f(stack)
    }

    pub fn record(&self, workspace_id: &str, operation: Operation) {
        self.with_stack(workspace_id, |stack| stack.record(operation));
    }

    #[must_use]
    pub fn can_undo(&self, workspace_id: &str) -> bool {
        self.with_stack(workspace_id, Stack::can_undo)
    }

    #[must_use]
    pub fn can_redo(&self, workspace_id: &str) -> bool {
        self.with_stack(workspace_id, Stack::can_redo)
    }

    pub fn undo(&self, workspace_id: &str) -> Result<Operation, CoreError> {
        self.with_stack(workspace_id, Stack::undo)
            .ok_or_else(|| CoreError::OperationInvalid {
                reason: "nothing to undo".to_owned(),
            })
    }

    pub fn redo(&self, workspace_id: &str) -> Result<Operation, CoreError> {
        self.with_stack(workspace_id, Stack::redo)
            .ok_or_else(|| CoreError::OperationInvalid {
                reason: "nothing to redo".to_owned(),
            })
    }

    #[must_use]
    pub fn list(&self, workspace_id: &str, include_future: bool) -> Vec<Operation> {
        self.with_stack(workspace_id, |stack| stack.list(include_future))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(id: &str) -> Operation {
        Operation {
            operation_id: id.to_owned(),
            operation_type: "entity.create.point".to_owned(),
            workspace_id: "main".to_owned(),
            agent_id: "agent-1".to_owned(),
            timestamp: "now".to_owned(),
            input_parameters: serde_json::json!({}),
            input_entities: vec![],
            output_entities: vec![],
            result_status: crate::store::ResultStatus::Success,
            error_code: None,
            error_message: None,
            execution_time_ms: 1.0,
            undo_data: serde_json::json!({}),
        }
    }

    #[test]
    fn undo_then_redo_returns_to_original_cursor() {
        let history = HistoryManager::new();
        history.record("main", op("op1"));
        history.record("main", op("op2"));
        assert!(history.can_undo("main"));
        assert!(!history.can_redo("main"));

        let undone = history.undo("main").unwrap();
        assert_eq!(undone.operation_id, "op2");
        assert!(history.can_redo("main"));

        let redone = history.redo("main").unwrap();
        assert_eq!(redone.operation_id, "op2");
        assert!(!history.can_redo("main"));
    }

    #[test]
    fn divergent_append_truncates_future() {
        let history = HistoryManager::new();
        history.record("main", op("op1"));
        history.record("main", op("op2"));
        history.undo("main").unwrap();
        history.record("main", op("op3"));
        assert!(!history.can_redo("main"));
        let all = history.list("main", true);
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].operation_id, "op3");
    }

    #[test]
    fn stack_caps_at_max_history() {
        let history = HistoryManager::new();
        for i in 0..150 {
            history.record("main", op(&format!("op{i}")));
        }
        let all = history.list("main", true);
        assert_eq!(all.len(), MAX_HISTORY);
        assert_eq!(all.last().unwrap().operation_id, "op149");
    }

    #[test]
    fn undo_on_empty_stack_errors() {
        let history = HistoryManager::new();
        assert!(history.undo("main").is_err());
    }
}
