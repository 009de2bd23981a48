//! The multi-agent orchestration layer (§4.9).
//!
//! Operations are dispatched in-process: the controller holds an
//! [`Arc<Dispatcher>`] and calls it directly rather than going through a
//! subprocess or RPC boundary. See DESIGN.md for the reasoning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::Dispatcher;
use crate::error::CoreError;
use crate::store::{Workspace, WorkspaceType};
use crate::time::now_iso8601;

use super::messages::{AgentMessage, MessageBus, MessageType};
use super::metrics::{self, AgentLearningMetrics, OperationRecord};
use super::roles::{RoleRegistry, RoleTemplate};
use super::tasks::{self, TaskAssignment};

const MAX_ERROR_LOG: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Error,
    Terminated,
}

/// A single entry in an agent's error log (§3 Agent.error_log).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorLogEntry {
    pub timestamp: String,
    pub operation: String,
    pub code: i64,
    pub message: String,
}

/// The live record the controller maintains for one agent (§3 Agent).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Agent {
    pub agent_id: String,
    pub role_name: String,
    pub workspace_id: String,
    pub operation_count: u64,
    pub success_count: u64,
    pub error_count: u64,
    pub created_entities: Vec<String>,
    pub error_log: Vec<ErrorLogEntry>,
    pub status: AgentStatus,
    pub created_at: String,
    pub last_active: String,
    pub operation_history: Vec<OperationRecord>,
}

impl Agent {
    fn new(agent_id: &str, role_name: &str, workspace_id: &str) -> Self {
        let now = now_iso8601();
        Self {
            agent_id: agent_id.to_owned(),
            role_name: role_name.to_owned(),
            workspace_id: workspace_id.to_owned(),
            operation_count: 0,
            success_count: 0,
            error_count: 0,
            created_entities: Vec::new(),
            error_log: Vec::new(),
            status: AgentStatus::Idle,
            created_at: now.clone(),
            last_active: now,
            operation_history: Vec::new(),
        }
    }

    fn record_error(&mut self, operation: &str, err: &CoreError) {
        self.operation_count += 1;
        self.error_count += 1;
        self.error_log.push(ErrorLogEntry {
            timestamp: now_iso8601(),
            operation: operation.to_owned(),
            code: err.code().as_i64(),
            message: err.to_string(),
        });
        if self.error_log.len() > MAX_ERROR_LOG {
            let overflow = self.error_log.len() - MAX_ERROR_LOG;
            self.error_log.drain(0..overflow);
        }
        self.operation_history.push(OperationRecord {
            timestamp: now_iso8601(),
            success: false,
            duration_ms: 0.0,
            operation: operation.to_owned(),
        });
        self.last_active = now_iso8601();
        self.status = AgentStatus::Error;
    }

    fn record_success(&mut self, operation: &str, duration_ms: f64, output_entities: &[String]) {
        self.operation_count += 1;
        self.success_count += 1;
        for entity_id in output_entities {
            if !self.created_entities.contains(entity_id) {
                self.created_entities.push(entity_id.clone());
            }
        }
        self.operation_history.push(OperationRecord {
            timestamp: now_iso8601(),
            success: true,
            duration_ms,
            operation: operation.to_owned(),
        });
        self.last_active = now_iso8601();
        self.status = AgentStatus::Idle;
    }
}

struct AgentState {
    agent: Agent,
    role: RoleTemplate,
}

/// The outer orchestration layer: agent lifecycle, role-gated dispatch,
/// task decomposition/assignment, and the inter-agent message bus
/// (§4.9). Bounded concurrency is provided by `run_phase`, which batches
/// work across `std::thread` rather than a reinvented async runtime
/// (matching the dependency-light style of the rest of this crate).
pub struct AgentController {
    dispatcher: Arc<Dispatcher>,
    roles: RoleRegistry,
    agents: RwLock<HashMap<String, Mutex<AgentState>>>,
    messages: Mutex<MessageBus>,
    max_concurrent_agents: usize,
}

impl AgentController {
    #[must_use]
    pub fn new(dispatcher: Arc<Dispatcher>, roles: RoleRegistry, max_concurrent_agents: u32) -> Self {
        Self {
            dispatcher,
            roles,
            agents: RwLock::new(HashMap::new()),
            messages: Mutex::new(MessageBus::new()),
            max_concurrent_agents: max_concurrent_agents.clamp(1, 50) as usize,
        }
    }

    /// §4.9 "Agent lifecycle": reject duplicate ids and unknown roles,
    /// ensure the workspace exists, register the agent idle.
    pub fn create_agent(&self, agent_id: &str, role_name: &str, workspace_id: &str) -> Result<Agent, CoreError> {
        {
            let agents = self.agents.read().unwrap_or_else(std::sync::PoisonError::into_inner);
            if agents.contains_key(agent_id) {
                return Err(CoreError::OperationInvalid {
                    reason: format!("agent '{agent_id}' already exists"),
                });
            }
        }
        let role = self
            .roles
            .get(role_name)
            .cloned()
            .ok_or_else(|| CoreError::OperationInvalid {
                reason: format!("unknown role '{role_name}'"),
            })?;

        if self.dispatcher.store().workspace_get(workspace_id).is_err() {
            let name = workspace_id.rsplit(':').next().unwrap_or(workspace_id).to_owned();
            self.dispatcher.store().workspace_create(
                name,
                WorkspaceType::AgentBranch,
                Some(Workspace::MAIN_ID.to_owned()),
                Some(agent_id.to_owned()),
            )?;
        }

        let agent = Agent::new(agent_id, role_name, workspace_id);
        {
            let mut agents = self.agents.write().unwrap_or_else(std::sync::PoisonError::into_inner);
            agents.insert(
                agent_id.to_owned(),
                Mutex::new(AgentState {
                    agent: agent.clone(),
                    role,
                }),
            );
        }
        self.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner).register(agent_id);
        tracing::info!(agent_id, role_name, workspace_id, "agent created");
        Ok(agent)
    }

    /// §4.9 "Agent lifecycle": terminate and forget the agent.
    pub fn shutdown_agent(&self, agent_id: &str) -> Result<(), CoreError> {
        let mut agents = self.agents.write().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = agents.get(agent_id).ok_or_else(|| CoreError::OperationInvalid {
            reason: format!("unknown agent '{agent_id}'"),
        })?;
        state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).agent.status = AgentStatus::Terminated;
        agents.remove(agent_id);
        drop(agents);
        self.messages.lock().unwrap_or_else(std::sync::PoisonError::into_inner).unregister(agent_id);
        tracing::info!(agent_id, "agent terminated");
        Ok(())
    }

    #[must_use]
    pub fn get_agent(&self, agent_id: &str) -> Option<Agent> {
        let agents = self.agents.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        agents
            .get(agent_id)
            .map(|state| state.lock().unwrap_or_else(std::sync::PoisonError::into_inner).agent.clone())
    }

    /// §4.9 "Role enforcement" + "Dispatch": check `role.can_execute`
    /// before anything else, then run the operation and update the
    /// agent's metrics regardless of outcome.
    #[tracing::instrument(skip(self, params), fields(agent_id, operation))]
    pub fn execute_operation(&self, agent_id: &str, operation: &str, params: &Value) -> Result<Value, CoreError> {
        let agents = self.agents.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state_lock = agents.get(agent_id).ok_or_else(|| CoreError::OperationInvalid {
            reason: format!("unknown agent '{agent_id}'"),
        })?;
        let mut state = state_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);

        if !state.role.can_execute(operation) {
            let err = CoreError::RoleViolation {
                agent_id: agent_id.to_owned(),
                role_name: state.role.name.clone(),
                operation: operation.to_owned(),
            };
            state.agent.record_error(operation, &err);
            tracing::warn!(agent_id, operation, "role violation blocked before dispatch");
            return Err(err);
        }

        state.agent.status = AgentStatus::Working;
        let workspace_id = state.agent.workspace_id.clone();
        drop(state);
        drop(agents);

        let mut full_params = params.clone();
        if let Some(object) = full_params.as_object_mut() {
            object.entry("workspace").or_insert_with(|| Value::String(workspace_id));
        }

        let start = std::time::Instant::now();
        let result = self.dispatcher.execute(operation, &full_params, agent_id);
        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

        let agents = self.agents.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let Some(state_lock) = agents.get(agent_id) else {
            return result;
        };
        let mut state = state_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match &result {
            Ok(value) => {
                let output_entities = extract_entity_ids(value);
                state.agent.record_success(operation, duration_ms, &output_entities);
            }
            Err(err) => {
                state.agent.record_error(operation, err);
            }
        }
        result
    }

    /// §4.9 "Concurrency": run every task in a phase in parallel via a
    /// bounded worker pool, each task dispatched through its assigned
    /// agent's `execute_operation`.
    pub fn run_phase(&self, phase: &[TaskAssignment], operation_params: &HashMap<String, Value>) -> Vec<Result<Value, CoreError>> {
        let chunk_size = self.max_concurrent_agents.max(1);
        let mut results = Vec::with_capacity(phase.len());

        for batch in phase.chunks(chunk_size) {
            std::thread::scope(|scope| {
                let handles: Vec<_> = batch
                    .iter()
                    .map(|task| {
                        let agent_id = task.agent_id.clone().unwrap_or_default();
                        let params = operation_params.get(&task.task_id).cloned().unwrap_or_else(|| serde_json::json!({}));
                        let operation = task.required_operations.first().cloned().unwrap_or_default();
                        scope.spawn(move || self.execute_operation(&agent_id, &operation, &params))
                    })
                    .collect();
                for handle in handles {
                    results.push(handle.join().unwrap_or_else(|_| {
                        Err(CoreError::OperationInvalid {
                            reason: "worker thread panicked".to_owned(),
                        })
                    }));
                }
            });
        }
        results
    }

    /// §4.9 "Task decomposition" + "Dependency resolution".
    #[must_use]
    pub fn decompose_task(&self, goal: &str) -> Vec<TaskAssignment> {
        tasks::decompose_task(goal)
    }

    pub fn resolve_dependencies(&self, assignments: &[TaskAssignment]) -> Result<Vec<Vec<TaskAssignment>>, CoreError> {
        tasks::resolve_dependencies(assignments)
    }

    /// §4.9 "Assignment".
    pub fn assign_task(&self, task: &mut TaskAssignment, agent_id: &str) -> Result<(), CoreError> {
        let agents = self.agents.read().unwrap_or_else(std::sync::PoisonError::into_inner);
        let state_lock = agents.get(agent_id).ok_or_else(|| CoreError::OperationInvalid {
            reason: format!("unknown agent '{agent_id}'"),
        })?;
        let state = state_lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        tasks::assign_task(task, agent_id, &state.role)
    }

    /// §4.9 "Agent metrics computation".
    pub fn agent_learning_metrics(&self, agent_id: &str) -> Result<AgentLearningMetrics, CoreError> {
        let agent = self.get_agent(agent_id).ok_or_else(|| CoreError::OperationInvalid {
            reason: format!("unknown agent '{agent_id}'"),
        })?;
        Ok(metrics::compute(&agent.operation_history))
    }

    /// §4.9 "Messaging" `send_message`.
    pub fn send_message(&self, from: &str, to: &str, message_type: MessageType, content: Value) -> Result<AgentMessage, CoreError> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .send(from, to, message_type, content)
    }

    /// §4.9 "Messaging" `get_messages`.
    pub fn get_messages(&self, agent_id: &str, mark_read: bool) -> Vec<AgentMessage> {
        self.messages
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(agent_id, mark_read)
    }
}

/// Pull entity ids out of a dispatch result's `data` payload so they can
/// be tracked on the agent's `created_entities` list (§3 Agent). Handler
/// responses place a single entity under `entity_id`, or multiple under
/// an `entities` array.
fn extract_entity_ids(value: &Value) -> Vec<String> {
    let mut ids = Vec::new();
    if let Some(id) = value.get("entity_id").and_then(Value::as_str) {
        ids.push(id.to_owned());
    }
    if let Some(array) = value.get("entities").and_then(Value::as_array) {
        for entry in array {
            if let Some(id) = entry.get("entity_id").and_then(Value::as_str) {
                ids.push(id.to_owned());
            }
        }
    }
    ids
}
