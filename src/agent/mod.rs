//! Multi-agent controller (§4.9): agent lifecycle, role enforcement,
//! task decomposition/assignment, and inter-agent messaging, layered on
//! top of the [`crate::dispatch::Dispatcher`].

pub mod controller;
pub mod messages;
pub mod metrics;
pub mod roles;
pub mod tasks;

pub use controller::{Agent, AgentController, AgentStatus, ErrorLogEntry};
pub use messages::{AgentMessage, MessageBus, MessageType, BROADCAST};
pub use metrics::{AgentLearningMetrics, ErrorTrend, LearningStatus, OperationRecord};
pub use roles::{RoleRegistry, RoleTemplate};
pub use tasks::{decompose_task, resolve_dependencies, TaskAssignment, TaskStatus};
