//! Inter-agent messaging bus (§3 AgentMessage, §4.9 "Messaging").
//!
//! One bounded FIFO queue per agent; `broadcast` fans a message out to
//! every queue except the sender's.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids;
use crate::time::now_iso8601;

/// Destination for an [`AgentMessage`]: a specific agent, or every agent.
pub const BROADCAST: &str = "broadcast";

const MAX_QUEUE_LEN: usize = 1000;
const LATENCY_WARNING_MS: f64 = 100.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Request,
    Response,
    Broadcast,
    Error,
}

/// A single message on the bus (§3 AgentMessage).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentMessage {
    pub message_id: String,
    pub from_agent_id: String,
    pub to_agent_id: String,
    pub message_type: MessageType,
    pub content: serde_json::Value,
    pub timestamp: String,
    pub read: bool,
}

/// Validate `content` against the per-type required-field set (§4.9).
fn validate_content(message_type: MessageType, content: &serde_json::Value) -> Result<(), CoreError> {
    let required: &[&str] = match message_type {
        MessageType::Request => &["request_type"],
        MessageType::Response => &["request_id", "status"],
        MessageType::Broadcast => &["announcement"],
        MessageType::Error => &["error_code", "error_message"],
    };
    let object = content.as_object().ok_or_else(|| CoreError::InvalidParameter {
        field: "content".to_owned(),
        provided_value: content.to_string(),
        reason: "message content must be a JSON object".to_owned(),
    })?;
    for field in required {
        if !object.contains_key(*field) {
            return Err(CoreError::MissingParameter {
                field: (*field).to_owned(),
            });
        }
    }
    Ok(())
}

/// Per-agent bounded FIFO queues (§5 "Message queues are bounded FIFOs,
/// one per agent").
#[derive(Default)]
pub struct MessageBus {
    queues: HashMap<String, VecDeque<AgentMessage>>,
}

impl MessageBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an empty queue for a newly created agent.
    pub fn register(&mut self, agent_id: &str) {
        self.queues.entry(agent_id.to_owned()).or_default();
    }

    /// Discard a terminated agent's queue.
    pub fn unregister(&mut self, agent_id: &str) {
        self.queues.remove(agent_id);
    }

    /// §4.9 `send_message`: validate, stamp, and deliver to the named
    /// queue or fan out to every agent except the sender.
    pub fn send(
        &mut self,
        from: &str,
        to: &str,
        message_type: MessageType,
        content: serde_json::Value,
    ) -> Result<AgentMessage, CoreError> {
        if !self.queues.contains_key(from) {
            return Err(CoreError::OperationInvalid {
                reason: format!("unknown sending agent '{from}'"),
            });
        }
        validate_content(message_type, &content)?;

        let message = AgentMessage {
            message_id: ids::message_id(),
            from_agent_id: from.to_owned(),
            to_agent_id: to.to_owned(),
            message_type,
            content,
            timestamp: now_iso8601(),
            read: false,
        };

        if to == BROADCAST {
            let recipients: Vec<String> = self.queues.keys().filter(|id| id.as_str() != from).cloned().collect();
            for recipient in recipients {
                self.push(&recipient, message.clone());
            }
        } else {
            if !self.queues.contains_key(to) {
                return Err(CoreError::OperationInvalid {
                    reason: format!("unknown recipient agent '{to}'"),
                });
            }
            self.push(to, message.clone());
        }

        Ok(message)
    }

    fn push(&mut self, agent_id: &str, message: AgentMessage) {
        let queue = self.queues.entry(agent_id.to_owned()).or_default();
        queue.push_back(message);
        if queue.len() > MAX_QUEUE_LEN {
            queue.pop_front();
        }
    }

    /// §4.9 `get_messages`: drain the queue, computing delivery latency
    /// for each message and warning past the 100ms design target.
    pub fn drain(&mut self, agent_id: &str, mark_read: bool) -> Vec<AgentMessage> {
        let Some(queue) = self.queues.get_mut(agent_id) else {
            return Vec::new();
        };
        let now = now_iso8601();
        let mut drained: Vec<AgentMessage> = queue.drain(..).collect();
        for message in &mut drained {
            if mark_read {
                message.read = true;
            }
            let latency_ms = crate::time::duration_ms(&message.timestamp, &now);
            if latency_ms > LATENCY_WARNING_MS {
                tracing::warn!(
                    message_id = %message.message_id,
                    agent_id = %agent_id,
                    latency_ms,
                    "message delivery latency exceeded design target"
                );
            }
        }
        drained
    }
}
