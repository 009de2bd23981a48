//! Unified error taxonomy for cadkit operations.
//!
//! Defines [`CoreError`], the error type every handler in the dispatcher,
//! store, constraint graph, and controller returns. Each variant is
//! self-contained: an agent receiving it should understand what happened
//! and what to try next without additional context (§7).
//!
//! Every variant maps to exactly one [`ErrorCode`], the JSON-RPC-compatible
//! numeric code surfaced on the wire (§6).

use std::fmt;

// ---------------------------------------------------------------------------
// ErrorCode
// ---------------------------------------------------------------------------

/// JSON-RPC-compatible numeric error code.
///
/// Protocol-shape codes reuse the standard JSON-RPC 2.0 range; domain codes
/// use the custom range starting at -32001.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Malformed request envelope (not valid JSON-RPC 2.0).
    ParseError,
    /// Request envelope shape is invalid (missing `method`, bad `jsonrpc`).
    InvalidRequest,
    /// `method` does not name a known dispatcher operation.
    InvalidCommand,
    /// A required parameter is missing or malformed.
    InvalidParameter,
    /// The referenced entity does not exist in the workspace.
    EntityNotFound,
    /// Geometry fails primitive validation (bounds, degeneracy).
    InvalidGeometry,
    /// New constraint contradicts an existing one on the same entities.
    ConstraintConflict,
    /// A dependency graph (tasks) contains a cycle.
    CircularDependency,
    /// Constraint type/parameters are not well-formed.
    InvalidConstraint,
    /// Operation precondition unmet (e.g. merge of an unmergeable branch).
    OperationInvalid,
    /// Resulting topology is invalid (non-manifold, not closed).
    TopologyError,
    /// The named workspace does not exist.
    WorkspaceNotFound,
    /// Workspace is not in a state that permits the requested action.
    WorkspaceConflict,
    /// An agent attempted an operation its role forbids.
    RoleViolation,
    /// Referenced file does not exist.
    FileNotFound,
    /// Requested file format is not supported.
    UnsupportedFormat,
    /// Import could not be completed.
    ImportFailed,
    /// The kernel or dispatcher ran out of resources.
    InsufficientMemory,
    /// A bounded operation exceeded its deadline.
    Timeout,
    /// The geometry kernel failed for a reason not covered above.
    GeometryEngineError,
}

impl ErrorCode {
    /// The numeric value placed on the wire (§6).
    #[must_use]
    pub const fn as_i64(self) -> i64 {
        match self {
            Self::ParseError => -32700,
            Self::InvalidRequest => -32600,
            Self::InvalidCommand => -32601,
            Self::InvalidParameter => -32602,
            Self::EntityNotFound => -32001,
            Self::ConstraintConflict => -32002,
            Self::CircularDependency => -32003,
            Self::InvalidConstraint => -32004,
            Self::OperationInvalid => -32005,
            Self::TopologyError => -32006,
            Self::WorkspaceConflict | Self::WorkspaceNotFound | Self::RoleViolation => -32007,
            Self::FileNotFound => -32008,
            Self::UnsupportedFormat => -32009,
            Self::ImportFailed => -32010,
            Self::InsufficientMemory => -32011,
            Self::Timeout => -32012,
            Self::InvalidGeometry | Self::GeometryEngineError => -32603,
        }
    }

    /// A default, generic remediation suggestion for this code.
    ///
    /// [`CoreError::suggestion`] prefers a variant-specific suggestion when
    /// one carries more detail than this table entry.
    #[must_use]
    pub const fn default_suggestion(self) -> &'static str {
        match self {
            Self::ParseError => "Send a well-formed JSON-RPC 2.0 request",
            Self::InvalidRequest => "Include jsonrpc, method, and id fields",
            Self::InvalidCommand => "Use a method from the dispatcher's known method table",
            Self::InvalidParameter => "Check parameter type and value constraints",
            Self::EntityNotFound => "Use entity.list to see available entities",
            Self::InvalidGeometry => "Ensure coordinates are finite and within bounds [-1e6, 1e6]",
            Self::ConstraintConflict => "Remove the conflicting constraint first",
            Self::CircularDependency => "Break the dependency cycle between tasks",
            Self::InvalidConstraint => {
                "Check the constraint type's required entity count and parameters"
            }
            Self::OperationInvalid => "Check the workspace/branch state before retrying",
            Self::TopologyError => "The resulting solid is not closed or not manifold; adjust inputs",
            Self::WorkspaceNotFound => "Use workspace.list to see available workspaces",
            Self::WorkspaceConflict => "Use workspace.resolve_conflict to resolve merge conflicts",
            Self::RoleViolation => "Request an agent whose role allows this operation",
            Self::FileNotFound => "Check the file path exists and is accessible",
            Self::UnsupportedFormat => "Supported formats: STEP, STL, JSON",
            Self::ImportFailed => "Check the file is well-formed for its declared format",
            Self::InsufficientMemory => "Reduce the tessellation quality preset or batch size",
            Self::Timeout => "Retry, or split the operation into smaller steps",
            Self::GeometryEngineError => "Inspect the kernel error detail and retry with valid inputs",
        }
    }
}

// ---------------------------------------------------------------------------
// CoreError
// ---------------------------------------------------------------------------

/// Unified error type for all cadkit core operations.
#[derive(Debug)]
pub enum CoreError {
    /// The JSON-RPC envelope itself could not be parsed.
    Parse { detail: String },

    /// The envelope was valid JSON but not a valid request shape.
    InvalidRequest { detail: String },

    /// `method` is not in the dispatcher's method table.
    InvalidCommand {
        method: String,
        known_methods: Vec<&'static str>,
    },

    /// A required parameter was missing.
    MissingParameter { field: String },

    /// A parameter was present but had an invalid value.
    InvalidParameter {
        field: String,
        provided_value: String,
        reason: String,
    },

    /// An entity id did not resolve in the given workspace.
    EntityNotFound {
        entity_id: String,
        workspace_id: String,
    },

    /// A primitive or computed geometry failed validation.
    InvalidGeometry { reason: String },

    /// A new constraint contradicts an existing one.
    ConstraintConflict {
        conflicting_constraint_id: String,
        conflicting_constraint_type: String,
        reason: String,
    },

    /// A dependency graph contains a cycle or dangling reference.
    CircularDependency { detail: String },

    /// The constraint type or its entity/parameter shape is invalid.
    InvalidConstraint { reason: String },

    /// An operation's precondition was not met.
    OperationInvalid { reason: String },

    /// Resulting topology failed a closed/manifold check.
    TopologyError { reason: String },

    /// The workspace id (canonical or short name) did not resolve.
    WorkspaceNotFound { workspace_id: String },

    /// The workspace is not in a state that allows the requested action.
    WorkspaceConflict { workspace_id: String, reason: String },

    /// An agent attempted an operation outside its role's capability set.
    RoleViolation {
        agent_id: String,
        role_name: String,
        operation: String,
    },

    /// A referenced file does not exist.
    FileNotFound { path: String },

    /// The requested file format is not supported.
    UnsupportedFormat { format: String },

    /// Import failed to parse or reconcile the source file.
    ImportFailed { detail: String },

    /// The kernel or dispatcher ran out of resources.
    InsufficientMemory { detail: String },

    /// A bounded operation exceeded its deadline.
    Timeout { operation: String, limit_ms: u64 },

    /// The geometry kernel failed in a way not covered by a more specific
    /// variant.
    GeometryEngineError { detail: String },

    /// Stored data could not be parsed back into a typed record.
    Corrupt { context: String, detail: String },

    /// An I/O error occurred while reading configuration or files.
    Io(std::io::Error),
}

impl CoreError {
    /// The wire error code for this variant.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Parse { .. } => ErrorCode::ParseError,
            Self::InvalidRequest { .. } => ErrorCode::InvalidRequest,
            Self::InvalidCommand { .. } => ErrorCode::InvalidCommand,
            Self::MissingParameter { .. } | Self::InvalidParameter { .. } => {
                ErrorCode::InvalidParameter
            }
            Self::EntityNotFound { .. } => ErrorCode::EntityNotFound,
            Self::InvalidGeometry { .. } => ErrorCode::InvalidGeometry,
            Self::ConstraintConflict { .. } => ErrorCode::ConstraintConflict,
            Self::CircularDependency { .. } => ErrorCode::CircularDependency,
            Self::InvalidConstraint { .. } => ErrorCode::InvalidConstraint,
            Self::OperationInvalid { .. } => ErrorCode::OperationInvalid,
            Self::TopologyError { .. } => ErrorCode::TopologyError,
            Self::WorkspaceNotFound { .. } => ErrorCode::WorkspaceNotFound,
            Self::WorkspaceConflict { .. } => ErrorCode::WorkspaceConflict,
            Self::RoleViolation { .. } => ErrorCode::RoleViolation,
            Self::FileNotFound { .. } => ErrorCode::FileNotFound,
            Self::UnsupportedFormat { .. } => ErrorCode::UnsupportedFormat,
            Self::ImportFailed { .. } => ErrorCode::ImportFailed,
            Self::InsufficientMemory { .. } => ErrorCode::InsufficientMemory,
            Self::Timeout { .. } => ErrorCode::Timeout,
            Self::GeometryEngineError { .. } | Self::Corrupt { .. } | Self::Io(_) => {
                ErrorCode::GeometryEngineError
            }
        }
    }

    /// Whether an agent can reasonably retry after addressing this error.
    #[must_use]
    pub const fn recoverable(&self) -> bool {
        !matches!(self, Self::Corrupt { .. } | Self::Io(_))
    }

    /// An agent-facing suggestion for how to fix this error.
    #[must_use]
    pub fn suggestion(&self) -> String {
        match self {
            Self::InvalidCommand { known_methods, .. } => {
                format!("Known methods: {}", known_methods.join(", "))
            }
            Self::EntityNotFound { .. } => {
                ErrorCode::EntityNotFound.default_suggestion().to_owned()
            }
            Self::ConstraintConflict {
                conflicting_constraint_id,
                ..
            } => format!(
                "Remove conflicting constraint '{conflicting_constraint_id}' first, or adjust the new constraint's parameters"
            ),
            other => other.code().default_suggestion().to_owned(),
        }
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse { detail } => write!(f, "failed to parse request: {detail}"),
            Self::InvalidRequest { detail } => write!(f, "invalid request: {detail}"),
            Self::InvalidCommand { method, .. } => write!(f, "unknown method '{method}'"),
            Self::MissingParameter { field } => {
                write!(f, "missing required parameter '{field}'")
            }
            Self::InvalidParameter {
                field,
                provided_value,
                reason,
            } => write!(
                f,
                "invalid value for parameter '{field}' ({provided_value}): {reason}"
            ),
            Self::EntityNotFound {
                entity_id,
                workspace_id,
            } => write!(
                f,
                "entity '{entity_id}' does not exist in workspace '{workspace_id}'"
            ),
            Self::InvalidGeometry { reason } => write!(f, "invalid geometry: {reason}"),
            Self::ConstraintConflict {
                conflicting_constraint_type,
                reason,
                ..
            } => write!(
                f,
                "constraint conflicts with existing {conflicting_constraint_type} constraint: {reason}"
            ),
            Self::CircularDependency { detail } => write!(f, "circular dependency: {detail}"),
            Self::InvalidConstraint { reason } => write!(f, "invalid constraint: {reason}"),
            Self::OperationInvalid { reason } => {
                write!(f, "operation cannot be performed: {reason}")
            }
            Self::TopologyError { reason } => write!(f, "invalid topology: {reason}"),
            Self::WorkspaceNotFound { workspace_id } => {
                write!(f, "workspace '{workspace_id}' not found")
            }
            Self::WorkspaceConflict {
                workspace_id,
                reason,
            } => write!(f, "workspace '{workspace_id}' conflict: {reason}"),
            Self::RoleViolation {
                agent_id,
                role_name,
                operation,
            } => write!(
                f,
                "agent '{agent_id}' with role '{role_name}' cannot execute '{operation}' — operation not permitted by role constraints"
            ),
            Self::FileNotFound { path } => write!(f, "file not found: {path}"),
            Self::UnsupportedFormat { format } => write!(f, "unsupported format: {format}"),
            Self::ImportFailed { detail } => write!(f, "import failed: {detail}"),
            Self::InsufficientMemory { detail } => write!(f, "insufficient memory: {detail}"),
            Self::Timeout {
                operation,
                limit_ms,
            } => write!(f, "operation '{operation}' timed out after {limit_ms}ms"),
            Self::GeometryEngineError { detail } => write!(f, "geometry engine error: {detail}"),
            Self::Corrupt { context, detail } => write!(f, "corrupt data in {context}: {detail}"),
            Self::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl std::error::Error for CoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<cadkit_kernel::KernelError> for CoreError {
    fn from(err: cadkit_kernel::KernelError) -> Self {
        use cadkit_kernel::KernelError as K;
        match err {
            K::InvalidGeometry { reason } => Self::InvalidGeometry { reason },
            K::OperationFailed { detail }
            | K::SerializationFailed { detail }
            | K::TessellationFailed { detail }
            | K::PropertyComputationFailed { detail } => Self::GeometryEngineError { detail },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_codes_match_spec_ranges() {
        assert_eq!(ErrorCode::EntityNotFound.as_i64(), -32001);
        assert_eq!(ErrorCode::ConstraintConflict.as_i64(), -32002);
        assert_eq!(ErrorCode::CircularDependency.as_i64(), -32003);
        assert_eq!(ErrorCode::InvalidConstraint.as_i64(), -32004);
        assert_eq!(ErrorCode::OperationInvalid.as_i64(), -32005);
        assert_eq!(ErrorCode::TopologyError.as_i64(), -32006);
        assert_eq!(ErrorCode::WorkspaceConflict.as_i64(), -32007);
        assert_eq!(ErrorCode::FileNotFound.as_i64(), -32008);
        assert_eq!(ErrorCode::UnsupportedFormat.as_i64(), -32009);
        assert_eq!(ErrorCode::ImportFailed.as_i64(), -32010);
        assert_eq!(ErrorCode::InsufficientMemory.as_i64(), -32011);
        assert_eq!(ErrorCode::Timeout.as_i64(), -32012);
        assert_eq!(ErrorCode::InvalidGeometry.as_i64(), -32603);
        assert_eq!(ErrorCode::GeometryEngineError.as_i64(), -32603);
    }

    #[test]
    fn display_role_violation_is_agent_friendly() {
        let err = CoreError::RoleViolation {
            agent_id: "agent-1".to_owned(),
            role_name: "designer".to_owned(),
            operation: "solid.extrude".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("agent-1"));
        assert!(msg.contains("designer"));
        assert!(msg.contains("solid.extrude"));
    }

    #[test]
    fn display_entity_not_found() {
        let err = CoreError::EntityNotFound {
            entity_id: "main:point_deadbeef".to_owned(),
            workspace_id: "main".to_owned(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("main:point_deadbeef"));
        assert!(msg.contains("main"));
        assert_eq!(err.suggestion(), "Use entity.list to see available entities");
    }

    #[test]
    fn constraint_conflict_suggestion_names_offender() {
        let err = CoreError::ConstraintConflict {
            conflicting_constraint_id: "c_1".to_owned(),
            conflicting_constraint_type: "perpendicular".to_owned(),
            reason: "same entity pair".to_owned(),
        };
        assert!(err.suggestion().contains("c_1"));
    }

    #[test]
    fn corrupt_and_io_are_unrecoverable() {
        assert!(
            !CoreError::Corrupt {
                context: "entity".to_owned(),
                detail: "bad json".to_owned()
            }
            .recoverable()
        );
        assert!(!CoreError::Io(std::io::Error::other("disk")).recoverable());
    }

    #[test]
    fn other_errors_are_recoverable() {
        assert!(
            CoreError::EntityNotFound {
                entity_id: "x".to_owned(),
                workspace_id: "main".to_owned()
            }
            .recoverable()
        );
    }
}
