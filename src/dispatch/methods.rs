//! The dispatcher's method table (§4.6, §9 "dynamic dispatch via
//! method-name table").
//!
//! An enumerated set of operations with a static mapping from wire
//! method names, rather than raw string-keyed dispatch — unknown
//! aliases fail fast instead of silently diverging from their canonical
//! method (§9 open question: the dotted form is canonical, underscored
//! forms are explicit aliases, any third spelling is deprecated-on-sight).

/// A canonical dispatcher operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Method {
    EntityCreatePoint,
    EntityCreateLine,
    EntityCreateCircle,
    EntityCreateArc,
    EntityQuery,
    EntityList,
    ConstraintApply,
    ConstraintStatus,
    SolidExtrude,
    SolidBoolean,
    WorkspaceCreate,
    WorkspaceList,
    WorkspaceSwitch,
    WorkspaceStatus,
    WorkspaceMerge,
    WorkspaceResolveConflict,
    HistoryList,
    HistoryUndo,
    HistoryRedo,
    FileExport,
    FileImport,
    AgentMetrics,
    ScenarioRun,
}

impl Method {
    /// The canonical dotted wire name.
    #[must_use]
    pub const fn canonical(self) -> &'static str {
        match self {
            Self::EntityCreatePoint => "entity.create.point",
            Self::EntityCreateLine => "entity.create.line",
            Self::EntityCreateCircle => "entity.create.circle",
            Self::EntityCreateArc => "entity.create.arc",
            Self::EntityQuery => "entity.query",
            Self::EntityList => "entity.list",
            Self::ConstraintApply => "constraint.apply",
            Self::ConstraintStatus => "constraint.status",
            Self::SolidExtrude => "solid.extrude",
            Self::SolidBoolean => "solid.boolean",
            Self::WorkspaceCreate => "workspace.create",
            Self::WorkspaceList => "workspace.list",
            Self::WorkspaceSwitch => "workspace.switch",
            Self::WorkspaceStatus => "workspace.status",
            Self::WorkspaceMerge => "workspace.merge",
            Self::WorkspaceResolveConflict => "workspace.resolve_conflict",
            Self::HistoryList => "history.list",
            Self::HistoryUndo => "history.undo",
            Self::HistoryRedo => "history.redo",
            Self::FileExport => "file.export",
            Self::FileImport => "file.import",
            Self::AgentMetrics => "agent.metrics",
            Self::ScenarioRun => "scenario.run",
        }
    }

    /// The deprecated-but-accepted underscore alias for methods that have
    /// one (the `entity.create.*` family, §4.6).
    #[must_use]
    pub const fn alias(self) -> Option<&'static str> {
        match self {
            Self::EntityCreatePoint => Some("entity_create_point"),
            Self::EntityCreateLine => Some("entity_create_line"),
            Self::EntityCreateCircle => Some("entity_create_circle"),
            Self::EntityCreateArc => Some("entity_create_arc"),
            _ => None,
        }
    }

    /// All known methods, in table order.
    pub const ALL: [Self; 22] = [
        Self::EntityCreatePoint,
        Self::EntityCreateLine,
        Self::EntityCreateCircle,
        Self::EntityCreateArc,
        Self::EntityQuery,
        Self::EntityList,
        Self::ConstraintApply,
        Self::ConstraintStatus,
        Self::SolidExtrude,
        Self::SolidBoolean,
        Self::WorkspaceCreate,
        Self::WorkspaceList,
        Self::WorkspaceSwitch,
        Self::WorkspaceStatus,
        Self::WorkspaceMerge,
        Self::WorkspaceResolveConflict,
        Self::HistoryList,
        Self::HistoryUndo,
        Self::HistoryRedo,
        Self::FileExport,
        Self::FileImport,
        Self::AgentMetrics,
    ];

    /// Resolve a wire method name to its canonical [`Method`], accepting
    /// both dotted and underscore-aliased spellings.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .chain([Self::ScenarioRun])
            .find(|m| m.canonical() == name || m.alias() == Some(name))
    }

    /// The full list of canonical method names, for `InvalidCommand`
    /// error payloads (§4.6 step 2).
    #[must_use]
    pub fn known_methods() -> Vec<&'static str> {
        Self::ALL
            .into_iter()
            .chain([Self::ScenarioRun])
            .map(Self::canonical)
            .collect()
    }
}
