//! Operation dispatcher (§4.6): the single entry point every agent
//! request flows through, whatever the transport. Resolves a method
//! name, validates parameters, runs the handler against the store/graph/
//! workspace manager/kernel, times it, and journals the result.

pub mod codec;
mod methods;
mod params;
mod timer;

use std::sync::Arc;

use serde_json::{json, Value};

use cadkit_kernel::{BooleanOp, GeometryBackend, Profile, QualityPreset, Solid};

pub use methods::Method;
pub use params::Params;
pub use timer::OperationTimer;

use crate::config::CadkitConfig;
use crate::constraint::{ConstraintGraph, SolveReport};
use crate::error::CoreError;
use crate::history::HistoryManager;
use crate::ids;
use crate::store::{
    Constraint, ConstraintParameters, ConstraintType, Entity, EntityProperties, EntityType,
    GeometryShape, Operation, ResultStatus, SolidProperties, SolidTopology, Store, Vec3,
    WorkspaceType,
};
use crate::time::now_iso8601;
use crate::workspace::merge::{self, MergeReport, ResolutionStrategy};
use crate::workspace::WorkspaceManager;

/// The composition root every transport (CLI stdio loop, multi-agent
/// controller) dispatches requests through.
pub struct Dispatcher {
    store: Arc<Store>,
    workspaces: WorkspaceManager,
    history: HistoryManager,
    kernel: Arc<dyn GeometryBackend>,
    config: CadkitConfig,
}

impl Dispatcher {
    #[must_use]
    pub fn new(store: Arc<Store>, kernel: Arc<dyn GeometryBackend>, config: CadkitConfig) -> Self {
        Self {
            store,
            workspaces: WorkspaceManager::new(),
            history: HistoryManager::new(),
            kernel,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    #[must_use]
    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    #[must_use]
    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Dispatch one request (§4.6 steps 1-5): resolve method, parse
    /// params, run the handler, journal the outcome, return the payload.
    #[tracing::instrument(skip(self, raw_params), fields(method = method_name, agent_id = %agent_id))]
    pub fn execute(&self, method_name: &str, raw_params: &Value, agent_id: &str) -> Result<Value, CoreError> {
        let method = Method::parse(method_name).ok_or_else(|| CoreError::InvalidCommand {
            method: method_name.to_owned(),
            known_methods: Method::known_methods(),
        })?;
        let params = Params::new(raw_params);
        let timer = OperationTimer::start();

        let result = self.dispatch_method(method, &params, agent_id);

        let workspace_id = params
            .optional_str("workspace")
            .map_or_else(|| self.workspaces.active_id(), ToOwned::to_owned);
        self.journal(method, raw_params, agent_id, &workspace_id, &result, timer.elapsed_ms());
        result
    }

    fn dispatch_method(&self, method: Method, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        match method {
            Method::EntityCreatePoint => self.entity_create_point(params, agent_id),
            Method::EntityCreateLine => self.entity_create_line(params, agent_id),
            Method::EntityCreateCircle => self.entity_create_circle(params, agent_id),
            Method::EntityCreateArc => self.entity_create_arc(params, agent_id),
            Method::EntityQuery => self.entity_query(params),
            Method::EntityList => self.entity_list(params),
            Method::ConstraintApply => self.constraint_apply(params, agent_id),
            Method::ConstraintStatus => self.constraint_status(params),
            Method::SolidExtrude => self.solid_extrude(params, agent_id),
            Method::SolidBoolean => self.solid_boolean(params, agent_id),
            Method::WorkspaceCreate => self.workspace_create(params, agent_id),
            Method::WorkspaceList => self.workspace_list(),
            Method::WorkspaceSwitch => self.workspace_switch(params),
            Method::WorkspaceStatus => self.workspace_status(params),
            Method::WorkspaceMerge => self.workspace_merge(params),
            Method::WorkspaceResolveConflict => self.workspace_resolve_conflict(params),
            Method::HistoryList => self.history_list(params),
            Method::HistoryUndo => self.history_undo(params),
            Method::HistoryRedo => self.history_redo(params),
            Method::FileExport => self.file_export(params),
            Method::FileImport => self.file_import(params, agent_id),
            Method::AgentMetrics => self.agent_metrics(params),
            Method::ScenarioRun => Err(CoreError::OperationInvalid {
                reason: "scenario.run is handled by the agent controller, not the dispatcher"
                    .to_owned(),
            }),
        }
    }

    fn resolve_workspace(&self, params: &Params<'_>) -> Result<String, CoreError> {
        Ok(self
            .workspaces
            .resolve_or_active(&self.store, params.optional_str("workspace"))?
            .workspace_id)
    }

    // -- entity.create.* --------------------------------------------------

    fn entity_create_point(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let coordinates = params.coordinates("coordinates")?;
        validate_bounds("coordinates", coordinates)?;
        let entity_id = ids::entity_id(&workspace_id, EntityType::Point.as_str());
        let properties = EntityProperties::Point { coordinates };
        let entity = self.build_entity(entity_id, workspace_id, agent_id, properties, coordinates, coordinates)?;
        Ok(json!(entity))
    }

    fn entity_create_line(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let start = params.coordinates("start")?;
        let end = params.coordinates("end")?;
        validate_bounds("start", start)?;
        validate_bounds("end", end)?;
        if start.sub(end).length() < cadkit_kernel::MIN_DIMENSION {
            return Err(CoreError::InvalidGeometry {
                reason: "line start and end coincide".to_owned(),
            });
        }
        let entity_id = ids::entity_id(&workspace_id, EntityType::Line.as_str());
        let properties = EntityProperties::line(start, end);
        let (min, max) = bbox_of(&[start, end]);
        let entity = self.build_entity(entity_id, workspace_id, agent_id, properties, min, max)?;
        Ok(json!(entity))
    }

    fn entity_create_circle(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let center = params.coordinates("center")?;
        let radius = params.required_f64("radius")?;
        validate_bounds("center", center)?;
        validate_radius(radius)?;
        let entity_id = ids::entity_id(&workspace_id, EntityType::Circle.as_str());
        let properties = EntityProperties::circle(center, radius);
        let (min, max) = circle_bbox(center, radius);
        let entity = self.build_entity(entity_id, workspace_id, agent_id, properties, min, max)?;
        Ok(json!(entity))
    }

    fn entity_create_arc(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let center = params.coordinates("center")?;
        let radius = params.required_f64("radius")?;
        let start_angle = params.required_f64("start_angle")?;
        let end_angle = params.required_f64("end_angle")?;
        validate_bounds("center", center)?;
        validate_radius(radius)?;
        if (end_angle - start_angle).abs() < cadkit_kernel::MIN_DIMENSION {
            return Err(CoreError::InvalidGeometry {
                reason: "arc start_angle and end_angle coincide".to_owned(),
            });
        }
        let entity_id = ids::entity_id(&workspace_id, EntityType::Arc.as_str());
        let properties = EntityProperties::arc(center, radius, start_angle, end_angle);
        let (min, max) = circle_bbox(center, radius);
        let entity = self.build_entity(entity_id, workspace_id, agent_id, properties, min, max)?;
        Ok(json!(entity))
    }

    fn build_entity(
        &self,
        entity_id: String,
        workspace_id: String,
        agent_id: &str,
        properties: EntityProperties,
        bbox_min: Vec3,
        bbox_max: Vec3,
    ) -> Result<Entity, CoreError> {
        let now = now_iso8601();
        let entity = Entity {
            entity_id,
            workspace_id,
            created_at: now.clone(),
            modified_at: now,
            created_by_agent: Some(agent_id.to_owned()),
            parent_entities: Vec::new(),
            child_entities: Vec::new(),
            properties,
            bounding_box: crate::store::BoundingBox {
                min: bbox_min,
                max: bbox_max,
            },
            is_valid: true,
            validation_errors: Vec::new(),
        };
        self.store.entity_create(entity)
    }

    // -- entity query/list --------------------------------------------------

    fn entity_query(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let entity_id = params.required_str("entity_id")?;
        Ok(json!(self.store.entity_get(entity_id)?))
    }

    fn entity_list(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let entity_type = params
            .optional_str("entity_type")
            .map(parse_entity_type)
            .transpose()?;
        let limit = params.optional_u64("limit").unwrap_or(100) as usize;
        let offset = params.optional_u64("offset").unwrap_or(0) as usize;
        let page = self.store.entity_list(&workspace_id, entity_type, limit, offset);
        Ok(json!(page))
    }

    // -- constraints --------------------------------------------------------

    fn constraint_apply(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let constraint_type = parse_constraint_type(params.required_str("constraint_type")?)?;
        let entity_ids = params.required_str_array("entity_ids")?;
        if entity_ids.len() != constraint_type.required_entities() {
            return Err(CoreError::InvalidConstraint {
                reason: format!(
                    "{:?} requires exactly {} entities, got {}",
                    constraint_type,
                    constraint_type.required_entities(),
                    entity_ids.len()
                ),
            });
        }

        let parameters = ConstraintParameters {
            target_distance: params.optional_f64("target_distance"),
            target_angle: params.optional_f64("target_angle"),
            target_radius: params.optional_f64("target_radius"),
        };

        let entities: Vec<Entity> = entity_ids
            .iter()
            .map(|id| self.store.entity_get(id))
            .collect::<Result<_, _>>()?;
        let existing_constraints = self.store.constraint_list(&workspace_id);
        let graph = ConstraintGraph::build(entities, existing_constraints);

        let candidate = Constraint {
            constraint_id: ids::constraint_id(&workspace_id),
            constraint_type,
            workspace_id: workspace_id.clone(),
            entity_ids,
            parameters,
            satisfaction_status: crate::store::SatisfactionStatus::Violated,
            degrees_of_freedom_removed: 1,
            tolerance: constraint_type.default_tolerance(),
            created_at: now_iso8601(),
            created_by_agent: Some(agent_id.to_owned()),
        };

        let conflict = graph.check_conflict(&candidate);
        if conflict.is_conflicting {
            return Err(CoreError::ConstraintConflict {
                conflicting_constraint_id: conflict.conflicting_constraint_id.unwrap_or_default(),
                conflicting_constraint_type: format!("{constraint_type:?}").to_lowercase(),
                reason: "new constraint contradicts an existing one on the same entities"
                    .to_owned(),
            });
        }

        let residual = graph.residual(&candidate)?;
        let mut candidate = candidate;
        candidate.satisfaction_status = if residual < candidate.tolerance {
            crate::store::SatisfactionStatus::Satisfied
        } else {
            crate::store::SatisfactionStatus::Violated
        };
        Ok(json!(self.store.constraint_create(candidate)?))
    }

    fn constraint_status(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        if let Some(constraint_id) = params.optional_str("constraint_id") {
            let constraint = self.store.constraint_get(constraint_id)?;
            let entities: Vec<Entity> = constraint
                .entity_ids
                .iter()
                .map(|id| self.store.entity_get(id))
                .collect::<Result<_, _>>()?;
            let graph = ConstraintGraph::build(entities, vec![constraint.clone()]);
            let residual = graph.residual(&constraint)?;
            return Ok(json!({ "constraint": constraint, "residual": residual }));
        }

        let constraints = self.store.constraint_list(&workspace_id);
        let entities = self.store.entity_list(&workspace_id, None, usize::MAX, 0).items;
        let graph = ConstraintGraph::build(entities, constraints.clone());
        let report: SolveReport =
            crate::constraint::solver::evaluate(&graph, &constraints, self.config.solver.tolerance);
        for updated in &report.updated {
            self.store
                .constraint_update(&updated.constraint_id, |c| {
                    c.satisfaction_status = updated.satisfaction_status;
                })?;
        }
        Ok(json!(report))
    }

    // -- solids --------------------------------------------------------------

    fn solid_extrude(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let distance = params.required_f64("distance")?;

        if let Some(entity_ids) = params.optional_str_array("entity_ids")? {
            let entities: Vec<Entity> = entity_ids
                .iter()
                .map(|id| self.store.entity_get(id))
                .collect::<Result<_, _>>()?;
            let (profile, at) = profile_from_sketch(&entities)?;
            let at_point = cadkit_kernel::Point3::new(at.x, at.y, at.z);
            let solid = self.kernel.extrude(profile, distance, at_point)?;
            return self.persist_solid(solid, workspace_id, agent_id, entity_ids);
        }

        let profile = parse_profile(params)?;
        let at = params.coordinates("at").unwrap_or(Vec3::new(0.0, 0.0, 0.0));
        let at_point = cadkit_kernel::Point3::new(at.x, at.y, at.z);

        let solid = self.kernel.extrude(profile, distance, at_point)?;
        self.persist_solid(solid, workspace_id, agent_id, Vec::new())
    }

    fn solid_boolean(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let op = parse_boolean_op(params.required_str("operation")?)?;
        let a_id = params.required_str("a_entity_id")?.to_owned();
        let b_id = params.required_str("b_entity_id")?.to_owned();
        let a_solid = self.load_solid(&a_id)?;
        let b_solid = self.load_solid(&b_id)?;

        let solid = self.kernel.boolean(op, a_solid, b_solid)?;
        self.persist_solid(solid, workspace_id, agent_id, vec![a_id, b_id])
    }

    fn load_solid(&self, entity_id: &str) -> Result<Solid, CoreError> {
        let shape = self.store.geometry_shape_get(entity_id)?;
        serde_json::from_value(shape.blob).map_err(|err| CoreError::Corrupt {
            context: entity_id.to_owned(),
            detail: err.to_string(),
        })
    }

    fn persist_solid(
        &self,
        solid: Solid,
        workspace_id: String,
        agent_id: &str,
        parent_entities: Vec<String>,
    ) -> Result<Value, CoreError> {
        let mass = self.kernel.mass_properties(&solid)?;
        let entity_id = ids::entity_id(&workspace_id, EntityType::Solid.as_str());

        self.store.geometry_shape_save(GeometryShape {
            shape_id: entity_id.clone(),
            shape_type: "solid".to_owned(),
            blob: serde_json::to_value(&solid).map_err(|err| CoreError::GeometryEngineError {
                detail: err.to_string(),
            })?,
        });

        let topology = SolidTopology {
            face_count: mass.topology.faces,
            edge_count: mass.topology.edges,
            vertex_count: mass.topology.vertices,
            is_closed: true,
            is_manifold: true,
        };
        self.store.solid_properties_save(SolidProperties {
            entity_id: entity_id.clone(),
            volume: mass.volume,
            surface_area: mass.surface_area,
            center_of_mass: Vec3::new(mass.center_of_mass.x, mass.center_of_mass.y, mass.center_of_mass.z),
            topology,
        });

        let now = now_iso8601();
        let entity = Entity {
            entity_id,
            workspace_id,
            created_at: now.clone(),
            modified_at: now,
            created_by_agent: Some(agent_id.to_owned()),
            parent_entities,
            child_entities: Vec::new(),
            properties: EntityProperties::Solid {
                volume: mass.volume,
                surface_area: mass.surface_area,
                center_of_mass: Vec3::new(mass.center_of_mass.x, mass.center_of_mass.y, mass.center_of_mass.z),
                topology,
            },
            bounding_box: crate::store::BoundingBox {
                min: Vec3::new(mass.bounding_box.min.x, mass.bounding_box.min.y, mass.bounding_box.min.z),
                max: Vec3::new(mass.bounding_box.max.x, mass.bounding_box.max.y, mass.bounding_box.max.z),
            },
            is_valid: true,
            validation_errors: Vec::new(),
        };
        Ok(json!(self.store.entity_create(entity)?))
    }

    // -- workspaces -----------------------------------------------------------

    fn workspace_create(&self, params: &Params<'_>, agent_id: &str) -> Result<Value, CoreError> {
        let name = params.required_str("name")?.to_owned();
        let base = params.optional_str("base_workspace").unwrap_or("main");
        let workspace = merge::fork(&self.store, name, base, agent_id.to_owned())?;
        Ok(json!(workspace))
    }

    fn workspace_list(&self) -> Result<Value, CoreError> {
        Ok(json!(self.store.workspace_list()))
    }

    fn workspace_switch(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = params.required_str("workspace")?;
        self.workspaces.set_active_workspace(&self.store, workspace_id)?;
        Ok(json!({ "active_workspace": self.workspaces.active_id() }))
    }

    fn workspace_status(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace = self
            .workspaces
            .resolve_or_active(&self.store, params.optional_str("workspace"))?;
        Ok(json!(workspace))
    }

    fn workspace_merge(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let source = params.required_str("source_workspace")?;
        let target = params.optional_str("target_workspace").unwrap_or("main");
        let report: MergeReport = merge::merge(&self.store, source, target)?;
        Ok(json!(report))
    }

    fn workspace_resolve_conflict(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let entity_id = params.required_str("entity_id")?;
        let source = params.required_str("source_workspace")?;
        let target = params.optional_str("target_workspace").unwrap_or("main");
        let strategy_name = params.required_str("strategy")?;
        let strategy = match strategy_name {
            "keep_source" => ResolutionStrategy::KeepSource,
            "keep_target" => ResolutionStrategy::KeepTarget,
            "manual_merge" => ResolutionStrategy::ManualMerge {
                merged_properties: params
                    .optional_str("merged_properties")
                    .map_or(json!({}), |raw| serde_json::from_str(raw).unwrap_or(json!({}))),
            },
            other => {
                return Err(CoreError::InvalidParameter {
                    field: "strategy".to_owned(),
                    provided_value: other.to_owned(),
                    reason: "expected keep_source, keep_target, or manual_merge".to_owned(),
                })
            }
        };
        let entity = merge::resolve_conflict(&self.store, entity_id, source, target, strategy)?;
        Ok(json!(entity))
    }

    // -- history ----------------------------------------------------------------

    fn history_list(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let include_future = params.optional_str("include_future") == Some("true");
        Ok(json!(self.history.list(&workspace_id, include_future)))
    }

    fn history_undo(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        Ok(json!(self.history.undo(&workspace_id)?))
    }

    fn history_redo(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        Ok(json!(self.history.redo(&workspace_id)?))
    }

    // -- file codecs --------------------------------------------------------------

    fn file_export(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let entity_id = params.required_str("entity_id")?;
        let format = params.required_str("format")?;
        let path = params.required_str("path")?;
        let entity = self.store.entity_get(entity_id)?;
        match format {
            "json" => codec::export_json(&entity, path.as_ref()),
            "stl" => {
                let solid = self.load_solid(entity_id)?;
                let quality = params
                    .optional_str("quality")
                    .map_or(Ok(self.config.kernel.default_quality), parse_quality_preset)?;
                let mesh = self.kernel.tessellate(&solid, quality)?;
                codec::export_stl(&mesh, path.as_ref())
            }
            "step" => {
                let solid = self.load_solid(entity_id)?;
                codec::export_step(&solid, path.as_ref())
            }
            other => Err(CoreError::UnsupportedFormat {
                format: other.to_owned(),
            }),
        }
    }

    /// Imported entities are not currently attributed to the importing
    /// agent; the parameter is kept so the dispatcher's handler
    /// signature stays uniform across methods.
    fn file_import(&self, params: &Params<'_>, _agent_id: &str) -> Result<Value, CoreError> {
        let workspace_id = self.resolve_workspace(params)?;
        let format = params.required_str("format")?;
        let path = params.required_str("path")?;
        match format {
            "json" => {
                let imported = codec::import_json(path.as_ref(), &workspace_id)?;
                Ok(json!(self.store.entity_create(imported)?))
            }
            other => Err(CoreError::UnsupportedFormat {
                format: other.to_owned(),
            }),
        }
    }

    // -- agents --------------------------------------------------------------------

    fn agent_metrics(&self, params: &Params<'_>) -> Result<Value, CoreError> {
        let agent_id = params.required_str("agent_id")?;
        let workspace_id = params.optional_str("workspace");
        Ok(json!(self.store.agent_metrics(agent_id, workspace_id)))
    }

    // -- journaling -----------------------------------------------------------------

    fn journal(
        &self,
        method: Method,
        raw_params: &Value,
        agent_id: &str,
        workspace_id: &str,
        result: &Result<Value, CoreError>,
        execution_time_ms: f64,
    ) {
        let (result_status, error_code, error_message) = match result {
            Ok(_) => (ResultStatus::Success, None, None),
            Err(err) => (ResultStatus::Error, Some(err.code().as_i64()), Some(err.to_string())),
        };
        let operation = Operation {
            operation_id: ids::operation_id(workspace_id),
            operation_type: method.canonical().to_owned(),
            workspace_id: workspace_id.to_owned(),
            agent_id: agent_id.to_owned(),
            timestamp: now_iso8601(),
            input_parameters: raw_params.clone(),
            input_entities: Vec::new(),
            output_entities: Vec::new(),
            result_status,
            error_code,
            error_message,
            execution_time_ms,
            undo_data: json!({}),
        };
        let logged = self.store.operation_log(operation.clone()).is_ok();
        // `history.undo`/`history.redo` move the cursor themselves; also
        // recording them as new entries would immediately overwrite the
        // redo slot the undo just opened up (§8 "undo then redo returns
        // to the pre-undo position"). Still journaled for audit, just not
        // pushed onto the undo/redo stack.
        let is_cursor_move = matches!(method, Method::HistoryUndo | Method::HistoryRedo);
        if logged && !is_cursor_move {
            self.history.record(workspace_id, operation);
        }
    }
}

fn validate_bounds(field: &str, v: Vec3) -> Result<(), CoreError> {
    let in_bounds = [v.x, v.y, v.z]
        .iter()
        .all(|c| c.is_finite() && c.abs() <= cadkit_kernel::COORDINATE_BOUND);
    if in_bounds {
        Ok(())
    } else {
        Err(CoreError::InvalidGeometry {
            reason: format!("'{field}' is out of bounds [-1e6, 1e6]"),
        })
    }
}

fn validate_radius(radius: f64) -> Result<(), CoreError> {
    if radius.is_finite() && radius > cadkit_kernel::MIN_DIMENSION {
        Ok(())
    } else {
        Err(CoreError::InvalidGeometry {
            reason: format!("radius {radius} must be positive and finite"),
        })
    }
}

fn bbox_of(points: &[Vec3]) -> (Vec3, Vec3) {
    let mut min = points[0];
    let mut max = points[0];
    for p in &points[1..] {
        min = Vec3::new(min.x.min(p.x), min.y.min(p.y), min.z.min(p.z));
        max = Vec3::new(max.x.max(p.x), max.y.max(p.y), max.z.max(p.z));
    }
    (min, max)
}

fn circle_bbox(center: Vec3, radius: f64) -> (Vec3, Vec3) {
    (
        Vec3::new(center.x - radius, center.y - radius, center.z),
        Vec3::new(center.x + radius, center.y + radius, center.z),
    )
}

fn parse_entity_type(name: &str) -> Result<EntityType, CoreError> {
    match name {
        "point" => Ok(EntityType::Point),
        "line" => Ok(EntityType::Line),
        "circle" => Ok(EntityType::Circle),
        "arc" => Ok(EntityType::Arc),
        "solid" => Ok(EntityType::Solid),
        other => Err(CoreError::InvalidParameter {
            field: "entity_type".to_owned(),
            provided_value: other.to_owned(),
            reason: "expected point, line, circle, arc, or solid".to_owned(),
        }),
    }
}

fn parse_constraint_type(name: &str) -> Result<ConstraintType, CoreError> {
    match name {
        "parallel" => Ok(ConstraintType::Parallel),
        "perpendicular" => Ok(ConstraintType::Perpendicular),
        "coincident" => Ok(ConstraintType::Coincident),
        "distance" => Ok(ConstraintType::Distance),
        "angle" => Ok(ConstraintType::Angle),
        "tangent" => Ok(ConstraintType::Tangent),
        "radius" => Ok(ConstraintType::Radius),
        other => Err(CoreError::InvalidParameter {
            field: "constraint_type".to_owned(),
            provided_value: other.to_owned(),
            reason: "unrecognized constraint type".to_owned(),
        }),
    }
}

fn parse_boolean_op(name: &str) -> Result<BooleanOp, CoreError> {
    match name {
        "union" => Ok(BooleanOp::Union),
        "subtract" => Ok(BooleanOp::Subtract),
        "intersect" => Ok(BooleanOp::Intersect),
        other => Err(CoreError::InvalidParameter {
            field: "operation".to_owned(),
            provided_value: other.to_owned(),
            reason: "expected union, subtract, or intersect".to_owned(),
        }),
    }
}

fn parse_quality_preset(name: &str) -> Result<QualityPreset, CoreError> {
    match name {
        "preview" => Ok(QualityPreset::Preview),
        "standard" => Ok(QualityPreset::Standard),
        "high_quality" => Ok(QualityPreset::HighQuality),
        other => Err(CoreError::InvalidParameter {
            field: "quality".to_owned(),
            provided_value: other.to_owned(),
            reason: "expected preview, standard, or high_quality".to_owned(),
        }),
    }
}

/// Derive an extrusion profile from the referenced sketch entities, the
/// way `entity_ids`-driven `solid.extrude` requests describe their
/// profile instead of stating it directly: a single circle becomes a
/// cylinder, four lines forming a closed rectangular loop become a box.
/// Returns the profile plus the point the kernel should extrude from.
fn profile_from_sketch(entities: &[Entity]) -> Result<(Profile, Vec3), CoreError> {
    if let [circle] = entities {
        if let EntityProperties::Circle { center, radius, .. } = &circle.properties {
            return Ok((Profile::Circle { radius: *radius }, *center));
        }
    }

    if entities.len() == 4 && entities.iter().all(|e| matches!(e.properties, EntityProperties::Line { .. })) {
        let points: Vec<Vec3> = entities
            .iter()
            .flat_map(|e| match &e.properties {
                EntityProperties::Line { start, end, .. } => [*start, *end],
                _ => unreachable!(),
            })
            .collect();
        if !is_closed_loop(&points) {
            return Err(CoreError::InvalidGeometry {
                reason: "sketch is not closed: lines do not form a closed loop".to_owned(),
            });
        }
        let (min, max) = bbox_of(&points);
        let width = max.x - min.x;
        let height = max.y - min.y;
        let center = Vec3::new((min.x + max.x) / 2.0, (min.y + max.y) / 2.0, min.z);
        return Ok((Profile::Rectangle { width, height }, center));
    }

    Err(CoreError::InvalidGeometry {
        reason: format!(
            "unsupported sketch configuration: expected one circle or four lines forming a closed \
             rectangle, got {} entities",
            entities.len()
        ),
    })
}

/// Every endpoint in a closed polygon's line set must be shared by
/// exactly two segments.
fn is_closed_loop(points: &[Vec3]) -> bool {
    const EPSILON: f64 = 1e-6;
    points.iter().all(|p| {
        points.iter().filter(|q| p.sub(**q).length() < EPSILON).count() == 2
    })
}

fn parse_profile(params: &Params<'_>) -> Result<Profile, CoreError> {
    match params.required_str("profile_type")? {
        "rectangle" => Ok(Profile::Rectangle {
            width: params.required_f64("width")?,
            height: params.required_f64("height")?,
        }),
        "circle" => Ok(Profile::Circle {
            radius: params.required_f64("radius")?,
        }),
        other => Err(CoreError::InvalidParameter {
            field: "profile_type".to_owned(),
            provided_value: other.to_owned(),
            reason: "expected rectangle or circle".to_owned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadkit_kernel::AnalyticBackend;

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(Arc::new(Store::new()), Arc::new(AnalyticBackend), CadkitConfig::default())
    }

    #[test]
    fn create_point_then_query_round_trips() {
        let d = dispatcher();
        let created = d
            .execute(
                "entity.create.point",
                &json!({"coordinates": [1.0, 2.0, 3.0]}),
                "agent-1",
            )
            .unwrap();
        let entity_id = created["entity_id"].as_str().unwrap().to_owned();
        let queried = d.execute("entity.query", &json!({"entity_id": entity_id}), "agent-1").unwrap();
        assert_eq!(queried["entity_id"], created["entity_id"]);
    }

    #[test]
    fn underscore_alias_dispatches_same_as_dotted() {
        let d = dispatcher();
        let result = d
            .execute("entity_create_point", &json!({"coordinates": [0.0, 0.0]}), "agent-1")
            .unwrap();
        assert!(result["entity_id"].is_string());
    }

    #[test]
    fn unknown_method_is_invalid_command() {
        let d = dispatcher();
        let err = d.execute("entity.delete.point", &json!({}), "agent-1").unwrap_err();
        assert!(matches!(err, CoreError::InvalidCommand { .. }));
    }

    #[test]
    fn extrude_then_query_has_solid_properties() {
        let d = dispatcher();
        let entity = d
            .execute(
                "solid.extrude",
                &json!({"profile_type": "rectangle", "width": 2.0, "height": 3.0, "distance": 4.0}),
                "agent-1",
            )
            .unwrap();
        assert!((entity["properties"]["volume"].as_f64().unwrap() - 24.0).abs() < 1e-6);
    }

    #[test]
    fn conflicting_constraints_are_rejected() {
        let d = dispatcher();
        let l1 = d
            .execute(
                "entity.create.line",
                &json!({"start": [0.0, 0.0], "end": [10.0, 0.0]}),
                "agent-1",
            )
            .unwrap();
        let l2 = d
            .execute(
                "entity.create.line",
                &json!({"start": [0.0, 0.0], "end": [0.0, 10.0]}),
                "agent-1",
            )
            .unwrap();
        let ids = [l1["entity_id"].as_str().unwrap(), l2["entity_id"].as_str().unwrap()];
        d.execute(
            "constraint.apply",
            &json!({"constraint_type": "parallel", "entity_ids": ids}),
            "agent-1",
        )
        .unwrap();
        let err = d
            .execute(
                "constraint.apply",
                &json!({"constraint_type": "perpendicular", "entity_ids": ids}),
                "agent-1",
            )
            .unwrap_err();
        assert!(matches!(err, CoreError::ConstraintConflict { .. }));
    }

    #[test]
    fn history_records_successful_operations() {
        let d = dispatcher();
        d.execute("entity.create.point", &json!({"coordinates": [1.0, 1.0]}), "agent-1")
            .unwrap();
        assert!(d.history().can_undo("main"));
    }
}
