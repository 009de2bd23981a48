//! End-to-end scenarios against the dispatcher and agent controller
//! (§8 "Concrete scenarios" S1-S7, plus a handful of the section's
//! invariants and round-trip properties).

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::json;

use cadkit::agent::{decompose_task, resolve_dependencies, AgentController, RoleRegistry, RoleTemplate, TaskAssignment, TaskStatus};
use cadkit::config::CadkitConfig;
use cadkit::dispatch::Dispatcher;
use cadkit::store::Store;
use cadkit_kernel::AnalyticBackend;

fn dispatcher() -> Dispatcher {
    let store = Arc::new(Store::new());
    let kernel: Arc<dyn cadkit_kernel::GeometryBackend> = Arc::new(AnalyticBackend);
    Dispatcher::new(store, kernel, CadkitConfig::default())
}

// S1: box extrusion. ----------------------------------------------------

#[test]
fn s1_box_extrusion_produces_closed_manifold_solid_of_expected_volume() {
    let d = dispatcher();

    let corners = [
        ([0.0, 0.0], [10.0, 0.0]),
        ([10.0, 0.0], [10.0, 10.0]),
        ([10.0, 10.0], [0.0, 10.0]),
        ([0.0, 10.0], [0.0, 0.0]),
    ];
    let entity_ids: Vec<String> = corners
        .into_iter()
        .map(|(start, end)| {
            d.execute("entity.create.line", &json!({"start": start, "end": end}), "agent-1")
                .unwrap()["entity_id"]
                .as_str()
                .unwrap()
                .to_owned()
        })
        .collect();

    let entity = d
        .execute(
            "solid.extrude",
            &json!({"entity_ids": entity_ids, "distance": 10.0}),
            "agent-1",
        )
        .unwrap();

    assert_eq!(entity["properties"]["entity_type"], "solid");
    let volume = entity["properties"]["volume"].as_f64().unwrap();
    assert!((950.0..1050.0).contains(&volume), "volume {volume} out of range");
    assert_eq!(entity["properties"]["topology"]["is_closed"], true);
    assert_eq!(entity["properties"]["topology"]["is_manifold"], true);
    assert_eq!(entity["parent_entities"], json!(entity_ids));
}

// S2: perpendicular constraint, then a conflicting parallel constraint. -

#[test]
fn s2_perpendicular_constraint_satisfied_then_parallel_conflicts() {
    let d = dispatcher();

    let a = d
        .execute("entity.create.line", &json!({"start": [0.0, 0.0], "end": [10.0, 0.0]}), "agent-1")
        .unwrap();
    let b = d
        .execute("entity.create.line", &json!({"start": [0.0, 0.0], "end": [0.0, 10.0]}), "agent-1")
        .unwrap();
    let entity_ids = vec![a["entity_id"].as_str().unwrap().to_owned(), b["entity_id"].as_str().unwrap().to_owned()];

    let constraint = d
        .execute(
            "constraint.apply",
            &json!({"constraint_type": "perpendicular", "entity_ids": entity_ids}),
            "agent-1",
        )
        .unwrap();
    assert_eq!(constraint["satisfaction_status"], "satisfied");

    let result = d.execute(
        "constraint.apply",
        &json!({"constraint_type": "parallel", "entity_ids": entity_ids}),
        "agent-1",
    );
    assert!(matches!(result, Err(cadkit::CoreError::ConstraintConflict { .. })));
}

// S3: branch-and-merge. --------------------------------------------------

#[test]
fn s3_branch_and_merge_copies_entity_into_main() {
    let d = dispatcher();

    let branch = d
        .execute("workspace.create", &json!({"name": "ws1", "base_workspace": "main"}), "agent_a")
        .unwrap();
    let branch_id = branch["workspace_id"].as_str().unwrap().to_owned();

    let point = d
        .execute("entity.create.point", &json!({"coordinates": [10.0, 20.0, 30.0], "workspace": branch_id}), "agent_a")
        .unwrap();

    let report = d
        .execute("workspace.merge", &json!({"source_workspace": branch_id, "target_workspace": "main"}), "agent_a")
        .unwrap();

    assert_eq!(report["merge_result"], "success");
    assert_eq!(report["entities_added"], 1);
    assert!(report["conflicts"].as_array().unwrap().is_empty());

    let main_entities = d.execute("entity.list", &json!({"workspace": "main"}), "agent_a").unwrap();
    let items = main_entities["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert!(items[0]["entity_id"].as_str().unwrap().starts_with("main:"));
    assert_eq!(items[0]["properties"], point["properties"]);

    let branch_status = d.execute("workspace.status", &json!({"workspace": branch_id}), "agent_a").unwrap();
    assert_eq!(branch_status["branch_status"], "merged");
}

// S4: merge conflict + resolution. ---------------------------------------

#[test]
fn s4_merge_conflict_then_keep_source_resolution() {
    let d = dispatcher();

    let branch = d.execute("workspace.create", &json!({"name": "b", "base_workspace": "main"}), "agent_a").unwrap();
    let branch_id = branch["workspace_id"].as_str().unwrap().to_owned();

    let source_point = d
        .execute("entity.create.point", &json!({"coordinates": [1.0, 2.0, 3.0], "workspace": branch_id}), "agent_a")
        .unwrap();
    let suffix = source_point["entity_id"].as_str().unwrap().rsplit(':').next().unwrap();
    let target_id = format!("main:{suffix}");

    d.store()
        .entity_create(cadkit::store::Entity {
            entity_id: target_id.clone(),
            workspace_id: "main".to_owned(),
            created_at: cadkit::time::now_iso8601(),
            modified_at: cadkit::time::now_iso8601(),
            created_by_agent: None,
            parent_entities: vec![],
            child_entities: vec![],
            properties: cadkit::store::EntityProperties::Point {
                coordinates: cadkit::store::Vec3::new(9.0, 9.0, 9.0),
            },
            bounding_box: cadkit::store::BoundingBox {
                min: cadkit::store::Vec3::new(9.0, 9.0, 9.0),
                max: cadkit::store::Vec3::new(9.0, 9.0, 9.0),
            },
            is_valid: true,
            validation_errors: vec![],
        })
        .unwrap();

    let report = d
        .execute("workspace.merge", &json!({"source_workspace": branch_id, "target_workspace": "main"}), "agent_a")
        .unwrap();
    assert_eq!(report["merge_result"], "has_conflicts");
    assert_eq!(report["entities_added"], 0);
    assert_eq!(report["conflicts"].as_array().unwrap().len(), 1);

    let resolved = d
        .execute(
            "workspace.resolve_conflict",
            &json!({
                "entity_id": target_id,
                "source_workspace": branch_id,
                "target_workspace": "main",
                "strategy": "keep_source",
            }),
            "agent_a",
        )
        .unwrap();
    assert_eq!(resolved["properties"], source_point["properties"]);
}

// S5: role enforcement. ---------------------------------------------------

fn designer_role() -> RoleTemplate {
    RoleTemplate {
        name: "designer".to_owned(),
        description: "sketches 2D geometry".to_owned(),
        allowed_operations: ["entity.create.line".to_owned()].into_iter().collect(),
        forbidden_operations: ["solid.extrude".to_owned()].into_iter().collect(),
        example_tasks: vec!["sketch a profile".to_owned()],
    }
}

#[test]
fn s5_role_enforcement_blocks_operation_outside_role_and_records_error() {
    let dispatcher = Arc::new(dispatcher());
    let mut roles = RoleRegistry::new();
    roles.insert(designer_role()).unwrap();
    let controller = AgentController::new(dispatcher, roles, 10);

    controller.create_agent("agent-1", "designer", "main").unwrap();

    let line = controller.execute_operation(
        "agent-1",
        "entity.create.line",
        &json!({"start": [0.0, 0.0], "end": [1.0, 1.0]}),
    );
    assert!(line.is_ok());

    let blocked = controller.execute_operation(
        "agent-1",
        "solid.extrude",
        &json!({"profile_type": "rectangle", "width": 1.0, "height": 1.0, "distance": 1.0}),
    );
    assert!(matches!(blocked, Err(cadkit::CoreError::RoleViolation { .. })));

    let agent = controller.get_agent("agent-1").unwrap();
    assert_eq!(agent.operation_count, 2);
    assert_eq!(agent.success_count, 1);
    assert_eq!(agent.error_count, 1);
    assert_eq!(agent.error_log.len(), 1);
}

// S6: concurrent agents, independent workspaces. --------------------------

fn engineer_role() -> RoleTemplate {
    RoleTemplate {
        name: "engineer".to_owned(),
        description: "creates sketch points".to_owned(),
        allowed_operations: ["entity.create.point".to_owned()].into_iter().collect(),
        forbidden_operations: Default::default(),
        example_tasks: vec!["place a point".to_owned()],
    }
}

#[test]
fn s6_concurrent_agents_in_independent_workspaces_do_not_cross_contaminate() {
    let dispatcher = Arc::new(dispatcher());
    let mut roles = RoleRegistry::new();
    roles.insert(engineer_role()).unwrap();
    let controller = AgentController::new(dispatcher.clone(), roles, 10);

    let agent_ids = ["agent-1", "agent-2", "agent-3", "agent-4"];
    for agent_id in agent_ids {
        controller.create_agent(agent_id, "engineer", &format!("{agent_id}:ws")).unwrap();
    }

    let mut phase = Vec::new();
    let mut params = HashMap::new();
    for (i, agent_id) in agent_ids.iter().enumerate() {
        for j in 0..5 {
            let task = TaskAssignment {
                task_id: format!("task-{i}-{j}"),
                agent_id: Some((*agent_id).to_owned()),
                description: "place a point".to_owned(),
                required_operations: vec!["entity.create.point".to_owned()],
                dependencies: vec![],
                success_criteria: "point exists".to_owned(),
                status: TaskStatus::Pending,
                assigned_at: None,
                completed_at: None,
                result: None,
            };
            params.insert(task.task_id.clone(), json!({"coordinates": [i as f64, j as f64, 0.0]}));
            phase.push(task);
        }
    }

    let start = std::time::Instant::now();
    let results = controller.run_phase(&phase, &params);
    let elapsed = start.elapsed();

    assert_eq!(results.len(), 20);
    assert!(results.iter().all(Result::is_ok), "{results:?}");
    // Bounded concurrency: 20 tasks in batches of <= 10 should run well
    // under 20x a single dispatch's wall-clock.
    assert!(elapsed.as_secs() < 5, "run_phase took {elapsed:?}");

    for agent_id in agent_ids {
        let workspace_id = format!("{agent_id}:ws");
        let page = dispatcher.store().entity_list(&workspace_id, None, 100, 0);
        assert_eq!(page.items.len(), 5, "workspace {workspace_id} should hold exactly 5 entities");
    }

    let total: usize = agent_ids
        .iter()
        .map(|agent_id| dispatcher.store().entity_list(&format!("{agent_id}:ws"), None, 100, 0).items.len())
        .sum();
    assert_eq!(total, 20);
}

// S7: task dependency ordering. -------------------------------------------

#[test]
fn s7_box_with_lid_decomposes_into_two_phases() {
    let tasks = decompose_task("create box assembly with lid");
    assert!(tasks.len() >= 3);

    let phases = resolve_dependencies(&tasks).unwrap();
    assert_eq!(phases.len(), 2);
    assert_eq!(phases[0].len(), 2);
    assert_eq!(phases[1].len(), 1);
    assert!(phases[1][0].dependencies.contains(&phases[0][0].task_id));
    assert!(phases[1][0].dependencies.contains(&phases[0][1].task_id));
}

// Invariants & round-trip properties (§8). --------------------------------

#[test]
fn invariant_agent_success_plus_error_never_exceeds_operation_count() {
    let dispatcher = Arc::new(dispatcher());
    let mut roles = RoleRegistry::new();
    roles.insert(designer_role()).unwrap();
    let controller = AgentController::new(dispatcher, roles, 10);
    controller.create_agent("agent-1", "designer", "main").unwrap();

    let _ = controller.execute_operation("agent-1", "entity.create.line", &json!({"start": [0.0, 0.0], "end": [1.0, 0.0]}));
    let _ = controller.execute_operation("agent-1", "solid.extrude", &json!({}));
    let _ = controller.execute_operation("agent-1", "entity.create.line", &json!({"start": [0.0, 0.0], "end": [2.0, 0.0]}));

    let agent = controller.get_agent("agent-1").unwrap();
    assert!(agent.success_count + agent.error_count <= agent.operation_count);
}

#[test]
fn invariant_forking_does_not_mutate_base_workspace() {
    let d = dispatcher();
    d.execute("workspace.create", &json!({"name": "ws1", "base_workspace": "main"}), "agent_a").unwrap();
    d.execute(
        "entity.create.point",
        &json!({"coordinates": [1.0, 1.0, 1.0], "workspace": "agent_a:ws1"}),
        "agent_a",
    )
    .unwrap();

    let main_entities = d.execute("entity.list", &json!({"workspace": "main"}), "agent_a").unwrap();
    assert!(main_entities["items"].as_array().unwrap().is_empty());
}

#[test]
fn round_trip_merging_empty_branch_is_a_noop() {
    let d = dispatcher();
    d.execute("workspace.create", &json!({"name": "empty", "base_workspace": "main"}), "agent_a").unwrap();
    let report = d
        .execute("workspace.merge", &json!({"source_workspace": "agent_a:empty", "target_workspace": "main"}), "agent_a")
        .unwrap();
    assert_eq!(report["entities_added"], 0);
    assert!(report["conflicts"].as_array().unwrap().is_empty());
}

#[test]
fn round_trip_undo_then_redo_returns_to_same_cursor_position() {
    let d = dispatcher();
    d.execute("entity.create.point", &json!({"coordinates": [0.0, 0.0, 0.0]}), "agent-1").unwrap();
    d.execute("entity.create.point", &json!({"coordinates": [1.0, 1.0, 1.0]}), "agent-1").unwrap();

    let before_undo = d.history().list("main", false).len();
    d.execute("history.undo", &json!({}), "agent-1").unwrap();
    assert_eq!(d.history().list("main", false).len(), before_undo - 1);

    d.execute("history.redo", &json!({}), "agent-1").unwrap();
    let after_redo = d.history().list("main", false).len();

    assert_eq!(after_redo, before_undo);
}

#[test]
fn round_trip_json_export_then_import_preserves_entity_type_and_properties() {
    let d = dispatcher();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("point.json");

    let entity = d.execute("entity.create.point", &json!({"coordinates": [4.0, 5.0, 6.0]}), "agent-1").unwrap();
    let entity_id = entity["entity_id"].as_str().unwrap();

    d.execute(
        "file.export",
        &json!({"entity_id": entity_id, "format": "json", "path": path.to_str().unwrap()}),
        "agent-1",
    )
    .unwrap();

    let imported = d
        .execute(
            "file.import",
            &json!({"format": "json", "path": path.to_str().unwrap(), "workspace": "main"}),
            "agent-1",
        )
        .unwrap();

    assert_eq!(imported["properties"]["entity_type"], "point");
    assert_eq!(imported["properties"], entity["properties"]);
}
