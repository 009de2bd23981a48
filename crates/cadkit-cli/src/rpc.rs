//! JSON-RPC 2.0 framing over the dispatcher (§6 "Dispatch envelope").
//!
//! Requests/responses are newline-delimited JSON, one object per line,
//! rather than a length-prefixed frame.

use std::io::{BufRead, Write};

use cadkit::dispatch::{Dispatcher, OperationTimer};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Deserialize)]
struct RpcRequest {
    #[serde(default)]
    jsonrpc: Option<String>,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Value,
    #[serde(default)]
    id: Value,
}

/// Run one JSON-RPC request line against `dispatcher`, returning the
/// response envelope (§6).
pub fn handle_line(dispatcher: &Dispatcher, line: &str, agent_id: &str) -> Value {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(request) => request,
        Err(err) => {
            return error_envelope(Value::Null, -32700, &format!("parse error: {err}"), None);
        }
    };

    if request.jsonrpc.as_deref() != Some("2.0") {
        return error_envelope(request.id, -32600, "invalid request: jsonrpc must be \"2.0\"", None);
    }
    let Some(method) = request.method else {
        return error_envelope(request.id, -32600, "invalid request: missing method", None);
    };

    let timer = OperationTimer::start();
    match dispatcher.execute(&method, &request.params, agent_id) {
        Ok(data) => success_envelope(request.id, data, &method, timer.elapsed_ms()),
        Err(err) => error_envelope(
            request.id,
            err.code().as_i64(),
            &err.to_string(),
            Some(json!({ "recoverable": err.recoverable(), "suggestion": err.suggestion() })),
        ),
    }
}

fn success_envelope(id: Value, data: Value, operation_type: &str, execution_time_ms: f64) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": {
            "status": "success",
            "data": data,
            "metadata": {
                "operation_type": operation_type,
                "execution_time_ms": execution_time_ms,
            },
        },
    })
}

fn error_envelope(id: Value, code: i64, message: &str, data: Option<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": {
            "code": code,
            "message": message,
            "data": data,
        },
    })
}

/// Read newline-delimited JSON-RPC requests from `input`, dispatch each
/// through `dispatcher`, and write newline-delimited responses to
/// `output`. Blank lines are skipped.
pub fn run_loop(
    dispatcher: &Dispatcher,
    input: impl BufRead,
    mut output: impl Write,
    agent_id: &str,
) -> std::io::Result<()> {
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(dispatcher, &line, agent_id);
        writeln!(output, "{response}")?;
        output.flush()?;
    }
    Ok(())
}
