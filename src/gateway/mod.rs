//! The transport/framing layer is out of scope, but the protocol surface's
//! shape needs to be exercisable end to end. This is a minimal stdio
//! JSON-RPC-ish loop: one JSON request per line in, one JSON response per
//! line out. `resources/*` and `prompts/*` are static stand-ins — just
//! enough to round out the method table, not a developed feature.

use crate::availability::AvailabilityReporter;
use crate::dispatcher::Dispatcher;
use crate::tools::registry;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

#[derive(Debug, Deserialize)]
struct RpcRequest {
    #[serde(default)]
    id: Value,
    method: String,
    #[serde(default)]
    params: Value,
}

#[derive(Debug, Serialize)]
struct RpcResponse {
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<Value>,
}

impl RpcResponse {
    fn ok(id: Value, result: Value) -> Self {
        Self { id, result: Some(result), error: None }
    }

    fn err(id: Value, message: impl Into<String>) -> Self {
        Self { id, result: None, error: Some(json!({ "message": message.into() })) }
    }
}

const RESOURCES: &[(&str, &str, &str)] = &[
    (
        "docs://tool-catalog",
        "text/markdown",
        "# Tool catalog\n\nCall `tools/list` for the live, availability-annotated set.",
    ),
    (
        "docs://cache-policy",
        "text/markdown",
        "# Cache policy\n\nEach upstream source has its own success/no-data/rate-limited TTL. See `CACHE_TTL_*` environment variables.",
    ),
];

const PROMPTS: &[(&str, &str, &str)] = &[
    (
        "summarize-market-size",
        "Summarize a market size estimate for a non-technical reader.",
        "Given this market size estimate: {{estimate}}, write a two-sentence plain-language summary.",
    ),
    (
        "explain-tam-assumptions",
        "Explain the assumptions behind a TAM calculation.",
        "Given this TAM result: {{result}}, list the growth-rate and segmentation assumptions in plain language.",
    ),
];

pub async fn run_stdio_loop(dispatcher: Arc<Dispatcher>) -> anyhow::Result<()> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    run_loop(dispatcher, stdin, stdout).await
}

pub async fn run_loop<R, W>(dispatcher: Arc<Dispatcher>, reader: R, mut writer: W) -> anyhow::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = handle_line(&dispatcher, &line).await;
        let serialized = serde_json::to_string(&response)?;
        writer.write_all(serialized.as_bytes()).await?;
        writer.write_all(b"\n").await?;
        writer.flush().await?;
    }
    Ok(())
}

async fn handle_line(dispatcher: &Dispatcher, line: &str) -> RpcResponse {
    let request: RpcRequest = match serde_json::from_str(line) {
        Ok(r) => r,
        Err(e) => return RpcResponse::err(Value::Null, format!("malformed request: {e}")),
    };
    handle_request(dispatcher, request).await
}

async fn handle_request(dispatcher: &Dispatcher, request: RpcRequest) -> RpcResponse {
    match request.method.as_str() {
        "tools/list" => RpcResponse::ok(request.id, tools_list(dispatcher)),
        "tools/call" => tools_call(dispatcher, request).await,
        "resources/list" => RpcResponse::ok(request.id, resources_list()),
        "resources/read" => resources_read(request),
        "prompts/list" => RpcResponse::ok(request.id, prompts_list()),
        "prompts/get" => prompts_get(request),
        other => RpcResponse::err(request.id, format!("unknown method '{other}'")),
    }
}

fn tools_list(dispatcher: &Dispatcher) -> Value {
    let reporter = AvailabilityReporter::new(dispatcher.service());
    let tools: Vec<Value> = registry::all()
        .iter()
        .map(|spec| {
            let availability = reporter.tool_availability(spec);
            let suffix = AvailabilityReporter::description_suffix(&availability);
            json!({
                "name": spec.name,
                "description": format!("{}{}", spec.description, suffix),
                "inputSchema": spec.schema.to_json_schema(),
            })
        })
        .collect();
    json!({ "tools": tools })
}

async fn tools_call(dispatcher: &Dispatcher, request: RpcRequest) -> RpcResponse {
    let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
        return RpcResponse::err(request.id, "params.name is required");
    };
    let arguments = request.params.get("arguments").cloned().unwrap_or_else(|| json!({}));
    let client_id = request.params.get("clientId").and_then(|v| v.as_str()).unwrap_or("stdio");

    let result = dispatcher.dispatch(name, arguments, client_id).await;
    RpcResponse::ok(request.id, serde_json::to_value(result).unwrap_or(Value::Null))
}

fn resources_list() -> Value {
    let resources: Vec<Value> = RESOURCES
        .iter()
        .map(|(uri, mime, _)| json!({ "uri": uri, "mimeType": mime }))
        .collect();
    json!({ "resources": resources })
}

fn resources_read(request: RpcRequest) -> RpcResponse {
    let Some(uri) = request.params.get("uri").and_then(|v| v.as_str()) else {
        return RpcResponse::err(request.id, "params.uri is required");
    };
    match RESOURCES.iter().find(|(u, _, _)| *u == uri) {
        Some((uri, mime, text)) => RpcResponse::ok(
            request.id,
            json!({ "contents": [{ "uri": uri, "mimeType": mime, "text": text }] }),
        ),
        None => RpcResponse::err(request.id, format!("unknown resource '{uri}'")),
    }
}

fn prompts_list() -> Value {
    let prompts: Vec<Value> = PROMPTS
        .iter()
        .map(|(name, description, _)| json!({ "name": name, "description": description }))
        .collect();
    json!({ "prompts": prompts })
}

fn prompts_get(request: RpcRequest) -> RpcResponse {
    let Some(name) = request.params.get("name").and_then(|v| v.as_str()) else {
        return RpcResponse::err(request.id, "params.name is required");
    };
    match PROMPTS.iter().find(|(n, _, _)| *n == name) {
        Some((name, description, template)) => RpcResponse::ok(
            request.id,
            json!({
                "name": name,
                "description": description,
                "messages": [{ "role": "user", "content": { "type": "text", "text": template } }],
            }),
        ),
        None => RpcResponse::err(request.id, format!("unknown prompt '{name}'")),
    }
}
