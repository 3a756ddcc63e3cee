//! MCP (Model Context Protocol) server implementation.
//!
//! Exposes room redesigns, cost estimates and credit balances as tools that
//! AI agents can call. Redesigns go through [`Studio`], so the same credit
//! rules apply as on the command line.

use crate::credits::{CreditLedger, Identity};
use crate::design::{CostEstimateRequest, Currency, RedesignRequest, RoomDesigner, RoomStyle};
use crate::studio::{CreditStatus, Studio};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

/// Timeout for one remote call (redesign or estimate).
const DESIGN_TIMEOUT: Duration = Duration::from_secs(300);

/// Decodes a base64 string that may be imperfectly formatted.
///
/// LLMs frequently send base64 with issues that strict decoders reject:
/// - Data URI prefix (`data:image/png;base64,...`)
/// - Missing padding (`=` characters)
/// - Embedded whitespace or newlines
fn decode_base64_lenient(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;

    let b64 = match input.find(";base64,") {
        Some(pos) => &input[pos + 8..],
        None => input,
    };

    let cleaned: String = b64.chars().filter(|c| !c.is_ascii_whitespace()).collect();

    if let Ok(data) = base64::engine::general_purpose::STANDARD.decode(&cleaned) {
        return Ok(data);
    }

    base64::engine::general_purpose::STANDARD_NO_PAD.decode(&cleaned)
}

/// Rejects paths containing directory traversal (`..`) components.
fn validate_output_path(path: &str) -> std::result::Result<(), String> {
    let path = std::path::Path::new(path);
    for component in path.components() {
        if matches!(component, std::path::Component::ParentDir) {
            return Err("Path must not contain '..' components".into());
        }
    }
    Ok(())
}

/// Creates the parent directory of `path` so a finished image has somewhere
/// to go before a credit is spent on it.
fn prepare_output_dir(path: &str) -> std::result::Result<(), String> {
    match std::path::Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent)
            .map_err(|e| format!("Cannot create directory {}: {}", parent.display(), e)),
        _ => Ok(()),
    }
}

/// JSON-RPC 2.0 request.
#[derive(Debug, Deserialize)]
struct JsonRpcRequest {
    jsonrpc: String,
    id: Option<Value>,
    method: String,
    #[serde(default)]
    params: Value,
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Serialize)]
struct JsonRpcResponse {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    code: i32,
    message: String,
}

impl JsonRpcResponse {
    fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Wraps a JSON payload as MCP text content.
    fn content(id: Value, payload: &Value) -> Self {
        let content = json!([{
            "type": "text",
            "text": serde_json::to_string_pretty(payload).unwrap_or_default()
        }]);
        Self::success(id, json!({ "content": content }))
    }

    fn error(id: Value, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
            }),
        }
    }
}

/// MCP tool definition.
#[derive(Debug, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    #[serde(rename = "inputSchema")]
    input_schema: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CreditStatusParams {
    #[serde(default)]
    user_id: Option<String>,
}

/// Redesign tool parameters.
#[derive(Debug, Clone, Deserialize)]
struct RedesignRoomParams {
    /// Room photo (base64).
    image: String,
    #[serde(default)]
    style: Option<String>,
    #[serde(default)]
    prompt: Option<String>,
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    output_path: Option<String>,
}

/// Estimate tool parameters.
#[derive(Debug, Clone, Deserialize)]
struct EstimateCostParams {
    image: String,
    location: String,
    #[serde(default)]
    currency: Option<String>,
}

/// MCP server for room redesigns.
pub struct McpServer {
    initialized: bool,
    ledger: Arc<CreditLedger>,
    designer: Option<Arc<dyn RoomDesigner>>,
}

impl McpServer {
    /// Creates a server over `ledger`. Without a designer the redesign and
    /// estimate tools report a configuration error.
    pub fn new(ledger: Arc<CreditLedger>, designer: Option<Arc<dyn RoomDesigner>>) -> Self {
        Self {
            initialized: false,
            ledger,
            designer,
        }
    }

    /// Run the MCP server, reading from stdin and writing to stdout.
    pub async fn run(&mut self) -> io::Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.is_empty() {
                continue;
            }

            let response = self.handle_message(&line).await;
            if let Some(resp) = response {
                let json = serde_json::to_string(&resp).unwrap_or_else(|e| {
                    json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32603, "message": e.to_string()}}).to_string()
                });
                writeln!(stdout, "{}", json)?;
                stdout.flush()?;
            }
        }

        Ok(())
    }

    async fn handle_message(&mut self, message: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(message) {
            Ok(r) => r,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    Value::Null,
                    -32700,
                    format!("Parse error: {}", e),
                ));
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                request.id.unwrap_or(Value::Null),
                -32600,
                "Invalid JSON-RPC version",
            ));
        }

        let id = request.id.clone().unwrap_or(Value::Null);

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(id, &request.params)),
            "initialized" | "notifications/initialized" => None,
            "tools/list" => Some(self.handle_tools_list(id)),
            "tools/call" => Some(self.handle_tools_call(id, &request.params).await),
            "ping" => Some(JsonRpcResponse::success(id, json!({}))),
            _ => Some(JsonRpcResponse::error(
                id,
                -32601,
                format!("Method not found: {}", request.method),
            )),
        }
    }

    fn handle_initialize(&mut self, id: Value, params: &Value) -> JsonRpcResponse {
        self.initialized = true;

        if let Some(client_info) = params.get("clientInfo") {
            tracing::info!(
                client = client_info
                    .get("name")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown"),
                version = client_info
                    .get("version")
                    .and_then(|v| v.as_str())
                    .unwrap_or("unknown"),
                "mcp client connected"
            );
        }

        JsonRpcResponse::success(
            id,
            json!({
                "protocolVersion": "2024-11-05",
                "capabilities": {
                    "tools": {}
                },
                "serverInfo": {
                    "name": "monospace",
                    "version": env!("CARGO_PKG_VERSION")
                }
            }),
        )
    }

    fn handle_tools_list(&self, id: Value) -> JsonRpcResponse {
        let style_slugs: Vec<&str> = RoomStyle::ALL.iter().map(|s| s.slug()).collect();
        let currency_codes: Vec<&str> = Currency::ALL.iter().map(|c| c.code()).collect();

        let tools = vec![
            Tool {
                name: "list_styles",
                description: "List the interior design styles a room can be redesigned in",
                input_schema: json!({
                    "type": "object",
                    "properties": {},
                    "required": []
                }),
            },
            Tool {
                name: "credit_status",
                description: "Show free and purchased redesign credits for a user (guest when user_id is omitted)",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "user_id": {
                            "type": "string",
                            "description": "Signed-in user id (optional, guest when omitted)"
                        }
                    },
                    "required": []
                }),
            },
            Tool {
                name: "redesign_room",
                description:
                    "Redesign a photographed room in a given interior style. Costs one credit on success; call credit_status first to check the balance.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "image": {
                            "type": "string",
                            "description": "Photo of the room, base64 encoded (data URIs accepted)"
                        },
                        "style": {
                            "type": "string",
                            "enum": style_slugs,
                            "description": "Target style (default: minimalist)"
                        },
                        "prompt": {
                            "type": "string",
                            "description": "Extra requirements, e.g. 'keep the piano'"
                        },
                        "user_id": {
                            "type": "string",
                            "description": "User to charge (optional, guest when omitted)"
                        },
                        "output_path": {
                            "type": "string",
                            "description": "Path to save the redesigned image (optional, returns base64 if not provided)"
                        }
                    },
                    "required": ["image"]
                }),
            },
            Tool {
                name: "estimate_cost",
                description: "Estimate luxury and affordable renovation budgets for a room image. Free of charge.",
                input_schema: json!({
                    "type": "object",
                    "properties": {
                        "image": {
                            "type": "string",
                            "description": "Room image, base64 encoded (data URIs accepted)"
                        },
                        "location": {
                            "type": "string",
                            "description": "City or region whose prices to use"
                        },
                        "currency": {
                            "type": "string",
                            "enum": currency_codes,
                            "description": "Currency for all amounts (default: USD)"
                        }
                    },
                    "required": ["image", "location"]
                }),
            },
        ];

        JsonRpcResponse::success(id, json!({ "tools": tools }))
    }

    async fn handle_tools_call(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let tool_name = params.get("name").and_then(|v| v.as_str()).unwrap_or("");
        let arguments = params.get("arguments").cloned().unwrap_or(json!({}));

        match tool_name {
            "list_styles" => self.list_styles(id),
            "credit_status" => self.credit_status(id, arguments),
            "redesign_room" => self.redesign_room(id, arguments).await,
            "estimate_cost" => self.estimate_cost(id, arguments).await,
            _ => JsonRpcResponse::error(id, -32602, format!("Unknown tool: {}", tool_name)),
        }
    }

    fn list_styles(&self, id: Value) -> JsonRpcResponse {
        let styles: Vec<Value> = RoomStyle::ALL
            .iter()
            .map(|s| json!({ "slug": s.slug(), "label": s.label() }))
            .collect();
        JsonRpcResponse::content(id, &json!({ "styles": styles }))
    }

    fn credit_status(&self, id: Value, arguments: Value) -> JsonRpcResponse {
        let params: CreditStatusParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid parameters: {}", e));
            }
        };
        let identity = Identity::from_optional(params.user_id.as_deref());

        let status = CreditStatus::of(&self.ledger, &identity);
        match serde_json::to_value(&status) {
            Ok(status) => JsonRpcResponse::content(id, &status),
            Err(e) => JsonRpcResponse::error(id, -32603, e.to_string()),
        }
    }

    async fn redesign_room(&self, id: Value, arguments: Value) -> JsonRpcResponse {
        let params: RedesignRoomParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid parameters: {}", e));
            }
        };

        if let Some(path) = &params.output_path {
            if let Err(msg) = validate_output_path(path).and_then(|()| prepare_output_dir(path)) {
                return JsonRpcResponse::error(id, -32602, msg);
            }
        }

        let style = match params.style.as_deref().map(str::parse::<RoomStyle>) {
            None => RoomStyle::default(),
            Some(Ok(style)) => style,
            Some(Err(msg)) => return JsonRpcResponse::error(id, -32602, msg),
        };

        let image = match decode_base64_lenient(&params.image) {
            Ok(data) => data,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid base64 in image: {}", e));
            }
        };

        let Some(studio) = self.studio() else {
            return JsonRpcResponse::error(id, -32603, "GOOGLE_API_KEY environment variable is not set");
        };

        let mut request = RedesignRequest::new(image, style);
        if let Some(prompt) = params.prompt {
            request = request.with_prompt(prompt);
        }
        let identity = Identity::from_optional(params.user_id.as_deref());

        let image = match tokio::time::timeout(DESIGN_TIMEOUT, studio.redesign(&identity, &request)).await {
            Ok(Ok(image)) => image,
            Ok(Err(e)) => return JsonRpcResponse::error(id, -32603, e.to_string()),
            Err(_) => {
                return JsonRpcResponse::error(
                    id,
                    -32603,
                    format!("timed out after {}s", DESIGN_TIMEOUT.as_secs()),
                );
            }
        };

        let inline = || {
            json!({
                "base64": image.to_base64(),
                "mime_type": image.format.mime_type(),
                "size_bytes": image.size()
            })
        };
        // The credit is already spent, so a failed save still hands back the image
        let output = match &params.output_path {
            Some(path) => match image.save(path) {
                Ok(()) => json!({
                    "saved_to": path,
                    "size_bytes": image.size()
                }),
                Err(e) => {
                    tracing::warn!(path, "could not save redesign, returning it inline: {e}");
                    let mut output = inline();
                    output["save_error"] = json!(format!("Failed to save to {}: {}", path, e));
                    output
                }
            },
            None => inline(),
        };

        let status = CreditStatus::of(&self.ledger, &identity);
        JsonRpcResponse::content(
            id,
            &json!({
                "success": true,
                "style": style.label(),
                "model": image.metadata.model,
                "duration_ms": image.metadata.duration_ms,
                "output": output,
                "credits": status
            }),
        )
    }

    async fn estimate_cost(&self, id: Value, arguments: Value) -> JsonRpcResponse {
        let params: EstimateCostParams = match serde_json::from_value(arguments) {
            Ok(p) => p,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid parameters: {}", e));
            }
        };

        let currency = match params.currency.as_deref().map(str::parse::<Currency>) {
            None => Currency::default(),
            Some(Ok(currency)) => currency,
            Some(Err(msg)) => return JsonRpcResponse::error(id, -32602, msg),
        };

        let image = match decode_base64_lenient(&params.image) {
            Ok(data) => data,
            Err(e) => {
                return JsonRpcResponse::error(id, -32602, format!("Invalid base64 in image: {}", e));
            }
        };

        let request = CostEstimateRequest::new(image, params.location).with_currency(currency);
        if let Err(e) = request.validate() {
            return JsonRpcResponse::error(id, -32602, e.to_string());
        }

        let Some(studio) = self.studio() else {
            return JsonRpcResponse::error(id, -32603, "GOOGLE_API_KEY environment variable is not set");
        };

        let estimate = match tokio::time::timeout(DESIGN_TIMEOUT, studio.estimate_cost(&request)).await {
            Ok(Ok(estimate)) => estimate,
            Ok(Err(e)) => return JsonRpcResponse::error(id, -32603, e.to_string()),
            Err(_) => {
                return JsonRpcResponse::error(
                    id,
                    -32603,
                    format!("timed out after {}s", DESIGN_TIMEOUT.as_secs()),
                );
            }
        };

        JsonRpcResponse::content(
            id,
            &json!({
                "estimate": estimate,
                "report": estimate.report(&request.location, currency)
            }),
        )
    }

    fn studio(&self) -> Option<Studio> {
        self.designer
            .as_ref()
            .map(|designer| Studio::new(Arc::clone(&self.ledger), Arc::clone(designer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::design::testing::{StubDesigner, FAKE_JPEG};
    use base64::Engine;

    fn make_server() -> McpServer {
        McpServer::new(
            Arc::new(CreditLedger::in_memory()),
            Some(Arc::new(StubDesigner::succeeding())),
        )
    }

    fn fake_jpeg_b64() -> String {
        base64::engine::general_purpose::STANDARD.encode(FAKE_JPEG)
    }

    fn content_json(resp: JsonRpcResponse) -> Value {
        assert!(resp.error.is_none(), "{:?}", resp.error);
        let result = resp.result.unwrap();
        let text = result["content"][0]["text"].as_str().unwrap();
        serde_json::from_str(text).unwrap()
    }

    #[tokio::test]
    async fn test_initialize() {
        let mut server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await
            .unwrap();

        assert!(resp.error.is_none());
        let result = resp.result.unwrap();
        assert_eq!(result["protocolVersion"], "2024-11-05");
        assert_eq!(result["serverInfo"]["name"], "monospace");
        assert!(server.initialized);
    }

    #[tokio::test]
    async fn test_ping() {
        let mut server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":2,"method":"ping","params":{}}"#)
            .await
            .unwrap();

        assert!(resp.error.is_none());
    }

    #[tokio::test]
    async fn test_tools_list() {
        let server = make_server();
        let resp = server.handle_tools_list(json!(1));

        let result = resp.result.unwrap();
        let tools = result["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 4);

        let names: Vec<&str> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(
            names,
            ["list_styles", "credit_status", "redesign_room", "estimate_cost"]
        );

        let styles = tools[2]["inputSchema"]["properties"]["style"]["enum"]
            .as_array()
            .unwrap();
        assert_eq!(styles.len(), 14);
        assert!(styles.contains(&json!("gamer-tech")));
    }

    #[tokio::test]
    async fn test_invalid_jsonrpc_version() {
        let mut server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"1.0","id":1,"method":"ping","params":{}}"#)
            .await
            .unwrap();

        assert_eq!(resp.error.unwrap().code, -32600);
    }

    #[tokio::test]
    async fn test_parse_error() {
        let mut server = make_server();
        let resp = server.handle_message("not json").await.unwrap();

        assert_eq!(resp.error.unwrap().code, -32700);
    }

    #[tokio::test]
    async fn test_method_not_found() {
        let mut server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","id":1,"method":"nonexistent","params":{}}"#)
            .await
            .unwrap();

        assert_eq!(resp.error.unwrap().code, -32601);
    }

    #[tokio::test]
    async fn test_initialized_notification_returns_none() {
        let mut server = make_server();
        let resp = server
            .handle_message(r#"{"jsonrpc":"2.0","method":"initialized","params":{}}"#)
            .await;

        assert!(resp.is_none());
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let server = make_server();
        let resp = server
            .handle_tools_call(
                json!(1),
                &json!({"name": "nonexistent_tool", "arguments": {}}),
            )
            .await;

        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[test]
    fn test_list_styles() {
        let server = make_server();
        let payload = content_json(server.list_styles(json!(1)));
        let styles = payload["styles"].as_array().unwrap();
        assert_eq!(styles.len(), 14);
        assert_eq!(styles[0], json!({"slug": "gen-z", "label": "Gen Z"}));
    }

    #[tokio::test]
    async fn test_redesign_room_charges_credit() {
        let server = make_server();
        let resp = server
            .redesign_room(
                json!(1),
                json!({"image": fake_jpeg_b64(), "style": "industrial", "user_id": "alice"}),
            )
            .await;

        let payload = content_json(resp);
        assert_eq!(payload["style"], "Industrial");
        assert_eq!(payload["output"]["mime_type"], "image/jpeg");
        assert_eq!(payload["credits"]["remaining_free"], 4);
        assert_eq!(server.ledger.remaining_free(&Identity::user("alice")), 4);
        assert_eq!(server.ledger.remaining_free(&Identity::Guest), 5);
    }

    #[tokio::test]
    async fn test_redesign_room_saves_to_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("room.jpg");
        let server = make_server();
        let resp = server
            .redesign_room(
                json!(1),
                json!({"image": fake_jpeg_b64(), "output_path": path.to_str().unwrap()}),
            )
            .await;

        let payload = content_json(resp);
        assert_eq!(payload["output"]["size_bytes"], FAKE_JPEG.len());
        assert_eq!(std::fs::read(&path).unwrap(), FAKE_JPEG);
    }

    #[tokio::test]
    async fn test_redesign_room_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("renders").join("today").join("room.jpg");
        let server = make_server();
        let resp = server
            .redesign_room(
                json!(1),
                json!({"image": fake_jpeg_b64(), "output_path": path.to_str().unwrap()}),
            )
            .await;

        let payload = content_json(resp);
        assert_eq!(payload["output"]["saved_to"], path.to_str().unwrap());
        assert_eq!(std::fs::read(&path).unwrap(), FAKE_JPEG);
    }

    #[tokio::test]
    async fn test_redesign_room_returns_image_when_save_fails() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be overwritten by a file
        let server = make_server();
        let resp = server
            .redesign_room(
                json!(1),
                json!({"image": fake_jpeg_b64(), "output_path": dir.path().to_str().unwrap()}),
            )
            .await;

        let payload = content_json(resp);
        assert_eq!(payload["output"]["base64"], fake_jpeg_b64());
        assert!(payload["output"]["save_error"]
            .as_str()
            .unwrap()
            .starts_with("Failed to save"));
        assert_eq!(payload["credits"]["remaining_free"], 4);
    }

    #[tokio::test]
    async fn test_redesign_room_without_credits() {
        let server = make_server();
        let guest = Identity::Guest;
        for _ in 0..5 {
            server.ledger.consume_credit(&guest);
        }

        let resp = server
            .redesign_room(json!(1), json!({"image": fake_jpeg_b64()}))
            .await;
        let err = resp.error.unwrap();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("no credits left"));
    }

    #[tokio::test]
    async fn test_redesign_room_rejects_bad_style() {
        let server = make_server();
        let resp = server
            .redesign_room(json!(1), json!({"image": fake_jpeg_b64(), "style": "baroque"}))
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, -32602);
        assert!(err.message.contains("baroque"));
    }

    #[tokio::test]
    async fn test_redesign_room_rejects_path_traversal() {
        let server = make_server();
        let resp = server
            .redesign_room(
                json!(1),
                json!({"image": fake_jpeg_b64(), "output_path": "../etc/evil.png"}),
            )
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, -32602);
        assert!(err.message.contains(".."));
    }

    #[tokio::test]
    async fn test_redesign_room_requires_image() {
        let server = make_server();
        let resp = server
            .redesign_room(json!(1), json!({"style": "dark"}))
            .await;

        assert_eq!(resp.error.unwrap().code, -32602);
    }

    #[tokio::test]
    async fn test_redesign_room_without_designer() {
        let server = McpServer::new(Arc::new(CreditLedger::in_memory()), None);
        let resp = server
            .redesign_room(json!(1), json!({"image": fake_jpeg_b64()}))
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, -32603);
        assert!(err.message.contains("GOOGLE_API_KEY"));
        assert_eq!(server.ledger.remaining_free(&Identity::Guest), 5);
    }

    #[tokio::test]
    async fn test_estimate_cost() {
        let server = make_server();
        let resp = server
            .estimate_cost(
                json!(1),
                json!({"image": fake_jpeg_b64(), "location": "Pune", "currency": "inr"}),
            )
            .await;

        let payload = content_json(resp);
        assert_eq!(payload["estimate"]["luxury"]["total"], "3000");
        assert!(payload["report"]
            .as_str()
            .unwrap()
            .starts_with("ESTIMATION FOR PUNE (INR)"));
        assert_eq!(server.ledger.remaining_free(&Identity::Guest), 5);
    }

    #[tokio::test]
    async fn test_estimate_cost_requires_location() {
        let server = make_server();
        let resp = server
            .estimate_cost(json!(1), json!({"image": fake_jpeg_b64(), "location": " "}))
            .await;

        let err = resp.error.unwrap();
        assert_eq!(err.code, -32602);
        assert!(err.message.contains("Please provide a location."));
    }

    #[test]
    fn test_credit_status_tool() {
        let server = make_server();
        server.ledger.add_credits(5, &Identity::user("bob"));

        let payload = content_json(server.credit_status(json!(1), json!({"user_id": "bob"})));
        assert_eq!(payload["identity"], "user bob");
        assert_eq!(payload["purchased_balance"], 5);
        assert_eq!(payload["can_generate"], true);

        let payload = content_json(server.credit_status(json!(1), json!({})));
        assert_eq!(payload["identity"], "guest");
        assert_eq!(payload["purchased_balance"], 0);
    }

    #[test]
    fn test_validate_output_path_rejects_traversal() {
        assert!(validate_output_path("../etc/passwd").is_err());
        assert!(validate_output_path("/tmp/../etc/passwd").is_err());
        assert!(validate_output_path("foo/../../bar").is_err());
    }

    #[test]
    fn test_validate_output_path_accepts_safe_paths() {
        assert!(validate_output_path("/tmp/output.png").is_ok());
        assert!(validate_output_path("output.png").is_ok());
        assert!(validate_output_path("./images/output.png").is_ok());
    }

    #[test]
    fn test_decode_base64_lenient() {
        assert_eq!(decode_base64_lenient("aGVsbG8=").unwrap(), b"hello");
        assert_eq!(decode_base64_lenient("aGVsbG8").unwrap(), b"hello");
        assert_eq!(
            decode_base64_lenient("data:image/jpeg;base64,aGVsbG8").unwrap(),
            b"hello"
        );
        assert_eq!(decode_base64_lenient("aGVs\nbG8=").unwrap(), b"hello");
        assert!(decode_base64_lenient("!!!not-base64!!!").is_err());
    }
}
