mod init;

use rmcp::{
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    schemars, tool, tool_handler, tool_router, ErrorData as McpError, ServerHandler, ServiceExt,
};
use serde::Deserialize;
use soar_core::{Depth, ExtractionError, Mode, PlaybookRecord};
use soar_generate::{LlmGenerator, PlaybookError, PlaybookRequest};
use tracing_subscriber::EnvFilter;

// --- Request types ---

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct GenerateRequest {
    /// Free-text description of the alert raised by the SIEM
    alert: String,
    /// "learning" (explains why each step exists) or "deployment" (production execution). Default: learning.
    mode: Option<String>,
    /// "beginner", "intermediate" or "advanced". Default: beginner.
    depth: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ExtractRequest {
    /// Raw model output to parse: JSON, fenced JSON, or JSON embedded in prose
    text: String,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenderDiagramRequest {
    /// "mermaid" (playbook flow), "svg" (playbook flow as SVG) or "execution" (fixed SOAR execution flow, needs no playbook)
    format: String,
    /// Raw model output holding the playbook. Either this or `name`.
    text: Option<String>,
    /// Name of a saved playbook output (see list_playbooks). Either this or `text`.
    name: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct RenderDocumentRequest {
    /// Raw model output holding the playbook. Either this or `name`.
    text: Option<String>,
    /// Name of a saved playbook output (see list_playbooks). Either this or `text`.
    name: Option<String>,
    /// Document title. Default: "SOAR Playbook".
    title: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
struct ReadPlaybookRequest {
    /// Name of the saved output, e.g. "PB_generated_20250314_092653"
    name: String,
}

// --- Helpers ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DiagramFormat {
    Mermaid,
    Svg,
    Execution,
}

fn parse_diagram_format(s: &str) -> Result<DiagramFormat, String> {
    match s.trim().to_lowercase().as_str() {
        "mermaid" => Ok(DiagramFormat::Mermaid),
        "svg" => Ok(DiagramFormat::Svg),
        "execution" => Ok(DiagramFormat::Execution),
        other => Err(format!(
            "Unknown diagram format '{}'. Use \"mermaid\", \"svg\" or \"execution\".",
            other
        )),
    }
}

/// Exactly one of inline text or a saved output name.
fn resolve_source(text: Option<String>, name: Option<String>) -> Result<String, String> {
    match (text, name) {
        (Some(t), None) => Ok(t),
        (None, Some(n)) => soar_core::read_playbook_raw(&n)
            .map_err(|e| format!("Failed to read playbook '{}': {}", n, e)),
        (Some(_), Some(_)) => Err("Pass either `text` or `name`, not both.".to_string()),
        (None, None) => Err("Pass the model output as `text` or a saved playbook `name`.".to_string()),
    }
}

/// Error text for a failed extraction. Always ends with the raw output so the
/// caller can see what the model returned.
fn describe_extraction_error(err: &ExtractionError) -> String {
    let hint = match err {
        ExtractionError::MalformedOutput { .. } => "No JSON object could be located.",
        ExtractionError::EmptyPlaybook { .. } => {
            "JSON was found but it has no blocks with a non-empty block_name."
        }
    };
    format!(
        "{err}. {hint}\n\n===== RAW OUTPUT START =====\n{}\n===== RAW OUTPUT END =====",
        err.raw_text()
    )
}

fn record_json(record: &PlaybookRecord) -> String {
    serde_json::to_string_pretty(record).unwrap_or_else(|e| format!("Serialization error: {}", e))
}

fn extract_or_error(text: &str) -> Result<PlaybookRecord, CallToolResult> {
    soar_core::extract(text)
        .map_err(|e| CallToolResult::error(vec![Content::text(describe_extraction_error(&e))]))
}

// --- Server ---

#[derive(Clone)]
pub struct SoarServer {
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl SoarServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Generate a SOAR incident-response playbook for a SIEM alert using the configured LLM. The raw model output is saved (see list_playbooks). Returns {saved, blocks: [{block_name, purpose, inputs, outputs, failure_handling, sla_impact, analyst_notes}], documentation?, skipped_blocks?}. On a parse failure the raw model output is returned in the error."
    )]
    async fn generate_playbook(
        &self,
        Parameters(req): Parameters<GenerateRequest>,
    ) -> Result<CallToolResult, McpError> {
        let mode = match req.mode.as_deref().map(str::parse::<Mode>).transpose() {
            Ok(m) => m.unwrap_or_default(),
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let depth = match req.depth.as_deref().map(str::parse::<Depth>).transpose() {
            Ok(d) => d.unwrap_or_default(),
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };

        let settings = soar_core::load_settings();
        if !soar_core::ai_configured(&settings) {
            return Ok(CallToolResult::error(vec![Content::text(
                "AI is not configured. Set provider, model and API key in ~/.soar/settings.json \
                 or via SOAR_PROVIDER / SOAR_MODEL / SOAR_API_KEY.",
            )]));
        }

        let reference = soar_generate::reference_material(&settings);
        let generator = LlmGenerator::new(settings);
        let request = PlaybookRequest::new(req.alert, mode, depth);

        let result = soar_generate::generate_playbook(&generator, &request, &reference).await;

        let raw = match &result {
            Ok(generated) => Some(generated.raw.as_str()),
            Err(e) => e.raw_text(),
        };
        let saved = raw.and_then(|raw| match soar_core::save_raw_output(raw) {
            Ok(path) => path.file_stem().map(|s| s.to_string_lossy().to_string()),
            Err(e) => {
                tracing::warn!(error = %e, "failed to save raw output");
                None
            }
        });

        match result {
            Ok(generated) => {
                let mut val = serde_json::to_value(&generated.record)
                    .unwrap_or_else(|_| serde_json::json!({}));
                if let (Some(obj), Some(name)) = (val.as_object_mut(), saved) {
                    obj.insert("saved".to_string(), serde_json::Value::String(name));
                }
                let json = serde_json::to_string_pretty(&val)
                    .unwrap_or_else(|e| format!("Serialization error: {}", e));
                Ok(CallToolResult::success(vec![Content::text(json)]))
            }
            Err(PlaybookError::Extraction(e)) => {
                let mut text = describe_extraction_error(&e);
                if let Some(name) = saved {
                    text.push_str(&format!("\n\nRaw output saved as '{}'.", name));
                }
                Ok(CallToolResult::error(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Playbook generation failed: {}",
                e
            ))])),
        }
    }

    #[tool(
        description = "Parse raw LLM output into a validated playbook without calling a model. Accepts clean JSON, markdown-fenced JSON, or JSON embedded in prose. Returns the playbook JSON, or an error naming the failure (malformed output / empty playbook) with the raw text."
    )]
    fn extract_playbook(
        &self,
        Parameters(req): Parameters<ExtractRequest>,
    ) -> Result<CallToolResult, McpError> {
        match extract_or_error(&req.text) {
            Ok(record) => Ok(CallToolResult::success(vec![Content::text(record_json(
                &record,
            ))])),
            Err(result) => Ok(result),
        }
    }

    #[tool(
        description = "Render a playbook flow diagram. format \"mermaid\" returns Mermaid flowchart text for the playbook's blocks; \"svg\" returns a standalone SVG; \"execution\" returns the fixed SOAR execution flow (intake, enrichment, decision, response, human review, closure) and ignores text/name."
    )]
    fn render_diagram(
        &self,
        Parameters(req): Parameters<RenderDiagramRequest>,
    ) -> Result<CallToolResult, McpError> {
        let format = match parse_diagram_format(&req.format) {
            Ok(f) => f,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        if format == DiagramFormat::Execution {
            return Ok(CallToolResult::success(vec![Content::text(
                soar_core::diagram::execution_mermaid(),
            )]));
        }

        let text = match resolve_source(req.text, req.name) {
            Ok(t) => t,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let record = match extract_or_error(&text) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };

        let out = match format {
            DiagramFormat::Svg => soar_core::diagram::flow_svg(&record.blocks),
            _ => soar_core::diagram::flow_mermaid(&record.blocks),
        };
        Ok(CallToolResult::success(vec![Content::text(out)]))
    }

    #[tool(
        description = "Render a playbook as a Markdown document with one section per step (purpose, inputs, outputs, failure handling, SLA impact, analyst notes) followed by the documentation text."
    )]
    fn render_document(
        &self,
        Parameters(req): Parameters<RenderDocumentRequest>,
    ) -> Result<CallToolResult, McpError> {
        let text = match resolve_source(req.text, req.name) {
            Ok(t) => t,
            Err(e) => return Ok(CallToolResult::error(vec![Content::text(e)])),
        };
        let record = match extract_or_error(&text) {
            Ok(r) => r,
            Err(result) => return Ok(result),
        };
        let title = req.title.as_deref().unwrap_or("SOAR Playbook");
        Ok(CallToolResult::success(vec![Content::text(
            soar_core::document::render_markdown(title, &record),
        )]))
    }

    #[tool(description = "List saved raw playbook outputs, oldest first")]
    fn list_playbooks(&self) -> Result<CallToolResult, McpError> {
        match soar_core::list_playbooks() {
            Ok(names) => {
                let text = if names.is_empty() {
                    "No saved playbooks. Use generate_playbook to create one.".to_string()
                } else {
                    names.join("\n")
                };
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            Err(e) => Ok(CallToolResult::error(vec![Content::text(e.to_string())])),
        }
    }

    #[tool(description = "Read the raw model output of a saved playbook")]
    fn read_playbook(
        &self,
        Parameters(req): Parameters<ReadPlaybookRequest>,
    ) -> Result<CallToolResult, McpError> {
        match soar_core::read_playbook_raw(&req.name) {
            Ok(raw) => Ok(CallToolResult::success(vec![Content::text(raw)])),
            Err(e) => Ok(CallToolResult::error(vec![Content::text(format!(
                "Failed to read playbook '{}': {}",
                req.name, e
            ))])),
        }
    }

    #[tool(description = "Get the JSON Schema of a validated playbook record")]
    fn get_schema(&self) -> Result<CallToolResult, McpError> {
        let schema = schemars::schema_for!(PlaybookRecord);
        let json = serde_json::to_string_pretty(&schema)
            .unwrap_or_else(|e| format!("Serialization error: {}", e));
        Ok(CallToolResult::success(vec![Content::text(json)]))
    }

    #[tool(description = "Get the SOAR playbook design rules used when generating playbooks")]
    fn get_rules(&self) -> Result<CallToolResult, McpError> {
        Ok(CallToolResult::success(vec![Content::text(
            soar_core::rules::RULES,
        )]))
    }
}

#[tool_handler]
impl ServerHandler for SoarServer {
    fn get_info(&self) -> ServerInfo {
        let instructions = format!(
            "{}\n\n## SOAR Design Rules\n{}",
            INSTRUCTIONS,
            soar_core::rules::RULES
        );
        ServerInfo {
            instructions: Some(instructions.into()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

const INSTRUCTIONS: &str = r#"soar generates SOAR (Security Orchestration, Automation, and Response) incident-response playbooks from free-text descriptions of SIEM alerts.

## Playbooks
A playbook is an ordered list of blocks. Array order is execution order. Each block has:
- `block_name` (always non-empty)
- `purpose`, `failure_handling`, `sla_impact`, `analyst_notes` (text, may be empty)
- `inputs`, `outputs` (lists of artifact names, may be empty)
plus optional `documentation` for the whole playbook. `skipped_blocks` lists model output elements that were dropped because they had no usable `block_name`.

## Workflow
1. `generate_playbook` with the alert text. Pick `mode` "deployment" for production runbooks, "learning" to explain why each step exists.
2. The raw model output is saved; `list_playbooks` / `read_playbook` retrieve it.
3. `render_diagram` and `render_document` accept either the raw `text` or a saved `name`.
4. If a generation fails to parse, the error contains the raw output. Do not guess the playbook from it; call `generate_playbook` again or fix the text and use `extract_playbook`."#;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // stdout carries the MCP transport
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("soar_mcp=info,soar_generate=info")),
        )
        .init();

    if std::env::args().nth(1).as_deref() == Some("init") {
        return init::init_project();
    }

    let service = SoarServer::new()
        .serve(rmcp::transport::io::stdio())
        .await
        .inspect_err(|e| tracing::error!("MCP server error: {}", e))?;
    service.waiting().await?;
    Ok(())
}
