use std::path::Path;

const SERVER_NAME: &str = "soar";

/// Write project-scoped MCP config files in the current directory so that
/// Claude Code and/or Codex discover soar-mcp when working in this project.
/// Only writes config for tools that are actually installed.
pub fn init_project() -> Result<(), Box<dyn std::error::Error>> {
    let binary_path = std::env::current_exe()?
        .canonicalize()?
        .to_string_lossy()
        .to_string();

    let cwd = std::env::current_dir()?;

    let has_claude = on_path("claude");
    let has_codex = on_path("codex");

    if !has_claude && !has_codex {
        eprintln!("Neither `claude` nor `codex` found in PATH.");
        eprintln!("Install Claude Code or OpenAI Codex first, then re-run `soar-mcp init`.");
        std::process::exit(1);
    }

    if has_claude {
        let path = write_claude_config(&cwd, &binary_path)?;
        eprintln!("Wrote {}", path.display());
    }
    if has_codex {
        let path = write_codex_config(&cwd, &binary_path)?;
        eprintln!("Wrote {}", path.display());
    }

    let tools: Vec<&str> = [
        has_claude.then_some("Claude Code"),
        has_codex.then_some("Codex"),
    ]
    .into_iter()
    .flatten()
    .collect();
    eprintln!("\nDone. {} will use soar in this project.", tools.join(" and "));

    Ok(())
}

fn on_path(name: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| {
            std::env::split_paths(&paths).any(|dir| {
                dir.join(name).is_file() || dir.join(format!("{name}.exe")).is_file()
            })
        })
        .unwrap_or(false)
}

/// Merge a stdio server entry into .mcp.json, keeping other servers intact.
fn write_claude_config(
    dir: &Path,
    binary_path: &str,
) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join(".mcp.json");
    let mut root: serde_json::Value = if path.exists() {
        let contents = std::fs::read_to_string(&path)?;
        serde_json::from_str::<serde_json::Value>(&contents).map_err(|e| {
            format!("{} is not valid JSON, leaving it untouched: {e}", path.display())
        })?
    } else {
        serde_json::json!({})
    };
    if !root.is_object() {
        return Err(format!(
            "{} does not hold a JSON object, leaving it untouched",
            path.display()
        )
        .into());
    }

    if !root.get("mcpServers").is_some_and(|v| v.is_object()) {
        root["mcpServers"] = serde_json::json!({});
    }
    root["mcpServers"][SERVER_NAME] = serde_json::json!({
        "type": "stdio",
        "command": binary_path,
        "args": [],
    });

    std::fs::write(&path, serde_json::to_string_pretty(&root)?)?;
    Ok(path)
}

/// Merge an `[mcp_servers.soar]` table into .codex/config.toml.
fn write_codex_config(
    dir: &Path,
    binary_path: &str,
) -> Result<std::path::PathBuf, Box<dyn std::error::Error>> {
    let codex_dir = dir.join(".codex");
    let path = codex_dir.join("config.toml");

    let mut doc: toml_edit::DocumentMut = if path.exists() {
        std::fs::read_to_string(&path)?
            .parse::<toml_edit::DocumentMut>()
            .map_err(|e| {
                format!("{} is not valid TOML, leaving it untouched: {e}", path.display())
            })?
    } else {
        toml_edit::DocumentMut::new()
    };

    if doc.contains_key("mcp_servers") && !doc.contains_table("mcp_servers") {
        return Err(format!("{}: mcp_servers is not a table", path.display()).into());
    }
    if !doc.contains_table("mcp_servers") {
        doc["mcp_servers"] = toml_edit::Item::Table(toml_edit::Table::new());
    }

    let mut server = toml_edit::Table::new();
    server.insert("command", toml_edit::value(binary_path));
    server.insert("args", toml_edit::value(toml_edit::Array::new()));
    doc["mcp_servers"][SERVER_NAME] = toml_edit::Item::Table(server);

    std::fs::create_dir_all(&codex_dir)?;
    std::fs::write(&path, doc.to_string())?;
    Ok(path)
}
