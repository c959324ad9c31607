pub mod diagram;
pub mod document;
pub mod extract;
pub mod reference;
pub mod rules;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub use extract::{extract, ExtractionError};

// --- Types ---

/// One step of a playbook, in the shape the model is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct StepBlock {
    /// Title of the step. Never empty on a validated record.
    pub block_name: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub failure_handling: String,
    #[serde(default)]
    pub sla_impact: String,
    #[serde(default)]
    pub analyst_notes: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    NotAnObject,
    MissingBlockName,
    NonStringBlockName,
    EmptyBlockName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SkipReason::NotAnObject => "element is not an object",
            SkipReason::MissingBlockName => "missing block_name",
            SkipReason::NonStringBlockName => "block_name is not a string",
            SkipReason::EmptyBlockName => "block_name is empty",
        })
    }
}

/// A `blocks` element that was left out of the record, by position in the model's array.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, schemars::JsonSchema)]
pub struct SkippedBlock {
    pub index: usize,
    pub reason: SkipReason,
}

/// A validated playbook. `blocks` is in execution order and never empty.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq, schemars::JsonSchema)]
pub struct PlaybookRecord {
    pub blocks: Vec<StepBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,
    /// Elements of the model's `blocks` array that failed validation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_blocks: Vec<SkippedBlock>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    #[default]
    Learning,
    Deployment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Depth {
    #[default]
    Beginner,
    Intermediate,
    Advanced,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Mode::Learning => "learning",
            Mode::Deployment => "deployment",
        })
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "learning" | "learning mode" => Ok(Mode::Learning),
            "deployment" | "deployment mode" => Ok(Mode::Deployment),
            other => Err(format!("unknown mode: {other} (expected learning or deployment)")),
        }
    }
}

impl fmt::Display for Depth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Depth::Beginner => "beginner",
            Depth::Intermediate => "intermediate",
            Depth::Advanced => "advanced",
        })
    }
}

impl FromStr for Depth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "beginner" => Ok(Depth::Beginner),
            "intermediate" => Ok(Depth::Intermediate),
            "advanced" => Ok(Depth::Advanced),
            other => Err(format!(
                "unknown depth: {other} (expected beginner, intermediate or advanced)"
            )),
        }
    }
}

// --- Storage ---

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid playbook name: {0}")]
    InvalidName(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Resolve the global data directory (~/.soar/).
pub fn soar_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".soar")
}

/// Directory holding raw model outputs saved by generation runs.
pub fn playbooks_dir() -> PathBuf {
    soar_dir().join("playbooks")
}

/// Save raw model output as `PB_generated_<timestamp>.txt` in the playbooks directory.
pub fn save_raw_output(text: &str) -> Result<PathBuf, StoreError> {
    save_raw_output_in(&playbooks_dir(), text, chrono::Local::now())
}

/// Atomic write: each call writes its own temp file, then links it to the
/// first free name without clobbering. Saves within the same second get a
/// numeric suffix, also when they race.
pub fn save_raw_output_in<Tz>(
    dir: &Path,
    text: &str,
    at: chrono::DateTime<Tz>,
) -> Result<PathBuf, StoreError>
where
    Tz: chrono::TimeZone,
    Tz::Offset: fmt::Display,
{
    fs::create_dir_all(dir).map_err(io_err(dir))?;
    let stem = format!("PB_generated_{}", at.format("%Y%m%d_%H%M%S"));

    let mut tmp = tempfile::Builder::new()
        .prefix(".pb")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(io_err(dir))?;
    tmp.write_all(text.as_bytes()).map_err(io_err(tmp.path()))?;

    let mut n = 1;
    loop {
        let path = if n == 1 {
            dir.join(format!("{stem}.txt"))
        } else {
            dir.join(format!("{stem}_{n}.txt"))
        };
        match tmp.persist_noclobber(&path) {
            Ok(_) => return Ok(path),
            Err(e) if e.error.kind() == io::ErrorKind::AlreadyExists => {
                tmp = e.file;
                n += 1;
            }
            Err(e) => return Err(io_err(&path)(e.error)),
        }
    }
}

/// List saved outputs (without .txt extension), sorted.
pub fn list_playbooks() -> Result<Vec<String>, StoreError> {
    list_playbooks_in(&playbooks_dir())
}

pub fn list_playbooks_in(dir: &Path) -> Result<Vec<String>, StoreError> {
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut names: Vec<String> = fs::read_dir(dir)
        .map_err(io_err(dir))?
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with('.') {
                return None;
            }
            name.strip_suffix(".txt").map(|n| n.to_string())
        })
        .collect();
    names.sort();
    Ok(names)
}

/// Read a saved raw output by name (with or without the .txt extension).
pub fn read_playbook_raw(name: &str) -> Result<String, StoreError> {
    read_playbook_raw_in(&playbooks_dir(), name)
}

pub fn read_playbook_raw_in(dir: &Path, name: &str) -> Result<String, StoreError> {
    let stem = name.strip_suffix(".txt").unwrap_or(name);
    if stem.is_empty() || stem.starts_with('.') || stem.contains(['/', '\\']) {
        return Err(StoreError::InvalidName(name.to_string()));
    }
    let path = dir.join(format!("{stem}.txt"));
    fs::read_to_string(&path).map_err(io_err(&path))
}

// --- AI Settings ---

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub provider: String,
    pub api_key: String,
    pub model: String,
    /// Directory holding the reference_*.txt files fed into every prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_dir: Option<String>,
}

fn settings_path() -> PathBuf {
    soar_dir().join("settings.json")
}

/// Settings from ~/.soar/settings.json with environment overrides applied.
pub fn load_settings() -> AiSettings {
    apply_env_overrides(read_settings(), |key| std::env::var(key).ok())
}

/// Settings as stored on disk. Missing or unreadable files yield defaults.
pub fn read_settings() -> AiSettings {
    read_settings_from(&settings_path())
}

pub fn read_settings_from(path: &Path) -> AiSettings {
    fs::read_to_string(path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

pub fn write_settings(settings: &AiSettings) -> Result<(), StoreError> {
    write_settings_to(&settings_path(), settings)
}

pub fn write_settings_to(path: &Path, settings: &AiSettings) -> Result<(), StoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(io_err(dir))?;
    }
    let json = serde_json::to_string_pretty(settings)?;

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(io_err(path))?;
    // The mode above only applies on creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .map_err(io_err(path))?;
    }
    file.write_all(json.as_bytes()).map_err(io_err(path))
}

/// Overlay `SOAR_*` variables on stored settings. A google provider without a
/// key falls back to `GEMINI_API_KEY`.
pub fn apply_env_overrides<F>(mut settings: AiSettings, lookup: F) -> AiSettings
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("SOAR_PROVIDER") {
        settings.provider = v;
    }
    if let Some(v) = get("SOAR_MODEL") {
        settings.model = v;
    }
    if let Some(v) = get("SOAR_API_KEY") {
        settings.api_key = v;
    }
    if let Some(v) = get("SOAR_REFERENCE_DIR") {
        settings.reference_dir = Some(v);
    }
    if settings.api_key.is_empty() && settings.provider == "google" {
        if let Some(v) = get("GEMINI_API_KEY") {
            settings.api_key = v;
        }
    }
    settings
}

pub fn ai_configured(settings: &AiSettings) -> bool {
    !settings.provider.is_empty()
        && !settings.model.is_empty()
        && (settings.provider == "ollama" || !settings.api_key.is_empty())
}
