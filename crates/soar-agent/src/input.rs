use std::io::{BufRead, Write};
use std::path::Path;

use anyhow::Context;

/// Read lines until an empty line or EOF, prompting with "> " before each.
pub fn read_alert<R: BufRead, W: Write>(reader: R, mut prompt: W) -> anyhow::Result<String> {
    let mut lines = Vec::new();
    write!(prompt, "> ")?;
    prompt.flush()?;
    for line in reader.lines() {
        let line = line.context("reading alert from stdin")?;
        if line.trim().is_empty() {
            break;
        }
        lines.push(line);
        write!(prompt, "> ")?;
        prompt.flush()?;
    }
    Ok(lines.join("\n"))
}

/// Text of a file, or of a saved playbook output when no such file exists.
pub fn read_source(source: &str) -> anyhow::Result<String> {
    let path = Path::new(source);
    if path.is_file() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()));
    }
    soar_core::read_playbook_raw(source)
        .with_context(|| format!("'{source}' is neither a file nor a saved playbook"))
}
