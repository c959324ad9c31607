use std::fs;
use std::path::Path;

/// Files concatenated into the reference section of every prompt, in this order.
pub const REFERENCE_FILES: [&str; 3] = [
    "reference_context.txt",
    "reference_chunks.txt",
    "reference_sources.txt",
];

/// Prompt budget for reference material, in characters.
pub const DEFAULT_MAX_CHARS: usize = 6000;

pub const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED FOR MODEL SAFETY]";

/// Load reference files from `dir`, hard-limited to `max_chars` characters so
/// oversized material cannot get the request rejected. Missing or unreadable
/// files are skipped.
pub fn load_reference_material(dir: &Path, max_chars: usize) -> String {
    let joined = REFERENCE_FILES
        .iter()
        .filter_map(|name| {
            let text = fs::read_to_string(dir.join(name)).ok()?;
            Some(format!("\n--- {name} ---\n{text}"))
        })
        .collect::<Vec<_>>()
        .join("\n");

    truncate_chars(joined, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((cut, _)) = text.char_indices().nth(max_chars) {
        text.truncate(cut);
        text.push_str(TRUNCATION_MARKER);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concatenates_present_files_in_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reference_sources.txt"), "NIST 800-61").unwrap();
        fs::write(dir.path().join("reference_context.txt"), "SOC runbook").unwrap();

        let text = load_reference_material(dir.path(), DEFAULT_MAX_CHARS);
        assert_eq!(
            text,
            "\n--- reference_context.txt ---\nSOC runbook\n\n--- reference_sources.txt ---\nNIST 800-61"
        );
    }

    #[test]
    fn missing_directory_yields_empty_material() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            load_reference_material(&dir.path().join("absent"), DEFAULT_MAX_CHARS),
            ""
        );
    }

    #[test]
    fn oversized_material_is_truncated_on_char_boundary() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("reference_chunks.txt"), "é".repeat(100)).unwrap();

        let text = load_reference_material(dir.path(), 40);
        assert!(text.ends_with(TRUNCATION_MARKER));
        let body = text.strip_suffix(TRUNCATION_MARKER).unwrap();
        assert_eq!(body.chars().count(), 40);
    }

    #[test]
    fn material_at_limit_is_untouched() {
        assert_eq!(truncate_chars("abcd".into(), 4), "abcd");
        assert_eq!(truncate_chars("abcde".into(), 4), format!("abcd{TRUNCATION_MARKER}"));
    }
}
