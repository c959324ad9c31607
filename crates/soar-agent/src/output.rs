use clap::ValueEnum;
use soar_core::PlaybookRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Validated playbook as pretty JSON
    Json,
    /// Step-by-step Markdown document
    Markdown,
    /// Mermaid flowchart of the blocks
    Mermaid,
    /// Standalone SVG of the blocks
    Svg,
    /// The model output exactly as returned
    Raw,
}

pub const DEFAULT_TITLE: &str = "SOAR Playbook";

pub fn render(
    format: OutputFormat,
    title: &str,
    record: &PlaybookRecord,
    raw: &str,
) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(record)?,
        OutputFormat::Markdown => soar_core::document::render_markdown(title, record),
        OutputFormat::Mermaid => soar_core::diagram::flow_mermaid(&record.blocks),
        OutputFormat::Svg => soar_core::diagram::flow_svg(&record.blocks),
        OutputFormat::Raw => raw.to_string(),
    })
}

/// Raw model output framed for the terminal, shown whenever parsing fails.
pub fn raw_banner(raw: &str) -> String {
    format!("\n===== AI OUTPUT START =====\n\n{raw}\n\n===== AI OUTPUT END =====\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW: &str = r#"Here: {"blocks": [{"block_name": "Trigger"}, {"block_name": "Contain"}]}"#;

    #[test]
    fn every_format_renders_the_same_record() {
        let record = soar_core::extract(RAW).unwrap();

        let json = render(OutputFormat::Json, DEFAULT_TITLE, &record, RAW).unwrap();
        let back: PlaybookRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        let md = render(OutputFormat::Markdown, "Phish", &record, RAW).unwrap();
        assert!(md.starts_with("# Phish\n"));

        let mermaid = render(OutputFormat::Mermaid, DEFAULT_TITLE, &record, RAW).unwrap();
        assert!(mermaid.contains("B0 --> B1"));

        let svg = render(OutputFormat::Svg, DEFAULT_TITLE, &record, RAW).unwrap();
        assert!(svg.starts_with("<svg"));

        assert_eq!(render(OutputFormat::Raw, DEFAULT_TITLE, &record, RAW).unwrap(), RAW);
    }

    #[test]
    fn banner_frames_raw_text() {
        let banner = raw_banner("oops");
        assert!(banner.contains("===== AI OUTPUT START =====\n\noops\n\n===== AI OUTPUT END ====="));
    }
}
