use crate::PlaybookRecord;

fn or_none(text: &str) -> &str {
    if text.trim().is_empty() {
        "_None_"
    } else {
        text
    }
}

fn push_list(out: &mut String, label: &str, items: &[String]) {
    out.push_str(&format!("**{label}:**"));
    if items.is_empty() {
        out.push_str(" _None_\n\n");
        return;
    }
    out.push('\n');
    for item in items {
        out.push_str("- ");
        out.push_str(item);
        out.push('\n');
    }
    out.push('\n');
}

/// Render a playbook as a downloadable Markdown document, one section per step.
pub fn render_markdown(title: &str, record: &PlaybookRecord) -> String {
    let mut out = String::with_capacity(1024 + record.blocks.len() * 512);
    out.push_str("# ");
    out.push_str(title);
    out.push_str("\n\n");

    for (i, block) in record.blocks.iter().enumerate() {
        out.push_str(&format!("## Step {}: {}\n\n", i + 1, block.block_name));
        out.push_str(&format!("**Purpose:** {}\n\n", or_none(&block.purpose)));
        push_list(&mut out, "Inputs", &block.inputs);
        push_list(&mut out, "Outputs", &block.outputs);
        out.push_str(&format!(
            "**Failure handling:** {}\n\n",
            or_none(&block.failure_handling)
        ));
        out.push_str(&format!("**SLA impact:** {}\n\n", or_none(&block.sla_impact)));
        out.push_str(&format!(
            "**Analyst notes:** {}\n\n",
            or_none(&block.analyst_notes)
        ));
    }

    if let Some(doc) = record.documentation.as_deref() {
        if !doc.trim().is_empty() {
            out.push_str("## Documentation\n\n");
            out.push_str(doc.trim());
            out.push('\n');
        }
    }

    out
}
