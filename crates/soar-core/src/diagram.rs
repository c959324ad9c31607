//! Mermaid and SVG text for playbook flows.
//!
//! Output is plain markup for an external renderer; nothing here lays out or
//! draws anything.

use crate::StepBlock;

/// Keep a label valid inside a quoted Mermaid node (`B0["..."]`).
fn mermaid_label(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('"', "#quot;")
}

/// Blocks chained left to right, then the confidence decision with its
/// containment and manual-review branches.
pub fn flow_mermaid(blocks: &[StepBlock]) -> String {
    let mut out = String::with_capacity(512 + blocks.len() * 48);
    out.push_str("flowchart LR\n");

    for (i, block) in blocks.iter().enumerate() {
        out.push_str(&format!(
            "B{i}[\"{}\"]:::core\n",
            mermaid_label(&block.block_name)
        ));
        if i > 0 {
            out.push_str(&format!("B{} --> B{i}\n", i - 1));
        }
    }

    out.push_str("D{\"Threat Confidence?\"}:::decision\n");
    if !blocks.is_empty() {
        out.push_str(&format!("B{} --> D\n", blocks.len() - 1));
    }

    for line in [
        "D -->|High| HC1[\"Auto Containment\"]:::contain",
        "HC1 --> HC2[\"Disable / Block\"]:::contain --> HC3[\"Preserve Evidence\"]:::evidence --> HC4[\"Notify L2 / IR\"]:::notify",
        "D -->|Low / Medium| LC1[\"Manual Review\"]:::manual --> LC2[\"L1 Analysis\"]:::manual --> LC3[\"Close / Escalate\"]:::notify",
        "classDef core fill:#2563eb,color:#fff,stroke:#1e3a8a,stroke-width:2px",
        "classDef decision fill:#f59e0b,stroke:#b45309,stroke-width:3px",
        "classDef contain fill:#dc2626,color:#fff",
        "classDef evidence fill:#7c3aed,color:#fff",
        "classDef notify fill:#16a34a,color:#fff",
        "classDef manual fill:#6b7280,color:#fff",
    ] {
        out.push_str(line);
        out.push('\n');
    }

    out
}

struct Phase {
    id: &'static str,
    title: &'static str,
    class: &'static str,
    nodes: &'static [&'static str],
}

const PHASES: &[Phase] = &[
    Phase {
        id: "Intake",
        title: "Alert Intake",
        class: "intake",
        nodes: &["A[SIEM Alert Received]"],
    },
    Phase {
        id: "Enrichment",
        title: "Context Enrichment",
        class: "enrich",
        nodes: &[
            "B[Normalize & Parse]",
            "C[Asset / User / IP Enrichment]",
            "D[Threat Intel Lookup]",
        ],
    },
    Phase {
        id: "Decision",
        title: "Decision Point",
        class: "decision",
        nodes: &["E{Threat Confirmed?}"],
    },
    Phase {
        id: "Response",
        title: "Automated Response",
        class: "response",
        nodes: &[
            "F[Containment Action]",
            "G[Block IP / Isolate Host]",
            "H[Preserve Evidence]",
        ],
    },
    Phase {
        id: "Human",
        title: "Human-in-the-Loop",
        class: "human",
        nodes: &["I[SOC Analyst Review]", "J[Approve / Escalate]"],
    },
    Phase {
        id: "Closure",
        title: "Incident Closure",
        class: "closure",
        nodes: &["K[Notify IR Team]", "L[Update Case & Close]"],
    },
];

const EXECUTION_EDGES: &[&str] = &[
    "A --> B",
    "B --> C",
    "C --> D",
    "D --> E",
    "E -->|Yes| F",
    "F --> G",
    "G --> H",
    "H --> K",
    "K --> L",
    "E -->|Uncertain| I",
    "I --> J",
    "J --> F",
];

const EXECUTION_STYLES: &[&str] = &[
    "classDef intake fill:#E3F2FD,stroke:#1565C0,stroke-width:2px,rx:6,ry:6;",
    "classDef enrich fill:#E8F5E9,stroke:#2E7D32,stroke-width:2px,rx:6,ry:6;",
    "classDef decision fill:#FFF3E0,stroke:#EF6C00,stroke-width:2px;",
    "classDef response fill:#FCE4EC,stroke:#C2185B,stroke-width:2px,rx:6,ry:6;",
    "classDef human fill:#F3E5F5,stroke:#6A1B9A,stroke-width:2px,rx:6,ry:6;",
    "classDef closure fill:#E0F2F1,stroke:#00695C,stroke-width:2px,rx:6,ry:6;",
];

/// How a SOAR platform executes any playbook in production: intake,
/// enrichment, decision, automated response, human review, closure.
pub fn execution_mermaid() -> String {
    let mut out = String::with_capacity(2048);
    out.push_str("flowchart LR\n\n");

    for phase in PHASES {
        out.push_str(&format!("subgraph {} [{}]\n", phase.id, phase.title));
        out.push_str("direction TB\n");
        for node in phase.nodes {
            out.push_str(node);
            out.push('\n');
        }
        out.push_str("end\n\n");
    }

    for edge in EXECUTION_EDGES {
        out.push_str(edge);
        out.push('\n');
    }
    out.push('\n');

    for style in EXECUTION_STYLES {
        out.push_str(style);
        out.push('\n');
    }
    out.push('\n');

    for phase in PHASES {
        let ids: Vec<&str> = phase
            .nodes
            .iter()
            .map(|n| n.split(['[', '{']).next().unwrap_or(n))
            .collect();
        out.push_str(&format!("class {} {}\n", ids.join(","), phase.class));
    }

    out
}

const SVG_WIDTH: u32 = 600;
const BOX_WIDTH: u32 = 300;
const BOX_HEIGHT: u32 = 55;
const STEP_GAP: u32 = 90;
const TOP_MARGIN: u32 = 20;

fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Fill colour keyed on what the step does.
fn block_color(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if lower.contains("contain") {
        "#d32f2f"
    } else if lower.contains("review") {
        "#7b1fa2"
    } else if lower.contains("notify") {
        "#2e7d32"
    } else if lower.contains("intelligence") {
        "#1976d2"
    } else {
        "#455a64"
    }
}

/// Top-to-bottom execution flow as a standalone SVG document.
pub fn flow_svg(blocks: &[StepBlock]) -> String {
    let x_center = SVG_WIDTH / 2;
    let x = x_center - BOX_WIDTH / 2;
    let mut y = TOP_MARGIN;
    let mut body = String::with_capacity(512 + blocks.len() * 512);

    body.push_str(
        "  <defs>\n    <marker id=\"arrow\" markerWidth=\"10\" markerHeight=\"10\" refX=\"6\" refY=\"3\" orient=\"auto\">\n      <path d=\"M0,0 L0,6 L9,3 z\" fill=\"#333\"/>\n    </marker>\n  </defs>\n",
    );

    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            body.push_str(&format!(
                "  <line x1=\"{x_center}\" y1=\"{}\" x2=\"{x_center}\" y2=\"{y}\" stroke=\"#333\" stroke-width=\"2\" marker-end=\"url(#arrow)\"/>\n",
                y - STEP_GAP + BOX_HEIGHT
            ));
        }
        body.push_str(&format!(
            "  <rect x=\"{x}\" y=\"{y}\" rx=\"8\" ry=\"8\" width=\"{BOX_WIDTH}\" height=\"{BOX_HEIGHT}\" style=\"fill:{};stroke:#333;stroke-width:1.5\"/>\n",
            block_color(&block.block_name)
        ));
        body.push_str(&format!(
            "  <text x=\"{x_center}\" y=\"{}\" text-anchor=\"middle\" font-size=\"14\" fill=\"white\" font-family=\"Arial, Helvetica, sans-serif\">{}</text>\n",
            y + BOX_HEIGHT / 2 + 5,
            xml_escape(&block.block_name)
        ));
        y += STEP_GAP;
    }

    let height = y + 40;
    format!(
        "<svg width=\"{SVG_WIDTH}\" height=\"{height}\" viewBox=\"0 0 {SVG_WIDTH} {height}\" xmlns=\"http://www.w3.org/2000/svg\">\n{body}</svg>\n"
    )
}
