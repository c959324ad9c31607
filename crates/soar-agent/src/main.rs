mod input;
mod output;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use soar_core::{AiSettings, Depth, Mode};
use soar_generate::{LlmGenerator, PlaybookRequest};
use tracing_subscriber::EnvFilter;

use output::{OutputFormat, DEFAULT_TITLE};

#[derive(Parser)]
#[command(
    name = "soar-agent",
    version,
    about = "Generate SOAR incident-response playbooks from SIEM alert descriptions"
)]
struct Cli {
    /// Log pipeline progress to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Prompt the configured LLM for a playbook
    Generate(GenerateArgs),
    /// Parse saved model output without calling a model
    Extract {
        /// File path, or name of a saved playbook output
        source: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
        format: OutputFormat,
        #[arg(long, default_value = DEFAULT_TITLE)]
        title: String,
    },
    /// List saved playbook outputs
    List,
    /// Show or change AI settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

#[derive(Args)]
struct GenerateArgs {
    /// Read the alert description from a file instead of stdin
    #[arg(short, long)]
    file: Option<PathBuf>,
    /// learning or deployment
    #[arg(long, default_value = "learning")]
    mode: Mode,
    /// beginner, intermediate or advanced
    #[arg(long, default_value = "beginner")]
    depth: Depth,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    format: OutputFormat,
    #[arg(long, default_value = DEFAULT_TITLE)]
    title: String,
    /// Directory holding reference_*.txt files (overrides settings)
    #[arg(long)]
    reference_dir: Option<PathBuf>,
    /// Do not save the raw model output
    #[arg(long)]
    no_save: bool,
    /// Seconds to wait for the model
    #[arg(long, default_value_t = 120)]
    timeout: u64,
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print effective settings (API key masked)
    Show,
    /// Update ~/.soar/settings.json
    Set {
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long, env = "SOAR_API_KEY", hide_env_values = true)]
        api_key: Option<String>,
        #[arg(long)]
        reference_dir: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "soar_agent=debug,soar_generate=debug"
    } else {
        "soar_agent=warn,soar_generate=warn"
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match cli.command {
        Command::Generate(args) => generate(args).await,
        Command::Extract {
            source,
            format,
            title,
        } => extract(&source, format, &title),
        Command::List => {
            for name in soar_core::list_playbooks()? {
                println!("{name}");
            }
            Ok(())
        }
        Command::Settings { action } => settings(action),
    }
}

async fn generate(args: GenerateArgs) -> anyhow::Result<()> {
    let mut settings = soar_core::load_settings();
    if let Some(dir) = &args.reference_dir {
        settings.reference_dir = Some(dir.to_string_lossy().to_string());
    }
    if !soar_core::ai_configured(&settings) {
        bail!(
            "AI is not configured. Run `soar-agent settings set --provider <p> --model <m> --api-key <k>` \
             or set SOAR_PROVIDER / SOAR_MODEL / SOAR_API_KEY."
        );
    }

    let alert = match &args.file {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            eprintln!("\nEnter SOAR use case details.");
            eprintln!("Press Enter on an empty line to submit.\n");
            input::read_alert(std::io::stdin().lock(), std::io::stderr())?
        }
    };
    if alert.trim().is_empty() {
        bail!("No use case provided.");
    }

    let reference = soar_generate::reference_material(&settings);
    let generator = LlmGenerator::new(settings).with_timeout(Duration::from_secs(args.timeout));
    let request = PlaybookRequest::new(alert, args.mode, args.depth);

    let result = soar_generate::generate_playbook(&generator, &request, &reference).await;

    let raw = match &result {
        Ok(generated) => Some(generated.raw.as_str()),
        Err(e) => e.raw_text(),
    };
    if let (Some(raw), false) = (raw, args.no_save) {
        match soar_core::save_raw_output(raw) {
            Ok(path) => eprintln!("Saved output to {}", path.display()),
            Err(e) => tracing::warn!(error = %e, "failed to save raw output"),
        }
    }

    match result {
        Ok(generated) => {
            report_skipped(&generated.record);
            println!(
                "{}",
                output::render(args.format, &args.title, &generated.record, &generated.raw)?
            );
            Ok(())
        }
        Err(e) => {
            if let Some(raw) = e.raw_text() {
                eprintln!("{}", output::raw_banner(raw));
            }
            Err(e).context("model output could not be turned into a playbook")
        }
    }
}

fn extract(source: &str, format: OutputFormat, title: &str) -> anyhow::Result<()> {
    let raw = input::read_source(source)?;
    match soar_core::extract(&raw) {
        Ok(record) => {
            report_skipped(&record);
            println!("{}", output::render(format, title, &record, &raw)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("{}", output::raw_banner(e.raw_text()));
            Err(e).with_context(|| format!("parsing {source}"))
        }
    }
}

fn report_skipped(record: &soar_core::PlaybookRecord) {
    for skipped in &record.skipped_blocks {
        eprintln!("warning: block #{} skipped: {}", skipped.index + 1, skipped.reason);
    }
}

fn mask(key: &str) -> String {
    if key.is_empty() {
        "(not set)".to_string()
    } else {
        let tail: String = key.chars().rev().take(4).collect::<Vec<_>>().into_iter().rev().collect();
        format!("****{tail}")
    }
}

fn settings(action: SettingsAction) -> anyhow::Result<()> {
    match action {
        SettingsAction::Show => {
            let s = soar_core::load_settings();
            let view = serde_json::json!({
                "provider": s.provider,
                "model": s.model,
                "apiKey": mask(&s.api_key),
                "referenceDir": s.reference_dir,
                "configured": soar_core::ai_configured(&s),
            });
            println!("{}", serde_json::to_string_pretty(&view)?);
            Ok(())
        }
        SettingsAction::Set {
            provider,
            model,
            api_key,
            reference_dir,
        } => {
            let updated = apply_settings(
                soar_core::read_settings(),
                provider,
                model,
                api_key,
                reference_dir,
            );
            soar_core::write_settings(&updated)?;
            eprintln!("Settings saved.");
            Ok(())
        }
    }
}

/// Empty values leave the stored setting unchanged, except `reference_dir`
/// where an empty value clears it.
fn apply_settings(
    mut settings: AiSettings,
    provider: Option<String>,
    model: Option<String>,
    api_key: Option<String>,
    reference_dir: Option<String>,
) -> AiSettings {
    if let Some(p) = provider.filter(|v| !v.is_empty()) {
        settings.provider = p;
    }
    if let Some(m) = model.filter(|v| !v.is_empty()) {
        settings.model = m;
    }
    if let Some(k) = api_key.filter(|v| !v.is_empty()) {
        settings.api_key = k;
    }
    if let Some(dir) = reference_dir {
        settings.reference_dir = (!dir.is_empty()).then_some(dir);
    }
    settings
}
