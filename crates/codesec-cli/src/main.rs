mod display;
mod inputs;
mod phases;

use anyhow::Result;
use chrono::Utc;
use clap::Parser;
use codesec_core::artifacts::FileSystemStore;
use codesec_core::telemetry::Telemetry;
use codesec_core::workflow;
use codesec_core::RepoContext;
use inputs::Inputs;

#[derive(Parser)]
#[command(
    name = "codesec-action",
    version,
    about = "CodeSec — scan, diff and report static-analysis findings in CI",
    long_about = "Runs the CodeSec scanners against the checked-out tree, compares the \
                  results of two CI jobs and reports newly introduced findings on the \
                  pull request.\n\nEach flag falls back to the corresponding INPUT_* \
                  environment variable set by the GitHub Actions runner."
)]
pub struct Cli {
    /// Analysis target identifier; omit to run the display phase
    #[arg(long)]
    pub target: Option<String>,

    /// Comma-separated tools to run (sca, sast)
    #[arg(long)]
    pub tools: Option<String>,

    /// Jar or classpath for the SAST scan
    #[arg(long)]
    pub jar: Option<String>,

    /// Source directory for the SAST scan
    #[arg(long)]
    pub sources: Option<String>,

    /// Set to "false" to limit the SCA scan to direct dependencies
    #[arg(long)]
    pub eval_indirect_dependencies: Option<String>,

    /// Token with repo write access, enables commenting and fix PRs
    #[arg(long)]
    pub token: Option<String>,

    /// Markdown appended to the findings comment
    #[arg(long)]
    pub footer: Option<String>,

    /// Path to a fix-suggestions document to open auto-fix PRs from
    #[arg(long)]
    pub fix_suggestions: Option<String>,

    /// Path to the scanner binary
    #[arg(long)]
    pub scanner_path: Option<String>,

    /// Root directory of the artifact store shared between jobs
    #[arg(long)]
    pub artifact_root: Option<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let inputs = Inputs::resolve(&cli);

    let repository =
        std::env::var("GITHUB_REPOSITORY").unwrap_or_else(|_| "unknown".to_string());
    let mut telemetry = Telemetry::new(&repository);
    let started = Utc::now();
    let phase = if inputs.target.is_some() { "analysis" } else { "display" };

    let result = run(&inputs).await;
    let error_text = result.err().map(|e| format!("{:#}", e));
    if let Some(message) = &error_text {
        // Interim leniency: phase errors are logged and recorded in
        // telemetry but do not fail the CI step.
        workflow::error(message);
    }
    telemetry.record_phase(phase, &inputs.tool_names(), started, error_text);
    telemetry.flush().await;
}

async fn run(inputs: &Inputs) -> Result<()> {
    let ctx = RepoContext::from_env()?;
    let store = FileSystemStore::new(&inputs.artifact_root);
    match &inputs.target {
        Some(target) => phases::run_analysis(inputs, &ctx, &store, target).await,
        None => phases::run_display(inputs, &ctx, &store).await,
    }
}
