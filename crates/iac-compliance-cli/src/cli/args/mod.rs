use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod common;
pub use common::*;

#[derive(Parser, Debug)]
#[command(
    name = "iac-compliance",
    version,
    about = "Compliance checks for Terraform and Terragrunt plans"
)]
pub struct Cli {
    /// Debug logging on stderr (RUST_LOG takes precedence)
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a plan, evaluate it against the rule packs and report findings
    Validate(ValidateArgs),
    /// Publish a JSON report as a GitHub job summary and workflow annotations
    GithubReport(GithubReportArgs),
    /// Show the merged rule packs
    Packs(PacksArgs),
}

/// Comma-separated manifest list used when no `--manifest` is given.
pub const MANIFESTS_ENV: &str = "IAC_COMPLIANCE_MANIFESTS";

#[derive(clap::Args, Debug, Clone, Default)]
pub struct ManifestArgs {
    /// Rule-pack manifest applied after the defaults (repeatable, in order).
    /// Without it, the comma-separated list in IAC_COMPLIANCE_MANIFESTS is used
    #[arg(long = "manifest", value_name = "PATH")]
    pub manifests: Vec<PathBuf>,

    /// Do not apply the built-in baseline manifest
    #[arg(long)]
    pub no_default_manifests: bool,
}

impl ManifestArgs {
    /// Manifests to apply: explicit flags verbatim, else the environment list.
    pub fn manifest_paths(&self) -> Vec<PathBuf> {
        self.resolve(std::env::var(MANIFESTS_ENV).ok().as_deref())
    }

    fn resolve(&self, from_env: Option<&str>) -> Vec<PathBuf> {
        if !self.manifests.is_empty() {
            return self.manifests.clone();
        }
        from_env
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[derive(clap::Args, Debug, Clone)]
pub struct ValidateArgs {
    /// Directory containing the infrastructure sources
    #[arg(default_value = ".")]
    pub working_dir: PathBuf,

    /// Pre-generated `terraform show -json` output
    #[arg(long, value_name = "PATH")]
    pub plan_json: Option<PathBuf>,

    /// Binary plan file, decoded with `terraform show -json` (ignored with --plan-json)
    #[arg(long, value_name = "PATH")]
    pub plan_file: Option<PathBuf>,

    /// Module directory to plan (repeatable); disables discovery
    #[arg(long = "module", value_name = "DIR")]
    pub modules: Vec<PathBuf>,

    /// Plan only the working directory instead of discovering modules
    #[arg(long)]
    pub no_discover: bool,

    /// Variable file passed to every plan (repeatable)
    #[arg(long = "var-file", value_name = "PATH")]
    pub var_files: Vec<PathBuf>,

    /// Environment variable for the planning tools and the engine (repeatable)
    #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_key_val)]
    pub env: Vec<(String, String)>,

    /// Pass the full parent environment to the planning tools and the engine (default: PATH only)
    #[arg(long)]
    pub inherit_env: bool,

    #[arg(
        long,
        value_name = "BIN",
        default_value = "terraform",
        env = "IAC_COMPLIANCE_TERRAFORM_BIN"
    )]
    pub terraform_bin: String,

    #[arg(
        long,
        value_name = "BIN",
        default_value = "terragrunt",
        env = "IAC_COMPLIANCE_TERRAGRUNT_BIN"
    )]
    pub terragrunt_bin: String,

    /// Plan every module with terragrunt, even without a terragrunt.hcl
    #[arg(long)]
    pub force_terragrunt: bool,

    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Rule engine executable
    #[arg(
        long,
        value_name = "BIN",
        default_value = iac_compliance_core::engine::DEFAULT_ENGINE_BIN,
        env = "IAC_COMPLIANCE_ENGINE_BIN"
    )]
    pub engine_bin: String,

    /// Drop findings below this severity from the report
    #[arg(long, value_enum)]
    pub severity_threshold: Option<SeverityArg>,

    /// Exit 1 when any finding is at or above this severity
    #[arg(long, value_enum, default_value_t = SeverityArg::High)]
    pub fail_on: SeverityArg,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Write the report here instead of stdout
    #[arg(long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Per-command timeout in seconds for planning tools and the rule engine
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct GithubReportArgs {
    /// Report produced by `validate --format json`
    pub report: PathBuf,

    /// Job summary file to append to
    #[arg(long, value_name = "PATH", env = "GITHUB_STEP_SUMMARY")]
    pub summary_path: Option<PathBuf>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct PacksArgs {
    #[command(flatten)]
    pub manifest: ManifestArgs,

    /// Include disabled packs
    #[arg(long)]
    pub all: bool,

    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,
}
