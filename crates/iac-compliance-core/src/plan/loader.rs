//! Plan ingestion.
//!
//! Three sources, checked in order:
//!
//! 1. a JSON artifact (`terraform show -json` output saved to disk),
//! 2. a binary plan file, decoded with `terraform show -json <file>`,
//! 3. generation from source: discover module directories and run
//!    `init`/`plan`/`show` per module, or `terragrunt run-all plan` where a
//!    `terragrunt.hcl` is present.

use super::discovery::{discover_modules, has_orchestrator_config};
use super::document::{ModulePlan, PlanDocument};
use crate::process::{child_environment, Invocation, ProcessError, ProcessRunner};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// File name of the generated binary plan inside its temporary directory.
const PLAN_OUT_FILE: &str = "iac-plan.tfplan";

#[derive(Debug, thiserror::Error)]
pub enum PlanLoadError {
    #[error("terraform plan JSON artifact not found: {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("terraform plan file not found: {}", .0.display())]
    PlanFileNotFound(PathBuf),

    #[error("failed to read plan artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid JSON in plan artifact {}: {source}", .path.display())]
    InvalidArtifact {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("output of '{command}' was not valid JSON: {source}")]
    InvalidCommandOutput {
        command: String,
        source: serde_json::Error,
    },

    #[error("failed to create temporary plan directory: {0}")]
    TempDir(#[source] std::io::Error),

    #[error(transparent)]
    Process(#[from] ProcessError),
}

/// Inputs for a plan load. Paths may be relative to the process working directory.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanLoaderOptions {
    pub working_dir: PathBuf,
    pub plan_json_path: Option<PathBuf>,
    pub plan_file_path: Option<PathBuf>,
    /// Explicit module directories; discovery is skipped when non-empty.
    pub module_paths: Vec<PathBuf>,
    pub auto_discover_modules: bool,
    pub var_files: Vec<PathBuf>,
    /// Overlaid on top of the base environment.
    pub env: BTreeMap<String, String>,
    /// Base environment is the full parent environment instead of just `PATH`.
    pub inherit_environment: bool,
    pub terraform_bin: String,
    pub terragrunt_bin: String,
    pub force_terragrunt: bool,
    /// Per-command deadline; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for PlanLoaderOptions {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            plan_json_path: None,
            plan_file_path: None,
            module_paths: Vec::new(),
            auto_discover_modules: true,
            var_files: Vec::new(),
            env: BTreeMap::new(),
            inherit_environment: false,
            terraform_bin: "terraform".to_string(),
            terragrunt_bin: "terragrunt".to_string(),
            force_terragrunt: false,
            timeout: None,
        }
    }
}

impl PlanLoaderOptions {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_plan_json(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_json_path = Some(path.into());
        self
    }

    pub fn with_plan_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.plan_file_path = Some(path.into());
        self
    }

    pub fn with_modules<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.module_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_auto_discover(mut self, enabled: bool) -> Self {
        self.auto_discover_modules = enabled;
        self
    }

    pub fn with_var_files<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.var_files = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_inherit_environment(mut self, inherit: bool) -> Self {
        self.inherit_environment = inherit;
        self
    }

    pub fn with_terraform_bin(mut self, bin: impl Into<String>) -> Self {
        self.terraform_bin = bin.into();
        self
    }

    pub fn with_terragrunt_bin(mut self, bin: impl Into<String>) -> Self {
        self.terragrunt_bin = bin.into();
        self
    }

    pub fn with_force_terragrunt(mut self, force: bool) -> Self {
        self.force_terragrunt = force;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Loads a plan document according to [`PlanLoaderOptions`].
pub struct PlanLoader {
    options: PlanLoaderOptions,
    runner: Arc<dyn ProcessRunner>,
}

impl PlanLoader {
    /// Paths in `options` are made absolute against the current directory.
    pub fn new(options: PlanLoaderOptions, runner: Arc<dyn ProcessRunner>) -> Self {
        let options = PlanLoaderOptions {
            working_dir: absolutize(&options.working_dir),
            plan_json_path: options.plan_json_path.as_deref().map(absolutize),
            plan_file_path: options.plan_file_path.as_deref().map(absolutize),
            module_paths: options.module_paths.iter().map(|p| absolutize(p)).collect(),
            var_files: options.var_files.iter().map(|p| absolutize(p)).collect(),
            ..options
        };
        Self { options, runner }
    }

    pub fn options(&self) -> &PlanLoaderOptions {
        &self.options
    }

    pub fn load_plan(&self) -> Result<PlanDocument, PlanLoadError> {
        if let Some(path) = &self.options.plan_json_path {
            return self.load_json_artifact(path);
        }
        if let Some(path) = &self.options.plan_file_path {
            return self.load_plan_file(path);
        }
        self.generate_from_source()
    }

    fn load_json_artifact(&self, path: &Path) -> Result<PlanDocument, PlanLoadError> {
        if !path.exists() {
            return Err(PlanLoadError::ArtifactNotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path).map_err(|e| PlanLoadError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        let value: Value =
            serde_json::from_str(&content).map_err(|e| PlanLoadError::InvalidArtifact {
                path: path.to_path_buf(),
                source: e,
            })?;

        info!(path = %path.display(), "loaded plan JSON artifact");
        Ok(PlanDocument::from_json(value))
    }

    fn load_plan_file(&self, path: &Path) -> Result<PlanDocument, PlanLoadError> {
        if !path.exists() {
            return Err(PlanLoadError::PlanFileNotFound(path.to_path_buf()));
        }
        let env = self.build_environment();
        let show = self
            .invocation(&self.options.terraform_bin, &self.options.working_dir, &env)
            .args(["show", "-json"])
            .arg(path.display().to_string())
            .capture_output();
        let plan = self.run_json(&show)?;

        info!(path = %path.display(), "decoded binary plan file");
        Ok(PlanDocument::Single(plan))
    }

    fn generate_from_source(&self) -> Result<PlanDocument, PlanLoadError> {
        let module_dirs = self.resolve_modules();
        let env = self.build_environment();

        let mut modules = Vec::with_capacity(module_dirs.len());
        for module_dir in &module_dirs {
            let plan = if self.should_use_terragrunt(module_dir) {
                self.run_terragrunt_plan(module_dir, &env)?
            } else {
                self.run_terraform_plan(module_dir, &env)?
            };
            modules.push(ModulePlan {
                module_path: self.module_identifier(module_dir),
                plan,
            });
        }

        info!(modules = modules.len(), "generated plans from source");
        Ok(PlanDocument::from_modules(modules))
    }

    /// Explicit modules, else discovered modules, else the working directory.
    pub fn resolve_modules(&self) -> Vec<PathBuf> {
        if !self.options.module_paths.is_empty() {
            return self.options.module_paths.clone();
        }
        if !self.options.auto_discover_modules {
            return vec![self.options.working_dir.clone()];
        }
        let discovered = discover_modules(&self.options.working_dir);
        if discovered.is_empty() {
            debug!("no modules discovered, falling back to working directory");
            return vec![self.options.working_dir.clone()];
        }
        discovered
    }

    /// `PATH` only (or the full parent environment when inheriting), then the overlay.
    pub fn build_environment(&self) -> BTreeMap<String, String> {
        child_environment(self.options.inherit_environment, &self.options.env)
    }

    fn should_use_terragrunt(&self, module_dir: &Path) -> bool {
        self.options.force_terragrunt || has_orchestrator_config(module_dir)
    }

    fn run_terraform_plan(
        &self,
        module_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<Value, PlanLoadError> {
        let bin = &self.options.terraform_bin;
        debug!(module = %module_dir.display(), "planning module with terraform");

        self.runner
            .run(&self.invocation(bin, module_dir, env).args(["init", "-input=false"]))?;

        // removed on drop, whichever way this function returns
        let plan_dir = tempfile::Builder::new()
            .prefix("iac-compliance-plan-")
            .tempdir()
            .map_err(PlanLoadError::TempDir)?;
        let plan_path = plan_dir.path().join(PLAN_OUT_FILE);

        let plan = self
            .invocation(bin, module_dir, env)
            .args(["plan", "-input=false"])
            .arg(format!("-out={}", plan_path.display()))
            .args(
                self.options
                    .var_files
                    .iter()
                    .map(|f| format!("-var-file={}", f.display())),
            );
        self.runner.run(&plan)?;

        let show = self
            .invocation(bin, module_dir, env)
            .args(["show", "-json"])
            .arg(plan_path.display().to_string())
            .capture_output();
        self.run_json(&show)
    }

    fn run_terragrunt_plan(
        &self,
        module_dir: &Path,
        env: &BTreeMap<String, String>,
    ) -> Result<Value, PlanLoadError> {
        debug!(module = %module_dir.display(), "planning module with terragrunt");

        let plan = self
            .invocation(&self.options.terragrunt_bin, module_dir, env)
            .args([
                "run-all",
                "plan",
                "--terragrunt-non-interactive",
                "--terragrunt-json",
            ])
            .arg(format!("--terragrunt-working-dir={}", module_dir.display()))
            .args(
                self.options
                    .var_files
                    .iter()
                    .map(|f| format!("--var-file={}", f.display())),
            )
            .capture_output();
        self.run_json(&plan)
    }

    fn invocation(&self, bin: &str, cwd: &Path, env: &BTreeMap<String, String>) -> Invocation {
        Invocation::new(bin)
            .current_dir(cwd)
            .env(env.clone())
            .timeout(self.options.timeout)
    }

    fn run_json(&self, invocation: &Invocation) -> Result<Value, PlanLoadError> {
        let output = self.runner.run(invocation)?;
        serde_json::from_str(&output.stdout).map_err(|e| PlanLoadError::InvalidCommandOutput {
            command: invocation.command_line(),
            source: e,
        })
    }

    /// Module path relative to the working directory, `"."` for the directory itself.
    /// Modules outside the working directory keep their absolute path.
    pub fn module_identifier(&self, module_dir: &Path) -> String {
        match module_dir.strip_prefix(&self.options.working_dir) {
            Ok(relative) if relative.as_os_str().is_empty() => ".".to_string(),
            Ok(relative) => relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => module_dir.display().to_string(),
        }
    }
}

fn absolutize(path: &Path) -> PathBuf {
    std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf())
}
