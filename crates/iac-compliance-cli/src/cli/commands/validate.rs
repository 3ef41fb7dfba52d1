use iac_compliance_core::report::console::render_table;
use iac_compliance_core::{
    ComplianceService, PlanLoaderOptions, ProcessRuleEngine, ProcessRunner, SystemRunner,
    ValidationReport,
};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::args::{OutputFormat, ValidateArgs};
use crate::exit_codes;

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let timeout = args.timeout.map(Duration::from_secs);
    let options = loader_options(&args, timeout);

    let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new());
    let engine = engine(&args, Arc::clone(&runner), timeout);
    let service = ComplianceService::new(runner, Box::new(engine));

    // 1. Run the pipeline; any failure is a tooling error, never a partial report
    let result = match service.validate(&options, args.severity_threshold.map(Into::into)) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(stderr) = e.command_stderr().filter(|s| !e.to_string().contains(s)) {
                eprintln!("{}", stderr.trim_end());
            }
            return Ok(e.exit_code());
        }
    };

    // 2. Render
    let report = ValidationReport::from_result(&result);
    let rendered = match args.format {
        OutputFormat::Table => render_table(&report),
        OutputFormat::Json => report.render_json()?,
    };
    super::write_output(&rendered, args.output.as_deref())?;

    // 3. Exit code
    if report.exceeds(args.fail_on.into()) {
        Ok(exit_codes::EXIT_FINDINGS)
    } else {
        Ok(exit_codes::EXIT_SUCCESS)
    }
}

fn engine(
    args: &ValidateArgs,
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
) -> ProcessRuleEngine {
    let mut engine = ProcessRuleEngine::new(runner)
        .with_executable(args.engine_bin.clone())
        .with_manager(super::pack_manager(&args.manifest))
        .with_manifests(args.manifest.manifest_paths())
        .with_inherit_environment(args.inherit_env)
        .with_timeout(timeout);
    for (key, value) in &args.env {
        engine = engine.with_env(key.clone(), value.clone());
    }
    engine
}

fn loader_options(args: &ValidateArgs, timeout: Option<Duration>) -> PlanLoaderOptions {
    let mut options = PlanLoaderOptions::new(&args.working_dir)
        .with_modules(args.modules.iter().cloned())
        .with_auto_discover(!args.no_discover)
        .with_var_files(args.var_files.iter().cloned())
        .with_inherit_environment(args.inherit_env)
        .with_terraform_bin(args.terraform_bin.clone())
        .with_terragrunt_bin(args.terragrunt_bin.clone())
        .with_force_terragrunt(args.force_terragrunt)
        .with_timeout(timeout);
    if let Some(path) = &args.plan_json {
        options = options.with_plan_json(path);
    }
    if let Some(path) = &args.plan_file {
        options = options.with_plan_file(path);
    }
    for (key, value) in &args.env {
        options = options.with_env(key.clone(), value.clone());
    }
    options
}
