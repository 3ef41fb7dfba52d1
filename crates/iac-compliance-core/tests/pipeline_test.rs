use iac_compliance_core::{
    ChangeAction, ComplianceError, ComplianceService, Finding, Invocation, NormalizedResource,
    PlanDocument, PlanLoader, PlanLoaderOptions, ProcessError, ProcessOutput, ProcessRunner,
    RuleEngine, RuleEvaluationError, Severity, ValidationReport,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

/// Answers terraform/terragrunt invocations with canned plans and records every call.
#[derive(Default)]
struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    fail_init: bool,
}

fn plan_with(address: &str, actions: &[&str]) -> Value {
    json!({
        "format_version": "1.2",
        "resource_changes": [{
            "address": address,
            "type": "azurerm_storage_account",
            "name": "sa",
            "change": {"actions": actions, "after": {"min_tls_version": "TLS1_0"}}
        }]
    })
}

impl RecordingRunner {
    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl ProcessRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let ok = |stdout: String| {
            Ok(ProcessOutput {
                stdout,
                stderr: String::new(),
                exit_code: Some(0),
            })
        };

        match (invocation.program.as_str(), invocation.args[0].as_str()) {
            ("terragrunt", "run-all") => ok(plan_with("azurerm_storage_account.tg", &["create"]).to_string()),
            ("terraform", "init") if self.fail_init => Err(ProcessError::CommandFailed {
                command: invocation.command_line(),
                exit_code: Some(1),
                stderr: "Error: backend not configured".into(),
            }),
            ("terraform", "init") | ("terraform", "plan") => ok(String::new()),
            ("terraform", "show") => {
                ok(plan_with("azurerm_storage_account.tf", &["delete", "create"]).to_string())
            }
            (program, _) => Err(ProcessError::ExecutableNotFound {
                program: program.to_string(),
            }),
        }
    }
}

fn two_module_tree() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path();
    std::fs::create_dir_all(root.join("live/app")).unwrap();
    std::fs::write(root.join("live/app/terragrunt.hcl"), "terraform {}\n").unwrap();
    std::fs::create_dir_all(root.join("modules/storage")).unwrap();
    std::fs::write(root.join("modules/storage/main.tf"), "resource \"x\" \"y\" {}\n").unwrap();
    // provider caches are never modules
    std::fs::create_dir_all(root.join("modules/storage/.terraform/modules/m")).unwrap();
    std::fs::write(root.join("modules/storage/.terraform/modules/m/main.tf"), "").unwrap();
    tmp
}

fn out_path(invocation: &Invocation) -> Option<PathBuf> {
    invocation
        .args
        .iter()
        .find_map(|a| a.strip_prefix("-out="))
        .map(PathBuf::from)
}

#[test]
fn two_modules_route_to_orchestrator_and_direct_paths() {
    let tree = two_module_tree();
    let vars = tree.path().join("prod.tfvars");
    std::fs::write(&vars, "region = \"westeurope\"\n").unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let options = PlanLoaderOptions::new(tree.path())
        .with_var_files([&vars])
        .with_env("ARM_SUBSCRIPTION_ID", "0000");
    let doc = PlanLoader::new(options, runner.clone()).load_plan().unwrap();

    let PlanDocument::Aggregate { modules } = &doc else {
        panic!("expected aggregate, got {:?}", doc);
    };
    let paths: Vec<&str> = modules.iter().map(|m| m.module_path.as_str()).collect();
    assert_eq!(paths, vec!["live/app", "modules/storage"]);
    assert_eq!(
        modules[0].plan["resource_changes"][0]["address"],
        "azurerm_storage_account.tg"
    );
    assert_eq!(
        modules[1].plan["resource_changes"][0]["address"],
        "azurerm_storage_account.tf"
    );

    let calls = runner.calls();
    let programs: Vec<(&str, &str)> = calls
        .iter()
        .map(|c| (c.program.as_str(), c.args[0].as_str()))
        .collect();
    assert_eq!(
        programs,
        vec![
            ("terragrunt", "run-all"),
            ("terraform", "init"),
            ("terraform", "plan"),
            ("terraform", "show"),
        ]
    );

    let vars_abs = std::path::absolute(&vars).unwrap();
    let terragrunt = &calls[0];
    assert!(terragrunt.args.contains(&"--terragrunt-non-interactive".to_string()));
    assert!(terragrunt.args.contains(&"--terragrunt-json".to_string()));
    assert!(terragrunt
        .args
        .contains(&format!("--var-file={}", vars_abs.display())));

    let plan = &calls[2];
    assert!(plan.args.contains(&"-input=false".to_string()));
    assert!(plan.args.contains(&format!("-var-file={}", vars_abs.display())));

    // generated plan file is gone once loading returns
    let plan_out = out_path(plan).unwrap();
    assert_eq!(calls[3].args.last().map(PathBuf::from), Some(plan_out.clone()));
    assert!(!plan_out.exists());

    let env = calls[1].env.as_ref().unwrap();
    assert_eq!(env.len(), 2);
    assert_eq!(env["ARM_SUBSCRIPTION_ID"], "0000");
    assert!(env.contains_key("PATH"));
}

#[test]
fn single_module_flattens_to_bare_plan() {
    let tree = two_module_tree();
    let runner = Arc::new(RecordingRunner::default());
    let options =
        PlanLoaderOptions::new(tree.path()).with_modules([tree.path().join("modules/storage")]);
    let doc = PlanLoader::new(options, runner).load_plan().unwrap();

    let PlanDocument::Single(plan) = doc else {
        panic!("expected single plan");
    };
    assert_eq!(plan["format_version"], "1.2");
}

#[test]
fn force_terragrunt_applies_to_every_module() {
    let tree = two_module_tree();
    let runner = Arc::new(RecordingRunner::default());
    let options = PlanLoaderOptions::new(tree.path()).with_force_terragrunt(true);
    PlanLoader::new(options, runner.clone()).load_plan().unwrap();

    let calls = runner.calls();
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.program == "terragrunt"));
    assert!(calls[1].args.iter().any(|a| a.starts_with("--terragrunt-working-dir=")
        && a.ends_with("storage")));
}

#[test]
fn failed_init_stops_the_run_and_cleans_up() {
    let tree = two_module_tree();
    let runner = Arc::new(RecordingRunner {
        fail_init: true,
        ..RecordingRunner::default()
    });
    let options =
        PlanLoaderOptions::new(tree.path()).with_modules([tree.path().join("modules/storage")]);
    let err = PlanLoader::new(options, runner.clone())
        .load_plan()
        .unwrap_err();

    assert!(err.to_string().contains("terraform init -input=false"));
    assert_eq!(runner.calls().len(), 1);
}

/// Reports one finding per resource, at a fixed severity.
struct EchoEngine(Severity);

impl RuleEngine for EchoEngine {
    fn evaluate(
        &self,
        resources: &[NormalizedResource],
        threshold: Option<Severity>,
    ) -> Result<Vec<Finding>, RuleEvaluationError> {
        let findings = resources
            .iter()
            .map(|r| {
                Finding::new("Azure.Storage.MinTLS", "", self.0).with_resource(r.address.clone())
            })
            .collect();
        Ok(iac_compliance_core::filter_by_threshold(findings, threshold))
    }
}

#[test]
fn service_runs_the_full_pipeline() {
    let tree = two_module_tree();
    let runner = Arc::new(RecordingRunner::default());
    let service = ComplianceService::new(runner, Box::new(EchoEngine(Severity::High)));

    let result = service
        .validate(&PlanLoaderOptions::new(tree.path()), None)
        .unwrap();

    assert_eq!(result.resources.len(), 2);
    assert_eq!(result.resources[1].change_action, ChangeAction::Replace);
    assert_eq!(result.metadata["resource_count"], 2);
    assert_eq!(result.metadata["module_count"], 2);
    assert!(result.resource("azurerm_storage_account.tg").is_some());

    let report = ValidationReport::from_result(&result);
    assert!(report.exceeds(Severity::High));
    let json = report.to_json();
    assert_eq!(json["summary"]["counts"]["high"], 2);
    assert_eq!(
        json["findings"][0]["resource"]["address"],
        "azurerm_storage_account.tg"
    );
}

#[test]
fn service_applies_threshold() {
    let tree = two_module_tree();
    let runner = Arc::new(RecordingRunner::default());
    let service = ComplianceService::new(runner, Box::new(EchoEngine(Severity::Low)));
    let result = service
        .validate(&PlanLoaderOptions::new(tree.path()), Some(Severity::Medium))
        .unwrap();
    assert!(result.findings.is_empty());
    assert_eq!(result.resources.len(), 2);
}

#[test]
fn service_surfaces_plan_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let runner = Arc::new(RecordingRunner::default());
    let service = ComplianceService::new(runner, Box::new(EchoEngine(Severity::Low)));
    let options = PlanLoaderOptions::new(tmp.path()).with_plan_json(tmp.path().join("plan.json"));

    let err = service.validate(&options, None).unwrap_err();
    assert!(matches!(err, ComplianceError::PlanLoad(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn json_artifact_with_empty_changes_yields_no_resources() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("plan.json");
    std::fs::write(&path, r#"{"resource_changes": []}"#).unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let service = ComplianceService::new(runner.clone(), Box::new(EchoEngine(Severity::Low)));
    let result = service
        .validate(&PlanLoaderOptions::new(tmp.path()).with_plan_json(&path), None)
        .unwrap();

    assert!(result.resources.is_empty());
    assert!(result.findings.is_empty());
    assert!(runner.calls().is_empty());
}

#[test]
fn aggregate_artifacts_normalize_per_module() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("aggregate.json");
    let aggregate = json!({"modules": [
        {"module_path": "a", "plan": plan_with("x.one", &["create"])},
        {"module_path": "b", "plan": plan_with("x.two", &["update"])}
    ]});
    std::fs::write(&path, aggregate.to_string()).unwrap();

    let runner = Arc::new(RecordingRunner::default());
    let service = ComplianceService::new(runner, Box::new(EchoEngine(Severity::Info)));
    let result = service
        .validate(&PlanLoaderOptions::new(tmp.path()).with_plan_json(&path), None)
        .unwrap();

    let actions: Vec<ChangeAction> = result.resources.iter().map(|r| r.change_action).collect();
    assert_eq!(actions, vec![ChangeAction::Create, ChangeAction::Update]);
    assert_eq!(result.metadata["module_count"], 2);
}
