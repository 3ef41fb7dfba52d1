//! Rule engine backed by an external command-line evaluator.

use super::results::{parse_results, SeverityOverrides};
use super::{RuleEngine, RuleEvaluationError};
use crate::model::{filter_by_threshold, Finding, NormalizedResource, Severity};
use crate::packs::{RulePack, RulePackManager};
use crate::process::{child_environment, Invocation, ProcessRunner};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Engine executable used when none is configured.
pub const DEFAULT_ENGINE_BIN: &str = "ps-rule";

/// Value of `--input-type` for serialized resources.
pub const INPUT_TYPE: &str = "terraform-plan";

/// Evaluates resources by writing them to a temporary JSON file and running
/// `<engine> run --input-path <file> --input-type terraform-plan --output-format json`
/// with one `--module`/`--source`/`--option` group per enabled rule pack.
///
/// The engine sees `PATH` plus the configured overlay unless the parent environment is
/// inherited explicitly.
pub struct ProcessRuleEngine {
    executable: String,
    manager: RulePackManager,
    manifests: Vec<PathBuf>,
    runner: Arc<dyn ProcessRunner>,
    timeout: Option<Duration>,
    env: BTreeMap<String, String>,
    inherit_environment: bool,
}

impl ProcessRuleEngine {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            executable: DEFAULT_ENGINE_BIN.to_string(),
            manager: RulePackManager::with_builtin_defaults(),
            manifests: Vec::new(),
            runner,
            timeout: None,
            env: BTreeMap::new(),
            inherit_environment: false,
        }
    }

    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    pub fn with_manager(mut self, manager: RulePackManager) -> Self {
        self.manager = manager;
        self
    }

    /// Caller manifests, applied after the manager's defaults.
    pub fn with_manifests(mut self, manifests: Vec<PathBuf>) -> Self {
        self.manifests = manifests;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
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

    pub fn executable(&self) -> &str {
        &self.executable
    }

    /// Command line for one evaluation against the given input file.
    pub fn build_invocation(&self, input_path: &Path, packs: &[RulePack]) -> Invocation {
        let mut invocation = Invocation::new(&self.executable)
            .arg("run")
            .arg("--input-path")
            .arg(input_path.display().to_string())
            .args(["--input-type", INPUT_TYPE, "--output-format", "json"]);

        for pack in packs {
            if let Some(module) = &pack.module {
                invocation = invocation.args(["--module", module.as_str()]);
            }
            if let Some(source) = &pack.source {
                invocation = invocation.args(["--source", source.as_str()]);
            }
            for option in pack.option_args() {
                invocation = invocation.arg("--option").arg(option);
            }
        }

        invocation
            .env(child_environment(self.inherit_environment, &self.env))
            .capture_output()
            .unchecked()
            .timeout(self.timeout)
    }

    fn write_input(
        &self,
        resources: &[NormalizedResource],
    ) -> Result<tempfile::NamedTempFile, RuleEvaluationError> {
        let mut file = tempfile::Builder::new()
            .prefix("iac-compliance-input-")
            .suffix(".json")
            .tempfile()
            .map_err(RuleEvaluationError::Input)?;
        serde_json::to_writer(file.as_file_mut(), resources)
            .map_err(|e| RuleEvaluationError::Input(e.into()))?;
        file.as_file_mut()
            .flush()
            .map_err(RuleEvaluationError::Input)?;
        Ok(file)
    }
}

/// Overrides from all packs in order; a later pack wins for the same rule id.
fn merged_overrides(packs: &[RulePack]) -> SeverityOverrides {
    packs
        .iter()
        .flat_map(|pack| pack.severity_overrides.iter())
        .map(|(rule, severity)| (rule.clone(), *severity))
        .collect()
}

impl RuleEngine for ProcessRuleEngine {
    fn evaluate(
        &self,
        resources: &[NormalizedResource],
        threshold: Option<Severity>,
    ) -> Result<Vec<Finding>, RuleEvaluationError> {
        let packs = self.manager.enabled_packs(&self.manifests)?;
        let overrides = merged_overrides(&packs);

        // deleted when dropped, on every return path
        let input = self.write_input(resources)?;
        let invocation = self.build_invocation(input.path(), &packs);
        debug!(command = %invocation.command_line(), packs = packs.len(), "invoking rule engine");
        let output = self.runner.run(&invocation)?;
        drop(input);

        if !output.success() {
            let stderr = output.stderr.trim();
            let message = if stderr.is_empty() {
                "rule engine execution failed".to_string()
            } else {
                stderr.to_string()
            };
            return Err(RuleEvaluationError::Failed {
                message,
                exit_code: output.exit_code,
            });
        }

        let findings = parse_results(&output.stdout, resources, &overrides)?;
        info!(findings = findings.len(), "rule engine evaluation complete");
        Ok(filter_by_threshold(findings, threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{ProcessError, ProcessOutput};
    use serde_json::json;
    use std::sync::Mutex;

    /// Records the invocation and the input file contents seen at call time.
    struct Scripted {
        output: ProcessOutput,
        seen: Mutex<Vec<(Invocation, String)>>,
    }

    impl Scripted {
        fn new(output: ProcessOutput) -> Arc<Self> {
            Arc::new(Self {
                output,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    impl ProcessRunner for Scripted {
        fn run(&self, invocation: &Invocation) -> Result<ProcessOutput, ProcessError> {
            let input = std::fs::read_to_string(&invocation.args[2]).unwrap_or_default();
            self.seen
                .lock()
                .unwrap()
                .push((invocation.clone(), input));
            Ok(self.output.clone())
        }
    }

    fn manifest(dir: &Path, body: serde_json::Value) -> PathBuf {
        let path = dir.join("packs.json");
        std::fs::write(&path, body.to_string()).unwrap();
        path
    }

    fn ok(stdout: serde_json::Value) -> ProcessOutput {
        ProcessOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        }
    }

    #[test]
    fn command_carries_pack_flags_in_order() {
        let tmp = tempfile::tempdir().unwrap();
        let m = manifest(
            tmp.path(),
            json!({"packs": [
                {"name": "a", "module": "Mod.A", "settings": {"k2": 2, "k1": "v"}},
                {"name": "b", "source": "./rules"},
                {"name": "c", "module": "Mod.C", "enabled": false}
            ]}),
        );
        let runner = Scripted::new(ok(json!({"results": []})));
        let engine = ProcessRuleEngine::new(runner.clone())
            .with_executable("engine")
            .with_manager(RulePackManager::default())
            .with_manifests(vec![m]);

        engine.evaluate(&[], None).unwrap();

        let seen = runner.seen.lock().unwrap();
        let (invocation, input) = &seen[0];
        assert_eq!(invocation.program, "engine");
        assert_eq!(invocation.args[0], "run");
        assert_eq!(invocation.args[1], "--input-path");
        assert_eq!(
            &invocation.args[3..],
            &[
                "--input-type",
                "terraform-plan",
                "--output-format",
                "json",
                "--module",
                "Mod.A",
                "--option",
                "k1=v",
                "--option",
                "k2=2",
                "--source",
                "./rules",
            ]
        );
        assert!(invocation.capture_output);
        assert!(!invocation.check);
        assert_eq!(input, "[]");
        assert!(!Path::new(&invocation.args[2]).exists());
    }

    #[test]
    fn engine_environment_is_minimal_unless_inherited() {
        std::env::set_var("IAC_COMPLIANCE_ENGINE_TEST_SECRET", "s3cr3t");
        let runner = Scripted::new(ok(json!([])));
        let engine = ProcessRuleEngine::new(runner.clone())
            .with_manager(RulePackManager::default())
            .with_env("PSRULE_OUTPUT_STYLE", "Plain");
        let invocation = engine.build_invocation(Path::new("/tmp/in.json"), &[]);

        let env = invocation.env.unwrap();
        assert_eq!(
            env.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["PATH", "PSRULE_OUTPUT_STYLE"]
        );

        let inherited = ProcessRuleEngine::new(runner)
            .with_manager(RulePackManager::default())
            .with_inherit_environment(true)
            .build_invocation(Path::new("/tmp/in.json"), &[]);
        assert_eq!(
            inherited.env.unwrap()["IAC_COMPLIANCE_ENGINE_TEST_SECRET"],
            "s3cr3t"
        );
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let runner = Scripted::new(ProcessOutput {
            stdout: String::new(),
            stderr: "boom\n".into(),
            exit_code: Some(1),
        });
        let engine =
            ProcessRuleEngine::new(runner.clone()).with_manager(RulePackManager::default());
        let err = engine.evaluate(&[], None).unwrap_err();
        assert_eq!(err.to_string(), "boom");

        let input_path = runner.seen.lock().unwrap()[0].0.args[2].clone();
        assert!(!Path::new(&input_path).exists());
    }

    #[test]
    fn non_zero_exit_without_stderr_has_generic_message() {
        let runner = Scripted::new(ProcessOutput {
            exit_code: Some(3),
            ..ProcessOutput::default()
        });
        let engine = ProcessRuleEngine::new(runner).with_manager(RulePackManager::default());
        let err = engine.evaluate(&[], None).unwrap_err();
        assert_eq!(err.to_string(), "rule engine execution failed");
    }

    #[test]
    fn later_pack_override_wins_and_threshold_applies() {
        let tmp = tempfile::tempdir().unwrap();
        let m = manifest(
            tmp.path(),
            json!({"packs": [
                {"name": "a", "severity": {"R1": "low", "R2": "high"}},
                {"name": "b", "severity": {"R1": "critical"}}
            ]}),
        );
        let runner = Scripted::new(ok(json!([
            {"ruleId": "R1", "level": "info"},
            {"ruleId": "R2", "level": "info"},
            {"ruleId": "R3", "level": "warning"}
        ])));
        let engine = ProcessRuleEngine::new(runner)
            .with_manager(RulePackManager::default())
            .with_manifests(vec![m]);

        let all = engine.evaluate(&[], None).unwrap();
        let severities: Vec<Severity> = all.iter().map(|f| f.severity).collect();
        assert_eq!(
            severities,
            vec![Severity::Critical, Severity::High, Severity::Medium]
        );

        let high = engine.evaluate(&[], Some(Severity::High)).unwrap();
        assert_eq!(high.len(), 2);
        let critical = engine.evaluate(&[], Some(Severity::Critical)).unwrap();
        assert_eq!(critical.len(), 1);
        assert_eq!(critical[0].rule_id, "R1");
    }

    #[test]
    fn missing_manifest_surfaces_as_pack_error() {
        let runner = Scripted::new(ok(json!([])));
        let engine = ProcessRuleEngine::new(runner)
            .with_manager(RulePackManager::default())
            .with_manifests(vec![PathBuf::from("/definitely/not/here.yaml")]);
        let err = engine.evaluate(&[], None).unwrap_err();
        assert!(matches!(err, RuleEvaluationError::Packs(_)));
    }
}
