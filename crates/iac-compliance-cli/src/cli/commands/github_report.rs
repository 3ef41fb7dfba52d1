use anyhow::Context;
use iac_compliance_core::report::github::{annotations, format_summary};
use serde_json::Value;
use std::io::Write;
use std::path::Path;

use crate::cli::args::GithubReportArgs;
use crate::exit_codes;

pub fn run(args: GithubReportArgs) -> anyhow::Result<i32> {
    let content = std::fs::read_to_string(&args.report)
        .with_context(|| format!("failed to read report {}", args.report.display()))?;
    let report: Value = serde_json::from_str(&content)
        .with_context(|| format!("invalid JSON in report {}", args.report.display()))?;
    if !report.is_object() {
        anyhow::bail!("report JSON must be an object: {}", args.report.display());
    }

    if let Some(path) = args.summary_path.as_deref().filter(|p| !p.as_os_str().is_empty()) {
        append_summary(path, &format_summary(&report))?;
    }

    for line in annotations(&report) {
        println!("{}", line);
    }
    Ok(exit_codes::EXIT_SUCCESS)
}

fn append_summary(path: &Path, markdown: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open job summary {}", path.display()))?;
    file.write_all(markdown.as_bytes())
        .with_context(|| format!("failed to write job summary {}", path.display()))?;
    Ok(())
}
