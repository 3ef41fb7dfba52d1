//! GitHub Actions surfaces: job summary Markdown and workflow-command annotations.
//!
//! Both work on a report JSON document (as written by `validate --format json`) and are
//! lenient about missing fields, so reports from older versions still render.

use serde_json::Value;

/// Severities in the order the summary table lists them.
const SUMMARY_ORDER: [&str; 5] = ["critical", "high", "medium", "low", "info"];

/// Findings listed individually in the job summary.
const SUMMARY_FINDING_LIMIT: usize = 10;

const FALLBACK_BODY: &str = "Compliance finding reported without message.";

/// Workflow command level for a severity name.
pub fn annotation_level(severity: &str) -> &'static str {
    match severity {
        "critical" | "high" => "error",
        "medium" => "warning",
        _ => "notice",
    }
}

/// Markdown job summary for a report document.
pub fn format_summary(report: &Value) -> String {
    let summary = report.get("summary");
    let findings = findings(report);

    let total = summary
        .and_then(|s| s.get("total_findings"))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let highest = summary
        .and_then(|s| s.get("highest_severity"))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(title_case)
        .unwrap_or_else(|| "None".to_string());

    let mut lines = vec![
        "# IaC Compliance Report".to_string(),
        String::new(),
        format!("**Total findings:** {}", total),
        format!("**Highest severity:** {}", highest),
        String::new(),
        "| Severity | Findings |".to_string(),
        "| --- | ---: |".to_string(),
    ];

    let counts = summary.and_then(|s| s.get("counts")).and_then(Value::as_object);
    for severity in SUMMARY_ORDER {
        let count = counts
            .and_then(|c| {
                c.iter()
                    .find(|(k, _)| k.to_ascii_lowercase() == severity)
                    .and_then(|(_, v)| v.as_u64())
            })
            .unwrap_or(0);
        lines.push(format!("| {} | {} |", title_case(severity), count));
    }

    if let Some(metadata) = report.get("metadata").and_then(Value::as_object) {
        if !metadata.is_empty() {
            lines.extend(["".into(), "## Metadata".into(), "".into()]);
            let mut keys: Vec<&String> = metadata.keys().collect();
            keys.sort();
            for key in keys {
                lines.push(format!("- **{}:** {}", key, display_value(&metadata[key])));
            }
        }
    }

    if !findings.is_empty() {
        lines.extend(["".into(), "## Findings".into(), "".into()]);
        for finding in findings.iter().take(SUMMARY_FINDING_LIMIT) {
            let parts = FindingParts::from_json(finding);
            let mut bullet = format!("- **{}**", title_case(&parts.severity));
            if !parts.rule_id.is_empty() {
                bullet.push_str(&format!(" `{}`", parts.rule_id));
            }
            if !parts.message.is_empty() {
                bullet.push_str(&format!(" – {}", parts.message));
            }
            if !parts.address.is_empty() {
                bullet.push_str(&format!(" _(Resource: `{}`)_", parts.address));
            }
            lines.push(bullet);
        }
        if findings.len() > SUMMARY_FINDING_LIMIT {
            lines.push(format!(
                "- ...and {} more findings.",
                findings.len() - SUMMARY_FINDING_LIMIT
            ));
        }
    }

    lines.push(String::new());
    lines.join("\n")
}

/// One `::level title=...::body` workflow command per finding.
pub fn annotations(report: &Value) -> Vec<String> {
    findings(report)
        .iter()
        .map(|finding| {
            let parts = FindingParts::from_json(finding);
            let level = annotation_level(&parts.severity);

            let title = [title_case(&parts.severity), parts.rule_id.clone()]
                .into_iter()
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join(" - ");

            let mut body: Vec<String> = Vec::new();
            if !parts.message.is_empty() {
                body.push(parts.message.clone());
            }
            if !parts.address.is_empty() {
                body.push(format!("Resource: {}", parts.address));
            }
            if body.is_empty() {
                body.push(FALLBACK_BODY.to_string());
            }

            format!(
                "::{} title={}::{}",
                level,
                escape_property(&title),
                escape_data(&body.join("; "))
            )
        })
        .collect()
}

/// Escape a workflow command message: `%` first, then drop CR and encode LF.
pub fn escape_data(text: &str) -> String {
    text.replace('%', "%25")
        .replace('\r', "")
        .replace('\n', "%0A")
}

/// Escape a workflow command property value: data escaping plus `:` and `,`.
pub fn escape_property(text: &str) -> String {
    escape_data(text).replace(':', "%3A").replace(',', "%2C")
}

fn findings(report: &Value) -> &[Value] {
    report
        .get("findings")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

struct FindingParts {
    severity: String,
    rule_id: String,
    message: String,
    address: String,
}

impl FindingParts {
    fn from_json(finding: &Value) -> Self {
        let text = |value: Option<&Value>| {
            value
                .map(display_value)
                .unwrap_or_default()
                .trim()
                .to_string()
        };
        Self {
            severity: finding
                .get("severity")
                .and_then(Value::as_str)
                .unwrap_or("info")
                .to_ascii_lowercase(),
            rule_id: text(finding.get("rule_id")),
            message: text(finding.get("message")),
            address: text(finding.get("resource").and_then(|r| r.get("address"))),
        }
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
