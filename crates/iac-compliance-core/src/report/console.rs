//! Terminal table output.

use super::ValidationReport;

const HEADERS: [&str; 4] = ["Severity", "Rule ID", "Resource", "Message"];
const COLUMN_GAP: &str = "  ";

/// Fixed-width table of findings, or `No findings detected.` when there are none.
#[must_use]
pub fn render_table(report: &ValidationReport) -> String {
    if report.findings.is_empty() {
        return "No findings detected.".to_string();
    }

    let rows: Vec<[String; 4]> = report
        .findings
        .iter()
        .map(|f| {
            [
                f.severity.to_string(),
                f.rule_id.clone(),
                f.resource
                    .as_ref()
                    .map(|r| r.address.clone())
                    .unwrap_or_default(),
                f.message.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(rows.len() + 2);
    lines.push(format_row(HEADERS.iter().copied(), &widths));
    lines.push(
        widths
            .iter()
            .map(|w| "=".repeat(*w))
            .collect::<Vec<_>>()
            .join(COLUMN_GAP),
    );
    for row in &rows {
        lines.push(format_row(row.iter().map(String::as_str), &widths));
    }
    lines.join("\n")
}

fn format_row<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize; 4]) -> String {
    cells
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = *width))
        .collect::<Vec<_>>()
        .join(COLUMN_GAP)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Finding, Severity};
    use std::collections::BTreeMap;

    #[test]
    fn empty_table() {
        assert_eq!(
            render_table(&ValidationReport::default()),
            "No findings detected."
        );
    }

    #[test]
    fn columns_align() {
        let findings = vec![
            Finding::new("Azure.Storage.SecureTransfer", "Use HTTPS", Severity::Critical),
            Finding::new("R2", "Tag it", Severity::Low),
        ];
        let report = ValidationReport::new(BTreeMap::new(), &findings, &[]);
        let table = render_table(&report);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Severity  Rule ID                       Resource  Message"));
        assert!(lines[1].starts_with("========  ============================  ========  ======="));
        assert!(lines[2].starts_with("critical  Azure.Storage.SecureTransfer"));
        assert!(lines[3].starts_with("low       R2                            "));
    }
}
