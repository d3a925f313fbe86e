//! # Run Reports
//!
//! [`RunReport`] gathers the outcome of each processed run for terminal
//! output. [`RunSummary`] is the machine-readable counterpart written as JSON.

use std::fmt;
use std::io::Write;

#[cfg(feature = "colorized_output")]
use console::style;
use serde::Serialize;

use crate::feature::ExtractionWarning;

/// Outcome of one run
#[derive(Debug, Clone, PartialEq)]
pub enum RunStatus {
    /// Processed without warnings
    Ok,
    /// Processed, with warnings
    Warning(Vec<String>),
    /// Processing failed
    Failed(String),
}

impl RunStatus {
    fn is_ok(&self) -> bool {
        matches!(self, RunStatus::Ok)
    }

    fn is_warning(&self) -> bool {
        matches!(self, RunStatus::Warning(_))
    }

    fn is_failed(&self) -> bool {
        matches!(self, RunStatus::Failed(_))
    }
}

/// One row of a report
#[derive(Debug, Clone)]
pub struct RunEntry {
    /// Run name, usually the input file stem
    pub name: String,
    /// Number of features kept
    pub feature_count: usize,
    /// Outcome
    pub status: RunStatus,
}

impl RunEntry {
    /// Entry for a finished run; warnings turn the status into `Warning`
    pub fn finished(name: impl Into<String>, feature_count: usize, warnings: &[ExtractionWarning]) -> Self {
        let status = if warnings.is_empty() {
            RunStatus::Ok
        } else {
            RunStatus::Warning(warnings.iter().map(|w| w.to_string()).collect())
        };
        Self {
            name: name.into(),
            feature_count,
            status,
        }
    }

    /// Entry for a run that could not be processed
    pub fn failed(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            feature_count: 0,
            status: RunStatus::Failed(message.into()),
        }
    }
}

/// Per-run outcomes of one CLI invocation
#[derive(Debug, Default)]
pub struct RunReport {
    /// Entries in processing order
    pub entries: Vec<RunEntry>,
}

impl RunReport {
    /// Create an empty report
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry
    pub fn add(&mut self, entry: RunEntry) {
        self.entries.push(entry);
    }

    /// Whether any run failed
    pub fn has_failures(&self) -> bool {
        self.entries.iter().any(|e| e.status.is_failed())
    }

    /// Whether any run carries warnings
    pub fn has_warnings(&self) -> bool {
        self.entries.iter().any(|e| e.status.is_warning())
    }

    /// Count of clean runs
    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_ok()).count()
    }

    /// Count of runs with warnings
    pub fn warning_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_warning()).count()
    }

    /// Count of failed runs
    pub fn failure_count(&self) -> usize {
        self.entries.iter().filter(|e| e.status.is_failed()).count()
    }

    /// Format the report with colors when the `colorized_output` feature is on
    pub fn format_colored(&self) -> String {
        #[cfg(feature = "colorized_output")]
        {
            use console::Emoji;

            static OK: Emoji<'_, '_> = Emoji("✓", "[OK]");
            static WARN: Emoji<'_, '_> = Emoji("⚠", "[WARN]");
            static FAIL: Emoji<'_, '_> = Emoji("✗", "[FAIL]");

            let mut output = String::new();
            output.push_str(&format!("{}\n", style("breathXplorer Run Report").bold().cyan()));
            output.push_str(&format!("{}\n\n", style("========================").cyan()));

            for entry in &self.entries {
                match &entry.status {
                    RunStatus::Ok => {
                        output.push_str(&format!(
                            "[{}] {} ({} features)\n",
                            OK,
                            style(&entry.name).green(),
                            entry.feature_count
                        ));
                    }
                    RunStatus::Warning(messages) => {
                        output.push_str(&format!(
                            "[{}] {} ({} features)\n",
                            WARN,
                            style(&entry.name).yellow(),
                            entry.feature_count
                        ));
                        for msg in messages {
                            output.push_str(&format!("    - {}: {}\n", style("WARNING").yellow().bold(), msg));
                        }
                    }
                    RunStatus::Failed(msg) => {
                        output.push_str(&format!(
                            "[{}] {} - {}: {}\n",
                            FAIL,
                            style(&entry.name).red(),
                            style("FAILED").red().bold(),
                            msg
                        ));
                    }
                }
            }

            output.push('\n');
            output.push_str(&format!(
                "{}: {} ok, {} with warnings, {} failed\n",
                style("Summary").bold(),
                style(self.success_count()).green(),
                style(self.warning_count()).yellow(),
                style(self.failure_count()).red()
            ));
            output
        }

        #[cfg(not(feature = "colorized_output"))]
        {
            format!("{}", self)
        }
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "breathXplorer Run Report")?;
        writeln!(f, "========================")?;
        writeln!(f)?;

        for entry in &self.entries {
            match &entry.status {
                RunStatus::Ok => writeln!(f, "[✓] {} ({} features)", entry.name, entry.feature_count)?,
                RunStatus::Warning(messages) => {
                    writeln!(f, "[⚠] {} ({} features)", entry.name, entry.feature_count)?;
                    for msg in messages {
                        writeln!(f, "    - WARNING: {}", msg)?;
                    }
                }
                RunStatus::Failed(msg) => writeln!(f, "[✗] {} - FAILED: {}", entry.name, msg)?,
            }
        }

        writeln!(f)?;
        writeln!(
            f,
            "Summary: {} ok, {} with warnings, {} failed",
            self.success_count(),
            self.warning_count(),
            self.failure_count()
        )
    }
}

/// One run inside a [`RunSummary`]
#[derive(Debug, Clone, Serialize)]
pub struct RunRecord {
    /// Run name
    pub name: String,
    /// Input path
    pub input: String,
    /// Number of features kept
    pub feature_count: usize,
    /// Warning messages
    pub warnings: Vec<String>,
    /// Failure message, if the run failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// JSON summary of one CLI invocation
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    /// Crate version that produced the summary
    pub version: String,
    /// Subcommand name
    pub command: String,
    /// Creation time (RFC 3339)
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Effective parameters
    pub parameters: serde_json::Value,
    /// Per-run records
    pub runs: Vec<RunRecord>,
    /// Rows in the aligned table, when one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aligned_rows: Option<usize>,
}

impl RunSummary {
    /// Start a summary stamped with the current time
    pub fn new(command: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            command: command.into(),
            created_at: chrono::Utc::now(),
            parameters,
            runs: Vec::new(),
            aligned_rows: None,
        }
    }

    /// Append a run record
    pub fn add_run(&mut self, record: RunRecord) {
        self.runs.push(record);
    }

    /// Pretty-printed JSON
    pub fn write_json<W: Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        serde_json::to_writer_pretty(writer, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> RunReport {
        let mut report = RunReport::new();
        report.add(RunEntry::finished("a", 12, &[]));
        report.add(RunEntry::finished("b", 0, &[ExtractionWarning::ZeroBreathTime]));
        report.add(RunEntry::failed("c", "truncated file"));
        report
    }

    #[test]
    fn test_report_counts() {
        let report = report();
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.warning_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert!(report.has_failures());
        assert!(report.has_warnings());
    }

    #[test]
    fn test_report_display() {
        let text = report().to_string();
        assert!(text.contains("[✓] a (12 features)"));
        assert!(text.contains("[✗] c - FAILED: truncated file"));
        assert!(text.contains("Summary: 1 ok, 1 with warnings, 1 failed"));
    }

    #[test]
    fn test_summary_json() {
        let mut summary = RunSummary::new("extract", serde_json::json!({ "quality": 0.5 }));
        summary.add_run(RunRecord {
            name: "a".to_string(),
            input: "a.mzML".to_string(),
            feature_count: 3,
            warnings: vec![],
            error: None,
        });

        let mut buffer = Vec::new();
        summary.write_json(&mut buffer).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();

        assert_eq!(value["command"], "extract");
        assert_eq!(value["parameters"]["quality"], 0.5);
        assert_eq!(value["runs"][0]["feature_count"], 3);
        assert!(value["runs"][0].get("error").is_none());
        assert!(value.get("aligned_rows").is_none());
        assert!(value["created_at"].is_string());
    }
}
