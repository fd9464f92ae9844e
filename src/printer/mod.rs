//! Printers: coloured text and JSON.

use anyhow::Result;
use owo_colors::OwoColorize;
use serde::Serialize;

use crate::{
    edition::InstalledEdition,
    executor::{ExecutionResult, ExitStatus},
    guard::{GuardReport, GuardVerdict},
    locator::{ResolutionSource, ResolvedInterpreter},
};

pub struct TextPrinter {
    pub color: bool,
}

impl TextPrinter {
    fn paint(&self, text: &str, color: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        match color {
            "green" => format!("{}", text.green()),
            "red" => format!("{}", text.red()),
            "yellow" => format!("{}", text.yellow()),
            "cyan" => format!("{}", text.cyan()),
            "magenta" => format!("{}", text.magenta()),
            _ => text.to_string(),
        }
    }

    fn status(&self, status: ExitStatus) -> String {
        let color = match status {
            ExitStatus::Success => "green",
            ExitStatus::Failure | ExitStatus::LaunchError => "red",
            ExitStatus::Timeout => "yellow",
            ExitStatus::Denied => "magenta",
        };
        self.paint(status.as_str(), color)
    }

    pub fn report(&self, report: &GuardReport) -> String {
        let head = match &report.verdict {
            GuardVerdict::Allow => self.paint("ALLOW", "green"),
            GuardVerdict::Ask { reason, rule } => {
                format!("{} [{}] {}", self.paint("ASK", "yellow"), rule, reason)
            }
            GuardVerdict::Deny { reason, rule } => {
                format!("{} [{}] {}", self.paint("DENY", "red"), rule, reason)
            }
        };
        let mut out = head;
        if let Some(f) = &report.finding {
            out.push_str(&format!("\n  line {}: {}", f.line_no, f.line));
        }
        if report.bypassed() {
            out.push_str(&format!("\n  {}", self.paint("dangerous mode: running anyway", "yellow")));
        }
        out
    }

    pub fn result(&self, r: &ExecutionResult) -> String {
        let mut out = format!("{} in {:.2}s", self.status(r.exit_status), r.duration.as_secs_f64());
        if let Some(code) = r.error_code {
            out.push_str(&format!(" (r({code}))"));
        }
        if let Some(msg) = &r.message {
            out.push_str(&format!("\n{msg}"));
        }
        if let Some(g) = &r.guard {
            if !g.verdict.is_allow() {
                out.push_str(&format!("\nguard: {}", self.report(g)));
            }
        }
        if let Some(p) = &r.log_file_path {
            out.push_str(&format!("\nlog: {}", self.paint(&p.display().to_string(), "cyan")));
        }
        if !r.log_text.is_empty() {
            out.push_str("\n\n");
            out.push_str(r.log_text.trim_end());
        }
        out
    }

    pub fn interpreter(&self, r: &ResolvedInterpreter) -> String {
        let source = match &r.source {
            ResolutionSource::Explicit => "explicit path".to_string(),
            ResolutionSource::Environment(key) => format!("environment ({key})"),
            ResolutionSource::Search => "search".to_string(),
        };
        format!("{} [{}] via {}", self.paint(&r.path.display().to_string(), "cyan"), r.edition, source)
    }

    pub fn installation(&self, e: &InstalledEdition) -> String {
        format!("{:<8} {:>5}  {}", e.edition.as_str(), e.version, e.path.display())
    }
}

pub fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::evaluate;
    use std::{path::PathBuf, time::Duration};

    fn plain() -> TextPrinter {
        TextPrinter { color: false }
    }

    #[test]
    fn report_names_rule_and_line() {
        let out = plain().report(&evaluate("use x\nshell ls", false));
        assert_eq!(out, "DENY [shell] shell runs a host command\n  line 2: shell ls");
    }

    #[test]
    fn result_shows_status_code_and_log() {
        let r = ExecutionResult {
            exit_status: ExitStatus::Failure,
            log_text: "r(111);".into(),
            log_file_path: Some(PathBuf::from("/c/a.log")),
            duration: Duration::from_millis(1500),
            guard: None,
            error_code: Some(111),
            os_exit_code: Some(0),
            message: None,
        };
        let out = plain().result(&r);
        assert!(out.starts_with("FAILURE in 1.50s (r(111))"));
        assert!(out.contains("log: /c/a.log"));
        assert!(out.ends_with("r(111);"));
    }

    #[test]
    fn json_uses_upper_case_status_names() {
        let r = ExecutionResult {
            exit_status: ExitStatus::LaunchError,
            log_text: String::new(),
            log_file_path: None,
            duration: Duration::from_secs(0),
            guard: None,
            error_code: None,
            os_exit_code: None,
            message: Some("failed".into()),
        };
        let v: serde_json::Value = serde_json::from_str(&json(&r).unwrap()).unwrap();
        assert_eq!(v["exit_status"], "LAUNCH_ERROR");
        assert_eq!(v["message"], "failed");
    }
}
