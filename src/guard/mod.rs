//! Do-file screening against the allow/ask/deny policy.
//!
//! Each line is classified by the first rule that fires, walking the ordered
//! rule list. The script verdict is the worst line verdict (deny > ask >
//! allow) and the first line reaching that level is reported.
//!
//! Lines are split naively: `///` continuations, `#delimit ;` blocks, quoted
//! strings and commented-out commands are not told apart from live code.

use std::sync::LazyLock;

use serde::Serialize;

pub mod rules;

pub use rules::{Matcher, PolicyBuilder, Rule, RuleAction};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "verdict", rename_all = "lowercase")]
pub enum GuardVerdict {
    Allow,
    Ask { reason: String, rule: String },
    Deny { reason: String, rule: String },
}

impl GuardVerdict {
    fn severity(&self) -> u8 {
        match self {
            GuardVerdict::Allow => 0,
            GuardVerdict::Ask { .. } => 1,
            GuardVerdict::Deny { .. } => 2,
        }
    }

    pub fn rule(&self) -> Option<&str> {
        match self {
            GuardVerdict::Allow => None,
            GuardVerdict::Ask { rule, .. } | GuardVerdict::Deny { rule, .. } => Some(rule),
        }
    }

    pub fn is_allow(&self) -> bool {
        matches!(self, GuardVerdict::Allow)
    }

    pub fn is_ask(&self) -> bool {
        matches!(self, GuardVerdict::Ask { .. })
    }

    pub fn is_deny(&self) -> bool {
        matches!(self, GuardVerdict::Deny { .. })
    }
}

/// The line that produced the script verdict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// 1-based.
    pub line_no: usize,
    pub line: String,
}

/// Outcome of screening one submission. `verdict` is always the computed
/// verdict, even when dangerous mode lets the script run anyway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardReport {
    pub verdict: GuardVerdict,
    pub finding: Option<Finding>,
    pub dangerous_mode: bool,
}

impl GuardReport {
    /// Verdict used to decide whether to run.
    pub fn effective(&self) -> GuardVerdict {
        if self.dangerous_mode {
            GuardVerdict::Allow
        } else {
            self.verdict.clone()
        }
    }

    /// Dangerous mode turned a non-allow verdict into an allow.
    pub fn bypassed(&self) -> bool {
        self.dangerous_mode && !self.verdict.is_allow()
    }

    /// An ask verdict that still needs the caller's confirmation.
    pub fn needs_confirmation(&self) -> bool {
        !self.dangerous_mode && self.verdict.is_ask()
    }

    pub fn permits_execution(&self, confirmed: bool) -> bool {
        match self.effective() {
            GuardVerdict::Allow => true,
            GuardVerdict::Ask { .. } => confirmed,
            GuardVerdict::Deny { .. } => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Policy {
    rules: Vec<Rule>,
}

static DEFAULT_POLICY: LazyLock<Policy> = LazyLock::new(|| {
    PolicyBuilder::with_defaults()
        .expect("built-in guard patterns compile")
        .build()
});

impl Default for Policy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl Policy {
    pub(crate) fn from_ordered(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn builder() -> PolicyBuilder {
        PolicyBuilder::new()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// First rule firing on one line, if any.
    pub fn classify_line(&self, line: &str) -> Option<&Rule> {
        let line = normalize(line);
        if line.is_empty() {
            return None;
        }
        let keyword = leading_keyword(line);
        self.rules.iter().find(|r| r.matcher.matches(keyword, line))
    }

    pub fn evaluate(&self, script: &str, dangerous_mode: bool) -> GuardReport {
        let mut verdict = GuardVerdict::Allow;
        let mut finding = None;

        for (idx, raw) in script.lines().enumerate() {
            let Some(rule) = self.classify_line(raw) else {
                continue;
            };
            let line_verdict = match rule.action {
                RuleAction::Allow => continue,
                RuleAction::Ask => GuardVerdict::Ask {
                    reason: rule.reason.clone(),
                    rule: rule.id.clone(),
                },
                RuleAction::Deny => GuardVerdict::Deny {
                    reason: rule.reason.clone(),
                    rule: rule.id.clone(),
                },
            };
            if line_verdict.severity() > verdict.severity() {
                verdict = line_verdict;
                finding = Some(Finding { line_no: idx + 1, line: raw.trim().to_string() });
            }
        }

        GuardReport { verdict, finding, dangerous_mode }
    }
}

/// Screen with the built-in policy.
pub fn evaluate(script: &str, dangerous_mode: bool) -> GuardReport {
    DEFAULT_POLICY.evaluate(script, dangerous_mode)
}

/// Drop leading whitespace and comment markers (`*`, `//`, `/*`).
fn normalize(line: &str) -> &str {
    let mut s = line.trim();
    loop {
        let next = if let Some(rest) = s.strip_prefix("//") {
            rest
        } else if let Some(rest) = s.strip_prefix("/*") {
            rest
        } else if let Some(rest) = s.strip_prefix('*') {
            rest
        } else {
            return s;
        };
        s = next.trim_start();
    }
}

/// `!` on its own counts as a command word, so `!ls` yields `!`.
fn leading_keyword(line: &str) -> &str {
    if line.starts_with('!') {
        return "!";
    }
    let end = line
        .find(|c: char| !(c.is_alphanumeric() || c == '_'))
        .unwrap_or(line.len());
    &line[..end]
}
