//! Rule table for the do-file guard.

use std::fmt;

use regex::Regex;
use serde::Serialize;

use crate::error::GuardError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleAction {
    Allow,
    Ask,
    Deny,
}

impl RuleAction {
    /// Evaluation order: allow overrides first, then denials, then asks.
    fn precedence(self) -> u8 {
        match self {
            RuleAction::Allow => 0,
            RuleAction::Deny => 1,
            RuleAction::Ask => 2,
        }
    }
}

impl fmt::Display for RuleAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RuleAction::Allow => "allow",
            RuleAction::Ask => "ask",
            RuleAction::Deny => "deny",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Compared case-insensitively with the line's leading command word.
    Keyword(String),
    /// Searched in the normalised line.
    Pattern(Regex),
}

impl Matcher {
    pub fn matches(&self, keyword: &str, line: &str) -> bool {
        match self {
            Matcher::Keyword(k) => k.eq_ignore_ascii_case(keyword),
            Matcher::Pattern(re) => re.is_match(line),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: String,
    pub matcher: Matcher,
    pub action: RuleAction,
    pub reason: String,
}

/// Optional `capture`/`quietly`/`noisily` prefixes in front of a command,
/// limited to the abbreviations Stata itself accepts.
const PREFIX: &str = r"^(?:(?:cap(?:t(?:u(?:re?)?)?)?|qui(?:e(?:t(?:ly?)?)?)?|n(?:o(?:i(?:s(?:i(?:ly?)?)?)?)?)?)\b\s*:?\s+)*";

/// A path-like token ending in a flagged extension. Tokens carrying a URL
/// scheme (`scheme://`) never match, so host names like `www.stata.com` pass.
fn extension_pattern() -> String {
    format!(
        r#"(?:^|[\s"'(,=])(?:[^\s"'(,:]|:[^/\s])*\.(?:{})(?:["'\s,)]|$)"#,
        SUSPICIOUS_EXTENSIONS.join("|")
    )
}

const DENY_KEYWORDS: [(&str, &str); 4] = [
    ("!", "shell escape runs a host command"),
    ("shell", "shell runs a host command"),
    ("winexec", "winexec launches a Windows program"),
    ("unixcmd", "unixcmd runs a host command"),
];

const DENY_PATTERNS: [(&str, &str, &str); 4] = [
    ("shell-escape-command", r"!\s*\w+", "shell escape with a command"),
    ("shell-command", r"shell\s+\S+", "shell with a command"),
    ("winexec-program", r"winexec\s+\S+", "winexec with a program"),
    ("unixcmd-command", r"unixcmd\s+\S+", "unixcmd with a command"),
];

const ASK_KEYWORDS: [(&str, &str); 2] = [
    ("rm", "rm deletes files"),
    ("erase", "erase deletes files"),
];

const SUSPICIOUS_EXTENSIONS: [&str; 18] = [
    "exe", "bat", "cmd", "com", "pif", "scr", "vbs", "vbe", "js", "jse", "wsf", "wsh", "msc",
    "jar", "app", "deb", "rpm", "dmg",
];

const ALLOW_KEYWORDS: [&str; 2] = ["reg", "gen"];

/// Collects rules and orders them for evaluation.
#[derive(Debug, Default)]
pub struct PolicyBuilder {
    rules: Vec<Rule>,
}

impl PolicyBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from the built-in rule table.
    pub fn with_defaults() -> Result<Self, GuardError> {
        let mut b = Self::new();
        for kw in ALLOW_KEYWORDS {
            b = b.keyword(&format!("allow-{kw}"), kw, RuleAction::Allow, "explicitly allowed");
        }
        for (kw, reason) in DENY_KEYWORDS {
            let id = if kw == "!" { "shell-escape".to_string() } else { kw.to_string() };
            b = b.keyword(&id, kw, RuleAction::Deny, reason);
        }
        for (id, pat, reason) in DENY_PATTERNS {
            b = b.pattern(id, &format!("{PREFIX}{pat}"), RuleAction::Deny, reason)?;
        }
        for (kw, reason) in ASK_KEYWORDS {
            b = b.keyword(kw, kw, RuleAction::Ask, reason);
        }
        b = b.pattern(
            "delete-file",
            &format!(r"{PREFIX}(?:rm|erase)\s+\S+"),
            RuleAction::Ask,
            "deletes a file",
        )?;
        b = b.pattern(
            "suspicious-extension",
            &extension_pattern(),
            RuleAction::Ask,
            "references an executable or installer file",
        )?;
        Ok(b)
    }

    pub fn keyword(mut self, id: &str, keyword: &str, action: RuleAction, reason: &str) -> Self {
        self.rules.push(Rule {
            id: id.to_string(),
            matcher: Matcher::Keyword(keyword.to_string()),
            action,
            reason: reason.to_string(),
        });
        self
    }

    /// Patterns are matched case-insensitively.
    pub fn pattern(
        mut self,
        id: &str,
        pattern: &str,
        action: RuleAction,
        reason: &str,
    ) -> Result<Self, GuardError> {
        let re = Regex::new(&format!("(?i){pattern}")).map_err(|source| {
            GuardError::InvalidPattern { rule_id: id.to_string(), source }
        })?;
        self.rules.push(Rule {
            id: id.to_string(),
            matcher: Matcher::Pattern(re),
            action,
            reason: reason.to_string(),
        });
        Ok(self)
    }

    /// Stable sort: class order is fixed, insertion order holds within a class.
    pub fn build(mut self) -> super::Policy {
        self.rules.sort_by_key(|r| r.action.precedence());
        super::Policy::from_ordered(self.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_orders_allow_then_deny_then_ask() {
        let policy = PolicyBuilder::new()
            .keyword("a", "rm", RuleAction::Ask, "")
            .keyword("d", "shell", RuleAction::Deny, "")
            .keyword("ok", "gen", RuleAction::Allow, "")
            .build();
        let order: Vec<_> = policy.rules().iter().map(|r| r.id.as_str()).collect();
        assert_eq!(order, ["ok", "d", "a"]);
    }

    #[test]
    fn bad_pattern_names_the_rule() {
        let err = PolicyBuilder::new()
            .pattern("broken", "(", RuleAction::Deny, "")
            .unwrap_err();
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn prefix_pattern_sees_through_capture() {
        let re = Regex::new(&format!("(?i){PREFIX}shell\\s+\\S+")).unwrap();
        assert!(re.is_match("capture: shell ls"));
        assert!(re.is_match("quietly shell dir"));
        assert!(re.is_match("shell ls"));
        assert!(!re.is_match("display \"shell ls\""));
    }

    #[test]
    fn prefix_only_takes_real_abbreviations() {
        let re = Regex::new(&format!("(?i){PREFIX}rm\\s+\\S+")).unwrap();
        assert!(re.is_match("noi rm x.dta"));
        assert!(re.is_match("n rm x.dta"));
        assert!(re.is_match("captur quietl rm x.dta"));
        assert!(!re.is_match("nbreg rm price mpg"));
        assert!(!re.is_match("quantile rm"));
        assert!(!re.is_match("caption rm x"));
    }

    #[test]
    fn extension_pattern_skips_url_tokens() {
        let re = Regex::new(&format!("(?i){}", extension_pattern())).unwrap();
        assert!(!re.is_match("net from http://www.stata.com"));
        assert!(!re.is_match("net from \"https://www.stata.com\""));
        assert!(re.is_match("copy https://example.com/x.exe setup.exe"));
        assert!(re.is_match(r"winexec C:\tools\run.bat"));
        assert!(re.is_match("shell ./install.sh && open Stata.app"));
    }
}
