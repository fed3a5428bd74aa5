//! Structured form of a classified step

use serde::{Deserialize, Serialize};

/// Prefixes that mark an author-supplied locator
pub const EXPLICIT_PREFIXES: [&str; 3] = ["css=", "xpath=", "text="];

/// Quote characters accepted around literals and hints
pub const QUOTES: [char; 6] = ['"', '\'', '“', '”', '‘', '’'];

/// Strip one layer of matching-or-typographic quotes around `s`
pub fn unquote(s: &str) -> &str {
    let s = s.trim();
    let mut chars = s.chars();
    match (chars.next(), chars.next_back()) {
        (Some(first), Some(last)) if QUOTES.contains(&first) && QUOTES.contains(&last) => {
            s[first.len_utf8()..s.len() - last.len_utf8()].trim()
        }
        _ => s,
    }
}

/// What a step acts upon
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum TargetSpec {
    /// A locator the engine understands as-is
    Explicit(String),
    /// Free text that must go through the selector resolver
    Implied(String),
}

impl TargetSpec {
    /// Classify raw operand text; an explicit prefix wins regardless of quoting
    pub fn parse(raw: &str) -> Self {
        let inner = unquote(raw);
        let lowered = inner.to_ascii_lowercase();
        match EXPLICIT_PREFIXES.iter().find(|p| lowered.starts_with(*p)) {
            // Engines expect the prefix in lower case
            Some(prefix) => TargetSpec::Explicit(format!("{}{}", prefix, &inner[prefix.len()..])),
            None => TargetSpec::Implied(raw.trim().to_string()),
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, TargetSpec::Explicit(_))
    }

    /// The text as the author wrote it
    pub fn hint(&self) -> &str {
        match self {
            TargetSpec::Explicit(s) | TargetSpec::Implied(s) => s,
        }
    }
}

impl std::fmt::Display for TargetSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetSpec::Explicit(locator) => write!(f, "{}", locator),
            TargetSpec::Implied(hint) => write!(f, "\"{}\"", unquote(hint)),
        }
    }
}

/// Probe used by a conditional step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Attached to the DOM
    Exists,
    Visible,
}

/// Element state awaited by a wait-for step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitState {
    #[default]
    Visible,
    Hidden,
    Attached,
    Detached,
}

impl WaitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaitState::Visible => "visible",
            WaitState::Hidden => "hidden",
            WaitState::Attached => "attached",
            WaitState::Detached => "detached",
        }
    }
}

impl From<ConditionKind> for WaitState {
    fn from(kind: ConditionKind) -> Self {
        match kind {
            ConditionKind::Exists => WaitState::Attached,
            ConditionKind::Visible => WaitState::Visible,
        }
    }
}

/// Action kind, used to pick resolver templates and stop words
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Navigate,
    Click,
    Fill,
    Store,
    Conditional,
    WaitFor,
    WaitDuration,
    Verify,
    Unknown,
}

impl ActionKind {
    /// Verb used in human-readable failures
    pub fn verb(&self) -> &'static str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Fill => "fill",
            ActionKind::Store => "read",
            ActionKind::Conditional => "probe",
            ActionKind::WaitFor => "wait for",
            ActionKind::WaitDuration => "wait",
            ActionKind::Verify => "verify",
            ActionKind::Unknown => "run",
        }
    }
}

/// A classified step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Navigate {
        url: String,
    },
    Click {
        target: TargetSpec,
    },
    Fill {
        value: String,
        target: TargetSpec,
    },
    Store {
        source: TargetSpec,
        variable: String,
    },
    Conditional {
        target: TargetSpec,
        condition: ConditionKind,
        then: Box<Action>,
    },
    WaitFor {
        target: TargetSpec,
        state: WaitState,
    },
    /// Wait for the current page's load event
    WaitForLoad,
    WaitDuration {
        seconds: f64,
    },
    Verify {
        target: TargetSpec,
    },
    Unknown {
        text: String,
    },
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Navigate { .. } => ActionKind::Navigate,
            Action::Click { .. } => ActionKind::Click,
            Action::Fill { .. } => ActionKind::Fill,
            Action::Store { .. } => ActionKind::Store,
            Action::Conditional { .. } => ActionKind::Conditional,
            Action::WaitFor { .. } | Action::WaitForLoad => ActionKind::WaitFor,
            Action::WaitDuration { .. } => ActionKind::WaitDuration,
            Action::Verify { .. } => ActionKind::Verify,
            Action::Unknown { .. } => ActionKind::Unknown,
        }
    }

    /// Short normalized description for logs
    pub fn describe(&self) -> String {
        match self {
            Action::Navigate { url } => format!("navigate:{}", url),
            Action::Click { target } => format!("click:{}", target),
            Action::Fill { value, target } => format!("fill:{}={:?}", target, value),
            Action::Store { source, variable } => format!("store:{}->{}", source, variable),
            Action::Conditional { target, condition, then } => {
                format!("if:{}:{:?}->{}", target, condition, then.describe())
            }
            Action::WaitFor { target, state } => format!("wait:{}:{}", target, state.as_str()),
            Action::WaitForLoad => "wait:page-load".to_string(),
            Action::WaitDuration { seconds } => format!("sleep:{}s", seconds),
            Action::Verify { target } => format!("verify:{}", target),
            Action::Unknown { text } => {
                format!("unknown:{}", text.chars().take(30).collect::<String>())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_handles_typographic_quotes() {
        assert_eq!(unquote("\"Username\""), "Username");
        assert_eq!(unquote("“Sign in”"), "Sign in");
        assert_eq!(unquote("'x'"), "x");
        assert_eq!(unquote("plain"), "plain");
        assert_eq!(unquote("\""), "\"");
    }

    #[test]
    fn test_target_parse_detects_explicit_locators() {
        assert_eq!(
            TargetSpec::parse("'css=#submit'"),
            TargetSpec::Explicit("css=#submit".to_string())
        );
        assert_eq!(
            TargetSpec::parse("XPath=//button"),
            TargetSpec::Explicit("xpath=//button".to_string())
        );
        assert_eq!(
            TargetSpec::parse(" \"Submit\" "),
            TargetSpec::Implied("\"Submit\"".to_string())
        );
    }
}
