//! Selector resolution: free-text hint to ordered locator candidates
//!
//! Resolution is pure. The executor owns the page and tries the candidates in
//! order, stopping at the first one that works.

use std::collections::HashMap;

use stepwise_common::ResolverConfig;

use crate::action::{unquote, ActionKind};

/// Produces locator candidates for an implied target
pub trait SelectorResolver: Send + Sync {
    /// Candidates in the order they must be tried; never empty for a non-empty hint
    fn resolve(&self, hint: &str, kind: ActionKind) -> Vec<String>;
}

/// Bare words treated as CSS element selectors rather than visible text
const ELEMENT_NAMES: [&str; 30] = [
    "h1", "h2", "h3", "h4", "h5", "h6", "p", "span", "div", "a", "button", "input", "textarea",
    "select", "label", "table", "tr", "td", "th", "li", "ul", "ol", "form", "img", "nav",
    "header", "footer", "main", "section", "article",
];

/// Template-based resolver with per-kind stop words
#[derive(Debug, Clone)]
pub struct CandidateResolver {
    stop_words: HashMap<ActionKind, Vec<String>>,
}

impl Default for CandidateResolver {
    fn default() -> Self {
        Self::new(&ResolverConfig::default())
    }
}

impl CandidateResolver {
    pub fn new(config: &ResolverConfig) -> Self {
        let lower = |words: &[String]| words.iter().map(|w| w.to_lowercase()).collect::<Vec<_>>();
        let mut stop_words = HashMap::new();
        stop_words.insert(ActionKind::Click, lower(&config.click));
        stop_words.insert(ActionKind::Fill, lower(&config.fill));
        stop_words.insert(ActionKind::Verify, lower(&config.verify));
        stop_words.insert(ActionKind::Store, lower(&config.store));
        stop_words.insert(ActionKind::WaitFor, lower(&config.wait));
        stop_words.insert(ActionKind::Conditional, lower(&config.wait));
        Self { stop_words }
    }

    /// Strip leading and trailing stop words from an unquoted hint.
    ///
    /// A quoted hint is literal text and only loses its quotes. Interior words
    /// are kept ("Search in page" stays intact for fill) and a hint made only
    /// of stop words is returned as-is.
    pub fn sanitize(&self, hint: &str, kind: ActionKind) -> String {
        let text = unquote(hint);
        if text.len() != hint.trim().len() {
            return text.to_string();
        }
        let Some(stop) = self.stop_words.get(&kind) else {
            return text.to_string();
        };

        let words: Vec<&str> = text.split_whitespace().collect();
        let is_stop = |w: &&str| stop.iter().any(|s| s.eq_ignore_ascii_case(w));
        let start = words.iter().position(|w| !is_stop(w));
        let end = words.iter().rposition(|w| !is_stop(w));

        match (start, end) {
            (Some(start), Some(end)) => unquote(&words[start..=end].join(" ")).to_string(),
            _ => text.to_string(),
        }
    }
}

impl SelectorResolver for CandidateResolver {
    fn resolve(&self, hint: &str, kind: ActionKind) -> Vec<String> {
        let h = self.sanitize(hint, kind);
        if h.is_empty() {
            return Vec::new();
        }
        let q = escape(&h);

        match kind {
            ActionKind::Click => vec![
                format!("role=button[name=\"{q}\"]"),
                format!("role=link[name=\"{q}\"]"),
                format!("text=\"{q}\""),
                format!("[aria-label=\"{q}\"]"),
                format!("[title=\"{q}\"]"),
                format!("[value=\"{q}\"]"),
                format!("[data-testid=\"{q}\"]"),
                format!("text={h}"),
            ],
            ActionKind::Fill => vec![
                format!("[placeholder=\"{q}\"]"),
                format!("[name=\"{q}\"]"),
                format!("[aria-label=\"{q}\"]"),
                format!("role=textbox[name=\"{q}\"]"),
                format!("[id=\"{q}\"]"),
                format!("[data-testid=\"{q}\"]"),
                format!("[placeholder*=\"{q}\" i]"),
            ],
            ActionKind::Store => {
                let mut candidates = Vec::new();
                if looks_like_selector(&h) {
                    candidates.push(format!("css={h}"));
                }
                candidates.extend([
                    format!("[data-testid=\"{q}\"]"),
                    format!("[aria-label=\"{q}\"]"),
                    format!("[name=\"{q}\"]"),
                    format!("text={h}"),
                ]);
                candidates
            }
            // Presence checks get one locator and a longer timeout
            ActionKind::Verify | ActionKind::WaitFor | ActionKind::Conditional => {
                if looks_like_selector(&h) && kind != ActionKind::Verify {
                    vec![format!("css={h}")]
                } else {
                    vec![format!("text={h}")]
                }
            }
            ActionKind::Navigate
            | ActionKind::WaitDuration
            | ActionKind::Unknown => Vec::new(),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `#id`, `.class`, `[attr]`, or a known element name optionally followed by a qualifier
fn looks_like_selector(h: &str) -> bool {
    if h.contains(char::is_whitespace) && !h.contains('>') {
        return false;
    }
    if h.starts_with('#') || h.starts_with('.') || h.starts_with('[') {
        return true;
    }
    let head: String = h
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    let rest = &h[head.len()..];
    ELEMENT_NAMES.contains(&head.as_str())
        && (rest.is_empty() || rest.starts_with(&['#', '.', '[', ':', ' '][..]))
}
