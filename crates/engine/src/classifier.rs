//! Step classification: free text to [`Action`]
//!
//! Matchers run in a fixed precedence order and the first one that returns
//! `Some` wins. The order matters because one sentence can satisfy several
//! keyword patterns ("If 'Save' visible then click 'Save'" contains a click).

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::trace;

use crate::action::{unquote, Action, ConditionKind, TargetSpec, WaitState};

const QUOTED: &str = r#""[^"]*"|'[^']*'|“[^”]*”|‘[^’]*’"#;

static NUMBERING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:step\s*)?\d+\s*[.):]\s+").unwrap());

static QUOTED_RE: Lazy<Regex> = Lazy::new(|| Regex::new(QUOTED).unwrap());

static EXPLICIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(?:^|\s)(?P<locator>(?:css|xpath|text)=\S.*)$").unwrap());

static STORE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:store|save|remember|capture)\s+(?:the\s+)?(?:(?:text|value|content)\s+)?(?:(?:of|from|in)\s+)?(?P<source>.+?)\s+(?:as|into|in|to)\s+(?:(?:the\s+)?variable\s+)?(?P<name>\S+)\s*$",
    )
    .unwrap()
});

static VARIABLE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.\-]*$").unwrap());

static CONDITIONAL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*if\s+(?P<cond>.+?)\s+(?:(?:is|are)\s+)?(?P<kind>exists?|present|visible|displayed|shown|appears?)(?:\s*,\s*(?:then\s+)?|\s+then\s+)(?P<then>.+)$",
    )
    .unwrap()
});

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:wait|pause|sleep)(?:\s+for)?\s+(?P<n>\d+(?:\.\d+)?)\s*(?P<unit>ms|millis|milliseconds?|s|secs?|seconds?|m|mins?|minutes?)?\b",
    )
    .unwrap()
});

static WAIT_FOR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*wait\s+(?:for|until)\s+(?P<target>.+?)(?:\s+(?:to\s+(?:be\s+)?|is\s+|are\s+|becomes?\s+)?(?P<state>visible|hidden|appears?|disappears?|attached|detached|gone|present|displayed|shown))?\s*$",
    )
    .unwrap()
});

static PAGE_LOAD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*wait\s+(?:for|until)\s+(?:the\s+)?page\s+(?:to\s+)?(?:(?:finish(?:es)?\s+)?load(?:s|ing)?|(?:is\s+|to\s+be\s+)?loaded)\s*$",
    )
    .unwrap()
});

static CLICK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:double[-\s]?click|click|press|tap)(?:\s+on)?\s+(?P<target>.+)$",
    )
    .unwrap()
});

static FILL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?P<verb>type|enter|fill(?:\s+in)?|input|write)\s+(?P<rest>.+)$").unwrap()
});

static FILL_INTO_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?P<value>{QUOTED}|.+?)\s+(?:into|in|to|on)\s+(?:the\s+)?(?P<target>.+)$"
    ))
    .unwrap()
});

static FILL_WITH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)^(?:the\s+)?(?P<target>{QUOTED}|.+?)\s+with\s+(?P<value>.+)$"
    ))
    .unwrap()
});

static NAVIGATE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:navigate|go|visit|open|browse|load)\s+(?:to\s+)?(?:the\s+)?(?:(?:url|page|site|website)\s+)?(?P<url>.+)$",
    )
    .unwrap()
});

static DOMAIN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z0-9][a-z0-9.\-]*\.[a-z]{2,}(?::\d+)?(?:/\S*)?$").unwrap());

static VERIFY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?:verify|check|assert|expect|ensure|confirm|validate)(?:\s+that)?\s+(?P<target>.+)$",
    )
    .unwrap()
});

static SHOULD_SEE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:(?:i|the\s+user|user)\s+)?should\s+see\s+(?P<target>.+)$").unwrap()
});

static SHOULD_BE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*(?P<target>.+?)\s+should\s+(?:be\s+)?(?:visible|displayed|shown|present|appear|exist)\s*$",
    )
    .unwrap()
});

static TRAILING_PRESENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:\s+(?:(?:is|are)\s+)?(?:visible|displayed|present|shown|exists?|appears?))?(?:\s+on\s+(?:the\s+)?(?:page|screen))?\s*$",
    )
    .unwrap()
});

static BARE_WAIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:wait|pause|sleep)\b").unwrap());

type Matcher = fn(&Classifier, &str, usize) -> Option<Action>;

/// Precedence order of the grammar; Unknown is the fallback after all of these
const MATCHERS: [(&str, Matcher); 9] = [
    ("store", Classifier::match_store),
    ("conditional", Classifier::match_conditional),
    ("page_load", Classifier::match_page_load),
    ("wait_for", Classifier::match_wait_for),
    ("click", Classifier::match_click),
    ("fill", Classifier::match_fill),
    ("navigate", Classifier::match_navigate),
    ("verify", Classifier::match_verify),
    ("wait_duration", Classifier::match_wait_duration),
];

/// Turns step text into an [`Action`]; never fails
#[derive(Debug, Clone)]
pub struct Classifier {
    max_depth: usize,
    default_wait_secs: f64,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(3, 1.0)
    }
}

impl Classifier {
    pub fn new(max_depth: usize, default_wait_secs: f64) -> Self {
        Self { max_depth, default_wait_secs }
    }

    pub fn classify(&self, text: &str) -> Action {
        self.classify_at(text, 0)
    }

    fn classify_at(&self, text: &str, depth: usize) -> Action {
        let normalized = normalize(text);
        if normalized.is_empty() {
            return Action::Unknown { text: text.to_string() };
        }

        for (name, matcher) in MATCHERS {
            if let Some(action) = matcher(self, normalized, depth) {
                trace!(matcher = name, step = normalized, "classified step");
                return action;
            }
        }

        Action::Unknown { text: text.trim().to_string() }
    }

    fn match_store(&self, text: &str, _depth: usize) -> Option<Action> {
        let caps = STORE_RE.captures(text)?;
        let name = unquote(&caps["name"]).trim_matches(|c| c == '{' || c == '}');
        if !VARIABLE_NAME_RE.is_match(name) {
            return None;
        }
        Some(Action::Store {
            source: operand(&caps["source"]),
            variable: name.to_string(),
        })
    }

    fn match_conditional(&self, text: &str, depth: usize) -> Option<Action> {
        let caps = CONDITIONAL_RE.captures(text)?;
        if depth >= self.max_depth {
            // Nested too deeply; the whole instruction is treated as unrecognized
            return Some(Action::Unknown { text: text.to_string() });
        }
        let condition = match caps["kind"].to_ascii_lowercase().as_str() {
            "exist" | "exists" | "present" => ConditionKind::Exists,
            _ => ConditionKind::Visible,
        };
        Some(Action::Conditional {
            target: operand(&caps["cond"]),
            condition,
            then: Box::new(self.classify_at(&caps["then"], depth + 1)),
        })
    }

    fn match_page_load(&self, text: &str, _depth: usize) -> Option<Action> {
        PAGE_LOAD_RE.is_match(text).then_some(Action::WaitForLoad)
    }

    fn match_wait_for(&self, text: &str, _depth: usize) -> Option<Action> {
        if DURATION_RE.is_match(text) {
            return None;
        }
        let caps = WAIT_FOR_RE.captures(text)?;
        let state = match caps.name("state").map(|m| m.as_str().to_ascii_lowercase()) {
            Some(s) => match s.as_str() {
                "hidden" | "disappear" | "disappears" | "gone" => WaitState::Hidden,
                "attached" => WaitState::Attached,
                "detached" => WaitState::Detached,
                _ => WaitState::Visible,
            },
            None => WaitState::Visible,
        };
        Some(Action::WaitFor { target: operand(&caps["target"]), state })
    }

    fn match_click(&self, text: &str, _depth: usize) -> Option<Action> {
        let caps = CLICK_RE.captures(text)?;
        Some(Action::Click { target: operand(&caps["target"]) })
    }

    fn match_fill(&self, text: &str, _depth: usize) -> Option<Action> {
        let caps = FILL_RE.captures(text)?;
        let rest = &caps["rest"];
        let templates: [&Lazy<Regex>; 2] = if caps["verb"].to_ascii_lowercase().starts_with("fill") {
            [&FILL_WITH_RE, &FILL_INTO_RE]
        } else {
            [&FILL_INTO_RE, &FILL_WITH_RE]
        };

        templates.iter().find_map(|re| {
            let parts = re.captures(rest)?;
            // The value side is always a literal; only the target may be a locator
            Some(Action::Fill {
                value: unquote(&parts["value"]).to_string(),
                target: operand(&parts["target"]),
            })
        })
    }

    fn match_navigate(&self, text: &str, _depth: usize) -> Option<Action> {
        let caps = NAVIGATE_RE.captures(text)?;
        let raw = caps["url"].trim();
        let candidate = match QUOTED_RE.find(raw) {
            Some(m) => unquote(m.as_str()),
            None => raw.split_whitespace().next().unwrap_or(raw),
        };
        let lowered = candidate.to_ascii_lowercase();
        let url = if lowered.starts_with("http://")
            || lowered.starts_with("https://")
            || lowered.starts_with("file://")
            || candidate.starts_with('/')
        {
            candidate.to_string()
        } else if DOMAIN_RE.is_match(candidate) {
            format!("https://{}", candidate)
        } else {
            return None;
        };
        Some(Action::Navigate { url })
    }

    fn match_verify(&self, text: &str, _depth: usize) -> Option<Action> {
        let caps = VERIFY_RE
            .captures(text)
            .or_else(|| SHOULD_SEE_RE.captures(text))
            .or_else(|| SHOULD_BE_RE.captures(text))?;
        let target = caps["target"].trim();
        let target = if quoted_span(target) == Some(target) {
            target.to_string()
        } else {
            TRAILING_PRESENCE_RE.replace(target, "").into_owned()
        };
        if target.trim().is_empty() {
            return None;
        }
        Some(Action::Verify { target: operand(&target) })
    }

    fn match_wait_duration(&self, text: &str, _depth: usize) -> Option<Action> {
        if let Some(caps) = DURATION_RE.captures(text) {
            let n: f64 = caps["n"].parse().ok()?;
            let unit = caps.name("unit").map(|m| m.as_str().to_ascii_lowercase());
            let seconds = match unit.as_deref() {
                Some("ms" | "millis" | "millisecond" | "milliseconds") => n / 1000.0,
                Some("m" | "min" | "mins" | "minute" | "minutes") => n * 60.0,
                _ => n,
            };
            return Some(Action::WaitDuration { seconds });
        }
        if BARE_WAIT_RE.is_match(text) {
            return Some(Action::WaitDuration { seconds: self.default_wait_secs });
        }
        None
    }
}

/// Drop list numbering and trailing punctuation
pub fn normalize(text: &str) -> &str {
    let text = text.trim();
    let text = match NUMBERING_RE.find(text) {
        Some(m) => &text[m.end()..],
        None => text,
    };
    text.trim_end_matches(&['.', ';', '!'][..]).trim()
}

/// Leading quoted segment of `s`, running to the last matching closing quote.
///
/// Substituted values may carry the author's quote character, so the span is
/// outermost rather than first-closing.
fn quoted_span(s: &str) -> Option<&str> {
    let open = s.chars().next()?;
    let close = match open {
        '"' | '\'' => open,
        '“' => '”',
        '‘' => '’',
        _ => return None,
    };
    let end = s[open.len_utf8()..].rfind(close)? + open.len_utf8();
    Some(&s[..end + close.len_utf8()])
}

/// Extract a target operand.
///
/// Order: the whole text as a locator, the whole text as one quoted span, a
/// quoted locator, an unquoted locator after filler words, the first quoted
/// segment, then the raw text.
fn operand(raw: &str) -> TargetSpec {
    let raw = raw.trim();

    let whole = TargetSpec::parse(raw);
    if whole.is_explicit() {
        return whole;
    }

    if quoted_span(raw) == Some(raw) {
        return whole;
    }

    if let Some(locator) = QUOTED_RE
        .find_iter(raw)
        .map(|m| TargetSpec::parse(m.as_str()))
        .find(TargetSpec::is_explicit)
    {
        return locator;
    }

    if let Some(caps) = EXPLICIT_RE.captures(raw) {
        return TargetSpec::parse(&caps["locator"]);
    }

    if let Some(m) = QUOTED_RE.find(raw) {
        return TargetSpec::parse(m.as_str());
    }

    TargetSpec::Implied(raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn implied(s: &str) -> TargetSpec {
        TargetSpec::Implied(s.to_string())
    }

    fn explicit(s: &str) -> TargetSpec {
        TargetSpec::Explicit(s.to_string())
    }

    fn classify(text: &str) -> Action {
        Classifier::default().classify(text)
    }

    #[test_case("Navigate to https://x.test/", "https://x.test/" ; "absolute")]
    #[test_case("Go to /login", "/login" ; "relative path")]
    #[test_case("Visit example.com/docs", "https://example.com/docs" ; "bare domain")]
    #[test_case("Open the page 'https://x.test/a?b=1'", "https://x.test/a?b=1" ; "quoted")]
    fn test_navigate(text: &str, url: &str) {
        assert_eq!(classify(text), Action::Navigate { url: url.to_string() });
    }

    #[test_case("Click \"Submit\"", implied("\"Submit\"") ; "quoted")]
    #[test_case("Click on the \"Log out\" link", implied("\"Log out\"") ; "quoted inside filler")]
    #[test_case("Tap Continue", implied("Continue") ; "bare")]
    #[test_case("Press css=#go", explicit("css=#go") ; "explicit")]
    #[test_case("Click 'xpath=//button[@id=\"x\"]'", explicit("xpath=//button[@id=\"x\"]") ; "quoted explicit")]
    #[test_case("Double-click 'Row 1'", implied("'Row 1'") ; "double click")]
    #[test_case("Click the \"Save\" button", implied("\"Save\"") ; "quoted inside trailing filler")]
    fn test_click(text: &str, target: TargetSpec) {
        assert_eq!(classify(text), Action::Click { target });
    }

    #[test_case("Type \"bob\" into \"Username\"", "bob", implied("\"Username\"") ; "type into")]
    #[test_case("Enter 'sign in now' in 'Message'", "sign in now", implied("'Message'") ; "value containing keyword")]
    #[test_case("Fill \"Search in page\" with \"rust\"", "rust", implied("\"Search in page\"") ; "fill with")]
    #[test_case("Fill in the Email field with alice@x.test", "alice@x.test", implied("Email field") ; "fill in unquoted")]
    #[test_case("Type \"secret\" into css=#password", "secret", explicit("css=#password") ; "explicit target")]
    #[test_case("Type \"bob\" into the field css=input[name=\"user\"]", "bob", explicit("css=input[name=\"user\"]") ; "explicit target with attribute quotes")]
    #[test_case("Type \"x\" into the box \"css=#notes\"", "x", explicit("css=#notes") ; "quoted explicit after filler")]
    fn test_fill(text: &str, value: &str, target: TargetSpec) {
        assert_eq!(classify(text), Action::Fill { value: value.to_string(), target });
    }

    #[test]
    fn test_explicit_value_is_still_a_literal() {
        assert_eq!(
            classify("Type \"css=.x\" into \"Notes\""),
            Action::Fill {
                value: "css=.x".to_string(),
                target: implied("\"Notes\""),
            }
        );
    }

    #[test]
    fn test_store() {
        assert_eq!(
            classify("Store text from \"h1\" as \"pageTitle\""),
            Action::Store { source: implied("\"h1\""), variable: "pageTitle".to_string() }
        );
        assert_eq!(
            classify("Save the value of css=#total as {total}"),
            Action::Store { source: explicit("css=#total"), variable: "total".to_string() }
        );
    }

    #[test]
    fn test_store_with_bad_variable_name_degrades() {
        assert!(matches!(
            classify("Store text from \"h1\" as \"page title\""),
            Action::Unknown { .. }
        ));
    }

    #[test]
    fn test_conditional_recurses_into_nested_step() {
        assert_eq!(
            classify("If 'Dashboard' visible then Click 'Logout'"),
            Action::Conditional {
                target: implied("'Dashboard'"),
                condition: ConditionKind::Visible,
                then: Box::new(Action::Click { target: implied("'Logout'") }),
            }
        );
        assert_eq!(
            classify("If css=.cookie-banner exists, click \"Accept\""),
            Action::Conditional {
                target: explicit("css=.cookie-banner"),
                condition: ConditionKind::Exists,
                then: Box::new(Action::Click { target: implied("\"Accept\"") }),
            }
        );
    }

    #[test]
    fn test_conditional_precedes_click() {
        // Contains "click" but the conditional pattern must win
        assert!(matches!(
            classify("If \"Save\" is visible then click \"Save\""),
            Action::Conditional { .. }
        ));
    }

    #[test]
    fn test_conditional_depth_is_bounded() {
        let classifier = Classifier::new(1, 1.0);
        let action = classifier.classify("If 'A' visible then if 'B' visible then click 'C'");
        match action {
            Action::Conditional { then, .. } => assert!(matches!(*then, Action::Unknown { .. })),
            other => panic!("expected conditional, got {:?}", other),
        }
    }

    #[test_case("Wait for \"Dashboard\" to appear", implied("\"Dashboard\""), WaitState::Visible ; "appear")]
    #[test_case("Wait until 'Spinner' disappears", implied("'Spinner'"), WaitState::Hidden ; "disappears")]
    #[test_case("Wait for css=#modal to be detached", explicit("css=#modal"), WaitState::Detached ; "explicit detached")]
    #[test_case("Wait for 'Results'", implied("'Results'"), WaitState::Visible ; "no state")]
    fn test_wait_for(text: &str, target: TargetSpec, state: WaitState) {
        assert_eq!(classify(text), Action::WaitFor { target, state });
    }

    #[test_case("Wait 2 seconds", 2.0 ; "seconds")]
    #[test_case("Wait for 500ms", 0.5 ; "millis with for")]
    #[test_case("Pause 1.5 s", 1.5 ; "fractional")]
    #[test_case("Sleep 1 minute", 60.0 ; "minutes")]
    #[test_case("Wait 3", 3.0 ; "no unit")]
    #[test_case("Wait a moment", 1.0 ; "bare wait")]
    fn test_wait_duration(text: &str, seconds: f64) {
        assert_eq!(classify(text), Action::WaitDuration { seconds });
    }

    #[test_case("Verify \"Welcome back\"", implied("\"Welcome back\"") ; "quoted")]
    #[test_case("Check that Dashboard is visible", implied("Dashboard") ; "trailing presence")]
    #[test_case("I should see 'Order placed'", implied("'Order placed'") ; "should see")]
    #[test_case("Total price should be visible", implied("Total price") ; "should be visible")]
    #[test_case("Assert text=Done", explicit("text=Done") ; "explicit")]
    #[test_case("Verify css=.banner is visible", explicit("css=.banner") ; "explicit with is visible")]
    #[test_case("Check that text=Welcome is displayed", explicit("text=Welcome") ; "explicit with is displayed")]
    #[test_case("Verify \"Welcome\" is visible", implied("\"Welcome\"") ; "quoted with is visible")]
    #[test_case("Verify \"Dashboard is visible\"", implied("\"Dashboard is visible\"") ; "fully quoted keeps phrase")]
    #[test_case("Verify \"The \"Best\" Shop\"", implied("\"The \"Best\" Shop\"") ; "nested quotes")]
    fn test_verify(text: &str, target: TargetSpec) {
        assert_eq!(classify(text), Action::Verify { target });
    }

    #[test_case("" ; "empty")]
    #[test_case("   " ; "blank")]
    #[test_case("Hover over the menu" ; "unsupported verb")]
    #[test_case("Type hello" ; "fill without target")]
    #[test_case("Open the menu" ; "open without url")]
    #[test_case("\"\"\" {{{ ]]" ; "garbage")]
    fn test_unrecognized_degrades_to_unknown(text: &str) {
        assert!(matches!(classify(text), Action::Unknown { .. }));
    }

    #[test_case("Wait for the page to load" ; "to load")]
    #[test_case("Wait until page is loaded" ; "is loaded")]
    #[test_case("wait for page to finish loading" ; "finish loading")]
    fn test_page_load(text: &str) {
        assert_eq!(classify(text), Action::WaitForLoad);
    }

    #[test]
    fn test_page_text_wait_is_not_a_load_wait() {
        assert_eq!(
            classify("Wait for \"Page loaded\""),
            Action::WaitFor { target: implied("\"Page loaded\""), state: WaitState::Visible }
        );
    }

    #[test]
    fn test_quoted_span_runs_to_last_matching_quote() {
        assert_eq!(quoted_span("\"a \"b\" c\" tail"), Some("\"a \"b\" c\""));
        assert_eq!(quoted_span("'x'"), Some("'x'"));
        assert_eq!(quoted_span("“curly”"), Some("“curly”"));
        assert_eq!(quoted_span("\"open"), None);
        assert_eq!(quoted_span("plain"), None);
    }

    #[test]
    fn test_numbering_and_punctuation_are_ignored() {
        assert_eq!(
            classify("3. Click \"Submit\"."),
            Action::Click { target: implied("\"Submit\"") }
        );
    }
}
