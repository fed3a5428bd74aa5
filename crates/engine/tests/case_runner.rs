//! Case runner behavior against a scripted page
//!
//! Run with: cargo test --package stepwise-engine --test case_runner

mod support;

use std::sync::Arc;
use std::time::Duration;

use stepwise_common::{
    CaseStatus, CaseTermination, EngineConfig, StepNote, StepStatus, TestCase,
};
use stepwise_engine::{CandidateResolver, CaseRunner, SelectorResolver};
use support::{quiet_config, Behavior, CountingResolver, FakePage};

fn case(steps: &[&str]) -> TestCase {
    TestCase::new("case-1", steps.iter().map(|s| s.to_string()).collect())
}

fn runner(config: &EngineConfig) -> CaseRunner {
    let resolver: Arc<dyn SelectorResolver> = Arc::new(CandidateResolver::new(&config.resolver));
    CaseRunner::new(config, resolver, "run-1", "https://x.test/")
}

#[tokio::test]
async fn every_step_passing_completes_the_case() {
    let page = FakePage::new();
    let config = quiet_config();
    let tc = case(&[
        "Navigate to https://x.test/",
        "Type \"bob\" into \"Username\"",
        "Click \"Submit\"",
    ]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert_eq!(result.status, CaseStatus::Pass);
    assert_eq!(result.termination, CaseTermination::Completed);
    assert_eq!(result.steps.len(), 3);
    assert!(result.steps.iter().all(|s| s.status == StepStatus::Pass));
    assert_eq!(result.summary.passed, 3);
    assert_eq!(
        page.calls(),
        vec![
            "goto:https://x.test/",
            "fill:[placeholder=\"Username\"]",
            "click:role=button[name=\"Submit\"]",
        ]
    );
}

#[tokio::test]
async fn resolution_failure_aborts_remaining_steps() {
    let page = FakePage::new();
    page.fail("click", "*");
    let config = quiet_config();
    let tc = case(&[
        "Navigate to https://x.test/",
        "Click \"Missing\"",
        "Type \"x\" into \"Name\"",
        "Click \"Done\"",
    ]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert_eq!(result.status, CaseStatus::Fail);
    assert_eq!(result.termination, CaseTermination::Aborted);
    assert_eq!(result.steps.len(), 2);
    assert_eq!(result.steps[0].status, StepStatus::Pass);
    assert_eq!(result.steps[1].status, StepStatus::Fail);

    let message = result.steps[1].error.as_deref().unwrap();
    assert_eq!(message, "Could not find element to click: \"Missing\"");
    assert!(!message.contains("role="));

    assert!(page.calls_to("fill").is_empty());
    assert!(page.calls_to("click").iter().all(|c| c.contains("Missing")));
}

#[tokio::test(start_paused = true)]
async fn case_deadline_keeps_completed_steps() {
    let page = FakePage::new();
    let mut config = quiet_config();
    config.execution.case_timeout_secs = 5;
    let tc = case(&[
        "Wait 2 seconds",
        "Wait 2 seconds",
        "Wait 2 seconds",
        "Wait 2 seconds",
    ]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert_eq!(result.termination, CaseTermination::TimedOut);
    assert_eq!(result.status, CaseStatus::Fail);
    assert_eq!(result.steps.len(), 2);
    assert!(result.steps.iter().all(|s| s.is_pass()));
    assert_eq!(result.summary.total, 4);
    assert!(result.error.as_deref().unwrap().contains("5s deadline"));
}

#[tokio::test(start_paused = true)]
async fn slow_engine_call_is_abandoned_at_the_deadline() {
    let page = FakePage::new();
    page.rule("click", "*", Behavior::Delay(Duration::from_secs(3600)));
    let mut config = quiet_config();
    config.execution.case_timeout_secs = 2;
    config.execution.candidate_timeout_ms = 60_000;
    let tc = case(&["Navigate to /home", "Click \"Stuck\""]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert_eq!(result.termination, CaseTermination::TimedOut);
    assert_eq!(result.steps.len(), 1);
    assert_eq!(page.calls_to("goto"), vec!["goto:https://x.test/home"]);
}

#[tokio::test]
async fn stored_value_feeds_later_steps() {
    let page = FakePage::new();
    page.text("css=h1", "  Welcome back \n");
    let config = quiet_config();
    let tc = case(&[
        "Store text from \"h1\" as \"pageTitle\"",
        "Verify \"{pageTitle}\"",
    ]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(result.steps[1].description, "Verify \"Welcome back\"");
    assert_eq!(page.calls_to("wait_for"), vec!["wait_for:text=Welcome back"]);
}

#[tokio::test]
async fn variables_do_not_leak_between_cases() {
    let page = FakePage::new();
    page.text("css=h1", "First");
    let config = quiet_config();
    let runner = runner(&config);

    let first = case(&["Store text from \"h1\" as \"title\""]);
    let second = case(&["Verify \"{title}\""]);
    runner.run(&first, page.as_ref()).await;
    let result = runner.run(&second, page.as_ref()).await;

    assert_eq!(result.steps[0].description, "Verify \"{title}\"");
}

#[tokio::test]
async fn third_candidate_succeeds_after_two_misses() {
    let page = FakePage::new();
    page.fail("click", "role=button[name=\"Next\"]")
        .fail("click", "role=link[name=\"Next\"]");
    let config = quiet_config();

    let result = runner(&config).run(&case(&["Click \"Next\""]), page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(
        page.calls_to("click"),
        vec![
            "click:role=button[name=\"Next\"]",
            "click:role=link[name=\"Next\"]",
            "click:text=\"Next\"",
        ]
    );
}

#[tokio::test]
async fn explicit_locators_bypass_the_resolver() {
    let page = FakePage::new();
    let config = quiet_config();
    let resolver = CountingResolver::new();
    let runner = CaseRunner::new(&config, resolver.clone(), "run-1", "https://x.test/");
    let tc = case(&[
        "Click \"css=#submit\"",
        "Type \"q\" into \"css=#search\"",
        "Verify \"text=Done\"",
    ]);

    let result = runner.run(&tc, page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(resolver.count(), 0);
    assert_eq!(
        page.calls(),
        vec!["click:css=#submit", "fill:css=#search", "wait_for:text=Done"]
    );
}

#[tokio::test]
async fn false_condition_skips_nested_action() {
    let page = FakePage::new();
    page.fail("wait_for", "*");
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["If \"Cookie banner\" visible then click \"Accept\""]), page.as_ref())
        .await;

    assert!(result.is_pass());
    assert_eq!(result.steps[0].note, Some(StepNote::ConditionNotMet));
    assert!(page.calls_to("click").is_empty());
}

#[tokio::test]
async fn true_condition_runs_nested_action() {
    let page = FakePage::new();
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["If \"Cookie banner\" visible then click \"Accept\""]), page.as_ref())
        .await;

    assert!(result.is_pass());
    assert_eq!(result.steps[0].note, None);
    assert_eq!(page.calls_to("click"), vec!["click:role=button[name=\"Accept\"]"]);
}

#[tokio::test]
async fn unrecognized_step_is_a_marked_pass() {
    let page = FakePage::new();
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["Do a barrel roll"]), page.as_ref())
        .await;

    assert!(result.is_pass());
    assert_eq!(result.steps[0].note, Some(StepNote::Unrecognized));
    assert!(page.calls().is_empty());
}

#[tokio::test]
async fn wait_for_timeout_names_the_hint() {
    let page = FakePage::new();
    page.fail("wait_for", "*");
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["Wait for \"Spinner\" to disappear"]), page.as_ref())
        .await;

    let message = result.steps[0].error.as_deref().unwrap();
    assert!(message.starts_with("Timed out after"), "{}", message);
    assert!(message.contains("\"Spinner\""), "{}", message);
}

#[tokio::test]
async fn network_entries_are_scoped_to_their_step() {
    let page = FakePage::new();
    page.respond_on_click("role=button[name=\"Save\"]", "https://x.test/api/save")
        .respond_on_click("role=button[name=\"Next\"]", "https://x.test/api/next");
    let mut config = quiet_config();
    config.evidence.capture_network = true;

    let result = runner(&config)
        .run(&case(&["Click \"Save\"", "Click \"Next\""]), page.as_ref())
        .await;

    let urls = |i: usize| -> Vec<String> {
        result.steps[i]
            .network
            .as_ref()
            .unwrap()
            .iter()
            .map(|e| e.url.clone())
            .collect()
    };
    assert_eq!(urls(0), vec!["https://x.test/api/save"]);
    assert_eq!(urls(1), vec!["https://x.test/api/next"]);
    assert!(!page.is_capturing());
}

#[tokio::test]
async fn screenshots_are_attached_to_passing_and_failing_steps() {
    let page = FakePage::new();
    page.fail("click", "*");
    let out = tempfile::tempdir().unwrap();
    let mut config = quiet_config();
    config.evidence.capture_screenshots = true;
    config.evidence.output_dir = out.path().to_path_buf();

    let result = runner(&config)
        .run(&case(&["Navigate to /", "Click \"Gone\""]), page.as_ref())
        .await;

    assert_eq!(result.steps.len(), 2);
    for step in &result.steps {
        let shot = step.screenshot.as_ref().unwrap();
        assert!(shot.path.starts_with(out.path().join("run-1").join("case-1")));
        assert!(shot.path.exists());
    }
    assert!(result.steps[1].is_fail());
}

#[tokio::test]
async fn screenshot_failure_does_not_fail_the_step() {
    let page = FakePage::new();
    page.fail("screenshot", "page");
    let out = tempfile::tempdir().unwrap();
    let mut config = quiet_config();
    config.evidence.capture_screenshots = true;
    config.evidence.output_dir = out.path().to_path_buf();

    let result = runner(&config)
        .run(&case(&["Click \"Save\""]), page.as_ref())
        .await;

    assert!(result.is_pass());
    assert!(result.steps[0].screenshot.is_none());
}

#[tokio::test]
async fn progress_reports_pending_then_final() {
    let page = FakePage::new();
    let config = quiet_config();
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let runner = runner(&config).with_progress(tx);

    runner
        .run(&case(&["Click \"A\"", "Click \"B\""]), page.as_ref())
        .await;

    let mut statuses = Vec::new();
    while let Ok(event) = rx.try_recv() {
        assert_eq!(event.case_id, "case-1");
        statuses.push((event.result.index, event.result.status));
    }
    assert_eq!(
        statuses,
        vec![
            (0, StepStatus::Pending),
            (0, StepStatus::Pass),
            (1, StepStatus::Pending),
            (1, StepStatus::Pass),
        ]
    );
}

#[tokio::test]
async fn disconnected_engine_is_an_engine_failure() {
    let page = FakePage::new();
    page.rule("click", "*", Behavior::Disconnect);
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["Click \"Save\"", "Click \"Next\""]), page.as_ref())
        .await;

    assert_eq!(result.steps.len(), 1);
    assert!(result.steps[0]
        .error
        .as_deref()
        .unwrap()
        .starts_with("Browser error"));
    assert_eq!(page.calls_to("click").len(), 1);
}

#[tokio::test]
async fn empty_case_passes() {
    let page = FakePage::new();
    let config = quiet_config();

    let result = runner(&config).run(&case(&[]), page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(result.termination, CaseTermination::Completed);
    assert!(result.steps.is_empty());
}

#[tokio::test]
async fn explicit_locator_with_attribute_quotes_bypasses_the_resolver() {
    let page = FakePage::new();
    let config = quiet_config();
    let resolver = CountingResolver::new();
    let runner = CaseRunner::new(&config, resolver.clone(), "run-1", "https://x.test/");
    let tc = case(&[
        "Type \"bob\" into the field css=input[name=\"user\"]",
        "Verify css=.banner is visible",
    ]);

    let result = runner.run(&tc, page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(resolver.count(), 0);
    assert_eq!(
        page.calls(),
        vec!["fill:css=input[name=\"user\"]", "wait_for:css=.banner"]
    );
}

#[tokio::test]
async fn stored_value_with_quotes_is_verified_whole() {
    let page = FakePage::new();
    page.text("css=h1", "The \"Best\" Shop");
    let config = quiet_config();
    let tc = case(&[
        "Store text from \"h1\" as \"title\"",
        "Verify \"{title}\"",
    ]);

    let result = runner(&config).run(&tc, page.as_ref()).await;

    assert!(result.is_pass());
    assert_eq!(page.calls_to("wait_for"), vec!["wait_for:text=The \"Best\" Shop"]);
}

#[tokio::test]
async fn page_load_wait_uses_the_load_event() {
    let page = FakePage::new();
    let config = quiet_config();

    let result = runner(&config)
        .run(&case(&["Wait for the page to load"]), page.as_ref())
        .await;

    assert!(result.is_pass());
    assert_eq!(page.calls(), vec!["wait_for_load:load"]);
}
