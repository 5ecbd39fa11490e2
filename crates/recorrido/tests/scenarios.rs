//! End-to-end booking journey scenarios over the scripted page driver.
//!
//! These exercise the full stack (flow -> runner -> executor -> driver ->
//! reporter) without a browser process, using paused tokio time so
//! timeouts and retry backoffs resolve instantly.

use recorrido::booking;
use recorrido::{
    BrowserSession, ErrorKind, Flow, FlowRunner, FlowStep, PageDriver, Reporter, RunOptions,
    RunStatus, ScriptedPage, SessionConfig, StepOutcome,
};
use std::sync::Arc;

fn session_over(page: Arc<ScriptedPage>) -> BrowserSession {
    BrowserSession::with_driver(SessionConfig::default(), page)
}

/// A page where the whole cash booking journey succeeds
fn happy_booking_page() -> ScriptedPage {
    ScriptedPage::new()
        .with_element("[data-service='90min']", "90 minutes")
        .with_element(".date-picker .available", "Mon 14")
        .with_element(".time-slot", "09:00")
        .with_element("[data-payment='cash']", "Cash")
        .with_element("#confirm-booking", "Confirm booking")
        .with_click_effect("#confirm-booking", ".thank-you-message", "Thank you!")
}

#[tokio::test(start_paused = true)]
async fn cash_booking_happy_path_passes_every_step() {
    let dir = tempfile::tempdir().unwrap();
    let page = Arc::new(happy_booking_page());
    let session = session_over(page.clone());
    let flow = booking::booking_flow("cash");

    let run = FlowRunner::new()
        .with_reporter(Reporter::new(dir.path()))
        .run(&flow, &session)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Passed);
    assert_eq!(run.steps.len(), 6);
    assert!(run.steps.iter().all(|r| r.outcome == StepOutcome::Passed));
    let names: Vec<_> = run.steps.iter().map(|r| r.step.name.as_str()).collect();
    assert_eq!(
        names,
        [
            "select-service",
            "pick-next-available-date",
            "pick-first-time-slot",
            "fill-contact",
            "select-payment",
            "confirm"
        ]
    );

    // The confirm click really happened and the thank-you node appeared
    assert!(page.clicks().contains(&"#confirm-booking".to_string()));
    assert!(page.element_exists(".thank-you-message").await.unwrap());

    // No failures, no screenshots
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(session.is_closed());

    let summary = Reporter::summarize(&run);
    assert_eq!(summary.passed, 6);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.skipped, 0);
    assert!(summary.failures.is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_time_slot_fails_after_retries_and_skips_the_rest() {
    let dir = tempfile::tempdir().unwrap();
    // Slots never render: no ".time-slot" and no ".time-slots button"
    let page = Arc::new(
        ScriptedPage::new()
            .with_element("[data-service='90min']", "90 minutes")
            .with_element(".date-picker .available", "Mon 14"),
    );
    let session = session_over(page.clone());
    let flow = booking::booking_flow("cash");

    let run = FlowRunner::new()
        .with_reporter(Reporter::new(dir.path()))
        .run(&flow, &session)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.steps.len(), 6);
    assert_eq!(run.steps[0].outcome, StepOutcome::Passed);
    assert_eq!(run.steps[1].outcome, StepOutcome::Passed);
    assert_eq!(run.steps[2].outcome, StepOutcome::Failed);
    assert_eq!(run.steps[2].error_kind, Some(ErrorKind::SelectorNotFound));
    assert!(run.steps[3..].iter().all(|r| r.outcome == StepOutcome::Skipped));

    // Retry budget honored: 2 retries = 3 resolution attempts per candidate
    assert_eq!(page.exists_queries(".time-slot"), 3);

    // Exactly one failure screenshot, named after the failing step
    let entries: Vec<_> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries.len(), 1);
    assert!(entries[0].starts_with("booking-cash-pick-first-time-slot-"));
    assert_eq!(
        run.steps[2].screenshot_path.as_deref(),
        Some(dir.path().join(&entries[0]).to_string_lossy().as_ref())
    );

    // Nothing after the failure touched the page
    assert!(page.fills().is_empty());
    assert!(!page.clicks().contains(&"#confirm-booking".to_string()));
    assert!(session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn concurrent_runs_use_independent_sessions() {
    let cash_page = Arc::new(happy_booking_page());
    let card_page = Arc::new(
        happy_booking_page().with_element("[data-payment='credit_card']", "Credit card"),
    );
    let cash_session = session_over(cash_page.clone());
    let card_session = session_over(card_page.clone());

    let cash_flow = booking::booking_flow("cash");
    let card_flow = booking::builtin_flow("booking-credit-card").unwrap();

    let runner_a = FlowRunner::new();
    let runner_b = FlowRunner::new();
    let (cash_run, card_run) = tokio::join!(
        runner_a.run(&cash_flow, &cash_session),
        runner_b.run(&card_flow, &card_session),
    );
    let cash_run = cash_run.unwrap();
    let card_run = card_run.unwrap();

    assert_eq!(cash_run.status, RunStatus::Passed);
    assert_eq!(card_run.status, RunStatus::Passed);
    assert_ne!(cash_run.id, card_run.id);

    // No cross-talk between the sessions' pages
    assert!(cash_page.clicks().contains(&"[data-payment='cash']".to_string()));
    assert!(!cash_page
        .clicks()
        .contains(&"[data-payment='credit_card']".to_string()));
    assert!(card_page
        .clicks()
        .contains(&"[data-payment='credit_card']".to_string()));
    assert!(!card_page.clicks().contains(&"[data-payment='cash']".to_string()));
}

#[tokio::test(start_paused = true)]
async fn closing_the_session_mid_run_aborts_it() {
    let page = Arc::new(
        ScriptedPage::new()
            .with_element("#first", "")
            .with_hanging_element("#second"),
    );
    let session = Arc::new(session_over(page));
    let flow = Flow::new("cancelled")
        .step(FlowStep::click("first", "#first").with_timeout_ms(500))
        .step(FlowStep::click("second", "#second").with_timeout_ms(60_000))
        .step(FlowStep::click("third", "#third").with_timeout_ms(500));

    let run_session = Arc::clone(&session);
    let handle = tokio::spawn(async move {
        FlowRunner::new().run(&flow, &run_session).await.unwrap()
    });

    // Let the run reach the hanging second step, then cancel
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;
    session.close().await;

    let run = handle.await.unwrap();
    assert_eq!(run.status, RunStatus::Aborted);
    assert_eq!(run.steps[0].outcome, StepOutcome::Passed);
    assert_eq!(run.steps[1].outcome, StepOutcome::Failed);
    assert_eq!(run.steps[1].error_kind, Some(ErrorKind::FlowAborted));
    assert_eq!(run.steps[2].outcome, StepOutcome::Skipped);
}

#[tokio::test(start_paused = true)]
async fn flow_file_round_trips_into_a_runnable_flow() {
    let yaml = r##"
version: "1"
name: booking-cash
steps:
  - name: select-service
    action: click
    target: ["[data-service='90min']"]
  - name: confirm
    action: click
    target: "#confirm-booking"
    post_condition:
      type: element_exists
      selector: ".thank-you-message"
"##;
    let flow = recorrido::FlowFile::from_yaml(yaml)
        .unwrap()
        .into_flow()
        .unwrap();
    let page = Arc::new(happy_booking_page());
    let session = session_over(page);

    let run = FlowRunner::new().run(&flow, &session).await.unwrap();
    assert_eq!(run.status, RunStatus::Passed);

    // The exported record survives a JSON round trip intact
    let parsed = Reporter::parse_run(&Reporter::export_json(&run).unwrap()).unwrap();
    assert_eq!(parsed, run);
}

#[tokio::test(start_paused = true)]
async fn continue_on_failure_still_reaches_confirmation() {
    // The payment widget is broken but everything else works; diagnostic
    // runs want to see how far the rest of the journey gets.
    let page = Arc::new(
        ScriptedPage::new()
            .with_element("[data-service='90min']", "90 minutes")
            .with_element(".date-picker .available", "Mon 14")
            .with_element(".time-slot", "09:00")
            .with_element("#confirm-booking", "Confirm booking")
            .with_click_effect("#confirm-booking", ".thank-you-message", "Thank you!"),
    );
    let session = session_over(page);
    let runner = FlowRunner::new().with_options(RunOptions::new().with_continue_on_failure());

    let run = runner
        .run(&booking::booking_flow("cash"), &session)
        .await
        .unwrap();

    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.steps[4].outcome, StepOutcome::Failed);
    assert_eq!(run.steps[5].outcome, StepOutcome::Passed);
    let summary = Reporter::summarize(&run);
    assert_eq!(summary.passed, 5);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
}
