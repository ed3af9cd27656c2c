//! Failure propagation through sequential and parallel containers

use actions::{
    ActionError, CreateVariables, ErrorKind, Fail, Parallel, Sequence, Sleep, TestAction,
    TestCase,
};
use std::sync::Arc;
use std::time::Duration;
use types::TestContext;

fn branches() -> Vec<Arc<dyn TestAction>> {
    vec![
        Arc::new(Fail::new("A failed")),
        Arc::new(
            Sequence::new(vec![])
                .action(Sleep::new(Duration::from_millis(50)))
                .action(CreateVariables::new().variable("b", "done")),
        ),
        Arc::new(CreateVariables::new().variable("c", "done")),
    ]
}

#[tokio::test(start_paused = true)]
async fn test_sequence_stops_at_first_failure() {
    let context = TestContext::new();
    let err = Sequence::new(branches()).execute(&context).await.unwrap_err();

    assert_eq!(err.to_string(), "A failed");
    assert!(!context.has_variable("b"));
    assert!(!context.has_variable("c"));
}

#[tokio::test(start_paused = true)]
async fn test_parallel_runs_every_branch_and_reports_failure() {
    let context = TestContext::new();
    let err = Parallel::new(branches()).execute(&context).await.unwrap_err();

    assert_eq!(err.to_string(), "A failed");
    assert_eq!(context.variable_str("b").unwrap(), "done");
    assert_eq!(context.variable_str("c").unwrap(), "done");
}

#[tokio::test(start_paused = true)]
async fn test_parallel_failures_are_aggregated() {
    let context = TestContext::new();
    let err = Parallel::new(vec![])
        .action(Fail::new("left"))
        .action(Fail::new("right"))
        .execute(&context)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Aggregate);
    match err {
        ActionError::Aggregate(failures) => assert_eq!(failures.len(), 2),
        other => panic!("unexpected error {:?}", other),
    }
}

#[tokio::test(start_paused = true)]
async fn test_failed_test_case_keeps_partial_trace() {
    let result = TestCase::new("partial")
        .step(CreateVariables::new().variable("x", 1))
        .step(Fail::new("stop here"))
        .step(CreateVariables::new().variable("y", 2))
        .finally_step(CreateVariables::new().variable("cleanup", true))
        .run(&TestContext::new())
        .await;

    assert!(!result.is_success());
    assert_eq!(result.cause.as_deref(), Some("stop here"));
    let traced: Vec<&str> = result.trace.iter().map(|t| t.action.as_str()).collect();
    assert_eq!(traced, vec!["create-variables", "fail", "create-variables"]);
}
