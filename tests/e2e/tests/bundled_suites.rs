//! The suites shipped under `suites/` pass against `config/trellis.toml`

use e2e_tests::{discover_suites, TestFramework};
use framework_config::FrameworkSettings;
use std::path::{Path, PathBuf};

fn root() -> &'static Path {
    Path::new(env!("CARGO_MANIFEST_DIR"))
}

fn framework(report_dir: Option<PathBuf>) -> TestFramework {
    let mut settings = FrameworkSettings::load(Some(&root().join("config/trellis.toml"))).unwrap();
    settings.suite.report_dir = report_dir;
    TestFramework::new(settings).unwrap()
}

#[test]
fn test_discovery_sorts_suite_files() {
    let files = discover_suites(&[root().join("suites")]).unwrap();
    let names: Vec<_> = files
        .iter()
        .filter_map(|f| f.file_name()?.to_str().map(str::to_string))
        .collect();
    assert_eq!(names, vec!["greeting.toml", "orders.toml"]);
}

#[test]
fn test_missing_path_is_rejected() {
    let err = discover_suites(&[root().join("no-such-suites")]).unwrap_err();
    assert!(err.to_string().contains("no-such-suites"));
}

#[tokio::test]
async fn test_bundled_suites_pass_and_write_reports() {
    let reports_dir = tempfile::tempdir().unwrap();
    let framework = framework(Some(reports_dir.path().to_path_buf()));

    let reports = framework.run_all(&[root().join("suites")]).await.unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        for result in &report.results {
            assert!(
                result.is_success(),
                "{}/{} failed: {:?}",
                report.name,
                result.name,
                result.cause
            );
        }
        assert!(reports_dir.path().join(format!("{}.json", report.name)).exists());
    }
}

#[tokio::test]
async fn test_unknown_endpoint_fails_only_its_test() {
    let dir = tempfile::tempdir().unwrap();
    let suite = dir.path().join("broken.toml");
    std::fs::write(
        &suite,
        r#"
name = "broken"

[[tests]]
name = "missing-endpoint"

[[tests.actions]]
action = "send"
endpoint = "nowhere"
payload = "lost"

[[tests]]
name = "still-runs"

[[tests.actions]]
action = "echo"
message = "after the failure"
"#,
    )
    .unwrap();

    let report = framework(None).run_suite(&suite).await.unwrap();
    assert_eq!(report.failed, 1);
    assert!(report.result("still-runs").unwrap().is_success());
    assert!(report
        .result("missing-endpoint")
        .unwrap()
        .cause
        .as_deref()
        .unwrap()
        .contains("nowhere"));
}
