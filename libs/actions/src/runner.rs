//! Suite runner and reporting

use crate::definition::TestSuiteDefinition;
use crate::registry::ActionRegistry;
use crate::test_case::{TestCase, TestResult};
use crate::ActionError;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use framework_config::FrameworkSettings;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{error, info};
use types::{ReferenceResolver, TestContext};

/// Lifecycle callbacks of a suite run
pub trait TestListener: Send + Sync {
    fn on_suite_start(&self, _suite: &str, _tests: usize) {}

    fn on_test_start(&self, _test: &TestCase) {}

    fn on_test_finish(&self, _result: &TestResult) {}

    fn on_suite_finish(&self, _report: &SuiteReport) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingTestListener;

impl TestListener for LoggingTestListener {
    fn on_suite_start(&self, suite: &str, tests: usize) {
        info!("Running test suite '{}' with {} test cases", suite, tests);
    }

    fn on_test_start(&self, test: &TestCase) {
        info!("TEST STARTED: {}", test.name());
    }

    fn on_test_finish(&self, result: &TestResult) {
        match &result.cause {
            None => info!("TEST SUCCESS: {} ({} ms)", result.name, result.duration_ms),
            Some(cause) => error!(
                "TEST FAILED: {} ({} ms): {}",
                result.name, result.duration_ms, cause
            ),
        }
    }

    fn on_suite_finish(&self, report: &SuiteReport) {
        info!(
            "Test suite '{}' finished: {} passed, {} failed, {} total in {} ms",
            report.name, report.passed, report.failed, report.total, report.duration_ms
        );
    }
}

#[derive(Debug, Serialize)]
pub struct SuiteReport {
    pub name: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub results: Vec<TestResult>,
}

impl SuiteReport {
    fn new(
        name: &str,
        started_at: DateTime<Utc>,
        duration_ms: u64,
        results: Vec<TestResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.is_success()).count();
        Self {
            name: name.to_string(),
            started_at,
            duration_ms,
            total: results.len(),
            passed,
            failed: results.len() - passed,
            results,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }

    pub fn result(&self, test: &str) -> Option<&TestResult> {
        self.results.iter().find(|r| r.name == test)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Write the report as `<dir>/<suite>.json`
    pub fn write_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create report directory {}", dir.display()))?;
        let path = dir.join(format!("{}.json", self.name));
        std::fs::write(&path, self.to_json()?)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        Ok(path)
    }
}

/// Test cases sharing one reference resolver
///
/// Each test case gets a fresh [`TestContext`]; endpoints and validators
/// bound in the resolver are shared. A failing test case never stops the
/// suite.
pub struct TestSuite {
    name: String,
    tests: Vec<TestCase>,
    resolver: ReferenceResolver,
    concurrency: usize,
    listeners: Vec<Arc<dyn TestListener>>,
}

impl TestSuite {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
            resolver: ReferenceResolver::new(),
            concurrency: framework_config::defaults::runner::SUITE_CONCURRENCY,
            listeners: Vec::new(),
        }
    }

    /// Suite built from a definition; definition errors fail before any test runs
    pub fn from_definition(
        definition: &TestSuiteDefinition,
        registry: &ActionRegistry,
        settings: &FrameworkSettings,
    ) -> Result<Self, ActionError> {
        let mut suite =
            Self::new(definition.name.clone()).concurrency(settings.suite.concurrency);
        for test in &definition.tests {
            let mut case = TestCase::from_definition(test, registry)?;
            if test.async_completion_timeout_ms.is_none() {
                case = case.async_completion_timeout(settings.defaults.async_completion_timeout());
            }
            suite.tests.push(case);
        }
        Ok(suite)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn with_resolver(mut self, resolver: ReferenceResolver) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    /// Number of test cases running at the same time, at least one
    pub fn concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn TestListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub async fn run(&self) -> SuiteReport {
        let started_at = Utc::now();
        let started = Instant::now();
        for listener in &self.listeners {
            listener.on_suite_start(&self.name, self.tests.len());
        }

        // A finished test frees its slot at once; results keep definition order
        let mut indexed: Vec<(usize, TestResult)> = stream::iter(self.tests.iter().enumerate())
            .map(|(index, test)| async move { (index, self.run_test(test).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<TestResult> = indexed.into_iter().map(|(_, result)| result).collect();

        let report = SuiteReport::new(
            &self.name,
            started_at,
            started.elapsed().as_millis() as u64,
            results,
        );
        for listener in &self.listeners {
            listener.on_suite_finish(&report);
        }
        report
    }

    async fn run_test(&self, test: &TestCase) -> TestResult {
        for listener in &self.listeners {
            listener.on_test_start(test);
        }
        let context = TestContext::with_resolver(self.resolver.clone());
        let result = test.run(&context).await;
        for listener in &self.listeners {
            listener.on_test_finish(&result);
        }
        result
    }
}
