//! Suite discovery, endpoint wiring and report output

use actions::{ActionRegistry, LoggingTestListener, SuiteReport, TestSuite, TestSuiteDefinition};
use anyhow::{bail, Context, Result};
use endpoint::EndpointFactory;
use framework_config::FrameworkSettings;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};
use types::ReferenceResolver;

/// Runs TOML suites against the endpoints declared in the settings
///
/// All suites share one reference resolver, so endpoints bound once are
/// visible to every test case.
pub struct TestFramework {
    settings: FrameworkSettings,
    registry: ActionRegistry,
    resolver: ReferenceResolver,
    endpoints: EndpointFactory,
}

impl TestFramework {
    pub fn new(settings: FrameworkSettings) -> Result<Self> {
        let resolver = ReferenceResolver::new();
        let endpoints = EndpointFactory::new();
        endpoints
            .bind_all(&settings, &resolver)
            .context("Failed to create endpoints")?;

        Ok(Self {
            settings,
            registry: ActionRegistry::new(),
            resolver,
            endpoints,
        })
    }

    pub fn from_settings_file(path: Option<&Path>) -> Result<Self> {
        Self::new(FrameworkSettings::load(path)?)
    }

    pub fn settings(&self) -> &FrameworkSettings {
        &self.settings
    }

    /// Actions available to suites; custom actions are registered here
    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn resolver(&self) -> &ReferenceResolver {
        &self.resolver
    }

    pub fn endpoints(&self) -> &EndpointFactory {
        &self.endpoints
    }

    pub fn load_suite(&self, path: &Path) -> Result<TestSuite> {
        let definition = TestSuiteDefinition::load(path)?;
        let suite = TestSuite::from_definition(&definition, &self.registry, &self.settings)
            .with_context(|| format!("Invalid test suite {}", path.display()))?;
        Ok(suite
            .with_resolver(self.resolver.clone())
            .listener(Arc::new(LoggingTestListener)))
    }

    pub async fn run_suite(&self, path: &Path) -> Result<SuiteReport> {
        let suite = self.load_suite(path)?;
        let report = suite.run().await;

        if let Some(dir) = &self.settings.suite.report_dir {
            let written = report.write_to(dir)?;
            info!("Report written to {}", written.display());
        }
        Ok(report)
    }

    /// Run every suite found under `paths`, in file name order
    pub async fn run_all(&self, paths: &[PathBuf]) -> Result<Vec<SuiteReport>> {
        let files = discover_suites(paths)?;
        if files.is_empty() {
            bail!("No test suites found");
        }

        let mut reports = Vec::with_capacity(files.len());
        for file in &files {
            reports.push(self.run_suite(file).await?);
        }
        Ok(reports)
    }
}

/// Expand directories into the `.toml` files they contain
pub fn discover_suites(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(path)
                .with_context(|| format!("Failed to read suite directory {}", path.display()))?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().map_or(false, |ext| ext == "toml"))
                .collect();
            found.sort();
            debug!("Found {} suites in {}", found.len(), path.display());
            files.extend(found);
        } else if path.is_file() {
            files.push(path.clone());
        } else {
            bail!("Test suite path not found: {}", path.display());
        }
    }
    Ok(files)
}
