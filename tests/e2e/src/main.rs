//! Trellis suite runner

use actions::SuiteReport;
use anyhow::Result;
use clap::Parser;
use e2e_tests::{init_tracing, TestFramework};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Suite files or directories containing them
    #[arg(required = true)]
    suites: Vec<PathBuf>,

    /// Framework settings file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Test cases run at the same time within a suite
    #[arg(long)]
    concurrency: Option<usize>,

    /// Directory receiving one JSON report per suite
    #[arg(short, long)]
    report_dir: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose)?;

    info!("Starting Trellis {}", env!("CARGO_PKG_VERSION"));

    let mut settings = framework_config::load_settings(args.config.as_deref())?;
    if let Some(concurrency) = args.concurrency {
        settings.suite.concurrency = concurrency.max(1);
    }
    if args.report_dir.is_some() {
        settings.suite.report_dir = args.report_dir;
    }

    let framework = TestFramework::new(settings)?;
    let reports = framework.run_all(&args.suites).await?;
    print_summary(&reports);

    if reports.iter().all(SuiteReport::is_success) {
        info!("All tests passed");
        Ok(())
    } else {
        error!("Some tests failed");
        std::process::exit(1);
    }
}

fn print_summary(reports: &[SuiteReport]) {
    println!("\n═══════════════════════════════════════");
    println!("        TEST RESULTS SUMMARY");
    println!("═══════════════════════════════════════");

    for report in reports {
        println!(
            "{}: {} passed, {} failed ({} ms)",
            report.name, report.passed, report.failed, report.duration_ms
        );
        for result in &report.results {
            let status = if result.is_success() { "✓ PASS" } else { "✗ FAIL" };
            println!("  {} {} ({} ms)", status, result.name, result.duration_ms);
            if let Some(cause) = &result.cause {
                println!("      Error: {}", cause);
            }
        }
        println!();
    }

    let total: usize = reports.iter().map(|r| r.total).sum();
    let failed: usize = reports.iter().map(|r| r.failed).sum();
    println!("Total Tests: {}", total);
    println!("Passed:      {} ✓", total - failed);
    println!("Failed:      {} ✗", failed);
    println!("═══════════════════════════════════════");
}
