use std::process::ExitCode;

use mimalloc::MiMalloc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use xccdf_cklb::services::ingestion::FileOutcome;
use xccdf_cklb::{run_batch, ConverterConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "xccdf_cklb=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().compact()).init();
    }
}

fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = ConverterConfig::from_env()?.with_args(std::env::args().skip(1));
    tracing::info!(
        scans = %config.scan_results_dir.display(),
        benchmarks = %config.benchmark_dir.display(),
        output = %config.output_dir.display(),
        "Starting XCCDF to CKLB conversion"
    );

    let report = run_batch(&config)?;

    println!("=== Conversion summary ===");
    println!("Catalogues loaded: {}", report.catalogues_loaded);
    for file in &report.files {
        match &file.outcome {
            FileOutcome::Converted(c) => {
                let note = match (c.resolved, c.missing_reference.as_deref()) {
                    (true, _) if c.unmatched > 0 => format!(" ({} rules without metadata)", c.unmatched),
                    (true, _) => String::new(),
                    (false, Some(missing)) => format!(" (benchmark {missing} not found)"),
                    (false, None) => " (no benchmark)".to_string(),
                };
                println!(
                    "[done] {} -> {}{}\n       Open: {}  NotAFinding: {}  NotApplicable: {}  NotReviewed: {}",
                    file.source,
                    c.output.display(),
                    note,
                    c.tally.open,
                    c.tally.not_a_finding,
                    c.tally.not_applicable,
                    c.tally.not_reviewed,
                );
            }
            FileOutcome::Skipped { reason } => println!("[skip] {}: {reason}", file.source),
            FileOutcome::Failed { reason } => println!("[fail] {}: {reason}", file.source),
        }
    }
    println!(
        "Processed: {}  Skipped: {}  Failed: {}",
        report.processed(),
        report.skipped(),
        report.failed()
    );

    Ok(if report.failed() > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
