//! Namespace diagnostic for scan-result exports.
//!
//! Usage: `cargo run --bin diagnose [SCAN_DIR [BENCHMARK_DIR]]`
//!
//! Reads the same environment as the converter (`.env` included).

use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;
use xccdf_cklb::services::diagnostics::{diagnose, Diagnosis};
use xccdf_cklb::services::ingestion::{discover_scan_sources, FileOutcome};
use xccdf_cklb::{CatalogueCache, ConverterConfig};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "xccdf_cklb=warn".into()))
        .init();

    let config = ConverterConfig::from_env()?.with_args(std::env::args().skip(1));
    let cache = CatalogueCache::build(&config.benchmark_dir, &config.extract);
    let sources = discover_scan_sources(&config.scan_results_dir)?;

    let mut seen = 0usize;
    for source in &sources {
        source.for_each_document(&config.extract, |read| match read {
            Ok(document) => {
                seen += 1;
                print_diagnosis(&diagnose(&document.name, &document.data, &cache));
            }
            Err(report) => {
                if let FileOutcome::Failed { reason } = &report.outcome {
                    println!("Could not read {}: {reason}", report.source);
                }
            }
        });
    }
    if seen == 0 {
        println!("No XML files found in {}", config.scan_results_dir.display());
    }
    Ok(())
}

fn print_diagnosis(d: &Diagnosis) {
    println!("{}", "=".repeat(80));
    println!("Analyzing: {}", d.source);
    println!("{}", "=".repeat(80));

    println!("Root element: {}", d.root_element);
    match &d.root_namespace {
        Some(uri) => println!("Namespace: {uri} ({})", d.namespace),
        None => println!("No namespace on root element ({})", d.namespace),
    }
    match d.embedded_rules {
        Some(rules) => println!("Embedded Benchmark with {rules} rules"),
        None => println!("No embedded Benchmark"),
    }

    if !d.has_test_result {
        println!("No TestResult found: {}", d.error.as_deref().unwrap_or("unknown"));
        println!();
        return;
    }

    match (&d.reference_href, &d.reference_id) {
        (None, None) => println!("No benchmark reference in TestResult"),
        (href, id) => {
            println!("Benchmark reference:");
            println!("  href: {}", href.as_deref().unwrap_or(""));
            println!("  id:   {}", id.as_deref().unwrap_or(""));
        }
    }

    println!("Found {} rule results", d.rule_results);
    for (i, (rule_id, result)) in d.samples.iter().enumerate() {
        println!("  {}. {rule_id} -> {result}", i + 1);
    }

    if let Some(check) = &d.catalogue {
        println!("Looking for: {}", check.key);
        if !check.found {
            println!("  Not in catalogue cache; checklist will carry placeholder metadata");
        } else {
            if let Some(ns) = check.namespace {
                let note = if check.namespace_mismatch { " (differs from scan, handled)" } else { "" };
                println!("  Found, namespace {ns}{note}");
            }
            println!("  {} rules", check.rules);
            println!(
                "  Sample rule: check {} chars, fix {} chars{}",
                check.sample_check_chars,
                check.sample_fix_chars,
                if check.has_details() { "" } else { " (details missing)" }
            );
        }
    }
    println!();
}
