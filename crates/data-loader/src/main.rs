//! data-loader: load quarterly fundamentals and prices per company, compute each
//! ratio, and chart it against share price with its correlation.
//!
//! Usage:
//!   cargo run -p data-loader                         # companies from RATIO_COMPANIES / defaults
//!   cargo run -p data-loader -- --company Apple apple_ds.csv AAPL_Project.csv
//!   cargo run -p data-loader -- --window 20 --align period --output-dir charts
//!   cargo run -p data-loader -- --config ratios.json

use analysis_orchestrator::{run_company, CompanyReport, PipelineOptions};
use anyhow::{Context, Result};
use data_loader::{load_fundamentals, load_prices, AnalysisConfig, CompanyConfig};

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  data-loader [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --company LABEL FUND PRICE  Company label, fundamentals CSV, price CSV (repeatable)");
    eprintln!("  --output-dir DIR            Where charts are written (default: .)");
    eprintln!("  --window N                  Only analyze the trailing N quarters");
    eprintln!("  --align position|period     Join prices by row position or by quarter (default: position)");
    eprintln!("  --config PATH               Load settings from a JSON file instead of the environment");
    eprintln!();
    eprintln!("Environment: RATIO_COMPANIES, RATIO_OUTPUT_DIR, RATIO_WINDOW, RATIO_ALIGNMENT");
}

fn process_company(company: &CompanyConfig, options: &PipelineOptions) -> Result<CompanyReport> {
    let fundamentals = load_fundamentals(&company.fundamentals_path, &company.label)
        .with_context(|| format!("loading {}", company.fundamentals_path.display()))?;
    let prices = load_prices(&company.price_path)
        .with_context(|| format!("loading {}", company.price_path.display()))?;

    tracing::info!(
        company = %company.label,
        quarters = fundamentals.len(),
        prices = prices.len(),
        "inputs loaded"
    );

    Ok(run_company(fundamentals, &prices, options)?)
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "data_loader=info,analysis_orchestrator=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config = match args.iter().position(|a| a == "--config") {
        Some(idx) => {
            let path = args.get(idx + 1).context("--config expects a path")?;
            AnalysisConfig::from_json_file(path)?
        }
        None => AnalysisConfig::from_env()?,
    };

    if !config.apply_args(&args)? {
        print_usage();
        return Ok(());
    }

    let options = config.pipeline_options();
    tracing::info!(
        "data-loader: {} companies, output_dir={}, window={:?}, alignment={:?}",
        config.companies.len(),
        options.output_dir.display(),
        options.window,
        options.alignment
    );

    let mut failed = Vec::new();
    for company in &config.companies {
        match process_company(company, &options) {
            Ok(report) => {
                tracing::info!(
                    "{} => {} charts, {} skipped over {} quarters",
                    report.company,
                    report.reported.len(),
                    report.skipped.len(),
                    report.quarters
                );
            }
            Err(e) => {
                tracing::error!(company = %company.label, "company failed: {:#}", e);
                failed.push(company.label.clone());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("{} of {} companies failed: {}", failed.len(), config.companies.len(), failed.join(", "));
    }
    Ok(())
}
