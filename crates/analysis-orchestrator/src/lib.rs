use analysis_core::{AnalysisError, CorrelationResult, FundamentalsTable, PriceTable};
use fundamental_analysis::{
    attach_price, attach_price_by_period, classify_quarter, slice_window, RatioKind, RatioSpec,
    RATIO_SPECS,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub mod report;
pub use report::{render_report, ReportRequest};

/// How prices are matched to fundamentals rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    /// Row `i` of the price file belongs to row `i` of the fundamentals file.
    #[default]
    Position,
    /// Match on (year, quarter), taking the last price in each quarter.
    Period,
}

impl FromStr for Alignment {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" | "positional" => Ok(Alignment::Position),
            "period" => Ok(Alignment::Period),
            other => Err(AnalysisError::InvalidData(format!(
                "unknown alignment '{}' (expected 'position' or 'period')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineOptions {
    pub output_dir: PathBuf,
    /// Keep only the trailing N quarters after alignment.
    #[serde(default)]
    pub window: Option<usize>,
    #[serde(default)]
    pub alignment: Alignment,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            window: None,
            alignment: Alignment::Position,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RatioReport {
    pub kind: RatioKind,
    pub result: CorrelationResult,
    pub output: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedRatio {
    pub kind: RatioKind,
    pub reason: String,
}

/// Outcome of one company run.
#[derive(Debug, Clone, Serialize)]
pub struct CompanyReport {
    pub company: String,
    pub quarters: usize,
    pub reported: Vec<RatioReport>,
    pub skipped: Vec<SkippedRatio>,
}

/// `<Company>_SharePrice_to_<RatioName>.png`
pub fn report_filename(company_label: &str, spec: &RatioSpec) -> String {
    format!("{}_SharePrice_to_{}.png", company_label, spec.file_stem)
}

/// Align prices, apply the optional window and tag quarter classes.
///
/// Any error here aborts the company: there is nothing useful to report from a
/// misaligned or truncated table.
pub fn prepare_table(
    mut fundamentals: FundamentalsTable,
    prices: &PriceTable,
    options: &PipelineOptions,
) -> Result<FundamentalsTable, AnalysisError> {
    match options.alignment {
        Alignment::Position => attach_price(&mut fundamentals, prices)?,
        Alignment::Period => attach_price_by_period(&mut fundamentals, prices)?,
    }

    let mut table = match options.window {
        Some(n) => slice_window(&fundamentals, n)?,
        None => fundamentals,
    };

    if table.is_empty() {
        return Err(AnalysisError::InsufficientData(format!(
            "{}: no quarters to analyze",
            table.company
        )));
    }

    classify_quarter(&mut table);
    Ok(table)
}

fn run_ratio(
    table: &mut FundamentalsTable,
    spec: &RatioSpec,
    output_dir: &Path,
) -> Result<RatioReport, AnalysisError> {
    let column = spec.apply(table)?;
    let output = output_dir.join(report_filename(&table.company, spec));
    let request = ReportRequest {
        company_label: &table.company,
        human_title: spec.title,
        y_axis_label: spec.y_axis_label,
        console_label: spec.label,
        output_path: &output,
    };
    let result = render_report(table, &column, &request)?;
    Ok(RatioReport {
        kind: spec.kind,
        result,
        output,
    })
}

/// Run every ratio for one company.
///
/// Alignment and window errors abort the run. A ratio that is inapplicable or
/// cannot be fitted is logged and skipped; the remaining ratios still run.
pub fn run_company(
    fundamentals: FundamentalsTable,
    prices: &PriceTable,
    options: &PipelineOptions,
) -> Result<CompanyReport, AnalysisError> {
    let mut table = prepare_table(fundamentals, prices, options)?;
    std::fs::create_dir_all(&options.output_dir)?;

    tracing::info!(
        company = %table.company,
        quarters = table.len(),
        alignment = ?options.alignment,
        "running ratio reports"
    );

    let mut reported = Vec::new();
    let mut skipped = Vec::new();

    for spec in RATIO_SPECS.iter() {
        match run_ratio(&mut table, spec, &options.output_dir) {
            Ok(report) => {
                tracing::info!(
                    company = %table.company,
                    ratio = spec.title,
                    correlation = ?report.result.correlation,
                    slope = report.result.slope,
                    intercept = report.result.intercept,
                    "ratio reported"
                );
                reported.push(report);
            }
            Err(e) if e.is_per_ratio() => {
                tracing::warn!(
                    company = %table.company,
                    ratio = spec.title,
                    "skipping ratio: {}",
                    e
                );
                skipped.push(SkippedRatio {
                    kind: spec.kind,
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(CompanyReport {
        company: table.company.clone(),
        quarters: table.len(),
        reported,
        skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{fields, FundamentalsRecord, PricePoint};
    use chrono::NaiveDate;

    fn company_table(quarters: usize, inventory: impl Fn(usize) -> f64) -> FundamentalsTable {
        let records = (0..quarters)
            .map(|i| {
                let f = i as f64;
                FundamentalsRecord::new(format!("{}Q{}", 2010 + i / 4, i % 4 + 1))
                    .with_value(fields::CURRENT_ASSETS, 100.0 + 10.0 * f)
                    .with_value(fields::CURRENT_LIABILITIES, 50.0 + 2.0 * f)
                    .with_value(fields::NET_INCOME, 10.0 + f)
                    .with_value(fields::TOTAL_ASSETS, 400.0 + 5.0 * f)
                    .with_value(fields::SHAREHOLDER_EQUITY, 200.0 + 3.0 * f)
                    .with_value(fields::NET_SALES, 80.0 + 4.0 * f)
                    .with_value(fields::COST_OF_GOODS_SOLD, 40.0 + 2.0 * f)
                    .with_value(fields::INVENTORY, inventory(i))
                    .with_value(fields::TOTAL_LIABILITIES, 200.0 + 7.0 * f)
                    .with_value(fields::OPERATING_CASH_FLOW, 30.0 + f)
                    .with_value(fields::INVESTING_CASH_FLOW, -10.0)
                    .with_value(fields::FINANCING_CASH_FLOW, -5.0 - f)
                    .with_value(fields::CAPITAL_EXPENDITURES, 5.0 + 0.5 * f)
                    .with_value(fields::RESEARCH_AND_DEVELOPMENT, 3.0 + 0.25 * f)
            })
            .collect();
        FundamentalsTable::new("Test", records)
    }

    fn price_table(quarters: usize) -> PriceTable {
        let start = NaiveDate::from_ymd_opt(2010, 3, 31).unwrap();
        PriceTable::new(
            (0..quarters)
                .map(|i| PricePoint {
                    date: start + chrono::Months::new(3 * i as u32),
                    close: Some(20.0 + (i as f64) * 1.5 + if i % 2 == 0 { 0.7 } else { 0.0 }),
                })
                .collect(),
        )
    }

    #[test]
    fn test_alignment_from_str() {
        assert_eq!("position".parse::<Alignment>().unwrap(), Alignment::Position);
        assert_eq!("Period".parse::<Alignment>().unwrap(), Alignment::Period);
        assert!("rows".parse::<Alignment>().is_err());
    }

    #[test]
    fn test_report_filename() {
        let spec = RatioKind::CashFlowToCapex.spec();
        assert_eq!(report_filename("Apple", spec), "Apple_SharePrice_to_CFCapEX.png");
    }

    #[test]
    fn test_misaligned_input_aborts_before_ratios() {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let err = run_company(company_table(84, |_| 10.0), &price_table(80), &options).unwrap_err();
        assert!(matches!(err, AnalysisError::MisalignedSeries(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_window_larger_than_history_is_range_error() {
        let options = PipelineOptions {
            window: Some(20),
            ..Default::default()
        };
        let err = prepare_table(company_table(8, |_| 10.0), &price_table(8), &options).unwrap_err();
        assert!(matches!(err, AnalysisError::Range { requested: 20, available: 8 }));
    }

    #[test]
    fn test_prepare_table_windows_after_alignment() {
        let options = PipelineOptions {
            window: Some(4),
            alignment: Alignment::Period,
            ..Default::default()
        };
        let table = prepare_table(company_table(8, |_| 10.0), &price_table(8), &options).unwrap();
        assert_eq!(table.len(), 4);
        assert_eq!(table.records()[0].period_id, "2011Q1");
        assert_eq!(table.stock_prices()[0], price_table(8).points[4].close);
        assert!(table.records().iter().all(|r| r.quarter_class.is_some()));
    }

    #[test]
    fn test_all_zero_inventory_skips_only_that_ratio() {
        let mut table =
            prepare_table(company_table(8, |_| 0.0), &price_table(8), &PipelineOptions::default()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = run_ratio(&mut table, RatioKind::InventoryTurnover.spec(), dir.path()).unwrap_err();
        assert!(matches!(err, AnalysisError::InsufficientData(_)));
        assert!(err.is_per_ratio());
        assert!(!table.has_column("inventory_turnover"));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_run_company_writes_every_applicable_chart() {
        let dir = tempfile::tempdir().unwrap();
        let options = PipelineOptions {
            output_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut fundamentals = company_table(12, |_| 0.0);
        fundamentals.company = "Google".to_string();

        let report = run_company(fundamentals, &price_table(12), &options).unwrap();
        assert_eq!(report.company, "Google");
        assert_eq!(report.quarters, 12);
        assert_eq!(report.reported.len(), 7);
        let skipped: Vec<RatioKind> = report.skipped.iter().map(|s| s.kind).collect();
        assert_eq!(skipped, vec![RatioKind::InventoryTurnover]);

        let mut written: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        written.sort();
        let mut expected: Vec<String> = RATIO_SPECS
            .iter()
            .filter(|spec| spec.kind != RatioKind::InventoryTurnover)
            .map(|spec| report_filename("Google", spec))
            .collect();
        expected.sort();
        assert_eq!(written, expected);
        assert!(report
            .reported
            .iter()
            .all(|r| r.output.exists() && r.result.observations > 0));
    }

    #[test]
    fn test_constant_ratio_correlation_is_undefined() {
        let table = FundamentalsTable::new(
            "Test",
            [100.0, 150.0, 120.0, 200.0]
                .iter()
                .zip([50.0, 75.0, 60.0, 100.0])
                .enumerate()
                .map(|(i, (a, l))| {
                    FundamentalsRecord::new(format!("2020Q{}", i + 1))
                        .with_value(fields::CURRENT_ASSETS, *a)
                        .with_value(fields::CURRENT_LIABILITIES, l)
                })
                .collect(),
        );
        let mut table = prepare_table(table, &price_table(4), &PipelineOptions::default()).unwrap();
        let column = RatioKind::CurrentRatio.spec().apply(&mut table).unwrap();
        assert_eq!(column.values, vec![Some(2.0); 4]);
        let result = quant_analysis::correlate(&table.stock_prices(), &column.values).unwrap();
        assert!(result.correlation.is_none());
    }
}
