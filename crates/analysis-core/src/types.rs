use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::AnalysisError;

/// Compustat quarterly field names referenced by the ratio engine.
pub mod fields {
    pub const PERIOD_ID: &str = "datacqtr";
    pub const PERIOD_END: &str = "datadate";

    pub const CURRENT_ASSETS: &str = "actq";
    pub const CURRENT_LIABILITIES: &str = "lctq";
    pub const NET_INCOME: &str = "niq";
    pub const TOTAL_ASSETS: &str = "atq";
    pub const SHAREHOLDER_EQUITY: &str = "seqq";
    pub const NET_SALES: &str = "saleq";
    pub const COST_OF_GOODS_SOLD: &str = "cogsq";
    pub const INVENTORY: &str = "invtq";
    pub const TOTAL_LIABILITIES: &str = "ltq";
    pub const OPERATING_CASH_FLOW: &str = "oancfy";
    pub const INVESTING_CASH_FLOW: &str = "ivncfy";
    pub const FINANCING_CASH_FLOW: &str = "fincfy";
    pub const CAPITAL_EXPENDITURES: &str = "capxy";
    pub const RESEARCH_AND_DEVELOPMENT: &str = "xrdq";

    /// Appended by the series aligner.
    pub const STOCK_PRICE: &str = "stock_price";
}

/// Marker in the period identifier that flags the annual-filing (10-K) quarter.
pub const ANNUAL_FILING_MARKER: &str = "Q4";

/// Calendar/fiscal quarter key, e.g. `2020Q3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FiscalPeriod {
    pub year: i32,
    pub quarter: u8,
}

impl FiscalPeriod {
    pub fn new(year: i32, quarter: u8) -> Option<Self> {
        if (1..=4).contains(&quarter) {
            Some(Self { year, quarter })
        } else {
            None
        }
    }

    /// Parse a Compustat-style identifier (`2000Q1`).
    pub fn parse(id: &str) -> Option<Self> {
        let (year, quarter) = id.trim().split_once('Q')?;
        Self::new(year.parse().ok()?, quarter.parse().ok()?)
    }

    /// Calendar quarter containing `date`.
    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            quarter: ((date.month() - 1) / 3 + 1) as u8,
        }
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}Q{}", self.year, self.quarter)
    }
}

/// Annual-filing quarter vs. one of the three interim quarterly reports.
/// Only used to colour plot points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuarterClass {
    AnnualFiling,
    Interim,
}

impl QuarterClass {
    pub fn from_period_id(period_id: &str) -> Self {
        if period_id.contains(ANNUAL_FILING_MARKER) {
            QuarterClass::AnnualFiling
        } else {
            QuarterClass::Interim
        }
    }

    pub fn to_label(&self) -> &'static str {
        match self {
            QuarterClass::AnnualFiling => "10-K",
            QuarterClass::Interim => "10-Q",
        }
    }
}

/// One quarter of fundamentals. Missing cells are stored as `None`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FundamentalsRecord {
    pub period_id: String,
    #[serde(default)]
    pub period_end: Option<NaiveDate>,
    pub values: HashMap<String, Option<f64>>,
    #[serde(default)]
    pub quarter_class: Option<QuarterClass>,
}

impl FundamentalsRecord {
    pub fn new(period_id: impl Into<String>) -> Self {
        Self {
            period_id: period_id.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, field: &str, value: f64) -> Self {
        self.values.insert(field.to_string(), Some(value));
        self
    }

    pub fn period(&self) -> Option<FiscalPeriod> {
        FiscalPeriod::parse(&self.period_id)
    }

    pub fn get(&self, field: &str) -> Option<f64> {
        self.values.get(field).copied().flatten()
    }

    pub fn set(&mut self, field: &str, value: Option<f64>) {
        self.values.insert(field.to_string(), value);
    }
}

/// Quarterly fundamentals for one company, oldest record first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundamentalsTable {
    pub company: String,
    records: Vec<FundamentalsRecord>,
}

impl FundamentalsTable {
    pub fn new(company: impl Into<String>, records: Vec<FundamentalsRecord>) -> Self {
        Self {
            company: company.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[FundamentalsRecord] {
        &self.records
    }

    pub fn records_mut(&mut self) -> &mut [FundamentalsRecord] {
        &mut self.records
    }

    pub fn into_records(self) -> Vec<FundamentalsRecord> {
        self.records
    }

    pub fn column(&self, field: &str) -> Vec<Option<f64>> {
        self.records.iter().map(|r| r.get(field)).collect()
    }

    pub fn stock_prices(&self) -> Vec<Option<f64>> {
        self.column(fields::STOCK_PRICE)
    }

    pub fn has_column(&self, field: &str) -> bool {
        self.records.iter().any(|r| r.values.contains_key(field))
    }

    /// Append a derived column. The column must have one value per record.
    pub fn append_column(&mut self, column: &RatioColumn) -> Result<(), AnalysisError> {
        if column.values.len() != self.records.len() {
            return Err(AnalysisError::InvalidData(format!(
                "column '{}' has {} values for {} records",
                column.name,
                column.values.len(),
                self.records.len()
            )));
        }
        for (record, value) in self.records.iter_mut().zip(&column.values) {
            record.set(&column.name, *value);
        }
        Ok(())
    }
}

/// A single closing price observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriceTable {
    pub points: Vec<PricePoint>,
}

impl PriceTable {
    pub fn new(points: Vec<PricePoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Derived per-record series stored under a fixed column name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatioColumn {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl RatioColumn {
    pub fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn defined_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }
}

/// Correlation of a ratio against share price plus the fitted line.
/// `correlation` is `None` when either series has zero variance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub correlation: Option<f64>,
    pub slope: f64,
    pub intercept: f64,
    pub observations: usize,
}
