use analysis_core::{fields, AnalysisError, FundamentalsRecord, FundamentalsTable, RatioColumn};
use serde::{Deserialize, Serialize};

/// Every series reported against share price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RatioKind {
    CurrentRatio,
    ReturnOnAssets,
    ReturnOnEquity,
    NetProfitMargin,
    InventoryTurnover,
    DebtToEquity,
    CashFlowToCapex,
    ResearchAndDevelopment,
}

impl RatioKind {
    pub const ALL: [RatioKind; 8] = [
        RatioKind::CurrentRatio,
        RatioKind::ReturnOnAssets,
        RatioKind::ReturnOnEquity,
        RatioKind::NetProfitMargin,
        RatioKind::InventoryTurnover,
        RatioKind::DebtToEquity,
        RatioKind::CashFlowToCapex,
        RatioKind::ResearchAndDevelopment,
    ];

    pub fn spec(&self) -> &'static RatioSpec {
        match self {
            RatioKind::CurrentRatio => &RATIO_SPECS[0],
            RatioKind::ReturnOnAssets => &RATIO_SPECS[1],
            RatioKind::ReturnOnEquity => &RATIO_SPECS[2],
            RatioKind::NetProfitMargin => &RATIO_SPECS[3],
            RatioKind::InventoryTurnover => &RATIO_SPECS[4],
            RatioKind::DebtToEquity => &RATIO_SPECS[5],
            RatioKind::CashFlowToCapex => &RATIO_SPECS[6],
            RatioKind::ResearchAndDevelopment => &RATIO_SPECS[7],
        }
    }
}

/// How a series picks its numerator.
#[derive(Debug, Clone, Copy)]
pub enum Numerator {
    Field(&'static str),
    /// Sum of several fields; undefined if any term is.
    Sum(&'static [&'static str]),
}

impl Numerator {
    fn value(&self, record: &FundamentalsRecord) -> Option<f64> {
        match self {
            Numerator::Field(field) => record.get(field),
            Numerator::Sum(terms) => terms.iter().map(|f| record.get(f)).sum(),
        }
    }

    fn fields(&self) -> Vec<&'static str> {
        match self {
            Numerator::Field(field) => vec![*field],
            Numerator::Sum(terms) => terms.to_vec(),
        }
    }
}

/// One reported series: its formula, naming, and applicability rule.
#[derive(Debug, Clone, Copy)]
pub struct RatioSpec {
    pub kind: RatioKind,
    /// Column appended to the fundamentals table.
    pub column: &'static str,
    /// Console label, `<label> Correlation: <value>`.
    pub label: &'static str,
    pub title: &'static str,
    pub y_axis_label: &'static str,
    /// Output file suffix, `<Company>_SharePrice_to_<file_stem>.png`.
    pub file_stem: &'static str,
    pub numerator: Numerator,
    /// `None` reports the numerator as-is.
    pub denominator: Option<&'static str>,
    /// Divide by the mean of this and the prior quarter's denominator.
    pub uses_averaging: bool,
}

pub static RATIO_SPECS: [RatioSpec; 8] = [
    RatioSpec {
        kind: RatioKind::CurrentRatio,
        column: "current_ratio",
        label: "Current Ratio",
        title: "Current Ratio",
        y_axis_label: "Current Ratio",
        file_stem: "CurrentRatio",
        numerator: Numerator::Field(fields::CURRENT_ASSETS),
        denominator: Some(fields::CURRENT_LIABILITIES),
        uses_averaging: false,
    },
    RatioSpec {
        kind: RatioKind::ReturnOnAssets,
        column: "roa_ratio",
        label: "ROA",
        title: "Return on Assets",
        y_axis_label: "Return on Assets",
        file_stem: "ReturnOnAssets",
        numerator: Numerator::Field(fields::NET_INCOME),
        denominator: Some(fields::TOTAL_ASSETS),
        uses_averaging: true,
    },
    RatioSpec {
        kind: RatioKind::ReturnOnEquity,
        column: "roe_ratio",
        label: "ROE",
        title: "Return on Equity",
        y_axis_label: "Return on Equity",
        file_stem: "ReturnOnEquity",
        numerator: Numerator::Field(fields::NET_INCOME),
        denominator: Some(fields::SHAREHOLDER_EQUITY),
        uses_averaging: true,
    },
    RatioSpec {
        kind: RatioKind::NetProfitMargin,
        column: "profit_margin",
        label: "Profit Margin Stock",
        title: "Net Profit Margin",
        y_axis_label: "Net Profit Margin",
        file_stem: "NetProfitMargin",
        numerator: Numerator::Field(fields::NET_INCOME),
        denominator: Some(fields::NET_SALES),
        uses_averaging: false,
    },
    RatioSpec {
        kind: RatioKind::InventoryTurnover,
        column: "inventory_turnover",
        label: "Inventory Turnover Stock",
        title: "Inventory Turnover Ratio",
        y_axis_label: "Inventory Turnover",
        file_stem: "InventoryTurnover",
        numerator: Numerator::Field(fields::COST_OF_GOODS_SOLD),
        denominator: Some(fields::INVENTORY),
        uses_averaging: true,
    },
    RatioSpec {
        kind: RatioKind::DebtToEquity,
        column: "debt_to_equity",
        label: "Debt to Equity Stock",
        title: "Debt to Equity Ratio",
        y_axis_label: "Debt to Equity Ratio",
        file_stem: "DebtToEquity",
        numerator: Numerator::Field(fields::TOTAL_LIABILITIES),
        denominator: Some(fields::SHAREHOLDER_EQUITY),
        uses_averaging: false,
    },
    RatioSpec {
        kind: RatioKind::CashFlowToCapex,
        column: "cf_capex",
        label: "CF to CapEX Stock",
        title: "Cash Flow to Capital Expenditures",
        y_axis_label: "Cash Flow to Capital Expenditures",
        file_stem: "CFCapEX",
        numerator: Numerator::Sum(&[
            fields::OPERATING_CASH_FLOW,
            fields::INVESTING_CASH_FLOW,
            fields::FINANCING_CASH_FLOW,
        ]),
        denominator: Some(fields::CAPITAL_EXPENDITURES),
        uses_averaging: false,
    },
    RatioSpec {
        kind: RatioKind::ResearchAndDevelopment,
        column: "rnd_expense",
        label: "R&D Stock",
        title: "Research and Development Expense",
        y_axis_label: "Research and Development Expense",
        file_stem: "RND",
        numerator: Numerator::Field(fields::RESEARCH_AND_DEVELOPMENT),
        denominator: None,
        uses_averaging: false,
    },
];

/// Division that yields `None` for an undefined operand, a zero denominator,
/// or a non-finite quotient.
pub fn safe_divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    let q = n / d;
    q.is_finite().then_some(q)
}

impl RatioSpec {
    /// Value for `record`, given the preceding record when one exists.
    ///
    /// Averaged denominators need both quarters defined; the first record of a
    /// table has no prior and uses its own denominator.
    pub fn formula(
        &self,
        record: &FundamentalsRecord,
        prior: Option<&FundamentalsRecord>,
    ) -> Option<f64> {
        let numerator = self.numerator.value(record);
        let Some(field) = self.denominator else {
            return numerator.filter(|v| v.is_finite());
        };

        let current = record.get(field);
        let denominator = match (self.uses_averaging, prior) {
            (true, Some(prior)) => Some((current? + prior.get(field)?) / 2.0),
            _ => current,
        };
        safe_divide(numerator, denominator)
    }

    /// Compute the column without touching the table.
    pub fn compute(&self, table: &FundamentalsTable) -> RatioColumn {
        let records = table.records();
        let values = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let prior = if i > 0 { records.get(i - 1) } else { None };
                self.formula(record, prior)
            })
            .collect();
        RatioColumn::new(self.column, values)
    }

    /// Field whose column decides applicability: the denominator, or the
    /// numerator for a raw series.
    pub fn driving_fields(&self) -> Vec<&'static str> {
        match self.denominator {
            Some(field) => vec![field],
            None => self.numerator.fields(),
        }
    }

    /// A series is inapplicable when its driving column is entirely zero or
    /// undefined (e.g. a company that carries no inventory).
    pub fn applicability_check(&self, table: &FundamentalsTable) -> bool {
        self.driving_fields().iter().all(|field| {
            table
                .records()
                .iter()
                .any(|r| matches!(r.get(field), Some(v) if v != 0.0 && v.is_finite()))
        })
    }

    /// Check applicability, compute, and append the column in place.
    pub fn apply(&self, table: &mut FundamentalsTable) -> Result<RatioColumn, AnalysisError> {
        if !self.applicability_check(table) {
            return Err(AnalysisError::InsufficientData(format!(
                "{}: {} column is entirely zero or undefined, {} is not applicable",
                table.company,
                self.driving_fields().join("/"),
                self.title
            )));
        }
        let column = self.compute(table);
        table.append_column(&column)?;
        Ok(column)
    }
}
