//! Joins quarterly fundamentals with quarter-end share prices.

use analysis_core::{
    fields, AnalysisError, FiscalPeriod, FundamentalsTable, PriceTable, QuarterClass,
};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// Trailing `n_periods` records of `table`, re-indexed from zero.
pub fn slice_window(
    table: &FundamentalsTable,
    n_periods: usize,
) -> Result<FundamentalsTable, AnalysisError> {
    let available = table.len();
    if n_periods > available {
        return Err(AnalysisError::Range {
            requested: n_periods,
            available,
        });
    }
    let records = table.records()[available - n_periods..].to_vec();
    Ok(FundamentalsTable::new(table.company.clone(), records))
}

/// Copy `prices[i]` into `table[i].stock_price`, row for row.
///
/// Lengths are checked before anything is written.
pub fn attach_price(table: &mut FundamentalsTable, prices: &PriceTable) -> Result<(), AnalysisError> {
    if table.len() != prices.len() {
        return Err(AnalysisError::MisalignedSeries(format!(
            "{}: fundamentals has {} rows but price table has {}",
            table.company,
            table.len(),
            prices.len()
        )));
    }
    for (record, point) in table.records_mut().iter_mut().zip(&prices.points) {
        record.set(fields::STOCK_PRICE, point.close);
    }
    Ok(())
}

/// Join on (year, quarter) instead of row position.
///
/// Prices are bucketed into calendar quarters and the latest observation in each
/// quarter is taken as the quarter-end price. Every fundamentals period must find
/// a price; unmatched periods are all reported in one error.
pub fn attach_price_by_period(
    table: &mut FundamentalsTable,
    prices: &PriceTable,
) -> Result<(), AnalysisError> {
    let mut quarter_end: BTreeMap<FiscalPeriod, (NaiveDate, Option<f64>)> = BTreeMap::new();
    for point in &prices.points {
        let period = FiscalPeriod::from_date(point.date);
        match quarter_end.get(&period) {
            Some((date, _)) if *date >= point.date => {}
            _ => {
                quarter_end.insert(period, (point.date, point.close));
            }
        }
    }

    let mut resolved = Vec::with_capacity(table.len());
    let mut unmatched = Vec::new();
    for record in table.records() {
        let period = record.period().ok_or_else(|| {
            AnalysisError::InvalidData(format!(
                "{}: unparseable period identifier '{}'",
                table.company, record.period_id
            ))
        })?;
        match quarter_end.get(&period) {
            Some((_, close)) => resolved.push(*close),
            None => unmatched.push(period.to_string()),
        }
    }

    if !unmatched.is_empty() {
        return Err(AnalysisError::MisalignedSeries(format!(
            "{}: no price for period(s) {}",
            table.company,
            unmatched.join(", ")
        )));
    }

    for (record, close) in table.records_mut().iter_mut().zip(resolved) {
        record.set(fields::STOCK_PRICE, close);
    }
    Ok(())
}

/// Tag each record as annual-filing or interim quarter.
pub fn classify_quarter(table: &mut FundamentalsTable) {
    for record in table.records_mut() {
        record.quarter_class = Some(QuarterClass::from_period_id(&record.period_id));
    }
}

/// Records must be in strictly increasing period order.
pub fn ensure_chronological(table: &FundamentalsTable) -> Result<(), AnalysisError> {
    for pair in table.records().windows(2) {
        let ordered = match (pair[0].period(), pair[1].period()) {
            (Some(a), Some(b)) => a < b,
            _ => match (pair[0].period_end, pair[1].period_end) {
                (Some(a), Some(b)) => a < b,
                _ => true,
            },
        };
        if !ordered {
            return Err(AnalysisError::InvalidData(format!(
                "{}: period {} does not follow {}",
                table.company, pair[1].period_id, pair[0].period_id
            )));
        }
    }
    Ok(())
}
