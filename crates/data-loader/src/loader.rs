//! CSV readers for Compustat quarterly fundamentals and Yahoo Finance prices.

use analysis_core::{fields, AnalysisError, FundamentalsRecord, FundamentalsTable, PricePoint, PriceTable};
use chrono::NaiveDate;
use fundamental_analysis::ensure_chronological;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Fields the ratio engine reads. A non-numeric value in any of these is an error;
/// other non-numeric columns (ticker, company name, ...) are ignored.
const REFERENCED_FIELDS: &[&str] = &[
    fields::CURRENT_ASSETS,
    fields::CURRENT_LIABILITIES,
    fields::NET_INCOME,
    fields::TOTAL_ASSETS,
    fields::SHAREHOLDER_EQUITY,
    fields::NET_SALES,
    fields::COST_OF_GOODS_SOLD,
    fields::INVENTORY,
    fields::TOTAL_LIABILITIES,
    fields::OPERATING_CASH_FLOW,
    fields::INVESTING_CASH_FLOW,
    fields::FINANCING_CASH_FLOW,
    fields::CAPITAL_EXPENDITURES,
    fields::RESEARCH_AND_DEVELOPMENT,
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y%m%d"];

fn csv_err(e: csv::Error) -> AnalysisError {
    AnalysisError::Csv(e.to_string())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

/// Empty cells and Yahoo's `null` read as undefined.
fn parse_cell(raw: &str) -> Result<Option<f64>, ()> {
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("nan") {
        return Ok(None);
    }
    raw.parse::<f64>().map(Some).map_err(|_| ())
}

pub fn load_fundamentals<P: AsRef<Path>>(path: P, company: &str) -> Result<FundamentalsTable, AnalysisError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), company, "loading fundamentals");
    let file = File::open(path)?;
    read_fundamentals(file, company)
}

pub fn read_fundamentals<R: Read>(reader: R, company: &str) -> Result<FundamentalsTable, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(csv_err)?.clone();

    let period_idx = headers
        .iter()
        .position(|h| h.trim() == fields::PERIOD_ID)
        .ok_or_else(|| {
            AnalysisError::InvalidData(format!(
                "{}: fundamentals file has no '{}' column",
                company,
                fields::PERIOD_ID
            ))
        })?;
    let date_idx = headers.iter().position(|h| h.trim() == fields::PERIOD_END);

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = row + 2;
        let row_data = result.map_err(csv_err)?;

        let period_id = row_data.get(period_idx).unwrap_or("").trim();
        if period_id.is_empty() {
            return Err(AnalysisError::InvalidData(format!(
                "{}: line {} has no '{}' period identifier",
                company,
                line,
                fields::PERIOD_ID
            )));
        }

        let mut record = FundamentalsRecord::new(period_id);
        record.period_end = date_idx
            .and_then(|i| row_data.get(i))
            .and_then(parse_date);

        for (idx, header) in headers.iter().enumerate() {
            if idx == period_idx || Some(idx) == date_idx {
                continue;
            }
            let header = header.trim();
            let raw = row_data.get(idx).unwrap_or("");
            match parse_cell(raw) {
                Ok(value) => record.set(header, value),
                Err(()) if REFERENCED_FIELDS.contains(&header) => {
                    return Err(AnalysisError::InvalidData(format!(
                        "{}: line {} column '{}' is not numeric: '{}'",
                        company, line, header, raw
                    )));
                }
                Err(()) => {}
            }
        }
        records.push(record);
    }

    let table = FundamentalsTable::new(company, records);
    ensure_chronological(&table)?;
    tracing::debug!(company, quarters = table.len(), "fundamentals loaded");
    Ok(table)
}

pub fn load_prices<P: AsRef<Path>>(path: P) -> Result<PriceTable, AnalysisError> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "loading prices");
    let file = File::open(path)?;
    read_prices(file)
}

/// Reads `Date` and `Adj Close`, falling back to `Close`.
pub fn read_prices<R: Read>(reader: R) -> Result<PriceTable, AnalysisError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers().map_err(csv_err)?.clone();
    let find = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let date_idx = find("Date")
        .ok_or_else(|| AnalysisError::InvalidData("price file has no 'Date' column".to_string()))?;
    let close_idx = find("Adj Close").or_else(|| find("Close")).ok_or_else(|| {
        AnalysisError::InvalidData("price file has no 'Adj Close' or 'Close' column".to_string())
    })?;

    let mut points = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let line = row + 2;
        let row_data = result.map_err(csv_err)?;
        let raw_date = row_data.get(date_idx).unwrap_or("");
        let date = parse_date(raw_date).ok_or_else(|| {
            AnalysisError::InvalidData(format!("price line {}: bad date '{}'", line, raw_date))
        })?;
        let raw_close = row_data.get(close_idx).unwrap_or("");
        let close = parse_cell(raw_close).map_err(|_| {
            AnalysisError::InvalidData(format!("price line {}: bad close '{}'", line, raw_close))
        })?;
        points.push(PricePoint { date, close });
    }

    Ok(PriceTable::new(points))
}

#[cfg(test)]
mod tests {
    use super::*;

    const FUNDAMENTALS: &str = "\
gvkey,datadate,tic,datacqtr,actq,lctq,niq,invtq
1690,2019-12-31,AAPL,2019Q4,163231,102161,22236,4097
1690,2020-03-31,AAPL,2020Q1,143753,96094,11249,
1690,2020-06-30,AAPL,2020Q2,140065,95318,11253,3978
";

    const PRICES: &str = "\
Date,Open,High,Low,Close,Adj Close,Volume
2019-12-01,66.82,73.49,64.07,73.41,72.04,2388794800
2020-03-01,70.57,76.00,53.15,63.57,62.50,6280072400
2020-06-01,80.43,93.10,79.30,91.20,90.12,3243375600
";

    #[test]
    fn test_read_fundamentals() {
        let table = read_fundamentals(FUNDAMENTALS.as_bytes(), "Apple").unwrap();
        assert_eq!(table.company, "Apple");
        assert_eq!(table.len(), 3);
        let first = &table.records()[0];
        assert_eq!(first.period_id, "2019Q4");
        assert_eq!(first.period_end, NaiveDate::from_ymd_opt(2019, 12, 31));
        assert_eq!(first.get(fields::CURRENT_ASSETS), Some(163231.0));
        // Empty cell reads as undefined
        assert_eq!(table.records()[1].get(fields::INVENTORY), None);
        // Non-numeric, unreferenced columns are dropped
        assert!(!first.values.contains_key("tic"));
    }

    #[test]
    fn test_read_fundamentals_rejects_bad_number() {
        let data = "datacqtr,actq\n2020Q1,abc\n";
        let err = read_fundamentals(data.as_bytes(), "X").unwrap_err();
        match err {
            AnalysisError::InvalidData(msg) => assert!(msg.contains("actq")),
            other => panic!("expected invalid data, got {:?}", other),
        }
    }

    #[test]
    fn test_read_fundamentals_rejects_blank_period() {
        let data = "datacqtr,actq\n2020Q1,1\n,2\n2020Q3,3\n";
        match read_fundamentals(data.as_bytes(), "X").unwrap_err() {
            AnalysisError::InvalidData(msg) => assert!(msg.contains("line 3"), "{}", msg),
            other => panic!("expected invalid data, got {:?}", other),
        }
    }

    #[test]
    fn test_read_fundamentals_requires_period_column() {
        let data = "actq,lctq\n1,2\n";
        assert!(matches!(
            read_fundamentals(data.as_bytes(), "X"),
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[test]
    fn test_read_fundamentals_rejects_out_of_order() {
        let data = "datacqtr,actq\n2020Q2,1\n2020Q1,2\n";
        assert!(matches!(
            read_fundamentals(data.as_bytes(), "X"),
            Err(AnalysisError::InvalidData(_))
        ));
    }

    #[test]
    fn test_read_prices_prefers_adj_close() {
        let prices = read_prices(PRICES.as_bytes()).unwrap();
        assert_eq!(prices.len(), 3);
        assert_eq!(prices.points[0].close, Some(72.04));
        assert_eq!(prices.points[2].date, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
    }

    #[test]
    fn test_read_prices_close_fallback_and_null() {
        let data = "Date,Close\n01/31/2020,10.5\n02/28/2020,null\n";
        let prices = read_prices(data.as_bytes()).unwrap();
        assert_eq!(prices.points[0].close, Some(10.5));
        assert_eq!(prices.points[1].close, None);
    }

    #[test]
    fn test_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let fpath = dir.path().join("apple_ds.csv");
        let ppath = dir.path().join("AAPL_Project.csv");
        std::fs::write(&fpath, FUNDAMENTALS).unwrap();
        std::fs::write(&ppath, PRICES).unwrap();

        assert_eq!(load_fundamentals(&fpath, "Apple").unwrap().len(), 3);
        assert_eq!(load_prices(&ppath).unwrap().len(), 3);
        assert!(matches!(
            load_prices(dir.path().join("missing.csv")),
            Err(AnalysisError::Io(_))
        ));
    }
}
