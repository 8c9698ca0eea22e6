use analysis_orchestrator::{Alignment, PipelineOptions};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

const DEFAULT_COMPANIES: &str =
    "Apple=apple_ds.csv:AAPL_Project.csv,Google=googl_ds.csv:GOOGL_Project.csv";

/// Inputs for one company run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyConfig {
    /// Used in chart titles and output file names.
    pub label: String,
    pub fundamentals_path: PathBuf,
    pub price_path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub companies: Vec<CompanyConfig>,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub window: Option<usize>,
    #[serde(default)]
    pub alignment: Alignment,
}

/// Parse `Label=fundamentals.csv:prices.csv[,...]`.
pub fn parse_companies(raw: &str) -> Result<Vec<CompanyConfig>> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let (label, paths) = entry
                .split_once('=')
                .with_context(|| format!("company entry '{}' is missing '='", entry))?;
            let (fundamentals, prices) = paths
                .split_once(':')
                .with_context(|| format!("company entry '{}' is missing ':'", entry))?;
            if label.trim().is_empty() {
                bail!("company entry '{}' has an empty label", entry);
            }
            Ok(CompanyConfig {
                label: label.trim().to_string(),
                fundamentals_path: PathBuf::from(fundamentals.trim()),
                price_path: PathBuf::from(prices.trim()),
            })
        })
        .collect()
}

impl AnalysisConfig {
    pub fn from_env() -> Result<Self> {
        let companies = parse_companies(
            &env::var("RATIO_COMPANIES").unwrap_or_else(|_| DEFAULT_COMPANIES.to_string()),
        )
        .context("invalid RATIO_COMPANIES")?;

        let window = match env::var("RATIO_WINDOW") {
            Ok(v) if !v.trim().is_empty() => {
                Some(v.trim().parse().context("RATIO_WINDOW must be a quarter count")?)
            }
            _ => None,
        };

        let alignment = match env::var("RATIO_ALIGNMENT") {
            Ok(v) => v.parse()?,
            Err(_) => Alignment::default(),
        };

        Ok(Self {
            companies,
            output_dir: env::var("RATIO_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(".")),
            window,
            alignment,
        })
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            output_dir: self.output_dir.clone(),
            window: self.window,
            alignment: self.alignment,
        }
    }

    /// Apply command-line overrides. Returns `false` when `--help` was given.
    ///
    /// `--company` may repeat; the first occurrence replaces the configured list.
    pub fn apply_args(&mut self, args: &[String]) -> Result<bool> {
        let mut replaced_companies = false;
        let mut i = 0;
        while i < args.len() {
            let value = |n: usize| -> Result<&String> {
                args.get(i + n)
                    .with_context(|| format!("{} expects {} value(s)", args[i], n))
            };
            match args[i].as_str() {
                "--help" | "-h" => return Ok(false),
                "--company" => {
                    if !replaced_companies {
                        self.companies.clear();
                        replaced_companies = true;
                    }
                    self.companies.push(CompanyConfig {
                        label: value(1)?.clone(),
                        fundamentals_path: PathBuf::from(value(2)?),
                        price_path: PathBuf::from(value(3)?),
                    });
                    i += 4;
                }
                "--output-dir" => {
                    self.output_dir = PathBuf::from(value(1)?);
                    i += 2;
                }
                "--window" => {
                    self.window = Some(value(1)?.parse().context("--window must be a quarter count")?);
                    i += 2;
                }
                "--align" => {
                    self.alignment = value(1)?.parse()?;
                    i += 2;
                }
                "--config" => {
                    // Handled before overrides are applied.
                    i += 2;
                }
                other => bail!("unknown argument '{}'", other),
            }
        }
        if self.companies.is_empty() {
            bail!("no companies configured");
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn base() -> AnalysisConfig {
        AnalysisConfig {
            companies: parse_companies(DEFAULT_COMPANIES).unwrap(),
            output_dir: PathBuf::from("."),
            window: None,
            alignment: Alignment::Position,
        }
    }

    #[test]
    fn test_parse_default_companies() {
        let companies = parse_companies(DEFAULT_COMPANIES).unwrap();
        assert_eq!(companies.len(), 2);
        assert_eq!(companies[0].label, "Apple");
        assert_eq!(companies[0].fundamentals_path, PathBuf::from("apple_ds.csv"));
        assert_eq!(companies[1].price_path, PathBuf::from("GOOGL_Project.csv"));
    }

    #[test]
    fn test_parse_companies_rejects_malformed() {
        assert!(parse_companies("Apple").is_err());
        assert!(parse_companies("Apple=only_one.csv").is_err());
        assert!(parse_companies("=a.csv:b.csv").is_err());
    }

    #[test]
    fn test_apply_args_overrides() {
        let mut config = base();
        let keep_going = config
            .apply_args(&args(&[
                "--company", "Msft", "msft.csv", "MSFT.csv",
                "--window", "20",
                "--align", "period",
                "--output-dir", "charts",
            ]))
            .unwrap();
        assert!(keep_going);
        assert_eq!(config.companies.len(), 1);
        assert_eq!(config.companies[0].label, "Msft");
        assert_eq!(config.window, Some(20));
        assert_eq!(config.alignment, Alignment::Period);
        assert_eq!(config.pipeline_options().output_dir, PathBuf::from("charts"));
    }

    #[test]
    fn test_apply_args_help_and_errors() {
        let mut config = base();
        assert!(!config.apply_args(&args(&["--help"])).unwrap());
        assert!(config.apply_args(&args(&["--window"])).is_err());
        assert!(config.apply_args(&args(&["--window", "ten"])).is_err());
        assert!(config.apply_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ratios.json");
        std::fs::write(
            &path,
            r#"{
                "companies": [
                    {"label": "Apple", "fundamentals_path": "a.csv", "price_path": "p.csv"}
                ],
                "output_dir": "out",
                "alignment": "period"
            }"#,
        )
        .unwrap();
        let config = AnalysisConfig::from_json_file(&path).unwrap();
        assert_eq!(config.companies[0].label, "Apple");
        assert_eq!(config.window, None);
        assert_eq!(config.alignment, Alignment::Period);
    }
}
