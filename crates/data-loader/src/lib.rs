pub mod config;
pub mod loader;

pub use config::{AnalysisConfig, CompanyConfig};
pub use loader::{load_fundamentals, load_prices, read_fundamentals, read_prices};
