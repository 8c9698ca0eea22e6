pub mod aligner;
pub mod ratios;

pub use aligner::*;
pub use ratios::*;
