use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    /// Fundamentals and prices do not line up row-for-row (or period-for-period).
    #[error("Misaligned series: {0}")]
    MisalignedSeries(String),

    /// A trailing window asked for more history than the table holds.
    #[error("Range error: requested {requested} periods but only {available} available")]
    Range { requested: usize, available: usize },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// Independent variable has zero variance, so no line can be fitted.
    #[error("Degenerate fit: {0}")]
    DegenerateFit(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Render error: {0}")]
    Render(String),
}

impl AnalysisError {
    /// Errors that only invalidate a single ratio report, not the whole company run.
    pub fn is_per_ratio(&self) -> bool {
        matches!(
            self,
            AnalysisError::InsufficientData(_) | AnalysisError::DegenerateFit(_)
        )
    }
}
