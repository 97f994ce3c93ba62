use thiserror::Error;

/// Errors raised while loading survey data or building dashboard output
///
/// Every variant carries owned strings only so a failed load can be memoized
/// in the cache and handed out to every caller within the same window.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DashboardError {
    /// The survey sheet could not be fetched or parsed
    #[error("survey data unavailable: {0}")]
    DataUnavailable(String),

    /// A column named in the category registry is absent from the sheet
    #[error("column `{column}` required by {genre} is missing from the survey sheet")]
    MissingColumn { genre: &'static str, column: String },

    /// The operator has not picked the inputs a mode needs yet
    #[error("{0}")]
    EmptySelection(&'static str),

    /// A score column that is not configured for the genre was requested
    #[error("unknown score column `{0}`")]
    UnknownColumn(String),

    #[error("failed to draw chart: {0}")]
    Render(String),

    #[error("failed to encode QR code: {0}")]
    Qr(String),

    #[error("failed to render page: {0}")]
    Template(String),
}

impl DashboardError {
    /// Whether the error means the data-dependent modes should go inert
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            DashboardError::DataUnavailable(_) | DashboardError::MissingColumn { .. }
        )
    }
}

impl From<csv::Error> for DashboardError {
    fn from(e: csv::Error) -> Self {
        DashboardError::DataUnavailable(format!("malformed CSV: {}", e))
    }
}
