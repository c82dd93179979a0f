use thiserror::Error;

use crate::store::StoreError;

/// Why a report run produced no report. The store transaction has already been
/// rolled back whenever one of these is returned.
#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No data: {0}")]
    NoData(String),
    #[error("Persistence failure: {0}")]
    Persistence(#[from] StoreError),
}

impl From<serde_json::Error> for ReportError {
    fn from(err: serde_json::Error) -> Self {
        ReportError::Persistence(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_error_display() {
        let not_found = ReportError::NotFound("period 42".to_string());
        assert_eq!(not_found.to_string(), "Not found: period 42");

        let no_data = ReportError::NoData("no grades".to_string());
        assert_eq!(no_data.to_string(), "No data: no grades");

        let persistence: ReportError = StoreError::Database("connection reset".to_string()).into();
        assert_eq!(
            persistence.to_string(),
            "Persistence failure: Database error: connection reset"
        );
    }

    #[test]
    fn test_serialization_error_is_a_persistence_failure() {
        let err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let report_err: ReportError = err.into();
        assert!(matches!(
            report_err,
            ReportError::Persistence(StoreError::Serialization(_))
        ));
    }
}
