use crate::error::{ErrorKind, PipelineError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structured result returned by every pipeline stage to its caller.
///
/// Serializes to the `{"statusCode": ..., "body": ...}` shape expected by
/// function-as-a-service schedulers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageOutcome {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "body")]
    pub message: String,
    #[serde(skip)]
    pub kind: Option<ErrorKind>,
}

impl StageOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            message: message.into(),
            kind: None,
        }
    }

    pub fn failure(error: &PipelineError) -> Self {
        let kind = error.kind();
        Self {
            status_code: kind.status_code(),
            message: format!("{}: {}", kind, error_chain(error)),
            kind: Some(kind),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

impl<T: fmt::Display> From<Result<T, PipelineError>> for StageOutcome {
    fn from(result: Result<T, PipelineError>) -> Self {
        match result {
            Ok(report) => StageOutcome::success(report.to_string()),
            Err(e) => StageOutcome::failure(&e),
        }
    }
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.status_code, self.message)
    }
}

/// Joins an error and all of its sources into one line.
fn error_chain(error: &dyn std::error::Error) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::error::AggregateError;

    #[test]
    fn test_empty_dataset_maps_to_400() {
        let error = PipelineError::from(AggregateError::EmptyDataset {
            prefix: "weather_data".to_string(),
            objects: 3,
        });
        let outcome = StageOutcome::failure(&error);
        assert_eq!(outcome.status_code, 400);
        assert_eq!(outcome.kind, Some(ErrorKind::EmptyDataset));
        assert!(!outcome.is_success());
        assert!(outcome.message.starts_with("EmptyDataset: "));
    }

    #[test]
    fn test_serializes_like_a_function_response() -> Result<(), serde_json::Error> {
        let outcome = StageOutcome::success("stored 2 records");
        let json = serde_json::to_string(&outcome)?;
        assert_eq!(json, r#"{"statusCode":200,"body":"stored 2 records"}"#);
        Ok(())
    }

    #[test]
    fn test_from_result() {
        let ok: Result<&str, PipelineError> = Ok("done");
        assert_eq!(StageOutcome::from(ok), StageOutcome::success("done"));

        let err: Result<&str, PipelineError> = Err(PipelineError::MissingEnvVar("NOAA_API_TOKEN"));
        let outcome = StageOutcome::from(err);
        assert_eq!(outcome.status_code, 500);
        assert_eq!(outcome.kind, Some(ErrorKind::Configuration));
    }
}
