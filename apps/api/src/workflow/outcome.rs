//! Turns one inference attempt into a terminal status.
//!
//! Marker matching is a substring heuristic over free text. It is configured,
//! not trusted: a model that phrases "unknown" differently will be recorded as Success.

use crate::inference::{Classification, InferenceError};
use crate::models::analysis::AnalysisStatus;

/// Label stored when the model produced nothing to label.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub status: AnalysisStatus,
    pub result_text: String,
    pub identified_label: String,
}

impl Analysis {
    fn unlabelled(status: AnalysisStatus, result_text: String) -> Self {
        Self {
            status,
            result_text,
            identified_label: UNKNOWN_LABEL.to_string(),
        }
    }

    pub fn processing_error(result_text: String) -> Self {
        Self::unlabelled(AnalysisStatus::ProcessingError, result_text)
    }
}

pub fn classify_outcome(
    result: Result<Classification, InferenceError>,
    unknown_markers: &[String],
) -> Analysis {
    let classification = match result {
        Ok(c) => c,
        Err(e) => return Analysis::processing_error(e.to_string()),
    };

    let Some(text) = classification.text.as_deref() else {
        return Analysis::unlabelled(
            AnalysisStatus::InferenceError,
            describe_empty_response(&classification),
        );
    };

    let status = if contains_marker(text, unknown_markers) {
        AnalysisStatus::IdentificationFailed
    } else {
        AnalysisStatus::Success
    };
    Analysis {
        status,
        result_text: text.to_string(),
        identified_label: text.to_string(),
    }
}

pub fn contains_marker(text: &str, markers: &[String]) -> bool {
    let text = text.to_lowercase();
    markers
        .iter()
        .filter(|m| !m.is_empty())
        .any(|m| text.contains(&m.to_lowercase()))
}

fn describe_empty_response(c: &Classification) -> String {
    let mut reasons = Vec::new();
    if let Some(reason) = &c.finish_reason {
        reasons.push(format!("finish reason: {reason}"));
    }
    if let Some(reason) = &c.block_reason {
        reasons.push(format!("block reason: {reason}"));
    }
    if !c.safety_ratings.is_empty() {
        let ratings: Vec<String> = c
            .safety_ratings
            .iter()
            .map(|r| {
                format!(
                    "{}={}{}",
                    r.category,
                    r.probability.as_deref().unwrap_or("?"),
                    if r.blocked { " (blocked)" } else { "" }
                )
            })
            .collect();
        reasons.push(format!("safety ratings: {}", ratings.join(", ")));
    }

    if reasons.is_empty() {
        "Inference failed: empty response".to_string()
    } else {
        format!("Inference failed ({})", reasons.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::SafetyRating;

    fn markers() -> Vec<String> {
        ["不明", "ではない", "unknown", "not a motorcycle"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn text(t: &str) -> Result<Classification, InferenceError> {
        Ok(Classification {
            text: Some(t.to_string()),
            finish_reason: Some("STOP".to_string()),
            ..Classification::default()
        })
    }

    #[test]
    fn test_plain_answer_is_success() {
        let a = classify_outcome(text("Yamaha YZF-R1"), &markers());
        assert_eq!(a.status, AnalysisStatus::Success);
        assert_eq!(a.identified_label, "Yamaha YZF-R1");
        assert_eq!(a.result_text, "Yamaha YZF-R1");
    }

    #[test]
    fn test_marker_is_identification_failed_with_verbatim_label() {
        let a = classify_outcome(text("Unknown"), &markers());
        assert_eq!(a.status, AnalysisStatus::IdentificationFailed);
        assert_eq!(a.identified_label, "Unknown");

        let a = classify_outcome(text("バイクではない"), &markers());
        assert_eq!(a.status, AnalysisStatus::IdentificationFailed);
    }

    #[test]
    fn test_no_markers_means_everything_succeeds() {
        let a = classify_outcome(text("unknown"), &[]);
        assert_eq!(a.status, AnalysisStatus::Success);
    }

    #[test]
    fn test_blocked_response_reports_reasons() {
        let blocked = Ok(Classification {
            text: None,
            finish_reason: Some("SAFETY".to_string()),
            block_reason: None,
            safety_ratings: vec![SafetyRating {
                category: "HARM_CATEGORY_DANGEROUS_CONTENT".to_string(),
                probability: Some("MEDIUM".to_string()),
                blocked: true,
            }],
        });
        let a = classify_outcome(blocked, &markers());
        assert_eq!(a.status, AnalysisStatus::InferenceError);
        assert_eq!(a.identified_label, UNKNOWN_LABEL);
        assert!(a.result_text.contains("finish reason: SAFETY"));
        assert!(a
            .result_text
            .contains("HARM_CATEGORY_DANGEROUS_CONTENT=MEDIUM (blocked)"));
    }

    #[test]
    fn test_empty_response_without_reasons() {
        let a = classify_outcome(Ok(Classification::default()), &markers());
        assert_eq!(a.status, AnalysisStatus::InferenceError);
        assert_eq!(a.result_text, "Inference failed: empty response");
    }

    #[test]
    fn test_call_failure_is_processing_error() {
        let err = InferenceError::Api {
            status: 503,
            message: "model overloaded".to_string(),
        };
        let a = classify_outcome(Err(err), &markers());
        assert_eq!(a.status, AnalysisStatus::ProcessingError);
        assert!(a.result_text.contains("model overloaded"));
        assert_eq!(a.identified_label, UNKNOWN_LABEL);
    }
}
