//! REST API types.
//!
//! Field names are camelCase on the wire.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::validation::Metrics;

/// Route generated files are downloaded from.
pub const REPORTS_ROUTE: &str = "/api/reports";

/// Response sent after a mapping or validation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunResponse {
    pub success: bool,
    pub message: String,
    /// Download path of the main generated file
    pub download_url: String,
    /// Name the file should be saved under
    pub original_name: String,
    /// RFC 3339 timestamp
    pub generated_at: String,
    /// Validation runs only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<Metrics>,
    /// Summary file of a validation run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_url: Option<String>,
}

impl RunResponse {
    pub fn new(message: impl Into<String>, stored_name: &str, original_name: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            download_url: download_url(stored_name),
            original_name: original_name.into(),
            generated_at: now(),
            metrics: None,
            summary_url: None,
        }
    }

    pub fn with_metrics(mut self, metrics: &Metrics) -> Self {
        self.metrics = Some(metrics.clone());
        self
    }

    pub fn with_summary(mut self, stored_name: &str) -> Self {
        self.summary_url = Some(download_url(stored_name));
        self
    }
}

/// Download path of a generated file.
pub fn download_url(stored_name: &str) -> String {
    format!("{}/{}", REPORTS_ROUTE, stored_name.replace(' ', "%20"))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Create an error response
pub fn error_response(error: &str) -> Value {
    json!({
        "success": false,
        "message": error,
        "generatedAt": now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_response_wire_format() {
        let response = RunResponse::new("Validation complete", "abc review.csv", "batch review.csv")
            .with_metrics(&Metrics::new(4, 3))
            .with_summary("abc review summary.csv");
        let json = serde_json::to_value(&response).unwrap();

        assert_eq!(json["success"], true);
        assert_eq!(json["downloadUrl"], "/api/reports/abc%20review.csv");
        assert_eq!(json["originalName"], "batch review.csv");
        assert_eq!(json["metrics"]["validPct"], "75.0%");
        assert_eq!(json["summaryUrl"], "/api/reports/abc%20review%20summary.csv");
        assert!(json["generatedAt"].as_str().unwrap().ends_with('Z'));
    }

    #[test]
    fn test_mapping_response_has_no_metrics() {
        let json = serde_json::to_value(RunResponse::new("ok", "a.csv", "a.csv")).unwrap();
        assert!(json.get("metrics").is_none());
    }

    #[test]
    fn test_error_response() {
        let json = error_response("Missing required sheet 'Template'.");
        assert_eq!(json["success"], false);
        assert_eq!(json["message"], "Missing required sheet 'Template'.");
    }
}
