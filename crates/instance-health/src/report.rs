//! Instance health report returned by the `/rest/troubleshooting/1.0/check/` endpoint.

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

/// Error decoding a [`HealthCheckReport`].
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReportError {
    /// Body is not valid JSON.
    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// Body is valid JSON, but its top-level value is not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
    /// `statuses` has an unexpected shape.
    #[error("invalid `statuses`: {0}")]
    Statuses(#[source] serde_json::Error),
}

/// Health report for an Atlassian instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCheckReport {
    /// Reported checks in the order they are listed by the endpoint.
    pub statuses: Vec<HealthCheckEntry>,
}

/// Single health check.
///
/// Decoding is lenient: unknown fields are ignored, and absent or mistyped fields are decoded
/// as their default values. `time` is ignored to keep label cardinality bounded, and `healthy`
/// is ignored since it duplicates `isHealthy`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HealthCheckEntry {
    /// Numeric identifier of the check.
    #[serde(deserialize_with = "lenient")]
    pub id: i64,
    /// Key of the plugin module performing the check, e.g. `com.atlassian.jira.plugins:eol`.
    #[serde(deserialize_with = "lenient")]
    pub complete_key: String,
    /// Human-readable name of the check.
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    /// Description of what the check verifies.
    #[serde(deserialize_with = "lenient")]
    pub description: String,
    /// Whether the check passed.
    #[serde(deserialize_with = "lenient")]
    pub is_healthy: bool,
    /// Reason of the failure; empty for healthy checks.
    #[serde(deserialize_with = "lenient")]
    pub failure_reason: String,
    /// Application the check belongs to, e.g. `JIRA`.
    #[serde(deserialize_with = "lenient")]
    pub application: String,
    /// Severity of a failure, e.g. `critical` or `undefined`.
    #[serde(deserialize_with = "lenient")]
    pub severity: String,
    /// Link to the documentation for the check.
    #[serde(deserialize_with = "lenient")]
    pub documentation: String,
    /// Category of the check, e.g. `Supported Platforms`.
    #[serde(deserialize_with = "lenient")]
    pub tag: String,
}

fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

impl HealthCheckReport {
    /// Decodes a report from the raw response body.
    ///
    /// # Errors
    ///
    /// Returns an error if the body is not a JSON object, or if `statuses` is present,
    /// but is not an array of objects. A missing or `null` `statuses` field results in an empty report.
    pub fn from_slice(body: &[u8]) -> Result<Self, ReportError> {
        let value: Value = serde_json::from_slice(body)?;
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(ReportError::NotAnObject(json_type(&other))),
        };

        let statuses = match object.remove("statuses") {
            None | Some(Value::Null) => Vec::new(),
            Some(statuses) => {
                if let Some(idx) = statuses
                    .as_array()
                    .and_then(|entries| entries.iter().position(|entry| !entry.is_object()))
                {
                    let message = format!("entry #{idx} is not an object");
                    return Err(ReportError::Statuses(serde::de::Error::custom(message)));
                }
                Vec::deserialize(statuses).map_err(ReportError::Statuses)?
            }
        };
        Ok(Self { statuses })
    }

    /// Returns the number of reported checks.
    pub fn len(&self) -> usize {
        self.statuses.len()
    }

    /// Checks whether the report contains no checks.
    pub fn is_empty(&self) -> bool {
        self.statuses.is_empty()
    }

    /// Retains at most `max_entries` first checks. Returns the number of dropped checks.
    pub fn truncate(&mut self, max_entries: usize) -> usize {
        let dropped = self.statuses.len().saturating_sub(max_entries);
        self.statuses.truncate(max_entries);
        dropped
    }
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
