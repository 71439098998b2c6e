//! Wire types of the chat job API
//!
//! Every field the harness inspects is optional. A missing, `null` or wrongly typed field
//! turns the corresponding check false; it never fails deserialization on its own.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Status code returned when the API accepts a job for asynchronous processing
pub const STATUS_ACCEPTED: u16 = 202;

/// Status code returned when the API sheds load
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// Status code of a successful status poll
pub const STATUS_OK: u16 = 200;

/// Body of `POST /chat`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct JobRequest {
    message: String,
    chat_id: String,
}

impl JobRequest {
    pub fn new(message: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            chat_id: chat_id.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }
}

/// Status line and body of one HTTP exchange, before any interpretation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Payload of a 202 from `POST /chat`
#[derive(Debug, Clone, Default, Deserialize)]
struct InitJobPayload {
    #[serde(default, deserialize_with = "lenient_id")]
    id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    status_url: Option<String>,
}

/// Interpreted submission response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionResponse {
    pub http_status: u16,
    pub job_id: Option<String>,
    pub status_url: Option<String>,
}

impl SubmissionResponse {
    /// Job handles are only read from a 202; any other body is ignored.
    pub fn from_raw(raw: &RawResponse) -> Self {
        let payload = if raw.status == STATUS_ACCEPTED {
            serde_json::from_str::<InitJobPayload>(&raw.body).unwrap_or_default()
        } else {
            InitJobPayload::default()
        };

        Self {
            http_status: raw.status,
            job_id: payload.id,
            status_url: payload.status_url,
        }
    }
}

/// Job lifecycle status as reported by the status endpoint
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    /// Anything else, including the API's `Error` status
    Other(String),
}

impl From<String> for JobStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "QUEUED" => Self::Queued,
            "RUNNING" => Self::Running,
            "COMPLETE" => Self::Complete,
            _ => Self::Other(value),
        }
    }
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Complete => "COMPLETE",
            Self::Other(value) => value,
        }
    }
}

/// Body of `GET /status/{id}`
///
/// Each field is read on its own: a value of the wrong type reads as absent and never
/// fails the body as a whole.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobStatusBody {
    #[serde(default, deserialize_with = "lenient")]
    pub chat_id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub result: Option<JobResult>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobResult {
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<JobStatus>,
    #[serde(default, deserialize_with = "lenient")]
    pub rag_response: Option<RagResponse>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RagResponse {
    #[serde(default, deserialize_with = "lenient")]
    pub answer: Option<String>,
    /// Only counted, so entries of any shape are accepted
    #[serde(default, deserialize_with = "lenient")]
    pub sources: Option<Vec<Value>>,
}

/// Job-level failure reported by the API
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobError {
    /// Usually numeric, but any JSON value is accepted
    pub code: Option<Value>,
}

impl JobStatusBody {
    pub fn status(&self) -> Option<&JobStatus> {
        self.result.as_ref().and_then(|r| r.status.as_ref())
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.status(), Some(JobStatus::Complete))
    }

    /// `result.rag_response.answer`, if every link of the chain is present
    pub fn answer(&self) -> Option<&str> {
        self.result
            .as_ref()
            .and_then(|r| r.rag_response.as_ref())
            .and_then(|rag| rag.answer.as_deref())
    }

    pub fn source_count(&self) -> usize {
        self.result
            .as_ref()
            .and_then(|r| r.rag_response.as_ref())
            .and_then(|rag| rag.sources.as_ref())
            .map_or(0, Vec::len)
    }

    /// The job error, present whenever `error` is truthy
    pub fn error(&self) -> Option<JobError> {
        self.error
            .as_ref()
            .filter(|value| is_truthy(value))
            .map(|value| JobError {
                code: value.get("code").cloned(),
            })
    }
}

impl JobError {
    pub fn code_is_truthy(&self) -> bool {
        self.code.as_ref().is_some_and(is_truthy)
    }

    /// Error code rendered for log lines
    pub fn code_label(&self) -> String {
        match &self.code {
            None | Some(Value::Null) => "none".to_string(),
            Some(Value::String(code)) => code.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Deserialize a field as `T`, reading a value of any other type as absent
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Job ids are strings, but numeric ids are accepted and rendered as text
fn lenient_id<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(id) => Some(id),
        Value::Number(id) => Some(id.to_string()),
        _ => None,
    })
}

/// Script-style truthiness: `null`, `false`, `0`, `NaN` and `""` are falsy
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
