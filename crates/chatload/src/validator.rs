//! Checks on the payload of a completed job

use tracing::info;

use crate::checks::{labels, CheckReporter};
use crate::model::JobStatusBody;

/// Characters of the answer echoed in the completion log line
pub const ANSWER_PREVIEW_CHARS: usize = 20;

/// Record result checks for a COMPLETE body.
///
/// The answer check only applies to error-free bodies; the error check only to bodies
/// carrying an error.
pub fn validate(job_id: &str, body: &JobStatusBody, reporter: &mut dyn CheckReporter) {
    reporter.record_check(
        labels::HAS_CHAT_ID,
        body.chat_id.as_deref().is_some_and(|id| !id.is_empty()),
    );

    match body.error() {
        None => {
            let answer = body.answer().unwrap_or_default();
            reporter.record_check(labels::HAS_ANSWER_TEXT, !answer.is_empty());
            info!(
                "Job {} finished. Answer: {}... ({} sources)",
                job_id,
                preview(answer, ANSWER_PREVIEW_CHARS),
                body.source_count()
            );
        }
        Some(error) => {
            reporter.record_check(labels::HAS_ERROR, error.code_is_truthy());
            info!(
                "Job {} finished with error code {}",
                job_id,
                error.code_label()
            );
        }
    }
}

/// First `max_chars` characters of `text`
pub fn preview(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
