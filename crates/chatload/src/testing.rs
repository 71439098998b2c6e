//! Scripted `JobApi` for exercising scenarios without a server

use std::collections::VecDeque;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::client::JobApi;
use crate::error::{HarnessError, Result};
use crate::model::{JobRequest, RawResponse};

type Scripted = std::result::Result<RawResponse, String>;

#[derive(Default)]
struct Script {
    queue: VecDeque<Scripted>,
    fallback: Option<RawResponse>,
}

impl Script {
    fn next(&mut self) -> Result<RawResponse> {
        match self.queue.pop_front() {
            Some(Ok(raw)) => Ok(raw),
            Some(Err(reason)) => Err(HarnessError::Transport(reason)),
            None => self
                .fallback
                .clone()
                .ok_or_else(|| HarnessError::Transport("no scripted response left".into())),
        }
    }
}

/// Replays queued responses in order and records every call
///
/// Once a queue runs dry the fallback response (if any) is returned; otherwise the
/// call fails like a refused connection.
#[derive(Default)]
pub struct ScriptedApi {
    submits: Mutex<Script>,
    statuses: Mutex<Script>,
    submitted: Mutex<Vec<JobRequest>>,
    polled: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a submission response
    pub fn submit(self, status: u16, body: &str) -> Self {
        self.submits
            .lock()
            .queue
            .push_back(Ok(RawResponse::new(status, body)));
        self
    }

    /// Queue a submission transport failure
    pub fn submit_error(self, reason: &str) -> Self {
        self.submits.lock().queue.push_back(Err(reason.to_string()));
        self
    }

    /// Response for every submission after the queue is drained
    pub fn submit_fallback(self, status: u16, body: &str) -> Self {
        self.submits.lock().fallback = Some(RawResponse::new(status, body));
        self
    }

    /// Queue a status response
    pub fn status(self, status: u16, body: &str) -> Self {
        self.status_repeated(status, body, 1)
    }

    /// Queue the same status response `times` times
    pub fn status_repeated(self, status: u16, body: &str, times: usize) -> Self {
        {
            let mut script = self.statuses.lock();
            for _ in 0..times {
                script.queue.push_back(Ok(RawResponse::new(status, body)));
            }
        }
        self
    }

    /// Queue a status transport failure
    pub fn status_error(self, reason: &str) -> Self {
        self.statuses.lock().queue.push_back(Err(reason.to_string()));
        self
    }

    /// Response for every poll after the queue is drained
    pub fn status_fallback(self, status: u16, body: &str) -> Self {
        self.statuses.lock().fallback = Some(RawResponse::new(status, body));
        self
    }

    /// Requests submitted so far
    pub fn submitted(&self) -> Vec<JobRequest> {
        self.submitted.lock().clone()
    }

    pub fn submit_calls(&self) -> usize {
        self.submitted.lock().len()
    }

    /// Status URLs polled so far, in order
    pub fn status_calls(&self) -> Vec<String> {
        self.polled.lock().clone()
    }
}

#[async_trait]
impl JobApi for ScriptedApi {
    async fn submit(&self, request: &JobRequest) -> Result<RawResponse> {
        self.submitted.lock().push(request.clone());
        self.submits.lock().next()
    }

    async fn fetch_status(&self, status_url: &str) -> Result<RawResponse> {
        self.polled.lock().push(status_url.to_string());
        self.statuses.lock().next()
    }
}
