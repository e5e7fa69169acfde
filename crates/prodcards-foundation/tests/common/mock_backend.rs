//! Mock completion backend
//!
//! [`MockBackend`] implements [`CompletionBackend`] and records every call.
//! Responses are queued at build time and returned in FIFO order; once the
//! queue is empty a plain `"mock card"` payload is returned.
//!
//! ```rust,ignore
//! let mock = MockBackend::builder()
//!     .fail_with(LLMError::Timeout("read timed out".into()))
//!     .respond_with_text("CARD TEXT")
//!     .build();
//! ```

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use prodcards_kernel::llm::{
    CompletionBackend, CompletionPayload, CompletionRequest, LLMError, LLMResult,
};

#[derive(Default)]
struct MockState {
    calls: Vec<CompletionRequest>,
    responses: VecDeque<LLMResult<CompletionPayload>>,
}

/// Deterministic stand-in for a remote LLM
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn builder() -> MockBackendBuilder {
        MockBackendBuilder::default()
    }

    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    pub fn calls(&self) -> Vec<CompletionRequest> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap()
            .calls
            .last()
            .map(|c| c.prompt.clone())
    }
}

#[async_trait]
impl CompletionBackend for MockBackend {
    fn name(&self) -> &str {
        "mock"
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: CompletionRequest) -> LLMResult<CompletionPayload> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(request);
        state
            .responses
            .pop_front()
            .unwrap_or_else(|| Ok(CompletionPayload::from_text("mock card")))
    }
}

/// FIFO builder for [`MockBackend`]
#[derive(Default)]
pub struct MockBackendBuilder {
    responses: VecDeque<LLMResult<CompletionPayload>>,
}

impl MockBackendBuilder {
    pub fn respond_with_text(self, text: &str) -> Self {
        self.respond_with(CompletionPayload::from_text(text))
    }

    pub fn respond_with(mut self, payload: CompletionPayload) -> Self {
        self.responses.push_back(Ok(payload));
        self
    }

    pub fn respond_with_json(self, value: serde_json::Value) -> Self {
        let payload = serde_json::from_value(value).unwrap();
        self.respond_with(payload)
    }

    pub fn fail_with(mut self, error: LLMError) -> Self {
        self.responses.push_back(Err(error));
        self
    }

    pub fn build(self) -> MockBackend {
        MockBackend {
            state: Arc::new(Mutex::new(MockState {
                calls: Vec::new(),
                responses: self.responses,
            })),
        }
    }
}
