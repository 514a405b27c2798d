//! Mock Generation Backend for Testing
//!
//! Returns scripted replies and records every request it sees.

use async_trait::async_trait;
use quickreply::backend::{GenerationBackend, GenerationRequest};
use quickreply::error::{ReplyError, ReplyResult};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

pub struct MockBackend {
    /// Replies handed out in order
    responses: Mutex<VecDeque<ReplyResult<String>>>,
    /// Every request received
    pub requests: Arc<Mutex<Vec<GenerationRequest>>>,
    /// When set, each call waits for a permit before answering
    hold: Option<Arc<Semaphore>>,
    /// When set, the next call panics instead of answering
    panic_next: AtomicBool,
}

impl MockBackend {
    pub fn new(responses: Vec<ReplyResult<String>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Arc::new(Mutex::new(Vec::new())),
            hold: None,
            panic_next: AtomicBool::new(false),
        }
    }

    /// Backend that always answers with the given texts, in order
    pub fn replying(texts: &[&str]) -> Self {
        Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
    }

    /// Calls block until `release` is called
    pub fn held(mut self) -> Self {
        self.hold = Some(Arc::new(Semaphore::new(0)));
        self
    }

    /// The first call panics; later calls follow the script
    pub fn panicking_first(self) -> Self {
        self.panic_next.store(true, Ordering::SeqCst);
        self
    }

    /// Let one pending (or future) call through
    pub fn release(&self) {
        if let Some(hold) = &self.hold {
            hold.add_permits(1);
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl GenerationBackend for MockBackend {
    async fn generate(&self, request: &GenerationRequest) -> ReplyResult<String> {
        self.requests.lock().unwrap().push(request.clone());
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("mock backend blew up");
        }

        if let Some(hold) = &self.hold {
            if let Ok(permit) = hold.acquire().await {
                permit.forget();
            }
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ReplyError::generation("no scripted response left")))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_prompt: "be nice".to_string(),
            user_prompt: "hello".to_string(),
            max_output_tokens: 10,
            temperature: 0.0,
            structured: false,
        }
    }

    #[tokio::test]
    async fn test_mock_backend_replays_script() {
        let mock = MockBackend::replying(&["one", "two"]);
        assert_eq!(mock.generate(&request()).await.unwrap(), "one");
        assert_eq!(mock.generate(&request()).await.unwrap(), "two");
        assert!(mock.generate(&request()).await.is_err());
        assert_eq!(mock.calls(), 3);
    }
}
