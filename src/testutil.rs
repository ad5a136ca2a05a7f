//! Hand-rolled gateway fakes shared across test modules.

use crate::gateway::{GatewayError, GenerationGateway, GenerationRequest};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Gateway that replays a scripted sequence of responses and counts calls.
///
/// Calls beyond the script fail, so a test that makes an unexpected extra
/// gateway call surfaces it instead of hanging on a default.
pub(crate) struct ScriptedGateway {
    responses: Mutex<VecDeque<Result<String, GatewayError>>>,
    calls: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn push_ok(&self, response: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.to_string()));
    }

    pub(crate) fn push_err(&self, error: GatewayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationGateway for ScriptedGateway {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(GatewayError::Upstream("script exhausted".to_string())))
    }
}

/// Gateway that is always unreachable
pub(crate) struct FailingGateway;

#[async_trait]
impl GenerationGateway for FailingGateway {
    async fn generate(&self, _request: &GenerationRequest) -> Result<String, GatewayError> {
        Err(GatewayError::Upstream("service unavailable".to_string()))
    }
}
