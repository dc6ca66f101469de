//! In-memory collaborators and observers for exercising workflows.
//!
//! Every mock records the requests it receives and answers with a scripted
//! response. Failures can be queued ahead of the response to simulate
//! transient outages.

use crate::collaborator::{
    ApiRequest, CollaboratorError, Collaborators, ContextGenerator, ContextRequest, Delivery,
    HttpRequester, ImageGenerator, ImageRequest, Notification, Notifier, PortfolioAnalyzer,
    SheetFetcher,
};
use crate::execution::{ExecutionEvent, ExecutionObserver};
use async_trait::async_trait;
use rootcause::prelude::Report;
use serde_json::{Value as JsonValue, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

struct Script<Req, Resp> {
    response: Resp,
    failures: VecDeque<CollaboratorError>,
    always_fail: Option<CollaboratorError>,
    delay: Option<Duration>,
    calls: Vec<Req>,
}

/// A scripted collaborator that records every request.
pub struct MockService<Req, Resp> {
    script: Arc<Mutex<Script<Req, Resp>>>,
}

impl<Req: Clone, Resp: Clone> MockService<Req, Resp> {
    /// Creates a mock that answers every call with `response`.
    #[must_use]
    pub fn new(response: Resp) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                response,
                failures: VecDeque::new(),
                always_fail: None,
                delay: None,
                calls: Vec::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Script<Req, Resp>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the scripted response.
    pub fn respond_with(&self, response: Resp) {
        self.lock().response = response;
    }

    /// Fails the next call that has not already been scripted to fail.
    pub fn fail_next(&self, error: CollaboratorError) {
        self.lock().failures.push_back(error);
    }

    /// Fails every call from now on.
    pub fn fail_always(&self, error: CollaboratorError) {
        self.lock().always_fail = Some(error);
    }

    /// Delays every answer.
    pub fn with_delay(&self, delay: Duration) {
        self.lock().delay = Some(delay);
    }

    /// Returns the requests received so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Req> {
        self.lock().calls.clone()
    }

    /// Returns how many calls were made.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.lock().calls.len()
    }

    async fn call(&self, request: Req) -> Result<Resp, Report<CollaboratorError>> {
        let (outcome, delay) = {
            let mut script = self.lock();
            script.calls.push(request);
            let outcome = match script.failures.pop_front().or_else(|| script.always_fail.clone()) {
                Some(error) => Err(error),
                None => Ok(script.response.clone()),
            };
            (outcome, script.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        outcome.map_err(Report::from)
    }
}

pub type MockSheetFetcher = MockService<String, Vec<JsonValue>>;
pub type MockContextGenerator = MockService<ContextRequest, String>;
pub type MockImageGenerator = MockService<ImageRequest, String>;
pub type MockPortfolioAnalyzer = MockService<JsonValue, String>;
pub type MockNotifier = MockService<Notification, Delivery>;
pub type MockHttpRequester = MockService<ApiRequest, JsonValue>;

#[async_trait]
impl SheetFetcher for MockSheetFetcher {
    async fn fetch_rows(&self, link: &str) -> Result<Vec<JsonValue>, Report<CollaboratorError>> {
        self.call(link.to_string()).await
    }
}

#[async_trait]
impl ContextGenerator for MockContextGenerator {
    async fn generate_context(
        &self,
        request: ContextRequest,
    ) -> Result<String, Report<CollaboratorError>> {
        self.call(request).await
    }
}

#[async_trait]
impl ImageGenerator for MockImageGenerator {
    async fn generate(&self, request: ImageRequest) -> Result<String, Report<CollaboratorError>> {
        self.call(request).await
    }
}

#[async_trait]
impl PortfolioAnalyzer for MockPortfolioAnalyzer {
    async fn analyze(&self, rows: JsonValue) -> Result<String, Report<CollaboratorError>> {
        self.call(rows).await
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(
        &self,
        notification: Notification,
    ) -> Result<Delivery, Report<CollaboratorError>> {
        self.call(notification).await
    }
}

#[async_trait]
impl HttpRequester for MockHttpRequester {
    async fn send(&self, request: ApiRequest) -> Result<JsonValue, Report<CollaboratorError>> {
        self.call(request).await
    }
}

/// One mock per collaborator, with deterministic default responses.
pub struct MockCollaborators {
    pub sheets: Arc<MockSheetFetcher>,
    pub context: Arc<MockContextGenerator>,
    pub images: Arc<MockImageGenerator>,
    pub portfolio: Arc<MockPortfolioAnalyzer>,
    pub notifier: Arc<MockNotifier>,
    pub http: Arc<MockHttpRequester>,
}

impl MockCollaborators {
    /// Creates mocks that return one sheet row, fixed text and a fixed sheet URL.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sheets: Arc::new(MockService::new(vec![json!({ "col": "x" })])),
            context: Arc::new(MockService::new("Generated context".to_string())),
            images: Arc::new(MockService::new("https://x/sheet".to_string())),
            portfolio: Arc::new(MockService::new("Portfolio report".to_string())),
            notifier: Arc::new(MockService::new(Delivery::default())),
            http: Arc::new(MockService::new(json!({ "ok": true }))),
        }
    }

    /// Returns the mocks as trait objects for a registry.
    #[must_use]
    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            sheets: self.sheets.clone(),
            context: self.context.clone(),
            images: self.images.clone(),
            portfolio: self.portfolio.clone(),
            notifier: self.notifier.clone(),
            http: self.http.clone(),
        }
    }

    /// Returns the number of calls across every collaborator.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.sheets.call_count()
            + self.context.call_count()
            + self.images.call_count()
            + self.portfolio.call_count()
            + self.notifier.call_count()
            + self.http.call_count()
    }
}

impl Default for MockCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer that keeps every event it receives.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<ExecutionEvent>>,
}

impl RecordingObserver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the events received so far.
    #[must_use]
    pub fn events(&self) -> Vec<ExecutionEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ExecutionObserver for RecordingObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
