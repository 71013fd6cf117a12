use super::{CannedResponse, MockResponse, UrlPattern};
use crate::{RequestAction, RequestInfo};
use std::sync::Arc;
use std::time::Duration;

/// Where a fake network sends a request
#[derive(Debug, Clone)]
pub enum Routed {
    /// Not intercepted; the request goes to the real network
    PassThrough,
    /// Intercepted and answered with this response
    Respond(MockResponse),
}

impl Routed {
    /// Produce the concrete action, running a handler response if needed
    pub fn into_action(self, request: &RequestInfo) -> RequestAction {
        match self {
            Routed::PassThrough => RequestAction::Continue,
            Routed::Respond(response) => response.respond(request).into_action(),
        }
    }
}

/// Filter consulted for every request: `true` means "let it through unmocked"
pub type PassThroughFilter = Arc<dyn Fn(&str, &str) -> bool + Send + Sync>;

/// Fake network layer driven by the registry
///
/// Implementations hold the responses registered with `respond_with` and
/// answer requests that no filter lets through.
pub trait FakeNetwork: Send {
    /// Register a response for requests matching (method, url)
    fn respond_with(&mut self, method: &str, url: &UrlPattern, response: MockResponse);

    /// Install a pass-through filter
    fn add_filter(&mut self, filter: PassThroughFilter);

    /// Answer intercepted requests automatically after `delay`
    fn set_auto_respond(&mut self, delay: Duration);

    /// Decide where `request` goes; the response itself is produced by the caller
    fn route(&self, request: &RequestInfo) -> Routed;

    /// Undo whatever interception was installed
    fn restore(&mut self);
}

/// Creates fresh fake network layers; called on every registry `start()`
pub trait FakeNetworkFactory: Send + Sync {
    fn create(&self) -> Box<dyn FakeNetwork>;
}

impl<F> FakeNetworkFactory for F
where
    F: Fn() -> Box<dyn FakeNetwork> + Send + Sync,
{
    fn create(&self) -> Box<dyn FakeNetwork> {
        self()
    }
}

struct Registered {
    method: String,
    url: UrlPattern,
    response: MockResponse,
}

/// In-process fake server
///
/// Requests are intercepted unless a filter lets them through. An intercepted
/// request is answered by the first registered response covering it, or a
/// `404` with an empty body when nothing was registered.
#[derive(Default)]
pub struct FakeServer {
    responses: Vec<Registered>,
    filters: Vec<PassThroughFilter>,
    auto_respond_after: Option<Duration>,
    restored: bool,
}

impl FakeServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Factory producing a new `FakeServer` per activation
    pub fn factory() -> impl FakeNetworkFactory {
        || Box::new(FakeServer::new()) as Box<dyn FakeNetwork>
    }

    pub fn auto_respond_after(&self) -> Option<Duration> {
        self.auto_respond_after
    }

    fn passes_through(&self, request: &RequestInfo) -> bool {
        self.filters.iter().any(|f| f(&request.method, &request.url))
    }
}

impl FakeNetwork for FakeServer {
    fn respond_with(&mut self, method: &str, url: &UrlPattern, response: MockResponse) {
        self.responses.push(Registered { method: method.to_ascii_uppercase(), url: url.clone(), response });
    }

    fn add_filter(&mut self, filter: PassThroughFilter) {
        self.filters.push(filter);
    }

    fn set_auto_respond(&mut self, delay: Duration) {
        self.auto_respond_after = Some(delay);
    }

    fn route(&self, request: &RequestInfo) -> Routed {
        if self.restored || self.passes_through(request) {
            return Routed::PassThrough;
        }
        let found = self
            .responses
            .iter()
            .find(|r| r.method.eq_ignore_ascii_case(&request.method) && r.url.matches(&request.url));
        match found {
            Some(r) => Routed::Respond(r.response.clone()),
            None => {
                log::debug!("no response registered for {} {}; answering 404", request.method, request.url);
                Routed::Respond(CannedResponse::not_found().into())
            }
        }
    }

    fn restore(&mut self) {
        self.restored = true;
        self.responses.clear();
        self.filters.clear();
    }
}
