//! Request mock registry
//!
//! The registry is the switchboard that decides, for every request made
//! through a [`MockedFetcher`](crate::fetch::MockedFetcher) while it is
//! active, whether to serve a canned response or let the call through to the
//! real network.
//!
//! Rules live in an ordered list. The pass-through filter installed on the
//! fake network layer reads that list live, but responses are copied into the
//! fake layer when [`MockRegistry::start`] runs. Add rules, then `start()` (or
//! `restart()` on a bundle) before relying on their responses.
//!
//! ```
//! use rfwidget::mock::{MockRegistry, MockRule};
//!
//! let registry = MockRegistry::new();
//! registry.apply_persona("basic");
//! registry.add_rule(MockRule::json("GET", "/api/ex1", r#"{"prop1":"value1"}"#));
//! registry.start();
//!
//! assert!(registry.is_intercepted("get", "/API/ME"));
//! assert!(!registry.is_intercepted("GET", "/api/unknown"));
//! ```

pub mod fake_server;
pub mod persona;

pub use fake_server::{FakeNetwork, FakeNetworkFactory, FakeServer, PassThroughFilter, Routed};
pub use persona::{Persona, PersonaCatalog};

use crate::{RequestAction, RequestInfo};
use regex::Regex;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

/// URL pattern of a mock rule
#[derive(Debug, Clone)]
pub enum UrlPattern {
    /// Case-insensitive exact match against the whole URL
    Exact(String),
    /// Regular expression search against the URL
    Regex(Regex),
}

impl UrlPattern {
    /// Whether `url` is matched by this pattern
    pub fn matches(&self, url: &str) -> bool {
        match self {
            UrlPattern::Exact(s) => s.eq_ignore_ascii_case(url),
            UrlPattern::Regex(re) => re.is_match(url),
        }
    }
}

impl fmt::Display for UrlPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UrlPattern::Exact(s) => f.write_str(s),
            UrlPattern::Regex(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

impl From<&str> for UrlPattern {
    fn from(s: &str) -> Self {
        UrlPattern::Exact(s.to_string())
    }
}

impl From<String> for UrlPattern {
    fn from(s: String) -> Self {
        UrlPattern::Exact(s)
    }
}

impl From<Regex> for UrlPattern {
    fn from(re: Regex) -> Self {
        UrlPattern::Regex(re)
    }
}

/// A fixed (status, headers, body) response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl CannedResponse {
    pub fn new(status: u16, headers: HashMap<String, String>, body: impl Into<String>) -> Self {
        Self { status, headers, body: body.into() }
    }

    /// The response a fake server gives when nothing is registered for a request
    pub fn not_found() -> Self {
        Self::new(404, HashMap::new(), "")
    }

    pub fn into_action(self) -> RequestAction {
        RequestAction::Fulfill { status: self.status, headers: self.headers, body: self.body.into_bytes() }
    }
}

/// Handler that synthesizes a response from the captured request
pub type ResponseHandler = Arc<dyn Fn(&RequestInfo) -> CannedResponse + Send + Sync>;

/// What a matched rule answers with
#[derive(Clone)]
pub enum MockResponse {
    Canned(CannedResponse),
    Handler(ResponseHandler),
}

impl MockResponse {
    /// Produce the concrete response for `request`
    pub fn respond(&self, request: &RequestInfo) -> CannedResponse {
        match self {
            MockResponse::Canned(c) => c.clone(),
            MockResponse::Handler(h) => h(request),
        }
    }
}

impl fmt::Debug for MockResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MockResponse::Canned(c) => f.debug_tuple("Canned").field(c).finish(),
            MockResponse::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

impl From<CannedResponse> for MockResponse {
    fn from(c: CannedResponse) -> Self {
        MockResponse::Canned(c)
    }
}

/// One interceptable request definition
#[derive(Debug, Clone)]
pub struct MockRule {
    /// HTTP verb, stored upper-cased
    pub method: String,
    pub url: UrlPattern,
    pub response: MockResponse,
}

impl MockRule {
    pub fn new(method: &str, url: impl Into<UrlPattern>, response: impl Into<MockResponse>) -> Self {
        Self { method: method.to_ascii_uppercase(), url: url.into(), response: response.into() }
    }

    /// Rule answering `200` with a JSON content type and the given body
    pub fn json(method: &str, url: impl Into<UrlPattern>, body: &str) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self::new(method, url, CannedResponse::new(200, headers, body))
    }

    /// Rule whose response is computed per request
    pub fn handler<F>(method: &str, url: impl Into<UrlPattern>, handler: F) -> Self
    where
        F: Fn(&RequestInfo) -> CannedResponse + Send + Sync + 'static,
    {
        Self { method: method.to_ascii_uppercase(), url: url.into(), response: MockResponse::Handler(Arc::new(handler)) }
    }

    /// Identity key used to merge rules: (method, pattern as text)
    pub fn key(&self) -> (String, String) {
        (self.method.clone(), self.url.to_string())
    }

    /// Whether this rule covers a request with `method` and `url`
    pub fn matches(&self, method: &str, url: &str) -> bool {
        self.method.eq_ignore_ascii_case(method) && self.url.matches(url)
    }
}

/// First rule in `rules` (insertion order) matching the request
pub(crate) fn find_rule<'a>(rules: &'a [MockRule], method: &str, url: &str) -> Option<&'a MockRule> {
    rules.iter().find(|r| r.matches(method, url))
}

struct Inner {
    rules: Arc<RwLock<Vec<MockRule>>>,
    persona: Mutex<String>,
    server: Mutex<Option<Box<dyn FakeNetwork>>>,
    catalog: PersonaCatalog,
    factory: Arc<dyn FakeNetworkFactory>,
    auto_respond_after: Duration,
}

/// Handle to a mock registry
///
/// Cloning is cheap and every clone refers to the same rules and fake
/// server. Each test run builds its own registry; nothing is global.
#[derive(Clone)]
pub struct MockRegistry {
    inner: Arc<Inner>,
}

impl Default for MockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for MockRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRegistry")
            .field("persona", &self.persona())
            .field("rules", &self.rules().len())
            .field("active", &self.is_active())
            .finish()
    }
}

impl MockRegistry {
    /// Registry with the built-in persona catalog and the in-process fake server
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MockRegistryBuilder {
        MockRegistryBuilder::default()
    }

    /// (Re)activate interception. An already running fake server is stopped first.
    pub fn start(&self) -> &Self {
        let mut server = self.lock_server();
        if let Some(mut old) = server.take() {
            old.restore();
        }

        let mut fake = self.inner.factory.create();
        let rules = self.rules();
        for rule in &rules {
            fake.respond_with(&rule.method, &rule.url, rule.response.clone());
        }

        // The filter reads the live rule list; a request is passed through when no rule covers it
        let live = Arc::clone(&self.inner.rules);
        fake.add_filter(Arc::new(move |method: &str, url: &str| {
            match live.read() {
                Ok(rules) => find_rule(&rules, method, url).is_none(),
                Err(_) => true,
            }
        }));
        fake.set_auto_respond(self.inner.auto_respond_after);

        log::debug!("mock server started with {} rule(s)", rules.len());
        *server = Some(fake);
        self
    }

    /// Deactivate interception. Safe to call when not running.
    pub fn stop(&self) -> &Self {
        if let Some(mut fake) = self.lock_server().take() {
            fake.restore();
            log::debug!("mock server stopped");
        }
        self
    }

    pub fn is_active(&self) -> bool {
        self.lock_server().is_some()
    }

    /// Simulate a persona by adding its rules. Unknown names add nothing.
    pub fn apply_persona(&self, name: &str) -> &Self {
        if let Ok(mut p) = self.inner.persona.lock() {
            *p = name.to_string();
        }
        match self.inner.catalog.get(name) {
            Some(persona) => {
                for rule in &persona.rules {
                    self.add_rule(rule.clone());
                }
            }
            None if !name.is_empty() => log::debug!("unknown persona '{}' ignored", name),
            None => {}
        }
        self
    }

    /// Name of the persona last applied (empty when none)
    pub fn persona(&self) -> String {
        self.inner.persona.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Add a rule, or replace the response of the rule with the same key
    pub fn add_rule(&self, rule: MockRule) -> &Self {
        if let Ok(mut rules) = self.inner.rules.write() {
            let key = rule.key();
            match rules.iter_mut().find(|r| r.key() == key) {
                Some(existing) => existing.response = rule.response,
                None => rules.push(rule),
            }
        }
        self
    }

    /// Remove every rule. Leaves the server running or stopped as it was.
    pub fn clear_rules(&self) -> &Self {
        if let Ok(mut rules) = self.inner.rules.write() {
            rules.clear();
        }
        self
    }

    /// Snapshot of the current rules in insertion order
    pub fn rules(&self) -> Vec<MockRule> {
        self.inner.rules.read().map(|r| r.clone()).unwrap_or_default()
    }

    /// Whether a request would be intercepted right now
    pub fn is_intercepted(&self, method: &str, url: &str) -> bool {
        if !self.is_active() {
            return false;
        }
        self.inner.rules.read().map(|r| find_rule(&r, method, url).is_some()).unwrap_or(false)
    }

    /// Decide how a request is answered. Inactive registries always continue.
    ///
    /// Handler responses run after the server lock is released, so a handler
    /// may use the registry itself.
    pub fn handle(&self, request: &RequestInfo) -> RequestAction {
        let routed = match self.lock_server().as_ref() {
            Some(fake) => fake.route(request),
            None => Routed::PassThrough,
        };
        routed.into_action(request)
    }

    /// Delay the fake server waits before answering an intercepted request
    pub fn auto_respond_after(&self) -> Duration {
        self.inner.auto_respond_after
    }

    fn lock_server(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn FakeNetwork>>> {
        // A panic while holding the lock leaves the server state usable
        self.inner.server.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Builder for [`MockRegistry`]
pub struct MockRegistryBuilder {
    catalog: PersonaCatalog,
    factory: Arc<dyn FakeNetworkFactory>,
    auto_respond_after: Duration,
}

impl Default for MockRegistryBuilder {
    fn default() -> Self {
        Self { catalog: PersonaCatalog::builtin(), factory: Arc::new(FakeServer::factory()), auto_respond_after: Duration::ZERO }
    }
}

impl MockRegistryBuilder {
    pub fn catalog(mut self, catalog: PersonaCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn fake_network(mut self, factory: impl FakeNetworkFactory + 'static) -> Self {
        self.factory = Arc::new(factory);
        self
    }

    pub fn auto_respond_after(mut self, delay: Duration) -> Self {
        self.auto_respond_after = delay;
        self
    }

    pub fn build(self) -> MockRegistry {
        MockRegistry {
            inner: Arc::new(Inner {
                rules: Arc::new(RwLock::new(Vec::new())),
                persona: Mutex::new(String::new()),
                server: Mutex::new(None),
                catalog: self.catalog,
                factory: self.factory,
                auto_respond_after: self.auto_respond_after,
            }),
        }
    }
}
