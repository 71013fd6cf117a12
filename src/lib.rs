//! RFox Widget Harness
//!
//! A headless mock-and-test harness for widget-based web UIs. It loads a
//! single widget (manifest, HTML template, stylesheets and scripts), serves
//! programmable fake responses to the requests made along the way, and hands
//! back a [`WidgetBundle`] that tests can mount into a [`Page`] and inspect.
//!
//! # Features
//!
//! - **Mock registry**: ordered (method, URL pattern, response) rules with
//!   personas, start/stop/reset semantics and live pass-through filtering
//! - **Staged loader**: manifest → template → asset scan → parallel asset
//!   fetch, degrading each stage to an empty value instead of failing
//! - **Page model**: mount/unmount a bundle with container provenance tracking
//!
//! # Example
//!
//! ```no_run
//! use rfwidget::{HarnessConfig, Page, WidgetLoader};
//! use rfwidget::mock::MockRule;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let loader = WidgetLoader::from_base_url("http://localhost:8080/node_modules/oae-core/", HarnessConfig::default())?;
//! let footer = loader.load("footer").await;
//!
//! footer
//!     .clear()
//!     .mock(MockRule::json("GET", "/api/ex1", r#"{"prop1":"value1"}"#))
//!     .restart();
//!
//! let mut page = Page::new();
//! footer.load(&mut page);
//! assert!(page.get_element_by_id("widget-container").is_some());
//! footer.unload(&mut page);
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;

pub mod error;
pub use error::{Error, Result};

pub mod bundle;
pub mod extract;
pub mod fetch;
pub mod loader;
pub mod mock;
pub mod modules;
pub mod page;
pub mod resolver;

pub use bundle::{AssetFile, ScriptAsset, WidgetBundle, WidgetManifest};
pub use loader::WidgetLoader;
pub use page::Page;

/// Configuration for the widget harness
///
/// The defaults mirror the test scaffold widgets are written against:
/// - the `basic` persona is applied before every load
/// - mounted widgets go in a hidden `#widget-container` element
/// - mocked responses are delivered with no delay
///
/// # Examples
///
/// ```
/// let cfg = rfwidget::HarnessConfig::default();
/// assert_eq!(cfg.default_persona, "basic");
/// assert_eq!(cfg.container_id, "widget-container");
/// ```
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// User agent string sent with pass-through requests
    pub user_agent: String,
    /// Timeout for each pass-through request in milliseconds
    pub timeout_ms: u64,
    /// Custom HTTP headers sent with pass-through requests
    pub headers: HashMap<String, String>,
    /// Persona applied before loading and on `clear()`
    pub default_persona: String,
    /// Id of the element widgets are mounted into
    pub container_id: String,
    /// Delay before the fake server answers an intercepted request
    pub auto_respond_after_ms: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) Gecko/20100101 Firefox/115.0 RFOX-widget/0.1".to_string(),
            timeout_ms: 30000,
            headers: HashMap::new(),
            default_persona: "basic".to_string(),
            container_id: "widget-container".to_string(),
            auto_respond_after_ms: 0,
        }
    }
}

/// Information about an outgoing network request
#[derive(Debug, Clone)]
pub struct RequestInfo {
    /// Request URL
    pub url: String,
    /// HTTP method
    pub method: String,
    /// Optional resource type (manifest, template, stylesheet, script, xhr)
    pub resource_type: Option<String>,
    /// Headers
    pub headers: HashMap<String, String>,
    /// Request body, if any
    pub body: Option<String>,
}

impl RequestInfo {
    pub fn new(method: &str, url: &str) -> Self {
        Self {
            url: url.to_string(),
            method: method.to_string(),
            resource_type: None,
            headers: HashMap::new(),
            body: None,
        }
    }

    pub fn with_resource_type(mut self, kind: &str) -> Self {
        self.resource_type = Some(kind.to_string());
        self
    }
}

/// How an intercepted request should be handled.
#[derive(Debug, Clone)]
pub enum RequestAction {
    /// Let the request proceed normally
    Continue,

    /// Fulfill the request with a custom response
    Fulfill {
        /// HTTP status code
        status: u16,
        /// Response headers
        headers: HashMap<String, String>,
        /// Response body bytes
        body: Vec<u8>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = HarnessConfig::default();
        assert_eq!(config.timeout_ms, 30000);
        assert_eq!(config.auto_respond_after_ms, 0);
        assert!(config.user_agent.contains("RFOX"));
    }

    #[test]
    fn test_request_info() {
        let req = RequestInfo::new("GET", "/api/me").with_resource_type("xhr");
        assert_eq!(req.method, "GET");
        assert_eq!(req.resource_type.as_deref(), Some("xhr"));
        assert!(req.body.is_none());
    }
}
