//! The assembled widget and its page mount
//!
//! A [`WidgetBundle`] is what a load produces: manifest, stripped template,
//! stylesheet contents and script modules. Its content never changes after
//! the loader builds it. It also carries a handle to the mock registry so
//! tests can adjust mocks between cases, and tracks which page elements its
//! `load()` created so `unload()` removes only those.

use crate::mock::{MockRegistry, MockRule};
use crate::modules::ScriptModule;
use crate::page::{NodeHandle, Page};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};

/// Parsed `manifest.json`
///
/// Only `src` is interpreted; every other field is kept as-is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WidgetManifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl WidgetManifest {
    /// True for `{}`
    pub fn is_empty(&self) -> bool {
        self.src.is_none() && self.extra.is_empty()
    }
}

/// A fetched stylesheet
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssetFile {
    /// Path as written in the template
    pub path: String,
    pub content: String,
}

/// A loaded script
#[derive(Debug, Clone)]
pub struct ScriptAsset {
    /// Path as written in the template
    pub path: String,
    pub module: Arc<dyn ScriptModule>,
}

#[derive(Debug, Default)]
struct MountState {
    /// Container created by this bundle (none when it pre-existed)
    container: Option<NodeHandle>,
    styles: Vec<NodeHandle>,
}

#[derive(Debug)]
pub struct WidgetBundle {
    name: String,
    manifest: WidgetManifest,
    html: String,
    css_style_sheets: Vec<AssetFile>,
    js_scripts: Vec<ScriptAsset>,
    registry: MockRegistry,
    default_persona: String,
    container_id: String,
    mount: Mutex<MountState>,
}

impl WidgetBundle {
    pub(crate) fn new(
        name: &str,
        parts: BundleParts,
        registry: MockRegistry,
        default_persona: &str,
        container_id: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            manifest: parts.manifest,
            html: parts.html,
            css_style_sheets: parts.css_style_sheets,
            js_scripts: parts.js_scripts,
            registry,
            default_persona: default_persona.to_string(),
            container_id: container_id.to_string(),
            mount: Mutex::new(MountState::default()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The manifest, or `{}` if it could not be loaded
    pub fn manifest(&self) -> &WidgetManifest {
        &self.manifest
    }

    /// Template without stylesheet links and script tags; empty if unavailable
    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn css_style_sheets(&self) -> &[AssetFile] {
        &self.css_style_sheets
    }

    pub fn js_scripts(&self) -> &[ScriptAsset] {
        &self.js_scripts
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    /// Drop all mocks and go back to the default persona's rules
    pub fn clear(&self) -> &Self {
        self.registry.clear_rules().apply_persona(&self.default_persona);
        self
    }

    /// Add one mock rule; call [`restart`](Self::restart) before relying on it
    pub fn mock(&self, rule: MockRule) -> &Self {
        self.registry.add_rule(rule);
        self
    }

    /// Restart the fake server so it answers with the current rules
    pub fn restart(&self) -> &Self {
        self.registry.start();
        self
    }

    /// Mount into `page`
    ///
    /// Reuses an element with the container id anywhere in the page if there
    /// is one, otherwise appends a hidden one to the body. Stylesheets are injected once; scripts run on
    /// every call.
    pub fn load(&self, page: &mut Page) {
        let mut state = self.lock_mount();

        let container = match page.get_element_by_id(&self.container_id).map(|e| e.handle()) {
            Some(h) => h,
            None => {
                let mut el = page.create_element("div");
                el.set_attribute("id", &self.container_id);
                el.set_attribute("style", "visibility: hidden;");
                let h = page.append_child(el);
                state.container = Some(h);
                h
            }
        };
        if let Some(el) = page.element_mut(container) {
            el.set_inner_html(&self.html);
        }

        if state.styles.is_empty() {
            for sheet in &self.css_style_sheets {
                let mut style = page.create_element("style");
                style.set_inner_html(&sheet.content);
                state.styles.push(page.append_child(style));
            }
        }
        drop(state);

        for script in &self.js_scripts {
            log::debug!("{}: running {}", self.name, script.module.id());
            script.module.invoke(page);
        }
    }

    /// Remove what [`load`](Self::load) added
    ///
    /// A container that existed before `load()` is left in place. Without a
    /// prior `load()` this does nothing.
    pub fn unload(&self, page: &mut Page) {
        let mut state = self.lock_mount();
        if let Some(h) = state.container.take() {
            page.remove(h);
        }
        for h in state.styles.drain(..) {
            page.remove(h);
        }
    }

    /// JSON description of the bundle (paths, ids and sizes, not callables)
    pub fn summary(&self) -> serde_json::Value {
        serde_json::json!({
            "name": self.name,
            "manifest": self.manifest,
            "html": self.html,
            "cssStyleSheets": self.css_style_sheets,
            "jsScripts": self.js_scripts.iter().map(|s| serde_json::json!({
                "path": s.path,
                "module": s.module.id(),
                "size": s.module.source().map(str::len),
            })).collect::<Vec<_>>(),
        })
    }

    fn lock_mount(&self) -> MutexGuard<'_, MountState> {
        self.mount.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Stage outputs the loader hands over
#[derive(Debug, Default)]
pub(crate) struct BundleParts {
    pub manifest: WidgetManifest,
    pub html: String,
    pub css_style_sheets: Vec<AssetFile>,
    pub js_scripts: Vec<ScriptAsset>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::SourceModule;

    fn bundle() -> WidgetBundle {
        let parts = BundleParts {
            manifest: WidgetManifest { src: Some("footer.html".into()), extra: Default::default() },
            html: "<p>footer</p>".into(),
            css_style_sheets: vec![AssetFile { path: "css/footer.css".into(), content: "p{}".into() }],
            js_scripts: vec![ScriptAsset { path: "js/footer.js".into(), module: Arc::new(SourceModule::new("footer/js/footer", "")) }],
        };
        WidgetBundle::new("footer", parts, MockRegistry::new(), "basic", "widget-container")
    }

    #[test]
    fn manifest_keeps_unknown_fields() {
        let m: WidgetManifest = serde_json::from_str(r#"{"src": "a.html", "i18n": {"default": "x"}}"#).unwrap();
        assert_eq!(m.src.as_deref(), Some("a.html"));
        assert!(m.extra.contains_key("i18n"));
        assert!(WidgetManifest::default().is_empty());
    }

    #[test]
    fn load_creates_container_and_unload_removes_it() {
        let b = bundle();
        let mut page = Page::new();
        b.load(&mut page);
        let c = page.get_element_by_id("widget-container").unwrap();
        assert_eq!(c.inner_html(), "<p>footer</p>");
        assert_eq!(c.attribute("style"), Some("visibility: hidden;"));
        assert_eq!(page.elements_by_tag("style").count(), 1);
        assert_eq!(page.executed_scripts().len(), 1);

        b.unload(&mut page);
        assert!(page.body_elements().is_empty());
    }

    #[test]
    fn repeated_load_injects_styles_once() {
        let b = bundle();
        let mut page = Page::new();
        b.load(&mut page);
        b.load(&mut page);
        assert_eq!(page.elements_by_tag("style").count(), 1);
        assert_eq!(page.elements_by_tag("div").count(), 1);
        assert_eq!(page.executed_scripts().len(), 2);
    }

    #[test]
    fn pre_existing_container_survives_unload() {
        let b = bundle();
        let mut page = Page::parse("<html><body><div id=\"widget-container\"></div></body></html>");
        b.load(&mut page);
        assert_eq!(page.get_element_by_id("widget-container").unwrap().inner_html(), "<p>footer</p>");
        b.unload(&mut page);
        assert!(page.get_element_by_id("widget-container").is_some());
        assert_eq!(page.elements_by_tag("style").count(), 0);
    }

    #[test]
    fn nested_container_is_reused() {
        let b = bundle();
        let mut page = Page::parse("<html><body><main><div id=\"widget-container\">old</div></main></body></html>");
        b.load(&mut page);
        assert_eq!(page.elements_by_tag("div").filter(|e| e.id() == Some("widget-container")).count(), 1);
        assert_eq!(page.body_elements()[0].inner_html(), "<div id=\"widget-container\"><p>footer</p></div>");

        b.unload(&mut page);
        assert_eq!(page.body_elements().len(), 1);
        assert!(page.get_element_by_id("widget-container").is_some());
        assert_eq!(page.elements_by_tag("style").count(), 0);
    }

    #[test]
    fn unload_without_load_is_noop() {
        let b = bundle();
        let mut page = Page::parse("<html><body><div id=\"widget-container\">keep</div><p>other</p></body></html>");
        b.unload(&mut page);
        assert_eq!(page.body_elements().len(), 2);
        assert_eq!(page.get_element_by_id("widget-container").unwrap().inner_html(), "keep");
    }

    #[test]
    fn clear_resets_to_persona_rules() {
        let b = bundle();
        b.mock(MockRule::json("GET", "/api/x", "{}"));
        assert_eq!(b.registry().rules().len(), 1);
        b.clear();
        let urls: Vec<String> = b.registry().rules().iter().map(|r| r.url.to_string()).collect();
        assert_eq!(urls, vec!["/api/me", "/api/config", "/api/ui/widgets"]);
    }

    #[test]
    fn restart_actually_starts() {
        let b = bundle();
        assert!(!b.registry().is_active());
        b.clear().mock(MockRule::json("GET", "/api/ex1", "{}")).restart();
        assert!(b.registry().is_active());
        assert!(b.registry().is_intercepted("GET", "/api/ex1"));
    }

    #[test]
    fn summary_lists_paths() {
        let s = bundle().summary();
        assert_eq!(s["cssStyleSheets"][0]["path"], "css/footer.css");
        assert_eq!(s["jsScripts"][0]["module"], "footer/js/footer");
        assert_eq!(s["manifest"]["src"], "footer.html");
    }
}
