//! Staged widget loader
//!
//! Loading goes through a fixed sequence of stages, each of which degrades to
//! an empty value instead of failing:
//!
//! 1. apply the default persona and (re)start the mock registry, so requests
//!    made as a side effect of loading are already intercepted
//! 2. fetch `<widget>/manifest.json`
//! 3. fetch the template named by the manifest's `src`
//! 4. strip stylesheet links and script tags from the template
//! 5. fetch stylesheets and load script modules, the two groups concurrently
//!
//! Every fetch goes through a [`MockedFetcher`], so a test can mock widget
//! files as well as API calls.

use crate::bundle::{AssetFile, BundleParts, ScriptAsset, WidgetBundle, WidgetManifest};
use crate::extract::{extract_assets, script_module_id};
use crate::fetch::{Fetcher, MockedFetcher};
use crate::mock::MockRegistry;
use crate::modules::{ModuleLoader, SourceModuleLoader};
use crate::resolver::PathResolver;
use crate::{HarnessConfig, RequestInfo, Result};
use futures::future::try_join_all;
use std::sync::Arc;

/// Loads widgets into [`WidgetBundle`]s
///
/// The loader keeps no per-load state, so concurrent loads (of the same or
/// different widgets) produce independent bundles. They do share the mock
/// registry, which each load resets to the default persona.
pub struct WidgetLoader {
    config: HarnessConfig,
    registry: MockRegistry,
    resolver: Arc<dyn PathResolver>,
    fetcher: Arc<MockedFetcher>,
    modules: Arc<dyn ModuleLoader>,
}

impl WidgetLoader {
    /// Loader whose scripts are fetched as source through the same mocked fetcher
    pub fn new(
        config: HarnessConfig,
        registry: MockRegistry,
        resolver: Arc<dyn PathResolver>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        let fetcher = Arc::new(MockedFetcher::new(fetcher, registry.clone()));
        let modules = Arc::new(SourceModuleLoader::new(fetcher.clone()));
        Self { config, registry, resolver, fetcher, modules }
    }

    /// Loader over HTTP (or `file://`) rooted at `base`, with a fresh registry
    #[cfg(feature = "http")]
    pub fn from_base_url(base: &str, config: HarnessConfig) -> Result<Self> {
        let resolver = Arc::new(crate::resolver::BaseUrlResolver::new(base)?);
        let fetcher = Arc::new(crate::fetch::HttpFetcher::new(&config)?);
        let registry = MockRegistry::builder()
            .auto_respond_after(std::time::Duration::from_millis(config.auto_respond_after_ms))
            .build();
        Ok(Self::new(config, registry, resolver, fetcher))
    }

    /// Replace how script modules are loaded
    pub fn with_module_loader(mut self, modules: Arc<dyn ModuleLoader>) -> Self {
        self.modules = modules;
        self
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run the whole pipeline for `name`. Never fails; see the module docs.
    pub async fn load(&self, name: &str) -> WidgetBundle {
        self.registry.apply_persona(&self.config.default_persona).start();

        let parts = self.assemble(name).await;
        log::debug!(
            "{}: loaded ({} bytes html, {} stylesheet(s), {} script(s))",
            name,
            parts.html.len(),
            parts.css_style_sheets.len(),
            parts.js_scripts.len()
        );
        WidgetBundle::new(name, parts, self.registry.clone(), &self.config.default_persona, &self.config.container_id)
    }

    /// Module-system style entry point: `on_ready` gets the bundle exactly once
    pub async fn load_with<F>(&self, name: &str, on_ready: F)
    where
        F: FnOnce(WidgetBundle),
    {
        let bundle = self.load(name).await;
        on_ready(bundle);
    }

    async fn assemble(&self, name: &str) -> BundleParts {
        let manifest = self.fetch_manifest(name).await;
        let src = match manifest.src.as_deref() {
            Some(src) if !src.is_empty() => src.to_string(),
            _ => {
                log::debug!("{}: manifest has no src; skipping template", name);
                return BundleParts { manifest, ..Default::default() };
            }
        };

        let template = match self.fetch_text(&self.resolver.to_url(&format!("{}/{}", name, src)), "template").await {
            Ok(t) => t,
            Err(e) => {
                log::warn!("{}: template unavailable: {}", name, e);
                return BundleParts { manifest, ..Default::default() };
            }
        };

        let assets = extract_assets(&template);
        let (css_style_sheets, js_scripts) =
            futures::join!(self.fetch_stylesheets(name, &assets.stylesheets), self.load_scripts(name, &assets.scripts));

        BundleParts { manifest, html: assets.html, css_style_sheets, js_scripts }
    }

    /// `{}` unless a 2xx response parsed as a manifest
    async fn fetch_manifest(&self, name: &str) -> WidgetManifest {
        let url = self.resolver.to_url(&format!("{}/manifest.json", name));
        match self.fetch_text(&url, "manifest").await {
            Ok(body) => serde_json::from_str(&body).unwrap_or_else(|e| {
                log::warn!("{}: manifest at {} is not valid JSON: {}", name, url, e);
                WidgetManifest::default()
            }),
            Err(e) => {
                log::warn!("{}: manifest unavailable: {}", name, e);
                WidgetManifest::default()
            }
        }
    }

    async fn fetch_text(&self, url: &str, kind: &str) -> Result<String> {
        let resp = self.fetcher.fetch(RequestInfo::new("GET", url).with_resource_type(kind)).await?;
        if resp.is_success() {
            Ok(resp.body)
        } else {
            Err(crate::Error::LoadError(format!("{} answered {}", url, resp.status)))
        }
    }

    /// All stylesheets or none
    async fn fetch_stylesheets(&self, name: &str, paths: &[String]) -> Vec<AssetFile> {
        let fetches = paths.iter().map(|path| async move {
            let url = self.resolver.to_url(&format!("{}/{}", name, path));
            let content = self.fetch_text(&url, "stylesheet").await?;
            Ok::<_, crate::Error>(AssetFile { path: path.clone(), content })
        });
        try_join_all(fetches).await.unwrap_or_else(|e| {
            log::warn!("{}: stylesheets unavailable: {}", name, e);
            Vec::new()
        })
    }

    /// All script modules or none
    async fn load_scripts(&self, name: &str, paths: &[String]) -> Vec<ScriptAsset> {
        let loads = paths.iter().map(|path| async move {
            let id = script_module_id(name, path);
            let url = self.resolver.to_url(&format!("{}/{}", name, path));
            let module = self.modules.load_module(&id, &url).await?;
            Ok::<_, crate::Error>(ScriptAsset { path: path.clone(), module })
        });
        try_join_all(loads).await.unwrap_or_else(|e| {
            log::warn!("{}: scripts unavailable: {}", name, e);
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::StaticFetcher;
    use crate::mock::MockRule;

    const BASE: &str = "http://widgets.test";

    fn loader(fetcher: Arc<StaticFetcher>) -> WidgetLoader {
        let resolver = Arc::new(|p: &str| format!("{}/{}", BASE, p));
        WidgetLoader::new(HarnessConfig::default(), MockRegistry::new(), resolver, fetcher)
    }

    #[tokio::test]
    async fn assembles_template_and_assets() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with("http://widgets.test/w/manifest.json", r#"{"src": "index.html"}"#)
                .with(
                    "http://widgets.test/w/index.html",
                    r#"<link rel="stylesheet" href="style.css"/><p>hi</p><script src="app.js"></script>"#,
                )
                .with("http://widgets.test/w/style.css", "p{color:red}")
                .with("http://widgets.test/w/app.js", "init()"),
        );
        let b = loader(fetcher).load("w").await;
        assert_eq!(b.html(), "<p>hi</p>");
        assert_eq!(b.css_style_sheets(), &[AssetFile { path: "style.css".into(), content: "p{color:red}".into() }]);
        assert_eq!(b.js_scripts().len(), 1);
        assert_eq!(b.js_scripts()[0].path, "app.js");
        assert_eq!(b.js_scripts()[0].module.id(), "w/app");
        assert_eq!(b.js_scripts()[0].module.source(), Some("init()"));
    }

    #[tokio::test]
    async fn failed_manifest_yields_empty_bundle() {
        let fetcher = Arc::new(StaticFetcher::new().with_status("http://widgets.test/w/manifest.json", 500, "boom"));
        let b = loader(fetcher.clone()).load("w").await;
        assert!(b.manifest().is_empty());
        assert_eq!(b.html(), "");
        assert_eq!(fetcher.requested().len(), 1);
    }

    #[tokio::test]
    async fn malformed_manifest_is_empty_object() {
        let fetcher = Arc::new(StaticFetcher::new().with("http://widgets.test/w/manifest.json", "{not json"));
        let b = loader(fetcher).load("w").await;
        assert!(b.manifest().is_empty());
        assert_eq!(b.html(), "");
    }

    #[tokio::test]
    async fn manifest_without_src_skips_template() {
        let fetcher = Arc::new(StaticFetcher::new().with("http://widgets.test/w/manifest.json", r#"{"i18n": {}}"#));
        let b = loader(fetcher.clone()).load("w").await;
        assert_eq!(b.html(), "");
        assert!(b.manifest().extra.contains_key("i18n"));
        assert_eq!(fetcher.requested(), vec!["http://widgets.test/w/manifest.json".to_string()]);
    }

    #[tokio::test]
    async fn missing_template_keeps_manifest() {
        let fetcher = Arc::new(StaticFetcher::new().with("http://widgets.test/w/manifest.json", r#"{"src": "gone.html"}"#));
        let b = loader(fetcher).load("w").await;
        assert_eq!(b.manifest().src.as_deref(), Some("gone.html"));
        assert_eq!(b.html(), "");
        assert!(b.css_style_sheets().is_empty());
    }

    #[tokio::test]
    async fn one_missing_stylesheet_empties_only_that_group() {
        let fetcher = Arc::new(
            StaticFetcher::new()
                .with("http://widgets.test/w/manifest.json", r#"{"src": "w.html"}"#)
                .with(
                    "http://widgets.test/w/w.html",
                    r#"<link rel="stylesheet" href="a.css" /><link rel="stylesheet" href="b.css" /><script src="w.js"></script><div></div>"#,
                )
                .with("http://widgets.test/w/a.css", "a{}")
                .with("http://widgets.test/w/w.js", ""),
        );
        let b = loader(fetcher).load("w").await;
        assert!(b.css_style_sheets().is_empty());
        assert_eq!(b.js_scripts().len(), 1);
        assert_eq!(b.html(), "<div></div>");
    }

    #[tokio::test]
    async fn activates_default_persona_before_fetching() {
        let fetcher = Arc::new(StaticFetcher::new());
        let l = loader(fetcher);
        // Widget files can be mocked like any API call
        l.registry().add_rule(MockRule::json("GET", "http://widgets.test/m/manifest.json", r#"{"src": "m.html"}"#));
        l.registry().add_rule(MockRule::new(
            "GET",
            "http://widgets.test/m/m.html",
            crate::mock::CannedResponse::new(200, Default::default(), "<b>mocked</b>"),
        ));
        let b = l.load("m").await;
        assert!(l.registry().is_active());
        assert_eq!(l.registry().persona(), "basic");
        assert!(l.registry().is_intercepted("GET", "/api/me"));
        assert_eq!(b.html(), "<b>mocked</b>");
    }

    #[tokio::test]
    async fn load_with_calls_back_once() {
        let fetcher = Arc::new(StaticFetcher::new());
        let mut calls = 0;
        loader(fetcher).load_with("w", |b| {
            calls += 1;
            assert!(b.manifest().is_empty());
        })
        .await;
        assert_eq!(calls, 1);
    }
}
