//! Loading a widget and mounting it into a page

use rfwidget::fetch::StaticFetcher;
use rfwidget::mock::MockRegistry;
use rfwidget::modules::{ModuleTable, NativeModule};
use rfwidget::{HarnessConfig, Page, WidgetLoader};
use std::sync::Arc;

fn loader() -> WidgetLoader {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with("/w/search/manifest.json", r#"{"src": "search.html"}"#)
            .with(
                "/w/search/search.html",
                "<link rel=\"stylesheet\" href=\"css/search.css\" />\
                 <form id=\"search-form\"><input name=\"q\"></form>\
                 <script src=\"js/search.js\"></script>",
            )
            .with("/w/search/css/search.css", "#search-form{}"),
    );
    let resolver = Arc::new(|p: &str| format!("/w/{}", p));
    let modules = ModuleTable::new().register(NativeModule::new("search/js/search", |page: &mut Page| {
        let mut el = page.create_element("div");
        el.set_attribute("class", "search-results");
        el.set_inner_html("0 results");
        page.append_child(el);
    }));
    WidgetLoader::new(HarnessConfig::default(), MockRegistry::new(), resolver, fetcher).with_module_loader(Arc::new(modules))
}

#[tokio::test]
async fn mounts_into_fresh_page() {
    let search = loader().load("search").await;
    assert_eq!(search.html(), "<form id=\"search-form\"><input name=\"q\"></form>");

    let mut page = Page::new();
    search.load(&mut page);
    assert!(page.get_element_by_id("widget-container").unwrap().inner_html().contains("search-form"));
    assert_eq!(page.elements_by_tag("style").next().unwrap().inner_html(), "#search-form{}");
    assert_eq!(page.executed_scripts(), &["search/js/search".to_string()]);
    assert!(page.render_text_snapshot().text.contains("0 results"));

    search.unload(&mut page);
    // Elements a script added are the script's business
    assert_eq!(page.body_elements().len(), 1);
    assert_eq!(page.body_elements()[0].attribute("class"), Some("search-results"));
}

#[tokio::test]
async fn respects_pre_existing_container() {
    let search = loader().load("search").await;
    let mut page = Page::parse(
        "<html><head><title>Harness</title></head><body><div id=\"widget-container\" class=\"host\"></div></body></html>",
    );

    search.load(&mut page);
    assert_eq!(page.body_elements().iter().filter(|e| e.id() == Some("widget-container")).count(), 1);
    search.unload(&mut page);

    let c = page.get_element_by_id("widget-container").expect("host container kept");
    assert_eq!(c.attribute("class"), Some("host"));
    assert_eq!(page.elements_by_tag("style").count(), 0);
    assert_eq!(page.title(), "Harness");
}

#[tokio::test]
async fn unknown_module_empties_scripts_but_keeps_styles() {
    let fetcher = Arc::new(
        StaticFetcher::new()
            .with("/w/x/manifest.json", r#"{"src": "x.html"}"#)
            .with("/w/x/x.html", "<link rel=\"stylesheet\" href=\"x.css\"><script src=\"x.js\"></script><i>x</i>")
            .with("/w/x/x.css", "i{}"),
    );
    let resolver = Arc::new(|p: &str| format!("/w/{}", p));
    let l = WidgetLoader::new(HarnessConfig::default(), MockRegistry::new(), resolver, fetcher)
        .with_module_loader(Arc::new(ModuleTable::new()));

    let x = l.load("x").await;
    assert_eq!(x.html(), "<i>x</i>");
    assert_eq!(x.css_style_sheets().len(), 1);
    assert!(x.js_scripts().is_empty());
}

#[tokio::test]
async fn custom_container_id() {
    let fetcher = Arc::new(StaticFetcher::new().with("/w/a/manifest.json", r#"{"src": "a.html"}"#).with("/w/a/a.html", "<b>a</b>"));
    let resolver = Arc::new(|p: &str| format!("/w/{}", p));
    let config = HarnessConfig { container_id: "sandbox".to_string(), ..Default::default() };
    let a = WidgetLoader::new(config, MockRegistry::new(), resolver, fetcher).load("a").await;

    let mut page = Page::new();
    a.load(&mut page);
    assert_eq!(page.get_element_by_id("sandbox").unwrap().inner_html(), "<b>a</b>");
    a.unload(&mut page);
    assert!(page.body_elements().is_empty());
}

#[tokio::test]
async fn reuses_container_nested_in_layout() {
    let search = loader().load("search").await;
    let mut page = Page::parse("<body><main><div id=\"widget-container\">old</div></main></body>");

    search.load(&mut page);
    let containers = page.elements_by_tag("div").filter(|e| e.id() == Some("widget-container")).count();
    assert_eq!(containers, 1);
    let c = page.get_element_by_id("widget-container").unwrap();
    assert!(c.inner_html().starts_with("<form id=\"search-form\">"));
    assert!(!c.inner_html().contains("old"));

    search.unload(&mut page);
    assert_eq!(page.body_elements()[0].tag, "main");
    assert!(page.get_element_by_id("widget-container").is_some());
}
