//! Scanning widget templates for external stylesheets and scripts
//!
//! Every `<link rel="stylesheet" href="...">` and every `<script src="...">`
//! tag is recognized, in document order, and removed from the markup so test
//! code can handle the HTML without triggering asset loads. Inline `<style>`
//! and `<script>` blocks stay where they are.

use regex::Regex;
use std::sync::OnceLock;

/// Result of scanning a template
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedAssets {
    /// Markup with the recognized tags removed
    pub html: String,
    /// Stylesheet hrefs in document order
    pub stylesheets: Vec<String>,
    /// Script srcs in document order
    pub scripts: Vec<String>,
}

fn link_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<link\b([^>]*)>").expect("link tag pattern"))
}

fn script_tag() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // A self-closed tag ends at its own `/>`, never at a later `</script>`
    RE.get_or_init(|| Regex::new(r"(?is)<script\b([^>]*?)(?:/>|>(.*?)</script\s*>)").expect("script tag pattern"))
}

fn stylesheet_rel() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(?:^|\s)rel\s*=\s*["']?\s*stylesheet\b"#).expect("rel pattern"))
}

fn href_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(?:^|\s)href\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#).expect("href pattern"))
}

fn src_attr() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"(?i)(?:^|\s)src\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'>/]+))"#).expect("src pattern"))
}

fn attr_value(attrs: &str, attr: &Regex) -> Option<String> {
    let caps = attr.captures(attrs)?;
    caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)).map(|m| m.as_str().trim().to_string())
}

/// Remove every tag matched by `tag` whose attributes yield a path via `pick`
fn strip_tags(html: &str, tag: &Regex, pick: impl Fn(&str) -> Option<String>) -> (String, Vec<String>) {
    let mut out = String::with_capacity(html.len());
    let mut paths = Vec::new();
    let mut last = 0;
    for caps in tag.captures_iter(html) {
        let (Some(whole), Some(attrs)) = (caps.get(0), caps.get(1)) else { continue };
        if let Some(path) = pick(attrs.as_str()).filter(|p| !p.is_empty()) {
            out.push_str(&html[last..whole.start()]);
            last = whole.end();
            paths.push(path);
        }
    }
    out.push_str(&html[last..]);
    (out, paths)
}

/// Strip external stylesheet links, returning the new markup and their hrefs
pub fn extract_stylesheets(html: &str) -> (String, Vec<String>) {
    strip_tags(html, link_tag(), |attrs| {
        if stylesheet_rel().is_match(attrs) {
            attr_value(attrs, href_attr())
        } else {
            None
        }
    })
}

/// Strip external script tags, returning the new markup and their srcs
pub fn extract_scripts(html: &str) -> (String, Vec<String>) {
    strip_tags(html, script_tag(), |attrs| attr_value(attrs, src_attr()))
}

/// Stylesheets first, then scripts from what remains
pub fn extract_assets(html: &str) -> ExtractedAssets {
    let (html, stylesheets) = extract_stylesheets(html);
    let (html, scripts) = extract_scripts(&html);
    ExtractedAssets { html, stylesheets, scripts }
}

/// Module id for a script path: `<widget>/<path>` without a trailing `.js`
pub fn script_module_id(widget: &str, path: &str) -> String {
    let trimmed = path.strip_suffix(".js").unwrap_or(path);
    format!("{}/{}", widget, trimmed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_link_and_script() {
        let a = extract_assets(r#"<link rel="stylesheet" href="style.css"/><p>hi</p><script src="app.js"></script>"#);
        assert_eq!(a.html, "<p>hi</p>");
        assert_eq!(a.stylesheets, vec!["style.css"]);
        assert_eq!(a.scripts, vec!["app.js"]);
    }

    #[test]
    fn finds_every_tag_in_order() {
        let html = "<link rel='stylesheet' href='css/a.css' />\n<div>x</div>\n<LINK HREF=\"css/b.css\" REL=\"stylesheet\">\n<script type=\"text/javascript\" src=\"js/one.js\"></script>\n<script src='js/two.js'>\n</script>";
        let a = extract_assets(html);
        assert_eq!(a.stylesheets, vec!["css/a.css", "css/b.css"]);
        assert_eq!(a.scripts, vec!["js/one.js", "js/two.js"]);
        assert_eq!(a.html, "\n<div>x</div>\n\n\n");
    }

    #[test]
    fn leaves_inline_and_non_stylesheet_tags() {
        let html = r#"<link rel="icon" href="favicon.ico"><style>p{}</style><script>var x = 1;</script>"#;
        let a = extract_assets(html);
        assert_eq!(a.html, html);
        assert!(a.stylesheets.is_empty());
        assert!(a.scripts.is_empty());
    }

    #[test]
    fn data_src_is_not_src() {
        let (html, scripts) = extract_scripts(r#"<script data-src="x.js"></script>"#);
        assert!(scripts.is_empty());
        assert_eq!(html, r#"<script data-src="x.js"></script>"#);
    }

    #[test]
    fn self_closed_script_keeps_following_markup() {
        let a = extract_assets(r#"<script src="a.js" /><p>keep</p><script>var x;</script>"#);
        assert_eq!(a.scripts, vec!["a.js"]);
        assert_eq!(a.html, "<p>keep</p><script>var x;</script>");
    }

    #[test]
    fn data_rel_is_not_rel() {
        let html = r#"<link data-rel="stylesheet" rel="preload" href="font.woff">"#;
        let (out, sheets) = extract_stylesheets(html);
        assert!(sheets.is_empty());
        assert_eq!(out, html);
    }

    #[test]
    fn module_ids() {
        assert_eq!(script_module_id("footer", "js/footer.js"), "footer/js/footer");
        assert_eq!(script_module_id("footer", "js/lib.min"), "footer/js/lib.min");
    }
}
