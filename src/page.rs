//! In-memory page model that widgets are mounted into
//!
//! The page keeps the elements of its `<body>` as a tree. A page can start
//! from an existing document (so a container may pre-exist anywhere in it),
//! have elements appended, replaced or removed, and be rendered back to HTML
//! or to a text snapshot.

use scraper::{ElementRef, Html, Selector};
use std::sync::atomic::{AtomicU64, Ordering};

/// Stable handle to an element of a [`Page`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(u64);

impl NodeHandle {
    fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NodeHandle(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

const VOID_ELEMENTS: &[&str] =
    &["area", "base", "br", "col", "embed", "hr", "img", "input", "keygen", "link", "meta", "param", "source", "track", "wbr"];

const RAW_TEXT_ELEMENTS: &[&str] = &["style", "script", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript"];

/// Child of an element
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

/// An element and its subtree
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    handle: NodeHandle,
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

impl Element {
    fn new(tag: &str) -> Self {
        Element { handle: NodeHandle::fresh(), tag: tag.to_ascii_lowercase(), attributes: Vec::new(), children: Vec::new() }
    }

    fn from_ref(el: ElementRef<'_>) -> Self {
        let v = el.value();
        let mut out = Element::new(v.name());
        out.attributes = v.attrs().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        for child in el.children() {
            match child.value() {
                scraper::Node::Text(t) => out.children.push(Node::Text(t.text.to_string())),
                scraper::Node::Comment(c) => out.children.push(Node::Comment(c.comment.to_string())),
                scraper::Node::Element(_) => {
                    if let Some(e) = ElementRef::wrap(child) {
                        out.children.push(Node::Element(Element::from_ref(e)));
                    }
                }
                _ => {}
            }
        }
        out
    }

    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id")
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: &str, value: &str) {
        match self.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.attributes.push((name.to_string(), value.to_string())),
        }
    }

    /// Markup of the children
    pub fn inner_html(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &self.tag, &mut out);
        }
        out
    }

    /// Replace the children with the parsed fragment `html`
    pub fn set_inner_html(&mut self, html: &str) {
        if RAW_TEXT_ELEMENTS.contains(&self.tag.as_str()) {
            self.children = vec![Node::Text(html.to_string())];
            return;
        }
        let fragment = Html::parse_fragment(html);
        self.children = Element::from_ref(fragment.root_element()).children;
    }

    /// Concatenated text of the subtree, skipping style and script contents
    pub fn text(&self) -> String {
        let mut out = String::new();
        collect_text(self, &mut out);
        out
    }

    fn outer_html(&self) -> String {
        let mut out = String::new();
        write_element(self, &mut out);
        out
    }

    fn walk<'a>(&'a self, out: &mut Vec<&'a Element>) {
        out.push(self);
        for child in &self.children {
            if let Node::Element(e) = child {
                e.walk(out);
            }
        }
    }

    fn find(&self, pred: &dyn Fn(&Element) -> bool) -> Option<&Element> {
        if pred(self) {
            return Some(self);
        }
        self.children.iter().find_map(|c| match c {
            Node::Element(e) => e.find(pred),
            _ => None,
        })
    }

    fn find_mut(&mut self, handle: NodeHandle) -> Option<&mut Element> {
        if self.handle == handle {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| match c {
            Node::Element(e) => e.find_mut(handle),
            _ => None,
        })
    }

    fn remove_descendant(&mut self, handle: NodeHandle) -> bool {
        let before = self.children.len();
        self.children.retain(|c| !matches!(c, Node::Element(e) if e.handle == handle));
        before != self.children.len()
            || self.children.iter_mut().any(|c| match c {
                Node::Element(e) => e.remove_descendant(handle),
                _ => false,
            })
    }
}

fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;").replace('\u{a0}', "&nbsp;").replace('<', "&lt;").replace('>', "&gt;")
}

fn write_element(el: &Element, out: &mut String) {
    out.push('<');
    out.push_str(&el.tag);
    for (k, v) in &el.attributes {
        out.push_str(&format!(" {}=\"{}\"", k, v.replace('&', "&amp;").replace('\u{a0}', "&nbsp;").replace('"', "&quot;")));
    }
    out.push('>');
    if VOID_ELEMENTS.contains(&el.tag.as_str()) {
        return;
    }
    for child in &el.children {
        write_node(child, &el.tag, out);
    }
    out.push_str(&format!("</{}>", el.tag));
}

fn write_node(node: &Node, parent: &str, out: &mut String) {
    match node {
        Node::Element(e) => write_element(e, out),
        Node::Text(t) if RAW_TEXT_ELEMENTS.contains(&parent) => out.push_str(t),
        Node::Text(t) => out.push_str(&escape_text(t)),
        Node::Comment(c) => out.push_str(&format!("<!--{}-->", c)),
    }
}

fn collect_text(el: &Element, out: &mut String) {
    if el.tag == "style" || el.tag == "script" {
        return;
    }
    for child in &el.children {
        match child {
            Node::Element(e) => collect_text(e, out),
            Node::Text(t) => out.push_str(t),
            Node::Comment(_) => {}
        }
    }
}

/// A textual snapshot of the page
#[derive(Debug, Clone)]
pub struct TextSnapshot {
    /// Page title
    pub title: String,
    /// Extracted body text
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct Page {
    title: String,
    body: Vec<Element>,
    executed_scripts: Vec<String>,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a page from an HTML document; body text outside elements is dropped
    pub fn parse(html: &str) -> Self {
        let document = Html::parse_document(html);
        let mut page = Page::new();

        if let Some(sel) = selector("title") {
            page.title = document.select(&sel).next().map(|n| n.text().collect::<String>()).unwrap_or_default();
        }

        let body = selector("body").and_then(|sel| document.select(&sel).next());
        if let Some(body) = body {
            page.body = body.children().filter_map(ElementRef::wrap).map(Element::from_ref).collect();
        }
        page
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Create a detached element; it joins the page via [`Page::append_child`]
    pub fn create_element(&self, tag: &str) -> Element {
        Element::new(tag)
    }

    /// Append to the end of `<body>`
    pub fn append_child(&mut self, element: Element) -> NodeHandle {
        let handle = element.handle;
        self.body.push(element);
        handle
    }

    /// Remove an element wherever it sits; returns whether it was present
    pub fn remove(&mut self, handle: NodeHandle) -> bool {
        let before = self.body.len();
        self.body.retain(|e| e.handle != handle);
        before != self.body.len() || self.body.iter_mut().any(|e| e.remove_descendant(handle))
    }

    pub fn element(&self, handle: NodeHandle) -> Option<&Element> {
        self.body.iter().find_map(|e| e.find(&|x| x.handle == handle))
    }

    pub fn element_mut(&mut self, handle: NodeHandle) -> Option<&mut Element> {
        self.body.iter_mut().find_map(|e| e.find_mut(handle))
    }

    /// First element in document order with the given id, at any depth
    pub fn get_element_by_id(&self, id: &str) -> Option<&Element> {
        self.body.iter().find_map(|e| e.find(&|x| x.id() == Some(id)))
    }

    /// Top-level body elements in document order
    pub fn body_elements(&self) -> &[Element] {
        &self.body
    }

    /// Elements with the given tag name, at any depth, in document order
    pub fn elements_by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        let mut all = Vec::new();
        for e in &self.body {
            e.walk(&mut all);
        }
        all.into_iter().filter(move |e| e.tag.eq_ignore_ascii_case(tag))
    }

    /// Note that a script module ran against this page
    pub fn record_script(&mut self, id: &str) {
        self.executed_scripts.push(id.to_string());
    }

    /// Script modules run against this page, in order
    pub fn executed_scripts(&self) -> &[String] {
        &self.executed_scripts
    }

    pub fn to_html(&self) -> String {
        let body: String = self.body.iter().map(Element::outer_html).collect();
        format!("<html><head><title>{}</title></head><body>{}</body></html>", escape_text(&self.title), body)
    }

    /// Title and visible body text (style and script contents excluded)
    pub fn render_text_snapshot(&self) -> TextSnapshot {
        let text = self.body.iter().map(Element::text).collect();
        TextSnapshot { title: self.title.clone(), text }
    }
}
