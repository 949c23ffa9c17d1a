//! The page the redirector works on.
//!
//! [`Document`] owns a parsed [`scraper::Html`] and edits its node tree in place.
//! Selectors are plain [`scraper::Selector`]s, built through [`selector`].

use anyhow::{Context, Result};
use ego_tree::NodeRef;
use html5ever::tendril::StrTendril;
use html5ever::{Attribute, LocalName, QualName, ns};
use scraper::node::{Element, Text};
use scraper::{ElementRef, Html, Node, Selector};
use std::path::Path;
use thiserror::Error;

pub use ego_tree::NodeId;

/// A registered event listener. Handlers are looked up by `name` at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
  pub event: String,
  pub name: String,
  pub capture: bool,
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error("invalid selector `{selector}`: {reason}")]
pub struct SelectorError {
  selector: String,
  reason: String,
}

/// Parse a CSS selector group.
pub fn selector(source: &str) -> Result<Selector, SelectorError> {
  Selector::parse(source).map_err(|e| SelectorError { selector: source.to_string(), reason: e.to_string() })
}

fn attr_name(name: &str) -> QualName {
  QualName::new(None, ns!(), LocalName::from(name))
}

fn new_element(tag: &str, attrs: &[(&str, &str)]) -> Node {
  let attrs =
    attrs.iter().map(|(name, value)| Attribute { name: attr_name(name), value: StrTendril::from_slice(value) }).collect();
  Node::Element(Element::new(QualName::new(None, ns!(html), LocalName::from(tag)), attrs))
}

#[derive(Debug, Clone)]
pub struct Document {
  html: Html,
  root: NodeId,
  head: NodeId,
  body: NodeId,
  listeners: Vec<Listener>,
}

impl Default for Document {
  fn default() -> Self {
    Self::new()
  }
}

impl Document {
  /// An empty `<html><head></head><body></body></html>` document.
  pub fn new() -> Self {
    Self::parse("")
  }

  /// Parse an HTML page. `head` and `body` are created if the parser left them out.
  pub fn parse(source: &str) -> Self {
    let html = Html::parse_document(source);
    let root = html.root_element().id();
    let mut doc = Self { html, root, head: root, body: root, listeners: Vec::new() };
    let head = match doc.child_element(root, "head") {
      Some(head) => head,
      None => doc.append_element(root, "head", &[]),
    };
    let body = match doc.child_element(root, "body") {
      Some(body) => body,
      None => doc.append_element(root, "body", &[]),
    };
    doc.head = head;
    doc.body = body;
    doc
  }

  pub fn load(path: &Path) -> Result<Self> {
    let source = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(Self::parse(&source))
  }

  /// Serialize the document back to HTML.
  pub fn to_html(&self) -> String {
    self.html.html()
  }

  pub fn root(&self) -> NodeId {
    self.root
  }

  pub fn head(&self) -> NodeId {
    self.head
  }

  pub fn body(&self) -> NodeId {
    self.body
  }

  fn child_element(&self, parent: NodeId, tag: &str) -> Option<NodeId> {
    self.html.tree.get(parent)?.children().filter_map(ElementRef::wrap).find(|e| e.value().name() == tag).map(|e| e.id())
  }

  // --- Construction ---

  /// Create an element with `attrs` and append it to `parent`.
  pub fn append_element(&mut self, parent: NodeId, tag: &str, attrs: &[(&str, &str)]) -> NodeId {
    self.append_node(parent, new_element(tag, attrs))
  }

  pub fn append_text(&mut self, parent: NodeId, text: &str) -> NodeId {
    self.append_node(parent, Node::Text(Text { text: StrTendril::from_slice(text) }))
  }

  fn append_node(&mut self, parent: NodeId, node: Node) -> NodeId {
    let id = self.html.tree.orphan(node).id();
    if let Some(mut parent) = self.html.tree.get_mut(parent) {
      parent.append_id(id);
    }
    id
  }

  // --- Inspection ---

  pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
    self.html.tree.get(id).and_then(ElementRef::wrap)
  }

  pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
    self.element(id)?.attr(name)
  }

  pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
    self.attr(id, name).is_some()
  }

  /// Set or replace one attribute.
  pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
    let Some(mut node) = self.html.tree.get_mut(id) else { return };
    let Node::Element(element) = node.value() else { return };
    let mut attrs: Vec<Attribute> = element
      .attrs
      .iter()
      .filter(|(k, _)| &*k.local != name)
      .map(|(k, v)| Attribute { name: k.clone(), value: v.clone() })
      .collect();
    attrs.push(Attribute { name: attr_name(name), value: StrTendril::from_slice(value) });
    // Rebuilt so the element's cached id and classes follow the new attributes.
    *element = Element::new(element.name.clone(), attrs);
  }

  pub fn children(&self, id: NodeId) -> Vec<NodeId> {
    self.html.tree.get(id).map(|n| n.children().map(|c| c.id()).collect()).unwrap_or_default()
  }

  /// Concatenated text of all descendant text nodes.
  pub fn text_content(&self, id: NodeId) -> String {
    self.element(id).map(|e| e.text().collect()).unwrap_or_default()
  }

  // --- Selectors ---

  pub fn matches(&self, id: NodeId, selector: &Selector) -> bool {
    self.element(id).is_some_and(|e| selector.matches(&e))
  }

  /// Nearest inclusive ancestor of `id` matching `selector`.
  pub fn closest(&self, id: NodeId, selector: &Selector) -> Option<NodeId> {
    let node: NodeRef<'_, Node> = self.html.tree.get(id)?;
    std::iter::once(node).chain(node.ancestors()).filter_map(ElementRef::wrap).find(|e| selector.matches(e)).map(|e| e.id())
  }

  /// Elements below `scope` matching `selector`, in document order.
  pub fn query_selector_all(&self, scope: NodeId, selector: &Selector) -> Vec<NodeId> {
    self.element(scope).map(|e| e.select(selector).map(|m| m.id()).collect()).unwrap_or_default()
  }

  pub fn query_selector(&self, scope: NodeId, selector: &Selector) -> Option<NodeId> {
    self.element(scope)?.select(selector).next().map(|m| m.id())
  }

  // --- Events ---

  pub fn add_event_listener(&mut self, event: &str, name: &str, capture: bool) {
    self.listeners.push(Listener { event: event.to_string(), name: name.to_string(), capture });
  }

  pub fn listeners<'a>(&'a self, event: &'a str) -> impl Iterator<Item = &'a Listener> + 'a {
    self.listeners.iter().filter(move |l| l.event == event)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn sel(s: &str) -> Selector {
    selector(s).unwrap()
  }

  const PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
  <head><title>Home</title><style>p { color: red; }</style></head>
  <body class="home">
    <div id="logo-icon"></div>
    <div id="contents">
      <ytd-rich-grid-media><a id="thumbnail" href="/watch?v=dQw4w9WgXcQ&amp;t=1"><img class="x ytd-moving-thumbnail-renderer"></a></ytd-rich-grid-media>
    </div>
  </body>
</html>"#;

  /// body > div#contents > ytd-rich-grid-media > a#thumbnail > img.x.y
  fn sample() -> (Document, NodeId, NodeId, NodeId) {
    let doc = Document::parse(PAGE);
    let row = doc.query_selector(doc.body(), &sel("ytd-rich-grid-media")).unwrap();
    let link = doc.query_selector(row, &sel("a")).unwrap();
    let img = doc.query_selector(link, &sel("img")).unwrap();
    (doc, row, link, img)
  }

  // --- parsing ---

  #[test]
  fn parse_keeps_structure_and_attrs() {
    let (doc, _, link, _) = sample();
    assert_eq!(doc.attr(doc.root(), "lang"), Some("en"));
    assert_eq!(doc.attr(doc.body(), "class"), Some("home"));
    assert_eq!(doc.attr(link, "href"), Some("/watch?v=dQw4w9WgXcQ&t=1"));
    let style = doc.query_selector(doc.head(), &sel("style")).unwrap();
    assert_eq!(doc.text_content(style), "p { color: red; }");
  }

  #[test]
  fn fragments_get_head_and_body() {
    let doc = Document::parse("<p>loose</p>");
    assert_eq!(doc.element(doc.head()).unwrap().value().name(), "head");
    assert_eq!(doc.query_selector_all(doc.body(), &sel("p")).len(), 1);
  }

  // --- selectors ---

  #[test]
  fn compound_selector_matches_tag_id_class() {
    let (doc, _, link, img) = sample();
    assert!(doc.matches(link, &sel("a#thumbnail")));
    assert!(doc.matches(link, &sel("#thumbnail[href]")));
    assert!(doc.matches(img, &sel("img.ytd-moving-thumbnail-renderer")));
    assert!(!doc.matches(img, &sel("img.ytd-moving-thumbnail-renderer.missing")));
    assert!(!doc.matches(link, &sel("a#media-container-link")));
  }

  #[test]
  fn combinators_walk_ancestors() {
    let (doc, row, link, img) = sample();
    assert!(doc.matches(row, &sel("#contents ytd-rich-grid-media")));
    assert!(doc.matches(img, &sel("body #contents img")));
    assert!(doc.matches(link, &sel("ytd-rich-grid-media > a")));
    assert!(!doc.matches(img, &sel("ytd-rich-grid-media > img")));
    assert!(!doc.matches(row, &sel("#other ytd-rich-grid-media")));
  }

  #[test]
  fn attribute_value_selectors() {
    let (doc, _, link, _) = sample();
    assert!(doc.matches(link, &sel(r#"a[href^="/watch"]"#)));
    assert!(!doc.matches(link, &sel(r#"a[href="/shorts"]"#)));
  }

  #[test]
  fn selector_list_matches_any() {
    let (doc, row, _, _) = sample();
    let list = sel("#contents ytd-video-renderer, #contents ytd-rich-grid-media");
    assert_eq!(doc.query_selector_all(doc.body(), &list), vec![row]);
  }

  #[test]
  fn closest_includes_self_and_ancestors() {
    let (doc, _, link, img) = sample();
    assert_eq!(doc.closest(img, &sel("a#thumbnail")), Some(link));
    assert_eq!(doc.closest(link, &sel("a#thumbnail")), Some(link));
    assert_eq!(doc.closest(img, &sel("a#media-container-link")), None);
  }

  #[test]
  fn invalid_selectors_are_rejected() {
    assert!(selector("").is_err());
    assert!(selector("a,").is_err());
    assert!(selector("%").is_err());
    let err = selector("a >").unwrap_err();
    assert!(err.to_string().starts_with("invalid selector `a >`"));
  }

  // --- editing ---

  #[test]
  fn set_attr_replaces_existing_value() {
    let (mut doc, row, _, _) = sample();
    doc.set_attr(row, "patched", "false");
    doc.set_attr(row, "patched", "true");
    assert_eq!(doc.attr(row, "patched"), Some("true"));
    assert_eq!(doc.element(row).unwrap().value().attrs().count(), 1);
    assert!(doc.matches(row, &sel("[patched=true]")));
  }

  #[test]
  fn set_attr_updates_id_and_class_matching() {
    let (mut doc, row, _, _) = sample();
    doc.set_attr(row, "id", "first");
    doc.set_attr(row, "class", "a b");
    assert!(doc.matches(row, &sel("#first.b")));
    doc.set_attr(row, "id", "second");
    assert!(!doc.matches(row, &sel("#first")));
    assert!(doc.matches(row, &sel("#second")));
  }

  #[test]
  fn text_content_concatenates_descendants() {
    let mut doc = Document::new();
    let style = doc.append_element(doc.head(), "style", &[]);
    doc.append_text(style, "a { }");
    doc.append_text(style, " b { }");
    assert_eq!(doc.text_content(style), "a { } b { }");
  }

  #[test]
  fn appended_elements_are_selectable_and_children_listed() {
    let mut doc = Document::new();
    let div = doc.append_element(doc.body(), "div", &[("id", "logo-icon")]);
    let marker = doc.append_element(div, "div", &[("data-marker", "true")]);
    assert_eq!(doc.query_selector(doc.root(), &sel("body > #logo-icon [data-marker]")), Some(marker));
    assert_eq!(doc.children(div), vec![marker]);
  }

  // --- serialization ---

  #[test]
  fn serialize_escapes_and_keeps_raw_text() {
    let mut doc = Document::new();
    let style = doc.append_element(doc.head(), "style", &[]);
    doc.append_text(style, "a > b { }");
    let p = doc.append_element(doc.body(), "p", &[("title", "say \"hi\"")]);
    doc.append_text(p, "1 < 2 & 3");
    doc.append_element(doc.body(), "img", &[("src", "x.jpg")]);

    let html = doc.to_html();
    assert!(html.contains("<style>a > b { }</style>"));
    assert!(html.contains("<p title=\"say &quot;hi&quot;\">1 &lt; 2 &amp; 3</p>"));
    assert!(html.contains("<img src=\"x.jpg\"></body>"));
  }

  #[test]
  fn serialized_page_parses_back_to_same_shape() {
    let (mut doc, row, _, _) = sample();
    doc.set_attr(row, "patched", "true");
    let again = Document::parse(&doc.to_html());
    assert_eq!(again.query_selector_all(again.body(), &sel("#contents ytd-rich-grid-media[patched]")).len(), 1);
    assert_eq!(again.attr(again.body(), "class"), Some("home"));
  }

  // --- events ---

  #[test]
  fn listeners_filter_by_event() {
    let mut doc = Document::new();
    doc.add_event_listener("click", "intercept", true);
    doc.add_event_listener("keydown", "other", false);
    assert_eq!(doc.listeners("click").count(), 1);
  }
}
