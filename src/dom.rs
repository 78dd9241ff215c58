//! In-memory page model.
//!
//! Pages are loaded from a JSON description into a flat arena (pre-order, so
//! node ids follow document order), mutated by the components, and rendered
//! back to HTML. Marker attributes in [`attr`] are the contract between the
//! markup and the hydration code.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type NodeId = usize;

/// Marker attributes and element ids the components look for
pub mod attr {
    pub const CONFIG_HREF: &str = "data-config-href";
    pub const CONFIG_TEXT: &str = "data-config-text";

    pub const WAITLIST_COUNT: &str = "data-waitlist-count";
    pub const WAITLIST_TODAY: &str = "data-waitlist-today";
    pub const WAITLIST_WEEK: &str = "data-waitlist-week";

    pub const WAITLIST_FORM_ID: &str = "waitlist-form";
    pub const WAITLIST_MESSAGE_ID: &str = "waitlist-message";
    pub const WAITLIST_SUCCESS_ID: &str = "waitlist-success";
    pub const WAITLIST_SUBMIT: &str = "data-waitlist-submit";
    pub const REF_FIELD_ID: &str = "ref";
    pub const TELEGRAM_FIELD_ID: &str = "telegram";
    pub const EMAIL_FIELD_ID: &str = "email";
    pub const SOURCE_FIELD_ID: &str = "source";
    pub const TRAP_FIELD_ID: &str = "hp";
    pub const REF_LINK: &str = "data-ref-link";
    pub const COPY_REF: &str = "data-copy-ref";

    pub const DONATE_ADDRESS: &str = "data-donate-address";
    pub const DONATE_LINK: &str = "data-donate-link";
    pub const DONATE_WEB: &str = "data-donate-web";
    pub const DONATE_URL: &str = "data-donate-url";
    pub const DONATE_QR_ID: &str = "donate-qr";
    pub const DONATE_AMOUNT: &str = "data-donate-amount";
    pub const DONATE_CUSTOM_ID: &str = "donate-custom";
    pub const COPY_ADDRESS: &str = "data-copy-address";
    pub const COPY_LINK: &str = "data-copy-link";
    pub const COPY_TEXT: &str = "data-copy-text";

    pub const NAV: &str = "data-nav";
    pub const NAV_TOGGLE: &str = "data-nav-toggle";

    pub const MUTED_CLASS: &str = "muted";
    pub const OPEN_CLASS: &str = "open";
}

/// Element as written in a page description
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementSpec {
    pub tag: String,
    #[serde(default)]
    pub attrs: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Current value of a form control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ElementSpec>,
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..Default::default()
        }
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn value(mut self, value: &str) -> Self {
        self.value = Some(value.to_string());
        self
    }

    pub fn child(mut self, child: ElementSpec) -> Self {
        self.children.push(child);
        self
    }
}

/// Page description file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    /// Address the page is served from; supplies origin and query string
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub body: Vec<ElementSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    attrs: BTreeMap<String, String>,
    classes: Vec<String>,
    text: Option<String>,
    value: Option<String>,
    children: Vec<NodeId>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|v| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attrs.contains_key(name)
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        self.attrs.insert(name.to_string(), value.to_string());
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.remove(name);
    }

    pub fn id(&self) -> Option<&str> {
        self.attr("id")
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes.iter().any(|c| c == class)
    }

    pub fn add_class(&mut self, class: &str) {
        if !self.has_class(class) {
            self.classes.push(class.to_string());
        }
    }

    pub fn remove_class(&mut self, class: &str) {
        self.classes.retain(|c| c != class);
    }

    /// Returns whether the class is present afterwards
    pub fn toggle_class(&mut self, class: &str) -> bool {
        if self.has_class(class) {
            self.remove_class(class);
            false
        } else {
            self.add_class(class);
            true
        }
    }

    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn set_text(&mut self, text: &str) {
        self.text = Some(text.to_string());
    }

    pub fn value(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn set_value(&mut self, value: &str) {
        self.value = Some(value.to_string());
    }

    pub fn is_hidden(&self) -> bool {
        self.has_attr("hidden")
    }

    pub fn set_hidden(&mut self, hidden: bool) {
        if hidden {
            self.set_attr("hidden", "");
        } else {
            self.remove_attr("hidden");
        }
    }

    pub fn is_disabled(&self) -> bool {
        self.has_attr("disabled")
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        if disabled {
            self.set_attr("disabled", "");
        } else {
            self.remove_attr("disabled");
        }
    }
}

/// The page: element arena plus metadata
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub title: Option<String>,
    nodes: Vec<Element>,
    roots: Vec<NodeId>,
}

impl Document {
    pub fn new(body: Vec<ElementSpec>) -> Self {
        let mut doc = Document::default();
        for spec in body {
            let id = doc.push(spec);
            doc.roots.push(id);
        }
        doc
    }

    pub fn from_spec(spec: PageSpec) -> Self {
        let mut doc = Self::new(spec.body);
        doc.title = spec.title;
        doc
    }

    fn push(&mut self, spec: ElementSpec) -> NodeId {
        let ElementSpec { tag, mut attrs, text, value, children } = spec;

        let classes = attrs
            .remove("class")
            .map(|c| c.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let id = self.nodes.len();
        self.nodes.push(Element {
            tag,
            attrs,
            classes,
            text,
            value,
            children: Vec::new(),
        });

        for child in children {
            let child_id = self.push(child);
            self.nodes[id].children.push(child_id);
        }

        id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<&Element> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Element> {
        self.nodes.get_mut(id)
    }

    /// All elements carrying the attribute, in document order
    pub fn query_attr(&self, name: &str) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, el)| el.has_attr(name))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn first_with_attr(&self, name: &str) -> Option<NodeId> {
        self.nodes.iter().position(|el| el.has_attr(name))
    }

    pub fn by_id(&self, id: &str) -> Option<NodeId> {
        self.nodes.iter().position(|el| el.id() == Some(id))
    }

    /// Set text on every element carrying the attribute
    pub fn set_text_all(&mut self, attr_name: &str, text: &str) {
        for id in self.query_attr(attr_name) {
            self.nodes[id].set_text(text);
        }
    }

    /// Value of a form control by element id; empty when missing
    pub fn field_value(&self, id: &str) -> String {
        self.by_id(id)
            .and_then(|node| self.get(node))
            .map(|el| el.value().to_string())
            .unwrap_or_default()
    }

    pub fn set_field_value(&mut self, id: &str, value: &str) -> bool {
        match self.by_id(id) {
            Some(node) => {
                self.nodes[node].set_value(value);
                true
            }
            None => false,
        }
    }

    /// Render the page as a standalone HTML document
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        html.push_str("<!DOCTYPE html>\n<html>\n<head>\n");
        html.push_str("<meta charset=\"utf-8\">\n");
        if let Some(title) = &self.title {
            html.push_str(&format!("<title>{}</title>\n", escape_html(title)));
        }
        html.push_str("</head>\n<body>\n");
        for root in &self.roots {
            self.render_node(*root, &mut html);
            html.push('\n');
        }
        html.push_str("</body>\n</html>");
        html
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        let el = &self.nodes[id];
        out.push('<');
        out.push_str(&el.tag);

        if !el.classes.is_empty() {
            out.push_str(&format!(" class=\"{}\"", escape_html(&el.classes.join(" "))));
        }
        for (name, value) in &el.attrs {
            if value.is_empty() {
                out.push_str(&format!(" {}", name));
            } else {
                out.push_str(&format!(" {}=\"{}\"", name, escape_html(value)));
            }
        }
        if let Some(value) = &el.value {
            if el.tag == "input" {
                out.push_str(&format!(" value=\"{}\"", escape_html(value)));
            }
        }
        out.push('>');

        if is_void(&el.tag) {
            return;
        }

        if let Some(text) = &el.text {
            out.push_str(&escape_html(text));
        } else if el.tag == "textarea" {
            out.push_str(&escape_html(el.value()));
        }
        for child in &el.children {
            self.render_node(*child, out);
        }

        out.push_str(&format!("</{}>", el.tag));
    }
}

fn is_void(tag: &str) -> bool {
    matches!(tag, "input" | "img" | "br" | "hr" | "meta" | "link")
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Parse a page description
pub fn parse_page(json: &str) -> Result<PageSpec, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse page: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        Document::new(vec![ElementSpec::new("nav")
            .attr("data-nav", "")
            .attr("class", "top bar")
            .child(ElementSpec::new("a").attr("data-config-href", "telegram_url").text("Telegram"))
            .child(ElementSpec::new("input").attr("id", "ref").value("abc"))])
    }

    #[test]
    fn test_arena_is_document_order() {
        let doc = sample();
        assert_eq!(doc.len(), 3);
        assert_eq!(doc.first_with_attr(attr::NAV), Some(0));
        assert_eq!(doc.query_attr(attr::CONFIG_HREF), vec![1]);
        assert_eq!(doc.by_id("ref"), Some(2));
    }

    #[test]
    fn test_class_handling() {
        let mut doc = sample();
        let nav = doc.get_mut(0).unwrap();
        assert!(nav.has_class("bar"));
        assert!(nav.toggle_class("open"));
        assert!(!nav.toggle_class("open"));
        nav.add_class("bar");
        assert_eq!(nav.classes, vec!["top".to_string(), "bar".to_string()]);
    }

    #[test]
    fn test_field_values() {
        let mut doc = sample();
        assert_eq!(doc.field_value("ref"), "abc");
        assert!(doc.set_field_value("ref", "XYZ"));
        assert_eq!(doc.field_value("ref"), "XYZ");
        assert!(!doc.set_field_value("missing", "x"));
        assert_eq!(doc.field_value("missing"), "");
    }

    #[test]
    fn test_render_html_escapes() {
        let mut doc = sample();
        doc.title = Some("Whale & Co".to_string());
        doc.get_mut(1).unwrap().set_attr("href", "https://t.me/a?x=1&y=\"2\"");
        doc.get_mut(1).unwrap().set_disabled(true);

        let html = doc.to_html();
        assert!(html.contains("<title>Whale &amp; Co</title>"));
        assert!(html.contains("<nav class=\"top bar\" data-nav>"));
        assert!(html.contains("href=\"https://t.me/a?x=1&amp;y=&quot;2&quot;\""));
        assert!(html.contains(" disabled "));
        assert!(html.contains("<input id=\"ref\" value=\"abc\">"));
        assert!(!html.contains("</input>"));
    }

    #[test]
    fn test_parse_page_json() {
        let json = r#"{
            "url": "https://whale.ai/waitlist.html?ref=abc",
            "title": "Waitlist",
            "body": [{ "tag": "p", "attrs": { "data-waitlist-count": "" }, "text": "0" }]
        }"#;
        let page = parse_page(json).unwrap();
        assert_eq!(page.url.as_deref(), Some("https://whale.ai/waitlist.html?ref=abc"));
        let doc = Document::from_spec(page);
        assert_eq!(doc.query_attr(attr::WAITLIST_COUNT), vec![0]);
        assert_eq!(doc.get(0).unwrap().text(), "0");
    }
}
