use crate::config::COPY_FEEDBACK_MS;
use crate::dom::{attr, Document, Element, NodeId};
use crate::waitlist::COPY_VALUE;
use std::time::Duration;

pub const COPIED_LABEL: &str = "Copied";

/// Where copied text goes
pub trait Clipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String>;
}

/// The desktop clipboard
pub struct SystemClipboard {
    inner: arboard::Clipboard,
}

impl SystemClipboard {
    pub fn new() -> Result<Self, String> {
        let inner = arboard::Clipboard::new()
            .map_err(|e| format!("Clipboard unavailable: {}", e))?;
        Ok(Self { inner })
    }
}

impl Clipboard for SystemClipboard {
    fn set_text(&mut self, text: &str) -> Result<(), String> {
        self.inner
            .set_text(text.to_string())
            .map_err(|e| format!("Failed to copy: {}", e))
    }
}

/// Label restore scheduled after a copy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRevert {
    pub node: NodeId,
    pub label: String,
    pub delay: Duration,
}

impl PendingRevert {
    /// Sleep out the feedback delay
    pub async fn wait(self) -> Self {
        tokio::time::sleep(self.delay).await;
        self
    }

    /// Put the original label back
    pub fn apply(self, doc: &mut Document) {
        if let Some(el) = doc.get_mut(self.node) {
            el.set_text(&self.label);
        }
    }
}

/// Text a copy control copies: the value wired in by a component, else the
/// literal `data-copy-text`
pub fn copy_source(el: &Element) -> Option<String> {
    el.attr(COPY_VALUE)
        .or_else(|| el.attr(attr::COPY_TEXT))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn resting_label(el: &Element) -> &'static str {
    if el.has_attr(attr::COPY_REF) {
        "Copy referral link"
    } else if el.has_attr(attr::COPY_ADDRESS) {
        "Copy address"
    } else if el.has_attr(attr::COPY_LINK) {
        "Copy payment link"
    } else {
        "Copy"
    }
}

/// Copy a control's text and flip its label to "Copied". Returns the revert
/// to apply after the feedback delay, or None when there was nothing to copy.
pub fn copy_from_button(
    doc: &mut Document,
    node: NodeId,
    clipboard: &mut impl Clipboard,
) -> Result<Option<PendingRevert>, String> {
    let Some(el) = doc.get_mut(node) else {
        return Ok(None);
    };
    if el.is_disabled() {
        return Ok(None);
    }
    let Some(text) = copy_source(el) else {
        return Ok(None);
    };

    clipboard.set_text(&text)?;

    let label = if el.text().is_empty() || el.text() == COPIED_LABEL {
        resting_label(el).to_string()
    } else {
        el.text().to_string()
    };
    el.set_text(COPIED_LABEL);
    crate::logger::log_to_file(&format!("Copied {} characters to clipboard", text.chars().count()));

    Ok(Some(PendingRevert {
        node,
        label,
        delay: Duration::from_millis(COPY_FEEDBACK_MS),
    }))
}


#[cfg(test)]
mod tests {
    use super::testing::MemoryClipboard;
    use super::*;
    use crate::dom::ElementSpec;

    fn page() -> Document {
        Document::new(vec![
            ElementSpec::new("button").attr(attr::COPY_TEXT, "npm i whale").text("Copy"),
            ElementSpec::new("button")
                .attr(attr::COPY_ADDRESS, "")
                .attr(COPY_VALUE, "ABC123")
                .text("Copy address"),
            ElementSpec::new("button").attr(attr::COPY_REF, "").text("Copy referral link"),
        ])
    }

    #[test]
    fn test_copy_sets_feedback_and_reverts() {
        let mut doc = page();
        let mut clipboard = MemoryClipboard::default();

        let revert = copy_from_button(&mut doc, 1, &mut clipboard).unwrap().unwrap();
        assert_eq!(clipboard.contents.as_deref(), Some("ABC123"));
        assert_eq!(doc.get(1).unwrap().text(), COPIED_LABEL);
        assert_eq!(revert.delay, Duration::from_millis(1200));

        revert.apply(&mut doc);
        assert_eq!(doc.get(1).unwrap().text(), "Copy address");
    }

    #[test]
    fn test_double_copy_keeps_resting_label() {
        let mut doc = page();
        let mut clipboard = MemoryClipboard::default();

        let first = copy_from_button(&mut doc, 0, &mut clipboard).unwrap().unwrap();
        let second = copy_from_button(&mut doc, 0, &mut clipboard).unwrap().unwrap();
        assert_eq!(clipboard.contents.as_deref(), Some("npm i whale"));
        assert_eq!(first.label, "Copy");
        assert_eq!(second.label, "Copy");
    }

    #[test]
    fn test_nothing_to_copy() {
        let mut doc = page();
        let mut clipboard = MemoryClipboard::default();

        assert_eq!(copy_from_button(&mut doc, 2, &mut clipboard).unwrap(), None);
        assert_eq!(clipboard.contents, None);
        assert_eq!(doc.get(2).unwrap().text(), "Copy referral link");
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_sleeps_feedback_delay() {
        let revert = PendingRevert { node: 0, label: "Copy".to_string(), delay: Duration::from_millis(1200) };
        let started = tokio::time::Instant::now();
        let revert = revert.wait().await;
        assert!(started.elapsed() >= Duration::from_millis(1200));
        assert_eq!(revert.label, "Copy");
    }
}
