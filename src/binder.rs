use crate::dom::{attr, Document};
use crate::logger;
use crate::placeholder::is_placeholder;
use crate::resolver::{ConfigKey, SiteConfig};

/// Shown in text slots whose config value is missing
pub const MISSING_TEXT: &str = "--";

/// Set when the binder itself added the muted class, so a later bind only
/// undoes its own change
const BINDER_MUTED: &str = "data-config-muted";

/// A marked element whose config key did not resolve to a real value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub key: String,
    pub message: String,
}

impl Diagnostic {
    fn missing(key: &str) -> Self {
        Self {
            key: key.to_string(),
            message: format!("Missing config for {}", key),
        }
    }
}

/// Apply resolved config to every `data-config-href` / `data-config-text`
/// element. Unresolved links are muted and pointed at `#`; unresolved text
/// becomes `--`. Safe to call repeatedly.
pub fn apply_config(doc: &mut Document, config: &SiteConfig) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    for node in doc.query_attr(attr::CONFIG_HREF) {
        let Some(el) = doc.get_mut(node) else {
            continue;
        };
        let key = el.attr(attr::CONFIG_HREF).unwrap_or_default().trim().to_string();
        let value = href_value(&key, config);

        let missing_title = format!("Missing {}", key);

        if is_placeholder(&value) {
            if !el.has_class(attr::MUTED_CLASS) {
                el.add_class(attr::MUTED_CLASS);
                el.set_attr(BINDER_MUTED, "");
            }
            el.set_attr("href", "#");
            el.set_attr("title", &missing_title);
            diagnostics.push(Diagnostic::missing(&key));
        } else {
            if el.has_attr(BINDER_MUTED) {
                el.remove_class(attr::MUTED_CLASS);
                el.remove_attr(BINDER_MUTED);
            }
            if el.attr("title") == Some(missing_title.as_str()) {
                el.remove_attr("title");
            }
            el.set_attr("href", &value);
        }
    }

    for node in doc.query_attr(attr::CONFIG_TEXT) {
        let Some(el) = doc.get_mut(node) else {
            continue;
        };
        let key = el.attr(attr::CONFIG_TEXT).unwrap_or_default().trim().to_string();
        let value = config.resolve_name(&key);

        if is_placeholder(&value) {
            el.set_text(MISSING_TEXT);
            diagnostics.push(Diagnostic::missing(&key));
        } else {
            el.set_text(&value);
        }
    }

    for diagnostic in &diagnostics {
        logger::warn(&diagnostic.message);
    }

    diagnostics
}

/// Link target for a key. The support contact only becomes a link when it
/// looks like an email address.
fn href_value(key: &str, config: &SiteConfig) -> String {
    if ConfigKey::from_name(key) == Some(ConfigKey::SupportEmail) {
        let support = config.resolve(ConfigKey::SupportEmail);
        if support.contains('@') && !is_placeholder(&support) {
            return format!("mailto:{}", support);
        }
        return String::new();
    }
    config.resolve_name(key)
}
