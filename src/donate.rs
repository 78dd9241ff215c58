use crate::config::DonationSettings;
use crate::dom::{attr, Document, NodeId};
use crate::logger;
use crate::placeholder::{is_placeholder, normalize_url, to_uri_string};
use crate::resolver::{ConfigKey, SiteConfig};
use crate::waitlist::COPY_VALUE;
use reqwest::Url;
use std::sync::Arc;

pub const MSG_ADDRESS_UNSET: &str = "Donation address not set.";

/// Device-string fragments that mark a phone or tablet. A UX hint only.
const MOBILE_MARKERS: &[&str] = &["Android", "iPhone", "iPad", "iPod", "Mobile", "Opera Mini", "IEMobile"];

/// Everything derived for one amount
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DonationLinks {
    /// `solana:` payment URI for wallet apps
    pub deep_link: String,
    /// Browser fallback for desktops without a wallet handler
    pub web_link: String,
    /// Whichever of the two the main button should open
    pub primary: String,
    /// QR image of the web link, None when no QR service is configured
    pub qr_url: Option<String>,
    pub amount: Option<String>,
}

/// Positive finite number, formatted without trailing zeros. Anything else
/// means "no amount".
pub fn parse_amount(raw: &str) -> Option<String> {
    let value: f64 = raw.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some(value.to_string())
}

pub fn is_mobile(user_agent: &str) -> bool {
    MOBILE_MARKERS.iter().any(|marker| user_agent.contains(marker))
}

/// `solana:<address>?amount=<n>&label=<l>&message=<m>`
pub fn payment_uri(address: &str, amount: Option<&str>, settings: &DonationSettings) -> Result<String, String> {
    let mut url = Url::parse(&format!("solana:{}", address.trim()))
        .map_err(|e| format!("Invalid donation address {}: {}", address, e))?;

    {
        let mut query = url.query_pairs_mut();
        if let Some(amount) = amount {
            query.append_pair("amount", amount);
        }
        query.append_pair("label", &settings.label);
        query.append_pair("message", &settings.message);
    }

    Ok(to_uri_string(&url))
}

/// QR image for `data`; None when the QR service base is unset
pub fn qr_image_url(config: &SiteConfig, data: &str, size: u32) -> Option<String> {
    let base = normalize_url(&config.resolve(ConfigKey::QrImageBaseUrl));
    if is_placeholder(&base) {
        return None;
    }

    let mut url = match Url::parse(&base) {
        Ok(url) => url,
        Err(e) => {
            logger::warn(&format!("QR_IMAGE_BASE_URL is not a URL: {}", e));
            return None;
        }
    };
    url.query_pairs_mut()
        .append_pair("size", &format!("{}x{}", size, size))
        .append_pair("data", data);

    Some(to_uri_string(&url))
}

/// Donation widget: address display, amount selection, links and QR
pub struct DonationWidget {
    config: Arc<SiteConfig>,
    settings: DonationSettings,
    mobile: bool,
}

impl DonationWidget {
    pub fn new(config: Arc<SiteConfig>, settings: DonationSettings, user_agent: Option<&str>) -> Self {
        Self {
            config,
            settings,
            mobile: user_agent.map(is_mobile).unwrap_or(false),
        }
    }

    /// Configured address, None when unset or a placeholder
    pub fn address(&self) -> Option<String> {
        let address = self.config.resolve(ConfigKey::DonateSolAddress);
        if is_placeholder(&address) {
            None
        } else {
            Some(address.trim().to_string())
        }
    }

    /// Compute links for an amount. Non-numeric amounts are left out of the URI.
    pub fn build(&self, amount: Option<&str>) -> Option<DonationLinks> {
        let address = self.address()?;
        let amount = amount.and_then(parse_amount);

        let deep_link = match payment_uri(&address, amount.as_deref(), &self.settings) {
            Ok(uri) => uri,
            Err(e) => {
                logger::warn(&e);
                return None;
            }
        };

        let web_base = self.config.resolve(ConfigKey::DonateWebBaseUrl);
        let web_link = if is_placeholder(&web_base) {
            deep_link.clone()
        } else {
            format!("{}{}", web_base.trim(), address)
        };

        let primary = if self.mobile { deep_link.clone() } else { web_link.clone() };
        let qr_url = qr_image_url(&self.config, &web_link, self.settings.qr_size);

        Some(DonationLinks {
            deep_link,
            web_link,
            primary,
            qr_url,
            amount,
        })
    }

    /// Page-load wiring. Shows the address and renders the starter amount.
    pub fn setup(&self, doc: &mut Document) -> Option<DonationLinks> {
        let address_node = doc.first_with_attr(attr::DONATE_ADDRESS);
        let link_node = doc.first_with_attr(attr::DONATE_LINK);
        if address_node.is_none() || link_node.is_none() {
            return None;
        }

        let Some(address) = self.address() else {
            logger::warn("DONATE_SOL_ADDRESS not set");
            set_text(doc, address_node, MSG_ADDRESS_UNSET);
            set_attr(doc, link_node, "href", "#");
            return None;
        };

        set_text(doc, address_node, &address);
        for node in doc.query_attr(attr::COPY_ADDRESS) {
            set_attr(doc, Some(node), COPY_VALUE, &address);
        }

        let start = self.settings.start_amount.clone();
        self.update_payment_link(doc, Some(&start))
    }

    /// Recompute and render links. `None` reads the custom amount input.
    pub fn update_payment_link(&self, doc: &mut Document, amount: Option<&str>) -> Option<DonationLinks> {
        let typed;
        let amount = match amount.filter(|a| !a.trim().is_empty()) {
            Some(amount) => amount,
            None => {
                typed = doc.field_value(attr::DONATE_CUSTOM_ID);
                typed.as_str()
            }
        };

        let links = self.build(Some(amount))?;
        self.render(doc, &links);
        Some(links)
    }

    /// A preset amount button was clicked: clear the custom input and use
    /// the button's amount
    pub fn select_preset(&self, doc: &mut Document, button: NodeId) -> Option<DonationLinks> {
        let amount = doc
            .get(button)
            .and_then(|el| el.attr(attr::DONATE_AMOUNT))
            .map(str::to_string)?;

        doc.set_field_value(attr::DONATE_CUSTOM_ID, "");
        self.update_payment_link(doc, Some(&amount))
    }

    /// Text typed into the custom amount input
    pub fn custom_input(&self, doc: &mut Document, value: &str) -> Option<DonationLinks> {
        doc.set_field_value(attr::DONATE_CUSTOM_ID, value);
        self.update_payment_link(doc, None)
    }

    fn render(&self, doc: &mut Document, links: &DonationLinks) {
        let link_node = doc.first_with_attr(attr::DONATE_LINK);
        let web_node = doc.first_with_attr(attr::DONATE_WEB);
        let url_node = doc.first_with_attr(attr::DONATE_URL);
        set_attr(doc, link_node, "href", &links.primary);
        set_attr(doc, web_node, "href", &links.web_link);
        set_text(doc, url_node, &links.deep_link);
        for node in doc.query_attr(attr::COPY_LINK) {
            set_attr(doc, Some(node), COPY_VALUE, &links.deep_link);
        }

        let Some(qr) = doc.by_id(attr::DONATE_QR_ID).and_then(|n| doc.get_mut(n)) else {
            return;
        };
        match &links.qr_url {
            Some(url) => {
                qr.set_attr("src", url);
                qr.set_hidden(false);
            }
            None => qr.set_hidden(true),
        }
    }
}

fn set_text(doc: &mut Document, node: Option<NodeId>, text: &str) {
    if let Some(el) = node.and_then(|n| doc.get_mut(n)) {
        el.set_text(text);
    }
}

fn set_attr(doc: &mut Document, node: Option<NodeId>, name: &str, value: &str) {
    if let Some(el) = node.and_then(|n| doc.get_mut(n)) {
        el.set_attr(name, value);
    }
}
