//! Config Resolver: one immutable view over the page-supplied configuration.
//!
//! Every recognised key resolves in the same order: the primary key, then each
//! alias in declared order, then the built-in default. Empty strings count as
//! absent at every step, so resolution never fails.

use crate::api::RemoteConfig;
use crate::config;
use crate::placeholder::{is_placeholder, normalize_url};
use std::collections::HashMap;

/// Keys the site understands. Anything else in the page config is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfigKey {
    WebsiteBaseUrl,
    WorkerApiBaseUrl,
    TelegramUrl,
    DonateSolAddress,
    SupportEmail,
    GithubUrl,
    QrImageBaseUrl,
    DonateWebBaseUrl,
    ProPriceSol,
}

/// Where a key's fallback comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyDefault {
    Empty,
    /// The page's own origin, known only at runtime
    Origin,
    Fixed(&'static str),
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 9] = [
        ConfigKey::WebsiteBaseUrl,
        ConfigKey::WorkerApiBaseUrl,
        ConfigKey::TelegramUrl,
        ConfigKey::DonateSolAddress,
        ConfigKey::SupportEmail,
        ConfigKey::GithubUrl,
        ConfigKey::QrImageBaseUrl,
        ConfigKey::DonateWebBaseUrl,
        ConfigKey::ProPriceSol,
    ];

    /// Canonical key name as written in the page config
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::WebsiteBaseUrl => "WEBSITE_BASE_URL",
            ConfigKey::WorkerApiBaseUrl => "WORKER_API_BASE_URL",
            ConfigKey::TelegramUrl => "TELEGRAM_URL",
            ConfigKey::DonateSolAddress => "DONATE_SOL_ADDRESS",
            ConfigKey::SupportEmail => "SUPPORT_EMAIL",
            ConfigKey::GithubUrl => "GITHUB_URL",
            ConfigKey::QrImageBaseUrl => "QR_IMAGE_BASE_URL",
            ConfigKey::DonateWebBaseUrl => "DONATE_WEB_BASE_URL",
            ConfigKey::ProPriceSol => "PRO_PRICE_SOL",
        }
    }

    /// Historical names, consulted in this order when the primary key is unset
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            ConfigKey::WebsiteBaseUrl => &["SITE_BASE_URL", "SITE_URL"],
            ConfigKey::WorkerApiBaseUrl => &["API_BASE_URL", "API_BASE"],
            ConfigKey::TelegramUrl => &["COMMUNITY_URL", "TELEGRAM_LINK"],
            ConfigKey::DonateSolAddress => &["TREASURY_ADDRESS", "SOL_ADDRESS"],
            ConfigKey::SupportEmail => &["SUPPORT_CONTACT"],
            ConfigKey::GithubUrl => &["REPO_URL", "SOURCE_URL"],
            ConfigKey::QrImageBaseUrl => &["QR_BASE_URL"],
            ConfigKey::DonateWebBaseUrl => &["EXPLORER_BASE_URL"],
            ConfigKey::ProPriceSol => &[],
        }
    }

    fn default_value(self) -> KeyDefault {
        match self {
            ConfigKey::WebsiteBaseUrl => KeyDefault::Origin,
            ConfigKey::QrImageBaseUrl => KeyDefault::Fixed(config::DEFAULT_QR_IMAGE_BASE_URL),
            ConfigKey::DonateWebBaseUrl => KeyDefault::Fixed(config::DEFAULT_DONATE_WEB_BASE_URL),
            _ => KeyDefault::Empty,
        }
    }

    /// Parse a key name from markup; case-insensitive, primary names only
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|key| key.name() == wanted)
    }
}

/// Resolved, read-only site configuration.
///
/// Built once at startup and handed to each component. The `with_*` and
/// `hydrated_with` helpers return a new value instead of mutating.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SiteConfig {
    values: HashMap<String, String>,
    origin: String,
}

impl SiteConfig {
    pub fn new(values: HashMap<String, String>, origin: &str) -> Self {
        Self {
            values,
            origin: normalize_url(origin),
        }
    }

    /// Configuration with nothing supplied by the page
    pub fn empty(origin: &str) -> Self {
        Self::new(HashMap::new(), origin)
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    fn lookup(&self, name: &str) -> Option<&str> {
        self.values
            .get(name)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }

    /// Resolve a key: primary, aliases in order, then default
    pub fn resolve(&self, key: ConfigKey) -> String {
        if let Some(value) = self.lookup(key.name()) {
            return value.to_string();
        }
        for alias in key.aliases() {
            if let Some(value) = self.lookup(alias) {
                return value.to_string();
            }
        }
        match key.default_value() {
            KeyDefault::Empty => String::new(),
            KeyDefault::Origin => self.origin.clone(),
            KeyDefault::Fixed(value) => value.to_string(),
        }
    }

    /// Resolve by markup name. Unrecognised names resolve to an empty string.
    pub fn resolve_name(&self, name: &str) -> String {
        ConfigKey::from_name(name)
            .map(|key| self.resolve(key))
            .unwrap_or_default()
    }

    /// True when the key resolves to a real, non-placeholder value
    pub fn is_set(&self, key: ConfigKey) -> bool {
        !is_placeholder(&self.resolve(key))
    }

    /// Normalised API base, or None when unset or still a template
    pub fn api_base(&self) -> Option<String> {
        let base = normalize_url(&self.resolve(ConfigKey::WorkerApiBaseUrl));
        if is_placeholder(&base) {
            None
        } else {
            Some(base)
        }
    }

    /// Normalised site base for building shareable links. Falls back to the
    /// origin when the configured base is a placeholder.
    pub fn site_base(&self) -> String {
        let base = normalize_url(&self.resolve(ConfigKey::WebsiteBaseUrl));
        if is_placeholder(&base) {
            self.origin.clone()
        } else {
            base
        }
    }

    /// Copy with the API base replaced, used for the `api` query parameter
    pub fn with_api_override(&self, api_base: &str) -> SiteConfig {
        let mut next = self.clone();
        if !api_base.trim().is_empty() {
            next.values.insert(
                ConfigKey::WorkerApiBaseUrl.name().to_string(),
                api_base.trim().to_string(),
            );
        }
        next
    }

    /// Copy filled from the dev `/api/config` response. Page values win; the
    /// remote only fills keys that are unset or still placeholders.
    pub fn hydrated_with(&self, remote: &RemoteConfig) -> SiteConfig {
        let mut next = self.clone();
        let fills = [
            (ConfigKey::DonateSolAddress, remote.treasury_address.as_deref()),
            (ConfigKey::ProPriceSol, remote.pro_price_sol.as_deref()),
        ];
        for (key, value) in fills {
            let Some(value) = value.filter(|v| !is_placeholder(v)) else {
                continue;
            };
            if !self.is_set(key) {
                next.values.insert(key.name().to_string(), value.to_string());
            }
        }
        next
    }
}
