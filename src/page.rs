//! Page load orchestration and the interactions wired up afterwards

use crate::api::{RemoteConfig, Transport, WaitlistClient};
use crate::binder::{self, Diagnostic};
use crate::clipboard::{self, Clipboard, PendingRevert};
use crate::config::AppConfig;
use crate::counts::{self, CountSync};
use crate::dom::{attr, Document, NodeId, PageSpec};
use crate::donate::{DonationLinks, DonationWidget};
use crate::logger;
use crate::resolver::SiteConfig;
use crate::tasks::TaskSlots;
use crate::waitlist::{FormInput, SubmitOutcome, WaitlistForm};
use reqwest::Url;
use std::sync::Arc;

/// What the page URL contributes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageContext {
    pub origin: Option<String>,
    /// `?ref=` referral code
    pub query_ref: Option<String>,
    /// `?api=` API base override for local testing
    pub api_override: Option<String>,
}

impl PageContext {
    pub fn from_url(url: Option<&str>) -> Self {
        let Some(raw) = url.map(str::trim).filter(|u| !u.is_empty()) else {
            return Self::default();
        };

        let url = match Url::parse(raw) {
            Ok(url) => url,
            Err(e) => {
                logger::warn(&format!("Page URL {} is not a URL: {}", raw, e));
                return Self::default();
            }
        };

        let origin = url.origin();
        let mut context = Self {
            origin: origin.is_tuple().then(|| origin.ascii_serialization()),
            ..Self::default()
        };

        for (name, value) in url.query_pairs() {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            match &*name {
                "ref" if context.query_ref.is_none() => context.query_ref = Some(value.to_string()),
                "api" if context.api_override.is_none() => context.api_override = Some(value.to_string()),
                _ => {}
            }
        }

        context
    }
}

/// Toggle the mobile menu. None when the page has no nav or no toggle.
pub fn toggle_nav(doc: &mut Document) -> Option<bool> {
    doc.first_with_attr(attr::NAV_TOGGLE)?;
    let nav = doc.first_with_attr(attr::NAV)?;
    doc.get_mut(nav).map(|el| el.toggle_class(attr::OPEN_CLASS))
}

/// A hydrated page and its live components
pub struct Page<T> {
    pub doc: Document,
    pub context: PageContext,
    pub config: Arc<SiteConfig>,
    pub diagnostics: Vec<Diagnostic>,
    pub counts: CountSync,
    pub donation: Option<DonationLinks>,
    form: WaitlistForm<T>,
    widget: DonationWidget,
    tasks: Arc<TaskSlots>,
}

async fn fetch_remote<T: Transport>(client: Option<&WaitlistClient<T>>, enabled: bool) -> Option<RemoteConfig> {
    let client = client.filter(|_| enabled)?;
    match client.fetch_remote_config().await {
        Ok(remote) => Some(remote),
        Err(e) => {
            logger::log_to_file(&format!("Remote config unavailable: {}", e));
            None
        }
    }
}

impl<T: Transport> Page<T> {
    /// Run the page-load sequence: optional remote hydration and the count
    /// fetch in parallel, then bind config, set up the form, render counts
    /// and set up the donation widget.
    pub async fn load(spec: PageSpec, app: &AppConfig, transport: T, hydrate_remote: bool) -> Self {
        let context = PageContext::from_url(spec.url.as_deref());
        let mut doc = Document::from_spec(spec);

        let mut page_config = app.site_config(context.origin.as_deref());
        if let Some(api) = context.api_override.as_deref() {
            logger::log_to_file(&format!("API base overridden by query: {}", api));
            page_config = page_config.with_api_override(api);
        }

        // Hydration only fills donation keys, so the form keeps the page config
        let tasks = Arc::new(TaskSlots::new());
        let form = WaitlistForm::new(Arc::new(page_config.clone()), app.handle, transport, tasks.clone());

        let (remote, sync) = futures::join!(
            fetch_remote(form.client(), hydrate_remote),
            counts::fetch_counts(form.client()),
        );

        let config = Arc::new(match remote {
            Some(remote) => page_config.hydrated_with(&remote),
            None => page_config,
        });

        let diagnostics = binder::apply_config(&mut doc, &config);
        form.setup(&mut doc, context.query_ref.as_deref());
        counts::apply_counts(&mut doc, &sync);

        let widget = DonationWidget::new(config.clone(), app.donation.clone(), app.user_agent.as_deref());
        let donation = widget.setup(&mut doc);

        logger::log_to_file(&format!(
            "Page hydrated: {} elements, {} missing config values",
            doc.len(),
            diagnostics.len()
        ));

        Self {
            doc,
            context,
            config,
            diagnostics,
            counts: sync,
            donation,
            form,
            widget,
            tasks,
        }
    }

    pub fn form(&self) -> &WaitlistForm<T> {
        &self.form
    }

    /// Submit the waitlist form with whatever its fields hold
    pub async fn submit_waitlist(&mut self) -> SubmitOutcome {
        let input = FormInput::from_document(&self.doc);
        self.form.submit(&mut self.doc, &input).await
    }

    pub fn select_donation_amount(&mut self, button: NodeId) -> Option<&DonationLinks> {
        self.donation = self.widget.select_preset(&mut self.doc, button);
        self.donation.as_ref()
    }

    pub fn set_custom_amount(&mut self, value: &str) -> Option<&DonationLinks> {
        self.donation = self.widget.custom_input(&mut self.doc, value);
        self.donation.as_ref()
    }

    pub fn toggle_nav(&mut self) -> Option<bool> {
        toggle_nav(&mut self.doc)
    }

    pub fn copy(&mut self, button: NodeId, clipboard: &mut impl Clipboard) -> Result<Option<PendingRevert>, String> {
        clipboard::copy_from_button(&mut self.doc, button, clipboard)
    }

    pub fn to_html(&self) -> String {
        self.doc.to_html()
    }

    /// Cancel anything still in flight
    pub fn close(&self) {
        self.tasks.cancel_all();
    }
}
