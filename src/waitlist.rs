//! Waitlist signup form.
//!
//! The form moves idle -> submitting -> {succeeded, duplicate, failed}; a
//! failure leaves it ready for another attempt. A missing API base parks it
//! in `Misconfigured` for good. Submission is split into `prepare` (local
//! checks, DOM goes busy), `send` (the network call) and `finish` (render the
//! result) so a newer submission can cancel an older one between the steps.

use crate::api::{ApiError, SubmitRequest, SubmitResponse, Transport, WaitlistClient};
use crate::config::HandleRules;
use crate::counts;
use crate::dom::{attr, Document};
use crate::logger;
use crate::placeholder::to_uri_string;
use crate::resolver::SiteConfig;
use crate::tasks::{TaskSlots, TaskTicket};
use reqwest::Url;
use std::sync::{Arc, Mutex};

pub const MSG_MISCONFIGURED: &str = "Waitlist backend is not configured.";
pub const MSG_INVALID_HANDLE: &str = "Please enter a valid Telegram username.";
pub const MSG_BLOCKED: &str = "Submission blocked.";
pub const MSG_SUBMITTING: &str = "Submitting...";
pub const MSG_REJECTED: &str = "Unable to submit. Try again later.";
pub const MSG_TRANSPORT: &str = "Submission failed. Please try again.";
pub const MSG_JOINED: &str = "You are in.";
pub const MSG_DUPLICATE: &str = "You are already on the waitlist.";
pub const MSG_LINK_PENDING: &str = "Your referral link will appear here.";

/// Slot key for the form's in-flight submission
const FORM_TASK: &str = attr::WAITLIST_FORM_ID;

/// Attribute on the copy-referral button holding the link to copy
pub const COPY_VALUE: &str = "data-copy-value";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    Submitting,
    Succeeded,
    Duplicate,
    /// Last attempt failed; the form accepts a retry
    Failed,
    Misconfigured,
}

/// What the user typed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormInput {
    pub telegram: String,
    pub email: String,
    pub ref_code: String,
    pub heard_about: String,
    /// Hidden trap field; real users leave it empty
    pub honeypot: String,
}

impl FormInput {
    /// Read the form controls
    pub fn from_document(doc: &Document) -> Self {
        Self {
            telegram: doc.field_value(attr::TELEGRAM_FIELD_ID),
            email: doc.field_value(attr::EMAIL_FIELD_ID),
            ref_code: doc.field_value(attr::REF_FIELD_ID),
            heard_about: doc.field_value(attr::SOURCE_FIELD_ID),
            honeypot: doc.field_value(attr::TRAP_FIELD_ID),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Misconfigured,
    InvalidHandle,
    /// Trap field was filled; the user is not told why
    Blocked,
    /// Form already completed
    Closed,
    Joined {
        referral_link: Option<String>,
        duplicate: bool,
        /// The reply carried counts, no separate fetch needed
        counts_included: bool,
    },
    Failed {
        message: String,
    },
    /// A newer submission replaced this one; nothing was rendered
    Superseded,
}

/// Validated submission waiting to be sent
#[derive(Debug, Clone)]
pub struct PendingSubmit {
    pub ticket: TaskTicket,
    pub request: SubmitRequest,
}

/// Network result for one submission. `result` is None when it was cancelled.
#[derive(Debug, Clone)]
pub struct SubmitReply {
    pub ticket: TaskTicket,
    pub result: Option<Result<SubmitResponse, ApiError>>,
}

/// Clean up a Telegram handle. Strips one leading `@` and surrounding
/// whitespace, then requires `[A-Za-z0-9_]` within the configured length.
pub fn validate_handle(raw: &str, rules: &HandleRules) -> Option<String> {
    let trimmed = raw.trim();
    let cleaned = trimmed.strip_prefix('@').unwrap_or(trimmed).trim();

    if cleaned.is_empty() {
        return None;
    }

    let len = cleaned.chars().count();
    if len < rules.min_len || len > rules.max_len {
        return None;
    }

    if !cleaned.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }

    Some(cleaned.to_string())
}

/// Shareable link for a referral code: `{site_base}/waitlist.html?ref=CODE`
pub fn referral_link(config: &SiteConfig, code: &str) -> String {
    let page = format!("{}/waitlist.html", config.site_base());
    match Url::parse(&page) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("ref", code);
            to_uri_string(&url)
        }
        Err(e) => {
            logger::warn(&format!("Site base {} is not a URL: {}", page, e));
            format!("{}?ref={}", page, code)
        }
    }
}

pub struct WaitlistForm<T> {
    config: Arc<SiteConfig>,
    rules: HandleRules,
    client: Option<WaitlistClient<T>>,
    state: Mutex<FormState>,
    tasks: Arc<TaskSlots>,
}

impl<T: Transport> WaitlistForm<T> {
    pub fn new(config: Arc<SiteConfig>, rules: HandleRules, transport: T, tasks: Arc<TaskSlots>) -> Self {
        let client = config
            .api_base()
            .map(|base| WaitlistClient::new(base, transport));
        let state = if client.is_some() {
            FormState::Idle
        } else {
            FormState::Misconfigured
        };

        Self {
            config,
            rules,
            client,
            state: Mutex::new(state),
            tasks,
        }
    }

    pub fn state(&self) -> FormState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(FormState::Misconfigured)
    }

    fn set_state(&self, next: FormState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    pub fn client(&self) -> Option<&WaitlistClient<T>> {
        self.client.as_ref()
    }

    /// Page-load wiring: pre-fill the referral field and show the
    /// misconfigured state up front
    pub fn setup(&self, doc: &mut Document, query_ref: Option<&str>) {
        doc.set_field_value(attr::REF_FIELD_ID, query_ref.unwrap_or(""));

        if self.client.is_none() {
            logger::warn("WORKER_API_BASE_URL not set; waitlist form disabled");
            set_message(doc, MSG_MISCONFIGURED);
            set_submit_disabled(doc, true);
        }
    }

    /// Local checks before anything goes on the wire. On success the form is
    /// busy: message shows "Submitting..." and the submit control is disabled.
    pub fn prepare(&self, doc: &mut Document, input: &FormInput) -> Result<PendingSubmit, SubmitOutcome> {
        match self.state() {
            FormState::Misconfigured => {
                set_message(doc, MSG_MISCONFIGURED);
                return Err(SubmitOutcome::Misconfigured);
            }
            FormState::Succeeded | FormState::Duplicate => return Err(SubmitOutcome::Closed),
            FormState::Idle | FormState::Failed | FormState::Submitting => {}
        }

        let Some(telegram) = validate_handle(&input.telegram, &self.rules) else {
            set_message(doc, MSG_INVALID_HANDLE);
            return Err(SubmitOutcome::InvalidHandle);
        };

        if !input.honeypot.is_empty() {
            logger::log_to_file("Waitlist submission blocked by trap field");
            set_message(doc, MSG_BLOCKED);
            return Err(SubmitOutcome::Blocked);
        }

        let ticket = self.tasks.begin(FORM_TASK);
        self.set_state(FormState::Submitting);
        set_message(doc, MSG_SUBMITTING);
        set_submit_disabled(doc, true);

        Ok(PendingSubmit {
            ticket,
            request: SubmitRequest {
                telegram_username: telegram,
                email: input.email.trim().to_string(),
                ref_code: input.ref_code.trim().to_string(),
                heard_about: input.heard_about.trim().to_string(),
                honeypot: input.honeypot.clone(),
            },
        })
    }

    /// The one POST. Returns early without a result if the ticket is cancelled.
    pub async fn send(&self, pending: PendingSubmit) -> SubmitReply {
        let PendingSubmit { ticket, request } = pending;

        let Some(client) = self.client.as_ref() else {
            return SubmitReply {
                ticket,
                result: Some(Err(ApiError::Transport("API base not configured".to_string()))),
            };
        };

        let token = ticket.token.clone();
        let result = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            reply = client.submit(&request) => Some(reply),
        };

        SubmitReply { ticket, result }
    }

    /// Render a reply. Stale replies are dropped without touching the page.
    pub fn finish(&self, doc: &mut Document, reply: SubmitReply) -> SubmitOutcome {
        if !self.tasks.is_current(&reply.ticket) {
            logger::log_to_file(&format!("Dropping superseded submission #{}", reply.ticket.id));
            return SubmitOutcome::Superseded;
        }
        self.tasks.finish(&reply.ticket);
        set_submit_disabled(doc, false);

        let Some(result) = reply.result else {
            self.set_state(FormState::Idle);
            return SubmitOutcome::Superseded;
        };

        match result {
            Ok(response) => self.render_success(doc, response),
            Err(e) => {
                logger::warn(&format!("Waitlist submission failed: {}", e));
                let message = match e {
                    ApiError::Rejected { message: Some(m), .. } => m,
                    ApiError::Rejected { message: None, .. } => MSG_REJECTED.to_string(),
                    ApiError::Transport(_) | ApiError::Parse(_) => MSG_TRANSPORT.to_string(),
                };
                set_message(doc, &message);
                self.set_state(FormState::Failed);
                SubmitOutcome::Failed { message }
            }
        }
    }

    fn render_success(&self, doc: &mut Document, response: SubmitResponse) -> SubmitOutcome {
        if let Some(form) = doc.by_id(attr::WAITLIST_FORM_ID).and_then(|n| doc.get_mut(n)) {
            form.set_hidden(true);
        }
        if let Some(panel) = doc.by_id(attr::WAITLIST_SUCCESS_ID).and_then(|n| doc.get_mut(n)) {
            panel.set_hidden(false);
        }

        let link = response.referral_link.clone().or_else(|| {
            response
                .assigned_ref
                .as_deref()
                .map(|code| referral_link(&self.config, code))
        });

        doc.set_text_all(attr::REF_LINK, link.as_deref().unwrap_or(MSG_LINK_PENDING));
        for node in doc.query_attr(attr::COPY_REF) {
            if let Some(button) = doc.get_mut(node) {
                match &link {
                    Some(link) => {
                        button.set_attr(COPY_VALUE, link);
                        button.set_disabled(false);
                    }
                    None => button.set_disabled(true),
                }
            }
        }

        let duplicate = response.already_joined;
        if duplicate {
            set_message(doc, MSG_DUPLICATE);
            self.set_state(FormState::Duplicate);
        } else {
            set_message(doc, MSG_JOINED);
            self.set_state(FormState::Succeeded);
        }

        let counts_included = response.total_count.is_some() || response.today_count.is_some();
        counts::render_partial(doc, response.total_count, response.today_count);

        logger::log_to_file(&format!(
            "Waitlist joined (duplicate: {}, link: {})",
            duplicate,
            link.as_deref().unwrap_or("none")
        ));

        SubmitOutcome::Joined {
            referral_link: link,
            duplicate,
            counts_included,
        }
    }

    /// Whole flow for one submit event, including the follow-up count
    /// refresh when the reply carried no counts
    pub async fn submit(&self, doc: &mut Document, input: &FormInput) -> SubmitOutcome {
        let pending = match self.prepare(doc, input) {
            Ok(pending) => pending,
            Err(outcome) => return outcome,
        };

        let reply = self.send(pending).await;
        let outcome = self.finish(doc, reply);

        if let SubmitOutcome::Joined { counts_included: false, .. } = outcome {
            counts::refresh_counts(doc, self.client()).await;
        }

        outcome
    }
}

fn set_message(doc: &mut Document, message: &str) {
    if let Some(el) = doc.by_id(attr::WAITLIST_MESSAGE_ID).and_then(|n| doc.get_mut(n)) {
        el.set_text(message);
    }
}

fn set_submit_disabled(doc: &mut Document, disabled: bool) {
    for node in doc.query_attr(attr::WAITLIST_SUBMIT) {
        if let Some(el) = doc.get_mut(node) {
            el.set_disabled(disabled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;
    use crate::dom::ElementSpec;
    use serde_json::json;
    use std::collections::HashMap;

    fn site(api: &str) -> Arc<SiteConfig> {
        let mut values = HashMap::new();
        values.insert("WORKER_API_BASE_URL".to_string(), api.to_string());
        values.insert("WEBSITE_BASE_URL".to_string(), "https://whale.ai/".to_string());
        Arc::new(SiteConfig::new(values, "https://whale.ai"))
    }

    fn form(api: &str, fake: FakeTransport) -> WaitlistForm<FakeTransport> {
        WaitlistForm::new(site(api), HandleRules::default(), fake, Arc::new(TaskSlots::new()))
    }

    fn page() -> Document {
        Document::new(vec![
            ElementSpec::new("form")
                .attr("id", attr::WAITLIST_FORM_ID)
                .child(ElementSpec::new("input").attr("id", attr::TELEGRAM_FIELD_ID))
                .child(ElementSpec::new("input").attr("id", attr::REF_FIELD_ID).attr("type", "hidden"))
                .child(ElementSpec::new("input").attr("id", attr::TRAP_FIELD_ID))
                .child(ElementSpec::new("button").attr(attr::WAITLIST_SUBMIT, "").text("Join")),
            ElementSpec::new("p").attr("id", attr::WAITLIST_MESSAGE_ID),
            ElementSpec::new("div")
                .attr("id", attr::WAITLIST_SUCCESS_ID)
                .attr("hidden", "")
                .child(ElementSpec::new("code").attr(attr::REF_LINK, ""))
                .child(ElementSpec::new("button").attr(attr::COPY_REF, "").text("Copy referral link")),
            ElementSpec::new("span").attr(attr::WAITLIST_COUNT, "").text("9"),
        ])
    }

    fn input(handle: &str) -> FormInput {
        FormInput {
            telegram: handle.to_string(),
            ..Default::default()
        }
    }

    fn text_of(doc: &Document, id: &str) -> String {
        doc.get(doc.by_id(id).unwrap()).unwrap().text().to_string()
    }

    fn submit_button(doc: &Document) -> &crate::dom::Element {
        doc.get(doc.first_with_attr(attr::WAITLIST_SUBMIT).unwrap()).unwrap()
    }

    #[test]
    fn test_validate_handle() {
        let rules = HandleRules::default();
        assert_eq!(validate_handle("@john_doe", &rules).as_deref(), Some("john_doe"));
        assert_eq!(validate_handle("  @whale_fan  ", &rules).as_deref(), Some("whale_fan"));
        assert_eq!(validate_handle("", &rules), None);
        assert_eq!(validate_handle("@", &rules), None);
        assert_eq!(validate_handle("a", &rules), None);
        assert_eq!(validate_handle("john doe", &rules), None);
        assert_eq!(validate_handle("john-doe", &rules), None);
        assert_eq!(validate_handle(&"x".repeat(33), &rules), None);
        assert_eq!(validate_handle(&"x".repeat(32), &rules).map(|h| h.len()), Some(32));
    }

    #[test]
    fn test_handle_bounds_are_configurable() {
        let relaxed = HandleRules { min_len: 3, max_len: 32 };
        assert_eq!(validate_handle("bob", &HandleRules::default()), None);
        assert_eq!(validate_handle("bob", &relaxed).as_deref(), Some("bob"));
    }

    #[test]
    fn test_referral_link_uses_site_base() {
        let cfg = site("https://api.example.com");
        assert_eq!(referral_link(&cfg, "XYZ"), "https://whale.ai/waitlist.html?ref=XYZ");
        assert_eq!(referral_link(&cfg, "a b&c"), "https://whale.ai/waitlist.html?ref=a%20b%26c");

        let placeholder = SiteConfig::new(
            [("WEBSITE_BASE_URL".to_string(), "https://YOUR_SITE".to_string())].into_iter().collect(),
            "https://preview.whale.ai",
        );
        assert_eq!(referral_link(&placeholder, "XYZ"), "https://preview.whale.ai/waitlist.html?ref=XYZ");
    }

    #[tokio::test]
    async fn test_submit_end_to_end() {
        let fake = FakeTransport::new().reply(200, json!({ "ok": true, "assigned_ref": "XYZ" }));
        let form = form("https://api.example.com", fake);
        let mut doc = page();
        form.setup(&mut doc, Some("FRIEND1"));

        let mut typed = input("@whale_fan");
        typed.ref_code = doc.field_value(attr::REF_FIELD_ID);

        let outcome = form.submit(&mut doc, &typed).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Joined {
                referral_link: Some("https://whale.ai/waitlist.html?ref=XYZ".to_string()),
                duplicate: false,
                counts_included: false,
            }
        );

        let posts: Vec<_> = form
            .client()
            .unwrap()
            .transport_requests()
            .into_iter()
            .filter(|r| r.method == "POST")
            .collect();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].url, "https://api.example.com/api/waitlist/submit");
        let body = posts[0].body.as_ref().unwrap();
        assert_eq!(body["telegram_username"], "whale_fan");
        assert_eq!(body["ref"], "FRIEND1");
        assert_eq!(body["honeypot"], "");

        let link_node = doc.first_with_attr(attr::REF_LINK).unwrap();
        assert_eq!(doc.get(link_node).unwrap().text(), "https://whale.ai/waitlist.html?ref=XYZ");
        assert!(doc.get(doc.by_id(attr::WAITLIST_FORM_ID).unwrap()).unwrap().is_hidden());
        assert!(!doc.get(doc.by_id(attr::WAITLIST_SUCCESS_ID).unwrap()).unwrap().is_hidden());
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_JOINED);
        assert_eq!(form.state(), FormState::Succeeded);

        let copy = doc.get(doc.first_with_attr(attr::COPY_REF).unwrap()).unwrap();
        assert_eq!(copy.attr(COPY_VALUE), Some("https://whale.ai/waitlist.html?ref=XYZ"));

        // the follow-up count fetch failed (no scripted reply): old count stays
        let count = doc.get(doc.first_with_attr(attr::WAITLIST_COUNT).unwrap()).unwrap();
        assert_eq!(count.text(), "9");
    }

    #[tokio::test]
    async fn test_duplicate_with_server_link_and_counts() {
        let fake = FakeTransport::new().reply(
            200,
            json!({ "ok": true, "already_joined": true, "referral_link": "https://whale.ai/r/abc", "total_count": 100 }),
        );
        let form = form("https://api.example.com", fake);
        let mut doc = page();

        let outcome = form.submit(&mut doc, &input("whale_fan")).await;
        assert_eq!(
            outcome,
            SubmitOutcome::Joined {
                referral_link: Some("https://whale.ai/r/abc".to_string()),
                duplicate: true,
                counts_included: true,
            }
        );
        assert_eq!(form.state(), FormState::Duplicate);
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_DUPLICATE);
        assert_eq!(form.client().unwrap().transport_requests().len(), 1);

        let count = doc.get(doc.first_with_attr(attr::WAITLIST_COUNT).unwrap()).unwrap();
        assert_eq!(count.text(), "100");

        assert_eq!(form.submit(&mut doc, &input("whale_fan")).await, SubmitOutcome::Closed);
    }

    #[tokio::test]
    async fn test_invalid_handle_stays_idle() {
        let form = form("https://api.example.com", FakeTransport::new());
        let mut doc = page();

        assert_eq!(form.submit(&mut doc, &input("john doe")).await, SubmitOutcome::InvalidHandle);
        assert_eq!(form.state(), FormState::Idle);
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_INVALID_HANDLE);
        assert!(form.client().unwrap().transport_requests().is_empty());
    }

    #[tokio::test]
    async fn test_trap_field_blocks_silently() {
        let form = form("https://api.example.com", FakeTransport::new());
        let mut doc = page();

        let mut typed = input("whale_fan");
        typed.honeypot = "http://spam".to_string();
        assert_eq!(form.submit(&mut doc, &typed).await, SubmitOutcome::Blocked);
        assert_eq!(form.state(), FormState::Idle);
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_BLOCKED);
        assert!(form.client().unwrap().transport_requests().is_empty());
    }

    #[tokio::test]
    async fn test_misconfigured_api_disables_form() {
        let form = form("https://YOUR_WORKER.workers.dev", FakeTransport::new());
        let mut doc = page();
        form.setup(&mut doc, None);

        assert_eq!(form.state(), FormState::Misconfigured);
        assert!(submit_button(&doc).is_disabled());
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_MISCONFIGURED);
        assert_eq!(form.submit(&mut doc, &input("whale_fan")).await, SubmitOutcome::Misconfigured);
    }

    #[tokio::test]
    async fn test_server_rejection_allows_retry() {
        let fake = FakeTransport::new()
            .reply(429, json!({ "ok": false, "error": "Too many signups from this address" }))
            .fail(ApiError::Transport("connection reset".to_string()))
            .reply(200, json!({ "ok": false }))
            .reply(200, json!({ "ok": true, "assigned_ref": "R2", "total_count": 1, "today_count": 1 }));
        let form = form("https://api.example.com", fake);
        let mut doc = page();

        let outcome = form.submit(&mut doc, &input("whale_fan")).await;
        assert_eq!(outcome, SubmitOutcome::Failed { message: "Too many signups from this address".to_string() });
        assert_eq!(form.state(), FormState::Failed);
        assert!(!submit_button(&doc).is_disabled());

        let outcome = form.submit(&mut doc, &input("whale_fan")).await;
        assert_eq!(outcome, SubmitOutcome::Failed { message: MSG_TRANSPORT.to_string() });

        let outcome = form.submit(&mut doc, &input("whale_fan")).await;
        assert_eq!(outcome, SubmitOutcome::Failed { message: MSG_REJECTED.to_string() });

        let outcome = form.submit(&mut doc, &input("whale_fan")).await;
        assert!(matches!(outcome, SubmitOutcome::Joined { duplicate: false, .. }));
    }

    #[tokio::test]
    async fn test_second_submission_cancels_first() {
        let fake = FakeTransport::new().reply(200, json!({ "ok": true, "assigned_ref": "LATEST", "total_count": 2 }));
        let form = form("https://api.example.com", fake);
        let mut doc = page();

        let first = form.prepare(&mut doc, &input("whale_fan")).unwrap();
        assert_eq!(form.state(), FormState::Submitting);
        assert!(submit_button(&doc).is_disabled());
        assert_eq!(text_of(&doc, attr::WAITLIST_MESSAGE_ID), MSG_SUBMITTING);

        let second = form.prepare(&mut doc, &input("whale_fan")).unwrap();
        assert!(first.ticket.token.is_cancelled());

        let stale = form.send(first).await;
        assert!(stale.result.is_none());
        assert_eq!(form.finish(&mut doc, stale), SubmitOutcome::Superseded);
        assert!(submit_button(&doc).is_disabled());

        let fresh = form.send(second).await;
        let outcome = form.finish(&mut doc, fresh);
        assert!(matches!(outcome, SubmitOutcome::Joined { .. }));
        assert!(!submit_button(&doc).is_disabled());

        // the cancelled request never reached the wire
        assert_eq!(form.client().unwrap().transport_requests().len(), 1);
    }

    #[test]
    fn test_form_input_from_document() {
        let mut doc = page();
        doc.set_field_value(attr::TELEGRAM_FIELD_ID, "@whale_fan");
        doc.set_field_value(attr::REF_FIELD_ID, "ABC");

        let typed = FormInput::from_document(&doc);
        assert_eq!(typed.telegram, "@whale_fan");
        assert_eq!(typed.ref_code, "ABC");
        assert_eq!(typed.email, "");
        assert_eq!(typed.honeypot, "");
    }
}
