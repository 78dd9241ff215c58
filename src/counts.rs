use crate::api::{ApiError, CountResponse, Transport, WaitlistClient};
use crate::dom::{attr, Document};
use crate::logger;

/// Shown in the counters when no API is configured
pub const COUNT_PLACEHOLDER: &str = "\u{2014}";

/// Outcome of one count refresh
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountSync {
    Updated(CountResponse),
    /// No usable API base: counters show a dash
    Unconfigured,
    /// Transient failure: counters keep whatever they showed before
    Failed(ApiError),
}

/// Fetch counts. `client` is None when the API base is unset.
pub async fn fetch_counts<T: Transport>(client: Option<&WaitlistClient<T>>) -> CountSync {
    let Some(client) = client else {
        return CountSync::Unconfigured;
    };

    match client.fetch_counts().await {
        Ok(counts) => CountSync::Updated(counts),
        Err(e) => CountSync::Failed(e),
    }
}

/// Write a refresh result into the counter elements
pub fn apply_counts(doc: &mut Document, sync: &CountSync) {
    match sync {
        CountSync::Updated(counts) => render_counts(doc, counts),
        CountSync::Unconfigured => {
            logger::warn("WORKER_API_BASE_URL not set for waitlist counts");
            doc.set_text_all(attr::WAITLIST_COUNT, COUNT_PLACEHOLDER);
            doc.set_text_all(attr::WAITLIST_TODAY, COUNT_PLACEHOLDER);
            doc.set_text_all(attr::WAITLIST_WEEK, COUNT_PLACEHOLDER);
        }
        CountSync::Failed(e) => {
            logger::warn(&format!("Failed to fetch waitlist counts: {}", e));
        }
    }
}

pub fn render_counts(doc: &mut Document, counts: &CountResponse) {
    doc.set_text_all(attr::WAITLIST_COUNT, &counts.total_count.to_string());
    doc.set_text_all(attr::WAITLIST_TODAY, &counts.today_count.to_string());
    doc.set_text_all(attr::WAITLIST_WEEK, &counts.week_count.to_string());
}

/// Counts embedded in a submit reply. The week total is not part of it,
/// so only what was sent gets updated.
pub fn render_partial(doc: &mut Document, total: Option<u64>, today: Option<u64>) {
    if let Some(total) = total {
        doc.set_text_all(attr::WAITLIST_COUNT, &total.to_string());
    }
    if let Some(today) = today {
        doc.set_text_all(attr::WAITLIST_TODAY, &today.to_string());
    }
}

/// Fetch and render in one go
pub async fn refresh_counts<T: Transport>(
    doc: &mut Document,
    client: Option<&WaitlistClient<T>>,
) -> CountSync {
    let sync = fetch_counts(client).await;
    apply_counts(doc, &sync);
    sync
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::testing::FakeTransport;
    use crate::dom::ElementSpec;
    use serde_json::json;

    fn page() -> Document {
        Document::new(vec![
            ElementSpec::new("span").attr(attr::WAITLIST_COUNT, "").text("12"),
            ElementSpec::new("span").attr(attr::WAITLIST_TODAY, "").text("1"),
            ElementSpec::new("span").attr(attr::WAITLIST_WEEK, "").text("5"),
            ElementSpec::new("b").attr(attr::WAITLIST_COUNT, ""),
        ])
    }

    fn texts(doc: &Document) -> Vec<String> {
        (0..doc.len()).map(|id| doc.get(id).unwrap().text().to_string()).collect()
    }

    #[tokio::test]
    async fn test_refresh_renders_week_total() {
        let fake = FakeTransport::new().reply(
            200,
            json!({ "total_count": 42, "today_count": 3, "counts_by_day_last_7": [{"count": 1}, {"count": 2}, {"count": 0}] }),
        );
        let client = WaitlistClient::new("https://api.example.com".to_string(), fake);
        let mut doc = page();

        let sync = refresh_counts(&mut doc, Some(&client)).await;
        assert!(matches!(sync, CountSync::Updated(_)));
        assert_eq!(texts(&doc), vec!["42", "3", "3", "42"]);
    }

    #[tokio::test]
    async fn test_failure_leaves_counts_untouched() {
        let fake = FakeTransport::new().fail(ApiError::Transport("timeout".to_string()));
        let client = WaitlistClient::new("https://api.example.com".to_string(), fake);
        let mut doc = page();

        let sync = refresh_counts(&mut doc, Some(&client)).await;
        assert!(matches!(sync, CountSync::Failed(_)));
        assert_eq!(texts(&doc), vec!["12", "1", "5", ""]);
    }

    #[tokio::test]
    async fn test_unconfigured_renders_dash() {
        let mut doc = page();
        let sync = refresh_counts::<FakeTransport>(&mut doc, None).await;
        assert_eq!(sync, CountSync::Unconfigured);
        assert!(texts(&doc).iter().all(|t| t == COUNT_PLACEHOLDER));
    }

    #[test]
    fn test_partial_counts_keep_week() {
        let mut doc = page();
        render_partial(&mut doc, Some(50), None);
        assert_eq!(texts(&doc), vec!["50", "1", "5", "50"]);
    }
}
