use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Raw reply from the waitlist API. `body` is None when it was not JSON.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpReply {
    pub status: u16,
    pub body: Option<Value>,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure talking to the waitlist API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Could not reach the server or read its reply
    Transport(String),
    /// The server answered but said no; message is its own text when given
    Rejected { status: u16, message: Option<String> },
    /// The server said yes but the body was unusable
    Parse(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Transport(e) => write!(f, "transport error: {}", e),
            ApiError::Rejected { status, message } => match message {
                Some(m) => write!(f, "rejected (HTTP {}): {}", status, m),
                None => write!(f, "rejected (HTTP {})", status),
            },
            ApiError::Parse(e) => write!(f, "bad response: {}", e),
        }
    }
}

impl std::error::Error for ApiError {}

/// How JSON requests reach the server. `HttpTransport` is the real one.
pub trait Transport {
    fn get_json(&self, url: &str) -> impl Future<Output = Result<HttpReply, ApiError>> + Send;

    fn post_json(
        &self,
        url: &str,
        body: &Value,
    ) -> impl Future<Output = Result<HttpReply, ApiError>> + Send;
}

/// reqwest-backed transport
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(crate::config::HTTP_TIMEOUT_SECS))
            .user_agent(format!("{}-site/{}", crate::config::APP_NAME, crate::config::APP_VERSION))
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }

    async fn read_reply(response: reqwest::Response) -> Result<HttpReply, ApiError> {
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(HttpReply {
            status,
            body: serde_json::from_str(&text).ok(),
        })
    }
}

impl Transport for HttpTransport {
    async fn get_json(&self, url: &str) -> Result<HttpReply, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to reach {}: {}", url, e)))?;

        Self::read_reply(response).await
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpReply, ApiError> {
        let response = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| ApiError::Transport(format!("Failed to reach {}: {}", url, e)))?;

        Self::read_reply(response).await
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SubmitRequest {
    pub telegram_username: String,
    pub email: String,
    #[serde(rename = "ref")]
    pub ref_code: String,
    pub heard_about: String,
    pub honeypot: String,
}

/// Successful reply to a waitlist submission
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitResponse {
    pub assigned_ref: Option<String>,
    pub referral_link: Option<String>,
    pub already_joined: bool,
    pub total_count: Option<u64>,
    pub today_count: Option<u64>,
}

impl SubmitResponse {
    /// Read the reply, accepting the field names older workers used
    fn from_value(body: &Value) -> Self {
        Self {
            assigned_ref: first_str(body, &["assigned_ref", "ref_code_assigned", "ref_code"]),
            referral_link: first_str(body, &["referral_link"]),
            already_joined: ["already_joined", "duplicate"]
                .iter()
                .any(|k| body[*k].as_bool().unwrap_or(false)),
            total_count: body.get("total_count").filter(|v| !v.is_null()).map(lenient_count),
            today_count: body.get("today_count").filter(|v| !v.is_null()).map(lenient_count),
        }
    }
}

/// Aggregate signup numbers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountResponse {
    pub total_count: u64,
    pub today_count: u64,
    /// Sum of the last-7-days series
    pub week_count: u64,
}

impl CountResponse {
    fn from_value(body: &Value) -> Self {
        let series = body
            .get("counts_by_day_last_7")
            .or_else(|| body.get("counts_by_day"))
            .and_then(Value::as_array);

        let week_count = series
            .map(|days| {
                days.iter()
                    .map(|day| lenient_count(&day["count"]))
                    .fold(0u64, u64::saturating_add)
            })
            .unwrap_or(0);

        Self {
            total_count: lenient_count(&body["total_count"]),
            today_count: lenient_count(&body["today_count"]),
            week_count,
        }
    }
}

/// Dev-only config served by the worker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteConfig {
    pub treasury_address: Option<String>,
    pub pro_price_sol: Option<String>,
}

impl RemoteConfig {
    fn from_value(body: &Value) -> Self {
        let pro_price_sol = match &body["pro_price_sol"] {
            Value::Number(n) => Some(n.to_string()),
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            _ => None,
        };

        Self {
            treasury_address: first_str(body, &["treasury_address"]),
            pro_price_sol,
        }
    }
}

/// Counts arrive as numbers, numeric strings or not at all; anything
/// unusable counts as zero
fn lenient_count(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
            .unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    }
}

fn first_str(body: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| body[*k].as_str())
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Waitlist worker endpoints
pub struct WaitlistClient<T> {
    base_url: String,
    transport: T,
}

impl<T: Transport> WaitlistClient<T> {
    /// `base_url` must already be normalised (no trailing slash)
    pub fn new(base_url: String, transport: T) -> Self {
        Self { base_url, transport }
    }

    pub fn count_url(&self) -> String {
        format!("{}/api/waitlist/count", self.base_url)
    }

    pub fn submit_url(&self) -> String {
        format!("{}/api/waitlist/submit", self.base_url)
    }

    pub fn config_url(&self) -> String {
        format!("{}/api/config", self.base_url)
    }

    /// Fetch aggregate signup counts
    pub async fn fetch_counts(&self) -> Result<CountResponse, ApiError> {
        let reply = self.transport.get_json(&self.count_url()).await?;

        if !reply.is_success() {
            return Err(rejection(&reply));
        }

        let body = reply
            .body
            .ok_or_else(|| ApiError::Parse("count response was not JSON".to_string()))?;

        Ok(CountResponse::from_value(&body))
    }

    /// Submit one signup. Application-level refusals come back as
    /// `ApiError::Rejected` carrying the server's message.
    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitResponse, ApiError> {
        let payload = serde_json::to_value(request)
            .map_err(|e| ApiError::Parse(format!("Failed to serialize submission: {}", e)))?;

        let reply = self.transport.post_json(&self.submit_url(), &payload).await?;

        let body = match (&reply.body, reply.is_success()) {
            (Some(body), true) => body,
            (None, true) => {
                return Err(ApiError::Parse("submit response was not JSON".to_string()));
            }
            (_, false) => return Err(rejection(&reply)),
        };

        if !body["ok"].as_bool().unwrap_or(false) {
            return Err(rejection(&reply));
        }

        Ok(SubmitResponse::from_value(body))
    }

    /// Optional dev hydration endpoint
    pub async fn fetch_remote_config(&self) -> Result<RemoteConfig, ApiError> {
        let reply = self.transport.get_json(&self.config_url()).await?;

        if !reply.is_success() {
            return Err(rejection(&reply));
        }

        let body = reply
            .body
            .ok_or_else(|| ApiError::Parse("config response was not JSON".to_string()))?;

        Ok(RemoteConfig::from_value(&body))
    }
}

fn rejection(reply: &HttpReply) -> ApiError {
    let message = reply
        .body
        .as_ref()
        .and_then(|body| first_str(body, &["error", "message"]));

    ApiError::Rejected {
        status: reply.status,
        message,
    }
}
