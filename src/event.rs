//! The telemetry record carried by the queue.
//!
//! Events serialize in camelCase so a batch is exactly the JSON array the collection endpoint
//! expects:
//!
//! ```json
//! [{"event":"cta_click","testId":"hero-copy","variant":"b","userId":"anonymous",
//!   "sessionId":"unknown","timestamp":"2024-05-01T12:00:00Z","properties":{"button":"pricing"}}]
//! ```
//!
//! A [`QueuedEvent`] has no mutators; once built it is handed to the queue by value.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::error::EventError;

/// Longest `url` kept on an event, in characters.
pub const MAX_URL_LEN: usize = 2048;
/// Longest `userAgent` kept on an event, in characters.
pub const MAX_USER_AGENT_LEN: usize = 512;

pub const ANONYMOUS_USER: &str = "anonymous";
pub const UNKNOWN_SESSION: &str = "unknown";

fn default_user_id() -> String {
    ANONYMOUS_USER.to_string()
}

fn default_session_id() -> String {
    UNKNOWN_SESSION.to_string()
}

/// A single telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuedEvent {
    event: String,
    #[serde(default)]
    test_id: String,
    #[serde(default)]
    variant: String,
    #[serde(default = "default_user_id")]
    user_id: String,
    #[serde(default = "default_session_id")]
    session_id: String,
    timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user_agent: Option<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl QueuedEvent {
    /// Start building an event named `event`.
    pub fn builder(event: impl Into<String>) -> QueuedEventBuilder {
        QueuedEventBuilder::new(event)
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    pub fn test_id(&self) -> &str {
        &self.test_id
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.user_agent.as_deref()
    }

    pub fn properties(&self) -> &Map<String, Value> {
        &self.properties
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// Builder for [`QueuedEvent`]. Unset identity fields fall back to `"anonymous"` / `"unknown"`
/// and an unset timestamp is taken from the system clock at [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct QueuedEventBuilder {
    event: String,
    test_id: String,
    variant: String,
    user_id: Option<String>,
    session_id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    url: Option<String>,
    user_agent: Option<String>,
    properties: Map<String, Value>,
}

impl QueuedEventBuilder {
    fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            test_id: String::new(),
            variant: String::new(),
            user_id: None,
            session_id: None,
            timestamp: None,
            url: None,
            user_agent: None,
            properties: Map::new(),
        }
    }

    /// Experiment (A/B test) and the variant the user was assigned.
    pub fn experiment(mut self, test_id: impl Into<String>, variant: impl Into<String>) -> Self {
        self.test_id = test_id.into();
        self.variant = variant.into();
        self
    }

    pub fn user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Add one entry to the open-ended `properties` map; later values win.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn properties(mut self, properties: Map<String, Value>) -> Self {
        self.properties.extend(properties);
        self
    }

    /// Finish the event, truncating `url` and `userAgent` to their bounds.
    pub fn build(self) -> Result<QueuedEvent, EventError> {
        if self.event.trim().is_empty() {
            return Err(EventError::EmptyName);
        }
        Ok(QueuedEvent {
            event: self.event,
            test_id: self.test_id,
            variant: self.variant,
            user_id: self.user_id.unwrap_or_else(default_user_id),
            session_id: self.session_id.unwrap_or_else(default_session_id),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            url: self.url.map(|u| truncate_chars(u, MAX_URL_LEN)),
            user_agent: self.user_agent.map(|ua| truncate_chars(ua, MAX_USER_AGENT_LEN)),
            properties: self.properties,
        })
    }
}

fn truncate_chars(mut s: String, max: usize) -> String {
    if let Some((idx, _)) = s.char_indices().nth(max) {
        s.truncate(idx);
    }
    s
}

/// Per-visitor defaults stamped onto every event built through it.
///
/// Typically one per session: page-view hooks and click handlers call [`EventContext::event`]
/// and only add what is specific to the interaction.
#[derive(Debug, Clone)]
pub struct EventContext {
    test_id: String,
    variant: String,
    user_id: Option<String>,
    session_id: Option<String>,
    url: Option<String>,
    user_agent: Option<String>,
    clock: Arc<dyn Clock>,
}

impl Default for EventContext {
    fn default() -> Self {
        Self::new()
    }
}

impl EventContext {
    pub fn new() -> Self {
        Self {
            test_id: String::new(),
            variant: String::new(),
            user_id: None,
            session_id: None,
            url: None,
            user_agent: None,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_experiment(mut self, test_id: impl Into<String>, variant: impl Into<String>) -> Self {
        self.test_id = test_id.into();
        self.variant = variant.into();
        self
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    pub fn with_clock<C: Clock + 'static>(mut self, clock: C) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// A builder pre-filled with this context and stamped with the context clock.
    pub fn event(&self, name: impl Into<String>) -> QueuedEventBuilder {
        let mut builder = QueuedEvent::builder(name)
            .experiment(self.test_id.clone(), self.variant.clone())
            .timestamp(self.clock.now());
        builder.user_id = self.user_id.clone();
        builder.session_id = self.session_id.clone();
        builder.url = self.url.clone();
        builder.user_agent = self.user_agent.clone();
        builder
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use serde_json::json;

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn builder_fills_identity_defaults() {
        let event = QueuedEvent::builder("page_view").timestamp(noon()).build().unwrap();
        assert_eq!(event.user_id(), "anonymous");
        assert_eq!(event.session_id(), "unknown");
        assert_eq!(event.test_id(), "");
        assert!(event.properties().is_empty());
    }

    #[test]
    fn empty_name_is_rejected() {
        assert_eq!(QueuedEvent::builder("  ").build(), Err(EventError::EmptyName));
    }

    #[test]
    fn url_and_user_agent_are_truncated_on_char_boundaries() {
        let long_url = format!("https://digiclick.ai/{}", "é".repeat(MAX_URL_LEN));
        let long_ua = "x".repeat(MAX_USER_AGENT_LEN + 100);
        let event = QueuedEvent::builder("page_view")
            .url(long_url)
            .user_agent(long_ua)
            .build()
            .unwrap();
        assert_eq!(event.url().unwrap().chars().count(), MAX_URL_LEN);
        assert_eq!(event.user_agent().unwrap().len(), MAX_USER_AGENT_LEN);
    }

    #[test]
    fn short_fields_are_untouched() {
        let event = QueuedEvent::builder("page_view").url("https://digiclick.ai/pricing").build().unwrap();
        assert_eq!(event.url(), Some("https://digiclick.ai/pricing"));
    }

    #[test]
    fn serializes_camel_case_for_the_collector() {
        let event = QueuedEvent::builder("cta_click")
            .experiment("hero-copy", "b")
            .user_id("u-123")
            .session_id("s-9")
            .timestamp(noon())
            .property("button", "pricing")
            .build()
            .unwrap();

        let v = serde_json::to_value(&event).unwrap();
        assert_eq!(v["event"], "cta_click");
        assert_eq!(v["testId"], "hero-copy");
        assert_eq!(v["variant"], "b");
        assert_eq!(v["userId"], "u-123");
        assert_eq!(v["sessionId"], "s-9");
        assert!(v["timestamp"].as_str().unwrap().starts_with("2024-05-01T12:00:00"));
        assert_eq!(v["properties"], json!({ "button": "pricing" }));
        assert!(v.get("url").is_none());
    }

    #[test]
    fn deserialize_applies_defaults() {
        let event: QueuedEvent = serde_json::from_value(json!({
            "event": "signup",
            "timestamp": "2024-05-01T12:00:00Z"
        }))
        .unwrap();
        assert_eq!(event.user_id(), ANONYMOUS_USER);
        assert_eq!(event.session_id(), UNKNOWN_SESSION);
        assert_eq!(event.timestamp(), noon());
    }

    #[test]
    fn context_prefills_and_stamps_with_its_clock() {
        let clock = ManualClock::new(noon());
        let ctx = EventContext::new()
            .with_experiment("pricing-table", "annual-first")
            .with_session("s-1")
            .with_url("https://digiclick.ai/pricing")
            .with_clock(clock.clone());

        let first = ctx.event("view_pricing").build().unwrap();
        clock.advance(std::time::Duration::from_secs(5));
        let second = ctx.event("select_plan").property("plan", "pro").build().unwrap();

        assert_eq!(first.test_id(), "pricing-table");
        assert_eq!(first.variant(), "annual-first");
        assert_eq!(first.session_id(), "s-1");
        assert_eq!(first.user_id(), ANONYMOUS_USER);
        assert_eq!(first.timestamp(), noon());
        assert_eq!(second.timestamp(), noon() + chrono::Duration::seconds(5));
        assert_eq!(second.property("plan"), Some(&json!("pro")));
    }
}
