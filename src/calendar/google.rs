//! Google Calendar backend
//!
//! Authenticates as a service account: the key JSON arrives base64-encoded,
//! is signed into an RS256 assertion and exchanged for a bearer token that is
//! reused until shortly before it expires.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use parking_lot::Mutex;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tracing::debug;

use super::{BusySpan, CalendarBackend, CalendarError, NewEvent};

const CALENDAR_API_URL: &str = "https://www.googleapis.com/calendar/v3";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";
const ASSERTION_LIFETIME_SECS: i64 = 3600;
/// Refresh this long before the token actually expires
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

impl ServiceAccountKey {
    /// Decode the base64 JSON key
    pub fn from_base64(encoded: &str) -> Result<Self, CalendarError> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| CalendarError::NotConfigured(format!("service account is not base64: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CalendarError::NotConfigured(format!("service account JSON: {}", e)))
    }
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FreeBusyRequest<'a> {
    time_min: String,
    time_max: String,
    time_zone: &'a str,
    items: Vec<FreeBusyItem<'a>>,
}

#[derive(Debug, Serialize)]
struct FreeBusyItem<'a> {
    id: &'a str,
}

#[derive(Debug, Deserialize)]
struct FreeBusyResponse {
    #[serde(default)]
    calendars: HashMap<String, FreeBusyCalendar>,
}

#[derive(Debug, Deserialize)]
struct FreeBusyCalendar {
    #[serde(default)]
    busy: Vec<RawSpan>,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawSpan {
    start: String,
    end: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EventTime<'a> {
    date_time: String,
    time_zone: &'a str,
}

#[derive(Debug, Serialize)]
struct EventBody<'a> {
    summary: &'a str,
    description: &'a str,
    start: EventTime<'a>,
    end: EventTime<'a>,
}

#[derive(Debug, Deserialize)]
struct InsertedEvent {
    id: Option<String>,
}

pub struct GoogleCalendar {
    client: Client,
    key: ServiceAccountKey,
    calendar_id: String,
    api_base: String,
    token_url: String,
    token: Mutex<Option<CachedToken>>,
}

impl GoogleCalendar {
    pub fn new(key: ServiceAccountKey, calendar_id: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());
        let token_url = key.token_uri.clone().unwrap_or_else(|| TOKEN_URL.to_string());
        Self {
            client,
            key,
            calendar_id: calendar_id.into(),
            api_base: CALENDAR_API_URL.to_string(),
            token_url,
            token: Mutex::new(None),
        }
    }

    /// Build from the base64 key and calendar id
    pub fn from_base64(encoded: &str, calendar_id: &str) -> Result<Self, CalendarError> {
        if calendar_id.trim().is_empty() {
            return Err(CalendarError::NotConfigured("calendar id is empty".into()));
        }
        Ok(Self::new(ServiceAccountKey::from_base64(encoded)?, calendar_id))
    }

    /// Override the Calendar API base URL
    pub fn with_api_base(mut self, url: impl Into<String>) -> Self {
        self.api_base = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Override the OAuth token endpoint
    pub fn with_token_url(mut self, url: impl Into<String>) -> Self {
        self.token_url = url.into();
        self
    }

    fn sign_assertion(&self) -> Result<String, CalendarError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.key.client_email,
            scope: SCOPE,
            aud: &self.token_url,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let key = EncodingKey::from_rsa_pem(self.key.private_key.as_bytes())
            .map_err(|e| CalendarError::Auth(format!("invalid private key: {}", e)))?;
        encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| CalendarError::Auth(format!("failed to sign assertion: {}", e)))
    }

    async fn access_token(&self) -> Result<String, CalendarError> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|t| Instant::now() + EXPIRY_MARGIN < t.expires_at)
            .map(|t| t.value.clone());
        if let Some(value) = cached {
            return Ok(value);
        }

        let assertion = self.sign_assertion()?;
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CalendarError::Auth(format!("token exchange {}: {}", status, body)));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))?;
        debug!("Obtained calendar access token, expires in {}s", token.expires_in);

        *self.token.lock() = Some(CachedToken {
            value: token.access_token.clone(),
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });
        Ok(token.access_token)
    }

    fn events_url(&self) -> Result<Url, CalendarError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| CalendarError::NotConfigured(format!("bad calendar URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| CalendarError::NotConfigured("calendar URL cannot be a base".into()))?
            .pop_if_empty()
            .extend(["calendars", self.calendar_id.as_str(), "events"]);
        Ok(url)
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, CalendarError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CalendarError::Api {
            status: status.as_u16(),
            body,
        })
    }
}

fn parse_instant(raw: &str) -> Result<DateTime<Utc>, CalendarError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| CalendarError::Decode(format!("bad timestamp {:?}: {}", raw, e)))
}

fn busy_spans(response: FreeBusyResponse, calendar_id: &str) -> Result<Vec<BusySpan>, CalendarError> {
    let calendar = response
        .calendars
        .get(calendar_id)
        .ok_or_else(|| CalendarError::Decode(format!("calendar {} missing from response", calendar_id)))?;
    if !calendar.errors.is_empty() {
        return Err(CalendarError::Api {
            status: 200,
            body: serde_json::Value::Array(calendar.errors.clone()).to_string(),
        });
    }
    calendar
        .busy
        .iter()
        .map(|span| {
            Ok(BusySpan {
                start: parse_instant(&span.start)?,
                end: parse_instant(&span.end)?,
            })
        })
        .collect()
}

#[async_trait]
impl CalendarBackend for GoogleCalendar {
    async fn query_busy(&self, from: DateTime<Tz>, to: DateTime<Tz>) -> Result<Vec<BusySpan>, CalendarError> {
        let token = self.access_token().await?;
        let request = FreeBusyRequest {
            time_min: from.to_rfc3339(),
            time_max: to.to_rfc3339(),
            time_zone: from.timezone().name(),
            items: vec![FreeBusyItem {
                id: &self.calendar_id,
            }],
        };

        let response = self
            .client
            .post(format!("{}/freeBusy", self.api_base))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await?;
        let parsed: FreeBusyResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))?;

        busy_spans(parsed, &self.calendar_id)
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<String, CalendarError> {
        let token = self.access_token().await?;
        let tz = event.start.timezone().name();
        let body = EventBody {
            summary: &event.summary,
            description: &event.description,
            start: EventTime {
                date_time: event.start.to_rfc3339(),
                time_zone: tz,
            },
            end: EventTime {
                date_time: event.end.to_rfc3339(),
                time_zone: tz,
            },
        };

        let response = self
            .client
            .post(self.events_url()?)
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let inserted: InsertedEvent = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| CalendarError::Decode(e.to_string()))?;

        inserted
            .id
            .ok_or_else(|| CalendarError::Decode("inserted event has no id".into()))
    }
}
