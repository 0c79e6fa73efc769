//! Shared fixtures: an app wired with in-memory fakes

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parking_lot::Mutex;
use showroom_bot::appointment::{AppointmentFlow, MemoryDraftStore};
use showroom_bot::calendar::{BusySpan, CalendarBackend, CalendarError, CalendarGateway, NewEvent};
use showroom_bot::channels::{ChannelError, MessageSender};
use showroom_bot::conversation::{ConversationMessage, ConversationStore, Role};
use showroom_bot::llm::{ChatModel, LlmError};
use showroom_bot::{build_router, AppState, Assistant, Bot, CsvLog, FileLock, OfferCatalog, SnapshotFile};
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

pub const TOKEN: &str = "segredo";

pub const OFFERS: &str = r#"[
    {"modelo": "Pulse", "versao": "Drive 1.3", "motor": "1.3", "cambio": "CVT", "combustivel": "Flex",
     "tags": ["suv", "compacto"], "preco_por": 109990, "link_modelo": "https://loja/pulse"},
    {"modelo": "Mobi", "versao": "Like", "motor": "1.0", "cambio": "Manual", "combustivel": "Flex",
     "tags": ["hatch"], "preco_a_partir": 69990},
    {"modelo": "Toro", "versao": "Ranch", "motor": "2.2 Turbo Diesel", "cambio": "Automático",
     "tags": ["picape"], "preco_de": 219990}
]"#;

/// Replies "IA: <last user message>" and records the context it was given
#[derive(Default)]
pub struct EchoModel {
    pub calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

#[async_trait]
impl ChatModel for EchoModel {
    fn model_name(&self) -> &str {
        "echo-model"
    }

    async fn complete(&self, messages: &[ConversationMessage], _temperature: f32) -> Result<String, LlmError> {
        self.calls.lock().push(messages.to_vec());
        let last = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(format!("IA: {}", last))
    }
}

/// Calendar with fixed busy spans; inserted events block their slot
pub struct MemoryCalendar {
    pub busy: Mutex<Vec<BusySpan>>,
    pub events: Mutex<Vec<NewEvent>>,
}

impl MemoryCalendar {
    pub fn new() -> Self {
        Self {
            busy: Mutex::new(Vec::new()),
            events: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CalendarBackend for MemoryCalendar {
    async fn query_busy(&self, from: DateTime<Tz>, to: DateTime<Tz>) -> Result<Vec<BusySpan>, CalendarError> {
        let (from, to) = (from.with_timezone(&Utc), to.with_timezone(&Utc));
        Ok(self
            .busy
            .lock()
            .iter()
            .copied()
            .filter(|s| s.start < to && from < s.end)
            .collect())
    }

    async fn insert_event(&self, event: &NewEvent) -> Result<String, CalendarError> {
        self.busy.lock().push(BusySpan {
            start: event.start.with_timezone(&Utc),
            end: event.end.with_timezone(&Utc),
        });
        let mut events = self.events.lock();
        events.push(event.clone());
        Ok(format!("evt-{}", events.len()))
    }
}

#[derive(Default)]
pub struct RecordingSender {
    pub sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl MessageSender for RecordingSender {
    fn name(&self) -> &str {
        "recording"
    }

    fn is_ready(&self) -> bool {
        true
    }

    async fn send_text(&self, phone: &str, text: &str) -> Result<String, ChannelError> {
        self.sent.lock().push((phone.to_string(), text.to_string()));
        Ok("SM-test".to_string())
    }
}

pub struct TestApp {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub model: Arc<EchoModel>,
    pub calendar: Arc<MemoryCalendar>,
    pub sender: Arc<RecordingSender>,
}

pub struct Options {
    pub guard: bool,
    pub log_opt_out_leads: bool,
    pub offers: Option<&'static str>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            guard: true,
            log_opt_out_leads: false,
            offers: Some(OFFERS),
        }
    }
}

pub fn app() -> TestApp {
    app_with(Options::default())
}

pub fn app_with(options: Options) -> TestApp {
    let dir = TempDir::new().unwrap();
    let lock = FileLock::new();

    let offers_path = dir.path().join("ofertas.json");
    if let Some(offers) = options.offers {
        std::fs::write(&offers_path, offers).unwrap();
    }

    let conversations = Arc::new(ConversationStore::open(SnapshotFile::new(
        dir.path().join("sessions.json"),
        lock.clone(),
    )));
    let model = Arc::new(EchoModel::default());
    let assistant = Assistant::new(model.clone(), conversations.clone(), "Loja Teste");

    let calendar = Arc::new(MemoryCalendar::new());
    let gateway = CalendarGateway::new(calendar.clone(), chrono_tz::America::Sao_Paulo);
    let appointments = AppointmentFlow::new(
        Arc::new(MemoryDraftStore::new()),
        Arc::new(gateway),
        CsvLog::new(dir.path().join("appointments.csv"), lock.clone()),
    );

    let bot = Bot::new(
        conversations,
        assistant,
        OfferCatalog::new(&offers_path, 60, options.guard),
        appointments,
        CsvLog::new(dir.path().join("leads.csv"), lock),
    )
    .with_opt_out_leads(options.log_opt_out_leads);

    let sender = Arc::new(RecordingSender::default());
    let state = Arc::new(AppState {
        bot: Arc::new(bot),
        sender: sender.clone(),
        admin_token: TOKEN.to_string(),
        dealer_name: "Loja Teste".to_string(),
        port: 5000,
    });

    TestApp {
        dir,
        state,
        model,
        calendar,
        sender,
    }
}

impl TestApp {
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn request(&self, request: Request<Body>) -> (StatusCode, String) {
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, String) {
        self.request(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str) -> (StatusCode, String) {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }

    /// POST a Twilio-style form and return the TwiML body
    pub async fn send(&self, from: &str, body: &str) -> String {
        let form = format!("From={}&Body={}", encode(from), encode(body));
        let (status, xml) = self
            .request(
                Request::builder()
                    .method("POST")
                    .uri("/webhook")
                    .header("content-type", "application/x-www-form-urlencoded")
                    .body(Body::from(form))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        xml
    }
}

/// Minimal form encoding for test inputs
pub fn encode(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            b' ' => out.push('+'),
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

/// Text inside `<Message>…</Message>`
pub fn message_text(xml: &str) -> String {
    let start = xml.find("<Message>").map(|i| i + "<Message>".len()).unwrap_or(0);
    let end = xml.find("</Message>").unwrap_or(xml.len());
    xml[start..end]
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
